//! AntiSlot Client - verified ruleset sync for devices.
//!
//! Fetches the signed blocklist and pattern snapshots, verifies both HMAC
//! signatures, refuses rollbacks and keeps the last verified ruleset in force
//! when anything goes wrong. The verified rules feed a local
//! [`DomainMatcher`](antislot_core::matcher::DomainMatcher) so per-navigation
//! checks never touch the network.
//!
//! # Example
//!
//! ```no_run
//! use antislot_client::{ClientConfig, RulesetClient};
//!
//! # async fn run() -> antislot_client::Result<()> {
//! let client = RulesetClient::new(
//!     ClientConfig::new("https://api.antislot.app")
//!         .with_hmac_secret("shared-secret")
//!         .with_state_file("./state.json"),
//! )?;
//! client.sync().await?;
//! println!("{}", client.check_domain("https://www.bet365.com/"));
//! # Ok(())
//! # }
//! ```

mod client;
pub mod config;
pub mod error;
pub mod state;

pub use client::{DocumentSync, RulesetClient, SyncReport};
pub use config::{normalize_api_url, validate_api_url, ClientConfig, DEFAULT_TIMEOUT};
pub use error::{Result, SyncError};
pub use state::VerifiedState;

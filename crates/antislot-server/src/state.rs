//! Application state for the API server.

use std::sync::Arc;

use antislot_core::signature::SignatureService;
use antislot_storage::RuleStore;

use crate::CacheControl;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Blocklist and pattern repositories.
    pub store: RuleStore,
    /// Snapshot signer.
    pub signer: Arc<SignatureService>,
    /// Cache-Control values per endpoint.
    pub cache_control: Arc<CacheControl>,
}

impl AppState {
    /// Creates state with the default cache policy.
    pub fn new(store: RuleStore, signer: SignatureService) -> Self {
        Self::with_cache_control(store, signer, CacheControl::default())
    }

    /// Creates state with a custom cache policy.
    pub fn with_cache_control(
        store: RuleStore,
        signer: SignatureService,
        cache_control: CacheControl,
    ) -> Self {
        Self {
            store,
            signer: Arc::new(signer),
            cache_control: Arc::new(cache_control),
        }
    }
}

//! Ruleset sync client.
//!
//! A sync fetches both snapshots concurrently, verifies both signatures and
//! only then replaces the local state. Each document is replaced only when
//! the offered version is strictly newer than the one held, so a replayed
//! older snapshot cannot roll a device back.

use std::path::PathBuf;
use std::time::Duration;

use antislot_core::domain::normalize_domain;
use antislot_core::matcher::{Decision, DomainMatcher};
use antislot_core::ruleset::now_millis;
use antislot_core::signature::SignatureService;
use antislot_core::snapshot::{BlocklistSnapshot, PatternsSnapshot};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{validate_api_url, ClientConfig};
use crate::error::{Result, SyncError};
use crate::state::{normalize_domains, normalize_patterns, VerifiedState};

/// What a sync did to one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DocumentSync {
    /// The offered version was newer and is now in force.
    Updated { from: Option<u64>, to: u64 },
    /// The offered version was not newer; the held version stays.
    Unchanged { held: u64, offered: u64 },
}

impl DocumentSync {
    fn decide(held: Option<u64>, offered: u64) -> Self {
        match held {
            Some(held) if offered <= held => DocumentSync::Unchanged { held, offered },
            from => DocumentSync::Updated { from, to: offered },
        }
    }

    /// Returns true if the document was replaced.
    pub fn is_updated(&self) -> bool {
        matches!(self, DocumentSync::Updated { .. })
    }
}

/// Result of a successful sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub blocklist: DocumentSync,
    pub patterns: DocumentSync,
}

/// Fetches, verifies and applies signed rulesets; answers local block checks.
pub struct RulesetClient {
    base_url: String,
    timeout: Duration,
    http: reqwest::Client,
    signer: SignatureService,
    state_file: Option<PathBuf>,
    state: RwLock<VerifiedState>,
    matcher: DomainMatcher,
    sync_lock: tokio::sync::Mutex<()>,
}

impl RulesetClient {
    /// Validates the configuration and loads any persisted state.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base_url = validate_api_url(&config.api_url)?;
        let secret = config
            .hmac_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(SyncError::MissingSecret)?;
        let signer = SignatureService::new(secret)
            .map_err(|e| SyncError::Malformed(format!("unusable HMAC secret: {e}")))?;

        let http = reqwest::Client::builder()
            .user_agent(format!("AntiSlot/{}", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;

        let mut state = match &config.state_file {
            Some(path) => VerifiedState::load(path)?,
            None => VerifiedState::default(),
        };
        for domain in &config.allow_list {
            let domain = normalize_domain(domain);
            if !domain.is_empty() && !state.allow_list.contains(&domain) {
                state.allow_list.push(domain);
            }
        }

        let matcher = DomainMatcher::new();
        matcher.load(&state.rules());
        matcher.set_allow_list(&state.allow_list);

        Ok(Self {
            base_url,
            timeout: config.timeout,
            http,
            signer,
            state_file: config.state_file,
            state: RwLock::new(state),
            matcher,
            sync_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// The normalized API base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches both snapshots and applies them if they verify.
    ///
    /// On any error the previously verified state stays in force.
    pub async fn sync(&self) -> Result<SyncReport> {
        let _guard = self.sync_lock.lock().await;

        let (blocklist, patterns) = tokio::try_join!(
            self.fetch::<BlocklistSnapshot>("/v1/blocklist"),
            self.fetch::<PatternsSnapshot>("/v1/patterns"),
        )?;

        check_shape(blocklist.version, &blocklist.signature, "blocklist")?;
        check_shape(patterns.version, &patterns.signature, "patterns")?;

        if !blocklist.verify(&self.signer) {
            warn!(version = blocklist.version, "Rejected blocklist with invalid signature");
            return Err(SyncError::Integrity("blocklist signature mismatch"));
        }
        if !patterns.verify(&self.signer) {
            warn!(version = patterns.version, "Rejected patterns with invalid signature");
            return Err(SyncError::Integrity("patterns signature mismatch"));
        }

        let mut state = self.state.write();
        let report = SyncReport {
            blocklist: DocumentSync::decide(state.blocklist_version, blocklist.version),
            patterns: DocumentSync::decide(state.patterns_version, patterns.version),
        };

        let mut next = state.clone();
        if report.blocklist.is_updated() {
            next.blocklist_version = Some(blocklist.version);
            next.blocklist_updated_at = Some(blocklist.updated_at);
            next.domains = normalize_domains(&blocklist.domains);
        }
        if report.patterns.is_updated() {
            next.patterns_version = Some(patterns.version);
            next.patterns_updated_at = Some(patterns.updated_at);
            next.patterns = normalize_patterns(&patterns.patterns);
        }
        next.last_sync = Some(now_millis());

        self.persist(&next)?;
        if report.blocklist.is_updated() || report.patterns.is_updated() {
            let loaded = self.matcher.load(&next.rules());
            debug!(loaded = loaded.loaded, skipped = loaded.skipped, "Matcher rebuilt");
        }
        *state = next;

        info!(
            blocklist = ?report.blocklist,
            patterns = ?report.patterns,
            "Sync complete"
        );
        Ok(report)
    }

    /// The ruleset currently in force. Only ever holds verified data.
    pub fn current_ruleset(&self) -> VerifiedState {
        self.state.read().clone()
    }

    /// Adds a domain to the allow-list. Returns false if already present.
    pub fn add_allowed(&self, domain: &str) -> Result<bool> {
        let domain = normalize_domain(domain);
        if domain.is_empty() {
            return Ok(false);
        }

        let mut state = self.state.write();
        if state.allow_list.contains(&domain) {
            return Ok(false);
        }
        let mut next = state.clone();
        next.allow_list.push(domain);
        self.persist(&next)?;
        self.matcher.set_allow_list(&next.allow_list);
        *state = next;
        Ok(true)
    }

    /// Removes a domain from the allow-list. Returns false if absent.
    pub fn remove_allowed(&self, domain: &str) -> Result<bool> {
        let domain = normalize_domain(domain);

        let mut state = self.state.write();
        if !state.allow_list.contains(&domain) {
            return Ok(false);
        }
        let mut next = state.clone();
        next.allow_list.retain(|d| d != &domain);
        self.persist(&next)?;
        self.matcher.set_allow_list(&next.allow_list);
        *state = next;
        Ok(true)
    }

    /// Evaluates a URL or hostname against the verified rules.
    pub fn check_domain(&self, input: &str) -> Decision {
        self.matcher.evaluate(input)
    }

    /// The local matcher.
    pub fn matcher(&self) -> &DomainMatcher {
        &self.matcher
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "Fetching snapshot");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?
            .error_for_status()?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;

        serde_json::from_slice(&bytes).map_err(|e| SyncError::Malformed(format!("{path}: {e}")))
    }

    fn transport_error(&self, err: reqwest::Error) -> SyncError {
        if err.is_timeout() {
            SyncError::Timeout(self.timeout)
        } else {
            SyncError::Http(err)
        }
    }

    fn persist(&self, state: &VerifiedState) -> Result<()> {
        match &self.state_file {
            Some(path) => state.persist(path),
            None => Ok(()),
        }
    }
}

fn check_shape(version: u64, signature: &str, what: &str) -> Result<()> {
    if version == 0 {
        return Err(SyncError::Malformed(format!("{what}: version must be at least 1")));
    }
    if signature.trim().is_empty() {
        return Err(SyncError::Malformed(format!("{what}: missing signature")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use antislot_core::matcher::MatchStage;
    use antislot_server::{Server, ServerConfig};
    use antislot_storage::{RuleStore, StoreConfig};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use tempfile::TempDir;

    const SECRET: &str = "client-test-secret";

    fn store_config(dir: &TempDir) -> StoreConfig {
        StoreConfig::in_dir(dir.path().join("server")).with_cache_ttl(Duration::ZERO)
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn spawn_server(dir: &TempDir) -> (String, RuleStore) {
        let config = ServerConfig::default()
            .with_host("127.0.0.1")
            .with_port(0)
            .with_hmac_secret(SECRET)
            .with_store(store_config(dir));
        let server = Server::new(config).unwrap();
        let url = serve(server.router()).await;
        (url, RuleStore::open(&store_config(dir)))
    }

    fn open_client(url: &str, dir: &TempDir) -> RulesetClient {
        RulesetClient::new(
            ClientConfig::new(url)
                .with_hmac_secret(SECRET)
                .with_state_file(dir.path().join("client").join("state.json")),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn sync_applies_verified_rules() {
        let dir = TempDir::new().unwrap();
        let (url, store) = spawn_server(&dir).await;
        store.blocklist.add_domain("luckyspin.com", "test", None).unwrap();

        let client = open_client(&url, &dir);
        assert!(!client.check_domain("luckyspin.com").is_blocked());

        let report = client.sync().await.unwrap();
        assert_eq!(report.blocklist, DocumentSync::Updated { from: None, to: 2 });
        assert_eq!(report.patterns, DocumentSync::Updated { from: None, to: 1 });

        let decision = client.check_domain("https://www.LuckySpin.com/slots");
        assert!(matches!(
            decision,
            Decision::Blocked { stage: MatchStage::Exact, .. }
        ));
        assert!(client.check_domain("mycasinoworld.net").is_blocked());
        assert!(!client.check_domain("example.org").is_blocked());

        let current = client.current_ruleset();
        assert_eq!(current.domains, vec!["luckyspin.com"]);
        assert_eq!(current.blocklist_version, Some(2));
        assert!(current.last_sync.is_some());
    }

    #[tokio::test]
    async fn computed_pattern_weights_pass_verification() {
        let dir = TempDir::new().unwrap();
        let (url, store) = spawn_server(&dir).await;
        store
            .patterns
            .add_pattern(antislot_core::ruleset::Pattern::contains("jackpot", 0.1 + 0.2))
            .unwrap();
        store
            .patterns
            .add_pattern(antislot_core::ruleset::Pattern::contains("roulette", 1.0 / 3.0))
            .unwrap();

        let client = open_client(&url, &dir);
        let report = client.sync().await.unwrap();
        assert_eq!(report.patterns, DocumentSync::Updated { from: None, to: 3 });
        assert!(client.check_domain("megajackpot.io").is_blocked());
    }

    #[tokio::test]
    async fn unchanged_versions_are_kept() {
        let dir = TempDir::new().unwrap();
        let (url, _store) = spawn_server(&dir).await;
        let client = open_client(&url, &dir);

        client.sync().await.unwrap();
        let report = client.sync().await.unwrap();
        assert_eq!(report.blocklist, DocumentSync::Unchanged { held: 1, offered: 1 });
        assert!(!report.patterns.is_updated());
    }

    #[tokio::test]
    async fn older_snapshot_cannot_roll_back() {
        let dir = TempDir::new().unwrap();
        let (url, _store) = spawn_server(&dir).await;

        let state_path = dir.path().join("client").join("state.json");
        VerifiedState {
            blocklist_version: Some(10),
            domains: vec!["kept.bet".into()],
            ..Default::default()
        }
        .persist(&state_path)
        .unwrap();

        let client = open_client(&url, &dir);
        let report = client.sync().await.unwrap();
        assert_eq!(report.blocklist, DocumentSync::Unchanged { held: 10, offered: 1 });
        assert_eq!(client.current_ruleset().domains, vec!["kept.bet"]);
        assert!(client.check_domain("kept.bet").is_blocked());
    }

    #[tokio::test]
    async fn wrong_secret_keeps_previous_state() {
        let dir = TempDir::new().unwrap();
        let (url, store) = spawn_server(&dir).await;
        let good = open_client(&url, &dir);
        good.sync().await.unwrap();

        store.blocklist.add_domain("luckyspin.com", "test", None).unwrap();
        let bad = RulesetClient::new(
            ClientConfig::new(&url)
                .with_hmac_secret("not-the-secret")
                .with_state_file(dir.path().join("client").join("state.json")),
        )
        .unwrap();
        let before = bad.current_ruleset();

        let err = bad.sync().await.unwrap_err();
        assert!(matches!(err, SyncError::Integrity(_)));
        assert_eq!(bad.current_ruleset(), before);
        assert!(!bad.check_domain("luckyspin.com").is_blocked());

        let on_disk = VerifiedState::load(&dir.path().join("client").join("state.json")).unwrap();
        assert_eq!(on_disk, before);
    }

    #[tokio::test]
    async fn tampered_payload_is_rejected() {
        let dir = TempDir::new().unwrap();
        let signer = SignatureService::new(SECRET).unwrap();
        let mut rules = antislot_core::ruleset::RuleSet {
            version: 5,
            updated_at: 1,
            entries: Vec::new(),
        };
        rules.upsert("bet365.com", "x", None, 1);
        let mut blocklist = BlocklistSnapshot::sign(&rules, &signer).unwrap();
        blocklist.domains.push("injected.com".into());
        let patterns = PatternsSnapshot::sign(
            &antislot_core::ruleset::PatternSet {
                version: 5,
                updated_at: 1,
                patterns: Vec::new(),
            },
            &signer,
        )
        .unwrap();

        let router = Router::new()
            .route("/v1/blocklist", get(move || async move { Json(blocklist) }))
            .route("/v1/patterns", get(move || async move { Json(patterns) }));
        let url = serve(router).await;

        let client = open_client(&url, &dir);
        assert!(matches!(
            client.sync().await,
            Err(SyncError::Integrity("blocklist signature mismatch"))
        ));
        assert!(client.current_ruleset().blocklist_version.is_none());
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let dir = TempDir::new().unwrap();
        let router = Router::new()
            .route("/v1/blocklist", get(|| async { Json(json!({"version": "one"})) }))
            .route("/v1/patterns", get(|| async { Json(json!({"patterns": []})) }));
        let url = serve(router).await;

        let client = open_client(&url, &dir);
        assert!(matches!(client.sync().await, Err(SyncError::Malformed(_))));
    }

    #[tokio::test]
    async fn error_status_is_http_error() {
        let dir = TempDir::new().unwrap();
        let url = serve(Router::new()).await;
        let client = open_client(&url, &dir);
        assert!(matches!(client.sync().await, Err(SyncError::Http(_))));
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let dir = TempDir::new().unwrap();
        let slow = || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({}))
        };
        let router = Router::new()
            .route("/v1/blocklist", get(slow))
            .route("/v1/patterns", get(slow));
        let url = serve(router).await;

        let client = RulesetClient::new(
            ClientConfig::new(&url)
                .with_hmac_secret(SECRET)
                .with_timeout(Duration::from_millis(200)),
        )
        .unwrap();
        assert!(matches!(client.sync().await, Err(SyncError::Timeout(_))));
    }

    #[tokio::test]
    async fn allow_list_wins_and_persists() {
        let dir = TempDir::new().unwrap();
        let (url, store) = spawn_server(&dir).await;
        store.blocklist.add_domain("bet365.com", "test", None).unwrap();

        let client = open_client(&url, &dir);
        client.sync().await.unwrap();
        assert!(client.add_allowed("https://www.bet365.com/").unwrap());
        assert!(!client.add_allowed("bet365.com").unwrap());
        assert!(matches!(
            client.check_domain("bet365.com"),
            Decision::AllowListed { .. }
        ));

        let reopened = open_client(&url, &dir);
        assert_eq!(reopened.current_ruleset().allow_list, vec!["bet365.com"]);
        assert!(!reopened.check_domain("bet365.com").is_blocked());

        assert!(reopened.remove_allowed("BET365.com").unwrap());
        assert!(!reopened.remove_allowed("bet365.com").unwrap());
        assert!(reopened.check_domain("bet365.com").is_blocked());
    }

    #[test]
    fn config_errors() {
        assert!(matches!(
            RulesetClient::new(ClientConfig::new("https://api.antislot.app")),
            Err(SyncError::MissingSecret)
        ));
        assert!(matches!(
            RulesetClient::new(ClientConfig::new("http://api.antislot.app").with_hmac_secret("k")),
            Err(SyncError::InsecureUrl(_))
        ));
        let client = RulesetClient::new(
            ClientConfig::new("localhost:3000")
                .with_hmac_secret("k")
                .with_allow_list(["Example.com"]),
        )
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:3000");
        assert_eq!(client.matcher().allow_list(), vec!["example.com"]);
    }
}

//! AntiSlot - gambling content blocking.
//!
//! The `antislot` binary runs the signed ruleset distribution server and
//! provides the out-of-band administration commands:
//! - `serve` for the read-only HTTP API
//! - blocklist and pattern maintenance (`add`, `remove`, `list`, `bump-version`, ...)
//! - the suggestion pipeline (`suggest`, `integrate`)
//! - local tools (`check`, `classify`, `sync`)

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use antislot_app::{admin, suggest, BumpTarget, Stats, SuggestionReport};
use antislot_client::{ClientConfig, DocumentSync, RulesetClient};
use antislot_core::classifier::{FilterSettings, SmsFilterService, SmsMessage};
use antislot_core::matcher::Decision;
use antislot_core::ruleset::{Pattern, PatternKind};
use antislot_core::suggestor::SuggestorConfig;
use antislot_server::{Server, ServerConfig, DEFAULT_HMAC_SECRET, DEFAULT_HOST, DEFAULT_PORT};
use antislot_storage::config::DEFAULT_DATA_DIR;
use antislot_storage::{RuleStore, StoreConfig};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// AntiSlot - gambling content blocking
#[derive(Parser, Debug)]
#[command(name = "antislot", version, about)]
struct Args {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Directory holding the ruleset files
    #[arg(long, global = true, env = "DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Blocklist file (defaults to <data-dir>/blocklist.json)
    #[arg(long, global = true, env = "BLOCKLIST_FILE")]
    blocklist_file: Option<PathBuf>,

    /// Patterns file (defaults to <data-dir>/patterns.json)
    #[arg(long, global = true, env = "PATTERNS_FILE")]
    patterns_file: Option<PathBuf>,

    /// Bump the ruleset version on every mutation
    #[arg(long, global = true, env = "AUTO_VERSION_BUMP", default_value_t = true, action = ArgAction::Set)]
    auto_version_bump: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the ruleset distribution API
    Serve {
        #[arg(long, env = "HOST", default_value = DEFAULT_HOST)]
        host: String,

        #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Secret used to sign snapshots
        #[arg(long, env = "HMAC_SECRET", default_value = DEFAULT_HMAC_SECRET, hide_env_values = true)]
        hmac_secret: String,
    },

    /// Add or update a blocked domain
    Add {
        domain: String,
        reason: Option<String>,
    },

    /// Remove a blocked domain
    Remove { domain: String },

    /// List blocked domains
    List,

    /// Increment ruleset versions
    BumpVersion {
        #[arg(value_enum, default_value_t = Target::Both)]
        target: Target,
    },

    /// Show ruleset versions and sizes
    Stats,

    /// Add a generic pattern
    AddPattern {
        pattern: String,

        /// exact, subdomain, contains or regex
        #[arg(long = "type", default_value = "contains")]
        kind: String,

        #[arg(long, default_value_t = 0.7)]
        weight: f64,
    },

    /// Remove a generic pattern
    RemovePattern {
        pattern: String,

        #[arg(long = "type", default_value = "contains")]
        kind: String,
    },

    /// Score observed domains and write suggestion reports next to the input
    Suggest {
        /// One domain per line; `#` starts a comment
        file: PathBuf,

        #[arg(long, default_value_t = 50)]
        min_confidence: u8,

        #[arg(long, default_value_t = 0.7)]
        similarity_threshold: f64,
    },

    /// Add high-confidence suggestions to the blocklist
    Integrate {
        /// A suggestions_output.json file
        file: PathBuf,

        #[arg(default_value_t = suggest::DEFAULT_INTEGRATE_CONFIDENCE)]
        min_confidence: u8,
    },

    /// Check domains or URLs against the stored rulesets
    Check {
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Allow-listed domain (repeatable)
        #[arg(long = "allow")]
        allow: Vec<String>,

        /// Print decisions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Classify an SMS message, or a JSON array of messages
    Classify {
        #[arg(required_unless_present = "file")]
        body: Option<String>,

        #[arg(long, default_value = "")]
        sender: String,

        /// JSON file with `[{"body": .., "sender": ..}]`
        #[arg(long, conflicts_with = "body")]
        file: Option<PathBuf>,

        /// Extra keyword treated as gambling (repeatable)
        #[arg(long = "keyword")]
        keywords: Vec<String>,

        #[arg(long)]
        strict: bool,
    },

    /// Fetch and verify the signed rulesets as a device would
    Sync {
        #[arg(long, env = "ANTISLOT_API_URL")]
        api_url: String,

        #[arg(long, env = "HMAC_SECRET", hide_env_values = true)]
        hmac_secret: Option<String>,

        /// Verified state file (defaults to <data-dir>/client-state.json)
        #[arg(long)]
        state_file: Option<PathBuf>,

        #[arg(long, default_value_t = 15)]
        timeout_secs: u64,

        /// Allow-listed domain (repeatable)
        #[arg(long = "allow")]
        allow: Vec<String>,

        /// Domains to check after syncing
        check: Vec<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Target {
    Blocklist,
    Patterns,
    Both,
}

impl From<Target> for BumpTarget {
    fn from(target: Target) -> Self {
        match target {
            Target::Blocklist => BumpTarget::Blocklist,
            Target::Patterns => BumpTarget::Patterns,
            Target::Both => BumpTarget::Both,
        }
    }
}

impl Args {
    fn store_config(&self) -> StoreConfig {
        let mut config =
            StoreConfig::in_dir(&self.data_dir).with_auto_version_bump(self.auto_version_bump);
        if let Some(path) = &self.blocklist_file {
            config = config.with_blocklist_file(path);
        }
        if let Some(path) = &self.patterns_file {
            config = config.with_patterns_file(path);
        }
        config
    }
}

/// Initialize logging. `serve` also logs to daily files under `<data-dir>/logs`.
fn init_logging(args: &Args) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_level = if args.debug { "debug" } else { &args.log_level };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("antislot={},warn", log_level)));

    if !matches!(args.command, Command::Serve { .. }) {
        // Command output goes to stdout; keep logs out of it.
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        return None;
    }

    let log_dir = args.data_dir.join("logs");
    if fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .max_log_files(5)
            .filename_prefix("antislot")
            .filename_suffix("log")
            .build(&log_dir)
            .ok();

        if let Some(appender) = file_appender {
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stdout))
                .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                .init();

            tracing::info!("Logging to {:?}", log_dir);
            return Some(guard);
        }
    }

    // Fallback: console logging only
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::warn!("File logging unavailable, using console only");
    None
}

fn parse_kind(kind: &str) -> anyhow::Result<PatternKind> {
    match PatternKind::parse(kind) {
        Some(kind) => Ok(kind),
        None => bail!("unknown pattern type '{kind}' (expected exact, subdomain, contains or regex)"),
    }
}

fn print_decision(input: &str, decision: &Decision) {
    match decision {
        Decision::Blocked { domain, stage, rule } => {
            println!("BLOCKED      {input} ({domain}) by {} rule {rule}", stage.name())
        }
        Decision::AllowListed { domain } => println!("ALLOWED      {input} ({domain}) allow-listed"),
        Decision::NotBlocked { domain } => println!("NOT BLOCKED  {input} ({domain})"),
    }
}

fn describe_sync(name: &str, sync: &DocumentSync) {
    match sync {
        DocumentSync::Updated { from: Some(from), to } => println!("{name}: v{from} -> v{to}"),
        DocumentSync::Updated { from: None, to } => println!("{name}: installed v{to}"),
        DocumentSync::Unchanged { held, offered } => {
            println!("{name}: kept v{held} (server offered v{offered})")
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(&args);

    let store_config = args.store_config();

    match &args.command {
        Command::Serve {
            host,
            port,
            hmac_secret,
        } => {
            let config = ServerConfig::default()
                .with_host(host.clone())
                .with_port(*port)
                .with_hmac_secret(hmac_secret.clone())
                .with_store(store_config);

            let server = Server::new(config).context("failed to start server")?;
            server.run().await?;
        }

        Command::Add { domain, reason } => {
            let store = open_store(&store_config)?;
            let created =
                store
                    .blocklist
                    .add_domain(domain, reason.as_deref().unwrap_or_default(), None)?;
            let version = store.blocklist.metadata()?.version;
            let verb = if created { "Added" } else { "Updated" };
            println!("{verb} {domain} (blocklist v{version})");
        }

        Command::Remove { domain } => {
            let store = open_store(&store_config)?;
            if store.blocklist.remove_domain(domain)? {
                let version = store.blocklist.metadata()?.version;
                println!("Removed {domain} (blocklist v{version})");
            } else {
                println!("{domain} is not in the blocklist");
            }
        }

        Command::List => {
            let store = open_store(&store_config)?;
            let rules = store.blocklist.load()?;
            println!("Blocklist v{} ({} domains)", rules.version, rules.entries.len());
            for domain in rules.domains() {
                if let Some(entry) = rules.entry(&domain) {
                    println!("  {domain}  [{}]", entry.reason);
                }
            }
        }

        Command::BumpVersion { target } => {
            let store = open_store(&store_config)?;
            for (name, version) in admin::bump_versions(&store, (*target).into())? {
                println!("{name} version bumped to {version}");
            }
        }

        Command::Stats => {
            let store = open_store(&store_config)?;
            println!("{}", Stats::collect(&store)?);
        }

        Command::AddPattern {
            pattern,
            kind,
            weight,
        } => {
            let store = open_store(&store_config)?;
            let pattern = Pattern::new(pattern.as_str(), parse_kind(kind)?, *weight);
            if pattern.pattern.is_empty() {
                bail!("pattern must not be empty");
            }
            let label = pattern.label();
            if store.patterns.add_pattern(pattern)? {
                println!("Added pattern {label}");
            } else {
                println!("Pattern {label} already exists");
            }
        }

        Command::RemovePattern { pattern, kind } => {
            let store = open_store(&store_config)?;
            let kind = parse_kind(kind)?;
            if store.patterns.remove_pattern(pattern, kind)? {
                println!("Removed pattern {kind}:{pattern}");
            } else {
                println!("Pattern {kind}:{pattern} not found");
            }
        }

        Command::Suggest {
            file,
            min_confidence,
            similarity_threshold,
        } => {
            let store = open_store(&store_config)?;
            let config = SuggestorConfig::default()
                .with_min_confidence(*min_confidence)
                .with_similarity_threshold(*similarity_threshold);
            let (report, files) = suggest::run_suggest(&store, file, config)?;
            print_report(&report);
            println!();
            println!("JSON report: {}", files.json.display());
            println!("CSV report:  {}", files.csv.display());
        }

        Command::Integrate {
            file,
            min_confidence,
        } => {
            let store = open_store(&store_config)?;
            let report = SuggestionReport::read(file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let summary = suggest::integrate(&store, &report.suggestions, *min_confidence);

            for domain in &summary.added {
                println!("Added:   {domain}");
            }
            for domain in &summary.updated {
                println!("Updated: {domain}");
            }
            for (domain, error) in &summary.failed {
                println!("Failed:  {domain}: {error}");
            }
            println!(
                "{} added, {} updated, {} failed, {} below {min_confidence}%",
                summary.added.len(),
                summary.updated.len(),
                summary.failed.len(),
                summary.below_threshold
            );
            let version = store.blocklist.metadata()?.version;
            println!("Blocklist v{version}, {} domains", store.blocklist.domains()?.len());
        }

        Command::Check {
            inputs,
            allow,
            json,
        } => {
            let store = open_store(&store_config)?;
            let decisions = admin::check_domains(&store, inputs.as_slice(), allow)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&decisions)?);
            } else {
                for (input, decision) in inputs.iter().zip(&decisions) {
                    print_decision(input, decision);
                }
            }
        }

        Command::Classify {
            body,
            sender,
            file,
            keywords,
            strict,
        } => {
            let messages = match (body, file) {
                (_, Some(path)) => read_messages(path)?,
                (Some(body), None) => vec![SmsMessage::new(body.as_str(), sender.as_str())],
                (None, None) => bail!("a message body or --file is required"),
            };

            let filter = SmsFilterService::new(FilterSettings {
                custom_keywords: keywords.clone(),
                strict_mode: *strict,
                ..FilterSettings::default()
            });
            let results = filter.classify_batch(&messages);
            println!("{}", serde_json::to_string_pretty(&results)?);

            let stats = filter.stats();
            eprintln!("{} flagged, {} allowed", stats.blocked, stats.allowed);
        }

        Command::Sync {
            api_url,
            hmac_secret,
            state_file,
            timeout_secs,
            allow,
            check,
        } => {
            let state_file = state_file
                .clone()
                .unwrap_or_else(|| args.data_dir.join("client-state.json"));
            let mut config = ClientConfig::new(api_url.as_str())
                .with_timeout(Duration::from_secs(*timeout_secs))
                .with_state_file(state_file)
                .with_allow_list(allow.iter().cloned());
            if let Some(secret) = hmac_secret {
                config = config.with_hmac_secret(secret.as_str());
            }

            let client = RulesetClient::new(config)?;
            let report = client.sync().await?;
            describe_sync("blocklist", &report.blocklist);
            describe_sync("patterns", &report.patterns);

            let state = client.current_ruleset();
            println!(
                "{} domains, {} patterns in force",
                state.domains.len(),
                state.patterns.len()
            );
            for input in check {
                print_decision(input, &client.check_domain(input));
            }
        }
    }

    Ok(())
}

fn open_store(config: &StoreConfig) -> anyhow::Result<RuleStore> {
    let store = RuleStore::open(config);
    store
        .initialize()
        .with_context(|| format!("failed to open rule store in {}", config.data_dir.display()))?;
    Ok(store)
}

fn read_messages(path: &Path) -> anyhow::Result<Vec<SmsMessage>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("{} is not a message list", path.display()))
}

fn print_report(report: &SuggestionReport) {
    let summary = &report.summary;
    println!("{}", "=".repeat(80));
    println!("DOMAIN SUGGESTIONS");
    println!("{}", "=".repeat(80));
    println!("Total analyzed:     {}", summary.total_analyzed);
    println!("Suggested:          {}", summary.suggested);
    println!("Average confidence: {}%", summary.average_confidence);
    println!("Minimum confidence: {}%", summary.min_confidence);
    println!();

    if report.suggestions.is_empty() {
        println!("No domains reached the confidence threshold");
        return;
    }

    for (i, s) in report.suggestions.iter().enumerate() {
        println!("{}. {} [{}%]", i + 1, s.domain, s.confidence);
        println!("   Reasons: {}", s.reasons.join("; "));
        if !s.matched_patterns.is_empty() {
            println!("   Patterns: {}", s.matched_patterns.join(", "));
        }
        let mut scores = Vec::new();
        if let Some(k) = s.keyword_score {
            scores.push(format!("keywords: {k:.2}"));
        }
        if let Some(sim) = s.similarity_score {
            scores.push(format!("similarity: {:.0}%", sim * 100.0));
        }
        if let Some(t) = s.trick_score {
            scores.push(format!("tricks: {:.0}%", t * 100.0));
        }
        if !scores.is_empty() {
            println!("   Scores: {}", scores.join(", "));
        }
    }
}

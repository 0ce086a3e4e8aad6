//! csearch: CipherSearch command-line client
//!
//! Client commands (need the passphrase):
//!   ingest <id> <file>           - encrypt a document and index its keywords
//!   search <keyword>... [--op and|or | --any] - exact keyword search
//!   fuzzy <keyword>              - n-gram threshold search, tolerant of typos
//!
//! Store commands (never touch keys):
//!   init                - create the session salt file
//!   delete <id>         - remove a document from every index
//!   clear               - empty the store
//!   stats               - document and token counts
//!   dump                - raw server view: ciphertext and tokens
//!   config show         - display current configuration
//!
//! `--audit` prints the store's audit trail for the invocation afterwards.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::SecretString;
use std::io::Read;
use std::path::{Path, PathBuf};

use cs_core::config::{validate_threshold, CsConfig};
use cs_core::{EncryptedRecord, SearchOp};
use cs_crypto::{generate_salt, Engine, KdfParams, KeywordExtractor};
use cs_index::Store;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "csearch",
    version,
    about = "CipherSearch encrypted document search",
    long_about = "csearch: encrypt documents client-side and search them by keyword \
                  without the store ever seeing plaintext"
)]
struct Cli {
    /// Path to csearch.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "CSEARCH_CONFIG",
        default_value = "~/.config/csearch/config.toml"
    )]
    config: PathBuf,

    /// Encrypted index snapshot (overrides store.path)
    #[arg(long, env = "CSEARCH_INDEX")]
    index: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error; overrides log.level)
    #[arg(long, env = "CSEARCH_LOG")]
    log: Option<String>,

    /// Log format (overrides log.format)
    #[arg(long, env = "CSEARCH_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Print the store's audit trail for this invocation after the command
    #[arg(long, global = true)]
    audit: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate the session salt (keys are derived from passphrase + salt)
    Init {
        /// Replace an existing salt file. Documents stored under the old
        /// salt become unsearchable and undecryptable.
        #[arg(long)]
        force: bool,
    },

    /// Encrypt and index a document
    Ingest {
        /// Document id (bound to the ciphertext as associated data)
        id: String,
        /// File holding the plaintext, or "-" for stdin
        file: PathBuf,
    },

    /// Exact keyword search
    Search {
        /// One or more keywords
        #[arg(required = true)]
        keywords: Vec<String>,
        /// Combine keywords with AND (all) or OR (any)
        #[arg(long, default_value = "and")]
        op: SearchOp,
        /// Shorthand for `--op or`
        #[arg(long, conflicts_with = "op")]
        any: bool,
    },

    /// Approximate search over n-gram tokens
    Fuzzy {
        keyword: String,
        /// Share of the query's n-grams a document must hold (0.0 - 1.0)
        #[arg(long, conflicts_with = "substring")]
        threshold: Option<f64>,
        /// Use the looser substring threshold from config
        #[arg(long)]
        substring: bool,
    },

    /// Remove a document and its index rows
    Delete { id: String },

    /// Remove every document and index row
    Clear,

    /// Show store counters
    Stats,

    /// Show exactly what the store holds (ciphertext and opaque tokens)
    Dump {
        /// Maximum token rows to print (overrides store.raw_token_limit)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = expand_tilde(&cli.config);
    // an existing file may carry the log section; a missing one is reported
    // by CsConfig::load once logging is up
    let file_config = if config_path.exists() {
        Some(load_config(&config_path)?)
    } else {
        None
    };

    let (level, format) = log_settings(&cli, file_config.as_ref());
    init_logging(&level, &format);

    let config = match file_config {
        Some(config) => config,
        None => load_config(&config_path)?,
    };

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "csearch starting"
    );

    let command = match cli.command {
        Commands::Config { action: ConfigAction::Show } => {
            return cmd_config_show(&config, &config_path)
        }
        Commands::Init { force } => return cmd_init(&config, force),
        command => command,
    };

    let index_path = cli
        .index
        .as_deref()
        .map(expand_tilde)
        .unwrap_or_else(|| expand_tilde(&config.store.path));
    let store = Store::open(&index_path)
        .with_context(|| format!("opening index: {}", index_path.display()))?;

    run(command, &config, &store)?;

    if cli.audit {
        print_audit(&store)?;
    }
    Ok(())
}

/// Commands that run against an open store.
fn run(command: Commands, config: &CsConfig, store: &Store) -> Result<()> {
    match command {
        Commands::Ingest { id, file } => cmd_ingest(config, store, &id, &file),
        Commands::Search { keywords, op, any } => {
            let op = if any { SearchOp::Or } else { op };
            cmd_search(config, store, &keywords, op)
        }
        Commands::Fuzzy { keyword, threshold, substring } => {
            cmd_fuzzy(config, store, &keyword, threshold, substring)
        }
        Commands::Delete { id } => cmd_delete(store, &id),
        Commands::Clear => cmd_clear(store),
        Commands::Stats => {
            cmd_stats(store);
            Ok(())
        }
        Commands::Dump { limit } => cmd_dump(store, limit.unwrap_or(config.store.raw_token_limit)),
        // no store needed; dispatched in main
        Commands::Init { .. } | Commands::Config { .. } => Ok(()),
    }
}

/// Log level and format: CLI flag, then the config file, then defaults.
fn log_settings(cli: &Cli, file_config: Option<&CsConfig>) -> (String, LogFormat) {
    let log = file_config.map(|c| c.log.clone()).unwrap_or_default();
    let level = cli.log.clone().unwrap_or(log.level);
    let format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| match log.format.as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        });
    (level, format)
}

fn load_config(path: &Path) -> Result<CsConfig> {
    CsConfig::load(path).with_context(|| format!("loading config: {}", path.display()))
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Session helpers ───────────────────────────────────────────────────────────

fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_default();
        PathBuf::from(format!("{home}/{rest}"))
    } else {
        path.to_path_buf()
    }
}

fn read_salt(path: &Path) -> Result<Vec<u8>> {
    let encoded = std::fs::read_to_string(path).with_context(|| {
        format!(
            "reading salt file {} (run `csearch init` first)",
            path.display()
        )
    })?;
    B64.decode(encoded.trim())
        .with_context(|| format!("decoding salt file: {}", path.display()))
}

/// Passphrase from CSEARCH_PASSPHRASE, else an interactive prompt.
fn read_passphrase() -> Result<SecretString> {
    if let Ok(pw) = std::env::var("CSEARCH_PASSPHRASE") {
        return Ok(SecretString::from(pw));
    }
    let pw = rpassword::prompt_password("csearch passphrase: ").context("reading passphrase")?;
    Ok(SecretString::from(pw))
}

/// Derive this session's keys from the passphrase and the stored salt.
fn open_engine(config: &CsConfig) -> Result<Engine> {
    let salt = read_salt(&expand_tilde(&config.kdf.salt_file))?;
    let passphrase = read_passphrase()?;
    let engine = Engine::new(&passphrase, Some(salt), &KdfParams::from(&config.kdf))
        .context("deriving session keys")?
        .with_extractor(KeywordExtractor::new(&config.keywords));
    Ok(engine)
}

// ── `csearch init` ────────────────────────────────────────────────────────────

fn cmd_init(config: &CsConfig, force: bool) -> Result<()> {
    let salt_path = expand_tilde(&config.kdf.salt_file);
    if salt_path.exists() && !force {
        anyhow::bail!(
            "salt file already exists: {} (use --force to replace it)",
            salt_path.display()
        );
    }
    if let Some(parent) = salt_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating salt dir: {}", parent.display()))?;
    }
    std::fs::write(&salt_path, B64.encode(generate_salt()))
        .with_context(|| format!("writing salt file: {}", salt_path.display()))?;

    tracing::info!(path = %salt_path.display(), "session salt written");
    println!("Salt written to {}", salt_path.display());
    Ok(())
}

// ── `csearch ingest` ──────────────────────────────────────────────────────────

fn cmd_ingest(config: &CsConfig, store: &Store, id: &str, file: &Path) -> Result<()> {
    let content = if file.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading document from stdin")?;
        buf
    } else {
        std::fs::read_to_string(file)
            .with_context(|| format!("reading document: {}", file.display()))?
    };

    let engine = open_engine(config)?;
    let request = engine
        .prepare_ingest(id, &content, config.search.ngram_size)
        .with_context(|| format!("encrypting document {id}"))?;
    store
        .ingest(&request)
        .with_context(|| format!("storing document {id}"))?;

    let ngrams: usize = request.ngram_sets.iter().map(|s| s.tokens.len()).sum();
    println!("Ingested {id}");
    println!("  keywords:       {}", request.document.tokens.len());
    println!("  n-gram tokens:  {ngrams}");
    Ok(())
}

// ── `csearch search` / `csearch fuzzy` ────────────────────────────────────────

fn cmd_search(config: &CsConfig, store: &Store, keywords: &[String], op: SearchOp) -> Result<()> {
    let engine = open_engine(config)?;
    let tokens = keywords
        .iter()
        .map(|k| engine.generate_token(k))
        .collect::<Result<Vec<_>, _>>()
        .context("generating search tokens")?;

    let results = if tokens.len() == 1 {
        store.search_token(&tokens[0])
    } else {
        store.search_multi(&tokens, op).context("searching index")?
    };
    print_results(&engine, &results);
    Ok(())
}

fn cmd_fuzzy(
    config: &CsConfig,
    store: &Store,
    keyword: &str,
    threshold: Option<f64>,
    substring: bool,
) -> Result<()> {
    let threshold = match (threshold, substring) {
        (Some(t), _) => t,
        (None, true) => config.search.substring_threshold,
        (None, false) => config.search.fuzzy_threshold,
    };
    validate_threshold(threshold).context("invalid --threshold")?;

    let engine = open_engine(config)?;
    let grams = engine
        .generate_ngram_tokens(keyword, config.search.ngram_size)
        .context("generating n-gram tokens")?;
    let results = store
        .search_fuzzy(&grams, threshold)
        .context("searching n-gram index")?;
    print_results(&engine, &results);
    Ok(())
}

fn print_results(engine: &Engine, results: &[EncryptedRecord]) {
    println!("{} result(s)", results.len());
    for record in results {
        match engine.decrypt_record(record) {
            Ok(text) => println!("  {:<12} {}", record.document_id, preview(&text, 72)),
            Err(e) => {
                tracing::warn!(document_id = %record.document_id, "decryption failed: {e}");
                println!("  {:<12} <unreadable: {e}>", record.document_id);
            }
        }
    }
}

// ── Store commands ────────────────────────────────────────────────────────────

fn cmd_delete(store: &Store, id: &str) -> Result<()> {
    if store.delete_document(id).context("deleting document")? {
        println!("Deleted {id}");
    } else {
        println!("No document {id}");
    }
    Ok(())
}

fn cmd_clear(store: &Store) -> Result<()> {
    store.clear_all().context("clearing index")?;
    println!("Index cleared");
    Ok(())
}

fn cmd_stats(store: &Store) {
    let stats = store.get_stats();
    if let Some(path) = store.path() {
        println!("Index:          {}", path.display());
    }
    println!("Documents:      {}", stats.documents);
    println!("Index entries:  {}", stats.index_entries);
    println!("Unique tokens:  {}", stats.unique_tokens);
    println!("Audit events:   {}", stats.audit_events);
}

fn cmd_dump(store: &Store, limit: usize) -> Result<()> {
    let dump = serde_json::json!({
        "documents": store.get_all_documents_raw(),
        "tokens": store.get_all_tokens_raw(limit),
    });
    let rendered = serde_json::to_string_pretty(&dump).context("rendering dump")?;
    println!("{rendered}");
    Ok(())
}

fn print_audit(store: &Store) -> Result<()> {
    println!();
    println!("# Audit trail");
    for entry in store.audit_log() {
        let rendered = serde_json::to_string(&entry).context("rendering audit entry")?;
        println!("{rendered}");
    }
    Ok(())
}

// ── `csearch config show` ─────────────────────────────────────────────────────

fn cmd_config_show(config: &CsConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

// ── Utilities ─────────────────────────────────────────────────────────────────

/// First `max` characters of `text` on one line.
fn preview(text: &str, max: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max).collect();
        format!("{cut}...")
    }
}

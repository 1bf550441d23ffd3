use std::fmt;

use linguify_core::model::{EntityId, EntityKind, EntityRef, Percentage};
use services::{ApiConfig, AppServices, Clock, ProgressUpdate, SubmitOutcome, SyncConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidNumber { flag: &'static str, raw: String },
    InvalidKind { raw: String },
    InvalidPercent { raw: String },
    InvalidDbUrl { raw: String },
    InvalidApiUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidKind { raw } => {
                write!(f, "invalid --kind value: {raw} (expected content, lesson or unit)")
            }
            ArgsError::InvalidPercent { raw } => write!(f, "invalid --percent value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidApiUrl { raw } => write!(f, "invalid --api value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_u64(flag: &'static str, raw: String) -> Result<u64, ArgsError> {
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  linguify-sync record --kind <content|lesson|unit> --id <n> --percent <0-100>");
    eprintln!("                       [--parent <n>] [--grandparent <n>] [--completed]");
    eprintln!("                       [--time <secs>] [--xp <n>] [--siblings <n>]");
    eprintln!("  linguify-sync status [--kind <k> --id <n>]");
    eprintln!("  linguify-sync replay");
    eprintln!("  linguify-sync watch");
    eprintln!();
    eprintln!("Common options:");
    eprintln!("  --db <sqlite_url>   default sqlite://linguify.sqlite3");
    eprintln!("  --api <base_url>    progress backend; unset keeps updates queued");
    eprintln!("  --lang <code>       language code sent with updates");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LINGUIFY_DB_URL, LINGUIFY_API_BASE_URL, LINGUIFY_API_TOKEN, LINGUIFY_LANGUAGE,");
    eprintln!("  LINGUIFY_MAX_RETRIES, LINGUIFY_STARTUP_DELAY_SECS, LINGUIFY_REPLAY_INTERVAL_SECS,");
    eprintln!("  RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Record,
    Status,
    Replay,
    Watch,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "record" => Some(Self::Record),
            "status" => Some(Self::Status),
            "replay" => Some(Self::Replay),
            "watch" => Some(Self::Watch),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct RecordArgs {
    kind: Option<EntityKind>,
    id: Option<u64>,
    parent: Option<u64>,
    grandparent: Option<u64>,
    percent: Option<Percentage>,
    completed: bool,
    time_spent: u64,
    xp: Option<u32>,
    siblings: Option<usize>,
}

impl RecordArgs {
    fn entity(&self) -> Result<EntityRef, ArgsError> {
        let kind = self.kind.ok_or(ArgsError::MissingFlag { flag: "--kind" })?;
        let id = self.id.ok_or(ArgsError::MissingFlag { flag: "--id" })?;
        Ok(EntityRef::new(kind, EntityId::new(id)))
    }

    fn into_update(self) -> Result<ProgressUpdate, ArgsError> {
        let entity = self.entity()?;
        let percent = self
            .percent
            .ok_or(ArgsError::MissingFlag { flag: "--percent" })?;
        let mut update = ProgressUpdate::new(entity, percent, self.completed)
            .with_time_spent(self.time_spent);
        update.parent_id = self.parent.map(EntityId::new);
        update.grandparent_id = self.grandparent.map(EntityId::new);
        update.xp_earned = self.xp;
        update.expected_siblings = self.siblings;
        Ok(update)
    }
}

struct Args {
    db_url: String,
    api_url: Option<String>,
    language: Option<String>,
    record: RecordArgs,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("LINGUIFY_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://linguify.sqlite3".into(), normalize_sqlite_url);
        let mut api_url = None;
        let mut language = None;
        let mut record = RecordArgs::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--api" => {
                    let value = require_value(args, "--api")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidApiUrl { raw: value });
                    }
                    api_url = Some(value);
                }
                "--lang" => language = Some(require_value(args, "--lang")?),
                "--kind" => {
                    let value = require_value(args, "--kind")?;
                    let kind = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidKind { raw: value.clone() })?;
                    record.kind = Some(kind);
                }
                "--id" => record.id = Some(parse_u64("--id", require_value(args, "--id")?)?),
                "--parent" => {
                    record.parent = Some(parse_u64("--parent", require_value(args, "--parent")?)?);
                }
                "--grandparent" => {
                    let value = require_value(args, "--grandparent")?;
                    record.grandparent = Some(parse_u64("--grandparent", value)?);
                }
                "--percent" => {
                    let value = require_value(args, "--percent")?;
                    let percent = value
                        .trim()
                        .parse::<u32>()
                        .ok()
                        .and_then(|p| Percentage::new(p).ok())
                        .ok_or(ArgsError::InvalidPercent { raw: value.clone() })?;
                    record.percent = Some(percent);
                }
                "--completed" => record.completed = true,
                "--time" => record.time_spent = parse_u64("--time", require_value(args, "--time")?)?,
                "--xp" => {
                    let value = require_value(args, "--xp")?;
                    let xp = parse_u64("--xp", value.clone())?;
                    record.xp =
                        Some(u32::try_from(xp).map_err(|_| ArgsError::InvalidNumber { flag: "--xp", raw: value })?);
                }
                "--siblings" => {
                    let value = require_value(args, "--siblings")?;
                    let count = parse_u64("--siblings", value.clone())?;
                    record.siblings = Some(
                        usize::try_from(count)
                            .map_err(|_| ArgsError::InvalidNumber { flag: "--siblings", raw: value })?,
                    );
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            api_url,
            language,
            record,
        })
    }

    fn sync_config(&self) -> Result<SyncConfig, Box<dyn std::error::Error>> {
        let mut config = SyncConfig::from_env()?;
        if let Some(raw) = &self.api_url {
            let base_url = raw
                .trim()
                .parse()
                .map_err(|_| ArgsError::InvalidApiUrl { raw: raw.clone() })?;
            let token = config.api.as_ref().and_then(|api| api.token.clone());
            let mut api = ApiConfig::new(base_url);
            api.token = token;
            config.api = Some(api);
        }
        if let Some(lang) = &self.language {
            config.language_code = lang.trim().to_string();
        }
        Ok(config)
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn describe(outcome: &SubmitOutcome) -> String {
    match outcome {
        SubmitOutcome::Synced { attempts } => format!("synced after {attempts} attempt(s)"),
        SubmitOutcome::Queued { request_id, reason } => {
            format!("queued as {request_id}: {reason}")
        }
        SubmitOutcome::Discarded(err) => format!("not sent: {err}"),
        SubmitOutcome::LocalOnly => "stored locally only".to_string(),
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None | Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let mut iter = argv.into_iter().skip(1);
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite in the binary glue so services stay storage-agnostic.
    prepare_sqlite_file(&parsed.db_url)?;
    let config = parsed.sync_config()?;
    let services = AppServices::new_sqlite(&parsed.db_url, config, Clock::default_clock()).await?;
    info!(db = %parsed.db_url, api = services.config().api.is_some(), "linguify-sync ready");

    match cmd {
        Command::Record => {
            let update = parsed.record.into_update()?;
            let outcome = services.progress().record_progress(update).await;
            for snapshot in &outcome.update.written {
                println!(
                    "{} {}%{}",
                    snapshot.entity,
                    snapshot.completion_percentage.value(),
                    if snapshot.is_completed { " completed" } else { "" }
                );
            }
            println!("{}", describe(&outcome.sync));
        }
        Command::Status => {
            if parsed.record.kind.is_some() || parsed.record.id.is_some() {
                let entity = parsed.record.entity()?;
                match services.progress().snapshot(entity).await {
                    Some(snapshot) => {
                        println!(
                            "{} {}% completed={} parent={}",
                            snapshot.entity,
                            snapshot.completion_percentage.value(),
                            snapshot.is_completed,
                            snapshot
                                .parent_id
                                .map_or_else(|| "-".to_string(), |id| id.to_string())
                        );
                        if let Some(fault) = &snapshot.error {
                            println!("last sync failed: {}", fault.message);
                        }
                    }
                    None => println!("{entity}: no local progress"),
                }
            }
            let counts = services.progress().pending_counts().await;
            println!(
                "pending: {} content, {} lesson",
                counts.content, counts.lesson
            );
        }
        Command::Replay => {
            let report = services.sync_queue().replay_now().await;
            println!(
                "replayed {}: {} synced, {} requeued, {} dropped",
                report.attempted, report.synced, report.requeued, report.dropped
            );
        }
        Command::Watch => {
            let queue = services.sync_queue();
            queue.start();
            tokio::signal::ctrl_c().await?;
            queue.stop().await;
        }
    }
    Ok(())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

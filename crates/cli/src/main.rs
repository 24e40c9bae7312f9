//! Binary entry point for the subtitle editor tools.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use cuesync_core::config::Config;
use cuesync_core::playback::{DisplayChange, Synchronizer};
use cuesync_core::remote::{HttpApi, LocalApi, SubtitleApi};
use cuesync_core::srt;
use cuesync_core::store::{CueIssue, CueStore};
use cuesync_core::version::{FsStorage, SaveRequest, SqliteLedger, SubtitleKey, VersionStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command line options for the binary.
#[derive(Parser)]
struct Cli {
    /// Enable verbose debug and trace logs.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse an SRT file and report timing problems.
    Check { input: PathBuf },
    /// Play an SRT file against a simulated clock and print overlay changes.
    Preview {
        input: PathBuf,
        /// Clock resolution in milliseconds.
        #[arg(long, default_value_t = 100)]
        step_ms: u64,
    },
    /// Store an SRT file as the next revision of a video.
    Save {
        #[command(flatten)]
        target: Target,
        /// Address recorded as the submitter.
        #[arg(long)]
        ip: String,
        input: PathBuf,
    },
    /// Print the current subtitle of a video.
    Fetch {
        #[command(flatten)]
        target: Target,
    },
    /// List the saved revisions of a video.
    History { id: String },
}

#[derive(Args)]
struct Target {
    #[arg(long)]
    id: String,
    #[arg(long)]
    platform: Option<String>,
    #[arg(long)]
    lang: Option<String>,
    /// Remote editor API; defaults to CUESYNC_API_URL, else the local store.
    #[arg(long)]
    api: Option<String>,
}

impl Target {
    fn key(&self, cfg: &Config) -> SubtitleKey {
        SubtitleKey::new(
            self.platform.clone().unwrap_or_else(|| cfg.platform.clone()),
            self.id.clone(),
            self.lang.clone().unwrap_or_else(|| cfg.lang.clone()),
        )
    }
}

/// Application entry point which parses CLI args and performs actions.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter = if cli.debug {
        EnvFilter::default()
            .add_directive("cuesync=trace".parse()?)
            .add_directive("cuesync_core=trace".parse()?)
            .add_directive("info".parse()?)
    } else {
        EnvFilter::default()
            .add_directive("cuesync=info".parse()?)
            .add_directive("cuesync_core=info".parse()?)
            .add_directive("warn".parse()?)
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let mut cfg = Config::from_env()?;

    match cli.command {
        Command::Check { input } => check(&input),
        Command::Preview { input, step_ms } => preview(&input, step_ms),
        Command::Save { target, ip, input } => {
            cfg.api_url = target.api.clone().or(cfg.api_url);
            let key = target.key(&cfg);
            let subtitle = read_srt(&input)?;
            let request = SaveRequest {
                key,
                submitter_ip: ip,
                subtitle,
            };
            let api = open_api(&cfg)?;
            let revision = api.save(request).await?;
            println!("{revision}");
            Ok(())
        }
        Command::Fetch { target } => {
            cfg.api_url = target.api.clone().or(cfg.api_url);
            let key = target.key(&cfg);
            let api = open_api(&cfg)?;
            match api.fetch(&key).await? {
                Some(text) => print!("{text}"),
                None => bail!("no subtitle stored for {}/{}", key.video_id, key.lang),
            }
            Ok(())
        }
        Command::History { id } => {
            let store = local_store(&cfg)?;
            for entry in store.history(&id)? {
                println!(
                    "r{}\t{}\t{}\t{}",
                    entry.version,
                    entry.submitted_at.format("%Y-%m-%d %H:%M:%S"),
                    entry.lang,
                    entry.submitter_ip
                );
            }
            Ok(())
        }
    }
}

fn local_store(cfg: &Config) -> Result<VersionStore<SqliteLedger, FsStorage>> {
    let ledger = SqliteLedger::open(&cfg.ledger_path)
        .map_err(|err| anyhow::anyhow!(err))
        .with_context(|| format!("opening ledger {}", cfg.ledger_path.display()))?;
    Ok(VersionStore::new(ledger, FsStorage::new(&cfg.data_dir)))
}

fn open_api(cfg: &Config) -> Result<Box<dyn SubtitleApi>> {
    match &cfg.api_url {
        Some(url) => {
            info!("using remote api {url}");
            Ok(Box::new(HttpApi::new(url, cfg.request_timeout)?))
        }
        None => Ok(Box::new(LocalApi::new(Arc::new(local_store(cfg)?)))),
    }
}

/// Read and validate an SRT file, returning it normalized.
fn read_srt(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let cues = srt::parse(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(srt::serialize(&cues))
}

fn check(path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let store = CueStore::from(srt::parse(&text)?);
    let issues = store.issues();
    info!("{} cues, {} issues", store.len(), issues.len());
    for issue in &issues {
        match issue {
            CueIssue::Inverted(i) => println!("cue {}: ends before it starts", i + 1),
            CueIssue::Overlap(a, b) => println!("cues {} and {} overlap", a + 1, b + 1),
            CueIssue::OutOfOrder(i) => println!("cue {}: starts before the previous cue", i + 1),
        }
    }
    if !issues.is_empty() {
        bail!("{} timing issues found", issues.len());
    }
    Ok(())
}

fn preview(path: &Path, step_ms: u64) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let store = CueStore::from(srt::parse(&text)?);
    let end = store.iter().map(|c| c.end).max().unwrap_or_default();
    let step = Duration::from_millis(step_ms.max(1));
    let mut sync = Synchronizer::new();
    sync.loaded(end);
    let mut now = Duration::ZERO;
    while now <= end + step {
        match sync.tick(now, &store).display {
            Some(DisplayChange::Show(text)) => {
                println!("{}\tshow\t{}", srt::format_time(now), text.replace('\n', " / "))
            }
            Some(DisplayChange::Hide) => println!("{}\thide", srt::format_time(now)),
            None => {}
        }
        now += step;
    }
    Ok(())
}

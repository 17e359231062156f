//! `mailkeep` - back up a Gmail mailbox and restore it elsewhere.
//!
//! Thin command line over `mailkeep-core`: settings loading, credentials,
//! logging and Ctrl-C handling.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mailkeep_core::{
    Archive, ArchiveOptions, Credential, ErrorReport, GmailRemote, NoRefresh, RestoreEngine,
    RestoreRequest, RetryPolicy, SearchFilter, Settings, Shard, StopSignal, SyncEngine,
    SyncRequest, TlsConnector, TokenRefresher,
};
use mailkeep_oauth::{OAuthClient, Provider, Token};

#[derive(Parser)]
#[command(name = "mailkeep", version, about = "Back up a Gmail mailbox and restore it elsewhere")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Archive a mailbox
    Sync {
        /// Gmail address to back up
        email: String,
        /// Archive directory
        #[arg(long, value_name = "DIR")]
        db: Option<PathBuf>,
        /// Which messages to look at
        #[arg(long = "type", value_enum, default_value_t = SyncType::Full)]
        kind: SyncType,
        /// Gmail search query for a custom sync
        #[arg(long, value_name = "QUERY")]
        gmail_req: Option<String>,
        /// IMAP search criteria for a custom sync
        #[arg(long, value_name = "QUERY")]
        imap_req: Option<String>,
        /// Gzip bodies of a new archive
        #[arg(long)]
        compress: bool,
        /// Encrypt bodies of a new archive
        #[arg(long)]
        encrypt: bool,
        /// Keep local records that are gone remotely
        #[arg(long)]
        no_delete: bool,
        /// Delete even with a filtered search
        #[arg(long, conflicts_with = "no_delete")]
        force_delete: bool,
        /// Also archive chats
        #[arg(long)]
        chats: bool,
    },
    /// Push an archive into a mailbox
    Restore {
        /// Gmail address to restore into
        email: String,
        /// Archive directory
        #[arg(long, value_name = "DIR")]
        db: Option<PathBuf>,
        /// Restore only from this month on
        #[arg(long, value_name = "YYYY-MM")]
        pivot: Option<String>,
        /// Extra label for every restored message
        #[arg(long = "label", value_name = "LABEL")]
        labels: Vec<String>,
        /// Continue after the last checkpoint
        #[arg(long)]
        resume: bool,
        /// Also restore chats
        #[arg(long)]
        chats: bool,
    },
    /// Print archive statistics
    Check {
        /// Archive directory
        db: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SyncType {
    /// Every message
    Full,
    /// The last few days
    Quick,
    /// A search query
    Custom,
}

/// Renewal source for bearer tokens.
enum Refresher {
    Fixed,
    OAuth(OAuthClient),
}

impl TokenRefresher for Refresher {
    async fn refresh(&self, email: &str, current: &Token) -> mailkeep_core::Result<Token> {
        match self {
            Self::Fixed => NoRefresh.refresh(email, current).await,
            Self::OAuth(client) => client.refresh(email, current).await,
        }
    }
}

type Remote = GmailRemote<TlsConnector, Refresher>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // reqwest and the IMAP client both pull rustls; pick one provider.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let settings = load_settings().await?;
    let stop = StopSignal::new();
    tokio::spawn({
        let stop = stop.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping after the current message");
                stop.stop();
            }
        }
    });

    match cli.command {
        Commands::Sync {
            email,
            db,
            kind,
            gmail_req,
            imap_req,
            compress,
            encrypt,
            no_delete,
            force_delete,
            chats,
        } => {
            let mut request = match (kind, gmail_req, imap_req) {
                (_, Some(query), _) => SyncRequest {
                    filter: SearchFilter::GmailRaw(query),
                    ..SyncRequest::default()
                },
                (_, None, Some(query)) => SyncRequest {
                    filter: SearchFilter::Imap(query),
                    ..SyncRequest::default()
                },
                (SyncType::Quick, None, None) => {
                    SyncRequest::quick(chrono::Local::now().date_naive(), settings.quick_days)
                }
                (SyncType::Full, None, None) => SyncRequest::default(),
                (SyncType::Custom, None, None) => {
                    bail!("--type custom needs --gmail-req or --imap-req")
                }
            };
            request.compress = compress;
            request.encrypt = encrypt;
            request.delete_enabled = !no_delete;
            request.force_delete = force_delete;
            request.include_chats = chats;

            sync(&email, &archive_dir(db), &settings, &request, stop).await
        }
        Commands::Restore {
            email,
            db,
            pivot,
            labels,
            resume,
            chats,
        } => {
            let pivot = pivot.as_deref().map(Shard::parse).transpose()?;
            let request = RestoreRequest {
                pivot,
                extra_labels: labels,
                resume,
                include_chats: chats,
            };
            restore(&email, &archive_dir(db), &settings, &request, stop).await
        }
        Commands::Check { db } => check(&db, &settings).await,
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "mailkeep=info,mailkeep_core=info,mailkeep_imap=warn",
        1 => "mailkeep=debug,mailkeep_core=debug,mailkeep_imap=info",
        _ => "mailkeep=trace,mailkeep_core=trace,mailkeep_imap=trace,mailkeep_oauth=debug",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailkeep")
}

fn archive_dir(db: Option<PathBuf>) -> PathBuf {
    db.unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mailkeep-db")
    })
}

/// Loads `settings.json` from the config directory, or the defaults.
async fn load_settings() -> Result<Settings> {
    let path = config_dir().join("settings.json");
    if !path.exists() {
        return Ok(Settings::default());
    }

    let contents = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let settings = Settings::from_json(&contents)
        .with_context(|| format!("parsing {}", path.display()))?;
    info!(path = %path.display(), "settings loaded");
    Ok(settings)
}

/// A password from `MAILKEEP_PASSWORD`, or the saved OAuth token.
async fn credential(email: &str, settings: &Settings) -> Result<(Credential, Refresher)> {
    if let Ok(password) = std::env::var("MAILKEEP_PASSWORD") {
        return Ok((Credential::Password(password), Refresher::Fixed));
    }

    let path = config_dir().join(format!("{email}.oauth2"));
    let contents = tokio::fs::read_to_string(&path).await.with_context(|| {
        format!(
            "no MAILKEEP_PASSWORD set and no token at {}",
            path.display()
        )
    })?;
    let token: Token = serde_json::from_str(&contents)
        .with_context(|| format!("parsing token {}", path.display()))?;

    let refresher = match &settings.oauth_client_id {
        Some(client_id) => {
            let mut client = OAuthClient::new(client_id.clone(), Provider::google()?);
            if let Some(secret) = &settings.oauth_client_secret {
                client = client.with_client_secret(secret.clone());
            }
            Refresher::OAuth(client)
        }
        None => {
            warn!("no oauth_client_id configured, the token cannot be renewed");
            Refresher::Fixed
        }
    };
    Ok((Credential::Bearer(token), refresher))
}

async fn connect(email: &str, settings: &Settings) -> Result<Remote> {
    let (credential, refresher) = credential(email, settings).await?;
    info!(email, host = %settings.host, "connecting");
    GmailRemote::connect(
        TlsConnector::new(settings.imap_config()),
        email,
        credential,
        refresher,
        RetryPolicy::from_settings(settings),
    )
    .await
    .map_err(explain)
}

async fn sync(
    email: &str,
    db: &Path,
    settings: &Settings,
    request: &SyncRequest,
    stop: StopSignal,
) -> Result<()> {
    let mut archive = Archive::open(db, ArchiveOptions::from(settings))
        .await
        .map_err(explain)?;
    let mut remote = connect(email, settings).await?;

    let outcome = SyncEngine::new(&mut remote, &mut archive, settings)
        .with_stop_signal(stop)
        .run(request)
        .await
        .map_err(explain)?;
    logout(remote).await;

    println!(
        "{} created, {} updated, {} unchanged, {} deleted",
        outcome.created, outcome.updated, outcome.unchanged, outcome.deleted
    );
    print_report(&outcome.report)?;
    if outcome.interrupted {
        println!("Stopped early; the next sync picks up where this one left off.");
    }
    Ok(())
}

async fn restore(
    email: &str,
    db: &Path,
    settings: &Settings,
    request: &RestoreRequest,
    stop: StopSignal,
) -> Result<()> {
    if !db.exists() {
        bail!("no archive at {}", db.display());
    }
    let mut archive = Archive::open(db, ArchiveOptions::from(settings))
        .await
        .map_err(explain)?;
    let mut remote = connect(email, settings).await?;

    let outcome = RestoreEngine::new(&mut remote, &mut archive, settings)
        .with_stop_signal(stop)
        .run(request)
        .await
        .map_err(explain)?;
    logout(remote).await;

    println!("{} restored, {} skipped", outcome.restored, outcome.skipped);
    print_report(&outcome.report)?;
    if outcome.interrupted {
        println!("Stopped early; run again with --resume to continue.");
    }
    Ok(())
}

async fn check(db: &Path, settings: &Settings) -> Result<()> {
    if !db.exists() {
        bail!("no archive at {}", db.display());
    }
    let archive = Archive::open(db, ArchiveOptions::from(settings))
        .await
        .map_err(explain)?;
    let stats = archive.stats().await.map_err(explain)?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

async fn logout(remote: Remote) {
    if let Err(err) = remote.logout().await {
        warn!(error = %err, "logout failed");
    }
}

fn print_report(report: &ErrorReport) -> Result<()> {
    println!("{}", report.summary());
    if !report.is_clean() {
        println!("{}", serde_json::to_string_pretty(report)?);
    }
    Ok(())
}

/// Adds a hint telling bad credentials apart from network trouble.
fn explain(err: mailkeep_core::Error) -> anyhow::Error {
    if err.is_auth() {
        anyhow!(err).context("the server rejected the credentials; check the password or renew the token")
    } else if err.is_transient() {
        anyhow!(err).context("network problem talking to the server; run again to continue")
    } else {
        anyhow!(err)
    }
}

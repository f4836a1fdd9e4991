use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod digest;
mod pacing_check;
mod verify;

#[derive(Debug, Parser)]
#[command(name = "adpulse_worker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch the settled day's metrics, store them and emit recommendations.
    Digest {
        #[arg(long)]
        client: String,

        #[arg(long)]
        platform: String,

        /// Report date (YYYY-MM-DD). Defaults to the last settled day.
        #[arg(long)]
        date: Option<String>,

        /// Do everything except writing to the database.
        #[arg(long)]
        dry_run: bool,
    },

    /// Reconcile recent predictions against realized metrics.
    Verify {
        #[arg(long)]
        client: String,

        /// Anchor date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<String>,
    },

    /// Check live spend pace and emit budget alerts.
    Pacing {
        #[arg(long)]
        client: String,

        #[arg(long)]
        platform: String,

        /// Keep checking on an interval instead of exiting after one pass.
        #[arg(long)]
        watch: bool,

        #[arg(long, default_value_t = 60)]
        interval_minutes: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = adpulse_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let cfg = adpulse_core::config::EngineConfig::from_env();

    let db_url = settings.require_database_url()?;
    let pool = adpulse_core::storage::connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;
    adpulse_core::storage::migrate(&pool).await?;

    let result = match args.command {
        Command::Digest {
            client,
            platform,
            date,
            dry_run,
        } => digest::run(&pool, &settings, &cfg, &client, &platform, date.as_deref(), dry_run).await,
        Command::Verify { client, date } => verify::run(&pool, &cfg, &client, date.as_deref()).await,
        Command::Pacing {
            client,
            platform,
            watch,
            interval_minutes,
        } => {
            pacing_check::run(&settings, &cfg, &client, &platform, watch, interval_minutes).await
        }
    };

    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
    }
    result
}

fn init_sentry(settings: &adpulse_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

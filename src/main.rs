mod app;
mod components;
mod draw;
mod input;
mod page;
mod state;

use crate::app::App;
use crate::state::app_settings::AppSettings;
use anyhow::anyhow;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if handle_cli_args() {
        return Ok(());
    }

    better_panic::install();

    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let settings = AppSettings::load().map_err(|e| anyhow!("{e:#}\n\n{}", usage_text()))?;
    App::new(settings).run().await
}

fn handle_cli_args() -> bool {
    let mut args = std::env::args().skip(1);
    let Some(arg) = args.next() else {
        return false;
    };

    match arg.as_str() {
        "-h" | "--help" => {
            println!("{}", usage_text());
            true
        }
        "-V" | "--version" => {
            println!("livescore {}", env!("CARGO_PKG_VERSION"));
            true
        }
        _ => {
            eprintln!("Unknown argument: {arg}\n\n{}", usage_text());
            std::process::exit(2);
        }
    }
}

fn usage_text() -> &'static str {
    "livescore - keep a match page's scores current

Usage:
  livescore
  livescore --help
  livescore --version

Commands on stdin:
  visible | hidden       page visibility
  online | offline       connectivity
  refresh                refresh now
  quit                   tear down and exit (Ctrl-C does the same)

Environment:
  LIVESCORE_PAGE                 HTML page to update (required)
  LIVESCORE_OUTPUT               Where to write the updated page (default LIVESCORE_PAGE)
  LIVESCORE_API_URL              Batched endpoint (default https://watchasports.com/stream.php)
  LIVESCORE_LIVE_URL             Live feed; with LIVESCORE_SCHEDULED_URL selects split fetching
  LIVESCORE_SCHEDULED_URL        Scheduled feed
  LIVESCORE_COMPETITION          competition query parameter (default PL)
  LIVESCORE_TIMEZONE             timezone query parameter (default Asia/Kolkata)
  LIVESCORE_STORE                Fallback store file (default livescore-fallback.json)
  LIVESCORE_LIVE_INTERVAL_SECS   Poll interval while a match is live (default 10)
  LIVESCORE_IDLE_INTERVAL_SECS   Poll interval otherwise (default 30)
  LIVESCORE_MAX_BACKOFF_SECS     Backoff ceiling (default 300)
  LIVESCORE_TIMEOUT_SECS         Request timeout (default 15)
  LIVESCORE_MAX_RETRIES          Failures before showing connection errors (default 3)
  LIVESCORE_CLOCK                24h or 12h kickoff times (default 24h)
  LIVESCORE_UTC_OFFSET           Fixed viewer offset such as +05:30 (default system zone)
  LIVESCORE_STALE_AFTER_SECS     Stop serving cached scores older than this (default never)
  RUST_LOG                       Log filter (default info)"
}

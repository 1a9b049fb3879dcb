use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use webshim::{ShimConfig, WebShim};

fn main() {
    let subscriber_result = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .try_init();
    if subscriber_result.is_err() {
        // tracing was already initialised; continue silently
    }

    let Some(script_path) = std::env::args().nth(1).map(PathBuf::from) else {
        eprintln!("usage: webshim <script.js> [timeout-ms]");
        std::process::exit(2);
    };
    let limit = std::env::args()
        .nth(2)
        .and_then(|raw| raw.parse::<u64>().ok())
        .map(Duration::from_millis);

    let config_path = std::env::var("WEBSHIM_CONFIG").ok().map(PathBuf::from);
    let config = ShimConfig::load(config_path).unwrap_or_else(|err| {
        eprintln!("Failed to load configuration: {err}. Using defaults.");
        ShimConfig::default()
    });

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
    {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("Failed to start runtime: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = rt.block_on(run(&script_path, &config, limit)) {
        error!("{err:#}");
        std::process::exit(1);
    }
}

async fn run(script_path: &Path, config: &ShimConfig, limit: Option<Duration>) -> Result<()> {
    let source = std::fs::read_to_string(script_path)
        .with_context(|| format!("failed to read {}", script_path.display()))?;

    let shim = WebShim::new(config)?;
    shim.eval(&source, &script_path.display().to_string())?;

    let drained = shim.run_until_idle(limit).await?;
    if !drained {
        info!("timeout reached with timers still pending");
    }
    shim.shutdown()
}

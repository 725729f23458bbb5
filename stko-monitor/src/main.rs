use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use stko_monitor::{Monitor, MonitorConfig, Snapshot};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "stko-monitor", about = "Follow the progress files of a running OpenSees analysis")]
struct Cli {
    /// Directory the solver writes its monitor files into
    dir: Option<PathBuf>,
    /// Poll interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,
    /// Print every snapshot with updates as a JSON line on stdout
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stko_monitor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = MonitorConfig::from_env();
    if let Some(dir) = cli.dir {
        config.dir = dir;
    }
    if let Some(ms) = cli.interval_ms.filter(|ms| *ms > 0) {
        config.interval = Duration::from_millis(ms);
    }

    tracing::info!("Monitoring {} every {:?}", config.dir.display(), config.interval);
    let mut monitor = Monitor::new(&config.dir);
    let mut interval = tokio::time::interval(config.interval);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let snapshot = monitor.tick();
                if !snapshot.has_updates() {
                    continue;
                }
                report(&snapshot);
                if cli.json {
                    println!("{}", serde_json::to_string(&snapshot)?);
                }
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("Stopping monitor");
                break;
            }
        }
    }
    Ok(())
}

fn report(snapshot: &Snapshot) {
    let elapsed = snapshot
        .elapsed
        .map(|e| e.to_string())
        .unwrap_or_else(|| "-".to_string());

    if let Some(row) = &snapshot.latest {
        tracing::info!(
            "[{}] stage {} step {} time {} dT {} iterations {} norm {:e} ({:.1}%)",
            elapsed,
            row.stage_id,
            row.step_id,
            row.time,
            row.dt,
            row.iterations,
            row.norm,
            row.percent
        );
    }
    for plot in snapshot.plots.iter().filter(|p| p.new_rows > 0) {
        tracing::info!("  {}: +{} rows ({} total)", plot.name, plot.new_rows, plot.total_rows);
    }
}

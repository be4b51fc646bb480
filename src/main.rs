use anyhow::Result;
use cooling_dispatch::repo::{JsonFileSink, RunSink};
use cooling_dispatch::runner::{join_optimization, spawn_optimization, RunRequest};
use cooling_dispatch::scenario::FeedSet;
use cooling_dispatch::{config, telemetry};
use config::Config;
use telemetry::init_tracing;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = Config::load()?;
    let run_name = std::env::args()
        .nth(1)
        .unwrap_or_else(|| format!("{}-{}", cfg.site.station, chrono::Utc::now().format("%Y%m%dT%H%M")));

    info!(
        station = %cfg.site.station,
        hours = cfg.horizon.hours,
        strategy = ?cfg.solver.strategy,
        "starting cooling dispatch run"
    );

    let feeds = FeedSet::builtin(&cfg);
    let sink = JsonFileSink::new(&cfg.output.dir);
    let cancel = CancellationToken::new();
    let watcher = telemetry::cancel_on_shutdown(cancel.clone());

    let handle = spawn_optimization(RunRequest::new(run_name, cfg), feeds, cancel.clone());
    let summary = join_optimization(handle).await?;
    cancel.cancel();
    let _ = watcher.await;

    if !summary.optimization_status.is_success() {
        warn!(
            status = %summary.optimization_status,
            message = summary.message.as_deref().unwrap_or(""),
            "optimization did not produce a plan"
        );
    }

    sink.persist(&summary).await?;
    println!("{}", serde_json::to_string_pretty(&summary.summary_record())?);
    Ok(())
}

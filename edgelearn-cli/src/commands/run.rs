//! Run command - drive a local job manager over stdin/stdout.
//!
//! Each stdin line is either a control-plane message (`{"header": ..., "content": ...}`)
//! or a worker report. Upstream messages are written to stdout as JSON lines.
//! Runs until stdin closes or Ctrl+C.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use edgelearn::controller::ControllerConfig;
use edgelearn::job::{Message, ModelInfo, WorkerReport};
use edgelearn::manager::JobManager;
use edgelearn::relay::{ChannelRelay, OutboundMessage};
use edgelearn::resource::{Dataset, DatasetResolver, MemoryCache, ModelResolver};
use edgelearn::store::FileJobStore;

use crate::error::CliError;
use crate::resources::ResourceManifest;
use crate::runner::CliRunner;

/// Arguments for the run command.
pub struct RunArgs {
    pub resources: PathBuf,
    pub debug: bool,
    pub quiet: bool,
}

/// One line of input.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Inbound {
    Control(Message),
    Report(WorkerReport),
}

/// Run the run command.
pub fn run(args: RunArgs) -> Result<(), CliError> {
    let runner = CliRunner::with_debug(args.debug, args.quiet)?;
    runner.log_startup("run");
    let settings = runner.config();

    let manifest = ResourceManifest::load(&args.resources)?;
    info!(
        datasets = manifest.datasets.len(),
        models = manifest.models.len(),
        "Loaded resource manifest"
    );

    let store = FileJobStore::open(settings.storage.directory.clone())?;
    let config = settings.to_controller_config();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    // Set up signal handler for graceful shutdown
    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    ctrlc::set_handler(move || signal.cancel())
        .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let result = runtime.block_on(serve(manifest, store, config, shutdown));

    // A pending stdin read never completes on its own
    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}

async fn serve(
    manifest: ResourceManifest,
    store: FileJobStore,
    config: ControllerConfig,
    shutdown: CancellationToken,
) -> Result<(), CliError> {
    let datasets: Arc<MemoryCache<Dataset>> = Arc::new(MemoryCache::new());
    let models: Arc<MemoryCache<ModelInfo>> = Arc::new(MemoryCache::new());
    manifest.publish_models(&models);
    manifest.refresh_datasets(&datasets);

    let refresher = tokio::spawn(refresh_datasets(
        manifest,
        Arc::clone(&datasets),
        config.dataset_interval(),
        shutdown.clone(),
    ));

    let (relay, upstream) = ChannelRelay::new();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        write_upstream(upstream, &mut stdout).await;
    });

    let policy = config.resolve_policy();
    let manager = JobManager::new(
        Arc::new(store),
        DatasetResolver::new(datasets, policy),
        ModelResolver::new(models, policy),
        Arc::new(relay),
        config,
    );
    manager.start()?;

    info!("Reading control messages and worker reports from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("Interrupted, shutting down");
                break;
            }

            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => handle_line(&manager, &line).await,
                    Ok(None) => {
                        info!("Input closed, shutting down");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to read input");
                        break;
                    }
                }
            }
        }
    }

    manager.shutdown().await;
    shutdown.cancel();
    if let Err(e) = refresher.await {
        warn!(error = %e, "Dataset refresh task failed");
    }

    // Last relay handle goes with the manager; the writer drains and exits
    drop(manager);
    if let Err(e) = writer.await {
        warn!(error = %e, "Upstream writer task failed");
    }

    info!("Shutdown complete");
    Ok(())
}

/// Parse one input line. Blank lines yield `None`.
fn parse_line(line: &str) -> Result<Option<Inbound>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

async fn handle_line(manager: &JobManager, line: &str) {
    match parse_line(line) {
        Ok(Some(Inbound::Control(message))) => {
            let id = message.header.resource_id();
            let operation = message.header.operation;
            if let Err(e) = manager.handle_message(message).await {
                error!(job = %id, operation = %operation, error = %e, "Failed to handle control message");
            }
        }
        Ok(Some(Inbound::Report(report))) => {
            let worker = report.name.clone();
            if let Err(e) = manager.submit_report(report).await {
                error!(worker = %worker, error = %e, "Failed to submit worker report");
            }
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Ignoring malformed input line"),
    }
}

/// Write upstream messages as JSON lines until every relay handle is gone.
async fn write_upstream<W>(mut upstream: UnboundedReceiver<OutboundMessage>, out: &mut W)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = upstream.recv().await {
        let mut line = match serde_json::to_vec(&message) {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "Failed to encode upstream message");
                continue;
            }
        };
        line.push(b'\n');

        if let Err(e) = out.write_all(&line).await {
            error!(error = %e, "Failed to write upstream message");
            break;
        }
        if let Err(e) = out.flush().await {
            error!(error = %e, "Failed to flush upstream output");
            break;
        }
    }
}

/// Periodically re-publish datasets so appended samples reach running jobs.
async fn refresh_datasets(
    manifest: ResourceManifest,
    datasets: Arc<MemoryCache<Dataset>>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    // Skip the first immediate tick
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,

            _ = ticker.tick() => {
                manifest.refresh_datasets(&datasets);
            }
        }
    }
}

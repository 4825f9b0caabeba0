use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use aki_client::history::open_seeded;
use aki_client::pager::{spawn_pager_task, HttpPager};
use aki_client::risk::{LinearClassifier, RiskClassifier, ThresholdClassifier};
use aki_client::{logging, transport, Config, Dispatcher, Result, Session};

/// How long to wait for queued pages after the session ends.
const PAGER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();
    logging::init_with_level(&config.log_level);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Fatal: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<()> {
    let (mllp_host, mllp_port) = config.mllp_endpoint()?;
    let (pager_host, pager_port) = config.pager_endpoint()?;

    let store = open_seeded(&config.database, &config.history)?;

    let classifier: Box<dyn RiskClassifier> = match &config.model {
        Some(path) => {
            info!("Loading model from {}", path.display());
            Box::new(LinearClassifier::from_path(path)?)
        }
        None => Box::new(ThresholdClassifier::default()),
    };

    let (pager, pager_task) = spawn_pager_task(
        HttpPager::new(&pager_host, pager_port),
        config.pager_config(),
    );
    let stats = pager.stats();
    let dispatcher = Dispatcher::with_boxed_classifier(classifier, pager);

    let stream = transport::connect(&mllp_host, mllp_port).await?;
    let result = Session::builder(store, dispatcher).build().run(stream).await;

    // Session and its pager handle are gone; let queued pages drain.
    if tokio::time::timeout(PAGER_DRAIN_TIMEOUT, pager_task).await.is_err() {
        warn!("Pager still busy after {:?}, exiting anyway", PAGER_DRAIN_TIMEOUT);
    }
    info!(
        delivered = stats.delivered(),
        failed = stats.failed(),
        "Pager stopped"
    );

    let report = result?;
    info!("Done, {} acks sent", report.acks_sent);
    Ok(())
}

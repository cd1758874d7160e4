use std::{env, io};
use tokio::task::JoinHandle;
use tracing::{info, warn, Level};
use tracing_loki::url::Url;
use tracing_loki::BackgroundTaskController;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{filter, fmt};

const SERVICE_NAME: &str = "vagtkalender";

/// Handle for flushing the Loki pipeline before the process exits.
pub struct LokiHandle {
    pub controller: BackgroundTaskController,
    pub task: JoinHandle<()>,
}

/// Installs the fmt subscriber (crate at TRACE, everything else at WARN)
/// and, when `LOKI_URL` points at a reachable Loki, a shipping layer on
/// top. Returns the Loki handle so the caller can flush on shutdown.
pub async fn setup() -> Option<LokiHandle> {
    let filter = filter::Targets::new()
        .with_target(SERVICE_NAME, Level::TRACE)
        .with_default(Level::WARN);
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stdout));

    let base_url: Url = match env::var("LOKI_URL").ok().and_then(|raw| raw.parse().ok()) {
        Some(url) => url,
        None => {
            registry.init();
            warn!("Loki URL not provided or invalid. Continuing without it.");
            return None;
        }
    };

    if reqwest::get(base_url.clone()).await.is_err() {
        registry.init();
        warn!("Couldn't connect to Loki. Continuing without it.");
        return None;
    }

    let (layer, controller, task) = tracing_loki::builder()
        .label("service", SERVICE_NAME)
        .expect("Failed setting label")
        .build_controller_url(base_url)
        .expect("Failed building the Loki layer");

    registry.with(layer).init();
    let task = tokio::spawn(task);
    info!("Loki initialized");

    Some(LokiHandle { controller, task })
}

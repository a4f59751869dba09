use std::sync::Arc;
use std::time::Duration;

use qbroker::broker::Broker;
use qbroker::config::load_config;
use qbroker::queue::memory::MemoryQueue;
use qbroker::utils::logging;
use qbroker::workers::{ModuleSource, Registry};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let settings = load_config().expect("Failed to load configuration");
    if settings.logging.enabled {
        logging::init(&settings.logging.level);
    }

    // Operators register their worker functions here; each `.worker` file
    // under the configured path binds an address to one of them.
    let source = Arc::new(ModuleSource::new());

    let registry = Arc::new(
        Registry::load(&settings.workers.path, source).expect("Failed to load workers"),
    );
    let _watcher = registry
        .clone()
        .watch(Duration::from_millis(settings.workers.watch_interval_ms));

    let (queue, events) = MemoryQueue::channel();
    let broker = Broker::new(&settings, queue, registry).expect("Failed to initialise broker");

    tracing::info!(
        server = %format!("{}:{}", settings.queue.host, settings.queue.port),
        queue = %settings.queue.name,
        workers = %settings.workers.path,
        "qbroker started"
    );

    broker.run(events).await;
}

use std::sync::Arc;

use tracing::{info, warn};

use shopbot_core::{
    catalog::CatalogCache,
    config::Config,
    conversation::ConversationStore,
    dispatch::Dispatcher,
    engine::ConversationEngine,
    scheduler::{BackgroundTasks, Intervals},
    storage::JsonFileStore,
};
use shopbot_whatsapp::{
    router::{run_server, AppState},
    CloudApiClient,
};

#[tokio::main]
async fn main() -> Result<(), shopbot_core::Error> {
    shopbot_core::logging::init("shopbot")?;

    let cfg = Arc::new(Config::load()?);
    if !cfg.whatsapp_configured() {
        warn!("WhatsApp credentials missing; outbound messages will only be logged");
    }

    let store = Arc::new(JsonFileStore::new(cfg.data_dir.clone()));
    let catalog = Arc::new(CatalogCache::new(store.clone(), cfg.catalog_limit));
    let conversations = Arc::new(ConversationStore::new(store));
    match conversations.restore().await {
        Ok(n) => info!(restored = n, "conversations restored"),
        Err(e) => warn!(error = %e, "could not restore conversations"),
    }

    let gateway = Arc::new(CloudApiClient::from_config(&cfg));
    let engine = Arc::new(ConversationEngine::new(
        cfg.clone(),
        conversations.clone(),
        catalog.clone(),
        gateway.clone(),
    ));

    let tasks = BackgroundTasks::spawn(catalog, conversations, gateway, Intervals::from_config(&cfg));
    let (inbound, dispatcher) = Dispatcher::spawn(engine.clone());

    let served = run_server(AppState::new(cfg, engine, inbound), async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown requested");
    })
    .await;

    dispatcher.shutdown().await;
    tasks.shutdown().await;
    served.map_err(|e| shopbot_core::Error::External(format!("http server failed: {e}")))
}

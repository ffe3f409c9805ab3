use std::{net::TcpListener, sync::Arc};

use actix_web::web;
use anyhow::Context;
use env_logger::Env;
use seeker::{
    configuration::get_configuration,
    dal::ResultStore,
    services::{
        AdmissionController, Droid, ListingScraper, RetryPolicy, SearchOrchestrator, WebhookRelay,
    },
    startup::run,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let configuration = get_configuration().context("Failed to read configuration.")?;

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener =
        TcpListener::bind(&address).with_context(|| format!("Failed to bind {}", address))?;

    let droid = Droid::new(&configuration.browser);
    let scraper = ListingScraper::new(Arc::new(droid), RetryPolicy::from(&configuration.search));
    let relay = WebhookRelay::new(configuration.webhook);
    let store = ResultStore::new(configuration.storage.results_dir);
    log::info!(
        "Saving results under {}, webhook deadline {}s",
        store.root().display(),
        relay.deadline().as_secs()
    );

    let orchestrator = web::Data::new(SearchOrchestrator::new(
        AdmissionController::new(),
        scraper,
        relay,
        store,
    ));

    log::info!("Listening on {}", address);
    run(listener, orchestrator)?.await?;
    Ok(())
}

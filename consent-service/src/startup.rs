//! Application startup and lifecycle management.

use crate::config::Config;
use crate::handlers;
use crate::services::store::{
    AspspConsentDataRepository, ConsentRepository, InMemoryAspspConsentDataRepository,
    InMemoryConsentRepository, MongoAspspConsentDataRepository, MongoConsentRepository,
};
use crate::services::{
    init_metrics, AccountCatalog, ConsentService, EventService, InMemoryAccountCatalog,
    InMemoryEventService, MongoEventService,
};
use crate::spi::AspspConnectorClient;
use axum::{routing::get, Router};
use mongodb::{options::ClientOptions, Client};
use secrecy::ExposeSecret;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service_name: String,
    pub consent_service: ConsentService,
}

struct Stores {
    consents: Arc<dyn ConsentRepository>,
    consent_data: Arc<dyn AspspConsentDataRepository>,
    events: Arc<dyn EventService>,
}

pub struct Application {
    addr: SocketAddr,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        init_metrics()?;

        let stores = connect_stores(&config).await?;

        let connector = AspspConnectorClient::new(&config.connector)?;
        tracing::info!(base_url = %config.connector.base_url, "ASPSP connector configured");

        let catalog: Arc<dyn AccountCatalog> = match &config.accounts.known_ibans {
            Some(ibans) => Arc::new(InMemoryAccountCatalog::with_ibans(ibans)),
            None => Arc::new(InMemoryAccountCatalog::accept_all()),
        };

        let consent_service = ConsentService::new(
            Arc::new(config.profile.clone()),
            stores.consents,
            stores.consent_data,
            Arc::new(connector),
            catalog,
            stores.events,
        );

        let state = AppState {
            service_name: config.service_name.clone(),
            consent_service,
        };

        // Port 0 binds a random port for tests
        let listener =
            TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
        let addr = listener.local_addr()?;

        tracing::info!(
            %addr,
            default_sca_approach = config.profile.default_sca_approach().as_str(),
            "Consent service ready"
        );

        Ok(Self {
            addr,
            listener,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(handlers::health_check))
            .route("/ready", get(handlers::readiness_check))
            .route("/metrics", get(handlers::metrics_endpoint))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        tracing::info!("Listening on {}", self.addr);
        axum::serve(self.listener, Self::router(self.state)).await?;
        Ok(())
    }
}

async fn connect_stores(config: &Config) -> anyhow::Result<Stores> {
    let Some(database) = &config.database else {
        tracing::warn!("No database configured, consents are kept in memory");
        return Ok(Stores {
            consents: Arc::new(InMemoryConsentRepository::new()),
            consent_data: Arc::new(InMemoryAspspConsentDataRepository::new()),
            events: Arc::new(InMemoryEventService::new()),
        });
    };

    let mut client_options = ClientOptions::parse(database.url.expose_secret()).await?;
    client_options.app_name = Some(config.service_name.clone());

    let client = Client::with_options(client_options)?;
    let db = client.database(&database.db_name);

    let consents = MongoConsentRepository::new(&db);
    consents.init_indexes().await?;

    Ok(Stores {
        consents: Arc::new(consents),
        consent_data: Arc::new(MongoAspspConsentDataRepository::new(&db)),
        events: Arc::new(MongoEventService::new(&db)),
    })
}

//! Application state and route wiring.

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use common_utils::encryption::FieldCipher;
use sanalpos_connectors::{HttpClient, SessionContext};

use crate::{
    configs::settings::{ApplicationError, Settings},
    core::{bin_lookup::BinService, payments::PaymentsCore},
    db::MongoStore,
    routes::{health, payments},
};

#[derive(Clone, Debug)]
pub struct AppState {
    pub core: PaymentsCore,
    pub settings: Settings,
}

impl AppState {
    /// Wire the stores, the BIN cache and the connector session from
    /// settings.
    pub async fn new(settings: Settings) -> Result<Self, ApplicationError> {
        let cipher = FieldCipher::new(&settings.payment.master_key);
        let store = MongoStore::new(&settings.database.uri, cipher.clone())
            .await
            .map_err(|error| {
                ApplicationError::InvalidConfiguration(format!("mongodb: {error:?}"))
            })?;
        let store = Arc::new(store);
        let bin_service = BinService::new(
            settings.payment.bin_api_url.clone(),
            settings.outbound.bin_timeout_secs,
        )
        .map_err(|error| ApplicationError::InvalidConfiguration(format!("bin: {error:?}")))?;
        let http = HttpClient::new(settings.outbound.request_timeout_secs)
            .map_err(|error| ApplicationError::InvalidConfiguration(format!("http: {error:?}")))?;

        let core = PaymentsCore {
            terminals: store.clone(),
            transactions: store,
            bin_resolver: Arc::new(bin_service),
            cipher,
            session: SessionContext {
                http,
                callback_base_url: settings.payment.callback_base_url.clone(),
            },
        };

        Ok(Self { core, settings })
    }
}

pub fn configure(config: &mut web::ServiceConfig) {
    config
        .service(
            web::scope("/api/payment")
                .route("/bin", web::post().to(payments::query_bin))
                .route("/pay", web::post().to(payments::create_payment))
                .route("/{id}", web::get().to(payments::transaction_status))
                .route("/{id}/refund", web::post().to(payments::refund))
                .route("/{id}/cancel", web::post().to(payments::cancel)),
        )
        .service(
            web::scope("/payment")
                .route("/{id}/form", web::get().to(payments::payment_form))
                .route("/{id}/callback", web::post().to(payments::payment_callback)),
        )
        .route("/health", web::get().to(health::health));
}

/// Build and run the actix server.
pub async fn start_server(settings: Settings) -> std::io::Result<()> {
    let state = AppState::new(settings.clone())
        .await
        .map_err(|error| std::io::Error::new(std::io::ErrorKind::Other, error.to_string()))?;
    let data = web::Data::new(state);
    let (host, port) = (settings.server.host.clone(), settings.server.port);

    tracing::info!(%host, port, "starting sanalpos router");
    if let Some(origin) = &settings.payment.cors_origin {
        tracing::info!(%origin, "CORS is enforced by the upstream gateway");
    }

    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .configure(configure)
    })
    .bind((host, port))?
    .run()
    .await
}

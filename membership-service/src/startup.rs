//! Application startup and lifecycle management.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::middleware::from_fn;
use axum::{
    routing::{get, patch, post},
    Router,
};
use mongodb::{options::ClientOptions, Client as MongoClient};
use secrecy::ExposeSecret;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use service_core::error::AppError;
use service_core::middleware::request_id::request_id_middleware;

use crate::config::MembershipConfig;
use crate::handlers;
use crate::services::{EmailSender, MembershipRepository, MembershipStore, MockEmailSender, SmtpEmailSender};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: MembershipConfig,
    pub store: Arc<dyn MembershipStore>,
    pub email: Arc<dyn EmailSender>,
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: MembershipConfig) -> Result<Self, AppError> {
        let mut client_options = ClientOptions::parse(config.mongodb.uri.expose_secret())
            .await
            .map_err(|e| {
                tracing::error!("Failed to parse MongoDB connection string: {}", e);
                AppError::DatabaseError(e.into())
            })?;
        client_options.app_name = Some("membership-service".to_string());

        let client = MongoClient::with_options(client_options).map_err(|e| {
            tracing::error!("Failed to create MongoDB client: {}", e);
            AppError::DatabaseError(e.into())
        })?;
        let db = client.database(&config.mongodb.database);

        let repository = MembershipRepository::new(client, &db);
        repository.init_indexes().await.map_err(|e| {
            tracing::error!("Failed to initialize database indexes: {}", e);
            e
        })?;

        let email: Arc<dyn EmailSender> = if config.smtp.enabled {
            match SmtpEmailSender::new(config.smtp.clone()) {
                Ok(sender) => {
                    tracing::info!("SMTP email sender initialized");
                    Arc::new(sender)
                }
                Err(e) => {
                    tracing::warn!("Failed to initialize SMTP sender: {}. Using mock.", e);
                    Arc::new(MockEmailSender::new(true))
                }
            }
        } else {
            tracing::info!("SMTP sender disabled, using mock email sender");
            Arc::new(MockEmailSender::new(true))
        };

        let state = AppState {
            config: config.clone(),
            store: Arc::new(repository),
            email,
        };

        let router = build_router(state);

        // Port 0 binds a random port for testing.
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Membership service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router).await
    }
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/owners/register", post(handlers::auth::register_owner))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/me", get(handlers::auth::me))
        .route("/auth/pin", post(handlers::auth::set_pin))
        .route("/auth/unlock", post(handlers::auth::unlock_pin))
        .route(
            "/clients",
            get(handlers::clients::list_clients).post(handlers::clients::create_client),
        )
        .route(
            "/clients/:id",
            patch(handlers::clients::update_client).delete(handlers::clients::delete_client),
        )
        .route(
            "/clients/:id/emails",
            get(handlers::clients::client_email_history),
        )
        .route(
            "/payments",
            get(handlers::payments::list_payments).post(handlers::payments::register_payment),
        )
        .route("/payments/prefill", get(handlers::payments::prefill))
        .route(
            "/reminders/upcoming",
            post(handlers::reminders::send_upcoming_reminders),
        )
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .with_state(state)
}

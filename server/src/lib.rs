pub mod auth;
pub mod config;
pub mod error;
pub mod password;
pub mod sessions;
pub mod store;
pub mod tasks;

use actix_cors::Cors;
use actix_web::{get, http::header, web, HttpResponse};
use serde::Serialize;

use crate::config::{AuthPolicy, ServerConfig};
use crate::error::ApiError;
use crate::sessions::SessionStore;
use crate::store::{Store, StoreError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared handles injected into every worker.
#[derive(Clone)]
pub struct AppState {
    pub store: web::Data<Store>,
    pub sessions: web::Data<SessionStore>,
    pub policy: web::Data<AuthPolicy>,
}

impl AppState {
    pub fn new(store: Store, policy: AuthPolicy) -> Self {
        Self {
            store: web::Data::new(store),
            sessions: web::Data::new(SessionStore::new(policy.session_ttl)),
            policy: web::Data::new(policy),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self, StoreError> {
        Ok(Self::new(Store::open(&config.database)?, config.auth_policy()))
    }

    /// Registers state, extractor error handlers and every route.
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.store.clone())
            .app_data(self.sessions.clone())
            .app_data(self.policy.clone())
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                ApiError::validation(format!("malformed request body: {err}")).into()
            }))
            .app_data(web::PathConfig::default().error_handler(|_err, _req| ApiError::NotFound("task").into()))
            .app_data(web::QueryConfig::default().error_handler(|err, _req| {
                ApiError::validation(format!("malformed query string: {err}")).into()
            }))
            .service(health)
            .service(auth::register)
            .service(auth::login)
            .service(auth::logout)
            .service(auth::me)
            .service(tasks::list_tasks)
            .service(tasks::create_task)
            .service(tasks::get_task)
            .service(tasks::replace_task)
            .service(tasks::patch_task)
            .service(tasks::delete_task);
    }
}

/// Credentialed CORS for the given browser origins.
pub fn cors(origins: &[String]) -> Cors {
    origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
        .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
        .supports_credentials()
        .max_age(3600)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[get("/health")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        version: VERSION,
    })
}

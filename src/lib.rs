#[macro_use]
extern crate rocket;

use rocket::data::{Limits, ToByteUnit};
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedHeaders, AllowedOrigins};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::config::{Config, StoreBackend};
use crate::data::memory::MemoryStore;
use crate::data::mongo::MongoStore;
use crate::data::DynStore;
use crate::error::{BackendError, ConfigurationError};
use crate::media::{DynMedia, LocalMedia};
use crate::route::mount_routes;
use crate::security::{Argon2Verifier, DynVerifier};
use crate::session::SessionStore;

pub mod config;
pub mod data;
pub mod error;
pub mod media;
pub mod middleware;
pub mod resp;
pub mod role;
pub mod route;
pub mod security;
pub mod session;
pub mod util;

pub async fn create(log_level: Option<Level>) -> Result<Rocket<Build>, BackendError> {
    if let Some(l) = log_level {
        let subscriber = FmtSubscriber::builder().with_max_level(l).finish();

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Unable to set global logger: {}", err);
        };
        if let Err(err) = tracing_log::LogTracer::init() {
            eprintln!("Unable to forward log records: {}", err);
        }
    }

    tracing::info!("Reading .env file...");
    if dotenv::dotenv().is_err() {
        tracing::warn!("Unable to load .env file.");
    }

    tracing::info!("Loading configuration...");
    let c = match Config::load() {
        Ok(c) => {
            tracing::info!("Configuration loaded.");
            c
        }
        Err(ConfigurationError::NotFound(_)) => {
            let c = Config::default();
            if c.save().is_err() {
                tracing::warn!("Unable to save generated configuration.");
            }
            c
        }
        Err(other) => {
            tracing::error!("Configuration error: {}", other);
            return Err(other.into());
        }
    };

    let store: DynStore = match c.store {
        StoreBackend::MongoDb => Box::new(MongoStore::connect(&c.mongodb_uri, &c.mongodb_db).await?),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, nothing will be persisted.");
            Box::new(MemoryStore::default())
        }
    };

    let media = LocalMedia::new(&c.media_dir, &c.media_url)?;

    build(
        c,
        store,
        Box::new(media),
        Box::new(Argon2Verifier::default()),
    )
}

/// Assembles the server around already constructed collaborators.
pub fn build(
    c: Config,
    store: DynStore,
    media: DynMedia,
    verifier: DynVerifier,
) -> Result<Rocket<Build>, BackendError> {
    let upload_limit = c.max_upload_mib.mebibytes();
    let limits = Limits::default()
        .limit("file", upload_limit)
        .limit("data-form", upload_limit + 1.mebibytes());
    let figment = rocket::Config::figment().merge(("limits", limits));

    tracing::info!("Starting HTTP server...");
    let mut r = rocket::custom(figment)
        .manage(SessionStore::new(c.session_lifetime_days))
        .manage(store)
        .manage(media)
        .manage(verifier)
        .attach(session::purge_fairing());

    if !c.allowed_origins.is_empty() {
        tracing::info!("Setting up CORS...");
        let cors = rocket_cors::CorsOptions {
            allowed_origins: AllowedOrigins::some_exact(c.allowed_origins.as_slice()),
            allowed_methods: vec![Method::Get, Method::Put, Method::Post]
                .into_iter()
                .map(From::from)
                .collect(),
            allowed_headers: AllowedHeaders::All,
            allow_credentials: true,
            ..Default::default()
        }
        .to_cors()?;

        r = r.attach(cors);
    }

    r = mount_routes(r, &c);

    Ok(r.manage(c))
}

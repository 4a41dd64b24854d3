use std::sync::Arc;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{
    middleware::{Compress, Logger},
    web, App, HttpServer,
};
use dotenv::dotenv;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use recipe_service::api;
use recipe_service::config::{AuthMode, Config, StoreBackend};
use recipe_service::database::{MemoryStore, MongoStore, Store};
use recipe_service::services::{
    JwksVerifier, RestaurantLookup, SecretVerifier, TokenVerifier, UploadStore, YelpClient,
};

fn to_io(e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| {
        log::error!("❌ {}", e);
        to_io(e)
    })?;

    log::info!("🚀 Starting SmartRecipe API...");

    let store: Arc<dyn Store> = match &config.store {
        StoreBackend::Mongo { uri } => {
            let mongo = MongoStore::connect(uri).await.map_err(|e| {
                log::error!("❌ Failed to connect to MongoDB: {}", e);
                to_io(e)
            })?;
            log::info!("✅ MongoDB connected successfully");
            Arc::new(mongo)
        }
        StoreBackend::Memory => {
            log::warn!("⚠️ Using in-memory store, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let verifier: Arc<dyn TokenVerifier> = match &config.auth {
        AuthMode::Jwks { domain, audience } => {
            log::info!("🔐 Verifying RS256 tokens from {}", domain);
            Arc::new(JwksVerifier::new(domain, audience))
        }
        AuthMode::SharedSecret { secret, audience } => {
            log::warn!("⚠️ Verifying HS256 tokens with a shared secret (development only)");
            Arc::new(SecretVerifier::new(secret, audience.as_deref()))
        }
    };

    if config.yelp_api_key.is_none() {
        log::warn!("⚠️ YELP_API_KEY not set, /api/restaurants/nearby will fail");
    }
    let restaurants: Arc<dyn RestaurantLookup> = Arc::new(YelpClient::new(
        &config.yelp_api_base,
        config.yelp_api_key.clone(),
        &config.default_restaurant_location,
    ));

    let uploads = UploadStore::new(config.upload_dir.clone());
    uploads.ensure_dirs().await.map_err(to_io)?;
    log::info!("📁 Uploads stored in {}", uploads.root().display());

    let store_data = web::Data::from(store);
    let verifier_data = web::Data::from(verifier);
    let restaurants_data = web::Data::from(restaurants);
    let uploads_data = web::Data::new(uploads);

    let host = config.host.clone();
    let port = config.port;
    let cors_origins = config.cors_origins.clone();
    let upload_dir = config.upload_dir.clone();

    log::info!("🌐 Server starting on {}:{}", host, port);
    log::info!("📚 Swagger UI available at: http://{}:{}/swagger-ui/", host, port);
    log::info!("📄 OpenAPI spec at: http://{}:{}/api-docs/openapi.json", host, port);

    // Start HTTP server
    HttpServer::new(move || {
        let cors = cors_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::CONTENT_TYPE,
                actix_web::http::header::ACCEPT,
            ])
            .expose_headers(vec![actix_web::http::header::CONTENT_TYPE])
            .supports_credentials()
            .max_age(3600);

        // Generate OpenAPI specification
        let openapi = api::swagger::ApiDoc::openapi();

        App::new()
            .app_data(store_data.clone())
            .app_data(verifier_data.clone())
            .app_data(restaurants_data.clone())
            .app_data(uploads_data.clone())
            .wrap(cors)
            .wrap(Compress::default())
            .wrap(Logger::default())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi),
            )
            .configure(api::configure)
            .service(Files::new("/uploads", upload_dir.clone()))
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}

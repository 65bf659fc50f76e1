use actix_cors::Cors;
use actix_web::middleware::{Logger, NormalizePath, TrailingSlash};
use actix_web::{web, App, HttpServer};
use std::io;
use std::sync::Arc;

use shoe_store::config::AppConfig;
use shoe_store::store::{MongoOrderStore, MongoProductStore, OrderStore, ProductStore};
use shoe_store::{db, routes};

fn cors(origins: &[String]) -> Cors {
    origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allow_any_method()
        .allow_any_header()
        .supports_credentials()
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok(); // Load environment variables from .env file
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env().map_err(|e| {
        log::error!("Configuration error: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e)
    })?;

    let database = db::connect(&config.database).await.map_err(|e| {
        log::error!("Failed to connect to MongoDB: {}", e);
        io::Error::new(io::ErrorKind::ConnectionRefused, e)
    })?;

    let products: Arc<dyn ProductStore> = Arc::new(MongoProductStore::new(&database));
    let orders: Arc<dyn OrderStore> = Arc::new(MongoOrderStore::new(&database));
    let products = web::Data::from(products);
    let orders = web::Data::from(orders);

    let address = config.server_address();
    log::info!("Listening on {}:{}", address.0, address.1);

    HttpServer::new(move || {
        let (json_config, query_config) = routes::extractor_config(config.server.max_body_size);
        App::new()
            .wrap(NormalizePath::new(TrailingSlash::Trim))
            .wrap(cors(&config.allowed_origins))
            .wrap(Logger::default())
            .app_data(json_config)
            .app_data(query_config)
            .app_data(products.clone())
            .app_data(orders.clone())
            .configure(|cfg| routes::configure(cfg, &config.jwt_secret))
            .default_service(web::to(routes::not_found))
    })
    .bind(address)?
    .run()
    .await
}

use actix_web::{guard, web, HttpResponse};
use serde_json::json;

use crate::error::ApiError;
use crate::middleware::AdminMiddleware;

pub mod orders;
pub mod products;

/// JSON and query extraction failures answer with the usual `{"message"}` body.
pub fn extractor_config(max_body_size: usize) -> (web::JsonConfig, web::QueryConfig) {
    let json = web::JsonConfig::default()
        .limit(max_body_size)
        .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into());
    let query = web::QueryConfig::default()
        .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into());
    (json, query)
}

/// Registers the product and order routes. Store handles must already be in app data.
pub fn configure(cfg: &mut web::ServiceConfig, jwt_secret: &str) {
    cfg.service(
        web::scope("/shoesPage")
            // each admin resource matches on its own method, so other writes fall through to 404
            .service(
                web::resource("")
                    .guard(guard::Post())
                    .wrap(AdminMiddleware::new(jwt_secret))
                    .route(web::post().to(products::create_product)),
            )
            .service(
                web::resource("/delete/{id}")
                    .guard(guard::Delete())
                    .wrap(AdminMiddleware::new(jwt_secret))
                    .route(web::delete().to(products::delete_product)),
            )
            .service(
                web::resource("/{id}")
                    .guard(guard::Put())
                    .wrap(AdminMiddleware::new(jwt_secret))
                    .route(web::put().to(products::update_product)),
            )
            // specific paths first so they are not taken for an id
            .route("/search", web::get().to(products::search_by_title))
            .route("", web::get().to(products::list_products))
            .route("/top", web::get().to(products::top_products))
            .route("/filter", web::get().to(products::filter_options))
            .route("/category/{category}", web::get().to(products::products_by_category))
            .route("/{id}", web::get().to(products::get_product)),
    )
    .service(
        web::scope("/orders")
            .route("", web::post().to(orders::create_order))
            .route("", web::get().to(orders::list_orders))
            .route("/count", web::get().to(orders::order_count))
            .route("/user/{user_id}", web::get().to(orders::orders_by_user))
            .route("/status/{status}", web::get().to(orders::orders_by_status))
            .route("/{id}", web::get().to(orders::get_order))
            .route("/{id}", web::put().to(orders::update_order))
            .route("/{id}", web::delete().to(orders::delete_order)),
    );
}

pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(json!({ "message": "Route not found" }))
}

use actix_web::{web, HttpResponse};
use bson::doc;
use bson::oid::ObjectId;
use serde_json::json;

use crate::error::{ApiError, Result};
use crate::models::{order_views, OrderInput, OrderUpdate, OrderView};
use crate::store::OrderStore;

fn order_id(raw: &str) -> Result<ObjectId> {
    ObjectId::parse_str(raw).map_err(|_| ApiError::not_found("Order not found"))
}

pub async fn create_order(
    store: web::Data<dyn OrderStore>,
    data: web::Json<OrderInput>,
) -> Result<HttpResponse> {
    let order = store.insert(data.into_inner().validate()?).await?;
    log::info!("Order {:?} placed by {}", order.id, order.user);

    Ok(HttpResponse::Created().json(json!({
        "message": "Order created successfully",
        "order": OrderView::from(order),
    })))
}

pub async fn list_orders(store: web::Data<dyn OrderStore>) -> Result<HttpResponse> {
    let orders = store.find(doc! {}).await?;
    Ok(HttpResponse::Ok().json(json!({ "orders": order_views(orders) })))
}

pub async fn get_order(
    store: web::Data<dyn OrderStore>,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let order = store
        .find_by_id(order_id(&id)?)
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;
    Ok(HttpResponse::Ok().json(json!({ "order": OrderView::from(order) })))
}

pub async fn update_order(
    store: web::Data<dyn OrderStore>,
    id: web::Path<String>,
    data: web::Json<OrderUpdate>,
) -> Result<HttpResponse> {
    let id = order_id(&id)?;
    let changes = data.into_inner().into_set_document()?;
    let order = store
        .update(id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Order updated successfully",
        "order": OrderView::from(order),
    })))
}

pub async fn delete_order(
    store: web::Data<dyn OrderStore>,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let order = store
        .delete(order_id(&id)?)
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Order deleted successfully",
        "order": OrderView::from(order),
    })))
}

pub async fn orders_by_user(
    store: web::Data<dyn OrderStore>,
    user_id: web::Path<String>,
) -> Result<HttpResponse> {
    let user = ObjectId::parse_str(user_id.as_str())
        .map_err(|_| ApiError::bad_request("Invalid user id"))?;
    let orders = store.find(doc! { "user": user }).await?;
    Ok(HttpResponse::Ok().json(json!({ "orders": order_views(orders) })))
}

pub async fn order_count(store: web::Data<dyn OrderStore>) -> Result<HttpResponse> {
    let count = store.count().await?;
    Ok(HttpResponse::Ok().json(json!({ "orderCount": count })))
}

pub async fn orders_by_status(
    store: web::Data<dyn OrderStore>,
    status: web::Path<String>,
) -> Result<HttpResponse> {
    let orders = store.find(doc! { "status": status.as_str() }).await?;
    Ok(HttpResponse::Ok().json(json!({ "orders": order_views(orders) })))
}

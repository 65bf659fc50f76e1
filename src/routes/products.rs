use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use bson::oid::ObjectId;
use bson::{doc, Bson};
use serde::Deserialize;
use serde_json::json;

use crate::error::{ApiError, Result};
use crate::models::{product_views, Product, ProductInput, ProductView};
use crate::query::{default_sort, title_pattern, FindQuery, QueryComposer, QueryParams, DEFAULT_LIMIT};
use crate::store::ProductStore;

pub const SHOE_TYPES: [&str; 3] = ["Running", "Lounging", "Everyday"];
const TOP_PRODUCTS: i64 = 15;

fn product_id(raw: &str) -> Result<ObjectId> {
    ObjectId::parse_str(raw).map_err(|_| ApiError::not_found("Product not found"))
}

/// Listing with sort, pagination, filters and title search, plus the same page
/// of each shoe type.
pub async fn list_products(
    store: web::Data<dyn ProductStore>,
    query: web::Query<Vec<(String, String)>>,
) -> Result<HttpResponse> {
    let features = QueryComposer::new(FindQuery::default(), QueryParams::from_pairs(query.into_inner()))
        .apply_sort()
        .apply_pagination()
        .apply_filtering()
        .apply_field_selection()
        .apply_search("title");

    let paginate = features.paginate();
    let sort = features.query().sort_spec().cloned().unwrap_or_else(default_sort);
    let residual = features.residual_filter();
    log::debug!("Product listing query: {:?}", features.query());

    let sibling = |shoe_for: &str| {
        let mut filter = residual.clone();
        filter.insert("shoeFor", shoe_for);
        FindQuery::new(filter)
            .sort(sort.clone())
            .skip(paginate.skip)
            .limit(paginate.limit)
    };
    let [running, lounging, everyday] = SHOE_TYPES.map(sibling);

    let (data, running, lounging, everyday) = futures::try_join!(
        store.find(features.into_query()),
        store.find(running),
        store.find(lounging),
        store.find(everyday),
    )?;

    Ok(HttpResponse::Ok().json(json!({
        "data": product_views(data),
        "running": product_views(running),
        "lounging": product_views(lounging),
        "everyday": product_views(everyday),
    })))
}

pub async fn top_products(store: web::Data<dyn ProductStore>) -> Result<HttpResponse> {
    let query = FindQuery::default()
        .sort(doc! { "sold": -1, "_id": 1 })
        .limit(TOP_PRODUCTS);
    let data = store.find(query).await?;
    Ok(HttpResponse::Ok().json(json!({ "data": product_views(data) })))
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Capitalizes string values and removes duplicates. The first spelling in store
/// order wins, so the output follows the store's (sorted) `distinct` order.
fn facet_values(values: Vec<Bson>) -> Vec<String> {
    let mut seen = Vec::new();
    for value in values {
        if let Bson::String(s) = value {
            let s = capitalize(&s);
            if !seen.contains(&s) {
                seen.push(s);
            }
        }
    }
    seen
}

/// Brands, categories and page numbers for the storefront filter panel.
pub async fn filter_options(store: web::Data<dyn ProductStore>) -> Result<HttpResponse> {
    let (brands, categories, count) = futures::try_join!(
        store.distinct("brand"),
        store.distinct("category"),
        store.count(),
    )?;
    let total_pages = count.div_ceil(DEFAULT_LIMIT as u64);
    let page_numbers: Vec<u64> = (1..=total_pages).collect();

    Ok(HttpResponse::Ok().json(json!({
        "data": {
            "brand": facet_values(brands),
            "category": facet_values(categories),
            "pageNumbers": page_numbers,
        }
    })))
}

#[derive(Deserialize, Debug)]
pub struct TitleSearch {
    pub title: Option<String>,
}

pub async fn search_by_title(
    store: web::Data<dyn ProductStore>,
    params: web::Query<TitleSearch>,
) -> Result<HttpResponse> {
    let term = params
        .into_inner()
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Please provide a title"))?;

    let products = store
        .find(FindQuery::new(doc! { "title": title_pattern(term.trim()) }))
        .await?;
    if products.is_empty() {
        return Err(ApiError::not_found("No products found"));
    }
    Ok(HttpResponse::Ok().json(json!({
        "data": product_views(products),
        "message": format!("Products matching \"{}\"", term),
    })))
}

pub async fn products_by_category(
    store: web::Data<dyn ProductStore>,
    category: web::Path<String>,
) -> Result<HttpResponse> {
    let category = category.into_inner();
    let products = store
        .find(FindQuery::new(doc! { "category": category.as_str() }))
        .await?;
    Ok(HttpResponse::Ok().json(json!({
        "data": product_views(products),
        "message": format!("Product {}", category),
    })))
}

pub async fn get_product(
    store: web::Data<dyn ProductStore>,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let product = store
        .find_by_id(product_id(&id)?)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    let message = format!("Product {}", product.title);
    Ok(HttpResponse::Ok().json(json!({ "data": ProductView::from(product), "message": message })))
}

pub async fn create_product(
    store: web::Data<dyn ProductStore>,
    data: web::Json<ProductInput>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let fields = data.into_inner().validate()?;
    let product = store
        .insert(Product::from_fields(fields, bson::DateTime::now()))
        .await?;
    let admin = req.extensions().get::<String>().cloned().unwrap_or_default();
    log::info!("Product {:?} ({}) created by {}", product.id, product.title, admin);

    let message = format!("{} created successfully", product.title);
    Ok(HttpResponse::Created().json(json!({ "data": ProductView::from(product), "message": message })))
}

pub async fn update_product(
    store: web::Data<dyn ProductStore>,
    id: web::Path<String>,
    data: web::Json<ProductInput>,
) -> Result<HttpResponse> {
    let id = product_id(&id)?;
    let fields = data.into_inner().validate()?;
    let product = store
        .update(id, fields)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;

    let message = format!("{} updated successfully", product.title);
    Ok(HttpResponse::Ok().json(json!({ "data": ProductView::from(product), "message": message })))
}

pub async fn delete_product(
    store: web::Data<dyn ProductStore>,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let product = store
        .delete(product_id(&id)?)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    log::info!("Deleted product {}", id.as_str());

    let message = format!("{} deleted successfully", product.title);
    Ok(HttpResponse::Ok().json(json!({ "data": ProductView::from(product), "message": message })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facets_are_capitalized_and_unique() {
        let values = vec![
            Bson::String("nike".into()),
            Bson::Null,
            Bson::String("Nike".into()),
            Bson::String("adidas".into()),
            Bson::String(String::new()),
        ];
        assert_eq!(facet_values(values), vec!["Nike", "Adidas", ""]);
    }

    #[test]
    fn facets_follow_store_order() {
        // byte order puts capitalized values first
        let values = ["Nike", "adidas", "asics", "nike", "vans"]
            .into_iter()
            .map(Bson::from)
            .collect();
        assert_eq!(facet_values(values), vec!["Nike", "Adidas", "Asics", "Vans"]);
    }
}

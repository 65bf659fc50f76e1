use bson::oid::ObjectId;
use bson::{Bson, DateTime, Document};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};

pub const DEFAULT_ORDER_STATUS: &str = "Pending";
pub const DEFAULT_COUPON: &str = "No Coupon Applied";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (user ID)
    pub exp: usize,  // Expiration time as UTC timestamp
    #[serde(default)]
    pub role: Option<String>,
}

/// Product document as stored in the `products` collection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discounted_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default)]
    pub size: Vec<f64>,
    #[serde(default)]
    pub shoe_for: Vec<String>,
    #[serde(default)]
    pub selected_file: Vec<String>,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub sold: i64,
    #[serde(default)]
    pub comments: Vec<Bson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

impl Product {
    pub fn from_fields(fields: ProductFields, now: DateTime) -> Self {
        Product {
            id: None,
            title: fields.title,
            description: fields.description,
            price: fields.price,
            discounted_price: fields.discounted_price,
            brand: Some(fields.brand),
            category: fields.category,
            size: fields.size,
            shoe_for: fields.shoe_for,
            selected_file: fields.selected_file,
            quantity: fields.quantity,
            sold: 0,
            comments: Vec::new(),
            created_at: Some(now),
            updated_at: Some(now),
        }
    }
}

/// Accepts either `"x"` or `["x", "y"]` for list-valued fields.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(value: OneOrMany<T>) -> Self {
        match value {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }
}

/// Request body for creating or replacing a product.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub selected_file: Option<OneOrMany<String>>,
    pub price: Option<f64>,
    pub category: Option<OneOrMany<String>>,
    pub size: Option<OneOrMany<f64>>,
    pub quantity: Option<i64>,
    pub shoe_for: Option<OneOrMany<String>>,
    pub brand: Option<String>,
    pub discounted_price: Option<f64>,
}

/// The validated, writable subset of a product.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductFields {
    pub title: String,
    pub description: String,
    pub selected_file: Vec<String>,
    pub price: f64,
    pub category: Vec<String>,
    pub size: Vec<f64>,
    pub quantity: i64,
    pub shoe_for: Vec<String>,
    pub brand: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discounted_price: Option<f64>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

impl ProductInput {
    pub fn validate(self) -> Result<ProductFields> {
        let (title, description) = match (non_empty(self.title), non_empty(self.description)) {
            (Some(t), Some(d)) => (t, d),
            _ => return Err(ApiError::bad_request("Please provide all required fields")),
        };
        let selected_file = self
            .selected_file
            .ok_or_else(|| ApiError::bad_request("Please provide a file"))?;
        let price = self
            .price
            .filter(|p| *p != 0.0)
            .ok_or_else(|| ApiError::bad_request("Please provide a price"))?;
        let category = self
            .category
            .ok_or_else(|| ApiError::bad_request("Please provide a category"))?;
        let size = self
            .size
            .ok_or_else(|| ApiError::bad_request("Please provide a size"))?;
        let quantity = self
            .quantity
            .filter(|q| *q != 0)
            .ok_or_else(|| ApiError::bad_request("Please provide a quantity"))?;
        let shoe_for = self
            .shoe_for
            .ok_or_else(|| ApiError::bad_request("Please provide a shoeFor"))?;
        let brand = non_empty(self.brand).ok_or_else(|| ApiError::bad_request("Please provide a brand"))?;

        Ok(ProductFields {
            title,
            description,
            selected_file: selected_file.into(),
            price,
            category: category.into(),
            size: size.into(),
            quantity,
            shoe_for: shoe_for.into(),
            brand,
            discounted_price: self.discounted_price,
        })
    }
}

/// JSON shape of a product in responses.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    #[serde(rename = "_id")]
    pub id: Option<String>,
    pub title: String,
    pub description: String,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discounted_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    pub category: Vec<String>,
    pub size: Vec<f64>,
    pub shoe_for: Vec<String>,
    pub selected_file: Vec<String>,
    pub quantity: i64,
    pub sold: i64,
    pub comments: Vec<serde_json::Value>,
    pub created_at: Option<chrono::DateTime<Utc>>,
    pub updated_at: Option<chrono::DateTime<Utc>>,
}

impl From<Product> for ProductView {
    fn from(p: Product) -> Self {
        ProductView {
            id: p.id.map(|id| id.to_hex()),
            title: p.title,
            description: p.description,
            price: p.price,
            discounted_price: p.discounted_price,
            brand: p.brand,
            category: p.category,
            size: p.size,
            shoe_for: p.shoe_for,
            selected_file: p.selected_file,
            quantity: p.quantity,
            sold: p.sold,
            comments: p.comments.into_iter().map(Bson::into_relaxed_extjson).collect(),
            created_at: p.created_at.map(DateTime::to_chrono),
            updated_at: p.updated_at.map(DateTime::to_chrono),
        }
    }
}

pub fn product_views(products: Vec<Product>) -> Vec<ProductView> {
    products.into_iter().map(ProductView::from).collect()
}

fn default_status() -> String {
    DEFAULT_ORDER_STATUS.to_string()
}

fn default_coupon() -> String {
    DEFAULT_COUPON.to_string()
}

/// Order document as stored in the `orders` collection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user: ObjectId,
    #[serde(default)]
    pub products: Vec<Bson>,
    pub total_price: f64,
    pub address: String,
    #[serde(rename = "Quantity")]
    pub quantity: i64,
    pub payment_method: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "default_coupon")]
    pub coupon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

fn parse_user(raw: &str) -> Result<ObjectId> {
    ObjectId::parse_str(raw).map_err(|_| ApiError::bad_request("Invalid user id"))
}

fn to_bson_list(values: Vec<serde_json::Value>) -> Result<Vec<Bson>> {
    values
        .iter()
        .map(|v| bson::to_bson(v).map_err(ApiError::from))
        .collect()
}

/// Request body for checkout.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct OrderInput {
    pub user: Option<String>,
    pub products: Option<Vec<serde_json::Value>>,
    pub total_price: Option<f64>,
    pub address: Option<String>,
    #[serde(rename = "Quantity")]
    pub quantity: Option<i64>,
    pub payment_method: Option<String>,
    pub coupon: Option<String>,
}

impl OrderInput {
    /// Checks required fields in checkout order and builds an unsaved order.
    pub fn validate(self) -> Result<Order> {
        let user = non_empty(self.user).ok_or_else(|| ApiError::bad_request("User is required"))?;
        let products = self
            .products
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ApiError::bad_request("Products are required"))?;
        let total_price = self
            .total_price
            .ok_or_else(|| ApiError::bad_request("Total price is required"))?;
        let address = non_empty(self.address)
            .ok_or_else(|| ApiError::bad_request("Shipping address is required"))?;
        let quantity = self
            .quantity
            .ok_or_else(|| ApiError::bad_request("Quantity is required"))?;
        let payment_method = non_empty(self.payment_method)
            .ok_or_else(|| ApiError::bad_request("Payment method is required"))?;

        Ok(Order {
            id: None,
            user: parse_user(&user)?,
            products: to_bson_list(products)?,
            total_price,
            address,
            quantity,
            payment_method,
            status: default_status(),
            coupon: self.coupon.unwrap_or_else(default_coupon),
            created_at: None,
            updated_at: None,
        })
    }
}

/// Partial order update; only the present fields are written.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdate {
    pub user: Option<String>,
    pub products: Option<Vec<serde_json::Value>>,
    pub total_price: Option<f64>,
    pub address: Option<String>,
    #[serde(rename = "Quantity")]
    pub quantity: Option<i64>,
    pub payment_method: Option<String>,
    pub coupon: Option<String>,
    pub status: Option<String>,
}

impl OrderUpdate {
    /// Renders the update as the body of a `$set`.
    pub fn into_set_document(self) -> Result<Document> {
        let mut set = Document::new();
        if let Some(user) = self.user {
            set.insert("user", parse_user(&user)?);
        }
        if let Some(products) = self.products {
            set.insert("products", to_bson_list(products)?);
        }
        if let Some(total_price) = self.total_price {
            set.insert("totalPrice", total_price);
        }
        if let Some(address) = self.address {
            set.insert("address", address);
        }
        if let Some(quantity) = self.quantity {
            set.insert("Quantity", quantity);
        }
        if let Some(payment_method) = self.payment_method {
            set.insert("paymentMethod", payment_method);
        }
        if let Some(coupon) = self.coupon {
            set.insert("coupon", coupon);
        }
        if let Some(status) = self.status {
            set.insert("status", status);
        }
        if set.is_empty() {
            return Err(ApiError::bad_request("At least one field to update is required"));
        }
        Ok(set)
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    #[serde(rename = "_id")]
    pub id: Option<String>,
    pub user: String,
    pub products: Vec<serde_json::Value>,
    pub total_price: f64,
    pub address: String,
    #[serde(rename = "Quantity")]
    pub quantity: i64,
    pub payment_method: String,
    pub status: String,
    pub coupon: String,
    pub created_at: Option<chrono::DateTime<Utc>>,
    pub updated_at: Option<chrono::DateTime<Utc>>,
}

impl From<Order> for OrderView {
    fn from(o: Order) -> Self {
        OrderView {
            id: o.id.map(|id| id.to_hex()),
            user: o.user.to_hex(),
            products: o.products.into_iter().map(Bson::into_relaxed_extjson).collect(),
            total_price: o.total_price,
            address: o.address,
            quantity: o.quantity,
            payment_method: o.payment_method,
            status: o.status,
            coupon: o.coupon,
            created_at: o.created_at.map(DateTime::to_chrono),
            updated_at: o.updated_at.map(DateTime::to_chrono),
        }
    }
}

pub fn order_views(orders: Vec<Order>) -> Vec<OrderView> {
    orders.into_iter().map(OrderView::from).collect()
}

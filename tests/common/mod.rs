#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, DateTime, Document};
use jsonwebtoken::{encode, EncodingKey, Header};

use shoe_store::models::{Claims, Order, Product, ProductFields};
use shoe_store::query::FindQuery;
use shoe_store::{ApiError, OrderStore, ProductStore, Result};

pub const SECRET: &str = "test-secret";

/// Builds the app under test around the given store doubles.
macro_rules! test_app {
    ($products:expr, $orders:expr) => {{
        let products: std::sync::Arc<dyn shoe_store::ProductStore> = $products;
        let orders: std::sync::Arc<dyn shoe_store::OrderStore> = $orders;
        let (json_config, query_config) = shoe_store::routes::extractor_config(1024 * 1024);
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(json_config)
                .app_data(query_config)
                .app_data(actix_web::web::Data::from(products))
                .app_data(actix_web::web::Data::from(orders))
                .configure(|cfg| shoe_store::routes::configure(cfg, common::SECRET))
                .default_service(actix_web::web::to(shoe_store::routes::not_found)),
        )
        .await
    }};
}

pub fn token(role: Option<&str>) -> String {
    let exp = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::hours(1))
        .expect("valid timestamp")
        .timestamp() as usize;
    let claims = Claims {
        sub: "64b7f0c2a1b2c3d4e5f60718".to_string(),
        exp,
        role: role.map(str::to_string),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_ref())).unwrap()
}

pub fn admin_bearer() -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token(Some("admin"))))
}

/// Mongo-style matching: a scalar matches a field or any element of an array field,
/// `$gte/$gt/$lte/$lt/$in` are evaluated the same way, and regexes are treated as
/// case-insensitive substrings.
fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, expected)| {
        let actual = doc.get(key);
        match expected {
            Bson::Document(ops) => ops.iter().all(|(op, operand)| operator_matches(actual, op, operand)),
            Bson::RegularExpression(re) => match actual {
                Some(Bson::String(s)) => s.to_lowercase().contains(&re.pattern.to_lowercase()),
                _ => false,
            },
            _ => candidates(actual).any(|value| same(value, expected)),
        }
    })
}

/// The field itself, or each element when it is an array.
fn candidates(actual: Option<&Bson>) -> Box<dyn Iterator<Item = &Bson> + '_> {
    match actual {
        Some(Bson::Array(items)) => Box::new(items.iter()),
        Some(value) => Box::new(std::iter::once(value)),
        None => Box::new(std::iter::empty()),
    }
}

fn number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn same(value: &Bson, expected: &Bson) -> bool {
    match (number(value), number(expected)) {
        (Some(a), Some(b)) => a == b,
        _ => value == expected,
    }
}

fn operator_matches(actual: Option<&Bson>, op: &str, operand: &Bson) -> bool {
    if op == "$in" {
        let Bson::Array(choices) = operand else {
            panic!("$in expects an array, got {operand:?}");
        };
        return candidates(actual).any(|value| choices.iter().any(|choice| same(value, choice)));
    }
    let Some(bound) = number(operand) else {
        panic!("{op} expects a number, got {operand:?}");
    };
    candidates(actual).filter_map(number).any(|value| match op {
        "$gte" => value >= bound,
        "$gt" => value > bound,
        "$lte" => value <= bound,
        "$lt" => value < bound,
        other => panic!("unsupported operator {other}"),
    })
}

#[derive(Default)]
pub struct MemoryProductStore {
    pub products: Mutex<Vec<Product>>,
    pub queries: Mutex<Vec<FindQuery>>,
}

impl MemoryProductStore {
    pub fn with(products: Vec<Product>) -> Self {
        let products = products
            .into_iter()
            .map(|mut p| {
                p.id.get_or_insert_with(ObjectId::new);
                p
            })
            .collect();
        MemoryProductStore {
            products: Mutex::new(products),
            queries: Mutex::default(),
        }
    }

    pub fn recorded(&self) -> Vec<FindQuery> {
        self.queries.lock().unwrap().clone()
    }

    pub fn first_id(&self) -> ObjectId {
        self.products.lock().unwrap()[0].id.unwrap()
    }
}

pub fn product(title: &str, brand: &str, shoe_for: &[&str]) -> Product {
    priced(title, brand, shoe_for, 100.0)
}

pub fn priced(title: &str, brand: &str, shoe_for: &[&str], price: f64) -> Product {
    Product {
        title: title.to_string(),
        description: format!("{title} description"),
        price,
        brand: Some(brand.to_string()),
        category: vec!["men".to_string()],
        size: vec![42.0],
        shoe_for: shoe_for.iter().map(|s| s.to_string()).collect(),
        selected_file: vec![format!("{title}.png")],
        quantity: 3,
        ..Default::default()
    }
}

#[async_trait]
impl ProductStore for MemoryProductStore {
    async fn find(&self, query: FindQuery) -> Result<Vec<Product>> {
        self.queries.lock().unwrap().push(query.clone());
        let products = self.products.lock().unwrap();
        let skip = query.skip_count().unwrap_or(0) as usize;
        let limit = query.limit_count().map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(products
            .iter()
            .filter(|p| matches(&bson::to_document(p).unwrap(), query.filter()))
            .skip(skip)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<Product>> {
        let products = self.products.lock().unwrap();
        Ok(products.iter().find(|p| p.id == Some(id)).cloned())
    }

    async fn insert(&self, mut product: Product) -> Result<Product> {
        product.id = Some(ObjectId::new());
        let now = DateTime::now();
        product.created_at = Some(now);
        product.updated_at = Some(now);
        self.products.lock().unwrap().push(product.clone());
        Ok(product)
    }

    async fn update(&self, id: ObjectId, fields: ProductFields) -> Result<Option<Product>> {
        let mut products = self.products.lock().unwrap();
        let Some(product) = products.iter_mut().find(|p| p.id == Some(id)) else {
            return Ok(None);
        };
        product.title = fields.title;
        product.description = fields.description;
        product.selected_file = fields.selected_file;
        product.price = fields.price;
        product.category = fields.category;
        product.size = fields.size;
        product.quantity = fields.quantity;
        product.shoe_for = fields.shoe_for;
        product.brand = Some(fields.brand);
        if fields.discounted_price.is_some() {
            product.discounted_price = fields.discounted_price;
        }
        product.updated_at = Some(DateTime::now());
        Ok(Some(product.clone()))
    }

    async fn delete(&self, id: ObjectId) -> Result<Option<Product>> {
        let mut products = self.products.lock().unwrap();
        let index = products.iter().position(|p| p.id == Some(id));
        Ok(index.map(|i| products.remove(i)))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.products.lock().unwrap().len() as u64)
    }

    async fn distinct(&self, field: &str) -> Result<Vec<Bson>> {
        let products = self.products.lock().unwrap();
        let mut values = Vec::new();
        for product in products.iter() {
            let doc = bson::to_document(product).unwrap();
            let found = match doc.get(field) {
                Some(Bson::Array(items)) => items.clone(),
                Some(value) => vec![value.clone()],
                None => vec![],
            };
            for value in found {
                if !values.contains(&value) {
                    values.push(value);
                }
            }
        }
        // the server answers in sorted order
        values.sort_by_key(|v| v.to_string());
        Ok(values)
    }
}

#[derive(Default)]
pub struct MemoryOrderStore {
    pub orders: Mutex<Vec<Order>>,
}

impl MemoryOrderStore {
    pub fn with(orders: Vec<Order>) -> Self {
        let orders = orders
            .into_iter()
            .map(|mut o| {
                o.id.get_or_insert_with(ObjectId::new);
                o
            })
            .collect();
        MemoryOrderStore {
            orders: Mutex::new(orders),
        }
    }

    pub fn first_id(&self) -> ObjectId {
        self.orders.lock().unwrap()[0].id.unwrap()
    }
}

pub fn order(user: ObjectId, status: &str) -> Order {
    Order {
        id: None,
        user,
        products: vec![Bson::String("p1".to_string())],
        total_price: 99.0,
        address: "1 Main St".to_string(),
        quantity: 1,
        payment_method: "card".to_string(),
        status: status.to_string(),
        coupon: "No Coupon Applied".to_string(),
        created_at: Some(DateTime::now()),
        updated_at: Some(DateTime::now()),
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, mut order: Order) -> Result<Order> {
        order.id = Some(ObjectId::new());
        let now = DateTime::now();
        order.created_at = Some(now);
        order.updated_at = Some(now);
        self.orders.lock().unwrap().push(order.clone());
        Ok(order)
    }

    async fn find(&self, filter: Document) -> Result<Vec<Order>> {
        let orders = self.orders.lock().unwrap();
        Ok(orders
            .iter()
            .filter(|o| matches(&bson::to_document(o).unwrap(), &filter))
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<Order>> {
        let orders = self.orders.lock().unwrap();
        Ok(orders.iter().find(|o| o.id == Some(id)).cloned())
    }

    async fn update(&self, id: ObjectId, changes: Document) -> Result<Option<Order>> {
        let mut orders = self.orders.lock().unwrap();
        let Some(order) = orders.iter_mut().find(|o| o.id == Some(id)) else {
            return Ok(None);
        };
        let mut doc = bson::to_document(&*order)?;
        for (key, value) in changes {
            doc.insert(key, value);
        }
        doc.insert("updatedAt", DateTime::now());
        *order = bson::from_document(doc).unwrap();
        Ok(Some(order.clone()))
    }

    async fn delete(&self, id: ObjectId) -> Result<Option<Order>> {
        let mut orders = self.orders.lock().unwrap();
        let index = orders.iter().position(|o| o.id == Some(id));
        Ok(index.map(|i| orders.remove(i)))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.orders.lock().unwrap().len() as u64)
    }
}

/// A store whose backend is unreachable.
pub struct DownStore;

fn down() -> ApiError {
    ApiError::from(mongodb::error::Error::custom("backend unreachable"))
}

#[async_trait]
impl ProductStore for DownStore {
    async fn find(&self, _query: FindQuery) -> Result<Vec<Product>> {
        Err(down())
    }

    async fn find_by_id(&self, _id: ObjectId) -> Result<Option<Product>> {
        Err(down())
    }

    async fn insert(&self, _product: Product) -> Result<Product> {
        Err(down())
    }

    async fn update(&self, _id: ObjectId, _fields: ProductFields) -> Result<Option<Product>> {
        Err(down())
    }

    async fn delete(&self, _id: ObjectId) -> Result<Option<Product>> {
        Err(down())
    }

    async fn count(&self) -> Result<u64> {
        Err(down())
    }

    async fn distinct(&self, _field: &str) -> Result<Vec<Bson>> {
        Err(down())
    }
}

#[async_trait]
impl OrderStore for DownStore {
    async fn insert(&self, _order: Order) -> Result<Order> {
        Err(down())
    }

    async fn find(&self, _filter: Document) -> Result<Vec<Order>> {
        Err(down())
    }

    async fn find_by_id(&self, _id: ObjectId) -> Result<Option<Order>> {
        Err(down())
    }

    async fn update(&self, _id: ObjectId, _changes: Document) -> Result<Option<Order>> {
        Err(down())
    }

    async fn delete(&self, _id: ObjectId) -> Result<Option<Order>> {
        Err(down())
    }

    async fn count(&self) -> Result<u64> {
        Err(down())
    }
}

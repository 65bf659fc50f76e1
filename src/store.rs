use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{doc, Bson, DateTime, Document};
use futures::stream::TryStreamExt;
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use mongodb::{Collection, Database};

use crate::error::Result;
use crate::models::{Order, Product, ProductFields};
use crate::query::FindQuery;

pub const PRODUCTS: &str = "products";
pub const ORDERS: &str = "orders";

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn find(&self, query: FindQuery) -> Result<Vec<Product>>;

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<Product>>;

    /// Inserts the product and returns it with its assigned id.
    async fn insert(&self, product: Product) -> Result<Product>;

    /// Replaces the listed fields and returns the updated document.
    async fn update(&self, id: ObjectId, fields: ProductFields) -> Result<Option<Product>>;

    /// Removes the product and returns what was removed.
    async fn delete(&self, id: ObjectId) -> Result<Option<Product>>;

    async fn count(&self) -> Result<u64>;

    /// Distinct values of `field`, with array fields flattened, in the store's
    /// sort order rather than document order.
    async fn distinct(&self, field: &str) -> Result<Vec<Bson>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: Order) -> Result<Order>;

    async fn find(&self, filter: Document) -> Result<Vec<Order>>;

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<Order>>;

    /// Applies `changes` as a `$set` and returns the updated document.
    async fn update(&self, id: ObjectId, changes: Document) -> Result<Option<Order>>;

    async fn delete(&self, id: ObjectId) -> Result<Option<Order>>;

    async fn count(&self) -> Result<u64>;
}

fn return_updated() -> FindOneAndUpdateOptions {
    FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build()
}

#[derive(Clone)]
pub struct MongoProductStore {
    collection: Collection<Product>,
}

impl MongoProductStore {
    pub fn new(db: &Database) -> Self {
        MongoProductStore {
            collection: db.collection(PRODUCTS),
        }
    }
}

#[async_trait]
impl ProductStore for MongoProductStore {
    async fn find(&self, query: FindQuery) -> Result<Vec<Product>> {
        let cursor = self
            .collection
            .find(query.filter().clone(), query.options())
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<Product>> {
        Ok(self.collection.find_one(doc! { "_id": id }, None).await?)
    }

    async fn insert(&self, mut product: Product) -> Result<Product> {
        let now = DateTime::now();
        product.created_at = Some(now);
        product.updated_at = Some(now);
        let result = self.collection.insert_one(&product, None).await?;
        product.id = result.inserted_id.as_object_id();
        Ok(product)
    }

    async fn update(&self, id: ObjectId, fields: ProductFields) -> Result<Option<Product>> {
        let mut set = bson::to_document(&fields)?;
        set.insert("updatedAt", DateTime::now());
        let updated = self
            .collection
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set }, return_updated())
            .await?;
        Ok(updated)
    }

    async fn delete(&self, id: ObjectId) -> Result<Option<Product>> {
        Ok(self
            .collection
            .find_one_and_delete(doc! { "_id": id }, None)
            .await?)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.collection.count_documents(None, None).await?)
    }

    async fn distinct(&self, field: &str) -> Result<Vec<Bson>> {
        Ok(self.collection.distinct(field, None, None).await?)
    }
}

#[derive(Clone)]
pub struct MongoOrderStore {
    collection: Collection<Order>,
}

impl MongoOrderStore {
    pub fn new(db: &Database) -> Self {
        MongoOrderStore {
            collection: db.collection(ORDERS),
        }
    }
}

#[async_trait]
impl OrderStore for MongoOrderStore {
    async fn insert(&self, mut order: Order) -> Result<Order> {
        let now = DateTime::now();
        order.created_at = Some(now);
        order.updated_at = Some(now);
        let result = self.collection.insert_one(&order, None).await?;
        order.id = result.inserted_id.as_object_id();
        Ok(order)
    }

    async fn find(&self, filter: Document) -> Result<Vec<Order>> {
        let cursor = self.collection.find(filter, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<Order>> {
        Ok(self.collection.find_one(doc! { "_id": id }, None).await?)
    }

    async fn update(&self, id: ObjectId, mut changes: Document) -> Result<Option<Order>> {
        changes.insert("updatedAt", DateTime::now());
        let updated = self
            .collection
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": changes }, return_updated())
            .await?;
        Ok(updated)
    }

    async fn delete(&self, id: ObjectId) -> Result<Option<Order>> {
        Ok(self
            .collection
            .find_one_and_delete(doc! { "_id": id }, None)
            .await?)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.collection.count_documents(None, None).await?)
    }
}

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod query;
pub mod routes;
pub mod store;

pub use error::{ApiError, Result};
pub use query::{FindQuery, Paginate, QueryComposer, QueryParams};
pub use store::{OrderStore, ProductStore};

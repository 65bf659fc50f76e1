use bson::doc;
use mongodb::{options::ClientOptions, Client, Database};

use crate::config::DatabaseConfig;

pub async fn connect(config: &DatabaseConfig) -> mongodb::error::Result<Database> {
    // Parse the connection string into client options
    let mut client_options = ClientOptions::parse(&config.url).await?;
    client_options.app_name = Some("shoe-store".to_string());

    let client = Client::with_options(client_options)?;
    let db = client.database(&config.name);

    // Fail at startup rather than on the first request
    db.run_command(doc! { "ping": 1 }, None).await?;
    log::info!("Connected to MongoDB database {}", config.name);

    Ok(db)
}

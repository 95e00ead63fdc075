//! Label tree example.
//!
//! Wires settings, client and facade together, prints the intent label
//! tree and the rules attached to its first label.
//!
//! Run with: `LABEL_API_ORIGIN=http://localhost:8000 cargo run --example label_tree`

use label_system_client::{ClientBuilder, Config, DataManager, LabelQuery, LabelTreeQuery};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), label_system_client::Error> {
    let config = Config::from_env()?;

    let level = if config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    let client = Arc::new(ClientBuilder::from_config(&config)?.build()?);
    let manager = DataManager::new(Arc::clone(&client));

    let tree = manager
        .label_tree(&LabelTreeQuery {
            label_type: Some("intent".into()),
            ..Default::default()
        })
        .await;
    println!("Label tree: {:#}", tree);

    // First page of top-level labels, at the configured page size
    let labels = client
        .list_labels(&LabelQuery {
            level: Some(1),
            page: Some(1),
            size: Some(config.page_size(None)),
            ..Default::default()
        })
        .await?;
    println!("Top-level labels: {:#}", labels);

    if let Some(code) = tree
        .get(0)
        .and_then(|label| label.get("label_code"))
        .and_then(|code| code.as_str())
    {
        let rules = manager.rules_by_label_code(code).await;
        println!("Rules for {}: {:#}", code, rules);
    }

    println!("Entity tags: {:?}", manager.entity_tag_names().await);

    Ok(())
}

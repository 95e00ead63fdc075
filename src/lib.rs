//! Client for the label system API.
//!
//! Two layers: [`Client`] maps each backend endpoint (labels, rules, entity
//! tags, items, intent recognition) to a method returning the parsed JSON
//! body, and [`DataManager`] wraps it for UI code, unwrapping the
//! `{ data: ... }` envelope, absorbing read failures and surfacing write
//! failures.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use label_system_client::{ClientBuilder, Config, DataManager, LabelTreeQuery};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), label_system_client::Error> {
//!     let config = Config {
//!         origin: Some("http://localhost:8000".into()),
//!         ..Config::from_env()?
//!     };
//!     let client = Arc::new(ClientBuilder::from_config(&config)?.build()?);
//!     let manager = DataManager::new(client);
//!
//!     let tree = manager
//!         .label_tree(&LabelTreeQuery {
//!             label_type: Some("intent".into()),
//!             ..Default::default()
//!         })
//!         .await;
//!     println!("{:#}", tree);
//!
//!     let rule = manager
//!         .create_rule(&json!({"label_code": "L001", "rule_content": "refund"}))
//!         .await?;
//!     println!("created {}", rule);
//!     Ok(())
//! }
//! ```

mod cache;
mod client;
mod config;
mod error;
mod manager;
mod types;

pub use cache::{cache_key, Cache, CacheEntry, MemoryCache};
pub use client::{Client, ClientBuilder, NO_PARAMS};
pub use config::{Config, DEFAULT_API_BASE_URL};
pub use error::{Error, Result};
pub use manager::DataManager;
pub use types::*;

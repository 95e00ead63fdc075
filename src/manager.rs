//! View-model facade over [`Client`].
//!
//! Reads never fail: a failed read is logged and degrades to an empty
//! result, so "no data" and "backend unavailable" look the same to the UI.
//! Writes are logged and the error is handed back unchanged.

use crate::client::Client;
use crate::error::{Error, Result};
use crate::types::unwrap_envelope;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tracing::error;

/// UI-facing data access, built once at startup around a shared [`Client`].
#[derive(Clone)]
pub struct DataManager {
    client: Arc<Client>,
}

impl DataManager {
    /// Wrap a client.
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    /// The wrapped client, for calls the facade does not cover.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Label hierarchy, or `[]` on failure.
    pub async fn label_tree<Q: Serialize + ?Sized>(&self, params: &Q) -> Value {
        self.query_list("get label tree", self.client.label_tree(params))
            .await
    }

    /// Direct children of a label, or `[]` on failure.
    pub async fn children_labels(&self, label_code: &str) -> Value {
        self.query_list("get child labels", self.client.children_labels(label_code))
            .await
    }

    /// Rules bound to a label code, or `[]` on failure.
    pub async fn rules_by_label_code(&self, label_code: &str) -> Value {
        self.query_list("get rules", self.client.rules_by_label_code(label_code))
            .await
    }

    /// Items bound to a label code, or `[]` on failure.
    pub async fn items_for_label(&self, label_code: &str) -> Value {
        self.query_list("get items", self.client.items_for_label(label_code))
            .await
    }

    /// Distinct entity tag names, or none on failure.
    pub async fn entity_tag_names(&self) -> Vec<String> {
        self.query("get entity tag names", self.client.entity_tag_names(), Vec::new())
            .await
    }

    /// Recognized intent, or `None` on failure.
    pub async fn recognize_intent(&self, text: &str) -> Option<Value> {
        let context = Value::Object(Default::default());
        let recognized = async {
            let response = self.client.recognize_intent(text, &context).await?;
            Ok::<_, Error>(response.get("data").filter(|d| !d.is_null()).cloned())
        };
        self.query("recognize intent", recognized, None).await
    }

    /// Create a rule and return the backend's `data`.
    pub async fn create_rule<B: Serialize + ?Sized>(&self, rule: &B) -> Result<Value> {
        let response = self
            .mutate("create rule", self.client.create_rule(rule))
            .await?;
        Ok(data_field(response))
    }

    /// Update a rule and return the backend's `data`.
    pub async fn update_rule<B: Serialize + ?Sized>(
        &self,
        id: impl Display,
        rule: &B,
    ) -> Result<Value> {
        let response = self
            .mutate("update rule", self.client.update_rule(id, rule))
            .await?;
        Ok(data_field(response))
    }

    /// Delete a rule.
    pub async fn delete_rule(&self, id: impl Display) -> Result<bool> {
        self.mutate("delete rule", self.client.delete_rule(id))
            .await?;
        Ok(true)
    }

    async fn query_list<F>(&self, operation: &'static str, request: F) -> Value
    where
        F: Future<Output = Result<Value>>,
    {
        let unwrapped = async { request.await.map(unwrap_envelope) };
        self.query(operation, unwrapped, Value::Array(Vec::new()))
            .await
    }

    async fn query<T, F>(&self, operation: &'static str, request: F, fallback: T) -> T
    where
        F: Future<Output = Result<T>>,
    {
        match request.await {
            Ok(value) => value,
            Err(e) => {
                error!(operation, error = %e, "read failed, returning empty result");
                fallback
            }
        }
    }

    async fn mutate<T, F>(&self, operation: &'static str, request: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        request.await.inspect_err(|e| {
            error!(operation, error = %e, "write failed");
        })
    }
}

fn data_field(mut response: Value) -> Value {
    response
        .get_mut("data")
        .map(Value::take)
        .unwrap_or(Value::Null)
}

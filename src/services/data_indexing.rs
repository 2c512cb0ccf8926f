use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{effective_model, merge_additional, take_array, CallOptions};
use crate::client::InferenceClient;
use crate::error::GatewayError;
use crate::transport::{InvocationRequest, JsonObject};

pub const DEFAULT_TOP_K: u32 = 10;

const INDEX_ROUTE: &str = "indexer/index-documents";
const SEARCH_ROUTE: &str = "indexer/search-documents";
const DELETE_ROUTE: &str = "indexer/delete-documents";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentId {
    Number(i64),
    Text(String),
}

/// One document to index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<DocumentId>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonObject>,
}

/// Document indexing and search.
pub struct DataIndexingService {
    client: Arc<InferenceClient>,
    default_model: Option<String>,
}

impl DataIndexingService {
    #[must_use]
    pub fn new(client: Arc<InferenceClient>) -> Self {
        Self {
            client,
            default_model: None,
        }
    }

    #[must_use]
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    /// # Errors
    ///
    /// [`GatewayError::InvalidRequest`] when the documents cannot be encoded,
    /// plus any invocation error.
    pub async fn index_documents(
        &self,
        documents: &[IndexDocument],
        index_name: Option<&str>,
        options: &CallOptions,
    ) -> Result<JsonObject, GatewayError> {
        let documents = serde_json::to_value(documents).map_err(|e| {
            GatewayError::InvalidRequest(format!("failed to encode documents: {e}"))
        })?;
        let mut body = JsonObject::new();
        body.insert("documents".into(), documents);
        insert_index_name(&mut body, index_name);
        merge_additional(&mut body, options.additional.as_ref());
        self.invoke(INDEX_ROUTE, body, options).await
    }

    /// Top matches for `query`; empty when the backend returns none.
    ///
    /// # Errors
    ///
    /// Any invocation error.
    pub async fn search_documents(
        &self,
        query: &str,
        index_name: Option<&str>,
        filters: Option<JsonObject>,
        top_k: u32,
        options: &CallOptions,
    ) -> Result<Vec<Value>, GatewayError> {
        let mut body = JsonObject::new();
        body.insert("query".into(), json!(query));
        body.insert("top_k".into(), json!(top_k));
        insert_index_name(&mut body, index_name);
        if let Some(filters) = filters.filter(|f| !f.is_empty()) {
            body.insert("filters".into(), Value::Object(filters));
        }
        merge_additional(&mut body, options.additional.as_ref());

        let mut response = self.invoke(SEARCH_ROUTE, body, options).await?;
        Ok(take_array(&mut response, "results"))
    }

    /// # Errors
    ///
    /// Any invocation error.
    pub async fn delete_documents(
        &self,
        doc_ids: &[DocumentId],
        index_name: Option<&str>,
        options: &CallOptions,
    ) -> Result<JsonObject, GatewayError> {
        let mut body = JsonObject::new();
        body.insert("doc_ids".into(), json!(doc_ids));
        insert_index_name(&mut body, index_name);
        merge_additional(&mut body, options.additional.as_ref());
        self.invoke(DELETE_ROUTE, body, options).await
    }

    async fn invoke(
        &self,
        route: &str,
        body: JsonObject,
        options: &CallOptions,
    ) -> Result<JsonObject, GatewayError> {
        let req = InvocationRequest::json(route, body)
            .with_model(effective_model(options, self.default_model.as_ref()));
        self.client.invoke_json(req).await
    }
}

fn insert_index_name(body: &mut JsonObject, index_name: Option<&str>) {
    if let Some(index_name) = index_name.filter(|name| !name.is_empty()) {
        body.insert("index_name".into(), json!(index_name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_accepts_numbers_and_strings() {
        let docs: Vec<IndexDocument> = serde_json::from_value(json!([
            {"doc_id": 7, "text": "a"},
            {"doc_id": "x-1", "text": "b", "metadata": {"lang": "en"}},
            {"text": "c"}
        ]))
        .unwrap();
        assert_eq!(docs[0].doc_id, Some(DocumentId::Number(7)));
        assert_eq!(docs[1].doc_id, Some(DocumentId::Text("x-1".into())));
        assert!(docs[2].doc_id.is_none());
        assert_eq!(
            serde_json::to_value(&docs[2]).unwrap(),
            json!({"text": "c"})
        );
    }
}

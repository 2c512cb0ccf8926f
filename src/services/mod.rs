//! Thin domain services over [`InferenceClient`]. Each one shapes a JSON body
//! for one backend route and calls `invoke_json`.

mod customer_engagement;
mod data_indexing;
mod document_processing;
mod operational_intelligence;
mod personalization;

use std::sync::Arc;

use serde_json::Value;

use crate::client::InferenceClient;
use crate::transport::JsonObject;

pub use customer_engagement::{ChatTurnOptions, CustomerEngagementService};
pub use data_indexing::{DataIndexingService, DocumentId, IndexDocument, DEFAULT_TOP_K};
pub use document_processing::DocumentProcessingService;
pub use operational_intelligence::{
    OperationalIntelligenceService, DEFAULT_FORECAST_HORIZON, DEFAULT_SENSITIVITY,
};
pub use personalization::{
    PersonalizationService, DEFAULT_NUM_RESULTS, DEFAULT_PERSONALIZE_TEMPERATURE,
};

/// Options shared by every service call.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Deployment override; the service default applies when absent.
    pub model: Option<String>,
    /// Extra body members, merged last (shallow).
    pub additional: Option<JsonObject>,
}

impl CallOptions {
    #[must_use]
    pub fn with_model(model: Option<String>) -> Self {
        Self {
            model,
            additional: None,
        }
    }
}

/// All services over one shared client.
pub struct Services {
    pub engagement: CustomerEngagementService,
    pub documents: DocumentProcessingService,
    pub personalization: PersonalizationService,
    pub operations: OperationalIntelligenceService,
    pub indexing: DataIndexingService,
}

impl Services {
    #[must_use]
    pub fn new(client: &Arc<InferenceClient>) -> Self {
        Self {
            engagement: CustomerEngagementService::new(Arc::clone(client)),
            documents: DocumentProcessingService::new(Arc::clone(client)),
            personalization: PersonalizationService::new(Arc::clone(client)),
            operations: OperationalIntelligenceService::new(Arc::clone(client)),
            indexing: DataIndexingService::new(Arc::clone(client)),
        }
    }
}

fn merge_additional(body: &mut JsonObject, additional: Option<&JsonObject>) {
    if let Some(additional) = additional {
        for (key, value) in additional {
            body.insert(key.clone(), value.clone());
        }
    }
}

fn effective_model(options: &CallOptions, default_model: Option<&String>) -> Option<String> {
    options.model.clone().or_else(|| default_model.cloned())
}

/// Take an array member out of a response; absent or non-array is empty.
fn take_array(response: &mut JsonObject, key: &str) -> Vec<Value> {
    match response.remove(key) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

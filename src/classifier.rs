//! Intent classification over an LLM
//!
//! Turns a free-text message into a typed `{intent, fields}` result. The
//! model is asked for strict JSON; anything else is a classification
//! failure, which the dialogue treats as "could not understand".

use crate::llm::{LlmError, LlmRequest, LlmService};
use crate::state_machine::state::{FieldValue, Fields, Intent};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

const SYSTEM_PROMPT: &str = r#"You are a helpful assistant for a rural WhatsApp marketplace.

When a user sends a message, your job is to:
1. Determine the intent. One of: [register, sell, buy, review, product_info]
2. Extract any relevant fields from the message.
3. Normalize the location into a district format (e.g. "Gweru" -> "Gweru Urban").
4. Normalize the product name for matching (e.g. "broilers" -> "chickens").
5. Classify the product into a category (e.g. "chickens" -> "livestock").

Use these field names where they apply:
- sell: product_name, quantity, price, location, category, description
- register: business_name, location, payment_method
- buy: product_name, location
- review: rating (an integer), comment

Only include fields the user actually gave; leave out anything unknown.

Respond with valid JSON only, exactly like this:

{
  "intent": "<intent>",
  "fields": {
    "product_name": "...",
    "normalized_product": "...",
    "category": "...",
    "location": "..."
  }
}"#;

const MAX_TOKENS: u32 = 512;

/// Why a message could not be classified
#[derive(Debug, Error)]
pub enum ClassificationFailure {
    #[error("model request failed: {0}")]
    Model(#[from] LlmError),

    #[error("model did not answer in time")]
    Timeout,

    #[error("model response was not a JSON object: {0}")]
    NotJson(String),

    #[error("model response has no intent")]
    MissingIntent,

    #[error("unknown intent: {0}")]
    UnknownIntent(String),
}

/// A successfully classified message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub intent: Intent,
    pub fields: Fields,
}

/// Classifier backed by any `LlmService`
#[derive(Clone)]
pub struct LlmIntentClassifier {
    llm: Arc<dyn LlmService>,
}

impl LlmIntentClassifier {
    pub fn new(llm: Arc<dyn LlmService>) -> Self {
        Self { llm }
    }

    pub fn model_id(&self) -> &str {
        self.llm.model_id()
    }

    pub async fn classify(
        &self,
        user_id: &str,
        text: &str,
    ) -> Result<Classification, ClassificationFailure> {
        let request = LlmRequest::new(format!("User message: \"{text}\""))
            .with_system(SYSTEM_PROMPT)
            .with_max_tokens(MAX_TOKENS)
            .json();

        let response = self.llm.complete(&request).await?;
        let result = parse_classification(&response.text);
        match &result {
            Ok(c) => tracing::debug!(
                user_id,
                intent = %c.intent,
                fields = c.fields.len(),
                "Classified message"
            ),
            Err(e) => tracing::warn!(user_id, error = %e, "Classification failed"),
        }
        result
    }
}

/// Parse the model's raw answer.
///
/// Models sometimes wrap JSON in a markdown fence even when told not to;
/// the fence is tolerated, nothing else is.
pub fn parse_classification(raw: &str) -> Result<Classification, ClassificationFailure> {
    let body = strip_code_fence(raw.trim());
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| ClassificationFailure::NotJson(e.to_string()))?;
    let serde_json::Value::Object(mut object) = value else {
        return Err(ClassificationFailure::NotJson("top level is not an object".to_string()));
    };

    let intent_name = match object.remove("intent") {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Null) | None => return Err(ClassificationFailure::MissingIntent),
        Some(other) => return Err(ClassificationFailure::UnknownIntent(other.to_string())),
    };
    let intent = Intent::parse(&intent_name)
        .ok_or_else(|| ClassificationFailure::UnknownIntent(intent_name.clone()))?;

    let mut fields = Fields::new();
    match object.remove("fields") {
        Some(serde_json::Value::Object(map)) => {
            for (name, value) in map {
                match FieldValue::from_json(value) {
                    Some(v) => {
                        fields.insert(name, v);
                    }
                    None => tracing::warn!(field = %name, "Dropping non-scalar field value"),
                }
            }
        }
        Some(serde_json::Value::Null) | None => {}
        Some(other) => tracing::warn!(fields = %other, "Ignoring malformed fields value"),
    }

    Ok(Classification { intent, fields })
}

fn strip_code_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

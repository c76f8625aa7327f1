//! Conversation state types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Intents
// ============================================================================

/// Classified purpose of a user message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Register,
    Sell,
    Buy,
    Review,
    /// Classifiable, but has no fulfillment flow
    ProductInfo,
}

impl Intent {
    pub const ALL: [Intent; 5] = [
        Intent::Register,
        Intent::Sell,
        Intent::Buy,
        Intent::Review,
        Intent::ProductInfo,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Intent::Register => "register",
            Intent::Sell => "sell",
            Intent::Buy => "buy",
            Intent::Review => "review",
            Intent::ProductInfo => "product_info",
        }
    }

    /// Parse the wire name produced by the classifier
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|intent| intent.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Field values
// ============================================================================

/// A single extracted field value.
///
/// Only scalars survive the classifier boundary; compound JSON values are
/// dropped there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Convert a JSON scalar. Returns `None` for arrays and objects.
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(FieldValue::Null),
            serde_json::Value::Bool(b) => Some(FieldValue::Bool(b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(FieldValue::Integer)
                .or_else(|| n.as_f64().map(FieldValue::Number)),
            serde_json::Value::String(s) => Some(FieldValue::Text(s)),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Plain text for wire data; `None` for null
    pub fn as_text(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Text(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Null => serde_json::Value::Null,
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::Integer(i) => serde_json::Value::from(*i),
            FieldValue::Number(n) => serde_json::Value::from(*n),
            FieldValue::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("(none)"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

/// Accumulated fields, keyed by field name
pub type Fields = BTreeMap<String, FieldValue>;

// ============================================================================
// Conversation State
// ============================================================================

/// Per-user dialogue state, persisted between turns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub intent: Intent,
    #[serde(default)]
    pub fields: Fields,
    #[serde(default)]
    pub awaiting_confirmation: bool,
}

impl ConversationState {
    pub fn collecting(intent: Intent, fields: Fields) -> Self {
        Self {
            intent,
            fields,
            awaiting_confirmation: false,
        }
    }

    pub fn confirming(intent: Intent, fields: Fields) -> Self {
        Self {
            intent,
            fields,
            awaiting_confirmation: true,
        }
    }
}

/// Observable phase of a user's dialogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DialoguePhase {
    None,
    Collecting,
    Confirming,
}

impl DialoguePhase {
    pub fn of(state: Option<&ConversationState>) -> Self {
        match state {
            None => DialoguePhase::None,
            Some(s) if s.awaiting_confirmation => DialoguePhase::Confirming,
            Some(_) => DialoguePhase::Collecting,
        }
    }
}

// ============================================================================
// History
// ============================================================================

/// Who produced a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Bot,
}

impl Sender {
    pub fn as_str(self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Bot => "bot",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Sender::User),
            "bot" => Some(Sender::Bot),
            _ => None,
        }
    }
}

/// One line of the conversation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "from")]
    pub sender: Sender,
    pub text: String,
}

// ============================================================================
// Marketplace data carried through effects
// ============================================================================

/// A listing returned by the marketplace search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub product_name: String,
    pub price: FieldValue,
    pub location: String,
    pub seller_phone: String,
}

/// A transaction ready to be forwarded to the marketplace backend
#[derive(Debug, Clone, PartialEq)]
pub enum CommitRequest {
    CreateListing {
        phone: String,
        product_name: FieldValue,
        quantity: FieldValue,
        price: FieldValue,
        location: FieldValue,
        category: FieldValue,
        description: FieldValue,
    },
    RegisterSeller {
        phone: String,
        business_name: FieldValue,
        location: FieldValue,
        payment_method: FieldValue,
    },
    SubmitReview {
        phone: String,
        rating: i64,
        comment: FieldValue,
    },
}

impl CommitRequest {
    pub fn intent(&self) -> Intent {
        match self {
            CommitRequest::CreateListing { .. } => Intent::Sell,
            CommitRequest::RegisterSeller { .. } => Intent::Register,
            CommitRequest::SubmitReview { .. } => Intent::Review,
        }
    }
}

/// Context for a single user's dialogue (immutable for the turn)
#[derive(Debug, Clone)]
pub struct ConvContext {
    pub user_id: String,
}

impl ConvContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

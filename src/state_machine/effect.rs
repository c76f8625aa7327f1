//! Effects produced by state transitions

use super::state::{CommitRequest, ConversationState, FieldValue, MatchResult, Sender};

/// Effects to be executed after a state transition, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append an entry to the user's conversation log
    AppendHistory { sender: Sender, text: String },

    /// Persist the new dialogue state (resets its expiry)
    PersistState(ConversationState),

    /// Remove the dialogue state
    ClearState,

    /// Ask the classifier for an intent and fields
    Classify { text: String },

    /// Forward a confirmed transaction to the marketplace backend
    Commit(CommitRequest),

    /// Search the marketplace for sellers of a product
    SearchSellers {
        product_name: Option<String>,
        location: Option<String>,
    },

    /// Tell every matched seller about the buyer (fire-and-forget)
    NotifySellers {
        product_name: Option<String>,
        location: Option<String>,
        matches: Vec<MatchResult>,
    },

    /// Remember a buyer whose search came back empty
    RecordDemand {
        product_name: String,
        location: String,
    },

    /// Tell buyers waiting on a new listing's product and location
    NotifyWaitingBuyers {
        product_name: String,
        location: String,
        price: FieldValue,
        seller_phone: String,
    },

    /// The reply text for this turn
    Reply { text: String },
}

impl Effect {
    pub fn user_said(text: impl Into<String>) -> Self {
        Effect::AppendHistory {
            sender: Sender::User,
            text: text.into(),
        }
    }

    pub fn bot_said(text: impl Into<String>) -> Self {
        Effect::AppendHistory {
            sender: Sender::Bot,
            text: text.into(),
        }
    }

    pub fn reply(text: impl Into<String>) -> Self {
        Effect::Reply { text: text.into() }
    }
}

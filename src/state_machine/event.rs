//! Events that drive a dialogue turn

use super::state::{CommitRequest, Fields, Intent, MatchResult};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    UserMessage {
        text: String,
    },

    // Classifier events
    Classified {
        intent: Intent,
        fields: Fields,
    },
    ClassificationFailed {
        #[allow(dead_code)] // Carried for debug output
        reason: String,
    },

    // Marketplace events
    CommitSucceeded {
        request: CommitRequest,
    },
    CommitFailed {
        intent: Intent,
        #[allow(dead_code)] // Carried for debug output
        message: String,
    },
    SearchCompleted {
        product_name: Option<String>,
        location: Option<String>,
        matches: Vec<MatchResult>,
    },
    SearchFailed {
        #[allow(dead_code)] // Carried for debug output
        message: String,
    },
}

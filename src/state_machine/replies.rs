//! User-facing reply text

use super::state::{FieldValue, Fields, Intent, MatchResult};
use std::fmt::Write;

pub const CANCELLED: &str = "❌ Okay, I've cancelled that request. Start over anytime.";
pub const NOT_UNDERSTOOD: &str = "🤔 I couldn't understand that. Try again?";
pub const CANNOT_CONFIRM: &str = "❌ Sorry, I can't confirm this action.";
pub const INVALID_RATING: &str = "⚠️ Rating must be an integer between 1 and 5.";
pub const SEARCH_FAILED: &str =
    "😓 Sorry, something went wrong while searching for sellers. Please try again later.";
/// Distinct from every other reply so operators can alert on it
pub const SERVICE_DEGRADED: &str =
    "🛠️ Our service is temporarily unavailable. Please try again in a few minutes.";

/// Field names are snake_case on the wire; users see words
fn humanize(field: &str) -> String {
    field.replace('_', " ")
}

fn product_label(product: Option<&str>) -> &str {
    product.unwrap_or("any product")
}

fn location_label(location: Option<&str>) -> &str {
    location.unwrap_or("any location")
}

pub fn ask_for(field: &str) -> String {
    format!("Thanks! Can you tell me your {}?", humanize(field))
}

pub fn confirmation(intent: Intent, fields: &Fields) -> String {
    let mut out = format!("You're trying to {intent} with:\n");
    for (name, value) in fields {
        let _ = writeln!(out, "- {}: {value}", humanize(name));
    }
    out.push_str("Reply YES to confirm or NO to cancel.");
    out
}

pub fn committed(intent: Intent) -> String {
    format!("✅ Your {intent} information has been saved!")
}

pub fn commit_failed(intent: Intent) -> String {
    format!("⚠️ Something went wrong posting your {intent}. Try again later.")
}

pub fn no_sellers(product: Option<&str>, location: Option<&str>) -> String {
    let (product, location) = (product_label(product), location_label(location));
    format!(
        "❌ No sellers currently found for {product} in {location}. \
         We'll let you know when one is available!"
    )
}

pub fn matches_found(
    product: Option<&str>,
    location: Option<&str>,
    matches: &[MatchResult],
) -> String {
    let (product, location) = (product_label(product), location_label(location));
    let mut out = format!(
        "✅ Found {} match(es) for {product} in {location}:",
        matches.len()
    );
    for m in matches {
        let _ = write!(
            out,
            "\n- {} at ${} ({}), seller: {}",
            m.product_name, m.price, m.location, m.seller_phone
        );
    }
    out
}

pub fn seller_notice(
    product: Option<&str>,
    location: Option<&str>,
    listing: &MatchResult,
) -> String {
    let (product, location) = (product_label(product), location_label(location));
    format!(
        "📢 A buyer is looking for {product} in {location}.\n\
         Your listing for {} at ${} is a match.\n\
         Reply if you're available!",
        listing.product_name, listing.price
    )
}

pub fn buyer_alert(product: &str, location: &str, price: &FieldValue, seller: &str) -> String {
    format!(
        "📢 Good news! {product} is now available in {location} at ${price}.\n\
         Contact the seller: {seller}"
    )
}

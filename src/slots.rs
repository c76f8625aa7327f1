//! Slot filling
//!
//! Pure functions over an intent, its required-field schema and the fields
//! accumulated so far. Completeness is key membership: a field explicitly
//! set to null still counts as present.

use crate::state_machine::state::{Fields, Intent};

/// Required fields per intent, in the order they are asked for
pub fn required_fields(intent: Intent) -> &'static [&'static str] {
    match intent {
        Intent::Sell => &["product_name", "quantity", "price", "location", "category"],
        Intent::Register => &["business_name", "location", "payment_method"],
        Intent::Buy => &["product_name", "location"],
        Intent::Review => &["rating"],
        Intent::ProductInfo => &[],
    }
}

/// True iff every required field for `intent` is a key of `fields`
pub fn is_complete(intent: Intent, fields: &Fields) -> bool {
    required_fields(intent)
        .iter()
        .all(|name| fields.contains_key(*name))
}

/// First required field (schema order) missing from `fields`
pub fn next_missing(intent: Intent, fields: &Fields) -> Option<&'static str> {
    required_fields(intent)
        .iter()
        .copied()
        .find(|name| !fields.contains_key(*name))
}

/// Right-biased shallow merge: `new` wins on key collision
pub fn merge(existing: &Fields, new: &Fields) -> Fields {
    let mut merged = existing.clone();
    merged.extend(new.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

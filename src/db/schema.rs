//! Database schema and types

use chrono::{DateTime, Utc};
use serde::Serialize;

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS user_state (
    user_id TEXT PRIMARY KEY,
    state TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    sender TEXT NOT NULL,
    text TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_history_user ON history(user_id, id);

CREATE TABLE IF NOT EXISTS demand_alerts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    product_name TEXT NOT NULL COLLATE NOCASE,
    location TEXT NOT NULL COLLATE NOCASE,
    created_at TEXT NOT NULL,

    UNIQUE (user_id, product_name, location)
);

CREATE INDEX IF NOT EXISTS idx_demand_product ON demand_alerts(product_name, location);
";

/// A buyer waiting for a product to be listed in a location
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DemandAlert {
    pub user_id: String,
    pub product_name: String,
    pub location: String,
    pub created_at: DateTime<Utc>,
}

//! HTTP client for the marketplace backend
//!
//! The backend owns sellers, listings and reviews. This side only forwards
//! confirmed transactions and runs seller searches.

use crate::state_machine::state::{CommitRequest, MatchResult};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_LISTINGS_URL: &str = "http://marketplace_api:5000/listings";
pub const DEFAULT_REGISTER_URL: &str = "http://marketplace_api:5000/register";
pub const DEFAULT_REVIEW_BASE_URL: &str = "http://marketplace_api:5000";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend unreachable: {0}")]
    Network(String),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("backend response could not be decoded: {0}")]
    Decode(String),

    #[error("backend request timed out")]
    Timeout,
}

impl BackendError {
    fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout
        } else if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else {
            BackendError::Network(e.to_string())
        }
    }
}

/// Backend endpoints
#[derive(Debug, Clone)]
pub struct MarketplaceConfig {
    pub listings_url: String,
    pub register_url: String,
    /// Reviews are posted to `{review_base_url}/review/{phone}`
    pub review_base_url: String,
    pub timeout: Duration,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            listings_url: DEFAULT_LISTINGS_URL.to_string(),
            register_url: DEFAULT_REGISTER_URL.to_string(),
            review_base_url: DEFAULT_REVIEW_BASE_URL.to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

impl MarketplaceConfig {
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            listings_url: get("LISTINGS_API_URL").unwrap_or(defaults.listings_url),
            register_url: get("REGISTER_API_URL").unwrap_or(defaults.register_url),
            review_base_url: get("REVIEW_API_URL").unwrap_or(defaults.review_base_url),
            timeout: get("BACKEND_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map_or(defaults.timeout, Duration::from_secs),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    matches: Vec<MatchResult>,
}

/// reqwest client for the marketplace API
#[derive(Clone)]
pub struct HttpMarketplace {
    client: Client,
    config: MarketplaceConfig,
}

impl HttpMarketplace {
    pub fn new(config: MarketplaceConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BackendError::Network(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// POST a confirmed transaction to its endpoint
    pub async fn commit(&self, request: &CommitRequest) -> Result<(), BackendError> {
        let (url, payload) = self.endpoint(request);
        tracing::info!(
            intent = %request.intent(),
            url = %url,
            "Posting transaction to marketplace"
        );

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(&e))?;
        check_status(response).await?;
        Ok(())
    }

    /// GET `{listings}/search` for sellers of a product in a location
    ///
    /// Absent terms are left out of the query rather than sent as text.
    pub async fn search(
        &self,
        product_name: Option<&str>,
        location: Option<&str>,
    ) -> Result<Vec<MatchResult>, BackendError> {
        let url = format!("{}/search", self.config.listings_url.trim_end_matches('/'));
        let params: Vec<(&str, &str)> = [("product_name", product_name), ("location", location)]
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect();
        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(&e))?;
        let response = check_status(response).await?;

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        tracing::debug!(
            ?product_name,
            ?location,
            matches = body.matches.len(),
            "Seller search finished"
        );
        Ok(body.matches)
    }

    fn endpoint(&self, request: &CommitRequest) -> (String, Value) {
        match request {
            CommitRequest::CreateListing {
                phone,
                product_name,
                quantity,
                price,
                location,
                category,
                description,
            } => (
                self.config.listings_url.clone(),
                json!({
                    "phone": phone,
                    "product_name": product_name.to_json(),
                    "quantity": quantity.to_json(),
                    "price": price.to_json(),
                    "location": location.to_json(),
                    "category": category.to_json(),
                    "description": description.to_json(),
                }),
            ),
            CommitRequest::RegisterSeller {
                phone,
                business_name,
                location,
                payment_method,
            } => (
                self.config.register_url.clone(),
                json!({
                    "phone": phone,
                    "business_name": business_name.to_json(),
                    "location": location.to_json(),
                    "payment_method": payment_method.to_json(),
                }),
            ),
            CommitRequest::SubmitReview {
                phone,
                rating,
                comment,
            } => (
                format!(
                    "{}/review/{phone}",
                    self.config.review_base_url.trim_end_matches('/')
                ),
                json!({
                    "rating": rating,
                    "comment": comment.to_json(),
                }),
            ),
        }
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        body,
    })
}

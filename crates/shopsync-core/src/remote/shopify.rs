//! Shopify Admin REST client for the remote catalog contract.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::models::{InventoryItem, RemotePage, RemoteProduct};
use crate::util::compact_text;

const HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRY_AFTER_SECS: u64 = 2;

/// Remote catalog client speaking the Shopify Admin REST API.
pub struct ShopifyCatalog {
    store_domain: String,
    access_token: String,
    api_version: String,
    client: reqwest::Client,
}

impl ShopifyCatalog {
    /// Create a new client from validated remote configuration.
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("shopsync/0.1")
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            store_domain: config.store_domain.clone(),
            access_token: config.access_token.clone(),
            api_version: config.api_version.clone(),
            client,
        })
    }

    /// Build API URL for an endpoint
    fn api_url(&self, endpoint: &str) -> String {
        format!(
            "https://{}/admin/api/{}/{}",
            self.store_domain, self.api_version, endpoint
        )
    }

    /// Build a request with the access-token header
    fn build_request(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header("X-Shopify-Access-Token", &self.access_token)
            .header("Accept", "application/json")
    }

    /// Map common HTTP error statuses onto the crate error taxonomy
    async fn handle_error_status(response: reqwest::Response, context: &str) -> Error {
        let status = response.status();
        match status {
            StatusCode::NOT_FOUND => Error::NotFound(context.to_string()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::RemoteApi(format!(
                "{context}: access denied ({})",
                status.as_u16()
            )),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_secs = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.trim().parse::<u64>().ok())
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                Error::RateLimited { retry_after_secs }
            }
            status if status.is_client_error() => {
                let body = response.text().await.unwrap_or_default();
                Error::Validation(format!(
                    "{context}: HTTP {} {}",
                    status.as_u16(),
                    compact_text(&body)
                ))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Error::RemoteApi(format!(
                    "{context}: HTTP {} {}",
                    status.as_u16(),
                    compact_text(&body)
                ))
            }
        }
    }
}

impl super::RemoteCatalog for ShopifyCatalog {
    async fn get_products(&self, batch_size: u32, page_cursor: Option<&str>) -> Result<RemotePage> {
        // With a page_info cursor the API rejects filter params other than limit
        let url = match page_cursor {
            Some(cursor) => {
                self.api_url(&format!("products.json?limit={batch_size}&page_info={cursor}"))
            }
            None => self.api_url(&format!("products.json?limit={batch_size}")),
        };

        tracing::debug!(url = %url, "fetching remote product page");
        let response = self.build_request(&url).send().await?;

        if !response.status().is_success() {
            return Err(Self::handle_error_status(response, "products").await);
        }

        let next_cursor = response
            .headers()
            .get(reqwest::header::LINK)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_next_page_info);

        let payload: ProductsResponse = response.json().await?;
        Ok(RemotePage {
            products: payload.products,
            next_cursor,
        })
    }

    async fn get_inventory_items(&self, ids: &[i64]) -> Result<Vec<InventoryItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let joined = ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let url = self.api_url(&format!("inventory_items.json?ids={joined}"));

        let response = self.build_request(&url).send().await?;
        if !response.status().is_success() {
            return Err(Self::handle_error_status(response, "inventory_items").await);
        }

        let payload: InventoryItemsResponse = response.json().await?;
        Ok(payload.inventory_items)
    }
}

#[derive(Debug, Deserialize)]
struct ProductsResponse {
    #[serde(default)]
    products: Vec<RemoteProduct>,
}

#[derive(Debug, Deserialize)]
struct InventoryItemsResponse {
    #[serde(default)]
    inventory_items: Vec<InventoryItem>,
}

/// Extract the `page_info` cursor from a Link header's rel="next" entry.
fn parse_next_page_info(link_header: &str) -> Option<String> {
    for part in link_header.split(',') {
        let part = part.trim();
        if !part.contains("rel=\"next\"") {
            continue;
        }
        let url = part.split(';').next()?.trim();
        let url = url.strip_prefix('<')?.strip_suffix('>')?;
        let query = url.split_once('?')?.1;
        for pair in query.split('&') {
            if let Some(value) = pair.strip_prefix("page_info=") {
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_next_page_info_extracts_cursor() {
        let header = "<https://shop.myshopify.com/admin/api/2024-01/products.json?limit=50&page_info=abc123>; rel=\"next\"";
        assert_eq!(parse_next_page_info(header), Some("abc123".to_string()));
    }

    #[test]
    fn parse_next_page_info_ignores_previous() {
        let header = "<https://shop.myshopify.com/admin/api/2024-01/products.json?page_info=before>; rel=\"previous\", \
                      <https://shop.myshopify.com/admin/api/2024-01/products.json?page_info=after>; rel=\"next\"";
        assert_eq!(parse_next_page_info(header), Some("after".to_string()));
    }

    #[test]
    fn parse_next_page_info_none_on_last_page() {
        let header = "<https://shop.myshopify.com/admin/api/2024-01/products.json?page_info=before>; rel=\"previous\"";
        assert_eq!(parse_next_page_info(header), None);
        assert_eq!(parse_next_page_info(""), None);
    }
}

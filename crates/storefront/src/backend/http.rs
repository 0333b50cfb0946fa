//! HTTP implementation of the backend contract.
//!
//! Every operation is a `POST {base_url}/rpc/{method}` whose body is the JSON
//! array of arguments. The backend replies with `{"ok": <value>}` or
//! `{"err": "<message>"}`.

use std::sync::Arc;

use async_trait::async_trait;
use bytebazaar_core::{
    BrandStory, Category, DigitalDownload, DigitalPurchase, ExternalBlob, HeroBanner,
    HomepageContent, Product, ProductId, ShoppingItem, StripeConfiguration, StripeSessionStatus,
    UserProfile, UserRole,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

use super::{Backend, BackendError};
use crate::config::BackendConfig;

/// Longest body excerpt written to logs.
const LOG_BODY_LIMIT: usize = 500;

/// Reply envelope used by every RPC method.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
enum Reply<T> {
    Ok(T),
    Err(String),
}

/// Backend client speaking JSON over HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    inner: Arc<HttpBackendInner>,
}

struct HttpBackendInner {
    client: reqwest::Client,
    base_url: Url,
    bearer_token: Option<String>,
}

impl HttpBackend {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        // Url::join drops the last path segment unless the base ends with '/'
        let mut base_url = config.base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            inner: Arc::new(HttpBackendInner {
                client,
                base_url,
                bearer_token: config.bearer_token().map(str::to_string),
            }),
        })
    }

    /// Endpoint for an RPC method.
    fn endpoint(&self, method: &str) -> Result<Url, BackendError> {
        self.inner
            .base_url
            .join(&format!("rpc/{method}"))
            .map_err(|e| BackendError::Rejected(format!("invalid endpoint for {method}: {e}")))
    }

    /// Execute an RPC call.
    #[instrument(skip(self, args), fields(request_id = tracing::field::Empty))]
    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        args: Value,
    ) -> Result<T, BackendError> {
        let request_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("request_id", request_id.as_str());

        let mut request = self
            .inner
            .client
            .post(self.endpoint(method)?)
            .header("x-request-id", &request_id)
            .json(&args);
        if let Some(token) = &self.inner.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        // Check for rate limiting
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(BackendError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %excerpt(&response_text),
                "Backend returned non-success status"
            );
            return Err(match status {
                reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                    BackendError::Unauthorized(excerpt(&response_text))
                }
                reqwest::StatusCode::NOT_FOUND => BackendError::NotFound(method.to_string()),
                _ => BackendError::Api {
                    status: status.as_u16(),
                    message: response_text.chars().take(200).collect(),
                },
            });
        }

        let reply: Reply<T> = serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %excerpt(&response_text),
                "Failed to parse backend reply"
            );
            BackendError::Parse(e)
        })?;

        match reply {
            Reply::Ok(value) => Ok(value),
            Reply::Err(message) => {
                debug!(message = %message, "Backend rejected call");
                Err(BackendError::Rejected(message))
            }
        }
    }

    /// Execute a write whose arguments may carry blobs held in memory.
    ///
    /// Upload progress is reported on each inline blob: 0 before the request
    /// and 100 once the backend accepted it.
    async fn call_with_uploads(
        &self,
        method: &'static str,
        args: Value,
        blobs: &[&ExternalBlob],
    ) -> Result<(), BackendError> {
        let uploads: Vec<&ExternalBlob> = blobs.iter().copied().filter(|b| b.is_inline()).collect();
        for blob in &uploads {
            blob.report_progress(0);
        }

        self.call::<()>(method, args).await?;

        for blob in &uploads {
            blob.report_progress(100);
        }
        Ok(())
    }

    /// Resolve a blob to its bytes, fetching URL blobs over HTTP.
    ///
    /// Relative URLs resolve against the backend base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the download fails.
    #[instrument(skip(self, blob))]
    pub async fn fetch_blob_bytes(&self, blob: &ExternalBlob) -> Result<Vec<u8>, BackendError> {
        if let Some(bytes) = blob.inline_bytes() {
            return Ok(bytes.to_vec());
        }

        let url = self
            .inner
            .base_url
            .join(&blob.direct_url())
            .map_err(|e| BackendError::Rejected(format!("invalid blob URL: {e}")))?;

        let response = self.inner.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: "blob download failed".to_string(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Truncate a response body for logging.
fn excerpt(body: &str) -> String {
    body.chars().take(LOG_BODY_LIMIT).collect()
}

#[async_trait]
impl Backend for HttpBackend {
    async fn get_caller_user_profile(&self) -> Result<Option<UserProfile>, BackendError> {
        self.call("getCallerUserProfile", json!([])).await
    }

    async fn save_caller_user_profile(&self, profile: UserProfile) -> Result<(), BackendError> {
        self.call("saveCallerUserProfile", json!([profile])).await
    }

    async fn is_caller_admin(&self) -> Result<bool, BackendError> {
        self.call("isCallerAdmin", json!([])).await
    }

    async fn get_caller_user_role(&self) -> Result<UserRole, BackendError> {
        self.call("getCallerUserRole", json!([])).await
    }

    async fn get_products(&self) -> Result<Vec<Product>, BackendError> {
        self.call("getProducts", json!([])).await
    }

    async fn get_product(&self, product_id: &ProductId) -> Result<Product, BackendError> {
        self.call("getProduct", json!([product_id])).await
    }

    async fn add_product(&self, product: Product) -> Result<(), BackendError> {
        let args = json!([product]);
        self.call_with_uploads("addProduct", args, &product.images.iter().collect::<Vec<_>>())
            .await
    }

    async fn update_product(&self, product: Product) -> Result<(), BackendError> {
        let args = json!([product]);
        self.call_with_uploads(
            "updateProduct",
            args,
            &product.images.iter().collect::<Vec<_>>(),
        )
        .await
    }

    async fn delete_product(&self, product_id: &ProductId) -> Result<(), BackendError> {
        self.call("deleteProduct", json!([product_id])).await
    }

    async fn set_product_images(
        &self,
        product_id: &ProductId,
        images: Vec<ExternalBlob>,
    ) -> Result<(), BackendError> {
        let args = json!([product_id, images]);
        self.call_with_uploads("setProductImages", args, &images.iter().collect::<Vec<_>>())
            .await
    }

    async fn get_categories(&self) -> Result<Vec<Category>, BackendError> {
        self.call("getCategories", json!([])).await
    }

    async fn add_category(&self, category: Category) -> Result<(), BackendError> {
        self.call("addCategory", json!([category])).await
    }

    async fn update_category(&self, category: Category) -> Result<(), BackendError> {
        self.call("updateCategory", json!([category])).await
    }

    async fn get_homepage_content(&self) -> Result<HomepageContent, BackendError> {
        self.call("getHomepageContent", json!([])).await
    }

    async fn set_hero_banner(&self, banner: HeroBanner) -> Result<(), BackendError> {
        let args = json!([banner]);
        let blobs: Vec<&ExternalBlob> = banner.background_image.iter().collect();
        self.call_with_uploads("setHeroBanner", args, &blobs).await
    }

    async fn set_brand_story(&self, story: BrandStory) -> Result<(), BackendError> {
        let args = json!([story]);
        let blobs: Vec<&ExternalBlob> = story.hero_image.iter().collect();
        self.call_with_uploads("setBrandStory", args, &blobs).await
    }

    async fn set_digital_download(
        &self,
        product_id: &ProductId,
        download: DigitalDownload,
    ) -> Result<(), BackendError> {
        let args = json!([product_id, download]);
        self.call_with_uploads("setDigitalDownload", args, &[&download.download_file])
            .await
    }

    async fn remove_digital_download(&self, product_id: &ProductId) -> Result<(), BackendError> {
        self.call("removeDigitalDownload", json!([product_id])).await
    }

    async fn record_digital_purchase(
        &self,
        product_id: &ProductId,
        allowed_downloads: u64,
    ) -> Result<(), BackendError> {
        self.call("recordDigitalPurchase", json!([product_id, allowed_downloads]))
            .await
    }

    async fn get_user_digital_purchases(&self) -> Result<Vec<DigitalPurchase>, BackendError> {
        self.call("getUserDigitalPurchases", json!([])).await
    }

    async fn create_checkout_session(
        &self,
        items: Vec<ShoppingItem>,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<String, BackendError> {
        self.call(
            "createCheckoutSession",
            json!([items, success_url, cancel_url]),
        )
        .await
    }

    async fn get_stripe_session_status(
        &self,
        session_id: &str,
    ) -> Result<StripeSessionStatus, BackendError> {
        self.call("getStripeSessionStatus", json!([session_id])).await
    }

    async fn is_stripe_configured(&self) -> Result<bool, BackendError> {
        self.call("isStripeConfigured", json!([])).await
    }

    async fn set_stripe_configuration(
        &self,
        config: StripeConfiguration,
    ) -> Result<(), BackendError> {
        self.call("setStripeConfiguration", json!([config])).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;

    use super::*;

    fn config(base: &str) -> BackendConfig {
        BackendConfig {
            base_url: Url::parse(base).unwrap(),
            api_token: Some(SecretString::from("tok")),
            request_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let backend = HttpBackend::new(&config("https://api.example.com/v1")).unwrap();
        assert_eq!(
            backend.endpoint("getProducts").unwrap().as_str(),
            "https://api.example.com/v1/rpc/getProducts"
        );

        let backend = HttpBackend::new(&config("https://api.example.com")).unwrap();
        assert_eq!(
            backend.endpoint("getProducts").unwrap().as_str(),
            "https://api.example.com/rpc/getProducts"
        );
    }

    #[test]
    fn test_reply_envelope() {
        let reply: Reply<Vec<u64>> = serde_json::from_str(r#"{"ok":[1,2]}"#).unwrap();
        assert!(matches!(reply, Reply::Ok(v) if v == vec![1, 2]));

        let reply: Reply<()> = serde_json::from_str(r#"{"ok":null}"#).unwrap();
        assert!(matches!(reply, Reply::Ok(())));

        let reply: Reply<()> = serde_json::from_str(r#"{"err":"Product not found"}"#).unwrap();
        assert!(matches!(reply, Reply::Err(m) if m == "Product not found"));
    }

    #[tokio::test]
    async fn test_fetch_inline_blob_skips_network() {
        let backend = HttpBackend::new(&config("https://api.example.com")).unwrap();
        let bytes = backend
            .fetch_blob_bytes(&ExternalBlob::from_bytes(vec![7, 8]))
            .await
            .unwrap();
        assert_eq!(bytes, vec![7, 8]);
    }
}

//! Remote cart API.
//!
//! [`CartApi`] is the seam the synchronizer talks through; [`HttpCartApi`]
//! is the reqwest implementation against the food-ordering server's form
//! endpoints.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Response;
use reqwest::StatusCode;
use reqwest::cookie::Jar;
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::config::CartConfig;
use crate::config::ConfigLoadError;
use crate::config::Endpoints;
use crate::config::ID_PLACEHOLDER;
use crate::csrf;
use crate::csrf::CookieOrMeta;
use crate::csrf::CsrfSource;
use crate::error::CartError;
use crate::error::CartResult;
use crate::model::ItemId;
use crate::model::ProductId;
use crate::model::Quantity;

/// What the server reported back for a successful add.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddConfirmation {
    /// Cart line the product landed in, when the server reports it.
    pub item_id: Option<ItemId>,
    /// Line quantity after the add, when the server reports it.
    pub quantity: Option<Quantity>,
}

#[async_trait]
pub trait CartApi: Send + Sync {
    async fn add_item(&self, product_id: &ProductId, quantity: Quantity)
    -> CartResult<AddConfirmation>;

    async fn update_item(&self, item_id: &ItemId, quantity: Quantity) -> CartResult<()>;

    async fn remove_item(&self, item_id: &ItemId) -> CartResult<()>;

    /// Authoritative number of lines in the cart.
    async fn cart_count(&self) -> CartResult<u32>;
}

#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error(transparent)]
    Config(#[from] ConfigLoadError),

    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// `{success, error}` envelope shared by the mutating endpoints.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    item_id: Option<Value>,
    #[serde(default)]
    quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u32,
}

/// The server renders ids as numbers; accept strings too.
fn id_from_json(value: &Value) -> Option<ItemId> {
    match value {
        Value::String(s) if !s.is_empty() => Some(ItemId::new(s.clone())),
        Value::Number(n) => Some(ItemId::new(n.to_string())),
        _ => None,
    }
}

pub struct HttpCartApi {
    client: reqwest::Client,
    base_url: Url,
    endpoints: Endpoints,
    csrf: Arc<dyn CsrfSource>,
}

impl HttpCartApi {
    /// Client with its own cookie jar, no redirect following (a redirect is
    /// how the server signals a missing session), and the configured timeout.
    pub fn new(config: &CartConfig) -> Result<Self, ClientBuildError> {
        config.validate()?;
        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .redirect(Policy::none())
            .timeout(config.timings.request_timeout())
            .build()?;
        let csrf = Arc::new(CookieOrMeta::new(jar, &config.csrf));
        Ok(Self::with_client(
            client,
            config.base_url()?,
            config.endpoints.clone(),
            csrf,
        ))
    }

    /// Use a preconfigured client. Redirect following should be disabled on
    /// it, otherwise sign-in redirects are followed instead of reported.
    pub fn with_client(
        client: reqwest::Client,
        base_url: Url,
        endpoints: Endpoints,
        csrf: Arc<dyn CsrfSource>,
    ) -> Self {
        Self {
            client,
            base_url,
            endpoints,
            csrf,
        }
    }

    fn endpoint_url(&self, template: &str, id: Option<&str>) -> CartResult<Url> {
        let mut url = self.base_url.clone();
        let base: Vec<String> = url
            .path_segments()
            .map(|segments| {
                segments
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let tail = template
            .trim_start_matches('/')
            .split('/')
            .map(|segment| match (segment, id) {
                (ID_PLACEHOLDER, Some(id)) => id,
                _ => segment,
            });
        url.path_segments_mut()
            .map_err(|()| CartError::Parse(format!("cannot build endpoint from {}", self.base_url)))?
            .clear()
            .extend(base.iter().map(String::as_str))
            .extend(tail);
        Ok(url)
    }

    async fn post_form(&self, url: Url, quantity: Option<Quantity>) -> CartResult<Response> {
        let token = self.csrf.token(&url).unwrap_or_else(|| {
            warn!("CSRF token not found in cookies or meta tag");
            String::new()
        });
        let mut form = vec![(csrf::FORM_FIELD, token.clone())];
        if let Some(quantity) = quantity {
            form.push(("quantity", quantity.to_string()));
        }
        let response = self
            .client
            .post(url)
            .header("X-Requested-With", "XMLHttpRequest")
            .header(csrf::HEADER, token)
            .form(&form)
            .send()
            .await?;
        Ok(response)
    }
}

fn auth_redirect(response: &Response) -> Option<CartError> {
    if !response.status().is_redirection() {
        return None;
    }
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    Some(CartError::AuthRequired { location })
}

async fn read_envelope(response: Response) -> CartResult<Envelope> {
    if let Some(err) = auth_redirect(&response) {
        return Err(err);
    }
    let status = response.status();
    let body = response.text().await?;
    let parsed = serde_json::from_str::<Envelope>(&body);

    if !status.is_success() {
        // Django views answer some refusals with 4xx plus the usual envelope.
        return match parsed {
            Ok(Envelope {
                error: Some(message),
                ..
            }) => Err(CartError::Application { message }),
            _ => Err(CartError::Status {
                status: status.as_u16(),
            }),
        };
    }

    let envelope = parsed.map_err(|e| CartError::Parse(e.to_string()))?;
    if envelope.success {
        Ok(envelope)
    } else {
        Err(CartError::Application {
            message: envelope.error.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl CartApi for HttpCartApi {
    async fn add_item(
        &self,
        product_id: &ProductId,
        quantity: Quantity,
    ) -> CartResult<AddConfirmation> {
        let url = self.endpoint_url(&self.endpoints.add_to_cart, Some(product_id.as_str()))?;
        let envelope = read_envelope(self.post_form(url, Some(quantity)).await?).await?;
        Ok(AddConfirmation {
            item_id: envelope.item_id.as_ref().and_then(id_from_json),
            quantity: envelope.quantity.and_then(Quantity::new),
        })
    }

    async fn update_item(&self, item_id: &ItemId, quantity: Quantity) -> CartResult<()> {
        let url = self.endpoint_url(&self.endpoints.update_item, Some(item_id.as_str()))?;
        read_envelope(self.post_form(url, Some(quantity)).await?).await?;
        Ok(())
    }

    async fn remove_item(&self, item_id: &ItemId) -> CartResult<()> {
        let url = self.endpoint_url(&self.endpoints.remove_item, Some(item_id.as_str()))?;
        read_envelope(self.post_form(url, None).await?).await?;
        Ok(())
    }

    async fn cart_count(&self) -> CartResult<u32> {
        let url = self.endpoint_url(&self.endpoints.cart_count, None)?;
        let response = self
            .client
            .get(url)
            .header("X-Requested-With", "XMLHttpRequest")
            .send()
            .await?;
        if let Some(err) = auth_redirect(&response) {
            return Err(err);
        }
        let status = response.status();
        if status != StatusCode::OK {
            return Err(CartError::Status {
                status: status.as_u16(),
            });
        }
        let body = response.text().await?;
        let parsed: CountResponse =
            serde_json::from_str(&body).map_err(|e| CartError::Parse(e.to_string()))?;
        Ok(parsed.count)
    }
}

use crate::config::ServiceConfig;
use crate::error::{GiftError, Operation, Result, ValidationError};
use crate::models::{
    CheckoutRequest, CheckoutResult, EmailResult, Friend, HistoryEntry, NewFriend,
    PostcardEmailRequest, PostcardRequest, PostcardResult, Suggestion, SuggestionRequest,
};
use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

/// Remote capabilities the gift workflows depend on.
///
/// Every call is one round trip. Nothing here is idempotent, so callers must
/// not retry blindly: a repeated checkout creates a second session.
#[async_trait]
pub trait GiftService: Send + Sync {
    async fn list_friends(&self) -> Result<Vec<Friend>>;

    async fn add_friend(&self, friend: &NewFriend) -> Result<Friend>;

    async fn suggest_gift(&self, req: &SuggestionRequest) -> Result<Suggestion>;

    async fn save_history(&self, entry: &Suggestion) -> Result<()>;

    /// An unknown recipient yields an empty list rather than an error.
    async fn list_history(&self, recipient: &str) -> Result<Vec<HistoryEntry>>;

    async fn checkout(&self, req: &CheckoutRequest) -> Result<CheckoutResult>;

    async fn render_postcard(&self, req: &PostcardRequest) -> Result<PostcardResult>;

    async fn email_postcard(&self, req: &PostcardEmailRequest) -> Result<EmailResult>;
}

/// [`GiftService`] speaking JSON over HTTP.
#[derive(Clone, Debug)]
pub struct HttpGiftService {
    client: Client,
    config: ServiceConfig,
}

impl HttpGiftService {
    pub fn new(config: ServiceConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    /// Reuse an existing connection pool.
    pub fn with_client(client: Client, config: ServiceConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Turn a server-relative link (e.g. a rendered postcard) into an
    /// absolute one. Absolute links are returned unchanged.
    pub fn resolve_url(&self, link: &str) -> std::result::Result<Url, url::ParseError> {
        match Url::parse(link) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => self.config.endpoint(link),
            Err(e) => Err(e),
        }
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        operation: Operation,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<Response> {
        let url = self.config.endpoint(path).map_err(|e| {
            warn!(%operation, path, error = %e, "cannot build gift service url");
            ValidationError::InvalidBaseUrl(self.config.base_url.to_string())
        })?;
        debug!(%operation, %method, %url, "gift service request");
        let mut req = self.client.request(method, url);
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await.map_err(|e| {
            warn!(%operation, error = %e, "gift service unreachable");
            GiftError::transport(operation, e)
        })?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let text = resp.text().await.unwrap_or_default();
        let message = error_message(&text);
        warn!(%operation, status = status.as_u16(), ?message, "gift service failure");
        Err(GiftError::Service {
            operation,
            status: status.as_u16(),
            message,
        })
    }

    async fn call<B, T>(
        &self,
        operation: Operation,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(operation, method, path, query, body)
            .await?
            .json::<T>()
            .await
            .map_err(|e| GiftError::transport(operation, e))
    }
}

/// Pull the human-readable reason out of a failure body.
///
/// `{"error": "..."}` is the documented shape; a string `detail` (as emitted
/// by request validation on the service) is accepted as well.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["error", "detail"]
        .iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

/// Reject a 2xx body that is missing a field we cannot do without.
fn required(operation: Operation, value: Option<String>) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(GiftError::Service {
            operation,
            status: 200,
            message: None,
        })
}

#[derive(serde::Deserialize)]
struct CheckoutBody {
    checkout_url: Option<String>,
}

#[derive(serde::Deserialize)]
struct PostcardBody {
    image_url: Option<String>,
}

#[async_trait]
impl GiftService for HttpGiftService {
    async fn list_friends(&self) -> Result<Vec<Friend>> {
        self.call::<(), _>(Operation::ListFriends, Method::GET, "/api/friends", &[], None)
            .await
    }

    async fn add_friend(&self, friend: &NewFriend) -> Result<Friend> {
        self.call(
            Operation::AddFriend,
            Method::POST,
            "/api/friends",
            &[],
            Some(friend),
        )
        .await
    }

    async fn suggest_gift(&self, req: &SuggestionRequest) -> Result<Suggestion> {
        self.call(
            Operation::SuggestGift,
            Method::POST,
            "/api/suggest-gift",
            &[],
            Some(req),
        )
        .await
    }

    async fn save_history(&self, entry: &Suggestion) -> Result<()> {
        self.send(
            Operation::SaveHistory,
            Method::POST,
            "/api/gift-history",
            &[],
            Some(entry),
        )
        .await?;
        Ok(())
    }

    async fn list_history(&self, recipient: &str) -> Result<Vec<HistoryEntry>> {
        let entries: Option<Vec<HistoryEntry>> = self
            .call::<(), _>(
                Operation::ListHistory,
                Method::GET,
                "/api/gift-history",
                &[("recipient", recipient)],
                None,
            )
            .await?;
        Ok(entries.unwrap_or_default())
    }

    async fn checkout(&self, req: &CheckoutRequest) -> Result<CheckoutResult> {
        let body: CheckoutBody = self
            .call(
                Operation::Checkout,
                Method::POST,
                "/api/create-checkout-session",
                &[],
                Some(req),
            )
            .await?;
        Ok(CheckoutResult {
            checkout_url: required(Operation::Checkout, body.checkout_url)?,
        })
    }

    async fn render_postcard(&self, req: &PostcardRequest) -> Result<PostcardResult> {
        let body: PostcardBody = self
            .call(
                Operation::RenderPostcard,
                Method::POST,
                "/api/generate-postcard",
                &[],
                Some(req),
            )
            .await?;
        Ok(PostcardResult {
            image_url: required(Operation::RenderPostcard, body.image_url)?,
        })
    }

    async fn email_postcard(&self, req: &PostcardEmailRequest) -> Result<EmailResult> {
        self.send(
            Operation::EmailPostcard,
            Method::POST,
            "/api/email-postcard",
            &[],
            Some(req),
        )
        .await?;
        Ok(EmailResult { delivered: true })
    }
}

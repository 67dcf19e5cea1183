//! REST calls that accompany the gateway session.
//!
//! Every request goes to `{api_base}{path}` with three fixed headers:
//! `Authorization: Bot <token>`, a library `User-Agent`, and a JSON
//! content type. The client does not retry; callers that care decide.

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Method};
use serde_json::Value;
use wavegate_protocol::ChannelId;
use wavegate_session::GatewayConfig;

/// Errors from REST calls.
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    /// The request could not be sent or the response could not be read.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API returned {status}: {body}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The response body, as text.
        body: String,
    },

    /// The token cannot be used as a header value.
    #[error("invalid authorization header")]
    InvalidToken(#[from] header::InvalidHeaderValue),
}

/// A thin client for the REST API. Cheap to clone.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: Client,
    api_base: String,
}

impl RestClient {
    /// Builds a client with the token and API base from `config`.
    pub fn new(config: &GatewayConfig) -> Result<Self, RestError> {
        let mut auth = HeaderValue::from_str(&format!("Bot {}", config.token.expose()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        let http = Client::builder()
            .default_headers(headers)
            .user_agent(concat!(
                "DiscordBot (https://github.com/wavegate/wavegate, ",
                env!("CARGO_PKG_VERSION"),
                ")"
            ))
            .build()?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_owned(),
        })
    }

    /// The full URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    /// Sends one request. Returns the decoded JSON body, or `None` for an
    /// empty response (204).
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, RestError> {
        let url = self.url(path);
        tracing::debug!(%method, %url, "REST request");

        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), %url, "REST request failed");
            return Err(RestError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&text).unwrap_or(Value::String(text))))
    }

    /// `POST /channels/{channel}/messages`
    pub async fn send_message(
        &self,
        channel: &ChannelId,
        body: &Value,
    ) -> Result<Option<Value>, RestError> {
        self.request(Method::POST, &format!("/channels/{channel}/messages"), Some(body))
            .await
    }

    /// `PATCH /channels/{channel}/messages/{message}`
    pub async fn edit_message(
        &self,
        channel: &ChannelId,
        message: &str,
        body: &Value,
    ) -> Result<Option<Value>, RestError> {
        self.request(
            Method::PATCH,
            &format!("/channels/{channel}/messages/{message}"),
            Some(body),
        )
        .await
    }

    /// `POST /channels/{channel}/typing`
    pub async fn trigger_typing(&self, channel: &ChannelId) -> Result<(), RestError> {
        self.request(Method::POST, &format!("/channels/{channel}/typing"), None)
            .await
            .map(|_| ())
    }

    /// `POST /interactions/{id}/{token}/callback`
    pub async fn reply_interaction(
        &self,
        interaction_id: &str,
        interaction_token: &str,
        body: &Value,
    ) -> Result<Option<Value>, RestError> {
        self.request(
            Method::POST,
            &format!("/interactions/{interaction_id}/{interaction_token}/callback"),
            Some(body),
        )
        .await
    }

    /// `PATCH /webhooks/{application}/{token}/messages/@original`
    pub async fn edit_original_reply(
        &self,
        application_id: &str,
        interaction_token: &str,
        body: &Value,
    ) -> Result<Option<Value>, RestError> {
        self.request(
            Method::PATCH,
            &format!("/webhooks/{application_id}/{interaction_token}/messages/@original"),
            Some(body),
        )
        .await
    }
}

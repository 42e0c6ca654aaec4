use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::article::{Article, ArticleFields, ArticleId, UserId};
use crate::config::{build_auth_header, Config, SecureString};
use crate::gateway::{ArticleGateway, CreateRequest, GatewayError, Page, StatusTarget, UpdateRequest};
use crate::store::ListFilter;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// `ArticleGateway` over the backend's JSON REST API.
pub struct HttpGateway {
    client: Client,
    base_url: String,
    token: Option<SecureString>,
    page_size: u32,
    timeout: Duration,
}

impl HttpGateway {
    pub fn new(config: &Config) -> Result<Self, GatewayError> {
        let timeout = Duration::from_secs(u64::from(config.server.timeout_seconds));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(u64::from(
                config.server.connect_timeout_seconds,
            )))
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Network {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.server.base_url.trim_end_matches('/').to_string(),
            token: config.server.api_token.clone(),
            page_size: config.paging.page_size,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some((name, value)) = build_auth_header(self.token.as_ref()) {
            builder = builder.header(name, value);
        }
        builder
    }

    async fn execute(
        &self,
        builder: RequestBuilder,
        operation: &'static str,
    ) -> Result<Vec<u8>, GatewayError> {
        let request_id = Uuid::new_v4().to_string();
        tracing::debug!(request_id = %request_id, operation, "Sending request");

        let response = builder
            .header(REQUEST_ID_HEADER, &request_id)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            let message = error_message(status, &body);
            tracing::debug!(
                request_id = %request_id,
                operation,
                status = status.as_u16(),
                message = %message,
                "Request rejected"
            );
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        tracing::debug!(request_id = %request_id, operation, status = status.as_u16(), "Request completed");
        Ok(body.to_vec())
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        operation: &'static str,
    ) -> Result<T, GatewayError> {
        let body = self.execute(builder, operation).await?;
        serde_json::from_slice(&body).map_err(|e| GatewayError::Decode {
            message: format!("{}: {}", operation, e),
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout {
                duration: self.timeout.as_secs(),
            }
        } else if err.is_decode() {
            GatewayError::Decode {
                message: err.to_string(),
            }
        } else {
            GatewayError::Network {
                message: err.to_string(),
            }
        }
    }
}

impl ArticleGateway for HttpGateway {
    async fn list(&self, filter: ListFilter, page: u32) -> Result<Page, GatewayError> {
        let path = format!("/articles?{}", list_query(&filter, page, self.page_size));
        self.execute_json(self.request(Method::GET, &path), "list")
            .await
    }

    async fn get(&self, id: ArticleId) -> Result<Article, GatewayError> {
        let path = format!("/articles/{}", id);
        self.execute_json(self.request(Method::GET, &path), "get")
            .await
    }

    async fn create(&self, author: UserId, fields: ArticleFields) -> Result<Article, GatewayError> {
        let body = CreateRequest {
            author_id: author,
            fields: &fields,
        };
        let builder = self.request(Method::POST, "/articles").json(&body);
        self.execute_json(builder, "create").await
    }

    async fn update(
        &self,
        id: ArticleId,
        fields: Option<ArticleFields>,
        target: StatusTarget,
    ) -> Result<Article, GatewayError> {
        let body = UpdateRequest {
            fields: fields.as_ref(),
            status: target,
        };
        let path = format!("/articles/{}", id);
        let builder = self.request(Method::PUT, &path).json(&body);
        self.execute_json(builder, "update").await
    }

    async fn delete(&self, id: ArticleId) -> Result<(), GatewayError> {
        let path = format!("/articles/{}", id);
        self.execute(self.request(Method::DELETE, &path), "delete")
            .await
            .map(|_| ())
    }
}

/// Query string for a list request. Values are numbers and status names,
/// so no escaping is needed.
pub fn list_query(filter: &ListFilter, page: u32, page_size: u32) -> String {
    let mut query = format!("page={}&size={}", page, page_size);
    if let Some(statuses) = filter.statuses() {
        let joined: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
        query.push_str(&format!("&status={}", joined.join(",")));
    }
    if let Some(author) = filter.author() {
        query.push_str(&format!("&author_id={}", author));
    }
    if let Some(category) = filter.category() {
        query.push_str(&format!("&category_id={}", category));
    }
    query
}

/// Pulls a human-readable message out of an error body.
fn error_message(status: StatusCode, body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        let message = value
            .get("message")
            .and_then(|m| m.as_str())
            .or_else(|| value.get("error").and_then(|e| e.as_str()))
            .or_else(|| {
                value
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
            });
        if let Some(message) = message {
            return message.to_string();
        }
    }

    let text = String::from_utf8_lossy(body).trim().to_string();
    if text.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        text
    }
}

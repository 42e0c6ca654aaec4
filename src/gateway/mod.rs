//! REST boundary for articles.
//!
//! [`ArticleGateway`] is the only way the core talks to the backend. It
//! reports success or failure and never retries on its own.

mod error;
mod http;
mod memory;

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize, Serializer};

use crate::article::{Article, ArticleFields, ArticleId, ArticleStatus, UserId};
use crate::store::ListFilter;

pub use error::GatewayError;
pub use http::{list_query, HttpGateway};
pub use memory::MemoryGateway;

/// One page of a list response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub items: Vec<Article>,
    pub page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_count: u64,
}

/// Status requested by an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTarget {
    Set(ArticleStatus),
    /// Let the server restore the status that preceded the pending request.
    RestorePrevious,
}

impl StatusTarget {
    pub const RESTORE_PREVIOUS: &'static str = "RESTORE_PREVIOUS";

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusTarget::Set(status) => status.as_str(),
            StatusTarget::RestorePrevious => Self::RESTORE_PREVIOUS,
        }
    }
}

impl fmt::Display for StatusTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for StatusTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Body of `PUT /articles/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<&'a ArticleFields>,
    pub status: StatusTarget,
}

/// Body of `POST /articles`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRequest<'a> {
    pub author_id: UserId,
    #[serde(flatten)]
    pub fields: &'a ArticleFields,
}

pub trait ArticleGateway: Send + Sync + 'static {
    /// One page of the list described by `filter`, most recent first.
    fn list(
        &self,
        filter: ListFilter,
        page: u32,
    ) -> impl Future<Output = Result<Page, GatewayError>> + Send;

    fn get(&self, id: ArticleId) -> impl Future<Output = Result<Article, GatewayError>> + Send;

    /// Creates a new article; the server assigns the id and starts it as a draft.
    fn create(
        &self,
        author: UserId,
        fields: ArticleFields,
    ) -> impl Future<Output = Result<Article, GatewayError>> + Send;

    /// The single mutation point for every status change.
    fn update(
        &self,
        id: ArticleId,
        fields: Option<ArticleFields>,
        target: StatusTarget,
    ) -> impl Future<Output = Result<Article, GatewayError>> + Send;

    fn delete(&self, id: ArticleId) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

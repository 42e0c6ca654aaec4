use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Server-assigned article identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(pub i64);

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub i64);

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Moderation status of an article.
///
/// The wire form is the upper snake-case name. Unknown values are a hard
/// decode error rather than a fallback to `Draft`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ArticleStatus {
    Draft,
    PendingReview,
    Published,
    Rejected,
    PendingUpdate,
    PendingDeletion,
}

impl ArticleStatus {
    /// Stable wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::PendingReview => "PENDING_REVIEW",
            Self::Published => "PUBLISHED",
            Self::Rejected => "REJECTED",
            Self::PendingUpdate => "PENDING_UPDATE",
            Self::PendingDeletion => "PENDING_DELETION",
        }
    }

    /// All variants for iteration.
    pub fn all() -> &'static [ArticleStatus] {
        &[
            Self::Draft,
            Self::PendingReview,
            Self::Published,
            Self::Rejected,
            Self::PendingUpdate,
            Self::PendingDeletion,
        ]
    }
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status or role string the server sent that this client does not know.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown article status '{0}'")]
    UnknownStatus(String),

    #[error("unknown user role '{0}'")]
    UnknownRole(String),
}

impl FromStr for ArticleStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        Self::all()
            .iter()
            .copied()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| ParseError::UnknownStatus(s.to_string()))
    }
}

impl TryFrom<String> for ArticleStatus {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ArticleStatus> for String {
    fn from(status: ArticleStatus) -> Self {
        status.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    Admin,
    Editor,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Editor => "EDITOR",
            Self::User => "USER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Self::Admin),
            "EDITOR" => Ok(Self::Editor),
            "USER" => Ok(Self::User),
            _ => Err(ParseError::UnknownRole(s.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

/// The user on whose behalf an action is performed.
///
/// Passed explicitly into every workflow call; authorization is a function
/// of this value and the article alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    pub fn admin(id: i64) -> Self {
        Self::new(UserId(id), Role::Admin)
    }

    pub fn editor(id: i64) -> Self {
        Self::new(UserId(id), Role::Editor)
    }

    pub fn reader(id: i64) -> Self {
        Self::new(UserId(id), Role::User)
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.role, self.id)
    }
}

impl FromStr for Actor {
    type Err = String;

    /// Parses `role:id`, e.g. `editor:3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (role, id) = s
            .split_once(':')
            .ok_or_else(|| format!("expected <role>:<user-id>, got '{}'", s))?;
        let role: Role = role.parse().map_err(|e: ParseError| e.to_string())?;
        let id: i64 = id
            .trim()
            .parse()
            .map_err(|_| format!("invalid user id '{}'", id))?;
        Ok(Self::new(UserId(id), role))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl User {
    pub fn as_actor(&self) -> Actor {
        Actor::new(self.id, self.role)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Editable content of an article.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleFields {
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,
}

impl ArticleFields {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: CategoryId) -> Self {
        self.category_id = Some(category);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    pub author_id: UserId,
    #[serde(default)]
    pub views: u64,
    pub status: ArticleStatus,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    /// Proposed content awaiting an admin decision while `PendingUpdate`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_revision: Option<ArticleFields>,
}

impl Article {
    /// The current (approved) content of the article.
    pub fn fields(&self) -> ArticleFields {
        ArticleFields {
            title: self.title.clone(),
            content: self.content.clone(),
            image_url: self.image_url.clone(),
            thumbnail_url: self.thumbnail_url.clone(),
            video_url: self.video_url.clone(),
            category_id: self.category_id,
        }
    }

    pub fn apply_fields(&mut self, fields: ArticleFields) {
        self.title = fields.title;
        self.content = fields.content;
        self.image_url = fields.image_url;
        self.thumbnail_url = fields.thumbnail_url;
        self.video_url = fields.video_url;
        self.category_id = fields.category_id;
    }
}

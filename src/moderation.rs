//! Moderation workflow.
//!
//! The only path through which an article's status changes. Each action is
//! checked against the status machine, sent to the gateway, and the store is
//! updated from the server's answer. Nothing is committed locally before the
//! server confirms.

use std::sync::Arc;

use thiserror::Error;

use crate::article::{
    Action, Actor, Article, ArticleFields, ArticleId, ArticleStatus, Role, StatusError,
    StatusMachine, Transition, UserId,
};
use crate::gateway::{ArticleGateway, GatewayError, StatusTarget};
use crate::store::{ArticleStore, ListFilter};

/// An action together with the content it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationAction {
    SubmitForReview,
    Approve,
    Reject,
    RequestEdit(ArticleFields),
    ApproveChange,
    RejectChange,
    RequestDeletion,
    ConfirmDeletion,
    RejectDeletion,
    Resubmit(ArticleFields),
    Unpublish,
}

impl ModerationAction {
    pub fn kind(&self) -> Action {
        match self {
            Self::SubmitForReview => Action::SubmitForReview,
            Self::Approve => Action::Approve,
            Self::Reject => Action::Reject,
            Self::RequestEdit(_) => Action::RequestEdit,
            Self::ApproveChange => Action::ApproveChange,
            Self::RejectChange => Action::RejectChange,
            Self::RequestDeletion => Action::RequestDeletion,
            Self::ConfirmDeletion => Action::ConfirmDeletion,
            Self::RejectDeletion => Action::RejectDeletion,
            Self::Resubmit(_) => Action::Resubmit,
            Self::Unpublish => Action::Unpublish,
        }
    }

    /// Builds the action for `kind`; edit actions need `fields`.
    pub fn from_kind(kind: Action, fields: Option<ArticleFields>) -> Option<Self> {
        let action = match kind {
            Action::SubmitForReview => Self::SubmitForReview,
            Action::Approve => Self::Approve,
            Action::Reject => Self::Reject,
            Action::RequestEdit => Self::RequestEdit(fields?),
            Action::ApproveChange => Self::ApproveChange,
            Action::RejectChange => Self::RejectChange,
            Action::RequestDeletion => Self::RequestDeletion,
            Action::ConfirmDeletion => Self::ConfirmDeletion,
            Action::RejectDeletion => Self::RejectDeletion,
            Action::Resubmit => Self::Resubmit(fields?),
            Action::Unpublish => Self::Unpublish,
        };
        Some(action)
    }

    /// Whether sending the request twice leaves the server as sending it
    /// once. A confirmed deletion whose reply was lost must not be repeated.
    pub fn is_repeatable(&self) -> bool {
        !matches!(self, Self::ConfirmDeletion)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModerationError {
    #[error("{role} may not {action} an article in status {from}")]
    InvalidTransition {
        role: Role,
        from: ArticleStatus,
        action: Action,
    },

    #[error("{actor} is not the author of article {article} (author is {author})")]
    NotAuthor {
        actor: Actor,
        article: ArticleId,
        author: UserId,
    },

    #[error("{role} may not create articles")]
    CreateNotPermitted { role: Role },

    #[error("article {article} has no pending revision to approve")]
    MissingRevision { article: ArticleId },

    #[error("Failed to {action} article: {source}")]
    RemoteMutationFailed {
        action: String,
        article: Option<ArticleId>,
        #[source]
        source: GatewayError,
    },

    #[error("Failed to load article {article}: {source}")]
    RemoteFetchFailed {
        article: ArticleId,
        #[source]
        source: GatewayError,
    },
}

impl From<StatusError> for ModerationError {
    fn from(err: StatusError) -> Self {
        match err {
            StatusError::InvalidTransition { role, from, action } => {
                ModerationError::InvalidTransition { role, from, action }
            }
            StatusError::NotAuthor {
                actor,
                article,
                author,
            } => ModerationError::NotAuthor {
                actor,
                article,
                author,
            },
        }
    }
}

impl ModerationError {
    /// The gateway failure behind a remote error, if any.
    pub fn gateway_error(&self) -> Option<&GatewayError> {
        match self {
            ModerationError::RemoteMutationFailed { source, .. }
            | ModerationError::RemoteFetchFailed { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Rejected locally, before any network call.
    pub fn is_local(&self) -> bool {
        self.gateway_error().is_none()
    }
}

/// The confirmed result of a successful action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created(Article),
    Updated { previous: Article, article: Article },
    Removed(Article),
}

impl Outcome {
    pub fn article_id(&self) -> ArticleId {
        match self {
            Outcome::Created(article) | Outcome::Removed(article) => article.id,
            Outcome::Updated { article, .. } => article.id,
        }
    }

    /// The server's representation after the action, unless it was removed.
    pub fn article(&self) -> Option<&Article> {
        match self {
            Outcome::Created(article) | Outcome::Updated { article, .. } => Some(article),
            Outcome::Removed(_) => None,
        }
    }

    /// Whether the list's contents or counts may have changed.
    pub fn affects(&self, filter: &ListFilter) -> bool {
        match self {
            Outcome::Created(article) | Outcome::Removed(article) => filter.matches(article),
            Outcome::Updated { previous, article } => {
                filter.matches(previous) || filter.matches(article)
            }
        }
    }
}

pub struct ModerationWorkflow<G> {
    gateway: Arc<G>,
    store: ArticleStore,
}

impl<G: ArticleGateway> ModerationWorkflow<G> {
    pub fn new(gateway: Arc<G>, store: ArticleStore) -> Self {
        Self { gateway, store }
    }

    /// Performs `action` on `article` as `actor`.
    ///
    /// # Errors
    /// Local rule violations return before any network call. Gateway failures
    /// return `RemoteMutationFailed` and leave the store unchanged.
    pub async fn perform(
        &self,
        action: &ModerationAction,
        article: &Article,
        actor: &Actor,
    ) -> Result<Outcome, ModerationError> {
        let kind = action.kind();
        let transition = StatusMachine::authorize(actor, article, kind).map_err(|err| {
            tracing::debug!(article = %article.id, actor = %actor, error = %err, "Action refused");
            ModerationError::from(err)
        })?;

        let remote_failed = |source: GatewayError| {
            tracing::warn!(
                article = %article.id,
                action = %kind,
                error = %source,
                "Moderation action failed remotely"
            );
            ModerationError::RemoteMutationFailed {
                action: kind.to_string(),
                article: Some(article.id),
                source,
            }
        };

        let target = match transition {
            Transition::Remove => {
                self.gateway
                    .delete(article.id)
                    .await
                    .map_err(remote_failed)?;
                self.store.remove(article.id);
                tracing::info!(article = %article.id, actor = %actor, "Article deleted");
                return Ok(Outcome::Removed(article.clone()));
            }
            Transition::To(status) => StatusTarget::Set(status),
            Transition::RestorePrevious => StatusTarget::RestorePrevious,
        };

        let fields = Self::payload(action, article)?;
        let updated = self
            .gateway
            .update(article.id, fields, target)
            .await
            .map_err(remote_failed)?;

        tracing::info!(
            article = %article.id,
            actor = %actor,
            action = %kind,
            from = %article.status,
            to = %updated.status,
            "Article status changed"
        );
        self.apply(updated.clone());
        Ok(Outcome::Updated {
            previous: article.clone(),
            article: updated,
        })
    }

    /// Creates a new draft authored by `actor`.
    pub async fn create(
        &self,
        fields: ArticleFields,
        actor: &Actor,
    ) -> Result<Outcome, ModerationError> {
        if !StatusMachine::can_create(actor.role) {
            return Err(ModerationError::CreateNotPermitted { role: actor.role });
        }

        let created = self
            .gateway
            .create(actor.id, fields)
            .await
            .map_err(|source| ModerationError::RemoteMutationFailed {
                action: "create".to_string(),
                article: None,
                source,
            })?;

        tracing::info!(article = %created.id, actor = %actor, status = %created.status, "Article created");
        if let Err(err) = self.store.insert(created.clone()) {
            tracing::error!(error = %err, "Store out of sync with server, insert ignored");
        }
        Ok(Outcome::Created(created))
    }

    /// Content sent with the status change.
    fn payload(
        action: &ModerationAction,
        article: &Article,
    ) -> Result<Option<ArticleFields>, ModerationError> {
        match action {
            ModerationAction::RequestEdit(fields) | ModerationAction::Resubmit(fields) => {
                Ok(Some(fields.clone()))
            }
            ModerationAction::ApproveChange => article
                .pending_revision
                .clone()
                .map(Some)
                .ok_or(ModerationError::MissingRevision {
                    article: article.id,
                }),
            _ => Ok(None),
        }
    }

    fn apply(&self, article: Article) {
        if let Err(err) = self.store.update(article) {
            tracing::error!(error = %err, "Store out of sync with server, update ignored");
        }
    }
}

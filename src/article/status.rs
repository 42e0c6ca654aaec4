//! Article moderation state machine.
//!
//! Pure, deterministic transition rules and the capability query that every
//! screen uses to decide whether an article is locked, editable or visible.
//! No I/O happens here.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::types::{Actor, Article, ArticleId, ArticleStatus, Role, UserId};

/// A moderation action, independent of any payload it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Editor submits their draft, or an admin promotes a draft into review.
    SubmitForReview,
    Approve,
    Reject,
    RequestEdit,
    ApproveChange,
    RejectChange,
    RequestDeletion,
    ConfirmDeletion,
    RejectDeletion,
    /// Editor edits a draft or rejected article; it goes back to draft.
    Resubmit,
    Unpublish,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubmitForReview => "submit",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::RequestEdit => "request-edit",
            Self::ApproveChange => "approve-change",
            Self::RejectChange => "reject-change",
            Self::RequestDeletion => "request-deletion",
            Self::ConfirmDeletion => "confirm-deletion",
            Self::RejectDeletion => "reject-deletion",
            Self::Resubmit => "resubmit",
            Self::Unpublish => "unpublish",
        }
    }

    pub fn all() -> &'static [Action] {
        &[
            Self::SubmitForReview,
            Self::Approve,
            Self::Reject,
            Self::RequestEdit,
            Self::ApproveChange,
            Self::RejectChange,
            Self::RequestDeletion,
            Self::ConfirmDeletion,
            Self::RejectDeletion,
            Self::Resubmit,
            Self::Unpublish,
        ]
    }

    /// Whether the action is taken by the article's author rather than an admin.
    pub fn is_editor_action(&self) -> bool {
        matches!(
            self,
            Self::SubmitForReview | Self::RequestEdit | Self::RequestDeletion | Self::Resubmit
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::all()
            .iter()
            .copied()
            .find(|action| action.as_str() == wanted)
            .ok_or_else(|| format!("unknown action '{}'", s))
    }
}

/// What a legal transition does to the article.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    To(ArticleStatus),
    /// The server restores whatever status preceded the pending request.
    RestorePrevious,
    /// The article is deleted remotely and dropped locally.
    Remove,
}

/// The two admin review queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReviewQueue {
    /// Drafts and articles awaiting first review.
    NewContent,
    /// Pending edits and pending deletions of existing articles.
    ChangeRequests,
}

impl ReviewQueue {
    pub fn statuses(&self) -> &'static [ArticleStatus] {
        match self {
            Self::NewContent => &[ArticleStatus::Draft, ArticleStatus::PendingReview],
            Self::ChangeRequests => &[
                ArticleStatus::PendingUpdate,
                ArticleStatus::PendingDeletion,
            ],
        }
    }

    pub fn of(status: ArticleStatus) -> Option<Self> {
        match status {
            ArticleStatus::Draft | ArticleStatus::PendingReview => Some(Self::NewContent),
            ArticleStatus::PendingUpdate | ArticleStatus::PendingDeletion => {
                Some(Self::ChangeRequests)
            }
            ArticleStatus::Published | ArticleStatus::Rejected => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
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
}

/// What a given role may do with an article in a given status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    /// An admin decision is outstanding; the editor may not start another request.
    pub locked: bool,
    pub can_edit: bool,
    pub can_request_deletion: bool,
    pub visible: bool,
    pub queue: Option<ReviewQueue>,
    pub actions: Vec<Action>,
}

pub struct StatusMachine;

impl StatusMachine {
    /// Statuses with an admin decision outstanding.
    pub const LOCKED: [ArticleStatus; 3] = [
        ArticleStatus::PendingReview,
        ArticleStatus::PendingUpdate,
        ArticleStatus::PendingDeletion,
    ];

    /// Status of a freshly created article.
    pub fn initial() -> ArticleStatus {
        ArticleStatus::Draft
    }

    pub fn is_locked(status: ArticleStatus) -> bool {
        Self::LOCKED.contains(&status)
    }

    /// Looks up the transition table. Authorship is not considered here.
    pub fn transition(
        role: Role,
        from: ArticleStatus,
        action: Action,
    ) -> Result<Transition, StatusError> {
        use ArticleStatus::*;

        let transition = match (role, from, action) {
            (Role::Editor | Role::Admin, Draft, Action::SubmitForReview) => {
                Some(Transition::To(PendingReview))
            }
            (Role::Admin, PendingReview, Action::Approve) => Some(Transition::To(Published)),
            (Role::Admin, PendingReview, Action::Reject) => Some(Transition::To(Rejected)),
            (Role::Editor, Published, Action::RequestEdit) => Some(Transition::To(PendingUpdate)),
            (Role::Admin, PendingUpdate, Action::ApproveChange) => {
                Some(Transition::To(Published))
            }
            (Role::Admin, PendingUpdate, Action::RejectChange) => Some(Transition::To(Published)),
            (Role::Editor, Published | Draft | Rejected, Action::RequestDeletion) => {
                Some(Transition::To(PendingDeletion))
            }
            (Role::Admin, PendingDeletion, Action::ConfirmDeletion) => Some(Transition::Remove),
            (Role::Admin, PendingDeletion, Action::RejectDeletion) => {
                Some(Transition::RestorePrevious)
            }
            (Role::Editor, Draft | Rejected, Action::Resubmit) => Some(Transition::To(Draft)),
            (Role::Admin, Published, Action::Unpublish) => Some(Transition::To(Draft)),
            _ => None,
        };

        transition.ok_or(StatusError::InvalidTransition { role, from, action })
    }

    /// Full authorization: the transition table plus authorship for editor actions.
    pub fn authorize(
        actor: &Actor,
        article: &Article,
        action: Action,
    ) -> Result<Transition, StatusError> {
        let transition = Self::transition(actor.role, article.status, action)?;
        if actor.role == Role::Editor && article.author_id != actor.id {
            return Err(StatusError::NotAuthor {
                actor: *actor,
                article: article.id,
                author: article.author_id,
            });
        }
        Ok(transition)
    }

    /// Only editors create articles.
    pub fn can_create(role: Role) -> bool {
        role == Role::Editor
    }

    pub fn capabilities(status: ArticleStatus, role: Role) -> Capabilities {
        let actions: Vec<Action> = Action::all()
            .iter()
            .copied()
            .filter(|action| Self::transition(role, status, *action).is_ok())
            .collect();
        let locked = Self::is_locked(status);
        let can_edit = actions
            .iter()
            .any(|a| matches!(a, Action::RequestEdit | Action::Resubmit));
        let can_request_deletion = actions.contains(&Action::RequestDeletion);

        Capabilities {
            locked,
            can_edit,
            can_request_deletion,
            visible: role != Role::User || status == ArticleStatus::Published,
            queue: match role {
                Role::Admin => ReviewQueue::of(status),
                Role::Editor | Role::User => None,
            },
            actions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::types::ArticleFields;

    const TABLE: &[(Role, ArticleStatus, Action, Transition)] = &[
        (Role::Editor, ArticleStatus::Draft, Action::SubmitForReview, Transition::To(ArticleStatus::PendingReview)),
        (Role::Admin, ArticleStatus::Draft, Action::SubmitForReview, Transition::To(ArticleStatus::PendingReview)),
        (Role::Admin, ArticleStatus::PendingReview, Action::Approve, Transition::To(ArticleStatus::Published)),
        (Role::Admin, ArticleStatus::PendingReview, Action::Reject, Transition::To(ArticleStatus::Rejected)),
        (Role::Editor, ArticleStatus::Published, Action::RequestEdit, Transition::To(ArticleStatus::PendingUpdate)),
        (Role::Admin, ArticleStatus::PendingUpdate, Action::ApproveChange, Transition::To(ArticleStatus::Published)),
        (Role::Admin, ArticleStatus::PendingUpdate, Action::RejectChange, Transition::To(ArticleStatus::Published)),
        (Role::Editor, ArticleStatus::Published, Action::RequestDeletion, Transition::To(ArticleStatus::PendingDeletion)),
        (Role::Editor, ArticleStatus::Draft, Action::RequestDeletion, Transition::To(ArticleStatus::PendingDeletion)),
        (Role::Editor, ArticleStatus::Rejected, Action::RequestDeletion, Transition::To(ArticleStatus::PendingDeletion)),
        (Role::Admin, ArticleStatus::PendingDeletion, Action::ConfirmDeletion, Transition::Remove),
        (Role::Admin, ArticleStatus::PendingDeletion, Action::RejectDeletion, Transition::RestorePrevious),
        (Role::Editor, ArticleStatus::Draft, Action::Resubmit, Transition::To(ArticleStatus::Draft)),
        (Role::Editor, ArticleStatus::Rejected, Action::Resubmit, Transition::To(ArticleStatus::Draft)),
        (Role::Admin, ArticleStatus::Published, Action::Unpublish, Transition::To(ArticleStatus::Draft)),
    ];

    fn article(status: ArticleStatus, author: i64) -> Article {
        let fields = ArticleFields::new("title", "body");
        Article {
            id: ArticleId(7),
            title: fields.title,
            content: fields.content,
            image_url: None,
            thumbnail_url: None,
            video_url: None,
            category_id: None,
            author_id: UserId(author),
            views: 0,
            status,
            created_at: String::new(),
            updated_at: String::new(),
            pending_revision: None,
        }
    }

    #[test]
    fn table_entries_produce_expected_status() {
        for (role, from, action, expected) in TABLE {
            assert_eq!(
                StatusMachine::transition(*role, *from, *action),
                Ok(*expected),
                "{role} {from} {action}"
            );
        }
    }

    #[test]
    fn everything_outside_the_table_is_rejected() {
        for role in [Role::Admin, Role::Editor, Role::User] {
            for from in ArticleStatus::all() {
                for action in Action::all() {
                    let listed = TABLE
                        .iter()
                        .any(|(r, f, a, _)| *r == role && f == from && a == action);
                    if listed {
                        continue;
                    }
                    assert_eq!(
                        StatusMachine::transition(role, *from, *action),
                        Err(StatusError::InvalidTransition {
                            role,
                            from: *from,
                            action: *action,
                        })
                    );
                }
            }
        }
    }

    #[test]
    fn result_does_not_depend_on_content() {
        let mut a = article(ArticleStatus::Published, 3);
        let before = StatusMachine::authorize(&Actor::editor(3), &a, Action::RequestEdit);
        a.title = "something else entirely".into();
        a.content.clear();
        let after = StatusMachine::authorize(&Actor::editor(3), &a, Action::RequestEdit);
        assert_eq!(before, after);
    }

    #[test]
    fn locked_statuses_block_editor_requests() {
        for status in StatusMachine::LOCKED {
            for action in [Action::RequestEdit, Action::RequestDeletion, Action::Resubmit] {
                assert!(StatusMachine::transition(Role::Editor, status, action).is_err());
            }
            let caps = StatusMachine::capabilities(status, Role::Editor);
            assert!(caps.locked);
            assert!(!caps.can_edit);
            assert!(!caps.can_request_deletion);
            assert!(caps.actions.is_empty());
        }
    }

    #[test]
    fn editor_may_only_act_on_own_articles() {
        let a = article(ArticleStatus::Published, 3);
        let err = StatusMachine::authorize(&Actor::editor(4), &a, Action::RequestDeletion)
            .unwrap_err();
        assert!(matches!(err, StatusError::NotAuthor { .. }));
        assert!(StatusMachine::authorize(&Actor::editor(3), &a, Action::RequestDeletion).is_ok());
    }

    #[test]
    fn readers_have_no_transitions_and_see_only_published() {
        for status in ArticleStatus::all() {
            let caps = StatusMachine::capabilities(*status, Role::User);
            assert!(caps.actions.is_empty());
            assert_eq!(caps.visible, *status == ArticleStatus::Published);
        }
    }

    #[test]
    fn admin_capabilities_name_the_queue() {
        let caps = StatusMachine::capabilities(ArticleStatus::PendingDeletion, Role::Admin);
        assert_eq!(caps.queue, Some(ReviewQueue::ChangeRequests));
        assert_eq!(
            caps.actions,
            vec![Action::ConfirmDeletion, Action::RejectDeletion]
        );
        let caps = StatusMachine::capabilities(ArticleStatus::Draft, Role::Admin);
        assert_eq!(caps.queue, Some(ReviewQueue::NewContent));
        assert_eq!(
            StatusMachine::capabilities(ArticleStatus::Published, Role::Admin).queue,
            None
        );
    }

    #[test]
    fn editor_capabilities_for_published() {
        let caps = StatusMachine::capabilities(ArticleStatus::Published, Role::Editor);
        assert!(!caps.locked);
        assert!(caps.can_edit);
        assert!(caps.can_request_deletion);
    }

    #[test]
    fn action_parses_from_cli_spelling() {
        assert_eq!("confirm-deletion".parse::<Action>(), Ok(Action::ConfirmDeletion));
        assert_eq!("REQUEST_EDIT".parse::<Action>(), Ok(Action::RequestEdit));
        assert!("publish-now".parse::<Action>().is_err());
    }

    #[test]
    fn only_editors_create() {
        assert!(StatusMachine::can_create(Role::Editor));
        assert!(!StatusMachine::can_create(Role::Admin));
        assert!(!StatusMachine::can_create(Role::User));
        assert_eq!(StatusMachine::initial(), ArticleStatus::Draft);
    }
}

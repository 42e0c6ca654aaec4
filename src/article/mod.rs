//! Article domain model and moderation rules.

mod status;
mod types;

pub use status::{Action, Capabilities, ReviewQueue, StatusError, StatusMachine, Transition};
pub use types::{
    Actor, Article, ArticleFields, ArticleId, ArticleStatus, Category, CategoryId, ParseError,
    Role, User, UserId,
};

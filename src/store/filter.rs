use std::fmt;

use crate::article::{Article, ArticleStatus, CategoryId, ReviewQueue, UserId};

/// A logical article list, each with its own page cursor and store window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListFilter {
    /// One of the two admin review queues.
    Review(ReviewQueue),
    All,
    ByAuthor(UserId),
    /// The reader feed, optionally narrowed to a category.
    Published { category: Option<CategoryId> },
}

impl ListFilter {
    pub const NEW_CONTENT: ListFilter = ListFilter::Review(ReviewQueue::NewContent);
    pub const CHANGE_REQUESTS: ListFilter = ListFilter::Review(ReviewQueue::ChangeRequests);

    /// Status restriction sent to the server, if any.
    pub fn statuses(&self) -> Option<&'static [ArticleStatus]> {
        match self {
            Self::Review(queue) => Some(queue.statuses()),
            Self::Published { .. } => Some(&[ArticleStatus::Published]),
            Self::All | Self::ByAuthor(_) => None,
        }
    }

    pub fn author(&self) -> Option<UserId> {
        match self {
            Self::ByAuthor(author) => Some(*author),
            _ => None,
        }
    }

    pub fn category(&self) -> Option<CategoryId> {
        match self {
            Self::Published { category } => *category,
            _ => None,
        }
    }

    /// Whether the article currently belongs to this list.
    pub fn matches(&self, article: &Article) -> bool {
        let status_ok = self
            .statuses()
            .map_or(true, |statuses| statuses.contains(&article.status));
        let author_ok = self.author().map_or(true, |a| a == article.author_id);
        let category_ok = self
            .category()
            .map_or(true, |c| article.category_id == Some(c));
        status_ok && author_ok && category_ok
    }
}

impl fmt::Display for ListFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Review(ReviewQueue::NewContent) => write!(f, "review:new"),
            Self::Review(ReviewQueue::ChangeRequests) => write!(f, "review:changes"),
            Self::All => write!(f, "all"),
            Self::ByAuthor(author) => write!(f, "author:{}", author),
            Self::Published { category: None } => write!(f, "published"),
            Self::Published {
                category: Some(category),
            } => write!(f, "published:category:{}", category),
        }
    }
}

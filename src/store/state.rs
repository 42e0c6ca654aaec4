//! Thread-safe article store with per-list windows.
//!
//! Holds every article the session has seen, keyed by id, plus one ordered
//! id window per list filter. All mutations take the same write lock, so a
//! page merge and a workflow update can never interleave.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::watch;

use crate::article::{Article, ArticleId};
use crate::store::filter::ListFilter;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("article {0} is already in the store")]
    DuplicateId(ArticleId),

    #[error("article {0} is not in the store")]
    NotFound(ArticleId),
}

/// Result of merging one page into a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Ids appended to the window.
    pub added: usize,
    /// Ids already in the window whose article was refreshed.
    pub refreshed: usize,
    /// Articles dropped from the store by a page-1 replace.
    pub dropped: usize,
}

#[derive(Clone)]
pub struct ArticleStore {
    inner: Arc<RwLock<StoreInner>>,
    revision: Arc<watch::Sender<u64>>,
}

#[derive(Default)]
struct StoreInner {
    articles: HashMap<ArticleId, Article>,
    /// Server order across all windows, most recent first.
    order: Vec<ArticleId>,
    windows: HashMap<ListFilter, Vec<ArticleId>>,
}

impl StoreInner {
    fn upsert(&mut self, article: &Article) -> bool {
        let existed = self
            .articles
            .insert(article.id, article.clone())
            .is_some();
        if !existed {
            self.order.push(article.id);
        }
        existed
    }

    /// Moves `ids` into the global order right after `anchor`, or to the
    /// front when there is none, keeping their relative order.
    fn place_after(&mut self, anchor: Option<ArticleId>, ids: &[ArticleId]) {
        if ids.is_empty() {
            return;
        }
        let moving: HashSet<ArticleId> = ids.iter().copied().collect();
        self.order.retain(|id| !moving.contains(id));
        let at = match anchor {
            Some(anchor) => self
                .order
                .iter()
                .position(|id| *id == anchor)
                .map_or(self.order.len(), |pos| pos + 1),
            None => 0,
        };
        self.order.splice(at..at, ids.iter().copied());
    }

    fn referenced_elsewhere(&self, id: ArticleId, except: &ListFilter) -> bool {
        self.windows
            .iter()
            .any(|(filter, ids)| filter != except && ids.contains(&id))
    }

    fn drop_article(&mut self, id: ArticleId) -> bool {
        let removed = self.articles.remove(&id).is_some();
        self.order.retain(|existing| *existing != id);
        for ids in self.windows.values_mut() {
            ids.retain(|existing| *existing != id);
        }
        removed
    }
}

impl Default for ArticleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ArticleStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(RwLock::new(StoreInner::default())),
            revision: Arc::new(revision),
        }
    }

    /// Adds a new article ahead of everything seen so far.
    pub fn insert(&self, article: Article) -> Result<(), StoreError> {
        {
            let mut inner = self.inner.write();
            if inner.articles.contains_key(&article.id) {
                return Err(StoreError::DuplicateId(article.id));
            }
            inner.order.insert(0, article.id);
            inner.articles.insert(article.id, article);
        }
        self.bump();
        Ok(())
    }

    /// Replaces the stored article with the same id.
    pub fn update(&self, article: Article) -> Result<(), StoreError> {
        {
            let mut inner = self.inner.write();
            let slot = inner
                .articles
                .get_mut(&article.id)
                .ok_or(StoreError::NotFound(article.id))?;
            *slot = article;
        }
        self.bump();
        Ok(())
    }

    /// Inserts or replaces; used when an article is opened outside any list.
    pub fn upsert(&self, article: Article) {
        self.inner.write().upsert(&article);
        self.bump();
    }

    /// Drops the article from the store and every window. Absent ids are a no-op.
    pub fn remove(&self, id: ArticleId) -> bool {
        let removed = self.inner.write().drop_article(id);
        if removed {
            self.bump();
        }
        removed
    }

    /// Merges a fetched page into the filter's window.
    ///
    /// Page 1 replaces the window and leads the global order; later pages
    /// append ids not already present, right after the window's last id.
    pub fn merge(&self, filter: ListFilter, page: &[Article], page_number: u32) -> MergeSummary {
        let mut summary = MergeSummary::default();
        {
            let mut inner = self.inner.write();
            let previous = if page_number <= 1 {
                inner.windows.remove(&filter).unwrap_or_default()
            } else {
                Vec::new()
            };

            let mut window = inner.windows.remove(&filter).unwrap_or_default();
            let anchor = if page_number <= 1 {
                None
            } else {
                window.last().copied()
            };
            let mut seen: HashSet<ArticleId> = window.iter().copied().collect();
            let mut added = Vec::new();
            for article in page {
                inner.upsert(article);
                if seen.insert(article.id) {
                    window.push(article.id);
                    added.push(article.id);
                } else {
                    summary.refreshed += 1;
                }
            }
            summary.added = added.len();
            inner.place_after(anchor, &added);

            let stale: Vec<ArticleId> = previous
                .into_iter()
                .filter(|id| !seen.contains(id))
                .collect();
            inner.windows.insert(filter, window);
            for id in stale {
                if !inner.referenced_elsewhere(id, &filter) && inner.drop_article(id) {
                    summary.dropped += 1;
                }
            }
        }
        self.bump();

        tracing::debug!(
            filter = %filter,
            page = page_number,
            added = summary.added,
            refreshed = summary.refreshed,
            dropped = summary.dropped,
            "Merged page into store"
        );
        summary
    }

    pub fn get(&self, id: ArticleId) -> Option<Article> {
        self.inner.read().articles.get(&id).cloned()
    }

    pub fn contains(&self, id: ArticleId) -> bool {
        self.inner.read().articles.contains_key(&id)
    }

    /// Articles matching the predicate, most recent first: new inserts and
    /// first pages lead, later pages follow the page before them.
    pub fn snapshot<P>(&self, predicate: P) -> Vec<Article>
    where
        P: Fn(&Article) -> bool,
    {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.articles.get(id))
            .filter(|article| predicate(article))
            .cloned()
            .collect()
    }

    /// The filter's window in server page order, restricted to articles that
    /// still belong to the list.
    pub fn window(&self, filter: &ListFilter) -> Vec<Article> {
        let inner = self.inner.read();
        inner
            .windows
            .get(filter)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.articles.get(id))
                    .filter(|article| filter.matches(article))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of ids in the filter's window as loaded.
    pub fn window_len(&self, filter: &ListFilter) -> usize {
        self.inner
            .read()
            .windows
            .get(filter)
            .map_or(0, |ids| ids.len())
    }

    pub fn len(&self) -> usize {
        self.inner.read().articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        {
            let mut inner = self.inner.write();
            *inner = StoreInner::default();
        }
        self.bump();
    }

    /// Receiver that changes whenever the store is mutated.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::{ArticleFields, ArticleStatus, UserId};

    fn article(id: i64, status: ArticleStatus) -> Article {
        let fields = ArticleFields::new(format!("title {id}"), "body");
        Article {
            id: ArticleId(id),
            title: fields.title,
            content: fields.content,
            image_url: None,
            thumbnail_url: None,
            video_url: None,
            category_id: None,
            author_id: UserId(3),
            views: 0,
            status,
            created_at: String::new(),
            updated_at: String::new(),
            pending_revision: None,
        }
    }

    fn ids(articles: &[Article]) -> Vec<i64> {
        articles.iter().map(|a| a.id.0).collect()
    }

    #[test]
    fn insert_rejects_duplicate_ids() {
        let store = ArticleStore::new();
        store.insert(article(1, ArticleStatus::Draft)).unwrap();
        assert_eq!(
            store.insert(article(1, ArticleStatus::Draft)),
            Err(StoreError::DuplicateId(ArticleId(1)))
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn insert_goes_to_the_front() {
        let store = ArticleStore::new();
        store.merge(ListFilter::All, &[article(1, ArticleStatus::Published)], 1);
        store.insert(article(2, ArticleStatus::Draft)).unwrap();
        assert_eq!(ids(&store.snapshot(|_| true)), vec![2, 1]);
    }

    #[test]
    fn update_requires_existing_entry() {
        let store = ArticleStore::new();
        assert_eq!(
            store.update(article(5, ArticleStatus::Draft)),
            Err(StoreError::NotFound(ArticleId(5)))
        );
        store.insert(article(5, ArticleStatus::Draft)).unwrap();
        store.update(article(5, ArticleStatus::PendingReview)).unwrap();
        assert_eq!(
            store.get(ArticleId(5)).map(|a| a.status),
            Some(ArticleStatus::PendingReview)
        );
    }

    #[test]
    fn remove_is_idempotent_and_clears_windows() {
        let store = ArticleStore::new();
        store.merge(ListFilter::All, &[article(1, ArticleStatus::Published)], 1);
        assert!(store.remove(ArticleId(1)));
        assert!(!store.remove(ArticleId(1)));
        assert!(store.window(&ListFilter::All).is_empty());
        assert_eq!(store.window_len(&ListFilter::All), 0);
    }

    #[test]
    fn first_page_replaces_the_window() {
        let store = ArticleStore::new();
        let filter = ListFilter::NEW_CONTENT;
        store.merge(
            filter,
            &[article(1, ArticleStatus::Draft), article(2, ArticleStatus::Draft)],
            1,
        );
        store.merge(
            filter,
            &[article(3, ArticleStatus::Draft), article(4, ArticleStatus::PendingReview)],
            1,
        );
        assert_eq!(ids(&store.window(&filter)), vec![3, 4]);
        assert!(!store.contains(ArticleId(1)));
        assert!(!store.contains(ArticleId(2)));
    }

    #[test]
    fn first_page_keeps_articles_other_windows_reference() {
        let store = ArticleStore::new();
        store.merge(ListFilter::All, &[article(1, ArticleStatus::Draft)], 1);
        store.merge(ListFilter::NEW_CONTENT, &[article(1, ArticleStatus::Draft)], 1);
        store.merge(ListFilter::NEW_CONTENT, &[article(2, ArticleStatus::Draft)], 1);
        assert!(store.contains(ArticleId(1)));
        assert_eq!(ids(&store.window(&ListFilter::NEW_CONTENT)), vec![2]);
    }

    #[test]
    fn later_pages_skip_ids_already_present() {
        let store = ArticleStore::new();
        let filter = ListFilter::All;
        store.merge(
            filter,
            &[article(1, ArticleStatus::Published), article(2, ArticleStatus::Published)],
            1,
        );
        let summary = store.merge(
            filter,
            &[article(2, ArticleStatus::Published), article(3, ArticleStatus::Published)],
            2,
        );
        assert_eq!(summary.added, 1);
        assert_eq!(summary.refreshed, 1);
        assert_eq!(ids(&store.window(&filter)), vec![1, 2, 3]);
        assert_eq!(store.window_len(&filter), 3);
    }

    #[test]
    fn first_page_leads_the_snapshot() {
        let store = ArticleStore::new();
        let filter = ListFilter::All;
        store.merge(
            filter,
            &[
                article(3, ArticleStatus::Draft),
                article(2, ArticleStatus::Draft),
                article(1, ArticleStatus::Draft),
            ],
            1,
        );
        store.merge(
            filter,
            &[
                article(4, ArticleStatus::Draft),
                article(3, ArticleStatus::Draft),
                article(2, ArticleStatus::Draft),
            ],
            1,
        );
        assert_eq!(ids(&store.snapshot(|_| true)), vec![4, 3, 2]);
    }

    #[test]
    fn later_pages_follow_their_window_in_the_snapshot() {
        let store = ArticleStore::new();
        store.merge(ListFilter::NEW_CONTENT, &[article(9, ArticleStatus::Draft)], 1);
        store.merge(
            ListFilter::All,
            &[article(4, ArticleStatus::Published), article(3, ArticleStatus::Published)],
            1,
        );
        store.merge(
            ListFilter::All,
            &[article(2, ArticleStatus::Published), article(1, ArticleStatus::Published)],
            2,
        );
        assert_eq!(ids(&store.snapshot(|_| true)), vec![4, 3, 2, 1, 9]);
    }

    #[test]
    fn window_hides_articles_that_left_the_list() {
        let store = ArticleStore::new();
        let filter = ListFilter::NEW_CONTENT;
        store.merge(filter, &[article(1, ArticleStatus::PendingReview)], 1);
        store.update(article(1, ArticleStatus::Published)).unwrap();
        assert!(store.window(&filter).is_empty());
        assert_eq!(store.snapshot(|a| a.id == ArticleId(1)).len(), 1);
    }

    #[test]
    fn snapshot_filters_by_predicate() {
        let store = ArticleStore::new();
        store.merge(
            ListFilter::All,
            &[article(1, ArticleStatus::Published), article(2, ArticleStatus::Draft)],
            1,
        );
        let published = store.snapshot(|a| a.status == ArticleStatus::Published);
        assert_eq!(ids(&published), vec![1]);
    }

    #[test]
    fn mutations_bump_the_revision() {
        let store = ArticleStore::new();
        let rx = store.subscribe();
        let before = *rx.borrow();
        store.insert(article(1, ArticleStatus::Draft)).unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(store.revision() > before);
        store.clear();
        assert!(store.is_empty());
    }
}

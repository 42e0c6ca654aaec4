//! Screen session.
//!
//! Owns one store, one fetcher and one workflow over a shared gateway. After
//! every confirmed mutation it reloads page 1 of each tracked list the change
//! may have touched, so counts and windows never drift from the server.

use std::sync::Arc;

use crate::article::{
    Actor, Article, ArticleFields, ArticleId, Capabilities, ReviewQueue, Role, StatusMachine,
};
use crate::config::Config;
use crate::fetcher::{FetchError, PageLoad, PaginatedFetcher};
use crate::gateway::ArticleGateway;
use crate::lifecycle::SessionLifecycle;
use crate::moderation::{ModerationAction, ModerationError, ModerationWorkflow, Outcome};
use crate::retry::RetryPolicy;
use crate::store::{ArticleStore, ListFilter};

/// A confirmed action plus any list refresh that failed afterwards.
#[derive(Debug)]
pub struct Performed {
    pub outcome: Outcome,
    /// The action itself succeeded; these lists may show stale data.
    pub refresh_errors: Vec<FetchError>,
}

pub struct NewsroomSession<G> {
    gateway: Arc<G>,
    store: ArticleStore,
    fetcher: PaginatedFetcher<G>,
    workflow: ModerationWorkflow<G>,
    retry: RetryPolicy,
    lifecycle: SessionLifecycle,
}

impl<G: ArticleGateway> NewsroomSession<G> {
    pub fn new(gateway: Arc<G>, retry: RetryPolicy) -> Self {
        let store = ArticleStore::new();
        let lifecycle = SessionLifecycle::new();
        Self {
            fetcher: PaginatedFetcher::new(Arc::clone(&gateway), store.clone(), lifecycle.handle()),
            workflow: ModerationWorkflow::new(Arc::clone(&gateway), store.clone()),
            gateway,
            store,
            retry,
            lifecycle,
        }
    }

    pub fn with_config(gateway: Arc<G>, config: &Config) -> Self {
        Self::new(gateway, RetryPolicy::from(&config.retry))
    }

    pub fn store(&self) -> &ArticleStore {
        &self.store
    }

    pub fn fetcher(&self) -> &PaginatedFetcher<G> {
        &self.fetcher
    }

    pub fn is_closed(&self) -> bool {
        self.lifecycle.is_closed()
    }

    /// Shows `filter` from its first page.
    pub async fn open(&self, filter: ListFilter) -> Result<PageLoad, FetchError> {
        self.retry
            .run("open", || self.fetcher.reset(filter))
            .await
    }

    pub async fn load_more(&self, filter: ListFilter) -> Result<PageLoad, FetchError> {
        self.retry
            .run("load_more", || self.fetcher.load_more(filter))
            .await
    }

    /// The article from the store, or fetched and kept if not loaded yet.
    pub async fn article(&self, id: ArticleId) -> Result<Article, ModerationError> {
        if let Some(article) = self.store.get(id) {
            return Ok(article);
        }
        let article = self
            .retry
            .run("get", || self.gateway.get(id))
            .await
            .map_err(|source| ModerationError::RemoteFetchFailed {
                article: id,
                source,
            })?;
        self.store.upsert(article.clone());
        Ok(article)
    }

    pub async fn perform(
        &self,
        action: &ModerationAction,
        id: ArticleId,
        actor: &Actor,
    ) -> Result<Performed, ModerationError> {
        let article = self.article(id).await?;
        let retry = if action.is_repeatable() {
            self.retry
        } else {
            RetryPolicy::none()
        };
        let outcome = retry
            .run(action.kind().as_str(), || {
                self.workflow.perform(action, &article, actor)
            })
            .await?;
        let refresh_errors = self.refresh(&outcome).await;
        Ok(Performed {
            outcome,
            refresh_errors,
        })
    }

    /// Creates a draft. Never retried: a timed-out create may already exist
    /// on the server.
    pub async fn create(
        &self,
        fields: ArticleFields,
        actor: &Actor,
    ) -> Result<Performed, ModerationError> {
        let outcome = self.workflow.create(fields, actor).await?;
        let refresh_errors = self.refresh(&outcome).await;
        Ok(Performed {
            outcome,
            refresh_errors,
        })
    }

    /// What `role` may do with the article right now.
    pub async fn capabilities(
        &self,
        id: ArticleId,
        role: Role,
    ) -> Result<Capabilities, ModerationError> {
        let article = self.article(id).await?;
        Ok(StatusMachine::capabilities(article.status, role))
    }

    /// Server-reported size of a review queue, once it has been opened.
    pub fn pending_count(&self, queue: ReviewQueue) -> Option<u64> {
        self.fetcher.total_count(&ListFilter::Review(queue))
    }

    /// Tears the session down; loads still in flight are discarded.
    pub fn close(&self) {
        self.lifecycle.close();
    }

    async fn refresh(&self, outcome: &Outcome) -> Vec<FetchError> {
        let mut errors = Vec::new();
        for filter in self.fetcher.tracked_filters() {
            if !outcome.affects(&filter) {
                continue;
            }
            let reload = self
                .retry
                .run("refresh", || self.fetcher.reload(filter))
                .await;
            if let Err(err) = reload {
                tracing::warn!(filter = %filter, error = %err, "List refresh after mutation failed");
                errors.push(err);
            }
        }
        errors
    }
}

impl<G> Drop for NewsroomSession<G> {
    fn drop(&mut self) {
        self.lifecycle.close();
    }
}

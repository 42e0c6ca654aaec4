//! In-process stand-in for the news backend.
//!
//! Models the server behaviour the client relies on: id assignment, most
//! recent first ordering, pending revisions for edit requests, and status
//! restoration for rejected deletion requests. Supports failure injection
//! and list latency for exercising the client's failure and concurrency paths.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;

use crate::article::{Article, ArticleFields, ArticleId, ArticleStatus, UserId};
use crate::gateway::{ArticleGateway, GatewayError, Page, StatusTarget};
use crate::store::ListFilter;

struct Record {
    article: Article,
    /// Status before the outstanding deletion request.
    previous_status: Option<ArticleStatus>,
    touched: u64,
}

struct MemoryState {
    records: BTreeMap<ArticleId, Record>,
    next_id: i64,
    clock: u64,
    page_size: u32,
    list_delay: Duration,
    failures: VecDeque<GatewayError>,
    lost_replies: VecDeque<GatewayError>,
    list_calls: usize,
    mutation_calls: usize,
}

impl MemoryState {
    fn tick(&mut self) -> (u64, String) {
        self.clock += 1;
        (self.clock, format!("2024-01-01T00:00:00.{:06}Z", self.clock))
    }

    fn take_failure(&mut self) -> Option<GatewayError> {
        self.failures.pop_front()
    }

    /// Reply to a mutation that has already been applied.
    fn reply<T>(&mut self, value: T) -> Result<T, GatewayError> {
        match self.lost_replies.pop_front() {
            Some(err) => Err(err),
            None => Ok(value),
        }
    }
}

pub struct MemoryGateway {
    state: Mutex<MemoryState>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new(20)
    }
}

impl MemoryGateway {
    pub fn new(page_size: u32) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                records: BTreeMap::new(),
                next_id: 1,
                clock: 0,
                page_size: page_size.max(1),
                list_delay: Duration::ZERO,
                failures: VecDeque::new(),
                lost_replies: VecDeque::new(),
                list_calls: 0,
                mutation_calls: 0,
            }),
        }
    }

    /// Stores an article as-is, keeping its id. Later creations get higher ids.
    pub fn seed(&self, mut article: Article) -> Article {
        let mut state = self.state.lock();
        let (touched, stamp) = state.tick();
        if article.created_at.is_empty() {
            article.created_at = stamp.clone();
        }
        if article.updated_at.is_empty() {
            article.updated_at = stamp;
        }
        state.next_id = state.next_id.max(article.id.0 + 1);
        state.records.insert(
            article.id,
            Record {
                article: article.clone(),
                previous_status: None,
                touched,
            },
        );
        article
    }

    /// The next call of any kind fails with `err`. Calls queue up in order.
    pub fn fail_next(&self, err: GatewayError) {
        self.state.lock().failures.push_back(err);
    }

    /// The next mutation is applied, but its reply is lost and the caller
    /// sees `err` instead.
    pub fn lose_next_reply(&self, err: GatewayError) {
        self.state.lock().lost_replies.push_back(err);
    }

    /// Latency of every list call. The page reflects the state at the time
    /// of the request, not at the time it is delivered.
    pub fn set_list_delay(&self, delay: Duration) {
        self.state.lock().list_delay = delay;
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().list_calls
    }

    pub fn mutation_calls(&self) -> usize {
        self.state.lock().mutation_calls
    }

    /// Server-side view of an article, bypassing failure injection.
    pub fn article(&self, id: ArticleId) -> Option<Article> {
        self.state
            .lock()
            .records
            .get(&id)
            .map(|record| record.article.clone())
    }

    fn list_now(&self, filter: ListFilter, page: u32) -> Result<Page, GatewayError> {
        if page == 0 {
            return Err(GatewayError::Rejected {
                status: 400,
                message: "page numbers start at 1".to_string(),
            });
        }

        let state = self.state.lock();
        let mut matching: Vec<&Record> = state
            .records
            .values()
            .filter(|record| filter.matches(&record.article))
            .collect();
        matching.sort_by(|a, b| {
            b.touched
                .cmp(&a.touched)
                .then_with(|| b.article.id.cmp(&a.article.id))
        });

        let size = state.page_size as usize;
        let total_count = matching.len();
        let total_pages = total_count.div_ceil(size);
        let items = matching
            .into_iter()
            .skip((page as usize - 1) * size)
            .take(size)
            .map(|record| record.article.clone())
            .collect();

        Ok(Page {
            items,
            page,
            total_pages: total_pages as u32,
            total_count: total_count as u64,
        })
    }
}

impl ArticleGateway for MemoryGateway {
    async fn list(&self, filter: ListFilter, page: u32) -> Result<Page, GatewayError> {
        let (failure, delay) = {
            let mut state = self.state.lock();
            state.list_calls += 1;
            (state.take_failure(), state.list_delay)
        };
        let response = match failure {
            Some(err) => Err(err),
            None => self.list_now(filter, page),
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        response
    }

    async fn get(&self, id: ArticleId) -> Result<Article, GatewayError> {
        let mut state = self.state.lock();
        if let Some(err) = state.take_failure() {
            return Err(err);
        }
        state
            .records
            .get(&id)
            .map(|record| record.article.clone())
            .ok_or_else(|| GatewayError::not_found(format!("article {}", id)))
    }

    async fn create(&self, author: UserId, fields: ArticleFields) -> Result<Article, GatewayError> {
        let mut state = self.state.lock();
        state.mutation_calls += 1;
        if let Some(err) = state.take_failure() {
            return Err(err);
        }
        if fields.title.trim().is_empty() {
            return Err(GatewayError::Rejected {
                status: 422,
                message: "title must not be empty".to_string(),
            });
        }

        let id = ArticleId(state.next_id);
        state.next_id += 1;
        let (touched, stamp) = state.tick();
        let mut article = Article {
            id,
            title: String::new(),
            content: String::new(),
            image_url: None,
            thumbnail_url: None,
            video_url: None,
            category_id: None,
            author_id: author,
            views: 0,
            status: ArticleStatus::Draft,
            created_at: stamp.clone(),
            updated_at: stamp,
            pending_revision: None,
        };
        article.apply_fields(fields);
        state.records.insert(
            id,
            Record {
                article: article.clone(),
                previous_status: None,
                touched,
            },
        );
        state.reply(article)
    }

    async fn update(
        &self,
        id: ArticleId,
        fields: Option<ArticleFields>,
        target: StatusTarget,
    ) -> Result<Article, GatewayError> {
        let mut state = self.state.lock();
        state.mutation_calls += 1;
        if let Some(err) = state.take_failure() {
            return Err(err);
        }
        let (touched, stamp) = state.tick();
        let record = state
            .records
            .get_mut(&id)
            .ok_or_else(|| GatewayError::not_found(format!("article {}", id)))?;
        let current = record.article.status;

        match target {
            StatusTarget::RestorePrevious => match current {
                ArticleStatus::PendingDeletion => {
                    record.article.status = record
                        .previous_status
                        .take()
                        .unwrap_or(ArticleStatus::Published);
                }
                ArticleStatus::PendingUpdate => {
                    record.article.pending_revision = None;
                    record.article.status = ArticleStatus::Published;
                }
                other => {
                    return Err(GatewayError::Rejected {
                        status: 409,
                        message: format!("article {} has no pending request ({})", id, other),
                    });
                }
            },
            StatusTarget::Set(ArticleStatus::PendingUpdate) => {
                let Some(fields) = fields else {
                    return Err(GatewayError::Rejected {
                        status: 422,
                        message: "an edit request needs the proposed fields".to_string(),
                    });
                };
                record.article.pending_revision = Some(fields);
                record.article.status = ArticleStatus::PendingUpdate;
            }
            StatusTarget::Set(status) => {
                if current == ArticleStatus::PendingUpdate {
                    // Approve applies the proposed edit; no fields discards it.
                    record.article.pending_revision = None;
                }
                if let Some(fields) = fields {
                    record.article.apply_fields(fields);
                }
                if status == ArticleStatus::PendingDeletion {
                    record.previous_status = Some(current);
                }
                record.article.status = status;
            }
        }

        record.touched = touched;
        record.article.updated_at = stamp;
        let article = record.article.clone();
        state.reply(article)
    }

    async fn delete(&self, id: ArticleId) -> Result<(), GatewayError> {
        let mut state = self.state.lock();
        state.mutation_calls += 1;
        if let Some(err) = state.take_failure() {
            return Err(err);
        }
        if state.records.remove(&id).is_none() {
            return Err(GatewayError::not_found(format!("article {}", id)));
        }
        state.reply(())
    }
}

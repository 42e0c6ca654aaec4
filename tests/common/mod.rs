//! Shared test utilities and mock infrastructure.

#![allow(dead_code, unused_imports)]

pub mod mock_backend;

use newsdesk::article::{Article, ArticleId, ArticleStatus, CategoryId, UserId};
use newsdesk::config::Config;
use std::path::PathBuf;
use tempfile::TempDir;

/// Create a temporary config file with the given TOML content.
pub fn temp_config(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(&config_path, content).expect("Failed to write config");
    (temp_dir, config_path)
}

/// Config pointing at a mock server, with a short timeout and fast retry.
pub fn config_for(base_url: &str) -> Config {
    let mut config = Config::default();
    config.server.base_url = base_url.to_string();
    config.server.timeout_seconds = 2;
    config.server.connect_timeout_seconds = 1;
    config.paging.page_size = 2;
    config.retry.backoff_ms = 10;
    config
}

/// An article as the backend would return it.
pub fn article(id: i64, author: i64, status: ArticleStatus) -> Article {
    Article {
        id: ArticleId(id),
        title: format!("Article {id}"),
        content: format!("Body of article {id}"),
        image_url: None,
        thumbnail_url: None,
        video_url: None,
        category_id: Some(CategoryId(1)),
        author_id: UserId(author),
        views: 0,
        status,
        created_at: "2024-03-01T10:00:00Z".to_string(),
        updated_at: "2024-03-01T10:00:00Z".to_string(),
        pending_revision: None,
    }
}

/// JSON body of a list response.
pub fn page_json(items: &[Article], page: u32, total_pages: u32, total_count: u64) -> String {
    serde_json::json!({
        "items": items,
        "page": page,
        "total_pages": total_pages,
        "total_count": total_count,
    })
    .to_string()
}

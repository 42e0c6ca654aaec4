//! Client-side core of a news portal's article moderation.
//!
//! Articles move through a fixed status lifecycle driven by editors and
//! admins. The store mirrors what the server confirmed; paginated lists are
//! reconciled page by page; every status change goes through the moderation
//! workflow and the REST gateway.

pub mod article;
pub mod config;
pub mod fetcher;
pub mod gateway;
pub mod lifecycle;
pub mod logging;
pub mod moderation;
pub mod retry;
pub mod session;
pub mod store;

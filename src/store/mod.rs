//! Session-local article storage.
//!
//! The store is the single place screens read articles from. It is only
//! changed in response to confirmed server responses.

mod filter;
mod state;

pub use filter::ListFilter;
pub use state::{ArticleStore, MergeSummary, StoreError};

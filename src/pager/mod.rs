//! Pager notification.
//!
//! Provides:
//! - [`Notifier`] - one page request for one patient
//! - [`HttpPager`] - the hospital pager HTTP endpoint
//! - [`PagerHandle`] - queue in front of a notifier, so paging never
//!   blocks the message loop
//!
//! # Example
//!
//! ```ignore
//! use aki_client::pager::{spawn_pager_task_default, HttpPager};
//!
//! let (pager, task) = spawn_pager_task_default(HttpPager::new("pager", 8441));
//! pager.page("497030").await?;
//! ```

mod http;
mod queue;

use std::future::Future;
use std::pin::Pin;

pub use http::HttpPager;
pub use queue::{
    spawn_pager_task, spawn_pager_task_default, PageRequest, PagerConfig, PagerHandle,
    PagerStats, DEFAULT_CALL_TIMEOUT, DEFAULT_ENQUEUE_TIMEOUT, DEFAULT_QUEUE_CAPACITY,
};

use crate::error::Result;

/// Boxed future for notifier results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Sends one page.
pub trait Notifier: Send + Sync + 'static {
    fn page(&self, mrn: &str) -> BoxFuture<'static, Result<()>>;
}

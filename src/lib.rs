//! # aki-client
//!
//! MLLP client that receives HL7 v2 admissions and creatinine results from a
//! hospital feed, keeps a patient store, and pages the clinical team when a
//! result looks like acute kidney injury.
//!
//! ## Architecture
//!
//! - **Framing** (`protocol`): MLLP blocks over TCP, one ACK per message
//! - **Dispatch** (`dispatch`): admission → store, result → classifier → pager
//! - **Store** (`store`): SQLite, idempotent upserts and appends
//! - **Adapters** (`risk`, `pager`): feature transform, classifier, notifier
//!
//! ## Example
//!
//! ```ignore
//! use aki_client::{Dispatcher, PatientStore, Session};
//! use aki_client::pager::{spawn_pager_task_default, HttpPager};
//! use aki_client::risk::ThresholdClassifier;
//!
//! #[tokio::main]
//! async fn main() -> aki_client::Result<()> {
//!     let store = PatientStore::open("patients.db")?;
//!     let (pager, _task) = spawn_pager_task_default(HttpPager::new("localhost", 8441));
//!     let dispatcher = Dispatcher::new(ThresholdClassifier::default(), pager);
//!
//!     let stream = aki_client::transport::connect("localhost", 8440).await?;
//!     let report = Session::builder(store, dispatcher).build().run(stream).await?;
//!     println!("{} acks", report.acks_sent);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod history;
pub mod logging;
pub mod message;
pub mod pager;
pub mod protocol;
pub mod risk;
pub mod session;
pub mod store;
pub mod transport;

pub use config::Config;
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use error::{ClientError, Result};
pub use session::{Session, SessionBuilder, SessionReport, SessionState};
pub use store::PatientStore;

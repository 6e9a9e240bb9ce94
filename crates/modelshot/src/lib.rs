//! Versioned content model diagrams with rendered preview images.
//!
//! A content model is a graph of content types plus a 2-D layout. Every
//! change to its graph appends a version; layout-only changes patch the
//! latest version in place. After each mutation the affected preview images
//! are re-rendered in a headless browser, uploaded to an asset store and
//! written back onto the records by a background worker.
//!
//! # Overview
//!
//! - [`service::ContentModelService`]: create, update, delete, read and list.
//! - [`revision`]: the version diff engine.
//! - [`pipeline::ScreenshotPipeline`]: renders and stores the images.
//! - [`worker::RegenerationWorker`]: runs pipeline jobs in the background.
//! - [`store`], [`assets`], [`render`], [`identity`]: collaborator seams
//!   with the implementations shipped here.
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//!
//! use modelshot::{
//!     config::AppConfig,
//!     identity::StaticTokens,
//!     service::{ContentModelService, CreateRequest},
//!     store::MemoryStore,
//!     worker::{RegenerationJob, RegenerationQueue},
//! };
//! use modelshot_core::identifier::UserId;
//!
//! /// Keeps jobs instead of running them.
//! #[derive(Default)]
//! struct Pending(Mutex<Vec<RegenerationJob>>);
//!
//! impl RegenerationQueue for Pending {
//!     fn dispatch(&self, job: RegenerationJob) {
//!         self.0.lock().unwrap().push(job);
//!     }
//! }
//!
//! let config = AppConfig::default();
//! let queue = Arc::new(Pending::default());
//! let service = ContentModelService::new(
//!     &config,
//!     Arc::new(MemoryStore::new()),
//!     queue.clone(),
//!     Arc::new(StaticTokens::default().with_token("t", UserId::new("alice"))),
//! )
//! .unwrap();
//!
//! let viewer = service.viewer(Some("t"), None);
//! let view = service
//!     .create(
//!         &viewer,
//!         CreateRequest {
//!             title: "Blog".to_string(),
//!             description: "Posts and authors".to_string(),
//!             model: r#"[{"sys": {"id": "post"}, "name": "Post", "fields": []}]"#.into(),
//!             layout: r#"{"post": {"x": 10, "y": 5}}"#.into(),
//!             visibility: None,
//!         },
//!     )
//!     .unwrap();
//!
//! assert_eq!(view.version.number, 1);
//! assert_eq!(queue.0.lock().unwrap().len(), 1);
//! ```

pub mod access;
pub mod assets;
pub mod config;
pub mod error;
pub mod identity;
pub mod pipeline;
pub mod render;
pub mod revision;
pub mod service;
pub mod store;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod view;
pub mod worker;

pub use error::{ErrorKind, ModelshotError};

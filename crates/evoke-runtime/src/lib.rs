//! Embedded WASM component runtime for evoke handlers.
//!
//! A handler is a WebAssembly component exporting a single function:
//!
//! ```wit
//! handler: func(event: string) -> result<string, string>;
//! ```
//!
//! [`HandlerComponent::load`] compiles the component and verifies that the
//! export is present; [`HandlerComponent::invoke`] runs it against one JSON
//! event in a fresh WASI sandbox. Making the handler a component keeps the
//! contract language-agnostic: anything that compiles to a component with
//! this export can process events.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use evoke_core::{EventBatch, replay};
//! use evoke_runtime::HandlerComponent;
//! use std::path::Path;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let batch = EventBatch::from_path(Path::new("/tmp/events.json"))?;
//! let handler = HandlerComponent::load(Path::new("/app/handler.wasm")).await?;
//! let report = replay(&handler, &batch).await;
//! println!("{} attempted, {} failed", report.attempted(), report.failed);
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod error;
pub mod handler;
pub mod wasistate;

pub use error::{HandlerLoadError, InvokeError};
pub use handler::{HANDLER_EXPORT, HandlerComponent};

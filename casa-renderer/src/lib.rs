//! # casa-renderer
//!
//! Tera-based rendering of the desired casa configuration blob.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use casa_renderer::{Renderer, TemplateContext};
//!
//! fn desired(ctx: &TemplateContext) {
//!     if let Ok(renderer) = Renderer::new() {
//!         if let Ok(blob) = renderer.render_blob(ctx) {
//!             println!("{}", blob["oxd_config"]["host"]);
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::TemplateContext;
pub use engine::{Renderer, WATCHED_FIELDS};
pub use error::RenderError;

//! PDF Composer Scheduler Library
//!
//! Cooperative cancellation and request coordination for the composer.
//!
//! Page rendering and live-merge previews are asynchronous, cancellable
//! operations with a last-requested-wins guarantee: starting a new request
//! for a viewport cancels any request still in flight for that viewport, and
//! a completion is only accepted if it belongs to the most recent request.
//!
//! # Example
//!
//! ```
//! use pdf_composer_scheduler::{RenderCoordinator, RenderRequest, ViewportKey};
//!
//! let mut coordinator = RenderCoordinator::new();
//! let key = ViewportKey { document_id: 1, page_index: 0 };
//!
//! let first = coordinator.begin(key, RenderRequest { zoom_percent: 100, rotation_degrees: 0 });
//! let second = coordinator.begin(key, RenderRequest { zoom_percent: 150, rotation_degrees: 0 });
//!
//! // The first request was superseded; its worker observes the cancellation.
//! assert!(first.token.is_cancelled());
//! assert!(coordinator.finish(key, second.generation));
//! ```

mod cancel;
mod debounce;
mod render_slots;

pub use cancel::CancellationToken;
pub use debounce::Debouncer;
pub use render_slots::{RenderCoordinator, RenderRequest, RenderTicket, ViewportKey};

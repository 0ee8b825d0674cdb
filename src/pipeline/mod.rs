//! Pipeline stages for adaptive chunked extraction.
//!
//! Each submodule implements exactly one concern, so every stage is
//! independently testable and the controller in [`crate::extract`] stays a
//! plain walk over ranges.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ partition ──▶ client ──▶ poll
//! (lopdf)    (ranges)      (POST)    (GET until terminal)
//! ```
//!
//! 1. [`source`]    — page counts and page-range slicing, with blank-page
//!    substitution for corrupt pages
//! 2. [`partition`] — range arithmetic and the chunk-size shrink machine
//! 3. [`client`]    — multipart submission with transport retry/backoff
//! 4. [`poll`]      — deadline-bounded status polling for pending jobs

pub mod client;
pub mod partition;
pub mod poll;
pub mod protocol;
pub mod source;

//! vidbatch-common: shared types and utilities.
//!
//! - **Typed IDs**: UUID wrappers for batches and jobs
//! - **Path Utilities**: video extension detection and upload name sanitizing
//! - **Error Handling**: common error type and result alias
//!
//! # Examples
//!
//! ```
//! use vidbatch_common::{BatchId, Error, Result};
//! use vidbatch_common::paths::is_video_file;
//! use std::path::Path;
//!
//! let batch_id = BatchId::new();
//! assert!(is_video_file(Path::new("clip.mov")));
//!
//! fn example() -> Result<()> {
//!     Err(Error::not_found("batch"))
//! }
//! # let _ = batch_id;
//! ```

pub mod error;
pub mod ids;
pub mod paths;

pub use error::{Error, Result};
pub use ids::*;

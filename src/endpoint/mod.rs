//! URL joining and per-mode endpoint resolution.

pub mod resolve;
pub mod url;

pub use resolve::{completion_url, models_url, CallMode};
pub use url::{has_segment, has_segment_pair, join_url};

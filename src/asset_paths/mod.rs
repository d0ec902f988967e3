//! Helpers for mapping public resource URLs onto the site's filesystem.
//!
//! Classification (site-local versus externally hosted) and path resolution live in separate
//! submodules so each can be tested against a bare [`crate::SiteContext`] without touching the
//! registry or the builder.

mod filters;
mod resolve;

pub use filters::is_external_url;
pub use resolve::{artifact_file_name, basename, local_path_for_url, normalise_prefix};

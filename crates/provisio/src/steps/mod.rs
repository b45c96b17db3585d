//! Workflow steps bundled with provisio.

pub mod aws;

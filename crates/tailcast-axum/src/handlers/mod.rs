//! HTTP handlers.

pub mod lines;
pub mod page;
pub mod status;
pub mod viewer_ws;

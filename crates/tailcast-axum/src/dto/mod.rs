//! Wire shapes for the viewer feeds and the JSON API.

mod frames;
mod status;

pub use frames::ViewerFrame;
pub use status::StatusResponse;

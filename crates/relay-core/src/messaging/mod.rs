//! Messenger-agnostic message model, outbound payload shaping and temporary media.

pub mod media;
pub mod payload;
pub mod types;

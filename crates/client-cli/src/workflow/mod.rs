//! Multi-step console workflows built on the draft store and the gateway.

pub mod create;
pub mod drafts;

#[cfg(test)]
pub(crate) mod testing;

pub use create::{CreateEventFlow, Stage};
pub use drafts::DraftEditor;

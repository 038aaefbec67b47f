//! Data model and wire types shared by the Samvedana console.

mod messages;
mod models;

pub use messages::*;
pub use models::*;

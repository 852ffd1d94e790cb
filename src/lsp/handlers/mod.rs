//! Handler module declarations and re-exports

pub mod board;
pub mod file;
pub mod interaction;
pub mod query;
pub mod selection;
pub mod uploads;

// Re-export all handlers for convenient access
pub use board::*;
pub use file::*;
pub use interaction::*;
pub use query::*;
pub use selection::*;
pub use uploads::*;

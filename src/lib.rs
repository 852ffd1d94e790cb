//! Copper view core for PCB pads and traces
//!
//! GPU-instanced batches for rectangle pads, circle pads and trace segments,
//! a geometry cache, layer depth placement, pointer picking with a
//! hover/selection state machine, a drag handle, and JSON/MessagePack
//! persistence. The `lsp` module exposes it all over line-delimited JSON-RPC.

pub mod config;
pub mod draw;
pub mod error;
pub mod lsp;

pub use config::ViewerConfig;
pub use draw::board::{Board, Component, ComponentFilter, ComponentKind};
pub use draw::scene::BoardScene;
pub use error::{BatchError, BoardError, ConfigError, ImportError, InteractionError, ValidationIssue};

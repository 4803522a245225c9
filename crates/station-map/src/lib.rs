//! Viewport-synchronized station feed, cluster drill-down and detail popup.
//!
//! `MapCore` is the single owner of all mutable map state; the other modules
//! are the pieces it drives.  `TerminalEngine` is the engine used by the
//! `station-map` binary.

pub mod cluster;
pub mod core;
pub mod detail;
pub mod engine;
pub mod feed;
pub mod log_layer;
pub mod popup;
pub mod terminal_engine;

pub use crate::core::{MapBroadcast, MapCore, MapEvent};
pub use crate::engine::{EngineError, MapEngine, ScreenPoint};

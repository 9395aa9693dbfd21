pub mod command;
pub mod compactor;
pub mod engine;
pub mod grid;
pub mod identity;
pub mod model;
pub mod observability;
pub mod wal;
pub mod wire;

pub use engine::{Engine, EngineError};

//! # pipl: a deterministic process-calculus engine
//!
//! Independent processes communicate only through synchronous named
//! channels. A channel completes a communication by pairing exactly one
//! pending sender with one pending reader. Everything runs on one thread as
//! cooperative interleaving, and channels are synchronized in the order they
//! became ready, so every run is reproducible.
//!
//! ## Quick Start
//!
//! ```rust
//! use pipl::{Engine, Value};
//!
//! # fn main() -> pipl::Result<()> {
//! let mut engine = Engine::new();
//! let w = engine.make_channel();
//!
//! let sender = engine.make_sequence();
//! engine.add_send(sender, w, 42)?;
//!
//! let reader = engine.make_sequence();
//! let x = engine.add_read(reader, w)?;
//!
//! engine.run_all(&[sender, reader])?;
//! assert_eq!(engine.binding(reader, x)?, Value::Int(42));
//! # Ok(())
//! # }
//! ```

// Core infrastructure modules
pub mod core;

// Engine building blocks
pub mod channel;
pub mod engine;
pub mod process;

// Re-exports for convenience
pub use crate::core::config::{EngineConfig, EngineConfigBuilder};
pub use crate::core::errors::{PiplError, Result};
pub use crate::core::value::{ChannelId, Name, ProcessId, RefId, Value, VarId};
pub use channel::Channel;
pub use engine::{
    BufferingEventSink, Engine, EngineEvent, EventEnvelope, EventSink, LoggingEventSink, RunStats,
};

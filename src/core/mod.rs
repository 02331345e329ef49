// Core infrastructure shared by channels, processes and the engine

pub mod config;
pub mod errors;
pub mod value;

// Re-export commonly used types
pub use config::{EngineConfig, EngineConfigBuilder};
pub use errors::{PiplError, Result};
pub use value::{ChannelId, Name, ProcessId, RefId, Value, VarId};

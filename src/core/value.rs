//! Handles and values shared by every part of the engine
//!
//! Channels, processes and reference cells all live in arenas owned by the
//! [`Engine`](crate::engine::Engine); the types here are the stable integer
//! handles into those arenas plus the values that flow over channels.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::errors::{PiplError, Result};

/// Handle to a channel owned by an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub usize);

/// Handle to a process (sequence, replica or composite) owned by an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(pub usize);

/// Placeholder name with no initial content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VarId(pub usize);

/// Slot in the reference arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefId(pub usize);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Content of a reference cell
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// Nothing has been bound yet
    Unset,
    Channel(ChannelId),
    Int(i64),
    Bool(bool),
    Char(char),
    Text(String),
}

impl Value {
    pub fn is_unset(&self) -> bool {
        matches!(self, Value::Unset)
    }

    /// The channel this value names, if it names one
    pub fn channel(&self) -> Option<ChannelId> {
        match self {
            Value::Channel(id) => Some(*id),
            _ => None,
        }
    }

    /// Interpret this value as a channel, failing on behalf of `process`
    pub fn as_channel(&self, process: ProcessId) -> Result<ChannelId> {
        self.channel().ok_or_else(|| PiplError::NotAChannel {
            process,
            value: self.clone(),
        })
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            Value::Char(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unset => write!(f, "<unset>"),
            Value::Channel(id) => write!(f, "{}", id),
            Value::Int(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Char(c) => write!(f, "{:?}", c),
            Value::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<ChannelId> for Value {
    fn from(id: ChannelId) -> Self {
        Value::Channel(id)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Char(c)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Unset => serde_json::Value::Null,
            Value::Channel(id) => serde_json::json!({ "channel": id.0 }),
            Value::Int(n) => serde_json::json!(n),
            Value::Bool(b) => serde_json::json!(b),
            Value::Char(c) => serde_json::json!(c.to_string()),
            Value::Text(s) => serde_json::json!(s),
        }
    }
}

/// Logical slot identity used when building a process.
///
/// Every distinct name a process mentions gets exactly one reference cell
/// in that process; steps that mention the same name share the cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Name {
    /// Stands for the channel until a read rebinds it
    Channel(ChannelId),
    /// Starts out [`Value::Unset`]
    Var(VarId),
    /// A literal standing for itself
    Const(Value),
}

impl Name {
    /// Content of the cell when a process first mentions this name
    pub fn initial_value(&self) -> Value {
        match self {
            Name::Channel(id) => Value::Channel(*id),
            Name::Var(_) => Value::Unset,
            Name::Const(value) => value.clone(),
        }
    }

    /// Whether the name may appear where a channel is expected
    pub fn is_channel_like(&self) -> bool {
        matches!(self, Name::Channel(_) | Name::Var(_))
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Name::Channel(id) => write!(f, "{}", id),
            Name::Var(id) => write!(f, "{}", id),
            Name::Const(value) => write!(f, "{}", value),
        }
    }
}

impl From<ChannelId> for Name {
    fn from(id: ChannelId) -> Self {
        Name::Channel(id)
    }
}

impl From<VarId> for Name {
    fn from(id: VarId) -> Self {
        Name::Var(id)
    }
}

impl From<Value> for Name {
    fn from(value: Value) -> Self {
        match value {
            Value::Channel(id) => Name::Channel(id),
            other => Name::Const(other),
        }
    }
}

impl From<i64> for Name {
    fn from(n: i64) -> Self {
        Name::Const(Value::Int(n))
    }
}

impl From<i32> for Name {
    fn from(n: i32) -> Self {
        Name::Const(Value::from(n))
    }
}

impl From<bool> for Name {
    fn from(b: bool) -> Self {
        Name::Const(Value::Bool(b))
    }
}

impl From<char> for Name {
    fn from(c: char) -> Self {
        Name::Const(Value::Char(c))
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name::Const(Value::from(s))
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Name::Const(Value::Text(s))
    }
}

//! Atomic actions a sequence is made of

use std::fmt;
use std::sync::Arc;

use crate::core::value::Value;

/// Callable run by a function step.
///
/// It sees the current contents of the step's argument cells; whatever it
/// leaves in the slice is written back.
pub type StepFn = Arc<dyn Fn(&mut [Value]) -> anyhow::Result<()> + Send + Sync>;

/// Index of a reference cell within one process instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot(pub usize);

#[derive(Clone)]
pub enum Step {
    /// Offer the content of `value` on the channel held in `channel`
    Send { channel: Slot, value: Slot },
    /// Offer to receive from the channel held in `channel` into `target`
    Read { channel: Slot, target: Slot },
    /// Run `func` over `args` and move on without touching any channel
    Function {
        label: String,
        func: StepFn,
        args: Vec<Slot>,
    },
}

impl Step {
    pub fn kind(&self) -> &'static str {
        match self {
            Step::Send { .. } => "send",
            Step::Read { .. } => "read",
            Step::Function { .. } => "function",
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Send { channel, value } => f
                .debug_struct("Send")
                .field("channel", channel)
                .field("value", value)
                .finish(),
            Step::Read { channel, target } => f
                .debug_struct("Read")
                .field("channel", channel)
                .field("target", target)
                .finish(),
            Step::Function { label, args, .. } => f
                .debug_struct("Function")
                .field("label", label)
                .field("args", args)
                .finish(),
        }
    }
}

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Type alias for positions in the history log
pub type StepIndex = u64;

/// One recorded transition
///
/// Identity is the `index` alone: two steps with the same index compare equal
/// even if their label or payload differ.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Position assigned at append time, never reused
    pub index: StepIndex,
    /// Human-readable label of the action that produced this transition
    pub action: String,
    /// Serialized application state right after the action.
    /// `None` stands for the initial state before any recorded action.
    pub resulting_state: Option<Vec<u8>>,
}

impl Step {
    pub fn new(index: StepIndex, action: impl Into<String>, resulting_state: Option<Vec<u8>>) -> Self {
        Self {
            index,
            action: action.into(),
            resulting_state,
        }
    }

    /// True when replaying this step restores the application's own
    /// initial state
    pub fn is_initial(&self) -> bool {
        self.resulting_state.is_none()
    }
}

impl PartialEq for Step {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for Step {}

impl Hash for Step {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

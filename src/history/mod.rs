pub mod actor;
pub mod reducer;
pub mod state;
pub mod types;

pub use actor::{
    Dispatch, DispatchOutcome, GetHistory, HistorySnapshot, HistoryStore, Origin,
    ReceiveTransition, SetBroadcastEnabled,
};
pub use reducer::{reduce, Effect, HistoryAction};
pub use state::HistoryLogState;
pub use types::{Step, StepIndex};

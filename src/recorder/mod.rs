pub mod middleware;
pub mod replay;

pub use middleware::{encode_state, Describe, HistorySink, Recorder, Reducer};
pub use replay::{decode_state, subscribe_resets, ReplaySink};

pub mod errors;

pub use errors::{HistorianError, Result};

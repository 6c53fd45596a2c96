pub mod cli;
pub mod config;
pub mod console;
pub mod history;
pub mod network;
pub mod recorder;
pub mod util;

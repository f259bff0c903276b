pub mod artifacts;
pub mod config;
pub mod daemon;
pub mod sync;

pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod database;
pub mod paging;
pub mod preferences;
pub mod remote;
pub mod stories;
pub mod telemetry;
pub mod utils;

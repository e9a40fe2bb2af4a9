pub mod components;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod startup;
pub mod utils;

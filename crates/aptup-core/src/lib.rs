pub mod apt;
pub mod config;
pub mod execution;
pub mod models;
pub mod orchestrator;

// src/lib.rs
pub mod cli;
pub mod config;
pub mod console;
pub mod environment;
pub mod errors;
pub mod grading;
pub mod models;
pub mod privilege;
pub mod report;
pub mod runners;
pub mod sidecar;
pub mod state;
pub mod submission;
pub mod user;

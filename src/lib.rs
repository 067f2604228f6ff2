// ABOUTME: Library root for fledged-imagemanager - exposes the image manager and its seams.
// ABOUTME: The main binary is in main.rs.

pub mod cluster;
pub mod config;
pub mod error;
pub mod manager;
pub mod output;
pub mod queue;
pub mod types;

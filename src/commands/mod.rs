//! Tauri IPC commands
//!
//! All commands exposed to the frontend via Tauri's invoke system.

pub mod finance;
pub mod market;
pub mod routes;
pub mod settings;

//! JSON-RPC API for daemon IPC.
//!
//! This module provides a JSON-RPC interface between a frontend (or any local
//! client) and the formforged daemon.

pub mod handlers;
pub mod server;
pub mod types;

pub use handlers::{ApiState, FormforgeApiImpl, FormforgeApiServer, rpc_error};
pub use server::{ServerHandle, start_server};
pub use types::*;

// focal-server library entry point.

pub mod api;
pub mod config;
pub mod cors;
pub mod notify;
pub mod rpc;
pub mod runtime;
pub mod workspace;

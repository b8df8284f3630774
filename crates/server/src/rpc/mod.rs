// MCP over JSON-RPC: method dispatch, the HTTP endpoint and the push channel.

pub mod http;
pub mod methods;
pub mod rules;
pub mod transport;
pub mod ws;

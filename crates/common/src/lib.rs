// focal-common: wire types shared across the FOCAL MCP crates.

pub mod naming;
pub mod protocol;
pub mod types;

pub mod client;
pub mod elastic;
pub mod memory;
pub mod retry;
pub mod schema;
pub mod types;

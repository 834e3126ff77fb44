pub mod config;
pub mod consumer;
pub mod context;
pub mod error;
pub mod forwarder;
pub mod invoker;
pub mod rebalance;
pub mod server;
pub mod types;

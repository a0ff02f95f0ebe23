pub mod cache;
pub mod config;
pub mod error;
pub mod grpc_server;
pub mod hub;
pub mod prober;

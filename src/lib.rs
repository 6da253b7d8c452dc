pub mod assembler;
pub mod chunks;
pub mod config;
pub mod error;
pub mod events;
pub mod handlers;
pub mod index;
pub mod media;
pub mod middleware;
pub mod models;
pub mod registry;
pub mod server;
pub mod state;
pub mod storage;
pub mod sweeper;
pub mod utils;

pub mod cli;
pub mod daemon;
pub mod errors;
pub mod models;
pub mod server;
pub mod storage;
pub mod tool;

pub mod config;
pub mod daemon;
pub mod domain;
pub mod ipc;
pub mod mail;
pub mod store;
pub mod sync;

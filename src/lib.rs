pub mod aggregate;
pub mod app;
pub mod client;
pub mod config;
pub mod consolidate;
pub mod domain;
pub mod error;
pub mod output;
pub mod pull;
pub mod roster;
pub mod store;
pub mod table;

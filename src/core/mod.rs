pub mod book;
pub mod catalog;
pub mod config;
pub mod progress;
pub mod store;

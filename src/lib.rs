pub mod app;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod export;
pub mod highlight;
pub mod pagination;
pub mod search;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};

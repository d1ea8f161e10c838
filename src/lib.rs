pub mod app;
pub mod cli;
pub mod config;
pub mod eagle;
pub mod folders;
pub mod gallery;
pub mod metadata;
pub mod tags;
pub mod ui;
pub mod watch;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use eagle::{EagleApi, EagleError, HttpEagleClient};

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod i18n;
pub mod images;
pub mod llm;
pub mod person_search;
pub mod research;
pub mod server;
pub mod stream;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use research::{ResearchContext, ResearchEvent, spawn_research};

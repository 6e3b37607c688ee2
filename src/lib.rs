pub mod api;
pub mod catalog;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod progression;
pub mod prompts;
pub mod store;
pub mod submissions;
pub mod tutor;
pub mod types;

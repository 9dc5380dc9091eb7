pub mod config;
pub mod engine;
pub mod error;
pub mod input;
pub mod menubar;
pub mod player;
pub mod program;
pub mod stage;
pub mod types;

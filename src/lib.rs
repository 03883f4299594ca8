pub mod app;
pub mod audio;
pub mod cli;
pub mod config;
pub mod global;
pub mod meeting;
pub mod pipeline;
pub mod recording;
pub mod recovery;
pub mod retry;
pub mod services;

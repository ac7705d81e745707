pub mod batch;
pub mod config;
pub mod documents;
pub mod health;
pub mod sessions;
pub mod utils;

pub mod answer;
pub mod core;
pub mod embedding;
pub mod index;
pub mod pipeline;
pub mod registry;
pub mod retrieval;
pub mod server;
pub mod state;

pub mod access;
pub mod api;
pub mod config;
pub mod derive;
pub mod error;
pub mod fake_backend;
pub mod forms;
pub mod http_client;
pub mod model;
pub mod provider;
pub mod session;
pub mod standings;
pub mod state;
pub mod store;
pub mod token;
pub mod validate;
pub mod wire;

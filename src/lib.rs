pub mod api;
pub mod auth;
pub mod config;
pub mod documents;
pub mod models;
pub mod scheduler;
pub mod services;

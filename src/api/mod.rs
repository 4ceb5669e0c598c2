// HTTP surface: routers, handlers and the shared application state

pub mod admin;
pub mod auth;
pub mod client;
pub mod dashboard;
pub mod directory;
pub mod errors;
pub mod events;
pub mod exercises;
pub mod health;
pub mod messages;
pub mod profile;
pub mod progress;
pub mod routes;
pub mod routines;
pub mod spaces;
pub mod state;
pub mod trainer;

pub use errors::{ApiError, ApiResult};
pub use routes::create_routes;
pub use state::AppState;

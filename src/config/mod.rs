// Configuration loaded from the environment

pub mod app;
pub mod database;
pub mod documents;
pub mod seeding;

pub use app::AppConfig;
pub use database::{run_migrations, DatabaseConfig};
pub use documents::{DocumentBackend, DocumentStoreConfig};
pub use seeding::DatabaseSeeder;

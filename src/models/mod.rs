// Relational records and request/response types

pub mod account;
pub mod dashboard;
pub mod event;
pub mod exercise;
pub mod institutional;
pub mod message;
pub mod profile;
pub mod progress;
pub mod routine;
pub mod space;
pub mod stats;
pub mod trainer;
pub mod validation;

pub use account::*;
pub use dashboard::*;
pub use event::*;
pub use exercise::*;
pub use institutional::*;
pub use message::*;
pub use profile::*;
pub use progress::*;
pub use routine::*;
pub use space::*;
pub use stats::*;
pub use trainer::*;

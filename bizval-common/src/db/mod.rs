//! Database schema, records and queries

pub mod analysis_status;
pub mod assessments;
pub mod companies;
pub mod conversations;
pub mod init;
pub mod models;
pub mod ndas;
pub mod settings;
pub mod tasks;
pub mod users;
pub mod valuations;

pub use init::init_database;
pub use models::*;

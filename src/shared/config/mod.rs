pub mod environment;

pub use environment::{get_database_filename, get_environment, AppConfig, Environment};

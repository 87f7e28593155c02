pub mod connection;
pub mod migrations;

pub use connection::{get_db_path, initialize_database};
pub use migrations::run_migrations;

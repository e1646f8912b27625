pub mod common_db;

pub mod connection;
pub mod constants;
pub mod discovery;
pub mod registry;
pub mod types;

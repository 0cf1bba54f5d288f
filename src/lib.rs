pub mod clients;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod memory;
pub mod recall;
pub mod reports;
pub mod routes;
pub mod secrets;
pub mod server;
pub mod shutdown;
pub mod vault;
pub mod vector;

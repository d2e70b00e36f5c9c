pub mod config;
pub mod data_objects;
pub mod errors;
pub mod providers;
pub mod routes;
pub mod server;

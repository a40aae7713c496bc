pub mod coercion;
pub mod connection;
pub mod error;
pub mod metadata;
pub mod schema;

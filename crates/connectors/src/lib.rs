pub mod factory;
pub mod sql;

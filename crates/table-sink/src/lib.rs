pub mod batch;
pub mod config;
pub mod error;
pub mod metrics;
pub mod restore;
pub mod sink;
pub mod task;

#[cfg(test)]
mod tests;

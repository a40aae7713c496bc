pub mod checkpoint;
pub mod core;
pub mod records;

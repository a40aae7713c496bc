pub mod column;
pub mod index;

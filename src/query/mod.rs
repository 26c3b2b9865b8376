pub mod types;
pub mod compiler;

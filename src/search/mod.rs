pub mod cursor;
pub mod registry;

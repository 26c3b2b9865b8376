pub mod layout;
pub mod segment;
pub mod file_lock;

pub mod value;
pub mod attribute;

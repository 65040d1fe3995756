pub mod simulate;
pub mod validate;

pub mod cloud;
pub mod matrix;
pub mod style;

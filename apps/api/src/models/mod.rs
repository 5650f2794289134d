pub mod application;
pub mod opportunity;

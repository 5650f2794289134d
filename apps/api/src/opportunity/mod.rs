pub mod gate;
pub mod handlers;
pub mod store;

pub mod backend;
pub mod executor;
pub mod factory;

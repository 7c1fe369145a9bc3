pub mod api;
pub mod backend;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod healing;

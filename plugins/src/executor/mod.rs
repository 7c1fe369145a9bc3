pub mod strategies;

pub use strategies::{
    AdaptiveConcurrencyPlugin, ExponentialBackoffPlugin, FixedConcurrencyPlugin,
    LinearRetryPlugin,
};

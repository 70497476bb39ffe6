pub mod proxy;
pub mod stats;

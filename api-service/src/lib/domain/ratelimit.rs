pub mod errors;
pub mod limiter;
pub mod models;
pub mod ports;

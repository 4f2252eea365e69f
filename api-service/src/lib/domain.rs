pub mod audit;
pub mod ratelimit;
pub mod registry;
pub mod user;

pub mod audit;
pub mod ratelimit;
pub mod repositories;

pub mod memory;
pub mod schema;
pub mod user;

pub use memory::InMemoryUserRepository;
pub use user::PostgresUserRepository;

pub mod path_validator;
pub mod worker_pool;

pub use path_validator::PathValidator;

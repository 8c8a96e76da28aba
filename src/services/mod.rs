pub mod assistant;
pub mod heygen;
pub mod s3;
pub mod waiter;

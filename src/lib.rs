pub mod coro;
pub mod rows;
pub mod error;

pub mod dump;
pub mod monitor;
pub mod transaction;

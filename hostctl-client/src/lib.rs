pub mod client;
pub mod outcome;
pub mod task;

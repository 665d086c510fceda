mod patch;
mod task;

pub use patch::*;
pub use task::*;

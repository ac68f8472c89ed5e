pub mod dep;
pub mod task;

pub use dep::{DepCommand, DepResult};
pub use task::{TaskCommand, TaskResult};

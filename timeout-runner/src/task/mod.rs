//! Task records and identity allocation.

mod id;
mod record;

pub use id::{TaskId, TaskIdAllocator};
pub use record::{QueueTask, TaskCallback, TimeoutTask};

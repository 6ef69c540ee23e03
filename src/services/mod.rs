pub mod backend;
pub mod image_worker;
pub mod source;

pub use backend::Backend;
pub use image_worker::ImageWorker;
pub use source::{CommandSource, StdinSource};

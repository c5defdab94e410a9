mod block;
mod error;

pub use block::BlockDevice;
pub use error::DeviceError;

use std::io;
use std::path::PathBuf;

use ddriver_core::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("wrong path [{given}], should be [{expected}]")]
    InvalidPath { given: PathBuf, expected: PathBuf },
    #[error("can't open device {path}: {source}")]
    DeviceOpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("low space: can't allocate {capacity} bytes for {path}: {source}")]
    AllocationFailed {
        path: PathBuf,
        capacity: u64,
        #[source]
        source: io::Error,
    },
    #[error("can't init log {path}: {source}")]
    LogInitFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid device configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("offset {offset} must be aligned to block size {block_size}")]
    MisalignedOffset { offset: i128, block_size: usize },
    #[error("seek target {offset} is outside the device ({capacity} bytes)")]
    SeekOutOfRange { offset: i128, capacity: u64 },
    #[error("io size {size} should be exactly the block size {block_size}")]
    InvalidTransferSize { size: usize, block_size: usize },
    #[error("no block left at offset {position} ({capacity} bytes)")]
    EndOfDevice { position: u64, capacity: u64 },
    #[error("short {op}: {done} of {expected} bytes transferred")]
    ShortTransfer {
        op: &'static str,
        done: usize,
        expected: usize,
    },
    #[error("control reply needs {needed} bytes, buffer holds {available}")]
    ControlBufferTooSmall { needed: usize, available: usize },
    #[error("backing store I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DeviceError {
    /// Open-time failures that end the session; there is nothing to retry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidPath { .. }
                | Self::DeviceOpenFailed { .. }
                | Self::AllocationFailed { .. }
                | Self::LogInitFailed { .. }
                | Self::Config(_)
        )
    }

    /// Argument validation failures. The call was rejected before any state changed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MisalignedOffset { .. }
                | Self::SeekOutOfRange { .. }
                | Self::InvalidTransferSize { .. }
                | Self::EndOfDevice { .. }
                | Self::ControlBufferTooSmall { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::DeviceError;
    use ddriver_core::ConfigError;
    use std::path::PathBuf;

    #[test]
    fn classifies_open_errors_as_fatal() {
        let err = DeviceError::InvalidPath {
            given: PathBuf::from("/tmp/elsewhere"),
            expected: PathBuf::from("/home/u/ddriver"),
        };
        assert!(err.is_fatal());
        assert!(!err.is_recoverable());
        assert!(DeviceError::from(ConfigError::ZeroTrackCount).is_fatal());
    }

    #[test]
    fn classifies_validation_errors_as_recoverable() {
        let err = DeviceError::InvalidTransferSize {
            size: 256,
            block_size: 512,
        };
        assert!(err.is_recoverable());
        assert!(!err.is_fatal());
        assert_eq!(
            err.to_string(),
            "io size 256 should be exactly the block size 512"
        );
    }
}

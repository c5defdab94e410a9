//! User-space emulation of a hard disk for building filesystems on.
//!
//! [`EmulatedDisk`] exposes a fixed-size, block-addressed store backed by a
//! host file, blocking each operation for a simulated seek, rotation or
//! transfer delay, plus a small control channel for geometry, counters and
//! reset.

mod clock;
mod config;
mod console;
mod disk;
mod storage;

pub use clock::{Clock, RecordingClock, ThreadClock};
pub use config::{DEVICE_LOG, DEVICE_NAME, DevicePaths, DiskOptions, IoPolicy};
pub use console::{DiagnosticLog, Level};
pub use ddriver_core::{ConfigError, ControlCommand, DeviceConfig, DeviceState};
pub use disk::EmulatedDisk;
pub use storage::{BlockDevice, DeviceError};

#![cfg_attr(not(feature = "std"), no_std)]

//! Geometry, timing model and control protocol of the emulated disk.
//!
//! Everything here is plain arithmetic and byte encoding so it can be shared
//! by the file-backed device and by tools that only talk the control protocol.

use core::fmt;
use core::time::Duration;

pub const DEFAULT_CAPACITY: u64 = 4 * 1024 * 1024;
pub const DEFAULT_BLOCK_SIZE: usize = 512;
pub const DEFAULT_TRACK_COUNT: u64 = 100;
pub const DEFAULT_READ_LATENCY_MS: u64 = 2;
pub const DEFAULT_WRITE_LATENCY_MS: u64 = 1;
/// Time for one full platter rotation (4.17 ms at 14400 rpm, rounded down).
pub const DEFAULT_SEEK_LATENCY_MS: u64 = 4;

/// Granularity used when zeroing the backing store.
pub const RESET_CHUNK_SIZE: usize = 4096;
pub const WORD_REPLY_SIZE: usize = 4;
pub const STATE_REPLY_SIZE: usize = 3 * WORD_REPLY_SIZE;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigError {
    ZeroBlockSize,
    ZeroTrackCount,
    UnalignedCapacity,
    TooManyTracks,
    CapacityTooLarge,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::ZeroBlockSize => "block size must be non-zero",
            Self::ZeroTrackCount => "track count must be non-zero",
            Self::UnalignedCapacity => "capacity must be a whole number of blocks",
            Self::TooManyTracks => "track count exceeds capacity in bytes",
            Self::CapacityTooLarge => "capacity does not fit the 32-bit control reply",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

/// Static description of the emulated hardware.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceConfig {
    pub capacity_bytes: u64,
    pub block_size_bytes: usize,
    pub track_count: u64,
    pub read_latency_ms: u64,
    pub write_latency_ms: u64,
    pub seek_latency_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: DEFAULT_CAPACITY,
            block_size_bytes: DEFAULT_BLOCK_SIZE,
            track_count: DEFAULT_TRACK_COUNT,
            read_latency_ms: DEFAULT_READ_LATENCY_MS,
            write_latency_ms: DEFAULT_WRITE_LATENCY_MS,
            seek_latency_ms: DEFAULT_SEEK_LATENCY_MS,
        }
    }
}

impl DeviceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_size_bytes == 0 {
            return Err(ConfigError::ZeroBlockSize);
        }
        if self.track_count == 0 {
            return Err(ConfigError::ZeroTrackCount);
        }
        if self.capacity_bytes % self.block_size_bytes as u64 != 0 {
            return Err(ConfigError::UnalignedCapacity);
        }
        if self.track_count > self.capacity_bytes {
            return Err(ConfigError::TooManyTracks);
        }
        if self.capacity_bytes > u64::from(u32::MAX) {
            return Err(ConfigError::CapacityTooLarge);
        }
        Ok(())
    }

    pub fn block_count(&self) -> u64 {
        self.capacity_bytes / self.block_size_bytes as u64
    }

    /// Bytes covered by one rotation of the platter.
    pub fn track_bytes(&self) -> u64 {
        self.capacity_bytes / self.track_count
    }

    pub fn is_aligned(&self, offset: u64) -> bool {
        offset % self.block_size_bytes as u64 == 0
    }

    /// Cost of moving the head from `from` to `to`.
    ///
    /// Only the distance within a single track matters: skipping whole tracks
    /// lands the head on the same rotational angle, so at most one rotation
    /// (`seek_latency_ms`) is ever paid.
    pub fn rotational_delay(&self, from: u64, to: u64) -> Duration {
        let track_bytes = self.track_bytes();
        if track_bytes == 0 {
            return Duration::ZERO;
        }
        let distance = from.abs_diff(to) % track_bytes;
        if distance == 0 {
            return Duration::ZERO;
        }
        let micros = u128::from(distance) * u128::from(self.seek_latency_ms) * 1000
            / u128::from(track_bytes);
        Duration::from_micros(micros as u64)
    }

    pub fn read_latency(&self) -> Duration {
        Duration::from_millis(self.read_latency_ms)
    }

    pub fn write_latency(&self) -> Duration {
        Duration::from_millis(self.write_latency_ms)
    }
}

/// Commands understood by the control channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum ControlCommand {
    QueryCapacity = 0,
    QueryState = 1,
    ResetDevice = 2,
    QueryBlockSize = 3,
}

impl ControlCommand {
    pub const ALL: [Self; 4] = [
        Self::QueryCapacity,
        Self::QueryState,
        Self::ResetDevice,
        Self::QueryBlockSize,
    ];

    pub const fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|cmd| cmd.code() == code)
    }

    /// Bytes the command writes into the caller's output buffer.
    pub const fn reply_size(self) -> usize {
        match self {
            Self::QueryCapacity | Self::QueryBlockSize => WORD_REPLY_SIZE,
            Self::QueryState => STATE_REPLY_SIZE,
            Self::ResetDevice => 0,
        }
    }
}

/// Operation counters of one open session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceState {
    pub read_count: u32,
    pub write_count: u32,
    pub seek_count: u32,
}

impl DeviceState {
    pub fn record_read(&mut self) {
        self.read_count = self.read_count.saturating_add(1);
    }

    pub fn record_write(&mut self) {
        self.write_count = self.write_count.saturating_add(1);
    }

    pub fn record_seek(&mut self) {
        self.seek_count = self.seek_count.saturating_add(1);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn encode(self, out: &mut [u8; STATE_REPLY_SIZE]) {
        write_u32(out, 0, self.read_count);
        write_u32(out, 4, self.write_count);
        write_u32(out, 8, self.seek_count);
    }

    pub fn decode(input: &[u8; STATE_REPLY_SIZE]) -> Self {
        Self {
            read_count: read_u32(input, 0),
            write_count: read_u32(input, 4),
            seek_count: read_u32(input, 8),
        }
    }
}

pub fn encode_word(value: u32, out: &mut [u8; WORD_REPLY_SIZE]) {
    write_u32(out, 0, value);
}

pub fn decode_word(input: &[u8; WORD_REPLY_SIZE]) -> u32 {
    read_u32(input, 0)
}

fn write_u32(out: &mut [u8], offset: usize, value: u32) {
    out[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn read_u32(input: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        input[offset],
        input[offset + 1],
        input[offset + 2],
        input[offset + 3],
    ])
}

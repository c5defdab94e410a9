use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, SeekFrom};
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::time::Duration;

use fs4::fs_std::FileExt as _;

use ddriver_core::{
    ControlCommand, DeviceConfig, DeviceState, RESET_CHUNK_SIZE, STATE_REPLY_SIZE,
    WORD_REPLY_SIZE, decode_word, encode_word,
};

use crate::clock::{Clock, ThreadClock};
use crate::config::{DiskOptions, IoPolicy};
use crate::console::{self, DiagnosticLog};
use crate::storage::{BlockDevice, DeviceError};

/// A file-backed disk that charges hard-drive latencies for every operation.
///
/// One value is one open session: counters start at zero on `open` and are
/// dropped on `close`. Every call blocks on the clock for its simulated cost
/// before returning.
pub struct EmulatedDisk<C: Clock = ThreadClock> {
    file: File,
    log: DiagnosticLog,
    geometry: DeviceConfig,
    policy: IoPolicy,
    state: DeviceState,
    position: u64,
    clock: C,
}

impl EmulatedDisk<ThreadClock> {
    pub fn open(path: impl AsRef<Path>, options: DiskOptions) -> Result<Self, DeviceError> {
        Self::open_with_clock(path, options, ThreadClock)
    }
}

impl<C: Clock> EmulatedDisk<C> {
    /// Opens the backing store at `path`, which must be `options.paths.device`.
    ///
    /// The store is created when missing, sized to exactly the configured
    /// capacity and has that capacity reserved on the host filesystem;
    /// existing contents below that size are kept.
    pub fn open_with_clock(
        path: impl AsRef<Path>,
        options: DiskOptions,
        clock: C,
    ) -> Result<Self, DeviceError> {
        let path = path.as_ref();
        let DiskOptions {
            geometry,
            paths,
            policy,
            echo,
        } = options;

        if let Err(err) = geometry.validate() {
            console::early_panic(format_args!("invalid geometry: {err}"));
            return Err(err.into());
        }

        if path != paths.device.as_path() {
            console::early_panic(format_args!(
                "wrong path [{}], should be [{}]",
                path.display(),
                paths.device.display()
            ));
            return Err(DeviceError::InvalidPath {
                given: path.to_path_buf(),
                expected: paths.device,
            });
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|source| {
                console::early_panic(format_args!("can't open device: {source}"));
                DeviceError::DeviceOpenFailed {
                    path: path.to_path_buf(),
                    source,
                }
            })?;

        let reserved = file
            .set_len(geometry.capacity_bytes)
            .and_then(|()| file.allocate(geometry.capacity_bytes));
        if let Err(source) = reserved {
            console::early_panic(format_args!("low space"));
            return Err(DeviceError::AllocationFailed {
                path: path.to_path_buf(),
                capacity: geometry.capacity_bytes,
                source,
            });
        }

        let mut log = DiagnosticLog::create(&paths.log, echo).map_err(|source| {
            console::early_panic(format_args!("can't init log: {}", paths.log.display()));
            DeviceError::LogInitFailed {
                path: paths.log.clone(),
                source,
            }
        })?;
        log.info(format_args!(
            "opened {} ({} bytes, {} byte blocks, {} tracks)",
            path.display(),
            geometry.capacity_bytes,
            geometry.block_size_bytes,
            geometry.track_count
        ));

        Ok(Self {
            file,
            log,
            geometry,
            policy,
            state: DeviceState::default(),
            position: 0,
            clock,
        })
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.geometry
    }

    pub fn policy(&self) -> IoPolicy {
        self.policy
    }

    /// Current head position in bytes.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Moves the head and waits out the rotational delay.
    ///
    /// The target must be block aligned and inside the device. A rejected
    /// seek changes nothing.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64, DeviceError> {
        let capacity = self.geometry.capacity_bytes;
        let block_size = self.geometry.block_size_bytes;
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(delta) => i128::from(self.position) + i128::from(delta),
            SeekFrom::End(delta) => i128::from(capacity) + i128::from(delta),
        };

        let Ok(target) = u64::try_from(target) else {
            return Err(self.out_of_range(target));
        };
        if !self.geometry.is_aligned(target) {
            self.log.alert(format_args!(
                "offset {target} must be aligned to block size {block_size}"
            ));
            return Err(DeviceError::MisalignedOffset {
                offset: i128::from(target),
                block_size,
            });
        }
        if target > capacity {
            return Err(self.out_of_range(i128::from(target)));
        }

        let from = self.position;
        self.position = target;
        self.state.record_seek();
        self.spend(self.geometry.rotational_delay(from, target));
        Ok(target)
    }

    /// Reads one block at the head position into `buf`.
    ///
    /// `buf` must be exactly one block long. Returns the block size.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        self.check_size(buf.len())?;
        self.check_room()?;
        self.spend(self.geometry.read_latency());
        let done = fill_at(&self.file, buf, self.position)
            .map_err(|err| self.io_failed("read", err))?;
        self.finish_transfer("read", done)?;
        self.state.record_read();
        Ok(self.geometry.block_size_bytes)
    }

    /// Writes one block at the head position. Same contract as [`Self::read`].
    pub fn write(&mut self, buf: &[u8]) -> Result<usize, DeviceError> {
        self.check_size(buf.len())?;
        self.check_room()?;
        self.spend(self.geometry.write_latency());
        let done = drain_at(&self.file, buf, self.position)
            .map_err(|err| self.io_failed("write", err))?;
        self.finish_transfer("write", done)?;
        self.state.record_write();
        Ok(self.geometry.block_size_bytes)
    }

    /// Runs a control command by its numeric code.
    ///
    /// Replies are written little-endian to the front of `out`. Unknown codes
    /// are a successful no-op and leave `out` untouched.
    pub fn control(&mut self, code: u32, out: &mut [u8]) -> Result<(), DeviceError> {
        let Some(command) = ControlCommand::from_code(code) else {
            return Ok(());
        };

        let needed = command.reply_size();
        if out.len() < needed {
            self.log.alert(format_args!(
                "control {command:?} needs {needed} bytes, got {}",
                out.len()
            ));
            return Err(DeviceError::ControlBufferTooSmall {
                needed,
                available: out.len(),
            });
        }

        match command {
            ControlCommand::QueryCapacity => {
                // validate() keeps the capacity inside u32.
                let capacity = self.geometry.capacity_bytes as u32;
                encode_word(capacity, reply::<WORD_REPLY_SIZE>(out)?);
            }
            ControlCommand::QueryBlockSize => {
                let block_size = self.geometry.block_size_bytes as u32;
                encode_word(block_size, reply::<WORD_REPLY_SIZE>(out)?);
            }
            ControlCommand::QueryState => {
                self.state.encode(reply::<STATE_REPLY_SIZE>(out)?);
            }
            ControlCommand::ResetDevice => self.reset_device()?,
        }
        Ok(())
    }

    pub fn query_capacity(&mut self) -> Result<u64, DeviceError> {
        let mut out = [0_u8; WORD_REPLY_SIZE];
        self.control(ControlCommand::QueryCapacity.code(), &mut out)?;
        Ok(u64::from(decode_word(&out)))
    }

    pub fn query_block_size(&mut self) -> Result<usize, DeviceError> {
        let mut out = [0_u8; WORD_REPLY_SIZE];
        self.control(ControlCommand::QueryBlockSize.code(), &mut out)?;
        Ok(decode_word(&out) as usize)
    }

    pub fn query_state(&mut self) -> Result<DeviceState, DeviceError> {
        let mut out = [0_u8; STATE_REPLY_SIZE];
        self.control(ControlCommand::QueryState.code(), &mut out)?;
        Ok(DeviceState::decode(&out))
    }

    pub fn reset(&mut self) -> Result<(), DeviceError> {
        self.control(ControlCommand::ResetDevice.code(), &mut [])
    }

    /// Ends the session, syncing the backing store and the log.
    pub fn close(mut self) -> Result<(), DeviceError> {
        self.log.info(format_args!(
            "closed after {} reads, {} writes, {} seeks",
            self.state.read_count, self.state.write_count, self.state.seek_count
        ));
        self.file
            .sync_all()
            .map_err(|err| self.io_failed("sync", err))?;
        self.log.flush()?;
        Ok(())
    }

    fn reset_device(&mut self) -> Result<(), DeviceError> {
        let zeros = [0_u8; RESET_CHUNK_SIZE];
        let capacity = self.geometry.capacity_bytes;
        let mut offset = 0;
        while offset < capacity {
            let chunk = (capacity - offset).min(RESET_CHUNK_SIZE as u64) as usize;
            self.file
                .write_all_at(&zeros[..chunk], offset)
                .map_err(|err| self.io_failed("reset", err))?;
            offset += chunk as u64;
        }
        self.position = 0;
        self.state.clear();
        self.log.info(format_args!("device reset"));
        Ok(())
    }

    fn check_size(&mut self, size: usize) -> Result<(), DeviceError> {
        let block_size = self.geometry.block_size_bytes;
        if size != block_size {
            self.log
                .alert(format_args!("io size {size} should align to {block_size}"));
            return Err(DeviceError::InvalidTransferSize { size, block_size });
        }
        Ok(())
    }

    fn check_room(&mut self) -> Result<(), DeviceError> {
        let capacity = self.geometry.capacity_bytes;
        if self.position + self.geometry.block_size_bytes as u64 > capacity {
            self.log.alert(format_args!(
                "no block left at offset {} ({capacity} bytes)",
                self.position
            ));
            return Err(DeviceError::EndOfDevice {
                position: self.position,
                capacity,
            });
        }
        Ok(())
    }

    fn finish_transfer(&mut self, op: &'static str, done: usize) -> Result<(), DeviceError> {
        let block_size = self.geometry.block_size_bytes;
        if done != block_size && self.policy == IoPolicy::Strict {
            self.log.alert(format_args!(
                "short {op} at offset {}: {done} of {block_size} bytes",
                self.position
            ));
            return Err(DeviceError::ShortTransfer {
                op,
                done,
                expected: block_size,
            });
        }
        self.position += block_size as u64;
        Ok(())
    }

    fn out_of_range(&mut self, offset: i128) -> DeviceError {
        let capacity = self.geometry.capacity_bytes;
        self.log.alert(format_args!(
            "offset {offset} is outside the device ({capacity} bytes)"
        ));
        DeviceError::SeekOutOfRange { offset, capacity }
    }

    fn io_failed(&mut self, op: &str, err: io::Error) -> DeviceError {
        self.log
            .panic(format_args!("{op} error at offset {}: {err}", self.position));
        DeviceError::Io(err)
    }

    fn spend(&mut self, delay: Duration) {
        if !delay.is_zero() {
            self.clock.sleep(delay);
        }
    }

    fn block_offset(&self, lba: u64) -> Result<u64, DeviceError> {
        let block_size = self.geometry.block_size_bytes as u64;
        let capacity = self.geometry.capacity_bytes;
        lba.checked_mul(block_size)
            .filter(|offset| *offset < capacity)
            .ok_or(DeviceError::EndOfDevice {
                position: lba.saturating_mul(block_size),
                capacity,
            })
    }
}

impl<C: Clock> BlockDevice for EmulatedDisk<C> {
    fn block_size(&self) -> usize {
        self.geometry.block_size_bytes
    }

    fn block_count(&self) -> u64 {
        self.geometry.block_count()
    }

    fn read_block(&mut self, lba: u64, out: &mut [u8]) -> Result<(), DeviceError> {
        self.check_size(out.len())?;
        let offset = self.block_offset(lba)?;
        self.seek(SeekFrom::Start(offset))?;
        self.read(out).map(|_| ())
    }

    fn write_block(&mut self, lba: u64, data: &[u8]) -> Result<(), DeviceError> {
        self.check_size(data.len())?;
        let offset = self.block_offset(lba)?;
        self.seek(SeekFrom::Start(offset))?;
        self.write(data).map(|_| ())
    }
}

fn reply<const N: usize>(out: &mut [u8]) -> Result<&mut [u8; N], DeviceError> {
    let available = out.len();
    out.first_chunk_mut::<N>()
        .ok_or(DeviceError::ControlBufferTooSmall {
            needed: N,
            available,
        })
}

fn fill_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    let mut done = 0;
    while done < buf.len() {
        match file.read_at(&mut buf[done..], offset + done as u64) {
            Ok(0) => break,
            Ok(n) => done += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(done)
}

fn drain_at(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    let mut done = 0;
    while done < buf.len() {
        match file.write_at(&buf[done..], offset + done as u64) {
            Ok(0) => break,
            Ok(n) => done += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(done)
}

use clap::{Parser, Subcommand};
use ddriver::{
    BlockDevice, DeviceConfig, DevicePaths, DiskOptions, EmulatedDisk, IoPolicy,
};
use ddriver_core::{
    DEFAULT_BLOCK_SIZE, DEFAULT_CAPACITY, DEFAULT_READ_LATENCY_MS, DEFAULT_SEEK_LATENCY_MS,
    DEFAULT_TRACK_COUNT, DEFAULT_WRITE_LATENCY_MS,
};
use std::ffi::OsString;
use std::fmt::Write as _;
use std::io::SeekFrom;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "ddriver-tool", about = "Operate the emulated disk from the command line")]
pub struct Cli {
    /// Directory holding the device and its log (defaults to $HOME).
    #[arg(long, value_name = "DIR")]
    pub home: Option<PathBuf>,
    /// Device size in bytes.
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    pub capacity: u64,
    /// Transfer unit in bytes.
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
    pub block_size: usize,
    /// Tracks the capacity is divided into.
    #[arg(long, default_value_t = DEFAULT_TRACK_COUNT)]
    pub tracks: u64,
    #[arg(long, value_name = "MS", default_value_t = DEFAULT_READ_LATENCY_MS)]
    pub read_latency_ms: u64,
    #[arg(long, value_name = "MS", default_value_t = DEFAULT_WRITE_LATENCY_MS)]
    pub write_latency_ms: u64,
    /// Time of one full rotation.
    #[arg(long, value_name = "MS", default_value_t = DEFAULT_SEEK_LATENCY_MS)]
    pub seek_latency_ms: u64,
    /// Report short backing-store transfers as full blocks.
    #[arg(long)]
    pub lenient: bool,
    /// Keep diagnostics in the log file only.
    #[arg(short, long)]
    pub quiet: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print capacity, block size and track layout.
    Info,
    /// Zero the whole device.
    Reset,
    /// Dump one block as hex.
    Read {
        #[arg(value_name = "BLOCK")]
        block: u64,
    },
    /// Fill one block with a byte value.
    Write {
        #[arg(value_name = "BLOCK")]
        block: u64,
        /// Byte to fill with, decimal or 0x-prefixed hex.
        #[arg(long, default_value = "0", value_parser = parse_byte)]
        fill: u8,
    },
    /// Send a raw control code and print the reply bytes.
    Control {
        #[arg(value_name = "CODE")]
        code: u32,
    },
    /// Write, seek back and read block 0, then print the counters.
    Selftest,
}

impl Cli {
    pub fn geometry(&self) -> DeviceConfig {
        DeviceConfig {
            capacity_bytes: self.capacity,
            block_size_bytes: self.block_size,
            track_count: self.tracks,
            read_latency_ms: self.read_latency_ms,
            write_latency_ms: self.write_latency_ms,
            seek_latency_ms: self.seek_latency_ms,
        }
    }

    pub fn paths(&self) -> Result<DevicePaths, String> {
        match &self.home {
            Some(home) => Ok(DevicePaths::for_home(home)),
            None => DevicePaths::from_env().ok_or_else(|| "HOME is not set; pass --home".to_string()),
        }
    }

    pub fn options(&self) -> Result<DiskOptions, String> {
        let policy = if self.lenient {
            IoPolicy::Lenient
        } else {
            IoPolicy::Strict
        };
        let mut options = DiskOptions::new(self.paths()?)
            .with_geometry(self.geometry())
            .with_policy(policy);
        if self.quiet {
            options = options.quiet();
        }
        Ok(options)
    }
}

pub fn run_from<I, T>(args: I) -> Result<(), String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) if !err.use_stderr() => {
            print!("{err}");
            return Ok(());
        }
        Err(err) => return Err(err.to_string()),
    };
    let report = run_with_cli(cli)?;
    print!("{report}");
    Ok(())
}

/// Opens the device, runs one command and returns what it printed.
pub fn run_with_cli(cli: Cli) -> Result<String, String> {
    let options = cli.options()?;
    let device = options.paths.device.clone();
    let mut disk =
        EmulatedDisk::open(&device, options).map_err(|e| format!("open {}: {e}", device.display()))?;
    let report = execute(&cli.command, &mut disk);
    let closed = disk.close().map_err(|e| format!("close: {e}"));
    let report = report?;
    closed?;
    Ok(report)
}

pub fn execute<C: ddriver::Clock>(
    command: &Command,
    disk: &mut EmulatedDisk<C>,
) -> Result<String, String> {
    let mut out = String::new();
    match command {
        Command::Info => {
            let capacity = disk.query_capacity().map_err(|e| e.to_string())?;
            let block_size = disk.query_block_size().map_err(|e| e.to_string())?;
            let cfg = disk.config();
            let _ = writeln!(out, "capacity: {capacity} bytes");
            let _ = writeln!(out, "block size: {block_size} bytes");
            let _ = writeln!(out, "blocks: {}", cfg.block_count());
            let _ = writeln!(out, "tracks: {} ({} bytes each)", cfg.track_count, cfg.track_bytes());
            let _ = writeln!(out, "io policy: {:?}", disk.policy());
        }
        Command::Reset => {
            disk.reset().map_err(|e| e.to_string())?;
            let _ = writeln!(out, "reset {} bytes", disk.config().capacity_bytes);
        }
        Command::Read { block } => {
            let mut buf = vec![0_u8; disk.config().block_size_bytes];
            disk.read_block(*block, &mut buf)
                .map_err(|e| format!("read block {block}: {e}"))?;
            hex_dump(&mut out, &buf);
        }
        Command::Write { block, fill } => {
            let buf = vec![*fill; disk.config().block_size_bytes];
            disk.write_block(*block, &buf)
                .map_err(|e| format!("write block {block}: {e}"))?;
            let _ = writeln!(out, "wrote block {block} with {fill:#04x}");
        }
        Command::Control { code } => {
            let mut reply = [0_u8; 16];
            disk.control(*code, &mut reply).map_err(|e| e.to_string())?;
            hex_dump(&mut out, &reply);
        }
        Command::Selftest => selftest(&mut out, disk)?,
    }
    Ok(out)
}

fn selftest<C: ddriver::Clock>(out: &mut String, disk: &mut EmulatedDisk<C>) -> Result<(), String> {
    let block_size = disk.config().block_size_bytes;
    let pattern = vec![0xAB_u8; block_size];
    let mut readback = vec![0_u8; block_size];

    disk.seek(SeekFrom::Start(0)).map_err(|e| e.to_string())?;
    disk.write(&pattern).map_err(|e| e.to_string())?;
    disk.seek(SeekFrom::Start(0)).map_err(|e| e.to_string())?;
    disk.read(&mut readback).map_err(|e| e.to_string())?;
    if readback != pattern {
        return Err("selftest: block 0 read back differently".to_string());
    }

    let state = disk.query_state().map_err(|e| e.to_string())?;
    let _ = writeln!(out, "selftest ok");
    let _ = writeln!(
        out,
        "reads: {}, writes: {}, seeks: {}",
        state.read_count, state.write_count, state.seek_count
    );
    Ok(())
}

fn hex_dump(out: &mut String, bytes: &[u8]) {
    for (row, chunk) in bytes.chunks(16).enumerate() {
        let _ = write!(out, "{:04x}:", row * 16);
        for byte in chunk {
            let _ = write!(out, " {byte:02x}");
        }
        out.push('\n');
    }
}

fn parse_byte(raw: &str) -> Result<u8, String> {
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => raw.parse(),
    };
    parsed.map_err(|e| format!("invalid byte {raw}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::{Cli, parse_byte, run_from, run_with_cli};
    use clap::Parser;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_home(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        path.push(format!("ddriver-tool-{name}-{nanos}"));
        fs::create_dir_all(&path).expect("create home");
        path
    }

    fn cli(home: &Path, rest: &[&str]) -> Cli {
        let mut args = vec![
            "ddriver-tool",
            "--home",
            home.to_str().expect("home str"),
            "--capacity",
            "51200",
            "--tracks",
            "10",
            "--read-latency-ms",
            "0",
            "--write-latency-ms",
            "0",
            "--seek-latency-ms",
            "0",
            "--quiet",
        ];
        args.extend_from_slice(rest);
        Cli::try_parse_from(args).expect("parse cli")
    }

    #[test]
    fn parses_bytes() {
        assert_eq!(parse_byte("171"), Ok(0xAB));
        assert_eq!(parse_byte("0xab"), Ok(0xAB));
        assert_eq!(parse_byte("0XFF"), Ok(0xFF));
        assert!(parse_byte("0x100").is_err());
        assert!(parse_byte("zz").is_err());
    }

    #[test]
    fn info_reports_geometry() {
        let home = temp_home("info");
        let report = run_with_cli(cli(&home, &["info"])).expect("info");
        assert!(report.contains("capacity: 51200 bytes"));
        assert!(report.contains("block size: 512 bytes"));
        assert!(report.contains("tracks: 10 (5120 bytes each)"));
        assert!(report.contains("io policy: Strict"));
        assert_eq!(fs::metadata(home.join("ddriver")).expect("store").len(), 51_200);
        let _ = fs::remove_dir_all(home);
    }

    #[test]
    fn write_then_read_block() {
        let home = temp_home("rw");
        run_with_cli(cli(&home, &["write", "3", "--fill", "0xAB"])).expect("write");
        let report = run_with_cli(cli(&home, &["read", "3"])).expect("read");
        assert!(report.starts_with("0000: ab ab"));
        assert_eq!(report.lines().count(), 32);

        let image = fs::read(home.join("ddriver")).expect("read store");
        assert!(image[1536..2048].iter().all(|b| *b == 0xAB));
        assert!(image[..1536].iter().all(|b| *b == 0));
        let _ = fs::remove_dir_all(home);
    }

    #[test]
    fn reset_clears_device() {
        let home = temp_home("reset");
        run_with_cli(cli(&home, &["write", "0", "--fill", "7"])).expect("write");
        run_with_cli(cli(&home, &["reset"])).expect("reset");
        let image = fs::read(home.join("ddriver")).expect("read store");
        assert!(image.iter().all(|b| *b == 0));
        let _ = fs::remove_dir_all(home);
    }

    #[test]
    fn selftest_counts_one_of_each() {
        let home = temp_home("selftest");
        let report = run_with_cli(cli(&home, &["selftest"])).expect("selftest");
        assert!(report.contains("reads: 1, writes: 1, seeks: 2"));
        let _ = fs::remove_dir_all(home);
    }

    #[test]
    fn raw_control_codes() {
        let home = temp_home("control");
        let report = run_with_cli(cli(&home, &["control", "3"])).expect("block size");
        assert!(report.starts_with("0000: 00 02 00 00"));
        let report = run_with_cli(cli(&home, &["control", "99"])).expect("unknown");
        assert!(report.starts_with("0000: 00 00 00 00"));
        let _ = fs::remove_dir_all(home);
    }

    #[test]
    fn reports_bad_geometry_and_blocks() {
        let home = temp_home("errors");
        let home_str = home.to_str().expect("home str");
        let err = run_from(["ddriver-tool", "--home", home_str, "--tracks", "0", "info"])
            .expect_err("zero tracks");
        assert!(err.contains("track count must be non-zero"));

        let err = run_with_cli(cli(&home, &["read", "100"])).expect_err("past end");
        assert!(err.starts_with("read block 100"));
        let _ = fs::remove_dir_all(home);
    }
}

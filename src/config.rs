use std::env;
use std::path::{Path, PathBuf};

use ddriver_core::DeviceConfig;

pub const DEVICE_NAME: &str = "ddriver";
pub const DEVICE_LOG: &str = "ddriver_log";

/// The only locations a session may use, fixed once at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DevicePaths {
    pub device: PathBuf,
    pub log: PathBuf,
}

impl DevicePaths {
    pub fn for_home(home: impl AsRef<Path>) -> Self {
        let home = home.as_ref();
        Self {
            device: home.join(DEVICE_NAME),
            log: home.join(DEVICE_LOG),
        }
    }

    /// Derives the paths from the invoking user's `HOME`.
    pub fn from_env() -> Option<Self> {
        env::var_os("HOME").map(Self::for_home)
    }
}

/// How short transfers from the backing store are reported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IoPolicy {
    /// Fail the call with `ShortTransfer`.
    #[default]
    Strict,
    /// Report a full block anyway and move past it.
    Lenient,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiskOptions {
    pub geometry: DeviceConfig,
    pub paths: DevicePaths,
    pub policy: IoPolicy,
    /// Mirror diagnostics to stdout as well as the log file.
    pub echo: bool,
}

impl DiskOptions {
    pub fn new(paths: DevicePaths) -> Self {
        Self {
            geometry: DeviceConfig::default(),
            paths,
            policy: IoPolicy::default(),
            echo: true,
        }
    }

    pub fn with_geometry(mut self, geometry: DeviceConfig) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_policy(mut self, policy: IoPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{DevicePaths, DiskOptions, IoPolicy};
    use std::path::Path;

    #[test]
    fn derives_paths_from_home() {
        let paths = DevicePaths::for_home("/home/alice");
        assert_eq!(paths.device, Path::new("/home/alice/ddriver"));
        assert_eq!(paths.log, Path::new("/home/alice/ddriver_log"));
    }

    #[test]
    fn options_default_to_4mib_disk() {
        let opts = DiskOptions::new(DevicePaths::for_home("/h"));
        assert_eq!(opts.geometry.capacity_bytes, 4 * 1024 * 1024);
        assert_eq!(opts.policy, IoPolicy::Strict);
        assert!(opts.echo);
        assert!(!opts.quiet().echo);
    }
}

mod logfile;

use std::fmt;
use std::io;
use std::path::Path;

use crate::config::DEVICE_NAME;
use logfile::LogFile;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Alert,
    Panic,
}

impl Level {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Info => "INFO: ",
            Self::Alert => "WARNING: ",
            Self::Panic => "PANIC: ",
        }
    }
}

/// Per-session diagnostic log, optionally echoed to stdout.
pub struct DiagnosticLog {
    file: LogFile,
    echo: bool,
}

impl DiagnosticLog {
    pub fn create(path: &Path, echo: bool) -> io::Result<Self> {
        Ok(Self {
            file: LogFile::create(path)?,
            echo,
        })
    }

    pub fn info(&mut self, args: fmt::Arguments<'_>) {
        self.write_line(Level::Info, args);
    }

    pub fn alert(&mut self, args: fmt::Arguments<'_>) {
        self.write_line(Level::Alert, args);
    }

    pub fn panic(&mut self, args: fmt::Arguments<'_>) {
        self.write_line(Level::Panic, args);
    }

    pub fn write_line(&mut self, level: Level, args: fmt::Arguments<'_>) {
        let msg = args.to_string();
        if self.echo {
            println!("{}{DEVICE_NAME} {msg}", level.tag());
        }
        self.file.write_line(level.tag(), &msg);
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Reports a failure that happened before the session log could be opened.
pub fn early_panic(args: fmt::Arguments<'_>) {
    eprintln!("{}{DEVICE_NAME} {args}", Level::Panic.tag());
}

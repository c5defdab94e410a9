use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Diagnostic sink truncated at the start of every session.
pub struct LogFile {
    out: BufWriter<File>,
}

impl LogFile {
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            out: BufWriter::new(file),
        })
    }

    pub fn write_line(&mut self, tag: &str, msg: &str) {
        // Diagnostics are best-effort; a full disk must not fail device I/O.
        let _ = writeln!(self.out, "{tag}{msg}");
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

//! Log viewing for the agent's combined stdout/stderr file.
use std::{
    collections::VecDeque,
    fs::{self, File},
    io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
    thread,
};

use tracing::debug;

use crate::{constants::LOG_FOLLOW_POLL_INTERVAL, error::AgentError};

/// Reads the agent log file.
pub struct LogViewer {
    log_file: PathBuf,
}

impl LogViewer {
    pub fn new(log_file: impl Into<PathBuf>) -> Self {
        Self {
            log_file: log_file.into(),
        }
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Writes the last `lines` lines of the log to `out`.
    pub fn tail<W: Write>(&self, lines: usize, out: &mut W) -> Result<(), AgentError> {
        let file = self.open()?;
        write_tail(BufReader::new(file), lines, out)?;
        out.flush()?;
        Ok(())
    }

    /// Writes the last `lines` lines, then streams appended content until `stop` is set.
    ///
    /// If the file shrinks (truncated in place) streaming restarts from its beginning.
    /// If it is replaced at the same path (renamed away by rotation) the new file is
    /// opened and streamed from its beginning.
    pub fn follow<W: Write>(
        &self,
        lines: usize,
        out: &mut W,
        stop: &AtomicBool,
    ) -> Result<(), AgentError> {
        let mut file = self.open()?;
        let mut position = write_tail(BufReader::new(&mut file), lines, out)?;
        out.flush()?;

        let mut buffer = Vec::new();
        loop {
            let length = file.metadata()?.len();
            if length < position {
                debug!("log file shrank from {position} to {length} bytes; rewinding");
                position = 0;
            }

            if length > position {
                file.seek(SeekFrom::Start(position))?;
                buffer.clear();
                let read = (&mut file).take(length - position).read_to_end(&mut buffer)?;
                position += read as u64;
                out.write_all(&buffer)?;
                out.flush()?;
            }

            if is_replaced(&self.log_file, &file) {
                debug!("log file {} was replaced; reopening", self.log_file.display());
                file = File::open(&self.log_file)?;
                position = 0;
                continue;
            }

            if stop.load(Ordering::SeqCst) {
                debug!("log follow interrupted");
                return Ok(());
            }
            thread::sleep(LOG_FOLLOW_POLL_INTERVAL);
        }
    }

    fn open(&self) -> Result<File, AgentError> {
        if !self.log_file.exists() {
            return Err(AgentError::NoLogs(self.log_file.clone()));
        }
        Ok(File::open(&self.log_file)?)
    }
}

/// Whether `path` now names a different file than the open handle.
#[cfg(unix)]
fn is_replaced(path: &Path, file: &File) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (fs::metadata(path), file.metadata()) {
        (Ok(current), Ok(open)) => current.dev() != open.dev() || current.ino() != open.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn is_replaced(_path: &Path, _file: &File) -> bool {
    false
}

/// Writes the last `lines` lines read from `reader`, returning how many bytes were read.
fn write_tail<R: BufRead, W: Write>(
    mut reader: R,
    lines: usize,
    out: &mut W,
) -> io::Result<u64> {
    let mut kept: VecDeque<Vec<u8>> = VecDeque::with_capacity(lines.min(1024));
    let mut consumed = 0u64;

    loop {
        let mut line = Vec::new();
        let read = reader.read_until(b'\n', &mut line)?;
        if read == 0 {
            break;
        }
        consumed += read as u64;

        if lines == 0 {
            continue;
        }
        if kept.len() == lines {
            kept.pop_front();
        }
        kept.push_back(line);
    }

    for line in &kept {
        out.write_all(line)?;
    }
    if kept.back().is_some_and(|line| !line.ends_with(b"\n")) {
        out.write_all(b"\n")?;
    }

    Ok(consumed)
}

//! Deadline-aware reader
//!
//! Wraps any seekable reader so that raster I/O can never run past the
//! budget of the extraction run that owns it. Two limits are enforced:
//! the run deadline (checked before every read) and a per-operation
//! timeout (a single read that took longer than allowed is reported as
//! timed out once it returns).

use std::io::{self, Read, Seek, SeekFrom};
use std::time::{Duration, Instant};

/// Reader that fails with `ErrorKind::TimedOut` once its limits are exceeded
pub struct DeadlineReader<R> {
    inner: R,
    deadline: Option<Instant>,
    op_timeout: Option<Duration>,
}

impl<R> DeadlineReader<R> {
    /// Wrap `inner` with an optional absolute deadline and per-read timeout
    pub fn new(inner: R, deadline: Option<Instant>, op_timeout: Option<Duration>) -> Self {
        DeadlineReader { inner, deadline, op_timeout }
    }

    /// Wrap `inner` without any limits
    pub fn unbounded(inner: R) -> Self {
        Self::new(inner, None, None)
    }

    fn check_deadline(&self) -> io::Result<()> {
        match self.deadline {
            Some(deadline) if Instant::now() > deadline => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "raster read attempted after the run deadline",
            )),
            _ => Ok(()),
        }
    }
}

impl<R: Read> Read for DeadlineReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.check_deadline()?;

        let started = Instant::now();
        let read = self.inner.read(buf)?;

        if let Some(limit) = self.op_timeout {
            if started.elapsed() > limit {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("raster read took longer than {:?}", limit),
                ));
            }
        }

        Ok(read)
    }
}

impl<R: Seek> Seek for DeadlineReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.check_deadline()?;
        self.inner.seek(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reads_pass_through_without_limits() {
        let mut reader = DeadlineReader::unbounded(Cursor::new(vec![1u8, 2, 3]));
        let mut buf = [0u8; 3];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3]);
    }

    #[test]
    fn test_expired_deadline_times_out() {
        let past = Instant::now() - Duration::from_secs(1);
        let mut reader = DeadlineReader::new(Cursor::new(vec![0u8; 4]), Some(past), None);
        let mut buf = [0u8; 4];
        let err = reader.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }
}

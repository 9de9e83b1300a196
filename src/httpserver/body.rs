//! Request body accumulation.
//!
//! Small bodies stay in memory; a body whose declared length reaches
//! the spill threshold goes to an unlinked temporary file instead, so
//! a large upload cannot balloon the heap.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

#[derive(Debug)]
enum Sink {
    Memory(Vec<u8>),
    Spilled { file: File, written: usize },
}

/// Accumulator for an incoming request body.
#[derive(Debug)]
pub struct BodySink {
    inner: Sink,
}

impl BodySink {
    /// Pick a sink for a body of `expected` bytes. At or above
    /// `threshold` the body spills to a temporary file.
    pub fn with_expected(expected: usize, threshold: usize) -> std::io::Result<Self> {
        let inner = if expected >= threshold {
            Sink::Spilled {
                file: tempfile::tempfile()?,
                written: 0,
            }
        } else {
            Sink::Memory(Vec::with_capacity(expected))
        };
        Ok(Self { inner })
    }

    pub fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
        match &mut self.inner {
            Sink::Memory(buf) => buf.extend_from_slice(data),
            Sink::Spilled { file, written } => {
                file.write_all(data)?;
                *written += data.len();
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        match &self.inner {
            Sink::Memory(buf) => buf.len(),
            Sink::Spilled { written, .. } => *written,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_spilled(&self) -> bool {
        matches!(self.inner, Sink::Spilled { .. })
    }

    /// Consume the sink and return the accumulated bytes, reading a
    /// spilled body back from disk.
    pub fn into_bytes(self) -> std::io::Result<Vec<u8>> {
        match self.inner {
            Sink::Memory(buf) => Ok(buf),
            Sink::Spilled { mut file, written } => {
                file.seek(SeekFrom::Start(0))?;
                let mut buf = Vec::with_capacity(written);
                file.read_to_end(&mut buf)?;
                Ok(buf)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn small_body_stays_in_memory() {
        let mut sink = BodySink::with_expected(10, 100).unwrap();
        assert!(!sink.is_spilled());
        sink.write(b"hello ").unwrap();
        sink.write(b"world").unwrap();
        assert_eq!(sink.len(), 11);
        assert_eq!(sink.into_bytes().unwrap(), b"hello world");
    }

    #[test]
    fn large_body_spills() {
        let mut sink = BodySink::with_expected(100, 100).unwrap();
        assert!(sink.is_spilled());
        let chunk = vec![0xAB_u8; 40];
        for _ in 0..3 {
            sink.write(&chunk).unwrap();
        }
        assert_eq!(sink.len(), 120);
        let bytes = sink.into_bytes().unwrap();
        assert_eq!(bytes.len(), 120);
        assert!(bytes.iter().all(|&b| b == 0xAB));
    }
}

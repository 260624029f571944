//! The narrow I/O capabilities conversion needs: reading one line and writing some text.
//!
//! Both are implemented for every buffered reader and every writer, so files, standard streams
//! and in-memory buffers can be used interchangeably.

use std::io::{self, BufRead, Write};

/// A source of lines.
pub trait LineSource {
    /// Appends the next line to `buf`, including its `\n` if it has one, and returns the number of
    /// bytes read. Zero means the input is exhausted.
    fn read_line(&mut self, buf: &mut Vec<u8>) -> io::Result<usize>;
}

impl<R: BufRead + ?Sized> LineSource for R {
    fn read_line(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        self.read_until(b'\n', buf)
    }
}

/// A destination for text.
pub trait LineSink {
    /// Writes all of `text`, or fails.
    fn write_text(&mut self, text: &[u8]) -> io::Result<()>;
}

impl<W: Write + ?Sized> LineSink for W {
    fn write_text(&mut self, text: &[u8]) -> io::Result<()> {
        self.write_all(text)
    }
}

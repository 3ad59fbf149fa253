use std::io::{self, Read};

use super::codec::stream_frame_len;

/// Size of each read from a stream socket.
const READ_CHUNK: usize = 4096;

/// Outcome of draining a non-blocking reader into a [`FrameBuffer`].
#[derive(Debug, PartialEq, Eq)]
pub enum Fill {
    /// The reader has nothing more right now.
    WouldBlock,
    /// The peer closed its side of the stream.
    Eof,
}

/// Reassembles stream-variant frames out of arbitrarily split reads.
///
/// TCP delivers bytes, not packets, so a read may end in the middle of a
/// frame or hold several. Bytes accumulate here until a whole frame (header
/// plus the payload it declares) is available.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of buffered bytes not yet returned as a frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Pop the oldest complete frame, if there is one.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        let len = stream_frame_len(&self.buf)?;
        if self.buf.len() < len {
            return None;
        }
        let rest = self.buf.split_off(len);
        Some(std::mem::replace(&mut self.buf, rest))
    }

    /// Read everything currently available from a non-blocking reader.
    ///
    /// Returns once the reader would block or reaches end of input. Any
    /// other error is returned as is; bytes read before it stay buffered.
    pub fn fill_from<R: Read>(&mut self, reader: &mut R) -> io::Result<Fill> {
        let mut chunk = [0; READ_CHUNK];
        loop {
            match reader.read(&mut chunk) {
                Ok(0) => return Ok(Fill::Eof),
                Ok(n) => self.extend(&chunk[..n]),
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(Fill::WouldBlock);
                }
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => return Err(error),
            }
        }
    }
}

//! Length-Prefixed Frames
//!
//! Message boundaries over the byte-stream pipes shared with a worker.
//!
//! ```text
//! +----------------+------------------+
//! | length (4 LE)  | rkyv payload     |
//! +----------------+------------------+
//! ```

use rkyv::ser::serializers::AllocSerializer;
use rkyv::validation::validators::DefaultValidator;
use rkyv::{AlignedVec, Archive, CheckBytes, Deserialize, Infallible, Serialize};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Read, Write};
use thiserror::Error;

/// Largest accepted payload (16 MiB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

const PIPE_BUFFER: usize = 64 * 1024;

/// Errors raised while encoding or decoding frames
#[derive(Debug, Error)]
pub enum FrameError {
    /// The underlying stream failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// rkyv could not archive the message
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The payload is not a valid archive of the expected type
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// The payload exceeds [`MAX_FRAME_SIZE`]
    #[error("Frame too large: {size} bytes (max {max} bytes)")]
    FrameTooLarge {
        /// Payload length
        size: usize,
        /// Limit in effect
        max: usize,
    },

    /// The length prefix is malformed
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// The peer closed the stream between frames
    #[error("End of stream")]
    EndOfStream,
}

fn check_len(len: usize) -> Result<(), FrameError> {
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }
    if len == 0 {
        return Err(FrameError::InvalidFrame("zero-length frame".to_string()));
    }
    Ok(())
}

/// Serialize `message` and write it as one flushed frame
pub fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), FrameError>
where
    W: Write,
    T: Serialize<AllocSerializer<256>>,
{
    let payload =
        rkyv::to_bytes::<_, 256>(message).map_err(|e| FrameError::Serialization(e.to_string()))?;
    check_len(payload.len())?;

    writer.write_all(&(payload.len() as u32).to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame and validate it as an archived `T`.
///
/// A stream that ends before the length prefix yields
/// [`FrameError::EndOfStream`]; one that ends inside a frame is an I/O error.
pub fn read_frame<R, T>(reader: &mut R) -> Result<T, FrameError>
where
    R: Read,
    T: Archive,
    T::Archived: for<'a> CheckBytes<DefaultValidator<'a>> + Deserialize<T, Infallible>,
{
    let mut prefix = [0u8; 4];
    match reader.read_exact(&mut prefix) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Err(FrameError::EndOfStream),
        Err(e) => return Err(FrameError::Io(e)),
    }

    let len = u32::from_le_bytes(prefix) as usize;
    check_len(len)?;

    let mut payload = AlignedVec::with_capacity(len);
    payload.resize(len, 0);
    reader.read_exact(&mut payload)?;

    let archived = rkyv::check_archived_root::<T>(&payload)
        .map_err(|e| FrameError::Deserialization(e.to_string()))?;
    archived
        .deserialize(&mut Infallible)
        .map_err(|_| FrameError::Deserialization("archived value rejected".to_string()))
}

/// Buffered frame sender
pub struct FrameWriter<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> FrameWriter<W> {
    /// Wrap a raw writer
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(PIPE_BUFFER, writer),
        }
    }

    /// Send one message
    pub fn write<T>(&mut self, message: &T) -> Result<(), FrameError>
    where
        T: Serialize<AllocSerializer<256>>,
    {
        write_frame(&mut self.writer, message)
    }
}

/// Buffered frame receiver
pub struct FrameReader<R: Read> {
    reader: BufReader<R>,
}

impl<R: Read> FrameReader<R> {
    /// Wrap a raw reader
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::with_capacity(PIPE_BUFFER, reader),
        }
    }

    /// Receive one message
    pub fn read<T>(&mut self) -> Result<T, FrameError>
    where
        T: Archive,
        T::Archived: for<'a> CheckBytes<DefaultValidator<'a>> + Deserialize<T, Infallible>,
    {
        read_frame(&mut self.reader)
    }

    /// Whether bytes are already buffered, so a poll on the fd would miss them
    pub fn has_buffered_data(&self) -> bool {
        !self.reader.buffer().is_empty()
    }

    /// Whether the peer closed the stream with nothing left to read
    pub fn at_end(&mut self) -> Result<bool, FrameError> {
        Ok(self.reader.fill_buf()?.is_empty())
    }
}

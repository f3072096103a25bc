//! Stream adapters between async byte channels and [`Message`]s.
//!
//! [`MessageReader`] frames and decodes one message at a time, strictly in
//! arrival order. [`MessageWriter`] encodes and flushes one message per
//! call. Neither buffers more than a single frame.

use futures_util::Stream;
use futures_util::stream;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::header::{HEADER_SIZE, Header};
use crate::{Message, StreamError};

/// Decodes messages from an [`AsyncRead`].
pub struct MessageReader<R> {
    reader: R,
    payload: Vec<u8>,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            payload: Vec::new(),
        }
    }

    /// Reads the next complete frame.
    ///
    /// Returns `Ok(None)` when the channel ends cleanly between frames. An
    /// end of stream in the middle of a frame is an I/O error
    /// (`UnexpectedEof`).
    ///
    /// # Errors
    /// [`StreamError::Io`] if the channel fails, [`StreamError::Protocol`]
    /// if the header or payload is invalid.
    pub async fn read(&mut self) -> Result<Option<Message>, StreamError> {
        let mut bytes = [0u8; HEADER_SIZE];

        // EOF on the first byte is the only clean way for a peer to leave.
        match self.reader.read_u8().await {
            Ok(first) => bytes[0] = first,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }
        self.reader.read_exact(&mut bytes[1..]).await?;

        let header = Header::decode(&bytes)?;
        self.payload.clear();
        self.payload.resize(header.payload_len(), 0);
        self.reader.read_exact(&mut self.payload).await?;

        let message = Message::decode(header.raw_type(), &self.payload)?;
        tracing::trace!(kind = %message.kind(), size = header.size(), "frame read");
        Ok(Some(message))
    }

    /// Turns the reader into a lazy stream that ends on clean EOF or after
    /// yielding the first error.
    pub fn into_stream(
        self,
    ) -> impl Stream<Item = Result<Message, StreamError>> {
        stream::unfold(Some(self), |reader| async move {
            let mut reader = reader?;
            match reader.read().await {
                Ok(Some(message)) => Some((Ok(message), Some(reader))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Encodes messages onto an [`AsyncWrite`].
pub struct MessageWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Encodes `message`, writes the whole frame and flushes.
    ///
    /// Encoding happens before anything is written, so a
    /// [`StreamError::Protocol`] leaves the channel untouched.
    pub async fn write(&mut self, message: &Message) -> Result<(), StreamError> {
        let frame = message.encode()?;
        self.writer.write_all(&frame).await?;
        self.writer.flush().await?;
        tracing::trace!(kind = %message.kind(), size = frame.len(), "frame written");
        Ok(())
    }

    /// Shuts down the write half of the channel.
    pub async fn shutdown(&mut self) -> Result<(), StreamError> {
        self.writer.shutdown().await?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

//! Line framed transport over a TCP stream.

use crate::error::Error;
use crate::protocol::{Message, ProtocolError};
use std::io::{self, BufRead, BufReader, ErrorKind, Write};
use std::net::{Shutdown, TcpStream};
use std::time::{Duration, Instant};

/// Write attempts before a send is considered failed.
const MAX_TRIES: usize = 3;

/// Read half of a connection.
pub struct LineReader {
    reader: BufReader<TcpStream>,
    line: Vec<u8>,
}

impl LineReader {
    /// Read the next message.
    ///
    /// Returns `Ok(None)` when the peer closed the connection and
    /// `Err(Error::Protocol)` when a line can't be decoded, in this case
    /// the line is consumed and the reader stays usable.
    pub fn read_message(&mut self) -> Result<Option<Message>, Error> {
        loop {
            self.line.clear();
            if self.reader.read_until(b'\n', &mut self.line)? == 0 {
                return Ok(None);
            }
            if let Some(message) = self.decode_line()? {
                return Ok(Some(message));
            }
        }
    }

    /// Read the next message, giving up at `deadline` or when a line grows
    /// over `max_len` bytes. Unlike the socket read timeout the deadline
    /// bounds the whole line, not a single read.
    pub fn read_message_before(
        &mut self,
        deadline: Instant,
        max_len: usize,
    ) -> Result<Option<Message>, Error> {
        self.line.clear();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(io::Error::from(ErrorKind::TimedOut).into());
            }
            self.set_read_timeout(Some(remaining))?;

            let available = self.reader.fill_buf()?;
            if available.is_empty() {
                return Ok(None);
            }
            let (used, complete) = match available.iter().position(|b| *b == b'\n') {
                Some(pos) => (pos + 1, true),
                None => (available.len(), false),
            };
            self.line.extend_from_slice(&available[..used]);
            self.reader.consume(used);

            if self.line.len() > max_len {
                return Err(ProtocolError::LineTooLong(max_len).into());
            }
            if complete {
                if let Some(message) = self.decode_line()? {
                    return Ok(Some(message));
                }
                self.line.clear();
            }
        }
    }

    /// Decode buffered line, `None` for a blank one.
    fn decode_line(&self) -> Result<Option<Message>, Error> {
        let line = std::str::from_utf8(&self.line).map_err(ProtocolError::from)?;
        if line.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(Message::decode(line)?))
    }

    /// Set read timeout on the underlying socket, `None` for blocking reads.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.reader.get_ref().set_read_timeout(timeout)
    }
}

/// Write half of a connection.
pub struct LineWriter {
    stream: TcpStream,
}

impl LineWriter {
    pub fn write_message(&mut self, message: &Message) -> Result<(), Error> {
        let line = message.encode()?;

        let mut tries = 0;
        loop {
            tries += 1;
            match self.stream.write_all(&line).and_then(|_| self.stream.flush()) {
                Ok(()) => return Ok(()),
                Err(e)
                    if tries < MAX_TRIES
                        && matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) =>
                {
                    continue
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Close both directions of the connection, wakes up a blocked reader.
    pub fn shutdown(&self) {
        _ = self.stream.shutdown(Shutdown::Both);
    }
}

/// Bidirectional line transport.
pub struct LineTransport {
    reader: LineReader,
    writer: LineWriter,
}

impl LineTransport {
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        stream.set_nodelay(true)?;
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self {
            reader: LineReader {
                reader,
                line: Vec::new(),
            },
            writer: LineWriter { stream },
        })
    }

    pub fn connect(host: &str, port: u16) -> io::Result<Self> {
        Self::new(TcpStream::connect((host, port))?)
    }

    pub fn read_message(&mut self) -> Result<Option<Message>, Error> {
        self.reader.read_message()
    }

    pub fn write_message(&mut self, message: &Message) -> Result<(), Error> {
        self.writer.write_message(message)
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.reader.set_read_timeout(timeout)
    }

    pub fn read_message_before(
        &mut self,
        deadline: Instant,
        max_len: usize,
    ) -> Result<Option<Message>, Error> {
        self.reader.read_message_before(deadline, max_len)
    }

    pub fn shutdown(&self) {
        self.writer.shutdown()
    }

    pub fn split(self) -> (LineReader, LineWriter) {
        (self.reader, self.writer)
    }
}

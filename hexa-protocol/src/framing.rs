//! Newline-terminated JSON frame reader/writer.
//!
//! Frames are length-unbounded: each is one JSON object followed by `\n`.
//! Frames above [`LARGE_FRAME_THRESHOLD`] are reserved for frontend-state
//! synchronization (`sync_state`, `detach_session`) but are otherwise
//! handled identically.

use std::io::{self, Read, Write};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{ProtocolError, ProtocolResult};

/// Frames at or above this size are expected only for state-sync payloads.
pub const LARGE_FRAME_THRESHOLD: usize = 64 * 1024;

/// Accumulates bytes from a stream and yields complete newline-delimited
/// JSON frames as they become available.
#[derive(Debug, Default)]
pub struct FrameReader {
    buf: Vec<u8>,
}

impl FrameReader {
    /// Create an empty reader.
    pub fn new() -> Self {
        Self { buf: Vec::with_capacity(4096) }
    }

    /// Try to decode one frame already buffered, without touching `reader`.
    pub fn try_decode<T: DeserializeOwned>(&mut self) -> ProtocolResult<Option<T>> {
        let Some(pos) = self.buf.iter().position(|&b| b == b'\n') else {
            return Ok(None);
        };
        let line = self.buf.drain(..=pos).collect::<Vec<u8>>();
        let line = &line[..line.len() - 1];
        let msg = serde_json::from_slice(line)?;
        Ok(Some(msg))
    }

    /// Read from `reader` and try to decode one complete frame.
    ///
    /// Returns `Ok(Some(msg))` on a complete frame, `Ok(None)` if more data
    /// is needed, or `Err` on I/O error or a frame that fails to parse.
    /// [`ProtocolError::ConnectionClosed`] is returned on EOF with no
    /// partial frame left unconsumed — EOF is the authoritative disconnect
    /// signal per the transport contract.
    pub fn read_frame<T, R>(&mut self, reader: &mut R) -> ProtocolResult<Option<T>>
    where
        T: DeserializeOwned,
        R: Read,
    {
        if let Some(msg) = self.try_decode()? {
            return Ok(Some(msg));
        }

        let mut tmp = [0u8; 4096];
        match reader.read(&mut tmp) {
            Ok(0) => Err(ProtocolError::ConnectionClosed),
            Ok(n) => {
                self.buf.extend_from_slice(&tmp[..n]);
                self.try_decode()
            },
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(ProtocolError::Io(e)),
        }
    }
}

/// Write one frame: JSON-serialize `msg` and terminate it with `\n`.
pub fn write_frame<T, W>(writer: &mut W, msg: &T) -> ProtocolResult<()>
where
    T: Serialize,
    W: Write,
{
    let mut line = serde_json::to_vec(msg)?;
    line.push(b'\n');
    writer.write_all(&line)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Ping {
        n: u32,
    }

    #[test]
    fn write_then_read_one_frame() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &Ping { n: 7 }).unwrap();
        assert!(buf.ends_with(b"\n"));

        let mut reader = FrameReader::new();
        let mut cursor = io::Cursor::new(buf);
        let decoded: Option<Ping> = reader.read_frame(&mut cursor).unwrap();
        assert_eq!(decoded, Some(Ping { n: 7 }));
    }

    #[test]
    fn partial_line_returns_none_then_completes() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &Ping { n: 1 }).unwrap();
        let half = buf.len() / 2;

        let mut reader = FrameReader::new();
        let mut cursor = io::Cursor::new(&buf[..half]);
        let decoded: Option<Ping> = reader.read_frame(&mut cursor).unwrap();
        assert_eq!(decoded, None);

        let mut cursor = io::Cursor::new(&buf[half..]);
        let decoded: Option<Ping> = reader.read_frame(&mut cursor).unwrap();
        assert_eq!(decoded, Some(Ping { n: 1 }));
    }

    #[test]
    fn multiple_frames_in_one_read() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &Ping { n: 1 }).unwrap();
        write_frame(&mut buf, &Ping { n: 2 }).unwrap();

        let mut reader = FrameReader::new();
        let mut cursor = io::Cursor::new(buf);
        let first: Option<Ping> = reader.read_frame(&mut cursor).unwrap();
        assert_eq!(first, Some(Ping { n: 1 }));
        // Second frame was already buffered; no further reads needed.
        let second: Option<Ping> = reader.read_frame(&mut cursor).unwrap();
        assert_eq!(second, Some(Ping { n: 2 }));
    }

    #[test]
    fn eof_with_no_partial_frame_is_connection_closed() {
        let mut reader = FrameReader::new();
        let mut cursor = io::Cursor::new(Vec::<u8>::new());
        let err = reader.read_frame::<Ping, _>(&mut cursor).unwrap_err();
        assert!(matches!(err, ProtocolError::ConnectionClosed));
    }

    #[test]
    fn invalid_json_is_an_error() {
        let mut reader = FrameReader::new();
        let mut cursor = io::Cursor::new(b"not json\n".to_vec());
        let err = reader.read_frame::<Ping, _>(&mut cursor).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidJson(_)));
    }
}

// Length-delimited JSON frames over TCP.
//
// Wire format: a 4-byte big-endian length prefix followed by a JSON payload
// of that many bytes. `write_frame` serializes any `Serialize` value and
// writes it; `read_frame` reads one frame and decodes it into the requested
// type. Both sides of the connection (relay and `NetClient`) use these two
// functions and nothing else to touch the stream.
//
// `MAX_FRAME_SIZE` bounds the allocation a length prefix can request. The
// largest legitimate frame is a `host-state` with a full attempt history and
// player list, which is a few kilobytes.

use std::io::{self, Read, Write};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Maximum allowed frame payload (64 KiB).
pub const MAX_FRAME_SIZE: u32 = 64 * 1024;

/// Failure to read or write a frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("frame too large: {len} bytes (max {MAX_FRAME_SIZE})")]
    TooLarge { len: usize },
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl FrameError {
    /// True when the peer closed the stream (cleanly or mid-frame).
    pub fn is_eof(&self) -> bool {
        matches!(self, FrameError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}

/// Serialize `msg` to JSON and write it as one frame, then flush.
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, msg: &T) -> Result<(), FrameError> {
    let payload = serde_json::to_vec(msg)?;
    if payload.len() > MAX_FRAME_SIZE as usize {
        return Err(FrameError::TooLarge { len: payload.len() });
    }
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::TooLarge {
        len: payload.len(),
    })?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame and decode its JSON payload as `T`.
pub fn read_frame<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<T, FrameError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge { len: len as usize });
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf)?;
    Ok(serde_json::from_slice(&buf)?)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::message::{ClientMessage, ServerMessage};

    #[test]
    fn frames_read_back_in_order() {
        let sent = vec![
            ClientMessage::Hello {
                player_id: "abc".into(),
            },
            ClientMessage::SetCode,
            ClientMessage::Ended { success: true },
        ];
        let mut buf = Vec::new();
        for msg in &sent {
            write_frame(&mut buf, msg).unwrap();
        }

        let mut cursor = Cursor::new(&buf);
        for expected in &sent {
            let got: ClientMessage = read_frame(&mut cursor).unwrap();
            assert_eq!(&got, expected);
        }
        let err = read_frame::<_, ClientMessage>(&mut cursor).unwrap_err();
        assert!(err.is_eof());
    }

    #[test]
    fn length_prefix_is_big_endian() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &ServerMessage::RequestState).unwrap();
        let body = br#""request-state""#;
        assert_eq!(&buf[..4], &(body.len() as u32).to_be_bytes());
        assert_eq!(&buf[4..], body);
    }

    #[test]
    fn rejects_oversized_length_prefix() {
        let fake_len = (MAX_FRAME_SIZE + 1).to_be_bytes();
        let mut cursor = Cursor::new(fake_len.to_vec());
        let err = read_frame::<_, ServerMessage>(&mut cursor).unwrap_err();
        assert!(matches!(err, FrameError::TooLarge { .. }));
    }

    #[test]
    fn rejects_oversized_write() {
        let huge = "x".repeat(MAX_FRAME_SIZE as usize);
        let mut buf = Vec::new();
        let err = write_frame(
            &mut buf,
            &ServerMessage::Error { message: huge },
        )
        .unwrap_err();
        assert!(matches!(err, FrameError::TooLarge { .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn truncated_prefix_is_eof() {
        let mut cursor = Cursor::new(vec![0u8, 1]);
        let err = read_frame::<_, ServerMessage>(&mut cursor).unwrap_err();
        assert!(err.is_eof());
    }

    #[test]
    fn garbage_payload_is_json_error() {
        let mut buf = 3u32.to_be_bytes().to_vec();
        buf.extend_from_slice(b"{{{");
        let err = read_frame::<_, ServerMessage>(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, FrameError::Json(_)));
    }
}

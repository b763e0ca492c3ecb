//! On-disk framing
//!
//! Every log file starts with an 8-byte header followed by frames:
//!
//! ```text
//! header: [4 bytes: magic][2 bytes: version, BE][2 bytes: reserved]
//! frame:  [4 bytes: len, BE][len bytes: postcard payload][8 bytes: blake3(payload)[..8]]
//! ```
//!
//! A reader can always tell a complete frame from an incomplete or damaged
//! one: the length must be in range, every declared byte must be present and
//! the checksum must match before the payload is even decoded.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::StorageError;

/// Current on-disk format version
pub const FORMAT_VERSION: u16 = 1;

/// Size of the file header in bytes
pub const HEADER_LEN: u64 = 8;

/// Largest payload a single frame may carry
pub const MAX_FRAME_LEN: usize = 64 * 1024;

const LEN_PREFIX: usize = 4;
const CHECKSUM_LEN: usize = 8;

/// Per-frame overhead on top of the payload
pub const FRAME_OVERHEAD: usize = LEN_PREFIX + CHECKSUM_LEN;

/// Magic bytes identifying the kind of log
pub type Magic = [u8; 4];

/// Build the header for a new log file
pub fn encode_header(magic: Magic) -> [u8; HEADER_LEN as usize] {
    let mut header = [0u8; HEADER_LEN as usize];
    header[..4].copy_from_slice(&magic);
    header[4..6].copy_from_slice(&FORMAT_VERSION.to_be_bytes());
    header
}

/// Outcome of checking an existing file header
#[derive(Debug, PartialEq, Eq)]
pub enum HeaderCheck {
    /// Fewer than [`HEADER_LEN`] bytes available
    Incomplete,
    /// Header matches the expected magic and version
    Valid,
}

/// Read and verify a header
pub async fn read_header<R>(
    reader: &mut R,
    magic: Magic,
    path: &std::path::Path,
) -> Result<HeaderCheck, StorageError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN as usize];
    let read = read_up_to(reader, &mut header).await?;
    if read < header.len() {
        return Ok(HeaderCheck::Incomplete);
    }

    if header[..4] != magic {
        return Err(StorageError::corrupt(
            path,
            format!(
                "expected magic {:?}, found {:?}",
                String::from_utf8_lossy(&magic),
                String::from_utf8_lossy(&header[..4])
            ),
        ));
    }

    let version = u16::from_be_bytes([header[4], header[5]]);
    if version != FORMAT_VERSION {
        return Err(StorageError::UnsupportedVersion {
            found: version,
            expected: FORMAT_VERSION,
        });
    }

    Ok(HeaderCheck::Valid)
}

/// Serialize a record into a complete frame
pub fn encode_frame<T: Serialize>(record: &T) -> Result<Vec<u8>, StorageError> {
    let payload = postcard::to_allocvec(record)?;
    if payload.is_empty() || payload.len() > MAX_FRAME_LEN {
        return Err(StorageError::RecordTooLarge {
            len: payload.len(),
            max: MAX_FRAME_LEN,
        });
    }

    let mut frame = Vec::with_capacity(FRAME_OVERHEAD + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    frame.extend_from_slice(&checksum(&payload));
    Ok(frame)
}

/// Result of reading one frame
#[derive(Debug)]
pub enum FrameRead<T> {
    /// A complete, verified record and the number of bytes it occupied
    Record { record: T, frame_len: u64 },
    /// Clean end of file on a frame boundary
    End,
    /// The input ends partway through the frame
    Torn { reason: String },
    /// The frame is present but fails verification
    ///
    /// `declared_len` is the size the length prefix claims for the whole
    /// frame, so callers can tell whether the damage runs to the end of the
    /// file.
    Damaged { reason: String, declared_len: u64 },
}

/// Read the next frame from a reader positioned on a frame boundary
///
/// Only genuine I/O failures are returned as errors. A short read is
/// [`FrameRead::Torn`]; a bad length, checksum or payload is
/// [`FrameRead::Damaged`].
pub async fn read_frame<R, T>(reader: &mut R) -> Result<FrameRead<T>, StorageError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; LEN_PREFIX];
    match read_up_to(reader, &mut len_buf).await? {
        0 => return Ok(FrameRead::End),
        n if n < LEN_PREFIX => {
            return Ok(FrameRead::Torn {
                reason: format!("length prefix cut short after {} bytes", n),
            });
        }
        _ => {}
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    let declared_len = (FRAME_OVERHEAD + len) as u64;
    if len == 0 || len > MAX_FRAME_LEN {
        return Ok(FrameRead::Damaged {
            reason: format!("invalid frame length {}", len),
            declared_len,
        });
    }

    let mut body = vec![0u8; len + CHECKSUM_LEN];
    let read = read_up_to(reader, &mut body).await?;
    if read < body.len() {
        return Ok(FrameRead::Torn {
            reason: format!("frame declares {} bytes, only {} present", body.len(), read),
        });
    }

    let (payload, stored) = body.split_at(len);
    if checksum(payload) != stored {
        return Ok(FrameRead::Damaged {
            reason: "checksum mismatch".to_string(),
            declared_len,
        });
    }

    match postcard::from_bytes::<T>(payload) {
        Ok(record) => Ok(FrameRead::Record {
            record,
            frame_len: declared_len,
        }),
        Err(e) => Ok(FrameRead::Damaged {
            reason: format!("undecodable payload: {}", e),
            declared_len,
        }),
    }
}

fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let hash = blake3::hash(payload);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&hash.as_bytes()[..CHECKSUM_LEN]);
    out
}

/// Fill `buf` as far as the reader allows, returning how many bytes arrived
async fn read_up_to<R>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_core::{Message, SenderId, Timestamp};
    use std::path::Path;

    fn sample() -> Message {
        Message::new(SenderId(1), Timestamp::from_micros(42), "hello")
    }

    #[tokio::test]
    async fn test_frame_roundtrip() {
        let frame = encode_frame(&sample()).unwrap();
        let mut reader = frame.as_slice();

        match read_frame::<_, Message>(&mut reader).await.unwrap() {
            FrameRead::Record { record, frame_len } => {
                assert_eq!(record, sample());
                assert_eq!(frame_len, frame.len() as u64);
            }
            other => panic!("expected record, got {:?}", other),
        }
        assert!(matches!(
            read_frame::<_, Message>(&mut reader).await.unwrap(),
            FrameRead::End
        ));
    }

    #[tokio::test]
    async fn test_every_truncation_is_torn() {
        let frame = encode_frame(&sample()).unwrap();
        for cut in 1..frame.len() {
            let mut reader = &frame[..cut];
            let result = read_frame::<_, Message>(&mut reader).await.unwrap();
            assert!(
                matches!(result, FrameRead::Torn { .. }),
                "cut at {} was not detected",
                cut
            );
        }
    }

    #[tokio::test]
    async fn test_flipped_payload_bit_is_damaged() {
        let mut frame = encode_frame(&sample()).unwrap();
        frame[6] ^= 0x01;
        let mut reader = frame.as_slice();
        match read_frame::<_, Message>(&mut reader).await.unwrap() {
            FrameRead::Damaged {
                reason,
                declared_len,
            } => {
                assert!(reason.contains("checksum"));
                assert_eq!(declared_len, frame.len() as u64);
            }
            other => panic!("expected damaged frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_length_is_damaged() {
        let bytes = [0u8; 16];
        let mut reader = &bytes[..];
        assert!(matches!(
            read_frame::<_, Message>(&mut reader).await.unwrap(),
            FrameRead::Damaged {
                declared_len: 12,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_header_checks() {
        let path = Path::new("test.log");
        let header = encode_header(*b"TEST");

        let mut reader = &header[..];
        assert_eq!(
            read_header(&mut reader, *b"TEST", path).await.unwrap(),
            HeaderCheck::Valid
        );

        let mut reader = &header[..5];
        assert_eq!(
            read_header(&mut reader, *b"TEST", path).await.unwrap(),
            HeaderCheck::Incomplete
        );

        let mut reader = &header[..];
        assert!(matches!(
            read_header(&mut reader, *b"ELSE", path).await,
            Err(StorageError::Corrupt { .. })
        ));

        let mut future = header;
        future[4..6].copy_from_slice(&7u16.to_be_bytes());
        let mut reader = &future[..];
        assert!(matches!(
            read_header(&mut reader, *b"TEST", path).await,
            Err(StorageError::UnsupportedVersion { found: 7, .. })
        ));
    }
}

//! Framing for snapshots on a byte stream.
//!
//! Each direction of an exchange carries exactly one frame:
//!
//! ```text
//! +----------------+---------------------------------+
//! | len: u32 (BE)  | canonical CBOR snapshot (len B) |
//! +----------------+---------------------------------+
//! ```

use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use rumor_core::{decode_state, encode_state, ReplicatedState};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, SyncError};

/// Frame size limits.
pub mod limits {
    /// Bytes in the length prefix.
    pub const LENGTH_PREFIX_BYTES: usize = 4;
    /// Default cap on a frame body (16 MiB).
    pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;
}

/// Encode a snapshot as a length-prefixed frame.
pub fn encode_frame(state: &ReplicatedState) -> Result<Bytes> {
    let body = encode_state(state);
    let len = u32::try_from(body.len()).map_err(|_| SyncError::FrameTooLarge {
        len: body.len(),
        max: u32::MAX as usize,
    })?;

    let mut buf = BytesMut::with_capacity(limits::LENGTH_PREFIX_BYTES + body.len());
    buf.put_u32(len);
    buf.put_slice(&body);
    Ok(buf.freeze())
}

/// Write one snapshot frame and flush. Returns the number of bytes written.
pub async fn write_snapshot<W>(
    writer: &mut W,
    state: &ReplicatedState,
    io_timeout: Duration,
) -> Result<usize>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let frame = encode_frame(state)?;
    let write = async {
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok::<_, std::io::Error>(())
    };

    tokio::time::timeout(io_timeout, write)
        .await
        .map_err(|_| SyncError::Timeout("writing snapshot".into()))??;

    Ok(frame.len())
}

/// Read one snapshot frame.
///
/// Rejects empty frames and frames longer than `max_frame_bytes` before
/// allocating the body.
pub async fn read_snapshot<R>(
    reader: &mut R,
    max_frame_bytes: usize,
    io_timeout: Duration,
) -> Result<ReplicatedState>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let read = async {
        let len = reader.read_u32().await? as usize;
        if len == 0 {
            return Err(SyncError::EmptyFrame);
        }
        if len > max_frame_bytes {
            return Err(SyncError::FrameTooLarge {
                len,
                max: max_frame_bytes,
            });
        }

        let mut body = vec![0u8; len];
        reader.read_exact(&mut body).await?;
        Ok::<_, SyncError>(body)
    };

    let body = tokio::time::timeout(io_timeout, read)
        .await
        .map_err(|_| SyncError::Timeout("reading snapshot".into()))??;

    Ok(decode_state(&body)?)
}

//! Per-connection frame reader

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

use super::frame::FrameSplitter;
use crate::buffer::SharedBuffer;

/// Minimum free space kept in the read buffer before each read
const READ_CHUNK: usize = 8 * 1024;

/// What one connection contributed before it ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadSummary {
    /// Frames appended to the shared buffer
    pub frames: u64,
    /// Bytes appended to the shared buffer, delimiters included
    pub bytes: u64,
}

impl ReadSummary {
    fn record(&mut self, len: usize) {
        self.frames += 1;
        self.bytes += len as u64;
    }
}

/// Read `stream` until it ends, appending each frame to `buffer`
///
/// Frames keep their delimiter and land in the buffer in stream order. A
/// cancelled reader behaves as if the peer closed the stream: the pending
/// remainder is appended as a last frame. On error, frames already appended
/// stay in the buffer.
pub async fn read_frames<R>(
    stream: &mut R,
    buffer: &SharedBuffer,
    max_frame_size: usize,
    cancel: &CancellationToken,
) -> io::Result<ReadSummary>
where
    R: AsyncRead + Unpin,
{
    let mut splitter = FrameSplitter::new(max_frame_size);
    let mut summary = ReadSummary::default();

    loop {
        // Drain everything already buffered before reading again
        while let Some(frame) = splitter.next_frame()? {
            buffer.append(&frame).await;
            summary.record(frame.len());
        }

        let input = splitter.buffer_mut();
        input.reserve(READ_CHUNK);

        let n = tokio::select! {
            result = stream.read_buf(input) => result?,
            _ = cancel.cancelled() => 0,
        };

        if n == 0 {
            if let Some(frame) = splitter.finish() {
                buffer.append(&frame).await;
                summary.record(frame.len());
            }
            return Ok(summary);
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tokio_test::io::Builder;

    use super::*;

    #[tokio::test]
    async fn test_reads_frames_across_chunks() {
        let mut stream = Builder::new()
            .read(b"AB\x00C")
            .read(b"D\x00EF")
            .build();
        let buffer = SharedBuffer::new();

        let summary = read_frames(&mut stream, &buffer, 0, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary, ReadSummary { frames: 3, bytes: 8 });
        assert_eq!(
            buffer.snapshot_and_clear().await,
            Bytes::from_static(b"AB\x00CD\x00EF")
        );
    }

    #[tokio::test]
    async fn test_delimited_end_has_no_extra_frame() {
        let mut stream = Builder::new().read(b"AB\x00").build();
        let buffer = SharedBuffer::new();

        let summary = read_frames(&mut stream, &buffer, 0, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.frames, 1);
        assert_eq!(buffer.snapshot_and_clear().await, Bytes::from_static(b"AB\x00"));
    }

    #[tokio::test]
    async fn test_empty_stream() {
        let mut stream = Builder::new().build();
        let buffer = SharedBuffer::new();

        let summary = read_frames(&mut stream, &buffer, 0, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary, ReadSummary::default());
        assert!(buffer.snapshot_and_clear().await.is_empty());
    }

    #[tokio::test]
    async fn test_read_error_keeps_appended_frames() {
        let mut stream = Builder::new()
            .read(b"ok\x00partial")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let buffer = SharedBuffer::new();

        let err = read_frames(&mut stream, &buffer, 0, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert_eq!(buffer.snapshot_and_clear().await, Bytes::from_static(b"ok\x00"));
    }

    #[tokio::test]
    async fn test_oversized_frame_terminates() {
        let mut stream = Builder::new().read(b"a\x00bbbbbbbb").build();
        let buffer = SharedBuffer::new();

        let err = read_frames(&mut stream, &buffer, 4, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(buffer.snapshot_and_clear().await, Bytes::from_static(b"a\x00"));
    }

    #[tokio::test]
    async fn test_cancelled_reader_flushes_remainder() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let buffer = SharedBuffer::new();
        let cancel = CancellationToken::new();

        tokio::io::AsyncWriteExt::write_all(&mut client, b"one\x00tw")
            .await
            .unwrap();

        let reader = read_frames(&mut server, &buffer, 0, &cancel);
        let canceller = async {
            tokio::task::yield_now().await;
            cancel.cancel();
        };
        let (summary, _) = tokio::join!(reader, canceller);

        assert_eq!(summary.unwrap().frames, 2);
        assert_eq!(buffer.snapshot_and_clear().await, Bytes::from_static(b"one\x00tw"));
        drop(client);
    }
}

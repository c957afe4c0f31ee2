//! # Cache Streaming
//!
//! Streams a committed cache entry to the client over a resolved
//! serving window, in bounded chunks so memory stays flat regardless of
//! file size. When the consumer goes away the stream is simply dropped;
//! a disconnect is never escalated as an error.

use tokio::fs::File;
use tokio::io::{self, AsyncReadExt, AsyncSeekExt, SeekFrom, Take};
use tokio_util::io::ReaderStream;

use crate::range::ServingWindow;

/// Chunk size for disk reads and origin relaying.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Lazy chunk stream over one entry's serving window.
pub type EntryStream = ReaderStream<Take<File>>;

/// Open the entry and produce a chunk stream covering exactly
/// `[window.start, window.end]` inclusive.
pub async fn stream_entry(path: &std::path::Path, window: &ServingWindow) -> io::Result<EntryStream> {
    let mut file = File::open(path).await?;
    file.seek(SeekFrom::Start(window.start)).await?;
    let limited = file.take(window.length());
    Ok(ReaderStream::with_capacity(limited, CHUNK_SIZE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::resolve_window;
    use bytes::Bytes;
    use futures::{Stream, StreamExt};
    use tempfile::tempdir;
    use tokio::fs;

    async fn collect(
        mut stream: impl Stream<Item = io::Result<Bytes>> + Unpin,
    ) -> (Vec<u8>, usize) {
        let mut body = Vec::new();
        let mut max_chunk = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.unwrap();
            max_chunk = max_chunk.max(chunk.len());
            body.extend_from_slice(&chunk);
        }
        (body, max_chunk)
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn test_full_window_reads_whole_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("v.mp4");
        let content = sample(1000);
        fs::write(&path, &content).await.unwrap();

        let window = resolve_window(None, 1000).unwrap();
        let stream = stream_entry(&path, &window).await.unwrap();
        let (body, _) = collect(Box::pin(stream)).await;
        assert_eq!(body, content);
    }

    #[tokio::test]
    async fn test_partial_window_reads_exact_span() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("v.mp4");
        let content = sample(1000);
        fs::write(&path, &content).await.unwrap();

        let window = resolve_window(Some("bytes=100-199"), 1000).unwrap();
        let stream = stream_entry(&path, &window).await.unwrap();
        let (body, _) = collect(Box::pin(stream)).await;
        assert_eq!(body, &content[100..=199]);
    }

    #[tokio::test]
    async fn test_chunks_are_bounded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("v.mp4");
        fs::write(&path, sample(CHUNK_SIZE * 3 + 17)).await.unwrap();

        let total = (CHUNK_SIZE * 3 + 17) as u64;
        let window = resolve_window(None, total).unwrap();
        let stream = stream_entry(&path, &window).await.unwrap();
        let (body, max_chunk) = collect(Box::pin(stream)).await;
        assert_eq!(body.len() as u64, total);
        assert!(max_chunk <= CHUNK_SIZE);
    }

    #[tokio::test]
    async fn test_early_drop_terminates_cleanly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("v.mp4");
        fs::write(&path, sample(CHUNK_SIZE * 4)).await.unwrap();

        let window = resolve_window(None, (CHUNK_SIZE * 4) as u64).unwrap();
        let stream = stream_entry(&path, &window).await.unwrap();
        let mut stream = Box::pin(stream);
        // Consumer walks away after one chunk
        let first = stream.next().await.unwrap().unwrap();
        assert!(!first.is_empty());
        drop(stream);
    }
}

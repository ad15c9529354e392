use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{trace, warn};

use crate::protocol::{MulterError, ParseError, WriteError};

/// Outcome of streaming one file part to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrittenFile {
    /// Bytes written to the file
    pub size: u64,
    /// Whether the part was larger than the size limit and got cut
    pub truncated: bool,
}

/// Streams file content to disk, holding at most one chunk in memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileWriter {
    size_limit: Option<u64>,
}

impl FileWriter {
    pub fn new(size_limit: Option<u64>) -> Self {
        Self { size_limit }
    }

    /// Writes every chunk of `content` to `path`, replacing an existing file.
    ///
    /// Content past the size limit is read and dropped. If writing fails, the content
    /// stream fails, or the returned future is dropped before completion, the partial
    /// file is removed.
    pub async fn write<S>(&self, path: &Path, content: S) -> Result<WrittenFile, MulterError>
    where
        S: Stream<Item = Result<Bytes, ParseError>> + Unpin,
    {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .await
            .map_err(|e| WriteError::io(path, e))?;

        self.write_to(path, file, content).await
    }

    /// Streams `content` into `sink`, the already opened file at `path`.
    async fn write_to<W, S>(&self, path: &Path, sink: W, mut content: S) -> Result<WrittenFile, MulterError>
    where
        W: AsyncWrite + Unpin,
        S: Stream<Item = Result<Bytes, ParseError>> + Unpin,
    {
        let guard = PartialFileGuard::new(path);
        let mut sink = BufWriter::new(sink);
        let mut size: u64 = 0;
        let mut truncated = false;
        let mut skipped: u64 = 0;

        while let Some(chunk) = content.next().await {
            let mut chunk = chunk?;

            if let Some(limit) = self.size_limit {
                let remaining = limit - size;
                if chunk.len() as u64 > remaining {
                    truncated = true;
                    skipped += chunk.len() as u64 - remaining;
                    chunk.truncate(remaining as usize);
                }
            }

            if chunk.is_empty() {
                continue;
            }

            sink.write_all(&chunk).await.map_err(|e| WriteError::io(path, e))?;
            size += chunk.len() as u64;
        }

        sink.flush().await.map_err(|e| WriteError::io(path, e))?;
        guard.disarm();

        if truncated {
            warn!(path = %path.display(), size, skipped, "file exceeds size limit, truncated");
        } else {
            trace!(path = %path.display(), size, "file written");
        }

        Ok(WrittenFile { size, truncated })
    }
}

/// Removes a file that was not completely written.
struct PartialFileGuard {
    path: Option<PathBuf>,
}

impl PartialFileGuard {
    fn new(path: &Path) -> Self {
        Self { path: Some(path.to_path_buf()) }
    }

    fn disarm(mut self) {
        self.path = None;
    }
}

impl Drop for PartialFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            remove(&path, "partial");
        }
    }
}

/// Removes the files stored for a request unless the request completes.
///
/// Once a request fails its [`ParseResult`](crate::protocol::ParseResult) is dropped,
/// nothing else would know about these files.
#[derive(Debug, Default)]
pub(crate) struct StoredFilesGuard {
    paths: Vec<PathBuf>,
}

impl StoredFilesGuard {
    pub(crate) fn push(&mut self, path: &Path) {
        self.paths.push(path.to_path_buf());
    }

    pub(crate) fn disarm(mut self) {
        self.paths.clear();
    }
}

impl Drop for StoredFilesGuard {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            remove(&path, "stored");
        }
    }
}

fn remove(path: &Path, kind: &str) {
    match std::fs::remove_file(path) {
        Ok(()) => warn!(path = %path.display(), kind, "removed file of failed upload"),
        // a renamed upload may have been stored twice under the same name
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), kind, cause = %e, "failed to remove file of failed upload"),
    }
}

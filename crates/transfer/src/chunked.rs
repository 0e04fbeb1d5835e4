use std::future::Future;
use std::io::SeekFrom;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::TransferError;
use crate::types::ChunkTransfer;

// ---------------------------------------------------------------------------
// ChunkPlan
// ---------------------------------------------------------------------------

/// Fixed-size split of a file into chunk byte ranges.
///
/// Chunk `i` covers `[i * chunk_size, min((i + 1) * chunk_size, file_size))`.
/// A zero-byte file plans zero chunks; rejecting it is the caller's policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    file_size: u64,
    chunk_size: u64,
    total_chunks: u32,
}

impl ChunkPlan {
    /// Plans `file_size` bytes in chunks of `chunk_size`.
    pub fn new(file_size: u64, chunk_size: u64) -> Result<Self, TransferError> {
        if chunk_size == 0 {
            return Err(TransferError::InvalidChunkSize);
        }
        let total = file_size.div_ceil(chunk_size);
        let total_chunks = u32::try_from(total).map_err(|_| TransferError::TooManyChunks(total))?;
        Ok(Self {
            file_size,
            chunk_size,
            total_chunks,
        })
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    /// Returns the chunk at `index`, or `None` past the end.
    pub fn chunk(&self, index: u32) -> Option<ChunkTransfer> {
        if index >= self.total_chunks {
            return None;
        }
        let start = u64::from(index) * self.chunk_size;
        let end = (start + self.chunk_size).min(self.file_size);
        Some(ChunkTransfer { index, start, end })
    }

    /// Iterates all chunks in ascending index order.
    pub fn chunks(&self) -> impl Iterator<Item = ChunkTransfer> + '_ {
        (0..self.total_chunks).filter_map(move |i| self.chunk(i))
    }

    /// Sums the exact byte lengths of the given chunk indices.
    ///
    /// Out-of-range indices contribute nothing.
    pub fn bytes_in<'a>(&self, indices: impl IntoIterator<Item = &'a u32>) -> u64 {
        indices
            .into_iter()
            .filter_map(|&i| self.chunk(i))
            .map(|c| c.len())
            .sum()
    }
}

// ---------------------------------------------------------------------------
// ChunkSource
// ---------------------------------------------------------------------------

/// Boxed future returned by [`ChunkSource::read_range`].
pub type SourceFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<u8>, TransferError>> + Send + 'a>>;

/// Random-access byte source for the file being uploaded.
pub trait ChunkSource: Send + Sync {
    /// File name reported to the backend.
    fn name(&self) -> &str;

    /// Total size in bytes.
    fn size(&self) -> u64;

    /// Reads exactly the bytes in `range`.
    fn read_range(&self, range: Range<u64>) -> SourceFuture<'_>;
}

/// A file on disk, re-opened for every chunk read.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    name: String,
    size: u64,
}

impl FileSource {
    /// Opens `path` and captures its current size.
    pub async fn open(path: &Path) -> Result<Self, TransferError> {
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(TransferError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a regular file: {}", path.display()),
            )));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Ok(Self {
            path: path.to_path_buf(),
            name,
            size: metadata.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ChunkSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn read_range(&self, range: Range<u64>) -> SourceFuture<'_> {
        Box::pin(async move {
            let len = usize::try_from(range.end.saturating_sub(range.start)).map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "range too large")
            })?;
            let mut file = tokio::fs::File::open(&self.path).await?;
            file.seek(SeekFrom::Start(range.start)).await?;
            let mut buf = vec![0u8; len];
            // Fails with UnexpectedEof if the file shrank since open().
            file.read_exact(&mut buf).await?;
            Ok(buf)
        })
    }
}

/// An in-memory byte buffer.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

impl ChunkSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_range(&self, range: Range<u64>) -> SourceFuture<'_> {
        Box::pin(async move {
            let start = usize::try_from(range.start).unwrap_or(usize::MAX);
            let end = usize::try_from(range.end).unwrap_or(usize::MAX);
            self.data
                .get(start..end)
                .map(<[u8]>::to_vec)
                .ok_or_else(|| {
                    TransferError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!("range {start}..{end} outside {} bytes", self.data.len()),
                    ))
                })
        })
    }
}

// crates/core/src/tail.rs
//! Incremental tail reading for append-only transcript files.
//!
//! A [`TailCursor`] remembers how far into the file it has consumed and a
//! carry buffer for a line that arrived split across reads. The owning
//! tailer task is the only reader of a given cursor, so read + advance is
//! atomic by construction.

use std::io;
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tracing::debug;

/// Byte offset + partial-line carry for one open transcript.
///
/// The carry stays raw bytes: an append can split a multibyte character,
/// so decoding happens only on complete lines.
#[derive(Debug, Default)]
pub struct TailCursor {
    offset: u64,
    carry: Vec<u8>,
}

impl TailCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read everything appended since the last call and return the
    /// complete lines, holding back a trailing partial line.
    ///
    /// A missing file reads as "nothing new"; discovery owns retirement.
    /// A file smaller than the stored offset means truncation/rotation;
    /// the cursor resets and the new generation is read from byte zero.
    pub async fn read_appended(&mut self, path: &Path) -> io::Result<Vec<String>> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let size = metadata.len();
        if size < self.offset {
            debug!(
                path = %path.display(),
                old_offset = self.offset,
                new_size = size,
                "transcript shrank; treating as a new generation"
            );
            self.offset = 0;
            self.carry.clear();
        }
        if size == self.offset {
            return Ok(Vec::new());
        }

        let mut file = File::open(path).await?;
        file.seek(SeekFrom::Start(self.offset)).await?;

        let mut buf = vec![0u8; (size - self.offset) as usize];
        file.read_exact(&mut buf).await?;
        self.offset = size;

        let mut bytes = std::mem::take(&mut self.carry);
        bytes.extend_from_slice(&buf);

        let mut pieces: Vec<&[u8]> = bytes.split(|&b| b == b'\n').collect();
        // The final piece is complete only if the chunk ended in a newline
        // (in which case it's empty after the last '\n').
        let last = pieces.pop().unwrap_or_default().to_vec();

        let lines = pieces
            .into_iter()
            .filter(|l| !l.is_empty())
            .map(|l| String::from_utf8_lossy(l).into_owned())
            .collect();
        self.carry = last;

        Ok(lines)
    }
}

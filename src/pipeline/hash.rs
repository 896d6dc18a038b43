//! Content fingerprints: SHA-256 over the whole source document.
//!
//! The digest identifies *what* was imported, independent of file name or
//! modification time, so re-importing the same PDF under another name is
//! detectable. It is an identity fingerprint, not an authentication tag.

use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Hex length of a SHA-256 digest.
pub const DIGEST_HEX_LEN: usize = 64;

const READ_CHUNK: usize = 64 * 1024;

/// SHA-256 of an in-memory buffer, lower-case hex.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// SHA-256 of everything `reader` yields until EOF.
///
/// The digest is only produced once the stream is exhausted; a read error
/// is returned unchanged and no partial digest escapes.
pub async fn hash_reader<R>(mut reader: R) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// SHA-256 of a file's contents.
pub async fn hash_file(path: &Path) -> std::io::Result<String> {
    let file = tokio::fs::File::open(path).await?;
    hash_reader(tokio::io::BufReader::new(file)).await
}

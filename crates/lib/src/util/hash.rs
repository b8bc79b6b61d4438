//! Content checksums for version records.

use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// A 40-character lowercase SHA-1 hex digest, as flashed images record it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Hash `len` bytes of a file starting at `offset`.
///
/// A zero `len` hashes to the end of the file. A range that runs past the
/// end of the file is truncated to what is present.
pub fn hash_range(path: &Path, offset: u64, len: u64) -> std::io::Result<ContentHash> {
  let mut file = fs::File::open(path)?;
  file.seek(SeekFrom::Start(offset))?;

  let mut reader: Box<dyn Read> = if len == 0 { Box::new(file) } else { Box::new(file.take(len)) };

  let mut hasher = Sha1::new();
  let mut buffer = [0u8; 8192];
  loop {
    let bytes_read = reader.read(&mut buffer)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(ContentHash(hex::encode(hasher.finalize())))
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  let mut hasher = Sha1::new();
  hasher.update(data);
  ContentHash(hex::encode(hasher.finalize()))
}

//! On-disk framing for store documents.
//!
//! A store file is a header followed by a single checksummed frame:
//!
//! ```text
//! [magic: 4 bytes "CASE"][version: 1 byte][length: 4 bytes LE][JSON: N bytes][crc32: 4 bytes LE]
//! ```

use std::io::{Error as IoError, ErrorKind, Read, Result as IoResult, Write};

use crc32fast::Hasher;
use serde::{de::DeserializeOwned, Serialize};

/// Current format version.
pub const FORMAT_VERSION: u8 = 1;

/// Magic bytes identifying a case store file.
pub const MAGIC: [u8; 4] = *b"CASE";

/// Upper bound on a single document.
pub const MAX_DOCUMENT_SIZE: usize = 16 * 1024 * 1024;

fn invalid(message: String) -> IoError {
    IoError::new(ErrorKind::InvalidData, message)
}

fn checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Serializes `value` into a complete file image.
pub fn encode<T: Serialize>(value: &T) -> IoResult<Vec<u8>> {
    let data = serde_json::to_vec_pretty(value)
        .map_err(|e| invalid(format!("serialization failed: {e}")))?;
    if data.len() > MAX_DOCUMENT_SIZE {
        return Err(invalid(format!(
            "document size {} exceeds maximum {MAX_DOCUMENT_SIZE}",
            data.len()
        )));
    }
    let len = u32::try_from(data.len()).map_err(|_| invalid("document too large".to_string()))?;

    let mut out = Vec::with_capacity(MAGIC.len() + 1 + 4 + data.len() + 4);
    write_header(&mut out)?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&data);
    out.extend_from_slice(&checksum(&data).to_le_bytes());
    Ok(out)
}

/// Reads a complete file image, verifying header and checksum.
///
/// # Errors
/// - Bad magic or unsupported version
/// - Declared length above [`MAX_DOCUMENT_SIZE`]
/// - Checksum mismatch (corruption detected)
/// - JSON that does not deserialize into `T`
pub fn decode<T: DeserializeOwned>(reader: &mut impl Read) -> IoResult<T> {
    let version = read_header(reader)?;
    if version != FORMAT_VERSION {
        return Err(invalid(format!(
            "unsupported format version: {version} (expected {FORMAT_VERSION})"
        )));
    }

    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_DOCUMENT_SIZE {
        return Err(invalid(format!(
            "document size {len} exceeds maximum {MAX_DOCUMENT_SIZE}"
        )));
    }

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data)?;

    let mut crc_bytes = [0u8; 4];
    reader.read_exact(&mut crc_bytes)?;
    let stored = u32::from_le_bytes(crc_bytes);
    let computed = checksum(&data);
    if stored != computed {
        return Err(invalid(format!(
            "CRC mismatch: stored={stored:08x}, computed={computed:08x} (data corrupted)"
        )));
    }

    serde_json::from_slice(&data).map_err(|e| invalid(format!("deserialization failed: {e}")))
}

/// Writes magic and version.
pub fn write_header(writer: &mut impl Write) -> IoResult<()> {
    writer.write_all(&MAGIC)?;
    writer.write_all(&[FORMAT_VERSION])
}

/// Reads and validates magic, returning the version byte.
pub fn read_header(reader: &mut impl Read) -> IoResult<u8> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(invalid(format!(
            "invalid magic bytes: expected {MAGIC:?}, got {magic:?}"
        )));
    }
    let mut version = [0u8; 1];
    reader.read_exact(&mut version)?;
    Ok(version[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Entry;
    use crate::storage::StoreDocument;
    use crate::store::StoreKind;
    use crate::value::ValueType;
    use std::io::Cursor;

    fn sample() -> StoreDocument {
        StoreDocument::new(
            StoreKind::MachPes,
            vec![Entry::new("NTASKS", ValueType::Int)
                .per_component()
                .with_attribute_value("ATM", "64")],
        )
    }

    #[test]
    fn test_document_roundtrip() {
        let doc = sample();
        let bytes = encode(&doc).unwrap();
        assert_eq!(&bytes[..4], b"CASE");

        let decoded: StoreDocument = decode(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(decoded, doc);
    }

    #[test]
    fn test_detects_corruption() {
        let mut bytes = encode(&sample()).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;

        let err = decode::<StoreDocument>(&mut Cursor::new(bytes)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut bytes = encode(&sample()).unwrap();
        bytes[0] = b'X';
        let err = decode::<StoreDocument>(&mut Cursor::new(bytes)).unwrap_err();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn test_rejects_oversized_document() {
        let mut bad = Vec::new();
        write_header(&mut bad).unwrap();
        bad.extend_from_slice(&(200_000_000u32).to_le_bytes());

        let err = decode::<StoreDocument>(&mut Cursor::new(bad)).unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }
}

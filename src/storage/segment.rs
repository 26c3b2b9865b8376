use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use crate::core::error::{Error, ErrorKind, Result};

/// Segment file header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentHeader {
    pub version: u32,     // Format version
    pub checksum: u32,    // CRC32 of the stored payload
    pub raw_len: u32,     // Payload size before compression
    pub compression: CompressionType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionType {
    None,
    Lz4,
}

impl SegmentHeader {
    pub const VERSION: u32 = 1;
    pub const SIZE: usize = 16; // Fixed header size

    /// Payloads smaller than this are stored uncompressed.
    const COMPRESS_THRESHOLD: usize = 512;
}

/// Writes one object to its segment file.
///
/// ```text
/// [ HEADER (version, checksum, raw_len, compression) ] <- byte 0
/// [ PAYLOAD (bincode, optionally LZ4 block) ]
/// ```
///
/// The file is written next to its final location and renamed over it, so a
/// reader never sees a half-written segment.
pub fn write_segment<T: Serialize>(path: &Path, object: &T) -> Result<u64> {
    let raw = bincode::serialize(object)?;
    let raw_len = raw.len() as u32;

    let (compression, payload) = if raw.len() >= SegmentHeader::COMPRESS_THRESHOLD {
        (CompressionType::Lz4, lz4_flex::compress(&raw))
    } else {
        (CompressionType::None, raw)
    };

    let mut hasher = Hasher::new();
    hasher.update(&payload);

    let header = SegmentHeader {
        version: SegmentHeader::VERSION,
        checksum: hasher.finalize(),
        raw_len,
        compression,
    };
    let header_data = bincode::serialize(&header)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = Path::new(&tmp_name);

    let mut file = File::create(tmp_path)?;
    file.write_all(&header_data)?;
    file.write_all(&payload)?;
    file.sync_all()?;
    drop(file);

    fs::rename(tmp_path, path)?;

    Ok((header_data.len() + payload.len()) as u64)
}

/// Reads an object written by [`write_segment`], verifying version and
/// checksum.
pub fn read_segment<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let mut file = File::open(path)?;

    // Read header
    let mut header_buf = vec![0u8; SegmentHeader::SIZE];
    file.read_exact(&mut header_buf)?;
    let header: SegmentHeader = bincode::deserialize(&header_buf)?;

    // Verify version
    if header.version != SegmentHeader::VERSION {
        return Err(Error::new(
            ErrorKind::InvalidArgument,
            format!("incompatible segment version {} in {}", header.version, path.display()),
        ));
    }

    let mut payload = Vec::new();
    file.read_to_end(&mut payload)?;

    let mut hasher = Hasher::new();
    hasher.update(&payload);
    if hasher.finalize() != header.checksum {
        return Err(Error::new(
            ErrorKind::Parse,
            format!("checksum mismatch in {}", path.display()),
        ));
    }

    let raw = match header.compression {
        CompressionType::None => payload,
        CompressionType::Lz4 => lz4_flex::decompress(&payload, header.raw_len as usize)?,
    };

    Ok(bincode::deserialize(&raw)?)
}

/// Removes a segment file; a missing file is not an error.
pub fn remove_segment(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn header_has_fixed_size() {
        let header = SegmentHeader {
            version: SegmentHeader::VERSION,
            checksum: 7,
            raw_len: 9,
            compression: CompressionType::Lz4,
        };
        assert_eq!(bincode::serialize(&header).unwrap().len(), SegmentHeader::SIZE);
    }

    #[test]
    fn small_and_large_payloads_survive() {
        let dir = TempDir::new().unwrap();
        let small = dir.path().join("a/b.grn");
        let large = dir.path().join("c.grn");

        write_segment(&small, &vec![1u32, 2, 3]).unwrap();
        let values: Vec<u64> = (0..10_000).collect();
        write_segment(&large, &values).unwrap();

        assert_eq!(read_segment::<Vec<u32>>(&small).unwrap(), vec![1, 2, 3]);
        assert_eq!(read_segment::<Vec<u64>>(&large).unwrap(), values);
    }

    #[test]
    fn corrupted_payload_is_detected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.grn");
        write_segment(&path, &"hello".to_string()).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fs::write(&path, bytes).unwrap();

        let err = read_segment::<String>(&path).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parse);
    }

    #[test]
    fn removing_missing_segment_is_fine() {
        let dir = TempDir::new().unwrap();
        assert!(!remove_segment(&dir.path().join("none")).unwrap());
    }
}

//! .blend file-header sniffing
//!
//! Two header layouts exist:
//!
//! - legacy, 12 bytes: `BLENDER` + pointer size (`_` = 4, `-` = 8) +
//!   endianness (`v` little, `V` big) + three version digits (`405` = 4.5)
//! - Blender 5.0 and later, 17 bytes: `BLENDER` + two-digit header size +
//!   `-` + two-digit format version + endianness + four version digits
//!   (`BLENDER17-01v0500` = 5.0, always 8-byte pointers)
//!
//! Compressed files are gzip (up to 2.9) or zstd (3.0 and later); only the
//! first bytes are decompressed.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use serde::Serialize;

use crate::error::{FeatherError, Result};

const MAGIC: &[u8; 7] = b"BLENDER";
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];
const MAX_HEADER_LEN: usize = 17;

/// File version as stored in the header (`major.minor`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BlendVersion {
    pub major: u16,
    pub minor: u16,
}

impl BlendVersion {
    pub fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// From the packed header number, e.g. `279` -> 2.79, `405` -> 4.5
    pub fn from_packed(packed: u16) -> Self {
        Self::new(packed / 100, packed % 100)
    }

    /// Parse a user-facing version string such as `4.5` or `2.79`.
    ///
    /// Before 3.0 the minor number has two digits, so `2.8` means 2.80.
    pub fn parse(s: &str) -> Result<Self> {
        let (major, minor) = s
            .trim()
            .split_once('.')
            .unwrap_or((s.trim(), "0"));
        let single_digit_minor = minor.len() == 1;
        match (major.parse::<u16>(), minor.parse::<u16>()) {
            (Ok(major), Ok(minor)) if major < 3 && single_digit_minor => {
                Ok(Self::new(major, minor * 10))
            }
            (Ok(major), Ok(minor)) => Ok(Self::new(major, minor)),
            _ => Err(FeatherError::invalid_value("Blender version", s)),
        }
    }
}

impl fmt::Display for BlendVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.major < 3 {
            write!(f, "{}.{:02}", self.major, self.minor)
        } else {
            write!(f, "{}.{}", self.major, self.minor)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    Little,
    Big,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    Gzip,
    Zstd,
}

/// What the first bytes of a .blend file say about it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlendHeader {
    pub version: BlendVersion,
    pub pointer_size: u8,
    pub endianness: Endianness,
    pub compression: Compression,
}

/// Read and decode the header of the file at `path`
pub fn sniff(path: &Path) -> Result<BlendHeader> {
    let mut raw = Vec::with_capacity(64);
    File::open(path)
        .map_err(|e| FeatherError::io_operation("open", path.display(), e))?
        .take(64)
        .read_to_end(&mut raw)?;

    let (compression, head) = if raw.starts_with(&GZIP_MAGIC) {
        (Compression::Gzip, read_prefix(GzDecoder::new(File::open(path)?))?)
    } else if raw.starts_with(&ZSTD_MAGIC) {
        let decoder = zstd::stream::read::Decoder::new(File::open(path)?)?;
        (Compression::Zstd, read_prefix(decoder)?)
    } else {
        (Compression::None, raw)
    };

    parse_header(&head, compression).map_err(|reason| FeatherError::UnrecognizedHeader {
        path: path.to_path_buf(),
        reason,
    })
}

fn read_prefix(reader: impl Read) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(MAX_HEADER_LEN);
    reader.take(MAX_HEADER_LEN as u64).read_to_end(&mut out)?;
    Ok(out)
}

/// Decode an uncompressed header prefix
pub fn parse_header(bytes: &[u8], compression: Compression) -> std::result::Result<BlendHeader, String> {
    if bytes.len() < 12 || &bytes[..7] != MAGIC {
        return Err("missing BLENDER magic".to_string());
    }

    if bytes[7].is_ascii_digit() {
        parse_large_header(bytes, compression)
    } else {
        parse_legacy_header(bytes, compression)
    }
}

fn parse_legacy_header(bytes: &[u8], compression: Compression) -> std::result::Result<BlendHeader, String> {
    let pointer_size = match bytes[7] {
        b'_' => 4,
        b'-' => 8,
        other => return Err(format!("unknown pointer size marker {:?}", other as char)),
    };
    let endianness = parse_endianness(bytes[8])?;
    let packed = parse_digits(&bytes[9..12])?;

    Ok(BlendHeader {
        version: BlendVersion::from_packed(packed),
        pointer_size,
        endianness,
        compression,
    })
}

fn parse_large_header(bytes: &[u8], compression: Compression) -> std::result::Result<BlendHeader, String> {
    let header_len = usize::from(parse_digits(&bytes[7..9])?);
    if header_len != MAX_HEADER_LEN || bytes.len() < header_len {
        return Err(format!("unsupported header size {header_len}"));
    }
    if bytes[9] != b'-' {
        return Err("malformed header separator".to_string());
    }
    let format_version = parse_digits(&bytes[10..12])?;
    if format_version != 1 {
        return Err(format!("unsupported header format {format_version}"));
    }
    let endianness = parse_endianness(bytes[12])?;
    let packed = parse_digits(&bytes[13..17])?;

    Ok(BlendHeader {
        version: BlendVersion::from_packed(packed),
        pointer_size: 8,
        endianness,
        compression,
    })
}

fn parse_endianness(byte: u8) -> std::result::Result<Endianness, String> {
    match byte {
        b'v' => Ok(Endianness::Little),
        b'V' => Ok(Endianness::Big),
        other => Err(format!("unknown endianness marker {:?}", other as char)),
    }
}

fn parse_digits(bytes: &[u8]) -> std::result::Result<u16, String> {
    std::str::from_utf8(bytes)
        .ok()
        .filter(|s| s.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| format!("invalid version digits {:?}", String::from_utf8_lossy(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_legacy_header() {
        let header = parse_header(b"BLENDER-v405REND", Compression::None).unwrap();
        assert_eq!(header.version, BlendVersion::new(4, 5));
        assert_eq!(header.pointer_size, 8);
        assert_eq!(header.endianness, Endianness::Little);
    }

    #[test]
    fn test_legacy_32bit_big_endian() {
        let header = parse_header(b"BLENDER_V279", Compression::None).unwrap();
        assert_eq!(header.version.to_string(), "2.79");
        assert_eq!(header.pointer_size, 4);
        assert_eq!(header.endianness, Endianness::Big);
    }

    #[test]
    fn test_large_header() {
        let header = parse_header(b"BLENDER17-01v0500", Compression::None).unwrap();
        assert_eq!(header.version, BlendVersion::new(5, 0));
        assert_eq!(header.version.to_string(), "5.0");
        assert_eq!(header.pointer_size, 8);
    }

    #[test]
    fn test_rejects_non_blend() {
        assert!(parse_header(b"PK\x03\x04 not a blend", Compression::None).is_err());
        assert!(parse_header(b"BLENDER", Compression::None).is_err());
        assert!(parse_header(b"BLENDER-x405", Compression::None).is_err());
    }

    #[test]
    fn test_sniff_gzip_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("old.blend");
        let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"BLENDER-v293REND....").unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        let header = sniff(&path).unwrap();
        assert_eq!(header.compression, Compression::Gzip);
        assert_eq!(header.version, BlendVersion::new(2, 93));
    }

    #[test]
    fn test_sniff_zstd_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("new.blend");
        let bytes = zstd::stream::encode_all(&b"BLENDER-v306REND...."[..], 3).unwrap();
        std::fs::write(&path, bytes).unwrap();

        let header = sniff(&path).unwrap();
        assert_eq!(header.compression, Compression::Zstd);
        assert_eq!(header.version.to_string(), "3.6");
    }

    #[test]
    fn test_sniff_unrecognized() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fake.blend");
        std::fs::write(&path, b"hello world, definitely not blender").unwrap();
        let err = sniff(&path).unwrap_err();
        assert!(matches!(err, FeatherError::UnrecognizedHeader { .. }));
    }

    #[test]
    fn test_version_parse_and_order() {
        assert_eq!(BlendVersion::parse("4.5").unwrap(), BlendVersion::new(4, 5));
        assert_eq!(BlendVersion::parse("5").unwrap(), BlendVersion::new(5, 0));
        assert!(BlendVersion::parse("four").is_err());
        assert!(BlendVersion::new(3, 6) < BlendVersion::new(4, 5));
        assert!(BlendVersion::new(2, 93) < BlendVersion::new(3, 0));
    }

    #[test]
    fn test_single_digit_minor_before_three_is_tens() {
        assert_eq!(BlendVersion::parse("2.8").unwrap(), BlendVersion::new(2, 80));
        assert_eq!(BlendVersion::parse("2.8").unwrap().to_string(), "2.80");
        assert_eq!(BlendVersion::parse("2.79").unwrap(), BlendVersion::new(2, 79));
        assert_eq!(BlendVersion::parse("3.6").unwrap(), BlendVersion::new(3, 6));
        assert!(BlendVersion::parse("2.8").unwrap() >= BlendVersion::from_packed(280));
    }
}

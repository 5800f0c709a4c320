//! Base64 encoded, optionally zlib compressed, numeric arrays as embedded in
//! mzML and mzXML documents.
use std::io::{self, prelude::*};

use bytemuck::Pod;
use flate2::write::{ZlibDecoder, ZlibEncoder};
use flate2::Compression;

type Bytes = Vec<u8>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BinaryDataArrayType {
    Float32,
    #[default]
    Float64,
}

impl BinaryDataArrayType {
    pub const fn size_of(&self) -> usize {
        match self {
            Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BinaryCompressionType {
    #[default]
    NoCompression,
    Zlib,
}

fn invalid_data<E: ToString>(err: E) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err.to_string())
}

pub fn compress_zlib(bytestring: &[u8]) -> io::Result<Bytes> {
    let mut compressor = ZlibEncoder::new(Bytes::new(), Compression::best());
    compressor.write_all(bytestring)?;
    compressor.finish()
}

pub fn decompress_zlib(bytestring: &[u8]) -> io::Result<Bytes> {
    let mut decompressor = ZlibDecoder::new(Bytes::new());
    decompressor.write_all(bytestring)?;
    decompressor.finish()
}

/// Base64 encode `bytestring`, compressing it first if requested
pub fn encode_bytes(bytestring: &[u8], compression: BinaryCompressionType) -> io::Result<String> {
    let encoded = match compression {
        BinaryCompressionType::NoCompression => {
            base64_simd::STANDARD.encode_type::<Bytes>(bytestring)
        }
        BinaryCompressionType::Zlib => {
            let compressed = compress_zlib(bytestring)?;
            base64_simd::STANDARD.encode_type::<Bytes>(&compressed)
        }
    };
    String::from_utf8(encoded).map_err(invalid_data)
}

/// Decode a base64 payload into raw bytes, decompressing it if requested
pub fn decode_bytes(text: &[u8], compression: BinaryCompressionType) -> io::Result<Bytes> {
    let text: Bytes = text
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if text.is_empty() {
        return Ok(Bytes::new());
    }
    let raw = base64_simd::STANDARD
        .decode_type::<Bytes>(&text)
        .map_err(invalid_data)?;
    match compression {
        BinaryCompressionType::NoCompression => Ok(raw),
        BinaryCompressionType::Zlib => decompress_zlib(&raw),
    }
}

/// Encode a little endian array of plain numeric values
pub fn encode_array<T: Pod>(values: &[T], compression: BinaryCompressionType) -> io::Result<String> {
    encode_bytes(bytemuck::cast_slice(values), compression)
}

/// Decode a little endian array and widen it to `f64`
pub fn decode_array(
    text: &[u8],
    dtype: BinaryDataArrayType,
    compression: BinaryCompressionType,
) -> io::Result<Vec<f64>> {
    let bytes = decode_bytes(text, compression)?;
    if bytes.len() % dtype.size_of() != 0 {
        return Err(invalid_data(format!(
            "{} bytes is not a multiple of the {dtype:?} width",
            bytes.len()
        )));
    }
    let values = match dtype {
        BinaryDataArrayType::Float32 => bytemuck::pod_collect_to_vec::<u8, f32>(&bytes)
            .into_iter()
            .map(|v| v as f64)
            .collect(),
        BinaryDataArrayType::Float64 => bytemuck::pod_collect_to_vec::<u8, f64>(&bytes),
    };
    Ok(values)
}

/// Encode interleaved (m/z, intensity) pairs in network byte order at 64-bit precision
pub fn encode_network_order_pairs(
    pairs: &[(f64, f32)],
    compression: BinaryCompressionType,
) -> io::Result<String> {
    let mut bytes = Bytes::with_capacity(pairs.len() * 16);
    for (mz, intensity) in pairs {
        bytes.extend_from_slice(&mz.to_be_bytes());
        bytes.extend_from_slice(&(*intensity as f64).to_be_bytes());
    }
    encode_bytes(&bytes, compression)
}

/// Decode interleaved (m/z, intensity) pairs in network byte order
pub fn decode_network_order_pairs(
    text: &[u8],
    dtype: BinaryDataArrayType,
    compression: BinaryCompressionType,
) -> io::Result<Vec<(f64, f32)>> {
    let bytes = decode_bytes(text, compression)?;
    let width = dtype.size_of();
    if bytes.len() % (width * 2) != 0 {
        return Err(invalid_data(format!(
            "{} bytes is not a whole number of {dtype:?} pairs",
            bytes.len()
        )));
    }
    let read_value = |chunk: &[u8]| -> f64 {
        match dtype {
            BinaryDataArrayType::Float32 => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(chunk);
                f32::from_be_bytes(buf) as f64
            }
            BinaryDataArrayType::Float64 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(chunk);
                f64::from_be_bytes(buf)
            }
        }
    };
    Ok(bytes
        .chunks_exact(width * 2)
        .map(|pair| (read_value(&pair[..width]), read_value(&pair[width..]) as f32))
        .collect())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_zlib_array() -> io::Result<()> {
        let values = vec![100.5f64, 200.25, 300.125];
        let text = encode_array(&values, BinaryCompressionType::Zlib)?;
        let decoded = decode_array(
            text.as_bytes(),
            BinaryDataArrayType::Float64,
            BinaryCompressionType::Zlib,
        )?;
        assert_eq!(decoded, values);

        let text = encode_array(&[1.5f32, 2.5], BinaryCompressionType::NoCompression)?;
        let decoded = decode_array(
            text.as_bytes(),
            BinaryDataArrayType::Float32,
            BinaryCompressionType::NoCompression,
        )?;
        assert_eq!(decoded, vec![1.5, 2.5]);
        Ok(())
    }

    #[test]
    fn test_network_order_pairs() -> io::Result<()> {
        let pairs = vec![(150.0, 10.0f32), (250.5, 20.5)];
        let text = encode_network_order_pairs(&pairs, BinaryCompressionType::NoCompression)?;
        let decoded = decode_network_order_pairs(
            text.as_bytes(),
            BinaryDataArrayType::Float64,
            BinaryCompressionType::NoCompression,
        )?;
        assert_eq!(decoded, pairs);

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&150.0f32.to_be_bytes());
        bytes.extend_from_slice(&10.0f32.to_be_bytes());
        let text = encode_bytes(&bytes, BinaryCompressionType::Zlib)?;
        let decoded = decode_network_order_pairs(
            text.as_bytes(),
            BinaryDataArrayType::Float32,
            BinaryCompressionType::Zlib,
        )?;
        assert_eq!(decoded, vec![(150.0, 10.0)]);
        Ok(())
    }

    #[test]
    fn test_empty_and_malformed() {
        assert!(decode_bytes(b"", BinaryCompressionType::Zlib).unwrap().is_empty());
        assert!(decode_array(
            b"AAAA",
            BinaryDataArrayType::Float64,
            BinaryCompressionType::NoCompression
        )
        .is_err());
    }
}

use std::io::{self, prelude::*};
use std::path;

use flate2::read::MultiGzDecoder;

pub fn is_gzipped(header: &[u8]) -> bool {
    header.starts_with(b"\x1f\x8b")
}

/// Check whether `path` ends in `.gz`, returning the path with that extension removed
pub fn is_gzipped_extension(path: path::PathBuf) -> (bool, path::PathBuf) {
    if let Some(ext) = path.extension() {
        if ext.to_ascii_lowercase() == "gz" {
            (true, path.with_extension(""))
        } else {
            (false, path)
        }
    } else {
        (false, path)
    }
}

/// Decompress an entire gzip stream into memory so it can be read with random access
pub fn decompress_to_cursor<R: io::Read>(stream: R) -> io::Result<io::Cursor<Vec<u8>>> {
    let mut decoder = MultiGzDecoder::new(stream);
    let mut buffer = Vec::new();
    decoder.read_to_end(&mut buffer)?;
    Ok(io::Cursor::new(buffer))
}

#[cfg(test)]
mod test {
    use super::*;
    use flate2::{write::GzEncoder, Compression};

    #[test]
    fn test_gzip_detection() -> io::Result<()> {
        let (gz, stripped) = is_gzipped_extension("data/run.MGF.GZ".into());
        assert!(gz);
        assert_eq!(stripped, path::PathBuf::from("data/run.MGF"));
        let (gz, _) = is_gzipped_extension("data/run.mgf".into());
        assert!(!gz);

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"BEGIN IONS\nEND IONS\n")?;
        let compressed = encoder.finish()?;
        assert!(is_gzipped(&compressed));
        let cursor = decompress_to_cursor(compressed.as_slice())?;
        assert_eq!(cursor.into_inner(), b"BEGIN IONS\nEND IONS\n");
        Ok(())
    }
}

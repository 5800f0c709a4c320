use std::fs;
use std::io::{self, prelude::*};
use std::path;

use md5::Context as MD5Context;
use md5::Digest;

/// A writable stream that keeps a running MD5 checksum and count of all bytes
#[derive(Clone)]
pub(crate) struct MD5HashingStream<T: io::Write> {
    pub stream: T,
    pub context: MD5Context,
    pub position: u64,
}

impl<T: io::Write> MD5HashingStream<T> {
    pub fn new(file: T) -> MD5HashingStream<T> {
        Self {
            stream: file,
            context: MD5Context::new(),
            position: 0,
        }
    }

    pub fn compute(&self) -> Digest {
        self.context.clone().compute()
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.stream
    }
}

impl<T: io::Write> io::Write for MD5HashingStream<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.stream.write(buf)?;
        self.context.consume(&buf[..n]);
        self.position += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

/// Compute the hex-encoded MD5 digest of the file at `path`
pub fn checksum_file(path: &path::Path) -> io::Result<String> {
    let mut checksum = MD5HashingStream::new(io::sink());
    let mut reader = io::BufReader::new(fs::File::open(path)?);
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        checksum.write_all(&buf[..n])?;
    }
    Ok(format!("{:x}", checksum.compute()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_checksum_file() -> io::Result<()> {
        let tmpdir = tempfile::tempdir()?;
        let path = tmpdir.path().join("hello.txt");
        fs::write(&path, b"hello world")?;
        assert_eq!(checksum_file(&path)?, "5eb63bbbe01eeed093cb22bb8f5acdc3");
        Ok(())
    }
}

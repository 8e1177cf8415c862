//! Random-access byte sources a finder can query in place.

use std::fs::File;
use std::io;
use std::sync::Arc;

/// A read-only byte source addressed by absolute offset.
///
/// This is the only contract a [`Finder`](super::finder::Finder) consumes:
/// fill `buf` with bytes starting at `offset` and report how many were
/// copied, with `0` meaning end of source. Implementations must not keep
/// cursor state — concurrent readers issue interleaved calls.
pub trait ReadAt {
    /// Reads bytes at `offset` into `buf`, returning the number read.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;
}

impl ReadAt for [u8] {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if offset >= self.len() as u64 {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(self.len() - start);
        buf[..n].copy_from_slice(&self[start..start + n]);
        Ok(n)
    }
}

impl ReadAt for Vec<u8> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.as_slice().read_at(offset, buf)
    }
}

impl<T: ReadAt + ?Sized> ReadAt for &T {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_at(offset, buf)
    }
}

#[cfg(unix)]
impl ReadAt for File {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(self, buf, offset)
    }
}

#[cfg(windows)]
impl ReadAt for File {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        std::os::windows::fs::FileExt::seek_read(self, buf, offset)
    }
}

/// The byte source backing finders produced by this crate.
///
/// [`Builder::finish`](super::builder::Builder::finish) hands back a finder
/// over owned bytes; [`Finder::load`](super::finder::Finder::load) hands
/// back one over a memory map when the `mmap` feature is enabled, or over
/// a buffered copy of the file otherwise.
pub enum Source {
    /// An owned, shareable in-memory image.
    Bytes(Arc<[u8]>),
    /// A memory-mapped file; queries fault pages in transparently.
    #[cfg(feature = "mmap")]
    Mmap(memmap2::Mmap),
}

impl Source {
    pub(crate) fn bytes(bytes: Arc<[u8]>) -> Self {
        Source::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Source {
    fn from(bytes: Vec<u8>) -> Self {
        Source::Bytes(bytes.into())
    }
}

impl ReadAt for Source {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Source::Bytes(bytes) => bytes[..].read_at(offset, buf),
            #[cfg(feature = "mmap")]
            Source::Mmap(map) => map[..].read_at(offset, buf),
        }
    }
}

/// Fills `buf` completely from `offset`, failing on a short source.
pub(crate) fn read_exact_at<S: ReadAt + ?Sized>(
    source: &S,
    offset: u64,
    buf: &mut [u8],
) -> io::Result<()> {
    let mut done = 0;
    while done < buf.len() {
        let n = source.read_at(offset + done as u64, &mut buf[done..])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "byte source ended before the declared image size",
            ));
        }
        done += n;
    }
    Ok(())
}

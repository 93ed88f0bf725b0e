// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Big-endian length-prefixed vectors, as used by the TLS presentation
//! language ([RFC 5246 section 4.3](https://datatracker.ietf.org/doc/html/rfc5246#section-4.3)).
//!
//! A vector declared as `opaque data<0..2^24-1>` is written with a 3-byte
//! length prefix, `opaque data<0..2^16-1>` with a 2-byte prefix, and so on.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Error, ErrorKind, Read, Write};
use std::marker::Sized;

/// Returns the largest length representable with an `nbytes`-wide prefix.
///
/// # Panics
///
/// Panics unless `1 <= nbytes <= 8`.
#[must_use]
pub fn max_length(nbytes: usize) -> u64 {
    assert!((1..=8).contains(&nbytes), "invalid prefix width {nbytes}");
    if nbytes == 8 {
        u64::MAX
    } else {
        (1u64 << (8 * nbytes)) - 1
    }
}

pub trait ReadLengthPrefixedBytesExt: Read {
    /// Read big-endian length-prefixed bytes from the reader.
    ///
    /// # Errors
    ///
    /// Returns the same errors as
    /// [`Read::read_exact`](https://doc.rust-lang.org/std/io/trait.Read.html#method.read_exact),
    /// or `InvalidData` if the length prefix does not fit in memory.
    ///
    /// # Panics
    ///
    /// `read_uint` requires that `1 <= nbytes <= 8`, and will panic otherwise.
    #[inline]
    fn read_length_prefixed(&mut self, nbytes: usize) -> std::io::Result<Vec<u8>> {
        let length = self.read_uint::<BigEndian>(nbytes)?;
        let length = usize::try_from(length)
            .map_err(|_| Error::new(ErrorKind::InvalidData, "length prefix overflows usize"))?;
        let mut buffer = Vec::new();
        Read::take(&mut *self, length as u64).read_to_end(&mut buffer)?;
        if buffer.len() != length {
            return Err(Error::from(ErrorKind::UnexpectedEof));
        }
        Ok(buffer)
    }
}

/// All types that implement `Read` get methods defined in
/// `ReadLengthPrefixedBytesExt` for free.
impl<R: Read + ?Sized> ReadLengthPrefixedBytesExt for R {}

pub trait WriteLengthPrefixedBytesExt: Write {
    /// Write big-endian length-prefixed bytes to the writer.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `data` is too long for an `nbytes`-wide
    /// prefix, and otherwise the same errors as
    /// [`Write::write_all`](https://doc.rust-lang.org/std/io/trait.Write.html#method.write_all).
    ///
    /// # Panics
    ///
    /// Panics unless `1 <= nbytes <= 8`.
    #[inline]
    fn write_length_prefixed(&mut self, data: &[u8], nbytes: usize) -> std::io::Result<()> {
        let length = data.len() as u64;
        if length > max_length(nbytes) {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("{length} bytes do not fit a {nbytes}-byte length prefix"),
            ));
        }
        self.write_uint::<BigEndian>(length, nbytes)?;
        self.write_all(data)
    }
}

/// All types that implement `Write` get methods defined in
/// `WriteLengthPrefixedBytesExt` for free.
impl<W: Write + ?Sized> WriteLengthPrefixedBytesExt for W {}

//! Binary codec for keys and values.
//!
//! The serialized tree stores keys and values back to back with no framing
//! of its own, so every storable type defines its own byte form. Integers
//! use fixed-width little-endian encoding; strings and byte vectors are
//! varint-length-prefixed.

use std::io::{self, Read, Write};

use super::varint::{read_varint, write_varint};

/// A type that can be written to and read back from a binary stream.
pub trait Datum: Sized {
    /// Write this value to the stream
    fn write_to(&self, out: &mut impl Write) -> io::Result<()>;

    /// Read one value from the stream
    fn read_from(input: &mut impl Read) -> io::Result<Self>;
}

macro_rules! int_datum {
    ($($t:ty),*) => {
        $(
            impl Datum for $t {
                fn write_to(&self, out: &mut impl Write) -> io::Result<()> {
                    out.write_all(&self.to_le_bytes())
                }

                fn read_from(input: &mut impl Read) -> io::Result<Self> {
                    let mut buf = [0u8; std::mem::size_of::<$t>()];
                    input.read_exact(&mut buf)?;
                    Ok(<$t>::from_le_bytes(buf))
                }
            }
        )*
    };
}

int_datum!(i32, i64, u32, u64);

impl Datum for Vec<u8> {
    fn write_to(&self, out: &mut impl Write) -> io::Result<()> {
        write_varint(out, self.len() as u64)?;
        out.write_all(self)
    }

    fn read_from(input: &mut impl Read) -> io::Result<Self> {
        let len = read_varint(input)? as usize;
        let mut buf = vec![0u8; len];
        input.read_exact(&mut buf)?;
        Ok(buf)
    }
}

impl Datum for String {
    fn write_to(&self, out: &mut impl Write) -> io::Result<()> {
        write_varint(out, self.len() as u64)?;
        out.write_all(self.as_bytes())
    }

    fn read_from(input: &mut impl Read) -> io::Result<Self> {
        let bytes = Vec::<u8>::read_from(input)?;
        String::from_utf8(bytes)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "string is not valid UTF-8"))
    }
}

//! Single-byte-tag BER-TLV encoding into fixed capacity buffers.
//!
//! Writes either land completely or not at all: when the remaining
//! capacity cannot hold the whole triple, the buffer is left untouched.

use heapless::Vec;

/// The buffer cannot hold the value that was about to be written.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BufferFull;

fn length_len(len: usize) -> Result<usize, BufferFull> {
    match len {
        0..=0x7f => Ok(1),
        0x80..=0xff => Ok(2),
        _ => Err(BufferFull),
    }
}

/// Appends `tag`, the length of `value` and `value` itself.
///
/// Returns the number of bytes written.
pub fn append_array<const N: usize>(
    buffer: &mut Vec<u8, N>,
    tag: u8,
    value: &[u8],
) -> Result<usize, BufferFull> {
    let total = 1 + length_len(value.len())? + value.len();
    if buffer.capacity() - buffer.len() < total {
        return Err(BufferFull);
    }

    buffer.push(tag).map_err(|_| BufferFull)?;
    if value.len() > 0x7f {
        buffer.push(0x81).map_err(|_| BufferFull)?;
    }
    buffer.push(value.len() as u8).map_err(|_| BufferFull)?;
    buffer.extend_from_slice(value).map_err(|_| BufferFull)?;
    Ok(total)
}

/// Appends a TLV whose value is the single byte `value`.
pub fn append_integer<const N: usize>(
    buffer: &mut Vec<u8, N>,
    tag: u8,
    value: u8,
) -> Result<usize, BufferFull> {
    append_array(buffer, tag, &[value])
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Malformed;

/// Walks a sequence of TLVs with single-byte tags.
pub struct Reader<'a> {
    input: untrusted::Reader<'a>,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            input: untrusted::Reader::new(untrusted::Input::from(bytes)),
        }
    }

    fn read_length(&mut self) -> Result<usize, untrusted::EndOfInput> {
        match self.input.read_byte()? {
            0x81 => Ok(self.input.read_byte()? as usize),
            short => Ok(short as usize),
        }
    }

    /// Reads the next `(tag, value)` pair, `None` at the end of input.
    pub fn next_tlv(&mut self) -> Option<Result<(u8, &'a [u8]), Malformed>> {
        if self.input.at_end() {
            return None;
        }
        let mut read = || -> Result<(u8, &'a [u8]), untrusted::EndOfInput> {
            let tag = self.input.read_byte()?;
            let len = self.read_length()?;
            let value = self.input.read_bytes(len)?;
            Ok((tag, value.as_slice_less_safe()))
        };
        Some(read().map_err(|_| Malformed))
    }
}

impl<'a> Iterator for Reader<'a> {
    type Item = Result<(u8, &'a [u8]), Malformed>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_tlv()
    }
}

//! Minimal CDR (Common Data Representation) codec.
//!
//! Primitives are aligned on their natural size, measured from the start of
//! the enclosing buffer. Encapsulations are nested buffers whose first octet
//! selects their byte order and whose alignment restarts at zero.

use super::IorError;

pub(crate) struct CdrReader<'a> {
    buf: &'a [u8],
    pos: usize,
    little_endian: bool,
}

impl<'a> CdrReader<'a> {
    /// Open an encapsulation: the first octet is the byte-order flag.
    pub(crate) fn encapsulation(buf: &'a [u8]) -> Result<Self, IorError> {
        let mut reader = Self {
            buf,
            pos: 0,
            little_endian: false,
        };
        reader.little_endian = reader.read_bool()?;
        Ok(reader)
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], IorError> {
        if len > self.remaining() {
            return Err(IorError::Truncated {
                offset: self.pos,
                needed: len,
            });
        }
        let out = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    fn align(&mut self, n: usize) -> Result<(), IorError> {
        let pad = (n - self.pos % n) % n;
        self.take(pad).map(|_| ())
    }

    pub(crate) fn read_octet(&mut self) -> Result<u8, IorError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn read_bool(&mut self) -> Result<bool, IorError> {
        let offset = self.pos;
        match self.read_octet()? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(IorError::InvalidBoolean { offset, value }),
        }
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, IorError> {
        self.align(2)?;
        let raw = self.take(2)?;
        let bytes = [raw[0], raw[1]];
        Ok(if self.little_endian {
            u16::from_le_bytes(bytes)
        } else {
            u16::from_be_bytes(bytes)
        })
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, IorError> {
        self.align(4)?;
        let raw = self.take(4)?;
        let bytes = [raw[0], raw[1], raw[2], raw[3]];
        Ok(if self.little_endian {
            u32::from_le_bytes(bytes)
        } else {
            u32::from_be_bytes(bytes)
        })
    }

    /// Length-prefixed octet sequence.
    pub(crate) fn read_octets(&mut self) -> Result<&'a [u8], IorError> {
        let len = self.read_u32()? as usize;
        self.take(len)
    }

    /// Length-prefixed, NUL-terminated string. A zero length reads as empty.
    pub(crate) fn read_string(&mut self) -> Result<String, IorError> {
        let raw = self.read_octets()?;
        let text = match raw.split_last() {
            Some((0, body)) => body,
            Some(_) => {
                return Err(IorError::Marshal("string is not NUL terminated".into()));
            }
            None => raw,
        };
        Ok(String::from_utf8_lossy(text).into_owned())
    }

    /// Sequence length, checked against what the buffer can still hold.
    pub(crate) fn read_sequence_len(&mut self, min_element_size: usize) -> Result<usize, IorError> {
        let offset = self.pos;
        let len = self.read_u32()? as usize;
        if len.saturating_mul(min_element_size) > self.remaining() {
            return Err(IorError::Truncated {
                offset,
                needed: len.saturating_mul(min_element_size),
            });
        }
        Ok(len)
    }
}

pub(crate) struct CdrWriter {
    buf: Vec<u8>,
    little_endian: bool,
}

impl CdrWriter {
    /// Start an encapsulation with the given byte order.
    pub(crate) fn encapsulation(little_endian: bool) -> Self {
        let mut writer = Self {
            buf: Vec::new(),
            little_endian,
        };
        writer.write_octet(u8::from(little_endian));
        writer
    }

    fn align(&mut self, n: usize) {
        while self.buf.len() % n != 0 {
            self.buf.push(0);
        }
    }

    pub(crate) fn write_octet(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub(crate) fn write_u16(&mut self, value: u16) {
        self.align(2);
        let bytes = if self.little_endian {
            value.to_le_bytes()
        } else {
            value.to_be_bytes()
        };
        self.buf.extend_from_slice(&bytes);
    }

    pub(crate) fn write_u32(&mut self, value: u32) {
        self.align(4);
        let bytes = if self.little_endian {
            value.to_le_bytes()
        } else {
            value.to_be_bytes()
        };
        self.buf.extend_from_slice(&bytes);
    }

    pub(crate) fn write_octets(&mut self, data: &[u8]) {
        self.write_u32(data.len() as u32);
        self.buf.extend_from_slice(data);
    }

    pub(crate) fn write_string(&mut self, value: &str) {
        self.write_u32(value.len() as u32 + 1);
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.push(0);
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

//! Explicit little-endian binary codec used for every on-disk and in-cache
//! blob (vectorizer, fuzzy index, bundle). Replaces the pickle format used
//! upstream with something portable and auditable.

use crate::error::IndexError;

/// Append-only byte writer with length-prefixed helpers.
#[derive(Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Writes `bytes.len()` as a u32 length prefix, then the bytes themselves.
    pub fn write_bytes_lp(&mut self, bytes: &[u8]) -> Result<(), IndexError> {
        let len: u32 = bytes
            .len()
            .try_into()
            .map_err(|_| IndexError::Unserializable("section exceeds u32::MAX bytes".into()))?;
        self.write_u32(len);
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    pub fn write_str_lp(&mut self, s: &str) -> Result<(), IndexError> {
        self.write_bytes_lp(s.as_bytes())
    }

    /// Writes `section`'s own bytes prefixed by their total length, so the
    /// caller can skip over sub-blobs it doesn't need to parse yet.
    pub fn write_section_lp(&mut self, section: &[u8]) -> Result<(), IndexError> {
        self.write_bytes_lp(section)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor-based reader matching [`Writer`]'s layout.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], IndexError> {
        if self.pos + n > self.buf.len() {
            return Err(IndexError::Unserializable("unexpected end of blob".into()));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u32(&mut self) -> Result<u32, IndexError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn read_u64(&mut self) -> Result<u64, IndexError> {
        let bytes = self.take(8)?;
        Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn read_i32(&mut self) -> Result<i32, IndexError> {
        let bytes = self.take(4)?;
        Ok(i32::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn read_f64(&mut self) -> Result<f64, IndexError> {
        let bytes = self.take(8)?;
        Ok(f64::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn read_f32(&mut self) -> Result<f32, IndexError> {
        let bytes = self.take(4)?;
        Ok(f32::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn read_bytes_lp(&mut self) -> Result<&'a [u8], IndexError> {
        let len = self.read_u32()? as usize;
        self.take(len)
    }

    pub fn read_str_lp(&mut self) -> Result<String, IndexError> {
        let bytes = self.read_bytes_lp()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| IndexError::Unserializable(format!("invalid utf-8: {e}")))
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_scalars() {
        let mut w = Writer::new();
        w.write_u32(42);
        w.write_u64(u64::MAX);
        w.write_i32(-7);
        w.write_f64(1.5);
        let bytes = w.into_bytes();

        let mut r = Reader::new(&bytes);
        assert_eq!(r.read_u32().unwrap(), 42);
        assert_eq!(r.read_u64().unwrap(), u64::MAX);
        assert_eq!(r.read_i32().unwrap(), -7);
        assert_eq!(r.read_f64().unwrap(), 1.5);
        assert!(r.is_empty());
    }

    #[test]
    fn round_trips_length_prefixed_strings() {
        let mut w = Writer::new();
        w.write_str_lp("hello").unwrap();
        w.write_str_lp("").unwrap();
        let bytes = w.into_bytes();

        let mut r = Reader::new(&bytes);
        assert_eq!(r.read_str_lp().unwrap(), "hello");
        assert_eq!(r.read_str_lp().unwrap(), "");
    }

    #[test]
    fn truncated_blob_is_unserializable() {
        let mut r = Reader::new(&[0, 0]);
        assert!(r.read_u32().is_err());
    }
}

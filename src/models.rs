//! Tagged record types for the per-artist bundle: every payload is a named,
//! typed struct rather than an ad hoc dict with heterogeneous fields.

use rustc_hash::FxHashMap;

use crate::codec::{Reader, Writer};
use crate::error::IndexError;
use crate::fuzzy_index::{FuzzyIndex, Payload};

/// One immutable input row from the mapping store.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingRow {
    pub artist_credit_id: u32,
    pub artist_credit_name: String,
    pub artist_credit_sortname: String,
    pub release_id: u32,
    pub release_name: String,
    pub recording_id: u32,
    pub recording_name: String,
    pub score: i32,
}

/// One `(recording_id, release_id, score)` triple sharing an encoded
/// recording name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingEntry {
    pub recording_id: u32,
    pub release_id: u32,
    pub score: i32,
}

/// Payload of a recording document: every source row whose recording name
/// encodes to this document's text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordingPayload(pub Vec<RecordingEntry>);

impl Payload for RecordingPayload {
    fn encode(&self, w: &mut Writer) -> Result<(), IndexError> {
        w.write_u32(self.0.len() as u32);
        for entry in &self.0 {
            w.write_u32(entry.recording_id);
            w.write_u32(entry.release_id);
            w.write_i32(entry.score);
        }
        Ok(())
    }

    fn decode(r: &mut Reader) -> Result<Self, IndexError> {
        let n = r.read_u32()? as usize;
        let mut entries = Vec::with_capacity(n);
        for _ in 0..n {
            let recording_id = r.read_u32()?;
            let release_id = r.read_u32()?;
            let score = r.read_i32()?;
            entries.push(RecordingEntry { recording_id, release_id, score });
        }
        Ok(RecordingPayload(entries))
    }
}

/// Payload of a release document: every `(release_id, score)` pair sharing
/// an encoded release name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReleasePayload(pub Vec<(u32, i32)>);

impl Payload for ReleasePayload {
    fn encode(&self, w: &mut Writer) -> Result<(), IndexError> {
        w.write_u32(self.0.len() as u32);
        for &(release_id, score) in &self.0 {
            w.write_u32(release_id);
            w.write_i32(score);
        }
        Ok(())
    }

    fn decode(r: &mut Reader) -> Result<Self, IndexError> {
        let n = r.read_u32()? as usize;
        let mut entries = Vec::with_capacity(n);
        for _ in 0..n {
            let release_id = r.read_u32()?;
            let score = r.read_i32()?;
            entries.push((release_id, score));
        }
        Ok(ReleasePayload(entries))
    }
}

pub type RecordingIndex = FuzzyIndex<RecordingPayload>;
pub type ReleaseIndex = FuzzyIndex<ReleasePayload>;

/// The per-artist artifact persisted in the cache store: two fuzzy indexes
/// plus the recording->release cross-reference. `None` in both index slots
/// means "this artist has no usable textual data" (the empty sentinel).
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    pub recording_index: Option<RecordingIndex>,
    pub release_index: Option<ReleaseIndex>,
    pub recording_releases: FxHashMap<u32, Vec<u32>>,
}

impl Bundle {
    pub fn empty_sentinel() -> Self {
        Self::default()
    }

    pub fn is_empty_sentinel(&self) -> bool {
        self.recording_index.is_none() && self.release_index.is_none()
    }

    /// Concatenation `recording_index_blob || release_index_blob ||
    /// recording_releases_blob`, each length-prefixed.
    pub fn serialize(&self) -> Result<Vec<u8>, IndexError> {
        let mut w = Writer::new();

        match &self.recording_index {
            Some(idx) => w.write_section_lp(&idx.serialize()?)?,
            None => w.write_section_lp(&[])?,
        }
        match &self.release_index {
            Some(idx) => w.write_section_lp(&idx.serialize()?)?,
            None => w.write_section_lp(&[])?,
        }

        let mut xref_buf = Writer::new();
        xref_buf.write_u32(self.recording_releases.len() as u32);
        for (&recording_id, release_ids) in &self.recording_releases {
            xref_buf.write_u32(recording_id);
            xref_buf.write_u32(release_ids.len() as u32);
            for &release_id in release_ids {
                xref_buf.write_u32(release_id);
            }
        }
        w.write_section_lp(&xref_buf.into_bytes())?;

        Ok(w.into_bytes())
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, IndexError> {
        let mut r = Reader::new(bytes);

        let recording_bytes = r.read_bytes_lp()?;
        let recording_index = if recording_bytes.is_empty() {
            None
        } else {
            Some(RecordingIndex::deserialize(recording_bytes)?)
        };

        let release_bytes = r.read_bytes_lp()?;
        let release_index = if release_bytes.is_empty() {
            None
        } else {
            Some(ReleaseIndex::deserialize(release_bytes)?)
        };

        let xref_bytes = r.read_bytes_lp()?;
        let mut xr = Reader::new(xref_bytes);
        let n = xr.read_u32()? as usize;
        let mut recording_releases = FxHashMap::default();
        for _ in 0..n {
            let recording_id = xr.read_u32()?;
            let count = xr.read_u32()? as usize;
            let mut release_ids = Vec::with_capacity(count);
            for _ in 0..count {
                release_ids.push(xr.read_u32()?);
            }
            recording_releases.insert(recording_id, release_ids);
        }

        Ok(Self { recording_index, release_index, recording_releases })
    }
}

//! Trigram TF-IDF vectorizer: fits IDF weights from a corpus of encoded
//! strings, then transforms a string into an L2-normalized sparse vector.
//! Scikit-learn-compatible convention: sublinear TF off, smoothed IDF,
//! L2 row normalization, `min_df = 1`.

use rustc_hash::FxHashMap;

use crate::codec::{Reader, Writer};
use crate::error::IndexError;

/// A sparse vector: (vocabulary column index, weight) pairs, sorted by
/// column so callers can merge/intersect without re-sorting.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseVector {
    pub entries: Vec<(u32, f32)>,
}

impl SparseVector {
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let mut i = 0;
        let mut j = 0;
        let mut sum = 0.0f32;
        while i < self.entries.len() && j < other.entries.len() {
            let (ca, wa) = self.entries[i];
            let (cb, wb) = other.entries[j];
            match ca.cmp(&cb) {
                std::cmp::Ordering::Equal => {
                    sum += wa * wb;
                    i += 1;
                    j += 1;
                }
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
            }
        }
        sum
    }
}

/// Returns the trigram multiset of `s` in order. Strings shorter than 3
/// bytes yield no trigrams.
pub fn trigrams(s: &str) -> Vec<&str> {
    let bytes = s.as_bytes();
    if bytes.len() < 3 {
        return Vec::new();
    }
    (0..=bytes.len() - 3).map(|i| &s[i..i + 3]).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vectorizer {
    /// trigram -> column index, in first-occurrence (insertion) order.
    vocabulary: Vec<String>,
    lookup: FxHashMap<String, u32>,
    idf: Vec<f32>,
}

impl Vectorizer {
    /// Fits vocabulary + IDF weights over `documents`. Fails with
    /// `EmptyVocabulary` if no document yields a single trigram.
    pub fn fit<S: AsRef<str>>(documents: &[S]) -> Result<Self, IndexError> {
        let mut vocabulary: Vec<String> = Vec::new();
        let mut lookup: FxHashMap<String, u32> = FxHashMap::default();
        let mut doc_freq: Vec<u32> = Vec::new();

        for doc in documents {
            let mut seen_in_doc: FxHashMap<&str, bool> = FxHashMap::default();
            for tri in trigrams(doc.as_ref()) {
                if seen_in_doc.insert(tri, true).is_some() {
                    continue;
                }
                match lookup.get(tri) {
                    Some(&col) => doc_freq[col as usize] += 1,
                    None => {
                        let col = vocabulary.len() as u32;
                        vocabulary.push(tri.to_string());
                        lookup.insert(tri.to_string(), col);
                        doc_freq.push(1);
                    }
                }
            }
        }

        if vocabulary.is_empty() {
            return Err(IndexError::EmptyVocabulary);
        }

        let n = documents.len() as f64;
        let idf: Vec<f32> = doc_freq
            .iter()
            .map(|&df| (((1.0 + n) / (1.0 + df as f64)).ln() + 1.0) as f32)
            .collect();

        Ok(Self { vocabulary, lookup, idf })
    }

    /// Transforms `text` into a sparse, L2-normalized vector using the
    /// already-fit vocabulary. Trigrams outside the vocabulary are dropped.
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut counts: FxHashMap<u32, f32> = FxHashMap::default();
        for tri in trigrams(text) {
            if let Some(&col) = self.lookup.get(tri) {
                *counts.entry(col).or_insert(0.0) += 1.0;
            }
        }

        let mut entries: Vec<(u32, f32)> = counts
            .into_iter()
            .map(|(col, tf)| (col, tf * self.idf[col as usize]))
            .collect();
        entries.sort_unstable_by_key(|(col, _)| *col);

        let norm = entries.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for (_, w) in entries.iter_mut() {
                *w /= norm;
            }
        }

        SparseVector { entries }
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn serialize(&self) -> Result<Vec<u8>, IndexError> {
        let mut w = Writer::new();
        w.write_u32(self.vocabulary.len() as u32);
        for (tri, &weight) in self.vocabulary.iter().zip(self.idf.iter()) {
            w.write_bytes_lp(tri.as_bytes())?;
            w.write_f32(weight);
        }
        Ok(w.into_bytes())
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, IndexError> {
        let mut r = Reader::new(bytes);
        let count = r.read_u32()? as usize;
        let mut vocabulary = Vec::with_capacity(count);
        let mut lookup = FxHashMap::default();
        let mut idf = Vec::with_capacity(count);
        for col in 0..count {
            let tri_bytes = r.read_bytes_lp()?;
            let tri = String::from_utf8(tri_bytes.to_vec())
                .map_err(|e| IndexError::Unserializable(format!("invalid utf-8 trigram: {e}")))?;
            let weight = r.read_f32()?;
            lookup.insert(tri.clone(), col as u32);
            vocabulary.push(tri);
            idf.push(weight);
        }
        Ok(Self { vocabulary, lookup, idf })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigrams_of_short_string_is_empty() {
        assert!(trigrams("ab").is_empty());
        assert!(trigrams("").is_empty());
    }

    #[test]
    fn trigrams_basic() {
        assert_eq!(trigrams("abcd"), vec!["abc", "bcd"]);
    }

    #[test]
    fn fit_on_empty_corpus_fails() {
        let docs: Vec<String> = vec![];
        assert!(matches!(Vectorizer::fit(&docs), Err(IndexError::EmptyVocabulary)));
    }

    #[test]
    fn fit_on_all_short_strings_fails() {
        let docs = vec!["a".to_string(), "ab".to_string()];
        assert!(matches!(Vectorizer::fit(&docs), Err(IndexError::EmptyVocabulary)));
    }

    #[test]
    fn transform_is_l2_normalized() {
        let docs = vec!["cometogether".to_string(), "abbeyroad".to_string()];
        let vec = Vectorizer::fit(&docs).unwrap();
        let v = vec.transform("cometogether");
        let norm: f32 = v.entries.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn transform_drops_out_of_vocabulary_trigrams() {
        let docs = vec!["cometogether".to_string()];
        let vec = Vectorizer::fit(&docs).unwrap();
        let v = vec.transform("zzzzzzzzzz");
        assert!(v.entries.is_empty());
    }

    #[test]
    fn serialize_round_trips() {
        let docs = vec!["cometogether".to_string(), "abbeyroad".to_string()];
        let vec = Vectorizer::fit(&docs).unwrap();
        let bytes = vec.serialize().unwrap();
        let restored = Vectorizer::deserialize(&bytes).unwrap();
        assert_eq!(vec, restored);
    }

    #[test]
    fn identical_text_has_dot_product_near_one() {
        let docs = vec!["cometogether".to_string(), "abbeyroad".to_string()];
        let vec = Vectorizer::fit(&docs).unwrap();
        let a = vec.transform("cometogether");
        let b = vec.transform("cometogether");
        assert!((a.dot(&b) - 1.0).abs() < 1e-4);
    }
}

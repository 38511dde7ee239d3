//! Sparse inverted index over TF-IDF vectors supporting top-K
//! nearest-neighbor search by dot product. State machine: `Empty -> Built ->
//! (Saved <-> Loaded)`, modeled here simply as "exists only once built."

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;

use crate::codec::{Reader, Writer};
use crate::error::IndexError;
use crate::vectorizer::Vectorizer;

/// Number of nearest neighbors retrieved internally before confidence
/// filtering.
pub const TOP_K: usize = 500;

/// A document payload that can round-trip through the binary codec.
pub trait Payload: Sized + Clone {
    fn encode(&self, w: &mut Writer) -> Result<(), IndexError>;
    fn decode(r: &mut Reader) -> Result<Self, IndexError>;
}

#[derive(Debug, Clone)]
struct Document<P> {
    text: String,
    payload: P,
}

/// One ranked search result.
#[derive(Debug, Clone)]
pub struct SearchHit<P> {
    pub text: String,
    pub id: u32,
    pub confidence: f32,
    pub payload: P,
}

#[derive(Debug, Clone)]
pub struct FuzzyIndex<P> {
    vectorizer: Vectorizer,
    postings: FxHashMap<u32, Vec<(u32, f32)>>,
    documents: Vec<Document<P>>,
}

/// Entry used in the bounded min-heap during top-K retrieval. Ordered by
/// score ascending so the smallest score is always at the heap's root and
/// gets evicted first once the heap exceeds `TOP_K`.
struct Candidate {
    doc_id: u32,
    score: f32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score
    }
}
impl Eq for Candidate {}
impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other.score.partial_cmp(&self.score).unwrap_or(Ordering::Equal)
    }
}

impl<P: Payload> FuzzyIndex<P> {
    /// Builds an index from `(text, payload)` pairs. The position of each
    /// pair in `documents` becomes its `id`. Fails with `EmptyInput` if
    /// `documents` is empty.
    pub fn build(documents: Vec<(String, P)>) -> Result<Self, IndexError> {
        if documents.is_empty() {
            return Err(IndexError::EmptyInput);
        }

        let texts: Vec<&str> = documents.iter().map(|(t, _)| t.as_str()).collect();
        let vectorizer = Vectorizer::fit(&texts)?;

        let mut postings: FxHashMap<u32, Vec<(u32, f32)>> = FxHashMap::default();
        let mut stored_documents = Vec::with_capacity(documents.len());
        for (doc_id, (text, payload)) in documents.into_iter().enumerate() {
            let vector = vectorizer.transform(&text);
            for (col, weight) in vector.entries {
                postings.entry(col).or_default().push((doc_id as u32, weight));
            }
            stored_documents.push(Document { text, payload });
        }

        Ok(Self { vectorizer, postings, documents: stored_documents })
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Searches for the `TOP_K` nearest documents to `query` by dot product,
    /// filtering out anything below `min_confidence`. Results are sorted by
    /// descending confidence.
    pub fn search(&self, query: &str, min_confidence: f32) -> Vec<SearchHit<P>> {
        let query_vector = self.vectorizer.transform(query);
        if query_vector.entries.is_empty() {
            return Vec::new();
        }

        let mut scores: FxHashMap<u32, f32> = FxHashMap::default();
        for &(col, qw) in &query_vector.entries {
            if let Some(postings) = self.postings.get(&col) {
                for &(doc_id, dw) in postings {
                    *scores.entry(doc_id).or_insert(0.0) += qw * dw;
                }
            }
        }

        let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(TOP_K + 1);
        for (doc_id, score) in scores {
            heap.push(Candidate { doc_id, score });
            if heap.len() > TOP_K {
                heap.pop();
            }
        }

        let mut ranked: Vec<Candidate> = heap.into_vec();
        ranked.sort_unstable_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        ranked
            .into_iter()
            .map(|c| {
                let confidence = c.score.abs();
                let doc = &self.documents[c.doc_id as usize];
                (confidence, c.doc_id, doc)
            })
            .filter(|(confidence, _, _)| *confidence >= min_confidence)
            .map(|(confidence, id, doc)| SearchHit {
                text: doc.text.clone(),
                id,
                confidence,
                payload: doc.payload.clone(),
            })
            .collect()
    }

    pub fn serialize(&self) -> Result<Vec<u8>, IndexError> {
        let mut w = Writer::new();
        w.write_section_lp(&self.vectorizer.serialize()?)?;

        let mut postings_buf = Writer::new();
        postings_buf.write_u32(self.postings.len() as u32);
        for (col, entries) in &self.postings {
            postings_buf.write_u32(*col);
            postings_buf.write_u32(entries.len() as u32);
            for &(doc_id, weight) in entries {
                postings_buf.write_u32(doc_id);
                postings_buf.write_f32(weight);
            }
        }
        w.write_section_lp(&postings_buf.into_bytes())?;

        let mut docs_buf = Writer::new();
        docs_buf.write_u32(self.documents.len() as u32);
        for doc in &self.documents {
            docs_buf.write_str_lp(&doc.text)?;
            doc.payload.encode(&mut docs_buf)?;
        }
        w.write_section_lp(&docs_buf.into_bytes())?;

        Ok(w.into_bytes())
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, IndexError> {
        let mut r = Reader::new(bytes);

        let vectorizer_bytes = r.read_bytes_lp()?;
        let vectorizer = Vectorizer::deserialize(vectorizer_bytes)?;

        let postings_bytes = r.read_bytes_lp()?;
        let mut pr = Reader::new(postings_bytes);
        let num_cols = pr.read_u32()? as usize;
        let mut postings = FxHashMap::default();
        for _ in 0..num_cols {
            let col = pr.read_u32()?;
            let num_entries = pr.read_u32()? as usize;
            let mut entries = Vec::with_capacity(num_entries);
            for _ in 0..num_entries {
                let doc_id = pr.read_u32()?;
                let weight = pr.read_f32()?;
                entries.push((doc_id, weight));
            }
            postings.insert(col, entries);
        }

        let docs_bytes = r.read_bytes_lp()?;
        let mut dr = Reader::new(docs_bytes);
        let num_docs = dr.read_u32()? as usize;
        let mut documents = Vec::with_capacity(num_docs);
        for _ in 0..num_docs {
            let text = dr.read_str_lp()?;
            let payload = P::decode(&mut dr)?;
            documents.push(Document { text, payload });
        }

        Ok(Self { vectorizer, postings, documents })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct ScorePayload(i32);

    impl Payload for ScorePayload {
        fn encode(&self, w: &mut Writer) -> Result<(), IndexError> {
            w.write_i32(self.0);
            Ok(())
        }
        fn decode(r: &mut Reader) -> Result<Self, IndexError> {
            Ok(ScorePayload(r.read_i32()?))
        }
    }

    fn sample_index() -> FuzzyIndex<ScorePayload> {
        FuzzyIndex::build(vec![
            ("cometogether".to_string(), ScorePayload(90)),
            ("abbeyroad".to_string(), ScorePayload(50)),
        ])
        .unwrap()
    }

    #[test]
    fn build_on_empty_documents_fails() {
        let result: Result<FuzzyIndex<ScorePayload>, _> = FuzzyIndex::build(vec![]);
        assert!(matches!(result, Err(IndexError::EmptyInput)));
    }

    #[test]
    fn document_ids_equal_position() {
        let idx = sample_index();
        assert_eq!(idx.documents[0].text, "cometogether");
        assert_eq!(idx.documents[1].text, "abbeyroad");
    }

    #[test]
    fn exact_match_has_high_confidence() {
        let idx = sample_index();
        let hits = idx.search("cometogether", 0.0);
        assert_eq!(hits[0].id, 0);
        assert!(hits[0].confidence > 0.95);
    }

    #[test]
    fn search_respects_min_confidence_and_ordering() {
        let idx = sample_index();
        let hits = idx.search("cometogether", 0.0);
        assert!(hits.len() <= TOP_K);
        for pair in hits.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
        for hit in &hits {
            assert!((0.0..=1.0).contains(&hit.confidence));
        }
    }

    #[test]
    fn out_of_vocabulary_query_returns_no_hits() {
        let idx = sample_index();
        assert!(idx.search("zzzzzzzzzz", 0.0).is_empty());
    }

    #[test]
    fn serialize_round_trips_search_output() {
        let idx = sample_index();
        let bytes = idx.serialize().unwrap();
        let restored = FuzzyIndex::<ScorePayload>::deserialize(&bytes).unwrap();

        for query in ["cometogether", "abbeyroad", "zzz"] {
            let before: Vec<(u32, f32)> =
                idx.search(query, 0.0).into_iter().map(|h| (h.id, h.confidence)).collect();
            let after: Vec<(u32, f32)> =
                restored.search(query, 0.0).into_iter().map(|h| (h.id, h.confidence)).collect();
            assert_eq!(before, after);
        }
    }
}

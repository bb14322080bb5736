//! Cosine-similarity lookup over a knowledge base.

use tracing::debug;

use pdfkb_shared::KnowledgeBase;

/// Score given to records whose vector length differs from the query's.
pub const MISMATCH_SCORE: f64 = -1.0;

/// One ranked record.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    pub score: f64,
}

/// Cosine similarity, or `None` when the lengths differ.
///
/// A zero vector on either side scores `0.0`.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Some(0.0);
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Rank every record against `query` and return the best `top_k`.
///
/// Ties keep knowledge-base order.
pub fn search(kb: &KnowledgeBase, query: &[f64], top_k: usize) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = kb
        .iter()
        .map(|record| SearchHit {
            id: record.id.clone(),
            text: record.text.clone(),
            score: cosine_similarity(query, &record.vector).unwrap_or(MISMATCH_SCORE),
        })
        .collect();

    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(top_k);

    debug!(candidates = kb.len(), returned = hits.len(), "ranked records");
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdfkb_shared::KbRecord;

    fn record(id: &str, vector: Vec<f64>) -> KbRecord {
        KbRecord {
            id: id.into(),
            text: format!("text of {id}"),
            vector,
        }
    }

    fn sample() -> KnowledgeBase {
        KnowledgeBase::from(vec![
            record("x", vec![1.0, 0.0]),
            record("y", vec![0.0, 1.0]),
            record("xy", vec![0.6, 0.8]),
            record("wide", vec![1.0, 0.0, 0.0]),
        ])
    }

    #[test]
    fn cosine_of_identical_is_one() {
        let v = [0.3, -0.4, 0.5];
        assert!((cosine_similarity(&v, &v).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn cosine_length_mismatch_is_none() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), None);
    }

    #[test]
    fn cosine_with_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), Some(0.0));
    }

    #[test]
    fn search_ranks_exact_match_first() {
        let hits = search(&sample(), &[0.0, 1.0], 5);
        assert_eq!(hits[0].id, "y");
        assert!((hits[0].score - 1.0).abs() < 1e-12);
        assert_eq!(hits[1].id, "xy");
    }

    #[test]
    fn search_scores_mismatched_dimensions_lowest() {
        let hits = search(&sample(), &[1.0, 0.0], 10);
        let wide = hits.iter().find(|h| h.id == "wide").unwrap();
        assert_eq!(wide.score, MISMATCH_SCORE);
        assert_eq!(hits.last().unwrap().id, "wide");
    }

    #[test]
    fn search_truncates_to_top_k() {
        assert_eq!(search(&sample(), &[1.0, 0.0], 2).len(), 2);
        assert!(search(&KnowledgeBase::new(), &[1.0, 0.0], 5).is_empty());
    }

    #[test]
    fn search_ties_keep_input_order() {
        let kb = KnowledgeBase::from(vec![
            record("first", vec![1.0, 0.0]),
            record("second", vec![1.0, 0.0]),
        ]);
        let hits = search(&kb, &[1.0, 0.0], 2);
        assert_eq!(hits[0].id, "first");
        assert_eq!(hits[1].id, "second");
    }
}

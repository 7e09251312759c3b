//! Vector similarity between skill embeddings.

use super::Embedding;

/// Cosine similarity in [-1, 1].
///
/// Returns 0.0 when either vector has zero norm or the dimensions differ, so a
/// degenerate vector never scores as a strong match.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        tracing::warn!(
            a_len = a.len(),
            b_len = b.len(),
            "embedding dimension mismatch; returning zero similarity"
        );
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Maximum entry of the `query.len() × candidate.len()` cosine matrix.
///
/// A single strong pair decides the score. Returns `None` when either side is
/// empty, since there is no pair to score.
pub fn max_pairwise_similarity(query: &[Embedding], candidate: &[Embedding]) -> Option<f32> {
    query
        .iter()
        .flat_map(|q| candidate.iter().map(move |c| cosine_similarity(q, c)))
        .reduce(f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical_vectors() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];

        let sim = cosine_similarity(&a, &b);

        assert!((sim - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_cosine_similarity_ignores_magnitude() {
        let sim = cosine_similarity(&[1.0, 1.0], &[3.0, 3.0]);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite_vectors() {
        let sim = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]);
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_handles_zero_vectors() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_cosine_similarity_dimension_mismatch() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0]);
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn test_max_pairwise_takes_best_pair_not_average() {
        let query = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let candidate = vec![vec![-1.0, 0.0], vec![0.0, 1.0]];

        let score = max_pairwise_similarity(&query, &candidate).unwrap();

        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_max_pairwise_empty_side_has_no_score() {
        let query = vec![vec![1.0, 0.0]];
        assert_eq!(max_pairwise_similarity(&query, &[]), None);
        assert_eq!(max_pairwise_similarity(&[], &query), None);
    }
}

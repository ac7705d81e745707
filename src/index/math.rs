pub fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity; 0.0 when lengths differ or either norm is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    cosine_with_norm(a, l2_norm(a), b)
}

/// Variant for scans where the query norm is computed once up front.
pub fn cosine_with_norm(query: &[f32], query_norm: f32, candidate: &[f32]) -> f32 {
    if query.len() != candidate.len() {
        return 0.0;
    }

    let candidate_norm = l2_norm(candidate);
    if query_norm == 0.0 || candidate_norm == 0.0 {
        return 0.0;
    }

    // Divide by each norm in turn so tiny norms never underflow as a product.
    let dot: f32 = query.iter().zip(candidate.iter()).map(|(x, y)| x * y).sum();
    let score = dot / query_norm / candidate_norm;
    if score.is_finite() {
        score.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

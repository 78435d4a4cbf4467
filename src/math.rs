//! Vector arithmetic shared by the index, the ranker and the profile updater.

/// Cosine similarity between two vectors.
///
/// Returns 0.0 when the lengths differ, a vector is empty, or either side has
/// zero magnitude, so callers never see NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot = dot_product(a, b);
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Dot product over the common prefix of two slices.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vectors must have same length");
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// L2 norm (magnitude) of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Euclidean distance between two vectors of equal length.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// L2-normalize in place. Zero vectors are left untouched.
pub fn normalize_in_place(v: &mut [f32]) {
    let norm = l2_norm(v);
    if norm > 0.0 {
        for x in v {
            *x /= norm;
        }
    }
}

/// Normalized copy of a vector.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let mut out = v.to_vec();
    normalize_in_place(&mut out);
    out
}

/// True when every component is exactly zero.
pub fn is_zero(v: &[f32]) -> bool {
    v.iter().all(|x| *x == 0.0)
}

/// True when every component is finite.
pub fn is_finite(v: &[f32]) -> bool {
    v.iter().all(|x| x.is_finite())
}

/// Move `current` toward `target` by `rate`: `current + rate * (target - current)`.
///
/// A negative rate moves away from the target along the same axis.
pub fn step_toward(current: &mut [f32], target: &[f32], rate: f32) {
    for (c, t) in current.iter_mut().zip(target.iter()) {
        *c += rate * (*t - *c);
    }
}

/// Rescale so the magnitude never exceeds `max_norm`.
pub fn clamp_norm(v: &mut [f32], max_norm: f32) {
    let norm = l2_norm(v);
    if norm > max_norm && norm > 0.0 {
        let scale = max_norm / norm;
        for x in v {
            *x *= scale;
        }
    }
}

/// Weighted sum `wa * a + wb * b`, normalized.
pub fn blend(a: &[f32], wa: f32, b: &[f32], wb: f32) -> Vec<f32> {
    let mut out: Vec<f32> = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| wa * x + wb * y)
        .collect();
    normalize_in_place(&mut out);
    out
}

/// Normalized centroid of a set of equal-length vectors.
///
/// Returns `None` for an empty set.
pub fn centroid<'a, I>(vectors: I) -> Option<Vec<f32>>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut iter = vectors.into_iter();
    let first = iter.next()?;
    let mut sum = first.to_vec();
    for v in iter {
        for (s, x) in sum.iter_mut().zip(v.iter()) {
            *s += x;
        }
    }
    normalize_in_place(&mut sum);
    Some(sum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical_and_opposite() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![-1.0, -2.0, -3.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_normalize_keeps_zero_vector() {
        assert_eq!(normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
        let n = normalize(&[3.0, 4.0]);
        assert!((n[0] - 0.6).abs() < 1e-6);
        assert!((n[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_step_toward_converges_and_repels() {
        let target = vec![1.0, 0.0];
        let mut v = vec![0.0, 0.0];
        step_toward(&mut v, &target, 0.5);
        assert_eq!(v, vec![0.5, 0.0]);
        step_toward(&mut v, &target, 0.5);
        assert_eq!(v, vec![0.75, 0.0]);

        let mut away = vec![0.0, 0.0];
        step_toward(&mut away, &target, -0.25);
        assert_eq!(away, vec![-0.25, 0.0]);
    }

    #[test]
    fn test_clamp_norm() {
        let mut v = vec![3.0, 4.0];
        clamp_norm(&mut v, 1.0);
        assert!((l2_norm(&v) - 1.0).abs() < 1e-6);

        let mut small = vec![0.1, 0.1];
        clamp_norm(&mut small, 1.0);
        assert_eq!(small, vec![0.1, 0.1]);
    }

    #[test]
    fn test_centroid() {
        let a = [1.0f32, 0.0];
        let b = [0.0f32, 1.0];
        let c = centroid([&a[..], &b[..]]).unwrap();
        assert!((c[0] - c[1]).abs() < 1e-6);
        assert!((l2_norm(&c) - 1.0).abs() < 1e-6);
        assert!(centroid(std::iter::empty::<&[f32]>()).is_none());
    }

    #[test]
    fn test_l2_distance() {
        assert!((l2_distance(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-6);
    }
}

//! Similarity helpers shared by the retriever and scorer.

/// Cosine similarity between two vectors, in `[-1, 1]`.
///
/// Returns 0 for zero vectors or mismatched lengths.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Normalize a hybrid-search row into a similarity in `[0, 1]`.
///
/// Policy: prefer the lexical/relevance `score` when present, else
/// `1 - min(distance, 1)`, else 0.5 when the row carried neither.
#[must_use]
pub fn normalize_similarity(score: Option<f64>, distance: Option<f64>) -> f64 {
    let raw = score.unwrap_or_else(|| distance.map_or(0.5, |d| 1.0 - d.min(1.0)));
    raw.clamp(0.0, 1.0)
}

/// Path similarity between two file paths, in `[0, 1]`.
///
/// Counts shared leading directory components (after normalizing separators
/// and dropping the filename) over the average directory depth. Symmetric,
/// and 1.0 for identical non-empty paths.
#[must_use]
pub fn path_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let dirs_a = directory_parts(a);
    let dirs_b = directory_parts(b);
    if dirs_a.is_empty() && dirs_b.is_empty() {
        // Both are bare filenames in the same (implicit) directory.
        return 1.0;
    }

    let shared = dirs_a
        .iter()
        .zip(dirs_b.iter())
        .take_while(|(x, y)| x == y)
        .count();

    #[allow(clippy::cast_precision_loss)]
    let avg_len = (dirs_a.len() + dirs_b.len()) as f64 / 2.0;
    if avg_len == 0.0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = shared as f64 / avg_len;
    ratio.clamp(0.0, 1.0)
}

/// Directory components of a path, separators normalized, filename dropped.
fn directory_parts(path: &str) -> Vec<&str> {
    let normalized = path.trim();
    let mut parts: Vec<&str> = normalized
        .split(['/', '\\'])
        .filter(|p| !p.is_empty() && *p != ".")
        .collect();
    // The final component is the filename.
    parts.pop();
    parts
}

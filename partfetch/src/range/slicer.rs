//! Boundary computation and request conversion.

/// Build the value of an HTTP `Range` header for an inclusive byte span.
///
/// The returned string doubles as the span's identifier in the checklist.
pub fn range_header(low: u64, high: u64) -> String {
    format!("bytes={}-{}", low, high)
}

/// Computes slice plans for a resource of known length.
#[derive(Debug, Clone)]
pub struct RangeSlicer {
    unit: u64,
}

impl RangeSlicer {
    /// Create a slicer with the given unit size.
    pub fn new(unit: u64) -> Self {
        Self { unit }
    }

    /// Compute the ordered boundary list for a resource.
    ///
    /// Without range support (or with slicing forced off) the whole resource
    /// is one request: `[0, content_length]`. Otherwise boundaries advance by
    /// one unit at a time, with `content_length` appended whenever the last
    /// generated value falls short of it.
    pub fn plan(&self, content_length: u64, range_supported: bool, force_single: bool) -> Vec<u64> {
        if !range_supported || force_single {
            return vec![0, content_length];
        }

        let mut boundaries = Vec::new();
        let mut cursor = 0;
        while cursor < content_length {
            boundaries.push(cursor);
            cursor += self.unit;
        }
        if boundaries.is_empty() {
            boundaries.push(0);
        }
        if *boundaries.last().unwrap_or(&0) < content_length {
            boundaries.push(content_length);
        }
        boundaries
    }

    /// Convert a boundary list into concrete `(low, high)` request pairs.
    ///
    /// In non-direct mode the first boundary is a sentinel: the first request
    /// is `(0, boundaries[1])` and every later request starts one byte past
    /// the previous boundary, so adjacent requests never overlap.
    ///
    /// In direct mode the boundaries already are exact low/high pairs (they
    /// came from a parts index) and are consumed two elements at a time.
    pub fn to_requests(boundaries: &[u64], direct: bool) -> Vec<(u64, u64)> {
        if direct {
            return boundaries
                .chunks_exact(2)
                .map(|pair| (pair[0], pair[1]))
                .collect();
        }

        let mut requests = Vec::new();
        for i in 0..boundaries.len().saturating_sub(1) {
            let low = if i == 0 { 0 } else { boundaries[i] + 1 };
            requests.push((low, boundaries[i + 1]));
        }
        requests
    }
}

//! Order statistics used by the aligner and the geometric regularizer.

/// Upper median of an integer sample: `sorted[len / 2]`.
///
/// Rectangle heights are small integers; picking an element of the sample
/// (rather than interpolating) keeps normalized heights achievable and the
/// regularizer idempotent.
pub fn median_u32(values: &[u32]) -> Option<u32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    Some(sorted[sorted.len() / 2])
}

/// Median of a float sample, averaging the two central elements for even
/// lengths.
pub fn median_f64(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("NaN in sample"));
    let n = sorted.len();
    if n % 2 == 1 {
        Some(sorted[n / 2])
    } else {
        Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
    }
}

/// Tukey quartiles: medians of the lower and upper halves of the sorted
/// sample, excluding the central element for odd lengths.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quartiles {
    /// First quartile.
    pub q1: f64,
    /// Third quartile.
    pub q3: f64,
}

impl Quartiles {
    /// The interquartile range.
    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }

    /// The lower outlier fence, `Q1 - 1.5·IQR`.
    pub fn low_fence(&self) -> f64 {
        self.q1 - 1.5 * self.iqr()
    }

    /// The upper outlier fence, `Q3 + 1.5·IQR`.
    pub fn high_fence(&self) -> f64 {
        self.q3 + 1.5 * self.iqr()
    }
}

fn median_of_sorted(sorted: &[u32]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        f64::from(sorted[n / 2])
    } else {
        f64::from(sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Compute Tukey quartiles.  Returns `None` for an empty sample; a
/// single-element sample has `q1 == q3`.
pub fn quartiles(values: &[u32]) -> Option<Quartiles> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let n = sorted.len();
    if n == 1 {
        let v = f64::from(sorted[0]);
        return Some(Quartiles { q1: v, q3: v });
    }
    let lower = &sorted[..n / 2];
    let upper = &sorted[(n + 1) / 2..];
    Some(Quartiles {
        q1: median_of_sorted(lower),
        q3: median_of_sorted(upper),
    })
}

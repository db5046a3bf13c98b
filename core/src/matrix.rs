//! Numeric building blocks shared by the processor registry: convolution,
//! elementwise ops, and the heterogeneous per-frame matrix value produced by
//! extractors (a plane, a GLCM tensor, a per-angle property vector, or the
//! two-channel FHV13 mask).

use ndarray::{Array1, Array2, Array3, Axis, s};

/// Output of an extractor. Extractors don't all produce the same shape
/// (a plane, a co-occurrence tensor, a per-angle scalar vector, a two-channel
/// mask), so this is a closed sum type rather than a single `Array2`.
#[derive(Debug, Clone)]
pub enum MatrixValue {
    Plane(Array2<f64>),
    Glcm(Array3<f64>),
    Vector(Array1<f64>),
    TwoChannel(Array3<f64>),
}

impl MatrixValue {
    /// All scalar elements, for calculators that fold "over all elements of
    /// the named extractor output" (spec §4.2's Mean/STD).
    pub fn elements(&self) -> Box<dyn Iterator<Item = f64> + '_> {
        match self {
            MatrixValue::Plane(a) => Box::new(a.iter().copied()),
            MatrixValue::Glcm(a) => Box::new(a.iter().copied()),
            MatrixValue::Vector(a) => Box::new(a.iter().copied()),
            MatrixValue::TwoChannel(a) => Box::new(a.iter().copied()),
        }
    }

    pub fn as_plane(&self) -> Option<&Array2<f64>> {
        match self {
            MatrixValue::Plane(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_two_channel(&self) -> Option<&Array3<f64>> {
        match self {
            MatrixValue::TwoChannel(a) => Some(a),
            _ => None,
        }
    }
}

/// Mean of a single channel of a `(h, w, channels)` tensor.
pub fn mean_channel(tensor: &Array3<f64>, channel: usize) -> Option<f64> {
    mean(tensor.slice(s![.., .., channel]).iter().copied())
}

/// Arithmetic mean over all elements; `None` on an empty iterator, matching
/// the "ignore NaN/empty" aggregation contract (spec §4.4) one level down.
pub fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values {
        if v.is_nan() {
            continue;
        }
        sum += v;
        count += 1;
    }
    (count > 0).then(|| sum / count as f64)
}

/// Population standard deviation (ddof = 0), matching numpy's default
/// `ndarray.std()` used throughout `original_source`.
pub fn std_dev(values: impl Iterator<Item = f64>) -> Option<f64> {
    let values: Vec<f64> = values.filter(|v| !v.is_nan()).collect();
    if values.is_empty() {
        return None;
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// Elementwise `hypot(a, b)`.
pub fn hypot2(a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
    Array2::from_shape_fn(a.dim(), |idx| a[idx].hypot(b[idx]))
}

fn reflect_index(i: isize, len: usize) -> usize {
    // scipy's default "reflect" boundary duplicates the edge sample:
    // (d c b a | a b c d | d c b a), i.e. numpy's "symmetric" padding.
    let len = len as isize;
    if len == 1 {
        return 0;
    }
    let period = 2 * len;
    let mut m = i % period;
    if m < 0 {
        m += period;
    }
    if m < len { m as usize } else { (period - 1 - m) as usize }
}

/// Correlate `input` with `kernel` (no kernel flip), same-shape output with
/// symmetric-reflect boundary handling. This is what `scipy.ndimage.sobel`
/// does internally via `correlate1d`.
pub fn correlate2d(input: &Array2<f64>, kernel: &Array2<f64>) -> Array2<f64> {
    let (kh, kw) = kernel.dim();
    let (ch, cw) = (kh as isize / 2, kw as isize / 2);
    let (h, w) = input.dim();
    Array2::from_shape_fn((h, w), |(i, j)| {
        let mut acc = 0.0;
        for m in 0..kh {
            for n in 0..kw {
                let di = m as isize - ch;
                let dj = n as isize - cw;
                let si = reflect_index(i as isize + di, h);
                let sj = reflect_index(j as isize + dj, w);
                acc += kernel[(m, n)] * input[(si, sj)];
            }
        }
        acc
    })
}

/// True convolution (kernel flipped on both axes), matching
/// `scipy.ndimage.convolve(..., mode='reflect')` as used by the FHV13
/// extractor.
pub fn convolve2d(input: &Array2<f64>, kernel: &Array2<f64>) -> Array2<f64> {
    let (kh, kw) = kernel.dim();
    let mut flipped = kernel.clone();
    flipped.invert_axis(Axis(0));
    flipped.invert_axis(Axis(1));
    debug_assert_eq!(flipped.dim(), (kh, kw));
    correlate2d(input, &flipped)
}

/// The Sobel derivative kernel along `axis` (0 = rows, 1 = columns), the 3x3
/// outer product of the `[-1, 0, 1]` derivative and `[1, 2, 1]` smoothing
/// filters `scipy.ndimage.sobel` applies internally.
pub fn sobel_kernel(axis: usize) -> Array2<f64> {
    let deriv = [-1.0, 0.0, 1.0];
    let smooth = [1.0, 2.0, 1.0];
    Array2::from_shape_fn((3, 3), |(i, j)| {
        if axis == 0 { deriv[i] * smooth[j] } else { smooth[i] * deriv[j] }
    })
}

pub fn sobel(input: &Array2<f64>, axis: usize) -> Array2<f64> {
    correlate2d(input, &sobel_kernel(axis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn mean_ignores_nan() {
        let v = vec![1.0, f64::NAN, 3.0];
        assert_abs_diff_eq!(mean(v.into_iter()).unwrap(), 2.0);
    }

    #[test]
    fn std_dev_of_constant_is_zero() {
        let v = vec![5.0; 10];
        assert_abs_diff_eq!(std_dev(v.into_iter()).unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn sobel_flat_field_is_zero() {
        let flat = Array2::from_elem((5, 5), 10.0);
        let gx = sobel(&flat, 0);
        assert!(gx.iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn sobel_detects_vertical_edge() {
        let mut img = Array2::<f64>::zeros((5, 5));
        for i in 0..5 {
            for j in 3..5 {
                img[(i, j)] = 1.0;
            }
        }
        let gx = sobel(&img, 1);
        assert!(gx[(2, 2)].abs() > 0.0);
    }
}

//! Extractors: produce a matrix from a frame or from another extractor's
//! output. Formulas are grounded in
//! `original_source/web/api/src/tasks/extractors.py`.

use super::GlcmProperty;
use crate::frame::Frame;
use crate::matrix::{convolve2d, hypot2, sobel, MatrixValue};
use ndarray::{Array1, Array2, Array3};

/// Rolling state for the `TI` extractor: the previous frame's luma plane.
/// First frame yields `None` (spec §4.2).
#[derive(Debug, Clone, Default)]
pub struct TiState {
    prev: Option<Array2<f64>>,
}

impl TiState {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Clone)]
pub enum Extractor {
    Y,
    U,
    V,
    Si,
    Ti(TiState),
    Glcm,
    GlcmProp(GlcmProperty),
    Fhv13,
}

impl Extractor {
    pub fn name(&self) -> &'static str {
        match self {
            Extractor::Y => "Y",
            Extractor::U => "U",
            Extractor::V => "V",
            Extractor::Si => "SI",
            Extractor::Ti(_) => "TI",
            Extractor::Glcm => "GLCM",
            Extractor::GlcmProp(p) => match p {
                GlcmProperty::Contrast => "GLCM_contrast",
                GlcmProperty::Correlation => "GLCM_correlation",
                GlcmProperty::Energy => "GLCM_energy",
                GlcmProperty::Homogeneity => "GLCM_homogeneity",
            },
            Extractor::Fhv13 => "FHV13_frames",
        }
    }

    pub fn depends_on(&self) -> Option<&'static str> {
        match self {
            Extractor::Y | Extractor::U | Extractor::V => None,
            Extractor::Si | Extractor::Ti(_) | Extractor::Fhv13 => Some("Y"),
            Extractor::Glcm => Some("Y"),
            Extractor::GlcmProp(_) => Some("GLCM"),
        }
    }

    /// `root` is the raw decoded frame (consumed only by the plane
    /// selectors); `input` is the dependency's matrix (everyone else).
    pub fn extract(&mut self, root: &Frame, input: Option<&MatrixValue>) -> Option<MatrixValue> {
        match self {
            Extractor::Y => root.plane(0).cloned().map(MatrixValue::Plane),
            Extractor::U => root.plane(1).cloned().map(MatrixValue::Plane),
            Extractor::V => root.plane(2).cloned().map(MatrixValue::Plane),
            Extractor::Si => {
                let y = input?.as_plane()?;
                let sx = sobel(y, 0);
                let sy = sobel(y, 1);
                Some(MatrixValue::Plane(hypot2(&sx, &sy)))
            }
            Extractor::Ti(state) => {
                let y = input?.as_plane()?;
                match state.prev.take() {
                    None => {
                        state.prev = Some(y.clone());
                        None
                    }
                    Some(prev) => {
                        let diff = y - &prev;
                        state.prev = Some(y.clone());
                        Some(MatrixValue::Plane(diff))
                    }
                }
            }
            Extractor::Glcm => {
                let y = input?.as_plane()?;
                Some(MatrixValue::Glcm(gray_co_occurrence(y)))
            }
            Extractor::GlcmProp(prop) => {
                let glcm = match input? {
                    MatrixValue::Glcm(t) => t,
                    _ => return None,
                };
                Some(MatrixValue::Vector(gray_co_props(glcm, *prop)))
            }
            Extractor::Fhv13 => {
                let y = input?.as_plane()?;
                Some(MatrixValue::TwoChannel(fhv13_masks(y)))
            }
        }
    }
}

/// Gray-level co-occurrence tensor at distance 1, angles `{0, pi/4, pi/2,
/// 3pi/4}`, 256 levels, normalized per angle (spec §4.2). Luma values are
/// rounded and clamped into `[0, 255]` gray levels.
fn gray_co_occurrence(frame: &Array2<f64>) -> Array3<f64> {
    const LEVELS: usize = 256;
    const OFFSETS: [(isize, isize); 4] = [(0, 1), (-1, 1), (-1, 0), (-1, -1)];
    let (h, w) = frame.dim();
    let mut counts = Array3::<f64>::zeros((LEVELS, LEVELS, OFFSETS.len()));
    let gray = |v: f64| -> usize { v.round().clamp(0.0, 255.0) as usize };

    for (a, (dy, dx)) in OFFSETS.iter().enumerate() {
        let mut total = 0.0;
        for i in 0..h {
            for j in 0..w {
                let (ni, nj) = (i as isize + dy, j as isize + dx);
                if ni < 0 || nj < 0 || ni as usize >= h || nj as usize >= w {
                    continue;
                }
                let gi = gray(frame[(i, j)]);
                let gj = gray(frame[(ni as usize, nj as usize)]);
                counts[(gi, gj, a)] += 1.0;
                total += 1.0;
            }
        }
        if total > 0.0 {
            for gi in 0..LEVELS {
                for gj in 0..LEVELS {
                    counts[(gi, gj, a)] /= total;
                }
            }
        }
    }
    counts
}

/// `skimage.feature.graycoprops` formulas, evaluated per angle.
fn gray_co_props(glcm: &Array3<f64>, prop: GlcmProperty) -> Array1<f64> {
    let (levels, _, angles) = glcm.dim();
    let mut out = Array1::<f64>::zeros(angles);
    for a in 0..angles {
        let p = glcm.index_axis(ndarray::Axis(2), a);
        out[a] = match prop {
            GlcmProperty::Contrast => {
                let mut acc = 0.0;
                for i in 0..levels {
                    for j in 0..levels {
                        let d = (i as f64 - j as f64).powi(2);
                        acc += p[(i, j)] * d;
                    }
                }
                acc
            }
            GlcmProperty::Homogeneity => {
                let mut acc = 0.0;
                for i in 0..levels {
                    for j in 0..levels {
                        acc += p[(i, j)] / (1.0 + (i as f64 - j as f64).powi(2));
                    }
                }
                acc
            }
            GlcmProperty::Energy => {
                let asm: f64 = p.iter().map(|v| v * v).sum();
                asm.sqrt()
            }
            GlcmProperty::Correlation => {
                let mut mean_i = 0.0;
                let mut mean_j = 0.0;
                for i in 0..levels {
                    for j in 0..levels {
                        mean_i += i as f64 * p[(i, j)];
                        mean_j += j as f64 * p[(i, j)];
                    }
                }
                let mut var_i = 0.0;
                let mut var_j = 0.0;
                for i in 0..levels {
                    for j in 0..levels {
                        var_i += p[(i, j)] * (i as f64 - mean_i).powi(2);
                        var_j += p[(i, j)] * (j as f64 - mean_j).powi(2);
                    }
                }
                let (std_i, std_j) = (var_i.sqrt(), var_j.sqrt());
                if std_i < 1e-12 || std_j < 1e-12 {
                    1.0
                } else {
                    let mut acc = 0.0;
                    for i in 0..levels {
                        for j in 0..levels {
                            acc += p[(i, j)] * (i as f64 - mean_i) * (j as f64 - mean_j);
                        }
                    }
                    acc / (std_i * std_j)
                }
            }
        };
    }
    out
}

/// 13-tap bandpass weights from Wolf & Pinson's "Video Quality Measurement
/// Techniques", reused verbatim from `FHV13Extractor.BANDPASS_FILTER_WEIGHT`.
const BANDPASS_FILTER_WEIGHT: [f64; 13] = [
    -0.0052625, -0.0173446, -0.0427401, -0.0768961, -0.0957739, -0.0696751, 0.0, 0.0696751,
    0.0957739, 0.0768961, 0.0427401, 0.0173446, 0.0052625,
];

const DELTA_THETA: f64 = 0.225;
const R_MIN: f64 = 20.0;

fn bandpass_kernel_x() -> Array2<f64> {
    Array2::from_shape_fn((13, 13), |(_, j)| BANDPASS_FILTER_WEIGHT[j])
}

fn bandpass_kernel_y() -> Array2<f64> {
    Array2::from_shape_fn((13, 13), |(i, _)| BANDPASS_FILTER_WEIGHT[i])
}

/// The two-channel horizontal/vertical vs. diagonal gradient mask (spec
/// §4.2's `FHV13` extractor).
fn fhv13_masks(frame: &Array2<f64>) -> Array3<f64> {
    let gx = convolve2d(frame, &bandpass_kernel_x());
    let gy = convolve2d(frame, &bandpass_kernel_y());
    let (h, w) = frame.dim();
    let r = hypot2(&gx, &gy);
    let mut out = Array3::<f64>::zeros((h, w, 2));

    for i in 0..h {
        for j in 0..w {
            let r_ij = r[(i, j)];
            if r_ij < R_MIN {
                continue;
            }
            let theta = gx[(i, j)].atan2(gy[(i, j)]);
            for m in 0..4 {
                let center = m as f64 * std::f64::consts::FRAC_PI_2;

                let hv_min = center - DELTA_THETA;
                let hv_max = center + DELTA_THETA;
                if theta > hv_min && theta < hv_max {
                    out[(i, j, 0)] = r_ij;
                }

                let diag_min = center + DELTA_THETA;
                let diag_max = center - std::f64::consts::FRAC_PI_2 + DELTA_THETA;
                if theta >= diag_min && theta <= diag_max {
                    out[(i, j, 1)] = r_ij;
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn y_extractor_selects_plane_zero() {
        let frame = Frame {
            width: 2,
            height: 2,
            format: "yuv420p".into(),
            pts: 0,
            dts: 0,
            key_frame: true,
            time: 0.0,
            planes: vec![Array2::from_elem((2, 2), 7.0)],
        };
        let mut e = Extractor::Y;
        let out = e.extract(&frame, None).unwrap();
        assert!(matches!(out, MatrixValue::Plane(_)));
    }

    #[test]
    fn ti_first_frame_is_none() {
        let y = MatrixValue::Plane(Array2::zeros((2, 2)));
        let frame = Frame {
            width: 2,
            height: 2,
            format: "gray".into(),
            pts: 0,
            dts: 0,
            key_frame: true,
            time: 0.0,
            planes: vec![Array2::zeros((2, 2))],
        };
        let mut ti = Extractor::Ti(TiState::new());
        assert!(ti.extract(&frame, Some(&y)).is_none());
        let y2 = MatrixValue::Plane(Array2::from_elem((2, 2), 1.0));
        let second = ti.extract(&frame, Some(&y2)).unwrap();
        assert!(matches!(second, MatrixValue::Plane(_)));
    }

    #[test]
    fn glcm_of_constant_frame_is_diagonal() {
        let y = Array2::from_elem((4, 4), 10.0);
        let glcm = gray_co_occurrence(&y);
        assert!((glcm[(10, 10, 0)] - 1.0).abs() < 1e-9);
        assert!(glcm[(10, 11, 0)].abs() < 1e-9);
    }
}

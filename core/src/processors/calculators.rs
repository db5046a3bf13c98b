//! Feature calculators: fold a matrix into a scalar attached to the
//! per-frame row. Grounded in
//! `original_source/feature_calculator/features.py`.

use super::MatrixName;
use crate::matrix::{mean, mean_channel, std_dev, MatrixValue};

pub enum Calculator {
    Mean(MatrixName, &'static str),
    Std(MatrixName, &'static str),
    /// `max(mean(hv_channel), 3) / max(mean(not_hv_channel), 3)`.
    Fhv13,
}

impl Calculator {
    pub fn name(&self) -> &'static str {
        match self {
            Calculator::Mean(_, out) | Calculator::Std(_, out) => out,
            Calculator::Fhv13 => "FHV13",
        }
    }

    pub fn input(&self) -> MatrixName {
        match self {
            Calculator::Mean(m, _) | Calculator::Std(m, _) => *m,
            Calculator::Fhv13 => MatrixName::Fhv13,
        }
    }

    /// `None` when the dependency itself produced `None` for this frame
    /// (e.g. `TI` on frame 0) — ∅ propagates, per spec §4.2.
    pub fn feed(&self, input: Option<&MatrixValue>) -> Option<f64> {
        match self {
            Calculator::Mean(_, _) => mean(input?.elements()),
            Calculator::Std(_, _) => std_dev(input?.elements()),
            Calculator::Fhv13 => {
                let tensor = input?.as_two_channel()?;
                let hv = mean_channel(tensor, 0).unwrap_or(0.0).max(3.0);
                let not_hv = mean_channel(tensor, 1).unwrap_or(0.0).max(3.0);
                Some(hv / not_hv)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn mean_calculator_ignores_none_input() {
        let c = Calculator::Mean(MatrixName::Ti, "TI_mean");
        assert_eq!(c.feed(None), None);
    }

    #[test]
    fn mean_calculator_computes_plane_mean() {
        let c = Calculator::Mean(MatrixName::Y, "CTI_mean");
        let plane = MatrixValue::Plane(Array2::from_elem((2, 2), 4.0));
        assert_eq!(c.feed(Some(&plane)), Some(4.0));
    }
}

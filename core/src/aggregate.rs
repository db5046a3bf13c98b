//! The Aggregator (C4): folds the stream of `FrameRow`s into a single
//! descriptor row, per the static per-column schema grounded in
//! `original_source/web/api/src/tasks/feature_calculator.py`'s
//! `dataframe.agg({...})` call.

use std::collections::HashMap;

use crate::domain::FrameRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggOp {
    Min,
    Mean,
    Max,
    Std,
}

impl AggOp {
    fn suffix(&self) -> &'static str {
        match self {
            AggOp::Min => "min",
            AggOp::Mean => "mean",
            AggOp::Max => "max",
            AggOp::Std => "std",
        }
    }
}

/// Which aggregations apply to each row-level column. `FHV13` and the
/// temporal-information columns only ever emit a subset — matching the
/// authoritative original, not spec.md's illustrative example.
const AGGREGATION_SCHEMA: &[(&str, &[AggOp])] = &[
    ("CTI_mean", &[AggOp::Min, AggOp::Mean, AggOp::Max, AggOp::Std]),
    ("CTI_std", &[AggOp::Min, AggOp::Mean, AggOp::Max, AggOp::Std]),
    ("TI_mean", &[AggOp::Max, AggOp::Std]),
    ("TI_std", &[AggOp::Min, AggOp::Mean, AggOp::Max, AggOp::Std]),
    ("SI_mean", &[AggOp::Min, AggOp::Mean, AggOp::Max, AggOp::Std]),
    ("SI_std", &[AggOp::Min, AggOp::Mean, AggOp::Max, AggOp::Std]),
    ("FHV13", &[AggOp::Max]),
    ("GLCM_correlation_mean", &[AggOp::Min, AggOp::Mean, AggOp::Max, AggOp::Std]),
    ("GLCM_correlation_std", &[AggOp::Std]),
    ("GLCM_contrast_mean", &[AggOp::Min, AggOp::Mean, AggOp::Max, AggOp::Std]),
    ("GLCM_contrast_std", &[AggOp::Std]),
    ("GLCM_energy_mean", &[AggOp::Min, AggOp::Mean, AggOp::Max, AggOp::Std]),
    ("GLCM_energy_std", &[AggOp::Min, AggOp::Mean, AggOp::Max, AggOp::Std]),
    ("GLCM_homogeneity_mean", &[AggOp::Min, AggOp::Mean, AggOp::Max, AggOp::Std]),
    ("GLCM_homogeneity_std", &[AggOp::Min, AggOp::Mean, AggOp::Max, AggOp::Std]),
];

/// A single flat descriptor row: `<row-column>_<agg>` -> value.
#[derive(Debug, Clone, Default)]
pub struct Descriptor(pub HashMap<String, f64>);

#[derive(Debug, Default)]
pub struct Aggregator {
    columns: HashMap<&'static str, Vec<f64>>,
    widths: Vec<f64>,
    heights: Vec<f64>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one frame's values in. NaN/∅ values are dropped here rather
    /// than carried as NaN through the final reduction (spec §4.4:
    /// "aggregations ignore NaN/∅"). `width`/`height` are frame-shape
    /// metadata, not a feature calculator output, so they're folded
    /// separately from `row.values` (`dataframe.agg({'width': 'min',
    /// 'height': 'min', ...})` in the original).
    pub fn push(&mut self, row: &FrameRow) {
        for (&name, schema) in AGGREGATION_SCHEMA {
            if schema.is_empty() {
                continue;
            }
            if let Some(Some(value)) = row.values.get(name) {
                if !value.is_nan() {
                    self.columns.entry(name).or_default().push(*value);
                }
            }
        }
        self.widths.push(row.width as f64);
        self.heights.push(row.height as f64);
    }

    pub fn finish(self) -> Descriptor {
        let mut out = HashMap::new();
        for (&name, schema) in AGGREGATION_SCHEMA {
            let values = self.columns.get(name).cloned().unwrap_or_default();
            for op in *schema {
                let key = format!("{name}_{}", op.suffix());
                if let Some(v) = reduce(&values, *op) {
                    out.insert(key, v);
                }
            }
        }
        if let Some(v) = reduce(&self.widths, AggOp::Min) {
            out.insert("width_min".to_string(), v);
        }
        if let Some(v) = reduce(&self.heights, AggOp::Min) {
            out.insert("height_min".to_string(), v);
        }
        Descriptor(out)
    }
}

fn reduce(values: &[f64], op: AggOp) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    match op {
        AggOp::Min => values.iter().copied().fold(f64::INFINITY, f64::min).into(),
        AggOp::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max).into(),
        AggOp::Mean => crate::matrix::mean(values.iter().copied()),
        AggOp::Std => crate::matrix::std_dev(values.iter().copied()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_with(name: &'static str, value: f64) -> FrameRow {
        let mut r = FrameRow::new(1, 1, "gray".into(), false, 0, 0, 0.0);
        r.values.insert(name, Some(value));
        r
    }

    #[test]
    fn ti_std_emits_all_four_aggregations() {
        let mut agg = Aggregator::new();
        agg.push(&row_with("TI_std", 2.0));
        agg.push(&row_with("TI_std", 4.0));
        let descriptor = agg.finish();
        assert_eq!(descriptor.0["TI_std_min"], 2.0);
        assert_eq!(descriptor.0["TI_std_mean"], 3.0);
        assert_eq!(descriptor.0["TI_std_max"], 4.0);
        assert!(descriptor.0.contains_key("TI_std_std"));
    }

    #[test]
    fn glcm_correlation_and_contrast_std_emit_only_std() {
        let mut agg = Aggregator::new();
        agg.push(&row_with("GLCM_correlation_std", 1.0));
        agg.push(&row_with("GLCM_contrast_std", 1.0));
        let descriptor = agg.finish();
        assert!(descriptor.0.contains_key("GLCM_correlation_std_std"));
        assert!(!descriptor.0.contains_key("GLCM_correlation_std_min"));
        assert!(!descriptor.0.contains_key("GLCM_correlation_std_mean"));
        assert!(!descriptor.0.contains_key("GLCM_correlation_std_max"));
        assert!(descriptor.0.contains_key("GLCM_contrast_std_std"));
        assert!(!descriptor.0.contains_key("GLCM_contrast_std_min"));
    }

    #[test]
    fn width_and_height_min_are_tracked_per_frame() {
        let mut agg = Aggregator::new();
        agg.push(&FrameRow::new(64, 48, "gray".into(), true, 0, 0, 0.0));
        agg.push(&FrameRow::new(32, 96, "gray".into(), false, 1, 1, 1.0));
        let descriptor = agg.finish();
        assert_eq!(descriptor.0["width_min"], 32.0);
        assert_eq!(descriptor.0["height_min"], 48.0);
    }

    #[test]
    fn aggregates_min_mean_max_std_for_si() {
        let mut agg = Aggregator::new();
        agg.push(&row_with("SI_mean", 1.0));
        agg.push(&row_with("SI_mean", 3.0));
        let descriptor = agg.finish();
        assert_eq!(descriptor.0["SI_mean_min"], 1.0);
        assert_eq!(descriptor.0["SI_mean_max"], 3.0);
        assert_eq!(descriptor.0["SI_mean_mean"], 2.0);
    }

    #[test]
    fn ti_mean_only_emits_max_and_std() {
        let mut agg = Aggregator::new();
        agg.push(&row_with("TI_mean", 5.0));
        let descriptor = agg.finish();
        assert!(descriptor.0.contains_key("TI_mean_max"));
        assert!(!descriptor.0.contains_key("TI_mean_min"));
    }
}

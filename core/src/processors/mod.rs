//! The Processor Registry (C2): a fixed, closed catalog of extractors and
//! feature calculators with declared dependencies. Per spec §9, this is
//! modeled as a tagged union rather than an open trait-object hierarchy —
//! the registry never grows at runtime.

mod calculators;
mod extractors;

pub use calculators::Calculator;
pub use extractors::Extractor;

use crate::matrix::MatrixValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlcmProperty {
    Contrast,
    Correlation,
    Energy,
    Homogeneity,
}

impl GlcmProperty {
    pub const ALL: [GlcmProperty; 4] = [
        GlcmProperty::Contrast,
        GlcmProperty::Correlation,
        GlcmProperty::Energy,
        GlcmProperty::Homogeneity,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixName {
    Y,
    U,
    V,
    Si,
    Ti,
    Glcm,
    GlcmProp(GlcmProperty),
    Fhv13,
}

impl MatrixName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatrixName::Y => "Y",
            MatrixName::U => "U",
            MatrixName::V => "V",
            MatrixName::Si => "SI",
            MatrixName::Ti => "TI",
            MatrixName::Glcm => "GLCM",
            MatrixName::GlcmProp(GlcmProperty::Contrast) => "GLCM_contrast",
            MatrixName::GlcmProp(GlcmProperty::Correlation) => "GLCM_correlation",
            MatrixName::GlcmProp(GlcmProperty::Energy) => "GLCM_energy",
            MatrixName::GlcmProp(GlcmProperty::Homogeneity) => "GLCM_homogeneity",
            MatrixName::Fhv13 => "FHV13_frames",
        }
    }
}

/// A single node in the per-file DAG: either an `Extractor` (produces a
/// matrix consumed by other processors) or a `Calculator` (produces a
/// scalar attached to the per-frame row). At most one dependency each,
/// per spec §4.2 ("no processor depends on more than one other").
pub enum Processor {
    Extractor(Extractor),
    Calculator(Calculator),
}

impl Processor {
    pub fn name(&self) -> &'static str {
        match self {
            Processor::Extractor(e) => e.name(),
            Processor::Calculator(c) => c.name(),
        }
    }

    /// Name of the matrix this processor consumes, or `None` meaning "the
    /// raw decoded frame".
    pub fn depends_on(&self) -> Option<&'static str> {
        match self {
            Processor::Extractor(e) => e.depends_on(),
            Processor::Calculator(c) => Some(c.input().as_str()),
        }
    }

    pub fn is_extractor(&self) -> bool {
        matches!(self, Processor::Extractor(_))
    }
}

/// The canonical catalog from spec §4.2: every extractor and calculator the
/// analyzer runs per file, grounded in
/// `original_source/web/api/src/tasks/feature_calculator.py`'s
/// `analyze_file` wiring.
pub fn default_registry() -> Vec<Processor> {
    use Calculator as C;
    use Extractor as E;

    vec![
        Processor::Extractor(E::Y),
        Processor::Extractor(E::Si),
        Processor::Extractor(E::Ti(extractors::TiState::new())),
        Processor::Extractor(E::Glcm),
        Processor::Extractor(E::GlcmProp(GlcmProperty::Correlation)),
        Processor::Extractor(E::GlcmProp(GlcmProperty::Contrast)),
        Processor::Extractor(E::GlcmProp(GlcmProperty::Energy)),
        Processor::Extractor(E::GlcmProp(GlcmProperty::Homogeneity)),
        Processor::Extractor(E::Fhv13),
        Processor::Calculator(C::Std(MatrixName::Y, "CTI_std")),
        Processor::Calculator(C::Std(MatrixName::Si, "SI_std")),
        Processor::Calculator(C::Std(MatrixName::Ti, "TI_std")),
        Processor::Calculator(C::Mean(MatrixName::Y, "CTI_mean")),
        Processor::Calculator(C::Mean(MatrixName::Si, "SI_mean")),
        Processor::Calculator(C::Mean(MatrixName::Ti, "TI_mean")),
        Processor::Calculator(C::Mean(MatrixName::GlcmProp(GlcmProperty::Correlation), "GLCM_correlation_mean")),
        Processor::Calculator(C::Mean(MatrixName::GlcmProp(GlcmProperty::Contrast), "GLCM_contrast_mean")),
        Processor::Calculator(C::Mean(MatrixName::GlcmProp(GlcmProperty::Energy), "GLCM_energy_mean")),
        Processor::Calculator(C::Mean(MatrixName::GlcmProp(GlcmProperty::Homogeneity), "GLCM_homogeneity_mean")),
        Processor::Calculator(C::Std(MatrixName::GlcmProp(GlcmProperty::Correlation), "GLCM_correlation_std")),
        Processor::Calculator(C::Std(MatrixName::GlcmProp(GlcmProperty::Contrast), "GLCM_contrast_std")),
        Processor::Calculator(C::Std(MatrixName::GlcmProp(GlcmProperty::Energy), "GLCM_energy_std")),
        Processor::Calculator(C::Std(MatrixName::GlcmProp(GlcmProperty::Homogeneity), "GLCM_homogeneity_std")),
        Processor::Calculator(C::Fhv13),
    ]
}

pub type ExtractResult = Option<MatrixValue>;

//! The decoded unit the Frame Source yields and the Processor Registry
//! consumes: pixel planes plus timing metadata (spec §4.1).

use ndarray::Array2;

/// One decoded video frame. `planes[0]` is always luminance; `planes[1]`/
/// `planes[2]` (chrominance) are present only for planar formats the Frame
/// Source was asked to decode in full color — the registry's extractors
/// only ever need plane 0 in this pipeline, but the type keeps the 3-plane
/// shape spec §4.1 describes ("plane 0 = luminance, planes 1/2 = chrominance").
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub pts: i64,
    pub dts: i64,
    pub key_frame: bool,
    pub time: f64,
    pub planes: Vec<Array2<f64>>,
}

impl Frame {
    pub fn plane(&self, index: usize) -> Option<&Array2<f64>> {
        self.planes.get(index)
    }
}

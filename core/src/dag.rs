//! The DAG Scheduler (C3): per-frame topological execution of the
//! Processor Registry over a bounded worker pool.
//!
//! The dependency graph never changes across frames (it's a static forest,
//! spec §4.2), so the topological wave order is computed once, here, rather
//! than recomputed per frame the way
//! `original_source/feature_calculator/calculate.py`'s
//! `graphlib.TopologicalSorter` does.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::domain::FrameRow;
use crate::error::{CoreError, CoreResult};
use crate::frame::Frame;
use crate::matrix::MatrixValue;
use crate::processors::{default_registry, Calculator, Extractor, Processor};

#[derive(Clone, Copy)]
enum NodeRef {
    Extractor(usize),
    Calculator(usize),
}

pub struct Dag {
    extractors: Vec<Extractor>,
    calculators: Vec<Calculator>,
    waves: Vec<Vec<NodeRef>>,
    semaphore: Arc<Semaphore>,
}

impl Dag {
    /// `worker_count` bounds the inner per-frame pool; per spec §9's
    /// "pool of pools" note callers should pass
    /// `max(1, cores / outer_concurrency)`.
    pub fn new(worker_count: usize) -> Self {
        let registry = default_registry();
        let mut extractors = Vec::new();
        let mut calculators = Vec::new();
        let mut name_to_ref: HashMap<&'static str, NodeRef> = HashMap::new();
        let mut deps: HashMap<&'static str, Option<&'static str>> = HashMap::new();

        for p in registry {
            let name = p.name();
            let dep = p.depends_on();
            deps.insert(name, dep);
            match p {
                Processor::Extractor(e) => {
                    name_to_ref.insert(name, NodeRef::Extractor(extractors.len()));
                    extractors.push(e);
                }
                Processor::Calculator(c) => {
                    name_to_ref.insert(name, NodeRef::Calculator(calculators.len()));
                    calculators.push(c);
                }
            }
        }

        let waves = compute_waves(&deps, &name_to_ref);

        Self {
            extractors,
            calculators,
            waves,
            semaphore: Arc::new(Semaphore::new(worker_count.max(1))),
        }
    }

    /// Runs every registered processor against one frame, honoring
    /// dependencies. Stateful extractors (`TI`) run inline, in the order
    /// this method is called, before each wave's stateless fan-out is
    /// submitted to the pool — the scheduler itself is not responsible for
    /// serializing calls across frames; callers must invoke this
    /// sequentially, in decode order, for the ordering invariant to hold
    /// (spec §5).
    pub async fn process_frame(&mut self, frame: Frame) -> CoreResult<FrameRow> {
        let mut row = FrameRow::new(frame.width, frame.height, frame.format.clone(), frame.key_frame, frame.pts, frame.dts, frame.time);
        let frame = Arc::new(frame);
        let mut results: HashMap<&'static str, Option<Arc<MatrixValue>>> = HashMap::new();

        for wave in self.waves.clone() {
            for node in &wave {
                if let NodeRef::Extractor(idx) = node {
                    if matches!(self.extractors[*idx], Extractor::Ti(_)) {
                        let dep = self.extractors[*idx]
                            .depends_on()
                            .and_then(|d| results.get(d).cloned().flatten());
                        let out = self.extractors[*idx].extract(&frame, dep.as_deref());
                        let name = self.extractors[*idx].name();
                        results.insert(name, out.map(Arc::new));
                    }
                }
            }

            let mut set = JoinSet::new();
            for node in &wave {
                if let NodeRef::Extractor(idx) = node {
                    if matches!(self.extractors[*idx], Extractor::Ti(_)) {
                        continue;
                    }
                    let mut ext = self.extractors[*idx].clone();
                    let dep = ext.depends_on().and_then(|d| results.get(d).cloned().flatten());
                    let root = Arc::clone(&frame);
                    let permit = Arc::clone(&self.semaphore);
                    set.spawn(async move {
                        let _permit = permit.acquire_owned().await.expect("semaphore closed");
                        let name = ext.name();
                        let out = tokio::task::spawn_blocking(move || {
                            let out = ext.extract(&root, dep.as_deref());
                            (ext, out)
                        })
                        .await;
                        (name, out)
                    });
                }
            }
            while let Some(joined) = set.join_next().await {
                let (name, out) = joined.map_err(|e| CoreError::Processor { name: "dag", message: e.to_string() })?;
                let (_, out) = out.map_err(|e| CoreError::Processor { name: "dag", message: e.to_string() })?;
                results.insert(name, out.map(Arc::new));
            }

            for node in &wave {
                if let NodeRef::Calculator(idx) = node {
                    let calc = &self.calculators[*idx];
                    let dep = calc.input().as_str();
                    let input = results.get(dep).cloned().flatten();
                    let value = calc.feed(input.as_deref());
                    row.values.insert(calc.name(), value);
                }
            }
        }

        Ok(row)
    }
}

fn compute_waves(
    deps: &HashMap<&'static str, Option<&'static str>>,
    name_to_ref: &HashMap<&'static str, NodeRef>,
) -> Vec<Vec<NodeRef>> {
    let mut wave_of: HashMap<&'static str, usize> = HashMap::new();
    loop {
        let mut changed = false;
        for (&name, &dep) in deps.iter() {
            if wave_of.contains_key(name) {
                continue;
            }
            match dep {
                None => {
                    wave_of.insert(name, 0);
                    changed = true;
                }
                Some(dep_name) => {
                    if let Some(&dw) = wave_of.get(dep_name) {
                        wave_of.insert(name, dw + 1);
                        changed = true;
                    }
                }
            }
        }
        if !changed {
            break;
        }
    }
    debug_assert_eq!(
        wave_of.len(),
        deps.len(),
        "processor registry must be a forest with every dependency resolvable"
    );

    let max_wave = wave_of.values().copied().max().unwrap_or(0);
    let mut waves: Vec<Vec<NodeRef>> = vec![Vec::new(); max_wave + 1];
    for (name, wave_idx) in wave_of {
        waves[wave_idx].push(name_to_ref[name]);
    }
    waves
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn flat_frame(n: u32, value: f64) -> Frame {
        Frame {
            width: n,
            height: n,
            format: "gray".into(),
            pts: 0,
            dts: 0,
            key_frame: true,
            time: 0.0,
            planes: vec![Array2::from_elem((n as usize, n as usize), value)],
        }
    }

    #[tokio::test]
    async fn flat_field_yields_zero_si_mean() {
        let mut dag = Dag::new(2);
        let row = dag.process_frame(flat_frame(8, 50.0)).await.unwrap();
        let si_mean = row.values.get("SI_mean").copied().flatten().unwrap();
        assert!(si_mean.abs() < 1e-6);
    }

    #[tokio::test]
    async fn ti_is_none_on_first_frame_only() {
        let mut dag = Dag::new(2);
        let row0 = dag.process_frame(flat_frame(4, 10.0)).await.unwrap();
        assert_eq!(row0.values.get("TI_mean").copied().flatten(), None);
        let row1 = dag.process_frame(flat_frame(4, 20.0)).await.unwrap();
        assert!(row1.values.get("TI_mean").copied().flatten().is_some());
    }
}

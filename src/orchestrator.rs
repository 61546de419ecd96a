//! Batch generation with a per-resident cache.
//!
//! Residents are processed sequentially in input order. A resident whose
//! entry exists in the store is never regenerated, so a batch interrupted
//! part-way resumes where it stopped. The first generation failure aborts the
//! batch without writing anything for that resident.

use std::fs;
use std::path::Path;

use crate::error::PipelineError;
use crate::generator::TrajectoryGenerator;
use crate::residents::ResidentProfile;
use crate::store::write_json_atomic;
use crate::traits::{GenerativeService, TrajectoryStore};
use crate::trajectory::{BatchEntry, RawTrajectory};

/// How a resident's trajectory was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    CacheHit,
    Generated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cache_hits: usize,
    pub generated: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    /// One entry per resident, in input order.
    pub entries: Vec<BatchEntry>,
    pub summary: RunSummary,
}

impl BatchResult {
    /// Writes the `[{id, trajectory}]` aggregate document.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PipelineError> {
        save_batch(path, &self.entries)
    }
}

pub fn save_batch(path: impl AsRef<Path>, entries: &[BatchEntry]) -> Result<(), PipelineError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    write_json_atomic(path, entries)?;
    tracing::info!(path = %path.display(), entries = entries.len(), "saved batch result");
    Ok(())
}

pub fn load_batch(path: impl AsRef<Path>) -> Result<Vec<BatchEntry>, PipelineError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let entries: Vec<BatchEntry> = serde_json::from_str(&content)?;
    tracing::info!(path = %path.display(), entries = entries.len(), "loaded batch result");
    Ok(entries)
}

/// Resolves each resident from the store, generating only on a cache miss.
pub struct Orchestrator<'a, S, T> {
    generator: TrajectoryGenerator<'a, S>,
    store: T,
}

impl<'a, S, T> Orchestrator<'a, S, T>
where
    S: GenerativeService,
    T: TrajectoryStore,
{
    pub fn new(generator: TrajectoryGenerator<'a, S>, store: T) -> Self {
        Self { generator, store }
    }

    pub fn generator(&self) -> &TrajectoryGenerator<'a, S> {
        &self.generator
    }

    pub fn store(&self) -> &T {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut T {
        &mut self.store
    }

    pub fn into_store(self) -> T {
        self.store
    }

    /// Cached trajectory if present, otherwise generate and cache it.
    pub fn resolve(&mut self, resident: &ResidentProfile) -> Result<(RawTrajectory, Resolution), PipelineError> {
        if self.store.exists(resident.id) {
            tracing::info!(resident = resident.id, "trajectory cached, loading");
            let trajectory = self.store.read(resident.id)?;
            return Ok((trajectory, Resolution::CacheHit));
        }

        tracing::info!(resident = resident.id, "trajectory not cached, generating");
        let trajectory = self.generator.generate(resident)?;
        self.store.write(resident.id, &trajectory)?;
        Ok((trajectory, Resolution::Generated))
    }

    pub fn run(&mut self, residents: &[ResidentProfile]) -> Result<BatchResult, PipelineError> {
        tracing::info!(residents = residents.len(), "starting trajectory generation");

        let mut entries = Vec::with_capacity(residents.len());
        let mut summary = RunSummary::default();

        for resident in residents {
            let (trajectory, resolution) = self.resolve(resident)?;
            match resolution {
                Resolution::CacheHit => summary.cache_hits += 1,
                Resolution::Generated => summary.generated += 1,
            }
            entries.push(BatchEntry {
                id: resident.id,
                trajectory,
            });
        }

        tracing::info!(
            entries = entries.len(),
            cache_hits = summary.cache_hits,
            generated = summary.generated,
            "trajectory generation finished"
        );
        Ok(BatchResult { entries, summary })
    }

    /// [`Self::run`], then persist the aggregate artifact at `output`.
    pub fn run_to_file(
        &mut self,
        residents: &[ResidentProfile],
        output: impl AsRef<Path>,
    ) -> Result<BatchResult, PipelineError> {
        let result = self.run(residents)?;
        result.save(output)?;
        Ok(result)
    }
}

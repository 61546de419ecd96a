//! Seams to the outside world.
//!
//! The generative model and the trajectory cache are both reached through
//! these traits so the pipeline can run against deterministic stand-ins.

use crate::error::{ServiceError, StoreError};
use crate::generator::GenerationRequest;
use crate::trajectory::RawTrajectory;

/// Identifier of a resident within a batch.
pub type ResidentId = i64;

/// A text-generation backend.
///
/// One synchronous call per request. Implementations must not retry
/// internally; the caller decides whether a failed run is re-attempted.
pub trait GenerativeService {
    fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError>;
}

impl<S: GenerativeService + ?Sized> GenerativeService for &S {
    fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError> {
        (**self).generate(request)
    }
}

/// Key-value persistence for raw trajectories, keyed by resident id.
pub trait TrajectoryStore {
    fn exists(&self, resident_id: ResidentId) -> bool;

    /// Fails with [`StoreError::NotFound`] when absent and
    /// [`StoreError::Corrupt`] when present but undecodable.
    fn read(&self, resident_id: ResidentId) -> Result<RawTrajectory, StoreError>;

    /// Creates or overwrites the entry for `resident_id`.
    fn write(&mut self, resident_id: ResidentId, trajectory: &RawTrajectory) -> Result<(), StoreError>;
}

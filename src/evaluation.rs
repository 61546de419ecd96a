//! Fidelity metrics for a batch of generated trajectories.
//!
//! Three independent reductions over canonical trajectories:
//!
//! - KL divergence of the visited-category distribution from a reference
//!   distribution of real urban visits.
//! - Mean "radius": per trajectory, the largest great-circle distance between
//!   any two visited POIs. This is a diameter, not a centroid-based radius of
//!   gyration; the name is kept for comparability with earlier reports.
//! - Mean chain length: visits per trajectory, counting unknown names.
//!
//! Unknown POI names resolve through the catalog defaults and are counted in
//! the report rather than treated as errors.

use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::catalog::{MALL_TYPE, OFFICE_TYPE, OTHER_TYPE, PoiCatalog, RESIDENTIAL_TYPE};
use crate::error::PipelineError;
use crate::geo::distance_km;
use crate::parser::parse;
use crate::trajectory::{BatchEntry, CanonicalTrajectory};

const PROBABILITY_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryProbability {
    pub label: String,
    pub probability: f64,
}

/// Categorical distribution over a fixed, ordered label set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CategoryProbability>", into = "Vec<CategoryProbability>")]
pub struct ReferenceDistribution {
    entries: Vec<CategoryProbability>,
}

impl Default for ReferenceDistribution {
    fn default() -> Self {
        let entries = [
            (OFFICE_TYPE, 0.437),
            (MALL_TYPE, 0.211),
            (RESIDENTIAL_TYPE, 0.297),
            (OTHER_TYPE, 0.055),
        ]
        .into_iter()
        .map(|(label, probability)| CategoryProbability {
            label: label.to_string(),
            probability,
        })
        .collect();
        Self { entries }
    }
}

impl ReferenceDistribution {
    /// Requires unique labels including [`OTHER_TYPE`], strictly positive
    /// probabilities, and a total of 1.
    pub fn new(entries: Vec<CategoryProbability>) -> Result<Self, PipelineError> {
        if entries.is_empty() {
            return Err(PipelineError::InvalidReference("no categories".to_string()));
        }
        for (index, entry) in entries.iter().enumerate() {
            if entries[..index].iter().any(|prior| prior.label == entry.label) {
                return Err(PipelineError::InvalidReference(format!("duplicate label {:?}", entry.label)));
            }
            if !(entry.probability > 0.0) {
                return Err(PipelineError::InvalidReference(format!(
                    "probability for {:?} must be positive, got {}",
                    entry.label, entry.probability
                )));
            }
        }
        if !entries.iter().any(|entry| entry.label == OTHER_TYPE) {
            return Err(PipelineError::InvalidReference(format!("missing the {:?} bucket", OTHER_TYPE)));
        }
        let total: f64 = entries.iter().map(|entry| entry.probability).sum();
        if (total - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(PipelineError::InvalidReference(format!("probabilities sum to {}", total)));
        }
        Ok(Self { entries })
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.label.as_str())
    }

    pub fn probabilities(&self) -> Vec<f64> {
        self.entries.iter().map(|entry| entry.probability).collect()
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.label == label)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TryFrom<Vec<CategoryProbability>> for ReferenceDistribution {
    type Error = PipelineError;

    fn try_from(entries: Vec<CategoryProbability>) -> Result<Self, Self::Error> {
        Self::new(entries)
    }
}

impl From<ReferenceDistribution> for Vec<CategoryProbability> {
    fn from(reference: ReferenceDistribution) -> Self {
        reference.entries
    }
}

/// `Σ pᵢ·ln(pᵢ/qᵢ)`, with `0·ln(0/q) = 0`. Infinite if some `qᵢ = 0 < pᵢ`.
pub fn kl_divergence(p: &[f64], q: &[f64]) -> f64 {
    debug_assert_eq!(p.len(), q.len());
    p.iter()
        .zip(q)
        .filter(|(pi, _)| **pi > 0.0)
        .map(|(pi, qi)| if *qi > 0.0 { pi * (pi / qi).ln() } else { f64::INFINITY })
        .sum()
}

/// Arithmetic mean; an empty slice is an error rather than NaN.
pub fn mean(values: &[f64]) -> Result<f64, PipelineError> {
    if values.is_empty() {
        return Err(PipelineError::EmptyBatch);
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Visit counts per category, aligned to a reference's label order.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryCounts {
    pub counts: Vec<usize>,
    /// Visits whose catalog category is not a reference label.
    pub unlisted: usize,
    /// Visits whose name is absent from the catalog.
    pub defaulted: usize,
}

impl CategoryCounts {
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Frequencies over the reference labels only.
    pub fn distribution(&self) -> Option<Vec<f64>> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        Some(self.counts.iter().map(|&count| count as f64 / total as f64).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub kl_divergence: f64,
    pub mean_radius_km: f64,
    pub mean_chain_length: f64,
    pub trajectories: usize,
    pub visits: usize,
    /// Empirical frequencies in the reference's label order.
    pub empirical: Vec<CategoryProbability>,
    pub radii_km: Vec<f64>,
    pub chain_lengths: Vec<usize>,
    pub defaulted_type_lookups: usize,
    pub defaulted_location_lookups: usize,
    pub unlisted_type_visits: usize,
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "visit-type KL divergence: {}", self.kl_divergence)?;
        writeln!(f, "mean radius: {} km", self.mean_radius_km)?;
        writeln!(f, "mean chain length: {}", self.mean_chain_length)?;
        writeln!(f, "trajectories: {}, visits: {}", self.trajectories, self.visits)?;
        let empirical = self
            .empirical
            .iter()
            .map(|entry| format!("{}={:.4}", entry.label, entry.probability))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(f, "empirical distribution: {}", empirical)?;
        write!(
            f,
            "defaulted lookups: type={}, location={}; visits outside reference categories: {}",
            self.defaulted_type_lookups, self.defaulted_location_lookups, self.unlisted_type_visits
        )
    }
}

/// Scores trajectory batches against a reference visit-type distribution.
pub struct Evaluator<'a> {
    catalog: &'a PoiCatalog,
    reference: ReferenceDistribution,
}

impl<'a> Evaluator<'a> {
    pub fn new(catalog: &'a PoiCatalog, reference: ReferenceDistribution) -> Self {
        Self { catalog, reference }
    }

    pub fn reference(&self) -> &ReferenceDistribution {
        &self.reference
    }

    pub fn category_counts(&self, trajectories: &[CanonicalTrajectory]) -> CategoryCounts {
        let mut counts = CategoryCounts {
            counts: vec![0; self.reference.len()],
            unlisted: 0,
            defaulted: 0,
        };

        for visit in trajectories.iter().flatten() {
            let kind = self.catalog.type_lookup(visit);
            if kind.defaulted {
                counts.defaulted += 1;
            }
            match self.reference.index_of(kind.value) {
                Some(index) => counts.counts[index] += 1,
                None => counts.unlisted += 1,
            }
        }

        counts
    }

    pub fn visit_type_kl(&self, trajectories: &[CanonicalTrajectory]) -> Result<f64, PipelineError> {
        if trajectories.is_empty() {
            return Err(PipelineError::EmptyBatch);
        }
        let counts = self.category_counts(trajectories);
        let empirical = counts.distribution().ok_or(PipelineError::NoReferenceVisits)?;
        Ok(kl_divergence(&empirical, &self.reference.probabilities()))
    }

    /// Largest pairwise distance between the trajectory's visits, with the
    /// number of visits that fell back to the default location.
    pub fn trajectory_radius_km(&self, trajectory: &CanonicalTrajectory) -> (f64, usize) {
        let mut defaulted = 0;
        let points: Vec<_> = trajectory
            .iter()
            .map(|visit| {
                let location = self.catalog.location_lookup(visit);
                if location.defaulted {
                    defaulted += 1;
                }
                location.value
            })
            .collect();

        let mut radius: f64 = 0.0;
        for (i, a) in points.iter().enumerate() {
            for b in &points[i + 1..] {
                radius = radius.max(distance_km(*a, *b));
            }
        }
        (radius, defaulted)
    }

    pub fn mean_radius_km(&self, trajectories: &[CanonicalTrajectory]) -> Result<f64, PipelineError> {
        let radii: Vec<f64> = trajectories
            .par_iter()
            .map(|trajectory| self.trajectory_radius_km(trajectory).0)
            .collect();
        mean(&radii)
    }

    pub fn mean_chain_length(&self, trajectories: &[CanonicalTrajectory]) -> Result<f64, PipelineError> {
        let lengths: Vec<f64> = trajectories.iter().map(|t| t.len() as f64).collect();
        mean(&lengths)
    }

    pub fn evaluate(&self, trajectories: &[CanonicalTrajectory]) -> Result<EvaluationReport, PipelineError> {
        if trajectories.is_empty() {
            return Err(PipelineError::EmptyBatch);
        }
        tracing::info!(trajectories = trajectories.len(), "evaluating trajectories");

        let counts = self.category_counts(trajectories);
        let empirical = counts.distribution().ok_or(PipelineError::NoReferenceVisits)?;
        let kl = kl_divergence(&empirical, &self.reference.probabilities());
        tracing::info!(kl_divergence = kl, visits = counts.total() + counts.unlisted, "visit-type KL divergence");

        let per_trajectory: Vec<(f64, usize)> = trajectories
            .par_iter()
            .map(|trajectory| self.trajectory_radius_km(trajectory))
            .collect();
        for (index, (radius, _)) in per_trajectory.iter().enumerate() {
            tracing::debug!(trajectory = index + 1, radius_km = radius, "trajectory radius");
        }
        let radii_km: Vec<f64> = per_trajectory.iter().map(|(radius, _)| *radius).collect();
        let defaulted_location_lookups: usize = per_trajectory.iter().map(|(_, defaulted)| defaulted).sum();
        let mean_radius_km = mean(&radii_km)?;
        tracing::info!(mean_radius_km, "mean radius");

        let chain_lengths: Vec<usize> = trajectories.iter().map(|t| t.len()).collect();
        let mean_chain_length = mean(&chain_lengths.iter().map(|&len| len as f64).collect::<Vec<_>>())?;
        tracing::info!(mean_chain_length, "mean chain length");

        let empirical = self
            .reference
            .labels()
            .zip(empirical)
            .map(|(label, probability)| CategoryProbability {
                label: label.to_string(),
                probability,
            })
            .collect();

        Ok(EvaluationReport {
            kl_divergence: kl,
            mean_radius_km,
            mean_chain_length,
            trajectories: trajectories.len(),
            visits: chain_lengths.iter().sum(),
            empirical,
            radii_km,
            chain_lengths,
            defaulted_type_lookups: counts.defaulted,
            defaulted_location_lookups,
            unlisted_type_visits: counts.unlisted,
        })
    }

    /// Parses every entry's raw trajectory, then [`Self::evaluate`].
    pub fn evaluate_batch(&self, entries: &[BatchEntry]) -> Result<EvaluationReport, PipelineError> {
        let trajectories: Vec<CanonicalTrajectory> = entries.iter().map(|entry| parse(&entry.trajectory)).collect();
        self.evaluate(&trajectories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FALLBACK_LOCATION, PoiRecord};
    use crate::geo::Coordinate;
    use crate::trajectory::RawTrajectory;

    fn poi(name: &str, kind: &str, lon: f64, lat: f64) -> PoiRecord {
        PoiRecord {
            name: name.to_string(),
            poi_type: kind.to_string(),
            location: Coordinate::new(lon, lat),
            address: String::new(),
            open_time: String::new(),
        }
    }

    fn catalog() -> PoiCatalog {
        PoiCatalog::new(vec![
            poi("office", OFFICE_TYPE, 116.461, 39.909),
            poi("mall", MALL_TYPE, 116.455, 39.935),
            poi("home", RESIDENTIAL_TYPE, 116.397, 39.909),
            poi("school", "学校", 116.310, 39.992),
        ])
    }

    fn trajectory(names: &[&str]) -> CanonicalTrajectory {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn repeated(name: &str, count: usize) -> CanonicalTrajectory {
        vec![name.to_string(); count]
    }

    #[test]
    fn test_kl_zero_when_distributions_match() {
        let catalog = catalog();
        let evaluator = Evaluator::new(&catalog, ReferenceDistribution::default());
        let batch = vec![
            repeated("office", 437),
            repeated("mall", 211),
            repeated("home", 297),
            repeated("unknown place", 55),
        ];

        let kl = evaluator.visit_type_kl(&batch).unwrap();
        assert!(kl.abs() < 1e-12, "expected ~0, got {}", kl);
    }

    #[test]
    fn test_kl_matches_hand_computation() {
        // Only offices: p = [1, 0, 0, 0] so KL = ln(1 / 0.437).
        let catalog = catalog();
        let evaluator = Evaluator::new(&catalog, ReferenceDistribution::default());
        let kl = evaluator.visit_type_kl(&[trajectory(&["office", "office"])]).unwrap();
        assert!((kl - (1.0f64 / 0.437).ln()).abs() < 1e-12);
    }

    #[test]
    fn test_unlisted_categories_are_excluded() {
        let catalog = catalog();
        let evaluator = Evaluator::new(&catalog, ReferenceDistribution::default());
        let counts = evaluator.category_counts(&[trajectory(&["office", "school", "nowhere"])]);

        assert_eq!(counts.counts, vec![1, 0, 0, 1]);
        assert_eq!(counts.unlisted, 1);
        assert_eq!(counts.defaulted, 1);
    }

    #[test]
    fn test_no_reference_visits_is_an_error() {
        let catalog = catalog();
        let evaluator = Evaluator::new(&catalog, ReferenceDistribution::default());
        let err = evaluator.visit_type_kl(&[trajectory(&[]), trajectory(&["school"])]).unwrap_err();
        assert!(matches!(err, PipelineError::NoReferenceVisits));
    }

    #[test]
    fn test_kl_divergence_zero_convention_and_infinite() {
        assert_eq!(kl_divergence(&[0.0, 1.0], &[0.5, 0.5]), 2.0f64.ln());
        assert!(kl_divergence(&[0.5, 0.5], &[1.0, 0.0]).is_infinite());
    }

    #[test]
    fn test_mean_examples() {
        assert_eq!(mean(&[3.0, 5.0, 4.0]).unwrap(), 4.0);
        assert!((mean(&[0.0, 2.0, 2.0]).unwrap() - 4.0 / 3.0).abs() < 1e-12);
        assert!(matches!(mean(&[]), Err(PipelineError::EmptyBatch)));
    }

    #[test]
    fn test_radius_is_max_pairwise_distance() {
        let catalog = catalog();
        let evaluator = Evaluator::new(&catalog, ReferenceDistribution::default());

        let (radius, defaulted) = evaluator.trajectory_radius_km(&trajectory(&["home", "office", "mall"]));
        let home = Coordinate::new(116.397, 39.909);
        let office = Coordinate::new(116.461, 39.909);
        let mall = Coordinate::new(116.455, 39.935);
        let expected = distance_km(home, office).max(distance_km(home, mall)).max(distance_km(office, mall));
        assert!((radius - expected).abs() < 1e-9);
        assert_eq!(defaulted, 0);
    }

    #[test]
    fn test_radius_uses_fallback_location() {
        let catalog = catalog();
        let evaluator = Evaluator::new(&catalog, ReferenceDistribution::default());

        let (radius, defaulted) = evaluator.trajectory_radius_km(&trajectory(&["home", "nowhere"]));
        let home = Coordinate::new(116.397, 39.909);
        assert!((radius - distance_km(home, FALLBACK_LOCATION)).abs() < 1e-9);
        assert_eq!(defaulted, 1);
    }

    #[test]
    fn test_short_trajectories_have_zero_radius() {
        let catalog = catalog();
        let evaluator = Evaluator::new(&catalog, ReferenceDistribution::default());
        assert_eq!(evaluator.trajectory_radius_km(&trajectory(&[])).0, 0.0);
        assert_eq!(evaluator.trajectory_radius_km(&trajectory(&["office"])).0, 0.0);
    }

    #[test]
    fn test_mean_chain_length_counts_unknown_names() {
        let catalog = catalog();
        let evaluator = Evaluator::new(&catalog, ReferenceDistribution::default());
        let batch = vec![
            trajectory(&["a", "b", "c"]),
            trajectory(&["office", "b", "c", "d", "e"]),
            trajectory(&["x", "y", "z", "w"]),
        ];
        assert_eq!(evaluator.mean_chain_length(&batch).unwrap(), 4.0);
    }

    #[test]
    fn test_empty_batch_fails_every_metric() {
        let catalog = catalog();
        let evaluator = Evaluator::new(&catalog, ReferenceDistribution::default());
        assert!(matches!(evaluator.visit_type_kl(&[]), Err(PipelineError::EmptyBatch)));
        assert!(matches!(evaluator.mean_radius_km(&[]), Err(PipelineError::EmptyBatch)));
        assert!(matches!(evaluator.mean_chain_length(&[]), Err(PipelineError::EmptyBatch)));
        assert!(matches!(evaluator.evaluate(&[]), Err(PipelineError::EmptyBatch)));
    }

    #[test]
    fn test_evaluate_batch_parses_raw_entries() {
        let catalog = catalog();
        let evaluator = Evaluator::new(&catalog, ReferenceDistribution::default());
        let entries = vec![
            BatchEntry {
                id: 1,
                trajectory: RawTrajectory::text("```json\n[\"home\", \"office\", \"home\"]\n```"),
            },
            BatchEntry {
                id: 2,
                trajectory: RawTrajectory::text("[mall, nowhere]"),
            },
        ];

        let report = evaluator.evaluate_batch(&entries).unwrap();
        assert_eq!(report.trajectories, 2);
        assert_eq!(report.visits, 5);
        assert_eq!(report.chain_lengths, vec![3, 2]);
        assert_eq!(report.mean_chain_length, 2.5);
        assert_eq!(report.defaulted_type_lookups, 1);
        assert_eq!(report.defaulted_location_lookups, 1);
        assert_eq!(report.empirical[0].label, OFFICE_TYPE);
        assert!((report.empirical[0].probability - 0.2).abs() < 1e-12);
        assert!(report.to_string().contains("KL"));
    }

    #[test]
    fn test_reference_validation() {
        let entry = |label: &str, probability: f64| CategoryProbability {
            label: label.to_string(),
            probability,
        };

        assert!(ReferenceDistribution::new(vec![entry(OTHER_TYPE, 1.0)]).is_ok());
        assert!(ReferenceDistribution::new(vec![entry(MALL_TYPE, 1.0)]).is_err(), "other bucket required");
        assert!(ReferenceDistribution::new(vec![entry(OTHER_TYPE, 0.5), entry(MALL_TYPE, 0.4)]).is_err());
        assert!(ReferenceDistribution::new(vec![entry(OTHER_TYPE, 1.0), entry(MALL_TYPE, 0.0)]).is_err());
        assert!(ReferenceDistribution::new(vec![entry(OTHER_TYPE, 0.5), entry(OTHER_TYPE, 0.5)]).is_err());
    }

    #[test]
    fn test_default_reference_is_valid() {
        let reference = ReferenceDistribution::default();
        let rebuilt = ReferenceDistribution::new(reference.clone().into()).unwrap();
        assert_eq!(rebuilt, reference);
        assert_eq!(reference.labels().collect::<Vec<_>>(), vec![OFFICE_TYPE, MALL_TYPE, RESIDENTIAL_TYPE, OTHER_TYPE]);
    }
}

//! Test fixtures for mobility-synth.
//!
//! Provides:
//! - Real Beijing POIs, some inside and some outside the candidate radius
//! - A scripted generative service that counts calls per resident
//! - Resident builders and CSV writers

#![allow(dead_code)]

pub mod beijing_pois;

pub use beijing_pois::*;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use mobility_synth::catalog::{MalformedRowPolicy, PoiCatalog};
use mobility_synth::error::ServiceError;
use mobility_synth::generator::GenerationRequest;
use mobility_synth::residents::ResidentProfile;
use mobility_synth::traits::{GenerativeService, ResidentId};

/// Generative service returning canned replies and recording every call.
#[derive(Default)]
pub struct ScriptedService {
    replies: HashMap<ResidentId, String>,
    failures: HashMap<ResidentId, String>,
    calls: RefCell<Vec<GenerationRequest>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, resident_id: ResidentId, text: &str) -> Self {
        self.replies.insert(resident_id, text.to_string());
        self
    }

    pub fn fail(mut self, resident_id: ResidentId, message: &str) -> Self {
        self.failures.insert(resident_id, message.to_string());
        self
    }

    pub fn total_calls(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn calls_for(&self, resident_id: ResidentId) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|request| request.resident_id == resident_id)
            .count()
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.calls.borrow().last().cloned()
    }
}

impl GenerativeService for ScriptedService {
    fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError> {
        self.calls.borrow_mut().push(request.clone());
        if let Some(message) = self.failures.get(&request.resident_id) {
            return Err(ServiceError::Other(message.clone()));
        }
        Ok(self
            .replies
            .get(&request.resident_id)
            .cloned()
            .unwrap_or_else(|| "[]".to_string()))
    }
}

pub fn resident(id: ResidentId) -> ResidentProfile {
    ResidentProfile {
        id,
        age: 30 + id as u32,
        gender: "男".to_string(),
        occupation: "程序员".to_string(),
        family_role: "父亲".to_string(),
        budget_level: "中等".to_string(),
        home: CBD_HOME,
    }
}

pub fn catalog() -> PoiCatalog {
    PoiCatalog::from_reader(poi_csv().as_bytes(), MalformedRowPolicy::Reject).expect("fixture catalog")
}

pub fn residents_csv(residents: &[ResidentProfile]) -> String {
    let mut csv = String::from("id,age,gender,occupation,family_role,budget_level,home\n");
    for r in residents {
        csv.push_str(&format!(
            "{},{},{},{},{},{},\"{}\"\n",
            r.id, r.age, r.gender, r.occupation, r.family_role, r.budget_level, r.home
        ));
    }
    csv
}

pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("write fixture file");
    path
}

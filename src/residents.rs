//! Resident profiles.

use std::fs::File;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::MalformedRowPolicy;
use crate::error::LoadError;
use crate::geo::Coordinate;
use crate::traits::ResidentId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidentProfile {
    pub id: ResidentId,
    pub age: u32,
    #[serde(default)]
    pub gender: String,
    pub occupation: String,
    pub family_role: String,
    pub budget_level: String,
    pub home: Coordinate,
}

#[derive(Debug, Deserialize)]
struct ResidentRow {
    id: ResidentId,
    age: u32,
    #[serde(default)]
    gender: String,
    occupation: String,
    family_role: String,
    budget_level: String,
    home: String,
}

/// Reads `id,age,gender,occupation,family_role,budget_level,home` rows.
pub fn load_residents(path: impl AsRef<Path>, policy: MalformedRowPolicy) -> Result<Vec<ResidentProfile>, LoadError> {
    let path = path.as_ref();
    let residents = read_residents(File::open(path)?, policy)?;
    tracing::info!(path = %path.display(), residents = residents.len(), "loaded residents");
    Ok(residents)
}

pub fn read_residents<R: io::Read>(reader: R, policy: MalformedRowPolicy) -> Result<Vec<ResidentProfile>, LoadError> {
    let mut residents = Vec::new();

    for (index, row) in csv::Reader::from_reader(reader).deserialize().enumerate() {
        let row: ResidentRow = row?;
        let line = index + 2;
        let home = match row.home.parse::<Coordinate>() {
            Ok(home) => home,
            Err(source) => match policy {
                MalformedRowPolicy::Reject => return Err(LoadError::Coordinate { row: line, source }),
                MalformedRowPolicy::Skip => {
                    tracing::warn!(row = line, resident = row.id, error = %source, "skipping resident row");
                    continue;
                }
            },
        };

        residents.push(ResidentProfile {
            id: row.id,
            age: row.age,
            gender: row.gender,
            occupation: row.occupation,
            family_role: row.family_role,
            budget_level: row.budget_level,
            home,
        });
    }

    Ok(residents)
}

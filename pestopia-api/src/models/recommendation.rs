//! `/recommend` request and response models

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct RecommendRequest {
    pub pest_name: String,
}

/// One chemical control option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChemicalSolution {
    pub pesticide: String,
    pub dosage: String,
    pub notes: String,
}

/// Structured pest-management guidance, built fresh for each request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRecord {
    pub pest_name: String,
    pub pest_info: String,
    pub ipm_solutions: Vec<String>,
    pub chemical_solutions: Vec<ChemicalSolution>,
    pub prevention_tips: Vec<String>,
}

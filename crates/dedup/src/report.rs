use std::collections::HashSet;

use crate::error::DedupError;
use crate::model::{AnalysisReport, MergeLog};

impl AnalysisReport {
    pub fn from_json(json: &str) -> Result<Self, DedupError> {
        serde_json::from_str(json).map_err(|e| DedupError::ReportParse(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, DedupError> {
        serde_json::to_string_pretty(self).map_err(|e| DedupError::Serialize(e.to_string()))
    }

    /// Structural checks a report must pass before it drives execution.
    ///
    /// Reports are often reviewed and pruned by hand between analysis and
    /// execution, so summary counts are not cross-checked against the groups.
    pub fn validate(&self) -> Result<(), DedupError> {
        let canonicals: HashSet<(&str, &str)> = self
            .groups
            .iter()
            .map(|g| (g.canonical.id.as_str(), g.canonical.collection.as_str()))
            .collect();

        for group in &self.groups {
            let key = &group.title_key;
            if group.canonical.id.is_empty() {
                return Err(DedupError::ReportValidation(format!(
                    "group '{key}': canonical id is empty"
                )));
            }

            let mut seen = HashSet::new();
            let candidates = group
                .merge_into_canonical
                .iter()
                .chain(&group.keep_as_variants);
            for candidate in candidates {
                let id = (candidate.id.as_str(), candidate.collection.as_str());
                if canonicals.contains(&id) {
                    return Err(DedupError::ReportValidation(format!(
                        "group '{key}': candidate '{}' is a canonical",
                        candidate.id
                    )));
                }
                if !seen.insert(id) {
                    return Err(DedupError::ReportValidation(format!(
                        "group '{key}': candidate '{}' listed more than once",
                        candidate.id
                    )));
                }
            }

            let listed = 1 + seen.len();
            if group.member_count < listed {
                return Err(DedupError::ReportValidation(format!(
                    "group '{key}': member_count {} is below the {listed} recipes listed",
                    group.member_count
                )));
            }
        }
        Ok(())
    }
}

impl MergeLog {
    pub fn to_json(&self) -> Result<String, DedupError> {
        serde_json::to_string_pretty(self).map_err(|e| DedupError::Serialize(e.to_string()))
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordCategory {
    WorkExperience,
    Project,
    Skill,
    Other,
}

impl fmt::Display for RecordCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordCategory::WorkExperience => "work_experience",
            RecordCategory::Project => "project",
            RecordCategory::Skill => "skill",
            RecordCategory::Other => "other",
        };
        f.write_str(s)
    }
}

/// One searchable piece of a candidate profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceRecord {
    /// Unique within a profile.
    pub id: String,
    pub category: RecordCategory,
    /// Normalised prose; never empty once indexed.
    pub text: String,
    /// Present only when the index was built with vectors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl ExperienceRecord {
    pub fn new(id: impl Into<String>, category: RecordCategory, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            category,
            text: text.into(),
            embedding: None,
        }
    }
}

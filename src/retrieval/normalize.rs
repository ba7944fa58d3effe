//! Canonicalisation of heterogeneous profile fields.
//!
//! Profile data arrives in loose shapes: a field may be a string, a list of
//! strings, nested objects or absent. Everything passes through
//! [`normalize_field`] before it reaches the index.

use serde_json::{Map, Value};

use super::record::{ExperienceRecord, RecordCategory};

/// Flatten a field into a list of non-empty strings.
///
/// - `null`, empty strings and empty containers yield `[]`
/// - scalars yield one entry
/// - arrays are flattened in order
/// - objects yield their values in key order
pub fn normalize_field(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                Vec::new()
            } else {
                vec![s.to_string()]
            }
        }
        Value::Bool(b) => vec![b.to_string()],
        Value::Number(n) => vec![n.to_string()],
        Value::Array(items) => items.iter().flat_map(normalize_field).collect(),
        Value::Object(map) => map.values().flat_map(normalize_field).collect(),
    }
}

/// Join an object's fields into prose, `leading` keys first.
fn object_text(map: &Map<String, Value>, leading: &[&str]) -> String {
    let mut parts: Vec<String> = leading
        .iter()
        .filter_map(|k| map.get(*k))
        .flat_map(normalize_field)
        .collect();
    parts.extend(
        map.iter()
            .filter(|(k, _)| !leading.contains(&k.as_str()))
            .flat_map(|(_, v)| normalize_field(v)),
    );
    parts.join(". ")
}

fn item_text(item: &Value, leading: &[&str]) -> String {
    match item {
        Value::Object(map) => object_text(map, leading),
        other => normalize_field(other).join(". "),
    }
}

const WORK_KEYS: &[&str] = &["company", "position", "title", "description", "responsibilities"];
const PROJECT_KEYS: &[&str] = &["name", "role", "description"];
const EDUCATION_KEYS: &[&str] = &["university", "school", "major", "degree"];
const CREDENTIAL_KEYS: &[&str] = &["name", "title", "issuer"];
const PERSONAL_KEYS: &[&str] = &["name", "location"];
/// Contact details never become evidence.
const CONTACT_KEYS: &[&str] = &["email", "phone", "address", "links"];

/// Split a raw profile into experience records.
///
/// Only the known profile sections are indexed; bookkeeping such as
/// `profile_metadata` and any unknown key is skipped. List sections yield
/// one record per item. Aliases of a section (`experience`, `projects`, ...)
/// are merged before numbering, so ids stay unique and the same profile
/// always yields the same ids.
pub fn records_from_profile(profile: &Value) -> Vec<ExperienceRecord> {
    let Value::Object(map) = profile else {
        let text = normalize_field(profile).join(". ");
        return if text.is_empty() {
            Vec::new()
        } else {
            vec![ExperienceRecord::new("other-0", RecordCategory::Other, text)]
        };
    };

    let mut records = Vec::new();
    if let Some(Value::Object(personal)) = map.get("personal_info") {
        let visible: Map<String, Value> = personal
            .iter()
            .filter(|(k, _)| !CONTACT_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        push_single(&mut records, "personal_info", &object_text(&visible, PERSONAL_KEYS));
    }
    push_items(
        &mut records,
        "education",
        RecordCategory::Other,
        &section(map, &["education"]),
        EDUCATION_KEYS,
    );
    push_items(
        &mut records,
        "work",
        RecordCategory::WorkExperience,
        &section(map, &["work_experience", "experience", "experiences"]),
        WORK_KEYS,
    );
    push_items(
        &mut records,
        "project",
        RecordCategory::Project,
        &section(map, &["projects", "project"]),
        PROJECT_KEYS,
    );
    if let Some(skills) = map.get("skills") {
        push_skills(&mut records, skills);
    }
    push_items(
        &mut records,
        "certification",
        RecordCategory::Other,
        &section(map, &["certifications"]),
        CREDENTIAL_KEYS,
    );
    push_items(
        &mut records,
        "award",
        RecordCategory::Other,
        &section(map, &["awards"]),
        CREDENTIAL_KEYS,
    );
    if let Some(goals) = map.get("career_goals") {
        push_single(&mut records, "career_goals", &item_text(goals, &[]));
    }
    if let Some(interests) = map.get("interests") {
        push_single(&mut records, "interests", &normalize_field(interests).join(", "));
    }
    records
}

/// Items of every alias of a section, in alias order.
fn section<'a>(map: &'a Map<String, Value>, aliases: &[&str]) -> Vec<&'a Value> {
    aliases
        .iter()
        .filter_map(|k| map.get(*k))
        .flat_map(section_items)
        .collect()
}

/// Items of a section that may be a list, a single entry or null.
fn section_items(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        single => vec![single],
    }
}

fn push_single(records: &mut Vec<ExperienceRecord>, id: &str, text: &str) {
    if !text.is_empty() {
        records.push(ExperienceRecord::new(id, RecordCategory::Other, text));
    }
}

fn push_items(
    records: &mut Vec<ExperienceRecord>,
    prefix: &str,
    category: RecordCategory,
    items: &[&Value],
    leading: &[&str],
) {
    for (i, item) in items.iter().enumerate() {
        let text = item_text(item, leading);
        if !text.is_empty() {
            records.push(ExperienceRecord::new(format!("{prefix}-{i}"), category, text));
        }
    }
}

fn push_skills(records: &mut Vec<ExperienceRecord>, value: &Value) {
    match value {
        Value::Object(groups) => {
            for (group, skills) in groups {
                let list = normalize_field(skills);
                if !list.is_empty() {
                    records.push(ExperienceRecord::new(
                        format!("skill-{group}"),
                        RecordCategory::Skill,
                        format!("{group}: {}", list.join(", ")),
                    ));
                }
            }
        }
        other => {
            let list = normalize_field(other);
            if !list.is_empty() {
                records.push(ExperienceRecord::new(
                    "skill-0",
                    RecordCategory::Skill,
                    list.join(", "),
                ));
            }
        }
    }
}

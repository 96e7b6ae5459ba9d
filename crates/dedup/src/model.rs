use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A single recipe record as exchanged with loader/persistence collaborators.
///
/// Absent or `null` optional fields take their default. Fields this crate does
/// not model are kept in `extra`. Written through `corpus::to_json`, every
/// field execution did not change comes back exactly as it was read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub collection: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: String,
    /// Explicit provenance hint, consulted by source priority resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ingredients: Vec<Ingredient>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub instructions: Vec<InstructionStep>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub image_refs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_of: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    /// The record as it was read, kept so unchanged fields are written back
    /// verbatim. Set by `corpus::parse_corpus`.
    #[serde(skip)]
    pub(crate) loaded: Option<Arc<LoadedDocument>>,
}

/// A decoded record's source object alongside its typed re-encoding. A field
/// whose current encoding still equals `baseline` is untouched and is written
/// from `original`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LoadedDocument {
    pub original: Map<String, Value>,
    pub baseline: Map<String, Value>,
}

impl Recipe {
    /// Minimal recipe with only identity fields set.
    pub fn new(id: impl Into<String>, collection: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            collection: collection.into(),
            title: title.into(),
            category: String::new(),
            source: None,
            ingredients: Vec::new(),
            instructions: Vec::new(),
            sources: Vec::new(),
            image_refs: Vec::new(),
            source_notes: None,
            variant_of: None,
            variant_note: None,
            confidence: None,
            extra: Map::new(),
            loaded: None,
        }
    }

    pub fn confidence_flags(&self) -> &[String] {
        self.confidence.as_ref().map(|c| c.flags.as_slice()).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Ingredient {
    #[serde(default, deserialize_with = "null_as_default")]
    pub item: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub quantity: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prep_note: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Ingredient {
    pub fn new(item: impl Into<String>, quantity: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            quantity: quantity.into(),
            unit: unit.into(),
            prep_note: None,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InstructionStep {
    /// Informational only; unparseable numbers read as `None`.
    #[serde(default, deserialize_with = "lenient_step", skip_serializing_if = "Option::is_none")]
    pub step: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InstructionStep {
    pub fn new(step: u32, text: impl Into<String>) -> Self {
        Self {
            step: Some(step),
            text: text.into(),
            extra: Map::new(),
        }
    }
}

/// Diagnostic block attached by upstream repair passes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Confidence {
    #[serde(default, deserialize_with = "null_as_default")]
    pub flags: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Quantities arrive as `"1 1/2"`, `2`, `0.5` or `null` depending on the source.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(other) => Err(serde::de::Error::custom(format!(
            "quantity must be a string or number, got {other}"
        ))),
    }
}

/// Step numbers arrive as `3`, `"3"`, `"3."` or free text from OCR passes.
fn lenient_step<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let step = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().trim_end_matches(['.', ')']).parse().ok(),
        _ => None,
    };
    Ok(step)
}

// ---------------------------------------------------------------------------
// Similarity + classification
// ---------------------------------------------------------------------------

/// The three pairwise scores plus the provenance comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimilarityScores {
    pub exact_ingredient_score: f64,
    pub item_ingredient_score: f64,
    pub instruction_similarity: f64,
    pub same_source: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Merge,
    Variant,
    Different,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Merge => write!(f, "merge"),
            Self::Variant => write!(f, "variant"),
            Self::Different => write!(f, "different"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub verdict: Verdict,
    pub reason: String,
    /// 1-based index of the rule that fired; `None` for the fallback.
    pub rule: Option<usize>,
}

// ---------------------------------------------------------------------------
// Analysis report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRef {
    pub id: String,
    pub collection: String,
    pub title: String,
    pub source: String,
    pub priority: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEntry {
    pub id: String,
    pub collection: String,
    pub title: String,
    pub source: String,
    pub exact_ingredient_score: f64,
    pub item_ingredient_score: f64,
    pub instruction_similarity: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAnalysis {
    pub title_key: String,
    pub member_count: usize,
    pub canonical: CanonicalRef,
    pub merge_into_canonical: Vec<CandidateEntry>,
    pub keep_as_variants: Vec<CandidateEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub total_recipes: usize,
    pub title_groups_analyzed: usize,
    pub groups_with_merges: usize,
    pub groups_with_variants_only: usize,
    pub groups_with_both: usize,
    pub total_recipes_to_merge: usize,
    pub total_variants_to_link: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMeta {
    pub engine_version: String,
    pub generated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub meta: ReportMeta,
    pub summary: AnalysisSummary,
    pub groups: Vec<GroupAnalysis>,
}

// ---------------------------------------------------------------------------
// Merge log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeEntry {
    pub canonical_id: String,
    pub merged_id: String,
    pub source: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantLinkEntry {
    pub variant_id: String,
    pub canonical_id: String,
    pub reason: String,
}

/// A pre-existing `variant_of` rewritten because its target was merged away.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedirectEntry {
    pub recipe_id: String,
    pub from: String,
    /// `None` when the target was absorbed by `recipe_id` itself; the link
    /// and its note were dropped rather than pointed at the recipe.
    pub to: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeErrorKind {
    CanonicalNotFound,
    CandidateNotFound,
    CandidateIsCanonical,
    SelfReference,
    AlreadyMerged,
    AlreadyLinked,
}

impl std::fmt::Display for MergeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::CanonicalNotFound => "canonical_not_found",
            Self::CandidateNotFound => "candidate_not_found",
            Self::CandidateIsCanonical => "candidate_is_canonical",
            Self::SelfReference => "self_reference",
            Self::AlreadyMerged => "already_merged",
            Self::AlreadyLinked => "already_linked",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeError {
    pub kind: MergeErrorKind,
    pub group: String,
    pub canonical_id: String,
    pub candidate_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MergeSummary {
    pub recipes_before: usize,
    pub recipes_after: usize,
    pub merged: usize,
    pub deleted: usize,
    pub variants_linked: usize,
    pub redirects: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeLog {
    pub timestamp: String,
    pub dry_run: bool,
    pub merges: Vec<MergeEntry>,
    pub variants_linked: Vec<VariantLinkEntry>,
    pub redirects: Vec<RedirectEntry>,
    pub errors: Vec<MergeError>,
    pub summary: MergeSummary,
}

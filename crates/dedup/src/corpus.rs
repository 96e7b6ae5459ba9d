//! Corpus codec and multi-collection aggregation.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::DedupError;
use crate::model::{LoadedDocument, Recipe};

/// Characters of joined ingredient text that feed a signature.
const SIGNATURE_INGREDIENT_CHARS: usize = 200;

/// Decode a corpus: either a bare array of recipes or `{"recipes": [...]}`.
pub fn parse_corpus(json: &str) -> Result<Vec<Recipe>, DedupError> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| DedupError::CorpusParse(e.to_string()))?;
    let documents = match value {
        Value::Array(items) => items,
        Value::Object(mut wrapper) => match wrapper.remove("recipes") {
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(DedupError::CorpusParse(format!(
                    "'recipes' must be an array, got {}",
                    json_kind(&other)
                )))
            }
            None => return Err(DedupError::CorpusParse("missing field `recipes`".into())),
        },
        other => {
            return Err(DedupError::CorpusParse(format!(
                "expected an array of recipes or an object with 'recipes', got {}",
                json_kind(&other)
            )))
        }
    };

    let recipes = documents
        .into_iter()
        .enumerate()
        .map(|(i, document)| {
            read_recipe(document)
                .map_err(|e| DedupError::CorpusParse(format!("recipe {}: {e}", i + 1)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if recipes.is_empty() {
        return Err(DedupError::EmptyCorpus);
    }
    Ok(recipes)
}

fn read_recipe(document: Value) -> Result<Recipe, String> {
    let original = match document {
        Value::Object(map) => map,
        other => return Err(format!("expected an object, got {}", json_kind(&other))),
    };
    let mut recipe: Recipe =
        serde_json::from_value(Value::Object(original.clone())).map_err(|e| e.to_string())?;
    let baseline = match serde_json::to_value(&recipe).map_err(|e| e.to_string())? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    recipe.loaded = Some(Arc::new(LoadedDocument { original, baseline }));
    Ok(recipe)
}

/// Encode one recipe for persistence. For a recipe read by `parse_corpus`,
/// each field whose value execution did not change is written exactly as it
/// was read (nulls, empty lists, numeric quantities, key order); absent fields
/// stay absent and changed or new fields follow the original keys.
pub fn render(recipe: &Recipe) -> Result<Value, DedupError> {
    let current = serde_json::to_value(recipe).map_err(|e| DedupError::Serialize(e.to_string()))?;
    let Some(loaded) = recipe.loaded.as_deref() else {
        return Ok(current);
    };
    let current = match current {
        Value::Object(map) => map,
        other => return Ok(other),
    };

    let mut out = Map::new();
    for (key, original) in &loaded.original {
        let now = current.get(key);
        if now == loaded.baseline.get(key) {
            out.insert(key.clone(), original.clone());
        } else if let Some(now) = now {
            out.insert(key.clone(), now.clone());
        }
    }
    for (key, now) in current {
        if !loaded.original.contains_key(&key) && loaded.baseline.get(&key) != Some(&now) {
            out.insert(key, now);
        }
    }
    Ok(Value::Object(out))
}

pub fn to_json(recipes: &[Recipe]) -> Result<String, DedupError> {
    let documents = recipes.iter().map(render).collect::<Result<Vec<_>, _>>()?;
    serde_json::to_string_pretty(&documents).map_err(|e| DedupError::Serialize(e.to_string()))
}

/// Exact-duplicate key: SHA-256 over id, collection, title and the leading
/// ingredient text, hex encoded.
pub fn signature(recipe: &Recipe) -> String {
    let ingredients = recipe
        .ingredients
        .iter()
        .map(|i| i.item.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let prefix: String = ingredients.chars().take(SIGNATURE_INGREDIENT_CHARS).collect();

    let mut hasher = Sha256::new();
    for part in [&recipe.id, &recipe.collection, &recipe.title, &prefix] {
        hasher.update(part.as_bytes());
        hasher.update([0x1f_u8]);
    }
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuppressedRecipe {
    pub id: String,
    pub collection: String,
    pub signature: String,
    /// Index of the collection the duplicate came from.
    pub collection_index: usize,
}

#[derive(Debug, Clone)]
pub struct AggregateOutcome {
    pub recipes: Vec<Recipe>,
    pub suppressed: Vec<SuppressedRecipe>,
}

/// Concatenate collections in order, dropping exact duplicates by signature.
/// The first occurrence wins.
pub fn aggregate(collections: Vec<Vec<Recipe>>) -> AggregateOutcome {
    let mut seen = HashSet::new();
    let mut recipes = Vec::new();
    let mut suppressed = Vec::new();

    for (collection_index, collection) in collections.into_iter().enumerate() {
        for recipe in collection {
            let sig = signature(&recipe);
            if seen.insert(sig.clone()) {
                recipes.push(recipe);
            } else {
                debug!(id = %recipe.id, collection = %recipe.collection, "suppressed exact duplicate");
                suppressed.push(SuppressedRecipe {
                    id: recipe.id,
                    collection: recipe.collection,
                    signature: sig,
                    collection_index,
                });
            }
        }
    }

    AggregateOutcome { recipes, suppressed }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

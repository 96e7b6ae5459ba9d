//! Source priority resolution — which provenance wins when records collide.
//!
//! Resolution order, first hit wins:
//! 1. exact collection name in the priority table
//! 2. a known token inside the recipe id
//! 3. a known token inside the explicit `source` field
//! 4. the default (lowest) priority

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::{PriorityConfig, SourceToken};
use crate::model::Recipe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityBasis {
    Collection,
    IdToken,
    SourceToken,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSource {
    pub name: String,
    pub priority: u32,
    pub basis: PriorityBasis,
}

#[derive(Debug, Clone)]
pub struct SourcePriorityResolver {
    collections: BTreeMap<String, u32>,
    tokens: Vec<SourceToken>,
    default_priority: u32,
}

impl SourcePriorityResolver {
    pub fn new(config: &PriorityConfig) -> Self {
        Self {
            collections: config
                .collections
                .iter()
                .map(|(name, p)| (name.trim().to_lowercase(), *p))
                .collect(),
            tokens: config
                .tokens
                .iter()
                .map(|t| SourceToken {
                    token: t.token.trim().to_lowercase(),
                    source: t.source.clone(),
                    priority: t.priority,
                })
                .collect(),
            default_priority: config.default_priority,
        }
    }

    pub fn resolve(&self, recipe: &Recipe) -> ResolvedSource {
        let collection = recipe.collection.trim().to_lowercase();
        if let Some(&priority) = self.collections.get(&collection) {
            return ResolvedSource {
                name: collection,
                priority,
                basis: PriorityBasis::Collection,
            };
        }

        let id = recipe.id.to_lowercase();
        if let Some(token) = self.find_token(&id) {
            return ResolvedSource {
                name: token.source_name().to_string(),
                priority: token.priority,
                basis: PriorityBasis::IdToken,
            };
        }

        let explicit = recipe.source.as_deref().map(str::trim).unwrap_or("");
        if let Some(token) = self.find_token(&explicit.to_lowercase()) {
            return ResolvedSource {
                name: token.source_name().to_string(),
                priority: token.priority,
                basis: PriorityBasis::SourceToken,
            };
        }

        let name = if !collection.is_empty() {
            collection
        } else if !explicit.is_empty() {
            explicit.to_lowercase()
        } else {
            "unknown".to_string()
        };
        ResolvedSource {
            name,
            priority: self.default_priority,
            basis: PriorityBasis::Default,
        }
    }

    pub fn priority(&self, recipe: &Recipe) -> u32 {
        self.resolve(recipe).priority
    }

    /// Canonical-selection key `(priority, id, collection)`; ascending order
    /// puts the canonical first. Collection only breaks ties between equal ids
    /// from different sources.
    pub fn sort_key<'r>(&self, recipe: &'r Recipe) -> (u32, &'r str, &'r str) {
        (self.priority(recipe), recipe.id.as_str(), recipe.collection.as_str())
    }

    pub fn compare(&self, a: &Recipe, b: &Recipe) -> Ordering {
        self.sort_key(a).cmp(&self.sort_key(b))
    }

    fn find_token(&self, haystack: &str) -> Option<&SourceToken> {
        if haystack.is_empty() {
            return None;
        }
        self.tokens.iter().find(|t| haystack.contains(t.token.as_str()))
    }
}

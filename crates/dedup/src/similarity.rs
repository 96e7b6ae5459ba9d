use std::collections::{BTreeSet, HashMap};

use crate::model::{Recipe, SimilarityScores};
use crate::normalize::{IngredientKey, Normalizer};
use crate::priority::{ResolvedSource, SourcePriorityResolver};

/// Everything the scorer needs from one recipe, normalized once.
#[derive(Debug, Clone)]
pub struct RecipeProfile {
    pub exact: BTreeSet<IngredientKey>,
    pub items: BTreeSet<String>,
    pub instructions: String,
    pub source: ResolvedSource,
}

pub struct SimilarityScorer<'a> {
    normalizer: &'a Normalizer,
    resolver: &'a SourcePriorityResolver,
}

impl<'a> SimilarityScorer<'a> {
    pub fn new(normalizer: &'a Normalizer, resolver: &'a SourcePriorityResolver) -> Self {
        Self {
            normalizer,
            resolver,
        }
    }

    pub fn profile(&self, recipe: &Recipe) -> RecipeProfile {
        let mut exact = BTreeSet::new();
        let mut items = BTreeSet::new();
        for ingredient in &recipe.ingredients {
            let key = self.normalizer.ingredient(ingredient);
            if key.item.is_empty() {
                continue;
            }
            items.insert(key.item.clone());
            exact.insert(key);
        }

        let instructions = recipe
            .instructions
            .iter()
            .map(|step| self.normalizer.instruction(&step.text))
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        RecipeProfile {
            exact,
            items,
            instructions,
            source: self.resolver.resolve(recipe),
        }
    }

    pub fn score(&self, a: &Recipe, b: &Recipe) -> SimilarityScores {
        score_profiles(&self.profile(a), &self.profile(b))
    }
}

pub fn score_profiles(a: &RecipeProfile, b: &RecipeProfile) -> SimilarityScores {
    SimilarityScores {
        exact_ingredient_score: overlap(&a.exact, &b.exact),
        item_ingredient_score: overlap(&a.items, &b.items),
        instruction_similarity: sequence_ratio(&a.instructions, &b.instructions),
        same_source: a.source.name == b.source.name,
    }
}

/// `|A ∩ B| / max(|A|, |B|)`; zero when either side is empty.
pub fn overlap<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    shared as f64 / a.len().max(b.len()) as f64
}

// ---------------------------------------------------------------------------
// Longest-matching-blocks ratio
// ---------------------------------------------------------------------------

/// Character-level similarity `2·M / (|a| + |b|)`, where `M` is the total
/// size of the matching blocks found by recursively taking the longest common
/// substring and recursing on both sides of it.
///
/// The block search breaks ties towards the earliest position, which makes
/// the raw algorithm order-sensitive; inputs are put in a fixed order first
/// so `sequence_ratio(a, b) == sequence_ratio(b, a)`. No junk heuristic.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    let a: Vec<char> = first.chars().collect();
    let b: Vec<char> = second.chars().collect();

    let matched = matching_characters(&a, &b);
    2.0 * matched as f64 / (a.len() + b.len()) as f64
}

fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut finder = BlockFinder::new(a, b);

    let mut total = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, size) = finder.longest_match(alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        total += size;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            queue.push((i + size, ahi, j + size, bhi));
        }
    }
    total
}

/// Longest-block search state. The run-length rows are allocated once per
/// pair and cleared through the touched lists, so every search costs time
/// proportional to the matches it visits.
struct BlockFinder<'s> {
    a: &'s [char],
    b2j: HashMap<char, Vec<usize>>,
    /// `j2len[j]`: length of the match ending at `a[i - 1]`, `b[j]`.
    j2len: Vec<usize>,
    next: Vec<usize>,
    touched: Vec<usize>,
    next_touched: Vec<usize>,
}

impl<'s> BlockFinder<'s> {
    fn new(a: &'s [char], b: &[char]) -> Self {
        let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, c) in b.iter().enumerate() {
            b2j.entry(*c).or_default().push(j);
        }
        Self {
            a,
            b2j,
            j2len: vec![0; b.len()],
            next: vec![0; b.len()],
            touched: Vec::new(),
            next_touched: Vec::new(),
        }
    }

    /// Longest common block within `a[alo..ahi]` and `b[blo..bhi]`, earliest
    /// in `a` then earliest in `b` on ties. Returns `(i, j, size)`.
    fn longest_match(&mut self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> (usize, usize, usize) {
        let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);

        for i in alo..ahi {
            if let Some(positions) = self.b2j.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = if j > blo { self.j2len[j - 1] } else { 0 } + 1;
                    self.next[j] = k;
                    self.next_touched.push(j);
                    if k > best_size {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_size = k;
                    }
                }
            }
            for &j in &self.touched {
                self.j2len[j] = 0;
            }
            self.touched.clear();
            std::mem::swap(&mut self.j2len, &mut self.next);
            std::mem::swap(&mut self.touched, &mut self.next_touched);
        }
        for &j in &self.touched {
            self.j2len[j] = 0;
        }
        self.touched.clear();

        (best_i, best_j, best_size)
    }
}

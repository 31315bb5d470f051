use std::collections::HashSet;
use tracing::{debug, info};

/// One way of deriving a keyword variant from the normalized keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantTransform {
    Identity,
    SpacesToHyphens,
    RemoveSpaces,
    /// Naive pluralization: append a fixed suffix ("r", "er").
    Suffix(String),
}

impl VariantTransform {
    fn apply(&self, keyword: &str) -> String {
        match self {
            VariantTransform::Identity => keyword.to_string(),
            VariantTransform::SpacesToHyphens => keyword.split_whitespace().collect::<Vec<_>>().join("-"),
            VariantTransform::RemoveSpaces => keyword.split_whitespace().collect(),
            VariantTransform::Suffix(suffix) => format!("{}{}", keyword, suffix),
        }
    }
}

/// Substring matcher over the variants of one keyword.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    variants: Vec<String>,
}

impl KeywordMatcher {
    pub fn default_transforms() -> Vec<VariantTransform> {
        vec![
            VariantTransform::Identity,
            VariantTransform::SpacesToHyphens,
            VariantTransform::RemoveSpaces,
            VariantTransform::Suffix("r".to_string()),
            VariantTransform::Suffix("er".to_string()),
        ]
    }

    pub fn new(keyword: &str) -> Self {
        Self::with_transforms(keyword, &Self::default_transforms())
    }

    pub fn with_transforms(keyword: &str, transforms: &[VariantTransform]) -> Self {
        let normalized = keyword.trim().to_lowercase();
        let mut variants: Vec<String> = Vec::new();
        if !normalized.is_empty() {
            for transform in transforms {
                let variant = transform.apply(&normalized);
                if !variant.is_empty() && !variants.contains(&variant) {
                    variants.push(variant);
                }
            }
        }
        KeywordMatcher { variants }
    }

    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    /// An empty keyword matches everything.
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// `haystack` is expected to be lowercased already.
    pub fn matches_lowercase(&self, haystack: &str) -> bool {
        self.is_empty() || self.variants.iter().any(|v| haystack.contains(v.as_str()))
    }

    pub fn matches(&self, text: &str) -> bool {
        self.matches_lowercase(&text.to_lowercase())
    }
}

/// Case-insensitive substring test; an empty category matches everything.
pub fn matches_category(text: &str, category: &str) -> bool {
    let category = category.trim().to_lowercase();
    category.is_empty() || text.to_lowercase().contains(&category)
}

/// Narrows discovered candidates down to the URLs one run will fetch.
pub struct UrlFilter {
    keyword: KeywordMatcher,
    category: String,
    max_products: usize,
    full_index: bool,
}

impl UrlFilter {
    pub fn new(keyword: &str, category: &str, max_products: usize, full_index: bool) -> Self {
        UrlFilter {
            keyword: KeywordMatcher::new(keyword),
            category: category.to_string(),
            max_products,
            full_index,
        }
    }

    /// Dedup (first occurrence wins), keyword filter, category filter, then
    /// cap unless running a full index. Discovery order is preserved.
    pub fn select(&self, candidates: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        let unique: Vec<&String> = candidates
            .iter()
            .filter(|url| seen.insert(url.as_str()))
            .collect();

        debug!("Keyword variants: {:?}", self.keyword.variants());
        let by_keyword: Vec<&String> = unique
            .into_iter()
            .filter(|url| self.keyword.matches(url))
            .collect();
        if !self.keyword.is_empty() {
            info!("After keyword filter: {}", by_keyword.len());
        }

        let by_category: Vec<&String> = by_keyword
            .into_iter()
            .filter(|url| matches_category(url, &self.category))
            .collect();
        if !self.category.trim().is_empty() {
            info!("After category filter: {}", by_category.len());
        }

        let selected = by_category.into_iter().cloned();
        if self.full_index {
            selected.collect()
        } else {
            selected.take(self.max_products).collect()
        }
    }
}

/// Drop every URL that is already a key of the cache.
pub fn exclude_cached(urls: Vec<String>, cached: &HashSet<String>) -> Vec<String> {
    urls.into_iter().filter(|url| !cached.contains(url)).collect()
}

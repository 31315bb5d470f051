use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const CURRENCY: &str = "NOK";
pub const SOURCE: &str = "Jula";

/// One scraped product page. `url` is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub name: Option<String>,
    pub article_number: Option<String>,
    pub ean: Option<String>,
    pub brand: Option<String>,
    pub url: String,
    /// Whole kroner.
    pub price: Option<i64>,
    pub price_ex_vat: Option<f64>,
    pub currency: String,
    #[serde(default)]
    pub categories: Vec<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub specs: BTreeMap<String, String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub vesa_sizes: Option<Vec<String>>,
    #[serde(default)]
    pub in_stock: bool,
    pub available_in_stores: Option<i64>,
    pub rating: Option<f64>,
    pub review_count: Option<i64>,
    pub source: String,
    pub scraped_at: DateTime<Utc>,
}

impl ProductRecord {
    /// A record with nothing extracted yet.
    pub fn empty(url: &str) -> Self {
        ProductRecord {
            name: None,
            article_number: None,
            ean: None,
            brand: None,
            url: url.to_string(),
            price: None,
            price_ex_vat: None,
            currency: CURRENCY.to_string(),
            categories: Vec::new(),
            description: None,
            features: Vec::new(),
            specs: BTreeMap::new(),
            images: Vec::new(),
            vesa_sizes: None,
            in_stock: false,
            available_in_stores: None,
            rating: None,
            review_count: None,
            source: SOURCE.to_string(),
            scraped_at: Utc::now(),
        }
    }

    /// Lowercased text the search-only mode matches keywords against.
    pub fn search_haystack(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        parts.extend(self.name.clone());
        parts.extend(self.description.clone());
        parts.extend(self.brand.clone());
        parts.push(self.categories.join(" "));
        parts.push(serde_json::to_string(&self.features).unwrap_or_default());
        parts.push(serde_json::to_string(&self.specs).unwrap_or_default());
        parts.join(" ").to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_field_names() {
        let mut record = ProductRecord::empty("https://www.jula.no/catalog/a/b-1/");
        record.price_ex_vat = Some(79.2);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["url"], "https://www.jula.no/catalog/a/b-1/");
        assert_eq!(value["priceExVat"], 79.2);
        assert_eq!(value["currency"], "NOK");
        assert!(value["articleNumber"].is_null());
        assert!(value.get("scrapedAt").is_some());
    }

    #[test]
    fn test_search_haystack_includes_specs() {
        let mut record = ProductRecord::empty("https://www.jula.no/catalog/a/b-1/");
        record.name = Some("TV-Veggfeste".to_string());
        record.specs.insert("VESA".to_string(), "400x400".to_string());
        let haystack = record.search_haystack();
        assert!(haystack.contains("tv-veggfeste"));
        assert!(haystack.contains("\"vesa\":\"400x400\""));
    }
}

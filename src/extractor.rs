use crate::error::{Result, ScraperError};
use crate::patterns::{Field, FieldValue, FIELD_PATTERNS};
use crate::product::ProductRecord;
use crate::sitemap::CATALOG_MARKER;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, HashSet};
use url::Url;

const BRAND_MARKER: &str = "/varemerker/";
const IMAGE_MARKERS: [&str; 2] = ["catalog", "product"];
const IMAGE_EXCLUDES: [&str; 2] = ["logo", "icon"];

pub const MAX_FEATURES: usize = 20;
pub const MAX_IMAGES: usize = 10;
const MAX_SPEC_KEY_CHARS: usize = 99;
const SUMMARY_MAX_CHARS: usize = 500;

lazy_static! {
    static ref PRICE_REGEX: Regex = Regex::new(r"(\d[\d\s]*)").unwrap();
    /// Group 1 marks a negated phrase ("ikke på lager").
    static ref IN_STOCK_REGEX: Regex =
        Regex::new(r"(?i)(\bikke\s+)?(på lager|tilgjengelig på nett)").unwrap();
    static ref VESA_REGEX: Regex = Regex::new(r"(?i)(\d{2,3})\s*x\s*(\d{2,3})\s*mm").unwrap();
}

/// How the free-text description is pulled out of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DescriptionStrategy {
    /// Every paragraph of 21..=1999 characters, blank-line separated.
    #[default]
    Paragraphs,
    /// First element with "description" in its class, cut at 500 characters.
    Summary,
}

struct Selectors {
    heading: Selector,
    brand: Selector,
    price: Selector,
    price_attr: Selector,
    body: Selector,
    paragraph: Selector,
    description_block: Selector,
    list_item: Selector,
    definition_list: Selector,
    definition_part: Selector,
    table_row: Selector,
    table_cell: Selector,
    image: Selector,
    primary_image: Selector,
}

impl Selectors {
    fn compile() -> Result<Self> {
        Ok(Selectors {
            heading: parse_selector("h1")?,
            brand: parse_selector(&format!(r#"a[href*="{}"]"#, BRAND_MARKER))?,
            price: parse_selector(r#"[class*="price"], [class*="Price"]"#)?,
            price_attr: parse_selector("[data-price]")?,
            body: parse_selector("body")?,
            paragraph: parse_selector("p")?,
            description_block: parse_selector(r#"[class*="description"]"#)?,
            list_item: parse_selector("li")?,
            definition_list: parse_selector("dl")?,
            definition_part: parse_selector("dt, dd")?,
            table_row: parse_selector("tr")?,
            table_cell: parse_selector("th, td")?,
            image: parse_selector("img[src]")?,
            primary_image: parse_selector(r#"meta[property="og:image"]"#)?,
        })
    }
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScraperError::Selector(format!("{}: {:?}", css, e)))
}

/// Maps one fetched product page to a [`ProductRecord`].
///
/// Every field is extracted on its own; a field whose source is missing or
/// malformed comes back as `None` (or empty) without affecting the others.
pub struct ProductExtractor {
    selectors: Selectors,
    description: DescriptionStrategy,
}

impl ProductExtractor {
    pub fn new(description: DescriptionStrategy) -> Result<Self> {
        Ok(ProductExtractor {
            selectors: Selectors::compile()?,
            description,
        })
    }

    pub fn extract(&self, html: &str, url: &str) -> ProductRecord {
        let document = Html::parse_document(html);
        let body_text = self.body_text(&document);
        let mut record = ProductRecord::empty(url);

        record.name = self.first_text(&document, &self.selectors.heading);
        record.brand = self.first_text(&document, &self.selectors.brand);
        record.price = self.extract_price(&document);
        record.categories = categories_from_url(url);
        record.description = match self.description {
            DescriptionStrategy::Paragraphs => self.description_paragraphs(&document),
            DescriptionStrategy::Summary => self.description_summary(&document),
        };
        record.features = self.extract_features(&document);
        record.specs = self.extract_specs(&document);
        record.images = self.extract_images(&document, url);
        record.vesa_sizes = extract_vesa_sizes(&body_text);

        record.in_stock = IN_STOCK_REGEX
            .captures_iter(&body_text)
            .any(|caps| caps.get(1).is_none());

        for pattern in FIELD_PATTERNS.iter() {
            let value = pattern.extract(&body_text);
            match (pattern.field, value) {
                (Field::ArticleNumber, Some(FieldValue::Text(v))) => record.article_number = Some(v),
                (Field::Ean, Some(FieldValue::Text(v))) => record.ean = Some(v),
                (Field::PriceExVat, Some(FieldValue::Decimal(v))) => record.price_ex_vat = Some(v),
                (Field::AvailableInStores, Some(FieldValue::Integer(v))) => {
                    record.available_in_stores = Some(v)
                }
                (Field::Rating, Some(FieldValue::Decimal(v))) => record.rating = Some(v),
                (Field::ReviewCount, Some(FieldValue::Integer(v))) => record.review_count = Some(v),
                _ => {}
            }
        }

        record
    }

    fn body_text(&self, document: &Html) -> String {
        match document.select(&self.selectors.body).next() {
            Some(body) => body.text().collect::<Vec<_>>().join(" "),
            None => document.root_element().text().collect::<Vec<_>>().join(" "),
        }
    }

    fn first_text(&self, document: &Html, selector: &Selector) -> Option<String> {
        document
            .select(selector)
            .next()
            .map(element_text)
            .filter(|text| !text.is_empty())
    }

    fn extract_price(&self, document: &Html) -> Option<i64> {
        let from_element = document
            .select(&self.selectors.price)
            .next()
            .and_then(|el| parse_price(&element_text(el)));

        from_element.or_else(|| {
            document
                .select(&self.selectors.price_attr)
                .next()
                .and_then(|el| el.value().attr("data-price"))
                .and_then(parse_price)
        })
    }

    fn description_paragraphs(&self, document: &Html) -> Option<String> {
        let paragraphs: Vec<String> = document
            .select(&self.selectors.paragraph)
            .map(element_text)
            .filter(|text| (21..=1999).contains(&text.chars().count()))
            .collect();

        if paragraphs.is_empty() {
            None
        } else {
            Some(paragraphs.join("\n\n"))
        }
    }

    fn description_summary(&self, document: &Html) -> Option<String> {
        self.first_text(document, &self.selectors.description_block)
            .map(|text| text.chars().take(SUMMARY_MAX_CHARS).collect::<String>())
            .map(|text| text.trim_end().to_string())
    }

    fn extract_features(&self, document: &Html) -> Vec<String> {
        let mut seen = HashSet::new();
        document
            .select(&self.selectors.list_item)
            .map(element_text)
            .filter(|text| (6..=199).contains(&text.chars().count()))
            .filter(|text| !text.contains("http"))
            .filter(|text| seen.insert(text.clone()))
            .take(MAX_FEATURES)
            .collect()
    }

    /// Definition lists first, then table rows, so a table entry replaces a
    /// definition-list entry with the same key.
    fn extract_specs(&self, document: &Html) -> BTreeMap<String, String> {
        let mut specs = BTreeMap::new();

        for list in document.select(&self.selectors.definition_list) {
            let mut term: Option<String> = None;
            // Descendants, so <div>-wrapped term groups are included
            for child in list.select(&self.selectors.definition_part) {
                match child.value().name() {
                    "dt" => term = Some(element_text(child)),
                    "dd" => {
                        if let Some(key) = term.take() {
                            insert_spec(&mut specs, key, element_text(child));
                        }
                    }
                    _ => {}
                }
            }
        }

        for row in document.select(&self.selectors.table_row) {
            let cells: Vec<String> = row
                .select(&self.selectors.table_cell)
                .map(element_text)
                .collect();
            if cells.len() >= 2 {
                insert_spec(&mut specs, cells[0].clone(), cells[1].clone());
            }
        }

        specs
    }

    fn extract_images(&self, document: &Html, page_url: &str) -> Vec<String> {
        let base = Url::parse(page_url).ok();
        let mut images: Vec<String> = Vec::new();

        for element in document.select(&self.selectors.image) {
            let Some(src) = element.value().attr("src") else {
                continue;
            };
            if src.is_empty() || src.starts_with("data:") {
                continue;
            }
            let resolved = resolve(base.as_ref(), src);
            let path = image_path(&resolved).to_lowercase();
            if !IMAGE_MARKERS.iter().any(|m| path.contains(m)) {
                continue;
            }
            if IMAGE_EXCLUDES.iter().any(|m| path.contains(m)) {
                continue;
            }
            if !images.contains(&resolved) {
                images.push(resolved);
            }
        }

        let primary = document
            .select(&self.selectors.primary_image)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(str::trim)
            .filter(|content| !content.is_empty())
            .map(|content| resolve(base.as_ref(), content));
        if let Some(primary) = primary {
            if !images.contains(&primary) {
                images.insert(0, primary);
            }
        }

        images.truncate(MAX_IMAGES);
        images
    }
}

/// Text of an element with whitespace runs collapsed.
fn element_text(element: ElementRef) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

fn insert_spec(specs: &mut BTreeMap<String, String>, key: String, value: String) {
    if key.is_empty() || value.is_empty() || key.chars().count() > MAX_SPEC_KEY_CHARS {
        return;
    }
    specs.insert(key, value);
}

/// First run of digits, spaces tolerated as thousand separators.
pub fn parse_price(text: &str) -> Option<i64> {
    let captured = PRICE_REGEX.captures(text)?.get(1)?.as_str();
    let digits: String = captured.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Path segments between the catalog marker and the product slug, with
/// hyphens turned into spaces.
pub fn categories_from_url(url: &str) -> Vec<String> {
    let path = Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string());
    let Some((_, rest)) = path.split_once(CATALOG_MARKER) else {
        return Vec::new();
    };

    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    match segments.split_last() {
        Some((_, parents)) => parents.iter().map(|s| s.replace('-', " ")).collect(),
        None => Vec::new(),
    }
}

fn extract_vesa_sizes(text: &str) -> Option<Vec<String>> {
    let mut sizes: Vec<String> = Vec::new();
    for caps in VESA_REGEX.captures_iter(text) {
        let size = format!("{}x{} mm", &caps[1], &caps[2]);
        if !sizes.contains(&size) {
            sizes.push(size);
        }
    }
    if sizes.is_empty() {
        None
    } else {
        Some(sizes)
    }
}

fn resolve(base: Option<&Url>, src: &str) -> String {
    base.and_then(|b| b.join(src).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| src.to_string())
}

fn image_path(src: &str) -> String {
    Url::parse(src)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| src.to_string())
}

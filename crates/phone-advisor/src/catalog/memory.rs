//! In-memory Catalog
//!
//! Holds the full phone list loaded from JSON and filters it per request.

use std::path::Path;

use async_trait::async_trait;

use super::PhoneCatalog;
use crate::error::Result;
use crate::model::{non_blank, Phone, PhoneSku, SearchParams};

const BUNDLED_CATALOG: &str = include_str!("../../data/phones.json");

/// Catalog backed by a vector of phones
pub struct MemoryCatalog {
    phones: Vec<Phone>,
}

impl MemoryCatalog {
    pub fn new(phones: Vec<Phone>) -> Self {
        Self { phones }
    }

    /// Parse a JSON array of phone records
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    /// Load a JSON array of phone records from disk
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await?;
        let catalog = Self::from_json(&json)?;
        tracing::info!(path = %path.display(), phones = catalog.phones.len(), "Loaded phone catalog");
        Ok(catalog)
    }

    /// Small sample catalog shipped with the crate
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_CATALOG)
    }
}

/// SKU-level constraints, normalized once per search
struct SkuFilter<'a> {
    params: &'a SearchParams,
    ram: Option<String>,
    storage: Option<String>,
}

impl<'a> SkuFilter<'a> {
    fn new(params: &'a SearchParams) -> Self {
        Self {
            params,
            ram: non_blank(params.ram.as_deref()),
            storage: non_blank(params.storage.as_deref()),
        }
    }

    fn matches(&self, sku: &PhoneSku) -> bool {
        if self.params.min_price.is_some() || self.params.max_price.is_some() {
            let Some(price) = sku.price else {
                return false;
            };
            if self.params.min_price.is_some_and(|min| price < min)
                || self.params.max_price.is_some_and(|max| price > max)
            {
                return false;
            }
        }

        contains(sku.ram.as_deref(), self.ram.as_deref())
            && contains(sku.storage.as_deref(), self.storage.as_deref())
    }
}

/// `needle` (already lower-cased) occurs in `haystack`; no needle always matches
fn contains(haystack: Option<&str>, needle: Option<&str>) -> bool {
    match needle {
        None => true,
        Some(needle) => haystack.is_some_and(|h| h.to_lowercase().contains(needle)),
    }
}

fn in_range<T: PartialOrd + Copy>(value: Option<T>, min: Option<T>, max: Option<T>) -> bool {
    if min.is_none() && max.is_none() {
        return true;
    }
    let Some(value) = value else {
        return false;
    };
    min.is_none_or(|min| value >= min) && max.is_none_or(|max| value <= max)
}

fn keyword_matches(phone: &Phone, keyword: &str) -> bool {
    let hit = |text: &str| text.to_lowercase().contains(keyword);

    hit(&phone.brand)
        || hit(&phone.model)
        || phone.description.as_deref().is_some_and(hit)
        || phone.features.iter().any(|f| hit(f))
        || phone.tags.iter().any(|t| hit(t))
}

/// Apply every filter to one phone, narrowing its SKUs when SKU filters are set
fn filter_phone(phone: &Phone, params: &SearchParams, skus: &SkuFilter<'_>) -> Option<Phone> {
    if let Some(brand) = non_blank(params.brand.as_deref()) {
        if phone.brand.to_lowercase() != brand {
            return None;
        }
    }

    if let Some(keyword) = non_blank(params.keyword.as_deref()) {
        if !keyword_matches(phone, &keyword) {
            return None;
        }
    }

    let all_tags = params
        .tags
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .all(|wanted| phone.tags.iter().any(|t| t == wanted));
    if !all_tags {
        return None;
    }

    if !in_range(phone.display_size, params.min_display_size, params.max_display_size)
        || !in_range(phone.battery, params.min_battery, params.max_battery)
    {
        return None;
    }

    if !params.has_sku_filter() {
        return Some(phone.clone());
    }

    let matching: Vec<PhoneSku> = phone.skus.iter().filter(|s| skus.matches(s)).cloned().collect();
    if matching.is_empty() {
        return None;
    }

    let mut narrowed = phone.clone();
    narrowed.skus = matching;
    Some(narrowed)
}

#[async_trait]
impl PhoneCatalog for MemoryCatalog {
    async fn search(&self, params: &SearchParams) -> Result<Vec<Phone>> {
        let skus = SkuFilter::new(params);

        let mut results: Vec<Phone> = self
            .phones
            .iter()
            .filter_map(|phone| filter_phone(phone, params, &skus))
            .collect();

        results.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        results.truncate(params.effective_limit());

        tracing::debug!(?params, matches = results.len(), "Phone search");
        Ok(results)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.phones.len())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

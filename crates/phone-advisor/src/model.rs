//! Domain Models
//!
//! Phone records, their purchasable SKU variants, and the search request.
//! Uses `rust_decimal` for all prices - never use f64 for money!

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::{AdvisorError, Result};

/// Default number of search results
pub const DEFAULT_LIMIT: usize = 5;

/// Hard cap on search results
pub const MAX_LIMIT: usize = 20;

fn default_currency() -> String {
    "CNY".into()
}

/// One purchasable configuration of a phone
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhoneSku {
    /// Unique SKU identifier
    pub sku_id: String,

    /// Display name, e.g. "12GB+256GB Black"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Memory, e.g. "12GB"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ram: Option<String>,

    /// Storage, e.g. "256GB"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    /// Price in `currency` units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,

    /// ISO 4217 code
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Stock or sales status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<String>,

    /// Additional key/value specs
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

/// A phone model in the catalog
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Phone {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub brand: String,

    pub model: String,

    /// Short pitch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chipset: Option<String>,

    /// Diagonal in inches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_size: Option<f32>,

    /// Refresh rate in Hz
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_freq: Option<u32>,

    /// Capacity in mAh
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<String>,

    /// Search labels, e.g. "flagship", "gaming"
    #[serde(default)]
    pub tags: Vec<String>,

    /// Selling points
    #[serde(default)]
    pub features: Vec<String>,

    /// Detailed free-form specs
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub specs: Map<String, Value>,

    #[serde(default)]
    pub skus: Vec<PhoneSku>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Search request for the phone catalog
///
/// Product-level filters (keyword, brand, tags, display size, battery)
/// select phones. SKU-level filters (price range, ram, storage) must all
/// hold for the same SKU.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    /// Case-insensitive substring over brand, model, description, features and tags
    pub keyword: Option<String>,

    /// Case-insensitive exact brand
    pub brand: Option<String>,

    /// Every tag must be present
    pub tags: Vec<String>,

    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,

    /// Case-insensitive substring of the SKU memory
    pub ram: Option<String>,

    /// Case-insensitive substring of the SKU storage
    pub storage: Option<String>,

    pub min_display_size: Option<f32>,
    pub max_display_size: Option<f32>,

    pub min_battery: Option<u32>,
    pub max_battery: Option<u32>,

    /// Result cap, clamped to 1..=20
    pub limit: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            keyword: None,
            brand: None,
            tags: Vec::new(),
            min_price: None,
            max_price: None,
            ram: None,
            storage: None,
            min_display_size: None,
            max_display_size: None,
            min_battery: None,
            max_battery: None,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl SearchParams {
    /// Build from tool-call arguments; explicit nulls count as absent
    pub fn from_arguments(arguments: &HashMap<String, Value>) -> Result<Self> {
        let object: Map<String, Value> = arguments
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let params: Self = serde_json::from_value(Value::Object(object))?;
        params.validate()?;
        Ok(params)
    }

    /// Reject contradictory or negative bounds
    pub fn validate(&self) -> Result<()> {
        if self.min_price.is_some_and(|p| p.is_sign_negative())
            || self.max_price.is_some_and(|p| p.is_sign_negative())
        {
            return Err(AdvisorError::InvalidSearch("prices cannot be negative".into()));
        }
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(AdvisorError::InvalidSearch(format!(
                    "min_price {} exceeds max_price {}",
                    min, max
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min_display_size, self.max_display_size) {
            if min > max {
                return Err(AdvisorError::InvalidSearch(format!(
                    "min_display_size {} exceeds max_display_size {}",
                    min, max
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min_battery, self.max_battery) {
            if min > max {
                return Err(AdvisorError::InvalidSearch(format!(
                    "min_battery {} exceeds max_battery {}",
                    min, max
                )));
            }
        }
        Ok(())
    }

    /// Result cap actually applied
    pub fn effective_limit(&self) -> usize {
        self.limit.clamp(1, MAX_LIMIT)
    }

    /// Whether any SKU-level constraint is set
    pub fn has_sku_filter(&self) -> bool {
        self.min_price.is_some()
            || self.max_price.is_some()
            || non_blank(self.ram.as_deref()).is_some()
            || non_blank(self.storage.as_deref()).is_some()
    }
}

/// Lower-cased trimmed text, or `None` when blank
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn args(value: Value) -> HashMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_params_from_arguments() {
        let params = SearchParams::from_arguments(&args(json!({
            "brand": "Xiaomi",
            "tags": ["flagship"],
            "min_price": 3000,
            "max_price": 5000.5,
            "ram": null,
        })))
        .unwrap();

        assert_eq!(params.brand.as_deref(), Some("Xiaomi"));
        assert_eq!(params.tags, vec!["flagship"]);
        assert_eq!(params.min_price, Some(dec!(3000)));
        assert_eq!(params.max_price, Some(dec!(5000.5)));
        assert!(params.ram.is_none());
        assert_eq!(params.limit, DEFAULT_LIMIT);
        assert!(params.has_sku_filter());
    }

    #[test]
    fn test_limit_is_clamped() {
        let mut params = SearchParams { limit: 100, ..Default::default() };
        assert_eq!(params.effective_limit(), MAX_LIMIT);
        params.limit = 0;
        assert_eq!(params.effective_limit(), 1);
    }

    #[test]
    fn test_rejects_inverted_ranges() {
        let err = SearchParams::from_arguments(&args(json!({"min_price": 5000, "max_price": 3000})));
        assert!(matches!(err, Err(AdvisorError::InvalidSearch(_))));

        let err = SearchParams::from_arguments(&args(json!({"min_battery": 6000, "max_battery": 4000})));
        assert!(err.is_err());

        let err = SearchParams::from_arguments(&args(json!({"limit": "many"})));
        assert!(matches!(err, Err(AdvisorError::Serialization(_))));
    }

    #[test]
    fn test_sku_currency_defaults() {
        let sku: PhoneSku = serde_json::from_value(json!({
            "sku_id": "a",
            "price": 3999,
        }))
        .unwrap();
        assert_eq!(sku.currency, "CNY");
        assert_eq!(sku.price, Some(dec!(3999)));
        assert!(sku.extra.is_empty());
    }
}

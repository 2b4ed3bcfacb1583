//! Phone Search Tool
//!
//! Lets the model query the phone catalog. Output is the JSON array of
//! matching phone records; `[]` when nothing matches.

use std::sync::Arc;
use async_trait::async_trait;
use serde_json::json;

use agent_core::{
    AgentError, Tool, ToolCall, ToolResult,
    tool::{ParameterSchema, ToolSchema},
    Result as CoreResult,
};

use crate::catalog::PhoneCatalog;
use crate::model::{SearchParams, DEFAULT_LIMIT, MAX_LIMIT};

pub const TOOL_NAME: &str = "search_phones";

/// Tool for searching the phone catalog
pub struct SearchPhonesTool {
    catalog: Arc<dyn PhoneCatalog>,
}

impl SearchPhonesTool {
    pub fn new(catalog: Arc<dyn PhoneCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Tool for SearchPhonesTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: TOOL_NAME.into(),
            description: "Search the phone database. Filters can be combined: keyword (brand, model, \
                description, features, tags), exact brand, tags that must all match (e.g. flagship, \
                gaming, camera), price range, RAM and storage, screen size in inches and battery \
                capacity in mAh. Returns phone records with their matching SKUs."
                .into(),
            parameters: vec![
                ParameterSchema::new("keyword", "string", "Free-text keyword"),
                ParameterSchema::new("brand", "string", "Brand name, exact match"),
                ParameterSchema::new("tags", "array", "Tags that must all be present").with_items("string"),
                ParameterSchema::new("min_price", "number", "Lowest SKU price").with_range(Some(0.0), None),
                ParameterSchema::new("max_price", "number", "Highest SKU price").with_range(Some(0.0), None),
                ParameterSchema::new("ram", "string", "Memory configuration, e.g. 12GB"),
                ParameterSchema::new("storage", "string", "Storage capacity, e.g. 256GB"),
                ParameterSchema::new("min_display_size", "number", "Smallest screen size in inches"),
                ParameterSchema::new("max_display_size", "number", "Largest screen size in inches"),
                ParameterSchema::new("min_battery", "integer", "Smallest battery capacity in mAh"),
                ParameterSchema::new("max_battery", "integer", "Largest battery capacity in mAh"),
                ParameterSchema::new("limit", "integer", "Maximum number of phones to return")
                    .with_default(json!(DEFAULT_LIMIT))
                    .with_range(Some(1.0), Some(MAX_LIMIT as f64)),
            ],
            category: Some("catalog".into()),
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let params = SearchParams::from_arguments(&call.arguments)
            .map_err(|e| AgentError::ToolValidation(e.to_string()))?;

        tracing::info!(catalog = self.catalog.name(), ?params, "Searching phones");

        match self.catalog.search(&params).await {
            Ok(phones) => {
                let output = serde_json::to_string(&phones)?;
                Ok(ToolResult::success(TOOL_NAME, output))
            }
            Err(e) => {
                tracing::error!(error = %e, "Phone search failed");
                Ok(ToolResult::failure(TOOL_NAME, format!("Search failed: {}", e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::error::{AdvisorError, Result};
    use crate::model::Phone;
    use agent_core::ToolRegistry;
    use serde_json::Value;
    use std::collections::HashMap;

    struct BrokenCatalog;

    #[async_trait]
    impl PhoneCatalog for BrokenCatalog {
        async fn search(&self, _params: &SearchParams) -> Result<Vec<Phone>> {
            Err(AdvisorError::Catalog("connection refused".into()))
        }

        async fn count(&self) -> Result<usize> {
            Ok(0)
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    fn registry(catalog: Arc<dyn PhoneCatalog>) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(SearchPhonesTool::new(catalog));
        registry
    }

    fn call(args: Value) -> ToolCall {
        ToolCall::new("call_1", TOOL_NAME, serde_json::from_value::<HashMap<String, Value>>(args).unwrap())
    }

    #[tokio::test]
    async fn test_search_returns_json_array() {
        let registry = registry(Arc::new(MemoryCatalog::bundled().unwrap()));

        let result = registry.invoke(&call(json!({"brand": "OnePlus", "max_price": 3000}))).await;
        assert!(result.success);

        let phones: Vec<Value> = serde_json::from_str(&result.output).unwrap();
        assert_eq!(phones.len(), 1);
        assert_eq!(phones[0]["brand"], "OnePlus");
        assert_eq!(phones[0]["skus"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_no_match_is_empty_array() {
        let registry = registry(Arc::new(MemoryCatalog::bundled().unwrap()));

        let result = registry.invoke(&call(json!({"brand": "Nokia"}))).await;
        assert!(result.success);
        assert_eq!(result.output, "[]");
    }

    #[tokio::test]
    async fn test_failures_become_text() {
        let registry = registry(Arc::new(BrokenCatalog));
        let result = registry.invoke(&call(json!({}))).await;
        assert!(!result.success);
        assert!(result.output.contains("connection refused"));

        let registry = registry_with_bundled();
        let result = registry.invoke(&call(json!({"min_price": 9000, "max_price": 1000}))).await;
        assert!(!result.success);
        assert!(result.output.contains("min_price"));
    }

    fn registry_with_bundled() -> ToolRegistry {
        registry(Arc::new(MemoryCatalog::bundled().unwrap()))
    }

    #[test]
    fn test_schema_exports_function_definition() {
        let tool = SearchPhonesTool::new(Arc::new(BrokenCatalog));
        let def = tool.schema().to_function_definition();
        let properties = &def["function"]["parameters"]["properties"];

        assert_eq!(def["function"]["name"], TOOL_NAME);
        assert_eq!(properties["tags"]["items"]["type"], "string");
        assert_eq!(properties["limit"]["default"], 5);
        assert_eq!(properties["limit"]["maximum"], 20.0);
        assert_eq!(def["function"]["parameters"]["required"], json!([]));
    }
}

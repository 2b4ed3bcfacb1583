//! Phone Catalog
//!
//! Abstractions and implementations for the phone data source.

mod memory;

pub use memory::MemoryCatalog;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Phone, SearchParams};

/// Catalog backend trait (Strategy pattern)
///
/// Implement this for each data source: bundled JSON, a document store, a
/// vendor API, etc.
#[async_trait]
pub trait PhoneCatalog: Send + Sync {
    /// Phones matching `params`, most recently updated first, at most
    /// `params.effective_limit()` of them. SKU lists are narrowed to the
    /// SKUs satisfying the SKU-level filters.
    async fn search(&self, params: &SearchParams) -> Result<Vec<Phone>>;

    /// Number of phones in the catalog
    async fn count(&self) -> Result<usize>;

    /// Catalog name
    fn name(&self) -> &str;
}

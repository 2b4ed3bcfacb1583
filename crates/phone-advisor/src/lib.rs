//! # phone-advisor
//!
//! Phone recommendation advisor backed by a searchable catalog of phones
//! and their SKU variants.
//!
//! ## Search Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Phone         brand · model · tags · display · battery      │
//! │   ├── SKU      12GB+256GB   ¥4999   ◄── price/ram/storage   │
//! │   ├── SKU      16GB+512GB   ¥5799       filters must hold    │
//! │   └── SKU      16GB+1TB     ¥6499       on the same SKU      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Matching phones come back most recently updated first, with their SKU
//! list narrowed to the SKUs that satisfied the filters.

pub mod catalog;
pub mod error;
pub mod model;
pub mod svckit;

pub use catalog::{MemoryCatalog, PhoneCatalog};
pub use error::{AdvisorError, Result};
pub use model::{Phone, PhoneSku, SearchParams};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::SearchPhonesTool;
}

/// System prompt for the phone advisor agent
pub const PHONE_ADVISOR_PROMPT: &str = r#"You are a phone recommendation assistant.

## How to Answer

1. Work out what the user needs: budget, brand, memory and storage, screen size, battery, and use case (camera, gaming, business, ...)
2. Use `search_phones` to find matching phones in the database
3. Recommend phones from the search results, quoting the exact SKU configuration and price
4. If nothing matches, say so and suggest relaxing a constraint, then search again

## Rules

- Only recommend phones returned by `search_phones`. Never recommend phones that are not in the database.
- Prices are in the currency given on each SKU (usually CNY).
- Keep answers concise and compare at most a handful of options."#;

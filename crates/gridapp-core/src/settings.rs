use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const FALLBACK_PRODUCT_NAME: &str = "Default Product";
pub const FALLBACK_PRODUCT_PRICE: &str = "99 USD";

/// Per-session configuration describing the product on display.
///
/// Produced once per session, either by the hub runtime or by the local
/// fallback document, and shared read-only afterwards. Fields the display
/// does not know about are kept in `extra` untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub product_name: String,

    #[serde(default)]
    pub product_price: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Settings {
    pub fn new(product_name: impl Into<String>, product_price: impl Into<String>) -> Self {
        Self {
            product_name: product_name.into(),
            product_price: product_price.into(),
            extra: Map::new(),
        }
    }

    /// Built-in settings used when no fallback document can be loaded.
    pub fn builtin_fallback() -> Self {
        Self::new(FALLBACK_PRODUCT_NAME, FALLBACK_PRODUCT_PRICE)
    }

    /// The product name, if one is present.
    pub fn product_name(&self) -> Option<&str> {
        let name = self.product_name.trim();
        (!name.is_empty()).then_some(name)
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single indicator as returned by the indicator store.
///
/// The whole object is kept verbatim, in the key order the store returned
/// it. `value` is the atomic thing a firewall acts on (an IP, a domain, a
/// hash); a missing, `null` or non-string `value` reads as empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Indicator {
    fields: Map<String, Value>,
}

impl Indicator {
    pub fn new(value: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("value".into(), Value::String(value.into()));
        Self { fields }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn value(&self) -> &str {
        self.fields
            .get("value")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Replace the value, keeping its position among the fields.
    pub fn set_value(&mut self, value: impl Into<String>) {
        self.fields.insert("value".into(), Value::String(value.into()));
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }

    /// Field names in the order the store returned them.
    pub fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    /// The whole indicator as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

/// One page of a paged indicator search.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IndicatorPage {
    #[serde(default)]
    pub iocs: Vec<Indicator>,

    /// Total matches across all pages, when the store reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl IndicatorPage {
    pub fn new(iocs: Vec<Indicator>) -> Self {
        Self { iocs, total: None }
    }
}

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{VellumError, VellumResult};
use crate::model::item::Item;

// ---------------------------------------------------------------------------
// ContentSchema: optional shape check applied when content is committed
// ---------------------------------------------------------------------------

/// JSON type a schema field is expected to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    Null,
}

impl FieldType {
    fn matches(self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Object => value.is_object(),
            FieldType::Array => value.is_array(),
            FieldType::Null => value.is_null(),
        }
    }
}

/// Constraints every item of a buffer must satisfy at commit time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentSchema {
    /// Fields every item must carry.
    #[serde(default)]
    pub required_fields: Vec<String>,
    /// Expected JSON type per field, checked only when the field is present.
    #[serde(default)]
    pub field_types: BTreeMap<String, FieldType>,
}

impl ContentSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, field: impl Into<String>) -> Self {
        self.required_fields.push(field.into());
        self
    }

    pub fn field(mut self, field: impl Into<String>, ty: FieldType) -> Self {
        self.field_types.insert(field.into(), ty);
        self
    }

    /// Validate a whole content sequence, collecting every violation.
    pub fn validate(&self, items: &[Item]) -> VellumResult<()> {
        let mut violations = Vec::new();

        for (index, item) in items.iter().enumerate() {
            let Some(record) = item.as_object() else {
                if !self.required_fields.is_empty() || !self.field_types.is_empty() {
                    violations.push(format!("item {} is not a record", index));
                }
                continue;
            };

            for field in &self.required_fields {
                if !record.contains_key(field) {
                    violations.push(format!("item {} is missing field '{}'", index, field));
                }
            }

            for (field, ty) in &self.field_types {
                if let Some(value) = record.get(field) {
                    if !ty.matches(value) {
                        violations.push(format!(
                            "item {} field '{}' expected {:?}",
                            index, field, ty
                        ));
                    }
                }
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(VellumError::SchemaValidation(violations))
        }
    }
}

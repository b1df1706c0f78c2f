//! Path-tracking navigation over FHIR JSON.

use crate::error::MappingError;
use serde_json::Value;

/// A JSON node together with its path from the resource root.
#[derive(Debug, Clone)]
pub(crate) struct Element<'a> {
    value: &'a Value,
    path: String,
}

impl<'a> Element<'a> {
    pub fn root(value: &'a Value) -> Self {
        Self {
            value,
            path: String::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn value(&self) -> &'a Value {
        self.value
    }

    pub fn child_path(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{key}", self.path)
        }
    }

    /// Child element; `null` counts as absent.
    pub fn get(&self, key: &str) -> Option<Element<'a>> {
        self.value
            .get(key)
            .filter(|v| !v.is_null())
            .map(|value| Element {
                value,
                path: self.child_path(key),
            })
    }

    pub fn require(&self, key: &str) -> Result<Element<'a>, MappingError> {
        self.get(key)
            .ok_or_else(|| MappingError::missing(self.child_path(key)))
    }

    /// Elements of an array child. Absent means empty.
    pub fn items(&self, key: &str) -> Result<Vec<Element<'a>>, MappingError> {
        let Some(child) = self.get(key) else {
            return Ok(Vec::new());
        };
        let array = child.value.as_array().ok_or_else(|| MappingError::InvalidType {
            path: child.path.clone(),
            expected: "array",
        })?;
        Ok(array
            .iter()
            .enumerate()
            .map(|(i, value)| Element {
                value,
                path: format!("{}[{i}]", child.path),
            })
            .collect())
    }

    /// First element of an array child, if any.
    pub fn first(&self, key: &str) -> Result<Option<Element<'a>>, MappingError> {
        Ok(self.items(key)?.into_iter().next())
    }

    pub fn as_str(&self) -> Result<&'a str, MappingError> {
        self.value.as_str().ok_or_else(|| MappingError::InvalidType {
            path: self.path.clone(),
            expected: "string",
        })
    }

    pub fn as_decimal(&self) -> Result<f64, MappingError> {
        self.value.as_f64().ok_or_else(|| MappingError::InvalidType {
            path: self.path.clone(),
            expected: "decimal",
        })
    }

    pub fn opt_str(&self, key: &str) -> Result<Option<&'a str>, MappingError> {
        self.get(key).map(|e| e.as_str()).transpose()
    }

    pub fn opt_decimal(&self, key: &str) -> Result<Option<f64>, MappingError> {
        self.get(key).map(|e| e.as_decimal()).transpose()
    }
}

/// Check `resourceType` and return the resource root.
pub(crate) fn expect_resource<'a>(
    value: &'a Value,
    expected: &str,
) -> Result<Element<'a>, MappingError> {
    let root = Element::root(value);
    if !value.is_object() {
        return Err(MappingError::InvalidType {
            path: String::new(),
            expected: "object",
        });
    }
    let found = root.require("resourceType")?.as_str()?;
    if found != expected {
        return Err(MappingError::WrongResourceType {
            path: "resourceType".to_string(),
            expected: expected.to_string(),
            found: found.to_string(),
        });
    }
    Ok(root)
}

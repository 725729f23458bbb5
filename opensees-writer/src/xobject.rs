//! Typed attribute bags describing modeled entities

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{EmitError, EmitResult};

/// A single typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeValue {
    Real(f64),
    String(String),
    Boolean(bool),
    Integer(i64),
    Index(u64),
    IndexVector(Vec<u64>),
    QuantityScalar {
        value: f64,
        #[serde(default)]
        unit: Option<String>,
    },
    QuantityVector(Vec<f64>),
}

/// A modeled entity: material, section, element property, condition,
/// time series or pattern.
///
/// `namespace` and `name` select the emitter in the [`Registry`](crate::registry::Registry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XObject {
    pub id: u64,
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl XObject {
    pub fn new(id: u64, namespace: &str, name: &str) -> Self {
        Self {
            id,
            namespace: namespace.to_string(),
            name: name.to_string(),
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute insertion
    pub fn with(mut self, attribute: &str, value: AttributeValue) -> Self {
        self.attributes.insert(attribute.to_string(), value);
        self
    }

    /// Label used in error messages, e.g. `materials.uniaxial/Elastic [3]`
    pub fn label(&self) -> String {
        format!("{}/{} [{}]", self.namespace, self.name, self.id)
    }

    pub fn has(&self, attribute: &str) -> bool {
        self.attributes.contains_key(attribute)
    }

    fn get(&self, attribute: &str) -> EmitResult<&AttributeValue> {
        self.attributes
            .get(attribute)
            .ok_or_else(|| EmitError::MissingAttribute {
                entity: self.label(),
                attribute: attribute.to_string(),
            })
    }

    fn type_error(&self, attribute: &str, expected: &'static str) -> EmitError {
        EmitError::AttributeType {
            entity: self.label(),
            attribute: attribute.to_string(),
            expected,
        }
    }

    fn finite(&self, attribute: &str, value: f64) -> EmitResult<f64> {
        if value.is_finite() {
            Ok(value)
        } else {
            Err(EmitError::InvalidValue {
                entity: self.label(),
                attribute: attribute.to_string(),
                reason: format!("{} is not a finite number", value),
            })
        }
    }

    pub fn real(&self, attribute: &str) -> EmitResult<f64> {
        match self.get(attribute)? {
            AttributeValue::Real(v) => self.finite(attribute, *v),
            _ => Err(self.type_error(attribute, "real")),
        }
    }

    pub fn real_or(&self, attribute: &str, default: f64) -> EmitResult<f64> {
        if self.has(attribute) {
            self.real(attribute)
        } else {
            Ok(default)
        }
    }

    pub fn string(&self, attribute: &str) -> EmitResult<&str> {
        match self.get(attribute)? {
            AttributeValue::String(s) => Ok(s.as_str()),
            _ => Err(self.type_error(attribute, "string")),
        }
    }

    pub fn boolean(&self, attribute: &str) -> EmitResult<bool> {
        match self.get(attribute)? {
            AttributeValue::Boolean(b) => Ok(*b),
            _ => Err(self.type_error(attribute, "boolean")),
        }
    }

    pub fn boolean_or(&self, attribute: &str, default: bool) -> EmitResult<bool> {
        if self.has(attribute) {
            self.boolean(attribute)
        } else {
            Ok(default)
        }
    }

    pub fn integer(&self, attribute: &str) -> EmitResult<i64> {
        match self.get(attribute)? {
            AttributeValue::Integer(i) => Ok(*i),
            _ => Err(self.type_error(attribute, "integer")),
        }
    }

    pub fn index(&self, attribute: &str) -> EmitResult<u64> {
        match self.get(attribute)? {
            AttributeValue::Index(i) => Ok(*i),
            _ => Err(self.type_error(attribute, "index")),
        }
    }

    pub fn index_vector(&self, attribute: &str) -> EmitResult<&[u64]> {
        match self.get(attribute)? {
            AttributeValue::IndexVector(v) => Ok(v.as_slice()),
            _ => Err(self.type_error(attribute, "index_vector")),
        }
    }

    /// Quantity scalars also accept plain reals.
    pub fn quantity_scalar(&self, attribute: &str) -> EmitResult<f64> {
        match self.get(attribute)? {
            AttributeValue::QuantityScalar { value, .. } | AttributeValue::Real(value) => {
                self.finite(attribute, *value)
            }
            _ => Err(self.type_error(attribute, "quantity_scalar")),
        }
    }

    pub fn quantity_vector(&self, attribute: &str) -> EmitResult<&[f64]> {
        match self.get(attribute)? {
            AttributeValue::QuantityVector(v) => {
                for value in v {
                    self.finite(attribute, *value)?;
                }
                Ok(v.as_slice())
            }
            _ => Err(self.type_error(attribute, "quantity_vector")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> XObject {
        XObject::new(3, "materials.uniaxial", "Elastic")
            .with("E", AttributeValue::Real(2.1e11))
            .with("name", AttributeValue::String("steel".into()))
            .with("dofs", AttributeValue::IndexVector(vec![1, 2]))
            .with("rho", AttributeValue::QuantityScalar { value: 7850.0, unit: Some("kg/m^3".into()) })
    }

    #[test]
    fn test_typed_access() {
        let x = sample();
        assert_eq!(x.real("E").unwrap(), 2.1e11);
        assert_eq!(x.string("name").unwrap(), "steel");
        assert_eq!(x.index_vector("dofs").unwrap(), &[1, 2]);
        assert_eq!(x.quantity_scalar("rho").unwrap(), 7850.0);
        assert_eq!(x.quantity_scalar("E").unwrap(), 2.1e11);
        assert_eq!(x.real_or("eta", 0.5).unwrap(), 0.5);
    }

    #[test]
    fn test_missing_attribute_names_it() {
        let err = sample().real("nu").unwrap_err();
        assert!(matches!(err, EmitError::MissingAttribute { ref attribute, .. } if attribute == "nu"));
        assert!(err.to_string().contains("'nu'"));
    }

    #[test]
    fn test_type_mismatch() {
        let err = sample().real("name").unwrap_err();
        assert!(matches!(err, EmitError::AttributeType { expected: "real", .. }));
    }

    #[test]
    fn test_non_finite_rejected() {
        let x = XObject::new(1, "a", "b").with("E", AttributeValue::Real(f64::INFINITY));
        assert!(matches!(x.real("E"), Err(EmitError::InvalidValue { .. })));
    }

    #[test]
    fn test_json_form() {
        let json = r#"{"id": 7, "namespace": "timeSeries", "name": "Linear",
                       "attributes": {"factor": {"real": 2.0}, "tags": {"index_vector": [1, 2]}}}"#;
        let x: XObject = serde_json::from_str(json).unwrap();
        assert_eq!(x.real("factor").unwrap(), 2.0);
        assert_eq!(x.index_vector("tags").unwrap(), &[1, 2]);
    }
}

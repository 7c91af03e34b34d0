//! Core record and dataset definitions.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::error::{RealtyError, RealtyResult};

/// Fingerprint-derived dataset identifier (`ds-<16 hex>`).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetId(String);

impl DatasetId {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single raw field value. Serializes as a JSON number, string or `null`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Missing,
}

impl FieldValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, FieldValue::Missing)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

/// Raw property row keyed by field name. Absent keys read as `Missing`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl PropertyRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.remove(name)
    }

    pub fn get(&self, name: &str) -> &FieldValue {
        static MISSING: FieldValue = FieldValue::Missing;
        self.fields.get(name).unwrap_or(&MISSING)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        match self.get(name) {
            FieldValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            FieldValue::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Kind of a declared raw field.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Numeric,
    Categorical,
}

/// Declaration of one raw field.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldDecl {
    pub fn numeric(name: &str, required: bool) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Numeric,
            required,
        }
    }

    pub fn categorical(name: &str, required: bool) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Categorical,
            required,
        }
    }
}

/// Declared shape of raw property records.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RecordSchema {
    pub fields: Vec<FieldDecl>,
    pub target: String,
}

impl RecordSchema {
    pub fn new(fields: Vec<FieldDecl>, target: impl Into<String>) -> Self {
        Self {
            fields,
            target: target.into(),
        }
    }

    /// Default schema for residential listings.
    pub fn property() -> Self {
        Self::new(
            vec![
                FieldDecl::numeric("area", true),
                FieldDecl::numeric("bedrooms", true),
                FieldDecl::numeric("bathrooms", true),
                FieldDecl::numeric("age", false),
                FieldDecl::numeric("latitude", false),
                FieldDecl::numeric("longitude", false),
                FieldDecl::categorical("property_type", false),
                FieldDecl::categorical("neighborhood", false),
            ],
            "price",
        )
    }

    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check a record against the declared fields.
    ///
    /// # Errors
    ///
    /// `SchemaViolation` for an absent required field, a value of the wrong
    /// kind, a non-finite number, or (with `require_target`) a missing target.
    pub fn validate(&self, record: &PropertyRecord, require_target: bool) -> RealtyResult<()> {
        for decl in &self.fields {
            check_value(&decl.name, decl.kind, decl.required, record.get(&decl.name))?;
        }
        match record.get(&self.target) {
            FieldValue::Missing if require_target => {
                Err(RealtyError::schema(&self.target, "target is required for training"))
            }
            FieldValue::Missing => Ok(()),
            value => check_value(&self.target, FieldKind::Numeric, require_target, value),
        }
    }
}

fn check_value(name: &str, kind: FieldKind, required: bool, value: &FieldValue) -> RealtyResult<()> {
    match (kind, value) {
        (_, FieldValue::Missing) if required => Err(RealtyError::schema(name, "required field is missing")),
        (_, FieldValue::Missing) => Ok(()),
        (FieldKind::Numeric, FieldValue::Number(v)) if !v.is_finite() => {
            Err(RealtyError::schema(name, format!("expected a finite number, got {v}")))
        }
        (FieldKind::Numeric, FieldValue::Number(_)) => Ok(()),
        (FieldKind::Numeric, FieldValue::Text(t)) => {
            Err(RealtyError::schema(name, format!("expected a number, got text `{t}`")))
        }
        (FieldKind::Categorical, FieldValue::Text(_)) => Ok(()),
        (FieldKind::Categorical, FieldValue::Number(v)) => {
            Err(RealtyError::schema(name, format!("expected a category, got number {v}")))
        }
    }
}

/// Validated set of labelled training rows.
#[derive(Clone, Debug)]
pub struct Dataset {
    pub id: DatasetId,
    pub schema: RecordSchema,
    pub records: Vec<PropertyRecord>,
    pub created_at: DateTime<Utc>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Target column in record order.
    pub fn targets(&self) -> RealtyResult<Vec<f64>> {
        self.records
            .iter()
            .map(|r| {
                r.number(&self.schema.target)
                    .ok_or_else(|| RealtyError::schema(&self.schema.target, "target is required for training"))
            })
            .collect()
    }
}

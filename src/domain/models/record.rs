//! Row-shaped records: the entity contract, field payloads and pagination.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::Display;

use super::filter::validate_identifier;
use super::value::SqlValue;
use crate::domain::errors::{DataError, DataResult};

/// A raw row as returned by the relational store, keyed by column name.
pub type Row = Map<String, Value>;

/// A record type stored in one table and identified by its primary key.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    type Id: Clone + Display + Into<SqlValue> + Send + Sync;

    fn id(&self) -> Self::Id;

    /// Decode a row returned by the store.
    fn from_row(row: Row) -> DataResult<Self> {
        serde_json::from_value(Value::Object(row)).map_err(DataError::from)
    }
}

/// Ordered field/value pairs for inserts and updates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet {
    fields: Vec<(String, SqlValue)>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a field, keeping the original position on replace.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Rebuild the set with each value passed through `f` along with its field name.
    pub fn try_map_values<F>(&self, mut f: F) -> DataResult<Self>
    where
        F: FnMut(&str, SqlValue) -> DataResult<SqlValue>,
    {
        let fields = self
            .fields
            .iter()
            .map(|(name, value)| Ok((name.clone(), f(name, value.clone())?)))
            .collect::<DataResult<Vec<_>>>()?;
        Ok(Self { fields })
    }

    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    /// Build from a JSON object; field order follows the object.
    pub fn from_json(value: &Value) -> DataResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| DataError::BadRequest("fields must be a JSON object".to_string()))?;
        object.iter().try_fold(Self::new(), |fields, (name, value)| {
            validate_identifier(name)?;
            Ok(fields.set(name.clone(), SqlValue::from_json(value.clone())))
        })
    }

    /// Build from any serializable struct, skipping `None` fields.
    pub fn from_serializable<T: Serialize>(value: &T) -> DataResult<Self> {
        let mut json = serde_json::to_value(value)?;
        if let Value::Object(object) = &mut json {
            object.retain(|_, v| !v.is_null());
        }
        Self::from_json(&json)
    }
}

/// Pagination window for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u64,
    pub offset: u64,
}

impl Page {
    pub const fn new(limit: u64, offset: u64) -> Self {
        Self { limit, offset }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 10,
            offset: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Draft {
        task_name: String,
        task_due_date: Option<String>,
        priority: i64,
    }

    #[test]
    fn test_from_serializable_keeps_struct_order() {
        let draft = Draft {
            task_name: "write docs".into(),
            task_due_date: None,
            priority: 2,
        };
        let fields = FieldSet::from_serializable(&draft).unwrap();
        let names: Vec<_> = fields.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["taskName", "priority"]);
        assert_eq!(fields.get("priority"), Some(&SqlValue::Int(2)));
    }

    #[test]
    fn test_set_replaces_in_place() {
        let fields = FieldSet::new().set("a", 1).set("b", 2).set("a", 3);
        let pairs: Vec<_> = fields.iter().map(|(n, v)| (n.to_string(), v.clone())).collect();
        assert_eq!(
            pairs,
            vec![("a".to_string(), SqlValue::Int(3)), ("b".to_string(), SqlValue::Int(2))]
        );
    }

    #[test]
    fn test_from_json_rejects_non_objects() {
        assert!(matches!(
            FieldSet::from_json(&json!([1])),
            Err(DataError::BadRequest(_))
        ));
    }

    #[test]
    fn test_default_page() {
        assert_eq!(Page::default(), Page::new(10, 0));
    }
}

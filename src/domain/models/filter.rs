//! Declarative row filters.
//!
//! A [`Filter`] is an ordered list of column conditions plus `or` groups of nested
//! filters. It can be built programmatically or parsed from a JSON object such as
//! `{"age": {"gte": 18}, "or": [{"a": 1}, {"b": 2}]}`.

use serde_json::{Map, Value};

use super::value::SqlValue;
use crate::domain::errors::{DataError, DataResult};

/// Reserved key holding disjunctive groups.
pub const OR_KEY: &str = "or";

/// Operator applied to a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(SqlValue),
    Like(SqlValue),
    ILike(SqlValue),
    Range(SqlValue, SqlValue),
    In(Vec<SqlValue>),
    NotIn(Vec<SqlValue>),
    Gte(SqlValue),
    Lte(SqlValue),
    Neq(SqlValue),
}

impl Condition {
    /// Number of placeholders this condition binds.
    pub fn arity(&self) -> usize {
        match self {
            Self::Range(..) => 2,
            Self::In(values) | Self::NotIn(values) => values.len(),
            _ => 1,
        }
    }
}

/// One top-level entry of a filter, kept in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterClause {
    Column { column: String, condition: Condition },
    Or(Vec<Filter>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<FilterClause>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn condition(mut self, column: impl Into<String>, condition: Condition) -> Self {
        self.clauses.push(FilterClause::Column {
            column: column.into(),
            condition,
        });
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.condition(column, Condition::Eq(value.into()))
    }

    pub fn like(self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.condition(column, Condition::Like(value.into()))
    }

    pub fn ilike(self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.condition(column, Condition::ILike(value.into()))
    }

    pub fn range(
        self,
        column: impl Into<String>,
        low: impl Into<SqlValue>,
        high: impl Into<SqlValue>,
    ) -> Self {
        self.condition(column, Condition::Range(low.into(), high.into()))
    }

    pub fn is_in<V: Into<SqlValue>>(
        self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.condition(column, Condition::In(values))
    }

    pub fn not_in<V: Into<SqlValue>>(
        self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.condition(column, Condition::NotIn(values))
    }

    pub fn gte(self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.condition(column, Condition::Gte(value.into()))
    }

    pub fn lte(self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.condition(column, Condition::Lte(value.into()))
    }

    pub fn neq(self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.condition(column, Condition::Neq(value.into()))
    }

    /// Append a disjunction of nested filters.
    pub fn or(mut self, groups: impl IntoIterator<Item = Self>) -> Self {
        self.clauses.push(FilterClause::Or(groups.into_iter().collect()));
        self
    }

    /// Rebuild the filter with every comparison operand passed through `f` along with
    /// its column. LIKE/ILIKE patterns are matched as text and left alone.
    pub fn try_map_operands<F>(&self, f: &mut F) -> DataResult<Self>
    where
        F: FnMut(&str, SqlValue) -> DataResult<SqlValue>,
    {
        let mut clauses = Vec::with_capacity(self.clauses.len());
        for clause in &self.clauses {
            clauses.push(match clause {
                FilterClause::Column { column, condition } => FilterClause::Column {
                    column: column.clone(),
                    condition: map_condition(column, condition, &mut *f)?,
                },
                FilterClause::Or(groups) => {
                    let mut mapped = Vec::with_capacity(groups.len());
                    for group in groups {
                        mapped.push(group.try_map_operands(&mut *f)?);
                    }
                    FilterClause::Or(mapped)
                }
            });
        }
        Ok(Self { clauses })
    }

    /// Parse a filter from a JSON object, preserving key order.
    pub fn from_json(value: &Value) -> DataResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| DataError::BadRequest("filter must be a JSON object".to_string()))?;
        Self::from_object(object)
    }

    fn from_object(object: &Map<String, Value>) -> DataResult<Self> {
        let mut filter = Self::new();
        for (key, value) in object {
            if key == OR_KEY {
                let groups = value.as_array().ok_or_else(|| {
                    DataError::BadRequest("`or` must be a list of filter objects".to_string())
                })?;
                let nested = groups
                    .iter()
                    .map(Self::from_json)
                    .collect::<DataResult<Vec<_>>>()?;
                filter = filter.or(nested);
                continue;
            }

            validate_identifier(key)?;
            filter = filter.condition(key.clone(), parse_condition(key, value)?);
        }
        Ok(filter)
    }
}

fn map_condition<F>(column: &str, condition: &Condition, f: &mut F) -> DataResult<Condition>
where
    F: FnMut(&str, SqlValue) -> DataResult<SqlValue>,
{
    Ok(match condition {
        Condition::Like(_) | Condition::ILike(_) => condition.clone(),
        Condition::In(values) => Condition::In(map_values(column, values, &mut *f)?),
        Condition::NotIn(values) => Condition::NotIn(map_values(column, values, &mut *f)?),
        Condition::Eq(value) => Condition::Eq(f(column, value.clone())?),
        Condition::Gte(value) => Condition::Gte(f(column, value.clone())?),
        Condition::Lte(value) => Condition::Lte(f(column, value.clone())?),
        Condition::Neq(value) => Condition::Neq(f(column, value.clone())?),
        Condition::Range(low, high) => {
            Condition::Range(f(column, low.clone())?, f(column, high.clone())?)
        }
    })
}

fn map_values<F>(column: &str, values: &[SqlValue], f: &mut F) -> DataResult<Vec<SqlValue>>
where
    F: FnMut(&str, SqlValue) -> DataResult<SqlValue>,
{
    values.iter().map(|value| f(column, value.clone())).collect()
}

/// Operator keys in precedence order; the first one present wins.
const OPERATORS: [&str; 8] = ["like", "ilike", "range", "in", "notIn", "gte", "lte", "neq"];

fn parse_condition(column: &str, value: &Value) -> DataResult<Condition> {
    let descriptor = match value {
        Value::Object(descriptor) => descriptor,
        Value::Array(_) => {
            return Err(DataError::BadRequest(format!(
                "column `{column}`: a list is only valid under `in` or `notIn`"
            )))
        }
        scalar => return Ok(Condition::Eq(SqlValue::from_json(scalar.clone()))),
    };

    let Some((operator, operand)) = OPERATORS
        .iter()
        .find_map(|op| descriptor.get(*op).map(|operand| (*op, operand)))
    else {
        return Err(DataError::BadRequest(format!(
            "column `{column}`: unsupported filter operator in {value}"
        )));
    };

    let condition = match operator {
        "like" => Condition::Like(pattern_operand(column, operator, operand)?),
        "ilike" => Condition::ILike(pattern_operand(column, operator, operand)?),
        "range" => match operand.as_array().map(Vec::as_slice) {
            Some([low, high]) => Condition::Range(
                SqlValue::from_json(low.clone()),
                SqlValue::from_json(high.clone()),
            ),
            _ => {
                return Err(DataError::BadRequest(format!(
                    "column `{column}`: `range` expects exactly two values"
                )))
            }
        },
        "in" => Condition::In(list_operand(column, operator, operand)?),
        "notIn" => Condition::NotIn(list_operand(column, operator, operand)?),
        "gte" => Condition::Gte(scalar_operand(column, operator, operand)?),
        "lte" => Condition::Lte(scalar_operand(column, operator, operand)?),
        _ => Condition::Neq(scalar_operand(column, operator, operand)?),
    };
    Ok(condition)
}

fn scalar_operand(column: &str, operator: &str, operand: &Value) -> DataResult<SqlValue> {
    if operand.is_array() || operand.is_object() {
        return Err(DataError::BadRequest(format!(
            "column `{column}`: `{operator}` expects a scalar"
        )));
    }
    Ok(SqlValue::from_json(operand.clone()))
}

fn pattern_operand(column: &str, operator: &str, operand: &Value) -> DataResult<SqlValue> {
    if operand.is_null() {
        return Err(DataError::BadRequest(format!(
            "column `{column}`: `{operator}` needs a pattern, got null"
        )));
    }
    scalar_operand(column, operator, operand)
}

fn list_operand(column: &str, operator: &str, operand: &Value) -> DataResult<Vec<SqlValue>> {
    operand
        .as_array()
        .map(|items| items.iter().cloned().map(SqlValue::from_json).collect())
        .ok_or_else(|| {
            DataError::BadRequest(format!("column `{column}`: `{operator}` expects a list"))
        })
}

/// Column names are interpolated into SQL text, so only plain (optionally
/// table-qualified) identifiers are accepted.
pub fn validate_identifier(name: &str) -> DataResult<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if valid_start && valid_rest {
        Ok(())
    } else {
        Err(DataError::BadRequest(format!("invalid column name: {name:?}")))
    }
}

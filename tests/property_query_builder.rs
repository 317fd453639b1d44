//! Property tests for placeholder numbering across nested filters.

use proptest::prelude::*;
use regex::Regex;
use rowcache::domain::models::{Condition, Filter, SqlValue};
use rowcache::services::QueryBuilder;

fn value() -> impl Strategy<Value = SqlValue> {
    prop_oneof![
        any::<i64>().prop_map(SqlValue::Int),
        // Values that look like placeholders must not disturb numbering.
        "[a-z$0-9 ]{0,8}".prop_map(SqlValue::Text),
        any::<bool>().prop_map(SqlValue::Bool),
    ]
}

fn condition() -> impl Strategy<Value = Condition> {
    prop_oneof![
        value().prop_map(Condition::Eq),
        value().prop_map(Condition::Like),
        value().prop_map(Condition::ILike),
        (value(), value()).prop_map(|(low, high)| Condition::Range(low, high)),
        prop::collection::vec(value(), 0..5).prop_map(Condition::In),
        prop::collection::vec(value(), 0..5).prop_map(Condition::NotIn),
        value().prop_map(Condition::Gte),
        value().prop_map(Condition::Lte),
        value().prop_map(Condition::Neq),
    ]
}

fn columns() -> impl Strategy<Value = Vec<(String, Condition)>> {
    prop::collection::vec(("[a-z]{1,6}", condition()), 0..4)
}

fn with_columns(columns: Vec<(String, Condition)>) -> Filter {
    columns
        .into_iter()
        .fold(Filter::new(), |filter, (column, condition)| filter.condition(column, condition))
}

fn filter() -> impl Strategy<Value = Filter> {
    let leaf = columns().prop_map(with_columns);
    leaf.prop_recursive(4, 48, 4, |inner| {
        (columns(), prop::collection::vec(inner, 0..4), columns()).prop_map(
            |(before, groups, after)| {
                let mut filter = with_columns(before).or(groups);
                for (column, condition) in after {
                    filter = filter.condition(column, condition);
                }
                filter
            },
        )
    })
}

fn expected_arity(filter: &Filter) -> usize {
    use rowcache::domain::models::FilterClause;
    filter
        .clauses()
        .iter()
        .map(|clause| match clause {
            FilterClause::Column { condition, .. } => condition.arity(),
            FilterClause::Or(groups) => groups.iter().map(expected_arity).sum(),
        })
        .sum()
}

proptest! {
    /// Property: placeholders appear as start, start+1, ... in rendered order, one per value.
    #[test]
    fn prop_placeholders_are_dense_and_ordered(filter in filter(), start in 1usize..20) {
        let clause = QueryBuilder::new().build_where_clause(&filter, start);
        let placeholder = Regex::new(r"\$(\d+)").unwrap();

        let ordinals: Vec<usize> = placeholder
            .captures_iter(&clause.clause)
            .map(|caps| caps[1].parse().unwrap())
            .collect();
        let expected: Vec<usize> = (start..start + clause.values.len()).collect();

        prop_assert_eq!(ordinals, expected);
        prop_assert_eq!(clause.values.len(), expected_arity(&filter));
    }

    /// Property: an empty rendering never carries values.
    #[test]
    fn prop_empty_clause_binds_nothing(filter in filter()) {
        let clause = QueryBuilder::new().build_where_clause(&filter, 1);
        if clause.is_empty() {
            prop_assert!(clause.values.is_empty());
        } else {
            prop_assert!(clause.clause.starts_with("WHERE "));
        }
    }
}

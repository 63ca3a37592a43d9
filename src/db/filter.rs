//! Composable row predicates.
//!
//! A [`Filter`] is built from column comparisons and combined with
//! [`Filter::and`] / [`Filter::or`], then rendered into a `WHERE` clause with
//! every value bound as a parameter.
use sqlx::{QueryBuilder, Sqlite};

use super::Value;

/// A predicate over the columns of one table.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every row.
    All,
    Eq(&'static str, Value),
    Ne(&'static str, Value),
    Gt(&'static str, Value),
    /// Column is one of the values. An empty list matches nothing.
    In(&'static str, Vec<Value>),
    /// Column contains the text, ignoring ASCII case.
    Contains(&'static str, String),
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
}

impl Filter {
    pub fn eq(column: &'static str, value: impl Into<Value>) -> Self {
        Self::Eq(column, value.into())
    }

    pub fn ne(column: &'static str, value: impl Into<Value>) -> Self {
        Self::Ne(column, value.into())
    }

    pub fn gt(column: &'static str, value: impl Into<Value>) -> Self {
        Self::Gt(column, value.into())
    }

    pub fn is_in<V: Into<Value>>(column: &'static str, values: impl IntoIterator<Item = V>) -> Self {
        Self::In(column, values.into_iter().map(Into::into).collect())
    }

    pub fn contains(column: &'static str, needle: impl Into<String>) -> Self {
        Self::Contains(column, needle.into())
    }

    /// Both predicates hold. `All` is the identity.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::All, f) | (f, Self::All) => f,
            (a, b) => Self::And(Box::new(a), Box::new(b)),
        }
    }

    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    /// Render the predicate (without the `WHERE` keyword).
    pub(crate) fn push_sql(self, qb: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            Self::All => {
                qb.push("1 = 1");
            }
            Self::Eq(column, Value::Null) => {
                qb.push(column).push(" IS NULL");
            }
            Self::Ne(column, Value::Null) => {
                qb.push(column).push(" IS NOT NULL");
            }
            Self::Eq(column, value) => push_comparison(qb, column, " = ", value),
            Self::Ne(column, value) => push_comparison(qb, column, " <> ", value),
            Self::Gt(column, value) => push_comparison(qb, column, " > ", value),
            Self::In(_, values) if values.is_empty() => {
                qb.push("1 = 0");
            }
            Self::In(column, values) => {
                qb.push(column).push(" IN (");
                for (i, value) in values.into_iter().enumerate() {
                    if i > 0 {
                        qb.push(", ");
                    }
                    value.push_bind(qb);
                }
                qb.push(")");
            }
            Self::Contains(column, needle) => {
                // instr() keeps `%` and `_` in the needle literal, unlike LIKE. upper() folds
                // ASCII only, so the needle must fold the same way.
                qb.push("instr(upper(")
                    .push(column)
                    .push("), ")
                    .push_bind(needle.to_ascii_uppercase())
                    .push(") > 0");
            }
            Self::And(a, b) => push_pair(qb, *a, " AND ", *b),
            Self::Or(a, b) => push_pair(qb, *a, " OR ", *b),
        }
    }
}

fn push_comparison(qb: &mut QueryBuilder<'_, Sqlite>, column: &str, op: &str, value: Value) {
    qb.push(column).push(op);
    value.push_bind(qb);
}

fn push_pair(qb: &mut QueryBuilder<'_, Sqlite>, a: Filter, op: &str, b: Filter) {
    qb.push("(");
    a.push_sql(qb);
    qb.push(op);
    b.push_sql(qb);
    qb.push(")");
}

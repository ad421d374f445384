//! Where-clause parsing.
//!
//! A clause is free text of the form `field operator value`, split on
//! whitespace. Only the value is ever bound as data; the field is checked
//! against the schema allow-list before it is written into SQL.
use crate::core::{DbError, Result};
use rusqlite::types::Value;
use std::fmt;
use std::str::FromStr;

/// Comparison operators accepted in a where clause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Gt,
    Lt,
    Ge,
    Le,
}

impl Operator {
    pub const ALL: [Operator; 5] = [Operator::Eq, Operator::Gt, Operator::Lt, Operator::Ge, Operator::Le];

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Ge => ">=",
            Operator::Le => "<=",
        }
    }
}

impl FromStr for Operator {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        Operator::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| DbError::UnsupportedOperator(s.to_string()))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed `field operator value` triple
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhereClause {
    pub field: String,
    pub operator: Operator,
    pub value: String,
}

impl WhereClause {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<String>) -> Self {
        WhereClause {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// `field op ?`, ready to follow `WHERE`
    pub fn to_sql(&self) -> String {
        format!("{} {} ?", self.field, self.operator)
    }

    /// The value bound to the clause's placeholder
    pub fn param(&self) -> Value {
        Value::Text(self.value.clone())
    }

    /// Parses a clause that must have exactly three tokens.
    ///
    /// # Errors
    ///
    /// `DbError::InvalidClause` for any other token count and
    /// `DbError::UnsupportedOperator` for an operator outside the whitelist.
    pub fn parse(text: &str) -> Result<Self> {
        match parse_filter(text)? {
            Filter::Where(clause) => Ok(clause),
            Filter::All => Err(DbError::InvalidClause(text.to_string())),
        }
    }
}

/// What a `get` should select
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// No usable clause: the whole table
    All,
    Where(WhereClause),
}

/// Parses a clause leniently.
///
/// Empty text, or text that does not split into exactly three tokens, means
/// no filter. Three tokens with an unknown operator are rejected.
pub fn parse_filter(text: &str) -> Result<Filter> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    match tokens.as_slice() {
        [field, operator, value] => Ok(Filter::Where(WhereClause::new(
            *field,
            operator.parse::<Operator>()?,
            *value,
        ))),
        _ => Ok(Filter::All),
    }
}

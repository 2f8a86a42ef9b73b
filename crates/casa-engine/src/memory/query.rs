//! The small query subset the reference engine understands:
//!
//! ```text
//! SELECT <* | col[, col...]> FROM <table> [WHERE <col> <op> <literal>]
//! ```

use std::cmp::Ordering;

use regex::Regex;

use crate::error::{EngineError, Result};
use crate::value::Value;

const QUERY_PATTERN: &str = r#"(?is)^\s*SELECT\s+(?P<cols>.+?)\s+FROM\s+(?P<table>\S+)(?:\s+WHERE\s+(?P<col>\w+)\s*(?P<op>==|!=|<=|>=|=|<|>)\s*(?P<lit>.+?))?\s*$"#;

lazy_static::lazy_static! {
    static ref QUERY_REGEX: std::result::Result<Regex, regex::Error> = Regex::new(QUERY_PATTERN);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn parse(op: &str) -> Result<Self> {
        match op {
            "=" | "==" => Ok(CompareOp::Eq),
            "!=" => Ok(CompareOp::Ne),
            "<" => Ok(CompareOp::Lt),
            "<=" => Ok(CompareOp::Le),
            ">" => Ok(CompareOp::Gt),
            ">=" => Ok(CompareOp::Ge),
            other => Err(EngineError::Query(format!("unknown operator {other}"))),
        }
    }

    fn holds(self, ord: Ordering) -> bool {
        match self {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Ne => ord != Ordering::Equal,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Le => ord != Ordering::Greater,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Ge => ord != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Literal {
    Number(f64),
    Text(String),
}

impl Literal {
    fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        for quote in ['\'', '"'] {
            if let Some(inner) = text
                .strip_prefix(quote)
                .and_then(|rest| rest.strip_suffix(quote))
            {
                return Ok(Literal::Text(inner.to_string()));
            }
        }
        text.parse::<f64>()
            .map(Literal::Number)
            .map_err(|_| EngineError::Query(format!("cannot parse literal {text}")))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Filter {
    pub column: String,
    pub op: CompareOp,
    pub literal: Literal,
}

impl Filter {
    pub fn matches(&self, cell: &Value) -> Result<bool> {
        let ord = match (cell, &self.literal) {
            (Value::Int(i), Literal::Number(n)) => (*i as f64).partial_cmp(n),
            (Value::Float(f), Literal::Number(n)) => f.partial_cmp(n),
            (Value::Bool(b), Literal::Number(n)) => (*b as i64 as f64).partial_cmp(n),
            (Value::String(s), Literal::Text(t)) => Some(s.as_str().cmp(t.as_str())),
            _ => {
                return Err(EngineError::TypeMismatch(format!(
                    "cannot compare column {} with {:?}",
                    self.column, self.literal
                )))
            }
        };
        Ok(ord.is_some_and(|ord| self.op.holds(ord)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Query {
    /// Projected columns, `None` for `*`.
    pub columns: Option<Vec<String>>,
    pub from: String,
    pub filter: Option<Filter>,
}

pub(crate) fn parse_query(text: &str) -> Result<Query> {
    let re = QUERY_REGEX
        .as_ref()
        .map_err(|e| EngineError::Query(e.to_string()))?;
    let caps = re
        .captures(text)
        .ok_or_else(|| EngineError::Query(format!("unsupported query: {text}")))?;

    let cols = caps["cols"].trim();
    let columns = if cols == "*" {
        None
    } else {
        Some(
            cols.split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
        )
    };

    let filter = match (caps.name("col"), caps.name("op"), caps.name("lit")) {
        (Some(col), Some(op), Some(lit)) => Some(Filter {
            column: col.as_str().to_string(),
            op: CompareOp::parse(op.as_str())?,
            literal: Literal::parse(lit.as_str())?,
        }),
        _ => None,
    };

    Ok(Query {
        columns,
        from: caps["table"].to_string(),
        filter,
    })
}

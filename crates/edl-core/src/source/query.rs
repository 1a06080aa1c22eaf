use crate::error::{EdlError, Result};
use crate::types::Indicator;
use serde_json::Value;
use std::str::FromStr;

/// One `field:value` condition of an indicator query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTerm {
    pub field: String,
    /// Lowercased value to compare against.
    pub pattern: String,
    /// Trailing `*`: match values starting with `pattern`.
    pub prefix: bool,
    /// Leading `-`: the term must not match.
    pub negated: bool,
}

impl QueryTerm {
    pub fn matches(&self, ioc: &Indicator) -> bool {
        let hit = self.candidates(ioc).iter().any(|v| self.matches_value(v));
        hit != self.negated
    }

    fn candidates(&self, ioc: &Indicator) -> Vec<Value> {
        let mut out: Vec<Value> = ioc.field(&self.field).into_iter().collect();
        if self.field == "type" {
            out.extend(ioc.field("indicator_type"));
        }
        out
    }

    fn matches_value(&self, value: &Value) -> bool {
        match value {
            Value::Null | Value::Object(_) => false,
            Value::String(s) => self.matches_text(s),
            Value::Array(items) => items.iter().any(|v| self.matches_value(v)),
            other => self.matches_text(&other.to_string()),
        }
    }

    fn matches_text(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        if self.prefix {
            text.starts_with(&self.pattern)
        } else {
            text == self.pattern
        }
    }
}

/// A parsed indicator query: whitespace-separated `field:value` terms that
/// must all match. An empty query matches every indicator.
///
/// ```
/// use edl_core::{Indicator, IndicatorQuery};
///
/// let query: IndicatorQuery = r#"type:IP -source:"Internal Feed" value:10.*"#.parse().unwrap();
/// let ioc = Indicator::new("10.1.2.3").with_attribute("indicator_type", "IP");
/// assert!(query.matches(&ioc));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndicatorQuery {
    pub terms: Vec<QueryTerm>,
}

impl IndicatorQuery {
    pub fn matches(&self, ioc: &Indicator) -> bool {
        self.terms.iter().all(|t| t.matches(ioc))
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl FromStr for IndicatorQuery {
    type Err = EdlError;

    fn from_str(s: &str) -> Result<Self> {
        let terms = tokenize(s)?
            .into_iter()
            .map(|(token, quoted)| parse_term(&token, quoted))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { terms })
    }
}

fn parse_term(token: &str, quoted: bool) -> Result<QueryTerm> {
    let (negated, body) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };

    let (field, value) = body
        .split_once(':')
        .ok_or_else(|| EdlError::Fetch(format!("Invalid query term \"{}\": expected field:value", token)))?;

    let field = field.trim();
    if field.is_empty() || value.is_empty() {
        return Err(EdlError::Fetch(format!(
            "Invalid query term \"{}\": field and value must not be empty",
            token
        )));
    }

    let (pattern, prefix) = match value.strip_suffix('*') {
        Some(stem) if !quoted => (stem, true),
        _ => (value, false),
    };

    Ok(QueryTerm {
        field: field.to_string(),
        pattern: pattern.to_lowercase(),
        prefix,
        negated,
    })
}

/// Split on whitespace outside double quotes. Quotes are removed; the flag
/// records whether the token had any.
fn tokenize(s: &str) -> Result<Vec<(String, bool)>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_quotes = false;

    for ch in s.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                quoted = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() || quoted {
                    tokens.push((std::mem::take(&mut current), quoted));
                }
                quoted = false;
            }
            c => current.push(c),
        }
    }

    if in_quotes {
        return Err(EdlError::Fetch(format!("Unterminated quote in query: {}", s)));
    }
    if !current.is_empty() || quoted {
        tokens.push((current, quoted));
    }
    Ok(tokens)
}

//! Record validation
//!
//! Rules live in each field's `validate:"..."` annotation segment as a
//! comma-separated list, e.g. `validate:"required,min=1,max=65535"`. A field
//! counts as "set" when its value is not the default for its shape, the same
//! notion the short-circuit population check uses.
//!
//! Cross-field rules take a space-separated list of other field names as
//! their parameter:
//! `validate:"required_if_all_set=TLSCert TLSKey"`.

use crate::annotation;
use crate::error::{Error, Result};
use crate::record::{FieldValue, Record};

/// Annotation segment key holding validation rules
pub const VALIDATE_KEY: &str = "validate";

/// Validates a populated record against its annotation rules.
///
/// Runs after loading completes; fails on the first violated rule.
#[derive(Debug, Default)]
pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Self
    }

    /// Check every field's rules, in field order then rule order
    pub fn validate(&self, record: &Record) -> Result<()> {
        for field in record.fields() {
            let Some(rules) = annotation::segment(field.annotation(), VALIDATE_KEY) else {
                continue;
            };
            for rule in rules.split(',').map(str::trim).filter(|r| !r.is_empty()) {
                self.check_rule(record, field.name(), field.value(), rule)?;
            }
        }
        Ok(())
    }

    fn check_rule(
        &self,
        record: &Record,
        field: &str,
        value: &FieldValue,
        rule: &str,
    ) -> Result<()> {
        let (name, param) = match rule.split_once('=') {
            Some((n, p)) => (n, p),
            None => (rule, ""),
        };

        let ok = match name {
            "required" => !value.is_default(),
            "min" => compare(value, param, |actual, bound| actual >= bound)
                .ok_or_else(|| bad_rule(field, rule))?,
            "max" => compare(value, param, |actual, bound| actual <= bound)
                .ok_or_else(|| bad_rule(field, rule))?,
            "required_if_all_set" => {
                !value.is_default() || !listed(record, param).all(|set| set)
            }
            "required_if_none_set" => {
                !value.is_default() || listed(record, param).any(|set| set)
            }
            "required_if_one_set" => {
                !value.is_default() || set_count(record, param) != 1
            }
            "required_if_none_set_or_one_set" => {
                !value.is_default() || set_count(record, param) > 1
            }
            "required_if_at_most_one_set" => {
                !value.is_default() || set_count(record, param) > 1
            }
            "required_if_at_most_one_not_set" => {
                !value.is_default() || unset_count(record, param) > 1
            }
            _ => return Err(bad_rule(field, rule).with_help("Unknown validation rule")),
        };

        if ok {
            Ok(())
        } else {
            Err(Error::validation(field, rule, render(value)))
        }
    }
}

/// Best-effort textual form of the offending value for the error message
fn render(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Null => None,
        FieldValue::Text(s) => Some(s.clone()),
        FieldValue::Int(i) => Some(i.to_string()),
        FieldValue::Uint(u) => Some(u.to_string()),
        FieldValue::Float(f) => Some(f.to_string()),
        FieldValue::Bool(b) => Some(b.to_string()),
        FieldValue::Sequence(s) => Some(format!("<sequence of {}>", s.len())),
        FieldValue::Mapping(m) => Some(format!("<mapping of {}>", m.len())),
    }
}

fn bad_rule(field: &str, rule: &str) -> Error {
    Error::validation(field, rule, None).with_help("Check the rule's spelling and parameter")
}

/// Numeric comparison for min/max. Text and sequences compare by length.
/// Returns `None` when the bound does not parse.
fn compare(value: &FieldValue, param: &str, cmp: impl Fn(f64, f64) -> bool) -> Option<bool> {
    let bound: f64 = param.trim().parse().ok()?;
    let actual = match value {
        FieldValue::Null => 0.0,
        FieldValue::Text(s) => s.chars().count() as f64,
        FieldValue::Sequence(s) => s.len() as f64,
        FieldValue::Mapping(m) => m.len() as f64,
        FieldValue::Bool(b) => *b as u8 as f64,
        other => other.as_f64()?,
    };
    Some(cmp(actual, bound))
}

/// Whether each listed field is set; unknown names count as unset
fn listed<'a>(record: &'a Record, param: &'a str) -> impl Iterator<Item = bool> + 'a {
    param
        .split_whitespace()
        .map(|name| record.get(name).map(|f| !f.is_default()).unwrap_or(false))
}

fn set_count(record: &Record, param: &str) -> usize {
    listed(record, param).filter(|&set| set).count()
}

fn unset_count(record: &Record, param: &str) -> usize {
    listed(record, param).filter(|&set| !set).count()
}

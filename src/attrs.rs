//! Generic attribute grammar table, generalized from the attribute
//! dictionaries used throughout the source (each element type enumerated
//! its own XML attributes by name). Here a single `AttrSpec` table
//! describes the mandatory/optional attributes of any EDXML entity once,
//! and `validate_attrs`/`first_mismatch` drive registration and
//! re-registration generically instead of per-type hand-rolled code
//! (spec §4.2, §9 Design Notes: "a parallel, data-driven attribute-grammar
//! table ... used both for validation and for generic equality checks at
//! re-registration").

use std::collections::BTreeMap;

use regex::Regex;

use crate::EdxmlError;

/// A constraint on one attribute value, checked by `validate_attrs`.
#[derive(Clone, Copy)]
pub enum AttrRule {
  /// No constraint beyond being present (when mandatory) or parseable.
  Any,
  /// Value must match the given regular expression in its entirety.
  Pattern(&'static str),
  /// Value must not exceed the given length in Unicode scalar values.
  MaxLen(usize),
  /// Value must parse as an unsigned integer.
  UnsignedInt,
  /// Value must parse as a float in `[0.0, 1.0]` (an entity-confidence
  /// or relation-confidence decimal, spec §3).
  UnitInterval,
}

/// One row of an entity's attribute grammar table. `default` is `None`
/// for mandatory attributes; for optional attributes it records the
/// documented default used by the re-registration consistency check
/// (spec §4.2 invariant 6: "optional attributes may be absent on one
/// side only if the present value equals the documented default").
pub struct AttrSpec {
  pub name: &'static str,
  pub mandatory: bool,
  pub rule: AttrRule,
  pub default: Option<&'static str>,
}

impl AttrSpec {
  pub const fn mandatory(name: &'static str, rule: AttrRule) -> Self {
    AttrSpec { name, mandatory: true, rule, default: None }
  }

  pub const fn optional(name: &'static str, rule: AttrRule, default: &'static str) -> Self {
    AttrSpec { name, mandatory: false, rule, default: Some(default) }
  }

  /// Back-compat constructor for call sites that do not need a
  /// documented default (e.g. ad hoc validation tables).
  pub const fn new(name: &'static str, mandatory: bool, rule: AttrRule) -> Self {
    AttrSpec { name, mandatory, rule, default: None }
  }
}

fn check_rule(name: &str, value: &str, rule: &AttrRule) -> Result<(), String> {
  match rule {
    AttrRule::Any => Ok(()),
    AttrRule::Pattern(pattern) => {
      let re = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| format!("invalid pattern for {}: {}", name, e))?;
      if re.is_match(value) {
        Ok(())
      } else {
        Err(format!("value '{}' does not match pattern for {}", value, name))
      }
    }
    AttrRule::MaxLen(max) => {
      if value.chars().count() > *max {
        Err(format!("value for {} exceeds maximum length {}", name, max))
      } else {
        Ok(())
      }
    }
    AttrRule::UnsignedInt => value
      .parse::<u64>()
      .map(|_| ())
      .map_err(|_| format!("value for {} is not an unsigned integer", name)),
    AttrRule::UnitInterval => {
      let v: f64 = value.parse().map_err(|_| format!("value for {} is not a number", name))?;
      if (0.0..=1.0).contains(&v) {
        Ok(())
      } else {
        Err(format!("value for {} must be in [0.0, 1.0]", name))
      }
    }
  }
}

/// Validate a set of name/value attribute pairs against a grammar table,
/// checking mandatory presence, unknown names, and per-attribute rules
/// (spec §4.2: attribute length limits and pattern constraints). An
/// optional attribute already carrying its own documented default is
/// treated as absent for rule-checking purposes, since `entity.attrs()`
/// resolves an absent optional attribute to that default before this
/// runs (the default itself is not required to satisfy the attribute's
/// own rule, e.g. an absent `date-acquired` resolves to `""`, which does
/// not match its `\d{8}` pattern).
pub fn validate_attrs(path: &str, table: &[AttrSpec], attrs: &BTreeMap<String, String>) -> Result<(), EdxmlError> {
  for spec in table {
    match attrs.get(spec.name) {
      Some(value) if spec.default.map(|d| d == value).unwrap_or(false) => {}
      Some(value) => {
        check_rule(spec.name, value, &spec.rule).map_err(|reason| EdxmlError::AttributeViolation(path.to_string(), reason))?;
      }
      None if spec.mandatory => {
        return Err(EdxmlError::MissingMandatoryAttribute(format!("{}@{}", path, spec.name)));
      }
      None => {}
    }
  }
  let known: std::collections::HashSet<&str> = table.iter().map(|s| s.name).collect();
  for name in attrs.keys() {
    if !known.contains(name.as_str()) {
      return Err(EdxmlError::UnknownAttribute(format!("{}@{}", path, name)));
    }
  }
  Ok(())
}

/// Fill in documented defaults for every attribute the table knows about
/// but `attrs` omits, after validating what is present.
pub fn resolve_attrs(path: &str, table: &[AttrSpec], attrs: &BTreeMap<String, String>) -> Result<BTreeMap<String, String>, EdxmlError> {
  validate_attrs(path, table, attrs)?;
  let mut resolved = BTreeMap::new();
  for spec in table {
    match attrs.get(spec.name) {
      Some(value) => {
        resolved.insert(spec.name.to_string(), value.clone());
      }
      None => {
        if let Some(default) = spec.default {
          resolved.insert(spec.name.to_string(), default.to_string());
        }
      }
    }
  }
  Ok(resolved)
}

/// Find the first attribute name the table knows about for which `old`
/// and `new` disagree, resolving absent optional attributes to their
/// documented default before comparing (spec §4.2 invariant 6). Returns
/// `None` when every attribute the table lists agrees.
pub fn first_mismatch(table: &[AttrSpec], old: &BTreeMap<String, String>, new: &BTreeMap<String, String>) -> Option<&'static str> {
  for spec in table {
    let resolve = |m: &BTreeMap<String, String>| -> &str { m.get(spec.name).map(String::as_str).unwrap_or(spec.default.unwrap_or("")) };
    if resolve(old) != resolve(new) {
      return Some(spec.name);
    }
  }
  None
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample_table() -> Vec<AttrSpec> {
    vec![AttrSpec::new("name", true, AttrRule::Pattern("[a-z0-9-]+")), AttrSpec::optional("confidence", AttrRule::UnitInterval, "1.0")]
  }

  #[test]
  fn accepts_valid_attrs() {
    let mut attrs = BTreeMap::new();
    attrs.insert("name".to_string(), "my-event-type".to_string());
    attrs.insert("confidence".to_string(), "0.5".to_string());
    assert!(validate_attrs("event-type", &sample_table(), &attrs).is_ok());
  }

  #[test]
  fn rejects_missing_mandatory() {
    let attrs = BTreeMap::new();
    assert!(validate_attrs("event-type", &sample_table(), &attrs).is_err());
  }

  #[test]
  fn rejects_unknown_attribute() {
    let mut attrs = BTreeMap::new();
    attrs.insert("name".to_string(), "x".to_string());
    attrs.insert("bogus".to_string(), "y".to_string());
    assert!(validate_attrs("event-type", &sample_table(), &attrs).is_err());
  }

  #[test]
  fn rejects_pattern_violation() {
    let mut attrs = BTreeMap::new();
    attrs.insert("name".to_string(), "Not Valid!".to_string());
    assert!(validate_attrs("event-type", &sample_table(), &attrs).is_err());
  }

  #[test]
  fn absent_optional_matches_explicit_default() {
    let mut old = BTreeMap::new();
    old.insert("name".to_string(), "x".to_string());
    let mut new = old.clone();
    new.insert("confidence".to_string(), "1.0".to_string());
    assert_eq!(first_mismatch(&sample_table(), &old, &new), None);
  }

  #[test]
  fn mandatory_mismatch_is_reported() {
    let mut old = BTreeMap::new();
    old.insert("name".to_string(), "x".to_string());
    let mut new = BTreeMap::new();
    new.insert("name".to_string(), "y".to_string());
    assert_eq!(first_mismatch(&sample_table(), &old, &new), Some("name"));
  }
}

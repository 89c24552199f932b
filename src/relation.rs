//! Inter-property relations within a single event type (spec §3, §4.2
//! invariant "a relation's placeholders must name declared properties";
//! invariant 5: "every relation's description contains `[[property1]]`
//! and `[[property2]]` placeholders").

use paste::paste;

#[derive(PartialEq, Eq, Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub enum RelationType {
  Inter,
  Intra,
  Parent,
  Child,
  Other,
}

impl std::str::FromStr for RelationType {
  type Err = crate::EdxmlError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "inter" => Ok(RelationType::Inter),
      "intra" => Ok(RelationType::Intra),
      "parent" => Ok(RelationType::Parent),
      "child" => Ok(RelationType::Child),
      "other" => Ok(RelationType::Other),
      other => Err(crate::EdxmlError::InvalidDataType(other.to_string(), "unknown relation type".to_string())),
    }
  }
}

impl std::fmt::Display for RelationType {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    let s = match self {
      RelationType::Inter => "inter",
      RelationType::Intra => "intra",
      RelationType::Parent => "parent",
      RelationType::Child => "child",
      RelationType::Other => "other",
    };
    write!(f, "{}", s)
  }
}

/// spec §3: "carries `property1`, `property2`, `directed`, `description`,
/// `type` (one of `intra|inter|parent|child|other` with a predicate
/// suffix), and `confidence`". The `type` attribute's predicate suffix is
/// modeled as a separate `predicate` field rather than string-glued onto
/// `relation_type`, matching the rest of this crate's typed-record style
/// (spec §9 Design Notes: "re-architect as tagged records").
#[derive(Clone, Debug)]
pub struct Relation {
  property_name: String,
  related_property_name: String,
  relation_type: RelationType,
  predicate: String,
  /// spec §3 `directed` flag.
  directed: bool,
  /// spec §3 `description`; invariant 4 requires it to literally contain
  /// `[[property1]]` and `[[property2]]`. Defaults to a description built
  /// from `predicate` so the invariant holds unless a caller overrides it
  /// with `set_description` and gets it wrong.
  description: String,
  confidence: f64,
}

impl Relation {
  pub fn new(property_name: impl Into<String>, related_property_name: impl Into<String>, relation_type: RelationType, predicate: impl Into<String>) -> Self {
    let predicate = predicate.into();
    let description = format!("[[property1]] {} [[property2]]", predicate);
    Relation {
      property_name: property_name.into(),
      related_property_name: related_property_name.into(),
      relation_type,
      predicate,
      directed: false,
      description,
      confidence: 1.0,
    }
  }

  impl_builder_field!(confidence, f64);
  impl_builder_field!(directed, bool);
  impl_builder_field!(description, String);

  pub fn property_name(&self) -> &str {
    &self.property_name
  }

  pub fn related_property_name(&self) -> &str {
    &self.related_property_name
  }

  pub fn relation_type(&self) -> RelationType {
    self.relation_type
  }

  pub fn predicate(&self) -> &str {
    &self.predicate
  }

  pub fn directed(&self) -> bool {
    self.directed
  }

  pub fn description(&self) -> &str {
    &self.description
  }

  pub fn confidence(&self) -> f64 {
    self.confidence
  }

  /// spec §3 invariant 4: "every relation's `description` contains
  /// `[[property1]]` and `[[property2]]` placeholders".
  pub fn has_valid_placeholders(&self) -> bool {
    self.description.contains("[[property1]]") && self.description.contains("[[property2]]")
  }

  /// Placeholders a relation's predicate string references, for the
  /// completeness check against the owning event type's property set
  /// (spec §4.2 invariant 4).
  pub fn referenced_properties(&self) -> [&str; 2] {
    [&self.property_name, &self.related_property_name]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_description_contains_both_placeholders() {
    let r = Relation::new("a", "b", RelationType::Other, "relates to");
    assert!(r.has_valid_placeholders());
    assert_eq!(r.description(), "[[property1]] relates to [[property2]]");
  }

  #[test]
  fn overridden_description_without_placeholders_is_flagged() {
    let r = Relation::new("a", "b", RelationType::Other, "relates to").set_description("not a valid template".to_string());
    assert!(!r.has_valid_placeholders());
  }

  #[test]
  fn directed_defaults_to_false() {
    let r = Relation::new("a", "b", RelationType::Intra, "knows");
    assert!(!r.directed());
    assert!(r.set_directed(true).directed());
  }
}

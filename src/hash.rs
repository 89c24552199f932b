//! C4: the sticky hash engine (spec §4.3). A deterministic SHA-1 digest
//! of an event's normalized, hashable content, used both to detect
//! logically identical events across a stream and as an opaque
//! cross-document identifier (the "sticky hash").
//!
//! Both variants build the same set `S` of `"property:normalized_value"`
//! strings (one entry per pair, duplicates collapsing via set insertion),
//! sort it in Unicode code-point order and join with `\n`. Two skip rules
//! govern which pairs enter `S`:
//!
//! - if the event type is unique, only its unique properties contribute
//!   (spec §9 Open Question: this rule is uniform across v2 and v3, unlike
//!   the source library it was distilled from);
//! - a property whose object type is excluded from hashing
//!   (`number:float`/`number:double`) never contributes, regardless of
//!   variant or uniqueness.
//!
//! v2's preimage omits the source URL; v3 prefixes it. Both append the
//! event's content when the event type is non-unique.

use sha1::{Digest, Sha1};

use crate::event::Event;
use crate::event_type::EventType;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashVariant {
  V2,
  V3,
}

/// Compute the sticky hash of `event`, given its event type and the
/// chosen variant. `object_type_is_excluded` reports, for an object type
/// name, whether its data type is excluded from hashing; callers
/// typically supply `|name| registry.object_type(name).map_or(false,
/// |ot| ot.data_type().excluded_from_hashing())`.
pub fn compute_sticky_hash(event: &Event, event_type: &EventType, variant: HashVariant, object_type_is_excluded: impl Fn(&str) -> bool) -> String {
  let unique = event_type.is_unique();

  let mut set: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
  for (property_name, values) in event.properties() {
    let property = match event_type.property(property_name) {
      Some(p) => p,
      None => continue,
    };
    if unique && !property.is_unique() {
      continue;
    }
    if object_type_is_excluded(property.object_type_name()) {
      continue;
    }
    for value in values {
      set.insert(format!("{}:{}", property_name, value));
    }
  }

  let joined = set.into_iter().collect::<Vec<_>>().join("\n");

  let mut preimage = String::new();
  if variant == HashVariant::V3 {
    preimage.push_str(event.source_uri());
    preimage.push('\n');
  }
  preimage.push_str(event.event_type_name());
  preimage.push('\n');
  preimage.push_str(&joined);
  if !unique {
    preimage.push('\n');
    preimage.push_str(event.content());
  }

  let mut hasher = Sha1::new();
  hasher.update(preimage.as_bytes());
  let digest = hasher.finalize();
  digest.iter().map(|byte| format!("{:02x}", byte)).collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::property::Property;

  fn event_type_with_property(object_type_name: &str, event_type_unique: bool, property_unique: bool) -> EventType {
    let mut et = EventType::new("test").set_unique(event_type_unique);
    et.add_property(Property::new("f", object_type_name).set_unique(property_unique));
    et
  }

  #[test]
  fn deterministic_for_equal_events() {
    let et = event_type_with_property("number", false, false);
    let mut e1 = Event::new("test", "/source/");
    e1.add_property_value("f", "1");
    let mut e2 = Event::new("test", "/source/");
    e2.add_property_value("f", "1");
    let h1 = compute_sticky_hash(&e1, &et, HashVariant::V2, |_| false);
    let h2 = compute_sticky_hash(&e2, &et, HashVariant::V2, |_| false);
    assert_eq!(h1, h2);
  }

  #[test]
  fn order_insensitive_across_values() {
    let et = event_type_with_property("number", false, false);
    let mut e1 = Event::new("test", "/source/");
    e1.add_property_value("f", "1");
    e1.add_property_value("f", "2");
    let mut e2 = Event::new("test", "/source/");
    e2.add_property_value("f", "2");
    e2.add_property_value("f", "1");
    let h1 = compute_sticky_hash(&e1, &et, HashVariant::V2, |_| false);
    let h2 = compute_sticky_hash(&e2, &et, HashVariant::V2, |_| false);
    assert_eq!(h1, h2);
  }

  #[test]
  fn duplicate_pairs_collapse() {
    let et = event_type_with_property("number", false, false);
    let mut e1 = Event::new("test", "/source/");
    e1.add_property_value("f", "1");
    let mut e2 = Event::new("test", "/source/");
    e2.add_property_value("f", "1");
    e2.add_property_value("f", "1");
    assert_eq!(
      compute_sticky_hash(&e1, &et, HashVariant::V2, |_| false),
      compute_sticky_hash(&e2, &et, HashVariant::V2, |_| false)
    );
  }

  #[test]
  fn content_only_affects_non_unique_event_types() {
    let non_unique = event_type_with_property("str", false, false);
    let e1 = Event::new("test", "/source/").set_content("a".to_string());
    let e2 = Event::new("test", "/source/").set_content("b".to_string());
    let h1 = compute_sticky_hash(&e1, &non_unique, HashVariant::V2, |_| false);
    let h2 = compute_sticky_hash(&e2, &non_unique, HashVariant::V2, |_| false);
    assert_ne!(h1, h2, "non-unique event types must mix content into the preimage");

    let unique = event_type_with_property("str", true, true);
    let mut e3 = Event::new("test", "/source/").set_content("a".to_string());
    e3.add_property_value("f", "k");
    let mut e4 = Event::new("test", "/source/").set_content("b".to_string());
    e4.add_property_value("f", "k");
    let h3 = compute_sticky_hash(&e3, &unique, HashVariant::V2, |_| false);
    let h4 = compute_sticky_hash(&e4, &unique, HashVariant::V2, |_| false);
    assert_eq!(h3, h4, "unique event types must not mix content into the preimage");
  }

  #[test]
  fn v2_has_no_source_url_v3_does() {
    let et = event_type_with_property("str", false, false);
    let mut e1 = Event::new("test", "/source/a");
    e1.add_property_value("f", "x");
    let mut e2 = Event::new("test", "/source/b");
    e2.add_property_value("f", "x");
    assert_eq!(
      compute_sticky_hash(&e1, &et, HashVariant::V2, |_| false),
      compute_sticky_hash(&e2, &et, HashVariant::V2, |_| false),
      "v2 must not depend on the source URL"
    );
    assert_ne!(
      compute_sticky_hash(&e1, &et, HashVariant::V3, |_| false),
      compute_sticky_hash(&e2, &et, HashVariant::V3, |_| false),
      "v3 must be salted by the source URL"
    );
  }

  #[test]
  fn unique_property_skip_rule_applies_uniformly_to_v2_and_v3() {
    let mut et = EventType::new("test").set_unique(true);
    et.add_property(Property::new("u", "object").set_unique(true));
    et.add_property(Property::new("n", "object").set_unique(false));

    let mut e1 = Event::new("test", "/source/");
    e1.add_property_value("u", "k");
    e1.add_property_value("n", "1");
    let mut e2 = Event::new("test", "/source/");
    e2.add_property_value("u", "k");
    e2.add_property_value("n", "2");

    for variant in [HashVariant::V2, HashVariant::V3] {
      assert_eq!(
        compute_sticky_hash(&e1, &et, variant, |_| false),
        compute_sticky_hash(&e2, &et, variant, |_| false),
        "{:?}: non-unique property must not affect a unique event type's hash",
        variant
      );
    }

    let mut e3 = Event::new("test", "/source/");
    e3.add_property_value("u", "other");
    e3.add_property_value("n", "1");
    assert_ne!(
      compute_sticky_hash(&e1, &et, HashVariant::V2, |_| false),
      compute_sticky_hash(&e3, &et, HashVariant::V2, |_| false),
      "a differing unique property must change the hash"
    );
  }

  #[test]
  fn float_double_skip_applies_regardless_of_variant_or_uniqueness() {
    let mut e1 = Event::new("test", "/source/");
    e1.add_property_value("f", "1.000000");
    let mut e2 = Event::new("test", "/source/");
    e2.add_property_value("f", "2.000000");

    for event_type_unique in [false, true] {
      let et = event_type_with_property("float-object", event_type_unique, event_type_unique);
      for variant in [HashVariant::V2, HashVariant::V3] {
        let h1 = compute_sticky_hash(&e1, &et, variant, |name| name == "float-object");
        let h2 = compute_sticky_hash(&e2, &et, variant, |name| name == "float-object");
        assert_eq!(h1, h2, "excluded float property must never affect the hash ({:?}, unique={})", variant, event_type_unique);
      }
    }
  }

  /// S2 (spec §8): event type `e` with unique property `u`, object
  /// `{u:"a"}`, content `"ignored"` (dropped since the event type is
  /// unique) -> `SHA1("e\nu:a")`.
  #[test]
  fn s2_pinned_v2_unique_digest() {
    let mut et = EventType::new("e").set_unique(true);
    et.add_property(Property::new("u", "object").set_unique(true));
    let mut event = Event::new("e", "/source/").set_content("ignored".to_string());
    event.add_property_value("u", "a");
    assert_eq!(
      compute_sticky_hash(&event, &et, HashVariant::V2, |_| false),
      "b67a2baa90ca5143bc4bfb62124c3665be3dc50c"
    );
  }

  /// S3 (spec §8): non-unique event type `e`, source URL `/s`, objects
  /// `{p:"1", p:"1"}` (duplicate collapses via set insertion), content
  /// `"c"` -> `SHA1("/s\ne\np:1\nc")`.
  #[test]
  fn s3_pinned_v3_non_unique_digest() {
    let mut et = EventType::new("e");
    et.add_property(Property::new("p", "object"));
    let mut event = Event::new("e", "/s").set_content("c".to_string());
    event.add_property_value("p", "1");
    event.add_property_value("p", "1");
    assert_eq!(
      compute_sticky_hash(&event, &et, HashVariant::V3, |_| false),
      "605c078d0e4c31fd3fe5703f5da85f1709f2deea"
    );
  }
}

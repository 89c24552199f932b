//! C5: the merge engine (spec §4.4). Combines two events of the same
//! group key into one, applying each property's merge strategy
//! independently. Must be commutative and associative (spec §8 S4) and
//! must agree whether run incrementally (stream processor) or as a
//! single batch over a buffered pair (spec §8 S5: "buffered = streamed").

use std::collections::BTreeSet;

use crate::datatype::DataType;
use crate::event::Event;
use crate::event_type::EventType;
use crate::property::MergeStrategy;
use crate::EdxmlError;

/// Merge `incoming` into `accumulator` in place, applying `event_type`'s
/// per-property merge strategies, and report whether `accumulator`
/// actually changed (spec §4.4: "a merge that changes nothing must be
/// distinguishable from one that doesn't, so the stream processor can
/// avoid re-emitting unchanged buffered events").
///
/// Only defined for unique event types (spec §4.4: "merging is only
/// defined for event types declared unique"); callers must check
/// `event_type.is_unique()` before invoking buffered mode.
pub fn merge_events(event_type: &EventType, object_type_of: impl Fn(&str) -> Option<DataType>, accumulator: &mut Event, incoming: &Event) -> Result<bool, EdxmlError> {
  if !event_type.is_unique() {
    return Err(EdxmlError::UnsupportedOperation(format!("event type '{}' is not unique, merging is undefined", event_type.name())));
  }
  if accumulator.group_key() != incoming.group_key() {
    return Err(EdxmlError::UnsupportedOperation("cannot merge events with different group keys".to_string()));
  }

  let mut changed = false;

  // Walk every property the event type declares, not just those present on
  // either input: `replace` must be able to empty `A[p]` when `B` omits
  // `p` entirely (spec §4.4), which a union-of-present-names iteration
  // would never visit.
  for property in event_type.properties() {
    let property_name = property.name();

    // "If the property is in unique-properties: leave A[p] unchanged (the
    // hash match guarantees equality)" (spec §4.4) -- unconditionally,
    // regardless of whatever merge strategy happens to be recorded.
    if property.is_unique() {
      continue;
    }

    let incoming_values = incoming.property_values(property_name).cloned().unwrap_or_default();
    let current_values = accumulator.property_values(property_name).cloned().unwrap_or_default();

    let merged = merge_property(property.merge_strategy(), &object_type_of(property.object_type_name()), &current_values, &incoming_values)?;

    if merged != current_values {
      changed = true;
      *accumulator = std::mem::take(accumulator).set_property(property_name, merged);
    }
  }

  Ok(changed)
}

fn merge_property(strategy: MergeStrategy, data_type: &Option<DataType>, current: &BTreeSet<String>, incoming: &BTreeSet<String>) -> Result<BTreeSet<String>, EdxmlError> {
  match strategy {
    MergeStrategy::Drop => Ok(current.clone()),
    MergeStrategy::Add => Ok(current.union(incoming).cloned().collect()),
    MergeStrategy::Replace => Ok(incoming.clone()),
    MergeStrategy::Match => {
      if !current.is_empty() && current != incoming {
        return Err(EdxmlError::UnsupportedOperation(format!(
          "property declared 'match' but values differ: {:?} vs {:?}",
          current, incoming
        )));
      }
      Ok(incoming.clone())
    }
    MergeStrategy::Min | MergeStrategy::Max => {
      let data_type = data_type
        .as_ref()
        .ok_or_else(|| EdxmlError::UnsupportedOperation("min/max merge requires a resolvable object type".to_string()))?;
      let mut combined: Vec<String> = current.iter().chain(incoming.iter()).cloned().collect();
      if combined.is_empty() {
        return Ok(BTreeSet::new());
      }
      combined.sort_by(|a, b| compare_normalized(data_type, a, b));
      let chosen = if strategy == MergeStrategy::Min { combined.first() } else { combined.last() };
      Ok(chosen.into_iter().cloned().collect())
    }
  }
}

/// Order two already-normalized values according to their data type's
/// natural comparison (numeric for numbers and timestamps, lexicographic
/// otherwise), resolving the "min/max merge input" Open Question: inputs
/// are assumed pre-normalized by the type system, not raw strings cast
/// to an arbitrary numeric type.
fn compare_normalized(data_type: &DataType, a: &str, b: &str) -> std::cmp::Ordering {
  use crate::datatype::NumberType;
  match data_type {
    DataType::Number(NumberType::Decimal { .. }) | DataType::Timestamp => {
      let fa: f64 = a.parse().unwrap_or(f64::NAN);
      let fb: f64 = b.parse().unwrap_or(f64::NAN);
      fa.partial_cmp(&fb).unwrap_or(std::cmp::Ordering::Equal)
    }
    DataType::Number(_) => {
      let ia: i128 = a.parse().unwrap_or(0);
      let ib: i128 = b.parse().unwrap_or(0);
      ia.cmp(&ib)
    }
    _ => a.cmp(b),
  }
}

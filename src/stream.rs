//! C6: the stream processor (spec §4.6, §5). Drives events from a reader
//! through a capability-set handler, either hashing/merging each event
//! inline and emitting it immediately (pass-through mode) or buffering
//! per group key and flushing once a size or latency threshold is
//! crossed (buffered mode). Cooperative cancellation is checked once per
//! top-level `<event>` element (spec §5: "a chunk is one top-level event
//! element").
//!
//! Re-architected from the source's inheritance-based processor
//! callbacks into a capability-set trait (spec §9 Design Notes): a
//! handler implements only the callbacks it needs, `PassThroughHandler`
//! and `BufferedHandler` being the two shipped implementations.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::context::ProcessingContext;
use crate::datatype::DataType;
use crate::event::Event;
use crate::hash::{compute_sticky_hash, HashVariant};
use crate::merge::merge_events;
use crate::object_type::ObjectType;
use crate::registry::SchemaRegistry;
use crate::EdxmlError;

/// Storage for buffered, hash-keyed events, abstracted so a caller can
/// substitute a disk-backed or sharded store for large streams (spec
/// §4.6: "the hash store is a pluggable collaborator, not necessarily an
/// in-memory map"). Implementations must preserve first-insertion order
/// across `iter_and_clear` (spec §5: "emission order... equals the
/// insertion order of their first occurrence").
pub trait HashStore {
  fn get(&self, hash: &str) -> Option<Event>;
  fn insert(&mut self, hash: String, event: Event);
  fn iter_and_clear(&mut self) -> Vec<Event>;
}

/// Insertion-order-preserving in-memory hash store. A plain `HashMap`
/// would reorder entries on iteration, which violates the ordering
/// guarantee above -- updates to an existing hash keep that hash's
/// original slot rather than moving it to the end.
#[derive(Default)]
pub struct InMemoryHashStore {
  index: HashMap<String, usize>,
  slots: Vec<Option<(String, Event)>>,
}

impl HashStore for InMemoryHashStore {
  fn get(&self, hash: &str) -> Option<Event> {
    let i = *self.index.get(hash)?;
    self.slots[i].as_ref().map(|(_, event)| event.clone())
  }

  fn insert(&mut self, hash: String, event: Event) {
    match self.index.get(&hash) {
      Some(&i) => self.slots[i] = Some((hash, event)),
      None => {
        let i = self.slots.len();
        self.index.insert(hash.clone(), i);
        self.slots.push(Some((hash, event)));
      }
    }
  }

  fn iter_and_clear(&mut self) -> Vec<Event> {
    self.index.clear();
    std::mem::take(&mut self.slots).into_iter().flatten().map(|(_, event)| event).collect()
  }
}

/// The capability set a stream processor driver invokes. A handler
/// implements only what it needs; default methods are no-ops (spec §9
/// Design Notes: "callbacks form a capability set, not a subclassing
/// hierarchy"). `on_event` returns the events to emit immediately --
/// exactly one in pass-through mode, zero or more (on flush) in buffered
/// mode -- rather than forwarding them through a side channel.
pub trait EventHandler {
  fn on_definitions_loaded(&mut self, _registry: &SchemaRegistry, _ctx: &mut ProcessingContext) -> Result<(), EdxmlError> {
    Ok(())
  }

  fn on_event(&mut self, event: Event, registry: &SchemaRegistry, ctx: &mut ProcessingContext) -> Result<Vec<Event>, EdxmlError>;

  fn on_end_of_stream(&mut self, _registry: &SchemaRegistry, _ctx: &mut ProcessingContext) -> Result<Vec<Event>, EdxmlError> {
    Ok(Vec::new())
  }
}

fn object_type_of<'a>(registry: &'a SchemaRegistry) -> impl Fn(&str) -> Option<DataType> + 'a {
  move |name: &str| registry.object_type(name).map(|ot| ot.data_type().clone())
}

fn excluded_from_hashing<'a>(registry: &'a SchemaRegistry) -> impl Fn(&str) -> bool + 'a {
  move |name: &str| registry.object_type(name).map(|ot: &ObjectType| ot.data_type().excluded_from_hashing()).unwrap_or(false)
}

/// Pass-through mode: a flat `hash → event` map, independent of group
/// key (spec §4.6: "the processor keeps a flat hash → objects map").
/// Only event types declared unique are merge-worthy; other event types
/// have their full content folded into the hash (spec §4.3), so a
/// collision there already means the two events are identical and
/// nothing needs merging.
pub struct PassThroughHandler<S: HashStore> {
  store: S,
  hash_variant: HashVariant,
}

impl<S: HashStore> PassThroughHandler<S> {
  pub fn new(store: S, hash_variant: HashVariant) -> Self {
    PassThroughHandler { store, hash_variant }
  }
}

impl<S: HashStore> EventHandler for PassThroughHandler<S> {
  fn on_event(&mut self, event: Event, registry: &SchemaRegistry, _ctx: &mut ProcessingContext) -> Result<Vec<Event>, EdxmlError> {
    let event_type = registry
      .event_type(event.event_type_name())
      .ok_or_else(|| EdxmlError::SchemaInconsistency(event.event_type_name().to_string(), "event references an undefined event type".to_string()))?;

    if !event_type.is_unique() {
      return Ok(vec![event]);
    }

    let hash = compute_sticky_hash(&event, event_type, self.hash_variant, excluded_from_hashing(registry));
    let emitted = match self.store.get(&hash) {
      Some(mut accumulator) => {
        merge_events(event_type, object_type_of(registry), &mut accumulator, &event)?;
        self.store.insert(hash, accumulator.clone());
        accumulator
      }
      None => {
        self.store.insert(hash, event.clone());
        event
      }
    };
    Ok(vec![emitted])
  }
}

/// Composes the two-level `group_key = (event_type, source) → hash`
/// buffer key (spec §4.6) into the single string [`HashStore`] keys on.
/// The separator is a control character excluded from event-type names,
/// source URIs and hex hashes, so it cannot be forged by any of the
/// three parts to collide with a different grouping.
fn buffer_key(event_type_name: &str, source_uri: &str, hash: &str) -> String {
  format!("{}\u{1}{}\u{1}{}", event_type_name, source_uri, hash)
}

/// Buffered mode: a two-level map of `group_key = (event_type, source) →
/// hash → buffered_event` (spec §4.6), flushed when the buffered-event
/// count reaches `max_buffer_size`, when wall-clock time since the last
/// flush exceeds `max_latency`, or at end-of-stream. The two levels are
/// realized as a single flat [`HashStore`] keyed by [`buffer_key`], so
/// two events that share a hash but not a group (e.g. two sources
/// colliding under the source-agnostic v2 hash variant) occupy distinct
/// slots instead of merging into one.
pub struct BufferedHandler<S: HashStore> {
  store: S,
  hash_variant: HashVariant,
  max_buffer_size: usize,
  max_latency: Option<Duration>,
  buffered_count: usize,
  last_flush: Instant,
}

impl<S: HashStore> BufferedHandler<S> {
  /// `max_buffer_size` of `0` is treated as `1` (spec §6: "`-b <n>`
  /// buffer size (default 1 = pass-through)" -- a buffered handler always
  /// buffers at least one event before it can merge anything).
  pub fn new(store: S, hash_variant: HashVariant, max_buffer_size: usize) -> Self {
    BufferedHandler {
      store,
      hash_variant,
      max_buffer_size: max_buffer_size.max(1),
      max_latency: None,
      buffered_count: 0,
      last_flush: Instant::now(),
    }
  }

  /// A latency of zero disables latency-driven flushing (spec §5:
  /// "`max_latency == 0` disables latency-driven flushing").
  pub fn with_max_latency(mut self, max_latency: Duration) -> Self {
    self.max_latency = if max_latency.is_zero() { None } else { Some(max_latency) };
    self
  }

  fn flush(&mut self) -> Vec<Event> {
    self.buffered_count = 0;
    self.last_flush = Instant::now();
    self.store.iter_and_clear()
  }

  fn latency_elapsed(&self) -> bool {
    self.max_latency.is_some_and(|max| self.last_flush.elapsed() >= max)
  }
}

impl<S: HashStore> EventHandler for BufferedHandler<S> {
  fn on_event(&mut self, event: Event, registry: &SchemaRegistry, ctx: &mut ProcessingContext) -> Result<Vec<Event>, EdxmlError> {
    let event_type = registry
      .event_type(event.event_type_name())
      .ok_or_else(|| EdxmlError::SchemaInconsistency(event.event_type_name().to_string(), "event references an undefined event type".to_string()))?;

    if !event_type.is_unique() {
      ctx.warn(format!("event type '{}' is not unique; passing event through unbuffered", event_type.name()));
      return Ok(vec![event]);
    }

    let hash = compute_sticky_hash(&event, event_type, self.hash_variant, excluded_from_hashing(registry));
    let key = buffer_key(event.event_type_name(), event.source_uri(), &hash);
    match self.store.get(&key) {
      Some(mut accumulator) => {
        merge_events(event_type, object_type_of(registry), &mut accumulator, &event)?;
        self.store.insert(key, accumulator);
      }
      None => {
        self.store.insert(key, event);
        self.buffered_count += 1;
        if self.buffered_count >= self.max_buffer_size {
          return Ok(self.flush());
        }
      }
    }

    if self.latency_elapsed() {
      return Ok(self.flush());
    }
    Ok(Vec::new())
  }

  fn on_end_of_stream(&mut self, _registry: &SchemaRegistry, _ctx: &mut ProcessingContext) -> Result<Vec<Event>, EdxmlError> {
    Ok(self.flush())
  }
}

/// Runs `handler` over `events`, checking `stop` once per event (spec
/// §5: cooperative cancellation at chunk boundaries) and dispatching
/// `on_definitions_loaded` once before the first event, matching the
/// "definitions precede events" structural invariant of an EDXML
/// document (spec §3). On a stop signal, pending buffers are flushed via
/// `on_end_of_stream` before returning the interruption error, so a
/// caller closing its writer still sees whatever was buffered.
pub fn run_stream<H: EventHandler>(
  registry: &SchemaRegistry,
  events: impl IntoIterator<Item = Event>,
  handler: &mut H,
  ctx: &mut ProcessingContext,
  mut stop: impl FnMut() -> bool,
) -> Result<Vec<Event>, EdxmlError> {
  handler.on_definitions_loaded(registry, ctx)?;
  let mut emitted = Vec::new();
  for event in events {
    if stop() {
      emitted.extend(handler.on_end_of_stream(registry, ctx)?);
      return Err(EdxmlError::ProcessingInterrupted);
    }
    emitted.extend(handler.on_event(event, registry, ctx)?);
  }
  emitted.extend(handler.on_end_of_stream(registry, ctx)?);
  Ok(emitted)
}

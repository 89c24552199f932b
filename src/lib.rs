//! A core library for reading, validating, merging and re-emitting
//! EDXML event streams.
//!
//! The schema side (object types, event types, properties, relations
//! and sources) is accumulated into a [`registry::SchemaRegistry`], which
//! enforces the cross-definition invariants an EDXML document requires.
//! Event streams are driven through [`stream::run_stream`] against an
//! [`stream::EventHandler`], in either pass-through or buffered/merging
//! mode. [`hash`] computes the sticky hash used to detect and merge
//! logically identical events, and [`merge`] implements the per-property
//! merge algebra. [`reporter`] validates the human-readable reporter
//! string mini-language, and [`emit`] re-serializes an accumulated
//! schema back to EDXML, XSD or RelaxNG.

#[macro_use]
mod macros;

pub mod attrs;
pub mod config;
pub mod context;
pub mod datatype;
pub mod emit;
pub mod error;
pub mod event;
pub mod event_type;
pub mod hash;
pub mod merge;
pub mod object_type;
pub mod property;
pub mod registry;
pub mod relation;
pub mod reporter;
pub mod source;
pub mod stream;
pub mod xml;

pub use self::{
  config::ProcessorConfig,
  context::ProcessingContext,
  datatype::{DataType, NumberType},
  error::EdxmlError,
  event::Event,
  event_type::{EventType, EventTypeParent},
  hash::{compute_sticky_hash, HashVariant},
  merge::merge_events,
  object_type::ObjectType,
  property::{MergeStrategy, Property},
  registry::SchemaRegistry,
  relation::{Relation, RelationType},
  reporter::ReporterTemplate,
  source::Source,
  stream::{run_stream, BufferedHandler, EventHandler, HashStore, InMemoryHashStore, PassThroughHandler},
  xml::{EdxmlWriter, QuickXmlEdxmlWriter},
};

//! # velomap
//!
//! **velomap** captures declaratively described request/response payload
//! shapes and mechanically derives two artifacts from them: a normalized,
//! recursive metadata tree ([`schema::FieldNode`]) describing every field's
//! type, nesting and origin, and, for HTTP-facing payloads, text in the
//! gateway's request-mapping templating dialect (VTL as evaluated by API
//! Gateway) that transforms an incoming request directly into a backend call
//! payload, with no compute step in between.
//!
//! ## Overview
//!
//! Payload shapes are declared once, during the synthesis (build) phase, and
//! everything downstream is a pure function of that registry: the tree
//! builder expands nested payload classes recursively, and the template
//! compiler walks the resulting tree emitting exact, whitespace-sensitive
//! template text. The compiled text executes later inside the gateway's own
//! evaluator; this crate performs no network I/O and never runs a template.
//!
//! ## Architecture
//!
//! - **[`schema`]** - field capture registry, payload identity, the
//!   `FieldNode` tree builder, and declarative manifest loading
//! - **[`template`]** - the mapping-template compiler: source accessors,
//!   object/array assembly, and the optional-field validation guard
//! - **[`classify`]** - five-way kind classification for dynamic values
//!   that were never declared ahead of time
//! - **[`phase`]** - the process-wide synthesis-phase flag and environment
//!   configuration
//!
//! ### Synthesis Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant App as Payload declarations<br/>(#[derive(Payload)] / manifest)
//!     participant Capture as schema::capture
//!     participant Build as schema::build_field_tree
//!     participant Compile as template::generate_template
//!     participant Gateway as Gateway integration<br/>(external)
//!
//!     App->>Capture: register_payload::<T>()
//!     Capture->>Capture: append field stubs<br/>(declaration order, one slot per name)
//!     App->>Build: build_field_tree::<T>()
//!     Build->>Capture: read registry
//!     Build->>Build: expand nested classes<br/>(depth-bounded)
//!     Build-->>App: FieldNode tree
//!     App->>Compile: generate_template(field)
//!     Compile->>Compile: accessor / object / array emission
//!     Compile-->>App: mapping template text
//!     App->>Gateway: embed template in integration
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use velomap::{generate_template, Payload};
//!
//! #[derive(Payload)]
//! struct CreateUser {
//!     username: String,
//!     #[field(source = "query")]
//!     invite: Option<String>,
//! }
//!
//! velomap::phase::enter_build_phase();
//!
//! let tree = velomap::schema::build_field_tree::<CreateUser>().unwrap();
//! let username = &tree.properties.as_ref().unwrap()[0];
//! assert_eq!(
//!     generate_template(username),
//!     "\"$input.path('$.username')\""
//! );
//! ```
//!
//! ## Key Behaviors
//!
//! - **Build-phase gating**: capture calls outside the synthesis phase are
//!   no-ops unless a payload family opts into
//!   [`schema::CapturePolicy::Always`], so deployed handlers pay nothing.
//! - **Stable payload ids**: each distinct class registration gets an id
//!   once; distinct classes colliding on a declared name get suffixed ids,
//!   and re-registration never reassigns.
//! - **Order preservation**: sibling fields keep declaration order through
//!   every transformation; consumers rely on it for stable loop-variable
//!   naming.
//! - **Bounded nesting**: a payload class that nests itself fails with a
//!   clear `NestingTooDeep` error instead of overflowing the stack
//!   (`VELOMAP_MAX_DEPTH` tunes the bound).
//! - **Exact emission**: compiled text matches the gateway's expected
//!   literal patterns down to whitespace and quoting; see
//!   `tests/template_tests.rs` for the accessor table.

pub mod classify;
pub mod phase;
pub mod schema;
pub mod template;

pub use classify::{classify_value, UnsupportedValueError};
pub use schema::{
    build_field_tree, build_named_field_tree, capture_field, clear_registry, declare_payload,
    load_manifest, register_payload, CapturePolicy, DeclaredType, FieldDecl, FieldKind, FieldNode,
    FieldSource, IdCounterPolicy, PayloadKey, PayloadMetadata, PayloadRef, PayloadRegistrar,
    PayloadShape, SchemaError, ValidationSpec,
};
pub use template::{
    generate_template, generate_template_with, source_accessor, validate_template_argument,
    ValueParser, DEFAULT_QUOTE,
};

/// Re-exported for the derive macro's generated code and for callers
/// assembling [`schema::FieldDecl`] `initial_value` constants.
pub use serde_json;

pub use velomap_macros::Payload;

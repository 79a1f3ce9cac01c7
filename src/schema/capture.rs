use super::types::{FieldSource, PayloadMetadata, ValidationSpec};
use crate::phase;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, warn};

/// Wire and destination names must survive single-quoted accessor paths and
/// JSON keys without escaping.
static FIELD_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").expect("field name pattern is valid")
});

/// Build-time schema failure, identifying the offending class/property pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Declared type is not a primitive marker, a payload reference, or a
    /// one-element collection of either.
    UnsupportedFieldType {
        payload: String,
        property: String,
        declared: String,
    },
    /// Wire or destination name would break accessor quoting.
    InvalidFieldName { payload: String, property: String },
    /// `validation.pattern` does not compile as a regex.
    InvalidPattern {
        payload: String,
        property: String,
        pattern: String,
    },
    /// A nested payload reference names a class that was never registered.
    UnknownPayload { name: String },
    /// Payload nesting exceeded the configured depth bound; almost always a
    /// class that nests itself directly or transitively.
    NestingTooDeep { payload: String, limit: usize },
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaError::UnsupportedFieldType {
                payload,
                property,
                declared,
            } => {
                write!(
                    f,
                    "unsupported field type on {}.{}: {} is not a primitive marker, \
                    a payload reference, or a one-element collection of either",
                    payload, property, declared
                )
            }
            SchemaError::InvalidFieldName { payload, property } => {
                write!(
                    f,
                    "invalid field name on {}.{}: names must match [A-Za-z_][A-Za-z0-9_.-]*",
                    payload, property
                )
            }
            SchemaError::InvalidPattern {
                payload,
                property,
                pattern,
            } => {
                write!(
                    f,
                    "validation pattern on {}.{} does not compile: '{}'",
                    payload, property, pattern
                )
            }
            SchemaError::UnknownPayload { name } => {
                write!(f, "payload class '{}' is not registered", name)
            }
            SchemaError::NestingTooDeep { payload, limit } => {
                write!(
                    f,
                    "payload class '{}' nests deeper than {} levels; \
                    check for a class that nests itself",
                    payload, limit
                )
            }
        }
    }
}

impl std::error::Error for SchemaError {}

/// Stable identity of a payload class in the registry: the `TypeId` of a
/// Rust type, or the declared name of a manifest-loaded class.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PayloadKey {
    Type(TypeId),
    Named(String),
}

impl PayloadKey {
    pub fn of<T: PayloadShape>() -> Self {
        PayloadKey::Type(TypeId::of::<T>())
    }

    pub fn named(name: impl Into<String>) -> Self {
        PayloadKey::Named(name.into())
    }
}

/// When capture calls for a payload family are effective.
///
/// `BuildPhase` families pay no registration cost in deployed handlers;
/// `Always` is for families whose consumers need the schema during live
/// message processing (a queue record mapper reads field sources at
/// invocation time, not just at synthesis).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapturePolicy {
    #[default]
    BuildPhase,
    Always,
}

/// Reference to a nested payload class inside a field declaration.
///
/// References created from Rust types carry a registration hook so the tree
/// builder can expand classes that were not registered up front.
#[derive(Clone)]
pub struct PayloadRef {
    key: PayloadKey,
    name: String,
    ensure: Option<fn() -> Result<(), SchemaError>>,
}

impl PayloadRef {
    pub fn of<T: PayloadShape>() -> Self {
        PayloadRef {
            key: PayloadKey::of::<T>(),
            name: T::NAME.to_string(),
            ensure: Some(register_payload::<T>),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        PayloadRef {
            key: PayloadKey::Named(name.clone()),
            name,
            ensure: None,
        }
    }

    pub fn key(&self) -> &PayloadKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn ensure_registered(&self) -> Result<(), SchemaError> {
        match self.ensure {
            Some(register) => register(),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for PayloadRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadRef")
            .field("key", &self.key)
            .field("name", &self.name)
            .finish()
    }
}

impl PartialEq for PayloadRef {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for PayloadRef {}

/// A declared field type: a primitive marker, the opaque `Object` fallback,
/// a nested payload reference, or a one-element collection of a marker or
/// reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredType {
    String,
    Number,
    Boolean,
    Object,
    Payload(PayloadRef),
    Array(Box<DeclaredType>),
}

impl DeclaredType {
    /// `Array(element)` convenience for the derive macro and manual callers.
    pub fn array(element: DeclaredType) -> Self {
        DeclaredType::Array(Box::new(element))
    }

    fn describe(&self) -> String {
        match self {
            DeclaredType::String => "String".to_string(),
            DeclaredType::Number => "Number".to_string(),
            DeclaredType::Boolean => "Boolean".to_string(),
            DeclaredType::Object => "Object".to_string(),
            DeclaredType::Payload(p) => p.name().to_string(),
            DeclaredType::Array(el) => format!("[{}]", el.describe()),
        }
    }
}

/// Everything a single `capture_field` call can say about a property.
///
/// `ty = None` means the ambient declared property type applies (the derive
/// macro fills it in from the struct field; absent that, the field falls back
/// to the opaque `Object` kind).
#[derive(Debug, Clone, Default)]
pub struct FieldDecl {
    pub ty: Option<DeclaredType>,
    pub source: Option<FieldSource>,
    pub destination_name: Option<String>,
    pub validation: ValidationSpec,
    pub direct_template_value: Option<String>,
    pub initial_value: Option<Value>,
}

impl FieldDecl {
    pub fn typed(ty: DeclaredType) -> Self {
        FieldDecl {
            ty: Some(ty),
            ..FieldDecl::default()
        }
    }
}

/// A payload class that can declare its fields into the registry.
///
/// Usually implemented via `#[derive(Payload)]`; hand implementations call
/// [`PayloadRegistrar::field`] once per property, in declaration order.
pub trait PayloadShape: 'static {
    const NAME: &'static str;
    const CAPTURE: CapturePolicy = CapturePolicy::BuildPhase;

    fn declare(reg: &mut PayloadRegistrar);
}

#[derive(Debug, Clone)]
pub(crate) struct CapturedField {
    pub(crate) property: String,
    pub(crate) decl: FieldDecl,
}

#[derive(Debug, Clone)]
pub(crate) struct PayloadEntry {
    pub(crate) meta: PayloadMetadata,
    pub(crate) policy: CapturePolicy,
    pub(crate) fields: Vec<CapturedField>,
}

#[derive(Default)]
struct RegistryInner {
    payloads: HashMap<PayloadKey, PayloadEntry>,
    id_counts: HashMap<String, u32>,
}

static REGISTRY: Lazy<RwLock<RegistryInner>> = Lazy::new(|| RwLock::new(RegistryInner::default()));

fn read_registry() -> std::sync::RwLockReadGuard<'static, RegistryInner> {
    REGISTRY.read().unwrap_or_else(|e| e.into_inner())
}

fn write_registry() -> std::sync::RwLockWriteGuard<'static, RegistryInner> {
    REGISTRY.write().unwrap_or_else(|e| e.into_inner())
}

/// Whether the per-name payload id counters survive a registry reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdCounterPolicy {
    /// Fresh counters; ids start over from the bare class name.
    Reset,
    /// Counters persist, so classes registered after the reset continue the
    /// suffix sequence of earlier builds in the same process.
    Persist,
}

/// Empty the registry between independent build invocations.
pub fn clear_registry(policy: IdCounterPolicy) {
    let mut inner = write_registry();
    inner.payloads.clear();
    if policy == IdCounterPolicy::Reset {
        inner.id_counts.clear();
    }
}

fn assign_payload_id(counts: &mut HashMap<String, u32>, name: &str) -> String {
    let seen = counts.entry(name.to_string()).or_insert(0);
    *seen += 1;
    if *seen == 1 {
        name.to_string()
    } else {
        let id = format!("{}_{}", name, *seen - 1);
        warn!(payload = name, id = %id, "duplicate payload name; using suffixed id");
        id
    }
}

impl RegistryInner {
    /// Entry lookup that creates on first sight; id assignment happens here,
    /// exactly once per distinct registration.
    fn entry_mut(&mut self, key: &PayloadKey, name: &str, policy: CapturePolicy) -> &mut PayloadEntry {
        let RegistryInner {
            payloads,
            id_counts,
        } = self;
        payloads.entry(key.clone()).or_insert_with(|| PayloadEntry {
            meta: PayloadMetadata {
                id: assign_payload_id(id_counts, name),
                name: name.to_string(),
            },
            policy,
            fields: Vec::new(),
        })
    }
}

fn validate_decl(payload: &str, property: &str, decl: &FieldDecl) -> Result<(), SchemaError> {
    if !FIELD_NAME_RE.is_match(property) {
        return Err(SchemaError::InvalidFieldName {
            payload: payload.to_string(),
            property: property.to_string(),
        });
    }
    if let Some(dest) = &decl.destination_name {
        if !FIELD_NAME_RE.is_match(dest) {
            return Err(SchemaError::InvalidFieldName {
                payload: payload.to_string(),
                property: property.to_string(),
            });
        }
    }
    if let Some(pattern) = &decl.validation.pattern {
        if Regex::new(pattern).is_err() {
            return Err(SchemaError::InvalidPattern {
                payload: payload.to_string(),
                property: property.to_string(),
                pattern: pattern.clone(),
            });
        }
    }
    if let Some(DeclaredType::Array(element)) = &decl.ty {
        match element.as_ref() {
            DeclaredType::String
            | DeclaredType::Number
            | DeclaredType::Boolean
            | DeclaredType::Payload(_) => {}
            other => {
                return Err(SchemaError::UnsupportedFieldType {
                    payload: payload.to_string(),
                    property: property.to_string(),
                    declared: format!("[{}]", other.describe()),
                });
            }
        }
    }
    Ok(())
}

fn capture_into(
    key: &PayloadKey,
    payload_name: &str,
    policy: CapturePolicy,
    property: &str,
    decl: FieldDecl,
) -> Result<(), SchemaError> {
    if policy == CapturePolicy::BuildPhase && !phase::is_build_phase() {
        return Ok(());
    }
    validate_decl(payload_name, property, &decl)?;

    let mut inner = write_registry();
    let entry = inner.entry_mut(key, payload_name, policy);
    let captured = CapturedField {
        property: property.to_string(),
        decl,
    };
    // Single slot per property name: a re-declaration replaces the earlier
    // one in place instead of appending a duplicate.
    match entry.fields.iter_mut().find(|f| f.property == property) {
        Some(slot) => *slot = captured,
        None => entry.fields.push(captured),
    }
    debug!(payload = payload_name, property, "captured field");
    Ok(())
}

/// Declare a name-keyed payload class (the manifest path). Creates the
/// registry entry and assigns its id; a repeat declaration for the same name
/// keeps the existing id and fields.
pub fn declare_payload(name: &str, policy: CapturePolicy) {
    if policy == CapturePolicy::BuildPhase && !phase::is_build_phase() {
        return;
    }
    let key = PayloadKey::named(name);
    let mut inner = write_registry();
    inner.entry_mut(&key, name, policy);
}

/// Capture one property of a name-keyed payload class, in declaration order.
pub fn capture_field(payload: &str, property: &str, decl: FieldDecl) -> Result<(), SchemaError> {
    let key = PayloadKey::named(payload);
    let policy = read_registry()
        .payloads
        .get(&key)
        .map(|e| e.policy)
        .unwrap_or_default();
    capture_into(&key, payload, policy, property, decl)
}

/// Register a Rust payload class: creates its registry entry (id assigned on
/// first registration only) and runs its field declarations. Idempotent; a
/// repeat registration re-captures fields in place.
pub fn register_payload<T: PayloadShape>() -> Result<(), SchemaError> {
    if T::CAPTURE == CapturePolicy::BuildPhase && !phase::is_build_phase() {
        return Ok(());
    }
    {
        let key = PayloadKey::of::<T>();
        let mut inner = write_registry();
        inner.entry_mut(&key, T::NAME, T::CAPTURE);
    }
    let mut reg = PayloadRegistrar {
        key: PayloadKey::of::<T>(),
        payload_name: T::NAME.to_string(),
        policy: T::CAPTURE,
        error: None,
    };
    T::declare(&mut reg);
    match reg.error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Accumulates one payload class's field declarations during registration.
pub struct PayloadRegistrar {
    key: PayloadKey,
    payload_name: String,
    policy: CapturePolicy,
    error: Option<SchemaError>,
}

impl PayloadRegistrar {
    /// Capture one property. After the first failure, later calls are
    /// ignored and the failure is reported from `register_payload`.
    pub fn field(&mut self, property: &str, decl: FieldDecl) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = capture_into(&self.key, &self.payload_name, self.policy, property, decl) {
            self.error = Some(err);
        }
    }
}

/// Metadata for a registered payload, if present.
pub fn payload_metadata(key: &PayloadKey) -> Option<PayloadMetadata> {
    read_registry().payloads.get(key).map(|e| e.meta.clone())
}

pub(crate) fn snapshot(key: &PayloadKey) -> Option<PayloadEntry> {
    read_registry().payloads.get(key).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::enter_build_phase;

    #[test]
    fn test_capture_preserves_declaration_order() {
        enter_build_phase();
        declare_payload("OrderTest", CapturePolicy::BuildPhase);
        capture_field("OrderTest", "first", FieldDecl::typed(DeclaredType::String)).unwrap();
        capture_field("OrderTest", "second", FieldDecl::typed(DeclaredType::Number)).unwrap();
        capture_field("OrderTest", "third", FieldDecl::typed(DeclaredType::Boolean)).unwrap();

        let entry = snapshot(&PayloadKey::named("OrderTest")).unwrap();
        let names: Vec<&str> = entry.fields.iter().map(|f| f.property.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_recapture_overwrites_in_place() {
        enter_build_phase();
        declare_payload("OverwriteTest", CapturePolicy::BuildPhase);
        capture_field("OverwriteTest", "a", FieldDecl::typed(DeclaredType::String)).unwrap();
        capture_field("OverwriteTest", "b", FieldDecl::typed(DeclaredType::String)).unwrap();
        capture_field("OverwriteTest", "a", FieldDecl::typed(DeclaredType::Number)).unwrap();

        let entry = snapshot(&PayloadKey::named("OverwriteTest")).unwrap();
        assert_eq!(entry.fields.len(), 2);
        assert_eq!(entry.fields[0].property, "a");
        assert_eq!(
            entry.fields[0].decl.ty,
            Some(DeclaredType::Number),
            "last declaration wins, position preserved"
        );
    }

    #[test]
    fn test_array_of_array_is_unsupported() {
        enter_build_phase();
        declare_payload("BadArray", CapturePolicy::BuildPhase);
        let decl = FieldDecl::typed(DeclaredType::array(DeclaredType::array(DeclaredType::String)));
        let err = capture_field("BadArray", "matrix", decl).unwrap_err();
        match err {
            SchemaError::UnsupportedFieldType { payload, property, .. } => {
                assert_eq!(payload, "BadArray");
                assert_eq!(property, "matrix");
            }
            other => panic!("expected UnsupportedFieldType, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_field_name_rejected() {
        enter_build_phase();
        declare_payload("BadName", CapturePolicy::BuildPhase);
        let err = capture_field("BadName", "has'quote", FieldDecl::default()).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidFieldName { .. }));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        enter_build_phase();
        declare_payload("BadPattern", CapturePolicy::BuildPhase);
        let mut decl = FieldDecl::typed(DeclaredType::String);
        decl.validation.pattern = Some("[unclosed".to_string());
        let err = capture_field("BadPattern", "code", decl).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidPattern { .. }));
    }

    #[test]
    fn test_distinct_classes_sharing_a_name_get_suffixed_ids() {
        enter_build_phase();

        struct First;
        impl PayloadShape for First {
            const NAME: &'static str = "SharedName";
            fn declare(reg: &mut PayloadRegistrar) {
                reg.field("a", FieldDecl::typed(DeclaredType::String));
            }
        }
        struct Second;
        impl PayloadShape for Second {
            const NAME: &'static str = "SharedName";
            fn declare(reg: &mut PayloadRegistrar) {
                reg.field("b", FieldDecl::typed(DeclaredType::String));
            }
        }

        register_payload::<First>().unwrap();
        register_payload::<Second>().unwrap();
        // Re-registering the same class does not consume another id.
        register_payload::<First>().unwrap();

        let first = payload_metadata(&PayloadKey::of::<First>()).unwrap();
        let second = payload_metadata(&PayloadKey::of::<Second>()).unwrap();
        assert_eq!(first.id, "SharedName");
        assert_eq!(second.id, "SharedName_1");
        assert_eq!(first.name, second.name);
    }
}

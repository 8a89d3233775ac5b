//! Core value types.
//!
//! A [`Value`] is anything a caller can put into a template slot: scalars
//! that stringify into text, nested [`Partial`]s, arrays, async values
//! (futures and resumable computations), [`Ref`] handles, and attribute
//! maps for name-position spreads. A [`Partial`] pairs a template identity
//! with the ordered values for its slots and is the unit of rendering.

use std::fmt;
use std::rc::Rc;

use crate::reference::Ref;
use crate::resolve::{ResumableValue, ValueFuture};
use crate::template::{Structure, TemplateId};

// =============================================================================
// PartialKey
// =============================================================================

/// Identity used for compatibility checks between a partial and a
/// previously rendered subtree.
///
/// By default this is the template identity, so two partials built from the
/// same structure are compatible. A caller-supplied name (see
/// [`Partial::keyed`]) overrides it, which is how list items rendered from
/// one shared template reconcile per item instead of first-match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PartialKey {
    /// The identity of the static structure.
    Template(TemplateId),
    /// A caller-supplied key.
    Named(Rc<str>),
}

impl fmt::Display for PartialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartialKey::Template(id) => write!(f, "template#{id}"),
            PartialKey::Named(name) => write!(f, "key:{name}"),
        }
    }
}

// =============================================================================
// Partial
// =============================================================================

/// A template identity paired with concrete slot values.
///
/// Partials are ephemeral: one is built per render call and consumed by the
/// engine. Compatibility between a partial and an existing rendered subtree
/// is key equality, nothing structural.
///
/// # Example
///
/// ```ignore
/// use quilt::template::element;
/// use quilt::Partial;
///
/// let greeting = element("div").text("Hello ").slot(0).into_structure();
///
/// let partial = Partial::new(&greeting, vec!["world".into()]);
/// let keyed = Partial::new(&greeting, vec!["item 1".into()]).keyed("row-1");
/// ```
#[derive(Clone)]
pub struct Partial {
    key: PartialKey,
    structure: Rc<Structure>,
    values: Vec<Value>,
}

impl Partial {
    /// Pair a structure with the values for its slots.
    ///
    /// The value count must match the structure's slot count; the mismatch
    /// is caught (and panics) when the partial is rendered.
    pub fn new(structure: &Rc<Structure>, values: Vec<Value>) -> Self {
        Self {
            key: PartialKey::Template(structure.id()),
            structure: structure.clone(),
            values,
        }
    }

    /// Override the partial's key with a caller-supplied name.
    ///
    /// Keyed partials reconcile against subtrees carrying the same name,
    /// regardless of which template produced them.
    pub fn keyed(mut self, key: impl Into<Rc<str>>) -> Self {
        self.key = PartialKey::Named(key.into());
        self
    }

    /// The compatibility key.
    pub fn key(&self) -> &PartialKey {
        &self.key
    }

    /// The static structure this partial renders.
    pub fn structure(&self) -> &Rc<Structure> {
        &self.structure
    }

    /// The ordered slot values.
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

impl fmt::Debug for Partial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Partial")
            .field("key", &self.key)
            .field("values", &self.values.len())
            .finish()
    }
}

// =============================================================================
// Value
// =============================================================================

/// A dynamic slot value.
///
/// Scalar kinds stringify into text content or attribute values. `Partial`
/// renders a nested subtree. `List` is flattened recursively by the list
/// reconciler. `Future` and `Resumable` defer through the async resolver.
/// `Ref` binds a stable node handle when used as an attribute value.
/// `Attributes` spreads a whole map into a name-position attribute slot.
#[derive(Clone)]
pub enum Value {
    /// Empty slot; removes the current occupant.
    Null,
    /// Boolean, stringified as `true`/`false` (presence rules apply in
    /// boolean attribute positions).
    Bool(bool),
    /// Integer, stringified.
    Int(i64),
    /// Float, stringified.
    Float(f64),
    /// Text content.
    Text(String),
    /// Any displayable scalar (dates, patterns, ...), stringified on use.
    Scalar(Rc<dyn fmt::Display>),
    /// A nested template with its own values.
    Partial(Partial),
    /// An array of values, flattened recursively.
    List(Vec<Value>),
    /// An async value; the slot defers until it resolves.
    Future(ValueFuture),
    /// A resumable computation stepped by the async resolver.
    Resumable(ResumableValue),
    /// A stable node handle, valid in attribute positions.
    Ref(Ref),
    /// A whole attribute map, valid in name-position attribute slots.
    Attributes(Vec<(String, Value)>),
}

impl Value {
    /// Wrap any displayable scalar.
    pub fn display(value: impl fmt::Display + 'static) -> Self {
        Value::Scalar(Rc::new(value))
    }

    /// Stringify a scalar value.
    ///
    /// Returns `None` for `Null` and for every non-scalar kind.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Scalar(d) => Some(d.to_string()),
            _ => None,
        }
    }

    /// Whether this is a scalar kind that stringifies.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Text(_) | Value::Scalar(_)
        )
    }

    /// Short kind name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Scalar(_) => "scalar",
            Value::Partial(_) => "partial",
            Value::List(_) => "list",
            Value::Future(_) => "future",
            Value::Resumable(_) => "resumable",
            Value::Ref(_) => "ref",
            Value::Attributes(_) => "attributes",
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Text(s) => write!(f, "Text({s:?})"),
            Value::Scalar(d) => write!(f, "Scalar({d})"),
            Value::Partial(p) => write!(f, "Partial({})", p.key()),
            Value::List(items) => write!(f, "List(len={})", items.len()),
            Value::Future(_) => write!(f, "Future"),
            Value::Resumable(_) => write!(f, "Resumable"),
            Value::Ref(r) => write!(f, "Ref({})", r.uid()),
            Value::Attributes(attrs) => write!(f, "Attributes(len={})", attrs.len()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Partial> for Value {
    fn from(p: Partial) -> Self {
        Value::Partial(p)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Ref> for Value {
    fn from(r: Ref) -> Self {
        Value::Ref(r)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

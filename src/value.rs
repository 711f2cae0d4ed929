//! Runtime values: primitives, interned strings, property bags and the
//! exotic-object payloads that specialize them.
//!
//! `JsObject` here is the plain property bag. Array-specific routing of
//! integer keys (dense storage, the `length` invariant) lives in
//! [`crate::array`] and is driven through [`crate::context::Context`], which
//! owns prototype walking and accessor invocation.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::array::{ArrayFunction, ArrayStorage};
use crate::context::Context;
use crate::error::JsError;
use crate::prelude::*;

/// Marker for types whose `clone` is a reference-count bump or a small copy,
/// so call sites can signal that cloning is intentional and cheap.
pub trait CheapClone: Clone {
    fn cheap_clone(&self) -> Self {
        self.clone()
    }
}

impl<T: ?Sized> CheapClone for Rc<T> {}
impl CheapClone for JsString {}
impl CheapClone for JsValue {}

/// Shared, mutable object handle. Identity (`Rc::ptr_eq`) is object identity.
pub type JsObjectRef = Rc<RefCell<JsObject>>;

/// Signature of a native function exposed to script values.
pub type NativeFn = fn(&mut Context, &JsValue, &[JsValue]) -> Result<JsValue, JsError>;

// ---------------------------------------------------------------------------
// JsValue
// ---------------------------------------------------------------------------

/// A runtime value. `Undefined` doubles as the default.
#[derive(Clone)]
pub enum JsValue {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(JsString),
    Object(JsObjectRef),
}

impl Default for JsValue {
    fn default() -> Self {
        JsValue::Undefined
    }
}

impl JsValue {
    pub fn type_of(&self) -> &'static str {
        match self {
            JsValue::Undefined => "undefined",
            JsValue::Null => "object",
            JsValue::Boolean(_) => "boolean",
            JsValue::Number(_) => "number",
            JsValue::String(_) => "string",
            JsValue::Object(obj) => {
                if obj.borrow().is_callable() {
                    "function"
                } else {
                    "object"
                }
            }
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, JsValue::Undefined)
    }

    pub fn is_callable(&self) -> bool {
        match self {
            JsValue::Object(obj) => obj.borrow().is_callable(),
            _ => false,
        }
    }

    pub fn as_object(&self) -> Option<&JsObjectRef> {
        match self {
            JsValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn to_boolean(&self) -> bool {
        match self {
            JsValue::Undefined | JsValue::Null => false,
            JsValue::Boolean(b) => *b,
            JsValue::Number(n) => !(*n == 0.0 || n.is_nan()),
            JsValue::String(s) => !s.is_empty(),
            JsValue::Object(_) => true,
        }
    }

    /// Prototype-blind ToNumber. Objects map to NaN here; the context-aware
    /// conversion in [`Context::to_number_value`] runs ToPrimitive first.
    pub fn to_number(&self) -> f64 {
        match self {
            JsValue::Undefined => f64::NAN,
            JsValue::Null => 0.0,
            JsValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            JsValue::Number(n) => *n,
            JsValue::String(s) => parse_number_literal(s.as_str()),
            JsValue::Object(_) => f64::NAN,
        }
    }

    /// Prototype-blind ToString. Objects map to a placeholder; the
    /// context-aware conversion in [`Context::to_string_value`] consults
    /// `toString` methods and the cycle guard.
    pub fn to_js_string(&self) -> JsString {
        match self {
            JsValue::Undefined => JsString::from("undefined"),
            JsValue::Null => JsString::from("null"),
            JsValue::Boolean(b) => JsString::from(if *b { "true" } else { "false" }),
            JsValue::Number(n) => JsString::from(number_to_string(*n)),
            JsValue::String(s) => s.cheap_clone(),
            JsValue::Object(_) => JsString::from("[object Object]"),
        }
    }

    /// Strict equality: no coercion, `NaN != NaN`, `+0 == -0`, objects by
    /// identity.
    pub fn strict_equals(&self, other: &JsValue) -> bool {
        match (self, other) {
            (JsValue::Undefined, JsValue::Undefined) | (JsValue::Null, JsValue::Null) => true,
            (JsValue::Boolean(a), JsValue::Boolean(b)) => a == b,
            (JsValue::Number(a), JsValue::Number(b)) => a == b,
            (JsValue::String(a), JsValue::String(b)) => a == b,
            (JsValue::Object(a), JsValue::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsValue::Undefined => write!(f, "undefined"),
            JsValue::Null => write!(f, "null"),
            JsValue::Boolean(b) => write!(f, "{b}"),
            JsValue::Number(n) => write!(f, "{}", number_to_string(*n)),
            JsValue::String(s) => write!(f, "{:?}", s.as_str()),
            JsValue::Object(obj) => {
                if obj.borrow().is_array() {
                    write!(f, "[array {:p}]", Rc::as_ptr(obj))
                } else if obj.borrow().is_callable() {
                    write!(f, "[function {:p}]", Rc::as_ptr(obj))
                } else {
                    write!(f, "[object {:p}]", Rc::as_ptr(obj))
                }
            }
        }
    }
}

impl PartialEq for JsValue {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl From<bool> for JsValue {
    fn from(value: bool) -> Self {
        JsValue::Boolean(value)
    }
}

impl From<f64> for JsValue {
    fn from(value: f64) -> Self {
        JsValue::Number(value)
    }
}

impl From<i32> for JsValue {
    fn from(value: i32) -> Self {
        JsValue::Number(f64::from(value))
    }
}

impl From<u32> for JsValue {
    fn from(value: u32) -> Self {
        JsValue::Number(f64::from(value))
    }
}

impl From<&str> for JsValue {
    fn from(value: &str) -> Self {
        JsValue::String(JsString::from(value))
    }
}

impl From<String> for JsValue {
    fn from(value: String) -> Self {
        JsValue::String(JsString::from(value))
    }
}

impl From<JsString> for JsValue {
    fn from(value: JsString) -> Self {
        JsValue::String(value)
    }
}

impl From<JsObjectRef> for JsValue {
    fn from(value: JsObjectRef) -> Self {
        JsValue::Object(value)
    }
}

// ---------------------------------------------------------------------------
// Numeric conversions
// ---------------------------------------------------------------------------

/// ToInteger: truncate toward zero, NaN becomes 0, infinities survive.
pub fn to_integer(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.trunc() }
}

/// ToUint32: the ECMAScript modulo-2^32 mapping.
pub fn to_uint32(value: f64) -> u32 {
    const TWO_POW_32: f64 = 4_294_967_296.0;
    if !value.is_finite() || value == 0.0 {
        return 0;
    }
    let truncated = value.trunc();
    let rem = truncated % TWO_POW_32;
    let rem = if rem < 0.0 { rem + TWO_POW_32 } else { rem };
    rem as u32
}

/// ToInt32: ToUint32 reinterpreted as a signed 32-bit value.
pub fn to_int32(value: f64) -> i32 {
    to_uint32(value) as i32
}

/// ToString for numbers: `NaN`, signed infinities, and `-0` prints as `0`.
pub fn number_to_string(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_owned()
    } else if value == f64::INFINITY {
        "Infinity".to_owned()
    } else if value == f64::NEG_INFINITY {
        "-Infinity".to_owned()
    } else if value == 0.0 {
        "0".to_owned()
    } else if value.fract() == 0.0 && value.abs() < 1e21 {
        format!("{value:.0}")
    } else {
        let formatted = format!("{value}");
        // Rust prints "1e21"; the expected spelling is "1e+21".
        match formatted.find('e') {
            Some(pos) if formatted.as_bytes().get(pos + 1) != Some(&b'-') => {
                let (mantissa, exponent) = formatted.split_at(pos + 1);
                format!("{mantissa}+{exponent}")
            }
            _ => formatted,
        }
    }
}

/// The string-to-number grammar: optional whitespace, empty string is zero,
/// signed `Infinity`, unsigned hex literals, otherwise a decimal literal.
/// Anything else is NaN.
pub(crate) fn parse_number_literal(s: &str) -> f64 {
    let trimmed = s.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}');
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        if hex.is_empty() {
            return f64::NAN;
        }
        let mut acc = 0.0f64;
        for c in hex.chars() {
            match c.to_digit(16) {
                Some(d) => acc = acc * 16.0 + f64::from(d),
                None => return f64::NAN,
            }
        }
        return acc;
    }
    // Reject the alphabetic spellings the stdlib parser would accept
    // ("inf", "NaN"); the decimal grammar only uses digits, '.', 'e' signs.
    let decimal_shaped = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !decimal_shaped {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Escapes a string for inclusion in a double-quoted source literal.
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{8}' => out.push_str("\\b"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\u{b}' => out.push_str("\\v"),
            '\u{c}' => out.push_str("\\f"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04X}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// JsString
// ---------------------------------------------------------------------------

/// Immutable, cheaply clonable string. Ordering is the code-point order used
/// by the default sort comparator.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JsString(Rc<str>);

impl JsString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Byte length of the UTF-8 representation.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Length in scalar values, which is what the `length` of a wrapped
    /// string reports and what indexed character access counts by.
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn char_at(&self, index: usize) -> Option<char> {
        self.0.chars().nth(index)
    }
}

impl AsRef<str> for JsString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for JsString {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for JsString {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for JsString {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl From<&str> for JsString {
    fn from(value: &str) -> Self {
        JsString(Rc::from(value))
    }
}

impl From<String> for JsString {
    fn from(value: String) -> Self {
        JsString(Rc::from(value))
    }
}

impl fmt::Debug for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PropertyKey
// ---------------------------------------------------------------------------

/// A property name in canonical form: decimal strings that round-trip
/// through `u32` become `Index` keys, so `"5"` and `5` address one slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    String(JsString),
    Index(u32),
}

impl PropertyKey {
    /// The key as an array index, when it is one. `u32::MAX` is a valid
    /// canonical `Index` key but is not an array index, since `length` tops
    /// out at 2^32 - 1.
    pub fn array_index(&self) -> Option<u32> {
        match self {
            PropertyKey::Index(i) if *i != u32::MAX => Some(*i),
            _ => None,
        }
    }

    pub fn eq_str(&self, name: &str) -> bool {
        match self {
            PropertyKey::String(s) => s.as_str() == name,
            PropertyKey::Index(_) => false,
        }
    }
}

/// Canonical-form check shared by the `From` conversions: an index key must
/// be all digits, without a leading zero, and fit in `u32`.
fn canonical_index(s: &str) -> Option<u32> {
    let bytes = s.as_bytes();
    let first = bytes.first()?;
    if !first.is_ascii_digit() || (*first == b'0' && bytes.len() > 1) {
        return None;
    }
    s.parse::<u32>().ok()
}

impl From<&str> for PropertyKey {
    fn from(value: &str) -> Self {
        match canonical_index(value) {
            Some(i) => PropertyKey::Index(i),
            None => PropertyKey::String(JsString::from(value)),
        }
    }
}

impl From<String> for PropertyKey {
    fn from(value: String) -> Self {
        match canonical_index(&value) {
            Some(i) => PropertyKey::Index(i),
            None => PropertyKey::String(JsString::from(value)),
        }
    }
}

impl From<JsString> for PropertyKey {
    fn from(value: JsString) -> Self {
        match canonical_index(value.as_str()) {
            Some(i) => PropertyKey::Index(i),
            None => PropertyKey::String(value),
        }
    }
}

impl From<u32> for PropertyKey {
    fn from(value: u32) -> Self {
        PropertyKey::Index(value)
    }
}

// ---------------------------------------------------------------------------
// Property
// ---------------------------------------------------------------------------

/// A property slot: either a data property or an accessor pair. Accessor
/// slots keep `value` at `Undefined` and are never written through directly.
#[derive(Debug, Clone)]
pub struct Property {
    pub value: JsValue,
    pub writable: bool,
    pub enumerable: bool,
    pub configurable: bool,
    pub getter: Option<JsValue>,
    pub setter: Option<JsValue>,
}

impl Property {
    pub fn data(value: JsValue) -> Self {
        Property {
            value,
            writable: true,
            enumerable: true,
            configurable: true,
            getter: None,
            setter: None,
        }
    }

    pub fn accessor(getter: Option<JsValue>, setter: Option<JsValue>) -> Self {
        Property {
            value: JsValue::Undefined,
            writable: true,
            enumerable: true,
            configurable: true,
            getter,
            setter,
        }
    }

    pub fn with_attributes(mut self, writable: bool, enumerable: bool, configurable: bool) -> Self {
        self.writable = writable;
        self.enumerable = enumerable;
        self.configurable = configurable;
        self
    }

    pub fn is_accessor(&self) -> bool {
        self.getter.is_some() || self.setter.is_some()
    }
}

// ---------------------------------------------------------------------------
// JsObject
// ---------------------------------------------------------------------------

/// What, beyond a property bag, an object is.
#[derive(Debug)]
pub enum ExoticObject {
    Ordinary,
    /// Array storage; integer keys route through it before the bag.
    Array(ArrayStorage),
    Function(JsFunction),
    /// Wrapped primitive string, exposing character-index properties.
    String(JsString),
}

#[derive(Debug, Clone)]
pub enum JsFunction {
    Native(NativeFunction),
    Array(ArrayFunction),
}

#[derive(Clone)]
pub struct NativeFunction {
    pub name: JsString,
    pub func: NativeFn,
    pub arity: u32,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// A property bag with an optional prototype and scope parent.
///
/// Writes report whether they stored: sealed, frozen and non-writable slots
/// swallow the write and return `false`, which callers use to decide whether
/// follow-up bookkeeping (like an array length bump) applies.
#[derive(Debug)]
pub struct JsObject {
    pub prototype: Option<JsObjectRef>,
    /// Enclosing scope for top-level-scope resolution; `None` at the root.
    pub parent_scope: Option<JsObjectRef>,
    pub extensible: bool,
    pub sealed: bool,
    pub frozen: bool,
    pub properties: IndexMap<PropertyKey, Property>,
    pub exotic: ExoticObject,
}

impl JsObject {
    pub fn new() -> Self {
        JsObject {
            prototype: None,
            parent_scope: None,
            extensible: true,
            sealed: false,
            frozen: false,
            properties: index_map_new(),
            exotic: ExoticObject::Ordinary,
        }
    }

    pub fn with_prototype(prototype: Option<JsObjectRef>) -> Self {
        JsObject {
            prototype,
            ..JsObject::new()
        }
    }

    pub fn with_exotic(exotic: ExoticObject, prototype: Option<JsObjectRef>) -> Self {
        JsObject {
            prototype,
            exotic,
            ..JsObject::new()
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.exotic, ExoticObject::Function(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.exotic, ExoticObject::Array(_))
    }

    pub fn as_array(&self) -> Option<&ArrayStorage> {
        match &self.exotic {
            ExoticObject::Array(storage) => Some(storage),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut ArrayStorage> {
        match &mut self.exotic {
            ExoticObject::Array(storage) => Some(storage),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&JsFunction> {
        match &self.exotic {
            ExoticObject::Function(func) => Some(func),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&JsString> {
        match &self.exotic {
            ExoticObject::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn get_own_property(&self, key: &PropertyKey) -> Option<&Property> {
        self.properties.get(key)
    }

    pub fn has_own_property(&self, key: &PropertyKey) -> bool {
        self.properties.contains_key(key)
    }

    /// `true` when the own property named by `key` is an accessor with the
    /// requested half (getter when `setter` is false).
    pub fn is_getter_or_setter(&self, key: &PropertyKey, setter: bool) -> bool {
        match self.properties.get(key) {
            Some(prop) => {
                if setter {
                    prop.setter.is_some()
                } else {
                    prop.getter.is_some()
                }
            }
            None => false,
        }
    }

    /// Plain bag write. Returns whether the value was stored.
    pub fn set_property(&mut self, key: PropertyKey, value: JsValue) -> bool {
        if self.frozen {
            return false;
        }
        if let Some(prop) = self.properties.get_mut(&key) {
            if !prop.writable {
                return false;
            }
            prop.value = value;
            return true;
        }
        if !self.extensible || self.sealed {
            return false;
        }
        self.properties.insert(key, Property::data(value));
        true
    }

    /// Unconditional define, for wiring built-ins.
    pub fn define_property(&mut self, key: PropertyKey, property: Property) {
        self.properties.insert(key, property);
    }

    /// Bag delete. Returns `true` when the key is gone afterwards.
    pub fn delete_property(&mut self, key: &PropertyKey) -> bool {
        if self.sealed || self.frozen {
            return false;
        }
        match self.properties.get(key) {
            Some(prop) if !prop.configurable => false,
            Some(_) => {
                self.properties.shift_remove(key);
                true
            }
            None => true,
        }
    }

    /// Enumerable own keys, in insertion order.
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        self.properties
            .iter()
            .filter(|(_, prop)| prop.enumerable)
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn freeze(&mut self) {
        self.sealed = true;
        self.frozen = true;
    }
}

impl Default for JsObject {
    fn default() -> Self {
        JsObject::new()
    }
}

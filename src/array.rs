//! The array exotic object: hybrid dense/sparse element storage, the
//! `length` invariant, and the full prototype/constructor method suite.
//!
//! An array starts dense: elements live in a vector of slots where `None`
//! marks a hole. Writes that would overgrow the vector, accessor installs,
//! sparse truncations and index-shaped string puts degrade it to sparse
//! mode, where the property bag holds the elements; the vector is kept as a
//! read remnant for indexes it still covers. The switch is one-way.
//!
//! Every operation works on an arbitrary receiver through the generic
//! element adapters and fast-paths the dense case, so `join`, `sort` and
//! friends behave on anything with a `length`.

use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::context::Context;
use crate::error::JsError;
use crate::prelude::*;
use crate::value::{
    parse_number_literal, to_int32, to_integer, to_uint32, CheapClone, ExoticObject, JsFunction,
    JsObject, JsObjectRef, JsString, JsValue, Property, PropertyKey,
};

/// Ceiling on the dense vector allocated up front by `Array(n)`; larger
/// lengths start sparse. Process-wide and tunable; construction reads it
/// once, so changing it races benignly with concurrent construction.
static MAXIMUM_INITIAL_CAPACITY: AtomicUsize = AtomicUsize::new(10_000);

/// Smallest dense vector a fresh array allocates.
const DEFAULT_INITIAL_CAPACITY: usize = 10;

/// Growth factor for the dense vector.
const GROW_FACTOR: f64 = 1.5;

/// Largest capacity `ensure_capacity` will reach before giving up and
/// degrading to sparse mode: `i32::MAX / GROW_FACTOR`.
const MAX_PRE_GROW_SIZE: usize = 1_431_655_764;

/// Truncation distance beyond which `length` shrinking walks own keys
/// instead of deleting index by index. A tuning threshold, not a contract.
const LONG_TRUNCATION_GAP: u64 = 0x1000;

pub fn maximum_initial_capacity() -> usize {
    MAXIMUM_INITIAL_CAPACITY.load(Ordering::Relaxed)
}

pub fn set_maximum_initial_capacity(capacity: usize) {
    MAXIMUM_INITIAL_CAPACITY.store(capacity, Ordering::Relaxed);
}

/// A dense element slot; `None` is a hole, distinct from `undefined`.
pub(crate) type Slot = Option<JsValue>;

#[derive(Debug)]
enum ElementStorage {
    Dense(Vec<Slot>),
    /// Sparse mode. Keeps any dense remnant for in-capacity reads and
    /// writes; indexes beyond it live in the property bag.
    Hybrid(Option<Vec<Slot>>),
}

/// Element storage and length of one array.
#[derive(Debug)]
pub struct ArrayStorage {
    length: u64,
    elements: ElementStorage,
}

impl ArrayStorage {
    /// Storage for `Array(n)`: dense up to the initial-capacity ceiling,
    /// sparse beyond it.
    pub(crate) fn with_length(length: u64) -> Self {
        if length <= maximum_initial_capacity() as u64 {
            let capacity = (length as usize).max(DEFAULT_INITIAL_CAPACITY);
            ArrayStorage {
                length,
                elements: ElementStorage::Dense(vec![None; capacity]),
            }
        } else {
            ArrayStorage {
                length,
                elements: ElementStorage::Hybrid(None),
            }
        }
    }

    /// Storage wrapping existing values as a dense array.
    pub(crate) fn from_values(values: Vec<JsValue>) -> Self {
        ArrayStorage::from_slots(values.into_iter().map(Some).collect())
    }

    pub(crate) fn from_slots(slots: Vec<Slot>) -> Self {
        ArrayStorage {
            length: slots.len() as u64,
            elements: ElementStorage::Dense(slots),
        }
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn dense_only(&self) -> bool {
        matches!(self.elements, ElementStorage::Dense(_))
    }

    fn capacity(&self) -> usize {
        self.dense_vec().map_or(0, Vec::len)
    }

    fn dense_vec(&self) -> Option<&Vec<Slot>> {
        match &self.elements {
            ElementStorage::Dense(dense) | ElementStorage::Hybrid(Some(dense)) => Some(dense),
            ElementStorage::Hybrid(None) => None,
        }
    }

    fn dense_vec_mut(&mut self) -> Option<&mut Vec<Slot>> {
        match &mut self.elements {
            ElementStorage::Dense(dense) | ElementStorage::Hybrid(Some(dense)) => Some(dense),
            ElementStorage::Hybrid(None) => None,
        }
    }

    pub(crate) fn dense_slot(&self, index: usize) -> Option<&Slot> {
        self.dense_vec().and_then(|dense| dense.get(index))
    }

    fn dense_slot_mut(&mut self, index: usize) -> Option<&mut Slot> {
        self.dense_vec_mut().and_then(|dense| dense.get_mut(index))
    }

    /// One-way switch to sparse mode; the vector stays as a read remnant.
    fn degrade(&mut self) {
        if let ElementStorage::Dense(dense) = &mut self.elements {
            let remnant = std::mem::take(dense);
            self.elements = ElementStorage::Hybrid(Some(remnant));
        }
    }

    /// Grows the dense vector to cover `capacity` slots, by at least the
    /// growth factor. Degrades and reports `false` when the need exceeds
    /// the pre-grow ceiling; growth failure is never an observable error.
    fn ensure_capacity(&mut self, capacity: usize) -> bool {
        let current = match &self.elements {
            ElementStorage::Dense(dense) => dense.len(),
            ElementStorage::Hybrid(_) => return false,
        };
        if capacity > current {
            if capacity > MAX_PRE_GROW_SIZE {
                self.degrade();
                return false;
            }
            let grown = capacity.max((current as f64 * GROW_FACTOR) as usize);
            if let ElementStorage::Dense(dense) = &mut self.elements {
                dense.resize(grown, None);
            }
        }
        true
    }

    /// Replaces the dense contents wholesale; used by the concat fast path
    /// on a freshly built result.
    fn adopt_dense(&mut self, slots: Vec<Slot>) {
        self.length = slots.len() as u64;
        self.elements = ElementStorage::Dense(slots);
    }
}

// ---------------------------------------------------------------------------
// Index helpers
// ---------------------------------------------------------------------------

/// The array index denoted by a string, if any: its numeric value must be a
/// uint32 below 2^32 - 1 whose canonical decimal form is the string itself.
pub(crate) fn to_array_index(id: &str) -> Option<u32> {
    let d = parse_number_literal(id);
    if d.is_nan() {
        return None;
    }
    let index = to_uint32(d);
    if f64::from(index) == d && index != u32::MAX && index.to_string() == id {
        Some(index)
    } else {
        None
    }
}

/// Key for a 64-bit element index: integer keys up to `i32::MAX`, decimal
/// string keys beyond (which still canonicalize while they fit a uint32).
fn key_for_index(index: u64) -> PropertyKey {
    if index > i32::MAX as u64 {
        PropertyKey::from(index.to_string())
    } else {
        PropertyKey::Index(index as u32)
    }
}

// ---------------------------------------------------------------------------
// Indexed access on array receivers
// ---------------------------------------------------------------------------

/// Integer-key write on an array. Dense-covered indexes write in place;
/// a contiguous-enough write past capacity grows the vector; anything else
/// degrades and lands in the bag. The length bump only happens when the
/// write stored.
pub(crate) fn put_element(
    cx: &mut Context,
    obj: &JsObjectRef,
    index: u32,
    value: JsValue,
) -> Result<(), JsError> {
    // u32::MAX is a valid key but not an array index; it never bumps length.
    let is_index = index != u32::MAX;
    let mut pending = Some(value);
    {
        let mut borrowed = obj.borrow_mut();
        let sealed = borrowed.sealed || borrowed.frozen;
        let setter_override = borrowed.is_getter_or_setter(&PropertyKey::Index(index), true);
        if let Some(storage) = borrowed.as_array_mut() {
            let routable = is_index
                && !sealed
                && storage.dense_vec().is_some()
                && (storage.dense_only() || !setter_override);
            if routable {
                let idx = index as usize;
                let capacity = storage.capacity();
                if idx < capacity {
                    if let Some(slot) = storage.dense_slot_mut(idx) {
                        *slot = pending.take();
                    }
                    if storage.length <= u64::from(index) {
                        storage.length = u64::from(index) + 1;
                    }
                } else if storage.dense_only()
                    && (idx as f64) < (capacity as f64) * GROW_FACTOR
                    && storage.ensure_capacity(idx + 1)
                {
                    if let Some(slot) = storage.dense_slot_mut(idx) {
                        *slot = pending.take();
                    }
                    storage.length = u64::from(index) + 1;
                } else {
                    storage.degrade();
                }
            }
        }
    }
    if let Some(value) = pending {
        let stored = cx.put_own_bag(obj, PropertyKey::Index(index), value)?;
        if stored && is_index {
            let mut borrowed = obj.borrow_mut();
            if let Some(storage) = borrowed.as_array_mut() {
                if storage.length <= u64::from(index) {
                    storage.length = u64::from(index) + 1;
                }
            }
        }
    }
    Ok(())
}

/// String-key write on an array. The value lands in the bag; when the name
/// is an array index at or past the current length the write also bumps
/// `length` and degrades to sparse, since the element is now bag-resident.
pub(crate) fn put_string_property(
    cx: &mut Context,
    obj: &JsObjectRef,
    name: JsString,
    value: JsValue,
) -> Result<(), JsError> {
    let index = to_array_index(name.as_str());
    let stored = cx.put_own_bag(obj, PropertyKey::String(name), value)?;
    if stored {
        if let Some(index) = index {
            let mut borrowed = obj.borrow_mut();
            if let Some(storage) = borrowed.as_array_mut() {
                if u64::from(index) >= storage.length {
                    storage.length = u64::from(index) + 1;
                    storage.degrade();
                }
            }
        }
    }
    Ok(())
}

/// Integer-key delete on an array: dense-covered indexes hole out in place
/// unless sealed or guarded by an accessor; everything else goes to the bag.
pub(crate) fn delete_element(obj: &JsObjectRef, index: u32) -> bool {
    let mut borrowed = obj.borrow_mut();
    let sealed = borrowed.sealed || borrowed.frozen;
    let setter_override = borrowed.is_getter_or_setter(&PropertyKey::Index(index), true);
    let holed = match borrowed.as_array_mut() {
        Some(storage) if !sealed && (storage.dense_only() || !setter_override) => {
            match storage.dense_slot_mut(index as usize) {
                Some(slot) => {
                    *slot = None;
                    true
                }
                None => false,
            }
        }
        _ => false,
    };
    if holed {
        true
    } else {
        borrowed.delete_property(&PropertyKey::Index(index))
    }
}

/// Enumerable own keys of an array: present dense indexes below `length`
/// in order, then the bag keys in insertion order.
pub(crate) fn own_keys(object: &JsObject) -> Vec<PropertyKey> {
    let bag_keys = object.own_keys();
    let Some(storage) = object.as_array() else {
        return bag_keys;
    };
    let Some(dense) = storage.dense_vec() else {
        return bag_keys;
    };
    let visible = storage.length.min(dense.len() as u64) as usize;
    let mut keys = Vec::with_capacity(visible + bag_keys.len());
    for (i, slot) in dense.iter().take(visible).enumerate() {
        if slot.is_some() {
            keys.push(PropertyKey::Index(i as u32));
        }
    }
    keys.extend(bag_keys);
    keys
}

/// A `length` write: coerce, demand an exact uint32, then truncate or grow.
///
/// Dense arrays truncate by holing the vector tail, and can even grow dense
/// as long as the new length stays within a growth step of the old one;
/// otherwise the array degrades first. Sparse truncation deletes every
/// index-shaped own key at or past the new length, walking the key list
/// when the gap is large and deleting index by index when it is small.
pub(crate) fn set_array_length(
    cx: &mut Context,
    obj: &JsObjectRef,
    value: &JsValue,
) -> Result<(), JsError> {
    let d = cx.to_number_value(value)?;
    let new_length = u64::from(to_uint32(d));
    if (new_length as f64) != d {
        return Err(JsError::bad_array_length());
    }

    let old_length = {
        let mut borrowed = obj.borrow_mut();
        let Some(storage) = borrowed.as_array_mut() else {
            return Ok(());
        };
        if storage.dense_only() {
            if new_length < storage.length {
                if let Some(dense) = storage.dense_vec_mut() {
                    for slot in dense.iter_mut().skip(new_length as usize) {
                        *slot = None;
                    }
                }
                storage.length = new_length;
                return Ok(());
            } else if new_length < MAX_PRE_GROW_SIZE as u64
                && (new_length as f64) < storage.length as f64 * GROW_FACTOR
                && storage.ensure_capacity(new_length as usize)
            {
                storage.length = new_length;
                return Ok(());
            }
            storage.degrade();
        }
        storage.length
    };

    if new_length < old_length {
        if old_length - new_length > LONG_TRUNCATION_GAP {
            // likely sparse: walk the own keys rather than the index range
            for key in cx.own_property_keys(obj) {
                let index = match &key {
                    PropertyKey::Index(_) => key.array_index(),
                    PropertyKey::String(name) => to_array_index(name.as_str()),
                };
                if let Some(index) = index {
                    if u64::from(index) >= new_length {
                        cx.delete_property(obj, &key);
                    }
                }
            }
        } else {
            for index in new_length..old_length {
                delete_elem(cx, obj, index);
            }
        }
    }

    let mut borrowed = obj.borrow_mut();
    if let Some(storage) = borrowed.as_array_mut() {
        storage.length = new_length;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Generic element adapters
// ---------------------------------------------------------------------------

fn get_elem(cx: &mut Context, obj: &JsObjectRef, index: u64) -> Result<JsValue, JsError> {
    cx.get_property(obj, &key_for_index(index))
}

fn get_elem_opt(cx: &mut Context, obj: &JsObjectRef, index: u64) -> Result<Option<JsValue>, JsError> {
    cx.get_property_opt(obj, &key_for_index(index))
}

fn set_elem(cx: &mut Context, obj: &JsObjectRef, index: u64, value: JsValue) -> Result<(), JsError> {
    cx.put_property(obj, key_for_index(index), value)
}

fn delete_elem(cx: &mut Context, obj: &JsObjectRef, index: u64) {
    cx.delete_property(obj, &key_for_index(index));
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Identifier of one array operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayOp {
    Constructor,
    ToString,
    ToLocaleString,
    ToSource,
    Join,
    Reverse,
    Sort,
    Push,
    Pop,
    Shift,
    Unshift,
    Splice,
    Concat,
    Slice,
    IndexOf,
    LastIndexOf,
    Every,
    Filter,
    ForEach,
    Map,
    Some,
}

impl ArrayOp {
    pub fn name(self) -> &'static str {
        match self {
            ArrayOp::Constructor => "constructor",
            ArrayOp::ToString => "toString",
            ArrayOp::ToLocaleString => "toLocaleString",
            ArrayOp::ToSource => "toSource",
            ArrayOp::Join => "join",
            ArrayOp::Reverse => "reverse",
            ArrayOp::Sort => "sort",
            ArrayOp::Push => "push",
            ArrayOp::Pop => "pop",
            ArrayOp::Shift => "shift",
            ArrayOp::Unshift => "unshift",
            ArrayOp::Splice => "splice",
            ArrayOp::Concat => "concat",
            ArrayOp::Slice => "slice",
            ArrayOp::IndexOf => "indexOf",
            ArrayOp::LastIndexOf => "lastIndexOf",
            ArrayOp::Every => "every",
            ArrayOp::Filter => "filter",
            ArrayOp::ForEach => "forEach",
            ArrayOp::Map => "map",
            ArrayOp::Some => "some",
        }
    }

    /// Declared arity of the prototype method.
    fn prototype_arity(self) -> u32 {
        match self {
            ArrayOp::ToString
            | ArrayOp::ToLocaleString
            | ArrayOp::ToSource
            | ArrayOp::Reverse
            | ArrayOp::Pop
            | ArrayOp::Shift => 0,
            ArrayOp::Constructor
            | ArrayOp::Join
            | ArrayOp::Sort
            | ArrayOp::Push
            | ArrayOp::Unshift
            | ArrayOp::Concat
            | ArrayOp::IndexOf
            | ArrayOp::LastIndexOf
            | ArrayOp::Every
            | ArrayOp::Filter
            | ArrayOp::ForEach
            | ArrayOp::Map
            | ArrayOp::Some => 1,
            ArrayOp::Splice | ArrayOp::Slice => 2,
        }
    }

    /// Whether the operation also exists as a receiver-first constructor
    /// static. The stringification trio and the constructor itself do not.
    fn has_static_form(self) -> bool {
        !matches!(
            self,
            ArrayOp::Constructor | ArrayOp::ToString | ArrayOp::ToLocaleString | ArrayOp::ToSource
        )
    }
}

/// One installed method: which operation, and whether it is the
/// constructor-static form that shifts its first argument into `this`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayFunction {
    pub op: ArrayOp,
    pub is_static: bool,
}

impl ArrayFunction {
    pub fn name(&self) -> &'static str {
        self.op.name()
    }

    pub fn arity(&self) -> u32 {
        if self.is_static { 2 } else { self.op.prototype_arity() }
    }
}

/// Method-name lookup: a perfect hash on the byte length plus one
/// distinguishing byte, confirmed by a full compare.
pub fn find_prototype_op(name: &str) -> Option<ArrayOp> {
    let bytes = name.as_bytes();
    let candidate = match bytes.len() {
        3 => match bytes.first() {
            Some(b'm') => ArrayOp::Map,
            Some(b'p') => ArrayOp::Pop,
            _ => return None,
        },
        4 => match bytes.get(2) {
            Some(b'i') => ArrayOp::Join,
            Some(b'm') => ArrayOp::Some,
            Some(b'r') => ArrayOp::Sort,
            Some(b's') => ArrayOp::Push,
            _ => return None,
        },
        5 => match bytes.get(1) {
            Some(b'h') => ArrayOp::Shift,
            Some(b'l') => ArrayOp::Slice,
            Some(b'v') => ArrayOp::Every,
            _ => return None,
        },
        6 => match bytes.first() {
            Some(b'c') => ArrayOp::Concat,
            Some(b'f') => ArrayOp::Filter,
            Some(b's') => ArrayOp::Splice,
            _ => return None,
        },
        7 => match bytes.first() {
            Some(b'f') => ArrayOp::ForEach,
            Some(b'i') => ArrayOp::IndexOf,
            Some(b'r') => ArrayOp::Reverse,
            Some(b'u') => ArrayOp::Unshift,
            _ => return None,
        },
        8 => match bytes.get(3) {
            Some(b'o') => ArrayOp::ToSource,
            Some(b't') => ArrayOp::ToString,
            _ => return None,
        },
        11 => match bytes.first() {
            Some(b'c') => ArrayOp::Constructor,
            Some(b'l') => ArrayOp::LastIndexOf,
            _ => return None,
        },
        14 => ArrayOp::ToLocaleString,
        _ => return None,
    };
    if candidate.name() == name { Some(candidate) } else { None }
}

/// Wires `Array`, its prototype methods and its receiver-first statics into
/// the context's global scope.
pub(crate) fn install(cx: &mut Context) {
    const METHOD_NAMES: [&str; 20] = [
        "toString",
        "toLocaleString",
        "toSource",
        "join",
        "reverse",
        "sort",
        "push",
        "pop",
        "shift",
        "unshift",
        "splice",
        "concat",
        "slice",
        "indexOf",
        "lastIndexOf",
        "every",
        "filter",
        "forEach",
        "map",
        "some",
    ];

    let prototype = cx.array_prototype.cheap_clone();
    let constructor = new_array_function(
        cx,
        ArrayFunction {
            op: ArrayOp::Constructor,
            is_static: false,
        },
    );

    for name in METHOD_NAMES {
        let Some(op) = find_prototype_op(name) else {
            continue;
        };
        let method = new_array_function(cx, ArrayFunction { op, is_static: false });
        prototype.borrow_mut().define_property(
            PropertyKey::from(name),
            Property::data(JsValue::Object(method)).with_attributes(true, false, true),
        );
        if op.has_static_form() {
            let static_method = new_array_function(cx, ArrayFunction { op, is_static: true });
            constructor.borrow_mut().define_property(
                PropertyKey::from(name),
                Property::data(JsValue::Object(static_method)).with_attributes(true, false, true),
            );
        }
    }

    prototype.borrow_mut().define_property(
        PropertyKey::from("constructor"),
        Property::data(JsValue::Object(constructor.cheap_clone())).with_attributes(
            true, false, true,
        ),
    );
    constructor.borrow_mut().define_property(
        PropertyKey::from("prototype"),
        Property::data(JsValue::Object(prototype.cheap_clone())).with_attributes(
            false, false, false,
        ),
    );
    cx.global.borrow_mut().define_property(
        PropertyKey::from("Array"),
        Property::data(JsValue::Object(constructor)).with_attributes(true, false, true),
    );
}

fn new_array_function(cx: &mut Context, function: ArrayFunction) -> JsObjectRef {
    let mut object = JsObject::with_exotic(
        ExoticObject::Function(JsFunction::Array(function)),
        Some(cx.object_prototype.cheap_clone()),
    );
    object.parent_scope = Some(cx.global.cheap_clone());
    Rc::new(std::cell::RefCell::new(object))
}

/// Entry point for calling an installed array function.
pub(crate) fn exec(
    cx: &mut Context,
    function: ArrayFunction,
    this: &JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    if function.is_static {
        // receiver-first rewrite: the first argument becomes `this`
        let receiver_value = args.first().cloned().unwrap_or(JsValue::Undefined);
        let receiver = cx.to_object(&receiver_value)?;
        let rest = args.get(1..).unwrap_or(&[]);
        return exec_prototype(cx, function.op, &receiver, rest);
    }
    if function.op == ArrayOp::Constructor {
        return js_constructor(cx, args).map(JsValue::Object);
    }
    let receiver = cx.to_object(this)?;
    exec_prototype(cx, function.op, &receiver, args)
}

fn exec_prototype(
    cx: &mut Context,
    op: ArrayOp,
    this_obj: &JsObjectRef,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    match op {
        ArrayOp::Constructor => js_constructor(cx, args).map(JsValue::Object),
        ArrayOp::ToString => {
            let as_source = cx.to_string_as_source();
            to_string_helper(cx, this_obj, as_source, false)
        }
        ArrayOp::ToLocaleString => to_string_helper(cx, this_obj, false, true),
        ArrayOp::ToSource => to_string_helper(cx, this_obj, true, false),
        ArrayOp::Join => js_join(cx, this_obj, args),
        ArrayOp::Reverse => js_reverse(cx, this_obj),
        ArrayOp::Sort => js_sort(cx, this_obj, args),
        ArrayOp::Push => js_push(cx, this_obj, args),
        ArrayOp::Pop => js_pop(cx, this_obj),
        ArrayOp::Shift => js_shift(cx, this_obj),
        ArrayOp::Unshift => js_unshift(cx, this_obj, args),
        ArrayOp::Splice => js_splice(cx, this_obj, args),
        ArrayOp::Concat => js_concat(cx, this_obj, args),
        ArrayOp::Slice => js_slice(cx, this_obj, args),
        ArrayOp::IndexOf => index_of_helper(cx, this_obj, args, false),
        ArrayOp::LastIndexOf => index_of_helper(cx, this_obj, args, true),
        ArrayOp::Every | ArrayOp::Filter | ArrayOp::ForEach | ArrayOp::Map | ArrayOp::Some => {
            iterative_method(cx, op, this_obj, args)
        }
    }
}

/// `Array(...)`: no arguments makes an empty array; one number is a length
/// (and must be its own uint32); anything else wraps the arguments as
/// elements. Version 1.2 always treats arguments as elements.
fn js_constructor(cx: &mut Context, args: &[JsValue]) -> Result<JsObjectRef, JsError> {
    if args.is_empty() {
        return Ok(cx.new_array(0));
    }
    if cx.version_1_2() || args.len() > 1 {
        return Ok(cx.new_array_from(args.to_vec()));
    }
    match args.first() {
        Some(JsValue::Number(n)) => {
            let length = u64::from(to_uint32(*n));
            if (length as f64) != *n {
                return Err(JsError::bad_array_length());
            }
            Ok(cx.new_array(length))
        }
        Some(other) => Ok(cx.new_array_from(vec![other.cheap_clone()])),
        None => Ok(cx.new_array(0)),
    }
}

// ---------------------------------------------------------------------------
// Stringification
// ---------------------------------------------------------------------------

/// Shared body of `toString`, `toLocaleString` and `toSource`, including the
/// cycle guard: the context carries an identity set of receivers currently
/// being stringified; a receiver already in the set contributes nothing, and
/// every exit path (including failures) releases its entry.
fn to_string_helper(
    cx: &mut Context,
    this_obj: &JsObjectRef,
    to_source: bool,
    to_locale: bool,
) -> Result<JsValue, JsError> {
    let length = cx.get_length(this_obj)?;
    let separator = if to_source { ", " } else { "," };
    let mut result = String::with_capacity(256);
    if to_source {
        result.push('[');
    }

    let receiver_id = Rc::as_ptr(this_obj);
    let toplevel = cx.iterating.is_none();
    if toplevel {
        cx.iterating = Some(FxHashSet::default());
    }
    let iterating = cx
        .iterating
        .as_ref()
        .is_some_and(|set| set.contains(&receiver_id));

    let mut haslast = false;
    let mut body_result = Ok(());
    if !iterating {
        if let Some(set) = cx.iterating.as_mut() {
            set.insert(receiver_id);
        }
        body_result = to_string_body(
            cx, this_obj, length, separator, to_source, to_locale, &mut result, &mut haslast,
        );
        if let Some(set) = cx.iterating.as_mut() {
            set.remove(&receiver_id);
        }
    }
    if toplevel {
        cx.iterating = None;
    }
    body_result?;

    if to_source {
        // [,,] round-trips through its own elision syntax
        if !haslast && !iterating && length > 0 {
            result.push_str(", ]");
        } else {
            result.push(']');
        }
    }
    Ok(JsValue::from(result))
}

#[allow(clippy::too_many_arguments)]
fn to_string_body(
    cx: &mut Context,
    this_obj: &JsObjectRef,
    length: u64,
    separator: &str,
    to_source: bool,
    to_locale: bool,
    result: &mut String,
    haslast: &mut bool,
) -> Result<(), JsError> {
    for i in 0..length {
        if i > 0 {
            result.push_str(separator);
        }
        let elem = get_elem(cx, this_obj, i)?;
        if matches!(elem, JsValue::Undefined | JsValue::Null) {
            *haslast = false;
            continue;
        }
        *haslast = true;
        if to_source {
            let rendered = cx.uneval(&elem)?;
            result.push_str(&rendered);
        } else if let JsValue::String(s) = &elem {
            result.push_str(s.as_str());
        } else {
            let shown = if to_locale {
                locale_string(cx, &elem)?
            } else {
                cx.to_string_value(&elem)?
            };
            result.push_str(shown.as_str());
        }
    }
    Ok(())
}

/// An element's `toLocaleString()`, falling back to its plain string form
/// when it has no such method.
fn locale_string(cx: &mut Context, elem: &JsValue) -> Result<JsString, JsError> {
    if let Some(obj) = elem.as_object() {
        let obj = obj.cheap_clone();
        let method = cx.get_property(&obj, &PropertyKey::from("toLocaleString"))?;
        if method.is_callable() {
            let localized = cx.call_function(&method, elem, &[])?;
            return cx.to_string_value(&localized);
        }
    }
    cx.to_string_value(elem)
}

fn js_join(cx: &mut Context, this_obj: &JsObjectRef, args: &[JsValue]) -> Result<JsValue, JsError> {
    let long_length = cx.get_length(this_obj)?;
    if long_length > i32::MAX as u64 {
        return Err(JsError::array_length_too_big(long_length));
    }
    let length = long_length as usize;
    let separator = match args.first() {
        None | Some(JsValue::Undefined) => JsString::from(","),
        Some(sep) => cx.to_string_value(sep)?,
    };

    let dense_only = this_obj.borrow().as_array().is_some_and(ArrayStorage::dense_only);
    if dense_only {
        let mut sb = String::new();
        for i in 0..length {
            if i != 0 {
                sb.push_str(separator.as_str());
            }
            // read the live slot each round: element toString may reenter
            let slot: Slot = {
                let borrowed = this_obj.borrow();
                borrowed
                    .as_array()
                    .and_then(|storage| storage.dense_slot(i))
                    .cloned()
                    .flatten()
            };
            if let Some(value) = slot {
                if !matches!(value, JsValue::Undefined | JsValue::Null) {
                    let shown = cx.to_string_value(&value)?;
                    sb.push_str(shown.as_str());
                }
            }
        }
        return Ok(JsValue::from(sb));
    }

    if length == 0 {
        return Ok(JsValue::from(String::new()));
    }
    let mut buf: Vec<Option<JsString>> = Vec::with_capacity(length);
    let mut total_size = 0usize;
    for i in 0..long_length {
        let elem = get_elem(cx, this_obj, i)?;
        if matches!(elem, JsValue::Undefined | JsValue::Null) {
            buf.push(None);
        } else {
            let s = cx.to_string_value(&elem)?;
            total_size += s.len();
            buf.push(Some(s));
        }
    }
    total_size += (length - 1) * separator.len();
    let mut sb = String::with_capacity(total_size);
    for (i, entry) in buf.iter().enumerate() {
        if i != 0 {
            sb.push_str(separator.as_str());
        }
        if let Some(s) = entry {
            sb.push_str(s.as_str());
        }
    }
    Ok(JsValue::from(sb))
}

// ---------------------------------------------------------------------------
// Reordering
// ---------------------------------------------------------------------------

fn js_reverse(cx: &mut Context, this_obj: &JsObjectRef) -> Result<JsValue, JsError> {
    let reversed_dense = {
        let mut borrowed = this_obj.borrow_mut();
        match borrowed.as_array_mut() {
            Some(storage) if storage.dense_only() => {
                let len = storage.length as usize;
                if let Some(dense) = storage.dense_vec_mut() {
                    let upto = len.min(dense.len());
                    if let Some(live) = dense.get_mut(..upto) {
                        live.reverse();
                    }
                }
                true
            }
            _ => false,
        }
    };
    if reversed_dense {
        return Ok(JsValue::Object(this_obj.cheap_clone()));
    }

    let len = cx.get_length(this_obj)?;
    let half = len / 2;
    for i in 0..half {
        let j = len - i - 1;
        let temp1 = get_elem(cx, this_obj, i)?;
        let temp2 = get_elem(cx, this_obj, j)?;
        set_elem(cx, this_obj, i, temp2)?;
        set_elem(cx, this_obj, j, temp1)?;
    }
    Ok(JsValue::Object(this_obj.cheap_clone()))
}

fn js_sort(cx: &mut Context, this_obj: &JsObjectRef, args: &[JsValue]) -> Result<JsValue, JsError> {
    let length = cx.get_length(this_obj)?;
    if length <= 1 {
        return Ok(JsValue::Object(this_obj.cheap_clone()));
    }

    let compare: Option<JsValue> = match args.first() {
        None | Some(JsValue::Undefined) => None,
        Some(cmp) => Some(cmp.cheap_clone()),
    };

    let dense_only = this_obj.borrow().as_array().is_some_and(ArrayStorage::dense_only);
    if dense_only {
        // the comparator sees this working copy, not the live array
        let ilength = length as usize;
        let mut working: Vec<Slot> = {
            let borrowed = this_obj.borrow();
            match borrowed.as_array().and_then(ArrayStorage::dense_vec) {
                Some(dense) => dense.iter().take(ilength).cloned().collect(),
                None => Vec::new(),
            }
        };
        let count = working.len();
        heapsort(cx, &mut working, count, compare.as_ref())?;
        let mut borrowed = this_obj.borrow_mut();
        if let Some(storage) = borrowed.as_array_mut() {
            if let Some(dense) = storage.dense_vec_mut() {
                for (slot, sorted) in dense.iter_mut().zip(working) {
                    *slot = sorted;
                }
            }
        }
        return Ok(JsValue::Object(this_obj.cheap_clone()));
    }

    if length >= i32::MAX as u64 {
        heapsort_extended(cx, this_obj, length, compare.as_ref())?;
    } else {
        let ilength = length as usize;
        let mut working: Vec<Slot> = Vec::with_capacity(ilength);
        for i in 0..length {
            working.push(Some(get_elem(cx, this_obj, i)?));
        }
        heapsort(cx, &mut working, ilength, compare.as_ref())?;
        for (i, slot) in working.into_iter().enumerate() {
            set_elem(cx, this_obj, i as u64, slot.unwrap_or(JsValue::Undefined))?;
        }
    }
    Ok(JsValue::Object(this_obj.cheap_clone()))
}

/// The sort ordering: `true` iff `x > y`. Undefined and holes sort to the
/// end; without a comparator, elements order by their string forms.
fn is_bigger(
    cx: &mut Context,
    compare: Option<&JsValue>,
    x: Option<&JsValue>,
    y: Option<&JsValue>,
) -> Result<bool, JsError> {
    let y = match y {
        None | Some(JsValue::Undefined) => return Ok(false),
        Some(value) => value,
    };
    let x = match x {
        None | Some(JsValue::Undefined) => return Ok(true),
        Some(value) => value,
    };
    match compare {
        None => {
            let a = cx.to_string_value(x)?;
            let b = cx.to_string_value(y)?;
            Ok(a.as_str() > b.as_str())
        }
        Some(cmp) => {
            let this = JsValue::Object(cx.top_level_scope_of(cmp));
            let verdict = cx.call_function(cmp, &this, &[x.cheap_clone(), y.cheap_clone()])?;
            let d = cx.to_number_value(&verdict)?;
            // NaN from an inconsistent comparator counts as "not greater"
            Ok(d > 0.0)
        }
    }
}

fn slot_at(array: &[Slot], index: usize) -> Slot {
    array.get(index).cloned().unwrap_or(None)
}

/// In-place heapsort over a slot buffer. Deterministic and recursion-free;
/// the comparator runs between buffer reads, never under a borrow.
fn heapsort(
    cx: &mut Context,
    array: &mut [Slot],
    length: usize,
    compare: Option<&JsValue>,
) -> Result<(), JsError> {
    for i in (0..length / 2).rev() {
        let pivot = slot_at(array, i);
        heapify(cx, pivot, array, i, length, compare)?;
    }
    for i in (1..length).rev() {
        let pivot = slot_at(array, i);
        let root = slot_at(array, 0);
        if let Some(slot) = array.get_mut(i) {
            *slot = root;
        }
        heapify(cx, pivot, array, 0, i, compare)?;
    }
    Ok(())
}

/// Sifts `pivot` down from position `i`; the original slot value at `i` is
/// never re-read, which halves the buffer traffic.
fn heapify(
    cx: &mut Context,
    pivot: Slot,
    array: &mut [Slot],
    mut i: usize,
    end: usize,
    compare: Option<&JsValue>,
) -> Result<(), JsError> {
    loop {
        let mut child = i * 2 + 1;
        if child >= end {
            break;
        }
        let mut child_val = slot_at(array, child);
        if child + 1 < end {
            let next_val = slot_at(array, child + 1);
            if is_bigger(cx, compare, next_val.as_ref(), child_val.as_ref())? {
                child += 1;
                child_val = next_val;
            }
        }
        if !is_bigger(cx, compare, child_val.as_ref(), pivot.as_ref())? {
            break;
        }
        if let Some(slot) = array.get_mut(i) {
            *slot = child_val;
        }
        i = child;
    }
    if let Some(slot) = array.get_mut(i) {
        *slot = pivot;
    }
    Ok(())
}

/// Heapsort through the receiver's element adapters, for lengths too large
/// to materialize. Writes land on the live receiver as they happen.
fn heapsort_extended(
    cx: &mut Context,
    target: &JsObjectRef,
    length: u64,
    compare: Option<&JsValue>,
) -> Result<(), JsError> {
    for i in (0..length / 2).rev() {
        let pivot = get_elem(cx, target, i)?;
        heapify_extended(cx, pivot, target, i, length, compare)?;
    }
    for i in (1..length).rev() {
        let pivot = get_elem(cx, target, i)?;
        let root = get_elem(cx, target, 0)?;
        set_elem(cx, target, i, root)?;
        heapify_extended(cx, pivot, target, 0, i, compare)?;
    }
    Ok(())
}

fn heapify_extended(
    cx: &mut Context,
    pivot: JsValue,
    target: &JsObjectRef,
    mut i: u64,
    end: u64,
    compare: Option<&JsValue>,
) -> Result<(), JsError> {
    loop {
        let child = i * 2 + 1;
        if child >= end {
            break;
        }
        let mut chosen = child;
        let mut child_val = get_elem(cx, target, child)?;
        if child + 1 < end {
            let next_val = get_elem(cx, target, child + 1)?;
            if is_bigger(cx, compare, Some(&next_val), Some(&child_val))? {
                chosen = child + 1;
                child_val = next_val;
            }
        }
        if !is_bigger(cx, compare, Some(&child_val), Some(&pivot))? {
            break;
        }
        set_elem(cx, target, i, child_val)?;
        i = chosen;
    }
    set_elem(cx, target, i, pivot)
}

// ---------------------------------------------------------------------------
// Mutators
// ---------------------------------------------------------------------------

fn js_push(cx: &mut Context, this_obj: &JsObjectRef, args: &[JsValue]) -> Result<JsValue, JsError> {
    let dense_length: Option<u64> = {
        let mut borrowed = this_obj.borrow_mut();
        match borrowed.as_array_mut() {
            Some(storage) if storage.dense_only() => {
                if storage.ensure_capacity(storage.length as usize + args.len()) {
                    for arg in args {
                        let index = storage.length as usize;
                        if let Some(slot) = storage.dense_slot_mut(index) {
                            *slot = Some(arg.cheap_clone());
                        }
                        storage.length += 1;
                    }
                    Some(storage.length)
                } else {
                    None
                }
            }
            _ => None,
        }
    };

    let length_value = match dense_length {
        Some(len) => JsValue::Number(len as f64),
        None => {
            let length = cx.get_length(this_obj)?;
            for (i, arg) in args.iter().enumerate() {
                set_elem(cx, this_obj, length + i as u64, arg.cheap_clone())?;
            }
            cx.set_length_property(this_obj, length + args.len() as u64)?
        }
    };

    // version 1.2 follows Perl: the last thing pushed comes back
    if cx.version_1_2() {
        return Ok(args.last().map(CheapClone::cheap_clone).unwrap_or(JsValue::Undefined));
    }
    Ok(length_value)
}

fn js_pop(cx: &mut Context, this_obj: &JsObjectRef) -> Result<JsValue, JsError> {
    let dense_result: Option<JsValue> = {
        let mut borrowed = this_obj.borrow_mut();
        match borrowed.as_array_mut() {
            Some(storage) if storage.dense_only() && storage.length > 0 => {
                storage.length -= 1;
                let index = storage.length as usize;
                let taken = storage.dense_slot_mut(index).and_then(Option::take);
                Some(taken.unwrap_or(JsValue::Undefined))
            }
            _ => None,
        }
    };
    if let Some(result) = dense_result {
        return Ok(result);
    }

    let length = cx.get_length(this_obj)?;
    if length > 0 {
        let last = length - 1;
        let result = get_elem(cx, this_obj, last)?;
        // the length write below deletes the vacated slot
        cx.set_length_property(this_obj, last)?;
        Ok(result)
    } else {
        // even an empty receiver gets a length property out of this
        cx.set_length_property(this_obj, 0)?;
        Ok(JsValue::Undefined)
    }
}

fn js_shift(cx: &mut Context, this_obj: &JsObjectRef) -> Result<JsValue, JsError> {
    let dense_result: Option<JsValue> = {
        let mut borrowed = this_obj.borrow_mut();
        match borrowed.as_array_mut() {
            Some(storage) if storage.dense_only() && storage.length > 0 => {
                storage.length -= 1;
                let taken = match storage.dense_vec_mut() {
                    Some(dense) if !dense.is_empty() => {
                        let head = dense.remove(0);
                        dense.push(None);
                        head
                    }
                    _ => None,
                };
                Some(taken.unwrap_or(JsValue::Undefined))
            }
            _ => None,
        }
    };
    if let Some(result) = dense_result {
        return Ok(result);
    }

    let length = cx.get_length(this_obj)?;
    if length > 0 {
        let length = length - 1;
        let result = get_elem(cx, this_obj, 0)?;
        if length > 0 {
            for i in 1..=length {
                let temp = get_elem(cx, this_obj, i)?;
                set_elem(cx, this_obj, i - 1, temp)?;
            }
        }
        cx.set_length_property(this_obj, length)?;
        Ok(result)
    } else {
        cx.set_length_property(this_obj, 0)?;
        Ok(JsValue::Undefined)
    }
}

fn js_unshift(cx: &mut Context, this_obj: &JsObjectRef, args: &[JsValue]) -> Result<JsValue, JsError> {
    let dense_length: Option<u64> = {
        let mut borrowed = this_obj.borrow_mut();
        match borrowed.as_array_mut() {
            Some(storage) if storage.dense_only() => {
                if storage.ensure_capacity(storage.length as usize + args.len()) {
                    let old_len = storage.length as usize;
                    if let Some(dense) = storage.dense_vec_mut() {
                        if let Some(region) = dense.get_mut(..old_len + args.len()) {
                            region.rotate_right(args.len());
                        }
                        for (slot, arg) in dense.iter_mut().zip(args) {
                            *slot = Some(arg.cheap_clone());
                        }
                    }
                    storage.length += args.len() as u64;
                    Some(storage.length)
                } else {
                    None
                }
            }
            _ => None,
        }
    };
    if let Some(len) = dense_length {
        return Ok(JsValue::Number(len as f64));
    }

    let length = cx.get_length(this_obj)?;
    if args.is_empty() {
        return Ok(JsValue::Number(length as f64));
    }
    let argc = args.len() as u64;
    if length > 0 {
        let mut last = length;
        while last > 0 {
            last -= 1;
            let temp = get_elem(cx, this_obj, last)?;
            set_elem(cx, this_obj, last + argc, temp)?;
        }
    }
    for (i, arg) in args.iter().enumerate() {
        set_elem(cx, this_obj, i as u64, arg.cheap_clone())?;
    }
    cx.set_length_property(this_obj, length + argc)
}

fn js_splice(cx: &mut Context, this_obj: &JsObjectRef, args: &[JsValue]) -> Result<JsValue, JsError> {
    if args.is_empty() {
        return Ok(JsValue::Object(cx.construct_array(&[])?));
    }
    let length = cx.get_length(this_obj)?;

    let start_arg = cx.to_number_value(args.first().unwrap_or(&JsValue::Undefined))?;
    let begin = to_slice_index(to_integer(start_arg), length);
    let mut argc = args.len() - 1;

    let count = if args.len() == 1 {
        length - begin
    } else {
        let dcount = to_integer(cx.to_number_value(args.get(1).unwrap_or(&JsValue::Undefined))?);
        argc -= 1;
        if dcount < 0.0 {
            0
        } else if dcount > (length - begin) as f64 {
            length - begin
        } else {
            dcount as u64
        }
    };
    let end = begin + count;

    // Captured after the argument coercions: a valueOf there may have run
    // user code that degraded the receiver.
    let dense_mode = this_obj.borrow().as_array().is_some_and(ArrayStorage::dense_only);

    let result = if count != 0 {
        if count == 1 && cx.version_1_2() {
            // Perl-style list context: a single removed element comes back
            // bare, not wrapped in an array
            get_elem(cx, this_obj, begin)?
        } else if dense_mode {
            let removed: Vec<Slot> = {
                let borrowed = this_obj.borrow();
                match borrowed.as_array().and_then(ArrayStorage::dense_vec) {
                    Some(dense) => dense
                        .iter()
                        .skip(begin as usize)
                        .take(count as usize)
                        .cloned()
                        .collect(),
                    None => Vec::new(),
                }
            };
            JsValue::Object(cx.array_from_storage(ArrayStorage::from_slots(removed)))
        } else {
            let removed = cx.construct_array(&[])?;
            for last in begin..end {
                let temp = get_elem(cx, this_obj, last)?;
                set_elem(cx, &removed, last - begin, temp)?;
            }
            JsValue::Object(removed)
        }
    } else if cx.version_1_2() {
        JsValue::Undefined
    } else {
        JsValue::Object(cx.construct_array(&[])?)
    };

    let delta = argc as i64 - count as i64;

    let dense_shift_done = if dense_mode && (length as i64 + delta) < i64::from(i32::MAX) {
        let mut borrowed = this_obj.borrow_mut();
        let mut done = false;
        if let Some(storage) = borrowed.as_array_mut() {
            if storage.ensure_capacity((length as i64 + delta) as usize) {
                let insert_at = begin as usize + argc;
                let move_len = (length - end) as usize;
                if let Some(dense) = storage.dense_vec_mut() {
                    let tail: Vec<Slot> = dense
                        .iter()
                        .skip(end as usize)
                        .take(move_len)
                        .cloned()
                        .collect();
                    for (slot, value) in dense.iter_mut().skip(insert_at).zip(tail) {
                        *slot = value;
                    }
                    let insert_args = args.get(2..).unwrap_or(&[]);
                    for (slot, arg) in dense
                        .iter_mut()
                        .skip(begin as usize)
                        .zip(insert_args.iter().take(argc))
                    {
                        *slot = Some(arg.cheap_clone());
                    }
                    if delta < 0 {
                        let new_len = (length as i64 + delta) as usize;
                        for slot in dense.iter_mut().skip(new_len).take(delta.unsigned_abs() as usize)
                        {
                            *slot = None;
                        }
                    }
                }
                storage.length = (length as i64 + delta) as u64;
                done = true;
            }
        }
        done
    } else {
        false
    };

    if !dense_shift_done {
        if delta > 0 {
            let mut last = length;
            while last > end {
                last -= 1;
                let temp = get_elem(cx, this_obj, last)?;
                set_elem(cx, this_obj, (last as i64 + delta) as u64, temp)?;
            }
        } else if delta < 0 {
            for last in end..length {
                let temp = get_elem(cx, this_obj, last)?;
                set_elem(cx, this_obj, (last as i64 + delta) as u64, temp)?;
            }
        }
        let arg_offset = args.len() - argc;
        for i in 0..argc {
            if let Some(arg) = args.get(i + arg_offset) {
                set_elem(cx, this_obj, begin + i as u64, arg.cheap_clone())?;
            }
        }
        cx.set_length_property(this_obj, (length as i64 + delta) as u64)?;
    }
    Ok(result)
}

// ---------------------------------------------------------------------------
// Accessors
// ---------------------------------------------------------------------------

fn js_concat(cx: &mut Context, this_obj: &JsObjectRef, args: &[JsValue]) -> Result<JsValue, JsError> {
    let constructor = cx.array_constructor()?;
    let result = cx.construct_array(&[])?;
    let this_value = JsValue::Object(this_obj.cheap_clone());

    let both_dense = {
        let this_dense = this_obj.borrow().as_array().is_some_and(ArrayStorage::dense_only);
        let result_dense = result.borrow().as_array().is_some_and(ArrayStorage::dense_only);
        this_dense && result_dense && !Rc::ptr_eq(&result, this_obj)
    };
    if both_dense {
        // collect raw slots first, then hand them to the result wholesale;
        // holes in dense sources survive this path
        enum Part {
            Array(JsObjectRef),
            Single(JsValue),
        }
        let mut parts: Vec<Part> = Vec::with_capacity(args.len());
        let mut can_use_dense = true;
        let mut total = this_obj.borrow().as_array().map_or(0, ArrayStorage::length);
        for arg in args {
            if !can_use_dense {
                break;
            }
            if cx.instance_of(arg, &constructor)? {
                match arg.as_object() {
                    Some(obj) if obj.borrow().as_array().is_some_and(ArrayStorage::dense_only) => {
                        total += obj.borrow().as_array().map_or(0, ArrayStorage::length);
                        parts.push(Part::Array(obj.cheap_clone()));
                    }
                    _ => can_use_dense = false,
                }
            } else {
                total += 1;
                parts.push(Part::Single(arg.cheap_clone()));
            }
        }
        if can_use_dense && total <= MAX_PRE_GROW_SIZE as u64 {
            let mut slots: Vec<Slot> = Vec::with_capacity(total as usize);
            {
                let borrowed = this_obj.borrow();
                if let Some(storage) = borrowed.as_array() {
                    let visible = storage.length as usize;
                    if let Some(dense) = storage.dense_vec() {
                        slots.extend(dense.iter().take(visible).cloned());
                    }
                }
            }
            for part in parts {
                match part {
                    Part::Array(obj) => {
                        let borrowed = obj.borrow();
                        if let Some(storage) = borrowed.as_array() {
                            let visible = storage.length as usize;
                            match storage.dense_vec() {
                                Some(dense) => slots.extend(dense.iter().take(visible).cloned()),
                                None => slots.extend(std::iter::repeat_n(None, visible)),
                            }
                        }
                    }
                    Part::Single(value) => slots.push(Some(value)),
                }
            }
            if let Some(storage) = result.borrow_mut().as_array_mut() {
                storage.adopt_dense(slots);
            }
            return Ok(JsValue::Object(result));
        }
    }

    let mut cursor = 0u64;
    if cx.instance_of(&this_value, &constructor)? {
        let length = cx.get_length(this_obj)?;
        for i in 0..length {
            let temp = get_elem(cx, this_obj, i)?;
            set_elem(cx, &result, i, temp)?;
        }
        cursor = length;
    } else {
        set_elem(cx, &result, cursor, this_value.cheap_clone())?;
        cursor += 1;
    }

    for arg in args {
        if cx.instance_of(arg, &constructor)? {
            let arg_obj = cx.to_object(arg)?;
            let length = cx.get_length(&arg_obj)?;
            for j in 0..length {
                let temp = get_elem(cx, &arg_obj, j)?;
                set_elem(cx, &result, cursor, temp)?;
                cursor += 1;
            }
        } else {
            set_elem(cx, &result, cursor, arg.cheap_clone())?;
            cursor += 1;
        }
    }
    Ok(JsValue::Object(result))
}

fn js_slice(cx: &mut Context, this_obj: &JsObjectRef, args: &[JsValue]) -> Result<JsValue, JsError> {
    let result = cx.construct_array(&[])?;
    let length = cx.get_length(this_obj)?;

    let (begin, end) = if args.is_empty() {
        (0, length)
    } else {
        let begin_arg = cx.to_number_value(args.first().unwrap_or(&JsValue::Undefined))?;
        let begin = to_slice_index(to_integer(begin_arg), length);
        let end = if args.len() == 1 {
            length
        } else {
            let end_arg = cx.to_number_value(args.get(1).unwrap_or(&JsValue::Undefined))?;
            to_slice_index(to_integer(end_arg), length)
        };
        (begin, end)
    };

    for slot in begin..end {
        let temp = get_elem(cx, this_obj, slot)?;
        set_elem(cx, &result, slot - begin, temp)?;
    }
    Ok(JsValue::Object(result))
}

/// Slice-index normalization: negative offsets count from the end and clamp
/// at zero; positive ones clamp at the length.
fn to_slice_index(value: f64, length: u64) -> u64 {
    if value < 0.0 {
        let adjusted = value + length as f64;
        if adjusted < 0.0 { 0 } else { adjusted as u64 }
    } else if value > length as f64 {
        length
    } else {
        value as u64
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Shared body of `indexOf` and `lastIndexOf`. Equality is strict equality
/// (so `NaN` never matches); holes are skipped on both the dense and the
/// generic path.
fn index_of_helper(
    cx: &mut Context,
    this_obj: &JsObjectRef,
    args: &[JsValue],
    is_last: bool,
) -> Result<JsValue, JsError> {
    let compare_to = args.first().cloned().unwrap_or(JsValue::Undefined);
    let length = cx.get_length(this_obj)?;

    let start: i64 = if is_last {
        if args.len() < 2 {
            length as i64 - 1
        } else {
            let from = cx.to_number_value(args.get(1).unwrap_or(&JsValue::Undefined))?;
            let mut start = i64::from(to_int32(from));
            if start >= length as i64 {
                start = length as i64 - 1;
            } else if start < 0 {
                start += length as i64;
            }
            // may still be negative; the loop below then never runs
            start
        }
    } else if args.len() < 2 {
        0
    } else {
        let from = cx.to_number_value(args.get(1).unwrap_or(&JsValue::Undefined))?;
        let mut start = i64::from(to_int32(from));
        if start < 0 {
            start += length as i64;
            if start < 0 {
                start = 0;
            }
        }
        // may exceed the last index; the loop below then never runs
        start
    };

    let dense_only = this_obj.borrow().as_array().is_some_and(ArrayStorage::dense_only);
    if dense_only {
        let borrowed = this_obj.borrow();
        if let Some(storage) = borrowed.as_array() {
            if is_last {
                let mut i = start;
                while i >= 0 {
                    if let Some(Some(value)) = storage.dense_slot(i as usize) {
                        if value.strict_equals(&compare_to) {
                            return Ok(JsValue::Number(i as f64));
                        }
                    }
                    i -= 1;
                }
            } else {
                let mut i = start;
                while i >= 0 && (i as u64) < length {
                    if let Some(Some(value)) = storage.dense_slot(i as usize) {
                        if value.strict_equals(&compare_to) {
                            return Ok(JsValue::Number(i as f64));
                        }
                    }
                    i += 1;
                }
            }
            return Ok(JsValue::Number(-1.0));
        }
    }

    if is_last {
        let mut i = start;
        while i >= 0 {
            if let Some(value) = get_elem_opt(cx, this_obj, i as u64)? {
                if value.strict_equals(&compare_to) {
                    return Ok(JsValue::Number(i as f64));
                }
            }
            i -= 1;
        }
    } else {
        let mut i = start;
        while i >= 0 && (i as u64) < length {
            if let Some(value) = get_elem_opt(cx, this_obj, i as u64)? {
                if value.strict_equals(&compare_to) {
                    return Ok(JsValue::Number(i as f64));
                }
            }
            i += 1;
        }
    }
    Ok(JsValue::Number(-1.0))
}

// ---------------------------------------------------------------------------
// Iterative visitors
// ---------------------------------------------------------------------------

/// Shared body of `every`, `filter`, `forEach`, `map` and `some`. The length
/// is captured once; each present element is re-read through the full
/// property walk and handed to the callback as `(element, index, receiver)`.
fn iterative_method(
    cx: &mut Context,
    op: ArrayOp,
    this_obj: &JsObjectRef,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let callback = args.first().cloned().unwrap_or(JsValue::Undefined);
    if !callback.is_callable() {
        let shown = cx.to_string_value(&callback)?;
        return Err(JsError::not_a_function(shown));
    }
    let parent = cx.top_level_scope_of(&callback);
    let this_arg = match args.get(1) {
        None | Some(JsValue::Undefined) | Some(JsValue::Null) => JsValue::Object(parent),
        Some(value) => JsValue::Object(cx.to_object(value)?),
    };

    let length = cx.get_length(this_obj)?;
    let collected = cx.construct_array(&[])?;
    let receiver = JsValue::Object(this_obj.cheap_clone());

    let mut out = 0u64;
    for i in 0..length {
        let Some(elem) = get_elem_opt(cx, this_obj, i)? else {
            continue;
        };
        let call_args = [
            elem.cheap_clone(),
            JsValue::Number(i as f64),
            receiver.cheap_clone(),
        ];
        let verdict = cx.call_function(&callback, &this_arg, &call_args)?;
        match op {
            ArrayOp::Every => {
                if !verdict.to_boolean() {
                    return Ok(JsValue::Boolean(false));
                }
            }
            ArrayOp::Filter => {
                if verdict.to_boolean() {
                    set_elem(cx, &collected, out, elem)?;
                    out += 1;
                }
            }
            ArrayOp::Map => {
                set_elem(cx, &collected, i, verdict)?;
            }
            ArrayOp::Some => {
                if verdict.to_boolean() {
                    return Ok(JsValue::Boolean(true));
                }
            }
            _ => {}
        }
    }

    Ok(match op {
        ArrayOp::Every => JsValue::Boolean(true),
        ArrayOp::Filter | ArrayOp::Map => JsValue::Object(collected),
        ArrayOp::Some => JsValue::Boolean(false),
        _ => JsValue::Undefined,
    })
}

//! Execution context: the global scope, shared prototypes, language flags
//! and every operation that needs to walk prototype chains or call back into
//! script values.
//!
//! Property access lives here rather than on [`JsObject`] because a full get
//! can invoke getters and a full put can invoke setters, and both must route
//! array indexes through the dense storage first. The bag itself stays dumb.

use std::cell::RefCell;
use std::rc::Rc;

use crate::array::{self, ArrayStorage};
use crate::error::JsError;
use crate::prelude::*;
use crate::string_dict::StringDict;
use crate::value::{
    escape_string, number_to_string, to_uint32, CheapClone, ExoticObject, JsFunction, JsObject,
    JsObjectRef, JsString, JsValue, NativeFn, NativeFunction, Property, PropertyKey,
};

/// Language-version switch. `V1_2` opts into the handful of Perl-flavored
/// behaviors kept for compatibility: `push` returning the last element,
/// single-element `splice` results, `Array(x)` treating `x` as an element,
/// and arrays reporting their length under a number hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LanguageVersion {
    #[default]
    Default,
    V1_2,
}

/// Hint for object-to-primitive conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveHint {
    String,
    Number,
}

/// The embedding context. One per cooperative execution thread; all objects
/// created through it share its prototypes and its cycle-guard state.
pub struct Context {
    pub(crate) global: JsObjectRef,
    pub(crate) object_prototype: JsObjectRef,
    pub(crate) array_prototype: JsObjectRef,
    version: LanguageVersion,
    to_string_as_source: bool,
    /// Identity set of receivers currently inside `toString`/`toSource`;
    /// `Some` only while an outermost stringification is on the stack.
    pub(crate) iterating: Option<FxHashSet<*const RefCell<JsObject>>>,
    pub(crate) strings: StringDict,
}

impl Context {
    pub fn new() -> Self {
        let object_prototype = Rc::new(RefCell::new(JsObject::new()));
        let array_prototype = Rc::new(RefCell::new(JsObject::with_prototype(Some(
            object_prototype.cheap_clone(),
        ))));
        let global = Rc::new(RefCell::new(JsObject::with_prototype(Some(
            object_prototype.cheap_clone(),
        ))));
        let mut cx = Context {
            global,
            object_prototype,
            array_prototype,
            version: LanguageVersion::Default,
            to_string_as_source: false,
            iterating: None,
            strings: StringDict::with_common_strings(),
        };
        cx.install_object_prototype();
        array::install(&mut cx);
        cx
    }

    fn install_object_prototype(&mut self) {
        let prototype = self.object_prototype.cheap_clone();
        self.define_function(&prototype, "toString", 0, object_to_string);
        self.define_function(&prototype, "valueOf", 0, object_value_of);
    }

    pub fn global(&self) -> &JsObjectRef {
        &self.global
    }

    pub fn array_prototype(&self) -> &JsObjectRef {
        &self.array_prototype
    }

    pub fn object_prototype(&self) -> &JsObjectRef {
        &self.object_prototype
    }

    pub fn version(&self) -> LanguageVersion {
        self.version
    }

    pub fn set_version(&mut self, version: LanguageVersion) {
        self.version = version;
    }

    pub fn version_1_2(&self) -> bool {
        self.version == LanguageVersion::V1_2
    }

    /// When set, `toString` on arrays renders source form, like `toSource`.
    pub fn set_to_string_as_source(&mut self, enabled: bool) {
        self.to_string_as_source = enabled;
    }

    pub fn to_string_as_source(&self) -> bool {
        self.to_string_as_source
    }

    pub fn intern(&mut self, s: &str) -> JsString {
        self.strings.get_or_insert(s)
    }

    // -- object creation ---------------------------------------------------

    pub fn new_object(&mut self) -> JsObjectRef {
        Rc::new(RefCell::new(JsObject::with_prototype(Some(
            self.object_prototype.cheap_clone(),
        ))))
    }

    /// A fresh array of the given length, dense when the length is within
    /// the initial-capacity ceiling.
    pub fn new_array(&mut self, length: u64) -> JsObjectRef {
        self.array_from_storage(ArrayStorage::with_length(length))
    }

    /// A fresh dense array wrapping the given elements.
    pub fn new_array_from(&mut self, elements: Vec<JsValue>) -> JsObjectRef {
        self.array_from_storage(ArrayStorage::from_values(elements))
    }

    pub(crate) fn array_from_storage(&mut self, storage: ArrayStorage) -> JsObjectRef {
        Rc::new(RefCell::new(JsObject::with_exotic(
            ExoticObject::Array(storage),
            Some(self.array_prototype.cheap_clone()),
        )))
    }

    pub fn new_function(&mut self, name: &str, arity: u32, func: NativeFn) -> JsObjectRef {
        let name = self.intern(name);
        let mut object = JsObject::with_exotic(
            ExoticObject::Function(JsFunction::Native(NativeFunction { name, func, arity })),
            Some(self.object_prototype.cheap_clone()),
        );
        object.parent_scope = Some(self.global.cheap_clone());
        Rc::new(RefCell::new(object))
    }

    /// Creates a native function and installs it on `target` as a
    /// non-enumerable data property, the way built-ins are wired.
    pub fn define_function(
        &mut self,
        target: &JsObjectRef,
        name: &str,
        arity: u32,
        func: NativeFn,
    ) -> JsObjectRef {
        let function = self.new_function(name, arity, func);
        target.borrow_mut().define_property(
            PropertyKey::from(name),
            Property::data(JsValue::Object(function.cheap_clone())).with_attributes(
                true, false, true,
            ),
        );
        function
    }

    // -- property access ---------------------------------------------------

    /// Prototype-respecting get; absent resolves to `undefined`.
    pub fn get_property(&mut self, obj: &JsObjectRef, key: &PropertyKey) -> Result<JsValue, JsError> {
        Ok(self.get_property_opt(obj, key)?.unwrap_or(JsValue::Undefined))
    }

    /// Prototype-respecting get that reports absence, which the search
    /// methods and iterative visitors use to skip holes. Getters run with
    /// the original receiver as `this`.
    pub fn get_property_opt(
        &mut self,
        obj: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<Option<JsValue>, JsError> {
        let receiver = JsValue::Object(obj.cheap_clone());
        let mut current = obj.cheap_clone();
        loop {
            let hit = lookup_own(&current.borrow(), key);
            match hit {
                Lookup::Value(value) => return Ok(Some(value)),
                Lookup::Getter(getter) => {
                    return self.call_function(&getter, &receiver, &[]).map(Some);
                }
                Lookup::Proto => {
                    let next = current.borrow().prototype.as_ref().map(CheapClone::cheap_clone);
                    match next {
                        Some(proto) => current = proto,
                        None => return Ok(None),
                    }
                }
            }
        }
    }

    /// Prototype-respecting presence check. Never invokes getters.
    pub fn has_property(&self, obj: &JsObjectRef, key: &PropertyKey) -> bool {
        let mut current = obj.cheap_clone();
        loop {
            let hit = lookup_own(&current.borrow(), key);
            match hit {
                Lookup::Value(_) | Lookup::Getter(_) => return true,
                Lookup::Proto => {
                    let next = current.borrow().prototype.as_ref().map(CheapClone::cheap_clone);
                    match next {
                        Some(proto) => current = proto,
                        None => return false,
                    }
                }
            }
        }
    }

    /// Full put. Arrays route `length` writes and integer keys through their
    /// storage; everything else lands in the own bag, honoring an own setter.
    pub fn put_property(
        &mut self,
        obj: &JsObjectRef,
        key: PropertyKey,
        value: JsValue,
    ) -> Result<(), JsError> {
        let is_array = obj.borrow().is_array();
        if is_array {
            if key.eq_str("length") {
                return array::set_array_length(self, obj, &value);
            }
            if let PropertyKey::Index(index) = key {
                return array::put_element(self, obj, index, value);
            }
            if let PropertyKey::String(name) = key {
                return array::put_string_property(self, obj, name, value);
            }
        }
        self.put_own_bag(obj, key, value).map(|_stored| ())
    }

    /// Own-level bag write shared by ordinary puts and the array fallback
    /// path. Returns whether the write stored (setter ran, or a writable
    /// slot accepted the value); sealed, frozen and read-only slots swallow
    /// the write and report `false`.
    pub(crate) fn put_own_bag(
        &mut self,
        obj: &JsObjectRef,
        key: PropertyKey,
        value: JsValue,
    ) -> Result<bool, JsError> {
        let setter = {
            let borrowed = obj.borrow();
            match borrowed.get_own_property(&key) {
                Some(prop) if prop.is_accessor() => Some(prop.setter.clone()),
                _ => None,
            }
        };
        match setter {
            Some(Some(setter)) => {
                let receiver = JsValue::Object(obj.cheap_clone());
                self.call_function(&setter, &receiver, &[value])?;
                Ok(true)
            }
            Some(None) => Ok(false),
            None => Ok(obj.borrow_mut().set_property(key, value)),
        }
    }

    /// Full delete. `true` means the key is absent afterwards; `length` and
    /// guarded slots report `false`.
    pub fn delete_property(&mut self, obj: &JsObjectRef, key: &PropertyKey) -> bool {
        let is_array = obj.borrow().is_array();
        if is_array {
            if key.eq_str("length") {
                return false;
            }
            if let PropertyKey::Index(index) = key {
                return array::delete_element(obj, *index);
            }
        }
        obj.borrow_mut().delete_property(key)
    }

    /// Enumerable own keys: dense indexes in order first for arrays, then
    /// bag keys in insertion order.
    pub fn own_property_keys(&self, obj: &JsObjectRef) -> Vec<PropertyKey> {
        let borrowed = obj.borrow();
        if borrowed.is_array() {
            array::own_keys(&borrowed)
        } else {
            borrowed.own_keys()
        }
    }

    /// Generic length read: native arrays and wrapped strings answer from
    /// their own storage, anything else reads `obj.length` and coerces to
    /// uint32 (zero when missing or non-numeric).
    pub fn get_length(&mut self, obj: &JsObjectRef) -> Result<u64, JsError> {
        {
            let borrowed = obj.borrow();
            match &borrowed.exotic {
                ExoticObject::Array(storage) => return Ok(storage.length()),
                ExoticObject::String(s) => return Ok(s.char_len() as u64),
                _ => {}
            }
        }
        let value = self.get_property(obj, &PropertyKey::from("length"))?;
        let number = self.to_number_value(&value)?;
        Ok(u64::from(to_uint32(number)))
    }

    /// Writes `length` through the full put path and hands back the number
    /// written, which several mutators return.
    pub(crate) fn set_length_property(
        &mut self,
        obj: &JsObjectRef,
        length: u64,
    ) -> Result<JsValue, JsError> {
        let value = JsValue::Number(length as f64);
        self.put_property(obj, PropertyKey::from("length"), value.cheap_clone())?;
        Ok(value)
    }

    // -- invocation --------------------------------------------------------

    /// Calls a callable value with an explicit `this` and arguments.
    pub fn call_function(
        &mut self,
        callee: &JsValue,
        this: &JsValue,
        args: &[JsValue],
    ) -> Result<JsValue, JsError> {
        let function = match callee.as_object() {
            Some(obj) => obj.borrow().as_function().cloned(),
            None => None,
        };
        match function {
            Some(JsFunction::Native(native)) => (native.func)(self, this, args),
            Some(JsFunction::Array(op)) => array::exec(self, op, this, args),
            None => {
                let shown = self.to_string_value(callee)?;
                Err(JsError::not_a_function(shown))
            }
        }
    }

    /// Convenience for embedders: `receiver.name(args...)` through the full
    /// property walk, so a redefined or inherited method is honored.
    pub fn call_method(
        &mut self,
        receiver: &JsValue,
        name: &str,
        args: &[JsValue],
    ) -> Result<JsValue, JsError> {
        let obj = self.to_object(receiver)?;
        let method = self.get_property(&obj, &PropertyKey::from(name))?;
        self.call_function(&method, &JsValue::Object(obj), args)
    }

    /// Resolves the constructor named `Array` in the top-level scope, so a
    /// user redefinition is honored wherever a fresh array is built.
    pub(crate) fn array_constructor(&mut self) -> Result<JsValue, JsError> {
        let global = self.global.cheap_clone();
        self.get_property_opt(&global, &PropertyKey::from("Array"))?
            .ok_or_else(|| JsError::reference_error("Array"))
    }

    /// `new Array(args...)` through the resolved constructor.
    pub(crate) fn construct_array(&mut self, args: &[JsValue]) -> Result<JsObjectRef, JsError> {
        let constructor = self.array_constructor()?;
        let result = self.call_function(&constructor, &JsValue::Undefined, args)?;
        match result {
            JsValue::Object(obj) => Ok(obj),
            other => Err(JsError::type_error(format!(
                "Array constructor returned a non-object ({})",
                other.type_of()
            ))),
        }
    }

    /// `value instanceof constructor`: walks the value's prototype chain
    /// looking for the constructor's `prototype` by identity.
    pub fn instance_of(&mut self, value: &JsValue, constructor: &JsValue) -> Result<bool, JsError> {
        let Some(ctor) = constructor.as_object() else {
            return Err(JsError::type_error("invalid 'instanceof' operand"));
        };
        if !ctor.borrow().is_callable() {
            return Err(JsError::type_error("invalid 'instanceof' operand"));
        }
        let ctor = ctor.cheap_clone();
        let prototype = self.get_property(&ctor, &PropertyKey::from("prototype"))?;
        let Some(proto_obj) = prototype.as_object() else {
            return Ok(false);
        };
        let Some(start) = value.as_object() else {
            return Ok(false);
        };
        let mut current = start.borrow().prototype.as_ref().map(CheapClone::cheap_clone);
        while let Some(candidate) = current {
            if Rc::ptr_eq(&candidate, proto_obj) {
                return Ok(true);
            }
            current = candidate.borrow().prototype.as_ref().map(CheapClone::cheap_clone);
        }
        Ok(false)
    }

    // -- scopes ------------------------------------------------------------

    /// Walks `parent_scope` links to the scope root.
    pub fn top_level_scope(&self, start: &JsObjectRef) -> JsObjectRef {
        let mut current = start.cheap_clone();
        loop {
            let parent = current.borrow().parent_scope.as_ref().map(CheapClone::cheap_clone);
            match parent {
                Some(scope) => current = scope,
                None => return current,
            }
        }
    }

    /// Top-level scope of a value, defaulting to the global for primitives.
    pub fn top_level_scope_of(&self, value: &JsValue) -> JsObjectRef {
        match value.as_object() {
            Some(obj) => self.top_level_scope(obj),
            None => self.global.cheap_clone(),
        }
    }

    // -- conversions -------------------------------------------------------

    /// ToObject. Strings wrap into character-indexable exotics; numbers and
    /// booleans wrap into plain objects; `undefined` and `null` fail.
    pub fn to_object(&mut self, value: &JsValue) -> Result<JsObjectRef, JsError> {
        match value {
            JsValue::Object(obj) => Ok(obj.cheap_clone()),
            JsValue::String(s) => Ok(Rc::new(RefCell::new(JsObject::with_exotic(
                ExoticObject::String(s.cheap_clone()),
                Some(self.object_prototype.cheap_clone()),
            )))),
            JsValue::Number(_) | JsValue::Boolean(_) => Ok(self.new_object()),
            JsValue::Undefined => Err(JsError::type_error("can't convert undefined to object")),
            JsValue::Null => Err(JsError::type_error("can't convert null to object")),
        }
    }

    /// Full ToNumber: objects go through ToPrimitive with a number hint.
    pub fn to_number_value(&mut self, value: &JsValue) -> Result<f64, JsError> {
        match value {
            JsValue::Object(obj) => {
                let obj = obj.cheap_clone();
                let primitive = self.default_value(&obj, PrimitiveHint::Number)?;
                Ok(primitive.to_number())
            }
            other => Ok(other.to_number()),
        }
    }

    /// Full ToString: objects go through ToPrimitive with a string hint, so
    /// arrays stringify via their (cycle-guarded) `toString`.
    pub fn to_string_value(&mut self, value: &JsValue) -> Result<JsString, JsError> {
        match value {
            JsValue::Object(obj) => {
                let obj = obj.cheap_clone();
                let primitive = self.default_value(&obj, PrimitiveHint::String)?;
                Ok(primitive.to_js_string())
            }
            other => Ok(other.to_js_string()),
        }
    }

    /// ToPrimitive. Functions render as source stubs; wrapped strings and,
    /// under version 1.2 with a number hint, arrays short-circuit; otherwise
    /// `toString`/`valueOf` run in hint order and the first primitive wins.
    pub fn default_value(
        &mut self,
        obj: &JsObjectRef,
        hint: PrimitiveHint,
    ) -> Result<JsValue, JsError> {
        {
            let borrowed = obj.borrow();
            match &borrowed.exotic {
                ExoticObject::Function(func) => {
                    let name = function_name(func);
                    return Ok(JsValue::from(format!(
                        "function {name}() {{ [native code] }}"
                    )));
                }
                ExoticObject::String(s) => {
                    return Ok(match hint {
                        PrimitiveHint::String => JsValue::String(s.cheap_clone()),
                        PrimitiveHint::Number => {
                            JsValue::Number(JsValue::String(s.cheap_clone()).to_number())
                        }
                    });
                }
                ExoticObject::Array(storage) => {
                    if hint == PrimitiveHint::Number && self.version_1_2() {
                        return Ok(JsValue::Number(storage.length() as f64));
                    }
                }
                ExoticObject::Ordinary => {}
            }
        }
        let order: [&str; 2] = match hint {
            PrimitiveHint::String => ["toString", "valueOf"],
            PrimitiveHint::Number => ["valueOf", "toString"],
        };
        for name in order {
            let method = self.get_property(obj, &PropertyKey::from(name))?;
            if method.is_callable() {
                let result =
                    self.call_function(&method, &JsValue::Object(obj.cheap_clone()), &[])?;
                if result.as_object().is_none() {
                    return Ok(result);
                }
            }
        }
        Err(JsError::type_error("can't convert object to primitive value"))
    }

    /// Source form of a value: primitives literally, strings quoted and
    /// escaped, objects through their own `toSource` when they have one.
    pub fn uneval(&mut self, value: &JsValue) -> Result<String, JsError> {
        match value {
            JsValue::Undefined => Ok("undefined".to_owned()),
            JsValue::Null => Ok("null".to_owned()),
            JsValue::Boolean(b) => Ok(if *b { "true" } else { "false" }.to_owned()),
            JsValue::Number(n) => {
                if *n == 0.0 && n.is_sign_negative() {
                    Ok("-0".to_owned())
                } else {
                    Ok(number_to_string(*n))
                }
            }
            JsValue::String(s) => Ok(format!("\"{}\"", escape_string(s.as_str()))),
            JsValue::Object(obj) => {
                let obj = obj.cheap_clone();
                let to_source = self.get_property(&obj, &PropertyKey::from("toSource"))?;
                let rendered = if to_source.is_callable() {
                    let result = self.call_function(&to_source, value, &[])?;
                    self.to_string_value(&result)?
                } else {
                    self.to_string_value(value)?
                };
                Ok(rendered.as_str().to_owned())
            }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}

// ---------------------------------------------------------------------------
// Own-level lookup
// ---------------------------------------------------------------------------

enum Lookup {
    Value(JsValue),
    Getter(JsValue),
    Proto,
}

/// One level of a property walk. Arrays answer `length` and dense-covered
/// indexes themselves; a dense hole skips the own bag and sends the walk to
/// the prototype, which is what makes inherited index properties visible
/// through holes.
fn lookup_own(object: &JsObject, key: &PropertyKey) -> Lookup {
    match &object.exotic {
        ExoticObject::Array(storage) => {
            if key.eq_str("length") {
                return Lookup::Value(JsValue::Number(storage.length() as f64));
            }
            if let PropertyKey::Index(index) = key {
                let accessor_override =
                    !storage.dense_only() && object.is_getter_or_setter(key, false);
                if !accessor_override {
                    if let Some(slot) = storage.dense_slot(*index as usize) {
                        return match slot {
                            Some(value) => Lookup::Value(value.cheap_clone()),
                            None => Lookup::Proto,
                        };
                    }
                }
            }
        }
        ExoticObject::Function(func) => {
            if key.eq_str("length") {
                return Lookup::Value(JsValue::Number(f64::from(function_arity(func))));
            }
            if key.eq_str("name") {
                return Lookup::Value(JsValue::String(function_name(func)));
            }
        }
        ExoticObject::String(s) => {
            if key.eq_str("length") {
                return Lookup::Value(JsValue::Number(s.char_len() as f64));
            }
            if let Some(index) = key.array_index() {
                if let Some(c) = s.char_at(index as usize) {
                    return Lookup::Value(JsValue::from(String::from(c)));
                }
            }
        }
        ExoticObject::Ordinary => {}
    }
    match object.get_own_property(key) {
        Some(prop) if prop.is_accessor() => match &prop.getter {
            Some(getter) => Lookup::Getter(getter.cheap_clone()),
            None => Lookup::Value(JsValue::Undefined),
        },
        Some(prop) => Lookup::Value(prop.value.cheap_clone()),
        None => Lookup::Proto,
    }
}

fn function_name(func: &JsFunction) -> JsString {
    match func {
        JsFunction::Native(native) => native.name.cheap_clone(),
        JsFunction::Array(op) => JsString::from(op.name()),
    }
}

fn function_arity(func: &JsFunction) -> u32 {
    match func {
        JsFunction::Native(native) => native.arity,
        JsFunction::Array(op) => op.arity(),
    }
}

fn object_to_string(_cx: &mut Context, this: &JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let class = match this {
        JsValue::Object(obj) => match &obj.borrow().exotic {
            ExoticObject::Array(_) => "Array",
            ExoticObject::Function(_) => "Function",
            ExoticObject::String(_) => "String",
            ExoticObject::Ordinary => "Object",
        },
        _ => "Object",
    };
    Ok(JsValue::from(format!("[object {class}]")))
}

fn object_value_of(_cx: &mut Context, this: &JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(this.cheap_clone())
}

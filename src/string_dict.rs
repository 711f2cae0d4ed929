//! String dictionary for deduplicating JsString instances.
//!
//! Property names pass through here so identical strings share one `Rc<str>`
//! allocation. Method registration and array-index/string conversions are the
//! main customers.

use crate::prelude::FxHashMap;
use crate::value::{CheapClone, JsString};

/// A dictionary for deduplicating JsString instances.
///
/// Strings inserted into the dictionary are stored once and subsequent
/// requests for the same string return a cheap clone of the existing instance.
pub struct StringDict {
    /// Map from string content to shared JsString instance.
    /// Using Box<str> as key to avoid double-indirection through Rc.
    strings: FxHashMap<Box<str>, JsString>,
}

impl StringDict {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self {
            strings: FxHashMap::default(),
        }
    }

    /// Create a dictionary pre-populated with common strings.
    pub fn with_common_strings() -> Self {
        let mut dict = Self::new();
        for s in COMMON_STRINGS {
            dict.get_or_insert(s);
        }
        dict
    }

    /// Get an existing string or insert a new one.
    /// Returns a cheap clone of the shared JsString instance.
    pub fn get_or_insert(&mut self, s: &str) -> JsString {
        if let Some(existing) = self.strings.get(s) {
            return existing.cheap_clone();
        }
        let js_str = JsString::from(s);
        self.strings.insert(s.into(), js_str.cheap_clone());
        js_str
    }

    /// Get an existing string without inserting.
    /// Returns None if the string is not in the dictionary.
    pub fn get(&self, s: &str) -> Option<JsString> {
        self.strings.get(s).map(|s| s.cheap_clone())
    }

    /// Number of unique strings in the dictionary.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Check if dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Default for StringDict {
    fn default() -> Self {
        Self::new()
    }
}

/// Strings the engine touches on almost every operation.
const COMMON_STRINGS: &[&str] = &[
    // Object graph
    "length",
    "prototype",
    "constructor",
    // Globals
    "Array",
    "Object",
    // Stringification
    "toString",
    "toLocaleString",
    "toSource",
    "join",
    // Mutators
    "push",
    "pop",
    "shift",
    "unshift",
    "splice",
    "reverse",
    "sort",
    // Accessors
    "slice",
    "concat",
    "indexOf",
    "lastIndexOf",
    // Iterative visitors
    "every",
    "filter",
    "forEach",
    "map",
    "some",
    // Values seen in joins
    "undefined",
    "null",
];

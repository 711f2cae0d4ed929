//! JavaScript `Array` exotic objects for embedding in script runtimes
//!
//! Arrays here are what the language calls exotic: a property bag fused with
//! hybrid element storage that starts dense (a vector with holes) and
//! degrades one-way to sparse when writes stop looking array-like. The full
//! method suite (`join`, `sort`, `splice`, `concat`, the iterative visitors,
//! and the rest) runs against any receiver with a `length`, fast-pathing
//! dense arrays.
//!
//! # Example
//!
//! ```
//! use jsarray::{Context, JsValue};
//!
//! let mut cx = Context::new();
//! let array = cx.new_array_from(vec![
//!     JsValue::Number(3.0),
//!     JsValue::Number(1.0),
//!     JsValue::Number(2.0),
//! ]);
//! let receiver = JsValue::Object(array);
//!
//! cx.call_method(&receiver, "sort", &[]).unwrap();
//! let joined = cx.call_method(&receiver, "join", &[JsValue::from("-")]).unwrap();
//! assert_eq!(joined, JsValue::from("1-2-3"));
//! ```

pub mod array;
pub mod context;
pub mod error;
pub mod value;

mod prelude;
mod string_dict;

pub use array::find_prototype_op;
pub use array::maximum_initial_capacity;
pub use array::set_maximum_initial_capacity;
pub use array::ArrayFunction;
pub use array::ArrayOp;
pub use array::ArrayStorage;
pub use context::Context;
pub use context::LanguageVersion;
pub use context::PrimitiveHint;
pub use error::JsError;
pub use value::CheapClone;
pub use value::JsFunction;
pub use value::JsObject;
pub use value::JsObjectRef;
pub use value::JsString;
pub use value::JsValue;
pub use value::NativeFn;
pub use value::NativeFunction;
pub use value::Property;
pub use value::PropertyKey;

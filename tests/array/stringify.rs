//! `join`, `toString`, `toLocaleString` and `toSource`, including the
//! cycle guard and the elision round-trip.

use jsarray::{Context, JsError, JsValue, PropertyKey};

use super::{
    call, call_err, create_plain_with_elements, create_test_context, degrade, dense_with_holes,
    joined, numbers, object_of, put_index, text,
};

fn localized(_cx: &mut Context, _this: &JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(JsValue::from("loc"))
}

fn broken_to_string(
    _cx: &mut Context,
    _this: &JsValue,
    _args: &[JsValue],
) -> Result<JsValue, JsError> {
    Err(JsError::type_error("toString exploded"))
}

#[test]
fn test_join_default_separator() {
    let mut cx = create_test_context();
    let array = numbers(&mut cx, &[1.0, 2.0, 3.0]);
    assert_eq!(joined(&mut cx, &array), "1,2,3");
}

#[test]
fn test_join_skips_holes_null_and_undefined() {
    let mut cx = create_test_context();
    let array = dense_with_holes(&mut cx, &[Some(10.0), None, Some(30.0)]);
    assert_eq!(joined(&mut cx, &array), "10,,30");
    let dashed = call(&mut cx, &array, "join", &[JsValue::from("-")]);
    assert_eq!(text(&dashed), "10--30");

    let pair = JsValue::Object(cx.new_array_from(vec![JsValue::Null, JsValue::Undefined]));
    assert_eq!(joined(&mut cx, &pair), ",");
}

#[test]
fn test_join_sparse_matches_dense() {
    let mut cx = create_test_context();
    let array = dense_with_holes(&mut cx, &[Some(10.0), None, Some(30.0)]);
    degrade(&mut cx, &array);
    assert_eq!(joined(&mut cx, &array), "10,,30");
}

#[test]
fn test_join_custom_separator() {
    let mut cx = create_test_context();
    let array = numbers(&mut cx, &[1.0, 2.0, 3.0]);
    let result = call(&mut cx, &array, "join", &[JsValue::from("-")]);
    assert_eq!(text(&result), "1-2-3");
    // the separator is coerced like any other value
    let result = call(&mut cx, &array, "join", &[JsValue::Number(9.0)]);
    assert_eq!(text(&result), "19293");
    // undefined means the default
    let result = call(&mut cx, &array, "join", &[JsValue::Undefined]);
    assert_eq!(text(&result), "1,2,3");
}

#[test]
fn test_join_plain_object_receiver() {
    let mut cx = create_test_context();
    let obj = create_plain_with_elements(&mut cx, &["a", "b"]);
    let prototype = cx.array_prototype().clone();
    let join = cx.get_property(&prototype, &PropertyKey::from("join")).unwrap();
    let result = cx
        .call_function(&join, &JsValue::Object(obj), &[])
        .unwrap();
    assert_eq!(text(&result), "a,b");
}

#[test]
fn test_join_refuses_oversized_receivers() {
    let mut cx = create_test_context();
    let obj = cx.new_object();
    cx.put_property(
        &obj,
        PropertyKey::from("length"),
        JsValue::Number(3_000_000_000.0),
    )
    .unwrap();
    let err = call_err(&mut cx, &JsValue::Object(obj), "join", &[]);
    assert!(matches!(err, JsError::RangeError { .. }), "{err}");
    assert!(err.to_string().contains("3000000000"), "{err}");
}

#[test]
fn test_to_string_is_join_with_commas() {
    let mut cx = create_test_context();
    let array = numbers(&mut cx, &[1.0, 2.0, 3.0]);
    let result = call(&mut cx, &array, "toString", &[]);
    assert_eq!(text(&result), "1,2,3");
}

#[test]
fn test_to_string_breaks_cycles() {
    let mut cx = create_test_context();
    let array = numbers(&mut cx, &[0.0, 2.0]);
    put_index(&mut cx, &array, 0, array.clone());
    let result = call(&mut cx, &array, "toString", &[]);
    assert_eq!(text(&result), ",2");
}

#[test]
fn test_to_string_renders_repeated_references_each_time() {
    let mut cx = create_test_context();
    let inner = numbers(&mut cx, &[1.0]);
    let outer = JsValue::Object(cx.new_array_from(vec![inner.clone(), inner]));
    // only a true cycle is cut; a diamond renders both occurrences
    let result = call(&mut cx, &outer, "toString", &[]);
    assert_eq!(text(&result), "1,1");
}

#[test]
fn test_to_source_literals() {
    let mut cx = create_test_context();
    let array = JsValue::Object(cx.new_array_from(vec![
        JsValue::Number(1.0),
        JsValue::from("a"),
    ]));
    let result = call(&mut cx, &array, "toSource", &[]);
    assert_eq!(text(&result), "[1, \"a\"]");
}

#[test]
fn test_to_source_renders_negative_zero() {
    let mut cx = create_test_context();
    let array = numbers(&mut cx, &[-0.0]);
    let result = call(&mut cx, &array, "toSource", &[]);
    assert_eq!(text(&result), "[-0]");
}

#[test]
fn test_to_source_elision_round_trip() {
    let mut cx = create_test_context();
    // a trailing hole needs the extra comma to survive a re-parse
    let one_hole = JsValue::Object(cx.new_array(1));
    let result = call(&mut cx, &one_hole, "toSource", &[]);
    assert_eq!(text(&result), "[, ]");

    let two_holes = JsValue::Object(cx.new_array(2));
    let result = call(&mut cx, &two_holes, "toSource", &[]);
    assert_eq!(text(&result), "[, , ]");

    let holes_then_value = dense_with_holes(&mut cx, &[None, Some(2.0)]);
    let result = call(&mut cx, &holes_then_value, "toSource", &[]);
    assert_eq!(text(&result), "[, 2]");
}

#[test]
fn test_to_source_nests_and_breaks_cycles() {
    let mut cx = create_test_context();
    let inner = numbers(&mut cx, &[1.0]);
    let outer = JsValue::Object(cx.new_array_from(vec![inner]));
    let result = call(&mut cx, &outer, "toSource", &[]);
    assert_eq!(text(&result), "[[1]]");

    let cyclic = numbers(&mut cx, &[0.0, 2.0]);
    put_index(&mut cx, &cyclic, 0, cyclic.clone());
    let result = call(&mut cx, &cyclic, "toSource", &[]);
    assert_eq!(text(&result), "[[], 2]");
}

#[test]
fn test_to_locale_string_uses_element_method() {
    let mut cx = create_test_context();
    let elem = cx.new_object();
    cx.define_function(&elem, "toLocaleString", 0, localized);
    let array = JsValue::Object(cx.new_array_from(vec![
        JsValue::Object(elem),
        JsValue::Number(2.0),
    ]));
    let result = call(&mut cx, &array, "toLocaleString", &[]);
    assert_eq!(text(&result), "loc,2");
}

#[test]
fn test_to_string_as_source_mode() {
    let mut cx = create_test_context();
    cx.set_to_string_as_source(true);
    let array = numbers(&mut cx, &[1.0, 2.0]);
    let result = call(&mut cx, &array, "toString", &[]);
    assert_eq!(text(&result), "[1, 2]");
}

#[test]
fn test_element_failure_leaves_the_guard_clean() {
    let mut cx = create_test_context();
    let elem = cx.new_object();
    cx.define_function(&elem, "toString", 0, broken_to_string);
    let array = JsValue::Object(cx.new_array_from(vec![JsValue::Object(elem)]));
    let err = call_err(&mut cx, &array, "toString", &[]);
    assert!(matches!(err, JsError::TypeError { .. }), "{err}");
    // the failed walk must not poison later stringification
    let obj = object_of(&array);
    cx.put_property(&obj, PropertyKey::Index(0), JsValue::Number(1.0))
        .unwrap();
    let result = call(&mut cx, &array, "toString", &[]);
    assert_eq!(text(&result), "1");
}

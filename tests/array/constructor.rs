//! `Array(...)` construction: length form, element form, and the 1.2 quirk.

use jsarray::{Context, JsError, JsValue, LanguageVersion, PropertyKey};

use super::{create_test_context, is_dense, joined, length_of, text};

fn constructor(cx: &mut Context) -> JsValue {
    let global = cx.global().clone();
    cx.get_property(&global, &PropertyKey::from("Array")).unwrap()
}

fn construct(cx: &mut Context, args: &[JsValue]) -> JsValue {
    let ctor = constructor(cx);
    cx.call_function(&ctor, &JsValue::Undefined, args).unwrap()
}

fn construct_err(cx: &mut Context, args: &[JsValue]) -> JsError {
    let ctor = constructor(cx);
    cx.call_function(&ctor, &JsValue::Undefined, args).unwrap_err()
}

#[test]
fn test_no_arguments_makes_empty_array() {
    let mut cx = create_test_context();
    let array = construct(&mut cx, &[]);
    assert_eq!(length_of(&mut cx, &array), 0);
    assert!(is_dense(&array));
    assert_eq!(joined(&mut cx, &array), "");
}

#[test]
fn test_single_number_is_a_length() {
    let mut cx = create_test_context();
    let array = construct(&mut cx, &[JsValue::Number(5.0)]);
    assert_eq!(length_of(&mut cx, &array), 5);
    assert!(is_dense(&array));
    assert_eq!(joined(&mut cx, &array), ",,,,");
}

#[test]
fn test_fractional_length_is_rejected() {
    let mut cx = create_test_context();
    for bad in [2.5, -1.0, f64::NAN, 4_294_967_296.0] {
        let err = construct_err(&mut cx, &[JsValue::Number(bad)]);
        assert!(matches!(err, JsError::RangeError { .. }), "{bad}: {err}");
        assert!(err.to_string().contains("invalid array length"));
    }
}

#[test]
fn test_max_uint32_length_is_allowed() {
    let mut cx = create_test_context();
    let array = construct(&mut cx, &[JsValue::Number(4_294_967_295.0)]);
    assert_eq!(length_of(&mut cx, &array), 4_294_967_295);
    assert!(!is_dense(&array));
}

#[test]
fn test_large_length_starts_sparse() {
    let mut cx = create_test_context();
    let array = construct(&mut cx, &[JsValue::Number(100_000.0)]);
    assert_eq!(length_of(&mut cx, &array), 100_000);
    assert!(!is_dense(&array));
}

#[test]
fn test_single_non_number_is_an_element() {
    let mut cx = create_test_context();
    let array = construct(&mut cx, &[JsValue::from("5")]);
    assert_eq!(length_of(&mut cx, &array), 1);
    assert_eq!(joined(&mut cx, &array), "5");
}

#[test]
fn test_multiple_arguments_are_elements() {
    let mut cx = create_test_context();
    let array = construct(
        &mut cx,
        &[JsValue::Number(1.0), JsValue::Number(2.0), JsValue::Number(3.0)],
    );
    assert_eq!(length_of(&mut cx, &array), 3);
    assert!(is_dense(&array));
    assert_eq!(joined(&mut cx, &array), "1,2,3");
}

#[test]
fn test_version_1_2_takes_single_number_as_element() {
    let mut cx = create_test_context();
    cx.set_version(LanguageVersion::V1_2);
    let array = construct(&mut cx, &[JsValue::Number(5.0)]);
    assert_eq!(length_of(&mut cx, &array), 1);
    assert_eq!(joined(&mut cx, &array), "5");
}

#[test]
fn test_constructor_result_answers_to_string() {
    let mut cx = create_test_context();
    let array = construct(&mut cx, &[JsValue::Number(1.0), JsValue::Number(2.0)]);
    let shown = cx.to_string_value(&array).unwrap();
    assert_eq!(text(&JsValue::String(shown)), "1,2");
}

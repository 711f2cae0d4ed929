//! `indexOf` and `lastIndexOf`: strict equality, fromIndex handling, and
//! hole skipping.

use jsarray::{JsValue, PropertyKey};

use super::{
    call, create_test_context, degrade, dense_with_holes, number, numbers, put_index, strings,
};

#[test]
fn test_index_of_finds_first_match() {
    let mut cx = create_test_context();
    let array = numbers(&mut cx, &[1.0, 2.0, 3.0, 2.0]);
    let found = call(&mut cx, &array, "indexOf", &[JsValue::Number(2.0)]);
    assert_eq!(found, JsValue::Number(1.0));
    let found = call(&mut cx, &array, "lastIndexOf", &[JsValue::Number(2.0)]);
    assert_eq!(found, JsValue::Number(3.0));
}

#[test]
fn test_index_of_misses() {
    let mut cx = create_test_context();
    let array = numbers(&mut cx, &[1.0, 2.0]);
    assert_eq!(
        call(&mut cx, &array, "indexOf", &[JsValue::Number(9.0)]),
        JsValue::Number(-1.0),
    );
    let empty = JsValue::Object(cx.new_array(0));
    assert_eq!(
        call(&mut cx, &empty, "indexOf", &[JsValue::Number(9.0)]),
        JsValue::Number(-1.0),
    );
}

#[test]
fn test_from_index_positive_and_negative() {
    let mut cx = create_test_context();
    let array = numbers(&mut cx, &[1.0, 2.0, 3.0, 2.0]);
    let args = [JsValue::Number(2.0), JsValue::Number(2.0)];
    assert_eq!(call(&mut cx, &array, "indexOf", &args), JsValue::Number(3.0));
    let args = [JsValue::Number(2.0), JsValue::Number(-2.0)];
    assert_eq!(call(&mut cx, &array, "indexOf", &args), JsValue::Number(3.0));
    let args = [JsValue::Number(2.0), JsValue::Number(2.0)];
    assert_eq!(
        call(&mut cx, &array, "lastIndexOf", &args),
        JsValue::Number(1.0),
    );
    let args = [JsValue::Number(2.0), JsValue::Number(-3.0)];
    assert_eq!(
        call(&mut cx, &array, "lastIndexOf", &args),
        JsValue::Number(1.0),
    );
}

#[test]
fn test_from_index_out_of_range() {
    let mut cx = create_test_context();
    let array = numbers(&mut cx, &[1.0, 2.0]);
    let args = [JsValue::Number(1.0), JsValue::Number(99.0)];
    assert_eq!(call(&mut cx, &array, "indexOf", &args), JsValue::Number(-1.0));
    // resolved start below zero: nothing is searched
    let args = [JsValue::Number(1.0), JsValue::Number(-99.0)];
    assert_eq!(
        call(&mut cx, &array, "lastIndexOf", &args),
        JsValue::Number(-1.0),
    );
}

#[test]
fn test_from_index_is_coerced() {
    let mut cx = create_test_context();
    let array = numbers(&mut cx, &[2.0, 2.0]);
    let args = [JsValue::Number(2.0), JsValue::from("1")];
    assert_eq!(call(&mut cx, &array, "indexOf", &args), JsValue::Number(1.0));
}

#[test]
fn test_matching_is_strict() {
    let mut cx = create_test_context();
    let array = strings(&mut cx, &["1"]);
    assert_eq!(
        call(&mut cx, &array, "indexOf", &[JsValue::Number(1.0)]),
        JsValue::Number(-1.0),
    );
    let array = JsValue::Object(cx.new_array_from(vec![JsValue::Null]));
    assert_eq!(
        call(&mut cx, &array, "indexOf", &[JsValue::Undefined]),
        JsValue::Number(-1.0),
    );
    assert_eq!(
        call(&mut cx, &array, "indexOf", &[JsValue::Null]),
        JsValue::Number(0.0),
    );
}

#[test]
fn test_nan_never_matches() {
    let mut cx = create_test_context();
    let array = numbers(&mut cx, &[f64::NAN]);
    let found = call(&mut cx, &array, "indexOf", &[JsValue::Number(f64::NAN)]);
    assert_eq!(number(&found), -1.0);
}

#[test]
fn test_negative_zero_matches_zero() {
    let mut cx = create_test_context();
    let array = numbers(&mut cx, &[0.0]);
    let found = call(&mut cx, &array, "indexOf", &[JsValue::Number(-0.0)]);
    assert_eq!(found, JsValue::Number(0.0));
}

#[test]
fn test_holes_are_skipped_while_dense() {
    let mut cx = create_test_context();
    let array = dense_with_holes(&mut cx, &[Some(1.0), None, Some(3.0)]);
    assert_eq!(
        call(&mut cx, &array, "indexOf", &[JsValue::Undefined]),
        JsValue::Number(-1.0),
    );
    assert_eq!(
        call(&mut cx, &array, "lastIndexOf", &[JsValue::Undefined]),
        JsValue::Number(-1.0),
    );
}

#[test]
fn test_holes_are_skipped_when_sparse() {
    let mut cx = create_test_context();
    let array = dense_with_holes(&mut cx, &[Some(1.0), None, Some(3.0)]);
    degrade(&mut cx, &array);
    assert_eq!(
        call(&mut cx, &array, "indexOf", &[JsValue::Undefined]),
        JsValue::Number(-1.0),
    );
    assert_eq!(
        call(&mut cx, &array, "lastIndexOf", &[JsValue::Undefined]),
        JsValue::Number(-1.0),
    );
}

#[test]
fn test_explicit_undefined_is_found() {
    let mut cx = create_test_context();
    let array = numbers(&mut cx, &[1.0, 0.0, 3.0]);
    put_index(&mut cx, &array, 1, JsValue::Undefined);
    assert_eq!(
        call(&mut cx, &array, "indexOf", &[JsValue::Undefined]),
        JsValue::Number(1.0),
    );
}

#[test]
fn test_inherited_value_is_seen_through_a_hole_when_sparse() {
    let mut cx = create_test_context();
    let array = dense_with_holes(&mut cx, &[Some(10.0), None, Some(30.0)]);
    let prototype = cx.array_prototype().clone();
    cx.put_property(&prototype, PropertyKey::Index(1), JsValue::Number(99.0))
        .unwrap();
    // the dense scan reads raw slots and never consults the prototype
    assert_eq!(
        call(&mut cx, &array, "indexOf", &[JsValue::Number(99.0)]),
        JsValue::Number(-1.0),
    );
    degrade(&mut cx, &array);
    assert_eq!(
        call(&mut cx, &array, "indexOf", &[JsValue::Number(99.0)]),
        JsValue::Number(1.0),
    );
    cx.delete_property(&prototype, &PropertyKey::Index(1));
}

//! Method wiring: arities and names, the static forms, and behavior when
//! the `Array` binding itself is replaced or removed.

use std::rc::Rc;

use jsarray::{Context, JsError, JsValue, PropertyKey};

use super::{call_err, create_test_context, joined, number, numbers, object_of, text};

fn prototype_method(cx: &mut Context, name: &str) -> JsValue {
    let prototype = cx.array_prototype().clone();
    cx.get_property(&prototype, &PropertyKey::from(name)).unwrap()
}

fn constructor(cx: &mut Context) -> JsValue {
    let global = cx.global().clone();
    cx.get_property(&global, &PropertyKey::from("Array")).unwrap()
}

fn arity_of(cx: &mut Context, function: &JsValue) -> f64 {
    let obj = object_of(function);
    let length = cx.get_property(&obj, &PropertyKey::from("length")).unwrap();
    number(&length)
}

fn marked_object(cx: &mut Context, _this: &JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let obj = cx.new_object();
    cx.put_property(&obj, PropertyKey::from("marked"), JsValue::Boolean(true))?;
    Ok(JsValue::Object(obj))
}

#[test]
fn test_method_arities() {
    let mut cx = create_test_context();
    for (name, arity) in [
        ("pop", 0.0),
        ("toString", 0.0),
        ("reverse", 0.0),
        ("join", 1.0),
        ("push", 1.0),
        ("concat", 1.0),
        ("map", 1.0),
        ("splice", 2.0),
        ("slice", 2.0),
    ] {
        let method = prototype_method(&mut cx, name);
        assert_eq!(arity_of(&mut cx, &method), arity, "{name}");
    }
}

#[test]
fn test_method_names() {
    let mut cx = create_test_context();
    let method = prototype_method(&mut cx, "lastIndexOf");
    let obj = object_of(&method);
    let name = cx.get_property(&obj, &PropertyKey::from("name")).unwrap();
    assert_eq!(text(&name), "lastIndexOf");
}

#[test]
fn test_method_renders_as_native_code() {
    let mut cx = create_test_context();
    let method = prototype_method(&mut cx, "join");
    let shown = cx.to_string_value(&method).unwrap();
    assert_eq!(shown.as_str(), "function join() { [native code] }");
}

#[test]
fn test_static_forms_take_the_receiver_first() {
    let mut cx = create_test_context();
    let array = numbers(&mut cx, &[1.0, 2.0]);
    let ctor = constructor(&mut cx);
    let joined_static = cx
        .call_method(&ctor, "join", &[array.clone(), JsValue::from("-")])
        .unwrap();
    assert_eq!(text(&joined_static), "1-2");
}

#[test]
fn test_static_forms_have_arity_two() {
    let mut cx = create_test_context();
    let ctor = constructor(&mut cx);
    let obj = object_of(&ctor);
    for name in ["join", "push", "splice", "every"] {
        let method = cx.get_property(&obj, &PropertyKey::from(name)).unwrap();
        assert_eq!(arity_of(&mut cx, &method), 2.0, "{name}");
    }
}

#[test]
fn test_stringifiers_have_no_static_form() {
    let mut cx = create_test_context();
    let ctor = constructor(&mut cx);
    let obj = object_of(&ctor);
    for name in ["toString", "toLocaleString", "toSource"] {
        assert!(!obj.borrow().has_own_property(&PropertyKey::from(name)), "{name}");
    }
    assert!(obj.borrow().has_own_property(&PropertyKey::from("join")));
}

#[test]
fn test_static_join_on_a_string_receiver() {
    let mut cx = create_test_context();
    let ctor = constructor(&mut cx);
    let result = cx.call_method(&ctor, "join", &[JsValue::from("abc")]).unwrap();
    assert_eq!(text(&result), "a,b,c");
}

#[test]
fn test_static_form_requires_a_receiver() {
    let mut cx = create_test_context();
    let ctor = constructor(&mut cx);
    let err = cx.call_method(&ctor, "join", &[]).unwrap_err();
    assert!(matches!(err, JsError::TypeError { .. }), "{err}");
}

#[test]
fn test_prototype_and_constructor_point_at_each_other() {
    let mut cx = create_test_context();
    let ctor = constructor(&mut cx);
    let prototype = cx.array_prototype().clone();
    let back = cx
        .get_property(&prototype, &PropertyKey::from("constructor"))
        .unwrap();
    assert!(Rc::ptr_eq(&object_of(&back), &object_of(&ctor)));
    let forward = cx
        .get_property(&object_of(&ctor), &PropertyKey::from("prototype"))
        .unwrap();
    assert!(Rc::ptr_eq(&object_of(&forward), &prototype));
}

#[test]
fn test_missing_method_is_not_a_function() {
    let mut cx = create_test_context();
    let array = numbers(&mut cx, &[1.0]);
    let err = call_err(&mut cx, &array, "reduce", &[]);
    assert!(err.to_string().contains("is not a function"), "{err}");
}

#[test]
fn test_replaced_constructor_builds_the_results() {
    let mut cx = create_test_context();
    let array = numbers(&mut cx, &[1.0, 2.0]);
    let global = cx.global().clone();
    let fake = cx.new_function("Array", 1, marked_object);
    cx.put_property(&global, PropertyKey::from("Array"), JsValue::Object(fake))
        .unwrap();

    let sliced = cx.call_method(&array, "slice", &[]).unwrap();
    let sliced_obj = object_of(&sliced);
    assert!(!sliced_obj.borrow().is_array());
    let marked = cx
        .get_property(&sliced_obj, &PropertyKey::from("marked"))
        .unwrap();
    assert_eq!(marked, JsValue::Boolean(true));
    let copied = cx.get_property(&sliced_obj, &PropertyKey::Index(1)).unwrap();
    assert_eq!(copied, JsValue::Number(2.0));
}

#[test]
fn test_replaced_constructor_changes_concat_spreading() {
    let mut cx = create_test_context();
    let array = numbers(&mut cx, &[1.0, 2.0]);
    let global = cx.global().clone();
    let fake = cx.new_function("Array", 1, marked_object);
    cx.put_property(&global, PropertyKey::from("Array"), JsValue::Object(fake))
        .unwrap();

    // the receiver no longer counts as an instance, so it is appended whole
    let result = cx.call_method(&array, "concat", &[]).unwrap();
    let result_obj = object_of(&result);
    let head = cx.get_property(&result_obj, &PropertyKey::Index(0)).unwrap();
    assert!(Rc::ptr_eq(&object_of(&head), &object_of(&array)));
}

#[test]
fn test_deleted_constructor_fails_dependent_methods() {
    let mut cx = create_test_context();
    let array = numbers(&mut cx, &[1.0, 2.0]);
    let global = cx.global().clone();
    assert!(cx.delete_property(&global, &PropertyKey::from("Array")));
    let err = cx.call_method(&array, "slice", &[]).unwrap_err();
    assert!(matches!(err, JsError::ReferenceError { .. }), "{err}");
    assert!(err.to_string().contains("Array is not defined"), "{err}");
    // methods that build no array still work
    assert_eq!(joined(&mut cx, &array), "1,2");
}

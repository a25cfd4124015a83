//! Tests for quill-runtime-stackvm.

use crate::{Boxed, Fault, Machine, Object, Value, execute};
use rhizome_quill_ir::{
    BoxedKind, CodeBuilder, Constant, EmitError, FieldRef, MethodRef, NativeType, RefType, Test,
};
use rhizome_quill_schema::Schema;

const DEMO: &str = include_str!("../../../quill-schema/testdata/demo.toml");

fn demo() -> Schema {
    Schema::from_toml_str(DEMO).expect("fixture should load")
}

fn person() -> RefType {
    RefType::Message("demo.Person".to_string())
}

fn default_person() -> MethodRef {
    MethodRef::static_method(
        person(),
        "default_instance",
        vec![],
        Some(NativeType::object(person())),
    )
}

fn new_builder() -> MethodRef {
    MethodRef::static_method(
        person(),
        "new_builder",
        vec![],
        Some(NativeType::builder("demo.Person")),
    )
}

fn build() -> MethodRef {
    MethodRef::instance(
        RefType::Builder("demo.Person".to_string()),
        "build",
        vec![],
        Some(NativeType::object(person())),
    )
}

fn setter(name: &str, param: NativeType) -> MethodRef {
    MethodRef::instance(
        RefType::Builder("demo.Person".to_string()),
        name,
        vec![param],
        Some(NativeType::builder("demo.Person")),
    )
}

fn getter(name: &str, returns: NativeType) -> MethodRef {
    MethodRef::instance(person(), name, vec![], Some(returns))
}

#[test]
fn test_default_instance_is_shared() {
    let schema = demo();
    let mut machine = Machine::new(&schema);
    let mut b = CodeBuilder::new();
    b.invoke(&default_person()).unwrap();
    let seq = b.finish_expression(true).unwrap();

    let first = machine.run(&seq, vec![]).unwrap().unwrap();
    let second = machine.run(&seq, vec![]).unwrap().unwrap();
    assert!(first.same_ref(&second));
}

#[test]
fn test_unset_fields_read_defaults() {
    let schema = demo();
    let mut b = CodeBuilder::new();
    b.invoke(&default_person()).unwrap();
    b.invoke(&getter("get_level", NativeType::Int)).unwrap();
    let seq = b.finish_expression(true).unwrap();
    let value = execute(&schema, &seq).unwrap().unwrap();
    assert!(matches!(value, Value::Int(7)));

    let mut b = CodeBuilder::new();
    b.invoke(&default_person()).unwrap();
    b.invoke(&getter("get_color", NativeType::object(RefType::Enum("demo.Color".into()))))
        .unwrap();
    let seq = b.finish_expression(true).unwrap();
    let value = execute(&schema, &seq).unwrap().unwrap();
    assert_eq!(value.to_string(), "demo.Color#1");
}

#[test]
fn test_builder_round_trip() {
    let schema = demo();
    let mut b = CodeBuilder::new();
    b.invoke(&new_builder()).unwrap();
    b.push_const(Constant::Text("Ada".into()));
    b.invoke(&setter("set_name", NativeType::text())).unwrap();
    b.push_const(Constant::Int(36));
    b.invoke(&setter("set_age", NativeType::Int)).unwrap();
    b.invoke(&build()).unwrap();
    b.dup().unwrap();
    b.invoke(&getter("get_name", NativeType::text())).unwrap();
    b.swap().unwrap();
    b.pop().unwrap();
    let seq = b.finish_expression(true).unwrap();
    let value = execute(&schema, &seq).unwrap().unwrap();
    assert_eq!(value.as_text(), Some("Ada"));
}

#[test]
fn test_oneof_setter_clears_siblings() {
    let schema = demo();
    let case_ty = RefType::OneofCase("demo.Person.contact".to_string());
    let mut b = CodeBuilder::new();
    b.invoke(&new_builder()).unwrap();
    b.push_const(Constant::Text("a@example.com".into()));
    b.invoke(&setter("set_email", NativeType::text())).unwrap();
    b.push_const(Constant::Long(5551234));
    b.invoke(&setter("set_phone", NativeType::Long)).unwrap();
    b.invoke(&build()).unwrap();
    b.dup().unwrap();
    b.invoke(&getter("has_email", NativeType::Bool)).unwrap();
    b.pop().unwrap();
    b.invoke(&getter("get_contact_case", NativeType::object(case_ty.clone())))
        .unwrap();
    b.invoke(&MethodRef::instance(
        case_ty,
        "get_number",
        vec![],
        Some(NativeType::Int),
    ))
    .unwrap();
    let seq = b.finish_expression(true).unwrap();
    let value = execute(&schema, &seq).unwrap().unwrap();
    assert!(matches!(value, Value::Int(18)));
}

#[test]
fn test_null_receiver_faults() {
    let schema = demo();
    let mut b = CodeBuilder::new();
    b.push_null();
    b.check_cast(person()).unwrap();
    b.invoke(&getter("get_name", NativeType::text())).unwrap();
    let seq = b.finish_expression(false).unwrap();
    assert!(matches!(
        execute(&schema, &seq),
        Err(Fault::NullPointer(_))
    ));
}

#[test]
fn test_setter_rejects_null() {
    let schema = demo();
    let mut b = CodeBuilder::new();
    b.invoke(&new_builder()).unwrap();
    b.push_null();
    b.invoke(&setter("set_name", NativeType::text())).unwrap();
    b.invoke(&build()).unwrap();
    let seq = b.finish_expression(true).unwrap();
    assert!(matches!(
        execute(&schema, &seq),
        Err(Fault::NullPointer(_))
    ));
}

#[test]
fn test_enum_for_number() {
    let schema = demo();
    let color = RefType::Enum("demo.Color".to_string());
    let for_number = MethodRef::static_method(
        color.clone(),
        "for_number",
        vec![NativeType::Int],
        Some(NativeType::object(color)),
    );

    let mut b = CodeBuilder::new();
    b.push_const(Constant::Int(3));
    b.invoke(&for_number).unwrap();
    let seq = b.finish_expression(false).unwrap();
    let value = execute(&schema, &seq).unwrap().unwrap();
    assert_eq!(value.as_long(), Some(3));

    let mut b = CodeBuilder::new();
    b.push_const(Constant::Int(42));
    b.invoke(&for_number).unwrap();
    let seq = b.finish_expression(false).unwrap();
    assert!(execute(&schema, &seq).unwrap().unwrap().is_null());
}

#[test]
fn test_base64_codec() {
    let schema = demo();
    let codec = NativeType::object(RefType::Codec);
    let bytes = NativeType::object(RefType::ByteArray);
    let mut b = CodeBuilder::new();
    b.invoke(&MethodRef::static_method(
        RefType::Codec,
        "base64",
        vec![],
        Some(codec.clone()),
    ))
    .unwrap();
    b.dup().unwrap();
    b.push_const(Constant::Text("aGVsbG8=".into()));
    b.invoke(&MethodRef::instance(
        RefType::Codec,
        "decode",
        vec![NativeType::text()],
        Some(bytes.clone()),
    ))
    .unwrap();
    b.invoke(&MethodRef::instance(
        RefType::Codec,
        "encode",
        vec![bytes],
        Some(NativeType::text()),
    ))
    .unwrap();
    let seq = b.finish_expression(true).unwrap();
    let value = execute(&schema, &seq).unwrap().unwrap();
    assert_eq!(value.as_text(), Some("aGVsbG8="));
}

#[test]
fn test_bad_base64_faults() {
    let schema = demo();
    let mut b = CodeBuilder::new();
    b.invoke(&MethodRef::static_method(
        RefType::Codec,
        "base64",
        vec![],
        Some(NativeType::object(RefType::Codec)),
    ))
    .unwrap();
    b.push_const(Constant::Text("not base64!".into()));
    b.invoke(&MethodRef::instance(
        RefType::Codec,
        "decode",
        vec![NativeType::text()],
        Some(NativeType::object(RefType::ByteArray)),
    ))
    .unwrap();
    let seq = b.finish_expression(true).unwrap();
    assert!(matches!(
        execute(&schema, &seq),
        Err(Fault::IllegalArgument(_))
    ));
}

#[test]
fn test_long_parse_and_format() {
    let schema = demo();
    let long = RefType::Wrapper(NativeType::Long);
    let mut b = CodeBuilder::new();
    b.push_const(Constant::Text("-9000000000".into()));
    b.invoke(&MethodRef::static_method(
        long.clone(),
        "parse",
        vec![NativeType::text()],
        Some(NativeType::Long),
    ))
    .unwrap();
    b.invoke(&MethodRef::static_method(
        long.clone(),
        "to_string",
        vec![NativeType::Long],
        Some(NativeType::text()),
    ))
    .unwrap();
    let seq = b.finish_expression(true).unwrap();
    let value = execute(&schema, &seq).unwrap().unwrap();
    assert_eq!(value.as_text(), Some("-9000000000"));

    let mut b = CodeBuilder::new();
    b.push_const(Constant::Text("12ab".into()));
    b.invoke(&MethodRef::static_method(
        long,
        "parse",
        vec![NativeType::text()],
        Some(NativeType::Long),
    ))
    .unwrap();
    let seq = b.finish_expression(true).unwrap();
    assert!(matches!(
        execute(&schema, &seq),
        Err(Fault::NumberFormat(text)) if text == "12ab"
    ));
}

#[test]
fn test_extension_static_and_default() {
    let schema = demo();
    let ext = FieldRef {
        owner: RefType::ExtensionHolder("demo.Extensions".to_string()),
        name: "weight".to_string(),
        ty: NativeType::object(RefType::Extension),
    };
    let mut b = CodeBuilder::new();
    b.invoke(&default_person()).unwrap();
    b.get_static(&ext);
    b.invoke(&MethodRef::instance(
        RefType::ExtendableMessage,
        "get_extension",
        vec![NativeType::object(RefType::Extension)],
        Some(NativeType::object(RefType::Object)),
    ))
    .unwrap();
    let seq = b.finish_expression(false).unwrap();
    let value = execute(&schema, &seq).unwrap().unwrap();
    assert_eq!(value.as_double(), Some(1.5));
}

#[test]
fn test_boxed_get_field() {
    let schema = demo();
    let proto = RefType::Boxed(BoxedKind::Proto);
    let mut b = CodeBuilder::new();
    b.invoke(&new_builder()).unwrap();
    b.push_const(Constant::Long(9_007_199_254_740_993));
    b.invoke(&setter("set_id_text", NativeType::Long)).unwrap();
    b.invoke(&build()).unwrap();
    b.invoke(&MethodRef::static_method(
        proto.clone(),
        "for_value",
        vec![NativeType::object(RefType::Object)],
        Some(NativeType::object(proto.clone())),
    ))
    .unwrap();
    b.push_const(Constant::Text("id_text".into()));
    b.invoke(&MethodRef::instance(
        proto,
        "get_field",
        vec![NativeType::text()],
        Some(NativeType::object(RefType::Provider)),
    ))
    .unwrap();
    let seq = b.finish_expression(true).unwrap();
    let value = execute(&schema, &seq).unwrap().unwrap();
    match value.as_object() {
        Some(Object::Boxed(Boxed::Text(s))) => assert_eq!(s, "9007199254740993"),
        other => panic!("expected boxed text, got {:?}", other),
    }
}

#[test]
fn test_loop_counts_locals() {
    let schema = demo();
    let mut b = CodeBuilder::new();
    let total = b.declare_local("total", NativeType::Int);
    let index = b.declare_local("index", NativeType::Int);
    b.push_const(Constant::Int(0));
    b.store(&total).unwrap();
    b.push_const(Constant::Int(0));
    b.store(&index).unwrap();
    b.while_loop::<EmitError, _, _>(
        |c| {
            c.load(&index);
            c.push_const(Constant::Int(4));
            Ok(())
        },
        Test::IntLt,
        |body| {
            body.increment(&total, 10)?;
            body.increment(&index, 1)
        },
    )
    .unwrap();
    b.load(&total);
    let seq = b.finish_expression(true).unwrap();
    assert!(matches!(execute(&schema, &seq).unwrap(), Some(Value::Int(40))));
}

#[test]
fn test_suspension_counter() {
    let schema = demo();
    let mut machine = Machine::new(&schema);
    let list = NativeType::object(RefType::List);
    let mut b = CodeBuilder::new();
    b.invoke(&MethodRef::static_method(
        RefType::Runtime,
        "new_list",
        vec![],
        Some(list.clone()),
    ))
    .unwrap();
    b.suspend(&MethodRef::static_method(
        RefType::Runtime,
        "resolve_all",
        vec![list.clone()],
        Some(list),
    ))
    .unwrap();
    let seq = b.finish_expression(true).unwrap();
    machine.run(&seq, vec![]).unwrap();
    assert_eq!(machine.suspensions(), 1);
}

#[test]
fn test_run_checks_input_count() {
    let schema = demo();
    let mut machine = Machine::new(&schema);
    let b = CodeBuilder::with_inputs(vec![NativeType::Int]);
    let seq = b.finish_expression(true).unwrap();
    assert!(matches!(
        machine.run(&seq, vec![]),
        Err(Fault::IllegalArgument(_))
    ));
    assert!(matches!(
        machine.run(&seq, vec![Value::Int(3)]),
        Ok(Some(Value::Int(3)))
    ));
}

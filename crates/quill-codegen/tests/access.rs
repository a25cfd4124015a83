//! Field access, executed on the reference machine.

use rhizome_quill_codegen::{Codegen, CodegenError, TypedValue, ValueType};
use rhizome_quill_ir::Op;
use rhizome_quill_runtime_stackvm::{Boxed, Machine, Object, Value};
use rhizome_quill_schema::{SanitizedKind, Schema};

const DEMO: &str = include_str!("../../quill-schema/testdata/demo.toml");

fn demo() -> Schema {
    Schema::from_toml_str(DEMO).expect("fixture should load")
}

fn construct(schema: &Schema, message: &str, args: Vec<(&str, TypedValue)>) -> Value {
    let args = args
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();
    let seq = Codegen::new(schema).construct(message, args).unwrap();
    Machine::new(schema)
        .run(seq.code(), vec![])
        .unwrap()
        .unwrap()
}

fn access(schema: &Schema, message: &str, field: &str) -> TypedValue {
    let base = TypedValue::input(ValueType::Message(message.to_string()), false, false).unwrap();
    Codegen::new(schema)
        .field_access(message, base, field)
        .unwrap()
}

fn read(schema: &Schema, message: &str, base: Value, field: &str) -> Value {
    let seq = access(schema, message, field);
    Machine::new(schema)
        .run(seq.code(), vec![base])
        .unwrap()
        .unwrap()
}

fn has_branch(value: &TypedValue) -> bool {
    value.code().contains(|op| matches!(op, Op::Branch(_)))
}

#[test]
fn test_unset_legacy_field_reads_null() {
    let schema = demo();
    let person = construct(&schema, "demo.Person", vec![]);
    assert!(read(&schema, "demo.Person", person.clone(), "age").is_null());
    assert!(read(&schema, "demo.Person", person.clone(), "name").is_null());
    assert!(read(&schema, "demo.Person", person, "friend").is_null());
}

#[test]
fn test_set_legacy_field_reads_value() {
    let schema = demo();
    let person = construct(
        &schema,
        "demo.Person",
        vec![
            ("age", TypedValue::long(41)),
            ("name", TypedValue::text("Ada")),
            ("active", TypedValue::bool(true)),
            ("ratio", TypedValue::double(0.25)),
        ],
    );
    let age = read(&schema, "demo.Person", person.clone(), "age");
    assert_eq!(age.as_long(), Some(41));
    let name = read(&schema, "demo.Person", person.clone(), "name");
    assert_eq!(name.as_text(), Some("Ada"));
    let active = read(&schema, "demo.Person", person.clone(), "active");
    assert_eq!(active.as_bool(), Some(true));
    let ratio = read(&schema, "demo.Person", person, "ratio");
    assert_eq!(ratio.as_double(), Some(0.25));
}

#[test]
fn test_checked_primitive_is_boxed_and_nullable() {
    let schema = demo();
    let age = access(&schema, "demo.Person", "age");
    assert!(age.is_nullable());
    assert!(age.is_boxed());
    assert_eq!(age.value_type(), &ValueType::Int);
    assert!(has_branch(&age));
}

#[test]
fn test_explicit_default_skips_check() {
    let schema = demo();
    let level = access(&schema, "demo.Person", "level");
    assert!(!level.is_nullable());
    assert!(!has_branch(&level));

    let person = construct(&schema, "demo.Person", vec![]);
    let value = read(&schema, "demo.Person", person.clone(), "level");
    assert!(matches!(value, Value::Long(7)));
    let nickname = read(&schema, "demo.Person", person.clone(), "nickname");
    assert_eq!(nickname.as_text(), Some("anon"));
    let favorite = read(&schema, "demo.Person", person, "favorite");
    assert!(matches!(favorite, Value::Long(3)));
}

#[test]
fn test_legacy_enum_reads_as_number() {
    let schema = demo();
    let person = construct(&schema, "demo.Person", vec![("color", TypedValue::long(2))]);
    let color = read(&schema, "demo.Person", person, "color");
    assert_eq!(color.as_long(), Some(2));
}

#[test]
fn test_oneof_member_presence() {
    let schema = demo();
    let person = construct(
        &schema,
        "demo.Person",
        vec![
            ("email", TypedValue::text("ada@example.com")),
            ("phone", TypedValue::long(5550100)),
        ],
    );
    assert!(read(&schema, "demo.Person", person.clone(), "email").is_null());
    let phone = read(&schema, "demo.Person", person.clone(), "phone");
    assert_eq!(phone.as_long(), Some(5550100));
    assert!(read(&schema, "demo.Person", person, "pager").is_null());
}

#[test]
fn test_modern_scalars_read_without_check() {
    let schema = demo();
    let account = construct(&schema, "modern.Account", vec![]);
    let balance = access(&schema, "modern.Account", "balance");
    assert!(!has_branch(&balance));

    assert!(matches!(
        read(&schema, "modern.Account", account.clone(), "balance"),
        Value::Long(0)
    ));
    assert_eq!(
        read(&schema, "modern.Account", account.clone(), "handle").as_text(),
        Some("")
    );
    assert!(matches!(
        read(&schema, "modern.Account", account.clone(), "status"),
        Value::Long(0)
    ));
    assert!(read(&schema, "modern.Account", account, "owner").is_null());
}

#[test]
fn test_modern_enum_keeps_unknown_numbers() {
    let schema = demo();
    let account = construct(&schema, "modern.Account", vec![("status", TypedValue::long(42))]);
    assert!(matches!(
        read(&schema, "modern.Account", account, "status"),
        Value::Long(42)
    ));
}

#[test]
fn test_modern_message_field_is_checked() {
    let schema = demo();
    let owner = access(&schema, "modern.Account", "owner");
    assert!(owner.is_nullable());
    assert!(has_branch(&owner));

    let codegen = Codegen::new(&schema);
    let person = codegen
        .construct("demo.Person", vec![("name".to_string(), TypedValue::text("Bo"))])
        .unwrap();
    let seq = codegen
        .construct("modern.Account", vec![("owner".to_string(), person)])
        .unwrap();
    let account = Machine::new(&schema)
        .run(seq.code(), vec![])
        .unwrap()
        .unwrap();
    let owner = read(&schema, "modern.Account", account, "owner");
    assert_eq!(owner.as_message().map(|data| data.type_name()), Some("demo.Person"));
    assert_eq!(read(&schema, "demo.Person", owner, "name").as_text(), Some("Bo"));
}

#[test]
fn test_numeric_text_round_trip() {
    let schema = demo();
    let person = construct(
        &schema,
        "demo.Person",
        vec![("id_text", TypedValue::text("9007199254740993"))],
    );
    let value = read(&schema, "demo.Person", person, "id_text");
    assert_eq!(value.as_text(), Some("9007199254740993"));
}

#[test]
fn test_bytes_read_as_base64() {
    let schema = demo();
    for encoded in ["aGVsbG8=", "/w==", ""] {
        let person = construct(&schema, "demo.Person", vec![("avatar", TypedValue::text(encoded))]);
        let value = read(&schema, "demo.Person", person, "avatar");
        assert_eq!(value.as_text(), Some(encoded));
    }
}

#[test]
fn test_sanitized_field_reads_content() {
    let schema = demo();
    let bio = TypedValue::sanitized(SanitizedKind::Html, "<b>hi</b>").unwrap();
    let person = construct(&schema, "demo.Person", vec![("bio", bio)]);
    let bio_access = access(&schema, "demo.Person", "bio");
    assert_eq!(bio_access.value_type(), &ValueType::Sanitized(SanitizedKind::Html));

    let value = read(&schema, "demo.Person", person, "bio");
    assert_eq!(value.as_text(), Some("<b>hi</b>"));
}

#[test]
fn test_extensions() {
    let schema = demo();
    let empty = construct(&schema, "demo.Person", vec![]);
    assert!(read(&schema, "demo.Person", empty.clone(), "rank").is_null());
    assert!(read(&schema, "demo.Person", empty.clone(), "badge").is_null());
    assert!(matches!(
        read(&schema, "demo.Person", empty, "weight"),
        Value::Double(w) if w == 1.5
    ));

    let person = construct(
        &schema,
        "demo.Person",
        vec![
            ("rank", TypedValue::long(3)),
            ("badge", TypedValue::text("gold")),
            ("mood", TypedValue::long(2)),
            ("weight", TypedValue::double(80.5)),
            ("verified", TypedValue::bool(true)),
            ("serial", TypedValue::text("-17")),
        ],
    );
    let read_ext = |field: &str| read(&schema, "demo.Person", person.clone(), field);
    assert_eq!(read_ext("rank").as_long(), Some(3));
    assert_eq!(read_ext("badge").as_text(), Some("gold"));
    assert_eq!(read_ext("mood").as_long(), Some(2));
    assert_eq!(read_ext("weight").as_double(), Some(80.5));
    assert_eq!(read_ext("verified").as_bool(), Some(true));
    assert_eq!(read_ext("serial").as_text(), Some("-17"));
}

#[test]
fn test_repeated_field_reads_boxed_list() {
    let schema = demo();
    let tags = TypedValue::list_of(
        ValueType::Text,
        vec![TypedValue::text("a"), TypedValue::text("b"), TypedValue::text("c")],
    )
    .unwrap();
    let person = construct(&schema, "demo.Person", vec![("tags", tags)]);

    let tags_access = access(&schema, "demo.Person", "tags");
    assert_eq!(tags_access.value_type(), &ValueType::list(ValueType::Text));
    assert!(tags_access.is_boxed());

    let items = read(&schema, "demo.Person", person.clone(), "tags")
        .list_items()
        .unwrap();
    let texts: Vec<_> = items.iter().filter_map(|v| v.as_text()).collect();
    assert_eq!(texts, ["a", "b", "c"]);

    let friends = read(&schema, "demo.Person", person, "friends")
        .list_items()
        .unwrap();
    assert!(friends.is_empty());
}

#[test]
fn test_boxed_base() {
    let schema = demo();
    let person = construct(&schema, "demo.Person", vec![("name", TypedValue::text("Cy"))]);
    let boxed = Value::object(Object::Boxed(Boxed::Proto(person)));

    let base = TypedValue::input(ValueType::Message("demo.Person".to_string()), true, false).unwrap();
    let seq = Codegen::new(&schema)
        .field_access("demo.Person", base, "name")
        .unwrap();
    let value = Machine::new(&schema)
        .run(seq.code(), vec![boxed])
        .unwrap()
        .unwrap();
    assert_eq!(value.as_text(), Some("Cy"));
}

#[test]
fn test_access_errors() {
    let schema = demo();
    let codegen = Codegen::new(&schema);
    let base = || TypedValue::input(ValueType::Message("demo.Person".to_string()), false, false).unwrap();

    assert_eq!(
        codegen.field_access("demo.Nobody", base(), "name").unwrap_err(),
        CodegenError::UnknownMessage("demo.Nobody".to_string())
    );
    assert_eq!(
        codegen.field_access("demo.Person", base(), "shoe_size").unwrap_err(),
        CodegenError::UnknownField {
            message: "demo.Person".to_string(),
            field: "shoe_size".to_string(),
        }
    );
    assert!(matches!(
        codegen.field_access("modern.Account", base(), "handle"),
        Err(CodegenError::BaseMismatch { .. })
    ));
}

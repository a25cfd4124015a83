//! Tests for quill-ir.

use crate::{
    BoxedKind, CodeBuilder, Constant, EmitError, MethodRef, NativeType, Op, RefType, Test,
};

fn has_age() -> MethodRef {
    MethodRef::instance(
        RefType::Message("demo.Person".into()),
        "has_age",
        vec![],
        Some(NativeType::Bool),
    )
}

fn get_age() -> MethodRef {
    MethodRef::instance(
        RefType::Message("demo.Person".into()),
        "get_age",
        vec![],
        Some(NativeType::Int),
    )
}

fn box_int() -> MethodRef {
    MethodRef::static_method(
        RefType::Boxed(BoxedKind::Int),
        "for_value",
        vec![NativeType::Long],
        Some(NativeType::boxed(BoxedKind::Int)),
    )
}

#[test]
fn test_invoke_checks_receiver() {
    let mut b = CodeBuilder::new();
    b.push_const(Constant::Text("nope".into()));
    let err = b.invoke(&get_age()).unwrap_err();
    assert!(matches!(err, EmitError::TypeMismatch { .. }));
}

#[test]
fn test_underflow() {
    let mut b = CodeBuilder::new();
    assert!(matches!(b.pop(), Err(EmitError::StackUnderflow { .. })));
    assert!(matches!(b.swap(), Err(EmitError::StackUnderflow { .. })));
}

#[test]
fn test_presence_branch_merges_to_boxed() {
    let mut b = CodeBuilder::with_inputs(vec![NativeType::message("demo.Person")]);
    b.dup().unwrap();
    b.invoke(&has_age()).unwrap();
    b.branch(
        Test::IsTrue,
        |b| -> Result<(), EmitError> {
            b.invoke(&get_age())?;
            b.convert(NativeType::Long)?;
            b.invoke(&box_int())
        },
        |b| {
            b.pop()?;
            b.push_null();
            Ok(())
        },
    )
    .unwrap();

    let seq = b.finish_expression(false).unwrap();
    assert_eq!(seq.output(), Some(&NativeType::boxed(BoxedKind::Int)));
    assert_eq!(seq.inputs(), &[NativeType::message("demo.Person")]);
    assert!(!seq.is_non_null());
}

#[test]
fn test_branch_rejects_primitive_against_null() {
    let mut b = CodeBuilder::with_inputs(vec![NativeType::message("demo.Person")]);
    b.dup().unwrap();
    b.invoke(&has_age()).unwrap();
    let err = b
        .branch(
            Test::IsTrue,
            |b| b.invoke(&get_age()),
            |b| {
                b.pop()?;
                b.push_null();
                Ok(())
            },
        )
        .unwrap_err();
    assert!(matches!(err, EmitError::BranchMismatch { .. }));
}

#[test]
fn test_loop_body_must_be_neutral() {
    let mut b = CodeBuilder::new();
    let index = b.declare_local("index", NativeType::Int);
    b.push_const(Constant::Int(0));
    b.store(&index).unwrap();
    let err = b
        .while_loop(
            |b| {
                b.load(&index);
                b.push_const(Constant::Int(3));
                Ok(())
            },
            Test::IntLt,
            |b| {
                b.load(&index);
                Ok::<(), EmitError>(())
            },
        )
        .unwrap_err();
    assert!(matches!(err, EmitError::NotNeutral { what: "loop body", .. }));
}

#[test]
fn test_scope_releases_locals() {
    let mut b = CodeBuilder::new();
    b.scope(|b| {
        let a = b.declare_local("a", NativeType::Int);
        let c = b.declare_local("c", NativeType::Int);
        assert_eq!((a.index, c.index), (0, 1));
        Ok::<(), EmitError>(())
    })
    .unwrap();
    let reused = b.declare_local("d", NativeType::Int);
    assert_eq!(reused.index, 0);
    b.push_const(Constant::Long(1));
    let seq = b.finish_expression(true).unwrap();
    assert_eq!(seq.max_locals(), 2);
}

#[test]
fn test_region_locals_belong_to_enclosing_scope() {
    let mut b = CodeBuilder::with_inputs(vec![NativeType::Bool]);
    b.scope(|b| {
        b.branch(
            Test::IsTrue,
            |b| {
                let flag = b.declare_local("flag", NativeType::Int);
                assert_eq!(flag.index, 0);
                Ok(())
            },
            |_b| -> Result<(), EmitError> { Ok(()) },
        )?;
        b.while_loop(
            |b| {
                b.push_const(Constant::Bool(false));
                Ok(())
            },
            Test::IsTrue,
            |b| {
                let step = b.declare_local("step", NativeType::Int);
                assert_eq!(step.index, 1);
                Ok::<(), EmitError>(())
            },
        )?;
        let after = b.declare_local("after", NativeType::Int);
        assert_eq!(after.index, 2);
        Ok::<(), EmitError>(())
    })
    .unwrap();
    b.push_const(Constant::Long(1));
    let seq = b.finish_expression(true).unwrap();
    assert_eq!(seq.max_locals(), 3);

    let Some(Op::Scope(scope)) = seq.ops().first() else {
        panic!("expected a scope, found {:?}", seq.ops());
    };
    let names: Vec<_> = scope.locals.iter().map(|decl| decl.name.as_str()).collect();
    assert_eq!(names, ["flag", "step", "after"]);
    let listing = seq.to_string();
    assert!(listing.contains(".local 0 flag : int"));
    assert!(listing.contains(".release 1"));
}

#[test]
fn test_append_relocates_locals() {
    let mut inner = CodeBuilder::new();
    let tmp = inner.declare_local("tmp", NativeType::Long);
    inner.push_const(Constant::Long(7));
    inner.store(&tmp).unwrap();
    inner.load(&tmp);
    let inner = inner.finish_expression(true).unwrap();

    let mut outer = CodeBuilder::new();
    let _held = outer.declare_local("held", NativeType::Int);
    outer.append(&inner).unwrap();
    let seq = outer.finish_expression(true).unwrap();

    assert!(seq.contains(|op| matches!(op, Op::Store(local) if local.index == 1)));
    assert!(!seq.contains(|op| matches!(op, Op::Store(local) if local.index == 0)));
    assert_eq!(seq.max_locals(), 2);
}

#[test]
fn test_checkcast_upcast_is_free() {
    let mut b = CodeBuilder::new();
    b.push_const(Constant::Text("x".into()));
    b.check_cast(RefType::Object).unwrap();
    let seq = b.finish_expression(true).unwrap();
    assert_eq!(seq.len(), 1);
    assert_eq!(seq.output(), Some(&NativeType::text()));
}

#[test]
fn test_listing_flattens_branches() {
    let mut b = CodeBuilder::with_inputs(vec![NativeType::text()]);
    b.dup().unwrap();
    b.branch(
        Test::IsNull,
        |_b| -> Result<(), EmitError> { Ok(()) },
        |b| {
            b.pop()?;
            b.push_const(Constant::Text("set".into()));
            Ok(())
        },
    )
    .unwrap();
    let seq = b.finish_expression(false).unwrap();
    let listing = seq.to_string();
    assert!(listing.contains("ifnull L0"));
    assert!(listing.contains("goto L1"));
    assert!(listing.contains("L0:"));
    assert!(listing.contains("L1:"));
}

#[test]
fn test_sequence_serializes() {
    let mut b = CodeBuilder::new();
    b.push_const(Constant::Bool(true));
    let seq = b.finish_expression(true).unwrap();
    let json = serde_json::to_value(&seq).unwrap();
    assert_eq!(json["output"], serde_json::json!("bool"));
}

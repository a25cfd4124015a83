//! `field=literal` arguments for `quill construct`.
//!
//! A literal is read according to the logical type of the field it is
//! assigned to. `null` is accepted for every field. Repeated fields take a
//! bracketed, comma-separated list: `tags=[a, b, c]`.

use rhizome_quill_codegen::{CodegenError, FieldShape, TypedValue, ValueType};
use rhizome_quill_schema::Schema;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LiteralError {
    #[error("expected FIELD=LITERAL, found {0:?}")]
    Syntax(String),

    #[error("{message} has no field {field}")]
    UnknownField { message: String, field: String },

    #[error("cannot read {literal:?} as {ty}")]
    Invalid { literal: String, ty: ValueType },

    #[error("{0} literals are not supported; leave the field unset")]
    Unsupported(ValueType),

    #[error(transparent)]
    Codegen(#[from] CodegenError),
}

/// Splits `field=literal`.
pub fn split_argument(argument: &str) -> Result<(&str, &str), LiteralError> {
    argument
        .split_once('=')
        .map(|(field, literal)| (field.trim(), literal.trim()))
        .filter(|(field, _)| !field.is_empty())
        .ok_or_else(|| LiteralError::Syntax(argument.to_string()))
}

/// Parses `literal` as a value for `field` of `message`.
pub fn parse_argument(
    schema: &Schema,
    message: &str,
    field: &str,
    literal: &str,
) -> Result<TypedValue, LiteralError> {
    let descriptor = schema
        .field(message, field)
        .ok_or_else(|| LiteralError::UnknownField {
            message: message.to_string(),
            field: field.to_string(),
        })?;
    if literal == "null" {
        return Ok(TypedValue::null());
    }
    let shape = FieldShape::classify(schema, descriptor)?;
    let element = shape.coercion().logical_type();
    if !matches!(shape, FieldShape::Repeated { .. }) {
        return parse_scalar(&element, literal);
    }

    let inner = literal
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(literal)
        .trim();
    if inner.is_empty() {
        return Ok(TypedValue::empty_list()?);
    }
    let items = inner
        .split(',')
        .map(|item| parse_scalar(&element, item.trim()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TypedValue::list_of(element, items)?)
}

fn parse_scalar(ty: &ValueType, literal: &str) -> Result<TypedValue, LiteralError> {
    let invalid = || LiteralError::Invalid {
        literal: literal.to_string(),
        ty: ty.clone(),
    };
    let value = match ty {
        ValueType::Bool => TypedValue::bool(literal.parse().map_err(|_| invalid())?),
        ValueType::Int => TypedValue::long(literal.parse().map_err(|_| invalid())?),
        ValueType::Float => TypedValue::double(literal.parse().map_err(|_| invalid())?),
        ValueType::Text => TypedValue::text(unquote(literal)),
        ValueType::Sanitized(kind) => TypedValue::sanitized(*kind, unquote(literal))?,
        other => return Err(LiteralError::Unsupported(other.clone())),
    };
    Ok(value)
}

fn unquote(literal: &str) -> &str {
    literal
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(literal)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEMO: &str = include_str!("../../quill-schema/testdata/demo.toml");

    fn parse(field: &str, literal: &str) -> Result<TypedValue, LiteralError> {
        let schema = Schema::from_toml_str(DEMO).unwrap();
        parse_argument(&schema, "demo.Person", field, literal)
    }

    #[test]
    fn test_split_argument() {
        assert_eq!(split_argument("age=41").unwrap(), ("age", "41"));
        assert_eq!(split_argument("name = a=b").unwrap(), ("name", "a=b"));
        assert!(matches!(split_argument("age"), Err(LiteralError::Syntax(_))));
        assert!(matches!(split_argument("=1"), Err(LiteralError::Syntax(_))));
    }

    #[test]
    fn test_scalars_follow_field_type() {
        assert_eq!(parse("age", "41").unwrap().value_type(), &ValueType::Int);
        assert_eq!(parse("score", "2.5").unwrap().value_type(), &ValueType::Float);
        assert_eq!(parse("name", "\"Ada\"").unwrap().value_type(), &ValueType::Text);
        assert_eq!(parse("id_text", "12").unwrap().value_type(), &ValueType::Text);
        assert_eq!(parse("friend", "null").unwrap().value_type(), &ValueType::Null);
        assert!(matches!(parse("age", "old"), Err(LiteralError::Invalid { .. })));
        assert!(matches!(parse("friend", "x"), Err(LiteralError::Unsupported(_))));
    }

    #[test]
    fn test_lists() {
        assert_eq!(
            parse("lucky_numbers", "[1, 2, 3]").unwrap().value_type(),
            &ValueType::list(ValueType::Int)
        );
        assert_eq!(parse("tags", "[]").unwrap().value_type(), &ValueType::EmptyList);
    }
}

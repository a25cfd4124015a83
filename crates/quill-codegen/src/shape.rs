//! Per-field classification driving both generators.

use crate::coerce::Coercion;
use crate::error::CodegenError;
use rhizome_quill_schema::{FieldDescriptor, FieldKind, Revision, Schema};

/// Whether reading a field must first test that it is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresencePolicy {
    /// Explicit default, or a modern non-message field.
    NoCheck,
    /// Legacy field without a default.
    AlwaysCheck,
    /// Modern message-typed field.
    CheckIfMessage,
}

impl PresencePolicy {
    pub fn of(field: &FieldDescriptor) -> Self {
        if field.has_default() {
            PresencePolicy::NoCheck
        } else if field.revision == Revision::Legacy {
            PresencePolicy::AlwaysCheck
        } else if matches!(field.kind, FieldKind::Message(_)) {
            PresencePolicy::CheckIfMessage
        } else {
            PresencePolicy::NoCheck
        }
    }

    pub fn checks(self) -> bool {
        self != PresencePolicy::NoCheck
    }
}

/// How presence is tested for a checked singular field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceTest {
    /// `has_<f>()`.
    Hasser,
    /// `get_<oneof>_case().get_number() == number`.
    OneofCase { oneof: String, number: i32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldShape {
    Repeated {
        element: Coercion,
        extension: bool,
    },
    Extension {
        coercion: Coercion,
        presence: PresencePolicy,
    },
    Singular {
        coercion: Coercion,
        presence: PresencePolicy,
        test: PresenceTest,
    },
}

impl FieldShape {
    pub fn classify(schema: &Schema, field: &FieldDescriptor) -> Result<Self, CodegenError> {
        let coercion = Coercion::of(field, schema)?;
        if field.is_repeated() {
            return Ok(FieldShape::Repeated {
                element: coercion,
                extension: field.is_extension(),
            });
        }
        if field.is_extension() {
            let presence = if field.has_default() {
                PresencePolicy::NoCheck
            } else {
                PresencePolicy::AlwaysCheck
            };
            return Ok(FieldShape::Extension { coercion, presence });
        }
        let test = match &field.oneof {
            Some(oneof) => PresenceTest::OneofCase {
                oneof: oneof.clone(),
                number: field.number,
            },
            None => PresenceTest::Hasser,
        };
        Ok(FieldShape::Singular {
            coercion,
            presence: PresencePolicy::of(field),
            test,
        })
    }

    /// Coercion applied to the field's values, or to each element.
    pub fn coercion(&self) -> &Coercion {
        match self {
            FieldShape::Repeated { element, .. } => element,
            FieldShape::Extension { coercion, .. } | FieldShape::Singular { coercion, .. } => {
                coercion
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEMO: &str = include_str!("../../quill-schema/testdata/demo.toml");

    fn shape(message: &str, field: &str) -> FieldShape {
        let schema = Schema::from_toml_str(DEMO).unwrap();
        let desc = schema.field(message, field).unwrap().clone();
        FieldShape::classify(&schema, &desc).unwrap()
    }

    #[test]
    fn test_presence_policies() {
        assert!(matches!(
            shape("demo.Person", "age"),
            FieldShape::Singular { presence: PresencePolicy::AlwaysCheck, test: PresenceTest::Hasser, .. }
        ));
        assert!(matches!(
            shape("demo.Person", "level"),
            FieldShape::Singular { presence: PresencePolicy::NoCheck, .. }
        ));
        assert!(matches!(
            shape("modern.Account", "balance"),
            FieldShape::Singular { presence: PresencePolicy::NoCheck, .. }
        ));
        assert!(matches!(
            shape("modern.Account", "owner"),
            FieldShape::Singular { presence: PresencePolicy::CheckIfMessage, .. }
        ));
    }

    #[test]
    fn test_oneof_and_extensions() {
        assert_eq!(
            shape("demo.Person", "phone"),
            FieldShape::Singular {
                coercion: Coercion::Int64,
                presence: PresencePolicy::AlwaysCheck,
                test: PresenceTest::OneofCase {
                    oneof: "contact".to_string(),
                    number: 18,
                },
            }
        );
        assert!(matches!(
            shape("demo.Person", "weight"),
            FieldShape::Extension { presence: PresencePolicy::NoCheck, .. }
        ));
        assert!(matches!(
            shape("demo.Person", "rank"),
            FieldShape::Extension { presence: PresencePolicy::AlwaysCheck, .. }
        ));
        assert!(matches!(
            shape("demo.Person", "aliases"),
            FieldShape::Repeated { extension: true, .. }
        ));
    }
}

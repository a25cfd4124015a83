//! TOML schema format and resolution into descriptors.
//!
//! ```toml
//! [[file]]
//! package = "demo"
//! revision = "legacy"
//!
//! [[file.enum]]
//! name = "Color"
//! values = [{ name = "RED", number = 1 }]
//!
//! [[file.message]]
//! name = "Person"
//! extendable = true
//!
//! [[file.message.field]]
//! name = "color"
//! number = 1
//! kind = "enum"
//! type_name = "Color"
//!
//! [[file.extension]]
//! extendee = "demo.Person"
//! name = "rank"
//! number = 100
//! kind = "int32"
//! ```

use crate::descriptor::{
    DefaultValue, EnumDescriptor, EnumValue, ExtensionScope, FieldDescriptor, FieldKind, Label,
    MessageDescriptor, Revision,
};
use crate::error::SchemaError;
use crate::sanitized::SanitizedKind;
use crate::schema::Schema;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Deserialize)]
pub(crate) struct SchemaFile {
    #[serde(default)]
    file: Vec<RawFile>,
}

#[derive(Debug, Deserialize)]
struct RawFile {
    package: String,
    #[serde(default)]
    revision: Revision,
    /// Name of the top-level extension holder.
    #[serde(default = "default_holder")]
    holder: String,
    #[serde(default)]
    message: Vec<RawMessage>,
    #[serde(default, rename = "enum")]
    enums: Vec<RawEnum>,
    #[serde(default)]
    extension: Vec<RawExtension>,
}

fn default_holder() -> String {
    "Extensions".to_string()
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    name: String,
    #[serde(default)]
    extendable: bool,
    #[serde(default)]
    field: Vec<RawField>,
}

#[derive(Debug, Deserialize)]
struct RawEnum {
    name: String,
    values: Vec<EnumValue>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum KindTag {
    Bool,
    Int32,
    Int64,
    Float,
    Double,
    Text,
    Bytes,
    Enum,
    Message,
}

#[derive(Debug, Deserialize)]
struct RawField {
    name: String,
    number: i32,
    kind: KindTag,
    #[serde(default)]
    type_name: Option<String>,
    #[serde(default)]
    label: Label,
    #[serde(default)]
    oneof: Option<String>,
    #[serde(default)]
    default: Option<toml::Value>,
    #[serde(default)]
    numeric_as_text: bool,
}

#[derive(Debug, Deserialize)]
struct RawExtension {
    extendee: String,
    /// Message the identifier is nested in; top level when absent.
    #[serde(default)]
    scope: Option<String>,
    #[serde(flatten)]
    field: RawField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeTag {
    Message,
    Enum,
}

/// Names visible during resolution.
struct Scope {
    types: HashMap<String, TypeTag>,
}

impl Scope {
    /// Resolves `name` as written in `package`: an exact full name first,
    /// then relative to the package.
    fn resolve(
        &self,
        package: &str,
        name: &str,
        want: TypeTag,
        field: &str,
    ) -> Result<String, SchemaError> {
        let candidates = [name.to_string(), format!("{}.{}", package, name)];
        candidates
            .into_iter()
            .find(|candidate| self.types.get(candidate) == Some(&want))
            .ok_or_else(|| SchemaError::UnresolvedType {
                field: field.to_string(),
                name: name.to_string(),
            })
    }
}

fn sanitized_messages() -> Vec<MessageDescriptor> {
    SanitizedKind::ALL
        .iter()
        .map(|kind| {
            let full_name = kind.message_name();
            MessageDescriptor {
                fields: vec![FieldDescriptor {
                    name: kind.wrapped_field(),
                    number: 1,
                    kind: FieldKind::Text,
                    label: Label::Singular,
                    revision: Revision::Legacy,
                    containing_type: full_name.clone(),
                    oneof: None,
                    default: None,
                    numeric_as_text: false,
                    extension: None,
                }],
                full_name,
                revision: Revision::Legacy,
                extendable: false,
                oneofs: Vec::new(),
            }
        })
        .collect()
}

impl SchemaFile {
    pub(crate) fn resolve(self) -> Result<Schema, SchemaError> {
        let builtins = sanitized_messages();
        let mut scope = Scope {
            types: HashMap::new(),
        };
        for message in &builtins {
            scope.types.insert(message.full_name.clone(), TypeTag::Message);
        }
        for file in &self.file {
            let declared = file
                .message
                .iter()
                .map(|m| (&m.name, TypeTag::Message))
                .chain(file.enums.iter().map(|e| (&e.name, TypeTag::Enum)));
            for (name, tag) in declared {
                let full_name = format!("{}.{}", file.package, name);
                if scope.types.insert(full_name.clone(), tag).is_some() {
                    return Err(SchemaError::DuplicateType(full_name));
                }
            }
        }

        let mut enums = BTreeMap::new();
        for file in &self.file {
            for raw in &file.enums {
                let full_name = format!("{}.{}", file.package, raw.name);
                if raw.values.is_empty() {
                    return Err(SchemaError::EmptyEnum(full_name));
                }
                let mut seen = HashSet::new();
                for value in &raw.values {
                    if !seen.insert(&value.name) {
                        return Err(SchemaError::DuplicateField {
                            message: full_name.clone(),
                            field: value.name.clone(),
                        });
                    }
                }
                enums.insert(
                    full_name.clone(),
                    EnumDescriptor {
                        full_name,
                        revision: file.revision,
                        values: raw.values.clone(),
                    },
                );
            }
        }

        let mut messages: BTreeMap<String, MessageDescriptor> = builtins
            .into_iter()
            .map(|message| (message.full_name.clone(), message))
            .collect();
        for file in &self.file {
            for raw in &file.message {
                let message = resolve_message(file, raw, &scope, &enums)?;
                messages.insert(message.full_name.clone(), message);
            }
        }

        let mut extensions: Vec<FieldDescriptor> = Vec::new();
        for file in &self.file {
            for raw in &file.extension {
                let field_label = format!("{}.{}", raw.extendee, raw.field.name);
                let extendee =
                    scope.resolve(&file.package, &raw.extendee, TypeTag::Message, &field_label)?;
                let target =
                    messages
                        .get(&extendee)
                        .ok_or_else(|| SchemaError::UnresolvedType {
                            field: field_label.clone(),
                            name: raw.extendee.clone(),
                        })?;
                if !target.extendable {
                    return Err(SchemaError::NotExtendable {
                        field: field_label,
                        message: extendee,
                    });
                }
                let ext_scope = match &raw.scope {
                    Some(name) => ExtensionScope::Message(scope.resolve(
                        &file.package,
                        name,
                        TypeTag::Message,
                        &field_label,
                    )?),
                    None => ExtensionScope::File(format!("{}.{}", file.package, file.holder)),
                };
                let mut field = resolve_field(file, &extendee, &raw.field, &scope, &enums)?;
                if field.oneof.is_some() {
                    return Err(SchemaError::ExtensionOneof {
                        field: field.full_name(),
                    });
                }
                let clashes = target.field(&field.name).is_some()
                    || extensions
                        .iter()
                        .any(|ext| ext.containing_type == extendee && ext.name == field.name);
                if clashes {
                    return Err(SchemaError::DuplicateField {
                        message: extendee,
                        field: field.name,
                    });
                }
                let number_taken = target.field_by_number(field.number).is_some()
                    || extensions
                        .iter()
                        .any(|ext| ext.containing_type == extendee && ext.number == field.number);
                if number_taken {
                    return Err(SchemaError::DuplicateNumber {
                        message: extendee,
                        number: field.number,
                    });
                }
                field.extension = Some(ext_scope);
                extensions.push(field);
            }
        }

        Ok(Schema {
            messages,
            enums,
            extensions,
        })
    }
}

fn resolve_message(
    file: &RawFile,
    raw: &RawMessage,
    scope: &Scope,
    enums: &BTreeMap<String, EnumDescriptor>,
) -> Result<MessageDescriptor, SchemaError> {
    let full_name = format!("{}.{}", file.package, raw.name);
    let mut fields: Vec<FieldDescriptor> = Vec::with_capacity(raw.field.len());
    let mut oneofs: Vec<String> = Vec::new();
    for raw_field in &raw.field {
        let field = resolve_field(file, &full_name, raw_field, scope, enums)?;
        if fields.iter().any(|f| f.name == field.name) {
            return Err(SchemaError::DuplicateField {
                message: full_name,
                field: field.name,
            });
        }
        if fields.iter().any(|f| f.number == field.number) {
            return Err(SchemaError::DuplicateNumber {
                message: full_name,
                number: field.number,
            });
        }
        if let Some(oneof) = &field.oneof {
            if field.is_repeated() {
                return Err(SchemaError::RepeatedOneof {
                    field: field.full_name(),
                });
            }
            if !oneofs.contains(oneof) {
                oneofs.push(oneof.clone());
            }
        }
        fields.push(field);
    }
    Ok(MessageDescriptor {
        full_name,
        revision: file.revision,
        extendable: raw.extendable,
        fields,
        oneofs,
    })
}

fn resolve_field(
    file: &RawFile,
    containing_type: &str,
    raw: &RawField,
    scope: &Scope,
    enums: &BTreeMap<String, EnumDescriptor>,
) -> Result<FieldDescriptor, SchemaError> {
    let full_name = format!("{}.{}", containing_type, raw.name);
    if raw.number <= 0 {
        return Err(SchemaError::InvalidNumber {
            field: full_name,
            number: raw.number,
        });
    }

    let type_name = |kind: &'static str| {
        raw.type_name
            .as_deref()
            .ok_or_else(|| SchemaError::MissingTypeName {
                field: full_name.clone(),
                kind,
            })
    };
    let kind = match raw.kind {
        KindTag::Bool => FieldKind::Bool,
        KindTag::Int32 => FieldKind::Int32,
        KindTag::Int64 => FieldKind::Int64,
        KindTag::Float => FieldKind::Float,
        KindTag::Double => FieldKind::Double,
        KindTag::Text => FieldKind::Text,
        KindTag::Bytes => FieldKind::Bytes,
        KindTag::Enum => FieldKind::Enum(scope.resolve(
            &file.package,
            type_name("enum")?,
            TypeTag::Enum,
            &full_name,
        )?),
        KindTag::Message => FieldKind::Message(scope.resolve(
            &file.package,
            type_name("message")?,
            TypeTag::Message,
            &full_name,
        )?),
    };

    if raw.numeric_as_text && kind != FieldKind::Int64 {
        return Err(SchemaError::NumericAsText { field: full_name });
    }

    let default = match &raw.default {
        None => None,
        Some(value) => Some(resolve_default(&full_name, &kind, raw.label, value, enums)?),
    };

    Ok(FieldDescriptor {
        name: raw.name.clone(),
        number: raw.number,
        kind,
        label: raw.label,
        revision: file.revision,
        containing_type: containing_type.to_string(),
        oneof: raw.oneof.clone(),
        default,
        numeric_as_text: raw.numeric_as_text,
        extension: None,
    })
}

fn resolve_default(
    field: &str,
    kind: &FieldKind,
    label: Label,
    value: &toml::Value,
    enums: &BTreeMap<String, EnumDescriptor>,
) -> Result<DefaultValue, SchemaError> {
    let invalid = |reason: String| SchemaError::InvalidDefault {
        field: field.to_string(),
        reason,
    };
    if label == Label::Repeated {
        return Err(invalid("repeated fields have no default".to_string()));
    }
    let mismatch = || invalid(format!("{} is not a valid {} value", value, kind.name()));
    match (kind, value) {
        (FieldKind::Bool, toml::Value::Boolean(b)) => Ok(DefaultValue::Bool(*b)),
        (FieldKind::Int32, toml::Value::Integer(n)) => i32::try_from(*n)
            .map(|n| DefaultValue::Int(n.into()))
            .map_err(|_| invalid(format!("{} does not fit in 32 bits", n))),
        (FieldKind::Int64, toml::Value::Integer(n)) => Ok(DefaultValue::Int(*n)),
        (FieldKind::Float | FieldKind::Double, toml::Value::Float(x)) => {
            Ok(DefaultValue::Float(*x))
        }
        (FieldKind::Float | FieldKind::Double, toml::Value::Integer(n)) => {
            Ok(DefaultValue::Float(*n as f64))
        }
        (FieldKind::Text | FieldKind::Bytes, toml::Value::String(s)) => {
            Ok(DefaultValue::Text(s.clone()))
        }
        (FieldKind::Enum(name), toml::Value::String(s)) => enums
            .get(name)
            .and_then(|desc| desc.value_by_name(s))
            .map(|v| DefaultValue::Enum(v.number))
            .ok_or_else(|| invalid(format!("{} has no value named {}", name, s))),
        (FieldKind::Message(_), _) => Err(invalid("message fields have no default".to_string())),
        _ => Err(mismatch()),
    }
}

//=====================================================
// File: vm/value.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Runtime values for the CauseLang VM
// Objective: Values, objects, and closures with runtime type checks and a
//            JSON view for embedders
//=====================================================

use crate::ast::SourcePosition;
use crate::bytecode::{CompiledFile, NativeFunction};
use crate::types::{CanonicalLangType, ErrorLangType, PrimitiveKind, ValueLangType};
use serde_json::{Map, Value as JsonValue, json};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RuntimeObject {
    pub type_descriptor: CanonicalLangType,
    pub values: Vec<RuntimeValue>,
}

impl RuntimeObject {
    pub fn field(&self, name: &str) -> Option<&RuntimeValue> {
        self.type_descriptor
            .field_index(name)
            .and_then(|index| self.values.get(index))
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeFunction {
    pub name: Option<String>,
    pub file: Arc<CompiledFile>,
    pub procedure_index: usize,
    pub function_type: ValueLangType,
    pub captured_values: Vec<RuntimeValue>,
}

#[derive(Debug, Clone)]
pub enum RuntimeValue {
    Action,
    BadValue {
        position: SourcePosition,
        error: ErrorLangType,
    },
    Text(String),
    Number(f64),
    Object(Arc<RuntimeObject>),
    TypeConstraint(ValueLangType),
    NativeFunction(NativeFunction),
    Function(Arc<RuntimeFunction>),
}

impl PartialEq for RuntimeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RuntimeValue::Action, RuntimeValue::Action) => true,
            (
                RuntimeValue::BadValue {
                    position: a_position,
                    error: a_error,
                },
                RuntimeValue::BadValue {
                    position: b_position,
                    error: b_error,
                },
            ) => a_position == b_position && a_error == b_error,
            (RuntimeValue::Text(a), RuntimeValue::Text(b)) => a == b,
            (RuntimeValue::Number(a), RuntimeValue::Number(b)) => a == b,
            (RuntimeValue::Object(a), RuntimeValue::Object(b)) => {
                Arc::ptr_eq(a, b)
                    || (a.type_descriptor.id() == b.type_descriptor.id() && a.values == b.values)
            }
            (RuntimeValue::TypeConstraint(a), RuntimeValue::TypeConstraint(b)) => a == b,
            (RuntimeValue::NativeFunction(a), RuntimeValue::NativeFunction(b)) => a == b,
            (RuntimeValue::Function(a), RuntimeValue::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl RuntimeValue {
    pub fn text(value: impl Into<String>) -> Self {
        RuntimeValue::Text(value.into())
    }

    pub fn is_bad_value(&self) -> bool {
        matches!(self, RuntimeValue::BadValue { .. })
    }

    pub fn as_object(&self) -> Option<&Arc<RuntimeObject>> {
        match self {
            RuntimeValue::Object(object) => Some(object),
            _ => None,
        }
    }

    /// The canonical type of a signal value: a signal object, or a unique
    /// signal type standing as its own value.
    pub fn signal_type(&self) -> Option<&CanonicalLangType> {
        match self {
            RuntimeValue::Object(object) if object.type_descriptor.is_signal() => {
                Some(&object.type_descriptor)
            }
            RuntimeValue::TypeConstraint(ValueLangType::Instance(canonical))
                if canonical.is_signal() && canonical.is_unique() =>
            {
                Some(canonical)
            }
            _ => None,
        }
    }

    /// Runtime counterpart of `ValueLangType::is_assignable_to`.
    pub fn is_assignable_to(&self, constraint: &ValueLangType) -> bool {
        match constraint {
            ValueLangType::Anything => true,
            ValueLangType::NeverContinues => false,
            ValueLangType::Action => matches!(self, RuntimeValue::Action),
            ValueLangType::BadValue => self.is_bad_value(),
            ValueLangType::Primitive(PrimitiveKind::Text) => matches!(self, RuntimeValue::Text(_)),
            ValueLangType::Primitive(PrimitiveKind::Number) => {
                matches!(self, RuntimeValue::Number(_))
            }
            ValueLangType::AnySignal => self.signal_type().is_some(),
            ValueLangType::Instance(expected) => match self {
                RuntimeValue::Object(object) => object.type_descriptor.id() == expected.id(),
                RuntimeValue::TypeConstraint(ValueLangType::Instance(canonical)) => {
                    canonical.is_unique() && canonical.id() == expected.id()
                }
                _ => false,
            },
            ValueLangType::Option(options) => options.iter().any(|option| {
                option
                    .resolved()
                    .is_some_and(|option| self.is_assignable_to(option))
            }),
            ValueLangType::Function { .. } => match self {
                RuntimeValue::Function(function) => {
                    function.function_type.is_assignable_to(constraint)
                }
                RuntimeValue::NativeFunction(native) => {
                    native.function_type.is_assignable_to(constraint)
                }
                _ => false,
            },
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            RuntimeValue::Action => json!({ "#type": "Action" }),
            RuntimeValue::BadValue { position, error } => json!({
                "#type": "BadValue",
                "position": position.to_string(),
                "error": error.message(),
            }),
            RuntimeValue::Text(text) => JsonValue::String(text.clone()),
            RuntimeValue::Number(number) => serde_json::Number::from_f64(*number)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            RuntimeValue::Object(object) => {
                let mut map = Map::new();
                map.insert(
                    "#type".to_string(),
                    JsonValue::String(object.type_descriptor.id().to_string()),
                );
                for (field, value) in object.type_descriptor.fields().iter().zip(&object.values) {
                    map.insert(field.name.clone(), value.to_json());
                }
                JsonValue::Object(map)
            }
            RuntimeValue::TypeConstraint(ValueLangType::Instance(canonical))
                if canonical.is_unique() =>
            {
                json!({ "#type": canonical.id().to_string() })
            }
            RuntimeValue::TypeConstraint(constraint) => json!({
                "#type": "TypeConstraint",
                "constraint": constraint.to_string(),
            }),
            RuntimeValue::NativeFunction(native) => json!({
                "#type": "Function",
                "name": native.qualified_name(),
            }),
            RuntimeValue::Function(function) => json!({
                "#type": "Function",
                "name": function.name.clone(),
            }),
        }
    }
}

impl fmt::Display for RuntimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeValue::Text(text) => f.write_str(text),
            RuntimeValue::Number(number) => write!(f, "{number}"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

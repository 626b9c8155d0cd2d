//=====================================================
// File: types/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: CauseLang type model
// Objective: Value, constraint, canonical, and error types shared by the
//            resolver, compiler, and virtual machine
//=====================================================

mod errors;

pub use errors::{ErrorLangType, IncompatibleType};

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Text,
    Number,
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveKind::Text => f.write_str("Text"),
            PrimitiveKind::Number => f.write_str("Number"),
        }
    }
}

/// Identity of a nominal type: declaring file, optional parent, name, and a
/// number that separates same-named declarations within one file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CanonicalLangTypeId {
    pub path: String,
    pub parent_name: Option<String>,
    pub name: String,
    pub number: u8,
}

impl CanonicalLangTypeId {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            parent_name: None,
            name: name.into(),
            number: 0,
        }
    }
}

impl fmt::Display for CanonicalLangTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.path)?;
        if let Some(parent) = &self.parent_name {
            write!(f, "{parent}_")?;
        }
        f.write_str(&self.name)?;
        if self.number > 0 {
            write!(f, "{}", self.number)?;
        }
        Ok(())
    }
}

/// A constraint slot inside another type (field, parameter, return, result).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstraintReference {
    Pending,
    Error(ErrorLangType),
    Resolved(ValueLangType),
}

impl ConstraintReference {
    /// The type of a value that satisfies this constraint.
    pub fn as_value_type(&self) -> LangType {
        match self {
            ConstraintReference::Pending => LangType::Pending,
            ConstraintReference::Error(error) => LangType::Error(error.clone()),
            ConstraintReference::Resolved(value) => LangType::Value(value.clone()),
        }
    }

    pub fn resolved(&self) -> Option<&ValueLangType> {
        match self {
            ConstraintReference::Resolved(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LangParameter {
    pub name: String,
    pub constraint: ConstraintReference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectField {
    pub name: String,
    pub constraint: ConstraintReference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CanonicalLangType {
    Signal {
        id: CanonicalLangTypeId,
        name: String,
        fields: Vec<ObjectField>,
        result: Box<ConstraintReference>,
    },
    Object {
        id: CanonicalLangTypeId,
        name: String,
        fields: Vec<ObjectField>,
    },
}

impl CanonicalLangType {
    pub fn id(&self) -> &CanonicalLangTypeId {
        match self {
            CanonicalLangType::Signal { id, .. } | CanonicalLangType::Object { id, .. } => id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CanonicalLangType::Signal { name, .. } | CanonicalLangType::Object { name, .. } => {
                name
            }
        }
    }

    pub fn fields(&self) -> &[ObjectField] {
        match self {
            CanonicalLangType::Signal { fields, .. }
            | CanonicalLangType::Object { fields, .. } => fields,
        }
    }

    /// A type without fields has exactly one value: its own type reference.
    pub fn is_unique(&self) -> bool {
        self.fields().is_empty()
    }

    pub fn is_signal(&self) -> bool {
        matches!(self, CanonicalLangType::Signal { .. })
    }

    pub fn signal_result(&self) -> Option<&ConstraintReference> {
        match self {
            CanonicalLangType::Signal { result, .. } => Some(result.as_ref()),
            CanonicalLangType::Object { .. } => None,
        }
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields().iter().position(|field| field.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueLangType {
    Primitive(PrimitiveKind),
    Function {
        name: Option<String>,
        return_constraint: Box<ConstraintReference>,
        params: Vec<LangParameter>,
    },
    Instance(CanonicalLangType),
    Option(Vec<ConstraintReference>),
    Action,
    Anything,
    AnySignal,
    NeverContinues,
    BadValue,
}

impl ValueLangType {
    /// Whether a value of type `self` satisfies the constraint `constraint`.
    pub fn is_assignable_to(&self, constraint: &ValueLangType) -> bool {
        if matches!(self, ValueLangType::NeverContinues) {
            return true;
        }
        match constraint {
            ValueLangType::Anything => true,
            ValueLangType::AnySignal => {
                matches!(self, ValueLangType::Instance(canonical) if canonical.is_signal())
            }
            ValueLangType::Option(options) => match self {
                ValueLangType::Option(own_options) => own_options.iter().all(|own| {
                    own.resolved()
                        .is_some_and(|value| value.is_assignable_to(constraint))
                }),
                _ => options.iter().any(|option| {
                    option
                        .resolved()
                        .is_some_and(|option| self.is_assignable_to(option))
                }),
            },
            ValueLangType::Instance(expected) => {
                matches!(self, ValueLangType::Instance(actual) if actual.id() == expected.id())
            }
            ValueLangType::Primitive(kind) => {
                matches!(self, ValueLangType::Primitive(actual) if actual == kind)
            }
            ValueLangType::Function {
                return_constraint,
                params,
                ..
            } => match self {
                ValueLangType::Function {
                    return_constraint: own_return,
                    params: own_params,
                    ..
                } => {
                    own_return == return_constraint
                        && own_params.len() == params.len()
                        && own_params
                            .iter()
                            .zip(params)
                            .all(|(own, expected)| own.constraint == expected.constraint)
                }
                _ => false,
            },
            ValueLangType::Action => matches!(self, ValueLangType::Action),
            ValueLangType::BadValue => matches!(self, ValueLangType::BadValue),
            ValueLangType::NeverContinues => false,
        }
    }

    pub fn as_signal(&self) -> Option<&CanonicalLangType> {
        match self {
            ValueLangType::Instance(canonical) if canonical.is_signal() => Some(canonical),
            _ => None,
        }
    }
}

impl fmt::Display for ValueLangType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueLangType::Primitive(kind) => write!(f, "{kind}"),
            ValueLangType::Function { name, params, .. } => {
                let names: Vec<&str> = params.iter().map(|param| param.name.as_str()).collect();
                write!(
                    f,
                    "function {}({})",
                    name.as_deref().unwrap_or("<anonymous>"),
                    names.join(", ")
                )
            }
            ValueLangType::Instance(canonical) => write!(f, "{}", canonical.id()),
            ValueLangType::Option(options) => {
                let parts: Vec<String> = options
                    .iter()
                    .map(|option| match option {
                        ConstraintReference::Resolved(value) => value.to_string(),
                        ConstraintReference::Pending => "<pending>".to_string(),
                        ConstraintReference::Error(_) => "<error>".to_string(),
                    })
                    .collect();
                write!(f, "{}", parts.join(" | "))
            }
            ValueLangType::Action => f.write_str("Action"),
            ValueLangType::Anything => f.write_str("Anything"),
            ValueLangType::AnySignal => f.write_str("AnySignal"),
            ValueLangType::NeverContinues => f.write_str("NeverContinues"),
            ValueLangType::BadValue => f.write_str("BadValue"),
        }
    }
}

/// Resolution state of one slot: what a node is, or what its context requires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LangType {
    Pending,
    Error(ErrorLangType),
    Value(ValueLangType),
    /// A type reference usable as a constraint on other values.
    Constraint(ValueLangType),
}

impl LangType {
    pub fn is_pending(&self) -> bool {
        matches!(self, LangType::Pending)
    }

    pub fn error(&self) -> Option<&ErrorLangType> {
        match self {
            LangType::Error(error) => Some(error),
            _ => None,
        }
    }

    pub fn is_never_continues(&self) -> bool {
        matches!(self, LangType::Value(ValueLangType::NeverContinues))
    }

    /// Whether this resolved type can stand where `constraint` is required.
    /// Unique types and `Action` double as their own only value.
    pub fn is_assignable_to(&self, constraint: &ValueLangType) -> bool {
        match self {
            LangType::Value(value) => value.is_assignable_to(constraint),
            LangType::Constraint(ValueLangType::Instance(canonical)) if canonical.is_unique() => {
                ValueLangType::Instance(canonical.clone()).is_assignable_to(constraint)
            }
            LangType::Constraint(ValueLangType::Action) => {
                ValueLangType::Action.is_assignable_to(constraint)
            }
            LangType::Constraint(_) => matches!(constraint, ValueLangType::Anything),
            LangType::Pending | LangType::Error(_) => false,
        }
    }

    pub fn to_constraint_reference(&self) -> ConstraintReference {
        match self {
            LangType::Pending => ConstraintReference::Pending,
            LangType::Error(error) => ConstraintReference::Error(error.clone()),
            LangType::Constraint(value) => ConstraintReference::Resolved(value.clone()),
            LangType::Value(_) => ConstraintReference::Error(ErrorLangType::NotATypeReference),
        }
    }

    /// Treat this type as a value: unique types and `Action` become their instance,
    /// other constraints are an error.
    pub fn as_value(&self) -> LangType {
        match self {
            LangType::Constraint(ValueLangType::Instance(canonical)) if canonical.is_unique() => {
                LangType::Value(ValueLangType::Instance(canonical.clone()))
            }
            LangType::Constraint(ValueLangType::Action) => LangType::Value(ValueLangType::Action),
            LangType::Constraint(other) => LangType::Error(ErrorLangType::ConstraintUsedAsValue {
                constraint: Box::new(other.clone()),
            }),
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(name: &str, fields: Vec<ObjectField>) -> CanonicalLangType {
        CanonicalLangType::Object {
            id: CanonicalLangTypeId::new("test.cau", name),
            name: name.to_string(),
            fields,
        }
    }

    #[test]
    fn never_continues_fits_anywhere() {
        let text = ValueLangType::Primitive(PrimitiveKind::Text);
        assert!(ValueLangType::NeverContinues.is_assignable_to(&text));
        assert!(!ValueLangType::Action.is_assignable_to(&text));
    }

    #[test]
    fn option_accepts_any_member() {
        let yes = object("Yes", Vec::new());
        let no = object("No", Vec::new());
        let answer = ValueLangType::Option(vec![
            ConstraintReference::Resolved(ValueLangType::Instance(yes.clone())),
            ConstraintReference::Resolved(ValueLangType::Instance(no)),
        ]);
        assert!(ValueLangType::Instance(yes.clone()).is_assignable_to(&answer));
        assert!(LangType::Constraint(ValueLangType::Instance(yes)).is_assignable_to(&answer));
        assert!(!ValueLangType::Primitive(PrimitiveKind::Number).is_assignable_to(&answer));
    }

    #[test]
    fn non_unique_type_is_not_a_value() {
        let point = object(
            "Point",
            vec![ObjectField {
                name: "x".into(),
                constraint: ConstraintReference::Resolved(ValueLangType::Primitive(
                    PrimitiveKind::Number,
                )),
            }],
        );
        let reference = LangType::Constraint(ValueLangType::Instance(point.clone()));
        assert!(!reference.is_assignable_to(&ValueLangType::Instance(point)));
        assert!(matches!(
            reference.as_value(),
            LangType::Error(ErrorLangType::ConstraintUsedAsValue { .. })
        ));
    }

    #[test]
    fn canonical_id_display_includes_disambiguator() {
        let mut id = CanonicalLangTypeId::new("project/a.cau", "Thing");
        assert_eq!(id.to_string(), "project/a.cau:Thing");
        id.number = 2;
        assert_eq!(id.to_string(), "project/a.cau:Thing2");
    }
}

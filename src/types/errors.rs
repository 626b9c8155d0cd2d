//=====================================================
// File: types/errors.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Language-level error values
// Objective: Errors are data during resolution; each carries a friendly
//            message and a stable diagnostic code
//=====================================================

use super::{LangType, ValueLangType};
use crate::ast::SourcePosition;
use crate::errors::ErrorCode;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncompatibleType {
    pub value_type: LangType,
    pub position: SourcePosition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ErrorLangType {
    NeverResolved,
    NotInScope,
    FileNotFound,
    ImportPathInvalid,
    ExportNotFound,
    ProxyError {
        actual_error: Box<ErrorLangType>,
        proxy_chain: Vec<SourcePosition>,
    },
    NotCallable,
    NotCausable,
    ImplementationTodo {
        description: String,
    },
    NotATypeReference,
    ConstraintUsedAsValue {
        constraint: Box<ValueLangType>,
    },
    MismatchedType {
        expected: Box<ValueLangType>,
        actual: Box<LangType>,
    },
    MissingParameters {
        names: Vec<String>,
    },
    ExcessParameter {
        expected: usize,
    },
    MissingElseBranch,
    TooManyElseBranches,
    IncompatibleTypes {
        types: Vec<IncompatibleType>,
    },
    DoesNotHaveAnyMembers,
    DoesNotHaveMember {
        name: String,
    },
    NotVariable,
    OuterVariable,
    CannotBreakHere,
}

impl ErrorLangType {
    /// Forward `error` through one more value-flow hop at `position`.
    /// The chain grows at the front so it reads nearest hop first.
    pub fn proxy(error: &ErrorLangType, position: SourcePosition) -> ErrorLangType {
        match error {
            ErrorLangType::ProxyError {
                actual_error,
                proxy_chain,
            } => {
                let mut chain = Vec::with_capacity(proxy_chain.len() + 1);
                chain.push(position);
                chain.extend(proxy_chain.iter().cloned());
                ErrorLangType::ProxyError {
                    actual_error: actual_error.clone(),
                    proxy_chain: chain,
                }
            }
            other => ErrorLangType::ProxyError {
                actual_error: Box::new(other.clone()),
                proxy_chain: vec![position],
            },
        }
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self, ErrorLangType::ProxyError { .. })
    }

    /// The originating error behind any number of proxies.
    pub fn root_cause(&self) -> &ErrorLangType {
        match self {
            ErrorLangType::ProxyError { actual_error, .. } => actual_error.root_cause(),
            other => other,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ErrorLangType::NotInScope
            | ErrorLangType::NotVariable
            | ErrorLangType::OuterVariable => ErrorCode::Scope,
            ErrorLangType::FileNotFound
            | ErrorLangType::ImportPathInvalid
            | ErrorLangType::ExportNotFound => ErrorCode::Import,
            ErrorLangType::NotATypeReference
            | ErrorLangType::ConstraintUsedAsValue { .. }
            | ErrorLangType::MismatchedType { .. }
            | ErrorLangType::IncompatibleTypes { .. } => ErrorCode::TypeMismatch,
            ErrorLangType::NotCallable
            | ErrorLangType::NotCausable
            | ErrorLangType::MissingParameters { .. }
            | ErrorLangType::ExcessParameter { .. }
            | ErrorLangType::DoesNotHaveAnyMembers
            | ErrorLangType::DoesNotHaveMember { .. } => ErrorCode::InvalidOperation,
            ErrorLangType::MissingElseBranch
            | ErrorLangType::TooManyElseBranches
            | ErrorLangType::CannotBreakHere => ErrorCode::ControlFlow,
            ErrorLangType::NeverResolved | ErrorLangType::ImplementationTodo { .. } => {
                ErrorCode::Internal
            }
            ErrorLangType::ProxyError { actual_error, .. } => actual_error.code(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            ErrorLangType::NeverResolved => {
                "I couldn't figure out what type this is. This is probably a bug in the compiler."
                    .to_string()
            }
            ErrorLangType::NotInScope => "I can't find anything with this name in scope.".into(),
            ErrorLangType::FileNotFound => "I can't find the file you're trying to import.".into(),
            ErrorLangType::ImportPathInvalid => {
                "This import path goes outside of the project.".into()
            }
            ErrorLangType::ExportNotFound => {
                "I can't find anything with this name in that file.".into()
            }
            ErrorLangType::ProxyError { actual_error, .. } => actual_error.message(),
            ErrorLangType::NotCallable => "This isn't something I can call.".into(),
            ErrorLangType::NotCausable => "This isn't a signal, so I can't cause it.".into(),
            ErrorLangType::ImplementationTodo { description } => {
                format!("This feature isn't implemented yet: {description}")
            }
            ErrorLangType::NotATypeReference => "I was expecting a type here.".into(),
            ErrorLangType::ConstraintUsedAsValue { constraint } => {
                format!("{constraint} is a type, but I was expecting a value here.")
            }
            ErrorLangType::MismatchedType { expected, actual } => {
                let actual = match actual.as_ref() {
                    LangType::Value(value) => value.to_string(),
                    LangType::Constraint(value) => format!("the type {value}"),
                    LangType::Pending => "an unresolved type".to_string(),
                    LangType::Error(_) => "an error".to_string(),
                };
                format!("I was expecting a {expected}, but this is {actual}.")
            }
            ErrorLangType::MissingParameters { names } => {
                format!("I'm missing parameters: {}.", names.join(", "))
            }
            ErrorLangType::ExcessParameter { expected } => {
                format!("I wasn't expecting this parameter; only {expected} are allowed.")
            }
            ErrorLangType::MissingElseBranch => {
                "This branch might not match anything; it needs an else branch.".into()
            }
            ErrorLangType::TooManyElseBranches => "A branch can only have one else.".into(),
            ErrorLangType::IncompatibleTypes { types } => {
                let names: Vec<String> = types
                    .iter()
                    .map(|entry| match &entry.value_type {
                        LangType::Value(value) | LangType::Constraint(value) => value.to_string(),
                        _ => "?".to_string(),
                    })
                    .collect();
                format!(
                    "The branches of this expression have incompatible types: {}.",
                    names.join(", ")
                )
            }
            ErrorLangType::DoesNotHaveAnyMembers => "This value doesn't have any members.".into(),
            ErrorLangType::DoesNotHaveMember { name } => {
                format!("This value doesn't have a member called {name}.")
            }
            ErrorLangType::NotVariable => {
                "This isn't a variable, so I can't change its value.".into()
            }
            ErrorLangType::OuterVariable => {
                "This variable belongs to an outer function, so it can't be used or changed here."
                    .into()
            }
            ErrorLangType::CannotBreakHere => "There's no loop here to break out of.".into(),
        }
    }
}

impl fmt::Display for ErrorLangType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code().as_str(), self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Breadcrumbs;

    fn position(at: &str) -> SourcePosition {
        SourcePosition::Source {
            path: "test.cau".into(),
            breadcrumbs: Breadcrumbs::parse(at),
            position: Default::default(),
        }
    }

    #[test]
    fn proxy_chain_grows_with_each_hop() {
        let first = ErrorLangType::proxy(&ErrorLangType::NotInScope, position("a"));
        let second = ErrorLangType::proxy(&first, position("b"));
        match &second {
            ErrorLangType::ProxyError {
                actual_error,
                proxy_chain,
            } => {
                assert_eq!(**actual_error, ErrorLangType::NotInScope);
                assert_eq!(proxy_chain, &vec![position("b"), position("a")]);
            }
            other => panic!("expected proxy error, found {other:?}"),
        }
        assert_eq!(second.root_cause(), &ErrorLangType::NotInScope);
    }

    #[test]
    fn codes_follow_the_root_cause() {
        let proxied = ErrorLangType::proxy(&ErrorLangType::FileNotFound, position("a"));
        assert_eq!(proxied.code(), ErrorCode::Import);
        assert_eq!(ErrorCode::Import.as_str(), "E002");
    }
}

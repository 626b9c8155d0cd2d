//=====================================================
// File: errors.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Crate-level error types
// Objective: Fatal compiler and VM faults plus diagnostic codes
//=====================================================

use crate::ast::Breadcrumbs;
use thiserror::Error;

/// Stable category codes attached to diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Scope,
    Import,
    TypeMismatch,
    InvalidOperation,
    ControlFlow,
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Scope => "E001",
            ErrorCode::Import => "E002",
            ErrorCode::TypeMismatch => "E003",
            ErrorCode::InvalidOperation => "E004",
            ErrorCode::ControlFlow => "E005",
            ErrorCode::Internal => "E006",
        }
    }
}

/// Internal-consistency failures between analyzer, resolver, and compiler.
/// User mistakes never produce these; they become diagnostics instead.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("slot {key} was already resolved and cannot be overwritten")]
    Clobbered { key: String },
    #[error("canonical type {id} was registered twice with different definitions")]
    CanonicalClobbered { id: String },
    #[error("no node exists at {0}")]
    MissingNode(Breadcrumbs),
    #[error("node at {breadcrumbs} is missing its {tag} tag")]
    MissingTag {
        breadcrumbs: Breadcrumbs,
        tag: &'static str,
    },
    #[error("no resolved type for {0}")]
    MissingType(Breadcrumbs),
    #[error("no stack slot holds the value declared at {0}")]
    MissingValueReference(Breadcrumbs),
    #[error("{name} is declared twice in the same scope")]
    DuplicateScopeEntry { name: String },
    #[error("internal compiler error: {0}")]
    Internal(String),
}

/// Faults raised by the virtual machine. These abort execution.
#[derive(Debug, Error)]
pub enum VmError {
    #[error("the VM is already running or waiting on a signal")]
    NotReady,
    #[error("the VM is not paused on a signal")]
    NotWaitingForSignal,
    #[error("file {0} is not part of this bundle")]
    UnknownFile(String),
    #[error("{path} has no export named {name}")]
    UnknownExport { path: String, name: String },
    #[error("{name} is not a function")]
    NotAFunction { name: String },
    #[error("{name} expects {expected} arguments, received {received}")]
    WrongArgumentCount {
        name: String,
        expected: usize,
        received: usize,
    },
    #[error("resume value does not match the signal's result type: {0}")]
    InvalidResumeValue(String),
    #[error("invalid argument for native function {name}: {reason}")]
    InvalidNativeArgument { name: String, reason: String },
    #[error("encountered a bad value: {0}")]
    BadValueUsed(String),
    #[error("stack underflow in {0}")]
    StackUnderflow(String),
    #[error("internal VM error: {0}")]
    Internal(String),
}

/// Failures while encoding or decoding compiled files.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("invalid compiled file magic")]
    InvalidMagic,
    #[error("unsupported compiled file version {0}")]
    UnsupportedVersion(u16),
    #[error("codec error: {0}")]
    Codec(String),
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for PersistError {
    fn from(err: std::io::Error) -> Self {
        PersistError::Io(err.to_string())
    }
}

impl From<bincode::Error> for PersistError {
    fn from(err: bincode::Error) -> Self {
        PersistError::Codec(err.to_string())
    }
}

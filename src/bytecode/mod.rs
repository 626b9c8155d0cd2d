//=====================================================
// File: bytecode/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Compiled file format for the CauseLang VM
// Objective: Instructions, procedures, constants, exports, and the binary
//            encoding used to persist compiled files
//=====================================================

mod native;

pub use native::{NativeFn, NativeFunction};

use crate::ast::{Breadcrumbs, DocumentRange, SourcePosition};
use crate::errors::PersistError;
use crate::resolver::ExternalFileDescriptor;
use crate::types::{CanonicalLangType, CanonicalLangTypeId, ErrorLangType, LangType, ValueLangType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};

/// One VM operation. Operands are indices into the procedure's constant table,
/// the frame's stack window, or the instruction list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    NoOp,
    Pop { number: usize },
    /// Remove `values` entries beneath the top of the stack, keeping the top.
    PopScope { values: usize },
    RegisterEffect { procedure_index: usize },
    PopEffects { number: usize },
    PushAction,
    Literal { constant: usize },
    Import {
        file_path_constant: usize,
        export_name_constant: usize,
    },
    ImportSameFile { export_name_constant: usize },
    DefineFunction {
        procedure_index: usize,
        type_constant: usize,
        captured_values: usize,
    },
    ReadLocal { index: usize },
    WriteLocal { index: usize },
    ReadLocalThroughEffectScope { effect_depth: usize, index: usize },
    WriteLocalThroughEffectScope { effect_depth: usize, index: usize },
    Construct { arity: usize },
    CallFunction { arity: usize },
    GetMember { index: usize },
    IsAssignableTo,
    Jump { instruction: usize },
    JumpIfFalse { instruction: usize },
    StartLoop { end_instruction: usize },
    ContinueLoop,
    BreakLoop { levels: usize },
    Cause,
    RejectSignal,
    FinishEffect,
    Return,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CompiledConstant {
    Text(String),
    Number(f64),
    Error {
        position: SourcePosition,
        error: ErrorLangType,
    },
    Type(ValueLangType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceMapPhase {
    Setup,
    Execute,
    Plumbing,
    Cleanup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMapEntry {
    pub breadcrumbs: Breadcrumbs,
    pub position: DocumentRange,
    pub phase: SourceMapPhase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProcedureIdentity {
    Function {
        name: Option<String>,
        declaration: SourcePosition,
    },
    Effect {
        matches_type: Option<ValueLangType>,
        declaration: SourcePosition,
    },
}

impl fmt::Display for ProcedureIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcedureIdentity::Function { name, declaration } => write!(
                f,
                "function {} at {declaration}",
                name.as_deref().unwrap_or("<anonymous>")
            ),
            ProcedureIdentity::Effect {
                matches_type,
                declaration,
            } => match matches_type {
                Some(matches) => write!(f, "effect for {matches} at {declaration}"),
                None => write!(f, "effect at {declaration}"),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub identity: ProcedureIdentity,
    pub constant_table: Vec<CompiledConstant>,
    pub instructions: Vec<Instruction>,
    pub source_map: Vec<SourceMapEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CompiledExport {
    Error {
        position: SourcePosition,
        error: ErrorLangType,
    },
    Constraint {
        constraint: ValueLangType,
    },
    Function {
        procedure_index: usize,
        function_type: ValueLangType,
    },
    NativeFunction(NativeFunction),
    Value {
        value: CompiledConstant,
        value_type: ValueLangType,
    },
}

impl CompiledExport {
    pub fn lang_type(&self) -> LangType {
        match self {
            CompiledExport::Error { error, .. } => LangType::Error(error.clone()),
            CompiledExport::Constraint { constraint } => LangType::Constraint(constraint.clone()),
            CompiledExport::Function { function_type, .. } => {
                LangType::Value(function_type.clone())
            }
            CompiledExport::NativeFunction(native) => {
                LangType::Value(native.function_type.clone())
            }
            CompiledExport::Value { value_type, .. } => LangType::Value(value_type.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledFile {
    pub path: String,
    pub types: BTreeMap<CanonicalLangTypeId, CanonicalLangType>,
    pub procedures: Vec<Procedure>,
    pub exports: BTreeMap<String, CompiledExport>,
}

impl CompiledFile {
    const MAGIC: &'static [u8; 4] = b"CAUS";
    const VERSION: u16 = 1;

    /// The cross-file view other files resolve against.
    pub fn to_file_descriptor(&self) -> ExternalFileDescriptor {
        ExternalFileDescriptor {
            exports: self
                .exports
                .iter()
                .map(|(name, export)| (name.clone(), export.lang_type()))
                .collect(),
            types: self.types.clone(),
        }
    }

    pub fn encode<W: Write>(&self, mut writer: W) -> Result<(), PersistError> {
        writer.write_all(Self::MAGIC)?;
        writer.write_all(&Self::VERSION.to_le_bytes())?;
        let payload = bincode::serialize(self)?;
        writer.write_all(&(payload.len() as u64).to_le_bytes())?;
        writer.write_all(&payload)?;
        Ok(())
    }

    pub fn serialize(&self) -> Result<Vec<u8>, PersistError> {
        let mut buf = Vec::new();
        self.encode(&mut buf)?;
        Ok(buf)
    }

    pub fn decode<R: Read>(mut reader: R) -> Result<Self, PersistError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != Self::MAGIC {
            return Err(PersistError::InvalidMagic);
        }

        let mut version_bytes = [0u8; 2];
        reader.read_exact(&mut version_bytes)?;
        let version = u16::from_le_bytes(version_bytes);
        if version != Self::VERSION {
            return Err(PersistError::UnsupportedVersion(version));
        }

        let mut len_bytes = [0u8; 8];
        reader.read_exact(&mut len_bytes)?;
        let len = u64::from_le_bytes(len_bytes);
        // The length is untrusted; only allocate for bytes that actually arrive.
        let mut payload = Vec::new();
        reader.take(len).read_to_end(&mut payload)?;
        if payload.len() as u64 != len {
            return Err(PersistError::Io(format!(
                "payload truncated: expected {len} bytes, found {}",
                payload.len()
            )));
        }
        Ok(bincode::deserialize(&payload)?)
    }

    /// Write the encoded file to `path`.
    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        use anyhow::Context;
        let bytes = self
            .serialize()
            .with_context(|| format!("encoding compiled file {}", self.path))?;
        std::fs::write(path, bytes)
            .with_context(|| format!("writing compiled file to {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading compiled file {}", path.display()))?;
        let file = Self::decode(&bytes[..])
            .with_context(|| format!("decoding compiled file {}", path.display()))?;
        Ok(file)
    }
}

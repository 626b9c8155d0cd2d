//=====================================================
// File: compiler/procedure.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Procedure assembly for the CauseLang compiler
// Objective: Append instructions with source map entries, track the operand
//            stack height, and map declarations to stack slots
//=====================================================

use crate::ast::{Breadcrumbs, NodeInfo};
use crate::bytecode::{
    CompiledConstant, Instruction, Procedure, ProcedureIdentity, SourceMapEntry, SourceMapPhase,
};
use crate::errors::CompileError;
use std::collections::BTreeMap;

/// A procedure under construction.
pub(crate) struct MutableProcedure {
    identity: ProcedureIdentity,
    constants: Vec<CompiledConstant>,
    instructions: Vec<Instruction>,
    source_map: Vec<SourceMapEntry>,
    /// Values currently on this procedure's stack window.
    pub(crate) stack_depth: usize,
}

impl MutableProcedure {
    pub(crate) fn new(identity: ProcedureIdentity, stack_depth: usize) -> Self {
        Self {
            identity,
            constants: Vec::new(),
            instructions: Vec::new(),
            source_map: Vec::new(),
            stack_depth,
        }
    }

    pub(crate) fn add_constant(&mut self, constant: CompiledConstant) -> usize {
        if let Some(existing) = self.constants.iter().position(|known| *known == constant) {
            return existing;
        }
        self.constants.push(constant);
        self.constants.len() - 1
    }

    pub(crate) fn next_index(&self) -> usize {
        self.instructions.len()
    }

    pub(crate) fn write(&mut self, instruction: Instruction, info: &NodeInfo, phase: SourceMapPhase) {
        if matches!(
            instruction,
            Instruction::Pop { number: 0 } | Instruction::PopScope { values: 0 }
        ) {
            return;
        }
        self.stack_depth = apply_stack_effect(self.stack_depth, &instruction);
        self.instructions.push(instruction);
        self.source_map.push(SourceMapEntry {
            breadcrumbs: info.breadcrumbs.clone(),
            position: info.position,
            phase,
        });
    }

    /// Point a previously written jump or loop start at `target`.
    pub(crate) fn patch_jump(&mut self, index: usize, target: usize) -> Result<(), CompileError> {
        match self.instructions.get_mut(index) {
            Some(Instruction::Jump { instruction } | Instruction::JumpIfFalse { instruction }) => {
                *instruction = target;
                Ok(())
            }
            Some(Instruction::StartLoop { end_instruction }) => {
                *end_instruction = target;
                Ok(())
            }
            _ => Err(CompileError::Internal(format!(
                "instruction {index} is not a jump"
            ))),
        }
    }

    pub(crate) fn finish(self) -> Procedure {
        Procedure {
            identity: self.identity,
            constant_table: self.constants,
            instructions: self.instructions,
            source_map: self.source_map,
        }
    }
}

fn apply_stack_effect(depth: usize, instruction: &Instruction) -> usize {
    let (popped, pushed) = match *instruction {
        Instruction::Pop { number } => (number, 0),
        Instruction::PopScope { values } => (values, 0),
        Instruction::PushAction
        | Instruction::Literal { .. }
        | Instruction::Import { .. }
        | Instruction::ImportSameFile { .. }
        | Instruction::ReadLocal { .. }
        | Instruction::ReadLocalThroughEffectScope { .. } => (0, 1),
        Instruction::DefineFunction {
            captured_values, ..
        } => (captured_values, 1),
        Instruction::WriteLocal { .. } | Instruction::WriteLocalThroughEffectScope { .. } => {
            (1, 0)
        }
        // Arguments plus the callee or type beneath them, replaced by the result.
        Instruction::Construct { arity } | Instruction::CallFunction { arity } => (arity + 1, 1),
        Instruction::IsAssignableTo => (2, 1),
        Instruction::JumpIfFalse { .. } => (1, 0),
        Instruction::NoOp
        | Instruction::RegisterEffect { .. }
        | Instruction::PopEffects { .. }
        | Instruction::GetMember { .. }
        | Instruction::Jump { .. }
        | Instruction::StartLoop { .. }
        | Instruction::ContinueLoop
        | Instruction::BreakLoop { .. }
        | Instruction::Cause
        | Instruction::RejectSignal
        | Instruction::FinishEffect
        | Instruction::Return => (0, 0),
    };
    depth.saturating_sub(popped) + pushed
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScopeKind {
    Body,
    Function,
    Effect,
}

/// Declarations visible in one lexical region, keyed by declaration breadcrumbs.
#[derive(Debug)]
pub(crate) struct CompilerScope {
    pub(crate) owner: Breadcrumbs,
    pub(crate) kind: ScopeKind,
    pub(crate) effect_count: usize,
    pub(crate) named_value_indices: BTreeMap<Breadcrumbs, usize>,
}

impl CompilerScope {
    pub(crate) fn new(owner: &Breadcrumbs, kind: ScopeKind) -> Self {
        Self {
            owner: owner.clone(),
            kind,
            effect_count: 0,
            named_value_indices: BTreeMap::new(),
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.named_value_indices.len()
    }
}

/// Where a declared value lives relative to the reading frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ValueReference {
    pub(crate) effect_depth: usize,
    pub(crate) index: usize,
}

impl ValueReference {
    pub(crate) fn read(self) -> Instruction {
        match self.effect_depth {
            0 => Instruction::ReadLocal { index: self.index },
            effect_depth => Instruction::ReadLocalThroughEffectScope {
                effect_depth,
                index: self.index,
            },
        }
    }

    pub(crate) fn write(self) -> Instruction {
        match self.effect_depth {
            0 => Instruction::WriteLocal { index: self.index },
            effect_depth => Instruction::WriteLocalThroughEffectScope {
                effect_depth,
                index: self.index,
            },
        }
    }
}

/// Search `scopes` innermost first; every effect boundary crossed moves the
/// read one frame further out.
pub(crate) fn find_value_reference(
    scopes: &[CompilerScope],
    declaration: &Breadcrumbs,
) -> Result<ValueReference, CompileError> {
    let mut effect_depth = 0;
    for scope in scopes.iter().rev() {
        if let Some(index) = scope.named_value_indices.get(declaration) {
            return Ok(ValueReference {
                effect_depth,
                index: *index,
            });
        }
        if scope.kind == ScopeKind::Effect {
            effect_depth += 1;
        }
    }
    Err(CompileError::MissingValueReference(declaration.clone()))
}

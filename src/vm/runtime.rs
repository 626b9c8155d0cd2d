//=====================================================
// File: vm/runtime.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Instruction dispatch for the CauseLang VM
// Objective: Fetch-dispatch-advance over the frame chain, spawning handler
//            frames for caused signals and pausing when none resolves them
//=====================================================

use super::{
    EffectEntry, FrameKind, LangVm, LoopEntry, RunResult, RuntimeFunction, RuntimeObject,
    RuntimeValue, StackFrame, VmState, check_signal_result,
};
use crate::bytecode::{CompiledConstant, CompiledExport, CompiledFile, Instruction, ProcedureIdentity};
use crate::errors::VmError;
use crate::stdlib_registry;
use crate::types::ValueLangType;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, trace};

/// What the dispatch loop does after one instruction.
enum Step {
    Continue,
    Finished(RunResult),
}

impl LangVm {
    pub(super) fn run(&mut self) -> Result<RunResult, VmError> {
        loop {
            let instruction = self.fetch()?;
            if self.options.trace_instructions {
                self.emit_trace(&instruction);
            }
            if let Step::Finished(result) = self.dispatch(instruction)? {
                return Ok(result);
            }
        }
    }

    fn fetch(&mut self) -> Result<Instruction, VmError> {
        let frame = self.frame_mut()?;
        let procedure = frame
            .file
            .procedures
            .get(frame.procedure_index)
            .ok_or_else(|| VmError::Internal(format!("missing procedure {}", frame.procedure_index)))?;
        let instruction = *procedure.instructions.get(frame.ip).ok_or_else(|| {
            VmError::Internal(format!("fell off the end of {}", procedure.identity))
        })?;
        frame.ip += 1;
        Ok(instruction)
    }

    fn emit_trace(&self, instruction: &Instruction) {
        if let Some(frame) = self.frames.last() {
            let name = frame
                .file
                .procedures
                .get(frame.procedure_index)
                .map(|procedure| procedure.identity.to_string())
                .unwrap_or_else(|| "<invalid>".to_string());
            trace!(
                frame = self.frames.len() - 1,
                ip = frame.ip - 1,
                procedure = %name,
                %instruction,
                "dispatch"
            );
        }
    }

    fn dispatch(&mut self, instruction: Instruction) -> Result<Step, VmError> {
        match instruction {
            Instruction::NoOp => {}
            Instruction::Pop { number } => {
                let stack = self.stack_mut()?;
                let remaining = stack
                    .len()
                    .checked_sub(number)
                    .ok_or_else(|| VmError::StackUnderflow("Pop".into()))?;
                stack.truncate(remaining);
            }
            Instruction::PopScope { values } => {
                let result = self.pop()?;
                let stack = self.stack_mut()?;
                let remaining = stack
                    .len()
                    .checked_sub(values)
                    .ok_or_else(|| VmError::StackUnderflow("PopScope".into()))?;
                stack.truncate(remaining);
                stack.push(result);
            }
            Instruction::RegisterEffect { procedure_index } => {
                let exists_in = self.frames.len() - 1;
                let frame = self.frame_mut()?;
                let entry = EffectEntry {
                    file: frame.file.clone(),
                    procedure_index,
                    exists_in,
                    parent: frame.effects.take(),
                };
                frame.effects = Some(Rc::new(entry));
            }
            Instruction::PopEffects { number } => {
                let frame = self.frame_mut()?;
                for _ in 0..number {
                    let parent = frame.effects.as_ref().and_then(|entry| entry.parent.clone());
                    frame.effects = parent;
                }
            }
            Instruction::PushAction => self.push(RuntimeValue::Action)?,
            Instruction::Literal { constant } => {
                let value = match self.constant(constant)? {
                    CompiledConstant::Text(text) => RuntimeValue::Text(text),
                    CompiledConstant::Number(number) => RuntimeValue::Number(number),
                    CompiledConstant::Error { position, error } => {
                        RuntimeValue::BadValue { position, error }
                    }
                    CompiledConstant::Type(constraint) => RuntimeValue::TypeConstraint(constraint),
                };
                self.push(value)?;
            }
            Instruction::Import {
                file_path_constant,
                export_name_constant,
            } => {
                let path = self.text_constant(file_path_constant)?;
                let name = self.text_constant(export_name_constant)?;
                let file = self.bundle.require_file(&path)?;
                let value = import_export(&file, &name)?;
                self.push(value)?;
            }
            Instruction::ImportSameFile {
                export_name_constant,
            } => {
                let name = self.text_constant(export_name_constant)?;
                let file = self.frame()?.file.clone();
                let value = import_export(&file, &name)?;
                self.push(value)?;
            }
            Instruction::DefineFunction {
                procedure_index,
                type_constant,
                captured_values,
            } => {
                let function_type = match self.constant(type_constant)? {
                    CompiledConstant::Type(function_type) => function_type,
                    other => {
                        return Err(VmError::Internal(format!(
                            "function type constant is {other:?}"
                        )));
                    }
                };
                let captured_values = self.pop_many(captured_values)?;
                let file = self.frame()?.file.clone();
                let name = match file.procedures.get(procedure_index).map(|p| &p.identity) {
                    Some(ProcedureIdentity::Function { name, .. }) => name.clone(),
                    _ => None,
                };
                self.push(RuntimeValue::Function(Arc::new(RuntimeFunction {
                    name,
                    file,
                    procedure_index,
                    function_type,
                    captured_values,
                })))?;
            }
            Instruction::ReadLocal { index } => {
                let frame_index = self.frames.len() - 1;
                let value = self.read_slot(frame_index, index)?;
                self.push(value)?;
            }
            Instruction::WriteLocal { index } => {
                let value = self.pop()?;
                let frame_index = self.frames.len() - 1;
                self.write_slot(frame_index, index, value)?;
            }
            Instruction::ReadLocalThroughEffectScope {
                effect_depth,
                index,
            } => {
                let frame_index = self.frame_through_effects(effect_depth)?;
                let value = self.read_slot(frame_index, index)?;
                self.push(value)?;
            }
            Instruction::WriteLocalThroughEffectScope {
                effect_depth,
                index,
            } => {
                let value = self.pop()?;
                let frame_index = self.frame_through_effects(effect_depth)?;
                self.write_slot(frame_index, index, value)?;
            }
            Instruction::Construct { arity } => {
                let values = self.pop_many(arity)?;
                let value = match self.pop()? {
                    RuntimeValue::TypeConstraint(ValueLangType::Instance(canonical)) => {
                        if canonical.is_unique() {
                            RuntimeValue::TypeConstraint(ValueLangType::Instance(canonical))
                        } else {
                            RuntimeValue::Object(Arc::new(RuntimeObject {
                                type_descriptor: canonical,
                                values,
                            }))
                        }
                    }
                    bad @ RuntimeValue::BadValue { .. } => {
                        return Err(VmError::BadValueUsed(bad.to_string()));
                    }
                    other => {
                        return Err(VmError::Internal(format!("cannot construct {other}")));
                    }
                };
                self.push(value)?;
            }
            Instruction::CallFunction { arity } => return self.call_function(arity),
            Instruction::GetMember { index } => {
                let value = match self.pop()? {
                    RuntimeValue::Object(object) => {
                        object.values.get(index).cloned().ok_or_else(|| {
                            VmError::Internal(format!(
                                "{} has no field {index}",
                                object.type_descriptor.id()
                            ))
                        })?
                    }
                    bad @ RuntimeValue::BadValue { .. } => {
                        return Err(VmError::BadValueUsed(bad.to_string()));
                    }
                    other => {
                        return Err(VmError::Internal(format!("{other} has no members")));
                    }
                };
                self.push(value)?;
            }
            Instruction::IsAssignableTo => {
                let constraint = self.pop()?;
                let value = self.pop()?;
                let answer = match constraint {
                    RuntimeValue::TypeConstraint(constraint) => value.is_assignable_to(&constraint),
                    _ => false,
                };
                self.push(stdlib_registry::get_binary_answer(answer))?;
            }
            Instruction::Jump { instruction } => self.frame_mut()?.ip = instruction,
            Instruction::JumpIfFalse { instruction } => {
                let condition = self.pop()?;
                if condition.is_bad_value() {
                    return Err(VmError::BadValueUsed(condition.to_string()));
                }
                if condition == stdlib_registry::get_binary_answer(false) {
                    self.frame_mut()?.ip = instruction;
                }
            }
            Instruction::StartLoop { end_instruction } => {
                let stack_height = self.stack_mut()?.len();
                let frame = self.frame_mut()?;
                let entry = LoopEntry {
                    start: frame.ip,
                    end: end_instruction,
                    stack_height,
                    effects: frame.effects.clone(),
                    iterations: 0,
                };
                frame.loops.push(entry);
            }
            Instruction::ContinueLoop => {
                let threshold = self.options.runaway_loop_threshold;
                let frame = self.frame_mut()?;
                let entry = frame
                    .loops
                    .last_mut()
                    .ok_or_else(|| VmError::Internal("ContinueLoop outside a loop".into()))?;
                entry.iterations += 1;
                if threshold.is_some_and(|limit| entry.iterations > limit) {
                    entry.iterations = 0;
                    let signal = runaway_loop_signal()?;
                    debug!("runaway loop detected");
                    return self.cause(signal);
                }
                let (start, stack_height, effects) =
                    (entry.start, entry.stack_height, entry.effects.clone());
                frame.ip = start;
                frame.effects = effects;
                self.stack_mut()?.truncate(stack_height);
            }
            Instruction::BreakLoop { levels } => {
                let value = self.pop()?;
                let frame = self.frame_mut()?;
                let mut exited = None;
                for _ in 0..levels {
                    exited = frame.loops.pop();
                }
                let entry =
                    exited.ok_or_else(|| VmError::Internal("BreakLoop outside a loop".into()))?;
                frame.ip = entry.end;
                frame.effects = entry.effects;
                let stack = self.stack_mut()?;
                stack.truncate(entry.stack_height);
                stack.push(value);
            }
            Instruction::Cause => {
                let signal = self.pop()?;
                if signal.is_bad_value() {
                    return Err(VmError::BadValueUsed(signal.to_string()));
                }
                if signal.signal_type().is_none() {
                    return Err(VmError::Internal(format!("{signal} is not a signal")));
                }
                return self.cause(signal);
            }
            Instruction::RejectSignal => return self.reject_signal(),
            Instruction::FinishEffect => {
                let result = self.pop()?;
                self.finish_effect(result)?;
            }
            Instruction::Return => {
                let value = self.pop()?;
                let frame_index = self.frames.len() - 1;
                let owner = match &self.frame()?.kind {
                    FrameKind::Cause { exists_in, .. } => self.owning_frame(*exists_in)?,
                    _ => frame_index,
                };
                return self.return_from(owner, value);
            }
        }
        Ok(Step::Continue)
    }

    //=================================================
    // Frames and stacks
    //=================================================

    fn frame(&self) -> Result<&StackFrame, VmError> {
        self.frames
            .last()
            .ok_or_else(|| VmError::Internal("no active frame".into()))
    }

    fn frame_mut(&mut self) -> Result<&mut StackFrame, VmError> {
        self.frames
            .last_mut()
            .ok_or_else(|| VmError::Internal("no active frame".into()))
    }

    fn stack_mut(&mut self) -> Result<&mut Vec<RuntimeValue>, VmError> {
        let index = self.frame()?.stack_index;
        self.stacks
            .get_mut(index)
            .ok_or_else(|| VmError::Internal(format!("missing stack {index}")))
    }

    fn push(&mut self, value: RuntimeValue) -> Result<(), VmError> {
        self.stack_mut()?.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<RuntimeValue, VmError> {
        let floor = self.frame()?.stack_start;
        let stack = self.stack_mut()?;
        if stack.len() <= floor {
            return Err(VmError::StackUnderflow("frame window is empty".into()));
        }
        stack
            .pop()
            .ok_or_else(|| VmError::StackUnderflow("pop".into()))
    }

    fn pop_many(&mut self, count: usize) -> Result<Vec<RuntimeValue>, VmError> {
        let stack = self.stack_mut()?;
        let start = stack
            .len()
            .checked_sub(count)
            .ok_or_else(|| VmError::StackUnderflow(format!("taking {count} values")))?;
        Ok(stack.split_off(start))
    }

    fn constant(&self, index: usize) -> Result<CompiledConstant, VmError> {
        let frame = self.frame()?;
        frame
            .file
            .procedures
            .get(frame.procedure_index)
            .and_then(|procedure| procedure.constant_table.get(index))
            .cloned()
            .ok_or_else(|| VmError::Internal(format!("missing constant {index}")))
    }

    fn text_constant(&self, index: usize) -> Result<String, VmError> {
        match self.constant(index)? {
            CompiledConstant::Text(text) => Ok(text),
            other => Err(VmError::Internal(format!("expected text constant, found {other:?}"))),
        }
    }

    fn read_slot(&self, frame_index: usize, index: usize) -> Result<RuntimeValue, VmError> {
        let frame = &self.frames[frame_index];
        self.stacks
            .get(frame.stack_index)
            .and_then(|stack| stack.get(frame.stack_start + index))
            .cloned()
            .ok_or_else(|| VmError::Internal(format!("no local in slot {index}")))
    }

    fn write_slot(
        &mut self,
        frame_index: usize,
        index: usize,
        value: RuntimeValue,
    ) -> Result<(), VmError> {
        let (stack_index, stack_start) = {
            let frame = &self.frames[frame_index];
            (frame.stack_index, frame.stack_start)
        };
        let slot = self
            .stacks
            .get_mut(stack_index)
            .and_then(|stack| stack.get_mut(stack_start + index))
            .ok_or_else(|| VmError::Internal(format!("no local in slot {index}")))?;
        *slot = value;
        Ok(())
    }

    /// Follow `effect_depth` handler frames out to the frame whose locals they close over.
    fn frame_through_effects(&self, effect_depth: usize) -> Result<usize, VmError> {
        let mut index = self.frames.len() - 1;
        for _ in 0..effect_depth {
            index = match self.frames.get(index).map(|frame| &frame.kind) {
                Some(FrameKind::Cause { exists_in, .. }) => *exists_in,
                _ => {
                    return Err(VmError::Internal(
                        "effect scope read outside a handler frame".into(),
                    ));
                }
            };
        }
        Ok(index)
    }

    /// A `return` inside handler bodies returns from the function that registered them.
    fn owning_frame(&self, mut index: usize) -> Result<usize, VmError> {
        loop {
            match self.frames.get(index).map(|frame| &frame.kind) {
                Some(FrameKind::Cause { exists_in, .. }) => index = *exists_in,
                Some(_) => return Ok(index),
                None => return Err(VmError::Internal(format!("no frame {index}"))),
            }
        }
    }

    fn pop_frame(&mut self) -> Result<StackFrame, VmError> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| VmError::Internal("no frame to pop".into()))?;
        if matches!(frame.kind, FrameKind::Cause { .. }) {
            self.stacks.pop();
        }
        Ok(frame)
    }

    fn return_from(&mut self, frame_index: usize, value: RuntimeValue) -> Result<Step, VmError> {
        while self.frames.len() > frame_index + 1 {
            self.pop_frame()?;
        }
        let frame = self.pop_frame()?;
        if self.frames.is_empty() {
            self.stacks.clear();
            self.state = VmState::Returned;
            debug!(value = %value, "execution returned");
            return Ok(Step::Finished(RunResult::Returned(value)));
        }
        let stack = self.stack_mut()?;
        stack.truncate(frame.stack_start);
        stack.push(value);
        Ok(Step::Continue)
    }

    //=================================================
    // Calls and signals
    //=================================================

    fn call_function(&mut self, arity: usize) -> Result<Step, VmError> {
        let callee_position = self
            .stack_mut()?
            .len()
            .checked_sub(arity + 1)
            .ok_or_else(|| VmError::StackUnderflow("CallFunction".into()))?;
        let callee = self.stack_mut()?[callee_position].clone();
        match callee {
            RuntimeValue::Function(function) => {
                let stack_index = self.frame()?.stack_index;
                let effects = self.frame()?.effects.clone();
                self.stack_mut()?
                    .extend(function.captured_values.iter().cloned());
                self.frames.push(StackFrame {
                    kind: FrameKind::Call,
                    file: function.file.clone(),
                    procedure_index: function.procedure_index,
                    ip: 0,
                    stack_index,
                    stack_start: callee_position,
                    effects,
                    loops: Vec::new(),
                    pending_signal: None,
                });
                Ok(Step::Continue)
            }
            RuntimeValue::NativeFunction(native) => {
                let args = self.pop_many(arity)?;
                self.pop()?;
                if self
                    .options
                    .should_check_native_arguments(self.bundle.has_diagnostics())
                {
                    check_native_arguments(&native.qualified_name(), &native.function_type, &args)?;
                }
                let result = native.call(&args)?;
                self.push(result)?;
                Ok(Step::Continue)
            }
            bad @ RuntimeValue::BadValue { .. } => Err(VmError::BadValueUsed(bad.to_string())),
            other => Err(VmError::NotAFunction {
                name: other.to_string(),
            }),
        }
    }

    /// Offer `signal` to the active frame's handlers, or pause if there are none.
    fn cause(&mut self, signal: RuntimeValue) -> Result<Step, VmError> {
        let frame = self.frame_mut()?;
        frame.pending_signal = Some(signal.clone());
        match frame.effects.clone() {
            Some(effect) => {
                self.spawn_handler(effect, signal)?;
                Ok(Step::Continue)
            }
            None => {
                self.state = VmState::PausedOnSignal;
                debug!(signal = %signal, "paused on signal");
                Ok(Step::Finished(RunResult::Caused(signal)))
            }
        }
    }

    fn spawn_handler(&mut self, effect: Rc<EffectEntry>, signal: RuntimeValue) -> Result<(), VmError> {
        self.stacks.push(vec![signal]);
        self.frames.push(StackFrame {
            kind: FrameKind::Cause {
                exists_in: effect.exists_in,
                effect: effect.clone(),
            },
            file: effect.file.clone(),
            procedure_index: effect.procedure_index,
            ip: 0,
            stack_index: self.stacks.len() - 1,
            stack_start: 0,
            // Signals caused inside a handler go to handlers registered before it.
            effects: effect.parent.clone(),
            loops: Vec::new(),
            pending_signal: None,
        });
        Ok(())
    }

    fn reject_signal(&mut self) -> Result<Step, VmError> {
        let handler = self.pop_frame()?;
        let FrameKind::Cause { effect, .. } = handler.kind else {
            return Err(VmError::Internal("RejectSignal outside a handler".into()));
        };
        let signal = self
            .frame()?
            .pending_signal
            .clone()
            .ok_or_else(|| VmError::Internal("rejected a signal nobody caused".into()))?;
        match effect.parent.clone() {
            Some(next) => {
                self.spawn_handler(next, signal)?;
                Ok(Step::Continue)
            }
            None => {
                self.state = VmState::UnhandledSignal;
                debug!(signal = %signal, "every handler rejected the signal");
                Ok(Step::Finished(RunResult::Caused(signal)))
            }
        }
    }

    fn finish_effect(&mut self, result: RuntimeValue) -> Result<(), VmError> {
        let handler = self.pop_frame()?;
        if !matches!(handler.kind, FrameKind::Cause { .. }) {
            return Err(VmError::Internal("FinishEffect outside a handler".into()));
        }
        let frame = self.frame_mut()?;
        let signal = frame
            .pending_signal
            .take()
            .ok_or_else(|| VmError::Internal("finished a signal nobody caused".into()))?;
        check_signal_result(&signal, &result)?;
        self.push(result)
    }
}

fn import_export(file: &Arc<CompiledFile>, name: &str) -> Result<RuntimeValue, VmError> {
    let export = file.exports.get(name).ok_or_else(|| VmError::UnknownExport {
        path: file.path.clone(),
        name: name.to_string(),
    })?;
    let value = match export {
        CompiledExport::Error { position, error } => RuntimeValue::BadValue {
            position: position.clone(),
            error: error.clone(),
        },
        CompiledExport::Constraint { constraint } => RuntimeValue::TypeConstraint(constraint.clone()),
        CompiledExport::Function {
            procedure_index,
            function_type,
        } => RuntimeValue::Function(Arc::new(RuntimeFunction {
            name: Some(name.to_string()),
            file: file.clone(),
            procedure_index: *procedure_index,
            function_type: function_type.clone(),
            captured_values: Vec::new(),
        })),
        CompiledExport::NativeFunction(native) => RuntimeValue::NativeFunction(native.clone()),
        CompiledExport::Value { value, .. } => match value {
            CompiledConstant::Text(text) => RuntimeValue::Text(text.clone()),
            CompiledConstant::Number(number) => RuntimeValue::Number(*number),
            CompiledConstant::Error { position, error } => RuntimeValue::BadValue {
                position: position.clone(),
                error: error.clone(),
            },
            CompiledConstant::Type(constraint) => RuntimeValue::TypeConstraint(constraint.clone()),
        },
    };
    Ok(value)
}

fn runaway_loop_signal() -> Result<RuntimeValue, VmError> {
    stdlib_registry::builtin_type("RunawayLoop")
        .map(|canonical| RuntimeValue::TypeConstraint(ValueLangType::Instance(canonical.clone())))
        .ok_or_else(|| VmError::Internal("RunawayLoop is not registered".into()))
}

fn check_native_arguments(
    name: &str,
    function_type: &ValueLangType,
    args: &[RuntimeValue],
) -> Result<(), VmError> {
    let ValueLangType::Function { params, .. } = function_type else {
        return Ok(());
    };
    for (param, arg) in params.iter().zip(args) {
        if let Some(constraint) = param.constraint.resolved() {
            if !arg.is_assignable_to(constraint) {
                return Err(VmError::InvalidNativeArgument {
                    name: name.to_string(),
                    reason: format!("{} expects {constraint}, received {arg}", param.name),
                });
            }
        }
    }
    Ok(())
}

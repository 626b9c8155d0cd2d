//=====================================================
// File: vm/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Resumable stack virtual machine for CauseLang
// Objective: Run an exported function until it returns or causes a signal no
//            handler resolves, then wait for the embedder to resume it
//=====================================================

mod runtime;
mod value;

pub use value::{RuntimeFunction, RuntimeObject, RuntimeValue};

use crate::bundle::CodeBundle;
use crate::bytecode::{CompiledExport, CompiledFile};
use crate::config::VmOptions;
use crate::errors::VmError;
use crate::types::{ConstraintReference, ValueLangType};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use tracing::debug;

/// Lifecycle of a VM instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    Ready,
    Running,
    /// A signal was caused and no handler was registered for it.
    PausedOnSignal,
    /// Every handler that saw the signal rejected it.
    UnhandledSignal,
    Returned,
}

impl fmt::Display for VmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VmState::Ready => "ready",
            VmState::Running => "running",
            VmState::PausedOnSignal => "paused on signal",
            VmState::UnhandledSignal => "unhandled signal",
            VmState::Returned => "returned",
        };
        f.write_str(label)
    }
}

/// Why execution handed control back to the embedder.
#[derive(Debug, Clone, PartialEq)]
pub enum RunResult {
    Returned(RuntimeValue),
    /// A signal nobody resolved; resume with a value of its result type.
    Caused(RuntimeValue),
}

impl RunResult {
    pub fn returned(&self) -> Option<&RuntimeValue> {
        match self {
            RunResult::Returned(value) => Some(value),
            RunResult::Caused(_) => None,
        }
    }

    pub fn caused(&self) -> Option<&RuntimeValue> {
        match self {
            RunResult::Caused(signal) => Some(signal),
            RunResult::Returned(_) => None,
        }
    }
}

/// A handler registered by `RegisterEffect`, linked to the handlers that were
/// active before it.
#[derive(Debug)]
pub(crate) struct EffectEntry {
    pub(crate) file: Arc<CompiledFile>,
    pub(crate) procedure_index: usize,
    /// Frame that registered the handler; its locals are what the handler body sees.
    pub(crate) exists_in: usize,
    pub(crate) parent: Option<Rc<EffectEntry>>,
}

#[derive(Debug, Clone)]
pub(crate) struct LoopEntry {
    pub(crate) start: usize,
    pub(crate) end: usize,
    pub(crate) stack_height: usize,
    pub(crate) effects: Option<Rc<EffectEntry>>,
    pub(crate) iterations: u64,
}

/// How a frame came to exist. The frame's caller or cause parent is always
/// the frame directly beneath it.
#[derive(Debug, Clone)]
pub(crate) enum FrameKind {
    Main,
    Call,
    Cause {
        exists_in: usize,
        effect: Rc<EffectEntry>,
    },
}

#[derive(Debug)]
pub(crate) struct StackFrame {
    pub(crate) kind: FrameKind,
    pub(crate) file: Arc<CompiledFile>,
    pub(crate) procedure_index: usize,
    pub(crate) ip: usize,
    /// Which operand stack this frame runs on. Calls share their caller's.
    pub(crate) stack_index: usize,
    /// Slot 0 of this frame within its stack.
    pub(crate) stack_start: usize,
    pub(crate) effects: Option<Rc<EffectEntry>>,
    pub(crate) loops: Vec<LoopEntry>,
    pub(crate) pending_signal: Option<RuntimeValue>,
}

pub struct LangVm {
    bundle: Arc<CodeBundle>,
    options: VmOptions,
    state: VmState,
    frames: Vec<StackFrame>,
    stacks: Vec<Vec<RuntimeValue>>,
}

impl LangVm {
    pub fn new(bundle: Arc<CodeBundle>, options: VmOptions) -> Self {
        Self {
            bundle,
            options,
            state: VmState::Ready,
            frames: Vec::new(),
            stacks: Vec::new(),
        }
    }

    pub fn state(&self) -> VmState {
        self.state
    }

    pub fn bundle(&self) -> &Arc<CodeBundle> {
        &self.bundle
    }

    /// Start running the function `name` exported by `path`.
    pub fn execute_function(
        &mut self,
        path: &str,
        name: &str,
        args: Vec<RuntimeValue>,
    ) -> Result<RunResult, VmError> {
        if !matches!(self.state, VmState::Ready | VmState::Returned) {
            return Err(VmError::NotReady);
        }
        let file = self.bundle.require_file(path)?;
        let export = file
            .exports
            .get(name)
            .ok_or_else(|| VmError::UnknownExport {
                path: path.to_string(),
                name: name.to_string(),
            })?;

        match export {
            CompiledExport::Function {
                procedure_index,
                function_type,
            } => {
                check_argument_count(name, function_type, args.len())?;
                let function = RuntimeValue::Function(Arc::new(RuntimeFunction {
                    name: Some(name.to_string()),
                    file: file.clone(),
                    procedure_index: *procedure_index,
                    function_type: function_type.clone(),
                    captured_values: Vec::new(),
                }));
                let mut stack = Vec::with_capacity(args.len() + 1);
                stack.push(function);
                stack.extend(args);
                self.stacks = vec![stack];
                self.frames = vec![StackFrame {
                    kind: FrameKind::Main,
                    file: file.clone(),
                    procedure_index: *procedure_index,
                    ip: 0,
                    stack_index: 0,
                    stack_start: 0,
                    effects: None,
                    loops: Vec::new(),
                    pending_signal: None,
                }];
                debug!(path, name, "executing function");
                self.state = VmState::Running;
                self.run()
            }
            CompiledExport::NativeFunction(native) => {
                check_argument_count(name, &native.function_type, args.len())?;
                let value = native.call(&args)?;
                self.state = VmState::Returned;
                Ok(RunResult::Returned(value))
            }
            _ => Err(VmError::NotAFunction {
                name: name.to_string(),
            }),
        }
    }

    /// Continue after an unresolved signal, using `value` as the signal's result.
    pub fn resume_execution(&mut self, value: RuntimeValue) -> Result<RunResult, VmError> {
        if !matches!(
            self.state,
            VmState::PausedOnSignal | VmState::UnhandledSignal
        ) {
            return Err(VmError::NotWaitingForSignal);
        }
        let frame = self
            .frames
            .last_mut()
            .ok_or_else(|| VmError::Internal("paused without a frame".into()))?;
        let signal = frame
            .pending_signal
            .take()
            .ok_or(VmError::NotWaitingForSignal)?;
        if let Err(error) = check_signal_result(&signal, &value) {
            frame.pending_signal = Some(signal);
            return Err(error);
        }
        let stack_index = frame.stack_index;
        self.stacks
            .get_mut(stack_index)
            .ok_or_else(|| VmError::Internal("paused frame lost its stack".into()))?
            .push(value);
        debug!("resuming execution");
        self.state = VmState::Running;
        self.run()
    }

    /// Reset the runaway-loop counters of every active loop, e.g. after the
    /// embedder has seen progress.
    pub fn report_tick(&mut self) {
        for frame in &mut self.frames {
            for entry in &mut frame.loops {
                entry.iterations = 0;
            }
        }
    }

    /// The active frames, most recent call last.
    pub fn execution_trace(&self) -> String {
        let mut lines = Vec::with_capacity(self.frames.len());
        for frame in &self.frames {
            let Some(procedure) = frame.file.procedures.get(frame.procedure_index) else {
                continue;
            };
            let location = procedure
                .source_map
                .get(frame.ip.saturating_sub(1))
                .map(|entry| format!("{} line {}", frame.file.path, entry.position.start))
                .unwrap_or_else(|| frame.file.path.clone());
            let kind = match frame.kind {
                FrameKind::Main => "main",
                FrameKind::Call => "call",
                FrameKind::Cause { .. } => "handler",
            };
            lines.push(format!("{kind}: {} ({location})", procedure.identity));
        }
        lines.join("\n")
    }
}

fn check_argument_count(
    name: &str,
    function_type: &ValueLangType,
    received: usize,
) -> Result<(), VmError> {
    if let ValueLangType::Function { params, .. } = function_type {
        if params.len() != received {
            return Err(VmError::WrongArgumentCount {
                name: name.to_string(),
                expected: params.len(),
                received,
            });
        }
    }
    Ok(())
}

/// A handler or embedder may only resolve a signal with a value of its result type.
pub(crate) fn check_signal_result(
    signal: &RuntimeValue,
    value: &RuntimeValue,
) -> Result<(), VmError> {
    let canonical = signal
        .signal_type()
        .ok_or_else(|| VmError::Internal(format!("{signal} is not a signal")))?;
    match canonical.signal_result() {
        Some(ConstraintReference::Resolved(result)) if value.is_assignable_to(result) => Ok(()),
        Some(ConstraintReference::Resolved(result)) => Err(VmError::InvalidResumeValue(format!(
            "{} expects {result}, received {value}",
            canonical.id()
        ))),
        _ => Err(VmError::InvalidResumeValue(format!(
            "{} has no usable result type",
            canonical.id()
        ))),
    }
}

#[cfg(test)]
mod tests {
    mod control_flow_tests;
}

//=====================================================
// File: lib.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: CauseLang language core
// Objective: Analyzer, resolver, bytecode compiler, and resumable VM for a
//            language whose only I/O is caused signals
//=====================================================

pub mod analyzer;
pub mod ast;
pub mod bundle;
pub mod bytecode;
pub mod compiler;
pub mod config;
pub mod errors;
pub mod logging;
pub mod resolver;
pub mod stdlib_registry;
pub mod types;
pub mod vm;

pub use bundle::{CodeBundle, CodeBundleBuilder, compile_file};
pub use config::{NativeArgumentCheck, VmOptions};
pub use errors::{CompileError, PersistError, VmError};
pub use vm::{LangVm, RunResult, RuntimeValue, VmState};

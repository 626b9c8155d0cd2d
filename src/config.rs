//=====================================================
// File: config.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Virtual machine options
// Objective: Runaway-loop limits, instruction tracing, and native argument
//            checking, loadable from TOML
//=====================================================

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// When native function arguments are type checked before dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeArgumentCheck {
    /// Only when the bundle carries diagnostics, since clean code is already checked.
    #[default]
    WhenDiagnostics,
    Always,
    Never,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmOptions {
    /// Iterations a single loop may run between ticks before it raises
    /// `RunawayLoop`. `None` disables the check.
    pub runaway_loop_threshold: Option<u64>,
    /// Log every dispatched instruction at trace level.
    pub trace_instructions: bool,
    pub check_native_arguments: NativeArgumentCheck,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            runaway_loop_threshold: Some(5000),
            trace_instructions: false,
            check_native_arguments: NativeArgumentCheck::default(),
        }
    }
}

impl VmOptions {
    pub fn with_runaway_loop_threshold(mut self, threshold: Option<u64>) -> Self {
        self.runaway_loop_threshold = threshold;
        self
    }

    pub fn with_trace_instructions(mut self, trace: bool) -> Self {
        self.trace_instructions = trace;
        self
    }

    pub fn with_native_argument_check(mut self, check: NativeArgumentCheck) -> Self {
        self.check_native_arguments = check;
        self
    }

    pub fn from_toml_str(source: &str) -> anyhow::Result<Self> {
        toml::from_str(source).context("parsing VM options")
    }

    /// Load options from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading VM options from {}", path.display()))?;
        toml::from_str(&data).with_context(|| format!("parsing VM options {}", path.display()))
    }

    pub(crate) fn should_check_native_arguments(&self, has_diagnostics: bool) -> bool {
        match self.check_native_arguments {
            NativeArgumentCheck::WhenDiagnostics => has_diagnostics,
            NativeArgumentCheck::Always => true,
            NativeArgumentCheck::Never => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let options = VmOptions::from_toml_str("trace_instructions = true").expect("valid toml");
        assert!(options.trace_instructions);
        assert_eq!(options.runaway_loop_threshold, Some(5000));
        assert_eq!(
            options.check_native_arguments,
            NativeArgumentCheck::WhenDiagnostics
        );
    }

    #[test]
    fn native_check_policy() {
        let options = VmOptions::default();
        assert!(!options.should_check_native_arguments(false));
        assert!(options.should_check_native_arguments(true));
        let never = options.with_native_argument_check(NativeArgumentCheck::Never);
        assert!(!never.should_check_native_arguments(true));
    }
}

//=====================================================
// File: bytecode/native.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Host functions exported by built-in files
// Objective: Bind native functions by qualified name so compiled files can
//            be persisted and rebound on load
//=====================================================

use crate::errors::VmError;
use crate::stdlib_registry;
use crate::types::ValueLangType;
use crate::vm::RuntimeValue;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub type NativeFn = fn(&[RuntimeValue]) -> Result<RuntimeValue, VmError>;

/// A host function exported by a built-in file.
#[derive(Clone)]
pub struct NativeFunction {
    pub path: String,
    pub name: String,
    pub function_type: ValueLangType,
    pub function: NativeFn,
}

impl NativeFunction {
    pub fn call(&self, args: &[RuntimeValue]) -> Result<RuntimeValue, VmError> {
        (self.function)(args)
    }

    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.path, self.name)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("path", &self.path)
            .field("name", &self.name)
            .finish()
    }
}

impl PartialEq for NativeFunction {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.name == other.name
    }
}

#[derive(Serialize, Deserialize)]
struct NativeFunctionRef {
    path: String,
    name: String,
}

// Natives persist by name and are re-bound from the built-in registry on load.
impl Serialize for NativeFunction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        NativeFunctionRef {
            path: self.path.clone(),
            name: self.name.clone(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for NativeFunction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let reference = NativeFunctionRef::deserialize(deserializer)?;
        stdlib_registry::native_function(&reference.path, &reference.name).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "unknown native function {}::{}",
                reference.path, reference.name
            ))
        })
    }
}

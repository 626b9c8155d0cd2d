//==================================================
// File: stdlib_registry.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Built-in CauseLang files synthesized as compiled values
// Objective: Provide core, math, and text exports through a process-wide
//            read-only registry shared by every file and VM instance
//==================================================

use crate::bytecode::{CompiledExport, CompiledFile, NativeFn, NativeFunction};
use crate::errors::VmError;
use crate::resolver::ExternalFileDescriptor;
use crate::types::{
    CanonicalLangType, CanonicalLangTypeId, ConstraintReference, LangParameter, ObjectField,
    PrimitiveKind, ValueLangType,
};
use crate::vm::RuntimeValue;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const BUILTIN_PATH: &str = "core/builtin.cau";
pub const MATH_PATH: &str = "core/math.cau";
pub const TEXT_PATH: &str = "core/text.cau";

const CORE_PREFIX: &str = "core/";

//==================================================
// Section 1.0 - Registry Types
//==================================================

struct BuiltinRegistry {
    files: BTreeMap<String, Arc<CompiledFile>>,
    descriptors: BTreeMap<String, ExternalFileDescriptor>,
}

static REGISTRY: Lazy<BuiltinRegistry> = Lazy::new(BuiltinRegistry::build);

impl BuiltinRegistry {
    fn build() -> Self {
        let files = [builtin_file(), math_file(), text_file()];
        let descriptors = files
            .iter()
            .map(|file| (file.path.clone(), file.to_file_descriptor()))
            .collect();
        let files = files
            .into_iter()
            .map(|file| (file.path.clone(), Arc::new(file)))
            .collect();
        Self { files, descriptors }
    }
}

//==================================================
// Section 2.0 - Lookups
//==================================================

pub fn is_builtin_path(path: &str) -> bool {
    path.starts_with(CORE_PREFIX)
}

pub fn builtin_files() -> impl Iterator<Item = &'static Arc<CompiledFile>> {
    REGISTRY.files.values()
}

pub fn file(path: &str) -> Option<&'static Arc<CompiledFile>> {
    REGISTRY.files.get(path)
}

pub fn descriptor(path: &str) -> Option<&'static ExternalFileDescriptor> {
    REGISTRY.descriptors.get(path)
}

/// Every built-in export name with the file it comes from. These names are in
/// scope in every file without an import.
pub fn global_names() -> impl Iterator<Item = (&'static str, &'static str)> {
    REGISTRY.files.values().flat_map(|file| {
        file.exports
            .keys()
            .map(move |name| (name.as_str(), file.path.as_str()))
    })
}

pub fn native_function(path: &str, name: &str) -> Option<NativeFunction> {
    match REGISTRY.files.get(path)?.exports.get(name)? {
        CompiledExport::NativeFunction(native) => Some(native.clone()),
        _ => None,
    }
}

/// A canonical type declared in `core/builtin.cau`.
pub fn builtin_type(name: &str) -> Option<&'static CanonicalLangType> {
    REGISTRY
        .files
        .get(BUILTIN_PATH)?
        .types
        .get(&CanonicalLangTypeId::new(BUILTIN_PATH, name))
}

/// `True` or `False` as a runtime value.
pub fn get_binary_answer(answer: bool) -> RuntimeValue {
    let (canonical, name) = if answer {
        (builtin_type("True"), "True")
    } else {
        (builtin_type("False"), "False")
    };
    let canonical = canonical
        .cloned()
        .unwrap_or_else(|| unique_object(name));
    RuntimeValue::TypeConstraint(ValueLangType::Instance(canonical))
}

//==================================================
// Section 3.0 - Type Helpers
//==================================================

fn resolved(value: ValueLangType) -> ConstraintReference {
    ConstraintReference::Resolved(value)
}

fn text_type() -> ValueLangType {
    ValueLangType::Primitive(PrimitiveKind::Text)
}

fn number_type() -> ValueLangType {
    ValueLangType::Primitive(PrimitiveKind::Number)
}

fn unique_object(name: &str) -> CanonicalLangType {
    CanonicalLangType::Object {
        id: CanonicalLangTypeId::new(BUILTIN_PATH, name),
        name: name.to_string(),
        fields: Vec::new(),
    }
}

fn signal(name: &str, fields: &[(&str, ValueLangType)], result: ValueLangType) -> CanonicalLangType {
    CanonicalLangType::Signal {
        id: CanonicalLangTypeId::new(BUILTIN_PATH, name),
        name: name.to_string(),
        fields: fields
            .iter()
            .map(|(field, constraint)| ObjectField {
                name: field.to_string(),
                constraint: resolved(constraint.clone()),
            })
            .collect(),
        result: Box::new(resolved(result)),
    }
}

fn binary_answer_type() -> ValueLangType {
    ValueLangType::Option(vec![
        resolved(ValueLangType::Instance(unique_object("True"))),
        resolved(ValueLangType::Instance(unique_object("False"))),
    ])
}

fn native(
    path: &str,
    name: &str,
    params: &[(&str, ValueLangType)],
    returns: ValueLangType,
    function: NativeFn,
) -> (String, CompiledExport) {
    let function_type = ValueLangType::Function {
        name: Some(name.to_string()),
        return_constraint: Box::new(resolved(returns)),
        params: params
            .iter()
            .map(|(param, constraint)| LangParameter {
                name: param.to_string(),
                constraint: resolved(constraint.clone()),
            })
            .collect(),
    };
    (
        name.to_string(),
        CompiledExport::NativeFunction(NativeFunction {
            path: path.to_string(),
            name: name.to_string(),
            function_type,
            function,
        }),
    )
}

fn constraint_export(name: &str, constraint: ValueLangType) -> (String, CompiledExport) {
    (name.to_string(), CompiledExport::Constraint { constraint })
}

fn synthesized(path: &str, types: Vec<CanonicalLangType>, exports: Vec<(String, CompiledExport)>) -> CompiledFile {
    CompiledFile {
        path: path.to_string(),
        types: types
            .into_iter()
            .map(|canonical| (canonical.id().clone(), canonical))
            .collect(),
        procedures: Vec::new(),
        exports: exports.into_iter().collect(),
    }
}

//==================================================
// Section 4.0 - Built-in Files
//==================================================

fn builtin_file() -> CompiledFile {
    let types = vec![
        unique_object("True"),
        unique_object("False"),
        signal("Debug", &[("value", ValueLangType::Anything)], ValueLangType::Action),
        signal(
            "TypeError",
            &[("bad_value", ValueLangType::BadValue)],
            ValueLangType::NeverContinues,
        ),
        signal(
            "AssumptionBroken",
            &[("message", text_type())],
            ValueLangType::NeverContinues,
        ),
        signal("RunawayLoop", &[], ValueLangType::NeverContinues),
    ];

    let mut exports = vec![
        constraint_export("Text", text_type()),
        constraint_export("Number", number_type()),
        constraint_export("Action", ValueLangType::Action),
        constraint_export("Anything", ValueLangType::Anything),
        constraint_export("AnySignal", ValueLangType::AnySignal),
        constraint_export("BinaryAnswer", binary_answer_type()),
        native(
            BUILTIN_PATH,
            "equals",
            &[("this", ValueLangType::Anything), ("that", ValueLangType::Anything)],
            binary_answer_type(),
            native_equals,
        ),
    ];
    exports.extend(types.iter().map(|canonical| {
        constraint_export(canonical.name(), ValueLangType::Instance(canonical.clone()))
    }));
    synthesized(BUILTIN_PATH, types, exports)
}

fn math_file() -> CompiledFile {
    let pair = [("this", number_type()), ("that", number_type())];
    let exports = vec![
        native(MATH_PATH, "add", &pair, number_type(), native_add),
        native(MATH_PATH, "subtract", &pair, number_type(), native_subtract),
        native(MATH_PATH, "multiply", &pair, number_type(), native_multiply),
        native(MATH_PATH, "divide", &pair, number_type(), native_divide),
        native(MATH_PATH, "greater_than", &pair, binary_answer_type(), native_greater_than),
        native(MATH_PATH, "less_than", &pair, binary_answer_type(), native_less_than),
    ];
    synthesized(MATH_PATH, Vec::new(), exports)
}

fn text_file() -> CompiledFile {
    let exports = vec![
        native(
            TEXT_PATH,
            "append",
            &[("this", text_type()), ("that", text_type())],
            text_type(),
            native_append,
        ),
        native(
            TEXT_PATH,
            "number_to_text",
            &[("number", number_type())],
            text_type(),
            native_number_to_text,
        ),
    ];
    synthesized(TEXT_PATH, Vec::new(), exports)
}

//==================================================
// Section 5.0 - Native Functions
//==================================================

fn argument<'a>(name: &str, args: &'a [RuntimeValue], index: usize) -> Result<&'a RuntimeValue, VmError> {
    args.get(index).ok_or_else(|| VmError::InvalidNativeArgument {
        name: name.to_string(),
        reason: format!("missing argument {index}"),
    })
}

fn number_argument(name: &str, args: &[RuntimeValue], index: usize) -> Result<f64, VmError> {
    match argument(name, args, index)? {
        RuntimeValue::Number(value) => Ok(*value),
        other => Err(VmError::InvalidNativeArgument {
            name: name.to_string(),
            reason: format!("expected a number, found {other}"),
        }),
    }
}

fn text_argument<'a>(name: &str, args: &'a [RuntimeValue], index: usize) -> Result<&'a str, VmError> {
    match argument(name, args, index)? {
        RuntimeValue::Text(value) => Ok(value),
        other => Err(VmError::InvalidNativeArgument {
            name: name.to_string(),
            reason: format!("expected text, found {other}"),
        }),
    }
}

fn native_equals(args: &[RuntimeValue]) -> Result<RuntimeValue, VmError> {
    let this = argument("equals", args, 0)?;
    let that = argument("equals", args, 1)?;
    Ok(get_binary_answer(this == that))
}

fn native_add(args: &[RuntimeValue]) -> Result<RuntimeValue, VmError> {
    Ok(RuntimeValue::Number(
        number_argument("add", args, 0)? + number_argument("add", args, 1)?,
    ))
}

fn native_subtract(args: &[RuntimeValue]) -> Result<RuntimeValue, VmError> {
    Ok(RuntimeValue::Number(
        number_argument("subtract", args, 0)? - number_argument("subtract", args, 1)?,
    ))
}

fn native_multiply(args: &[RuntimeValue]) -> Result<RuntimeValue, VmError> {
    Ok(RuntimeValue::Number(
        number_argument("multiply", args, 0)? * number_argument("multiply", args, 1)?,
    ))
}

fn native_divide(args: &[RuntimeValue]) -> Result<RuntimeValue, VmError> {
    Ok(RuntimeValue::Number(
        number_argument("divide", args, 0)? / number_argument("divide", args, 1)?,
    ))
}

fn native_greater_than(args: &[RuntimeValue]) -> Result<RuntimeValue, VmError> {
    Ok(get_binary_answer(
        number_argument("greater_than", args, 0)? > number_argument("greater_than", args, 1)?,
    ))
}

fn native_less_than(args: &[RuntimeValue]) -> Result<RuntimeValue, VmError> {
    Ok(get_binary_answer(
        number_argument("less_than", args, 0)? < number_argument("less_than", args, 1)?,
    ))
}

fn native_append(args: &[RuntimeValue]) -> Result<RuntimeValue, VmError> {
    let this = text_argument("append", args, 0)?;
    let that = text_argument("append", args, 1)?;
    Ok(RuntimeValue::Text(format!("{this}{that}")))
}

fn native_number_to_text(args: &[RuntimeValue]) -> Result<RuntimeValue, VmError> {
    Ok(RuntimeValue::Text(
        number_argument("number_to_text", args, 0)?.to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_names_are_global() {
        let names: Vec<(&str, &str)> = global_names().collect();
        assert!(names.contains(&("Debug", BUILTIN_PATH)));
        assert!(names.contains(&("add", MATH_PATH)));
        assert!(names.contains(&("append", TEXT_PATH)));
    }

    #[test]
    fn natives_compute() {
        let add = native_function(MATH_PATH, "add").expect("add is registered");
        let sum = add
            .call(&[RuntimeValue::Number(2.0), RuntimeValue::Number(3.0)])
            .expect("add succeeds");
        assert_eq!(sum, RuntimeValue::Number(5.0));

        let to_text = native_function(TEXT_PATH, "number_to_text").expect("registered");
        let rendered = to_text
            .call(&[RuntimeValue::Number(2.0)])
            .expect("conversion succeeds");
        assert_eq!(rendered, RuntimeValue::text("2"));
    }

    #[test]
    fn binary_answers_fit_binary_answer_type() {
        assert!(get_binary_answer(true).is_assignable_to(&binary_answer_type()));
        assert_ne!(get_binary_answer(true), get_binary_answer(false));
    }
}

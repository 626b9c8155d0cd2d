// Shared helpers for the integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use causelang::ast::FileNode;
use causelang::{CodeBundle, CodeBundleBuilder, LangVm, RunResult, RuntimeValue, VmOptions};

pub const MAIN: &str = "project/main.cau";

pub fn bundle_of(files: Vec<(&str, FileNode)>) -> Arc<CodeBundle> {
    let mut builder = CodeBundleBuilder::new();
    for (path, file) in files {
        builder.add_file(path, file);
    }
    Arc::new(builder.build().expect("bundle should compile"))
}

pub fn start(bundle: Arc<CodeBundle>, options: VmOptions) -> (LangVm, RunResult) {
    let mut vm = LangVm::new(bundle, options);
    let result = vm
        .execute_function(MAIN, "main", Vec::new())
        .expect("main should run");
    (vm, result)
}

/// Compile `program` as the only project file and run its `main`.
pub fn run_main(program: FileNode) -> (LangVm, RunResult) {
    start(bundle_of(vec![(MAIN, program)]), VmOptions::default())
}

pub fn signal_name(signal: &RuntimeValue) -> String {
    signal
        .signal_type()
        .map(|canonical| canonical.name().to_string())
        .unwrap_or_else(|| panic!("{signal} is not a signal"))
}

pub fn field(value: &RuntimeValue, name: &str) -> RuntimeValue {
    let object = value
        .as_object()
        .unwrap_or_else(|| panic!("{value} is not an object"));
    object
        .field(name)
        .cloned()
        .unwrap_or_else(|| panic!("{value} has no field {name}"))
}

mod util;

use causelang::ast::FileNode;
use causelang::ast::build::*;
use causelang::types::ErrorLangType;
use causelang::{CodeBundleBuilder, RunResult, RuntimeValue, VmOptions};
use util::{MAIN, bundle_of, field, run_main, signal_name, start};

const GREETING: &str = "project/greeting.cau";

fn greeting_file() -> FileNode {
    file(vec![
        function(
            "greet",
            single(expr(cause(call(ident("Debug"), vec![text("hi")])))),
        ),
        let_value("salutation", text("hello")),
        signal_type("Ask", &[("question", "Text")], "Text"),
    ])
}

#[test]
fn imported_function_causes_from_its_own_file() {
    let main = file(vec![
        import("project/greeting", &["greet"]),
        function("main", single(expr(call(ident("greet"), Vec::new())))),
    ]);
    let bundle = bundle_of(vec![(MAIN, main), (GREETING, greeting_file())]);
    assert!(!bundle.has_diagnostics(), "{:?}", bundle.diagnostics());

    let (mut vm, result) = start(bundle, VmOptions::default());
    let signal = result.caused().expect("greet causes Debug");
    assert_eq!(signal_name(signal), "Debug");
    assert_eq!(field(signal, "value"), RuntimeValue::text("hi"));
    assert_eq!(
        vm.resume_execution(RuntimeValue::Action).expect("resume"),
        RunResult::Returned(RuntimeValue::Action)
    );
}

#[test]
fn files_compile_regardless_of_the_order_they_are_added() {
    let main = file(vec![
        import_as("./greeting", &[("salutation", "word")]),
        function("main", single(expr(ident("word")))),
    ]);
    let mut builder = CodeBundleBuilder::new();
    builder.add_file(MAIN, main);
    assert_eq!(builder.required_file_paths(), vec![GREETING.to_string()]);
    builder.add_file(GREETING, greeting_file());
    assert!(builder.required_file_paths().is_empty());

    let bundle = std::sync::Arc::new(builder.build().expect("build"));
    let (_, result) = start(bundle, VmOptions::default());
    assert_eq!(result, RunResult::Returned(RuntimeValue::text("hello")));
}

#[test]
fn imported_signal_type_can_be_handled() {
    let main = file(vec![
        import("./greeting", &["Ask"]),
        function(
            "main",
            block(vec![
                effect(Some("asked"), "Ask", single(expr(member(ident("asked"), "question")))),
                expr(cause(call(ident("Ask"), vec![text("shared")]))),
            ]),
        ),
    ]);
    let bundle = bundle_of(vec![(MAIN, main), (GREETING, greeting_file())]);
    assert!(!bundle.has_diagnostics(), "{:?}", bundle.diagnostics());

    let id = bundle
        .files()
        .find(|compiled| compiled.path == GREETING)
        .and_then(|compiled| compiled.types.keys().next().cloned())
        .expect("greeting declares Ask");
    assert_eq!(id.path, GREETING);
    assert_eq!(bundle.get_type(&id).map(|canonical| canonical.is_signal()), Some(true));

    let (_, result) = start(bundle, VmOptions::default());
    assert_eq!(result, RunResult::Returned(RuntimeValue::text("shared")));
}

#[test]
fn missing_file_and_export_are_diagnosed() {
    let main = file(vec![
        import("./absent", &["nothing"]),
        import("./greeting", &["unknown"]),
        function("main", single(expr(call(ident("nothing"), Vec::new())))),
    ]);
    let bundle = bundle_of(vec![(MAIN, main), (GREETING, greeting_file())]);
    let errors: Vec<&ErrorLangType> = bundle
        .diagnostics()
        .iter()
        .map(|diagnostic| &diagnostic.error)
        .collect();
    assert!(errors.contains(&&ErrorLangType::FileNotFound));
    assert!(errors.contains(&&ErrorLangType::ExportNotFound));

    let (_, result) = start(bundle, VmOptions::default());
    let signal = result.caused().expect("calling a missing import raises");
    assert_eq!(signal_name(signal), "TypeError");
}

#[test]
fn import_above_the_project_root_is_invalid() {
    let main = file(vec![
        import("../outside", &["thing"]),
        function("main", single(expr(text("still runs")))),
    ]);
    let bundle = bundle_of(vec![(MAIN, main)]);
    assert!(
        bundle
            .diagnostics()
            .iter()
            .any(|diagnostic| diagnostic.error == ErrorLangType::ImportPathInvalid)
    );

    let (_, result) = start(bundle, VmOptions::default());
    assert_eq!(result, RunResult::Returned(RuntimeValue::text("still runs")));
}

#[test]
fn builtin_files_can_be_imported_explicitly() {
    let program = file(vec![
        import("core/text", &["append"]),
        function(
            "main",
            single(expr(call(
                ident("append"),
                vec![text("cause"), text("lang")],
            ))),
        ),
    ]);

    let (_, result) = run_main(program);
    assert_eq!(result, RunResult::Returned(RuntimeValue::text("causelang")));
}

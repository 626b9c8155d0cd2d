mod util;

use causelang::ast::build::*;
use causelang::types::ErrorLangType;
use causelang::{LangVm, RuntimeValue, VmError, VmOptions};
use util::{MAIN, bundle_of, field, run_main, signal_name};

fn bad_value_error(value: &RuntimeValue) -> ErrorLangType {
    match value {
        RuntimeValue::BadValue { error, .. } => error.clone(),
        other => panic!("expected a bad value, found {other}"),
    }
}

#[test]
fn branch_without_match_or_else_raises_type_error() {
    let program = file(vec![function(
        "main",
        single(expr(branch(
            None,
            vec![when(
                call(ident("equals"), vec![number(1.0), number(2.0)]),
                single(expr(text("same"))),
            )],
        ))),
    )]);
    let bundle = bundle_of(vec![(MAIN, program)]);
    assert!(
        bundle
            .diagnostics()
            .iter()
            .any(|diagnostic| diagnostic.error == ErrorLangType::MissingElseBranch)
    );

    let (_, result) = util::start(bundle, VmOptions::default());
    let signal = result.caused().expect("no arm matched");
    assert_eq!(signal_name(signal), "TypeError");
    assert_eq!(
        bad_value_error(&field(signal, "bad_value")),
        ErrorLangType::MissingElseBranch
    );
}

#[test]
fn writing_an_outer_variable_raises_type_error() {
    let program = file(vec![function(
        "main",
        block(vec![
            decl(let_variable("x", number(1.0))),
            decl(let_value(
                "bump",
                lambda(Vec::new(), None, block(vec![set("x", number(2.0))])),
            )),
            expr(call(ident("bump"), Vec::new())),
            expr(ident("x")),
        ]),
    )]);
    let bundle = bundle_of(vec![(MAIN, program)]);
    assert!(
        bundle
            .diagnostics()
            .iter()
            .any(|diagnostic| diagnostic.error == ErrorLangType::OuterVariable)
    );

    let (_, result) = util::start(bundle, VmOptions::default());
    let signal = result.caused().expect("the write is refused at runtime");
    assert_eq!(signal_name(signal), "TypeError");
    assert_eq!(
        bad_value_error(&field(signal, "bad_value")),
        ErrorLangType::OuterVariable
    );
}

#[test]
fn unknown_name_flows_as_a_bad_value() {
    let program = file(vec![function("main", single(expr(ident("missing"))))]);
    let bundle = bundle_of(vec![(MAIN, program)]);

    let diagnostic = bundle
        .diagnostics()
        .iter()
        .find(|diagnostic| diagnostic.error == ErrorLangType::NotInScope)
        .expect("the unknown name is reported");
    assert_eq!(diagnostic.error.code().as_str(), "E001");
    assert_eq!(
        diagnostic.error.message(),
        "I can't find anything with this name in scope."
    );

    let (_, result) = util::start(bundle, VmOptions::default());
    let returned = result.returned().expect("a bad value is still a value");
    assert_eq!(bad_value_error(returned), ErrorLangType::NotInScope);
}

#[test]
fn incompatible_branch_arms_produce_a_bad_value() {
    let program = file(vec![function(
        "main",
        single(expr(branch(
            None,
            vec![
                when(
                    call(ident("equals"), vec![number(1.0), number(1.0)]),
                    single(expr(text("text"))),
                ),
                otherwise(single(expr(number(1.0)))),
            ],
        ))),
    )]);

    let (_, result) = run_main(program);
    let returned = result.returned().expect("main returns");
    assert!(matches!(
        bad_value_error(returned),
        ErrorLangType::IncompatibleTypes { types } if types.len() == 2
    ));
}

#[test]
fn branching_on_a_bad_value_aborts_execution() {
    let program = file(vec![function(
        "main",
        single(expr(branch(
            None,
            vec![
                when(ident("missing"), single(expr(text("a")))),
                otherwise(single(expr(text("b")))),
            ],
        ))),
    )]);
    let mut vm = LangVm::new(bundle_of(vec![(MAIN, program)]), VmOptions::default());

    assert!(matches!(
        vm.execute_function(MAIN, "main", Vec::new()),
        Err(VmError::BadValueUsed(_))
    ));
}

#[test]
fn type_errors_cannot_be_resumed() {
    let program = file(vec![function(
        "main",
        single(expr(call(number(1.0), Vec::new()))),
    )]);

    let (mut vm, result) = run_main(program);
    assert_eq!(signal_name(result.caused().expect("raised")), "TypeError");
    assert!(matches!(
        vm.resume_execution(RuntimeValue::Action),
        Err(VmError::InvalidResumeValue(_))
    ));
}

//=============================================
// causelang/vm/tests/control_flow_tests.rs
//=============================================
// Purpose: Validate VM support for loops, breaks, and branches in compiled
//          procedures.
//=============================================

use std::sync::Arc;

use crate::ast::FileNode;
use crate::ast::build::*;
use crate::bundle::CodeBundleBuilder;
use crate::config::VmOptions;
use crate::types::ErrorLangType;
use crate::vm::{LangVm, RunResult, RuntimeValue, VmState};

const MAIN: &str = "project/main.cau";

fn run_main(program: FileNode, options: VmOptions) -> (LangVm, RunResult) {
    let mut builder = CodeBundleBuilder::new();
    builder.add_file(MAIN, program);
    let bundle = builder.build().expect("build bundle");
    let mut vm = LangVm::new(Arc::new(bundle), options);
    let result = vm
        .execute_function(MAIN, "main", Vec::new())
        .expect("run program");
    (vm, result)
}

#[test]
fn loop_breaks_with_counted_value() {
    let program = file(vec![function(
        "main",
        block(vec![
            decl(let_variable("n", number(0.0))),
            expr(loop_body(block(vec![
                set("n", call(ident("add"), vec![ident("n"), number(1.0)])),
                expr(branch(
                    None,
                    vec![
                        when(
                            call(ident("equals"), vec![ident("n"), number(5.0)]),
                            single(expr(break_with(Some(ident("n"))))),
                        ),
                        otherwise(block(Vec::new())),
                    ],
                )),
            ]))),
        ]),
    )]);

    let (vm, result) = run_main(program, VmOptions::default());
    assert_eq!(result, RunResult::Returned(RuntimeValue::Number(5.0)));
    assert_eq!(vm.state(), VmState::Returned);
}

#[test]
fn return_inside_loop_leaves_the_function() {
    let program = file(vec![
        function_with(
            "first_over",
            vec![typed_param("limit", "Number")],
            None,
            block(vec![
                decl(let_variable("n", number(0.0))),
                expr(loop_body(block(vec![
                    set("n", call(ident("add"), vec![ident("n"), number(3.0)])),
                    expr(branch(
                        None,
                        vec![
                            when(
                                call(ident("greater_than"), vec![ident("n"), ident("limit")]),
                                single(expr(return_value(Some(ident("n"))))),
                            ),
                            otherwise(block(Vec::new())),
                        ],
                    )),
                ]))),
            ]),
        ),
        function(
            "main",
            single(expr(call(ident("first_over"), vec![number(10.0)]))),
        ),
    ]);

    let (_, result) = run_main(program, VmOptions::default());
    assert_eq!(result, RunResult::Returned(RuntimeValue::Number(12.0)));
}

#[test]
fn endless_loop_raises_runaway_loop() {
    let program = file(vec![function(
        "main",
        single(expr(loop_body(block(Vec::new())))),
    )]);

    let options = VmOptions::default().with_runaway_loop_threshold(Some(10));
    let (vm, result) = run_main(program, options);
    let signal = result.caused().expect("loop should be stopped");
    let signal_type = signal.signal_type().expect("RunawayLoop is a signal");
    assert_eq!(signal_type.name(), "RunawayLoop");
    assert_eq!(vm.state(), VmState::PausedOnSignal);
}

#[test]
fn unmatched_branch_without_else_raises_type_error() {
    let program = file(vec![function(
        "main",
        single(expr(branch(
            Some(number(1.0)),
            vec![is_type(None, "Text", single(expr(text("text"))))],
        ))),
    )]);

    let (_, result) = run_main(program, VmOptions::default());
    let signal = result.caused().expect("branch should raise");
    let RuntimeValue::Object(error) = signal else {
        panic!("expected a TypeError object, found {signal}");
    };
    assert_eq!(error.type_descriptor.name(), "TypeError");
    assert!(matches!(
        error.field("bad_value"),
        Some(RuntimeValue::BadValue {
            error: ErrorLangType::MissingElseBranch,
            ..
        })
    ));
}

#[test]
fn is_branch_binds_the_matched_value() {
    let program = file(vec![function(
        "main",
        single(expr(branch(
            Some(text("hello")),
            vec![
                is_type(Some("greeting"), "Text", single(expr(ident("greeting")))),
                otherwise(single(expr(text("other")))),
            ],
        ))),
    )]);

    let (_, result) = run_main(program, VmOptions::default());
    assert_eq!(result, RunResult::Returned(RuntimeValue::text("hello")));
}

//=============================================
// End of file
//=============================================

mod util;

use causelang::ast::build::*;
use causelang::{RunResult, RuntimeValue, VmError, VmState};
use util::{field, run_main, signal_name};

fn ask_signal() -> causelang::ast::DeclarationNode {
    signal_type("Ask", &[("question", "Text")], "Text")
}

fn cause_ask(question: &str) -> causelang::ast::ExpressionNode {
    cause(call(ident("Ask"), vec![text(question)]))
}

#[test]
fn debug_pauses_and_resumes_with_action() {
    let program = file(vec![function(
        "main",
        single(expr(cause(call(ident("Debug"), vec![text("x")])))),
    )]);

    let (mut vm, result) = run_main(program);
    let signal = result.caused().expect("Debug should reach the embedder");
    assert_eq!(signal_name(signal), "Debug");
    assert_eq!(field(signal, "value"), RuntimeValue::text("x"));
    assert_eq!(vm.state(), VmState::PausedOnSignal);

    let resumed = vm
        .resume_execution(RuntimeValue::Action)
        .expect("Action answers Debug");
    assert_eq!(resumed, RunResult::Returned(RuntimeValue::Action));
    assert_eq!(vm.state(), VmState::Returned);
}

#[test]
fn reassigned_variable_is_seen_by_later_reads() {
    let program = file(vec![function(
        "main",
        block(vec![
            decl(let_variable("x", number(1.0))),
            set("x", number(2.0)),
            expr(cause(call(ident("Debug"), vec![ident("x")]))),
        ]),
    )]);

    let (_, result) = run_main(program);
    let signal = result.caused().expect("Debug should pause");
    assert_eq!(field(signal, "value"), RuntimeValue::Number(2.0));
}

#[test]
fn innermost_handler_answers_first() {
    let program = file(vec![
        ask_signal(),
        function(
            "main",
            block(vec![
                effect(None, "Ask", single(expr(text("outer")))),
                effect(None, "Ask", single(expr(text("inner")))),
                expr(cause_ask("who?")),
            ]),
        ),
    ]);

    let (_, result) = run_main(program);
    assert_eq!(result, RunResult::Returned(RuntimeValue::text("inner")));
}

#[test]
fn rejected_signal_is_offered_to_the_next_handler() {
    let program = file(vec![
        ask_signal(),
        signal_type("Other", &[], "Text"),
        function(
            "main",
            block(vec![
                effect(None, "Ask", single(expr(text("outer")))),
                effect(None, "Other", single(expr(text("other")))),
                expr(cause_ask("who?")),
            ]),
        ),
    ]);

    let (_, result) = run_main(program);
    assert_eq!(result, RunResult::Returned(RuntimeValue::text("outer")));
}

#[test]
fn signal_rejected_by_every_handler_can_still_be_resumed() {
    let program = file(vec![
        ask_signal(),
        signal_type("Other", &[], "Text"),
        function(
            "main",
            block(vec![
                effect(None, "Other", single(expr(text("other")))),
                expr(cause_ask("who?")),
            ]),
        ),
    ]);

    let (mut vm, result) = run_main(program);
    let signal = result.caused().expect("nobody handles Ask");
    assert_eq!(signal_name(signal), "Ask");
    assert_eq!(vm.state(), VmState::UnhandledSignal);

    let resumed = vm
        .resume_execution(RuntimeValue::text("embedder"))
        .expect("Text answers Ask");
    assert_eq!(resumed, RunResult::Returned(RuntimeValue::text("embedder")));
}

#[test]
fn handler_sees_the_signal_it_matched() {
    let program = file(vec![
        ask_signal(),
        function(
            "main",
            block(vec![
                effect(
                    Some("asked"),
                    "Ask",
                    single(expr(member(ident("asked"), "question"))),
                ),
                expr(cause_ask("echo")),
            ]),
        ),
    ]);

    let (_, result) = run_main(program);
    assert_eq!(result, RunResult::Returned(RuntimeValue::text("echo")));
}

#[test]
fn handler_reads_and_writes_locals_of_its_function() {
    let program = file(vec![function(
        "main",
        block(vec![
            decl(let_variable("count", number(0.0))),
            effect(
                None,
                "Debug",
                block(vec![set(
                    "count",
                    call(ident("add"), vec![ident("count"), number(1.0)]),
                )]),
            ),
            expr(cause(call(ident("Debug"), vec![text("a")]))),
            expr(cause(call(ident("Debug"), vec![text("b")]))),
            expr(ident("count")),
        ]),
    )]);

    let (_, result) = run_main(program);
    assert_eq!(result, RunResult::Returned(RuntimeValue::Number(2.0)));
}

#[test]
fn caller_handler_catches_signal_from_callee() {
    let program = file(vec![
        ask_signal(),
        function("ask", single(expr(cause_ask("from callee")))),
        function(
            "main",
            block(vec![
                effect(None, "Ask", single(expr(text("answered")))),
                expr(call(ident("ask"), Vec::new())),
            ]),
        ),
    ]);

    let (_, result) = run_main(program);
    assert_eq!(result, RunResult::Returned(RuntimeValue::text("answered")));
}

#[test]
fn resume_value_must_match_the_signal_result() {
    let program = file(vec![function(
        "main",
        single(expr(cause(call(ident("Debug"), vec![text("x")])))),
    )]);

    let (mut vm, _) = run_main(program);
    let error = vm
        .resume_execution(RuntimeValue::Number(1.0))
        .expect_err("Debug only accepts Action");
    assert!(matches!(error, VmError::InvalidResumeValue(_)));
    assert_eq!(vm.state(), VmState::PausedOnSignal);

    let resumed = vm
        .resume_execution(RuntimeValue::Action)
        .expect("the signal is still waiting");
    assert_eq!(resumed, RunResult::Returned(RuntimeValue::Action));
}

#[test]
fn resuming_a_finished_vm_is_an_error() {
    let program = file(vec![function("main", single(expr(text("done"))))]);

    let (mut vm, result) = run_main(program);
    assert_eq!(result, RunResult::Returned(RuntimeValue::text("done")));
    assert!(matches!(
        vm.resume_execution(RuntimeValue::Action),
        Err(VmError::NotWaitingForSignal)
    ));
}

#[test]
fn paused_signal_renders_as_json() {
    let program = file(vec![function(
        "main",
        single(expr(cause(call(ident("Debug"), vec![number(3.0)])))),
    )]);

    let (_, result) = run_main(program);
    let json = result.caused().expect("Debug pauses").to_json();
    assert_eq!(json["#type"], "core/builtin.cau:Debug");
    assert_eq!(json["value"], 3.0);
    assert_eq!(RuntimeValue::Action.to_json()["#type"], "Action");
}

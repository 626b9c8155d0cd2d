mod util;

use causelang::analyzer::analyze_file;
use causelang::analyzer::tags::{AnalyzedNode, BadWriteKind, NodeTag};
use causelang::ast::Breadcrumbs;
use causelang::ast::FileNode;
use causelang::ast::build::*;
use causelang::stdlib_registry::{BUILTIN_PATH, MATH_PATH};
use util::MAIN;

fn analyze(program: &FileNode) -> AnalyzedNode {
    analyze_file(MAIN, program)
}

fn at(text: &str) -> Breadcrumbs {
    Breadcrumbs::parse(text)
}

fn below(base: &Breadcrumbs, steps: &str) -> Breadcrumbs {
    steps
        .split('.')
        .fold(base.clone(), |crumbs, step| crumbs.append_name(step))
}

#[test]
fn every_paired_tag_has_its_inverse() {
    let program = file(vec![
        signal_type("Ask", &[("question", "Text")], "Text"),
        function_with(
            "main",
            vec![typed_param("name", "Text")],
            Some("Text"),
            block(vec![
                decl(let_variable("count", number(0.0))),
                effect(Some("asked"), "Ask", single(expr(member(ident("asked"), "question")))),
                set("count", call(ident("add"), vec![ident("count"), number(1.0)])),
                expr(loop_body(single(expr(break_with(None))))),
                decl(let_value(
                    "echo",
                    lambda(Vec::new(), None, single(expr(ident("name")))),
                )),
                expr(return_value(Some(cause(call(ident("Ask"), vec![ident("name")]))))),
            ]),
        ),
    ]);
    let analyzed = analyze(&program);

    for (breadcrumbs, tags) in &analyzed.node_tags {
        for tag in tags {
            if let Some((target, inverse)) = tag.inverse(breadcrumbs) {
                assert!(
                    analyzed.has_tag(&target, &inverse),
                    "{tag:?} at {breadcrumbs} has no inverse at {target}"
                );
            }
        }
    }
}

#[test]
fn captures_are_recorded_on_every_enclosing_function() {
    let inner = lambda(Vec::new(), None, single(expr(ident("base"))));
    let outer = lambda(Vec::new(), None, single(expr(call(inner, Vec::new()))));
    let program = file(vec![function(
        "main",
        block(vec![
            decl(let_value("base", number(1.0))),
            decl(let_value("outer", outer)),
        ]),
    )]);
    let analyzed = analyze(&program);

    let base = at("declarations.0.body.statements.0.declaration");
    let outer_at = at("declarations.0.body.statements.1.declaration.value");
    let inner_at = below(&outer_at, "body.statement.expression.callee");
    assert_eq!(analyzed.captured_values(&outer_at), vec![&base]);
    assert_eq!(analyzed.captured_values(&inner_at), vec![&base]);

    let use_at = below(&inner_at, "body.statement.expression");
    assert!(analyzed.has_tag(
        &use_at,
        &NodeTag::UsesCapturedValue {
            function: inner_at.clone()
        }
    ));
    assert_eq!(analyzed.value_source(&use_at), Some(&base));
}

#[test]
fn writes_to_values_are_flagged() {
    let program = file(vec![function(
        "main",
        block(vec![
            decl(let_value("fixed", number(1.0))),
            decl(let_variable("count", number(0.0))),
            set("fixed", number(2.0)),
            set("count", number(3.0)),
        ]),
    )]);
    let analyzed = analyze(&program);

    let bad = at("declarations.0.body.statements.2");
    assert!(analyzed.has_tag(
        &bad,
        &NodeTag::SetsVariable {
            variable: at("declarations.0.body.statements.0.declaration")
        }
    ));
    assert!(analyzed.has_tag(
        &bad,
        &NodeTag::BadVariableWrite {
            kind: BadWriteKind::NotVariable
        }
    ));

    let good = at("declarations.0.body.statements.3");
    assert!(analyzed.has_tag(
        &good,
        &NodeTag::SetsVariable {
            variable: at("declarations.0.body.statements.1.declaration")
        }
    ));
    assert!(
        !analyzed
            .tags(&good)
            .iter()
            .any(|tag| matches!(tag, NodeTag::BadVariableWrite { .. }))
    );
}

#[test]
fn builtin_names_reference_their_files() {
    let program = file(vec![function(
        "main",
        single(expr(cause(call(
            ident("Debug"),
            vec![call(ident("add"), vec![number(1.0), number(2.0)])],
        )))),
    )]);
    let analyzed = analyze(&program);

    let call_at = at("declarations.0.body.statement.expression.signal");
    assert_eq!(
        analyzed.file_reference(&call_at.append_name("callee")),
        Some((BUILTIN_PATH, Some("Debug")))
    );
    let add_at = call_at
        .append_name("parameters")
        .append_index(0)
        .append_name("value")
        .append_name("callee");
    assert_eq!(analyzed.file_reference(&add_at), Some((MATH_PATH, Some("add"))));
    // Builtins are always loaded, so they are not import dependencies.
    assert!(analyzed.files_referenced.is_empty());
}

#[test]
fn imports_are_normalized_and_collected() {
    let program = file(vec![
        import("./util", &["helper"]),
        import("../outside", &["thing"]),
        function("main", single(expr(call(ident("helper"), Vec::new())))),
    ]);
    let analyzed = analyze(&program);

    assert_eq!(
        analyzed.files_referenced.iter().collect::<Vec<_>>(),
        vec!["project/util.cau"]
    );
    assert_eq!(
        analyzed.file_reference(&at("declarations.0.mappings.0")),
        Some(("project/util.cau", Some("helper")))
    );
    assert!(analyzed.has_tag(&at("declarations.1"), &NodeTag::BadFileReference));
    assert_eq!(
        analyzed.value_source(&at("declarations.2.body.statement.expression.callee")),
        Some(&at("declarations.0.mappings.0"))
    );
}

#[test]
fn locals_are_visible_only_after_their_declaration() {
    let program = file(vec![
        function(
            "main",
            block(vec![
                expr(ident("later")),
                decl(let_value("later", number(1.0))),
                expr(call(ident("helper"), Vec::new())),
            ]),
        ),
        function("helper", single(expr(text("hoisted")))),
    ]);
    let analyzed = analyze(&program);

    assert!(analyzed.has_tag(
        &at("declarations.0.body.statements.0.expression"),
        &NodeTag::NotInScope
    ));
    let callee = at("declarations.0.body.statements.2.expression.callee");
    assert!(!analyzed.has_tag(&callee, &NodeTag::NotInScope));
    assert_eq!(analyzed.value_source(&callee), Some(&at("declarations.1")));
    assert_eq!(analyzed.top_level_name(&at("declarations.1")), Some("helper"));
}

#[test]
fn returns_and_breaks_point_at_their_targets() {
    let program = file(vec![function(
        "main",
        block(vec![
            expr(loop_body(single(expr(break_with(None))))),
            expr(return_value(Some(text("done")))),
            expr(return_value(None)),
        ]),
    )]);
    let analyzed = analyze(&program);

    let function_at = at("declarations.0");
    let loop_at = at("declarations.0.body.statements.0.expression");
    assert!(analyzed.has_tag(
        &loop_at,
        &NodeTag::LoopBreaksAt {
            breaker: below(&loop_at, "body.statement.expression")
        }
    ));
    assert!(analyzed.has_tag(
        &at("declarations.0.body.statements.1.expression.value"),
        &NodeTag::ReturnsFromFunction {
            function: function_at.clone()
        }
    ));
    assert!(analyzed.has_tag(
        &function_at,
        &NodeTag::FunctionCanReturnAction {
            returns: at("declarations.0.body.statements.2.expression")
        }
    ));
}

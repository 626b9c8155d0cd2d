mod util;

use std::collections::HashMap;

use causelang::analyzer::{NodeTag, analyze_file};
use causelang::ast::build::*;
use causelang::ast::{Breadcrumbs, FileNode};
use causelang::compile_file;
use causelang::resolver::{ExternalFileDescriptor, ResolvedFile, resolve_for_file};
use causelang::types::{
    ConstraintReference, ErrorLangType, LangType, PrimitiveKind, ValueLangType,
};
use util::MAIN;

fn resolve_with(
    program: &FileNode,
    external: &HashMap<String, ExternalFileDescriptor>,
) -> ResolvedFile {
    let analyzed = analyze_file(MAIN, program);
    resolve_for_file(MAIN, program, &analyzed, external).expect("resolution should converge")
}

fn resolve(program: &FileNode) -> ResolvedFile {
    resolve_with(program, &HashMap::new())
}

fn at(text: &str) -> Breadcrumbs {
    Breadcrumbs::parse(text)
}

fn errors(resolved: &ResolvedFile) -> Vec<&ErrorLangType> {
    resolved
        .diagnostics
        .iter()
        .map(|diagnostic| &diagnostic.error)
        .collect()
}

fn debug_program() -> FileNode {
    file(vec![function(
        "main",
        block(vec![
            decl(let_value(
                "sum",
                call(ident("add"), vec![number(1.0), number(2.0)]),
            )),
            expr(cause(call(ident("Debug"), vec![ident("sum")]))),
        ]),
    )])
}

#[test]
fn clean_program_resolves_every_expression() {
    let program = debug_program();
    let analyzed = analyze_file(MAIN, &program);
    let resolved = resolve_for_file(MAIN, &program, &analyzed, &HashMap::new()).expect("resolves");

    assert!(resolved.diagnostics.is_empty(), "{:?}", resolved.diagnostics);
    for (breadcrumbs, tags) in &analyzed.node_tags {
        if !tags.contains(&NodeTag::Expression) {
            continue;
        }
        let inferred = resolved
            .get_inferred_type(breadcrumbs)
            .unwrap_or_else(|| panic!("no type for {breadcrumbs}"));
        assert!(!inferred.is_pending(), "{breadcrumbs} never resolved");
        assert!(inferred.error().is_none(), "{breadcrumbs}: {inferred:?}");
    }

    assert_eq!(
        resolved.get_inferred_type(&at("declarations.0.body.statements.0.declaration")),
        Some(&LangType::Value(ValueLangType::Primitive(PrimitiveKind::Number)))
    );
    assert_eq!(
        resolved.get_inferred_type(&at("declarations.0.body.statements.1.expression")),
        Some(&LangType::Value(ValueLangType::Action))
    );
}

#[test]
fn resolution_is_deterministic() {
    let program = file(vec![
        signal_type("Ask", &[("question", "Text")], "Text"),
        object_type("Point", &[("x", "Number"), ("y", "Number")]),
        function(
            "main",
            block(vec![
                effect(None, "Ask", single(expr(text("answer")))),
                decl(let_value(
                    "point",
                    call(ident("Point"), vec![number(1.0), number(2.0)]),
                )),
                expr(cause(call(ident("Ask"), vec![ident("missing")]))),
            ]),
        ),
    ]);

    assert_eq!(resolve(&program), resolve(&program));
}

#[test]
fn errors_are_reported_once_and_proxied_downstream() {
    let program = file(vec![function(
        "main",
        block(vec![
            decl(let_value("a", ident("missing"))),
            decl(let_value("b", ident("a"))),
            expr(ident("b")),
        ]),
    )]);
    let resolved = resolve(&program);

    assert_eq!(errors(&resolved), vec![&ErrorLangType::NotInScope]);

    let chain_length = |breadcrumbs: &str| match resolved.get_inferred_type(&at(breadcrumbs)) {
        Some(LangType::Error(error @ ErrorLangType::ProxyError { proxy_chain, .. })) => {
            assert_eq!(error.root_cause(), &ErrorLangType::NotInScope);
            proxy_chain.len()
        }
        other => panic!("expected a proxied error at {breadcrumbs}, found {other:?}"),
    };
    let first = chain_length("declarations.0.body.statements.0.declaration");
    let second = chain_length("declarations.0.body.statements.1.declaration");
    let last = chain_length("declarations.0.body.statements.2.expression");
    assert!(first < second && second < last);
}

#[test]
fn annotations_that_disagree_are_mismatches() {
    let program = file(vec![function(
        "main",
        block(vec![
            decl(let_typed("count", "Number", text("three"))),
            effect(None, "Debug", single(expr(text("not an action")))),
        ]),
    )]);
    let resolved = resolve(&program);

    assert!(matches!(
        resolved.get_inferred_type(&at("declarations.0.body.statements.0.declaration")),
        Some(LangType::Error(ErrorLangType::MismatchedType { expected, .. }))
            if **expected == ValueLangType::Primitive(PrimitiveKind::Number)
    ));
    assert!(matches!(
        resolved.get_inferred_type(&at("declarations.0.body.statements.1")),
        Some(LangType::Error(ErrorLangType::MismatchedType { expected, .. }))
            if **expected == ValueLangType::Action
    ));
    assert_eq!(resolved.diagnostics.len(), 2);
}

#[test]
fn function_body_is_checked_against_its_return_annotation() {
    let program = file(vec![
        function_with("count", Vec::new(), Some("Number"), single(expr(text("hi")))),
        function("main", single(expr(call(ident("count"), Vec::new())))),
    ]);
    let resolved = resolve(&program);

    assert!(matches!(
        resolved.get_inferred_type(&at("declarations.0.body")),
        Some(LangType::Error(ErrorLangType::MismatchedType { expected, actual }))
            if **expected == ValueLangType::Primitive(PrimitiveKind::Number)
                && **actual == LangType::Value(ValueLangType::Primitive(PrimitiveKind::Text))
    ));
    assert_eq!(resolved.diagnostics.len(), 1, "{:?}", resolved.diagnostics);
    assert_eq!(
        resolved.get_inferred_type(&at("declarations.1.body.statement.expression")),
        Some(&LangType::Value(ValueLangType::Primitive(PrimitiveKind::Number)))
    );
}

#[test]
fn computed_top_level_values_are_reported() {
    let program = file(vec![
        let_value("ready", call(ident("equals"), vec![number(1.0), number(1.0)])),
        let_value("label", text("fine")),
        function("main", single(expr(ident("ready")))),
    ]);
    let resolved = resolve(&program);

    assert_eq!(
        errors(&resolved),
        vec![&ErrorLangType::ImplementationTodo {
            description: "top-level values must be literals".to_string()
        }]
    );
    assert!(matches!(
        resolved.get_inferred_type(&at("declarations.2.body.statement.expression")),
        Some(LangType::Error(error)) if error.is_proxy()
    ));
}

#[test]
fn signal_construction_checks_arity() {
    let program = file(vec![function(
        "main",
        single(expr(cause(call(ident("Debug"), Vec::new())))),
    )]);
    let resolved = resolve(&program);

    assert_eq!(
        resolved.get_inferred_type(&at("declarations.0.body.statement.expression.signal")),
        Some(&LangType::Error(ErrorLangType::MissingParameters {
            names: vec!["value".to_string()]
        }))
    );
}

#[test]
fn same_named_types_get_distinct_ids() {
    let program = file(vec![
        object_type("Point", &[("x", "Number")]),
        function(
            "main",
            block(vec![
                decl(object_type("Point", &[("label", "Text")])),
                expr(text("ok")),
            ]),
        ),
    ]);
    let resolved = resolve(&program);

    let ids: Vec<_> = resolved.canonical_types.keys().collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.iter().all(|id| id.path == MAIN && id.name == "Point"));
    assert_eq!(
        ids.iter().map(|id| id.number).collect::<Vec<_>>(),
        vec![0, 1]
    );
    let top_level = resolved
        .canonical_types
        .values()
        .find(|canonical| canonical.id().number == 0)
        .expect("top-level Point");
    assert_eq!(top_level.fields()[0].name, "x");
}

#[test]
fn unannotated_function_returns_a_union_of_its_exits() {
    let program = file(vec![function(
        "pick",
        block(vec![
            expr(branch(
                None,
                vec![
                    when(
                        call(ident("equals"), vec![number(1.0), number(1.0)]),
                        single(expr(return_value(Some(text("early"))))),
                    ),
                    otherwise(single(expr(text("fallthrough")))),
                ],
            )),
            expr(number(1.0)),
        ]),
    )]);
    let resolved = resolve(&program);
    assert!(resolved.diagnostics.is_empty(), "{:?}", resolved.diagnostics);

    let Some(LangType::Value(ValueLangType::Function {
        return_constraint, ..
    })) = resolved.get_inferred_type(&at("declarations.0"))
    else {
        panic!("pick should be a function");
    };
    let ConstraintReference::Resolved(ValueLangType::Option(options)) = &**return_constraint else {
        panic!("expected a union, found {return_constraint:?}");
    };
    let text = ConstraintReference::Resolved(ValueLangType::Primitive(PrimitiveKind::Text));
    let number = ConstraintReference::Resolved(ValueLangType::Primitive(PrimitiveKind::Number));
    assert_eq!(options.len(), 2);
    assert!(options.contains(&text) && options.contains(&number));
}

#[test]
fn other_files_are_seen_through_their_descriptors() {
    let greeting = file(vec![function("greet", single(expr(text("hi"))))]);
    let (compiled, diagnostics) =
        compile_file("project/greeting.cau", &greeting, &HashMap::new()).expect("compiles");
    assert!(diagnostics.is_empty());

    let program = file(vec![
        import("./greeting", &["greet"]),
        function("main", single(expr(call(ident("greet"), Vec::new())))),
    ]);
    let call_at = at("declarations.1.body.statement.expression");

    let blind = resolve(&program);
    assert!(errors(&blind).contains(&&ErrorLangType::FileNotFound));

    let external = HashMap::from([(
        "project/greeting.cau".to_string(),
        compiled.to_file_descriptor(),
    )]);
    let sighted = resolve_with(&program, &external);
    assert!(sighted.diagnostics.is_empty(), "{:?}", sighted.diagnostics);
    assert_eq!(
        sighted.get_inferred_type(&call_at),
        Some(&LangType::Value(ValueLangType::Primitive(PrimitiveKind::Text)))
    );
}

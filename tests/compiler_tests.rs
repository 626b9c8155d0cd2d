mod util;

use std::collections::HashMap;

use causelang::ast::FileNode;
use causelang::ast::build::*;
use causelang::bytecode::{
    CompiledConstant, CompiledExport, CompiledFile, Instruction, Procedure, ProcedureIdentity,
};
use causelang::compile_file;
use causelang::resolver::ResolverError;
use causelang::stdlib_registry::BUILTIN_PATH;
use causelang::types::ErrorLangType;
use util::MAIN;

fn compile(program: &FileNode) -> (CompiledFile, Vec<ResolverError>) {
    compile_file(MAIN, program, &HashMap::new()).expect("user errors never fail compilation")
}

fn exported_procedure<'a>(compiled: &'a CompiledFile, name: &str) -> &'a Procedure {
    match compiled.exports.get(name) {
        Some(CompiledExport::Function {
            procedure_index, ..
        }) => &compiled.procedures[*procedure_index],
        other => panic!("{name} is not an exported function: {other:?}"),
    }
}

#[test]
fn top_level_declarations_become_exports() {
    let program = file(vec![
        import("./other", &["unused"]),
        function("main", single(expr(text("hi")))),
        object_type("Point", &[("x", "Number")]),
        let_value("greeting", text("hello")),
        let_value("answer", number(42.0)),
        let_value("computed", call(ident("add"), vec![number(1.0), number(2.0)])),
    ]);
    let (compiled, diagnostics) = compile(&program);

    assert!(diagnostics.iter().any(|diagnostic| matches!(
        diagnostic.error,
        ErrorLangType::ImplementationTodo { .. }
    )));
    assert_eq!(
        compiled.exports.keys().collect::<Vec<_>>(),
        vec!["Point", "answer", "computed", "greeting", "main"]
    );
    assert!(matches!(
        compiled.exports["main"],
        CompiledExport::Function { .. }
    ));
    assert!(matches!(
        compiled.exports["Point"],
        CompiledExport::Constraint { .. }
    ));
    assert!(matches!(
        &compiled.exports["greeting"],
        CompiledExport::Value {
            value: CompiledConstant::Text(text),
            ..
        } if text == "hello"
    ));
    assert!(matches!(
        compiled.exports["answer"],
        CompiledExport::Value {
            value: CompiledConstant::Number(value),
            ..
        } if value == 42.0
    ));
    assert!(matches!(
        compiled.exports["computed"],
        CompiledExport::Error {
            error: ErrorLangType::ImplementationTodo { .. },
            ..
        }
    ));
    assert!(!compiled.exports.contains_key("unused"));
    assert_eq!(
        compiled.types.keys().map(|id| id.name.as_str()).collect::<Vec<_>>(),
        vec!["Point"]
    );
}

#[test]
fn every_instruction_has_a_source_map_entry() {
    let program = file(vec![
        signal_type("Ask", &[("question", "Text")], "Text"),
        function(
            "main",
            block(vec![
                decl(let_variable("count", number(0.0))),
                effect(Some("asked"), "Ask", single(expr(member(ident("asked"), "question")))),
                expr(loop_body(block(vec![
                    set("count", call(ident("add"), vec![ident("count"), number(1.0)])),
                    expr(break_with(None)),
                ]))),
                decl(let_value(
                    "speak",
                    lambda(Vec::new(), None, single(expr(ident("count")))),
                )),
                expr(cause(call(ident("Ask"), vec![text("why?")]))),
            ]),
        ),
    ]);
    let (compiled, _) = compile(&program);

    assert!(compiled.procedures.len() >= 3);
    for procedure in &compiled.procedures {
        assert_eq!(
            procedure.instructions.len(),
            procedure.source_map.len(),
            "{}",
            procedure.identity
        );
        assert!(
            !procedure.instructions.iter().any(|instruction| matches!(
                instruction,
                Instruction::Pop { number: 0 } | Instruction::PopScope { values: 0 }
            )),
            "{} emits an empty pop",
            procedure.identity
        );
    }
}

#[test]
fn effects_compile_into_their_own_procedure() {
    let program = file(vec![function(
        "main",
        block(vec![
            effect(None, "Debug", block(Vec::new())),
            expr(cause(call(ident("Debug"), vec![text("x")]))),
        ]),
    )]);
    let (compiled, diagnostics) = compile(&program);
    assert!(diagnostics.is_empty(), "{diagnostics:?}");

    let main = exported_procedure(&compiled, "main");
    let registered: Vec<usize> = main
        .instructions
        .iter()
        .filter_map(|instruction| match instruction {
            Instruction::RegisterEffect { procedure_index } => Some(*procedure_index),
            _ => None,
        })
        .collect();
    assert_eq!(registered.len(), 1);

    let handler = &compiled.procedures[registered[0]];
    assert!(matches!(
        handler.identity,
        ProcedureIdentity::Effect {
            matches_type: Some(_),
            ..
        }
    ));
    assert!(handler.instructions.contains(&Instruction::FinishEffect));
    assert!(main.instructions.contains(&Instruction::Cause));
    assert!(main.instructions.contains(&Instruction::PopEffects { number: 1 }));
}

#[test]
fn names_compile_to_imports_by_origin() {
    let program = file(vec![
        function("helper", single(expr(text("help")))),
        function(
            "main",
            single(expr(cause(call(
                ident("Debug"),
                vec![call(ident("helper"), Vec::new())],
            )))),
        ),
    ]);
    let (compiled, _) = compile(&program);
    let main = exported_procedure(&compiled, "main");

    let text_constant = |index: usize| match &main.constant_table[index] {
        CompiledConstant::Text(text) => text.as_str(),
        other => panic!("expected text, found {other:?}"),
    };
    let builtin_imports: Vec<(&str, &str)> = main
        .instructions
        .iter()
        .filter_map(|instruction| match instruction {
            Instruction::Import {
                file_path_constant,
                export_name_constant,
            } => Some((
                text_constant(*file_path_constant),
                text_constant(*export_name_constant),
            )),
            _ => None,
        })
        .collect();
    assert_eq!(builtin_imports, vec![(BUILTIN_PATH, "Debug")]);

    let local_imports: Vec<&str> = main
        .instructions
        .iter()
        .filter_map(|instruction| match instruction {
            Instruction::ImportSameFile {
                export_name_constant,
            } => Some(text_constant(*export_name_constant)),
            _ => None,
        })
        .collect();
    assert_eq!(local_imports, vec!["helper"]);
}

#[test]
fn repeated_literals_share_a_constant() {
    let program = file(vec![function(
        "main",
        block(vec![
            expr(text("echo")),
            expr(text("echo")),
            expr(number(7.0)),
            expr(number(7.0)),
        ]),
    )]);
    let (compiled, _) = compile(&program);
    let main = exported_procedure(&compiled, "main");

    let texts = main
        .constant_table
        .iter()
        .filter(|constant| **constant == CompiledConstant::Text("echo".into()))
        .count();
    let numbers = main
        .constant_table
        .iter()
        .filter(|constant| **constant == CompiledConstant::Number(7.0))
        .count();
    assert_eq!((texts, numbers), (1, 1));
}

#[test]
fn user_errors_compile_into_bad_value_constants() {
    let program = file(vec![function("main", single(expr(ident("missing"))))]);
    let (compiled, diagnostics) = compile(&program);

    assert!(
        diagnostics
            .iter()
            .any(|diagnostic| diagnostic.error == ErrorLangType::NotInScope)
    );
    let main = exported_procedure(&compiled, "main");
    assert!(main.constant_table.iter().any(|constant| matches!(
        constant,
        CompiledConstant::Error {
            error: ErrorLangType::NotInScope,
            ..
        }
    )));
}

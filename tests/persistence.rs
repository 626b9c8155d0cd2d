mod util;

use std::collections::HashMap;
use std::sync::Arc;

use causelang::ast::build::*;
use causelang::bytecode::{CompiledExport, CompiledFile};
use causelang::stdlib_registry::{self, MATH_PATH};
use causelang::{
    CodeBundleBuilder, PersistError, RunResult, RuntimeValue, VmOptions, compile_file,
};
use util::{MAIN, start};

const LIBRARY: &str = "project/library.cau";

fn library() -> CompiledFile {
    let source = file(vec![
        signal_type("Ask", &[("question", "Text")], "Text"),
        object_type("Point", &[("x", "Number"), ("y", "Number")]),
        let_value("greeting", text("hello")),
        function_with(
            "scale",
            vec![typed_param("n", "Number")],
            None,
            block(vec![
                decl(let_value(
                    "times",
                    lambda(
                        vec![typed_param("by", "Number")],
                        None,
                        single(expr(call(ident("multiply"), vec![ident("n"), ident("by")]))),
                    ),
                )),
                effect(None, "Debug", block(Vec::new())),
                expr(call(ident("times"), vec![number(10.0)])),
            ]),
        ),
    ]);
    let (compiled, diagnostics) =
        compile_file(LIBRARY, &source, &HashMap::new()).expect("library compiles");
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
    compiled
}

#[test]
fn compiled_file_survives_encoding() {
    let compiled = library();
    let bytes = compiled.serialize().expect("encodes");
    assert_eq!(&bytes[..4], b"CAUS");

    let decoded = CompiledFile::decode(&bytes[..]).expect("decodes");
    assert_eq!(decoded, compiled);
    assert_eq!(decoded.serialize().expect("encodes again"), bytes);
}

#[test]
fn compilation_output_is_reproducible() {
    assert_eq!(
        library().serialize().expect("encodes"),
        library().serialize().expect("encodes")
    );
}

#[test]
fn saved_file_links_against_new_sources() {
    let dir = tempfile::tempdir().expect("temp dir");
    let saved = dir.path().join("library.causec");
    library().save(&saved).expect("saves");
    let loaded = CompiledFile::load(&saved).expect("loads");

    let main = file(vec![
        import("./library", &["scale"]),
        function("main", single(expr(call(ident("scale"), vec![number(4.0)])))),
    ]);
    let mut builder = CodeBundleBuilder::new();
    builder.add_compiled_file(loaded).add_file(MAIN, main);
    assert!(builder.required_file_paths().is_empty());
    let bundle = Arc::new(builder.build().expect("builds"));
    assert!(!bundle.has_diagnostics(), "{:?}", bundle.diagnostics());

    let (_, result) = start(bundle, VmOptions::default());
    assert_eq!(result, RunResult::Returned(RuntimeValue::Number(40.0)));
}

#[test]
fn corrupt_headers_are_rejected() {
    let bytes = library().serialize().expect("encodes");

    let mut wrong_magic = bytes.clone();
    wrong_magic[..4].copy_from_slice(b"NOPE");
    assert!(matches!(
        CompiledFile::decode(&wrong_magic[..]),
        Err(PersistError::InvalidMagic)
    ));

    let mut wrong_version = bytes.clone();
    wrong_version[4..6].copy_from_slice(&99u16.to_le_bytes());
    assert!(matches!(
        CompiledFile::decode(&wrong_version[..]),
        Err(PersistError::UnsupportedVersion(99))
    ));

    assert!(matches!(
        CompiledFile::decode(&bytes[..bytes.len() - 1]),
        Err(PersistError::Io(_))
    ));

    let mut oversized = bytes[..6].to_vec();
    oversized.extend_from_slice(&u64::MAX.to_le_bytes());
    oversized.extend_from_slice(&bytes[14..]);
    assert!(matches!(
        CompiledFile::decode(&oversized[..]),
        Err(PersistError::Io(_))
    ));
}

#[test]
fn missing_file_reports_its_path() {
    let dir = tempfile::tempdir().expect("temp dir");
    let missing = dir.path().join("absent.causec");
    let error = CompiledFile::load(&missing).expect_err("nothing to load");
    assert!(format!("{error:#}").contains("absent.causec"));
}

#[test]
fn natives_are_rebound_after_decoding() {
    let math = stdlib_registry::file(MATH_PATH).expect("math is built in");
    let bytes = math.serialize().expect("encodes");
    let decoded = CompiledFile::decode(&bytes[..]).expect("decodes");

    let Some(CompiledExport::NativeFunction(add)) = decoded.exports.get("add") else {
        panic!("add should stay native");
    };
    assert_eq!(
        add.call(&[RuntimeValue::Number(2.0), RuntimeValue::Number(3.0)])
            .expect("add runs"),
        RuntimeValue::Number(5.0)
    );
}

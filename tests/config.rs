mod util;

use std::fs;

use causelang::ast::build::*;
use causelang::logging;
use causelang::{NativeArgumentCheck, RunResult, RuntimeValue, VmOptions};
use util::{MAIN, bundle_of, start};

#[test]
fn options_load_from_a_toml_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("vm.toml");
    fs::write(
        &path,
        "runaway_loop_threshold = 10\ntrace_instructions = true\ncheck_native_arguments = \"always\"\n",
    )
    .expect("writes options");

    let options = VmOptions::load(&path).expect("loads");
    assert_eq!(
        options,
        VmOptions::default()
            .with_runaway_loop_threshold(Some(10))
            .with_trace_instructions(true)
            .with_native_argument_check(NativeArgumentCheck::Always)
    );
}

#[test]
fn bad_options_name_the_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("broken.toml");
    fs::write(&path, "runaway_loop_threshold = \"lots\"").expect("writes options");

    let error = VmOptions::load(&path).expect_err("a threshold must be a number");
    assert!(format!("{error:#}").contains("broken.toml"));
    assert!(VmOptions::load(&dir.path().join("absent.toml")).is_err());
}

#[test]
fn traced_run_behaves_like_an_untraced_one() {
    let program = file(vec![function(
        "main",
        single(expr(call(ident("append"), vec![text("a"), text("b")]))),
    )]);
    let options = VmOptions::from_toml_str(
        "trace_instructions = true\ncheck_native_arguments = \"always\"",
    )
    .expect("valid options");
    logging::init_with("config-tests", &options);

    let (_, result) = start(bundle_of(vec![(MAIN, program)]), options);
    assert_eq!(result, RunResult::Returned(RuntimeValue::text("ab")));
}

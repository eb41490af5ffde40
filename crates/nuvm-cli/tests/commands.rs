use std::fs;

use nuvm_cli::{execute, inspect_module, read_module_input, run_module, AsmTask, Command, Input, Output, RunOptions};
use pretty_assertions::assert_eq;

const COUNTER: &str = "\
; compte jusqu'à 5
.procedure 6 6 {
    global-ref 1 1
    global-ref 2 2
    load-i16 0 0
    load-i16 3 1
    load-i16 4 5
  top:
    call 5 1 2 0 4
    jump-unless 5 @body
    return 0
  body:
    call 0 2 2 0 3
    jump @top
}
.fixnum32 0
.fixnum32 0
";

fn counter_opts() -> RunOptions {
    RunOptions {
        bindings: vec![(1, "fixnum.lt".to_owned()), (2, "fixnum.add".to_owned())],
        ..RunOptions::default()
    }
}

#[test]
fn asm_writes_next_to_the_source() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("counter.nasm");
    fs::write(&src, COUNTER).unwrap();

    let task = AsmTask { input: Input::Path(src.clone()), output: Output::Auto, ..AsmTask::default() };
    assert_eq!(execute(Command::Asm(task)).unwrap(), 0);

    let out = dir.path().join("counter.nuvm");
    assert_eq!(fs::read(&out).unwrap(), nuvm_asm::assemble(COUNTER).unwrap());

    let mut module = read_module_input(&Input::Path(out)).unwrap();
    assert_eq!(run_module(&mut module, &counter_opts()).unwrap().as_fixnum(), Some(5));
}

#[test]
fn asm_check_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("counter.nasm");
    fs::write(&src, COUNTER).unwrap();

    let task = AsmTask { input: Input::Path(src), output: Output::Auto, check: true, ..AsmTask::default() };
    execute(Command::Asm(task)).unwrap();
    assert!(!dir.path().join("counter.nuvm").exists());
}

#[test]
fn asm_errors_name_the_file_and_position() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("bad.nasm");
    fs::write(&src, ".procedure 0 0 {\n  bogus\n}\n").unwrap();

    let task = AsmTask { input: Input::Path(src), output: Output::Auto, ..AsmTask::default() };
    let msg = format!("{:#}", execute(Command::Asm(task)).unwrap_err());
    assert!(msg.contains("bad.nasm"), "{msg}");
    assert!(msg.contains("nuvm.UnexpectedToken: 2:3: "), "{msg}");
}

#[test]
fn sources_are_assembled_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("counter.nasm");
    fs::write(&src, COUNTER).unwrap();
    let mut module = read_module_input(&Input::Path(src)).unwrap();
    assert_eq!(run_module(&mut module, &counter_opts()).unwrap().as_fixnum(), Some(5));
}

#[test]
fn step_limit_is_an_error() {
    let mut module = nuvm_vm::load_module(&nuvm_asm::assemble(".procedure 0 0 { top: jump @top }").unwrap()).unwrap();
    let opts = RunOptions { max_steps: Some(50), ..RunOptions::default() };
    let msg = format!("{:#}", run_module(&mut module, &opts).unwrap_err());
    assert!(msg.contains("nuvm.Overflow"), "{msg}");
}

#[test]
fn inspect_json_lists_globals() {
    let module = nuvm_vm::load_module(&nuvm_asm::assemble(COUNTER).unwrap()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&inspect_module(&module, true).unwrap()).unwrap();
    assert_eq!(json["num_globals"], 3);
    assert_eq!(json["globals"][0]["kind"], "procedure");
    assert_eq!(json["globals"][0]["num_locals"], 6);
    assert_eq!(json["globals"][2]["kind"], "fixnum32");

    let text = inspect_module(&module, false).unwrap();
    assert!(text.starts_with("globals:     3\n"));
}

#[test]
fn corrupt_module_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.nuvm");
    fs::write(&path, [1, 0, 0, 0, 0, 0, 0x07]).unwrap();
    let msg = format!("{:#}", read_module_input(&Input::Path(path)).unwrap_err());
    assert!(msg.contains("nuvm.InvalidModuleFormat"), "{msg}");
}

#[test]
fn run_reports_the_returned_local() {
    let bytes = nuvm_asm::assemble(".procedure 2 2 { load-i16 0 7 load-i16 1 99 return 1 }").unwrap();
    let mut module = nuvm_vm::load_module(&bytes).unwrap();
    assert_eq!(run_module(&mut module, &RunOptions::default()).unwrap().as_fixnum(), Some(99));
}

#[test]
fn atomic_write_replaces_and_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("prog.nuvm");
    fs::write(&out, b"old contents").unwrap();
    nuvm_cli::write_bytes_atomic(&out, &[1, 2, 3]).unwrap();
    assert_eq!(fs::read(&out).unwrap(), [1, 2, 3]);
    let names: Vec<_> = fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
    assert_eq!(names, [std::ffi::OsString::from("prog.nuvm")]);
}

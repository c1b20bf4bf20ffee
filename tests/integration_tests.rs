//! Integration tests for end-to-end compilation.
//!
//! These tests drive the complete pipeline through the driver: loading and
//! import resolution, whole-program validation and assembly generation.
//! Toolchain invocation is only exercised for its failure path.

use std::{fs, path::Path};

use tempfile::TempDir;
use ucompiler::{
    driver::{check_program, load_program, run, Failure, Options},
    errors::errors::ErrorImpl,
};

fn write(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).unwrap();
}

fn options_for(dir: &TempDir, input: &str) -> Options {
    let mut options = Options::new(dir.path().join(input));
    options.lib_dir = dir.path().join("lib");
    options.output = dir.path().join("out");
    options.assemble = false;
    options
}

fn compile_to_assembly(options: &Options) -> String {
    match run(options) {
        Ok(()) => fs::read_to_string(options.assembly_path()).unwrap(),
        Err(failure) => panic!("compilation failed:\n{}", failure),
    }
}

fn report_of(options: &Options) -> String {
    match run(options) {
        Err(Failure::Report(report)) => report,
        Err(Failure::Fatal(error)) => panic!("unexpected fatal error: {}", error),
        Ok(()) => panic!("compilation unexpectedly succeeded"),
    }
}

#[test]
fn test_compile_empty_main() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.u", "void main() { return; }");
    let options = options_for(&dir, "main.u");

    let asm = compile_to_assembly(&options);

    assert!(asm.starts_with("global _start\nsection .text\n_start:\n    call main\n"));
    assert!(asm.contains("\n; module main\n"));
    assert!(asm.contains("\nmain:\n    push rbp\n    mov rbp, rsp\n"));
    assert!(asm.contains(".return:\n    mov rsp, rbp\n    pop rbp\n    ret\n"));
    assert!(!options.output.exists());
}

#[test]
fn test_compile_program_with_imports() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("lib")).unwrap();
    write(
        &dir.path().join("lib"),
        "io.u",
        "import asm \"rt.s\";\nextern void putchar(int64 c);\nvoid newline() { putchar(10); return; }",
    );
    write(&dir.path().join("lib"), "rt.s", "io.putchar:\n    ret");
    write(
        dir.path(),
        "util.u",
        "import \"io\";\nint64 twice(int64 x) { io:newline(); return x * 2; }",
    );
    write(
        dir.path(),
        "main.u",
        "import \"util\";\nimport \"io\";\nvoid main() { int64 y; y = util:twice(21); io:newline(); return; }",
    );
    let options = options_for(&dir, "main.u");

    let asm = compile_to_assembly(&options);

    let include = asm.find("io.putchar:\n    ret\n").unwrap();
    let io = asm.find("; module io").unwrap();
    let util = asm.find("; module util").unwrap();
    let main = asm.find("; module main").unwrap();
    assert!(include < io && io < util && util < main);
    assert_eq!(asm.matches("; module io").count(), 1);

    assert!(asm.contains("\nutil.twice:\n"));
    assert!(asm.contains("call $util.twice"));
    assert!(asm.contains("call $io.newline"));
    assert!(asm.contains("call $io.putchar"));
}

#[test]
fn test_load_order_puts_imports_first() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "c.u", "void f() { return; }");
    write(dir.path(), "b.u", "import \"c\";\nvoid g() { c:f(); return; }");
    write(
        dir.path(),
        "a.u",
        "import \"b\";\nimport \"c\";\nvoid main() { b:g(); c:f(); return; }",
    );

    let mut program = load_program(&dir.path().join("a.u"), &dir.path().join("lib")).unwrap();
    let names: Vec<String> = program
        .modules
        .iter()
        .map(|loaded| loaded.module.name.to_string())
        .collect();

    assert_eq!(names, vec!["c", "b", "a"]);
    assert_eq!(program.entry().unwrap().module.name.as_str(), "a");
    assert_eq!(check_program(&mut program), "");
}

#[test]
fn test_undefined_function_stops_before_codegen() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.u", "void main() {\n    foo();\n    return;\n}\n");
    let options = options_for(&dir, "main.u");

    let report = report_of(&options);

    assert_eq!(
        report,
        "main 2:4 Reference to undefined function: main:foo\n        foo();\n\n"
    );
    assert!(!options.assembly_path().exists());
}

#[test]
fn test_errors_from_several_modules_are_collected() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "util.u", "int64 f() { return true; }");
    write(
        dir.path(),
        "main.u",
        "import \"util\";\nvoid main() { int64 x; x = util:f(1); return; }",
    );
    let options = options_for(&dir, "main.u");

    let report = report_of(&options);

    let util = report.find("util 1:12 Expected return value").unwrap();
    let main = report.find("main 2:27 Invalid number of arguments").unwrap();
    assert!(util < main);
}

#[test]
fn test_missing_main() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "prog.u", "void helper() { return; }");
    let options = options_for(&dir, "prog.u");

    let report = report_of(&options);
    assert!(report.starts_with("prog 1:0 Reference to undefined function: prog:main\n"));
}

#[test]
fn test_missing_import() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.u", "import \"nope\";\nvoid main() { return; }");
    let options = options_for(&dir, "main.u");

    let report = report_of(&options);
    assert!(report.starts_with("main 1:0 Module or file not found: nope\n"));
}

#[test]
fn test_syntax_error_is_reported() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.u", "void main() {\n    x = 1\n}\n");
    let options = options_for(&dir, "main.u");

    let report = report_of(&options);
    assert!(report.starts_with("main 3:0 Unexpected token"));
}

#[test]
fn test_import_with_invalid_module_name() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "my-util.u", "void f() { return; }");
    write(dir.path(), "main.u", "import \"my-util\";\nvoid main() { return; }");
    let options = options_for(&dir, "main.u");

    let report = report_of(&options);
    assert!(report.starts_with("main 1:0 Invalid module name: my-util\n"));
    assert!(!options.assembly_path().exists());
}

#[test]
fn test_input_with_invalid_module_name_is_fatal() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "1st.u", "void main() { return; }");
    let options = options_for(&dir, "1st.u");

    match run(&options) {
        Err(Failure::Fatal(error)) => assert_eq!(error.get_error_name(), "InvalidModuleName"),
        _ => panic!("expected a fatal error"),
    }
}

#[test]
fn test_main_signature_only_binds_entry_module() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "util.u", "int64 main(int64 x) { return x; }");
    write(
        dir.path(),
        "main.u",
        "import \"util\";\nvoid main() { int64 y; y = util:main(1); return; }",
    );
    let options = options_for(&dir, "main.u");

    let asm = compile_to_assembly(&options);
    assert!(asm.contains("\nutil.main:\n"));
    assert!(asm.contains("call $util.main"));

    write(dir.path(), "main.u", "int64 main(int64 x) { return x; }");
    let report = report_of(&options);
    assert!(report.starts_with("main 1:0 main must be declared as 'void main()'\n"));
}

#[test]
fn test_array_return_stops_before_codegen() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "main.u",
        "int64[1] f() { int64[1] a; a[0] = 7; return a; }\n\
         void main() { int64 x; x = f()[0]; for (x in f()) { } return; }",
    );
    let options = options_for(&dir, "main.u");

    let report = report_of(&options);
    assert!(report.starts_with("main 1:0 Return type of function main:f must be a single 8-byte value"));
    assert!(!options.assembly_path().exists());
}

#[test]
fn test_missing_input_is_fatal() {
    let dir = TempDir::new().unwrap();
    let options = options_for(&dir, "absent.u");

    match run(&options) {
        Err(Failure::Fatal(error)) => assert_eq!(error.get_error_name(), "ModuleOrFileNotFound"),
        _ => panic!("expected a fatal error"),
    }
}

#[test]
fn test_tail_call_elimination_flag() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "main.u",
        "int64 sum(int64 n, int64 acc) { if (n == 0) { return acc; } return sum(n - 1, acc + n); }\n\
         void main() { int64 x; x = sum(100000, 0); return; }",
    );

    let mut options = options_for(&dir, "main.u");
    let asm = compile_to_assembly(&options);
    assert!(!asm.contains("jmp .tail_entry"));

    options.eliminate_tail_calls = true;
    let asm = compile_to_assembly(&options);
    assert!(asm.contains("jmp .tail_entry"));
}

#[test]
fn test_toolchain_failure_is_fatal() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.u", "void main() { return; }");
    let mut options = options_for(&dir, "main.u");
    options.assemble = true;
    options.assembler = "ucompiler-missing-assembler".to_string();

    match run(&options) {
        Err(Failure::Fatal(error)) => {
            assert!(matches!(error.kind(), ErrorImpl::ToolchainFailure { .. }))
        }
        _ => panic!("expected a toolchain failure"),
    }
    assert!(options.assembly_path().exists());
}

#[test]
fn test_options_from_args() {
    let args = ["--eliminate-tail-recursion", "-S", "--lib-dir", "std", "-o", "prog", "main.u"];
    let options = Options::from_args(args.iter().map(|arg| arg.to_string())).unwrap();

    assert!(options.eliminate_tail_calls);
    assert!(!options.assemble);
    assert_eq!(options.lib_dir, Path::new("std"));
    assert_eq!(options.output, Path::new("prog"));
    assert_eq!(options.assembly_path(), Path::new("prog.s"));
    assert_eq!(options.input, Path::new("main.u"));

    let defaults = Options::from_args(vec!["main.u".to_string()]).unwrap();
    assert_eq!(defaults.output, Path::new("output"));
    assert_eq!(defaults.assembly_path(), Path::new("output.s"));
    assert!(defaults.assemble);

    assert!(Options::from_args(Vec::<String>::new()).is_err());
    assert!(Options::from_args(vec!["--bogus".to_string()]).is_err());
}

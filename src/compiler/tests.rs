//! Unit tests for the code generator.
//!
//! Each test validates a small module and inspects the emitted assembly
//! text.

use std::rc::Rc;

use super::{
    compiler::{compile_module, Options},
    stdlib::startup_stub,
};
use crate::{
    ast::ast::FunctionArena,
    errors::errors::ErrorCollector,
    lexer::lexer::tokenize,
    parser::parser::parse,
    validator::{symbol_table::SymbolTable, validator::validate_module},
};

fn options(eliminate_tail_calls: bool) -> Options {
    Options {
        eliminate_tail_calls,
        entry_module: "test".to_string(),
    }
}

fn compile_with(source: &str, options: &Options) -> String {
    let name = Rc::new("test".to_string());
    let tokens = tokenize(source.to_string(), Some("test".to_string())).unwrap();
    let mut arena = FunctionArena::new();
    let module = parse(tokens, Rc::clone(&name), &mut arena).unwrap();

    let mut symbols = SymbolTable::new();
    let mut errors = ErrorCollector::new(name, Rc::new(source.to_string()));
    validate_module(&module, &mut arena, &mut symbols, &mut errors);
    assert!(errors.is_empty(), "{}", errors.get_error_string());

    compile_module(&module, &arena, options).unwrap()
}

fn compile(source: &str) -> String {
    compile_with(source, &options(false))
}

fn position_of(asm: &str, needle: &str) -> usize {
    asm.find(needle)
        .unwrap_or_else(|| panic!("`{}` not found in:\n{}", needle, asm))
}

#[test]
fn test_empty_main_keeps_stack_balanced() {
    let asm = compile("void main() { return; }");

    assert!(asm.contains(
        "main:\n    push rbp\n    mov rbp, rsp\n    jmp .return\n.return:\n    mov rsp, rbp\n    pop rbp\n    ret\n"
    ));
    assert_eq!(asm.matches("push").count(), asm.matches("pop").count());
    assert!(!asm.contains("sub rsp"));
}

#[test]
fn test_frame_reserves_arguments_locals_and_temporaries() {
    let asm = compile(
        "int64 add(int64 a, int64 b) { return a + b; }\n\
         void main() { int64 x; x = add(1 + 2, 3); return; }",
    );

    // 16 bytes of outgoing arguments, 8 of locals, 32 of temporaries.
    let main = &asm[position_of(&asm, "main:")..];
    assert!(main.contains("sub rsp, 56"));
    assert!(main.contains("mov qword [rsp+0], rax"));
    assert!(main.contains("mov qword [rsp+8], rax"));
    assert!(main.contains("call $test.add"));
}

#[test]
fn test_function_labels() {
    let asm = compile("int64 f(int64 a) { return a; } void main() { int64 x; x = f(1); return; }");

    assert!(asm.contains("\ntest.f:\n"));
    assert!(asm.contains("\nmain:\n"));
    assert!(asm.contains("; int64 f(int64 a)"));

    let asm = compile_with(
        "void main() { return; }",
        &Options {
            eliminate_tail_calls: false,
            entry_module: "other".to_string(),
        },
    );
    assert!(asm.contains("\ntest.main:\n"));
}

#[test]
fn test_arguments_and_locals_addressing() {
    let asm = compile("int64 f(int64 a, int64 b) { int64 x; x = b; return a; }");

    assert!(asm.contains("mov rax, [rbp+24]"));
    assert!(asm.contains("mov rax, [rbp+16]"));
    assert!(asm.contains("lea rax, [rbp-8]"));
}

#[test]
fn test_short_circuit_and() {
    let asm = compile("void main() { bool a, b, c; c = a && b; return; }");

    let load_a = position_of(&asm, "mov rax, [rbp-8]");
    let branch = position_of(&asm, "je .L");
    let load_b = position_of(&asm, "mov rax, [rbp-16]");
    assert!(load_a < branch);
    assert!(branch < load_b);
}

#[test]
fn test_short_circuit_or() {
    let asm = compile("void main() { bool a, b, c; c = a || b; return; }");

    let branch = position_of(&asm, "jne .L");
    let load_b = position_of(&asm, "mov rax, [rbp-16]");
    assert!(branch < load_b);
}

#[test]
fn test_arithmetic_and_comparison() {
    let asm = compile(
        "void main() { int64 x; bool b; x = 7 / 2; x = x % 3; x = x - 1; b = x < 2; return; }",
    );

    assert!(asm.contains("cqo\n    idiv rcx\n"));
    assert!(asm.contains("mov rax, rdx"));
    assert!(asm.contains("sub rax, rcx"));
    assert!(asm.contains("mov rax, 0\n    mov rcx, 1\n    cmovl rax, rcx\n"));
}

#[test]
fn test_unary_operators() {
    let asm = compile(
        "void main() { int64 x; int64* p; bool b; x = -x; b = !b; p = &x; *p = 3; return; }",
    );

    assert!(asm.contains("neg rax"));
    assert!(asm.contains("xor rax, 1"));
    assert!(asm.contains("lea rax, [rbp-8]"));
    // Storing through `*p` loads the pointer as the target address.
    assert!(asm.contains("mov rax, [rbp-16]\n    mov qword [rbp-32], rax\n    mov rax, 3\n"));
}

#[test]
fn test_array_indexing() {
    let asm = compile(
        "void main() { int64[4] a; int64[4]* pa; int64 x; pa = &a; a[1] = 5; x = pa[2]; return; }",
    );

    assert!(asm.contains("lea rax, [rbp-32]"));
    assert!(asm.contains("imul rax, 8"));
    // Indexing through the pointer loads it, then the element.
    assert!(asm.contains("mov rax, [rbp-40]\n    mov qword"));
    assert!(asm.contains("mov rax, [rax]"));
}

#[test]
fn test_tail_call_becomes_jump() {
    let source =
        "int64 fact(int64 n, int64 acc) { if (n <= 1) { return acc; } return fact(n - 1, acc * n); }\n\
         void main() { int64 x; x = fact(5, 1); return; }";

    let asm = compile_with(source, &options(true));
    let fact = &asm[position_of(&asm, "test.fact:")..position_of(&asm, "\nmain:")];
    assert!(fact.contains(".tail_entry:"));
    assert!(fact.contains("mov qword [rbp+16], rax"));
    assert!(fact.contains("mov qword [rbp+24], rax"));
    assert!(fact.contains("jmp .tail_entry"));
    assert!(!fact.contains("call"));

    // The call from main stays a real call.
    assert!(asm.contains("call $test.fact"));
}

#[test]
fn test_tail_call_kept_without_option() {
    let asm = compile(
        "int64 fact(int64 n, int64 acc) { if (n <= 1) { return acc; } return fact(n - 1, acc * n); }",
    );

    assert!(!asm.contains(".tail_entry"));
    assert!(asm.contains("call $test.fact"));
}

#[test]
fn test_non_tail_recursion_is_not_rewritten() {
    let asm = compile_with(
        "int64 f(int64 n) { if (n <= 0) { return 0; } return 1 + f(n - 1); }",
        &options(true),
    );

    assert!(!asm.contains(".tail_entry"));
    assert!(asm.contains("call $test.f"));
}

#[test]
fn test_if_chain_labels() {
    let asm = compile(
        "void main() { int64 x; if (x == 0) { x = 1; } else if (x == 1) { x = 2; } else { x = 3; } return; }",
    );

    assert_eq!(asm.matches("cmp rax, 1\n    jne .L").count(), 2);
    assert_eq!(asm.matches("jmp .L1\n").count(), 2);
    assert!(asm.contains("\n.L1:\n"));
}

#[test]
fn test_while_loop_labels() {
    let asm = compile("void main() { int64 x; while (x < 10) { x = x + 1; } return; }");

    let start = position_of(&asm, ".LOOP_START_1:");
    let exit = position_of(&asm, "jne .LOOP_END_1");
    let back = position_of(&asm, "jmp .LOOP_START_1");
    let end = position_of(&asm, ".LOOP_END_1:");
    assert!(start < exit && exit < back && back < end);
}

#[test]
fn test_range_for() {
    let asm = compile("void main() { int64 i; for (i in 0 .. 10) { } return; }");

    assert!(asm.contains("mov rax, 0\n    mov qword [rbp-8], rax\n.LOOP_START_1:\n"));
    assert!(asm.contains("mov rax, 10\n    cmp qword [rbp-8], rax\n    jge .LOOP_END_1\n"));
    assert!(asm.contains("add qword [rbp-8], 1\n    jmp .LOOP_START_1\n.LOOP_END_1:\n"));
}

#[test]
fn test_array_for() {
    let asm = compile("void main() { int64[3] a; int64 v; for (v in a) { } return; }");

    // `a` spans 24 bytes, `v` follows, then the hidden counter.
    assert!(asm.contains("mov qword [rbp-40], 0\n.LOOP_START_1:\n"));
    assert!(asm.contains("cmp qword [rbp-40], 3\n    jge .LOOP_END_1\n"));
    assert!(asm.contains("lea rax, [rbp-24]\n    mov rcx, [rbp-40]\n    imul rcx, 8\n"));
    assert!(asm.contains("mov qword [rbp-32], rax"));
    assert!(asm.contains("add qword [rbp-40], 1"));
}

#[test]
fn test_string_data() {
    let asm = compile("void main() { string s, t; s = \"hi\"; t = \"\"; return; }");

    assert!(asm.contains("lea rax, [rel test.D$0]"));
    assert!(asm.contains("section .data\ntest.D$0:\n    dd 2\n    db 104, 105\ntest.D$1:\n    dd 0\n"));
}

#[test]
fn test_string_escapes_emit_raw_bytes() {
    let asm = compile("void main() { string s; s = \"\\xff\\x00\"; return; }");

    assert!(asm.contains("test.D$0:\n    dd 2\n    db 255, 0\n"));
}

#[test]
fn test_every_construct_generates() {
    let source = "extern void putchar(int64 c);\n\
        int64 fact(int64 n, int64 acc) {\n\
            if (n <= 1) { return acc; }\n\
            return fact(n - 1, acc * n);\n\
        }\n\
        int64 helper(int64 v) { return -v % 3 / 2; }\n\
        void main() {\n\
            int64 x, y;  int64[5] a;  int64* p;  int64[5]* pa;  bool b;  string s;\n\
            x = 3; p = &x; *p = 4; a[0] = x; pa = &a; pa[1] = 2;\n\
            if (x > 1 && !b) { } else if (x == 0 || b) { } else { }\n\
            while (x < 10) { x = x + 1; }\n\
            for (y in 0 .. 10) { }\n\
            for (y in a) { }\n\
            for (y in *pa) { x = helper(fact(y, 1)); }\n\
            helper(x);\n\
            putchar(pa[1] + *p);\n\
            b = *p != a[2];\n\
            s = \"text\";\n\
            return;\n\
        }";

    for eliminate_tail_calls in [false, true] {
        let asm = compile_with(source, &options(eliminate_tail_calls));

        assert!(asm.contains("\nmain:\n"));
        assert!(asm.contains("call $test.putchar"));
        assert!(asm.contains("call $test.helper"));
        assert_eq!(asm.contains("jmp .tail_entry"), eliminate_tail_calls);
        assert_eq!(asm.matches("push rbp").count(), 3);
    }
}

#[test]
fn test_unvalidated_module_is_internal_error() {
    let tokens = tokenize("void main() { int64 x; x = 1; return; }".to_string(), None).unwrap();
    let mut arena = FunctionArena::new();
    let module = parse(tokens, Rc::new("test".to_string()), &mut arena).unwrap();

    let error = compile_module(&module, &arena, &options(false)).unwrap_err();
    assert_eq!(error.get_error_name(), "Internal");
}

#[test]
fn test_startup_stub() {
    assert_eq!(
        startup_stub(),
        "global _start\nsection .text\n_start:\n    call main\n    mov rax, 60\n    xor rdi, rdi\n    syscall\n"
    );
}

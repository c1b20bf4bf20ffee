//! Runtime scaffolding emitted ahead of every program.
//!
//! The startup stub is the process entry point: it calls the entry
//! module's `main` and exits with status 0 through the `exit` syscall.

use super::compiler::ENTRY_FUNCTION;

/// Linux x86-64 `exit` syscall number.
const SYS_EXIT: u32 = 60;

pub fn startup_stub() -> String {
    format!(
        "global _start\n\
         section .text\n\
         _start:\n    \
         call {}\n    \
         mov rax, {}\n    \
         xor rdi, rdi\n    \
         syscall\n",
        ENTRY_FUNCTION, SYS_EXIT
    )
}

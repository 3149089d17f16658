//! An emulator for a small 8-bit register machine: eight registers, a flat
//! byte memory, a downward-growing stack and a fixed one-byte instruction
//! set with stack-based subroutine calls and flag-driven branching.
//!
//! Programs are plain text files of base-2 byte literals, one per line, with
//! `#` comments. See [`program::Program`] for the loader and [`vm::Vm`] for
//! the fetch-decode-execute machinery.

pub mod memory;
pub mod opcode;
pub mod program;
pub mod vm;

// Parsing
pub mod ast;
mod lexer;
pub mod parser;
pub mod span;
pub use lexer::tokenize;
pub use parser::{parse, AsmParser};

// Assembling
pub mod asm;
pub mod image;
pub mod isa;
pub mod symbol;
pub use asm::{assemble, assemble_source, AsmOptions, OffsetMode};
pub use image::Image;
pub use symbol::SymbolTable;

// Inspecting and running
pub mod disasm;
pub mod runtime;
pub use runtime::{RunState, Status};

pub mod env;
pub mod error;
pub use error::{AsmError, DisasmError, ImageError, RunError};

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 8;

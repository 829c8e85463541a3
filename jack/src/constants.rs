//! Constant values of the source language and its target VM.

/// Largest integer constant the language accepts.
///
/// VM words are 16-bit two's complement, and negative
/// literals are built with the unary minus operator.
pub const MAX_INT: u16 = 0x7FFF; // 32767

/// Number of cells in the VM `temp` segment.
pub const TEMP_SIZE: u16 = 8;

/// `pointer 0` addresses `this`, `pointer 1` addresses `that`.
pub const POINTER_THIS: u16 = 0;
pub const POINTER_THAT: u16 = 1;

/// Scratch `temp` cell used for discarded call results
/// and array assignment.
pub const TEMP_SCRATCH: u16 = 0;

/// Name of the implicit method receiver.
pub const RECEIVER: &str = "this";

// ----------------------------------------------------------------------------
// Runtime library routines called by generated code.

pub const OS_ALLOC: &str = "Memory.alloc";
pub const OS_MULTIPLY: &str = "Math.multiply";
pub const OS_DIVIDE: &str = "Math.divide";
pub const OS_STRING_NEW: &str = "String.new";
pub const OS_STRING_APPEND: &str = "String.appendChar";

// ----------------------------------------------------------------------------
// File extensions.

pub const SOURCE_EXT: &str = "jack";
pub const OUTPUT_EXT: &str = "vm";

//! VM instruction writer.
use std::fmt::{self, Write};

use log::trace;

use super::symbol::StorageKind;
use crate::{
    constants::{MAX_INT, TEMP_SIZE, POINTER_THAT},
    error::{JackError, JackResult},
};

/// Addressable memory regions of the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Segment {
    Constant,
    Argument,
    Local,
    Static,
    This,
    That,
    Pointer,
    Temp,
}

impl fmt::Display for Segment {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Constant => "constant",
            Self::Argument => "argument",
            Self::Local    => "local",
            Self::Static   => "static",
            Self::This     => "this",
            Self::That     => "that",
            Self::Pointer  => "pointer",
            Self::Temp     => "temp",
        })
    }
}

impl From<StorageKind> for Segment {
    #[rustfmt::skip]
    fn from(kind: StorageKind) -> Self {
        match kind {
            StorageKind::Static   => Segment::Static,
            StorageKind::Field    => Segment::This,
            StorageKind::Argument => Segment::Argument,
            StorageKind::Local    => Segment::Local,
        }
    }
}

/// Arithmetic and logical stack commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Add,
    Sub,
    Neg,
    Eq,
    Gt,
    Lt,
    And,
    Or,
    Not,
}

impl fmt::Display for Command {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Neg => "neg",
            Self::Eq  => "eq",
            Self::Gt  => "gt",
            Self::Lt  => "lt",
            Self::And => "and",
            Self::Or  => "or",
            Self::Not => "not",
        })
    }
}

/// Writes one VM instruction per line into the sink.
///
/// Pure formatting. The writer doesn't track labels or functions,
/// it only rejects operands the VM can't address.
pub struct VmWriter<W> {
    out: W,
    lines: usize,
}

impl<W: Write> VmWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, lines: 0 }
    }

    /// Number of instructions written so far.
    #[inline]
    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Consume the writer and return the sink.
    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn write_push(&mut self, segment: Segment, index: u16) -> JackResult<()> {
        check_address(segment, index)?;
        self.line(format_args!("push {segment} {index}"))
    }

    pub fn write_pop(&mut self, segment: Segment, index: u16) -> JackResult<()> {
        if segment == Segment::Constant {
            return Err(JackError::InvalidArgument(
                "cannot pop into the constant segment".to_string(),
            ));
        }
        check_address(segment, index)?;
        self.line(format_args!("pop {segment} {index}"))
    }

    pub fn write_arithmetic(&mut self, command: Command) -> JackResult<()> {
        self.line(format_args!("{command}"))
    }

    pub fn write_label(&mut self, label: &str) -> JackResult<()> {
        self.line(format_args!("label {label}"))
    }

    pub fn write_goto(&mut self, label: &str) -> JackResult<()> {
        self.line(format_args!("goto {label}"))
    }

    pub fn write_if(&mut self, label: &str) -> JackResult<()> {
        self.line(format_args!("if-goto {label}"))
    }

    pub fn write_call(&mut self, name: &str, arg_count: u16) -> JackResult<()> {
        self.line(format_args!("call {name} {arg_count}"))
    }

    pub fn write_function(&mut self, name: &str, local_count: u16) -> JackResult<()> {
        self.line(format_args!("function {name} {local_count}"))
    }

    pub fn write_return(&mut self) -> JackResult<()> {
        self.line(format_args!("return"))
    }

    fn line(&mut self, instr: fmt::Arguments) -> JackResult<()> {
        trace!("{}", instr);
        self.out.write_fmt(instr)?;
        self.out.write_char('\n')?;
        self.lines += 1;
        Ok(())
    }
}

/// Reject indices outside the fixed size segments.
#[rustfmt::skip]
fn check_address(segment: Segment, index: u16) -> JackResult<()> {
    let valid = match segment {
        Segment::Constant => index <= MAX_INT,
        Segment::Pointer  => index <= POINTER_THAT,
        Segment::Temp     => index < TEMP_SIZE,
        _ => true,
    };

    if valid {
        Ok(())
    } else {
        Err(JackError::InvalidArgument(format!(
            "index {index} is out of range for segment {segment}"
        )))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_write_instructions() {
        let mut writer = VmWriter::new(String::new());
        writer.write_function("Main.main", 2).unwrap();
        writer.write_push(Segment::Argument, 1).unwrap();
        writer.write_pop(Segment::Local, 0).unwrap();
        writer.write_arithmetic(Command::Not).unwrap();
        writer.write_label("Main.main$WHILE_EXP0").unwrap();
        writer.write_if("Main.main$WHILE_END0").unwrap();
        writer.write_goto("Main.main$WHILE_EXP0").unwrap();
        writer.write_call("Math.multiply", 2).unwrap();
        writer.write_return().unwrap();

        assert_eq!(writer.lines(), 9);
        assert_eq!(
            writer.into_inner(),
            "function Main.main 2\n\
             push argument 1\n\
             pop local 0\n\
             not\n\
             label Main.main$WHILE_EXP0\n\
             if-goto Main.main$WHILE_END0\n\
             goto Main.main$WHILE_EXP0\n\
             call Math.multiply 2\n\
             return\n"
        );
    }

    #[test]
    fn test_segment_names() {
        let names = [
            Segment::Constant,
            Segment::Argument,
            Segment::Local,
            Segment::Static,
            Segment::This,
            Segment::That,
            Segment::Pointer,
            Segment::Temp,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>();

        assert_eq!(
            names,
            ["constant", "argument", "local", "static", "this", "that", "pointer", "temp"]
        );
    }

    #[test]
    fn test_kind_to_segment() {
        assert_eq!(Segment::from(StorageKind::Static), Segment::Static);
        assert_eq!(Segment::from(StorageKind::Field), Segment::This);
        assert_eq!(Segment::from(StorageKind::Argument), Segment::Argument);
        assert_eq!(Segment::from(StorageKind::Local), Segment::Local);
    }

    #[test]
    fn test_invalid_arguments() {
        let mut writer = VmWriter::new(String::new());
        assert!(matches!(
            writer.write_pop(Segment::Constant, 0),
            Err(JackError::InvalidArgument(_))
        ));
        assert!(matches!(
            writer.write_push(Segment::Pointer, 2),
            Err(JackError::InvalidArgument(_))
        ));
        assert!(matches!(
            writer.write_pop(Segment::Temp, 8),
            Err(JackError::InvalidArgument(_))
        ));
        assert!(matches!(
            writer.write_push(Segment::Constant, 32768),
            Err(JackError::InvalidArgument(_))
        ));

        // Nothing was written.
        assert_eq!(writer.lines(), 0);
        assert!(writer.into_inner().is_empty());
    }
}

/*! Parse textual IR into an [`irlens_core::Module`].
 *
 * The accepted syntax is a small slice of LLVM assembly: `define`, `declare` with an optional
 * `memory(...)` effect, `@g = global` and `;` comments. Parsing happens in two steps. The pest
 * grammar in `grammar.pest` checks the shape, then lowering resolves names, including forward
 * references from phi nodes, and builds the core IR.
 */

use pest::Parser;
use pest_derive::Parser;
use std::path::{Path, PathBuf};
use thiserror::Error;

mod lower;

#[derive(Parser)]
#[grammar = "grammar.pest"]
pub struct IrParser;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Syntax error:\n{0}")]
    Syntax(Box<pest::error::Error<Rule>>),
    #[error("Undefined value %{name} in @{function}")]
    UndefinedValue { function: String, name: String },
    #[error("Undefined block %{name} in @{function}")]
    UndefinedBlock { function: String, name: String },
    #[error("Undefined global @{name} in @{function}")]
    UndefinedGlobal { function: String, name: String },
    #[error("Redefinition of %{name} in @{function}")]
    Redefinition { function: String, name: String },
    #[error("Duplicate symbol @{0}")]
    DuplicateSymbol(String),
    #[error("Invalid integer literal: {0}")]
    InvalidInteger(String),
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),
    #[error("Malformed {0}")]
    Malformed(&'static str),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        ParseError::Syntax(Box::new(err))
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parses a whole module named `module`.
pub fn parse(input: &str) -> ParseResult<irlens_core::Module> {
    parse_named(input, "module")
}

pub fn parse_named(input: &str, name: &str) -> ParseResult<irlens_core::Module> {
    let mut pairs = IrParser::parse(Rule::module, input)?;
    let root = pairs.next().ok_or(ParseError::Malformed("module"))?;
    lower::lower_module(root, name)
}

/// Reads and parses a file; the module is named after the file stem.
pub fn parse_file<P: AsRef<Path>>(path: P) -> ParseResult<irlens_core::Module> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "module".to_string());
    parse_named(&text, &name)
}

pub fn check(input: &str) -> bool {
    IrParser::parse(Rule::module, input).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use irlens_core::instructions::{BinaryOp, InstKind};
    use irlens_core::{Callee, MemoryEffect, Terminator, Type, Value};
    use irlens_core::analysis::ModRefInfo;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_module() {
        let module = parse("").unwrap();
        assert_eq!(module.defined_functions().count(), 0);
        assert!(check("; only a comment\n"));
    }

    #[test]
    fn test_simple_function() {
        let module = parse(
            r"
define i32 @add1(i32 %x) {
entry:
  %y = add nsw i32 %x, 1
  ret i32 %y
}
",
        )
        .unwrap();

        let f = module.function("add1").unwrap();
        assert_eq!(f.ret_ty, Type::I32);
        assert_eq!(f.instruction_count(), 2);

        let add = f.instructions().next().unwrap();
        assert_eq!(add.name.as_deref(), Some("y"));
        match &add.kind {
            InstKind::Binary { op, lhs, rhs } => {
                assert_eq!(*op, BinaryOp::Add);
                assert_eq!(*lhs, Value::Param(0));
                assert_eq!(*rhs, Value::i32(1));
            }
            other => panic!("expected add, got {:?}", other),
        }
    }

    #[test]
    fn test_declarations_and_globals() {
        let module = parse(
            r"
@counter = global i32 0
declare void @log(ptr) memory(read)
declare i32 @pure(i32)  memory(none)
declare void @fill(ptr noalias %dst, i64) memory(argmem: write)
declare void @opaque()
",
        )
        .unwrap();

        assert_eq!(module.globals["counter"].ty, Type::I32);
        assert_eq!(module.declaration("log").unwrap().effect, MemoryEffect::new(ModRefInfo::Ref));
        assert_eq!(module.declaration("pure").unwrap().effect, MemoryEffect::NONE);
        assert_eq!(
            module.declaration("fill").unwrap().effect,
            MemoryEffect::arg_mem(ModRefInfo::Mod)
        );
        assert_eq!(module.declaration("opaque").unwrap().effect, MemoryEffect::UNKNOWN);
    }

    #[test]
    fn test_phi_forward_reference() {
        let module = parse(
            r"
define void @count(i64 %n) {
entry:
  br label %loop
loop:
  %i = phi i64 [ 0, %entry ], [ %i.next, %loop ]
  %i.next = add i64 %i, 1
  %done = icmp eq i64 %i.next, %n
  br i1 %done, label %exit, label %loop
exit:
  ret void
}
",
        )
        .unwrap();

        let f = module.function("count").unwrap();
        let phi = f.instructions().find(|i| i.is_phi()).unwrap();
        let next = f.instructions().find(|i| i.name.as_deref() == Some("i.next")).unwrap();
        assert_eq!(phi.phi_incoming()[1].0, Value::Local(next.id));
        assert!(matches!(
            f.block_by_name("loop").unwrap().terminator,
            Terminator::CondBr { .. }
        ));
    }

    #[test]
    fn test_calls() {
        let module = parse(
            r"
declare i32 @get()
define void @f(ptr %fp) {
entry:
  %v = call i32 @get()
  call void %fp(i32 %v)
  ret void
}
",
        )
        .unwrap();

        let f = module.function("f").unwrap();
        let calls: Vec<_> = f.instructions().collect();
        assert_eq!(calls[0].called_function(), Some("get"));
        assert!(matches!(
            &calls[1].kind,
            InstKind::Call { callee: Callee::Indirect(Value::Param(0)), args } if args.len() == 1
        ));
    }

    #[test]
    fn test_undefined_names_are_reported() {
        let err = parse("define void @f() {\nentry:\n  store i32 1, ptr %nowhere\n  ret void\n}\n")
            .unwrap_err();
        assert_eq!(err.to_string(), "Undefined value %nowhere in @f");

        let err = parse("define void @f() {\nentry:\n  br label %missing\n}\n").unwrap_err();
        assert!(matches!(err, ParseError::UndefinedBlock { name, .. } if name == "missing"));

        let err = parse("define ptr @f() {\nentry:\n  ret ptr @g\n}\n").unwrap_err();
        assert!(matches!(err, ParseError::UndefinedGlobal { name, .. } if name == "g"));
    }

    #[test]
    fn test_redefinitions_are_rejected() {
        let err = parse(
            "define i32 @f(i32 %x) {\nentry:\n  %x = add i32 1, 2\n  ret i32 %x\n}\n",
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::Redefinition { name, .. } if name == "x"));

        let err = parse("@f = global i32 0\ndeclare void @f()\n").unwrap_err();
        assert!(matches!(err, ParseError::DuplicateSymbol(name) if name == "f"));
    }

    #[test]
    fn test_syntax_error() {
        let err = parse("define void @f() {\nentry:\n  frobnicate\n}\n").unwrap_err();
        assert!(matches!(err, ParseError::Syntax(_)));
        assert!(!check("define"));
    }
}

//! # opsel — Opcode-Selector Tree Compiler
//!
//! `opsel` turns a table of x86/x64 instruction encodings into compact
//! decision trees that pick the one encoding a call site should emit.
//!
//! An assembler method such as `add(dst: r8, imm)` corresponds to several
//! encodings (`Add_AL_imm8`, `Add_rm8_imm8`). The candidates sharing a
//! mnemonic and an argument signature form an [`OpGroup`]; building a
//! [`SelectorTree`] for the group yields the run-time choice, and the same
//! tree drives exemplar generation for tests.
//!
//! ## Quick Start
//!
//! ```rust
//! use opsel::{build_selector_tree, evaluate, Arg, ArgKind, Bitness, Config, Context};
//! use opsel::{EncodingTable, Register, RegisterClass, Signature};
//!
//! let table = EncodingTable::builtin().unwrap();
//! let sig = Signature(vec![ArgKind::Register(RegisterClass::Gpr8), ArgKind::Immediate]);
//! let group = table.group("add", &sig).unwrap().clone();
//! let tree = build_selector_tree(group, &Config::default()).unwrap();
//!
//! let ctx = Context::new(Bitness::Bits16);
//! let chosen = evaluate(&tree, &ctx, &[Register::Al.into(), Arg::imm(5)]).unwrap();
//! assert_eq!(chosen.code, "Add_AL_imm8");
//! ```
//!
//! ## Features
//!
//! - **Deterministic** — the same table and configuration always produce the
//!   same trees, node for node.
//! - **Checked** — ambiguous groups, unreachable candidates and malformed
//!   rows are rejected at build time.
//! - **`no_std` + `alloc`** — the compiler and evaluator run without `std`.
//! - **Structured conditions** — every decision carries a [`Condition`];
//!   [`render_selector`] turns a tree into pseudo-code through a [`Naming`].

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
// ── Pedantic lint policy ─────────────────────────────────────────────────
// Immediate range checks cast between integer widths, and encoding tables
// carry long hex literals and repetitive match arms.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::cast_possible_wrap,
    clippy::unreadable_literal,
    clippy::match_same_arms,
    clippy::redundant_closure_for_method_calls,
    clippy::wildcard_imports,
    clippy::enum_glob_use,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args,
    clippy::doc_markdown,
    clippy::similar_names,
    clippy::too_many_lines,
    clippy::single_match_else,
    clippy::manual_let_else,
    clippy::map_unwrap_or,
    clippy::return_self_not_must_use,
    clippy::missing_errors_doc
)]

extern crate alloc;

/// The built-in x86/x64 encoding rows.
pub mod builtin;
/// Build and selection error types.
pub mod error;
/// Tree evaluation for a call site.
pub mod eval;
/// Exemplar enumeration for generated tests.
pub mod exemplar;
/// Intermediate representation: bitness, registers, memory operands, arguments.
pub mod ir;
/// Configuration and the compiled model of a whole table.
pub mod model;
/// Pseudo-code rendering of trees.
pub mod render;
/// Selector kinds, relations and structured conditions.
pub mod selector;
/// Encoding candidates, groups and the table loader.
pub mod table;
/// The selector tree and its builder.
pub mod tree;

// Re-exports
pub use error::{BuildError, NoMatchError, NoMatchReason};
pub use eval::{evaluate, Context};
pub use exemplar::{enumerate_exemplars, Exemplar, Expectation};
pub use ir::{
    Arg, ArgKind, Bitness, BitnessSet, LabelId, MemoryOperand, MemorySize, Register,
    RegisterClass, Signature,
};
pub use model::{Config, EvalOptions, Limits, Model};
pub use render::{render_args, render_selector, DefaultNaming, Naming, RenderArg};
pub use selector::{CmpOp, Comparand, Condition, Selector, SelectorKind, Subject};
pub use table::{Definition, Encoding, EncodingCandidate, EncodingTable, OpGroup, PseudoOp};
pub use tree::{Decision, Node, SelectorTree};

/// Compile the selector tree of one candidate group.
///
/// Equivalent to [`SelectorTree::build`].
///
/// # Errors
///
/// Returns [`BuildError`] when two candidates cannot be told apart, a
/// candidate is unreachable, a selector pairs with an incompatible slot, or
/// a [`Limits`] bound is exceeded.
///
/// # Examples
///
/// ```rust
/// use opsel::{build_selector_tree, ArgKind, Config, EncodingTable, Signature};
///
/// let table = EncodingTable::builtin().unwrap();
/// let group = table.group("jmp", &Signature(vec![ArgKind::Label])).unwrap().clone();
/// let tree = build_selector_tree(group, &Config::default()).unwrap();
/// assert!(tree.to_string().starts_with("Bitness64 ? (ShortBranch"));
/// ```
pub fn build_selector_tree(group: OpGroup, config: &Config) -> Result<SelectorTree, BuildError> {
    SelectorTree::build(group, config)
}

//! Error types for tree compilation and opcode selection.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::ir::{Arg, ArgKind, ArgList, Bitness, Signature};
use crate::selector::SelectorKind;

/// Error raised while loading an encoding table or compiling selector trees.
///
/// Always fatal to generation: a group that fails to compile has no tree.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BuildError {
    /// Two or more candidates are not distinguished by any available selector.
    Ambiguous {
        /// Mnemonic of the group.
        mnemonic: String,
        /// Signature of the group.
        signature: Signature,
        /// Codes of the candidates left undistinguished.
        candidates: Vec<String>,
    },

    /// A candidate is not reachable through any leaf for any of its bitnesses.
    Unreachable {
        /// Mnemonic of the group.
        mnemonic: String,
        /// Code of the unreachable candidate.
        candidate: String,
    },

    /// A selector kind was applied to an argument slot it cannot test.
    InvalidPairing {
        /// Mnemonic of the group.
        mnemonic: String,
        /// The offending selector kind.
        kind: SelectorKind,
        /// Slot the selector tests, if it tests one.
        slot: Option<usize>,
        /// Static kind of that slot, if the slot exists.
        arg_kind: Option<ArgKind>,
    },

    /// An encoding definition could not be parsed or is inconsistent with its group.
    InvalidDefinition {
        /// Code of the definition.
        code: String,
        /// What is wrong with it.
        detail: String,
    },

    /// A configured resource limit was exceeded.
    LimitExceeded {
        /// Which limit.
        resource: String,
        /// The configured maximum.
        limit: usize,
    },

    /// Multiple errors collected while compiling a table.
    Multiple {
        /// The collected errors.
        errors: Vec<BuildError>,
    },
}

impl BuildError {
    /// Flatten into a single error: `None` for an empty list, the error
    /// itself for one, [`BuildError::Multiple`] otherwise.
    pub fn from_list(mut errors: Vec<BuildError>) -> Option<BuildError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(BuildError::Multiple { errors }),
        }
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Ambiguous {
                mnemonic,
                signature,
                candidates,
            } => {
                write!(
                    f,
                    "ambiguous encodings for {mnemonic}{signature}: no selector distinguishes "
                )?;
                for (i, c) in candidates.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{c}")?;
                }
                Ok(())
            }
            BuildError::Unreachable {
                mnemonic,
                candidate,
            } => write!(
                f,
                "encoding {candidate} of '{mnemonic}' is unreachable in every bitness it supports"
            ),
            BuildError::InvalidPairing {
                mnemonic,
                kind,
                slot,
                arg_kind,
            } => {
                write!(f, "selector {kind:?} cannot test ")?;
                match (slot, arg_kind) {
                    (Some(slot), Some(kind)) => write!(f, "argument {slot} of kind {kind}")?,
                    (Some(slot), None) => write!(f, "missing argument {slot}")?,
                    (None, _) => write!(f, "the call site")?,
                }
                write!(f, " of '{mnemonic}'")
            }
            BuildError::InvalidDefinition { code, detail } => {
                write!(f, "invalid encoding definition {code}: {detail}")
            }
            BuildError::LimitExceeded { resource, limit } => {
                write!(f, "resource limit exceeded: {resource} (limit: {limit})")
            }
            BuildError::Multiple { errors } => {
                for (i, e) in errors.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}", e)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BuildError {}

/// Why a call site could not be mapped to an encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NoMatchReason {
    /// Wrong number of arguments for the group.
    Arity {
        /// Arity of the group's signature.
        expected: usize,
        /// Number of arguments supplied.
        found: usize,
    },
    /// An argument does not have the static type of its slot.
    ArgumentKind {
        /// Offending slot.
        slot: usize,
        /// Kind the slot requires.
        expected: ArgKind,
    },
    /// The tree ended in a no-match leaf.
    NoEncoding,
    /// The selected leaf's candidate does not accept the arguments in this bitness.
    Rejected {
        /// Code of the rejecting candidate.
        code: String,
    },
    /// No group has this mnemonic.
    UnknownMnemonic,
    /// The mnemonic exists but no group has a matching signature.
    NoGroup,
}

impl fmt::Display for NoMatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoMatchReason::Arity { expected, found } => {
                write!(f, "expected {expected} operand(s), found {found}")
            }
            NoMatchReason::ArgumentKind { slot, expected } => {
                write!(f, "operand {slot} must be {expected}")
            }
            NoMatchReason::NoEncoding => write!(f, "no opcode found for these operands"),
            NoMatchReason::Rejected { code } => write!(f, "{code} does not accept these operands"),
            NoMatchReason::UnknownMnemonic => write!(f, "unknown mnemonic"),
            NoMatchReason::NoGroup => write!(f, "no overload takes these operand kinds"),
        }
    }
}

/// Raised when a selector tree maps a call site to no encoding.
///
/// Deterministic for a given (tree, bitness, arguments); never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NoMatchError {
    /// Mnemonic of the call site.
    pub mnemonic: String,
    /// Bitness selection ran in.
    pub bitness: Bitness,
    /// Snapshot of the arguments.
    pub args: Vec<Arg>,
    /// Why nothing matched.
    pub reason: NoMatchReason,
}

impl NoMatchError {
    pub(crate) fn new(mnemonic: &str, bitness: Bitness, args: &[Arg], reason: NoMatchReason) -> Self {
        Self {
            mnemonic: mnemonic.into(),
            bitness,
            args: args.to_vec(),
            reason,
        }
    }
}

impl fmt::Display for NoMatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no encoding for '{}", self.mnemonic)?;
        if !self.args.is_empty() {
            write!(f, " {}", ArgList(&self.args))?;
        }
        write!(f, "' in {}-bit mode: {}", self.bitness, self.reason)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for NoMatchError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Register, RegisterClass};
    use alloc::format;
    use alloc::string::ToString;
    use alloc::vec;

    #[test]
    fn no_match_display() {
        let err = NoMatchError::new(
            "add",
            Bitness::Bits64,
            &[Arg::Register(Register::Al), Arg::imm(5)],
            NoMatchReason::NoEncoding,
        );
        assert_eq!(
            err.to_string(),
            "no encoding for 'add al, 0x5' in 64-bit mode: no opcode found for these operands"
        );
    }

    #[test]
    fn ambiguous_display() {
        let err = BuildError::Ambiguous {
            mnemonic: "add".into(),
            signature: Signature(vec![ArgKind::Register(RegisterClass::Gpr8), ArgKind::Immediate]),
            candidates: vec!["Add_AL_imm8".into(), "Add_AL_imm8_dup".into()],
        };
        let s = format!("{}", err);
        assert!(s.contains("add(r8, imm)"));
        assert!(s.contains("Add_AL_imm8, Add_AL_imm8_dup"));
    }

    #[test]
    fn pairing_display() {
        let err = BuildError::InvalidPairing {
            mnemonic: "inc".into(),
            kind: SelectorKind::RegisterAl,
            slot: Some(0),
            arg_kind: Some(ArgKind::Register(RegisterClass::Gpr16)),
        };
        assert_eq!(
            err.to_string(),
            "selector RegisterAl cannot test argument 0 of kind r16 of 'inc'"
        );
    }

    #[test]
    fn multiple_errors_display() {
        let err = BuildError::from_list(vec![
            BuildError::LimitExceeded {
                resource: "tree depth".into(),
                limit: 4,
            },
            BuildError::Unreachable {
                mnemonic: "push".into(),
                candidate: "Pushw_ES".into(),
            },
        ]);
        let s = format!("{}", err.as_ref().map(ToString::to_string).unwrap_or_default());
        assert!(s.contains("tree depth"));
        assert!(s.contains("Pushw_ES"));
        assert_eq!(s.lines().count(), 2);
        assert!(BuildError::from_list(Vec::new()).is_none());
    }
}

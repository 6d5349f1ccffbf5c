//! Configuration and the compiled model of a whole encoding table.

use alloc::vec::Vec;

use crate::error::{BuildError, NoMatchError, NoMatchReason};
use crate::eval::{evaluate, Context};
use crate::ir::{Arg, Bitness, BitnessSet, Signature};
use crate::table::{EncodingCandidate, EncodingTable};
use crate::tree::SelectorTree;

/// Bounds on tree compilation.
///
/// # Examples
///
/// ```rust
/// use opsel::{Config, Limits};
///
/// let config = Config::default().with_limits(Limits {
///     max_depth: 16,
///     max_candidates: 32,
/// });
/// assert_eq!(config.limits.max_depth, 16);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Limits {
    /// Maximum number of decisions on any root-to-leaf path. Default: 64.
    pub max_depth: usize,
    /// Maximum candidates in one group. Default: 256.
    pub max_candidates: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_depth: 64,
            max_candidates: 256,
        }
    }
}

/// Default encoder preferences for call sites evaluated through a [`Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EvalOptions {
    /// Pick VEX over EVEX where both apply. Default: true.
    pub prefer_vex: bool,
    /// Pick short branches where available. Default: true.
    pub prefer_short_branch: bool,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            prefer_vex: true,
            prefer_short_branch: true,
        }
    }
}

/// Immutable configuration, built once and passed by reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Bitnesses trees are compiled for. Candidates outside this set are
    /// left out of every tree. Default: all three.
    pub bitnesses: BitnessSet,
    /// Default preferences of [`Model::context`].
    pub options: EvalOptions,
    /// Compilation bounds.
    pub limits: Limits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bitnesses: BitnessSet::ALL,
            options: EvalOptions::default(),
            limits: Limits::default(),
        }
    }
}

impl Config {
    /// Target only these bitnesses.
    #[must_use]
    pub fn with_bitnesses(mut self, bitnesses: BitnessSet) -> Self {
        self.bitnesses = bitnesses;
        self
    }

    /// Set the default preferences.
    #[must_use]
    pub fn with_options(mut self, options: EvalOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the compilation bounds.
    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }
}

/// Every group of a table compiled to a selector tree.
///
/// # Examples
///
/// ```rust
/// use opsel::{Arg, Bitness, Config, EncodingTable, Model, Register};
///
/// let table = EncodingTable::builtin().unwrap();
/// let model = Model::build(&table, &Config::default()).unwrap();
/// let ctx = model.context(Bitness::Bits16);
/// let code = model.select("add", &ctx, &[Register::Al.into(), Arg::imm(5)]).unwrap();
/// assert_eq!(code.code, "Add_AL_imm8");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Model {
    config: Config,
    trees: Vec<SelectorTree>,
}

impl Model {
    /// Compile every group of `table`.
    ///
    /// # Errors
    ///
    /// Each failing group contributes its error; several are returned as
    /// [`BuildError::Multiple`].
    pub fn build(table: &EncodingTable, config: &Config) -> Result<Self, BuildError> {
        let mut trees = Vec::with_capacity(table.groups().len());
        let mut errors = Vec::new();
        for group in table.groups() {
            match SelectorTree::build(group.clone(), config) {
                Ok(tree) => trees.push(tree),
                Err(e) => errors.push(e),
            }
        }
        if let Some(err) = BuildError::from_list(errors) {
            return Err(err);
        }
        log::debug!("compiled {} selector trees", trees.len());
        Ok(Self {
            config: *config,
            trees,
        })
    }

    /// Compile the built-in table.
    ///
    /// # Errors
    ///
    /// See [`Model::build`].
    pub fn builtin(config: &Config) -> Result<Self, BuildError> {
        Self::build(&EncodingTable::builtin()?, config)
    }

    /// The configuration the model was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// All trees, in table order.
    pub fn trees(&self) -> &[SelectorTree] {
        &self.trees
    }

    /// Tree of the group with exactly this mnemonic and signature.
    pub fn tree(&self, mnemonic: &str, signature: &Signature) -> Option<&SelectorTree> {
        self.trees
            .iter()
            .find(|t| t.mnemonic() == mnemonic && t.signature() == signature)
    }

    /// Evaluation context for `bitness` carrying the configured preferences.
    pub fn context(&self, bitness: Bitness) -> Context {
        Context::new(bitness)
            .with_prefer_vex(self.config.options.prefer_vex)
            .with_prefer_short_branch(self.config.options.prefer_short_branch)
    }

    /// Select the encoding of a call site.
    ///
    /// Groups whose signature admits `args` are tried in table order (signed
    /// immediates before unsigned); the first selection wins. In groups with
    /// both VEX and EVEX forms, a VEX leaf that rejects the arguments (an
    /// `xmm16` operand) is retried without the VEX preference.
    ///
    /// # Errors
    ///
    /// [`NoMatchReason::UnknownMnemonic`] or [`NoMatchReason::NoGroup`] when no
    /// tree applies; otherwise the first group's evaluation error.
    pub fn select(&self, mnemonic: &str, ctx: &Context, args: &[Arg]) -> Result<&EncodingCandidate, NoMatchError> {
        let mut known = false;
        let mut first_err = None;
        for tree in self.trees.iter().filter(|t| t.mnemonic() == mnemonic) {
            known = true;
            if !tree.signature().admits(args) {
                continue;
            }
            let err = match evaluate(tree, ctx, args) {
                Ok(candidate) => return Ok(candidate),
                Err(e) => e,
            };
            if ctx.prefer_vex
                && tree.group().mixes_vex_and_evex()
                && matches!(err.reason, NoMatchReason::Rejected { .. })
            {
                if let Ok(candidate) = evaluate(tree, &ctx.with_prefer_vex(false), args) {
                    return Ok(candidate);
                }
            }
            first_err.get_or_insert(err);
        }
        Err(first_err.unwrap_or_else(|| {
            let reason = if known {
                NoMatchReason::NoGroup
            } else {
                NoMatchReason::UnknownMnemonic
            };
            NoMatchError::new(mnemonic, ctx.bitness, args, reason)
        }))
    }
}

//! Exemplar enumeration: concrete call sites that exercise a tree.
//!
//! For one bitness, every reachable leaf gets an argument tuple that walks
//! to it, and every enabled gate in front of a no-match branch gets a tuple
//! that fails the gate. Candidates that are not selected in the bitness get
//! their own call site replayed there, expecting a failure. Tuples are drawn
//! from fixed per-kind value pools, so enumeration is deterministic.

use alloc::vec::Vec;

use crate::eval::{select_leaf, Context};
use crate::ir::{Arg, ArgKind, ArgList, Bitness, LabelId, MemoryOperand, MemorySize, Register};
use crate::selector::{Condition, Selector, SelectorKind};
use crate::table::EncodingCandidate;
use crate::tree::{Decision, Node, SelectorTree};

/// What evaluating an exemplar must produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Expectation {
    /// Evaluation selects this candidate.
    Selects {
        /// Index into the group's candidates.
        candidate: usize,
    },
    /// The arguments fail `selector`: evaluation raises a no-match error or
    /// picks a candidate other than the one the selector guards.
    ///
    /// Without a selector, the arguments select `candidate` in another
    /// bitness and evaluation fails in this one.
    Rejects {
        /// The failed selector, if a gate rules the arguments out.
        selector: Option<Selector>,
        /// Candidate behind the selector, when it guards exactly one.
        candidate: Option<usize>,
    },
}

/// A synthesised call site.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Exemplar {
    /// Bitness the exemplar is evaluated in.
    pub bitness: Bitness,
    /// Full evaluation context, including the preferences the path needs.
    pub context: Context,
    /// The arguments.
    pub args: Vec<Arg>,
    /// Opmask applied to the first operand (`k1` for candidates that take
    /// one). Masking does not change the selected encoding.
    pub opmask: Option<Register>,
    /// Expected outcome.
    pub expectation: Expectation,
}

impl Exemplar {
    /// Whether evaluating the exemplar against `tree` meets its expectation.
    pub fn holds(&self, tree: &SelectorTree) -> bool {
        let result = select_leaf(tree, &self.context, &self.args);
        match self.expectation {
            Expectation::Selects { candidate } => result.ok() == Some(candidate),
            Expectation::Rejects { candidate, .. } => match result {
                Err(_) => true,
                Ok(selected) => candidate != Some(selected),
            },
        }
    }
}

/// Enumerate exemplars of `tree` in `bitness`, in tree order, followed by
/// the invalid-bitness rejections.
///
/// Leaves and gates for which no pool tuple satisfies the path are skipped.
pub fn enumerate_exemplars(tree: &SelectorTree, bitness: Bitness) -> Vec<Exemplar> {
    let mut out = walk_exemplars(tree, bitness);
    let mut elsewhere: Vec<(Bitness, Vec<Exemplar>)> = Vec::new();
    for index in tree.leaves() {
        let Some(candidate) = tree.candidate(index) else {
            continue;
        };
        if candidate.bitness.contains(bitness) {
            continue;
        }
        let Some(home) = candidate.bitness.iter().next() else {
            continue;
        };
        if !elsewhere.iter().any(|(b, _)| *b == home) {
            elsewhere.push((home, walk_exemplars(tree, home)));
        }
        let selects = elsewhere
            .iter()
            .filter(|(b, _)| *b == home)
            .flat_map(|(_, ex)| ex)
            .find(|ex| ex.expectation == Expectation::Selects { candidate: index });
        let Some(valid) = selects else {
            continue;
        };
        let context = Context::new(bitness)
            .with_prefer_vex(valid.context.prefer_vex)
            .with_prefer_short_branch(valid.context.prefer_short_branch);
        if select_leaf(tree, &context, &valid.args).is_ok() {
            log::trace!(
                "{}: '{}' still encodes in {}-bit mode without {}",
                tree.group(),
                ArgList(&valid.args),
                bitness,
                candidate.code
            );
            continue;
        }
        out.push(Exemplar {
            bitness,
            context,
            args: valid.args.clone(),
            opmask: None,
            expectation: Expectation::Rejects {
                selector: None,
                candidate: Some(index),
            },
        });
    }
    out
}

fn walk_exemplars(tree: &SelectorTree, bitness: Bitness) -> Vec<Exemplar> {
    let mut e = Enumerator {
        tree,
        bitness,
        pools: tree
            .signature()
            .0
            .iter()
            .map(|kind| pool(*kind, bitness))
            .collect(),
        out: Vec::new(),
    };
    e.walk(tree.root(), &Path::default());
    e.out
}

// ─── Value pools ─────────────────────────────────────────────────────────────

const IMMEDIATES: [i128; 22] = [
    5,
    1,
    -1,
    0x7F,
    -0x80,
    0x80,
    0xFF,
    0x1234,
    0x7FFF,
    -0x8000,
    0xFFFF,
    0xFF80,
    0x1234_5678,
    0x7FFF_FFFF,
    -0x8000_0000,
    0xFFFF_FF80,
    0xFFFF_FFFF,
    0x1234_5678_9ABC,
    0x7FFF_FFFF_FFFF_FFFF,
    -0x8000_0000_0000_0000,
    0xFFFF_FFFF_FFFF_FF80,
    0xFFFF_FFFF_FFFF_FFFF,
];

/// Arguments tried per slot before giving up on a tuple.
const SEARCH_BUDGET: usize = 100_000;

fn pool(kind: ArgKind, bitness: Bitness) -> Vec<Arg> {
    match kind {
        ArgKind::Register(class) => Register::of_class(class)
            .filter(|r| r.available_in(bitness))
            .map(Arg::Register)
            .collect(),
        ArgKind::Memory => memory_pool(bitness),
        ArgKind::Immediate | ArgKind::ImmediateUnsigned => {
            IMMEDIATES.iter().map(|v| Arg::Immediate(*v)).collect()
        }
        ArgKind::Label => alloc::vec![Arg::Label(LabelId(1))],
    }
}

fn memory_pool(bitness: Bitness) -> Vec<Arg> {
    let base = match bitness {
        Bitness::Bits16 => Register::Bx,
        Bitness::Bits32 => Register::Ebx,
        Bitness::Bits64 => Register::Rbx,
    };
    let mut out = Vec::new();
    for size in MemorySize::KNOWN {
        out.push(MemoryOperand::based(size, base).into());
        out.push(MemoryOperand::absolute(size, 0x10).into());
        out.push(MemoryOperand::based(size, base).with_broadcast().into());
        // VSIB needs a 32- or 64-bit base.
        let vsib_base = if bitness == Bitness::Bits16 { Register::Ebx } else { base };
        for index in [Register::Xmm1, Register::Ymm1, Register::Zmm1] {
            out.push(MemoryOperand::based(size, vsib_base).with_index(index, 1).into());
        }
    }
    out
}

// ─── Tree walk ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct Path {
    /// Argument conditions and the outcome the path needs, with the highest
    /// slot each reads.
    constraints: Vec<(Condition, bool, usize)>,
    prefer_vex: Option<bool>,
    prefer_short_branch: Option<bool>,
}

impl Path {
    fn with(&self, condition: &Condition, outcome: bool) -> Path {
        let mut next = self.clone();
        let last = condition.slots().last().copied().unwrap_or(0);
        next.constraints.push((condition.clone(), outcome, last));
        next
    }

    fn context(&self, bitness: Bitness) -> Context {
        Context::new(bitness)
            .with_prefer_vex(self.prefer_vex.unwrap_or(true))
            .with_prefer_short_branch(self.prefer_short_branch.unwrap_or(true))
    }
}

struct Enumerator<'t> {
    tree: &'t SelectorTree,
    bitness: Bitness,
    pools: Vec<Vec<Arg>>,
    out: Vec<Exemplar>,
}

impl Enumerator<'_> {
    fn walk(&mut self, node: &Node, path: &Path) {
        let d = match node {
            Node::NoMatch => return,
            Node::Leaf(c) => return self.emit_selects(*c, path),
            Node::Select(d) => d,
        };
        let enabled = d.enabled.contains(self.bitness);
        let kind = d.selector.kind;
        if let Some(sat) = kind.satisfying_bitness() {
            let taken = if enabled && sat.contains(self.bitness) {
                &d.if_true
            } else {
                &d.if_false
            };
            return self.walk(taken, path);
        }
        if !enabled {
            return self.walk(&d.if_false, path);
        }
        if kind.is_preference() {
            for (branch, value) in [(&d.if_true, true), (&d.if_false, false)] {
                let mut next = path.clone();
                if kind == SelectorKind::Vex {
                    next.prefer_vex = Some(value);
                } else {
                    next.prefer_short_branch = Some(value);
                }
                self.walk(branch, &next);
            }
            return;
        }
        self.walk(&d.if_true, &path.with(&d.condition, true));
        let on_false = path.with(&d.condition, false);
        if d.if_false == Node::NoMatch {
            self.emit_rejects(d, &on_false);
        }
        self.walk(&d.if_false, &on_false);
    }

    fn emit_selects(&mut self, index: usize, path: &Path) {
        let Some(candidate) = self.tree.candidate(index) else {
            return;
        };
        if !candidate.bitness.contains(self.bitness) {
            return;
        }
        let context = path.context(self.bitness);
        let Some(args) = self.synthesize(path, Some(candidate), &context) else {
            log::warn!(
                "{}: no pooled arguments reach {} in {}-bit mode",
                self.tree.group(),
                candidate.code,
                self.bitness
            );
            return;
        };
        if select_leaf(self.tree, &context, &args).ok() != Some(index) {
            log::warn!(
                "{}: '{}' was synthesised for {} but selects another encoding",
                self.tree.group(),
                ArgList(&args),
                candidate.code
            );
            return;
        }
        self.out.push(Exemplar {
            bitness: self.bitness,
            context,
            args,
            opmask: candidate.opmask.then_some(Register::K1),
            expectation: Expectation::Selects { candidate: index },
        });
    }

    fn emit_rejects(&mut self, d: &Decision, path: &Path) {
        let context = path.context(self.bitness);
        let Some(args) = self.synthesize(path, None, &context) else {
            log::trace!("{}: no pooled arguments fail {}", self.tree.group(), d.selector);
            return;
        };
        let exemplar = Exemplar {
            bitness: self.bitness,
            context,
            args,
            opmask: None,
            expectation: Expectation::Rejects {
                selector: Some(d.selector),
                candidate: sole_leaf(&d.if_true),
            },
        };
        if exemplar.holds(self.tree) {
            self.out.push(exemplar);
        } else {
            log::warn!(
                "{}: '{}' fails {} but is still accepted",
                self.tree.group(),
                ArgList(&exemplar.args),
                d.selector
            );
        }
    }

    fn synthesize(&self, path: &Path, leaf: Option<&EncodingCandidate>, ctx: &Context) -> Option<Vec<Arg>> {
        let mut args = Vec::with_capacity(self.pools.len());
        let mut budget = SEARCH_BUDGET;
        self.fill(&mut args, path, leaf, ctx, &mut budget).then_some(args)
    }

    /// Depth-first search over the pools, checking each constraint as soon
    /// as every slot it reads is assigned.
    fn fill(
        &self,
        args: &mut Vec<Arg>,
        path: &Path,
        leaf: Option<&EncodingCandidate>,
        ctx: &Context,
        budget: &mut usize,
    ) -> bool {
        let slot = args.len();
        let Some(pool) = self.pools.get(slot) else {
            return true;
        };
        let signature = self.tree.signature();
        for arg in pool {
            if *budget == 0 {
                return false;
            }
            *budget -= 1;
            if let Some(c) = leaf {
                let fits = match (c.operands.get(slot), signature.kind(slot)) {
                    (Some(op), Some(kind)) => op.accepts(arg, kind, self.bitness, c.encoding),
                    _ => false,
                };
                if !fits {
                    continue;
                }
            }
            args.push(*arg);
            let consistent = path
                .constraints
                .iter()
                .filter(|(_, _, last)| *last == slot)
                .all(|(cond, want, _)| cond.holds(args, ctx) == *want);
            if consistent && self.fill(args, path, leaf, ctx, budget) {
                return true;
            }
            args.pop();
        }
        false
    }
}

/// The single candidate a chain of gates leads to.
fn sole_leaf(node: &Node) -> Option<usize> {
    match node {
        Node::Leaf(c) => Some(*c),
        Node::Select(d) if d.if_false == Node::NoMatch => sole_leaf(&d.if_true),
        _ => None,
    }
}

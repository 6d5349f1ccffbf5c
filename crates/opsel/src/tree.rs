//! Selector tree construction.
//!
//! A tree is compiled per [`OpGroup`]. Each internal node tests one
//! [`Selector`]; each leaf names exactly one candidate. Splits are chosen
//! greedily in selector priority order, keeping on each branch only the
//! candidates that can still be valid there.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use crate::error::BuildError;
use crate::ir::{Bitness, BitnessSet, Signature};
use crate::model::Config;
use crate::selector::{
    potential_selectors, CmpOp, Comparand, Condition, Family, Relation, Selector, Subject,
};
use crate::table::{EncodingCandidate, OpGroup};

// ─── Nodes ───────────────────────────────────────────────────────────────────

/// A node of a selector tree.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Node {
    /// Selects the candidate at this index of the group.
    Leaf(usize),
    /// No candidate is valid on this path.
    NoMatch,
    /// Tests a selector and continues on one branch.
    Select(Box<Decision>),
}

/// An internal node.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Decision {
    /// What is tested.
    pub selector: Selector,
    /// Structured form of the test.
    pub condition: Condition,
    /// Bitnesses in which the true branch may be taken at all. In any other
    /// bitness the node always takes the false branch.
    pub enabled: BitnessSet,
    /// Taken when the test holds (and the bitness is enabled).
    pub if_true: Node,
    /// Taken otherwise.
    pub if_false: Node,
}

impl Decision {
    /// Whether the true branch is taken in `bitness` when the test evaluates to `holds`.
    pub fn takes_true(&self, bitness: Bitness, holds: bool) -> bool {
        holds && self.enabled.contains(bitness)
    }

    /// The condition with a bitness-membership prefix when `enabled` is
    /// narrower than the bitnesses the test can hold in by itself.
    pub fn gated_condition(&self) -> Condition {
        let kind = self.selector.kind;
        let natural = kind
            .satisfying_bitness()
            .unwrap_or(BitnessSet::ALL)
            .intersection(kind.supported());
        if natural.is_subset(self.enabled) {
            self.condition.clone()
        } else if self.selector.family() == Family::Bitness {
            Condition::test(
                Subject::Bitness,
                CmpOp::In,
                Comparand::Bitnesses(natural.intersection(self.enabled)),
            )
        } else {
            self.condition.clone().gated(self.enabled)
        }
    }
}

impl Node {
    /// Longest root-to-leaf path, counted in decisions.
    pub fn depth(&self) -> usize {
        match self {
            Node::Select(d) => 1 + d.if_true.depth().max(d.if_false.depth()),
            _ => 0,
        }
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        match self {
            Node::Select(d) => 1 + d.if_true.node_count() + d.if_false.node_count(),
            _ => 1,
        }
    }

    fn collect_leaves(&self, out: &mut Vec<usize>) {
        match self {
            Node::Leaf(c) => out.push(*c),
            Node::NoMatch => {}
            Node::Select(d) => {
                d.if_true.collect_leaves(out);
                d.if_false.collect_leaves(out);
            }
        }
    }

    /// Whether candidate `target` is reachable in `bitness`.
    ///
    /// Bitness tests are decided statically; every other enabled test may go
    /// either way.
    pub fn reaches(&self, bitness: Bitness, target: usize) -> bool {
        match self {
            Node::Leaf(c) => *c == target,
            Node::NoMatch => false,
            Node::Select(d) => {
                let enabled = d.enabled.contains(bitness);
                match d.selector.kind.satisfying_bitness() {
                    Some(sat) if enabled && sat.contains(bitness) => d.if_true.reaches(bitness, target),
                    Some(_) => d.if_false.reaches(bitness, target),
                    None => {
                        (enabled && d.if_true.reaches(bitness, target))
                            || d.if_false.reaches(bitness, target)
                    }
                }
            }
        }
    }
}

// ─── Trees ───────────────────────────────────────────────────────────────────

/// The compiled decision tree of one group.
///
/// Immutable after construction and safe to share across threads.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SelectorTree {
    group: OpGroup,
    root: Node,
}

impl SelectorTree {
    /// Compile the tree of `group`.
    ///
    /// # Errors
    ///
    /// - [`BuildError::Ambiguous`] when two candidates share a path no
    ///   selector can split.
    /// - [`BuildError::Unreachable`] when a candidate reaches no leaf in any
    ///   of its configured bitnesses.
    /// - [`BuildError::InvalidPairing`] when a selector would test a slot of
    ///   the wrong kind.
    /// - [`BuildError::LimitExceeded`] when the group or the tree outgrows
    ///   the configured limits.
    pub fn build(group: OpGroup, config: &Config) -> Result<Self, BuildError> {
        if group.candidates.len() > config.limits.max_candidates {
            return Err(BuildError::LimitExceeded {
                resource: "group candidates".into(),
                limit: config.limits.max_candidates,
            });
        }
        let builder = Builder {
            selectors: potential_selectors(&group.candidates),
            group: &group,
            config,
        };
        let all: Vec<usize> = (0..group.candidates.len()).collect();
        let root = builder.build(&all, &[], config.bitnesses, 0)?;
        builder.check_reachable(&root)?;
        log::debug!(
            "{}: compiled tree of {} candidates ({} nodes, depth {})",
            group,
            group.candidates.len(),
            root.node_count(),
            root.depth()
        );
        Ok(Self { group, root })
    }

    /// The group the tree was compiled for.
    pub fn group(&self) -> &OpGroup {
        &self.group
    }

    /// Root node.
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Mnemonic of the group.
    pub fn mnemonic(&self) -> &str {
        &self.group.mnemonic
    }

    /// Signature of the group.
    pub fn signature(&self) -> &Signature {
        &self.group.signature
    }

    /// Candidate named by a leaf.
    pub fn candidate(&self, index: usize) -> Option<&EncodingCandidate> {
        self.group.candidates.get(index)
    }

    /// Distinct leaf candidates, ascending.
    pub fn leaves(&self) -> Vec<usize> {
        let mut out = Vec::new();
        self.root.collect_leaves(&mut out);
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Longest path in decisions.
    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }
}

/// One-line outline: `RegisterAl(0) ? Add_AL_imm8 : Add_rm8_imm8`.
impl fmt::Display for SelectorTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        outline(f, &self.group, &self.root, false)
    }
}

fn outline(f: &mut fmt::Formatter<'_>, group: &OpGroup, node: &Node, nested: bool) -> fmt::Result {
    match node {
        Node::Leaf(c) => match group.candidates.get(*c) {
            Some(cand) => write!(f, "{}", cand.code),
            None => write!(f, "#{c}"),
        },
        Node::NoMatch => write!(f, "-"),
        Node::Select(d) => {
            if nested {
                write!(f, "(")?;
            }
            write!(f, "{} ? ", d.selector)?;
            outline(f, group, &d.if_true, true)?;
            write!(f, " : ")?;
            outline(f, group, &d.if_false, true)?;
            if nested {
                write!(f, ")")?;
            }
            Ok(())
        }
    }
}

// ─── Builder ─────────────────────────────────────────────────────────────────

struct Builder<'a> {
    group: &'a OpGroup,
    config: &'a Config,
    selectors: Vec<Selector>,
}

impl Builder<'_> {
    fn effective(&self, c: usize, feasible: BitnessSet) -> BitnessSet {
        self.group.candidates[c].bitness.intersection(feasible)
    }

    fn relation(&self, sel: &Selector, c: usize, feasible: BitnessSet) -> Relation {
        sel.relation(&self.group.candidates[c], feasible)
    }

    /// A bitness test whose outcome the feasible set already fixes.
    fn settled(sel: &Selector, feasible: BitnessSet) -> bool {
        sel.kind
            .satisfying_bitness()
            .is_some_and(|sat| feasible.is_subset(sat) || feasible.intersection(sat).is_empty())
    }

    fn open<'s>(
        &'s self,
        decided: &'s [Selector],
        feasible: BitnessSet,
    ) -> impl Iterator<Item = &'s Selector> + 's {
        self.selectors
            .iter()
            .filter(move |s| !decided.contains(s) && !Self::settled(s, feasible))
    }

    fn check_pairing(&self, sel: &Selector) -> Result<(), BuildError> {
        if sel.pairs_with(&self.group.signature) {
            return Ok(());
        }
        Err(BuildError::InvalidPairing {
            mnemonic: self.group.mnemonic.clone(),
            kind: sel.kind,
            slot: sel.slot,
            arg_kind: sel.slot.and_then(|s| self.group.signature.kind(s)),
        })
    }

    fn check_depth(&self, depth: usize) -> Result<(), BuildError> {
        if depth > self.config.limits.max_depth {
            return Err(BuildError::LimitExceeded {
                resource: "selector tree depth".into(),
                limit: self.config.limits.max_depth,
            });
        }
        Ok(())
    }

    /// Bitnesses feasible on each branch of `sel`.
    fn branch_feasible(sel: &Selector, feasible: BitnessSet) -> (BitnessSet, BitnessSet) {
        match sel.kind.satisfying_bitness() {
            Some(sat) => (feasible.intersection(sat), feasible.difference(sat)),
            None => (feasible.intersection(sel.kind.supported()), feasible),
        }
    }

    /// `c` can stand in for `x` on every open test: wherever `c` cares, `x`
    /// agrees, and `c` covers every bitness `x` does.
    fn subsumes(&self, c: usize, x: usize, decided: &[Selector], feasible: BitnessSet) -> bool {
        self.effective(x, feasible).is_subset(self.effective(c, feasible))
            && self.open(decided, feasible).all(|s| {
                let rc = self.relation(s, c, feasible);
                rc == Relation::DontCare || rc == self.relation(s, x, feasible)
            })
    }

    /// `c` is a mode-restricted form of `x`: every bitness `c` is selected in
    /// is one `x` is selected in too.
    fn narrows(&self, c: usize, x: usize) -> bool {
        let scope = self.config.bitnesses;
        let (c, x) = (&self.group.candidates[c], &self.group.candidates[x]);
        c.bitness.intersection(scope).is_subset(x.bitness.intersection(scope))
    }

    /// Candidates of one branch: those not `reject`ed by the test, minus
    /// don't-care candidates subsumed by a `keep` candidate.
    ///
    /// A split on bitness only lets `keep` candidates shadow forms they
    /// narrow. Two forms whose bitness sets merely overlap stay side by side
    /// and end up ambiguous.
    #[allow(clippy::too_many_arguments)]
    fn side(
        &self,
        sel: &Selector,
        cands: &[usize],
        rels: &[Relation],
        reject: Relation,
        keep: Relation,
        decided: &[Selector],
        feasible: BitnessSet,
    ) -> Vec<usize> {
        let by_bitness = sel.family() == Family::Bitness;
        let live: Vec<(usize, Relation)> = cands
            .iter()
            .zip(rels)
            .filter(|(c, r)| **r != reject && !self.effective(**c, feasible).is_empty())
            .map(|(c, r)| (*c, *r))
            .collect();
        live.iter()
            .filter(|(x, rx)| {
                *rx != Relation::DontCare
                    || !live
                        .iter()
                        .any(|(c, rc)| {
                            *rc == keep
                                && (!by_bitness || self.narrows(*c, *x))
                                && self.subsumes(*c, *x, decided, feasible)
                        })
            })
            .map(|(x, _)| *x)
            .collect()
    }

    fn build(
        &self,
        cands: &[usize],
        decided: &[Selector],
        feasible: BitnessSet,
        depth: usize,
    ) -> Result<Node, BuildError> {
        let cands: Vec<usize> = cands
            .iter()
            .copied()
            .filter(|&c| !self.effective(c, feasible).is_empty())
            .collect();
        match cands[..] {
            [] => return Ok(Node::NoMatch),
            [only] => return self.build_single(only, decided, feasible, depth),
            _ => self.check_depth(depth)?,
        }

        for sel in self.open(decided, feasible) {
            let rels: Vec<Relation> = cands.iter().map(|&c| self.relation(sel, c, feasible)).collect();
            let mentioned = if sel.needs_requirement() {
                rels.contains(&Relation::Required)
            } else {
                rels.iter().any(|r| *r != Relation::DontCare)
            };
            if !mentioned {
                continue;
            }
            self.check_pairing(sel)?;

            let (feasible_t, feasible_f) = Self::branch_feasible(sel, feasible);
            let mut decided_t = decided.to_vec();
            decided_t.push(*sel);
            decided_t.extend(sel.implies());
            let mut decided_f = decided.to_vec();
            decided_f.push(*sel);

            let on_true = self.side(
                sel,
                &cands,
                &rels,
                Relation::Excluded,
                Relation::Required,
                &decided_t,
                feasible_t,
            );
            let on_false = self.side(
                sel,
                &cands,
                &rels,
                Relation::Required,
                Relation::Excluded,
                &decided_f,
                feasible_f,
            );
            if on_true.is_empty() || (on_true == cands && (on_false == cands || on_false.is_empty())) {
                continue;
            }

            let reach = on_true
                .iter()
                .fold(BitnessSet::EMPTY, |acc, &c| acc.union(self.group.candidates[c].bitness));
            let enabled = sel.kind.supported().intersection(feasible).intersection(reach);
            log::trace!(
                "{}: split on {} ({} true / {} false)",
                self.group,
                sel,
                on_true.len(),
                on_false.len()
            );
            return Ok(Node::Select(Box::new(Decision {
                selector: *sel,
                condition: sel.condition(&self.group.signature),
                enabled,
                if_true: self.build(&on_true, &decided_t, feasible_t, depth + 1)?,
                if_false: self.build(&on_false, &decided_f, feasible_f, depth + 1)?,
            })));
        }

        Err(BuildError::Ambiguous {
            mnemonic: self.group.mnemonic.clone(),
            signature: self.group.signature.clone(),
            candidates: cands
                .iter()
                .map(|&c| self.group.candidates[c].code.clone())
                .collect(),
        })
    }

    /// Gate a lone candidate on every test it requires, then emit its leaf.
    /// Preference tests never gate.
    fn build_single(
        &self,
        c: usize,
        decided: &[Selector],
        feasible: BitnessSet,
        depth: usize,
    ) -> Result<Node, BuildError> {
        if self.effective(c, feasible).is_empty() {
            return Ok(Node::NoMatch);
        }
        self.check_depth(depth)?;
        let gate = self
            .open(decided, feasible)
            .find(|s| s.family() != Family::Environment && self.relation(s, c, feasible) == Relation::Required)
            .copied();
        let Some(sel) = gate else {
            return Ok(Node::Leaf(c));
        };
        self.check_pairing(&sel)?;

        let (feasible_t, _) = Self::branch_feasible(&sel, feasible);
        let mut decided_t = decided.to_vec();
        decided_t.push(sel);
        decided_t.extend(sel.implies());
        let enabled = sel
            .kind
            .supported()
            .intersection(feasible)
            .intersection(self.group.candidates[c].bitness);
        Ok(Node::Select(Box::new(Decision {
            selector: sel,
            condition: sel.condition(&self.group.signature),
            enabled,
            if_true: self.build_single(c, &decided_t, feasible_t, depth + 1)?,
            if_false: Node::NoMatch,
        })))
    }

    fn check_reachable(&self, root: &Node) -> Result<(), BuildError> {
        let errors: Vec<BuildError> = self
            .group
            .candidates
            .iter()
            .enumerate()
            .filter(|(i, c)| {
                let scope = c.bitness.intersection(self.config.bitnesses);
                c.bitness.is_empty() || (!scope.is_empty() && !scope.iter().any(|b| root.reaches(b, *i)))
            })
            .map(|(_, c)| BuildError::Unreachable {
                mnemonic: self.group.mnemonic.clone(),
                candidate: c.code.clone(),
            })
            .collect();
        BuildError::from_list(errors).map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ArgKind, RegisterClass};
    use crate::table::{Definition, EncodingTable};
    use alloc::string::ToString;
    use alloc::vec;

    fn builtin_tree(mnemonic: &str, sig: &[ArgKind]) -> SelectorTree {
        let table = EncodingTable::builtin().unwrap();
        let group = table
            .group(mnemonic, &Signature(sig.to_vec()))
            .unwrap_or_else(|| panic!("no group {mnemonic}"))
            .clone();
        SelectorTree::build(group, &Config::default()).unwrap()
    }

    fn single_group(defs: &[Definition]) -> OpGroup {
        EncodingTable::from_definitions(defs)
            .unwrap()
            .into_groups()
            .swap_remove(0)
    }

    const R8: ArgKind = ArgKind::Register(RegisterClass::Gpr8);
    const R16: ArgKind = ArgKind::Register(RegisterClass::Gpr16);
    const ST: ArgKind = ArgKind::Register(RegisterClass::St);
    const XMM: ArgKind = ArgKind::Register(RegisterClass::Xmm);

    #[test]
    fn accumulator_literal_first() {
        let t = builtin_tree("add", &[R8, ArgKind::Immediate]);
        assert_eq!(t.to_string(), "RegisterAl(0) ? Add_AL_imm8 : Add_rm8_imm8");
        assert_eq!(t.depth(), 1);
        assert_eq!(t.node_count(), 3);
    }

    #[test]
    fn narrow_immediate_after_literal() {
        let t = builtin_tree("add", &[R16, ArgKind::Immediate]);
        assert_eq!(
            t.to_string(),
            "RegisterAx(0) ? Add_AX_imm16 : (ImmediateByteSigned8To16(1) ? Add_rm16_imm8 : Add_rm16_imm16)"
        );
    }

    #[test]
    fn bitness_split_for_short_forms() {
        let t = builtin_tree("inc", &[R16]);
        assert_eq!(t.to_string(), "Bitness64 ? Inc_rm16 : Inc_r16");
        let Node::Select(d) = t.root() else {
            panic!("expected a decision")
        };
        assert_eq!(d.enabled, BitnessSet::only(Bitness::Bits64));
    }

    #[test]
    fn literal_one() {
        let t = builtin_tree("shl", &[R8, ArgKind::Immediate]);
        assert_eq!(t.to_string(), "ImmediateByteEqual1(1) ? Shl_rm8_1 : Shl_rm8_imm8");
    }

    #[test]
    fn branches_split_by_bitness_then_preference() {
        let t = builtin_tree("jmp", &[ArgKind::Label]);
        assert_eq!(
            t.to_string(),
            "Bitness64 ? (ShortBranch ? Jmp_rel8_64 : Jmp_rel32_64) : \
             (Bitness32 ? (ShortBranch ? Jmp_rel8_32 : Jmp_rel32_32) : (ShortBranch ? Jmp_rel8_16 : Jmp_rel16))"
        );
        assert_eq!(t.leaves().len(), 6);
    }

    #[test]
    fn moffs_before_register_literal() {
        let t = builtin_tree("mov", &[R8, ArgKind::Memory]);
        assert_eq!(
            t.to_string(),
            "MemOffsAl(1, 0) ? (Memory8(1) ? Mov_AL_moffs8 : -) : (Memory8(1) ? Mov_r8_rm8 : -)"
        );
    }

    #[test]
    fn fixed_register_in_either_slot() {
        let t = builtin_tree("fadd", &[ST, ST]);
        assert_eq!(
            t.to_string(),
            "RegisterSt0(0) ? Fadd_st0_sti : (RegisterSt0(1) ? Fadd_sti_st0 : -)"
        );
    }

    #[test]
    fn vex_evex_and_broadcast() {
        let t = builtin_tree("vaddps", &[XMM, XMM, ArgKind::Memory]);
        assert_eq!(
            t.to_string(),
            "Memory128(2) ? (EvexBroadcast(2) ? EVEX_Vaddps_xmm_k1z_xmm_xmmm128b32 : \
             (Vex ? VEX_Vaddps_xmm_xmm_xmmm128 : EVEX_Vaddps_xmm_k1z_xmm_xmmm128b32)) : \
             EVEX_Vaddps_xmm_k1z_xmm_xmmm128b32"
        );
        let reg = builtin_tree("vaddps", &[XMM, XMM, XMM]);
        assert_eq!(
            reg.to_string(),
            "Vex ? VEX_Vaddps_xmm_xmm_xmmm128 : EVEX_Vaddps_xmm_k1z_xmm_xmmm128b32"
        );
    }

    #[test]
    fn segment_pushes_gate_by_bitness() {
        let t = builtin_tree("push", &[ArgKind::Register(RegisterClass::Segment)]);
        let Node::Select(root) = t.root() else {
            panic!("expected a decision")
        };
        assert_eq!(root.selector.kind, crate::selector::SelectorKind::RegisterEs);
        assert_eq!(root.enabled, BitnessSet::LEGACY);
        for code in ["Pushw_FS", "Pushd_FS", "Pushq_FS", "Pushw_ES", "Pushd_ES"] {
            let idx = t.group().candidates.iter().position(|c| c.code == code).unwrap();
            assert!(t.leaves().contains(&idx), "{code}");
        }
    }

    #[test]
    fn gated_condition_prefixes_bitness() {
        let t = builtin_tree("push", &[ArgKind::Register(RegisterClass::Segment)]);
        let Node::Select(root) = t.root() else {
            panic!("expected a decision")
        };
        assert_eq!(root.gated_condition().to_string(), "bitness in {16, 32} && arg0 == es");
        let inc = builtin_tree("inc", &[R16]);
        let Node::Select(d) = inc.root() else {
            panic!("expected a decision")
        };
        assert_eq!(d.gated_condition().to_string(), "bitness == 64");
        let jmp = builtin_tree("jmp", &[ArgKind::Label]);
        let Node::Select(root) = jmp.root() else {
            panic!("expected a decision")
        };
        let Node::Select(inner) = &root.if_false else {
            panic!("expected a nested decision")
        };
        assert_eq!(inner.gated_condition().to_string(), "bitness in {32}");
    }

    #[test]
    fn duplicate_candidates_are_ambiguous() {
        let group = single_group(&[
            Definition::new("Inc_A", "inc", "FE /0", "r/m8"),
            Definition::new("Inc_B", "inc", "FE /0", "r8"),
        ]);
        let err = SelectorTree::build(group, &Config::default()).unwrap_err();
        assert_eq!(
            err,
            BuildError::Ambiguous {
                mnemonic: "inc".into(),
                signature: Signature(vec![R8]),
                candidates: vec!["Inc_A".into(), "Inc_B".into()],
            }
        );
    }

    #[test]
    fn overlapping_bitness_is_ambiguous() {
        let group = single_group(&[
            Definition::new("A_r8", "op", "00", "r8").bitness(BitnessSet::LEGACY),
            Definition::new("B_r8", "op", "01", "r8").bitness(BitnessSet::WIDE),
        ]);
        let err = SelectorTree::build(group, &Config::default()).unwrap_err();
        assert_eq!(
            err,
            BuildError::Ambiguous {
                mnemonic: "op".into(),
                signature: Signature(vec![R8]),
                candidates: vec!["A_r8".into(), "B_r8".into()],
            }
        );
    }

    #[test]
    fn mode_restricted_form_shadows_general_form() {
        let group = single_group(&[
            Definition::new("A_r8", "op", "00", "r8").bitness(BitnessSet::only(Bitness::Bits32)),
            Definition::new("B_r8", "op", "01", "r8"),
        ]);
        let t = SelectorTree::build(group, &Config::default()).unwrap();
        assert_eq!(t.to_string(), "Bitness64 ? B_r8 : (Bitness32 ? A_r8 : B_r8)");
    }

    #[test]
    fn empty_bitness_is_unreachable() {
        let group = single_group(&[Definition::new("Nope", "nope", "0F 0B", "r8").bitness(BitnessSet::EMPTY)]);
        let err = SelectorTree::build(group, &Config::default()).unwrap_err();
        assert!(matches!(err, BuildError::Unreachable { candidate, .. } if candidate == "Nope"));
    }

    #[test]
    fn mismatched_literal_is_invalid_pairing() {
        let mut group = single_group(&[Definition::new("Inc_AL", "inc", "FE C0", "al")]);
        group.signature = Signature(vec![R16]);
        let err = SelectorTree::build(group, &Config::default()).unwrap_err();
        assert_eq!(
            err,
            BuildError::InvalidPairing {
                mnemonic: "inc".into(),
                kind: crate::selector::SelectorKind::RegisterAl,
                slot: Some(0),
                arg_kind: Some(R16),
            }
        );
    }

    #[test]
    fn limits_are_enforced() {
        let group = builtin_tree("jmp", &[ArgKind::Label]).group().clone();
        let shallow = Config::default().with_limits(crate::model::Limits {
            max_depth: 1,
            ..Default::default()
        });
        assert!(matches!(
            SelectorTree::build(group.clone(), &shallow),
            Err(BuildError::LimitExceeded { limit: 1, .. })
        ));
        let narrow = Config::default().with_limits(crate::model::Limits {
            max_candidates: 2,
            ..Default::default()
        });
        assert!(matches!(
            SelectorTree::build(group, &narrow),
            Err(BuildError::LimitExceeded { limit: 2, .. })
        ));
    }

    #[test]
    fn restricted_bitness_prunes_candidates() {
        let group = builtin_tree("jmp", &[ArgKind::Label]).group().clone();
        let config = Config::default().with_bitnesses(BitnessSet::only(Bitness::Bits64));
        let t = SelectorTree::build(group, &config).unwrap();
        assert_eq!(t.to_string(), "ShortBranch ? Jmp_rel8_64 : Jmp_rel32_64");
    }

    #[test]
    fn every_builtin_group_compiles() {
        let table = EncodingTable::builtin().unwrap();
        for group in table.groups() {
            let tree = SelectorTree::build(group.clone(), &Config::default())
                .unwrap_or_else(|e| panic!("{group}: {e}"));
            assert!(!tree.leaves().is_empty(), "{group}");
        }
    }

    #[test]
    fn trees_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SelectorTree>();
    }
}

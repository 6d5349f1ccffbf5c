//! Selector kinds, their relation to candidates, and the structured
//! conditions they stand for.
//!
//! A selector is a boolean test over the call-site arguments, the bitness or
//! an encoder preference. Every candidate either requires it, excludes it or
//! does not care; the tree builder splits on selectors to tell candidates
//! apart.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use crate::eval::Context;
use crate::ir::{Arg, ArgKind, Bitness, BitnessSet, MemorySize, Register, RegisterClass, Signature};
use crate::table::{BranchKind, Encoding, EncodingCandidate, OperandKind};

// ─── Selector kinds ──────────────────────────────────────────────────────────

/// Closed set of tests a selector tree node can perform.
///
/// Declaration order is priority order: when several selectors could split a
/// set of candidates, the earliest declared one is tested first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SelectorKind {
    // Literal operands
    /// Peer register is `al` and this memory operand is displacement-only.
    MemOffsAl,
    /// Peer register is `ax` and this memory operand is displacement-only.
    MemOffsAx,
    /// Peer register is `eax` and this memory operand is displacement-only.
    MemOffsEax,
    /// Peer register is `rax` and this memory operand is displacement-only.
    MemOffsRax,
    /// Argument is `al`.
    RegisterAl,
    /// Argument is `cl`.
    RegisterCl,
    /// Argument is `ax`.
    RegisterAx,
    /// Argument is `dx`.
    RegisterDx,
    /// Argument is `eax`.
    RegisterEax,
    /// Argument is `rax`.
    RegisterRax,
    /// Argument is `es`.
    RegisterEs,
    /// Argument is `cs`.
    RegisterCs,
    /// Argument is `ss`.
    RegisterSs,
    /// Argument is `ds`.
    RegisterDs,
    /// Argument is `fs`.
    RegisterFs,
    /// Argument is `gs`.
    RegisterGs,
    /// Argument is `st(0)`.
    RegisterSt0,
    /// Immediate equals 1.
    ImmediateByteEqual1,

    // Memory membership
    /// Memory operand is 8 bits.
    Memory8,
    /// Memory operand is 16 bits.
    Memory16,
    /// Memory operand is 32 bits.
    Memory32,
    /// Memory operand is 48 bits.
    Memory48,
    /// Memory operand is 64 bits.
    Memory64,
    /// Memory operand is 80 bits.
    Memory80,
    /// Memory operand is 128 bits.
    Memory128,
    /// Memory operand is 256 bits.
    Memory256,
    /// Memory operand is 512 bits.
    Memory512,
    /// VSIB index is an xmm register.
    MemoryIndexXmm,
    /// VSIB index is a ymm register.
    MemoryIndexYmm,
    /// VSIB index is a zmm register.
    MemoryIndexZmm,

    // Bitness
    /// Bitness is 64.
    Bitness64,
    /// Bitness is 32 or more.
    Bitness32,

    // Narrow immediates
    /// Immediate fits an 8-bit value sign-extended to 16 bits.
    ImmediateByteSigned8To16,
    /// Immediate fits an 8-bit value sign-extended to 32 bits.
    ImmediateByteSigned8To32,
    /// Immediate fits an 8-bit value sign-extended to 64 bits.
    ImmediateByteSigned8To64,

    // Environment and flags
    /// Memory operand is an EVEX broadcast.
    EvexBroadcast,
    /// Encoder prefers VEX over EVEX.
    Vex,
    /// Encoder prefers short branches.
    ShortBranch,
}

/// Priority family of a [`SelectorKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Family {
    /// Fixed registers, `moffs` and the literal 1.
    Literal,
    /// Memory size and VSIB index class.
    Membership,
    /// Bitness tests.
    Bitness,
    /// Narrow-immediate range tests.
    NarrowImmediate,
    /// Encoder preferences and broadcast.
    Environment,
}

const LITERAL_REGISTERS: [(Register, SelectorKind); 13] = [
    (Register::Al, SelectorKind::RegisterAl),
    (Register::Cl, SelectorKind::RegisterCl),
    (Register::Ax, SelectorKind::RegisterAx),
    (Register::Dx, SelectorKind::RegisterDx),
    (Register::Eax, SelectorKind::RegisterEax),
    (Register::Rax, SelectorKind::RegisterRax),
    (Register::Es, SelectorKind::RegisterEs),
    (Register::Cs, SelectorKind::RegisterCs),
    (Register::Ss, SelectorKind::RegisterSs),
    (Register::Ds, SelectorKind::RegisterDs),
    (Register::Fs, SelectorKind::RegisterFs),
    (Register::Gs, SelectorKind::RegisterGs),
    (Register::St0, SelectorKind::RegisterSt0),
];

const MEMOFFS_REGISTERS: [(Register, SelectorKind); 4] = [
    (Register::Al, SelectorKind::MemOffsAl),
    (Register::Ax, SelectorKind::MemOffsAx),
    (Register::Eax, SelectorKind::MemOffsEax),
    (Register::Rax, SelectorKind::MemOffsRax),
];

const MEMORY_SIZES: [(MemorySize, SelectorKind); 9] = [
    (MemorySize::Byte, SelectorKind::Memory8),
    (MemorySize::Word, SelectorKind::Memory16),
    (MemorySize::Dword, SelectorKind::Memory32),
    (MemorySize::Fword, SelectorKind::Memory48),
    (MemorySize::Qword, SelectorKind::Memory64),
    (MemorySize::Tbyte, SelectorKind::Memory80),
    (MemorySize::Xword, SelectorKind::Memory128),
    (MemorySize::Yword, SelectorKind::Memory256),
    (MemorySize::Zword, SelectorKind::Memory512),
];

impl SelectorKind {
    /// Priority family.
    pub fn family(self) -> Family {
        use SelectorKind::*;
        match self {
            MemOffsAl | MemOffsAx | MemOffsEax | MemOffsRax | RegisterAl | RegisterCl
            | RegisterAx | RegisterDx | RegisterEax | RegisterRax | RegisterEs | RegisterCs
            | RegisterSs | RegisterDs | RegisterFs | RegisterGs | RegisterSt0
            | ImmediateByteEqual1 => Family::Literal,
            Memory8 | Memory16 | Memory32 | Memory48 | Memory64 | Memory80 | Memory128
            | Memory256 | Memory512 | MemoryIndexXmm | MemoryIndexYmm | MemoryIndexZmm => {
                Family::Membership
            }
            Bitness64 | Bitness32 => Family::Bitness,
            ImmediateByteSigned8To16 | ImmediateByteSigned8To32 | ImmediateByteSigned8To64 => {
                Family::NarrowImmediate
            }
            EvexBroadcast | Vex | ShortBranch => Family::Environment,
        }
    }

    /// Bitnesses in which the test is meaningful at all.
    pub fn supported(self) -> BitnessSet {
        match self {
            SelectorKind::RegisterRax
            | SelectorKind::MemOffsRax
            | SelectorKind::ImmediateByteSigned8To64 => BitnessSet::only(Bitness::Bits64),
            _ => BitnessSet::ALL,
        }
    }

    /// For bitness tests, the bitnesses that satisfy them.
    pub fn satisfying_bitness(self) -> Option<BitnessSet> {
        match self {
            SelectorKind::Bitness64 => Some(BitnessSet::only(Bitness::Bits64)),
            SelectorKind::Bitness32 => Some(BitnessSet::WIDE),
            _ => None,
        }
    }

    /// Register compared against by literal and `moffs` tests.
    pub fn register(self) -> Option<Register> {
        LITERAL_REGISTERS
            .iter()
            .chain(MEMOFFS_REGISTERS.iter())
            .find(|(_, k)| *k == self)
            .map(|(r, _)| *r)
    }

    /// Literal test for `reg`, if one exists.
    pub fn for_register(reg: Register) -> Option<SelectorKind> {
        LITERAL_REGISTERS.iter().find(|(r, _)| *r == reg).map(|(_, k)| *k)
    }

    /// `moffs` test for the accumulator `reg`, if one exists.
    pub fn memoffs_for(reg: Register) -> Option<SelectorKind> {
        MEMOFFS_REGISTERS.iter().find(|(r, _)| *r == reg).map(|(_, k)| *k)
    }

    /// Whether this is a `MemOffs*` test.
    pub fn is_memoffs(self) -> bool {
        MEMOFFS_REGISTERS.iter().any(|(_, k)| *k == self)
    }

    /// Memory size tested by `Memory*` kinds.
    pub fn memory_size(self) -> Option<MemorySize> {
        MEMORY_SIZES.iter().find(|(_, k)| *k == self).map(|(s, _)| *s)
    }

    /// `Memory*` test for `size`.
    pub fn for_memory_size(size: MemorySize) -> Option<SelectorKind> {
        MEMORY_SIZES.iter().find(|(s, _)| *s == size).map(|(_, k)| *k)
    }

    /// Index class tested by `MemoryIndex*` kinds.
    pub fn index_class(self) -> Option<RegisterClass> {
        match self {
            SelectorKind::MemoryIndexXmm => Some(RegisterClass::Xmm),
            SelectorKind::MemoryIndexYmm => Some(RegisterClass::Ymm),
            SelectorKind::MemoryIndexZmm => Some(RegisterClass::Zmm),
            _ => None,
        }
    }

    /// `MemoryIndex*` test for `class`.
    pub fn for_index_class(class: RegisterClass) -> Option<SelectorKind> {
        match class {
            RegisterClass::Xmm => Some(SelectorKind::MemoryIndexXmm),
            RegisterClass::Ymm => Some(SelectorKind::MemoryIndexYmm),
            RegisterClass::Zmm => Some(SelectorKind::MemoryIndexZmm),
            _ => None,
        }
    }

    /// Extended width of the narrow-immediate tests.
    pub fn narrow_bits(self) -> Option<u32> {
        match self {
            SelectorKind::ImmediateByteSigned8To16 => Some(16),
            SelectorKind::ImmediateByteSigned8To32 => Some(32),
            SelectorKind::ImmediateByteSigned8To64 => Some(64),
            _ => None,
        }
    }

    /// Narrow-immediate test for an operand sign-extended to `bits`.
    pub fn for_narrow_bits(bits: u32) -> Option<SelectorKind> {
        match bits {
            16 => Some(SelectorKind::ImmediateByteSigned8To16),
            32 => Some(SelectorKind::ImmediateByteSigned8To32),
            64 => Some(SelectorKind::ImmediateByteSigned8To64),
            _ => None,
        }
    }

    /// Whether the test reads an argument slot.
    pub fn has_slot(self) -> bool {
        self.family() != Family::Bitness && !self.is_preference()
    }

    /// Whether the test depends only on encoder preferences.
    pub fn is_preference(self) -> bool {
        matches!(self, SelectorKind::Vex | SelectorKind::ShortBranch)
    }

    /// Whether the kind may test a slot of `slot` kind (and a peer of `peer` kind).
    pub fn pairs_with(self, slot: Option<ArgKind>, peer: Option<ArgKind>) -> bool {
        if !self.has_slot() {
            return slot.is_none();
        }
        let Some(slot) = slot else { return false };
        if self.is_memoffs() {
            return slot == ArgKind::Memory
                && self
                    .register()
                    .is_some_and(|r| peer == Some(ArgKind::Register(r.class())));
        }
        match self.family() {
            Family::Literal if self == SelectorKind::ImmediateByteEqual1 => slot.is_immediate(),
            Family::Literal => self
                .register()
                .is_some_and(|r| slot == ArgKind::Register(r.class())),
            Family::NarrowImmediate => slot.is_immediate(),
            Family::Membership | Family::Environment => slot == ArgKind::Memory,
            Family::Bitness => false,
        }
    }
}

// ─── Selectors ───────────────────────────────────────────────────────────────

/// A selector kind bound to the argument slot(s) it reads.
///
/// Ordered by priority: kind, then slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Selector {
    /// What is tested.
    pub kind: SelectorKind,
    /// Argument slot tested, for argument-based kinds.
    pub slot: Option<usize>,
    /// Register slot compared by `MemOffs*` kinds.
    pub peer: Option<usize>,
}

impl Selector {
    /// A test without argument slots (bitness, preferences).
    pub fn global(kind: SelectorKind) -> Self {
        Self {
            kind,
            slot: None,
            peer: None,
        }
    }

    /// A test of argument `slot`.
    pub fn at(kind: SelectorKind, slot: usize) -> Self {
        Self {
            kind,
            slot: Some(slot),
            peer: None,
        }
    }

    /// A `MemOffs*` test of memory `slot` against register `peer`.
    pub fn memoffs(kind: SelectorKind, slot: usize, peer: usize) -> Self {
        Self {
            kind,
            slot: Some(slot),
            peer: Some(peer),
        }
    }

    /// Priority family.
    pub fn family(&self) -> Family {
        self.kind.family()
    }

    /// A selector whose outcome is fixed to true when this one holds.
    ///
    /// `MemOffsAl` at slot 1 against slot 0 implies `RegisterAl` at slot 0.
    pub fn implies(&self) -> Option<Selector> {
        if !self.kind.is_memoffs() {
            return None;
        }
        let literal = self.kind.register().and_then(SelectorKind::for_register)?;
        Some(Selector::at(literal, self.peer?))
    }

    /// Whether the selector may test a group with `signature`.
    pub fn pairs_with(&self, signature: &Signature) -> bool {
        let slot = self.slot.map(|s| signature.kind(s));
        let peer = self.peer.and_then(|p| signature.kind(p));
        match slot {
            Some(None) => false,
            Some(kind) => self.kind.pairs_with(kind, peer),
            None => self.kind.pairs_with(None, None),
        }
    }

    /// How `candidate` relates to this selector, given the bitnesses still
    /// feasible on the current path.
    pub fn relation(&self, candidate: &EncodingCandidate, feasible: BitnessSet) -> Relation {
        use OperandKind as Op;
        use Relation::*;
        let op = self.slot.and_then(|s| candidate.operands.get(s));
        let kind = self.kind;

        if kind.is_memoffs() {
            let peer = self.peer.and_then(|p| candidate.operands.get(p));
            return match (op, peer, kind.register()) {
                (Some(Op::MemoryOffset(_)), Some(Op::FixedRegister(r)), Some(want)) if *r == want => {
                    Required
                }
                (Some(Op::MemoryOffset(_)), _, _) => Excluded,
                _ => DontCare,
            };
        }
        if let Some(sat) = kind.satisfying_bitness() {
            let effective = candidate.bitness.intersection(feasible);
            return if effective.is_empty() {
                DontCare
            } else if effective.is_subset(sat) {
                Required
            } else if effective.intersection(sat).is_empty() {
                Excluded
            } else {
                DontCare
            };
        }
        match kind {
            SelectorKind::ImmediateByteEqual1 => match op {
                Some(Op::One) => Required,
                _ => DontCare,
            },
            SelectorKind::Vex => match candidate.encoding {
                Encoding::Vex => Required,
                Encoding::Evex => Excluded,
                Encoding::Legacy => DontCare,
            },
            SelectorKind::ShortBranch => {
                let branch = candidate.operands.iter().find_map(|o| match o {
                    Op::Branch(b) => Some(*b),
                    _ => None,
                });
                match branch {
                    Some(BranchKind::Rel8) => Required,
                    Some(_) => Excluded,
                    None => DontCare,
                }
            }
            SelectorKind::EvexBroadcast => match op {
                Some(Op::Memory(_) | Op::MemoryOffset(_) | Op::Vsib(_)) => Excluded,
                _ => DontCare,
            },
            _ => {
                if let Some(want) = kind.register() {
                    return match op {
                        Some(Op::FixedRegister(r)) if *r == want => Required,
                        Some(Op::FixedRegister(r)) if r.class() == want.class() => Excluded,
                        _ => DontCare,
                    };
                }
                if let Some(want) = kind.memory_size() {
                    return match op {
                        Some(Op::Memory(size) | Op::MemoryOffset(size)) => {
                            if *size == MemorySize::Unknown {
                                DontCare
                            } else if *size == want {
                                Required
                            } else {
                                Excluded
                            }
                        }
                        Some(Op::MemoryBroadcast { size, element }) => {
                            if *size == want || *element == want {
                                DontCare
                            } else {
                                Excluded
                            }
                        }
                        _ => DontCare,
                    };
                }
                if let Some(want) = kind.index_class() {
                    return match op {
                        Some(Op::Vsib(index)) if *index == want => Required,
                        Some(Op::Vsib(_) | Op::Memory(_) | Op::MemoryBroadcast { .. } | Op::MemoryOffset(_)) => {
                            Excluded
                        }
                        _ => DontCare,
                    };
                }
                if let Some(bits) = kind.narrow_bits() {
                    return match op {
                        Some(Op::Immediate(imm)) if imm.bits() == 8 && imm.extended_bits() == Some(bits) => {
                            Required
                        }
                        _ => DontCare,
                    };
                }
                DontCare
            }
        }
    }

    /// Whether this selector needs a `Required` candidate before it is worth
    /// testing. Bitness and environment tests are also driven by exclusions.
    pub(crate) fn needs_requirement(&self) -> bool {
        !matches!(self.family(), Family::Bitness | Family::Environment)
    }

    /// The structured condition this selector tests.
    ///
    /// `signature` decides whether narrow-immediate ranges are signed or
    /// unsigned.
    pub fn condition(&self, signature: &Signature) -> Condition {
        let slot = self.slot.unwrap_or(0);
        let kind = self.kind;
        if kind.is_memoffs() {
            let reg = kind.register().unwrap_or(Register::Al);
            return Condition::All(alloc::vec![
                Condition::test(Subject::Arg(self.peer.unwrap_or(0)), CmpOp::Eq, Comparand::Register(reg)),
                Condition::test(Subject::DisplacementOnly(slot), CmpOp::Eq, Comparand::Bool(true)),
            ]);
        }
        if let Some(reg) = kind.register() {
            return Condition::test(Subject::Arg(slot), CmpOp::Eq, Comparand::Register(reg));
        }
        if let Some(size) = kind.memory_size() {
            return Condition::test(Subject::MemorySize(slot), CmpOp::Eq, Comparand::Size(size));
        }
        if let Some(class) = kind.index_class() {
            return Condition::test(Subject::MemoryIndex(slot), CmpOp::Eq, Comparand::Class(class));
        }
        if let Some(bits) = kind.narrow_bits() {
            let unsigned = signature.kind(slot) == Some(ArgKind::ImmediateUnsigned);
            return narrow_condition(slot, bits, unsigned);
        }
        match kind {
            SelectorKind::ImmediateByteEqual1 => {
                Condition::test(Subject::Arg(slot), CmpOp::Eq, Comparand::Int(1))
            }
            SelectorKind::Bitness64 => Condition::test(Subject::Bitness, CmpOp::Eq, Comparand::Int(64)),
            SelectorKind::Bitness32 => Condition::test(Subject::Bitness, CmpOp::Ge, Comparand::Int(32)),
            SelectorKind::EvexBroadcast => {
                Condition::test(Subject::Broadcast(slot), CmpOp::Eq, Comparand::Bool(true))
            }
            SelectorKind::Vex => Condition::test(Subject::PreferVex, CmpOp::Eq, Comparand::Bool(true)),
            _ => Condition::test(Subject::PreferShortBranch, CmpOp::Eq, Comparand::Bool(true)),
        }
    }
}

fn narrow_condition(slot: usize, bits: u32, unsigned: bool) -> Condition {
    let range = |lo: i128, hi: i128| {
        Condition::All(alloc::vec![
            Condition::test(Subject::Arg(slot), CmpOp::Ge, Comparand::Int(lo)),
            Condition::test(Subject::Arg(slot), CmpOp::Le, Comparand::Int(hi)),
        ])
    };
    if unsigned {
        let top = 1i128 << bits;
        Condition::Any(alloc::vec![range(0, 0x7F), range(top - 0x80, top - 1)])
    } else {
        range(-0x80, 0x7F)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        match (self.slot, self.peer) {
            (Some(s), Some(p)) => write!(f, "({s}, {p})"),
            (Some(s), None) => write!(f, "({s})"),
            _ => Ok(()),
        }
    }
}

/// How a candidate relates to a selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Relation {
    /// The candidate is only valid when the selector holds.
    Required,
    /// The candidate is only valid when the selector does not hold.
    Excluded,
    /// The selector does not constrain the candidate.
    DontCare,
}

/// Every selector a group's candidates could be told apart by, in priority order.
pub fn potential_selectors(candidates: &[EncodingCandidate]) -> Vec<Selector> {
    use OperandKind as Op;
    let mut out = alloc::vec![
        Selector::global(SelectorKind::Bitness64),
        Selector::global(SelectorKind::Bitness32),
    ];
    for c in candidates {
        if c.encoding != Encoding::Legacy {
            out.push(Selector::global(SelectorKind::Vex));
        }
        for (slot, op) in c.operands.iter().enumerate() {
            let sel = match op {
                Op::FixedRegister(r) => SelectorKind::for_register(*r).map(|k| Selector::at(k, slot)),
                Op::MemoryOffset(size) => {
                    let peer = c.operands.iter().enumerate().find_map(|(p, o)| match o {
                        Op::FixedRegister(r) if p != slot => Some((p, *r)),
                        _ => None,
                    });
                    if let Some(kind) = SelectorKind::for_memory_size(*size) {
                        out.push(Selector::at(kind, slot));
                    }
                    peer.and_then(|(p, r)| SelectorKind::memoffs_for(r).map(|k| Selector::memoffs(k, slot, p)))
                }
                Op::One => Some(Selector::at(SelectorKind::ImmediateByteEqual1, slot)),
                Op::Memory(size) => SelectorKind::for_memory_size(*size).map(|k| Selector::at(k, slot)),
                Op::MemoryBroadcast { .. } => Some(Selector::at(SelectorKind::EvexBroadcast, slot)),
                Op::Vsib(index) => SelectorKind::for_index_class(*index).map(|k| Selector::at(k, slot)),
                Op::Immediate(imm) if imm.bits() == 8 => {
                    imm.extended_bits()
                        .and_then(SelectorKind::for_narrow_bits)
                        .map(|k| Selector::at(k, slot))
                }
                Op::Branch(_) => Some(Selector::global(SelectorKind::ShortBranch)),
                _ => None,
            };
            out.extend(sel);
        }
    }
    out.sort();
    out.dedup();
    out
}

// ─── Conditions ──────────────────────────────────────────────────────────────

/// What a condition test reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Subject {
    /// The argument itself (register or immediate value).
    Arg(usize),
    /// Declared size of a memory argument.
    MemorySize(usize),
    /// Register class of a memory argument's index.
    MemoryIndex(usize),
    /// Broadcast flag of a memory argument.
    Broadcast(usize),
    /// Whether a memory argument is displacement-only.
    DisplacementOnly(usize),
    /// The selection bitness.
    Bitness,
    /// The prefer-VEX encoder setting.
    PreferVex,
    /// The prefer-short-branch encoder setting.
    PreferShortBranch,
}

impl Subject {
    /// Argument slot read, if any.
    pub fn slot(&self) -> Option<usize> {
        match self {
            Subject::Arg(s)
            | Subject::MemorySize(s)
            | Subject::MemoryIndex(s)
            | Subject::Broadcast(s)
            | Subject::DisplacementOnly(s) => Some(*s),
            _ => None,
        }
    }

    fn value(&self, args: &[Arg], ctx: &Context) -> Option<Comparand> {
        let mem = |s: &usize| args.get(*s).and_then(Arg::as_memory);
        match self {
            Subject::Arg(s) => match args.get(*s)? {
                Arg::Register(r) => Some(Comparand::Register(*r)),
                Arg::Immediate(v) => Some(Comparand::Int(*v)),
                _ => None,
            },
            Subject::MemorySize(s) => mem(s).map(|m| Comparand::Size(m.size)),
            Subject::MemoryIndex(s) => mem(s)?.index_class().map(Comparand::Class),
            Subject::Broadcast(s) => mem(s).map(|m| Comparand::Bool(m.broadcast)),
            Subject::DisplacementOnly(s) => mem(s).map(|m| Comparand::Bool(m.is_displacement_only())),
            Subject::Bitness => Some(Comparand::Int(i128::from(ctx.bitness.bits()))),
            Subject::PreferVex => Some(Comparand::Bool(ctx.prefer_vex)),
            Subject::PreferShortBranch => Some(Comparand::Bool(ctx.prefer_short_branch)),
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Arg(s) => write!(f, "arg{s}"),
            Subject::MemorySize(s) => write!(f, "arg{s}.size"),
            Subject::MemoryIndex(s) => write!(f, "arg{s}.index"),
            Subject::Broadcast(s) => write!(f, "arg{s}.broadcast"),
            Subject::DisplacementOnly(s) => write!(f, "arg{s}.displacement_only"),
            Subject::Bitness => write!(f, "bitness"),
            Subject::PreferVex => write!(f, "prefer_vex"),
            Subject::PreferShortBranch => write!(f, "prefer_short_branch"),
        }
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CmpOp {
    /// `==`
    Eq,
    /// `>=`
    Ge,
    /// `<=`
    Le,
    /// Set membership (`bitness in {16, 32}`).
    In,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CmpOp::Eq => "==",
            CmpOp::Ge => ">=",
            CmpOp::Le => "<=",
            CmpOp::In => "in",
        })
    }
}

/// Right-hand side of a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Comparand {
    /// A register.
    Register(Register),
    /// A register class.
    Class(RegisterClass),
    /// A memory size.
    Size(MemorySize),
    /// An integer.
    Int(i128),
    /// A boolean.
    Bool(bool),
    /// A set of bitnesses.
    Bitnesses(BitnessSet),
}

impl fmt::Display for Comparand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparand::Register(r) => write!(f, "{r}"),
            Comparand::Class(c) => write!(f, "{c}"),
            Comparand::Size(s) => write!(f, "{}", s.bits()),
            Comparand::Int(v) if (-0x100..=0x100).contains(v) => write!(f, "{v}"),
            Comparand::Int(v) if *v < 0 => write!(f, "-{:#x}", v.unsigned_abs()),
            Comparand::Int(v) => write!(f, "{v:#x}"),
            Comparand::Bool(b) => write!(f, "{b}"),
            Comparand::Bitnesses(set) => write!(f, "{set}"),
        }
    }
}

/// Structured description of a selector's predicate.
///
/// Evaluated directly by the tree evaluator and rendered on demand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Condition {
    /// `subject op value`.
    Test {
        /// What is read.
        subject: Subject,
        /// Comparison.
        op: CmpOp,
        /// Compared against.
        value: Comparand,
    },
    /// Conjunction.
    All(Vec<Condition>),
    /// Disjunction.
    Any(Vec<Condition>),
}

impl Condition {
    /// A single test.
    pub fn test(subject: Subject, op: CmpOp, value: Comparand) -> Self {
        Condition::Test { subject, op, value }
    }

    /// Whether the condition holds for `args` under `ctx`. Tests of a
    /// subject the arguments do not have (the size of a register) are false.
    pub fn holds(&self, args: &[Arg], ctx: &Context) -> bool {
        match self {
            Condition::Test { subject, op, value } => {
                let Some(actual) = subject.value(args, ctx) else {
                    return false;
                };
                match (op, actual, value) {
                    (CmpOp::Eq, a, b) => a == *b,
                    (CmpOp::Ge, Comparand::Int(a), Comparand::Int(b)) => a >= *b,
                    (CmpOp::Le, Comparand::Int(a), Comparand::Int(b)) => a <= *b,
                    (CmpOp::In, Comparand::Int(bits), Comparand::Bitnesses(set)) => {
                        u32::try_from(bits)
                            .ok()
                            .and_then(Bitness::from_bits)
                            .is_some_and(|b| set.contains(b))
                    }
                    _ => false,
                }
            }
            Condition::All(parts) => parts.iter().all(|c| c.holds(args, ctx)),
            Condition::Any(parts) => parts.iter().any(|c| c.holds(args, ctx)),
        }
    }

    /// Prefix with a bitness-membership test.
    #[must_use]
    pub fn gated(self, enabled: BitnessSet) -> Condition {
        let gate = Condition::test(Subject::Bitness, CmpOp::In, Comparand::Bitnesses(enabled));
        match self {
            Condition::All(mut parts) => {
                parts.insert(0, gate);
                Condition::All(parts)
            }
            other => Condition::All(alloc::vec![gate, other]),
        }
    }

    /// Argument slots the condition reads.
    pub fn slots(&self) -> Vec<usize> {
        let mut out = Vec::new();
        self.visit(&mut |subject| out.extend(subject.slot()));
        out.sort_unstable();
        out.dedup();
        out
    }

    fn visit(&self, f: &mut dyn FnMut(&Subject)) {
        match self {
            Condition::Test { subject, .. } => f(subject),
            Condition::All(parts) | Condition::Any(parts) => {
                for p in parts {
                    p.visit(f);
                }
            }
        }
    }

    /// Render with `name` supplying the text of each subject.
    pub fn render(&self, out: &mut dyn fmt::Write, name: &dyn Fn(&Subject) -> Box<str>) -> fmt::Result {
        match self {
            Condition::Test { subject, op, value } => write!(out, "{} {op} {value}", name(subject)),
            Condition::All(parts) => render_joined(out, parts, " && ", name),
            Condition::Any(parts) => render_joined(out, parts, " || ", name),
        }
    }
}

fn render_joined(
    out: &mut dyn fmt::Write,
    parts: &[Condition],
    sep: &str,
    name: &dyn Fn(&Subject) -> Box<str>,
) -> fmt::Result {
    for (i, p) in parts.iter().enumerate() {
        if i > 0 {
            out.write_str(sep)?;
        }
        if matches!(p, Condition::Test { .. }) {
            p.render(out, name)?;
        } else {
            out.write_char('(')?;
            p.render(out, name)?;
            out.write_char(')')?;
        }
    }
    Ok(())
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, &|s| alloc::format!("{s}").into_boxed_str())
    }
}

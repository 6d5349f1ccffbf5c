//! Encoding table: candidate encodings, operand constraints and grouping into
//! per-signature [`OpGroup`]s.
//!
//! Definitions use the operand notation of the Intel manuals (`r/m16`,
//! `imm8`, `xmm/m128/m32bcst`, `moffs8`, `rel32`, ...). Loading expands every
//! `r/m` operand into a register form and a memory form, then groups the
//! resulting candidates by mnemonic and argument signature.

use alloc::collections::BTreeMap;
#[allow(unused_imports)]
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use crate::error::BuildError;
use crate::ir::{Arg, ArgKind, Bitness, BitnessSet, MemorySize, Register, RegisterClass, Signature};

// ─── Operand constraints ─────────────────────────────────────────────────────

/// Immediate operand encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ImmKind {
    /// 8-bit immediate.
    Imm8,
    /// 16-bit immediate.
    Imm16,
    /// 32-bit immediate.
    Imm32,
    /// 64-bit immediate.
    Imm64,
    /// 8-bit immediate sign-extended to 16 bits.
    Imm8Sex16,
    /// 8-bit immediate sign-extended to 32 bits.
    Imm8Sex32,
    /// 8-bit immediate sign-extended to 64 bits.
    Imm8Sex64,
    /// 32-bit immediate sign-extended to 64 bits.
    Imm32Sex64,
    /// 8-bit immediate that is always unsigned (port numbers).
    Uimm8,
    /// 16-bit immediate that is always unsigned.
    Uimm16,
}

impl ImmKind {
    /// Encoded width in bits.
    pub fn bits(self) -> u32 {
        match self {
            ImmKind::Imm8
            | ImmKind::Imm8Sex16
            | ImmKind::Imm8Sex32
            | ImmKind::Imm8Sex64
            | ImmKind::Uimm8 => 8,
            ImmKind::Imm16 | ImmKind::Uimm16 => 16,
            ImmKind::Imm32 | ImmKind::Imm32Sex64 => 32,
            ImmKind::Imm64 => 64,
        }
    }

    /// Operand width the immediate is sign-extended to, for the `sex` forms.
    pub fn extended_bits(self) -> Option<u32> {
        match self {
            ImmKind::Imm8Sex16 => Some(16),
            ImmKind::Imm8Sex32 => Some(32),
            ImmKind::Imm8Sex64 | ImmKind::Imm32Sex64 => Some(64),
            _ => None,
        }
    }

    /// Whether `value` is encodable.
    ///
    /// Signed slots take the two's-complement range of the encoded width.
    /// Unsigned slots take `0..2^bits`, or for sign-extended forms the
    /// non-negative half plus the top of the extended range
    /// (`0xFF80..=0xFFFF` for an 8-bit immediate extended to 16 bits).
    /// `uimm` forms take `0..2^bits` in either slot.
    pub fn accepts(self, value: i128, unsigned: bool) -> bool {
        let bits = self.bits();
        if matches!(self, ImmKind::Uimm8 | ImmKind::Uimm16) {
            return in_unsigned(value, bits);
        }
        match (self.extended_bits(), unsigned) {
            (_, false) => in_signed(value, bits),
            (None, true) => in_unsigned(value, bits),
            (Some(ext), true) => {
                let top = 1i128 << ext;
                in_unsigned(value, bits - 1) || (value >= top - (1i128 << (bits - 1)) && value < top)
            }
        }
    }

    fn token(self) -> &'static str {
        match self {
            ImmKind::Imm8 => "imm8",
            ImmKind::Imm16 => "imm16",
            ImmKind::Imm32 => "imm32",
            ImmKind::Imm64 => "imm64",
            ImmKind::Imm8Sex16 => "imm8sex16",
            ImmKind::Imm8Sex32 => "imm8sex32",
            ImmKind::Imm8Sex64 => "imm8sex64",
            ImmKind::Imm32Sex64 => "imm32sex64",
            ImmKind::Uimm8 => "uimm8",
            ImmKind::Uimm16 => "uimm16",
        }
    }
}

pub(crate) fn in_signed(value: i128, bits: u32) -> bool {
    let half = 1i128 << (bits - 1);
    (-half..half).contains(&value)
}

pub(crate) fn in_unsigned(value: i128, bits: u32) -> bool {
    (0..1i128 << bits).contains(&value)
}

/// Relative branch displacement width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BranchKind {
    /// `rel8` short branch.
    Rel8,
    /// `rel16` near branch.
    Rel16,
    /// `rel32` near branch.
    Rel32,
}

/// Encoding family of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Encoding {
    /// Legacy / REX encoded.
    #[default]
    Legacy,
    /// VEX encoded.
    Vex,
    /// EVEX encoded.
    Evex,
}

/// A candidate's constraint on one operand position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OperandKind {
    /// Any register of the class.
    Register(RegisterClass),
    /// Exactly this register (`al`, `cl`, `dx`, `st0`, ...).
    FixedRegister(Register),
    /// Memory of the given size (`Unknown` = any size).
    Memory(MemorySize),
    /// Memory of `size`, or an EVEX broadcast of `element`-sized elements.
    MemoryBroadcast {
        /// Full vector size.
        size: MemorySize,
        /// Broadcast element size.
        element: MemorySize,
    },
    /// A bare displacement (`moffs`).
    MemoryOffset(MemorySize),
    /// VSIB memory with a vector index of the given class.
    Vsib(RegisterClass),
    /// An immediate.
    Immediate(ImmKind),
    /// The literal immediate `1` (shift-by-one forms).
    One,
    /// A relative branch target.
    Branch(BranchKind),
    /// `r/mN` before expansion.
    RegisterOrMemory {
        /// Register alternative.
        class: RegisterClass,
        /// Memory alternative.
        size: MemorySize,
    },
    /// `xmm/mN/mEbcst` before expansion.
    RegisterOrMemoryBroadcast {
        /// Register alternative.
        class: RegisterClass,
        /// Memory alternative.
        size: MemorySize,
        /// Broadcast element size.
        element: MemorySize,
    },
}

impl OperandKind {
    /// Parse one operand token of a definition.
    pub fn parse(token: &str) -> Option<OperandKind> {
        let token = token.trim();
        if let Some(class) = class_token(token) {
            return Some(OperandKind::Register(class));
        }
        if let Some(rest) = token.strip_prefix("moffs") {
            return mem_size(rest).map(OperandKind::MemoryOffset);
        }
        if token.contains('/') {
            let mut parts = token.split('/');
            let reg = parts.next()?;
            let size = parts.next().and_then(|p| p.strip_prefix('m')).and_then(mem_size)?;
            let class = match reg {
                "r" => gpr_of_size(size)?,
                other => class_token(other)?,
            };
            return match parts.next() {
                None => Some(OperandKind::RegisterOrMemory { class, size }),
                Some(bcst) => {
                    let element = bcst
                        .strip_prefix('m')
                        .and_then(|b| b.strip_suffix("bcst"))
                        .and_then(mem_size)?;
                    if parts.next().is_some() {
                        return None;
                    }
                    Some(OperandKind::RegisterOrMemoryBroadcast {
                        class,
                        size,
                        element,
                    })
                }
            };
        }
        match token {
            "m" => return Some(OperandKind::Memory(MemorySize::Unknown)),
            "1" => return Some(OperandKind::One),
            "rel8" => return Some(OperandKind::Branch(BranchKind::Rel8)),
            "rel16" => return Some(OperandKind::Branch(BranchKind::Rel16)),
            "rel32" => return Some(OperandKind::Branch(BranchKind::Rel32)),
            "vm32x" | "vm64x" => return Some(OperandKind::Vsib(RegisterClass::Xmm)),
            "vm32y" | "vm64y" => return Some(OperandKind::Vsib(RegisterClass::Ymm)),
            "vm32z" | "vm64z" => return Some(OperandKind::Vsib(RegisterClass::Zmm)),
            _ => {}
        }
        if let Some(rest) = token.strip_prefix('m') {
            if rest.starts_with(|c: char| c.is_ascii_digit()) {
                return mem_size(rest).map(OperandKind::Memory);
            }
        }
        let imm = [
            ImmKind::Imm8,
            ImmKind::Imm16,
            ImmKind::Imm32,
            ImmKind::Imm64,
            ImmKind::Imm8Sex16,
            ImmKind::Imm8Sex32,
            ImmKind::Imm8Sex64,
            ImmKind::Imm32Sex64,
            ImmKind::Uimm8,
            ImmKind::Uimm16,
        ];
        if let Some(kind) = imm.into_iter().find(|k| k.token() == token) {
            return Some(OperandKind::Immediate(kind));
        }
        Register::from_name(token).map(OperandKind::FixedRegister)
    }

    /// Static argument kind of the slot this operand occupies.
    pub fn arg_kind(&self) -> ArgKind {
        match self {
            OperandKind::Register(class) | OperandKind::RegisterOrMemory { class, .. } => {
                ArgKind::Register(*class)
            }
            OperandKind::RegisterOrMemoryBroadcast { class, .. } => ArgKind::Register(*class),
            OperandKind::FixedRegister(r) => ArgKind::Register(r.class()),
            OperandKind::Memory(_)
            | OperandKind::MemoryBroadcast { .. }
            | OperandKind::MemoryOffset(_)
            | OperandKind::Vsib(_) => ArgKind::Memory,
            OperandKind::Immediate(_) | OperandKind::One => ArgKind::Immediate,
            OperandKind::Branch(_) => ArgKind::Label,
        }
    }

    /// The alternatives this operand stands for: two for `r/m` forms
    /// (register first), itself otherwise.
    pub fn expand(self) -> Vec<OperandKind> {
        match self {
            OperandKind::RegisterOrMemory { class, size } => {
                alloc::vec![OperandKind::Register(class), OperandKind::Memory(size)]
            }
            OperandKind::RegisterOrMemoryBroadcast {
                class,
                size,
                element,
            } => alloc::vec![
                OperandKind::Register(class),
                OperandKind::MemoryBroadcast { size, element }
            ],
            other => alloc::vec![other],
        }
    }

    /// Whether this is an unexpanded `r/m` form.
    pub fn is_compound(&self) -> bool {
        matches!(
            self,
            OperandKind::RegisterOrMemory { .. } | OperandKind::RegisterOrMemoryBroadcast { .. }
        )
    }

    /// Width used for rendering the slot's parameter type.
    pub fn bits(&self) -> u32 {
        match self {
            OperandKind::Register(class)
            | OperandKind::RegisterOrMemory { class, .. }
            | OperandKind::RegisterOrMemoryBroadcast { class, .. } => u32::from(class.size_bits()),
            OperandKind::FixedRegister(r) => u32::from(r.size_bits()),
            OperandKind::Memory(size)
            | OperandKind::MemoryBroadcast { size, .. }
            | OperandKind::MemoryOffset(size) => size.bits(),
            OperandKind::Vsib(_) | OperandKind::Branch(_) => 0,
            OperandKind::Immediate(kind) => kind.extended_bits().unwrap_or(kind.bits()),
            OperandKind::One => 8,
        }
    }

    /// Whether `arg` satisfies this operand in `bitness`.
    ///
    /// `slot` is the static kind of the argument slot; it decides whether
    /// immediates are range-checked as signed or unsigned.
    pub fn accepts(&self, arg: &Arg, slot: ArgKind, bitness: Bitness, encoding: Encoding) -> bool {
        match (self, arg) {
            (OperandKind::Register(class), Arg::Register(r)) => {
                r.class() == *class
                    && r.available_in(bitness)
                    && (!r.requires_evex() || encoding == Encoding::Evex)
            }
            (OperandKind::FixedRegister(fixed), Arg::Register(r)) => {
                r == fixed && r.available_in(bitness)
            }
            (OperandKind::Memory(size), Arg::Memory(m)) => {
                !m.broadcast && !m.is_vsib() && size_matches(*size, m.size) && m.addressable_in(bitness)
            }
            (OperandKind::MemoryBroadcast { size, element }, Arg::Memory(m)) => {
                let size_ok = if m.broadcast {
                    m.size == *element
                } else {
                    size_matches(*size, m.size)
                };
                size_ok && !m.is_vsib() && m.addressable_in(bitness)
            }
            (OperandKind::MemoryOffset(size), Arg::Memory(m)) => {
                m.is_offset_in(bitness) && size_matches(*size, m.size)
            }
            (OperandKind::Vsib(index), Arg::Memory(m)) => {
                m.index_class() == Some(*index) && !m.broadcast && m.addressable_in(bitness)
            }
            (OperandKind::Immediate(kind), Arg::Immediate(v)) => {
                kind.accepts(*v, slot == ArgKind::ImmediateUnsigned)
            }
            (OperandKind::One, Arg::Immediate(v)) => *v == 1,
            (OperandKind::Branch(_), Arg::Label(_)) => true,
            _ => false,
        }
    }
}

fn size_matches(expected: MemorySize, actual: MemorySize) -> bool {
    expected == MemorySize::Unknown || expected == actual
}

fn class_token(token: &str) -> Option<RegisterClass> {
    match token {
        "r8" => Some(RegisterClass::Gpr8),
        "r16" => Some(RegisterClass::Gpr16),
        "r32" => Some(RegisterClass::Gpr32),
        "r64" => Some(RegisterClass::Gpr64),
        "sreg" => Some(RegisterClass::Segment),
        "sti" => Some(RegisterClass::St),
        "mm" => Some(RegisterClass::Mm),
        "xmm" => Some(RegisterClass::Xmm),
        "ymm" => Some(RegisterClass::Ymm),
        "zmm" => Some(RegisterClass::Zmm),
        "k" => Some(RegisterClass::K),
        _ => None,
    }
}

// `r/m16` spells its register half without the width.
fn gpr_of_size(size: MemorySize) -> Option<RegisterClass> {
    match size {
        MemorySize::Byte => Some(RegisterClass::Gpr8),
        MemorySize::Word => Some(RegisterClass::Gpr16),
        MemorySize::Dword => Some(RegisterClass::Gpr32),
        MemorySize::Qword => Some(RegisterClass::Gpr64),
        _ => None,
    }
}

fn mem_size(bits: &str) -> Option<MemorySize> {
    bits.parse().ok().and_then(MemorySize::from_bits)
}

impl fmt::Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperandKind::Register(class) => write!(f, "{class}"),
            OperandKind::FixedRegister(r) => write!(f, "{r}"),
            OperandKind::Memory(MemorySize::Unknown) => write!(f, "m"),
            OperandKind::Memory(size) => write!(f, "m{}", size.bits()),
            OperandKind::MemoryBroadcast { size, element } => {
                write!(f, "m{}/m{}bcst", size.bits(), element.bits())
            }
            OperandKind::MemoryOffset(size) => write!(f, "moffs{}", size.bits()),
            OperandKind::Vsib(index) => write!(f, "vsib({index})"),
            OperandKind::Immediate(kind) => f.write_str(kind.token()),
            OperandKind::One => write!(f, "1"),
            OperandKind::Branch(BranchKind::Rel8) => write!(f, "rel8"),
            OperandKind::Branch(BranchKind::Rel16) => write!(f, "rel16"),
            OperandKind::Branch(BranchKind::Rel32) => write!(f, "rel32"),
            OperandKind::RegisterOrMemory { class, size } if class.is_gpr() => {
                write!(f, "r/m{}", size.bits())
            }
            OperandKind::RegisterOrMemory { class, size } => {
                write!(f, "{class}/m{}", size.bits())
            }
            OperandKind::RegisterOrMemoryBroadcast {
                class,
                size,
                element,
            } => write!(f, "{class}/m{}/m{}bcst", size.bits(), element.bits()),
        }
    }
}

// ─── Candidates and definitions ──────────────────────────────────────────────

/// One concrete machine encoding an assembler call may resolve to.
///
/// Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EncodingCandidate {
    /// Stable code identifier (`Add_AL_imm8`).
    pub code: String,
    /// Lowercase mnemonic.
    pub mnemonic: String,
    /// Opcode text, informational.
    pub opcode: String,
    /// Operand constraints by position (already expanded).
    pub operands: Vec<OperandKind>,
    /// Bitnesses this encoding is selected in.
    pub bitness: BitnessSet,
    /// Encoding family.
    pub encoding: Encoding,
    /// Whether the encoding takes an opmask register.
    pub opmask: bool,
    /// Set when the candidate is reached through a pseudo-op mnemonic.
    pub pseudo_op: Option<PseudoOp>,
}

/// A mnemonic standing for another one with its trailing immediate fixed
/// (`cmpeqps xmm1, xmm2` is `cmpps xmm1, xmm2, 0`).
///
/// The candidate's operands stop before the fixed immediate; the encoder
/// appends `immediate` after the call-site arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PseudoOp {
    /// Mnemonic of the full form.
    pub parent: String,
    /// Immediate the pseudo-op binds.
    pub immediate: u8,
}

impl EncodingCandidate {
    /// Argument signature this candidate belongs to.
    pub fn signature(&self) -> Signature {
        Signature(self.operands.iter().map(OperandKind::arg_kind).collect())
    }

    /// Whether the candidate encodes `args` in `bitness`.
    ///
    /// `ah`..`bh` cannot appear next to anything that needs a REX prefix.
    pub fn accepts(&self, signature: &Signature, args: &[Arg], bitness: Bitness) -> bool {
        self.bitness.contains(bitness)
            && self.operands.len() == args.len()
            && !(args.iter().any(is_high_byte) && args.iter().any(needs_rex))
            && self.operands.iter().zip(args).enumerate().all(|(i, (op, arg))| {
                signature
                    .kind(i)
                    .is_some_and(|slot| op.accepts(arg, slot, bitness, self.encoding))
            })
    }
}

fn is_high_byte(arg: &Arg) -> bool {
    matches!(arg, Arg::Register(r) if r.is_high_byte())
}

fn needs_rex(arg: &Arg) -> bool {
    let gpr_rex = |r: Register| r.requires_rex() || (r.class().is_gpr() && r.is_extended());
    match arg {
        Arg::Register(r) => gpr_rex(*r) || r.class() == RegisterClass::Gpr64,
        Arg::Memory(m) => m.base.into_iter().chain(m.index).any(gpr_rex),
        Arg::Immediate(_) | Arg::Label(_) => false,
    }
}

impl fmt::Display for EncodingCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}", self.code, self.mnemonic)?;
        for (i, op) in self.operands.iter().enumerate() {
            write!(f, "{}{op}", if i == 0 { " " } else { ", " })?;
        }
        if let Some(p) = &self.pseudo_op {
            write!(f, " [{} #{}]", p.parent, p.immediate)?;
        }
        write!(f, ")")
    }
}

/// A row of the encoding schema, before parsing and `r/m` expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Definition {
    /// Code identifier.
    pub code: String,
    /// Mnemonic.
    pub mnemonic: String,
    /// Opcode text.
    pub opcode: String,
    /// Comma-separated operand tokens (`"r/m16, imm8sex16"`).
    pub operands: String,
    /// Bitnesses the encoding is selected in.
    pub bitness: BitnessSet,
    /// Encoding family.
    pub encoding: Encoding,
    /// Takes an opmask register.
    pub opmask: bool,
    /// Pseudo-op mnemonics and the trailing immediate each one fixes.
    pub pseudo_ops: Vec<(String, u8)>,
}

impl Definition {
    /// A legacy-encoded definition valid in every bitness.
    pub fn new(
        code: impl Into<String>,
        mnemonic: impl Into<String>,
        opcode: impl Into<String>,
        operands: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            mnemonic: mnemonic.into(),
            opcode: opcode.into(),
            operands: operands.into(),
            bitness: BitnessSet::ALL,
            encoding: Encoding::Legacy,
            opmask: false,
            pseudo_ops: Vec::new(),
        }
    }

    /// Restrict the bitnesses.
    #[must_use]
    pub fn bitness(mut self, bitness: BitnessSet) -> Self {
        self.bitness = bitness;
        self
    }

    /// Mark as VEX encoded.
    #[must_use]
    pub fn vex(mut self) -> Self {
        self.encoding = Encoding::Vex;
        self
    }

    /// Mark as EVEX encoded with an opmask operand.
    #[must_use]
    pub fn evex(mut self) -> Self {
        self.encoding = Encoding::Evex;
        self.opmask = true;
        self
    }

    /// Add pseudo-op mnemonics binding the trailing immediate.
    #[must_use]
    pub fn pseudo_ops<S: Into<String>>(mut self, ops: impl IntoIterator<Item = (S, u8)>) -> Self {
        self.pseudo_ops
            .extend(ops.into_iter().map(|(name, imm)| (name.into(), imm)));
        self
    }

    fn parse_operands(&self) -> Result<Vec<OperandKind>, BuildError> {
        if self.operands.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.operands
            .split(',')
            .map(|tok| {
                OperandKind::parse(tok).ok_or_else(|| BuildError::InvalidDefinition {
                    code: self.code.clone(),
                    detail: format!("unknown operand '{}'", tok.trim()),
                })
            })
            .collect()
    }

    /// Parse and expand into candidates. The flag marks register forms
    /// produced from an `r/m` operand.
    fn expand(&self) -> Result<Vec<(EncodingCandidate, bool)>, BuildError> {
        if self.code.is_empty() || self.mnemonic.is_empty() {
            return Err(BuildError::InvalidDefinition {
                code: self.code.clone(),
                detail: "missing code or mnemonic".into(),
            });
        }
        let operands = self.parse_operands()?;
        let mut forms: Vec<(Vec<OperandKind>, bool)> = alloc::vec![(Vec::new(), false)];
        for op in operands {
            let alternatives = op.expand();
            let compound = op.is_compound();
            let mut next = Vec::with_capacity(forms.len() * alternatives.len());
            for (prefix, derived) in &forms {
                for (i, alt) in alternatives.iter().enumerate() {
                    let mut ops = prefix.clone();
                    ops.push(*alt);
                    next.push((ops, *derived || (compound && i == 0)));
                }
            }
            forms = next;
        }
        let candidate = |mnemonic: String, operands: Vec<OperandKind>, pseudo_op: Option<PseudoOp>| EncodingCandidate {
            code: self.code.clone(),
            mnemonic,
            opcode: self.opcode.clone(),
            operands,
            bitness: self.bitness,
            encoding: self.encoding,
            opmask: self.opmask,
            pseudo_op,
        };
        let parent = self.mnemonic.to_ascii_lowercase();
        let mut out = Vec::with_capacity(forms.len() * (1 + self.pseudo_ops.len()));
        for (operands, derived) in forms {
            out.push((candidate(parent.clone(), operands.clone(), None), derived));
            if !self.pseudo_ops.is_empty() {
                let Some((OperandKind::Immediate(kind), head)) = operands.split_last() else {
                    return Err(BuildError::InvalidDefinition {
                        code: self.code.clone(),
                        detail: "pseudo-ops need a trailing immediate".into(),
                    });
                };
                for (name, imm) in &self.pseudo_ops {
                    if !kind.accepts(i128::from(*imm), true) {
                        return Err(BuildError::InvalidDefinition {
                            code: self.code.clone(),
                            detail: format!("{name}: {imm} does not fit {}", kind.token()),
                        });
                    }
                    let bound = PseudoOp {
                        parent: parent.clone(),
                        immediate: *imm,
                    };
                    out.push((candidate(name.to_ascii_lowercase(), head.to_vec(), Some(bound)), derived));
                }
            }
        }
        Ok(out)
    }
}

// ─── Groups ──────────────────────────────────────────────────────────────────

/// All candidates sharing a mnemonic and an argument signature: the unit a
/// selector tree is built for.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OpGroup {
    /// Mnemonic.
    pub mnemonic: String,
    /// Ordered argument kinds.
    pub signature: Signature,
    /// Widest operand per slot across the candidates, in bits.
    pub max_bits: Vec<u32>,
    /// Candidates in table order.
    pub candidates: Vec<EncodingCandidate>,
}

impl OpGroup {
    /// Build a group, computing per-slot widths.
    pub fn new(
        mnemonic: impl Into<String>,
        signature: Signature,
        candidates: Vec<EncodingCandidate>,
    ) -> Self {
        let max_bits = (0..signature.arity())
            .map(|i| {
                candidates
                    .iter()
                    .filter_map(|c| c.operands.get(i))
                    .map(OperandKind::bits)
                    .max()
                    .unwrap_or(0)
            })
            .collect();
        Self {
            mnemonic: mnemonic.into(),
            signature,
            max_bits,
            candidates,
        }
    }

    /// Number of arguments.
    pub fn arity(&self) -> usize {
        self.signature.arity()
    }

    /// Whether the group holds both VEX and EVEX encodings.
    pub fn mixes_vex_and_evex(&self) -> bool {
        let has = |e: Encoding| self.candidates.iter().any(|c| c.encoding == e);
        has(Encoding::Vex) && has(Encoding::Evex)
    }
}

impl fmt::Display for OpGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.mnemonic, self.signature)
    }
}

/// The loaded encoding model: candidate groups in stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EncodingTable {
    groups: Vec<OpGroup>,
}

impl EncodingTable {
    /// Parse, expand and group definitions.
    ///
    /// A register form produced by `r/m` expansion is dropped when an earlier
    /// candidate of the same group has identical operands and bitness (the
    /// `rm, r` / `r, rm` pairs). Explicit duplicates are kept and surface as
    /// ambiguities when the group's tree is built.
    ///
    /// Groups with immediate slots get an unsigned twin right after them.
    pub fn from_definitions(definitions: &[Definition]) -> Result<Self, BuildError> {
        let mut errors = Vec::new();
        let mut index: BTreeMap<(String, Signature), usize> = BTreeMap::new();
        let mut groups: Vec<OpGroup> = Vec::new();

        for def in definitions {
            let expanded = match def.expand() {
                Ok(e) => e,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };
            for (cand, derived) in expanded {
                let key = (cand.mnemonic.clone(), cand.signature());
                let slot = *index.entry(key.clone()).or_insert_with(|| {
                    groups.push(OpGroup::new(key.0.clone(), key.1.clone(), Vec::new()));
                    groups.len() - 1
                });
                let group = &mut groups[slot];
                if derived
                    && group
                        .candidates
                        .iter()
                        .any(|c| c.operands == cand.operands && c.bitness == cand.bitness)
                {
                    log::trace!("{}: dropping register form of {}", group, cand.code);
                    continue;
                }
                group.candidates.push(cand);
            }
        }
        if let Some(err) = BuildError::from_list(errors) {
            return Err(err);
        }

        let mut out = Vec::with_capacity(groups.len() * 2);
        for g in groups {
            let twin = g
                .signature
                .has_immediate()
                .then(|| OpGroup::new(g.mnemonic.clone(), g.signature.to_unsigned(), g.candidates.clone()));
            out.push(OpGroup::new(g.mnemonic, g.signature, g.candidates));
            out.extend(twin);
        }
        log::debug!("loaded {} definitions into {} groups", definitions.len(), out.len());
        Ok(Self { groups: out })
    }

    /// The built-in x86 table.
    pub fn builtin() -> Result<Self, BuildError> {
        Self::from_definitions(&crate::builtin::definitions())
    }

    /// All groups.
    pub fn groups(&self) -> &[OpGroup] {
        &self.groups
    }

    /// Consume into groups.
    pub fn into_groups(self) -> Vec<OpGroup> {
        self.groups
    }

    /// Group with exactly this mnemonic and signature.
    pub fn group(&self, mnemonic: &str, signature: &Signature) -> Option<&OpGroup> {
        self.groups
            .iter()
            .find(|g| g.mnemonic == mnemonic && &g.signature == signature)
    }

    /// Groups of a mnemonic, in table order.
    pub fn groups_for<'a>(&'a self, mnemonic: &'a str) -> impl Iterator<Item = &'a OpGroup> + 'a {
        self.groups.iter().filter(move |g| g.mnemonic == mnemonic)
    }

    /// Distinct mnemonics, in table order.
    pub fn mnemonics(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for g in &self.groups {
            if !seen.contains(&g.mnemonic) {
                seen.push(g.mnemonic.to_string());
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{MemoryOperand, RegisterClass::*};
    use alloc::vec;

    #[test]
    fn parse_tokens() {
        assert_eq!(OperandKind::parse("r8"), Some(OperandKind::Register(Gpr8)));
        assert_eq!(
            OperandKind::parse(" al "),
            Some(OperandKind::FixedRegister(Register::Al))
        );
        assert_eq!(
            OperandKind::parse("r/m16"),
            Some(OperandKind::RegisterOrMemory {
                class: Gpr16,
                size: MemorySize::Word
            })
        );
        assert_eq!(
            OperandKind::parse("xmm/m128/m32bcst"),
            Some(OperandKind::RegisterOrMemoryBroadcast {
                class: Xmm,
                size: MemorySize::Xword,
                element: MemorySize::Dword
            })
        );
        assert_eq!(
            OperandKind::parse("moffs64"),
            Some(OperandKind::MemoryOffset(MemorySize::Qword))
        );
        assert_eq!(OperandKind::parse("m80"), Some(OperandKind::Memory(MemorySize::Tbyte)));
        assert_eq!(OperandKind::parse("vm64y"), Some(OperandKind::Vsib(Ymm)));
        assert_eq!(
            OperandKind::parse("imm8sex32"),
            Some(OperandKind::Immediate(ImmKind::Imm8Sex32))
        );
        assert_eq!(OperandKind::parse("1"), Some(OperandKind::One));
        assert_eq!(OperandKind::parse("rel8"), Some(OperandKind::Branch(BranchKind::Rel8)));
        assert_eq!(OperandKind::parse("st0"), Some(OperandKind::FixedRegister(Register::St0)));
        assert_eq!(OperandKind::parse("r/m7"), None);
        assert_eq!(OperandKind::parse("imm9"), None);
    }

    #[test]
    fn immediate_ranges() {
        assert!(ImmKind::Imm8.accepts(-128, false));
        assert!(!ImmKind::Imm8.accepts(128, false));
        assert!(ImmKind::Imm8.accepts(255, true));
        assert!(!ImmKind::Imm8.accepts(-1, true));
        assert!(ImmKind::Imm8Sex16.accepts(127, true));
        assert!(!ImmKind::Imm8Sex16.accepts(128, true));
        assert!(ImmKind::Imm8Sex16.accepts(0xFF80, true));
        assert!(ImmKind::Imm8Sex16.accepts(0xFFFF, true));
        assert!(!ImmKind::Imm8Sex16.accepts(0x1_0000, true));
        assert!(ImmKind::Imm8Sex32.accepts(0xFFFF_FF80, true));
        assert!(!ImmKind::Imm8Sex32.accepts(0xFFFF_FF7F, true));
        assert!(ImmKind::Imm32Sex64.accepts(0xFFFF_FFFF_8000_0000, true));
        assert!(!ImmKind::Imm32Sex64.accepts(0x8000_0000, true));
        assert!(ImmKind::Imm32Sex64.accepts(-0x8000_0000, false));
        assert!(ImmKind::Imm64.accepts(i128::from(u64::MAX), true));
        assert!(ImmKind::Uimm8.accepts(0xFF, false));
        assert!(!ImmKind::Uimm8.accepts(-1, true));
    }

    #[test]
    fn operand_acceptance() {
        let b64 = Bitness::Bits64;
        let reg = OperandKind::Register(Xmm);
        assert!(reg.accepts(&Register::Xmm3.into(), ArgKind::Register(Xmm), b64, Encoding::Vex));
        assert!(!reg.accepts(&Register::Xmm20.into(), ArgKind::Register(Xmm), b64, Encoding::Vex));
        assert!(reg.accepts(&Register::Xmm20.into(), ArgKind::Register(Xmm), b64, Encoding::Evex));

        let bcst = OperandKind::MemoryBroadcast {
            size: MemorySize::Xword,
            element: MemorySize::Dword,
        };
        let full = MemoryOperand::based(MemorySize::Xword, Register::Rax);
        let elem = MemoryOperand::based(MemorySize::Dword, Register::Rax).with_broadcast();
        assert!(bcst.accepts(&full.into(), ArgKind::Memory, b64, Encoding::Evex));
        assert!(bcst.accepts(&elem.into(), ArgKind::Memory, b64, Encoding::Evex));
        assert!(!OperandKind::Memory(MemorySize::Xword).accepts(
            &elem.into(),
            ArgKind::Memory,
            b64,
            Encoding::Vex
        ));

        let moffs = OperandKind::MemoryOffset(MemorySize::Byte);
        assert!(moffs.accepts(
            &MemoryOperand::absolute(MemorySize::Byte, 0x10).into(),
            ArgKind::Memory,
            Bitness::Bits16,
            Encoding::Legacy
        ));
        assert!(!moffs.accepts(
            &MemoryOperand::based(MemorySize::Byte, Register::Bx).into(),
            ArgKind::Memory,
            Bitness::Bits16,
            Encoding::Legacy
        ));
        let far: Arg = MemoryOperand::absolute(MemorySize::Byte, 0x1_0000).into();
        assert!(!moffs.accepts(&far, ArgKind::Memory, Bitness::Bits16, Encoding::Legacy));
        assert!(moffs.accepts(&far, ArgKind::Memory, Bitness::Bits32, Encoding::Legacy));
    }

    #[test]
    fn high_byte_registers_exclude_rex() {
        let defs = [Definition::new("Mov_rm8_r8", "mov", "88 /r", "r/m8, r8")];
        let table = EncodingTable::from_definitions(&defs).unwrap_or_default();
        let sig = Signature(vec![ArgKind::Register(Gpr8), ArgKind::Register(Gpr8)]);
        let group = table.group("mov", &sig).expect("mov group");
        let mov = &group.candidates[0];
        let b64 = Bitness::Bits64;
        assert!(mov.accepts(&sig, &[Register::Ah.into(), Register::Cl.into()], b64));
        assert!(mov.accepts(&sig, &[Register::Sil.into(), Register::Cl.into()], b64));
        assert!(!mov.accepts(&sig, &[Register::Ah.into(), Register::Sil.into()], b64));
        assert!(!mov.accepts(&sig, &[Register::R8b.into(), Register::Bh.into()], b64));

        let msig = Signature(vec![ArgKind::Memory, ArgKind::Register(Gpr8)]);
        let store = &table.group("mov", &msig).expect("mov store").candidates[0];
        let via_r9 = MemoryOperand::based(MemorySize::Byte, Register::R9);
        let via_rax = MemoryOperand::based(MemorySize::Byte, Register::Rax);
        assert!(!store.accepts(&msig, &[via_r9.into(), Register::Ah.into()], b64));
        assert!(store.accepts(&msig, &[via_rax.into(), Register::Ah.into()], b64));
    }

    #[test]
    fn rm_expansion_and_dedup() {
        let defs = [
            Definition::new("Add_rm8_r8", "add", "00 /r", "r/m8, r8"),
            Definition::new("Add_r8_rm8", "add", "02 /r", "r8, r/m8"),
        ];
        let table = EncodingTable::from_definitions(&defs).unwrap_or_default();
        let sig = |kinds: &[ArgKind]| Signature(kinds.to_vec());
        let rr = table
            .group("add", &sig(&[ArgKind::Register(Gpr8), ArgKind::Register(Gpr8)]))
            .map(|g| g.candidates.iter().map(|c| c.code.as_str()).collect::<Vec<_>>());
        assert_eq!(rr, Some(vec!["Add_rm8_r8"]));
        assert!(table
            .group("add", &sig(&[ArgKind::Memory, ArgKind::Register(Gpr8)]))
            .is_some());
        assert!(table
            .group("add", &sig(&[ArgKind::Register(Gpr8), ArgKind::Memory]))
            .is_some());
        assert_eq!(table.groups().len(), 3);
    }

    #[test]
    fn immediate_groups_get_unsigned_twin() {
        let defs = [Definition::new("Add_AL_imm8", "add", "04 ib", "al, imm8")];
        let table = EncodingTable::from_definitions(&defs).unwrap_or_default();
        let sigs: Vec<String> = table.groups().iter().map(ToString::to_string).collect();
        assert_eq!(sigs, vec!["add(r8, imm)", "add(r8, uimm)"]);
        assert_eq!(table.groups()[0].max_bits, vec![8, 8]);
    }

    #[test]
    fn pseudo_ops_bind_the_trailing_immediate() {
        let defs = [Definition::new("Cmpps_xmm_xmmm128_imm8", "cmpps", "NP 0F C2 /r ib", "xmm, xmm/m128, imm8")
            .pseudo_ops([("cmpeqps", 0), ("CMPLTPS", 1)])];
        let table = EncodingTable::from_definitions(&defs).unwrap_or_default();
        let sigs: Vec<String> = table.groups().iter().map(ToString::to_string).collect();
        assert_eq!(
            sigs,
            vec![
                "cmpps(xmm, xmm, imm)",
                "cmpps(xmm, xmm, uimm)",
                "cmpeqps(xmm, xmm)",
                "cmpltps(xmm, xmm)",
                "cmpps(xmm, m, imm)",
                "cmpps(xmm, m, uimm)",
                "cmpeqps(xmm, m)",
                "cmpltps(xmm, m)",
            ]
        );
        let lt = table
            .group("cmpltps", &Signature(vec![ArgKind::Register(Xmm), ArgKind::Register(Xmm)]))
            .map(|g| &g.candidates[0]);
        let lt = lt.expect("cmpltps group");
        assert_eq!(lt.code, "Cmpps_xmm_xmmm128_imm8");
        assert_eq!(lt.operands.len(), 2);
        assert_eq!(
            lt.pseudo_op,
            Some(PseudoOp {
                parent: "cmpps".into(),
                immediate: 1
            })
        );
        assert_eq!(lt.to_string(), "Cmpps_xmm_xmmm128_imm8 (cmpltps xmm, xmm [cmpps #1])");
    }

    #[test]
    fn pseudo_ops_need_an_immediate_slot() {
        let defs = [Definition::new("Addps_xmm_xmmm128", "addps", "NP 0F 58 /r", "xmm, xmm/m128")
            .pseudo_ops([("addps0", 0)])];
        assert!(matches!(
            EncodingTable::from_definitions(&defs),
            Err(BuildError::InvalidDefinition { code, .. }) if code == "Addps_xmm_xmmm128"
        ));
    }

    #[test]
    fn unknown_operand_is_invalid_definition() {
        let defs = [
            Definition::new("Bad_1", "bad", "00", "r/m8, imm9"),
            Definition::new("Bad_2", "bad", "00", "r99"),
        ];
        match EncodingTable::from_definitions(&defs) {
            Err(BuildError::Multiple { errors }) => {
                assert_eq!(errors.len(), 2);
                assert!(matches!(&errors[0], BuildError::InvalidDefinition { code, .. } if code == "Bad_1"));
            }
            other => panic!("expected two invalid definitions, got {other:?}"),
        }
    }

    #[test]
    fn builtin_table_loads() {
        let table = EncodingTable::builtin().expect("builtin table");
        assert!(table.groups().len() > 50);
        assert!(table.mnemonics().iter().any(|m| m == "vaddps"));
        for g in table.groups() {
            assert!(!g.candidates.is_empty(), "{g} is empty");
            for c in &g.candidates {
                assert_eq!(c.signature(), Signature(
                    g.signature.0.iter().map(|k| match k {
                        ArgKind::ImmediateUnsigned => ArgKind::Immediate,
                        k => *k,
                    }).collect()
                ));
            }
        }
    }
}

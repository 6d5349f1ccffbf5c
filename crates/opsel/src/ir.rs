//! Operand model: bitness, registers, memory operands and call-site arguments.

use alloc::format;
use alloc::vec::Vec;
use core::fmt;

// ─── Bitness ─────────────────────────────────────────────────────────────────

/// x86 code width an encoding is selected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Bitness {
    /// 16-bit real / protected mode.
    Bits16,
    /// 32-bit protected mode.
    Bits32,
    /// 64-bit long mode.
    Bits64,
}

impl Bitness {
    /// All bitnesses, narrowest first.
    pub const ALL: [Bitness; 3] = [Bitness::Bits16, Bitness::Bits32, Bitness::Bits64];

    /// Width in bits (16, 32 or 64).
    pub fn bits(self) -> u32 {
        match self {
            Bitness::Bits16 => 16,
            Bitness::Bits32 => 32,
            Bitness::Bits64 => 64,
        }
    }

    /// Parse a width in bits.
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            16 => Some(Bitness::Bits16),
            32 => Some(Bitness::Bits32),
            64 => Some(Bitness::Bits64),
            _ => None,
        }
    }

    const fn mask(self) -> u8 {
        match self {
            Bitness::Bits16 => 0b001,
            Bitness::Bits32 => 0b010,
            Bitness::Bits64 => 0b100,
        }
    }
}

impl fmt::Display for Bitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// A set of [`Bitness`] values.
///
/// Used for candidate applicability and for the bitnesses in which a
/// selector node is enabled.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BitnessSet(u8);

impl BitnessSet {
    /// The empty set.
    pub const EMPTY: BitnessSet = BitnessSet(0);
    /// 16, 32 and 64.
    pub const ALL: BitnessSet = BitnessSet(0b111);
    /// 16 and 32 (everything except long mode).
    pub const LEGACY: BitnessSet = BitnessSet(0b011);
    /// 32 and 64.
    pub const WIDE: BitnessSet = BitnessSet(0b110);

    /// Set containing exactly one bitness.
    pub const fn only(bitness: Bitness) -> Self {
        BitnessSet(bitness.mask())
    }

    /// Build a set from a slice.
    pub fn from_slice(bitnesses: &[Bitness]) -> Self {
        bitnesses.iter().copied().collect()
    }

    /// Whether `bitness` is in the set.
    pub fn contains(self, bitness: Bitness) -> bool {
        self.0 & bitness.mask() != 0
    }

    /// Add `bitness` to the set.
    pub fn insert(&mut self, bitness: Bitness) {
        self.0 |= bitness.mask();
    }

    /// Set union.
    #[must_use]
    pub fn union(self, other: BitnessSet) -> Self {
        BitnessSet(self.0 | other.0)
    }

    /// Set intersection.
    #[must_use]
    pub fn intersection(self, other: BitnessSet) -> Self {
        BitnessSet(self.0 & other.0)
    }

    /// Elements of `self` not in `other`.
    #[must_use]
    pub fn difference(self, other: BitnessSet) -> Self {
        BitnessSet(self.0 & !other.0)
    }

    /// Whether every element of `self` is in `other`.
    pub fn is_subset(self, other: BitnessSet) -> bool {
        self.0 & !other.0 == 0
    }

    /// Whether the set is empty.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of bitnesses in the set.
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterate narrowest first.
    pub fn iter(self) -> impl Iterator<Item = Bitness> {
        Bitness::ALL.into_iter().filter(move |b| self.contains(*b))
    }
}

impl FromIterator<Bitness> for BitnessSet {
    fn from_iter<I: IntoIterator<Item = Bitness>>(iter: I) -> Self {
        let mut set = BitnessSet::EMPTY;
        for b in iter {
            set.insert(b);
        }
        set
    }
}

impl fmt::Debug for BitnessSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(Bitness::bits)).finish()
    }
}

impl fmt::Display for BitnessSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, b) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{b}")?;
        }
        write!(f, "}}")
    }
}

// ─── Registers ───────────────────────────────────────────────────────────────

/// Register class: the register file a register belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegisterClass {
    /// 8-bit general-purpose.
    Gpr8,
    /// 16-bit general-purpose.
    Gpr16,
    /// 32-bit general-purpose.
    Gpr32,
    /// 64-bit general-purpose.
    Gpr64,
    /// Segment registers.
    Segment,
    /// x87 stack registers.
    St,
    /// MMX registers.
    Mm,
    /// 128-bit vector registers.
    Xmm,
    /// 256-bit vector registers.
    Ymm,
    /// 512-bit vector registers.
    Zmm,
    /// AVX-512 opmask registers.
    K,
}

impl RegisterClass {
    /// All classes in declaration order.
    pub const ALL: [RegisterClass; 11] = [
        RegisterClass::Gpr8,
        RegisterClass::Gpr16,
        RegisterClass::Gpr32,
        RegisterClass::Gpr64,
        RegisterClass::Segment,
        RegisterClass::St,
        RegisterClass::Mm,
        RegisterClass::Xmm,
        RegisterClass::Ymm,
        RegisterClass::Zmm,
        RegisterClass::K,
    ];

    /// Register width in bits.
    pub fn size_bits(self) -> u16 {
        match self {
            RegisterClass::Gpr8 => 8,
            RegisterClass::Gpr16 | RegisterClass::Segment => 16,
            RegisterClass::Gpr32 => 32,
            RegisterClass::Gpr64 | RegisterClass::Mm | RegisterClass::K => 64,
            RegisterClass::St => 80,
            RegisterClass::Xmm => 128,
            RegisterClass::Ymm => 256,
            RegisterClass::Zmm => 512,
        }
    }

    /// Whether this is an SSE/AVX/AVX-512 vector class.
    pub fn is_vector(self) -> bool {
        matches!(
            self,
            RegisterClass::Xmm | RegisterClass::Ymm | RegisterClass::Zmm
        )
    }

    /// Whether this is a general-purpose class.
    pub fn is_gpr(self) -> bool {
        matches!(
            self,
            RegisterClass::Gpr8 | RegisterClass::Gpr16 | RegisterClass::Gpr32 | RegisterClass::Gpr64
        )
    }

    // Index of the first register of the class in `Register`'s declaration order.
    const fn first_index(self) -> u8 {
        match self {
            RegisterClass::Gpr8 => 0,
            RegisterClass::Gpr16 => 20,
            RegisterClass::Gpr32 => 36,
            RegisterClass::Gpr64 => 52,
            RegisterClass::Segment => 68,
            RegisterClass::St => 74,
            RegisterClass::Mm => 82,
            RegisterClass::Xmm => 90,
            RegisterClass::Ymm => 122,
            RegisterClass::Zmm => 154,
            RegisterClass::K => 186,
        }
    }
}

impl fmt::Display for RegisterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RegisterClass::Gpr8 => "r8",
            RegisterClass::Gpr16 => "r16",
            RegisterClass::Gpr32 => "r32",
            RegisterClass::Gpr64 => "r64",
            RegisterClass::Segment => "sreg",
            RegisterClass::St => "st",
            RegisterClass::Mm => "mm",
            RegisterClass::Xmm => "xmm",
            RegisterClass::Ymm => "ymm",
            RegisterClass::Zmm => "zmm",
            RegisterClass::K => "k",
        };
        f.write_str(s)
    }
}

/// An x86 register.
///
/// Variants are declared class by class; `class()` and `number()` rely on
/// that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Register {
    // 8-bit general-purpose registers
    /// 8-bit register al.
    Al,
    /// 8-bit register cl.
    Cl,
    /// 8-bit register dl.
    Dl,
    /// 8-bit register bl.
    Bl,
    /// 8-bit register ah.
    Ah,
    /// 8-bit register ch.
    Ch,
    /// 8-bit register dh.
    Dh,
    /// 8-bit register bh.
    Bh,
    /// 8-bit register spl.
    Spl,
    /// 8-bit register bpl.
    Bpl,
    /// 8-bit register sil.
    Sil,
    /// 8-bit register dil.
    Dil,
    /// 8-bit register r8b.
    R8b,
    /// 8-bit register r9b.
    R9b,
    /// 8-bit register r10b.
    R10b,
    /// 8-bit register r11b.
    R11b,
    /// 8-bit register r12b.
    R12b,
    /// 8-bit register r13b.
    R13b,
    /// 8-bit register r14b.
    R14b,
    /// 8-bit register r15b.
    R15b,

    // 16-bit general-purpose registers
    /// 16-bit register ax.
    Ax,
    /// 16-bit register cx.
    Cx,
    /// 16-bit register dx.
    Dx,
    /// 16-bit register bx.
    Bx,
    /// 16-bit register sp.
    Sp,
    /// 16-bit register bp.
    Bp,
    /// 16-bit register si.
    Si,
    /// 16-bit register di.
    Di,
    /// 16-bit register r8w.
    R8w,
    /// 16-bit register r9w.
    R9w,
    /// 16-bit register r10w.
    R10w,
    /// 16-bit register r11w.
    R11w,
    /// 16-bit register r12w.
    R12w,
    /// 16-bit register r13w.
    R13w,
    /// 16-bit register r14w.
    R14w,
    /// 16-bit register r15w.
    R15w,

    // 32-bit general-purpose registers
    /// 32-bit register eax.
    Eax,
    /// 32-bit register ecx.
    Ecx,
    /// 32-bit register edx.
    Edx,
    /// 32-bit register ebx.
    Ebx,
    /// 32-bit register esp.
    Esp,
    /// 32-bit register ebp.
    Ebp,
    /// 32-bit register esi.
    Esi,
    /// 32-bit register edi.
    Edi,
    /// 32-bit register r8d.
    R8d,
    /// 32-bit register r9d.
    R9d,
    /// 32-bit register r10d.
    R10d,
    /// 32-bit register r11d.
    R11d,
    /// 32-bit register r12d.
    R12d,
    /// 32-bit register r13d.
    R13d,
    /// 32-bit register r14d.
    R14d,
    /// 32-bit register r15d.
    R15d,

    // 64-bit general-purpose registers
    /// 64-bit register rax.
    Rax,
    /// 64-bit register rcx.
    Rcx,
    /// 64-bit register rdx.
    Rdx,
    /// 64-bit register rbx.
    Rbx,
    /// 64-bit register rsp.
    Rsp,
    /// 64-bit register rbp.
    Rbp,
    /// 64-bit register rsi.
    Rsi,
    /// 64-bit register rdi.
    Rdi,
    /// 64-bit register r8.
    R8,
    /// 64-bit register r9.
    R9,
    /// 64-bit register r10.
    R10,
    /// 64-bit register r11.
    R11,
    /// 64-bit register r12.
    R12,
    /// 64-bit register r13.
    R13,
    /// 64-bit register r14.
    R14,
    /// 64-bit register r15.
    R15,

    // Segment registers
    /// Segment register es.
    Es,
    /// Segment register cs.
    Cs,
    /// Segment register ss.
    Ss,
    /// Segment register ds.
    Ds,
    /// Segment register fs.
    Fs,
    /// Segment register gs.
    Gs,

    // x87 stack registers
    /// x87 register st(0).
    St0,
    /// x87 register st(1).
    St1,
    /// x87 register st(2).
    St2,
    /// x87 register st(3).
    St3,
    /// x87 register st(4).
    St4,
    /// x87 register st(5).
    St5,
    /// x87 register st(6).
    St6,
    /// x87 register st(7).
    St7,

    // MMX registers
    /// MMX register mm0.
    Mm0,
    /// MMX register mm1.
    Mm1,
    /// MMX register mm2.
    Mm2,
    /// MMX register mm3.
    Mm3,
    /// MMX register mm4.
    Mm4,
    /// MMX register mm5.
    Mm5,
    /// MMX register mm6.
    Mm6,
    /// MMX register mm7.
    Mm7,

    // SSE registers
    /// 128-bit vector register xmm0.
    Xmm0,
    /// 128-bit vector register xmm1.
    Xmm1,
    /// 128-bit vector register xmm2.
    Xmm2,
    /// 128-bit vector register xmm3.
    Xmm3,
    /// 128-bit vector register xmm4.
    Xmm4,
    /// 128-bit vector register xmm5.
    Xmm5,
    /// 128-bit vector register xmm6.
    Xmm6,
    /// 128-bit vector register xmm7.
    Xmm7,
    /// 128-bit vector register xmm8.
    Xmm8,
    /// 128-bit vector register xmm9.
    Xmm9,
    /// 128-bit vector register xmm10.
    Xmm10,
    /// 128-bit vector register xmm11.
    Xmm11,
    /// 128-bit vector register xmm12.
    Xmm12,
    /// 128-bit vector register xmm13.
    Xmm13,
    /// 128-bit vector register xmm14.
    Xmm14,
    /// 128-bit vector register xmm15.
    Xmm15,
    /// 128-bit vector register xmm16.
    Xmm16,
    /// 128-bit vector register xmm17.
    Xmm17,
    /// 128-bit vector register xmm18.
    Xmm18,
    /// 128-bit vector register xmm19.
    Xmm19,
    /// 128-bit vector register xmm20.
    Xmm20,
    /// 128-bit vector register xmm21.
    Xmm21,
    /// 128-bit vector register xmm22.
    Xmm22,
    /// 128-bit vector register xmm23.
    Xmm23,
    /// 128-bit vector register xmm24.
    Xmm24,
    /// 128-bit vector register xmm25.
    Xmm25,
    /// 128-bit vector register xmm26.
    Xmm26,
    /// 128-bit vector register xmm27.
    Xmm27,
    /// 128-bit vector register xmm28.
    Xmm28,
    /// 128-bit vector register xmm29.
    Xmm29,
    /// 128-bit vector register xmm30.
    Xmm30,
    /// 128-bit vector register xmm31.
    Xmm31,

    // AVX registers
    /// 256-bit vector register ymm0.
    Ymm0,
    /// 256-bit vector register ymm1.
    Ymm1,
    /// 256-bit vector register ymm2.
    Ymm2,
    /// 256-bit vector register ymm3.
    Ymm3,
    /// 256-bit vector register ymm4.
    Ymm4,
    /// 256-bit vector register ymm5.
    Ymm5,
    /// 256-bit vector register ymm6.
    Ymm6,
    /// 256-bit vector register ymm7.
    Ymm7,
    /// 256-bit vector register ymm8.
    Ymm8,
    /// 256-bit vector register ymm9.
    Ymm9,
    /// 256-bit vector register ymm10.
    Ymm10,
    /// 256-bit vector register ymm11.
    Ymm11,
    /// 256-bit vector register ymm12.
    Ymm12,
    /// 256-bit vector register ymm13.
    Ymm13,
    /// 256-bit vector register ymm14.
    Ymm14,
    /// 256-bit vector register ymm15.
    Ymm15,
    /// 256-bit vector register ymm16.
    Ymm16,
    /// 256-bit vector register ymm17.
    Ymm17,
    /// 256-bit vector register ymm18.
    Ymm18,
    /// 256-bit vector register ymm19.
    Ymm19,
    /// 256-bit vector register ymm20.
    Ymm20,
    /// 256-bit vector register ymm21.
    Ymm21,
    /// 256-bit vector register ymm22.
    Ymm22,
    /// 256-bit vector register ymm23.
    Ymm23,
    /// 256-bit vector register ymm24.
    Ymm24,
    /// 256-bit vector register ymm25.
    Ymm25,
    /// 256-bit vector register ymm26.
    Ymm26,
    /// 256-bit vector register ymm27.
    Ymm27,
    /// 256-bit vector register ymm28.
    Ymm28,
    /// 256-bit vector register ymm29.
    Ymm29,
    /// 256-bit vector register ymm30.
    Ymm30,
    /// 256-bit vector register ymm31.
    Ymm31,

    // AVX-512 registers
    /// 512-bit vector register zmm0.
    Zmm0,
    /// 512-bit vector register zmm1.
    Zmm1,
    /// 512-bit vector register zmm2.
    Zmm2,
    /// 512-bit vector register zmm3.
    Zmm3,
    /// 512-bit vector register zmm4.
    Zmm4,
    /// 512-bit vector register zmm5.
    Zmm5,
    /// 512-bit vector register zmm6.
    Zmm6,
    /// 512-bit vector register zmm7.
    Zmm7,
    /// 512-bit vector register zmm8.
    Zmm8,
    /// 512-bit vector register zmm9.
    Zmm9,
    /// 512-bit vector register zmm10.
    Zmm10,
    /// 512-bit vector register zmm11.
    Zmm11,
    /// 512-bit vector register zmm12.
    Zmm12,
    /// 512-bit vector register zmm13.
    Zmm13,
    /// 512-bit vector register zmm14.
    Zmm14,
    /// 512-bit vector register zmm15.
    Zmm15,
    /// 512-bit vector register zmm16.
    Zmm16,
    /// 512-bit vector register zmm17.
    Zmm17,
    /// 512-bit vector register zmm18.
    Zmm18,
    /// 512-bit vector register zmm19.
    Zmm19,
    /// 512-bit vector register zmm20.
    Zmm20,
    /// 512-bit vector register zmm21.
    Zmm21,
    /// 512-bit vector register zmm22.
    Zmm22,
    /// 512-bit vector register zmm23.
    Zmm23,
    /// 512-bit vector register zmm24.
    Zmm24,
    /// 512-bit vector register zmm25.
    Zmm25,
    /// 512-bit vector register zmm26.
    Zmm26,
    /// 512-bit vector register zmm27.
    Zmm27,
    /// 512-bit vector register zmm28.
    Zmm28,
    /// 512-bit vector register zmm29.
    Zmm29,
    /// 512-bit vector register zmm30.
    Zmm30,
    /// 512-bit vector register zmm31.
    Zmm31,

    // Opmask registers
    /// Opmask register k0.
    K0,
    /// Opmask register k1.
    K1,
    /// Opmask register k2.
    K2,
    /// Opmask register k3.
    K3,
    /// Opmask register k4.
    K4,
    /// Opmask register k5.
    K5,
    /// Opmask register k6.
    K6,
    /// Opmask register k7.
    K7,
}

const ALL_REGISTERS: [Register; 194] = [
    Register::Al, Register::Cl, Register::Dl, Register::Bl, Register::Ah, Register::Ch,
    Register::Dh, Register::Bh, Register::Spl, Register::Bpl, Register::Sil, Register::Dil,
    Register::R8b, Register::R9b, Register::R10b, Register::R11b, Register::R12b, Register::R13b,
    Register::R14b, Register::R15b, Register::Ax, Register::Cx, Register::Dx, Register::Bx,
    Register::Sp, Register::Bp, Register::Si, Register::Di, Register::R8w, Register::R9w,
    Register::R10w, Register::R11w, Register::R12w, Register::R13w, Register::R14w, Register::R15w,
    Register::Eax, Register::Ecx, Register::Edx, Register::Ebx, Register::Esp, Register::Ebp,
    Register::Esi, Register::Edi, Register::R8d, Register::R9d, Register::R10d, Register::R11d,
    Register::R12d, Register::R13d, Register::R14d, Register::R15d, Register::Rax, Register::Rcx,
    Register::Rdx, Register::Rbx, Register::Rsp, Register::Rbp, Register::Rsi, Register::Rdi,
    Register::R8, Register::R9, Register::R10, Register::R11, Register::R12, Register::R13,
    Register::R14, Register::R15, Register::Es, Register::Cs, Register::Ss, Register::Ds,
    Register::Fs, Register::Gs, Register::St0, Register::St1, Register::St2, Register::St3,
    Register::St4, Register::St5, Register::St6, Register::St7, Register::Mm0, Register::Mm1,
    Register::Mm2, Register::Mm3, Register::Mm4, Register::Mm5, Register::Mm6, Register::Mm7,
    Register::Xmm0, Register::Xmm1, Register::Xmm2, Register::Xmm3, Register::Xmm4, Register::Xmm5,
    Register::Xmm6, Register::Xmm7, Register::Xmm8, Register::Xmm9, Register::Xmm10,
    Register::Xmm11, Register::Xmm12, Register::Xmm13, Register::Xmm14, Register::Xmm15,
    Register::Xmm16, Register::Xmm17, Register::Xmm18, Register::Xmm19, Register::Xmm20,
    Register::Xmm21, Register::Xmm22, Register::Xmm23, Register::Xmm24, Register::Xmm25,
    Register::Xmm26, Register::Xmm27, Register::Xmm28, Register::Xmm29, Register::Xmm30,
    Register::Xmm31, Register::Ymm0, Register::Ymm1, Register::Ymm2, Register::Ymm3,
    Register::Ymm4, Register::Ymm5, Register::Ymm6, Register::Ymm7, Register::Ymm8, Register::Ymm9,
    Register::Ymm10, Register::Ymm11, Register::Ymm12, Register::Ymm13, Register::Ymm14,
    Register::Ymm15, Register::Ymm16, Register::Ymm17, Register::Ymm18, Register::Ymm19,
    Register::Ymm20, Register::Ymm21, Register::Ymm22, Register::Ymm23, Register::Ymm24,
    Register::Ymm25, Register::Ymm26, Register::Ymm27, Register::Ymm28, Register::Ymm29,
    Register::Ymm30, Register::Ymm31, Register::Zmm0, Register::Zmm1, Register::Zmm2,
    Register::Zmm3, Register::Zmm4, Register::Zmm5, Register::Zmm6, Register::Zmm7, Register::Zmm8,
    Register::Zmm9, Register::Zmm10, Register::Zmm11, Register::Zmm12, Register::Zmm13,
    Register::Zmm14, Register::Zmm15, Register::Zmm16, Register::Zmm17, Register::Zmm18,
    Register::Zmm19, Register::Zmm20, Register::Zmm21, Register::Zmm22, Register::Zmm23,
    Register::Zmm24, Register::Zmm25, Register::Zmm26, Register::Zmm27, Register::Zmm28,
    Register::Zmm29, Register::Zmm30, Register::Zmm31, Register::K0, Register::K1, Register::K2,
    Register::K3, Register::K4, Register::K5, Register::K6, Register::K7,
];

impl Register {
    /// Every register, class by class.
    pub const ALL: &'static [Register] = &ALL_REGISTERS;

    /// The register file this register belongs to.
    pub fn class(self) -> RegisterClass {
        match self as u8 {
            0..=19 => RegisterClass::Gpr8,
            20..=35 => RegisterClass::Gpr16,
            36..=51 => RegisterClass::Gpr32,
            52..=67 => RegisterClass::Gpr64,
            68..=73 => RegisterClass::Segment,
            74..=81 => RegisterClass::St,
            82..=89 => RegisterClass::Mm,
            90..=121 => RegisterClass::Xmm,
            122..=153 => RegisterClass::Ymm,
            154..=185 => RegisterClass::Zmm,
            _ => RegisterClass::K,
        }
    }

    /// Hardware register number (0-31).
    ///
    /// `ah`..`bh` share numbers 4-7 with `spl`..`dil`; the REX prefix tells
    /// them apart.
    pub fn number(self) -> u8 {
        let class = self.class();
        let i = self as u8 - class.first_index();
        match class {
            RegisterClass::Gpr8 if i >= 8 => i - 4,
            _ => i,
        }
    }

    /// Register width in bits.
    pub fn size_bits(self) -> u16 {
        self.class().size_bits()
    }

    /// Registers 8-15 and 24-31 need REX/VEX/EVEX extension bits.
    pub fn is_extended(self) -> bool {
        self.number() & 0b1000 != 0
    }

    /// `ah`, `ch`, `dh` or `bh`.
    pub fn is_high_byte(self) -> bool {
        matches!(
            self,
            Register::Ah | Register::Ch | Register::Dh | Register::Bh
        )
    }

    /// 8-bit registers that only exist with a REX prefix
    /// (`spl`, `bpl`, `sil`, `dil`, `r8b`..`r15b`).
    pub fn requires_rex(self) -> bool {
        self.class() == RegisterClass::Gpr8 && self as u8 >= Register::Spl as u8
    }

    /// Vector registers 16-31, which only EVEX can encode.
    pub fn requires_evex(self) -> bool {
        self.class().is_vector() && self.number() >= 16
    }

    /// Whether the register can be named in the given code width.
    pub fn available_in(self, bitness: Bitness) -> bool {
        if bitness == Bitness::Bits64 {
            return true;
        }
        match self.class() {
            RegisterClass::Gpr64 => false,
            RegisterClass::Gpr8 => !self.requires_rex(),
            _ => !self.is_extended() && !self.requires_evex(),
        }
    }

    /// All registers of `class`, in hardware-number order.
    pub fn of_class(class: RegisterClass) -> impl Iterator<Item = Register> {
        Self::ALL.iter().copied().filter(move |r| r.class() == class)
    }

    /// Look up a register by its lowercase assembler name (`"al"`, `"xmm3"`).
    pub fn from_name(name: &str) -> Option<Register> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| format!("{r:?}").eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use fmt::Write;
        struct LowerWriter<'a, 'b>(&'a mut fmt::Formatter<'b>);
        impl fmt::Write for LowerWriter<'_, '_> {
            fn write_str(&mut self, s: &str) -> fmt::Result {
                for c in s.chars() {
                    self.0.write_char(c.to_ascii_lowercase())?;
                }
                Ok(())
            }
        }
        write!(LowerWriter(f), "{:?}", self)
    }
}

// ─── Memory operands ─────────────────────────────────────────────────────────

/// Declared size of a memory operand (`byte ptr`, `dword ptr`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MemorySize {
    /// No size given.
    #[default]
    Unknown,
    /// 8 bits.
    Byte,
    /// 16 bits.
    Word,
    /// 32 bits.
    Dword,
    /// 48 bits (far pointer).
    Fword,
    /// 64 bits.
    Qword,
    /// 80 bits (x87 extended).
    Tbyte,
    /// 128 bits.
    Xword,
    /// 256 bits.
    Yword,
    /// 512 bits.
    Zword,
}

impl MemorySize {
    /// Every known size, narrowest first.
    pub const KNOWN: [MemorySize; 9] = [
        MemorySize::Byte,
        MemorySize::Word,
        MemorySize::Dword,
        MemorySize::Fword,
        MemorySize::Qword,
        MemorySize::Tbyte,
        MemorySize::Xword,
        MemorySize::Yword,
        MemorySize::Zword,
    ];

    /// Size in bits; 0 for [`MemorySize::Unknown`].
    pub fn bits(self) -> u32 {
        match self {
            MemorySize::Unknown => 0,
            MemorySize::Byte => 8,
            MemorySize::Word => 16,
            MemorySize::Dword => 32,
            MemorySize::Fword => 48,
            MemorySize::Qword => 64,
            MemorySize::Tbyte => 80,
            MemorySize::Xword => 128,
            MemorySize::Yword => 256,
            MemorySize::Zword => 512,
        }
    }

    /// Inverse of [`MemorySize::bits`] for known sizes.
    pub fn from_bits(bits: u32) -> Option<Self> {
        Self::KNOWN.iter().copied().find(|s| s.bits() == bits)
    }
}

impl fmt::Display for MemorySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MemorySize::Unknown => "",
            MemorySize::Byte => "byte",
            MemorySize::Word => "word",
            MemorySize::Dword => "dword",
            MemorySize::Fword => "fword",
            MemorySize::Qword => "qword",
            MemorySize::Tbyte => "tbyte",
            MemorySize::Xword => "xmmword",
            MemorySize::Yword => "ymmword",
            MemorySize::Zword => "zmmword",
        };
        f.write_str(s)
    }
}

/// A memory operand as passed at a call site.
///
/// `size` is the declared access size; for an EVEX broadcast it is the size
/// of one broadcast element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemoryOperand {
    /// Declared access size.
    pub size: MemorySize,
    /// Base register.
    pub base: Option<Register>,
    /// Index register (a vector register for VSIB addressing).
    pub index: Option<Register>,
    /// Index scale: 1, 2, 4 or 8.
    pub scale: u8,
    /// Displacement.
    pub displacement: i64,
    /// EVEX embedded broadcast (`{1toN}`).
    pub broadcast: bool,
    /// Segment override.
    pub segment: Option<Register>,
}

impl MemoryOperand {
    /// `size ptr [disp]`, an absolute address.
    pub fn absolute(size: MemorySize, displacement: i64) -> Self {
        Self {
            size,
            scale: 1,
            displacement,
            ..Self::default()
        }
    }

    /// `size ptr [base]`.
    pub fn based(size: MemorySize, base: Register) -> Self {
        Self {
            size,
            base: Some(base),
            scale: 1,
            ..Self::default()
        }
    }

    /// Add an index register with scale.
    #[must_use]
    pub fn with_index(mut self, index: Register, scale: u8) -> Self {
        self.index = Some(index);
        self.scale = scale;
        self
    }

    /// Set the displacement.
    #[must_use]
    pub fn with_displacement(mut self, displacement: i64) -> Self {
        self.displacement = displacement;
        self
    }

    /// Mark the operand as an EVEX broadcast.
    #[must_use]
    pub fn with_broadcast(mut self) -> Self {
        self.broadcast = true;
        self
    }

    /// Set a segment override.
    #[must_use]
    pub fn with_segment(mut self, segment: Register) -> Self {
        self.segment = Some(segment);
        self
    }

    /// No base and no index: a bare displacement (the `moffs` shape).
    pub fn is_displacement_only(&self) -> bool {
        self.base.is_none() && self.index.is_none()
    }

    /// Register class of the index, if any.
    pub fn index_class(&self) -> Option<RegisterClass> {
        self.index.map(Register::class)
    }

    /// Whether the index is a vector register (VSIB addressing).
    pub fn is_vsib(&self) -> bool {
        self.index_class().is_some_and(RegisterClass::is_vector)
    }

    /// Address width implied by the base and index in `bitness`, or `None`
    /// when they cannot form an address together.
    ///
    /// A VSIB index does not count towards the width, but its base must be a
    /// 32- or 64-bit register. Without registers the mode's width applies.
    fn address_width(&self, bitness: Bitness) -> Option<u32> {
        let gpr_width = |r: Register| match r.class() {
            RegisterClass::Gpr16 | RegisterClass::Gpr32 | RegisterClass::Gpr64 => {
                Some(u32::from(r.size_bits()))
            }
            _ => None,
        };
        let base = match self.base {
            Some(b) => Some(gpr_width(b)?),
            None => None,
        };
        let index = match self.index {
            Some(i) if i.class().is_vector() => {
                if base == Some(16) {
                    return None;
                }
                None
            }
            Some(Register::Sp | Register::Esp | Register::Rsp) => return None,
            Some(i) => Some(gpr_width(i)?),
            None => None,
        };
        match (base.or(index), bitness) {
            (Some(b), _) if index.is_some_and(|i| i != b) => None,
            (Some(16), Bitness::Bits64) | (Some(64), Bitness::Bits16 | Bitness::Bits32) => None,
            (Some(w), _) => Some(w),
            (None, Bitness::Bits16) if self.is_vsib() => Some(32),
            (None, b) => Some(b.bits()),
        }
    }

    /// Whether the operand is an address `bitness` can encode.
    ///
    /// Registers must exist in `bitness` and share one address width:
    /// 16-bit addressing is unavailable in long mode and 64-bit addressing
    /// only exists there. 16-bit addresses are limited to the `bx`/`bp` plus
    /// `si`/`di` forms. The displacement must fit the address width, and a
    /// segment override must name a segment register.
    pub fn addressable_in(&self, bitness: Bitness) -> bool {
        let ok = |r: Option<Register>| r.map_or(true, |r| r.available_in(bitness));
        if !ok(self.base) || !ok(self.index) {
            return false;
        }
        if self.segment.is_some_and(|s| s.class() != RegisterClass::Segment) {
            return false;
        }
        let Some(width) = self.address_width(bitness) else {
            return false;
        };
        if width == 16 && !self.is_legacy_16bit_form() {
            return false;
        }
        let disp = i128::from(self.displacement);
        match width {
            16 => (-0x8000..=0xFFFF).contains(&disp),
            32 => (-0x8000_0000..=0xFFFF_FFFF).contains(&disp),
            _ => i32::try_from(self.displacement).is_ok(),
        }
    }

    /// `[bx|bp]`, `[si|di]` or `[bx|bp + si|di]`, unscaled.
    fn is_legacy_16bit_form(&self) -> bool {
        let base_reg = |r: Option<Register>| matches!(r, Some(Register::Bx | Register::Bp));
        let index_reg = |r: Option<Register>| matches!(r, Some(Register::Si | Register::Di));
        if self.index.is_some() && self.scale > 1 {
            return false;
        }
        match (self.base, self.index) {
            (Some(_), Some(_)) => base_reg(self.base) && index_reg(self.index),
            (Some(_), None) => base_reg(self.base) || index_reg(self.base),
            (None, Some(_)) => index_reg(self.index) || base_reg(self.index),
            (None, None) => true,
        }
    }

    /// Whether the operand is a `moffs` address in `bitness`: a bare
    /// displacement of the full address width, with an optional segment
    /// override.
    pub fn is_offset_in(&self, bitness: Bitness) -> bool {
        if !self.is_displacement_only() || self.broadcast {
            return false;
        }
        if self.segment.is_some_and(|s| s.class() != RegisterClass::Segment) {
            return false;
        }
        let disp = i128::from(self.displacement);
        match bitness {
            Bitness::Bits16 => (-0x8000..=0xFFFF).contains(&disp),
            Bitness::Bits32 => (-0x8000_0000..=0xFFFF_FFFF).contains(&disp),
            Bitness::Bits64 => true,
        }
    }
}

impl fmt::Display for MemoryOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.size != MemorySize::Unknown {
            if self.broadcast {
                write!(f, "{} bcst ", self.size)?;
            } else {
                write!(f, "{} ptr ", self.size)?;
            }
        }
        write!(f, "[")?;
        if let Some(seg) = self.segment {
            write!(f, "{seg}:")?;
        }
        let mut first = true;
        if let Some(base) = self.base {
            write!(f, "{base}")?;
            first = false;
        }
        if let Some(index) = self.index {
            if !first {
                write!(f, "+")?;
            }
            write!(f, "{index}")?;
            if self.scale > 1 {
                write!(f, "*{}", self.scale)?;
            }
            first = false;
        }
        if first {
            write!(f, "{:#x}", self.displacement)?;
        } else if self.displacement > 0 {
            write!(f, "+{:#x}", self.displacement)?;
        } else if self.displacement < 0 {
            write!(f, "-{:#x}", self.displacement.unsigned_abs())?;
        }
        write!(f, "]")
    }
}

// ─── Call-site arguments ─────────────────────────────────────────────────────

/// Opaque label handle for branch targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LabelId(pub u32);

/// A runtime argument at an assembler call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Arg {
    /// A register.
    Register(Register),
    /// A memory reference.
    Memory(MemoryOperand),
    /// An immediate. Wide enough to hold both signed and unsigned 64-bit values.
    Immediate(i128),
    /// A branch target.
    Label(LabelId),
}

impl Arg {
    /// Immediate from any integer.
    pub fn imm(value: impl Into<i128>) -> Self {
        Arg::Immediate(value.into())
    }

    /// The memory operand, if this is a memory argument.
    pub fn as_memory(&self) -> Option<&MemoryOperand> {
        match self {
            Arg::Memory(m) => Some(m),
            _ => None,
        }
    }
}

impl From<Register> for Arg {
    fn from(r: Register) -> Self {
        Arg::Register(r)
    }
}

impl From<MemoryOperand> for Arg {
    fn from(m: MemoryOperand) -> Self {
        Arg::Memory(m)
    }
}

impl From<LabelId> for Arg {
    fn from(l: LabelId) -> Self {
        Arg::Label(l)
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Register(r) => write!(f, "{r}"),
            Arg::Memory(m) => write!(f, "{m}"),
            Arg::Immediate(v) if *v < 0 => write!(f, "-{:#x}", v.unsigned_abs()),
            Arg::Immediate(v) => write!(f, "{v:#x}"),
            Arg::Label(l) => write!(f, "label#{}", l.0),
        }
    }
}

/// Write `args` comma separated.
pub(crate) struct ArgList<'a>(pub &'a [Arg]);

impl fmt::Display for ArgList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, a) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{a}")?;
        }
        Ok(())
    }
}

/// Static type of an argument slot in an assembler method signature.
///
/// Determines the rendered parameter type and which selector kinds may test
/// the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArgKind {
    /// A register of the given class.
    Register(RegisterClass),
    /// Any memory operand.
    Memory,
    /// A signed immediate.
    Immediate,
    /// An unsigned immediate.
    ImmediateUnsigned,
    /// A label (branch target).
    Label,
}

impl ArgKind {
    /// Whether `arg` has this static type.
    pub fn admits(self, arg: &Arg) -> bool {
        match (self, arg) {
            (ArgKind::Register(class), Arg::Register(r)) => r.class() == class,
            (ArgKind::Memory, Arg::Memory(_)) => true,
            (ArgKind::Immediate | ArgKind::ImmediateUnsigned, Arg::Immediate(_)) => true,
            (ArgKind::Label, Arg::Label(_)) => true,
            _ => false,
        }
    }

    /// `Immediate` or `ImmediateUnsigned`.
    pub fn is_immediate(self) -> bool {
        matches!(self, ArgKind::Immediate | ArgKind::ImmediateUnsigned)
    }
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgKind::Register(class) => write!(f, "{class}"),
            ArgKind::Memory => f.write_str("m"),
            ArgKind::Immediate => f.write_str("imm"),
            ArgKind::ImmediateUnsigned => f.write_str("uimm"),
            ArgKind::Label => f.write_str("label"),
        }
    }
}

/// An ordered list of argument kinds: the assembler method signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Signature(pub Vec<ArgKind>);

impl Signature {
    /// Number of arguments.
    pub fn arity(&self) -> usize {
        self.0.len()
    }

    /// Kind of slot `i`.
    pub fn kind(&self, i: usize) -> Option<ArgKind> {
        self.0.get(i).copied()
    }

    /// Whether every argument has the static type of its slot.
    pub fn admits(&self, args: &[Arg]) -> bool {
        self.0.len() == args.len() && self.0.iter().zip(args).all(|(k, a)| k.admits(a))
    }

    /// Whether any slot is an immediate.
    pub fn has_immediate(&self) -> bool {
        self.0.iter().any(|k| k.is_immediate())
    }

    /// The same signature with every immediate slot unsigned.
    #[must_use]
    pub fn to_unsigned(&self) -> Signature {
        Signature(
            self.0
                .iter()
                .map(|k| match k {
                    ArgKind::Immediate => ArgKind::ImmediateUnsigned,
                    other => *other,
                })
                .collect(),
        )
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, k) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec;

    #[test]
    fn register_class_and_number() {
        assert_eq!(Register::Al.class(), RegisterClass::Gpr8);
        assert_eq!(Register::Al.number(), 0);
        assert_eq!(Register::Bh.number(), 7);
        assert_eq!(Register::Spl.number(), 4);
        assert_eq!(Register::Dil.number(), 7);
        assert_eq!(Register::R8b.number(), 8);
        assert_eq!(Register::R15b.number(), 15);
        assert_eq!(Register::Dx.class(), RegisterClass::Gpr16);
        assert_eq!(Register::R15.number(), 15);
        assert_eq!(Register::Gs.class(), RegisterClass::Segment);
        assert_eq!(Register::Gs.number(), 5);
        assert_eq!(Register::St7.number(), 7);
        assert_eq!(Register::Xmm31.number(), 31);
        assert_eq!(Register::Ymm0.class(), RegisterClass::Ymm);
        assert_eq!(Register::Zmm17.number(), 17);
        assert_eq!(Register::K7.class(), RegisterClass::K);
        assert_eq!(Register::K7.number(), 7);
    }

    #[test]
    fn every_class_is_contiguous() {
        for class in RegisterClass::ALL {
            let regs: Vec<Register> = Register::of_class(class).collect();
            assert!(!regs.is_empty());
            assert_eq!(regs[0] as u8, class.first_index());
        }
        assert_eq!(Register::ALL.len(), 194);
    }

    #[test]
    fn availability_by_bitness() {
        assert!(Register::Al.available_in(Bitness::Bits16));
        assert!(Register::Ah.available_in(Bitness::Bits32));
        assert!(!Register::Spl.available_in(Bitness::Bits32));
        assert!(Register::Spl.available_in(Bitness::Bits64));
        assert!(!Register::Rax.available_in(Bitness::Bits32));
        assert!(!Register::R8d.available_in(Bitness::Bits32));
        assert!(Register::Xmm7.available_in(Bitness::Bits16));
        assert!(!Register::Xmm8.available_in(Bitness::Bits32));
        assert!(!Register::Zmm16.available_in(Bitness::Bits32));
        assert!(Register::Es.available_in(Bitness::Bits64));
        assert!(Register::Xmm20.requires_evex());
        assert!(!Register::Xmm15.requires_evex());
    }

    #[test]
    fn register_names() {
        assert_eq!(Register::Eax.to_string(), "eax");
        assert_eq!(Register::R10b.to_string(), "r10b");
        assert_eq!(Register::St0.to_string(), "st0");
        assert_eq!(Register::from_name("XMM3"), Some(Register::Xmm3));
        assert_eq!(Register::from_name("cl"), Some(Register::Cl));
        assert_eq!(Register::from_name("bogus"), None);
    }

    #[test]
    fn bitness_set_ops() {
        let set = BitnessSet::from_slice(&[Bitness::Bits16, Bitness::Bits64]);
        assert!(set.contains(Bitness::Bits16));
        assert!(!set.contains(Bitness::Bits32));
        assert_eq!(set.len(), 2);
        assert_eq!(set.intersection(BitnessSet::WIDE), BitnessSet::only(Bitness::Bits64));
        assert!(BitnessSet::LEGACY.is_subset(BitnessSet::ALL));
        assert!(!BitnessSet::ALL.is_subset(BitnessSet::LEGACY));
        assert_eq!(set.to_string(), "{16, 64}");
        assert_eq!(format!("{:?}", BitnessSet::WIDE), "{32, 64}");
    }

    #[test]
    fn memory_operand_display() {
        let m = MemoryOperand::based(MemorySize::Dword, Register::Rax)
            .with_index(Register::Rcx, 4)
            .with_displacement(0x10);
        assert_eq!(m.to_string(), "dword ptr [rax+rcx*4+0x10]");
        let abs = MemoryOperand::absolute(MemorySize::Byte, 0x1234);
        assert!(abs.is_displacement_only());
        assert_eq!(abs.to_string(), "byte ptr [0x1234]");
        let neg = MemoryOperand::based(MemorySize::Qword, Register::Rbp).with_displacement(-8);
        assert_eq!(neg.to_string(), "qword ptr [rbp-0x8]");
        let vsib = MemoryOperand::based(MemorySize::Dword, Register::Rax).with_index(Register::Ymm2, 1);
        assert!(vsib.is_vsib());
        assert!(!vsib.addressable_in(Bitness::Bits32));
    }

    #[test]
    fn addressing_registers_must_share_a_width() {
        let at = |base: Register| MemoryOperand::based(MemorySize::Dword, base);
        assert!(!at(Register::Al).addressable_in(Bitness::Bits32));
        assert!(!at(Register::Bx).addressable_in(Bitness::Bits64));
        assert!(at(Register::Bx).addressable_in(Bitness::Bits32));
        assert!(at(Register::Ebx).addressable_in(Bitness::Bits64));
        assert!(!at(Register::Rbx).addressable_in(Bitness::Bits32));
        assert!(!at(Register::Eax).with_index(Register::Rcx, 1).addressable_in(Bitness::Bits64));
        assert!(!at(Register::Eax).with_index(Register::Esp, 1).addressable_in(Bitness::Bits32));
        assert!(at(Register::Esp).with_index(Register::Eax, 2).addressable_in(Bitness::Bits32));
    }

    #[test]
    fn sixteen_bit_addressing_forms() {
        let bx_si = MemoryOperand::based(MemorySize::Word, Register::Bx).with_index(Register::Si, 1);
        assert!(bx_si.addressable_in(Bitness::Bits16));
        assert!(!bx_si.with_index(Register::Si, 2).addressable_in(Bitness::Bits16));
        assert!(!MemoryOperand::based(MemorySize::Word, Register::Ax).addressable_in(Bitness::Bits16));
        assert!(MemoryOperand::based(MemorySize::Word, Register::Di).addressable_in(Bitness::Bits16));
        assert!(!MemoryOperand::based(MemorySize::Word, Register::Bx)
            .with_index(Register::Xmm1, 1)
            .addressable_in(Bitness::Bits16));
        assert!(MemoryOperand::based(MemorySize::Word, Register::Ebx)
            .with_index(Register::Xmm1, 1)
            .addressable_in(Bitness::Bits16));
    }

    #[test]
    fn displacement_fits_address_width() {
        let bx = MemoryOperand::based(MemorySize::Word, Register::Bx);
        assert!(bx.with_displacement(0xFFFF).addressable_in(Bitness::Bits16));
        assert!(!bx.with_displacement(0x1_0000).addressable_in(Bitness::Bits16));
        assert!(bx.with_displacement(0x1_0000).addressable_in(Bitness::Bits32));
        let rbx = MemoryOperand::based(MemorySize::Qword, Register::Rbx);
        assert!(rbx.with_displacement(-0x8000_0000).addressable_in(Bitness::Bits64));
        assert!(!rbx.with_displacement(0x8000_0000).addressable_in(Bitness::Bits64));
        let abs = MemoryOperand::absolute(MemorySize::Dword, 0xFFFF_FFFF);
        assert!(abs.addressable_in(Bitness::Bits32));
        assert!(!abs.addressable_in(Bitness::Bits16));
    }

    #[test]
    fn segment_overrides() {
        let m = MemoryOperand::based(MemorySize::Dword, Register::Eax);
        let fs = m.with_segment(Register::Fs);
        assert!(fs.addressable_in(Bitness::Bits32));
        assert_eq!(fs.to_string(), "dword ptr [fs:eax]");
        assert!(!m.with_segment(Register::Eax).addressable_in(Bitness::Bits32));
    }

    #[test]
    fn offsets_span_the_address_width() {
        let low = MemoryOperand::absolute(MemorySize::Byte, 0xFFFF);
        let high = MemoryOperand::absolute(MemorySize::Byte, 0x1_0000);
        let huge = MemoryOperand::absolute(MemorySize::Byte, 0x1_0000_0000);
        assert!(low.is_offset_in(Bitness::Bits16));
        assert!(!high.is_offset_in(Bitness::Bits16));
        assert!(high.is_offset_in(Bitness::Bits32));
        assert!(!huge.is_offset_in(Bitness::Bits32));
        assert!(huge.is_offset_in(Bitness::Bits64));
        assert!(low.with_segment(Register::Gs).is_offset_in(Bitness::Bits16));
        assert!(!low.with_broadcast().is_offset_in(Bitness::Bits16));
        assert!(!MemoryOperand::based(MemorySize::Byte, Register::Ebx).is_offset_in(Bitness::Bits32));
    }

    #[test]
    fn arg_kinds() {
        assert!(ArgKind::Register(RegisterClass::Gpr8).admits(&Arg::Register(Register::Al)));
        assert!(!ArgKind::Register(RegisterClass::Gpr16).admits(&Arg::Register(Register::Al)));
        assert!(ArgKind::ImmediateUnsigned.admits(&Arg::imm(5)));
        assert!(!ArgKind::Memory.admits(&Arg::imm(5)));
        assert_eq!(Arg::imm(-0x80).to_string(), "-0x80");
        assert_eq!(Arg::imm(5).to_string(), "0x5");
        let sig = Signature(vec![ArgKind::Register(RegisterClass::Gpr8), ArgKind::Immediate]);
        assert_eq!(sig.to_string(), "(r8, imm)");
        assert_eq!(sig.to_unsigned().to_string(), "(r8, uimm)");
        assert!(sig.admits(&[Register::Cl.into(), Arg::imm(1)]));
        assert!(!sig.admits(&[Register::Cl.into()]));
    }
}

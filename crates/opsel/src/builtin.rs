//! Built-in x86 encoding definitions.
//!
//! Code names follow iced-x86's `Code` enum so the table can be checked
//! against an independent encoder. Bitness sets are the modes a form is
//! *selected* in, which may be narrower than the modes it is valid in
//! (`Pushw_ES` and `Pushd_ES` both decode in 32-bit mode, but only the latter
//! is chosen there).

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::ir::{Bitness, BitnessSet};
use crate::table::Definition;

const B16: BitnessSet = BitnessSet::only(Bitness::Bits16);
const B32: BitnessSet = BitnessSet::only(Bitness::Bits32);
const B64: BitnessSet = BitnessSet::only(Bitness::Bits64);
const LEGACY: BitnessSet = BitnessSet::LEGACY;

/// The built-in definition rows.
pub fn definitions() -> Vec<Definition> {
    let mut defs = Vec::new();
    alu(&mut defs);
    shifts(&mut defs);
    inc_dec(&mut defs);
    push(&mut defs);
    mov(&mut defs);
    io(&mut defs);
    branches(&mut defs);
    x87(&mut defs);
    vector(&mut defs);
    defs
}

// add/or/adc/sbb/and/sub/xor/cmp share one layout, offset by 8 per operation.
fn alu(defs: &mut Vec<Definition>) {
    const OPS: [(&str, &str, u8); 8] = [
        ("add", "Add", 0),
        ("or", "Or", 1),
        ("adc", "Adc", 2),
        ("sbb", "Sbb", 3),
        ("and", "And", 4),
        ("sub", "Sub", 5),
        ("xor", "Xor", 6),
        ("cmp", "Cmp", 7),
    ];
    for (mn, name, n) in OPS {
        let base = n * 8;
        let d = |code: &str, opcode: String, operands: &str| {
            Definition::new(format!("{name}_{code}"), mn, opcode, operands)
        };
        defs.push(d("rm8_r8", format!("{:02X} /r", base), "r/m8, r8"));
        defs.push(d("rm16_r16", format!("o16 {:02X} /r", base + 1), "r/m16, r16"));
        defs.push(d("rm32_r32", format!("o32 {:02X} /r", base + 1), "r/m32, r32"));
        defs.push(d("rm64_r64", format!("REX.W {:02X} /r", base + 1), "r/m64, r64").bitness(B64));
        defs.push(d("r8_rm8", format!("{:02X} /r", base + 2), "r8, r/m8"));
        defs.push(d("r16_rm16", format!("o16 {:02X} /r", base + 3), "r16, r/m16"));
        defs.push(d("r32_rm32", format!("o32 {:02X} /r", base + 3), "r32, r/m32"));
        defs.push(d("r64_rm64", format!("REX.W {:02X} /r", base + 3), "r64, r/m64").bitness(B64));
        defs.push(d("AL_imm8", format!("{:02X} ib", base + 4), "al, imm8"));
        defs.push(d("AX_imm16", format!("o16 {:02X} iw", base + 5), "ax, imm16"));
        defs.push(d("EAX_imm32", format!("o32 {:02X} id", base + 5), "eax, imm32"));
        defs.push(d("RAX_imm32", format!("REX.W {:02X} id", base + 5), "rax, imm32sex64").bitness(B64));
        defs.push(d("rm8_imm8", format!("80 /{n} ib"), "r/m8, imm8"));
        defs.push(d("rm16_imm16", format!("o16 81 /{n} iw"), "r/m16, imm16"));
        defs.push(d("rm32_imm32", format!("o32 81 /{n} id"), "r/m32, imm32"));
        defs.push(d("rm64_imm32", format!("REX.W 81 /{n} id"), "r/m64, imm32sex64").bitness(B64));
        defs.push(d("rm16_imm8", format!("o16 83 /{n} ib"), "r/m16, imm8sex16"));
        defs.push(d("rm32_imm8", format!("o32 83 /{n} ib"), "r/m32, imm8sex32"));
        defs.push(d("rm64_imm8", format!("REX.W 83 /{n} ib"), "r/m64, imm8sex64").bitness(B64));
    }
}

fn shifts(defs: &mut Vec<Definition>) {
    const OPS: [(&str, &str, u8); 5] = [
        ("rol", "Rol", 0),
        ("ror", "Ror", 1),
        ("shl", "Shl", 4),
        ("shr", "Shr", 5),
        ("sar", "Sar", 7),
    ];
    for (mn, name, n) in OPS {
        for (w, prefix, bitness) in [
            (8u32, "", BitnessSet::ALL),
            (16, "o16 ", BitnessSet::ALL),
            (32, "o32 ", BitnessSet::ALL),
            (64, "REX.W ", B64),
        ] {
            let (one, cl, imm) = if w == 8 { ("D0", "D2", "C0") } else { ("D1", "D3", "C1") };
            defs.push(
                Definition::new(format!("{name}_rm{w}_1"), mn, format!("{prefix}{one} /{n}"), format!("r/m{w}, 1"))
                    .bitness(bitness),
            );
            defs.push(
                Definition::new(format!("{name}_rm{w}_CL"), mn, format!("{prefix}{cl} /{n}"), format!("r/m{w}, cl"))
                    .bitness(bitness),
            );
            defs.push(
                Definition::new(
                    format!("{name}_rm{w}_imm8"),
                    mn,
                    format!("{prefix}{imm} /{n} ib"),
                    format!("r/m{w}, imm8"),
                )
                .bitness(bitness),
            );
        }
    }
}

fn inc_dec(defs: &mut Vec<Definition>) {
    for (mn, name, short, n) in [("inc", "Inc", 0x40u8, 0u8), ("dec", "Dec", 0x48, 1)] {
        // One-byte 40+r / 48+r forms became REX prefixes in long mode.
        defs.push(Definition::new(format!("{name}_r16"), mn, format!("o16 {short:02X}+rw"), "r16").bitness(LEGACY));
        defs.push(Definition::new(format!("{name}_r32"), mn, format!("o32 {short:02X}+rd"), "r32").bitness(LEGACY));
        defs.push(Definition::new(format!("{name}_rm8"), mn, format!("FE /{n}"), "r/m8"));
        defs.push(Definition::new(format!("{name}_rm16"), mn, format!("o16 FF /{n}"), "r/m16"));
        defs.push(Definition::new(format!("{name}_rm32"), mn, format!("o32 FF /{n}"), "r/m32"));
        defs.push(Definition::new(format!("{name}_rm64"), mn, format!("REX.W FF /{n}"), "r/m64").bitness(B64));
    }
}

fn push(defs: &mut Vec<Definition>) {
    defs.extend([
        Definition::new("Push_r16", "push", "o16 50+rw", "r16"),
        Definition::new("Push_r32", "push", "o32 50+rd", "r32").bitness(LEGACY),
        Definition::new("Push_r64", "push", "50+ro", "r64").bitness(B64),
        Definition::new("Push_rm16", "push", "o16 FF /6", "r/m16"),
        Definition::new("Push_rm32", "push", "o32 FF /6", "r/m32").bitness(LEGACY),
        Definition::new("Push_rm64", "push", "FF /6", "r/m64").bitness(B64),
        Definition::new("Pushw_ES", "push", "o16 06", "es").bitness(B16),
        Definition::new("Pushd_ES", "push", "o32 06", "es").bitness(B32),
        Definition::new("Pushw_CS", "push", "o16 0E", "cs").bitness(B16),
        Definition::new("Pushd_CS", "push", "o32 0E", "cs").bitness(B32),
        Definition::new("Pushw_SS", "push", "o16 16", "ss").bitness(B16),
        Definition::new("Pushd_SS", "push", "o32 16", "ss").bitness(B32),
        Definition::new("Pushw_DS", "push", "o16 1E", "ds").bitness(B16),
        Definition::new("Pushd_DS", "push", "o32 1E", "ds").bitness(B32),
        Definition::new("Pushw_FS", "push", "o16 0F A0", "fs").bitness(B16),
        Definition::new("Pushd_FS", "push", "o32 0F A0", "fs").bitness(B32),
        Definition::new("Pushq_FS", "push", "0F A0", "fs").bitness(B64),
        Definition::new("Pushw_GS", "push", "o16 0F A8", "gs").bitness(B16),
        Definition::new("Pushd_GS", "push", "o32 0F A8", "gs").bitness(B32),
        Definition::new("Pushq_GS", "push", "0F A8", "gs").bitness(B64),
        Definition::new("Pushw_imm8", "push", "o16 6A ib", "imm8sex16").bitness(B16),
        Definition::new("Push_imm16", "push", "o16 68 iw", "imm16").bitness(B16),
        Definition::new("Pushd_imm8", "push", "o32 6A ib", "imm8sex32").bitness(B32),
        Definition::new("Pushd_imm32", "push", "o32 68 id", "imm32").bitness(B32),
        Definition::new("Pushq_imm8", "push", "6A ib", "imm8sex64").bitness(B64),
        Definition::new("Pushq_imm32", "push", "68 id", "imm32sex64").bitness(B64),
    ]);
}

fn mov(defs: &mut Vec<Definition>) {
    defs.extend([
        Definition::new("Mov_rm8_r8", "mov", "88 /r", "r/m8, r8"),
        Definition::new("Mov_rm16_r16", "mov", "o16 89 /r", "r/m16, r16"),
        Definition::new("Mov_rm32_r32", "mov", "o32 89 /r", "r/m32, r32"),
        Definition::new("Mov_rm64_r64", "mov", "REX.W 89 /r", "r/m64, r64").bitness(B64),
        Definition::new("Mov_r8_rm8", "mov", "8A /r", "r8, r/m8"),
        Definition::new("Mov_r16_rm16", "mov", "o16 8B /r", "r16, r/m16"),
        Definition::new("Mov_r32_rm32", "mov", "o32 8B /r", "r32, r/m32"),
        Definition::new("Mov_r64_rm64", "mov", "REX.W 8B /r", "r64, r/m64").bitness(B64),
        Definition::new("Mov_AL_moffs8", "mov", "A0 mo", "al, moffs8"),
        Definition::new("Mov_AX_moffs16", "mov", "o16 A1 mo", "ax, moffs16"),
        Definition::new("Mov_EAX_moffs32", "mov", "o32 A1 mo", "eax, moffs32"),
        Definition::new("Mov_RAX_moffs64", "mov", "REX.W A1 mo", "rax, moffs64").bitness(B64),
        Definition::new("Mov_moffs8_AL", "mov", "A2 mo", "moffs8, al"),
        Definition::new("Mov_moffs16_AX", "mov", "o16 A3 mo", "moffs16, ax"),
        Definition::new("Mov_moffs32_EAX", "mov", "o32 A3 mo", "moffs32, eax"),
        Definition::new("Mov_moffs64_RAX", "mov", "REX.W A3 mo", "moffs64, rax").bitness(B64),
        Definition::new("Mov_r8_imm8", "mov", "B0+rb ib", "r8, imm8"),
        Definition::new("Mov_r16_imm16", "mov", "o16 B8+rw iw", "r16, imm16"),
        Definition::new("Mov_r32_imm32", "mov", "o32 B8+rd id", "r32, imm32"),
        Definition::new("Mov_r64_imm64", "mov", "REX.W B8+ro io", "r64, imm64").bitness(B64),
        // The C6/C7 forms are only selected for memory; registers use B0+r.
        Definition::new("Mov_rm8_imm8", "mov", "C6 /0 ib", "m8, imm8"),
        Definition::new("Mov_rm16_imm16", "mov", "o16 C7 /0 iw", "m16, imm16"),
        Definition::new("Mov_rm32_imm32", "mov", "o32 C7 /0 id", "m32, imm32"),
        Definition::new("Mov_rm64_imm32", "mov", "REX.W C7 /0 id", "m64, imm32sex64").bitness(B64),
        Definition::new("Mov_r32m16_Sreg", "mov", "o32 8C /r", "r32, sreg"),
        Definition::new("Mov_Sreg_r32m16", "mov", "o32 8E /r", "sreg, r32"),
    ]);
}

fn io(defs: &mut Vec<Definition>) {
    defs.extend([
        Definition::new("In_AL_imm8", "in", "E4 ib", "al, uimm8"),
        Definition::new("In_AX_imm8", "in", "o16 E5 ib", "ax, uimm8"),
        Definition::new("In_EAX_imm8", "in", "o32 E5 ib", "eax, uimm8"),
        Definition::new("In_AL_DX", "in", "EC", "al, dx"),
        Definition::new("In_AX_DX", "in", "o16 ED", "ax, dx"),
        Definition::new("In_EAX_DX", "in", "o32 ED", "eax, dx"),
        Definition::new("Out_imm8_AL", "out", "E6 ib", "uimm8, al"),
        Definition::new("Out_imm8_AX", "out", "o16 E7 ib", "uimm8, ax"),
        Definition::new("Out_imm8_EAX", "out", "o32 E7 ib", "uimm8, eax"),
        Definition::new("Out_DX_AL", "out", "EE", "dx, al"),
        Definition::new("Out_DX_AX", "out", "o16 EF", "dx, ax"),
        Definition::new("Out_DX_EAX", "out", "o32 EF", "dx, eax"),
    ]);
}

fn branches(defs: &mut Vec<Definition>) {
    defs.extend([
        Definition::new("Jmp_rel8_16", "jmp", "o16 EB cb", "rel8").bitness(B16),
        Definition::new("Jmp_rel8_32", "jmp", "o32 EB cb", "rel8").bitness(B32),
        Definition::new("Jmp_rel8_64", "jmp", "o64 EB cb", "rel8").bitness(B64),
        Definition::new("Jmp_rel16", "jmp", "o16 E9 cw", "rel16").bitness(B16),
        Definition::new("Jmp_rel32_32", "jmp", "o32 E9 cd", "rel32").bitness(B32),
        Definition::new("Jmp_rel32_64", "jmp", "o64 E9 cd", "rel32").bitness(B64),
        Definition::new("Jmp_rm16", "jmp", "o16 FF /4", "r/m16").bitness(B16),
        Definition::new("Jmp_rm32", "jmp", "o32 FF /4", "r/m32").bitness(B32),
        Definition::new("Jmp_rm64", "jmp", "FF /4", "r/m64").bitness(B64),
    ]);
}

fn x87(defs: &mut Vec<Definition>) {
    defs.extend([
        Definition::new("Fadd_m32fp", "fadd", "D8 /0", "m32"),
        Definition::new("Fadd_m64fp", "fadd", "DC /0", "m64"),
        Definition::new("Fadd_st0_sti", "fadd", "D8 C0+i", "st0, sti"),
        Definition::new("Fadd_sti_st0", "fadd", "DC C0+i", "sti, st0"),
    ]);
}

fn vector(defs: &mut Vec<Definition>) {
    defs.extend([
        Definition::new("VEX_Vaddps_xmm_xmm_xmmm128", "vaddps", "VEX.128.0F.WIG 58 /r", "xmm, xmm, xmm/m128").vex(),
        Definition::new("VEX_Vaddps_ymm_ymm_ymmm256", "vaddps", "VEX.256.0F.WIG 58 /r", "ymm, ymm, ymm/m256").vex(),
        Definition::new(
            "EVEX_Vaddps_xmm_k1z_xmm_xmmm128b32",
            "vaddps",
            "EVEX.128.0F.W0 58 /r",
            "xmm, xmm, xmm/m128/m32bcst",
        )
        .evex(),
        Definition::new(
            "EVEX_Vaddps_ymm_k1z_ymm_ymmm256b32",
            "vaddps",
            "EVEX.256.0F.W0 58 /r",
            "ymm, ymm, ymm/m256/m32bcst",
        )
        .evex(),
        Definition::new(
            "EVEX_Vaddps_zmm_k1z_zmm_zmmm512b32_er",
            "vaddps",
            "EVEX.512.0F.W0 58 /r",
            "zmm, zmm, zmm/m512/m32bcst",
        )
        .evex(),
        Definition::new("Cmpps_xmm_xmmm128_imm8", "cmpps", "NP 0F C2 /r ib", "xmm, xmm/m128, imm8")
            .pseudo_ops(compare_predicates("cmp")),
        Definition::new(
            "VEX_Vcmpps_xmm_xmm_xmmm128_imm8",
            "vcmpps",
            "VEX.128.0F.WIG C2 /r ib",
            "xmm, xmm, xmm/m128, imm8",
        )
        .vex()
        .pseudo_ops(compare_predicates("vcmp")),
        Definition::new(
            "VEX_Vcmpps_ymm_ymm_ymmm256_imm8",
            "vcmpps",
            "VEX.256.0F.WIG C2 /r ib",
            "ymm, ymm, ymm/m256, imm8",
        )
        .vex()
        .pseudo_ops(compare_predicates("vcmp")),
        Definition::new(
            "EVEX_Vcmpps_kr_k1_xmm_xmmm128b32_imm8",
            "vcmpps",
            "EVEX.128.0F.W0 C2 /r ib",
            "k, xmm, xmm/m128/m32bcst, imm8",
        )
        .evex()
        .pseudo_ops(compare_predicates("vcmp")),
        Definition::new(
            "VEX_Vgatherqps_xmm_vm64x_xmm",
            "vgatherqps",
            "VEX.128.66.0F38.W0 93 /r",
            "xmm, vm64x, xmm",
        )
        .vex(),
        Definition::new(
            "VEX_Vgatherqps_xmm_vm64y_xmm",
            "vgatherqps",
            "VEX.256.66.0F38.W0 93 /r",
            "xmm, vm64y, xmm",
        )
        .vex(),
        Definition::new("VEX_Kmovw_kr_km16", "kmovw", "VEX.L0.0F.W0 90 /r", "k, k/m16").vex(),
        Definition::new("VEX_Kmovw_m16_kr", "kmovw", "VEX.L0.0F.W0 91 /r", "m16, k").vex(),
        Definition::new("VEX_Kmovw_kr_r32", "kmovw", "VEX.L0.0F.W0 92 /r", "k, r32").vex(),
        Definition::new("VEX_Kmovw_r32_kr", "kmovw", "VEX.L0.0F.W0 93 /r", "r32, k").vex(),
    ]);
}

/// `cmpeqps`..`cmpordps`: the eight SSE compare predicates in immediate order.
fn compare_predicates(prefix: &str) -> Vec<(String, u8)> {
    ["eq", "lt", "le", "unord", "neq", "nlt", "nle", "ord"]
        .iter()
        .zip(0u8..)
        .map(|(p, imm)| (format!("{prefix}{p}ps"), imm))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_unique_per_operand_list() {
        let defs = definitions();
        for (i, a) in defs.iter().enumerate() {
            for b in &defs[i + 1..] {
                assert!(
                    a.code != b.code || a.operands != b.operands,
                    "duplicate definition {}",
                    a.code
                );
            }
        }
    }

    #[test]
    fn alu_layout() {
        let defs = definitions();
        let find = |code: &str| defs.iter().find(|d| d.code == code).map(|d| d.opcode.as_str());
        assert_eq!(find("Add_AL_imm8"), Some("04 ib"));
        assert_eq!(find("Cmp_rm64_imm8"), Some("REX.W 83 /7 ib"));
        assert_eq!(find("Xor_r32_rm32"), Some("o32 33 /r"));
        assert_eq!(find("Sar_rm16_CL"), Some("o16 D3 /7"));
    }
}


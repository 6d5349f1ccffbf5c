//! Selector tree evaluation: map one call site to one encoding.

use crate::error::{NoMatchError, NoMatchReason};
use crate::ir::{Arg, Bitness};
use crate::table::EncodingCandidate;
use crate::tree::{Node, SelectorTree};

/// Evaluation environment of a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Context {
    /// Bitness the code is generated for.
    pub bitness: Bitness,
    /// Pick VEX over EVEX where both encode the arguments.
    pub prefer_vex: bool,
    /// Pick `rel8` branches where a short form exists.
    pub prefer_short_branch: bool,
}

impl Context {
    /// Context for `bitness` with both preferences on.
    pub fn new(bitness: Bitness) -> Self {
        Self {
            bitness,
            prefer_vex: true,
            prefer_short_branch: true,
        }
    }

    /// Set the VEX preference.
    #[must_use]
    pub fn with_prefer_vex(mut self, prefer_vex: bool) -> Self {
        self.prefer_vex = prefer_vex;
        self
    }

    /// Set the short-branch preference.
    #[must_use]
    pub fn with_prefer_short_branch(mut self, prefer_short_branch: bool) -> Self {
        self.prefer_short_branch = prefer_short_branch;
        self
    }
}

/// Select the encoding of `args` under `ctx`.
///
/// # Errors
///
/// Returns [`NoMatchError`] when the arguments do not fit the tree's
/// signature, the walk ends in a no-match leaf, or the selected candidate
/// does not accept the arguments in this bitness.
pub fn evaluate<'t>(
    tree: &'t SelectorTree,
    ctx: &Context,
    args: &[Arg],
) -> Result<&'t EncodingCandidate, NoMatchError> {
    let index = select_leaf(tree, ctx, args)?;
    tree.candidate(index).ok_or_else(|| {
        NoMatchError::new(tree.mnemonic(), ctx.bitness, args, NoMatchReason::NoEncoding)
    })
}

/// Index of the candidate `args` select, after leaf validation.
pub(crate) fn select_leaf(tree: &SelectorTree, ctx: &Context, args: &[Arg]) -> Result<usize, NoMatchError> {
    let fail = |reason| NoMatchError::new(tree.mnemonic(), ctx.bitness, args, reason);
    let signature = tree.signature();
    if signature.arity() != args.len() {
        return Err(fail(NoMatchReason::Arity {
            expected: signature.arity(),
            found: args.len(),
        }));
    }
    if let Some((slot, expected)) = signature
        .0
        .iter()
        .zip(args)
        .enumerate()
        .find(|(_, (kind, arg))| !kind.admits(arg))
        .map(|(slot, (kind, _))| (slot, *kind))
    {
        return Err(fail(NoMatchReason::ArgumentKind { slot, expected }));
    }

    let mut node = tree.root();
    loop {
        match node {
            Node::Select(d) => {
                let holds = d.condition.holds(args, ctx);
                node = if d.takes_true(ctx.bitness, holds) {
                    &d.if_true
                } else {
                    &d.if_false
                };
            }
            Node::NoMatch => return Err(fail(NoMatchReason::NoEncoding)),
            Node::Leaf(index) => {
                let candidate = tree
                    .candidate(*index)
                    .ok_or_else(|| fail(NoMatchReason::NoEncoding))?;
                if !candidate.accepts(signature, args, ctx.bitness) {
                    return Err(fail(NoMatchReason::Rejected {
                        code: candidate.code.clone(),
                    }));
                }
                return Ok(*index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ArgKind, LabelId, MemoryOperand, MemorySize, Register, RegisterClass, Signature};
    use crate::model::Config;
    use crate::table::EncodingTable;
    use alloc::vec;

    fn tree(mnemonic: &str, sig: &[ArgKind]) -> SelectorTree {
        let table = EncodingTable::builtin().unwrap();
        let group = table.group(mnemonic, &Signature(sig.to_vec())).unwrap().clone();
        SelectorTree::build(group, &Config::default()).unwrap()
    }

    fn code<'t>(tree: &'t SelectorTree, bitness: Bitness, args: &[Arg]) -> Result<&'t str, NoMatchReason> {
        evaluate(tree, &Context::new(bitness), args)
            .map(|c| c.code.as_str())
            .map_err(|e| e.reason)
    }

    const R8: ArgKind = ArgKind::Register(RegisterClass::Gpr8);
    const R16: ArgKind = ArgKind::Register(RegisterClass::Gpr16);

    #[test]
    fn accumulator_short_form() {
        let t = tree("add", &[R8, ArgKind::Immediate]);
        assert_eq!(code(&t, Bitness::Bits16, &[Register::Al.into(), Arg::imm(5)]), Ok("Add_AL_imm8"));
        assert_eq!(code(&t, Bitness::Bits16, &[Register::Bl.into(), Arg::imm(5)]), Ok("Add_rm8_imm8"));
        assert_eq!(
            code(&t, Bitness::Bits16, &[Register::Bl.into(), Arg::imm(300)]),
            Err(NoMatchReason::Rejected {
                code: "Add_rm8_imm8".into()
            })
        );
    }

    #[test]
    fn narrow_immediates_signed_and_unsigned() {
        let signed = tree("add", &[R16, ArgKind::Immediate]);
        let unsigned = tree("add", &[R16, ArgKind::ImmediateUnsigned]);
        let cx = Arg::Register(Register::Cx);
        assert_eq!(code(&signed, Bitness::Bits32, &[cx, Arg::imm(-3)]), Ok("Add_rm16_imm8"));
        assert_eq!(code(&signed, Bitness::Bits32, &[cx, Arg::imm(0x100)]), Ok("Add_rm16_imm16"));
        assert_eq!(code(&unsigned, Bitness::Bits32, &[cx, Arg::imm(0xFFFD)]), Ok("Add_rm16_imm8"));
        assert_eq!(code(&unsigned, Bitness::Bits32, &[cx, Arg::imm(0x8000)]), Ok("Add_rm16_imm16"));
    }

    #[test]
    fn bitness_gating() {
        let t = tree("inc", &[R16]);
        let cx = [Arg::Register(Register::Cx)];
        assert_eq!(code(&t, Bitness::Bits16, &cx), Ok("Inc_r16"));
        assert_eq!(code(&t, Bitness::Bits32, &cx), Ok("Inc_r16"));
        assert_eq!(code(&t, Bitness::Bits64, &cx), Ok("Inc_rm16"));
    }

    #[test]
    fn preferences_pick_branch_and_vector_forms() {
        let jmp = tree("jmp", &[ArgKind::Label]);
        let target = [Arg::Label(LabelId(7))];
        let ctx = Context::new(Bitness::Bits64);
        assert_eq!(evaluate(&jmp, &ctx, &target).map(|c| c.code.as_str()), Ok("Jmp_rel8_64"));
        let near = ctx.with_prefer_short_branch(false);
        assert_eq!(evaluate(&jmp, &near, &target).map(|c| c.code.as_str()), Ok("Jmp_rel32_64"));

        let xmm = ArgKind::Register(RegisterClass::Xmm);
        let v = tree("vaddps", &[xmm, xmm, xmm]);
        let args: [Arg; 3] = [Register::Xmm1.into(), Register::Xmm2.into(), Register::Xmm3.into()];
        assert_eq!(
            evaluate(&v, &ctx, &args).map(|c| c.code.as_str()),
            Ok("VEX_Vaddps_xmm_xmm_xmmm128")
        );
        assert_eq!(
            evaluate(&v, &ctx.with_prefer_vex(false), &args).map(|c| c.code.as_str()),
            Ok("EVEX_Vaddps_xmm_k1z_xmm_xmmm128b32")
        );
    }

    #[test]
    fn memory_sizes_and_moffs() {
        let t = tree("mov", &[R8, ArgKind::Memory]);
        let abs = MemoryOperand::absolute(MemorySize::Byte, 0x1000);
        let based = MemoryOperand::based(MemorySize::Byte, Register::Rbx);
        let al = Arg::Register(Register::Al);
        assert_eq!(code(&t, Bitness::Bits64, &[al, abs.into()]), Ok("Mov_AL_moffs8"));
        assert_eq!(code(&t, Bitness::Bits64, &[al, based.into()]), Ok("Mov_r8_rm8"));
        let wrong = MemoryOperand::based(MemorySize::Word, Register::Rbx);
        assert_eq!(
            code(&t, Bitness::Bits64, &[al, wrong.into()]),
            Err(NoMatchReason::NoEncoding)
        );
    }

    #[test]
    fn signature_checks() {
        let t = tree("add", &[R8, ArgKind::Immediate]);
        assert_eq!(
            code(&t, Bitness::Bits64, &[Register::Al.into()]),
            Err(NoMatchReason::Arity { expected: 2, found: 1 })
        );
        assert_eq!(
            code(&t, Bitness::Bits64, &[Register::Ax.into(), Arg::imm(1)]),
            Err(NoMatchReason::ArgumentKind { slot: 0, expected: R8 })
        );
    }

    #[test]
    fn error_carries_call_site() {
        let t = tree("push", &[ArgKind::Register(RegisterClass::Segment)]);
        let err = evaluate(&t, &Context::new(Bitness::Bits64), &[Register::Es.into()]).unwrap_err();
        assert_eq!(err.mnemonic, "push");
        assert_eq!(err.bitness, Bitness::Bits64);
        assert_eq!(err.args, vec![Arg::Register(Register::Es)]);
    }
}

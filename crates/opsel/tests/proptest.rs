#![cfg(not(target_arch = "wasm32"))]
//! Property-based tests using proptest.
//!
//! Random call sites are thrown at every compiled tree: evaluation must never
//! panic, must be deterministic, and anything it returns must actually
//! encode the arguments in the requested bitness.

use opsel::{
    evaluate, Arg, ArgKind, Bitness, Config, Context, LabelId, MemoryOperand, MemorySize, Model,
    Register,
};
use proptest::prelude::*;

// ── Strategies ──────────────────────────────────────────────────────────

fn arb_bitness() -> impl Strategy<Value = Bitness> {
    prop::sample::select(Bitness::ALL.to_vec())
}

fn arb_register() -> impl Strategy<Value = Register> {
    prop::sample::select(Register::ALL.to_vec())
}

fn arb_size() -> impl Strategy<Value = MemorySize> {
    prop::sample::select(MemorySize::KNOWN.to_vec())
}

/// Immediates biased towards the edges of every width.
fn arb_immediate() -> impl Strategy<Value = i128> {
    prop_oneof![
        -300i128..300,
        prop::sample::select(vec![
            0x7F,
            0x80,
            0xFF,
            0x100,
            -0x80,
            -0x81,
            0x7FFF,
            0x8000,
            0xFFFF,
            0x1_0000,
            0x7FFF_FFFF,
            0x8000_0000,
            0xFFFF_FFFF,
            -0x8000_0000,
            i128::from(i64::MAX),
            i128::from(u64::MAX),
            i128::from(i64::MIN),
        ]),
        any::<i64>().prop_map(i128::from),
    ]
}

fn arb_memory() -> impl Strategy<Value = MemoryOperand> {
    (
        arb_size(),
        prop::option::of(arb_register()),
        prop::option::of(arb_register()),
        any::<bool>(),
        any::<i32>(),
    )
        .prop_map(|(size, base, index, broadcast, disp)| {
            let mut m = match base {
                Some(b) => MemoryOperand::based(size, b).with_displacement(i64::from(disp)),
                None => MemoryOperand::absolute(size, i64::from(disp)),
            };
            if let Some(i) = index {
                m = m.with_index(i, 4);
            }
            if broadcast {
                m = m.with_broadcast();
            }
            m
        })
}

fn arb_arg() -> impl Strategy<Value = Arg> {
    prop_oneof![
        arb_register().prop_map(Arg::Register),
        arb_memory().prop_map(Arg::Memory),
        arb_immediate().prop_map(Arg::Immediate),
        (0u32..4).prop_map(|l| Arg::Label(LabelId(l))),
    ]
}

fn arb_context() -> impl Strategy<Value = Context> {
    (arb_bitness(), any::<bool>(), any::<bool>()).prop_map(|(b, vex, short)| {
        Context::new(b)
            .with_prefer_vex(vex)
            .with_prefer_short_branch(short)
    })
}

fn model() -> &'static Model {
    use std::sync::OnceLock;
    static MODEL: OnceLock<Model> = OnceLock::new();
    MODEL.get_or_init(|| Model::builtin(&Config::default()).expect("builtin model compiles"))
}

// ── Properties ──────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    /// Any argument tuple against any tree returns a result without panicking.
    #[test]
    fn evaluation_never_panics(
        tree_index in 0usize..1024,
        ctx in arb_context(),
        args in prop::collection::vec(arb_arg(), 0..4),
    ) {
        let trees = model().trees();
        let tree = &trees[tree_index % trees.len()];
        let _ = evaluate(tree, &ctx, &args);
    }

    /// A returned candidate encodes the arguments in the context's bitness.
    #[test]
    fn selections_are_valid(
        tree_index in 0usize..1024,
        ctx in arb_context(),
        args in prop::collection::vec(arb_arg(), 1..4),
    ) {
        let trees = model().trees();
        let tree = &trees[tree_index % trees.len()];
        if let Ok(chosen) = evaluate(tree, &ctx, &args) {
            prop_assert!(chosen.accepts(tree.signature(), &args, ctx.bitness));
            prop_assert!(chosen.bitness.contains(ctx.bitness));
        }
    }

    /// Evaluating twice gives the same answer.
    #[test]
    fn evaluation_is_deterministic(
        tree_index in 0usize..1024,
        ctx in arb_context(),
        args in prop::collection::vec(arb_arg(), 1..4),
    ) {
        let trees = model().trees();
        let tree = &trees[tree_index % trees.len()];
        let a = evaluate(tree, &ctx, &args).map(|c| c.code.clone());
        let b = evaluate(tree, &ctx, &args).map(|c| c.code.clone());
        prop_assert_eq!(a, b);
    }

    /// Register/immediate call sites for the ALU family always find an
    /// encoding when the immediate fits the register width.
    #[test]
    fn alu_reg_imm_always_encodes(
        mnemonic in prop::sample::select(vec!["add", "or", "adc", "sbb", "and", "sub", "xor", "cmp"]),
        reg in arb_register(),
        value in -0x80i128..0x80,
        bitness in arb_bitness(),
    ) {
        prop_assume!(reg.class().is_gpr() && reg.available_in(bitness));
        let m = model();
        let ctx = m.context(bitness);
        let chosen = m.select(mnemonic, &ctx, &[Arg::Register(reg), Arg::Immediate(value)]);
        prop_assert!(chosen.is_ok(), "{mnemonic} {reg}, {value} in {bitness}-bit mode: {chosen:?}");
    }

    /// Arguments of the wrong static kind are reported, never selected.
    #[test]
    fn wrong_kinds_are_reported(
        tree_index in 0usize..1024,
        ctx in arb_context(),
        args in prop::collection::vec(arb_arg(), 0..4),
    ) {
        let trees = model().trees();
        let tree = &trees[tree_index % trees.len()];
        let sig = tree.signature();
        let admitted = sig.arity() == args.len()
            && sig.0.iter().zip(&args).all(|(k, a): (&ArgKind, &Arg)| k.admits(a));
        if !admitted {
            prop_assert!(evaluate(tree, &ctx, &args).is_err());
        }
    }
}

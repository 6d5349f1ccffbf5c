#![no_main]
use std::sync::OnceLock;

use libfuzzer_sys::fuzz_target;
use opsel::{Arg, Bitness, Config, Context, LabelId, MemoryOperand, MemorySize, Model, Register};

fn model() -> &'static Model {
    static MODEL: OnceLock<Model> = OnceLock::new();
    MODEL.get_or_init(|| Model::builtin(&Config::default()).expect("builtin model compiles"))
}

/// Decode one argument from the front of `data`.
fn arg(data: &mut &[u8]) -> Option<Arg> {
    let (&tag, rest) = data.split_first()?;
    let (&a, rest) = rest.split_first()?;
    let (&b, rest) = rest.split_first()?;
    *data = rest;
    let reg = |n: u8| Register::ALL[usize::from(n) % Register::ALL.len()];
    Some(match tag % 5 {
        0 => Arg::Register(reg(a)),
        1 => Arg::Immediate(i128::from(i16::from_le_bytes([a, b])) << (b % 48)),
        2 => {
            let size = MemorySize::KNOWN[usize::from(a) % MemorySize::KNOWN.len()];
            let mut m = MemoryOperand::based(size, reg(b));
            if a & 0x80 != 0 {
                m = m.with_broadcast();
            }
            Arg::Memory(m)
        }
        3 => Arg::Memory(MemoryOperand::absolute(MemorySize::KNOWN[usize::from(a) % 9], i64::from(b))),
        _ => Arg::Label(LabelId(u32::from(a))),
    })
}

fuzz_target!(|data: &[u8]| {
    // Selection must never panic, only return Ok/Err.
    let Some((&head, mut rest)) = data.split_first() else {
        return;
    };
    let m = model();
    let trees = m.trees();
    let tree = &trees[usize::from(head) % trees.len()];
    let bitness = Bitness::ALL[usize::from(head >> 6) % 3];
    let ctx = Context::new(bitness)
        .with_prefer_vex(head & 0x10 != 0)
        .with_prefer_short_branch(head & 0x20 != 0);

    let mut args = Vec::new();
    while args.len() < 4 {
        match arg(&mut rest) {
            Some(a) => args.push(a),
            None => break,
        }
    }
    if let Ok(chosen) = opsel::evaluate(tree, &ctx, &args) {
        assert!(chosen.accepts(tree.signature(), &args, bitness));
    }
    let _ = m.select(tree.mnemonic(), &ctx, &args);
});

//! Basic selector example: compile the built-in table, pick encodings for a
//! few call sites, and show the tree, its pseudo-code and its exemplars.
//!
//! Run with: `cargo run --example basic`

use opsel::{
    enumerate_exemplars, render_selector, Arg, ArgKind, Bitness, Config, DefaultNaming,
    Expectation, MemoryOperand, MemorySize, Model, Register, RegisterClass, Signature,
};

fn main() {
    println!("=== opsel basic example ===\n");

    let model = Model::builtin(&Config::default()).unwrap();
    println!("Compiled {} selector trees.\n", model.trees().len());

    // --- Selection ---
    println!("1. Selecting encodings:");
    let dword = MemoryOperand::based(MemorySize::Dword, Register::Rbx).with_displacement(8);
    let calls: Vec<(Bitness, &str, Vec<Arg>)> = vec![
        (Bitness::Bits64, "add", vec![Register::Rsp.into(), Arg::imm(0x20)]),
        (Bitness::Bits64, "add", vec![Register::Rax.into(), Arg::imm(0x1000)]),
        (Bitness::Bits32, "inc", vec![Register::Ecx.into()]),
        (Bitness::Bits64, "inc", vec![Register::Ecx.into()]),
        (Bitness::Bits64, "mov", vec![dword.into(), Arg::imm(1)]),
        (Bitness::Bits64, "push", vec![Register::Es.into()]),
    ];
    for (bitness, mnemonic, args) in &calls {
        let shown: Vec<String> = args.iter().map(ToString::to_string).collect();
        match model.select(mnemonic, &model.context(*bitness), args) {
            Ok(c) => println!("   [{bitness:>2}] {mnemonic} {:<24} -> {}", shown.join(", "), c.code),
            Err(e) => println!("   [{bitness:>2}] {mnemonic} {:<24} -> error: {e}", shown.join(", ")),
        }
    }

    // --- Tree outline ---
    println!("\n2. Tree for jmp(label):");
    let jmp = model.tree("jmp", &Signature(vec![ArgKind::Label])).unwrap();
    println!("   {jmp}");
    println!("   depth {}, {} nodes", jmp.depth(), jmp.node_count());

    // --- Rendering ---
    println!("\n3. Rendered selector for add(r16, imm):");
    let sig = Signature(vec![ArgKind::Register(RegisterClass::Gpr16), ArgKind::Immediate]);
    let add = model.tree("add", &sig).unwrap();
    for line in render_selector(add, &DefaultNaming).lines() {
        println!("   {line}");
    }

    // --- Exemplars ---
    println!("\n4. Exemplars for add(r16, imm) in 32-bit mode:");
    for ex in enumerate_exemplars(add, Bitness::Bits32) {
        let shown: Vec<String> = ex.args.iter().map(ToString::to_string).collect();
        match ex.expectation {
            Expectation::Selects { candidate } => {
                let code = &add.candidate(candidate).unwrap().code;
                println!("   add {:<16} selects {code}", shown.join(", "));
            }
            Expectation::Rejects { selector: Some(selector), .. } => {
                println!("   add {:<16} fails   {selector}", shown.join(", "));
            }
            Expectation::Rejects { selector: None, .. } => {
                println!("   add {:<16} invalid in 32-bit mode", shown.join(", "));
            }
        }
    }

    println!("\n=== done ===");
}

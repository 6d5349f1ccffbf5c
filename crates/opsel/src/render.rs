//! Pseudo-code rendering of selector trees.
//!
//! Rendering is presentation only: trees and conditions stay structured,
//! and a [`Naming`] implementation decides how identifiers look.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt::Write;

use crate::ir::{ArgKind, Bitness, MemorySize, Register, RegisterClass};
use crate::selector::{CmpOp, Comparand, Condition, Subject};
use crate::table::{EncodingCandidate, OpGroup};
use crate::tree::{Decision, Node, SelectorTree};

/// Naming service for rendered identifiers.
///
/// Every method has a plain default; override the ones a target language
/// spells differently.
pub trait Naming {
    /// Identifier of a candidate's code.
    fn code(&self, candidate: &EncodingCandidate) -> String {
        format!("Code::{}", candidate.code)
    }

    /// Register literal.
    fn register(&self, register: Register) -> String {
        format!("Register::{register:?}")
    }

    /// Register class literal.
    fn register_class(&self, class: RegisterClass) -> String {
        format!("RegisterClass::{class:?}")
    }

    /// Memory size literal.
    fn memory_size(&self, size: MemorySize) -> String {
        format!("MemorySize::{size:?}")
    }

    /// Parameter type of a slot; `bits` is the widest operand in it.
    fn arg_type(&self, kind: ArgKind, bits: u32) -> String {
        match kind {
            ArgKind::Register(class) => format!("Register{}", class.to_string().to_ascii_uppercase()),
            ArgKind::Memory => "MemoryOperand".into(),
            ArgKind::Immediate => format!("i{}", bits.max(8).next_power_of_two()),
            ArgKind::ImmediateUnsigned => format!("u{}", bits.max(8).next_power_of_two()),
            ArgKind::Label => "Label".into(),
        }
    }

    /// Expression for a condition subject.
    fn subject(&self, subject: &Subject, args: &[RenderArg]) -> String {
        let name = |i: &usize| args.get(*i).map_or_else(|| format!("arg{i}"), |a| a.name.clone());
        match subject {
            Subject::Arg(i) => name(i),
            Subject::MemorySize(i) => format!("{}.size()", name(i)),
            Subject::MemoryIndex(i) => format!("{}.index_class()", name(i)),
            Subject::Broadcast(i) => format!("{}.is_broadcast()", name(i)),
            Subject::DisplacementOnly(i) => format!("{}.is_displacement_only()", name(i)),
            Subject::Bitness => "self.bitness()".into(),
            Subject::PreferVex => "self.prefer_vex()".into(),
            Subject::PreferShortBranch => "self.prefer_short_branch()".into(),
        }
    }
}

/// [`Naming`] with every default.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNaming;

impl Naming for DefaultNaming {}

/// A rendered method parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RenderArg {
    /// Parameter name (`dst`, `src`, `src1`, `imm`, `imm1`...).
    pub name: String,
    /// Static kind of the slot.
    pub kind: ArgKind,
    /// Widest operand of the slot, in bits.
    pub bits: u32,
}

/// Parameters of a group's assembler method.
///
/// Non-immediate slots are `dst` then `src`, or `src1`, `src2`... when the
/// method takes three or more operands. Immediates are `imm`, `imm1`...
pub fn render_args(group: &OpGroup) -> Vec<RenderArg> {
    let arity = group.arity();
    let mut operands = 0usize;
    let mut immediates = 0usize;
    group
        .signature
        .0
        .iter()
        .enumerate()
        .map(|(i, kind)| {
            let name = if kind.is_immediate() {
                immediates += 1;
                match immediates {
                    1 => "imm".to_string(),
                    n => format!("imm{}", n - 1),
                }
            } else {
                operands += 1;
                match operands {
                    1 => "dst".to_string(),
                    _ if arity <= 2 => "src".to_string(),
                    n => format!("src{}", n - 1),
                }
            };
            RenderArg {
                name,
                kind: *kind,
                bits: group.max_bits.get(i).copied().unwrap_or(0),
            }
        })
        .collect()
}

/// Render `tree` as an `if / else` cascade assigning `code`.
///
/// Decisions whose branches are both leaves become a single conditional
/// expression; no-match leaves raise `no_opcode_found` with the mnemonic and
/// the arguments. A pseudo-op group renders as a call to its full form with
/// the bound immediate appended.
pub fn render_selector(tree: &SelectorTree, naming: &dyn Naming) -> String {
    let r = Renderer {
        tree,
        naming,
        args: render_args(tree.group()),
    };
    let mut out = String::new();
    if let Some(p) = tree.group().candidates.first().and_then(|c| c.pseudo_op.as_ref()) {
        let names: Vec<&str> = r.args.iter().map(|a| a.name.as_str()).collect();
        let _ = writeln!(out, "return {}({}, {});", p.parent, names.join(", "), p.immediate);
        return out;
    }
    r.node(&mut out, tree.root(), 0);
    out
}

struct Renderer<'a> {
    tree: &'a SelectorTree,
    naming: &'a dyn Naming,
    args: Vec<RenderArg>,
}

impl Renderer<'_> {
    fn leaf(&self, node: &Node) -> Option<String> {
        match node {
            Node::Leaf(c) => self.tree.candidate(*c).map(|c| self.naming.code(c)),
            _ => None,
        }
    }

    fn node(&self, out: &mut String, node: &Node, depth: usize) {
        let pad = "    ".repeat(depth);
        match node {
            Node::Leaf(_) => {
                let code = self.leaf(node).unwrap_or_default();
                let _ = writeln!(out, "{pad}code = {code};");
            }
            Node::NoMatch => {
                let names: Vec<&str> = self.args.iter().map(|a| a.name.as_str()).collect();
                let _ = writeln!(
                    out,
                    "{pad}return Err(no_opcode_found(\"{}\", &[{}]));",
                    self.tree.mnemonic(),
                    names.join(", ")
                );
            }
            Node::Select(d) => {
                if let (Some(a), Some(b)) = (self.leaf(&d.if_true), self.leaf(&d.if_false)) {
                    let _ = writeln!(
                        out,
                        "{pad}code = if {} {{ {a} }} else {{ {b} }};",
                        self.condition(&d.gated_condition())
                    );
                } else {
                    self.cascade(out, d, depth, &pad);
                }
            }
        }
    }

    fn cascade(&self, out: &mut String, d: &Decision, depth: usize, pad: &str) {
        let _ = writeln!(out, "{pad}if {} {{", self.condition(&d.gated_condition()));
        self.node(out, &d.if_true, depth + 1);
        match &d.if_false {
            Node::Select(next) if self.leaf(&next.if_true).is_none() || self.leaf(&next.if_false).is_none() => {
                let _ = write!(out, "{pad}}} else ");
                let mut tail = String::new();
                self.cascade(&mut tail, next, depth, pad);
                out.push_str(tail.trim_start());
            }
            other => {
                let _ = writeln!(out, "{pad}}} else {{");
                self.node(out, other, depth + 1);
                let _ = writeln!(out, "{pad}}}");
            }
        }
    }

    fn condition(&self, cond: &Condition) -> String {
        match cond {
            Condition::Test { subject, op, value } => self.test(subject, *op, value),
            Condition::All(parts) => self.joined(parts, " && "),
            Condition::Any(parts) => self.joined(parts, " || "),
        }
    }

    fn joined(&self, parts: &[Condition], sep: &str) -> String {
        parts
            .iter()
            .map(|p| match p {
                Condition::Test { .. } => self.condition(p),
                _ => format!("({})", self.condition(p)),
            })
            .collect::<Vec<_>>()
            .join(sep)
    }

    fn test(&self, subject: &Subject, op: CmpOp, value: &Comparand) -> String {
        let lhs = self.naming.subject(subject, &self.args);
        match (op, value) {
            (CmpOp::Eq, Comparand::Bool(true)) => lhs,
            (CmpOp::Eq, Comparand::Bool(false)) => format!("!{lhs}"),
            (CmpOp::In, Comparand::Bitnesses(set)) => {
                let alts: Vec<String> = set.iter().map(|b: Bitness| format!("{lhs} == {b}")).collect();
                match alts.len() {
                    0 => "false".into(),
                    1 => alts.join(""),
                    _ => format!("({})", alts.join(" || ")),
                }
            }
            _ => format!("{lhs} {op} {}", self.value(value)),
        }
    }

    fn value(&self, value: &Comparand) -> String {
        match value {
            Comparand::Register(r) => self.naming.register(*r),
            Comparand::Class(c) => self.naming.register_class(*c),
            Comparand::Size(s) => self.naming.memory_size(*s),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Signature;
    use crate::model::Config;
    use crate::table::EncodingTable;

    fn tree(mnemonic: &str, sig: &[ArgKind]) -> SelectorTree {
        let table = EncodingTable::builtin().unwrap();
        let group = table.group(mnemonic, &Signature(sig.to_vec())).unwrap().clone();
        SelectorTree::build(group, &Config::default()).unwrap()
    }

    const R8: ArgKind = ArgKind::Register(RegisterClass::Gpr8);
    const XMM: ArgKind = ArgKind::Register(RegisterClass::Xmm);

    #[test]
    fn argument_names() {
        let t = tree("add", &[R8, ArgKind::Immediate]);
        let args = render_args(t.group());
        assert_eq!(args[0].name, "dst");
        assert_eq!(args[1].name, "imm");
        assert_eq!(args[1].bits, 8);
        let v = tree("vaddps", &[XMM, XMM, ArgKind::Memory]);
        let names: Vec<String> = render_args(v.group()).into_iter().map(|a| a.name).collect();
        assert_eq!(names, ["dst", "src1", "src2"]);
        let m = tree("mov", &[ArgKind::Memory, R8]);
        let names: Vec<String> = render_args(m.group()).into_iter().map(|a| a.name).collect();
        assert_eq!(names, ["dst", "src"]);
    }

    #[test]
    fn argument_types() {
        let t = tree("add", &[ArgKind::Register(RegisterClass::Gpr16), ArgKind::ImmediateUnsigned]);
        let args = render_args(t.group());
        assert_eq!(args[1].bits, 16);
        assert_eq!(DefaultNaming.arg_type(args[0].kind, args[0].bits), "RegisterR16");
        assert_eq!(DefaultNaming.arg_type(args[1].kind, args[1].bits), "u16");
    }

    #[test]
    fn leaf_pair_is_a_conditional_expression() {
        let t = tree("add", &[R8, ArgKind::Immediate]);
        assert_eq!(
            render_selector(&t, &DefaultNaming),
            "code = if dst == Register::Al { Code::Add_AL_imm8 } else { Code::Add_rm8_imm8 };\n"
        );
    }

    #[test]
    fn pseudo_op_delegates_to_full_form() {
        let t = tree("cmpltps", &[XMM, XMM]);
        assert_eq!(render_selector(&t, &DefaultNaming), "return cmpps(dst, src, 1);\n");
        let v = tree("vcmpordps", &[XMM, XMM, ArgKind::Memory]);
        assert_eq!(render_selector(&v, &DefaultNaming), "return vcmpps(dst, src1, src2, 7);\n");
    }

    #[test]
    fn cascade_with_no_match() {
        let t = tree("in", &[R8, ArgKind::Register(RegisterClass::Gpr16)]);
        let text = render_selector(&t, &DefaultNaming);
        assert_eq!(
            text,
            "if dst == Register::Al {\n\
             \x20   if src == Register::Dx {\n\
             \x20       code = Code::In_AL_DX;\n\
             \x20   } else {\n\
             \x20       return Err(no_opcode_found(\"in\", &[dst, src]));\n\
             \x20   }\n\
             } else {\n\
             \x20   return Err(no_opcode_found(\"in\", &[dst, src]));\n\
             }\n"
        );
    }

    #[test]
    fn else_if_chain_and_bitness_gates() {
        let t = tree("jmp", &[ArgKind::Label]);
        let text = render_selector(&t, &DefaultNaming);
        assert!(text.starts_with("if self.bitness() == 64 {\n"));
        assert!(text.contains("} else if self.bitness() == 32 {\n"));
        assert!(text.contains(
            "code = if self.prefer_short_branch() { Code::Jmp_rel8_16 } else { Code::Jmp_rel16 };"
        ));

        let push = tree("push", &[ArgKind::Register(RegisterClass::Segment)]);
        let text = render_selector(&push, &DefaultNaming);
        assert!(text.starts_with(
            "if (self.bitness() == 16 || self.bitness() == 32) && dst == Register::Es {\n"
        ));
    }
}

//! Textual form of the IR.
//!
//! The output is accepted by [`crate::parser::parse_module`]. Values print
//! as `%N` (their arena handle), blocks as `bbN`, arguments as `$N` and
//! module symbols as `@name`.

use super::function::Function;
use super::module::Module;
use super::types::{InstrId, InstrKind, Instruction, Operand};
use std::fmt;

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut header = false;
        for global in self.globals() {
            match global.init {
                Some(init) => writeln!(f, "global @{} = {}", global.name, init)?,
                None => writeln!(f, "global @{}", global.name)?,
            }
            header = true;
        }
        for func in self.functions().iter().filter(|f| f.is_declaration()) {
            writeln!(f, "declare @{}({})", func.name, func.num_params)?;
            header = true;
        }

        let mut first = !header;
        for func in self.functions().iter().filter(|f| !f.is_declaration()) {
            if !first {
                writeln!(f)?;
            }
            first = false;
            write_function(f, self, func)?;
        }
        Ok(())
    }
}

fn write_function(f: &mut fmt::Formatter<'_>, module: &Module, func: &Function) -> fmt::Result {
    writeln!(f, "func @{}({}) {{", func.name, func.num_params)?;
    for block in func.blocks() {
        writeln!(f, "{}:", block.id)?;
        for &id in block.instructions() {
            if let Some(instr) = func.instr(id) {
                write!(f, "  ")?;
                write_instr(f, module, id, instr)?;
                writeln!(f)?;
            }
        }
    }
    writeln!(f, "}}")
}

fn write_instr(
    f: &mut fmt::Formatter<'_>,
    module: &Module,
    id: InstrId,
    instr: &Instruction,
) -> fmt::Result {
    if instr.kind.has_result() {
        write!(f, "{} = ", id)?;
    }
    let ops: Vec<String> = instr
        .operands
        .iter()
        .map(|op| operand_text(module, op))
        .collect();

    match &instr.kind {
        InstrKind::Call { callee } => {
            let name = module
                .function(*callee)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| format!("func{}", callee.0));
            write!(f, "call @{}({})", name, ops.join(", "))
        }
        InstrKind::Br { target } => write!(f, "br {}", target),
        InstrKind::CondBr { if_true, if_false } => {
            let cond = ops.first().map(String::as_str).unwrap_or("undef");
            write!(f, "br {}, {}, {}", cond, if_true, if_false)
        }
        InstrKind::Phi { incoming } => {
            let pairs: Vec<String> = ops
                .iter()
                .zip(incoming)
                .map(|(op, block)| format!("[{}, {}]", op, block))
                .collect();
            write!(f, "phi {}", pairs.join(", "))
        }
        kind if ops.is_empty() => write!(f, "{}", kind.mnemonic()),
        kind => write!(f, "{} {}", kind.mnemonic(), ops.join(", ")),
    }
}

fn operand_text(module: &Module, op: &Operand) -> String {
    match op {
        Operand::Instr(id) => id.to_string(),
        Operand::Const(c) => c.to_string(),
        Operand::Global(g) => match module.global(*g) {
            Some(global) => format!("@{}", global.name),
            None => format!("@global{}", g.0),
        },
        Operand::Arg(n) => format!("${}", n),
        Operand::Undef => "undef".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use crate::ir::{BinOp, Constant, FunctionBuilder, Module, Operand};

    #[test]
    fn prints_globals_declarations_and_bodies() {
        let mut module = Module::new();
        let g = module.add_global("g", Some(Constant::Int(4))).unwrap();
        let puts = module.add_function("puts", 1).unwrap();
        let main = module.add_function("main", 0).unwrap();

        let func = module.function_mut(main).unwrap();
        let mut b = FunctionBuilder::new(func);
        let v = b.load(Operand::Global(g)).unwrap();
        let w = b.binary(BinOp::Mul, v.into(), Operand::int(3)).unwrap();
        b.call(puts, vec![w.into()]).unwrap();
        b.ret(None).unwrap();

        let expected = "\
global @g = 4
declare @puts(1)

func @main(0) {
bb0:
  %0 = load @g
  %1 = mul %0, 3
  %2 = call @puts(%1)
  ret
}
";
        assert_eq!(module.to_string(), expected);
    }
}

//! Textual IR parser.
//!
//! Reads the line-oriented form printed by the `Display` impl of
//! [`Module`]:
//!
//! ```text
//! global @counter = 0
//! declare @print(1)
//!
//! func @main(0) {
//! entry:
//!   %v = load @counter
//!   %c = icmp lt %v, 10
//!   br %c, then, done
//! then:
//!   call @print(%v)
//!   br done
//! done:
//!   %r = phi [%v, entry], [0, then]
//!   ret %r
//! }
//! ```
//!
//! Parsing runs in two passes: the first registers every global and
//! function so that calls may name functions defined later, the second
//! parses function bodies. Inside a body, instructions are created first and
//! their operands resolved afterwards, so phi nodes may reference values
//! defined further down.

mod lexer;

use crate::ir::{
    BinOp, BlockId, CastOp, CmpPred, Constant, FuncId, GlobalId, InstrId, InstrKind, Module,
    Operand,
};
use anyhow::{anyhow, bail, Context, Result};
use lexer::{Line, Token};
use std::collections::HashMap;

/// Parses a whole module from its textual form and validates it.
pub fn parse_module(source: &str) -> Result<Module> {
    let lines = lexer::tokenize(source)?;
    let mut module = Module::new();
    let mut bodies: Vec<(FuncId, &[Line])> = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        let line = &lines[i];
        let mut cur = Cursor::new(line);
        let keyword = cur.ident()?;
        match keyword {
            "global" => {
                let name = cur.symbol()?;
                let init = if cur.eat(&Token::Eq) {
                    Some(cur.constant()?)
                } else {
                    None
                };
                cur.finish()?;
                module
                    .add_global(name, init)
                    .with_context(|| format!("line {}", line.number))?;
            }
            "declare" | "func" => {
                let name = cur.symbol()?;
                cur.expect(Token::LParen)?;
                let num_params = cur.count()?;
                cur.expect(Token::RParen)?;
                let is_definition = keyword == "func";
                if is_definition {
                    cur.expect(Token::LBrace)?;
                }
                cur.finish()?;
                let id = module
                    .add_function(name, num_params)
                    .with_context(|| format!("line {}", line.number))?;

                if is_definition {
                    let start = i + 1;
                    let Some(len) = lines[start..]
                        .iter()
                        .position(|l| l.tokens == [Token::RBrace])
                    else {
                        bail!("line {}: body of @{} is never closed", line.number, name);
                    };
                    bodies.push((id, &lines[start..start + len]));
                    i = start + len;
                }
            }
            other => bail!(
                "line {}: expected `global`, `declare` or `func`, found `{}`",
                line.number,
                other
            ),
        }
        i += 1;
    }

    for (id, body) in bodies {
        parse_body(&mut module, id, body)?;
    }
    module.validate().context("parsed module is malformed")?;
    Ok(module)
}

/// Operand as written, before names are resolved.
#[derive(Debug, Clone, PartialEq)]
enum RawOperand {
    Local(String),
    Global(String),
    Arg(u32),
    Const(Constant),
    Undef,
}

struct ParsedInstr {
    result: Option<String>,
    kind: InstrKind,
    operands: Vec<RawOperand>,
}

/// Symbol tables visible inside a function body.
struct Scope<'a> {
    functions: &'a HashMap<String, FuncId>,
    labels: &'a HashMap<String, BlockId>,
}

fn label(line: &Line) -> Option<&str> {
    match line.tokens.as_slice() {
        [Token::Ident(name), Token::Colon] => Some(name),
        _ => None,
    }
}

fn parse_body(module: &mut Module, id: FuncId, lines: &[Line]) -> Result<()> {
    let functions: HashMap<String, FuncId> = module
        .functions()
        .iter()
        .map(|f| (f.name.clone(), f.id))
        .collect();
    let globals: HashMap<String, GlobalId> = module
        .globals()
        .iter()
        .map(|g| (g.name.clone(), g.id))
        .collect();
    let Some(func) = module.function_mut(id) else {
        bail!("function {:?} vanished while parsing", id);
    };

    let mut labels: HashMap<String, BlockId> = HashMap::new();
    for line in lines {
        if let Some(name) = label(line) {
            if labels.insert(name.to_string(), func.add_block()).is_some() {
                bail!("line {}: block `{}` defined twice", line.number, name);
            }
        }
    }
    if labels.is_empty() {
        bail!("function @{} has an empty body", func.name);
    }

    let scope = Scope {
        functions: &functions,
        labels: &labels,
    };
    let mut values: HashMap<String, InstrId> = HashMap::new();
    let mut pending: Vec<(InstrId, Vec<RawOperand>, usize)> = Vec::new();
    let mut current: Option<BlockId> = None;

    for line in lines {
        if let Some(name) = label(line) {
            current = labels.get(name).copied();
            continue;
        }
        let Some(block) = current else {
            bail!("line {}: instruction before the first block label", line.number);
        };

        let parsed = parse_instr(line, &scope)?;
        if parsed.result.is_some() && !parsed.kind.has_result() {
            bail!(
                "line {}: `{}` does not produce a value",
                line.number,
                parsed.kind.mnemonic()
            );
        }
        let instr = func
            .append_instr(block, parsed.kind, vec![])
            .with_context(|| format!("line {}", line.number))?;
        if let Some(name) = parsed.result {
            if values.insert(name.clone(), instr).is_some() {
                bail!("line {}: value %{} defined twice", line.number, name);
            }
        }
        pending.push((instr, parsed.operands, line.number));
    }

    for (instr, raw, number) in pending {
        let operands = raw
            .into_iter()
            .map(|op| resolve(op, &values, &globals))
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("line {}", number))?;
        func.set_operands(instr, operands)
            .with_context(|| format!("line {}", number))?;
    }
    Ok(())
}

fn resolve(
    op: RawOperand,
    values: &HashMap<String, InstrId>,
    globals: &HashMap<String, GlobalId>,
) -> Result<Operand> {
    Ok(match op {
        RawOperand::Local(name) => values
            .get(&name)
            .map(|id| Operand::Instr(*id))
            .ok_or_else(|| anyhow!("unknown value %{}", name))?,
        RawOperand::Global(name) => globals
            .get(&name)
            .map(|id| Operand::Global(*id))
            .ok_or_else(|| anyhow!("unknown global @{}", name))?,
        RawOperand::Arg(n) => Operand::Arg(n),
        RawOperand::Const(c) => Operand::Const(c),
        RawOperand::Undef => Operand::Undef,
    })
}

fn parse_instr(line: &Line, scope: &Scope<'_>) -> Result<ParsedInstr> {
    let mut cur = Cursor::new(line);
    let result = match line.tokens.as_slice() {
        [Token::Local(name), Token::Eq, ..] => {
            cur.pos = 2;
            Some(name.clone())
        }
        _ => None,
    };

    let opcode = cur.ident()?;
    let (kind, operands) = match opcode {
        "alloca" => (InstrKind::Alloca, vec![]),
        "load" => (InstrKind::Load, cur.operand_list()?),
        "store" => (InstrKind::Store, cur.operand_list()?),
        "ret" => (InstrKind::Ret, cur.operand_list()?),
        "gep" => (InstrKind::Gep, cur.operand_list()?),
        "call" => {
            let name = cur.symbol()?;
            let callee = scope
                .functions
                .get(name)
                .copied()
                .ok_or_else(|| cur.error(format!("call to unknown function @{}", name)))?;
            cur.expect(Token::LParen)?;
            let mut args = Vec::new();
            if !cur.eat(&Token::RParen) {
                loop {
                    args.push(cur.operand()?);
                    if !cur.eat(&Token::Comma) {
                        break;
                    }
                }
                cur.expect(Token::RParen)?;
            }
            (InstrKind::Call { callee }, args)
        }
        "br" => {
            if cur.remaining() == 1 {
                let target = cur.block(scope)?;
                (InstrKind::Br { target }, vec![])
            } else {
                let condition = cur.operand()?;
                cur.expect(Token::Comma)?;
                let if_true = cur.block(scope)?;
                cur.expect(Token::Comma)?;
                let if_false = cur.block(scope)?;
                (InstrKind::CondBr { if_true, if_false }, vec![condition])
            }
        }
        "phi" => {
            let mut incoming = Vec::new();
            let mut operands = Vec::new();
            loop {
                cur.expect(Token::LBracket)?;
                operands.push(cur.operand()?);
                cur.expect(Token::Comma)?;
                incoming.push(cur.block(scope)?);
                cur.expect(Token::RBracket)?;
                if !cur.eat(&Token::Comma) {
                    break;
                }
            }
            (InstrKind::Phi { incoming }, operands)
        }
        "icmp" | "fcmp" => {
            let pred_name = cur.ident()?;
            let pred = CmpPred::from_mnemonic(pred_name)
                .ok_or_else(|| cur.error(format!("unknown predicate `{}`", pred_name)))?;
            let kind = if opcode == "icmp" {
                InstrKind::ICmp(pred)
            } else {
                InstrKind::FCmp(pred)
            };
            (kind, cur.operand_list()?)
        }
        other => {
            if let Some(op) = BinOp::from_mnemonic(other) {
                (InstrKind::Binary(op), cur.operand_list()?)
            } else if let Some(op) = CastOp::from_mnemonic(other) {
                (InstrKind::Cast(op), cur.operand_list()?)
            } else {
                return Err(cur.error(format!("unknown opcode `{}`", other)));
            }
        }
    };
    cur.finish()?;

    Ok(ParsedInstr {
        result,
        kind,
        operands,
    })
}

/// Token cursor over a single line.
struct Cursor<'a> {
    line: &'a Line,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(line: &'a Line) -> Self {
        Self { line, pos: 0 }
    }

    fn error(&self, msg: impl std::fmt::Display) -> anyhow::Error {
        anyhow!("line {}: {}", self.line.number, msg)
    }

    fn peek(&self) -> Option<&'a Token> {
        self.line.tokens.get(self.pos)
    }

    fn remaining(&self) -> usize {
        self.line.tokens.len().saturating_sub(self.pos)
    }

    fn next(&mut self) -> Result<&'a Token> {
        let tok = self
            .peek()
            .ok_or_else(|| self.error("unexpected end of line"))?;
        self.pos += 1;
        Ok(tok)
    }

    fn eat(&mut self, tok: &Token) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Token) -> Result<()> {
        match self.next()? {
            found if *found == tok => Ok(()),
            found => Err(self.error(format!("expected {}, found {}", tok, found))),
        }
    }

    fn finish(&self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(tok) => Err(self.error(format!("unexpected {}", tok))),
        }
    }

    fn ident(&mut self) -> Result<&'a str> {
        match self.next()? {
            Token::Ident(name) => Ok(name),
            other => Err(self.error(format!("expected a keyword, found {}", other))),
        }
    }

    fn symbol(&mut self) -> Result<&'a str> {
        match self.next()? {
            Token::Symbol(name) => Ok(name),
            other => Err(self.error(format!("expected `@name`, found {}", other))),
        }
    }

    fn count(&mut self) -> Result<u32> {
        match self.next()? {
            Token::Int(v) => u32::try_from(*v)
                .map_err(|_| self.error(format!("parameter count {} out of range", v))),
            other => Err(self.error(format!("expected a parameter count, found {}", other))),
        }
    }

    fn constant(&mut self) -> Result<Constant> {
        match self.next()? {
            Token::Int(v) => Ok(Constant::Int(*v)),
            Token::Float(v) => Ok(Constant::Float(*v)),
            other => Err(self.error(format!("expected a constant, found {}", other))),
        }
    }

    fn block(&mut self, scope: &Scope<'_>) -> Result<BlockId> {
        let name = self.ident()?;
        scope
            .labels
            .get(name)
            .copied()
            .ok_or_else(|| self.error(format!("unknown block `{}`", name)))
    }

    fn operand(&mut self) -> Result<RawOperand> {
        Ok(match self.next()? {
            Token::Local(name) => RawOperand::Local(name.clone()),
            Token::Symbol(name) => RawOperand::Global(name.clone()),
            Token::Arg(n) => RawOperand::Arg(*n),
            Token::Int(v) => RawOperand::Const(Constant::Int(*v)),
            Token::Float(v) => RawOperand::Const(Constant::Float(*v)),
            Token::Ident(word) if word == "undef" => RawOperand::Undef,
            Token::Ident(word) => match word.parse::<f64>() {
                // `inf` and `NaN` print as bare words.
                Ok(v) => RawOperand::Const(Constant::Float(v)),
                Err(_) => return Err(self.error(format!("expected an operand, found `{}`", word))),
            },
            other => return Err(self.error(format!("expected an operand, found {}", other))),
        })
    }

    /// Comma-separated operands up to the end of the line (possibly none).
    fn operand_list(&mut self) -> Result<Vec<RawOperand>> {
        let mut ops = Vec::new();
        if self.peek().is_none() {
            return Ok(ops);
        }
        loop {
            ops.push(self.operand()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(ops)
    }
}

//! IR type definitions.
//!
//! These types describe the values and instruction kinds of a small SSA-form
//! intermediate representation. Every value-producing instruction defines a
//! single value, named by its `InstrId`; operands refer to those values (or
//! to constants, globals and function arguments) through the tagged
//! [`Operand`] enum.

use std::fmt;

/// Handle of an instruction inside its function's instruction arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrId(pub u32);

impl fmt::Display for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Unique identifier for a basic block within a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// Unique identifier for a function within a module.
///
/// Stable across removal of other functions: call instructions keep
/// referring to the same callee even when the module's function list shrinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub u32);

/// Unique identifier for a global variable within a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalId(pub u32);

/// Constant value in the IR.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant {
    Int(i64),
    Float(f64),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "{}", v),
            // `{:?}` keeps the decimal point so the literal parses back as a float.
            Constant::Float(v) => write!(f, "{:?}", v),
        }
    }
}

/// A single operand slot of an instruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    /// Value defined by another instruction of the same function.
    Instr(InstrId),
    /// Literal constant.
    Const(Constant),
    /// Address of a module-level global variable.
    Global(GlobalId),
    /// N-th argument of the enclosing function.
    Arg(u32),
    /// Placeholder left behind when the defining instruction was erased
    /// together with an unreachable block.
    Undef,
}

impl Operand {
    /// Returns the referenced instruction, if this operand names one.
    pub fn as_instr(&self) -> Option<InstrId> {
        match self {
            Operand::Instr(id) => Some(*id),
            _ => None,
        }
    }

    pub fn int(value: i64) -> Self {
        Operand::Const(Constant::Int(value))
    }
}

impl From<InstrId> for Operand {
    fn from(id: InstrId) -> Self {
        Operand::Instr(id)
    }
}

/// Binary arithmetic and bitwise operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SRem,
    URem,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
    FAdd,
    FSub,
    FMul,
    FDiv,
}

impl BinOp {
    const ALL: [BinOp; 17] = [
        BinOp::Add,
        BinOp::Sub,
        BinOp::Mul,
        BinOp::SDiv,
        BinOp::UDiv,
        BinOp::SRem,
        BinOp::URem,
        BinOp::And,
        BinOp::Or,
        BinOp::Xor,
        BinOp::Shl,
        BinOp::LShr,
        BinOp::AShr,
        BinOp::FAdd,
        BinOp::FSub,
        BinOp::FMul,
        BinOp::FDiv,
    ];

    pub fn mnemonic(&self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::SDiv => "sdiv",
            BinOp::UDiv => "udiv",
            BinOp::SRem => "srem",
            BinOp::URem => "urem",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Xor => "xor",
            BinOp::Shl => "shl",
            BinOp::LShr => "lshr",
            BinOp::AShr => "ashr",
            BinOp::FAdd => "fadd",
            BinOp::FSub => "fsub",
            BinOp::FMul => "fmul",
            BinOp::FDiv => "fdiv",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.mnemonic() == s)
    }
}

/// Comparison predicates shared by `icmp` and `fcmp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpPred {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpPred {
    const ALL: [CmpPred; 6] = [
        CmpPred::Eq,
        CmpPred::Ne,
        CmpPred::Lt,
        CmpPred::Le,
        CmpPred::Gt,
        CmpPred::Ge,
    ];

    pub fn mnemonic(&self) -> &'static str {
        match self {
            CmpPred::Eq => "eq",
            CmpPred::Ne => "ne",
            CmpPred::Lt => "lt",
            CmpPred::Le => "le",
            CmpPred::Gt => "gt",
            CmpPred::Ge => "ge",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.mnemonic() == s)
    }
}

/// Value conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastOp {
    ZExt,
    SExt,
    Trunc,
    SiToFp,
    FpToSi,
}

impl CastOp {
    const ALL: [CastOp; 5] = [
        CastOp::ZExt,
        CastOp::SExt,
        CastOp::Trunc,
        CastOp::SiToFp,
        CastOp::FpToSi,
    ];

    pub fn mnemonic(&self) -> &'static str {
        match self {
            CastOp::ZExt => "zext",
            CastOp::SExt => "sext",
            CastOp::Trunc => "trunc",
            CastOp::SiToFp => "sitofp",
            CastOp::FpToSi => "fptosi",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.mnemonic() == s)
    }
}

/// What an instruction does.
///
/// Control-flow targets are part of the kind; the values an instruction
/// reads are stored separately in [`Instruction::operands`].
#[derive(Debug, Clone, PartialEq)]
pub enum InstrKind {
    /// Stack slot allocation (`%p = alloca`). No operands.
    Alloca,
    /// Memory read. Operands: `[ptr]`.
    Load,
    /// Memory write. Operands: `[value, ptr]`.
    Store,
    /// Direct call. Operands: the call arguments.
    Call { callee: FuncId },
    /// Return from function. Operands: `[]` or `[value]`.
    Ret,
    /// Unconditional branch.
    Br { target: BlockId },
    /// Conditional branch. Operands: `[condition]`.
    CondBr { if_true: BlockId, if_false: BlockId },
    /// SSA merge. `operands[i]` flows in from `incoming[i]`.
    Phi { incoming: Vec<BlockId> },
    /// Binary operation. Operands: `[lhs, rhs]`.
    Binary(BinOp),
    /// Integer comparison. Operands: `[lhs, rhs]`.
    ICmp(CmpPred),
    /// Floating-point comparison. Operands: `[lhs, rhs]`.
    FCmp(CmpPred),
    /// Conversion. Operands: `[value]`.
    Cast(CastOp),
    /// Address computation. Operands: `[base, index...]`.
    Gep,
}

impl InstrKind {
    pub fn is_store(&self) -> bool {
        matches!(self, InstrKind::Store)
    }

    pub fn is_load(&self) -> bool {
        matches!(self, InstrKind::Load)
    }

    pub fn is_call(&self) -> bool {
        matches!(self, InstrKind::Call { .. })
    }

    pub fn is_ret(&self) -> bool {
        matches!(self, InstrKind::Ret)
    }

    /// True for both conditional and unconditional branches.
    pub fn is_br(&self) -> bool {
        matches!(self, InstrKind::Br { .. } | InstrKind::CondBr { .. })
    }

    pub fn is_phi(&self) -> bool {
        matches!(self, InstrKind::Phi { .. })
    }

    pub fn is_alloca(&self) -> bool {
        matches!(self, InstrKind::Alloca)
    }

    /// Whether the instruction defines a value other instructions can use.
    pub fn has_result(&self) -> bool {
        !matches!(
            self,
            InstrKind::Store | InstrKind::Ret | InstrKind::Br { .. } | InstrKind::CondBr { .. }
        )
    }

    /// Returns the blocks this instruction can transfer control to.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            InstrKind::Br { target } => vec![*target],
            InstrKind::CondBr { if_true, if_false } => vec![*if_true, *if_false],
            _ => vec![],
        }
    }

    /// Textual opcode, including the predicate for comparisons.
    pub fn mnemonic(&self) -> String {
        match self {
            InstrKind::Alloca => "alloca".to_string(),
            InstrKind::Load => "load".to_string(),
            InstrKind::Store => "store".to_string(),
            InstrKind::Call { .. } => "call".to_string(),
            InstrKind::Ret => "ret".to_string(),
            InstrKind::Br { .. } | InstrKind::CondBr { .. } => "br".to_string(),
            InstrKind::Phi { .. } => "phi".to_string(),
            InstrKind::Binary(op) => op.mnemonic().to_string(),
            InstrKind::ICmp(pred) => format!("icmp {}", pred.mnemonic()),
            InstrKind::FCmp(pred) => format!("fcmp {}", pred.mnemonic()),
            InstrKind::Cast(op) => op.mnemonic().to_string(),
            InstrKind::Gep => "gep".to_string(),
        }
    }
}

/// A single IR instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub kind: InstrKind,
    pub operands: Vec<Operand>,
    /// Block that owns this instruction.
    pub parent: BlockId,
}

impl Instruction {
    /// Iterates over the instructions this one reads, in operand order.
    /// An instruction named twice is yielded twice.
    pub fn instr_operands(&self) -> impl Iterator<Item = InstrId> + '_ {
        self.operands.iter().filter_map(Operand::as_instr)
    }
}

/// A basic block: an ordered list of instruction handles.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    pub id: BlockId,
    pub(crate) instructions: Vec<InstrId>,
}

impl BasicBlock {
    pub(crate) fn new(id: BlockId) -> Self {
        Self {
            id,
            instructions: Vec::new(),
        }
    }

    /// Instructions of this block in program order.
    pub fn instructions(&self) -> &[InstrId] {
        &self.instructions
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Module-level global variable.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVariable {
    pub id: GlobalId,
    pub name: String,
    pub init: Option<Constant>,
}

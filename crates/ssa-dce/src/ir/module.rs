//! Module: the owner of all functions and global variables.

use super::function::Function;
use super::types::{Constant, FuncId, GlobalId, GlobalVariable, InstrId, InstrKind, Operand};
use anyhow::{bail, Result};
use std::collections::{BTreeSet, HashMap};

/// A whole program: ordered functions and ordered global variables.
///
/// Function and global names share one namespace and are unique.
#[derive(Debug, Clone, Default)]
pub struct Module {
    functions: Vec<Function>,
    globals: Vec<GlobalVariable>,
    next_func: u32,
    next_global: u32,
}

/// A reference to an instruction from somewhere in the module.
pub type InstrRef = (FuncId, InstrId);

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an empty function (a declaration until blocks are added).
    pub fn add_function(&mut self, name: impl Into<String>, num_params: u32) -> Result<FuncId> {
        let name = name.into();
        self.check_fresh_name(&name)?;
        let id = FuncId(self.next_func);
        self.next_func += 1;
        self.functions.push(Function::new(id, name, num_params));
        Ok(id)
    }

    pub fn add_global(&mut self, name: impl Into<String>, init: Option<Constant>) -> Result<GlobalId> {
        let name = name.into();
        self.check_fresh_name(&name)?;
        let id = GlobalId(self.next_global);
        self.next_global += 1;
        self.globals.push(GlobalVariable { id, name, init });
        Ok(id)
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn functions_mut(&mut self) -> &mut [Function] {
        &mut self.functions
    }

    pub fn function(&self, id: FuncId) -> Option<&Function> {
        self.functions.iter().find(|f| f.id == id)
    }

    pub fn function_mut(&mut self, id: FuncId) -> Option<&mut Function> {
        self.functions.iter_mut().find(|f| f.id == id)
    }

    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn globals(&self) -> &[GlobalVariable] {
        &self.globals
    }

    pub fn global(&self, id: GlobalId) -> Option<&GlobalVariable> {
        self.globals.iter().find(|g| g.id == id)
    }

    pub fn global_by_name(&self, name: &str) -> Option<&GlobalVariable> {
        self.globals.iter().find(|g| g.name == name)
    }

    /// Use-list of every function: the call instructions naming it.
    /// Every function has an entry, possibly empty.
    pub fn call_sites(&self) -> HashMap<FuncId, Vec<InstrRef>> {
        let mut sites: HashMap<FuncId, Vec<InstrRef>> =
            self.functions.iter().map(|f| (f.id, Vec::new())).collect();
        for func in &self.functions {
            for (id, instr) in func.instructions() {
                if let InstrKind::Call { callee } = instr.kind {
                    sites.entry(callee).or_default().push((func.id, id));
                }
            }
        }
        sites
    }

    /// Use-list of every global: the instructions that read its address.
    /// Every global has an entry, possibly empty.
    pub fn global_users(&self) -> HashMap<GlobalId, Vec<InstrRef>> {
        let mut users: HashMap<GlobalId, Vec<InstrRef>> =
            self.globals.iter().map(|g| (g.id, Vec::new())).collect();
        for func in &self.functions {
            for (id, instr) in func.instructions() {
                for op in &instr.operands {
                    if let Operand::Global(g) = op {
                        users.entry(*g).or_default().push((func.id, id));
                    }
                }
            }
        }
        users
    }

    /// Removes functions by id. Returns the number removed.
    pub fn remove_functions(&mut self, ids: &BTreeSet<FuncId>) -> usize {
        let before = self.functions.len();
        self.functions.retain(|f| !ids.contains(&f.id));
        before - self.functions.len()
    }

    /// Removes globals by id. Returns the number removed.
    pub fn remove_globals(&mut self, ids: &BTreeSet<GlobalId>) -> usize {
        let before = self.globals.len();
        self.globals.retain(|g| !ids.contains(&g.id));
        before - self.globals.len()
    }

    /// Checks structural well-formedness: every defined function has its
    /// entry block, every instruction has the operand shape its kind
    /// requires, and every block/function/global/argument reference
    /// resolves.
    pub fn validate(&self) -> Result<()> {
        for func in &self.functions {
            self.validate_function(func)?;
        }
        Ok(())
    }

    fn validate_function(&self, func: &Function) -> Result<()> {
        if func.is_declaration() {
            return Ok(());
        }
        if func.block(func.entry_block()).is_none() {
            bail!("function @{}: entry block {} is missing", func.name, func.entry_block());
        }

        for block in func.blocks() {
            for &id in block.instructions() {
                let Some(instr) = func.instr(id) else {
                    bail!("function @{}: {} lists erased instruction {}", func.name, block.id, id);
                };
                if instr.parent != block.id {
                    bail!(
                        "function @{}: {} sits in {} but names {} as parent",
                        func.name,
                        id,
                        block.id,
                        instr.parent
                    );
                }

                let arity_ok = match &instr.kind {
                    InstrKind::Alloca | InstrKind::Br { .. } => instr.operands.is_empty(),
                    InstrKind::Load | InstrKind::Cast(_) | InstrKind::CondBr { .. } => {
                        instr.operands.len() == 1
                    }
                    InstrKind::Store
                    | InstrKind::Binary(_)
                    | InstrKind::ICmp(_)
                    | InstrKind::FCmp(_) => instr.operands.len() == 2,
                    InstrKind::Ret => instr.operands.len() <= 1,
                    InstrKind::Gep => !instr.operands.is_empty(),
                    InstrKind::Phi { incoming } => {
                        !incoming.is_empty() && incoming.len() == instr.operands.len()
                    }
                    InstrKind::Call { .. } => true,
                };
                if !arity_ok {
                    bail!(
                        "function @{}: `{}` at {} has {} operands",
                        func.name,
                        instr.kind.mnemonic(),
                        id,
                        instr.operands.len()
                    );
                }

                match &instr.kind {
                    InstrKind::Call { callee } => {
                        let Some(target) = self.function(*callee) else {
                            bail!("function @{}: {} calls unknown function", func.name, id);
                        };
                        if target.num_params as usize != instr.operands.len() {
                            bail!(
                                "function @{}: call to @{} passes {} arguments, expected {}",
                                func.name,
                                target.name,
                                instr.operands.len(),
                                target.num_params
                            );
                        }
                    }
                    InstrKind::Br { .. } | InstrKind::CondBr { .. } | InstrKind::Phi { .. } => {
                        let targets = match &instr.kind {
                            InstrKind::Phi { incoming } => incoming.clone(),
                            kind => kind.successors(),
                        };
                        for target in targets {
                            if func.block(target).is_none() {
                                bail!("function @{}: {} names unknown block {}", func.name, id, target);
                            }
                        }
                    }
                    _ => {}
                }

                for op in &instr.operands {
                    match op {
                        Operand::Instr(dep) if !func.contains_instr(*dep) => {
                            bail!("function @{}: {} reads unknown value {}", func.name, id, dep);
                        }
                        Operand::Global(g) if self.global(*g).is_none() => {
                            bail!("function @{}: {} reads unknown global", func.name, id);
                        }
                        Operand::Arg(n) if *n >= func.num_params => {
                            bail!(
                                "function @{}: {} reads argument ${} of {}",
                                func.name,
                                id,
                                n,
                                func.num_params
                            );
                        }
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }

    fn check_fresh_name(&self, name: &str) -> Result<()> {
        if self.function_by_name(name).is_some() || self.global_by_name(name).is_some() {
            bail!("symbol @{} is already defined", name);
        }
        Ok(())
    }
}

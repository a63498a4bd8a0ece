//! The intermediate representation: typed values in a module-wide pool,
//! instructions grouped into basic blocks, blocks grouped into functions.
//! Functions own a block arena plus a live-order list; removing a block
//! from the order detaches it without freeing the arena slot, so stale
//! cross-references stay resolvable until the module is dropped.

use hashbrown::HashMap;

use crate::index::{index_type, IndexVec};

pub mod ast_lowering;
pub mod inst;
pub mod pool;
pub mod pretty_print;
pub mod ty;
pub mod value;
pub mod visit;

use inst::Inst;
use pool::{ValuePool, BUILTINS};
use ty::{ClassId, ClassLayout, Ty};
use value::{NonLiteralKind, ValueId};

index_type! {
    /// Identifies a block in its function's arena.
    pub struct BlockId;
}

index_type! {
    /// Identifies a function in the module.
    pub struct FuncId;
}

/// A basic block: phi nodes, body statements, exactly one terminator, plus
/// the CFG and dominance annotations the analysis passes maintain.
#[derive(Debug)]
pub struct Block {
    /// Label name, unique within the function.
    pub name: String,
    pub phis: Vec<Inst>,
    pub body: Vec<Inst>,
    pub term: Inst,

    pub prev: Vec<BlockId>,
    pub next: Vec<BlockId>,

    /// Immediate dominator; entry points at itself.
    pub idom: Option<BlockId>,
    /// Strict dominators, nearest first.
    pub dom: Vec<BlockId>,
    /// Dominance frontier.
    pub fro: Vec<BlockId>,
}

impl Block {
    pub fn new(name: String) -> Self {
        Self {
            name,
            phis: Vec::new(),
            body: Vec::new(),
            // Blocks start unterminated; lowering overwrites this before
            // the function is finished.
            term: Inst::Unreachable,
            prev: Vec::new(),
            next: Vec::new(),
            idom: None,
            dom: Vec::new(),
            fro: Vec::new(),
        }
    }

    pub fn push_phi(&mut self, phi: Inst) {
        debug_assert!(phi.is_phi());
        self.phis.push(phi);
    }

    pub fn push_back(&mut self, inst: Inst) {
        debug_assert!(!inst.is_phi() && !inst.is_terminator());
        self.body.push(inst);
    }

    pub fn set_term(&mut self, term: Inst) {
        debug_assert!(term.is_terminator());
        self.term = term;
    }

    pub fn is_terminated(&self) -> bool {
        !matches!(self.term, Inst::Unreachable)
    }

    /// A block is unreachable if control cannot arrive: its terminator is
    /// `unreachable`, or it has no predecessors and is not the entry.
    pub fn is_unreachable(&self, is_entry: bool) -> bool {
        matches!(self.term, Inst::Unreachable) || (!is_entry && self.prev.is_empty())
    }

    /// Phis, body and terminator, in that order.
    pub fn insts(&self) -> impl Iterator<Item = &Inst> {
        self.phis
            .iter()
            .chain(self.body.iter())
            .chain(std::iter::once(&self.term))
    }
}

/// Analysis state carried per function.
#[derive(Debug, Default, Clone, Copy)]
pub struct FunctionFlags {
    pub is_builtin: bool,
    pub has_input: bool,
    pub has_output: bool,
    pub has_rpo: bool,
    pub has_cfg: bool,
    pub has_dom: bool,
    pub has_fro: bool,
    pub is_post: bool,
}

#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub ret: Ty,
    /// Argument values (kind `Arg`), in signature order.
    pub args: Vec<ValueId>,
    /// Stack cells reserved by `alloca`, including argument shadow cells.
    pub locals: Vec<ValueId>,

    /// Block arena. Detached blocks keep their slot.
    pub blocks: IndexVec<BlockId, Block>,
    /// Live blocks, entry first; insertion order from lowering.
    pub order: Vec<BlockId>,

    pub rpo: Vec<BlockId>,
    pub flags: FunctionFlags,

    loop_count: usize,
    cond_count: usize,
    name_count: HashMap<String, usize>,
}

impl Function {
    pub fn new(name: String, ret: Ty) -> Self {
        Self {
            name,
            ret,
            args: Vec::new(),
            locals: Vec::new(),
            blocks: IndexVec::new(),
            order: Vec::new(),
            rpo: Vec::new(),
            flags: FunctionFlags::default(),
            loop_count: 0,
            cond_count: 0,
            name_count: HashMap::new(),
        }
    }

    pub fn entry(&self) -> BlockId {
        self.order[0]
    }

    /// Allocates a block in the arena without attaching it to the order.
    pub fn create_block(&mut self, name: String) -> BlockId {
        self.blocks.push(Block::new(name))
    }

    /// Allocates a block and appends it to the live order.
    pub fn push_block(&mut self, name: String) -> BlockId {
        let id = self.create_block(name);
        self.order.push(id);
        id
    }

    /// Registers a textual name, returning `base.k` with a per-base counter
    /// so every non-literal in the function stays unique.
    pub fn register_name(&mut self, base: &str) -> String {
        let count = self.name_count.entry(base.to_string()).or_insert(0);
        let name = format!("{base}.{count}");
        *count += 1;
        name
    }

    /// Allocates a fresh temporary named after `hint`.
    pub fn create_temporary(&mut self, pool: &mut ValuePool, ty: Ty, hint: &str) -> ValueId {
        let name = self.register_name(hint);
        pool.non_literal(name, ty, NonLiteralKind::Temp)
    }

    pub fn next_cond_label(&mut self) -> usize {
        let n = self.cond_count;
        self.cond_count += 1;
        n
    }

    pub fn next_loop_label(&mut self) -> usize {
        let n = self.loop_count;
        self.loop_count += 1;
        n
    }

    /// A function is unreachable once its entry has been poisoned.
    pub fn is_unreachable(&self) -> bool {
        self.order.is_empty() || self.blocks[self.entry()].is_unreachable(true)
    }
}

#[derive(Debug)]
pub struct Module {
    pub pool: ValuePool,
    pub classes: IndexVec<ClassId, ClassLayout>,
    /// Global variables in declaration order (string globals live in the
    /// pool's own table).
    pub globals: Vec<ValueId>,
    pub functions: IndexVec<FuncId, Function>,
    builtin_ids: HashMap<&'static str, FuncId>,
}

impl Module {
    /// An empty module with the builtin table materialized.
    pub fn new() -> Self {
        let mut functions = IndexVec::new();
        let mut builtin_ids = HashMap::new();
        let mut pool = ValuePool::new();

        for builtin in BUILTINS.iter() {
            let mut function = Function::new(builtin.name.to_string(), builtin.ret);
            function.flags.is_builtin = true;
            function.flags.has_input = builtin.has_input;
            function.flags.has_output = builtin.has_output;
            for (i, &ty) in builtin.args.iter().enumerate() {
                let arg = pool.non_literal(format!("arg.{i}"), ty, NonLiteralKind::Arg);
                function.args.push(arg);
            }
            builtin_ids.insert(builtin.name, functions.push(function));
        }

        Self {
            pool,
            classes: IndexVec::new(),
            globals: Vec::new(),
            functions,
            builtin_ids,
        }
    }

    pub fn builtin(&self, name: &str) -> FuncId {
        match self.builtin_ids.get(name) {
            Some(&id) => id,
            None => panic!("internal error: unknown builtin function {name}"),
        }
    }

    pub fn class_by_name(&self, name: &str) -> Option<ClassId> {
        self.classes
            .enumerate()
            .find(|(_, c)| c.name == name)
            .map(|(id, _)| id)
    }
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

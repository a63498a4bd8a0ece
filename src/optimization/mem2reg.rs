//! Promotion of `alloca` cells to SSA values: phi placement over the
//! iterated dominance frontier of each cell's store blocks, then a rename
//! walk of the dominator tree. Mx has no address-of operator, so every
//! local and argument cell is promotable. Loads with no dominating store
//! produce `undef` values.

use hashbrown::{HashMap, HashSet};

use crate::ir::inst::{Inst, PhiEntry};
use crate::ir::pool::ValuePool;
use crate::ir::value::ValueId;
use crate::ir::{BlockId, Function};
use crate::optimization::cfg::build_cfg;
use crate::optimization::dominance::build_dominance;

pub fn promote(function: &mut Function, pool: &mut ValuePool) {
    if function.is_unreachable() {
        return;
    }
    if !function.flags.has_cfg {
        build_cfg(function);
    }
    if !function.flags.has_dom || !function.flags.has_fro || function.flags.is_post {
        build_dominance(function, false);
    }

    let cells: HashSet<ValueId> = function.locals.iter().copied().collect();
    if cells.is_empty() {
        return;
    }

    // Store sites per cell.
    let mut defs: HashMap<ValueId, Vec<BlockId>> = HashMap::new();
    for &id in &function.order {
        for inst in &function.blocks[id].body {
            if let Inst::Store { addr, .. } = inst {
                if cells.contains(addr) {
                    defs.entry(*addr).or_default().push(id);
                }
            }
        }
    }

    // Phi placement at the iterated dominance frontier. Cells are walked
    // in declaration order so temporary numbering stays deterministic.
    let cell_order = function.locals.clone();
    let mut phi_cell: HashMap<ValueId, ValueId> = HashMap::new();
    for &cell in &cell_order {
        let def_blocks = match defs.get(&cell) {
            Some(blocks) => blocks.clone(),
            None => continue,
        };
        let value_ty = pool.pointee_ty(cell);
        let hint = cell_hint(pool, cell);
        let mut has_phi: HashSet<BlockId> = HashSet::new();
        let mut worklist = def_blocks.clone();
        let mut ever_on_list: HashSet<BlockId> = worklist.iter().copied().collect();
        while let Some(block) = worklist.pop() {
            for join in function.blocks[block].fro.clone() {
                if !has_phi.insert(join) {
                    continue;
                }
                let dest = function.create_temporary(pool, value_ty, &hint);
                phi_cell.insert(dest, cell);
                function.blocks[join].push_phi(Inst::Phi {
                    dest,
                    entries: Vec::new(),
                });
                if ever_on_list.insert(join) {
                    worklist.push(join);
                }
            }
        }
    }

    // Rename along the dominator tree.
    let mut children: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
    for &id in &function.order {
        if let Some(idom) = function.blocks[id].idom {
            if idom != id {
                children.entry(idom).or_default().push(id);
            }
        }
    }

    let mut renamer = Renamer {
        function,
        pool,
        cells: &cells,
        phi_cell: &phi_cell,
        children: &children,
        stacks: HashMap::new(),
        rewrites: HashMap::new(),
    };
    let entry = renamer.function.entry();
    renamer.rename(entry);

    function.locals.retain(|cell| !cells.contains(cell));
}

/// Readable phi name for a cell: the variable's source name, without the
/// `.addr.N` suffix the lowering appended.
fn cell_hint(pool: &ValuePool, cell: ValueId) -> String {
    let text = pool.text(cell);
    let name = text.trim_start_matches('%');
    match name.find(".addr") {
        Some(at) => name[..at].to_string(),
        None => name.to_string(),
    }
}

struct Renamer<'a> {
    function: &'a mut Function,
    pool: &'a mut ValuePool,
    cells: &'a HashSet<ValueId>,
    phi_cell: &'a HashMap<ValueId, ValueId>,
    children: &'a HashMap<BlockId, Vec<BlockId>>,
    /// Reaching definition per cell, innermost last.
    stacks: HashMap<ValueId, Vec<ValueId>>,
    /// Deleted load destination -> the value that replaces it.
    rewrites: HashMap<ValueId, ValueId>,
}

impl Renamer<'_> {
    fn resolve(&self, mut value: ValueId) -> ValueId {
        while let Some(&next) = self.rewrites.get(&value) {
            value = next;
        }
        value
    }

    fn reaching(&mut self, cell: ValueId) -> ValueId {
        match self.stacks.get(&cell).and_then(|s| s.last()) {
            Some(&value) => value,
            None => {
                let ty = self.pool.pointee_ty(cell);
                self.pool.undefined(ty)
            }
        }
    }

    fn rename(&mut self, block: BlockId) {
        let mut pushed: Vec<ValueId> = Vec::new();

        // Placed phis define their cell on entry to the block.
        let phi_defs: Vec<(ValueId, ValueId)> = self.function.blocks[block]
            .phis
            .iter()
            .filter_map(|phi| {
                let dest = phi.get_def().expect("phi always defines a temporary");
                self.phi_cell.get(&dest).map(|&cell| (cell, dest))
            })
            .collect();
        for (cell, dest) in phi_defs {
            self.stacks.entry(cell).or_default().push(dest);
            pushed.push(cell);
        }

        let body = std::mem::take(&mut self.function.blocks[block].body);
        let mut kept = Vec::with_capacity(body.len());
        for mut inst in body {
            match inst {
                Inst::Alloca { dest } if self.cells.contains(&dest) => {}
                Inst::Store { addr, src } if self.cells.contains(&addr) => {
                    let value = self.resolve(src);
                    self.stacks.entry(addr).or_default().push(value);
                    pushed.push(addr);
                }
                Inst::Load { dest, addr } if self.cells.contains(&addr) => {
                    let value = self.reaching(addr);
                    self.rewrites.insert(dest, value);
                }
                _ => {
                    for used in inst.get_use() {
                        let resolved = self.resolve(used);
                        if resolved != used {
                            inst.update(used, resolved);
                        }
                    }
                    kept.push(inst);
                }
            }
        }
        self.function.blocks[block].body = kept;

        let mut term = self.function.blocks[block].term.clone();
        for used in term.get_use() {
            let resolved = self.resolve(used);
            if resolved != used {
                term.update(used, resolved);
            }
        }
        self.function.blocks[block].term = term;

        // Feed successors' phis: append entries for placed phis, resolve
        // the entry values of pre-existing ones.
        for succ in self.function.blocks[block].next.clone() {
            let phis = std::mem::take(&mut self.function.blocks[succ].phis);
            let mut updated = phis;
            for phi in &mut updated {
                let Inst::Phi { dest, entries } = phi else {
                    unreachable!("phi list holds only phi nodes");
                };
                if let Some(&cell) = self.phi_cell.get(dest) {
                    if !entries.iter().any(|e| e.from == block) {
                        let value = self.reaching(cell);
                        entries.push(PhiEntry { from: block, value });
                    }
                } else {
                    for entry in entries.iter_mut().filter(|e| e.from == block) {
                        entry.value = self.resolve(entry.value);
                    }
                }
            }
            self.function.blocks[succ].phis = updated;
        }

        for child in self.children.get(&block).cloned().unwrap_or_default() {
            self.rename(child);
        }

        for cell in pushed.into_iter().rev() {
            self.stacks
                .get_mut(&cell)
                .expect("internal error: unbalanced rename stack")
                .pop();
        }
    }
}

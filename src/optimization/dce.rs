//! Dead-code elimination: mark-and-sweep over the instructions of every
//! function. Seeds are stores, calls to side-effective functions, and the
//! uses of terminators; everything a seed transitively uses stays, the
//! rest is swept. Side effects are computed bottom-up over the call graph
//! first, with recursion defaulting to the conservative answer.

use hashbrown::{HashMap, HashSet};

use crate::index::IndexVec;
use crate::ir::inst::Inst;
use crate::ir::value::ValueId;
use crate::ir::{BlockId, FuncId, Function, Module};

pub fn eliminate_dead_code(module: &mut Module) {
    let effects = side_effect_map(module);
    for function in module.functions.iter_mut() {
        if function.flags.is_builtin || function.is_unreachable() {
            continue;
        }
        sweep_function(function, &effects);
    }
}

/// Whether each function stores, performs I/O, or reaches something that
/// does. Builtins are external and always count. The propagation runs to a
/// fixed point, so a call cycle stays pure only if every member is pure on
/// its own and calls nothing effective outside the cycle.
fn side_effect_map(module: &Module) -> IndexVec<FuncId, bool> {
    let mut effective = IndexVec::new();
    let mut callees: IndexVec<FuncId, Vec<FuncId>> = IndexVec::new();

    for function in module.functions.iter() {
        let mut local = function.flags.is_builtin;
        let mut called = Vec::new();
        for &id in &function.order {
            for inst in function.blocks[id].insts() {
                match inst {
                    Inst::Store { .. } => local = true,
                    Inst::Call { func, .. } => called.push(*func),
                    _ => {}
                }
            }
        }
        effective.push(local);
        callees.push(called);
    }

    let mut changed = true;
    while changed {
        changed = false;
        for id in module.functions.indices() {
            if effective[id] {
                continue;
            }
            if callees[id].iter().any(|&callee| effective[callee]) {
                effective[id] = true;
                changed = true;
            }
        }
    }

    effective
}

/// Position of an instruction inside its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot {
    Phi(usize),
    Body(usize),
}

fn sweep_function(function: &mut Function, effects: &IndexVec<FuncId, bool>) {
    // Where each temporary is defined.
    let mut def_site: HashMap<ValueId, (BlockId, Slot)> = HashMap::new();
    for &id in &function.order {
        let block = &function.blocks[id];
        for (i, phi) in block.phis.iter().enumerate() {
            if let Some(def) = phi.get_def() {
                def_site.insert(def, (id, Slot::Phi(i)));
            }
        }
        for (i, inst) in block.body.iter().enumerate() {
            if let Some(def) = inst.get_def() {
                def_site.insert(def, (id, Slot::Body(i)));
            } else if let Inst::Alloca { dest } = inst {
                // The cell is not an SSA temporary. The sweep does not
                // assume promotion already ran: a surviving load or store
                // of an unpromoted cell must keep the reservation alive.
                def_site.insert(*dest, (id, Slot::Body(i)));
            }
        }
    }

    let mut essential: HashSet<(BlockId, Slot)> = HashSet::new();
    let mut worklist: Vec<(BlockId, Slot)> = Vec::new();

    let require = |value: ValueId,
                       essential: &mut HashSet<(BlockId, Slot)>,
                       worklist: &mut Vec<(BlockId, Slot)>| {
        if let Some(&site) = def_site.get(&value) {
            if essential.insert(site) {
                worklist.push(site);
            }
        }
    };

    // Seed: stores, effective calls, and everything terminators read.
    for &id in &function.order {
        let block = &function.blocks[id];
        for (i, inst) in block.body.iter().enumerate() {
            let seed = match inst {
                Inst::Store { .. } => true,
                Inst::Call { func, .. } => effects[*func],
                _ => false,
            };
            if seed {
                let site = (id, Slot::Body(i));
                if essential.insert(site) {
                    worklist.push(site);
                }
            }
        }
        for used in block.term.get_use() {
            require(used, &mut essential, &mut worklist);
        }
    }

    while let Some((id, slot)) = worklist.pop() {
        let inst = match slot {
            Slot::Phi(i) => &function.blocks[id].phis[i],
            Slot::Body(i) => &function.blocks[id].body[i],
        };
        for used in inst.get_use() {
            require(used, &mut essential, &mut worklist);
        }
    }

    // Sweep. Removed instructions leave their temporaries as orphans; no
    // essential instruction uses them.
    for &id in &function.order.clone() {
        let block = &mut function.blocks[id];
        let mut phi_index = 0;
        block.phis.retain(|_| {
            let keep = essential.contains(&(id, Slot::Phi(phi_index)));
            phi_index += 1;
            keep
        });
        let mut body_index = 0;
        block.body.retain(|_| {
            let keep = essential.contains(&(id, Slot::Body(body_index)));
            body_index += 1;
            keep
        });
    }
}

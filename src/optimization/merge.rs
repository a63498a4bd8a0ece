//! Block merging: a block whose terminator is an unconditional jump to a
//! block with no other predecessor absorbs that block. Runs after the
//! unreachable remover, which is what leaves these single-entry jump
//! chains behind when it folds constant branches.

use crate::ir::inst::Inst;
use crate::ir::Function;
use crate::optimization::cfg::build_cfg;

pub fn merge_blocks(function: &mut Function) {
    if function.is_unreachable() {
        return;
    }
    if !function.flags.has_cfg {
        build_cfg(function);
    }

    let mut changed = true;
    while changed {
        changed = false;
        for &id in &function.order.clone() {
            if !function.order.contains(&id) {
                continue;
            }
            let Inst::Jump { dest } = &function.blocks[id].term else {
                continue;
            };
            let dest = *dest;
            if dest == function.entry()
                || function.blocks[dest].prev != [id]
                || !function.blocks[dest].phis.is_empty()
            {
                continue;
            }

            // Absorb the successor.
            let mut body = std::mem::take(&mut function.blocks[dest].body);
            let term = std::mem::replace(&mut function.blocks[dest].term, Inst::Unreachable);
            let succ_next = std::mem::take(&mut function.blocks[dest].next);
            function.blocks[id].body.append(&mut body);
            function.blocks[id].term = term;
            function.blocks[id].next = succ_next.clone();

            // Control now arrives from the absorbing block: patch the
            // grandchildren's predecessor lists and phi entries.
            for &succ in &succ_next {
                for prev in &mut function.blocks[succ].prev {
                    if *prev == dest {
                        *prev = id;
                    }
                }
                for phi in &mut function.blocks[succ].phis {
                    let Inst::Phi { entries, .. } = phi else {
                        unreachable!("phi list holds only phi nodes");
                    };
                    for entry in entries.iter_mut().filter(|e| e.from == dest) {
                        entry.from = id;
                    }
                }
            }

            function.order.retain(|&b| b != dest);
            changed = true;
        }
    }

    build_cfg(function);
    function.flags.has_rpo = false;
    function.flags.has_dom = false;
    function.flags.has_fro = false;
    function.rpo.clear();
}

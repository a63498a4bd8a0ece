//! CFG construction: recompute every live block's successor and
//! predecessor lists from terminators alone.

use crate::ir::Function;

/// Rebuilds `next`/`prev` for all live blocks. Successors follow the
/// terminator's target order (`branch` stores false at index 0); duplicate
/// edges collapse to a single predecessor entry. Dominator info survives
/// only when the edge set did not change.
pub fn build_cfg(function: &mut Function) {
    let mut changed = !function.flags.has_cfg;

    for &id in &function.order {
        let targets = function.blocks[id].term.targets().to_vec();
        if function.blocks[id].next != targets {
            changed = true;
        }
        function.blocks[id].next = targets;
    }

    let order = function.order.clone();
    for &id in &order {
        function.blocks[id].prev.clear();
    }
    for &id in &order {
        for succ in function.blocks[id].next.clone() {
            let prev = &mut function.blocks[succ].prev;
            if !prev.contains(&id) {
                prev.push(id);
            }
        }
    }

    function.flags.has_cfg = true;
    if changed {
        function.flags.has_rpo = false;
        function.flags.has_dom = false;
        function.flags.has_fro = false;
        function.rpo.clear();
    }
}

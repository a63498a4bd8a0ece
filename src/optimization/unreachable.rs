//! Unreachable-code removal: poison blocks that contain hard undefined
//! behavior, fold constant branches, drop every block the entry can no
//! longer reach, and repair the phis and branches that referenced the
//! dropped blocks. Idempotent on its own output.

use hashbrown::HashSet;

use crate::diagnostics::Diagnostics;
use crate::ir::inst::{BinaryOp, Inst};
use crate::ir::pool::ValuePool;
use crate::ir::{BlockId, Function};
use crate::optimization::cfg::build_cfg;

pub fn remove_unreachable(function: &mut Function, pool: &ValuePool, diag: &mut Diagnostics) {
    if function.is_unreachable() {
        return;
    }

    for &id in &function.order.clone() {
        mark_ub(function, id, pool, diag);
    }
    build_cfg(function);

    // Forward reachability from the entry. Blocks that cannot reach a
    // return survive as long as the entry reaches them: an infinite loop
    // is observable behavior.
    let mut reachable = HashSet::new();
    let mut stack = vec![function.entry()];
    reachable.insert(function.entry());
    while let Some(block) = stack.pop() {
        for &succ in &function.blocks[block].next {
            if reachable.insert(succ) {
                stack.push(succ);
            }
        }
    }

    // Detach dead blocks; their arena slots are reclaimed with the module.
    function.order.retain(|b| reachable.contains(b));

    // Surviving edges, read before any terminator is rewritten.
    let mut edges = HashSet::new();
    for &id in &function.order {
        for &succ in &function.blocks[id].next {
            if reachable.contains(&succ) {
                edges.insert((id, succ));
            }
        }
    }

    // Phi repair: drop entries arriving over deleted edges.
    for &id in &function.order.clone() {
        for phi in &mut function.blocks[id].phis {
            let Inst::Phi { entries, .. } = phi else {
                unreachable!("phi list holds only phi nodes");
            };
            entries.retain(|e| edges.contains(&(e.from, id)));
        }
    }

    // Branch repair. Jumps never need it: a reachable block's jump target
    // is itself reachable.
    for &id in &function.order.clone() {
        let Inst::Branch { targets, .. } = &function.blocks[id].term else {
            continue;
        };
        let targets = *targets;
        let replacement = if targets[0] == targets[1] {
            Some(targets[0])
        } else if !reachable.contains(&targets[0]) {
            Some(targets[1])
        } else if !reachable.contains(&targets[1]) {
            Some(targets[0])
        } else {
            None
        };
        if let Some(dest) = replacement {
            function.blocks[id].set_term(Inst::Jump { dest });
        }
    }

    build_cfg(function);

    function.flags.has_cfg = true;
    function.flags.has_rpo = false;
    function.flags.has_dom = false;
    function.flags.has_fro = false;
    function.rpo.clear();
}

/// Detects hard UB in a block's body and, on the first hit, replaces the
/// whole block with `unreachable`. Also folds branches whose condition is
/// undefined or constant.
fn mark_ub(function: &mut Function, id: BlockId, pool: &ValuePool, diag: &mut Diagnostics) {
    let criteria = |inst: &Inst| -> Option<&'static str> {
        match inst {
            Inst::Load { addr, .. } | Inst::Store { addr, .. } | Inst::Get { addr, .. } => {
                if *addr == pool.null() {
                    Some("null pointer dereference")
                } else if pool.get(*addr).is_undefined() {
                    Some("unknown memory access")
                } else {
                    None
                }
            }
            Inst::Binary {
                op: BinaryOp::Div | BinaryOp::Mod,
                rhs,
                ..
            } if *rhs == pool.zero => Some("division by zero"),
            Inst::Binary {
                op: BinaryOp::Shl | BinaryOp::Shr,
                rhs,
                ..
            } if pool.get(*rhs).as_int().is_some_and(|v| v < 0) => Some("shift by negative value"),
            _ => None,
        }
    };

    if let Some(message) = function.blocks[id].body.iter().find_map(criteria) {
        diag.warning(format!("Undefined behavior: {message}"));
        let block = &mut function.blocks[id];
        block.phis.clear();
        block.body.clear();
        block.term = Inst::Unreachable;
        return;
    }

    let branch = match &function.blocks[id].term {
        Inst::Branch { cond, targets } => Some((*cond, *targets)),
        _ => None,
    };
    if let Some((cond, targets)) = branch {
        if pool.get(cond).is_undefined() {
            let block = &mut function.blocks[id];
            block.phis.clear();
            block.body.clear();
            block.term = Inst::Unreachable;
        } else if let Some(value) = pool.get(cond).as_bool() {
            function.blocks[id].set_term(Inst::Jump {
                dest: targets[value as usize],
            });
        }
    }
}

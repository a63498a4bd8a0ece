//! Analysis and transformation passes over the IR. Passes run to
//! completion one after another; each declares which CFG/dominance
//! properties it needs and which it invalidates through the function's
//! flag bits.

pub mod cfg;
pub mod dce;
pub mod dominance;
pub mod mem2reg;
pub mod merge;
pub mod unreachable;

use crate::diagnostics::Diagnostics;
use crate::ir::Module;

/// The fixed middle-end pipeline: CFG, unreachable removal (with UB
/// poisoning), jump-chain merging, dominators, SSA promotion, then
/// module-wide DCE.
pub fn optimize_module(module: &mut Module, diag: &mut Diagnostics) {
    let ids: Vec<_> = module.functions.indices().collect();
    for id in ids {
        if module.functions[id].flags.is_builtin {
            continue;
        }
        let function = &mut module.functions[id];
        cfg::build_cfg(function);
        unreachable::remove_unreachable(function, &module.pool, diag);
        if function.is_unreachable() {
            continue;
        }
        merge::merge_blocks(function);
        dominance::build_dominance(function, false);
        mem2reg::promote(function, &mut module.pool);
    }
    dce::eliminate_dead_code(module);
}

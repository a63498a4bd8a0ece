//! Dominator and post-dominator trees with dominance frontiers, via the
//! Cooper-Harvey-Kennedy iteration over a reverse post-order. Post
//! dominance runs the same machinery backwards from a synthetic sink wired
//! to every `return` block and stripped again on exit.

use crate::index::Index;
use crate::ir::inst::Inst;
use crate::ir::{BlockId, Function};
use crate::optimization::cfg::build_cfg;

/// Builds `rpo`, `idom`, `dom` and `fro` for every block reachable from
/// the root (entry, or the synthetic sink when `post`). Unreachable blocks
/// keep an empty annotation set.
pub fn build_dominance(function: &mut Function, post: bool) {
    if !function.flags.has_cfg {
        build_cfg(function);
    }

    let dummy = post.then(|| {
        let dummy = function.create_block(".dummy".to_string());
        for &id in &function.order.clone() {
            if matches!(function.blocks[id].term, Inst::Return { .. }) {
                function.blocks[id].next.push(dummy);
                function.blocks[dummy].prev.push(id);
            }
        }
        dummy
    });

    let root = dummy.unwrap_or_else(|| function.entry());

    // Walk direction flips for post dominance.
    let succs = |f: &Function, b: BlockId| -> Vec<BlockId> {
        if post {
            f.blocks[b].prev.clone()
        } else {
            f.blocks[b].next.clone()
        }
    };
    let preds = |f: &Function, b: BlockId| -> Vec<BlockId> {
        if post {
            f.blocks[b].next.clone()
        } else {
            f.blocks[b].prev.clone()
        }
    };

    // Reverse post-order by iterative DFS.
    let block_count = function.blocks.len();
    let mut visited = vec![false; block_count];
    let mut postorder = Vec::new();
    let mut stack = vec![(root, 0usize)];
    visited[root.index()] = true;
    while let Some(&(block, next_child)) = stack.last() {
        let succ = succs(function, block);
        if next_child < succ.len() {
            stack.last_mut().expect("stack is non-empty").1 += 1;
            let child = succ[next_child];
            if !visited[child.index()] {
                visited[child.index()] = true;
                stack.push((child, 0));
            }
        } else {
            postorder.push(block);
            stack.pop();
        }
    }
    let rpo: Vec<BlockId> = postorder.into_iter().rev().collect();

    let mut rpo_number = vec![usize::MAX; block_count];
    for (i, &b) in rpo.iter().enumerate() {
        rpo_number[b.index()] = i;
    }

    // Cooper-Harvey-Kennedy iteration to a fixed point.
    let mut idom: Vec<Option<BlockId>> = vec![None; block_count];
    idom[root.index()] = Some(root);
    let mut changed = true;
    while changed {
        changed = false;
        for &block in rpo.iter().skip(1) {
            let mut new_idom: Option<BlockId> = None;
            for pred in preds(function, block) {
                if idom[pred.index()].is_none() {
                    continue;
                }
                new_idom = Some(match new_idom {
                    None => pred,
                    Some(current) => intersect(&idom, &rpo_number, current, pred),
                });
            }
            if let Some(new_idom) = new_idom {
                if idom[block.index()] != Some(new_idom) {
                    idom[block.index()] = Some(new_idom);
                    changed = true;
                }
            }
        }
    }

    // Strict dominator lists, nearest first.
    for &id in &function.order {
        function.blocks[id].dom.clear();
        function.blocks[id].fro.clear();
    }
    for &block in &rpo {
        let mut dom = Vec::new();
        let mut walk = block;
        while let Some(up) = idom[walk.index()] {
            if up == walk {
                break;
            }
            dom.push(up);
            walk = up;
        }
        function.blocks[block].dom = dom;
    }

    // Dominance frontier: walk each join predecessor up to the join's
    // immediate dominator.
    for &block in &rpo {
        let preds = preds(function, block);
        if preds.len() < 2 {
            continue;
        }
        let stop = idom[block.index()];
        for pred in preds {
            let mut runner = Some(pred);
            while let Some(at) = runner {
                if Some(at) == stop {
                    break;
                }
                let fro = &mut function.blocks[at].fro;
                if !fro.contains(&block) {
                    fro.push(block);
                }
                let up = idom[at.index()];
                if up == Some(at) {
                    break;
                }
                runner = up;
            }
        }
    }

    // Tear the synthetic sink back out.
    if let Some(dummy) = dummy {
        for &id in &function.order.clone() {
            let block = &mut function.blocks[id];
            block.next.retain(|&b| b != dummy);
            block.prev.retain(|&b| b != dummy);
            block.dom.retain(|&b| b != dummy);
            block.fro.retain(|&b| b != dummy);
        }
        for slot in idom.iter_mut() {
            if *slot == Some(dummy) {
                *slot = None;
            }
        }
    }

    for &id in &function.order {
        function.blocks[id].idom = idom[id.index()];
    }
    function.rpo = rpo.into_iter().filter(|&b| Some(b) != dummy).collect();

    function.flags.has_rpo = true;
    function.flags.has_dom = true;
    function.flags.has_fro = true;
    function.flags.is_post = post;
}

/// Clears every dominance annotation, for passes that invalidate them.
pub fn clear_dominance(function: &mut Function) {
    for &id in &function.order.clone() {
        let block = &mut function.blocks[id];
        block.idom = None;
        block.dom.clear();
        block.fro.clear();
    }
    function.rpo.clear();
    function.flags.has_rpo = false;
    function.flags.has_dom = false;
    function.flags.has_fro = false;
    function.flags.is_post = false;
}

/// Walks the two idom chains towards the root until they meet; the chain
/// that sits lower in the reverse post-order moves first.
fn intersect(
    idom: &[Option<BlockId>],
    rpo_number: &[usize],
    mut a: BlockId,
    mut b: BlockId,
) -> BlockId {
    while a != b {
        while rpo_number[a.index()] > rpo_number[b.index()] {
            a = idom[a.index()].expect("internal error: idom chain broke during intersect");
        }
        while rpo_number[b.index()] > rpo_number[a.index()] {
            b = idom[b.index()].expect("internal error: idom chain broke during intersect");
        }
    }
    a
}

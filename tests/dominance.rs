//! Dominator, post-dominator and dominance-frontier behavior over
//! hand-assembled control-flow graphs.

use mx_middle::ir::inst::Inst;
use mx_middle::ir::ty::Ty;
use mx_middle::ir::value::NonLiteralKind;
use mx_middle::ir::{BlockId, Function, Module};
use mx_middle::optimization::cfg::build_cfg;
use mx_middle::optimization::dominance::build_dominance;

/// entry -> (a | b) -> join, with a fresh boolean argument as condition.
fn diamond() -> (Module, Function, [BlockId; 4]) {
    let mut module = Module::new();
    let mut function = Function::new("f".to_string(), Ty::I32);
    let entry = function.push_block("entry".to_string());
    let a = function.push_block("a".to_string());
    let b = function.push_block("b".to_string());
    let join = function.push_block("join".to_string());

    let cond = module
        .pool
        .non_literal("c".to_string(), Ty::I1, NonLiteralKind::Arg);
    function.args.push(cond);
    function.blocks[entry].set_term(Inst::Branch {
        cond,
        targets: [b, a],
    });
    function.blocks[a].set_term(Inst::Jump { dest: join });
    function.blocks[b].set_term(Inst::Jump { dest: join });
    let zero = module.pool.zero;
    function.blocks[join].set_term(Inst::Return { value: Some(zero) });

    (module, function, [entry, a, b, join])
}

/// entry -> header; header -> (body -> header | exit).
fn single_loop() -> (Module, Function, [BlockId; 4]) {
    let mut module = Module::new();
    let mut function = Function::new("f".to_string(), Ty::I32);
    let entry = function.push_block("entry".to_string());
    let header = function.push_block("header".to_string());
    let body = function.push_block("body".to_string());
    let exit = function.push_block("exit".to_string());

    let cond = module
        .pool
        .non_literal("c".to_string(), Ty::I1, NonLiteralKind::Arg);
    function.args.push(cond);
    function.blocks[entry].set_term(Inst::Jump { dest: header });
    function.blocks[header].set_term(Inst::Branch {
        cond,
        targets: [exit, body],
    });
    function.blocks[body].set_term(Inst::Jump { dest: header });
    let zero = module.pool.zero;
    function.blocks[exit].set_term(Inst::Return { value: Some(zero) });

    (module, function, [entry, header, body, exit])
}

#[test]
fn cfg_agrees_with_terminators() {
    let (_, mut function, [entry, a, b, join]) = diamond();
    build_cfg(&mut function);

    assert_eq!(function.blocks[entry].next, [b, a]);
    assert_eq!(function.blocks[a].prev, [entry]);
    assert_eq!(function.blocks[join].prev, [a, b]);
    for &id in &function.order {
        for &succ in &function.blocks[id].next {
            assert!(function.blocks[id].term.targets().contains(&succ));
            assert!(function.blocks[succ].prev.contains(&id));
        }
        for &pred in &function.blocks[id].prev {
            assert!(function.blocks[pred].next.contains(&id));
        }
    }
    assert!(function.flags.has_cfg);
}

#[test]
fn diamond_dominators_and_frontiers() {
    let (_, mut function, [entry, a, b, join]) = diamond();
    build_dominance(&mut function, false);

    assert_eq!(function.blocks[entry].idom, Some(entry));
    assert_eq!(function.blocks[a].idom, Some(entry));
    assert_eq!(function.blocks[b].idom, Some(entry));
    assert_eq!(function.blocks[join].idom, Some(entry));

    assert_eq!(function.blocks[join].dom, [entry]);
    assert_eq!(function.blocks[a].fro, [join]);
    assert_eq!(function.blocks[b].fro, [join]);
    assert!(function.blocks[entry].fro.is_empty());

    assert!(function.flags.has_rpo && function.flags.has_dom && function.flags.has_fro);
    assert!(!function.flags.is_post);
    assert_eq!(function.rpo[0], entry);
    assert_eq!(function.rpo.len(), 4);
}

#[test]
fn loop_header_is_in_its_own_frontier() {
    let (_, mut function, [entry, header, body, _exit]) = single_loop();
    build_dominance(&mut function, false);

    assert_eq!(function.blocks[header].idom, Some(entry));
    assert_eq!(function.blocks[body].idom, Some(header));
    assert!(function.blocks[header].fro.contains(&header));
    assert!(function.blocks[body].fro.contains(&header));
}

#[test]
fn dominator_construction_is_idempotent() {
    let (_, mut function, _) = single_loop();
    build_dominance(&mut function, false);
    let snapshot: Vec<_> = function
        .order
        .iter()
        .map(|&b| {
            let block = &function.blocks[b];
            (block.idom, block.dom.clone(), block.fro.clone())
        })
        .collect();
    let rpo = function.rpo.clone();

    build_dominance(&mut function, false);
    let again: Vec<_> = function
        .order
        .iter()
        .map(|&b| {
            let block = &function.blocks[b];
            (block.idom, block.dom.clone(), block.fro.clone())
        })
        .collect();
    assert_eq!(snapshot, again);
    assert_eq!(rpo, function.rpo);
}

#[test]
fn post_dominators_run_from_the_returns() {
    let (_, mut function, [entry, a, b, join]) = diamond();
    build_dominance(&mut function, true);

    assert!(function.flags.is_post);
    // Everything funnels into the join before the synthetic sink.
    assert_eq!(function.blocks[entry].idom, Some(join));
    assert_eq!(function.blocks[a].idom, Some(join));
    assert_eq!(function.blocks[b].idom, Some(join));
    // The return block sat directly under the sink, which is stripped.
    assert_eq!(function.blocks[join].idom, None);
    // No trace of the sink remains in the CFG lists.
    for &id in &function.order {
        for &succ in &function.blocks[id].next {
            assert!(function.order.contains(&succ));
        }
    }
}

#[test]
fn unreachable_blocks_get_no_annotations() {
    let (module, mut function, [entry, ..]) = diamond();
    drop(module);
    let orphan = function.push_block("orphan".to_string());
    function.blocks[orphan].set_term(Inst::Jump { dest: entry });
    build_dominance(&mut function, false);

    assert_eq!(function.blocks[orphan].idom, None);
    assert!(function.blocks[orphan].dom.is_empty());
    assert!(!function.rpo.contains(&orphan));
}

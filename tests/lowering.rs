//! AST lowering and textual-form tests: golden output for small
//! functions, block naming, short-circuit shapes, interning, methods.

mod common;

use common::*;
use mx_middle::ast::{self, BinaryOp, Expr, ExprKind, Stmt, Type, VarSite};
use mx_middle::ir::ast_lowering::lower_to_ir;
use mx_middle::ir::inst::Inst;
use mx_middle::ir::pretty_print::module_text;

#[test]
fn trivial_return_prints_golden_text() {
    let source = module(vec![function(
        "main",
        Type::Int,
        vec![],
        vec![ret(int(42))],
    )]);
    let module = lower_to_ir(&source);
    assert_eq!(
        function_text(&module, "main"),
        "define i32 @main() {\n    ret i32 42\n}\n"
    );
}

#[test]
fn prelude_declares_builtins_once_per_line() {
    let source = module(vec![function("main", Type::Int, vec![], vec![ret(int(0))])]);
    let text = module_text(&lower_to_ir(&source));
    assert!(text.contains("declare void @print(ptr)"));
    assert!(text.contains("declare i32 @getInt()"));
    assert!(text.contains("declare ptr @__malloc(i32)"));
    assert!(text.starts_with("declare "));
}

#[test]
fn locals_lower_to_alloca_load_store() {
    let source = module(vec![function(
        "main",
        Type::Int,
        vec![],
        vec![
            decl("x", Type::Int, Some(int(7))),
            ret(local("x", Type::Int)),
        ],
    )]);
    let text = function_text(&lower_to_ir(&source), "main");
    assert!(text.contains("%x.addr.0 = alloca i32"));
    assert!(text.contains("store i32 7, ptr %x.addr.0"));
    assert!(text.contains("%x.0 = load i32, ptr %x.addr.0"));
    assert!(text.contains("ret i32 %x.0"));
}

#[test]
fn arguments_are_spilled_to_shadow_cells() {
    let source = module(vec![function(
        "id",
        Type::Int,
        vec![("n", Type::Int)],
        vec![ret(param("n", Type::Int))],
    )]);
    let text = function_text(&lower_to_ir(&source), "id");
    assert!(text.contains("define i32 @id(i32 %n) {"));
    assert!(text.contains("%n.addr.0 = alloca i32"));
    assert!(text.contains("store i32 %n, ptr %n.addr.0"));
}

#[test]
fn if_else_uses_cond_labels_and_false_first_encoding() {
    let source = module(vec![function(
        "main",
        Type::Int,
        vec![],
        vec![
            decl("a", Type::Int, Some(int(0))),
            Stmt::If {
                cond: compare(BinaryOp::Lt, local("a", Type::Int), int(10)),
                then: vec![Stmt::Expr(assign(local("a", Type::Int), int(1)))],
                otherwise: Some(vec![Stmt::Expr(assign(local("a", Type::Int), int(2)))]),
            },
            ret(local("a", Type::Int)),
        ],
    )]);
    let module = lower_to_ir(&source);
    let text = function_text(&module, "main");
    // The printed branch lists the true target first.
    assert!(text.contains("br i1 %cmp.0, label %cond.0.then, label %cond.0.else"));
    assert!(text.contains("cond.0.then:"));
    assert!(text.contains("cond.0.else:"));
    assert!(text.contains("cond.0.end:"));

    // Internally the false target sits at index 0.
    let function = module.functions.iter().find(|f| f.name == "main").unwrap();
    let entry = &function.blocks[function.entry()];
    let Inst::Branch { targets, .. } = &entry.term else {
        panic!("entry must end in a branch");
    };
    assert_eq!(function.blocks[targets[0]].name, "cond.0.else");
    assert_eq!(function.blocks[targets[1]].name, "cond.0.then");
}

#[test]
fn while_loop_uses_loop_labels() {
    let source = module(vec![function(
        "main",
        Type::Int,
        vec![],
        vec![
            decl("i", Type::Int, Some(int(0))),
            Stmt::While {
                cond: compare(BinaryOp::Lt, local("i", Type::Int), int(10)),
                body: vec![Stmt::Expr(assign(
                    local("i", Type::Int),
                    binary(BinaryOp::Add, Type::Int, local("i", Type::Int), int(1)),
                ))],
            },
            ret(local("i", Type::Int)),
        ],
    )]);
    let text = function_text(&lower_to_ir(&source), "main");
    assert!(text.contains("loop.0.cond:"));
    assert!(text.contains("loop.0.body:"));
    assert!(text.contains("loop.0.end:"));
    assert!(text.contains("br label %loop.0.cond"));
}

#[test]
fn short_circuit_and_produces_two_entry_phi() {
    let source = module(vec![function(
        "both",
        Type::Bool,
        vec![("a", Type::Bool), ("b", Type::Bool)],
        vec![ret(binary(
            BinaryOp::LogicAnd,
            Type::Bool,
            param("a", Type::Bool),
            param("b", Type::Bool),
        ))],
    )]);
    let module = lower_to_ir(&source);
    let text = function_text(&module, "both");
    assert!(text.contains("cond.0.then:"));
    assert!(text.contains("cond.0.end:"));
    assert!(text.contains("= phi i1 [ false, %entry ], [ %b.0, %cond.0.then ]"));
}

#[test]
fn break_and_continue_target_the_loop_frame() {
    let source = module(vec![function(
        "main",
        Type::Int,
        vec![],
        vec![
            Stmt::While {
                cond: boolean(true),
                body: vec![Stmt::Break],
            },
            ret(int(0)),
        ],
    )]);
    let text = function_text(&lower_to_ir(&source), "main");
    assert!(text.contains("br label %loop.0.end"));
}

#[test]
fn string_literals_are_interned_once() {
    let hello = || Expr {
        ty: Type::Str,
        kind: ExprKind::Str("hi".to_string()),
    };
    let source = module(vec![function(
        "main",
        Type::Int,
        vec![],
        vec![
            Stmt::Expr(call("print", Type::Void, vec![hello()])),
            Stmt::Expr(call("print", Type::Void, vec![hello()])),
            ret(int(0)),
        ],
    )]);
    let text = module_text(&lower_to_ir(&source));
    assert!(text.contains("@.str.0 = constant [3 x i8] c\"hi\\00\""));
    assert!(!text.contains("@.str.1"));
    assert!(text.contains("call void @print(ptr @.str.0)"));
}

#[test]
fn methods_take_an_implicit_receiver() {
    let source = ast::Module {
        classes: vec![ast::ClassDef {
            name: "Point".to_string(),
            fields: vec![
                ast::Field {
                    name: "x".to_string(),
                    ty: Type::Int,
                },
                ast::Field {
                    name: "y".to_string(),
                    ty: Type::Int,
                },
            ],
            methods: vec![ast::FunctionDef {
                name: "getY".to_string(),
                receiver: Some("Point".to_string()),
                ret: Type::Int,
                params: vec![],
                body: vec![ret(Expr {
                    ty: Type::Int,
                    kind: ExprKind::Member {
                        object: Box::new(Expr {
                            ty: Type::Class("Point".to_string()),
                            kind: ExprKind::This,
                        }),
                        field: "y".to_string(),
                    },
                })],
            }],
        }],
        globals: vec![],
        functions: vec![],
    };
    let module = lower_to_ir(&source);
    let text = function_text(&module, "Point.getY");
    assert!(text.contains("define i32 @Point.getY(ptr %this) {"));
    assert!(text.contains("getelementptr %Point, ptr %this.0, i32 0, i32 1"));
    assert!(module_text(&module).contains("%Point = type { i32, i32 }"));
}

#[test]
fn globals_print_with_initializer_or_external() {
    let source = ast::Module {
        classes: vec![],
        globals: vec![
            ast::GlobalVariable {
                name: "count".to_string(),
                ty: Type::Int,
                init: Some(ast::ConstInit::Int(3)),
            },
            ast::GlobalVariable {
                name: "flag".to_string(),
                ty: Type::Bool,
                init: None,
            },
        ],
        functions: vec![function(
            "main",
            Type::Int,
            vec![],
            vec![ret(var("count", Type::Int, VarSite::Global))],
        )],
    };
    let text = module_text(&lower_to_ir(&source));
    assert!(text.contains("@count = global i32 3"));
    assert!(text.contains("@flag = external global i1"));
    assert!(text.contains("load i32, ptr @count"));
}

#[test]
fn temporaries_number_in_allocation_order() {
    let source = module(vec![function(
        "main",
        Type::Int,
        vec![],
        vec![ret(binary(
            BinaryOp::Add,
            Type::Int,
            binary(BinaryOp::Add, Type::Int, int(1), int(2)),
            binary(BinaryOp::Add, Type::Int, int(3), int(4)),
        ))],
    )]);
    let text = function_text(&lower_to_ir(&source), "main");
    let first = text.find("%add.0 = add i32 1, 2").expect("first add");
    let second = text.find("%add.1 = add i32 3, 4").expect("second add");
    assert!(first < second);
    assert!(text.contains("%add.2 = add i32 %add.0, %add.1"));
}

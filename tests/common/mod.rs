//! Shared builders for checked-AST fragments and hand-assembled IR used
//! across the integration tests.
#![allow(dead_code)]

use mx_middle::ast::{
    BinaryOp, Expr, ExprKind, FunctionDef, Module, Param, Stmt, Type, VarSite,
};

pub fn int(value: i32) -> Expr {
    Expr {
        ty: Type::Int,
        kind: ExprKind::Int(value),
    }
}

pub fn boolean(value: bool) -> Expr {
    Expr {
        ty: Type::Bool,
        kind: ExprKind::Bool(value),
    }
}

pub fn null(ty: Type) -> Expr {
    Expr {
        ty,
        kind: ExprKind::Null,
    }
}

pub fn var(name: &str, ty: Type, site: VarSite) -> Expr {
    Expr {
        ty,
        kind: ExprKind::Var {
            name: name.to_string(),
            site,
        },
    }
}

pub fn local(name: &str, ty: Type) -> Expr {
    var(name, ty, VarSite::Local)
}

pub fn param(name: &str, ty: Type) -> Expr {
    var(name, ty, VarSite::Param)
}

pub fn binary(op: BinaryOp, ty: Type, lhs: Expr, rhs: Expr) -> Expr {
    Expr {
        ty,
        kind: ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
    }
}

pub fn compare(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    binary(op, Type::Bool, lhs, rhs)
}

pub fn assign(target: Expr, value: Expr) -> Expr {
    let ty = value.ty.clone();
    Expr {
        ty,
        kind: ExprKind::Assign {
            target: Box::new(target),
            value: Box::new(value),
        },
    }
}

pub fn call(callee: &str, ty: Type, args: Vec<Expr>) -> Expr {
    Expr {
        ty,
        kind: ExprKind::Call {
            callee: callee.to_string(),
            args,
        },
    }
}

pub fn index(ty: Type, array: Expr, idx: Expr) -> Expr {
    Expr {
        ty,
        kind: ExprKind::Index {
            array: Box::new(array),
            index: Box::new(idx),
        },
    }
}

pub fn decl(name: &str, ty: Type, init: Option<Expr>) -> Stmt {
    Stmt::Decl {
        name: name.to_string(),
        ty,
        init,
    }
}

pub fn ret(value: Expr) -> Stmt {
    Stmt::Return(Some(value))
}

pub fn function(name: &str, ret: Type, params: Vec<(&str, Type)>, body: Vec<Stmt>) -> FunctionDef {
    FunctionDef {
        name: name.to_string(),
        receiver: None,
        ret,
        params: params
            .into_iter()
            .map(|(name, ty)| Param {
                name: name.to_string(),
                ty,
            })
            .collect(),
        body,
    }
}

pub fn module(functions: Vec<FunctionDef>) -> Module {
    Module {
        classes: Vec::new(),
        globals: Vec::new(),
        functions,
    }
}

/// The printed text of one named function after the full pipeline, with
/// the module prelude stripped away.
pub fn optimized_function_text(source: &Module, name: &str) -> String {
    let mut diag = mx_middle::Diagnostics::new();
    let mut module = mx_middle::ir::ast_lowering::lower_to_ir(source);
    mx_middle::optimization::optimize_module(&mut module, &mut diag);
    function_text(&module, name)
}

pub fn function_text(module: &mx_middle::ir::Module, name: &str) -> String {
    let function = module
        .functions
        .iter()
        .find(|f| f.name == name)
        .expect("function not found");
    let mut out = String::new();
    mx_middle::ir::pretty_print::print_function(module, function, &mut out)
        .expect("printing cannot fail");
    out
}

//! Lowering from the checked AST to IR, one function at a time. Every
//! source variable starts as an `alloca`'d cell accessed through loads and
//! stores; SSA naming is deferred to the promotion pass once dominance
//! information exists. Block labels come from per-function counters
//! (`cond.N.*`, `loop.N.*`) so they stay unique under nesting.

use hashbrown::HashMap;

use crate::ast;
use crate::ir::inst::{BinaryOp, CompareOp, Inst, PhiEntry};
use crate::ir::ty::{ClassLayout, Ty};
use crate::ir::value::{NonLiteralKind, ValueId};
use crate::ir::{BlockId, FuncId, Function, Module};

pub fn lower_to_ir(source: &ast::Module) -> Module {
    let mut module = Module::new();

    // Class layouts first: names before members, so members may refer to
    // any class.
    for class in &source.classes {
        module.classes.push(ClassLayout {
            name: class.name.clone(),
            members: Vec::new(),
        });
    }
    for class in &source.classes {
        let id = module
            .class_by_name(&class.name)
            .expect("internal error: class vanished during lowering");
        let members = class
            .fields
            .iter()
            .map(|f| (f.name.clone(), ir_ty(&module, &f.ty)))
            .collect();
        module.classes[id].members = members;
    }

    let mut globals = HashMap::new();
    for global in &source.globals {
        let value_ty = ir_ty(&module, &global.ty);
        let init = global.init.as_ref().map(|init| match init {
            ast::ConstInit::Int(v) => module.pool.int(*v),
            ast::ConstInit::Bool(v) => module.pool.boolean(*v),
            ast::ConstInit::Null => module.pool.null(),
            ast::ConstInit::Str(s) => {
                let data = module.pool.string(s);
                module.pool.pointer_to(data)
            }
        });
        let cell = module.pool.non_literal(
            global.name.clone(),
            value_ty.pointer_to(),
            NonLiteralKind::Global {
                init,
                is_constant: false,
            },
        );
        module.globals.push(cell);
        globals.insert(global.name.clone(), cell);
    }

    // Signature prepass so calls can resolve forward references.
    let mut signatures = HashMap::new();
    let all_functions = source.functions.iter().map(|f| (None, f)).chain(
        source
            .classes
            .iter()
            .flat_map(|c| c.methods.iter().map(move |m| (Some(c.name.as_str()), m))),
    );
    for (receiver, def) in all_functions.clone() {
        let name = match receiver {
            Some(class) => format!("{class}.{}", def.name),
            None => def.name.clone(),
        };
        let ret = ir_ty(&module, &def.ret);
        let function = Function::new(name.clone(), ret);
        let id = module.functions.push(function);
        signatures.insert(name, (id, ret));
    }

    for (receiver, def) in all_functions {
        let name = match receiver {
            Some(class) => format!("{class}.{}", def.name),
            None => def.name.clone(),
        };
        let (id, _) = signatures[&name];
        lower_function(&mut module, &signatures, &globals, id, receiver, def);
    }

    module
}

fn ir_ty(module: &Module, ty: &ast::Type) -> Ty {
    match ty {
        ast::Type::Int => Ty::I32,
        ast::Type::Bool => Ty::I1,
        ast::Type::Str => Ty::STR,
        ast::Type::Void => Ty::VOID,
        ast::Type::Null => Ty::PTR,
        ast::Type::Class(name) => match module.class_by_name(name) {
            Some(id) => Ty::class(id),
            None => panic!("internal error: unresolved class {name}"),
        },
        ast::Type::Array(elem) => ir_ty(module, elem).pointer_to(),
    }
}

struct LoopFrame {
    /// `continue` target: the step block, or the condition for `while`.
    step: BlockId,
    /// `break` target.
    end: BlockId,
}

struct FunctionLowering<'a> {
    module: &'a mut Module,
    signatures: &'a HashMap<String, (FuncId, Ty)>,
    globals: &'a HashMap<String, ValueId>,
    func: Function,
    current: BlockId,
    /// Scope stack of variable cells; innermost last.
    scopes: Vec<HashMap<String, ValueId>>,
    loops: Vec<LoopFrame>,
    this_cell: Option<ValueId>,
}

fn lower_function(
    module: &mut Module,
    signatures: &HashMap<String, (FuncId, Ty)>,
    globals: &HashMap<String, ValueId>,
    id: FuncId,
    receiver: Option<&str>,
    def: &ast::FunctionDef,
) {
    let placeholder = Function::new(String::new(), Ty::VOID);
    let mut func = std::mem::replace(&mut module.functions[id], placeholder);
    let entry = func.push_block("entry".to_string());

    let mut lowering = FunctionLowering {
        module,
        signatures,
        globals,
        func,
        current: entry,
        scopes: vec![HashMap::new()],
        loops: Vec::new(),
        this_cell: None,
    };

    // Arguments become memory-backed cells until promotion: each gets a
    // shadow alloca in the entry block seeded with the incoming value.
    if let Some(class) = receiver {
        let class_id = lowering
            .module
            .class_by_name(class)
            .expect("internal error: method on unknown class");
        let this = lowering
            .module
            .pool
            .non_literal("this".to_string(), Ty::class(class_id), NonLiteralKind::Arg);
        lowering.func.args.push(this);
        lowering.this_cell = Some(lowering.spill_argument(this, "this"));
    }
    for param in &def.params {
        let ty = ir_ty(lowering.module, &param.ty);
        let arg = lowering
            .module
            .pool
            .non_literal(param.name.clone(), ty, NonLiteralKind::Arg);
        lowering.func.args.push(arg);
        let cell = lowering.spill_argument(arg, &param.name);
        lowering.scopes[0].insert(param.name.clone(), cell);
    }

    lowering.lower_stmts(&def.body);

    // Fall-off-the-end epilogue: main returns 0, void functions return,
    // anything else cannot get here without UB.
    if !lowering.terminated() {
        let term = if lowering.func.name == "main" {
            let zero = lowering.module.pool.zero;
            Inst::Return { value: Some(zero) }
        } else if lowering.func.ret == Ty::VOID {
            Inst::Return { value: None }
        } else {
            Inst::Unreachable
        };
        lowering.set_term(term);
    }

    let func = lowering.func;
    module.functions[id] = func;
}

impl FunctionLowering<'_> {
    fn emit(&mut self, inst: Inst) {
        self.func.blocks[self.current].push_back(inst);
    }

    fn set_term(&mut self, term: Inst) {
        self.func.blocks[self.current].set_term(term);
    }

    fn terminated(&self) -> bool {
        self.func.blocks[self.current].is_terminated()
    }

    fn switch_to(&mut self, block: BlockId) {
        self.current = block;
    }

    fn temp(&mut self, ty: Ty, hint: &str) -> ValueId {
        self.func.create_temporary(&mut self.module.pool, ty, hint)
    }

    /// Reserves a stack cell for a named variable; the alloca always lands
    /// in the entry block, which is safe because terminators live outside
    /// the body list.
    fn alloc_cell(&mut self, name: &str, value_ty: Ty) -> ValueId {
        let cell_name = self.func.register_name(&format!("{name}.addr"));
        let cell =
            self.module
                .pool
                .non_literal(cell_name, value_ty.pointer_to(), NonLiteralKind::Local);
        self.func.locals.push(cell);
        let entry = self.func.entry();
        self.func.blocks[entry].push_back(Inst::Alloca { dest: cell });
        cell
    }

    fn spill_argument(&mut self, arg: ValueId, name: &str) -> ValueId {
        let ty = self.module.pool.ty(arg);
        let cell = self.alloc_cell(name, ty);
        let entry = self.func.entry();
        self.func.blocks[entry].push_back(Inst::Store {
            addr: cell,
            src: arg,
        });
        cell
    }

    fn lookup_var(&self, name: &str) -> Option<ValueId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .copied()
    }

    fn lower_stmts(&mut self, stmts: &[ast::Stmt]) {
        self.scopes.push(HashMap::new());
        for stmt in stmts {
            if self.terminated() {
                break;
            }
            self.lower_stmt(stmt);
        }
        self.scopes.pop();
    }

    fn lower_stmt(&mut self, stmt: &ast::Stmt) {
        match stmt {
            ast::Stmt::Block(stmts) => self.lower_stmts(stmts),
            ast::Stmt::Expr(expr) => {
                self.lower_expr(expr);
            }
            ast::Stmt::Decl { name, ty, init } => {
                let value_ty = ir_ty(self.module, ty);
                let cell = self.alloc_cell(name, value_ty);
                self.scopes
                    .last_mut()
                    .expect("internal error: no open scope")
                    .insert(name.clone(), cell);
                if let Some(init) = init {
                    let value = self.lower_expr(init);
                    self.emit(Inst::Store {
                        addr: cell,
                        src: value,
                    });
                }
            }
            ast::Stmt::If {
                cond,
                then,
                otherwise,
            } => self.lower_if(cond, then, otherwise.as_deref()),
            ast::Stmt::While { cond, body } => self.lower_while(cond, body),
            ast::Stmt::For {
                init,
                cond,
                step,
                body,
            } => self.lower_for(init.as_deref(), cond.as_ref(), step.as_ref(), body),
            ast::Stmt::Break => {
                let end = self
                    .loops
                    .last()
                    .expect("internal error: break outside loop")
                    .end;
                self.set_term(Inst::Jump { dest: end });
            }
            ast::Stmt::Continue => {
                let step = self
                    .loops
                    .last()
                    .expect("internal error: continue outside loop")
                    .step;
                self.set_term(Inst::Jump { dest: step });
            }
            ast::Stmt::Return(value) => {
                let value = match value {
                    Some(value) => Some(self.lower_expr(value)),
                    // `return;` in main still produces the implicit 0.
                    None if self.func.name == "main" => Some(self.module.pool.zero),
                    None => None,
                };
                self.set_term(Inst::Return { value });
            }
        }
    }

    fn lower_if(&mut self, cond: &ast::Expr, then: &[ast::Stmt], otherwise: Option<&[ast::Stmt]>) {
        let cond = self.lower_expr(cond);
        let label = self.func.next_cond_label();
        let then_block = self.func.push_block(format!("cond.{label}.then"));
        let else_block = otherwise
            .is_some()
            .then(|| self.func.push_block(format!("cond.{label}.else")));
        let end_block = self.func.push_block(format!("cond.{label}.end"));

        self.set_term(Inst::Branch {
            cond,
            targets: [else_block.unwrap_or(end_block), then_block],
        });

        self.switch_to(then_block);
        self.lower_stmts(then);
        if !self.terminated() {
            self.set_term(Inst::Jump { dest: end_block });
        }

        if let (Some(else_block), Some(otherwise)) = (else_block, otherwise) {
            self.switch_to(else_block);
            self.lower_stmts(otherwise);
            if !self.terminated() {
                self.set_term(Inst::Jump { dest: end_block });
            }
        }

        self.switch_to(end_block);
    }

    fn lower_while(&mut self, cond: &ast::Expr, body: &[ast::Stmt]) {
        let label = self.func.next_loop_label();
        let cond_block = self.func.push_block(format!("loop.{label}.cond"));
        self.set_term(Inst::Jump { dest: cond_block });

        self.switch_to(cond_block);
        let cond = self.lower_expr(cond);
        let body_block = self.func.push_block(format!("loop.{label}.body"));
        let end_block = self.func.push_block(format!("loop.{label}.end"));
        self.set_term(Inst::Branch {
            cond,
            targets: [end_block, body_block],
        });

        self.switch_to(body_block);
        self.loops.push(LoopFrame {
            step: cond_block,
            end: end_block,
        });
        self.lower_stmts(body);
        self.loops.pop();
        if !self.terminated() {
            self.set_term(Inst::Jump { dest: cond_block });
        }

        self.switch_to(end_block);
    }

    fn lower_for(
        &mut self,
        init: Option<&ast::Stmt>,
        cond: Option<&ast::Expr>,
        step: Option<&ast::Expr>,
        body: &[ast::Stmt],
    ) {
        // A for loop introduces a scope of its own for the init declaration.
        self.scopes.push(HashMap::new());
        if let Some(init) = init {
            self.lower_stmt(init);
        }

        let label = self.func.next_loop_label();
        let cond_block = self.func.push_block(format!("loop.{label}.cond"));
        self.set_term(Inst::Jump { dest: cond_block });

        self.switch_to(cond_block);
        let cond = cond.map(|c| self.lower_expr(c));
        let body_block = self.func.push_block(format!("loop.{label}.body"));
        let step_block = self.func.push_block(format!("loop.{label}.step"));
        let end_block = self.func.push_block(format!("loop.{label}.end"));
        match cond {
            Some(cond) => self.set_term(Inst::Branch {
                cond,
                targets: [end_block, body_block],
            }),
            None => self.set_term(Inst::Jump { dest: body_block }),
        }

        self.switch_to(body_block);
        self.loops.push(LoopFrame {
            step: step_block,
            end: end_block,
        });
        self.lower_stmts(body);
        self.loops.pop();
        if !self.terminated() {
            self.set_term(Inst::Jump { dest: step_block });
        }

        self.switch_to(step_block);
        if let Some(step) = step {
            self.lower_expr(step);
        }
        self.set_term(Inst::Jump { dest: cond_block });

        self.switch_to(end_block);
        self.scopes.pop();
    }

    fn lower_expr(&mut self, expr: &ast::Expr) -> ValueId {
        match &expr.kind {
            ast::ExprKind::Int(v) => self.module.pool.int(*v),
            ast::ExprKind::Bool(v) => self.module.pool.boolean(*v),
            ast::ExprKind::Str(s) => {
                let data = self.module.pool.string(s);
                self.module.pool.pointer_to(data)
            }
            ast::ExprKind::Null => self.module.pool.null(),
            ast::ExprKind::This => {
                let cell = self
                    .this_cell
                    .expect("internal error: `this` outside a method");
                self.load_from(cell, "this")
            }
            ast::ExprKind::Var { name, site } => {
                let cell = self.var_cell(name, *site);
                self.load_from(cell, name)
            }
            ast::ExprKind::Unary { op, operand } => self.lower_unary(*op, operand),
            ast::ExprKind::Binary { op, lhs, rhs } => self.lower_binary(*op, lhs, rhs),
            ast::ExprKind::Assign { target, value } => {
                let addr = self.lower_addr(target);
                let value = self.lower_expr(value);
                self.emit(Inst::Store { addr, src: value });
                value
            }
            ast::ExprKind::Call { callee, args } => {
                let args = args.iter().map(|a| self.lower_expr(a)).collect();
                let func = self.resolve_function(callee);
                self.emit_call(func, args)
            }
            ast::ExprKind::Method {
                receiver,
                name,
                args,
            } => self.lower_method(receiver, name, args),
            ast::ExprKind::Member { .. } | ast::ExprKind::Index { .. } => {
                let addr = self.lower_addr(expr);
                let hint = match &expr.kind {
                    ast::ExprKind::Member { field, .. } => field.as_str(),
                    _ => "load",
                };
                self.load_from(addr, hint)
            }
            ast::ExprKind::NewObject { class } => self.lower_new_object(class),
            ast::ExprKind::NewArray { dims } => {
                let dims: Vec<ValueId> = dims.iter().map(|d| self.lower_expr(d)).collect();
                let ty = ir_ty(self.module, &expr.ty);
                self.lower_new_array(&dims, ty)
            }
        }
    }

    fn var_cell(&mut self, name: &str, site: ast::VarSite) -> ValueId {
        match site {
            ast::VarSite::Local | ast::VarSite::Param => self
                .lookup_var(name)
                .unwrap_or_else(|| panic!("internal error: unresolved variable {name}")),
            ast::VarSite::Global => self
                .globals
                .get(name)
                .copied()
                .unwrap_or_else(|| panic!("internal error: unresolved global {name}")),
        }
    }

    fn load_from(&mut self, addr: ValueId, hint: &str) -> ValueId {
        let ty = self.module.pool.pointee_ty(addr);
        let dest = self.temp(ty, hint);
        self.emit(Inst::Load { dest, addr });
        dest
    }

    fn lower_unary(&mut self, op: ast::UnaryOp, operand: &ast::Expr) -> ValueId {
        let value = self.lower_expr(operand);
        let (ir_op, lhs, rhs, hint) = match op {
            ast::UnaryOp::Neg => (BinaryOp::Sub, self.module.pool.zero, value, "neg"),
            ast::UnaryOp::Not => (BinaryOp::Xor, value, self.module.pool.boolean(true), "not"),
            ast::UnaryOp::BitNot => (BinaryOp::Xor, value, self.module.pool.neg_one, "not"),
        };
        let dest = self.temp(self.module.pool.ty(value), hint);
        self.emit(Inst::Binary {
            op: ir_op,
            dest,
            lhs,
            rhs,
        });
        dest
    }

    fn lower_binary(&mut self, op: ast::BinaryOp, lhs: &ast::Expr, rhs: &ast::Expr) -> ValueId {
        match op {
            ast::BinaryOp::LogicAnd | ast::BinaryOp::LogicOr => {
                return self.lower_short_circuit(op, lhs, rhs)
            }
            _ => {}
        }

        let is_string = lhs.ty == ast::Type::Str;
        let lv = self.lower_expr(lhs);
        let rv = self.lower_expr(rhs);

        if is_string {
            let builtin = match op {
                ast::BinaryOp::Add => "__str_concat",
                ast::BinaryOp::Eq => "__str_eq",
                ast::BinaryOp::Ne => "__str_ne",
                ast::BinaryOp::Lt => "__str_lt",
                ast::BinaryOp::Le => "__str_le",
                ast::BinaryOp::Gt => "__str_gt",
                ast::BinaryOp::Ge => "__str_ge",
                _ => panic!("internal error: operator {op:?} on strings"),
            };
            let func = self.module.builtin(builtin);
            return self.emit_call(func, vec![lv, rv]);
        }

        if op.is_comparison() {
            let ir_op = match op {
                ast::BinaryOp::Eq => CompareOp::Eq,
                ast::BinaryOp::Ne => CompareOp::Ne,
                ast::BinaryOp::Lt => CompareOp::Lt,
                ast::BinaryOp::Le => CompareOp::Le,
                ast::BinaryOp::Gt => CompareOp::Gt,
                ast::BinaryOp::Ge => CompareOp::Ge,
                _ => unreachable!(),
            };
            let dest = self.temp(Ty::I1, "cmp");
            self.emit(Inst::Compare {
                op: ir_op,
                dest,
                lhs: lv,
                rhs: rv,
            });
            return dest;
        }

        let ir_op = match op {
            ast::BinaryOp::Add => BinaryOp::Add,
            ast::BinaryOp::Sub => BinaryOp::Sub,
            ast::BinaryOp::Mul => BinaryOp::Mul,
            ast::BinaryOp::Div => BinaryOp::Div,
            ast::BinaryOp::Mod => BinaryOp::Mod,
            ast::BinaryOp::Shl => BinaryOp::Shl,
            ast::BinaryOp::Shr => BinaryOp::Shr,
            ast::BinaryOp::BitAnd => BinaryOp::And,
            ast::BinaryOp::BitOr => BinaryOp::Or,
            ast::BinaryOp::BitXor => BinaryOp::Xor,
            _ => unreachable!(),
        };
        let dest = self.temp(self.module.pool.ty(lv), &ir_op.to_string());
        self.emit(Inst::Binary {
            op: ir_op,
            dest,
            lhs: lv,
            rhs: rv,
        });
        dest
    }

    /// `a && b` / `a || b`: one block for the right operand, one join block
    /// carrying a two-entry boolean phi.
    fn lower_short_circuit(
        &mut self,
        op: ast::BinaryOp,
        lhs: &ast::Expr,
        rhs: &ast::Expr,
    ) -> ValueId {
        let lv = self.lower_expr(lhs);
        let lhs_exit = self.current;

        let label = self.func.next_cond_label();
        let is_and = op == ast::BinaryOp::LogicAnd;
        let arm = if is_and { "then" } else { "else" };
        let rhs_block = self.func.push_block(format!("cond.{label}.{arm}"));
        let end_block = self.func.push_block(format!("cond.{label}.end"));

        // && evaluates the right side only when the left was true; || only
        // when it was false.
        let targets = if is_and {
            [end_block, rhs_block]
        } else {
            [rhs_block, end_block]
        };
        self.set_term(Inst::Branch { cond: lv, targets });

        self.switch_to(rhs_block);
        let rv = self.lower_expr(rhs);
        let rhs_exit = self.current;
        self.set_term(Inst::Jump { dest: end_block });

        self.switch_to(end_block);
        let short_value = self.module.pool.boolean(!is_and);
        let dest = self.temp(Ty::I1, "phi");
        self.func.blocks[end_block].push_phi(Inst::Phi {
            dest,
            entries: vec![
                PhiEntry {
                    from: lhs_exit,
                    value: short_value,
                },
                PhiEntry {
                    from: rhs_exit,
                    value: rv,
                },
            ],
        });
        dest
    }

    fn resolve_function(&self, name: &str) -> FuncId {
        match self.signatures.get(name) {
            Some(&(id, _)) => id,
            None => self.module.builtin(name),
        }
    }

    fn emit_call(&mut self, func: FuncId, args: Vec<ValueId>) -> ValueId {
        let ret = self.module.functions[func].ret;
        let dest = (ret != Ty::VOID).then(|| self.temp(ret, "call"));
        self.emit(Inst::Call { dest, func, args });
        // Void calls have no value; returning the defined temporary keeps
        // the common path uniform and the checker guarantees void results
        // are never read.
        dest.unwrap_or(self.module.pool.zero)
    }

    fn lower_method(&mut self, receiver: &ast::Expr, name: &str, args: &[ast::Expr]) -> ValueId {
        let recv = self.lower_expr(receiver);

        if matches!(receiver.ty, ast::Type::Array(_)) {
            assert!(args.is_empty(), "internal error: array method with arguments");
            let func = self.module.builtin("__array_size");
            return self.emit_call(func, vec![recv]);
        }

        if receiver.ty == ast::Type::Str {
            let builtin = match name {
                "length" => "__str_length",
                "substring" => "__str_substring",
                "parseInt" => "__str_parseInt",
                "ord" => "__str_ord",
                _ => panic!("internal error: unknown string method {name}"),
            };
            let mut call_args = vec![recv];
            call_args.extend(args.iter().map(|a| self.lower_expr(a)));
            let func = self.module.builtin(builtin);
            return self.emit_call(func, call_args);
        }

        let ast::Type::Class(class) = &receiver.ty else {
            panic!("internal error: method call on {:?}", receiver.ty);
        };
        let mangled = format!("{class}.{name}");
        let (func, _) = *self
            .signatures
            .get(&mangled)
            .unwrap_or_else(|| panic!("internal error: unresolved method {mangled}"));
        let mut call_args = vec![recv];
        call_args.extend(args.iter().map(|a| self.lower_expr(a)));
        self.emit_call(func, call_args)
    }

    fn lower_addr(&mut self, expr: &ast::Expr) -> ValueId {
        match &expr.kind {
            ast::ExprKind::Var { name, site } => self.var_cell(name, *site),
            ast::ExprKind::Member { object, field } => {
                let base = self.lower_expr(object);
                let ast::Type::Class(class) = &object.ty else {
                    panic!("internal error: member access on {:?}", object.ty);
                };
                let class_id = self
                    .module
                    .class_by_name(class)
                    .expect("internal error: member access on unknown class");
                let member = self.module.classes[class_id]
                    .member_index(field)
                    .unwrap_or_else(|| panic!("internal error: unknown field {class}.{field}"));
                let field_ty = self.module.classes[class_id].member_ty(member);
                let dest = self.temp(field_ty.pointer_to(), "get");
                let zero = self.module.pool.zero;
                self.emit(Inst::Get {
                    dest,
                    addr: base,
                    index: Some(zero),
                    member: Some(member),
                });
                dest
            }
            ast::ExprKind::Index { array, index } => {
                let base = self.lower_expr(array);
                let index = self.lower_expr(index);
                let dest = self.temp(self.module.pool.ty(base), "get");
                self.emit(Inst::Get {
                    dest,
                    addr: base,
                    index: Some(index),
                    member: None,
                });
                dest
            }
            _ => panic!("internal error: expression is not an lvalue"),
        }
    }

    fn lower_new_object(&mut self, class: &str) -> ValueId {
        let class_id = self
            .module
            .class_by_name(class)
            .expect("internal error: new of unknown class");
        let member_count = self.module.classes[class_id].members.len();
        let size = self.module.pool.int(4 * member_count.max(1) as i32);
        let malloc = self.module.builtin("__malloc");
        // The temporary carries the class pointer type even though the
        // allocator is declared `ptr`.
        let object = self.temp(Ty::class(class_id), "new");
        self.emit(Inst::Call {
            dest: Some(object),
            func: malloc,
            args: vec![size],
        });

        let ctor = format!("{class}.{class}");
        if let Some(&(func, _)) = self.signatures.get(&ctor) {
            self.emit(Inst::Call {
                dest: None,
                func,
                args: vec![object],
            });
        }
        object
    }

    /// `new T[d0][d1]...`: one runtime allocation per specified dimension;
    /// nested dimensions fill the outer array through a generated loop.
    fn lower_new_array(&mut self, dims: &[ValueId], array_ty: Ty) -> ValueId {
        let elem_ty = array_ty.pointee();
        let elem_size = if elem_ty == Ty::I1 { 1 } else { 4 };
        let size = self.module.pool.int(elem_size);
        let count = dims[0];
        let new_array = self.module.builtin("__new_array");
        let array = self.temp(array_ty, "new");
        self.emit(Inst::Call {
            dest: Some(array),
            func: new_array,
            args: vec![size, count],
        });

        if dims.len() == 1 {
            return array;
        }

        // Fill every slot with a recursively allocated sub-array.
        let index_cell = self.alloc_cell("new.idx", Ty::I32);
        let zero = self.module.pool.zero;
        self.emit(Inst::Store {
            addr: index_cell,
            src: zero,
        });

        let label = self.func.next_loop_label();
        let cond_block = self.func.push_block(format!("loop.{label}.cond"));
        self.set_term(Inst::Jump { dest: cond_block });

        self.switch_to(cond_block);
        let index = self.load_from(index_cell, "new.idx");
        let in_range = self.temp(Ty::I1, "cmp");
        self.emit(Inst::Compare {
            op: CompareOp::Lt,
            dest: in_range,
            lhs: index,
            rhs: count,
        });
        let body_block = self.func.push_block(format!("loop.{label}.body"));
        let end_block = self.func.push_block(format!("loop.{label}.end"));
        self.set_term(Inst::Branch {
            cond: in_range,
            targets: [end_block, body_block],
        });

        self.switch_to(body_block);
        let inner = self.lower_new_array(&dims[1..], elem_ty);
        let index = self.load_from(index_cell, "new.idx");
        let slot = self.temp(array_ty, "get");
        self.emit(Inst::Get {
            dest: slot,
            addr: array,
            index: Some(index),
            member: None,
        });
        self.emit(Inst::Store {
            addr: slot,
            src: inner,
        });
        let one = self.module.pool.one;
        let next = self.temp(Ty::I32, "add");
        self.emit(Inst::Binary {
            op: BinaryOp::Add,
            dest: next,
            lhs: index,
            rhs: one,
        });
        self.emit(Inst::Store {
            addr: index_cell,
            src: next,
        });
        self.set_term(Inst::Jump { dest: cond_block });

        self.switch_to(end_block);
        array
    }
}

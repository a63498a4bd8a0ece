//! Textual IR emission. The output is golden-stable: tests compare it
//! byte-for-byte, so nothing here may depend on hash order, and no color
//! escapes are written (diagnostics on stderr carry the colors).

use std::fmt::{self, Write};

use itertools::Itertools;

use crate::ir::inst::{BinaryOp, CompareOp, PhiEntry};
use crate::ir::value::{Literal, NonLiteralKind, Value, ValueId};
use crate::ir::visit::Visitor;
use crate::ir::{BlockId, FuncId, Function, Module};

pub fn module_text(module: &Module) -> String {
    let mut out = String::new();
    print_module(module, &mut out).expect("writing to a String cannot fail");
    out
}

pub fn print_module(module: &Module, out: &mut impl Write) -> fmt::Result {
    for function in module.functions.iter().filter(|f| f.flags.is_builtin) {
        let args = function
            .args
            .iter()
            .map(|&a| module.pool.ty(a).ir_text(&module.classes))
            .join(", ");
        writeln!(
            out,
            "declare {} @{}({})",
            function.ret.ir_text(&module.classes),
            function.name,
            args
        )?;
    }

    for class in module.classes.iter() {
        let members = class
            .members
            .iter()
            .map(|&(_, ty)| ty.ir_text(&module.classes))
            .join(", ");
        writeln!(out, "%{} = type {{ {} }}", class.name, members)?;
    }

    for &global in &module.globals {
        let Value::NonLiteral(nl) = module.pool.get(global) else {
            panic!("internal error: global list entry is not a variable");
        };
        let NonLiteralKind::Global { init, is_constant } = &nl.kind else {
            panic!("internal error: global list entry is not a global");
        };
        let pointee = nl.ty.pointee().ir_text(&module.classes);
        match init {
            Some(init) => {
                let keyword = if *is_constant { "constant" } else { "global" };
                writeln!(
                    out,
                    "@{} = {} {} {}",
                    nl.name,
                    keyword,
                    pointee,
                    module.pool.text(*init)
                )?;
            }
            None => writeln!(out, "@{} = external global {}", nl.name, pointee)?,
        }
    }

    for &global in module.pool.string_globals() {
        let Value::NonLiteral(nl) = module.pool.get(global) else {
            panic!("internal error: string table entry is not a variable");
        };
        let NonLiteralKind::Global {
            init: Some(init), ..
        } = &nl.kind
        else {
            panic!("internal error: string global without initializer");
        };
        let Value::Literal(Literal::Str(contents)) = module.pool.get(*init) else {
            panic!("internal error: string global initialized by non-string");
        };
        writeln!(
            out,
            "@{} = constant [{} x i8] c\"{}\\00\"",
            nl.name,
            contents.len() + 1,
            escape_bytes(contents.as_bytes())
        )?;
    }

    for function in module.functions.iter().filter(|f| !f.flags.is_builtin) {
        print_function(module, function, out)?;
    }

    Ok(())
}

pub fn print_function(module: &Module, function: &Function, out: &mut impl Write) -> fmt::Result {
    let args = function
        .args
        .iter()
        .map(|&a| {
            format!(
                "{} {}",
                module.pool.ty(a).ir_text(&module.classes),
                module.pool.text(a)
            )
        })
        .join(", ");
    writeln!(
        out,
        "define {} @{}({}) {{",
        function.ret.ir_text(&module.classes),
        function.name,
        args
    )?;

    for (i, &id) in function.order.iter().enumerate() {
        let block = &function.blocks[id];
        if i != 0 {
            writeln!(out, "{}:", block.name)?;
        }
        let mut printer = InstPrinter {
            module,
            function,
            lines: Vec::new(),
        };
        crate::ir::visit::walk_block(&mut printer, block);
        for line in printer.lines {
            writeln!(out, "    {line}")?;
        }
    }

    writeln!(out, "}}")
}

/// Escapes string-global contents the conventional way: printable ASCII
/// stays, everything else (and `"` / `\`) becomes `\XX`.
fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::new();
    for &b in bytes {
        if (0x20..0x7f).contains(&b) && b != b'"' && b != b'\\' {
            out.push(b as char);
        } else {
            write!(out, "\\{b:02X}").expect("writing to a String cannot fail");
        }
    }
    out
}

/// Renders one instruction per visit into `lines`.
struct InstPrinter<'a> {
    module: &'a Module,
    function: &'a Function,
    lines: Vec<String>,
}

impl InstPrinter<'_> {
    fn ty_text(&self, v: ValueId) -> String {
        self.module.pool.ty(v).ir_text(&self.module.classes)
    }

    fn operand(&self, v: ValueId) -> String {
        format!("{} {}", self.ty_text(v), self.module.pool.text(v))
    }

    fn data(&self, v: ValueId) -> String {
        self.module.pool.text(v)
    }

    fn label(&self, b: BlockId) -> String {
        format!("%{}", self.function.blocks[b].name)
    }
}

impl Visitor for InstPrinter<'_> {
    fn visit_binary(&mut self, op: BinaryOp, dest: ValueId, lhs: ValueId, rhs: ValueId) {
        self.lines.push(format!(
            "{} = {} {} {}, {}",
            self.data(dest),
            op,
            self.ty_text(lhs),
            self.data(lhs),
            self.data(rhs)
        ));
    }

    fn visit_compare(&mut self, op: CompareOp, dest: ValueId, lhs: ValueId, rhs: ValueId) {
        self.lines.push(format!(
            "{} = icmp {} {} {}, {}",
            self.data(dest),
            op,
            self.ty_text(lhs),
            self.data(lhs),
            self.data(rhs)
        ));
    }

    fn visit_load(&mut self, dest: ValueId, addr: ValueId) {
        self.lines.push(format!(
            "{} = load {}, {}",
            self.data(dest),
            self.ty_text(dest),
            self.operand(addr)
        ));
    }

    fn visit_store(&mut self, addr: ValueId, src: ValueId) {
        self.lines
            .push(format!("store {}, {}", self.operand(src), self.operand(addr)));
    }

    fn visit_alloca(&mut self, dest: ValueId) {
        let pointee = self
            .module
            .pool
            .pointee_ty(dest)
            .ir_text(&self.module.classes);
        self.lines
            .push(format!("{} = alloca {}", self.data(dest), pointee));
    }

    fn visit_get(&mut self, dest: ValueId, addr: ValueId, index: Option<ValueId>, member: Option<usize>) {
        let pointee = self
            .module
            .pool
            .pointee_ty(addr)
            .ir_text(&self.module.classes);
        let mut line = format!(
            "{} = getelementptr {}, {}",
            self.data(dest),
            pointee,
            self.operand(addr)
        );
        if let Some(index) = index {
            write!(line, ", {}", self.operand(index)).expect("writing to a String cannot fail");
        }
        if let Some(member) = member {
            write!(line, ", i32 {member}").expect("writing to a String cannot fail");
        }
        self.lines.push(line);
    }

    fn visit_call(&mut self, dest: Option<ValueId>, func: FuncId, args: &[ValueId]) {
        let callee = &self.module.functions[func];
        let args = args.iter().map(|&a| self.operand(a)).join(", ");
        let call = format!(
            "call {} @{}({})",
            callee.ret.ir_text(&self.module.classes),
            callee.name,
            args
        );
        self.lines.push(match dest {
            Some(dest) => format!("{} = {}", self.data(dest), call),
            None => call,
        });
    }

    fn visit_phi(&mut self, dest: ValueId, entries: &[PhiEntry]) {
        let entries = entries
            .iter()
            .map(|e| format!("[ {}, {} ]", self.data(e.value), self.label(e.from)))
            .join(", ");
        self.lines.push(format!(
            "{} = phi {} {}",
            self.data(dest),
            self.ty_text(dest),
            entries
        ));
    }

    fn visit_jump(&mut self, dest: BlockId) {
        self.lines.push(format!("br label {}", self.label(dest)));
    }

    fn visit_branch(&mut self, cond: ValueId, targets: [BlockId; 2]) {
        // The true target is stored at index 1 but printed first.
        self.lines.push(format!(
            "br i1 {}, label {}, label {}",
            self.data(cond),
            self.label(targets[1]),
            self.label(targets[0])
        ));
    }

    fn visit_return(&mut self, value: Option<ValueId>) {
        self.lines.push(match value {
            Some(value) => format!("ret {}", self.operand(value)),
            None => "ret void".to_string(),
        });
    }

    fn visit_unreachable(&mut self) {
        self.lines.push("unreachable".to_string());
    }
}

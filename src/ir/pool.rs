//! The value pool: one arena owning every definition in the module, with
//! content-addressed interning for literals so that id equality coincides
//! with content equality, plus the fixed builtin-function registry.

use hashbrown::HashMap;
use once_cell::sync::Lazy;

use crate::index::IndexVec;
use crate::ir::ty::Ty;
use crate::ir::value::{Literal, NonLiteral, NonLiteralKind, Value, ValueId};

#[derive(Debug)]
pub struct ValuePool {
    values: IndexVec<ValueId, Value>,
    ints: HashMap<i32, ValueId>,
    bools: [ValueId; 2],
    null: ValueId,
    /// String contents -> the global holding it.
    strings: HashMap<String, ValueId>,
    /// String globals in insertion order, for printing.
    string_order: Vec<ValueId>,
    /// Global -> interned pointer constant referring to it.
    ptrs: HashMap<ValueId, ValueId>,
    undefs: HashMap<Ty, ValueId>,

    pub zero: ValueId,
    pub one: ValueId,
    pub neg_one: ValueId,
}

impl ValuePool {
    pub fn new() -> Self {
        let mut values = IndexVec::new();
        let false_ = values.push(Value::Literal(Literal::Bool(false)));
        let true_ = values.push(Value::Literal(Literal::Bool(true)));
        let null = values.push(Value::Literal(Literal::Ptr(None)));
        let zero = values.push(Value::Literal(Literal::Int(0)));
        let one = values.push(Value::Literal(Literal::Int(1)));
        let neg_one = values.push(Value::Literal(Literal::Int(-1)));

        let mut ints = HashMap::new();
        ints.insert(0, zero);
        ints.insert(1, one);
        ints.insert(-1, neg_one);

        Self {
            values,
            ints,
            bools: [false_, true_],
            null,
            strings: HashMap::new(),
            string_order: Vec::new(),
            ptrs: HashMap::new(),
            undefs: HashMap::new(),
            zero,
            one,
            neg_one,
        }
    }

    pub fn get(&self, id: ValueId) -> &Value {
        &self.values[id]
    }

    pub fn int(&mut self, value: i32) -> ValueId {
        if let Some(&id) = self.ints.get(&value) {
            return id;
        }
        let id = self.values.push(Value::Literal(Literal::Int(value)));
        self.ints.insert(value, id);
        id
    }

    pub fn boolean(&self, value: bool) -> ValueId {
        self.bools[value as usize]
    }

    pub fn null(&self) -> ValueId {
        self.null
    }

    pub fn undefined(&mut self, ty: Ty) -> ValueId {
        if let Some(&id) = self.undefs.get(&ty) {
            return id;
        }
        let id = self.values.push(Value::Undefined(ty));
        self.undefs.insert(ty, id);
        id
    }

    /// Interns a string constant, returning the global that holds it.
    pub fn string(&mut self, contents: &str) -> ValueId {
        if let Some(&id) = self.strings.get(contents) {
            return id;
        }
        let init = self.values.push(Value::Literal(Literal::Str(contents.to_string())));
        let name = format!(".str.{}", self.string_order.len());
        // The global's name denotes the address of the first byte, so its
        // value type is already the string pointer type.
        let id = self.values.push(Value::NonLiteral(NonLiteral {
            name,
            ty: Ty::STR,
            kind: NonLiteralKind::Global {
                init: Some(init),
                is_constant: true,
            },
        }));
        self.strings.insert(contents.to_string(), id);
        self.string_order.push(id);
        id
    }

    /// The interned pointer constant referring to a global.
    pub fn pointer_to(&mut self, global: ValueId) -> ValueId {
        if let Some(&id) = self.ptrs.get(&global) {
            return id;
        }
        let id = self.values.push(Value::Literal(Literal::Ptr(Some(global))));
        self.ptrs.insert(global, id);
        id
    }

    /// Allocates a named non-literal. Name uniqueness is the caller's
    /// responsibility (functions keep per-name counters).
    pub fn non_literal(&mut self, name: String, ty: Ty, kind: NonLiteralKind) -> ValueId {
        self.values.push(Value::NonLiteral(NonLiteral { name, ty, kind }))
    }

    pub fn string_globals(&self) -> &[ValueId] {
        &self.string_order
    }

    /// The type of the value a definition represents.
    pub fn ty(&self, id: ValueId) -> Ty {
        match &self.values[id] {
            Value::Undefined(ty) => *ty,
            Value::Literal(Literal::Int(_)) => Ty::I32,
            Value::Literal(Literal::Bool(_)) => Ty::I1,
            Value::Literal(Literal::Ptr(None)) => Ty::PTR,
            Value::Literal(Literal::Ptr(Some(global))) => self.ty(*global),
            Value::Literal(Literal::Str(_)) => Ty::STR,
            Value::NonLiteral(nl) => nl.ty,
        }
    }

    /// The type behind an address-typed definition.
    pub fn pointee_ty(&self, id: ValueId) -> Ty {
        self.ty(id).pointee()
    }

    /// Textual form of a definition in operand position: literal spelling,
    /// `%name`, or `@name`.
    pub fn text(&self, id: ValueId) -> String {
        match &self.values[id] {
            Value::Undefined(_) => "undef".to_string(),
            Value::Literal(Literal::Int(v)) => v.to_string(),
            Value::Literal(Literal::Bool(v)) => v.to_string(),
            Value::Literal(Literal::Ptr(None)) => "null".to_string(),
            Value::Literal(Literal::Ptr(Some(global))) => self.text(*global),
            Value::Literal(Literal::Str(s)) => format!("c{s:?}"),
            Value::NonLiteral(nl) => match nl.kind {
                NonLiteralKind::Global { .. } => format!("@{}", nl.name),
                _ => format!("%{}", nl.name),
            },
        }
    }
}

impl Default for ValuePool {
    fn default() -> Self {
        Self::new()
    }
}

/// Signature of one entry in the builtin table.
pub struct BuiltinFunction {
    pub name: &'static str,
    pub ret: Ty,
    pub args: &'static [Ty],
    pub has_input: bool,
    pub has_output: bool,
}

const fn builtin(
    name: &'static str,
    ret: Ty,
    args: &'static [Ty],
    has_input: bool,
    has_output: bool,
) -> BuiltinFunction {
    BuiltinFunction {
        name,
        ret,
        args,
        has_input,
        has_output,
    }
}

/// The fixed builtin-function table: I/O, string runtime, allocation
/// runtime. Immutable for the process lifetime; `ir::Module::new`
/// materializes it into the function arena.
pub static BUILTINS: Lazy<Vec<BuiltinFunction>> = Lazy::new(|| {
    vec![
        builtin("print", Ty::VOID, &[Ty::STR], false, true),
        builtin("println", Ty::VOID, &[Ty::STR], false, true),
        builtin("printInt", Ty::VOID, &[Ty::I32], false, true),
        builtin("printlnInt", Ty::VOID, &[Ty::I32], false, true),
        builtin("getString", Ty::STR, &[], true, false),
        builtin("getInt", Ty::I32, &[], true, false),
        builtin("toString", Ty::STR, &[Ty::I32], false, false),
        builtin("__str_concat", Ty::STR, &[Ty::STR, Ty::STR], false, false),
        builtin("__str_eq", Ty::I1, &[Ty::STR, Ty::STR], false, false),
        builtin("__str_ne", Ty::I1, &[Ty::STR, Ty::STR], false, false),
        builtin("__str_lt", Ty::I1, &[Ty::STR, Ty::STR], false, false),
        builtin("__str_le", Ty::I1, &[Ty::STR, Ty::STR], false, false),
        builtin("__str_gt", Ty::I1, &[Ty::STR, Ty::STR], false, false),
        builtin("__str_ge", Ty::I1, &[Ty::STR, Ty::STR], false, false),
        builtin("__str_length", Ty::I32, &[Ty::STR], false, false),
        builtin(
            "__str_substring",
            Ty::STR,
            &[Ty::STR, Ty::I32, Ty::I32],
            false,
            false,
        ),
        builtin("__str_parseInt", Ty::I32, &[Ty::STR], false, false),
        builtin("__str_ord", Ty::I32, &[Ty::STR, Ty::I32], false, false),
        builtin("__malloc", Ty::PTR, &[Ty::I32], false, false),
        builtin("__new_array", Ty::PTR, &[Ty::I32, Ty::I32], false, false),
        builtin("__array_size", Ty::I32, &[Ty::PTR], false, false),
    ]
});

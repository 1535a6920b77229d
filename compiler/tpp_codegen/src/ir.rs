//! The typed intermediate representation.
//!
//! A [`Module`] holds named aggregates, globals, and functions. Functions
//! are graphs of labeled basic blocks; every block ends in exactly one
//! terminator. Instruction results are function-local [`ValueId`]s with a
//! recorded [`IrType`] each, so the module is self-describing for the
//! verifier, the printer, and any external code generator.

use rustc_hash::FxHashMap;

/// Lowered type of an IR value or storage slot.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum IrType {
    /// Fixed-width integer: `i1` through `i128`.
    Int { bits: u32 },
    /// IEEE float: `f16`, `f32`, `f64`.
    Float { bits: u32 },
    Void,
    /// Pointer to element storage.
    Ptr(Box<IrType>),
    /// Named aggregate; the body lives module-side.
    Aggregate(Box<str>),
    /// Callable signature.
    Func {
        result: Box<IrType>,
        params: Vec<IrType>,
        variadic: bool,
    },
}

impl IrType {
    pub const I1: IrType = IrType::Int { bits: 1 };
    pub const I8: IrType = IrType::Int { bits: 8 };
    pub const I64: IrType = IrType::Int { bits: 64 };

    pub fn ptr_to(elem: IrType) -> IrType {
        IrType::Ptr(Box::new(elem))
    }
}

impl std::fmt::Display for IrType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IrType::Int { bits } => write!(f, "i{bits}"),
            IrType::Float { bits } => write!(f, "f{bits}"),
            IrType::Void => write!(f, "void"),
            IrType::Ptr(elem) => write!(f, "{elem}*"),
            IrType::Aggregate(name) => write!(f, "%{name}"),
            IrType::Func {
                result,
                params,
                variadic,
            } => {
                write!(f, "{result}(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{param}")?;
                }
                if *variadic {
                    if !params.is_empty() {
                        write!(f, ",")?;
                    }
                    write!(f, "...")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A function-local SSA value.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ValueId(pub u32);

/// A basic block within one function.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct BlockId(pub u32);

/// A function within one module.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct FuncId(pub u32);

/// An IR constant.
#[derive(Clone, PartialEq, Debug)]
pub enum Const {
    Int { bits: u32, value: i128 },
    Float { bits: u32, value: f64 },
    /// Address of a module global.
    GlobalAddr(Box<str>),
    /// The zero value of a type.
    Zero(IrType),
}

/// An instruction operand.
#[derive(Clone, PartialEq, Debug)]
pub enum Operand {
    Value(ValueId),
    Const(Const),
    /// Splice of the enclosing function's variadic tail. Only legal as a
    /// call argument inside a variadic function.
    VaArgs,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    /// Signed division.
    Div,
    /// Signed remainder.
    Rem,
    And,
    Or,
    Xor,
    Shl,
    /// Arithmetic (sign-preserving) right shift.
    Shr,
    /// Logical right shift.
    LShr,
}

/// Comparison predicate; integers compare signed.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum CastKind {
    /// Sign-extending or truncating.
    IntToInt,
    /// Source treated as signed.
    IntToFloat,
    /// Signed, truncating.
    FloatToInt,
    /// Widening or narrowing.
    FloatToFloat,
    IntToPtr,
    PtrToInt,
}

#[derive(Clone, PartialEq, Debug)]
pub enum Instr {
    /// Reserve `count` elements of stack storage; yields `ty*`.
    Alloca {
        dest: ValueId,
        ty: IrType,
        count: Operand,
    },
    Load {
        dest: ValueId,
        ty: IrType,
        ptr: Operand,
    },
    Store {
        ptr: Operand,
        value: Operand,
    },
    Bin {
        dest: ValueId,
        op: BinOp,
        ty: IrType,
        lhs: Operand,
        rhs: Operand,
    },
    /// Yields `i1`.
    Cmp {
        dest: ValueId,
        op: CmpOp,
        ty: IrType,
        lhs: Operand,
        rhs: Operand,
    },
    Cast {
        dest: ValueId,
        kind: CastKind,
        to: IrType,
        value: Operand,
    },
    Call {
        dest: Option<ValueId>,
        callee: Box<str>,
        args: Vec<Operand>,
    },
    /// Element address: `base` is `elem*`, `index` scales by the element.
    Gep {
        dest: ValueId,
        elem: IrType,
        base: Operand,
        index: Operand,
    },
    /// Address of field `field` in the aggregate behind `base`.
    FieldPtr {
        dest: ValueId,
        aggregate: Box<str>,
        base: Operand,
        field: u32,
    },
}

#[derive(Clone, PartialEq, Debug)]
pub enum Terminator {
    Ret(Option<Operand>),
    Br(BlockId),
    CondBr {
        cond: Operand,
        then_block: BlockId,
        else_block: BlockId,
    },
}

#[derive(Clone, PartialEq, Debug)]
pub struct Block {
    pub label: Box<str>,
    pub instrs: Vec<Instr>,
    pub terminator: Option<Terminator>,
}

impl Block {
    pub fn new(label: impl Into<Box<str>>) -> Self {
        Block {
            label: label.into(),
            instrs: Vec::new(),
            terminator: None,
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct Signature {
    pub result: IrType,
    pub params: Vec<IrType>,
    pub variadic: bool,
}

/// A function definition or declaration (no blocks).
///
/// The first `sig.params.len()` value ids are the incoming arguments.
#[derive(Clone, PartialEq, Debug)]
pub struct Function {
    pub name: Box<str>,
    pub sig: Signature,
    pub param_names: Vec<Box<str>>,
    pub blocks: Vec<Block>,
    /// Type of every `ValueId` in this function, indexed by id.
    pub value_types: Vec<IrType>,
}

impl Function {
    pub fn declaration(name: impl Into<Box<str>>, sig: Signature) -> Self {
        let value_types = sig.params.clone();
        Function {
            name: name.into(),
            sig,
            param_names: Vec::new(),
            blocks: Vec::new(),
            value_types,
        }
    }

    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Allocate a fresh value id of the given type.
    pub fn new_value(&mut self, ty: IrType) -> ValueId {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "functions never hold u32::MAX values"
        )]
        let id = ValueId(self.value_types.len() as u32);
        self.value_types.push(ty);
        id
    }
}

/// A named aggregate; `body` is `None` while opaque.
#[derive(Clone, PartialEq, Debug)]
pub struct Aggregate {
    pub name: Box<str>,
    pub body: Option<Vec<IrType>>,
}

/// Initializer for a module global.
#[derive(Clone, PartialEq, Debug)]
pub enum GlobalInit {
    Zero,
    Const(Const),
    /// Raw byte data (string literals), one byte per `i8` element.
    Bytes(Vec<u8>),
}

/// A module global reserving `count` elements of `ty` storage.
#[derive(Clone, PartialEq, Debug)]
pub struct Global {
    pub name: Box<str>,
    pub ty: IrType,
    pub count: u64,
    pub init: GlobalInit,
}

/// One emitted compilation unit.
#[derive(Default, Debug)]
pub struct Module {
    pub name: Box<str>,
    pub aggregates: Vec<Aggregate>,
    pub globals: Vec<Global>,
    pub functions: Vec<Function>,
    aggregate_index: FxHashMap<Box<str>, usize>,
    function_index: FxHashMap<Box<str>, FuncId>,
}

impl Module {
    pub fn new(name: impl Into<Box<str>>) -> Self {
        Module {
            name: name.into(),
            ..Module::default()
        }
    }

    /// Look up an aggregate by name.
    pub fn aggregate(&self, name: &str) -> Option<&Aggregate> {
        self.aggregate_index.get(name).map(|&i| &self.aggregates[i])
    }

    /// Ensure an opaque aggregate entry exists for `name`.
    pub fn declare_aggregate(&mut self, name: &str) {
        if !self.aggregate_index.contains_key(name) {
            self.aggregate_index
                .insert(name.into(), self.aggregates.len());
            self.aggregates.push(Aggregate {
                name: name.into(),
                body: None,
            });
        }
    }

    /// Fill the body of an opaque aggregate. Returns `false` if the
    /// aggregate already has a body.
    pub fn complete_aggregate(&mut self, name: &str, body: Vec<IrType>) -> bool {
        self.declare_aggregate(name);
        let index = self.aggregate_index[name];
        let slot = &mut self.aggregates[index].body;
        if slot.is_some() {
            return false;
        }
        *slot = Some(body);
        true
    }

    pub fn global(&self, name: &str) -> Option<&Global> {
        self.globals.iter().find(|g| &*g.name == name)
    }

    pub fn add_global(&mut self, global: Global) {
        self.globals.push(global);
    }

    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id.0 as usize]
    }

    pub fn function_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.functions[id.0 as usize]
    }

    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        self.function_index.get(name).map(|&id| self.function(id))
    }

    pub fn add_function(&mut self, function: Function) -> FuncId {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "modules never hold u32::MAX functions"
        )]
        let id = FuncId(self.functions.len() as u32);
        self.function_index.insert(function.name.clone(), id);
        self.functions.push(function);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn aggregate_lifecycle() {
        let mut module = Module::new("test");
        module.declare_aggregate("Point");
        assert_eq!(module.aggregate("Point").map(|a| a.body.is_none()), Some(true));

        assert!(module.complete_aggregate("Point", vec![IrType::Int { bits: 32 }]));
        // A second completion is rejected.
        assert!(!module.complete_aggregate("Point", vec![IrType::I8]));
    }

    #[test]
    fn function_value_ids_start_at_params() {
        let sig = Signature {
            result: IrType::Void,
            params: vec![IrType::I64, IrType::I8],
            variadic: false,
        };
        let mut func = Function::declaration("f", sig);
        assert_eq!(func.value_types.len(), 2);
        let v = func.new_value(IrType::I1);
        assert_eq!(v, ValueId(2));
    }

    #[test]
    fn type_display() {
        assert_eq!(IrType::ptr_to(IrType::I8).to_string(), "i8*");
        let sig = IrType::Func {
            result: Box::new(IrType::Int { bits: 32 }),
            params: vec![IrType::Int { bits: 32 }],
            variadic: true,
        };
        assert_eq!(sig.to_string(), "i32(i32,...)");
    }
}

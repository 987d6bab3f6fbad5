//! The typed SSA IR the generator targets.
//!
//! Loops and conditionals arrive here flattened into basic blocks and
//! branches; mutable locals become `alloca` stack slots with typed loads and
//! stores. The textual form (see [`print`]) is LLVM assembly so the external
//! backend can consume it directly.

use hashbrown::HashMap;
use strum::Display;

use crate::index::{simple_index, IndexVec};

pub mod gen;
pub mod optimize;
pub mod print;
pub mod verify;

simple_index! {
    /// Identifies a function within a module
    pub struct FuncId;
}

simple_index! {
    /// Identifies a basic block within a function
    pub struct BlockId;
}

impl BlockId {
    pub const ENTRY: Self = Self(0);
}

simple_index! {
    /// Identifies an SSA value within a function
    pub struct ValueId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrType {
    Int(IntWidth),
    Float(FloatWidth),
    /// An opaque stack-slot address
    Ptr,
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IntWidth {
    /// Booleans are 1-bit integers
    I1,
    I8,
    I16,
    I32,
    I64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FloatWidth {
    F32,
    F64,
}

impl IntWidth {
    pub fn bits(self) -> u32 {
        match self {
            Self::I1 => 1,
            Self::I8 => 8,
            Self::I16 => 16,
            Self::I32 => 32,
            Self::I64 => 64,
        }
    }
}

impl IrType {
    pub const BOOL: Self = Self::Int(IntWidth::I1);

    /// An integer wider than one bit. Booleans deliberately fail this so
    /// numeric conversions never touch them.
    pub fn is_integer(self) -> bool {
        matches!(self, Self::Int(w) if w != IntWidth::I1)
    }

    pub fn is_bool(self) -> bool {
        self == Self::BOOL
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::Float(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant {
    Int { width: IntWidth, value: i64 },
    Float { width: FloatWidth, value: f64 },
}

impl Constant {
    pub fn bool(value: bool) -> Self {
        Self::Int {
            width: IntWidth::I1,
            value: value as i64,
        }
    }

    pub fn ty(self) -> IrType {
        match self {
            Self::Int { width, .. } => IrType::Int(width),
            Self::Float { width, .. } => IrType::Float(width),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Const(Constant),
    Value(ValueId),
}

/// Metadata for one SSA value; `name` is the unique `%name` in the text form
#[derive(Debug, Clone)]
pub struct ValueInfo {
    pub ty: IrType,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum IntBinaryOp {
    Add,
    Sub,
    Mul,
    Sdiv,
    Srem,
    And,
    Or,
    Xor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum FloatBinaryOp {
    Fadd,
    Fsub,
    Fmul,
    Fdiv,
}

/// Signed integer comparison predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum IntPredicate {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
}

/// Ordered float comparison predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum FloatPredicate {
    Oeq,
    One,
    Olt,
    Ole,
    Ogt,
    Oge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum CastKind {
    Sext,
    Trunc,
    Fpext,
    Fptrunc,
    Sitofp,
    Fptosi,
}

#[derive(Debug, Clone)]
pub struct Instruction {
    pub result: Option<ValueId>,
    pub kind: InstKind,
}

#[derive(Debug, Clone)]
pub enum InstKind {
    /// Reserves a stack slot; the result is its address
    Alloca {
        ty: IrType,
    },
    Load {
        ty: IrType,
        address: Operand,
    },
    Store {
        value: Operand,
        address: Operand,
    },
    IntBinary {
        op: IntBinaryOp,
        lhs: Operand,
        rhs: Operand,
    },
    FloatBinary {
        op: FloatBinaryOp,
        lhs: Operand,
        rhs: Operand,
    },
    IntCompare {
        predicate: IntPredicate,
        lhs: Operand,
        rhs: Operand,
    },
    FloatCompare {
        predicate: FloatPredicate,
        lhs: Operand,
        rhs: Operand,
    },
    FloatNeg {
        operand: Operand,
    },
    Cast {
        kind: CastKind,
        operand: Operand,
        to: IrType,
    },
    Call {
        callee: FuncId,
        arguments: Vec<Operand>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Terminator {
    Branch {
        target: BlockId,
    },
    CondBranch {
        condition: Operand,
        positive: BlockId,
        negative: BlockId,
    },
    Return {
        value: Option<Operand>,
    },
}

#[derive(Debug)]
pub struct Block {
    pub label: String,
    pub instructions: Vec<Instruction>,
    /// Exactly one terminator per block; `None` only while the block is
    /// still being filled. The verifier rejects it.
    pub terminator: Option<Terminator>,
}

#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub return_type: IrType,
    pub param_types: Vec<IrType>,
    pub param_values: Vec<ValueId>,
    pub values: IndexVec<ValueId, ValueInfo>,
    /// Empty for declarations (externs and builtins)
    pub blocks: IndexVec<BlockId, Block>,
    name_counts: HashMap<String, u32>,
    label_counts: HashMap<String, u32>,
}

impl Function {
    fn new(name: String, return_type: IrType, params: Vec<(String, IrType)>) -> Self {
        let mut function = Self {
            name,
            return_type,
            param_types: params.iter().map(|(_, ty)| *ty).collect(),
            param_values: Vec::new(),
            values: IndexVec::new(),
            blocks: IndexVec::new(),
            name_counts: HashMap::new(),
            label_counts: HashMap::new(),
        };

        for (name, ty) in params {
            let value = function.new_value(ty, &name);
            function.param_values.push(value);
        }

        function
    }

    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Creates a fresh value named after `stem`, uniquified within the
    /// function (`x`, `x1`, `x2`, ...)
    pub fn new_value(&mut self, ty: IrType, stem: &str) -> ValueId {
        let count = self.name_counts.entry(stem.to_string()).or_insert(0);
        let name = if *count == 0 {
            stem.to_string()
        } else {
            format!("{stem}{count}")
        };
        *count += 1;

        self.values.push(ValueInfo { ty, name })
    }

    /// Appends a new empty block labelled after `stem`, uniquified like
    /// value names
    pub fn append_block(&mut self, stem: &str) -> BlockId {
        let count = self.label_counts.entry(stem.to_string()).or_insert(0);
        let label = if *count == 0 {
            stem.to_string()
        } else {
            format!("{stem}{count}")
        };
        *count += 1;

        self.blocks.push(Block {
            label,
            instructions: Vec::new(),
            terminator: None,
        })
    }

    pub fn has_terminator(&self, block: BlockId) -> bool {
        self.blocks[block].terminator.is_some()
    }

    pub fn operand_ty(&self, operand: &Operand) -> IrType {
        match operand {
            Operand::Const(constant) => constant.ty(),
            Operand::Value(id) => self.values[*id].ty,
        }
    }

    /// Predecessor count per block, derived from the terminators
    pub fn predecessor_counts(&self) -> IndexVec<BlockId, usize> {
        let mut counts = IndexVec::new();
        for _ in self.blocks.iter() {
            counts.push(0usize);
        }

        for block in self.blocks.iter() {
            match &block.terminator {
                Some(Terminator::Branch { target }) => counts[*target] += 1,
                Some(Terminator::CondBranch {
                    positive, negative, ..
                }) => {
                    counts[*positive] += 1;
                    counts[*negative] += 1;
                }
                Some(Terminator::Return { .. }) | None => {}
            }
        }

        counts
    }
}

#[derive(Debug)]
pub struct Module {
    pub name: String,
    pub functions: IndexVec<FuncId, Function>,
    by_name: HashMap<String, FuncId>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: IndexVec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Declares a function prototype. Re-declaring an existing name is a
    /// no-op returning the original id, so the prototype pass can run over
    /// definitions and externs alike.
    pub fn declare_function(
        &mut self,
        name: &str,
        return_type: IrType,
        params: Vec<(String, IrType)>,
    ) -> FuncId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }

        let id = self
            .functions
            .push(Function::new(name.to_string(), return_type, params));
        self.by_name.insert(name.to_string(), id);

        id
    }

    pub fn function_by_name(&self, name: &str) -> Option<FuncId> {
        self.by_name.get(name).copied()
    }
}

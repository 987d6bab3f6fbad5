//! Textual IR emission. The output is LLVM assembly (opaque-pointer
//! dialect), which is what the external backend consumes.

use itertools::Itertools;

use crate::ir::{
    Constant, Function, InstKind, Instruction, IntWidth, IrType, Module, Operand, Terminator,
};

impl core::fmt::Display for IrType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IrType::Int(width) => write!(f, "i{}", width.bits()),
            IrType::Float(super::FloatWidth::F32) => write!(f, "float"),
            IrType::Float(super::FloatWidth::F64) => write!(f, "double"),
            IrType::Ptr => write!(f, "ptr"),
            IrType::Void => write!(f, "void"),
        }
    }
}

impl core::fmt::Display for Constant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constant::Int {
                width: IntWidth::I1,
                value,
            } => write!(f, "{}", if *value != 0 { "true" } else { "false" }),
            Constant::Int { value, .. } => write!(f, "{value}"),
            // Hexadecimal double bits; always bit-exact, which decimal text
            // is not for most float values
            Constant::Float { value, .. } => write!(f, "0x{:016X}", value.to_bits()),
        }
    }
}

impl Module {
    /// Renders the whole module as LLVM assembly
    pub fn print_to_string(&self) -> String {
        let mut out = format!("; ModuleID = '{}'\n", self.name);

        for function in self.functions.iter().filter(|f| f.is_declaration()) {
            out.push('\n');
            out.push_str(&print_declaration(function));
        }

        for function in self.functions.iter().filter(|f| !f.is_declaration()) {
            out.push('\n');
            out.push_str(&print_definition(self, function));
        }

        out
    }
}

fn print_declaration(function: &Function) -> String {
    format!(
        "declare {} @{}({})\n",
        function.return_type,
        function.name,
        function.param_types.iter().join(", ")
    )
}

fn print_definition(module: &Module, function: &Function) -> String {
    let params = function
        .param_values
        .iter()
        .map(|id| {
            let info = &function.values[*id];
            format!("{} %{}", info.ty, info.name)
        })
        .join(", ");

    let mut out = format!(
        "define {} @{}({}) {{\n",
        function.return_type, function.name, params
    );

    for block in function.blocks.iter() {
        out.push_str(&format!("{}:\n", block.label));

        for instruction in &block.instructions {
            out.push_str("  ");
            out.push_str(&print_instruction(module, function, instruction));
            out.push('\n');
        }

        if let Some(terminator) = &block.terminator {
            out.push_str("  ");
            out.push_str(&print_terminator(function, terminator));
            out.push('\n');
        }
    }

    out.push_str("}\n");
    out
}

fn operand(function: &Function, op: &Operand) -> String {
    match op {
        Operand::Const(constant) => constant.to_string(),
        Operand::Value(id) => format!("%{}", function.values[*id].name),
    }
}

fn result(function: &Function, instruction: &Instruction) -> String {
    match instruction.result {
        Some(id) => format!("%{} = ", function.values[id].name),
        None => String::new(),
    }
}

fn print_instruction(module: &Module, function: &Function, instruction: &Instruction) -> String {
    let res = result(function, instruction);

    match &instruction.kind {
        InstKind::Alloca { ty } => format!("{res}alloca {ty}"),
        InstKind::Load { ty, address } => {
            format!("{res}load {ty}, ptr {}", operand(function, address))
        }
        InstKind::Store { value, address } => format!(
            "store {} {}, ptr {}",
            function.operand_ty(value),
            operand(function, value),
            operand(function, address)
        ),
        InstKind::IntBinary { op, lhs, rhs } => format!(
            "{res}{op} {} {}, {}",
            function.operand_ty(lhs),
            operand(function, lhs),
            operand(function, rhs)
        ),
        InstKind::FloatBinary { op, lhs, rhs } => format!(
            "{res}{op} {} {}, {}",
            function.operand_ty(lhs),
            operand(function, lhs),
            operand(function, rhs)
        ),
        InstKind::IntCompare {
            predicate,
            lhs,
            rhs,
        } => format!(
            "{res}icmp {predicate} {} {}, {}",
            function.operand_ty(lhs),
            operand(function, lhs),
            operand(function, rhs)
        ),
        InstKind::FloatCompare {
            predicate,
            lhs,
            rhs,
        } => format!(
            "{res}fcmp {predicate} {} {}, {}",
            function.operand_ty(lhs),
            operand(function, lhs),
            operand(function, rhs)
        ),
        InstKind::FloatNeg { operand: op } => format!(
            "{res}fneg {} {}",
            function.operand_ty(op),
            operand(function, op)
        ),
        InstKind::Cast {
            kind,
            operand: op,
            to,
        } => format!(
            "{res}{kind} {} {} to {to}",
            function.operand_ty(op),
            operand(function, op)
        ),
        InstKind::Call { callee, arguments } => {
            let callee = &module.functions[*callee];
            let arguments = arguments
                .iter()
                .map(|a| format!("{} {}", function.operand_ty(a), operand(function, a)))
                .join(", ");

            format!("{res}call {} @{}({arguments})", callee.return_type, callee.name)
        }
    }
}

fn print_terminator(function: &Function, terminator: &Terminator) -> String {
    match terminator {
        Terminator::Branch { target } => {
            format!("br label %{}", function.blocks[*target].label)
        }
        Terminator::CondBranch {
            condition,
            positive,
            negative,
        } => format!(
            "br i1 {}, label %{}, label %{}",
            operand(function, condition),
            function.blocks[*positive].label,
            function.blocks[*negative].label
        ),
        Terminator::Return { value: Some(value) } => format!(
            "ret {} {}",
            function.operand_ty(value),
            operand(function, value)
        ),
        Terminator::Return { value: None } => "ret void".to_string(),
    }
}

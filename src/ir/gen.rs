//! AST → IR lowering.
//!
//! Emission runs in three phases:
//!
//!   1) every function declaration (definitions and externs alike) gets its
//!      prototype declared in the module, so calls can be emitted before the
//!      callee's body exists
//!   2) each definition's body is emitted into a CFG of basic blocks
//!   3) the optimization pipeline runs (when the level asks for it) and the
//!      module is verified; a verification failure is fatal
//!
//! The generator only ever runs on semantically clean programs, so the
//! errors here are for constructs the semantic layer admits but this layer
//! cannot express yet (strings, `for`, globals) and for internal
//! inconsistencies that must never reach the backend.

use hashbrown::HashMap;
use thiserror::Error;

use crate::{
    frontend::ast::{
        BinaryOperatorClass, BinaryOperatorKind, Expression, ExpressionKind, FunctionDecl,
        Identifier, Item, Program, Statement, StatementKind, UnaryOperatorKind, VariableDecl,
    },
    ir::{
        optimize::{self, OptLevel},
        verify::VerifyError,
        BlockId, CastKind, Constant, FloatBinaryOp, FloatPredicate, FloatWidth, FuncId, InstKind,
        Instruction, IntBinaryOp, IntPredicate, IntWidth, IrType, Module, Operand, Terminator,
        ValueId,
    },
    middle::primitive::PrimitiveType,
};

#[derive(Debug, Error)]
pub enum GenError {
    #[error("type '{0}' is not supported by the code generator")]
    UnsupportedType(PrimitiveType),

    #[error("{0} is not implemented in the code generator")]
    NotImplemented(&'static str),

    #[error("undefined function: {0}")]
    UndefinedFunction(String),

    #[error("no stack slot for variable '{0}' (global variables are not emitted)")]
    UnknownLocal(String),

    #[error("'{operation}' cannot combine operand types {lhs} and {rhs}")]
    IncompatibleOperands {
        operation: String,
        lhs: IrType,
        rhs: IrType,
    },

    #[error("condition must be i1, found {0}")]
    NonBoolCondition(IrType),

    #[error("module verification failed: {0}")]
    Verification(#[from] VerifyError),
}

/// A bound local: the stack slot address plus the slot's element type
#[derive(Debug, Clone, Copy)]
struct Slot {
    address: ValueId,
    ty: IrType,
}

pub struct IrGenerator {
    module: Module,
    /// name -> slot, innermost frame last; one frame per lexical block
    environment: Vec<HashMap<String, Slot>>,
    current_function: Option<FuncId>,
    current_block: Option<BlockId>,
}

impl IrGenerator {
    /// Runs all three phases and hands back the finished module
    pub fn generate(program: &Program, opt_level: OptLevel) -> Result<Module, GenError> {
        let mut generator = Self {
            module: Module::new("m_module"),
            environment: Vec::new(),
            current_function: None,
            current_block: None,
        };

        for item in &program.items {
            match item {
                Item::Function(function) => {
                    generator.declare_prototype(
                        &function.name.name,
                        function.return_type.ty,
                        &function.parameters,
                    )?;
                }
                Item::ExternFunction(function) => {
                    generator.declare_prototype(
                        &function.name.name,
                        function.return_type.ty,
                        &function.parameters,
                    )?;
                }
                Item::Variable(_) => {}
            }
        }

        for item in &program.items {
            if let Item::Function(function) = item {
                generator.emit_function_body(function)?;
            }
        }

        optimize::optimize_module(&mut generator.module, opt_level);
        generator.module.verify()?;

        Ok(generator.module)
    }

    fn declare_prototype(
        &mut self,
        name: &str,
        return_type: PrimitiveType,
        parameters: &[crate::frontend::ast::Parameter],
    ) -> Result<FuncId, GenError> {
        let return_type = map_type(return_type)?;
        let params = parameters
            .iter()
            .map(|p| Ok((p.name.name.clone(), map_type(p.ty.ty)?)))
            .collect::<Result<Vec<_>, GenError>>()?;

        Ok(self.module.declare_function(name, return_type, params))
    }

    fn emit_function_body(&mut self, function: &FunctionDecl) -> Result<(), GenError> {
        let id = self
            .module
            .function_by_name(&function.name.name)
            .expect("declared in the prototype pass");

        self.current_function = Some(id);

        let entry = self.function_mut().append_block("entry");
        self.current_block = Some(entry);

        self.environment.push(HashMap::new());

        // Parameters live in stack slots like any other local so they can
        // be reassigned
        let params: Vec<(String, ValueId, IrType)> = {
            let f = self.function();
            function
                .parameters
                .iter()
                .zip(&f.param_values)
                .map(|(p, value)| (p.name.name.clone(), *value, f.values[*value].ty))
                .collect()
        };

        for (name, value, ty) in params {
            let address = self.emit_value(InstKind::Alloca { ty }, IrType::Ptr, &name);
            self.push_instruction(Instruction {
                result: None,
                kind: InstKind::Store {
                    value: Operand::Value(value),
                    address,
                },
            });

            let Operand::Value(address) = address else {
                unreachable!("emit_value returns a value operand");
            };
            self.bind_local(name, Slot { address, ty });
        }

        for statement in &function.body {
            self.emit_statement(statement)?;
        }

        self.finish_body();

        self.environment.pop();
        self.current_block = None;
        self.current_function = None;

        Ok(())
    }

    /// Closes the body: a void function falls off the end with `ret void`;
    /// a dangling empty merge block that nothing branches to is dropped.
    /// Anything else is left for the verifier to reject.
    fn finish_body(&mut self) {
        let block = self.current_block.expect("inside a body");

        if self.function().has_terminator(block) {
            return;
        }

        if self.function().return_type == IrType::Void {
            self.set_terminator(Terminator::Return { value: None });
            return;
        }

        let is_last = {
            use crate::index::Index;
            block.index() + 1 == self.function().blocks.len()
        };
        let is_empty = self.function().blocks[block].instructions.is_empty();
        let unreachable = {
            let counts = self.function().predecessor_counts();
            counts[block] == 0
        };

        if is_last && is_empty && unreachable {
            self.function_mut().blocks.raw.pop();
        }
    }

    /* Builder plumbing */

    fn function(&self) -> &crate::ir::Function {
        &self.module.functions[self.current_function.expect("inside a body")]
    }

    fn function_mut(&mut self) -> &mut crate::ir::Function {
        &mut self.module.functions[self.current_function.expect("inside a body")]
    }

    fn push_instruction(&mut self, instruction: Instruction) {
        let block = self.current_block.expect("inside a body");
        self.function_mut().blocks[block].instructions.push(instruction);
    }

    fn set_terminator(&mut self, terminator: Terminator) {
        let block = self.current_block.expect("inside a body");
        let block = &mut self.function_mut().blocks[block];

        debug_assert!(block.terminator.is_none(), "block already terminated");
        block.terminator = Some(terminator);
    }

    fn current_block_terminated(&self) -> bool {
        self.function()
            .has_terminator(self.current_block.expect("inside a body"))
    }

    /// Appends an instruction producing a fresh value named after `stem`
    fn emit_value(&mut self, kind: InstKind, ty: IrType, stem: &str) -> Operand {
        let result = self.function_mut().new_value(ty, stem);
        self.push_instruction(Instruction {
            result: Some(result),
            kind,
        });

        Operand::Value(result)
    }

    fn operand_ty(&self, operand: &Operand) -> IrType {
        self.function().operand_ty(operand)
    }

    /* Local environment */

    fn bind_local(&mut self, name: String, slot: Slot) {
        self.environment
            .last_mut()
            .expect("environment is never empty inside a body")
            .insert(name, slot);
    }

    fn resolve_local(&self, name: &str) -> Result<Slot, GenError> {
        for frame in self.environment.iter().rev() {
            if let Some(slot) = frame.get(name) {
                return Ok(*slot);
            }
        }

        Err(GenError::UnknownLocal(name.to_string()))
    }

    /* Statements */

    fn emit_statement(&mut self, statement: &Statement) -> Result<(), GenError> {
        // Code after a terminator lands in a fresh unreachable block instead
        // of corrupting the terminated one
        if self.current_block_terminated() {
            let dead = self.function_mut().append_block("dead");
            self.current_block = Some(dead);
        }

        match &statement.kind {
            StatementKind::VariableDecl(decl) => self.emit_variable_decl(decl),
            StatementKind::Assignment { target, value } => self.emit_assignment(target, value),
            StatementKind::If {
                condition,
                positive,
                negative,
            } => self.emit_if(condition, positive, negative.as_deref()),
            StatementKind::While { condition, body } => self.emit_while(condition, body),
            StatementKind::For { .. } => Err(GenError::NotImplemented("the 'for' statement")),
            StatementKind::Return(value) => self.emit_return(value.as_ref()),
            StatementKind::Expression(expression) => {
                self.emit_expression(expression)?;
                Ok(())
            }
            StatementKind::Block(statements) => {
                self.environment.push(HashMap::new());

                for statement in statements {
                    self.emit_statement(statement)?;
                }

                self.environment.pop();
                Ok(())
            }
        }
    }

    fn emit_variable_decl(&mut self, decl: &VariableDecl) -> Result<(), GenError> {
        let ty = map_type(decl.ty.ty)?;

        let initializer = self.emit_expression(&decl.initializer)?;
        let address = self.emit_value(InstKind::Alloca { ty }, IrType::Ptr, &decl.name.name);
        let initializer = self.cast_to_type(initializer, ty);

        self.push_instruction(Instruction {
            result: None,
            kind: InstKind::Store {
                value: initializer,
                address,
            },
        });

        let Operand::Value(address) = address else {
            unreachable!("emit_value returns a value operand");
        };
        self.bind_local(decl.name.name.clone(), Slot { address, ty });

        Ok(())
    }

    fn emit_assignment(&mut self, target: &Identifier, value: &Expression) -> Result<(), GenError> {
        let slot = self.resolve_local(&target.name)?;
        let value = self.emit_expression(value)?;
        let value = self.cast_to_type(value, slot.ty);

        self.push_instruction(Instruction {
            result: None,
            kind: InstKind::Store {
                value,
                address: Operand::Value(slot.address),
            },
        });

        Ok(())
    }

    fn emit_if(
        &mut self,
        condition: &Expression,
        positive: &Statement,
        negative: Option<&Statement>,
    ) -> Result<(), GenError> {
        let condition = self.emit_expression(condition)?;
        let condition_ty = self.operand_ty(&condition);

        if !condition_ty.is_bool() {
            return Err(GenError::NonBoolCondition(condition_ty));
        }

        let then_block = self.function_mut().append_block("then");
        let else_block = self.function_mut().append_block("else");
        let merge_block = self.function_mut().append_block("endif");

        self.set_terminator(Terminator::CondBranch {
            condition,
            positive: then_block,
            negative: else_block,
        });

        self.current_block = Some(then_block);
        self.emit_statement(positive)?;

        if !self.current_block_terminated() {
            self.set_terminator(Terminator::Branch {
                target: merge_block,
            });
        }

        self.current_block = Some(else_block);

        if let Some(negative) = negative {
            self.emit_statement(negative)?;
        }

        if !self.current_block_terminated() {
            self.set_terminator(Terminator::Branch {
                target: merge_block,
            });
        }

        self.current_block = Some(merge_block);

        Ok(())
    }

    fn emit_while(&mut self, condition: &Expression, body: &Statement) -> Result<(), GenError> {
        let cond_block = self.function_mut().append_block("whilecond");
        let body_block = self.function_mut().append_block("whilebody");
        let end_block = self.function_mut().append_block("whileend");

        self.set_terminator(Terminator::Branch { target: cond_block });

        // The condition re-evaluates on every iteration, so it lives in its
        // own block
        self.current_block = Some(cond_block);
        let condition = self.emit_expression(condition)?;
        let condition_ty = self.operand_ty(&condition);

        if !condition_ty.is_bool() {
            return Err(GenError::NonBoolCondition(condition_ty));
        }

        self.set_terminator(Terminator::CondBranch {
            condition,
            positive: body_block,
            negative: end_block,
        });

        self.current_block = Some(body_block);
        self.emit_statement(body)?;

        if !self.current_block_terminated() {
            self.set_terminator(Terminator::Branch { target: cond_block });
        }

        self.current_block = Some(end_block);

        Ok(())
    }

    fn emit_return(&mut self, value: Option<&Expression>) -> Result<(), GenError> {
        match value {
            Some(value) => {
                let value = self.emit_expression(value)?;
                let return_type = self.function().return_type;
                let value = self.cast_to_type(value, return_type);

                self.set_terminator(Terminator::Return { value: Some(value) });
            }
            None => self.set_terminator(Terminator::Return { value: None }),
        }

        Ok(())
    }

    /* Expressions */

    fn emit_expression(&mut self, expression: &Expression) -> Result<Operand, GenError> {
        match &expression.kind {
            ExpressionKind::IntegerLiteral(value) => Ok(Operand::Const(Constant::Int {
                width: IntWidth::I32,
                value: *value,
            })),
            ExpressionKind::FloatLiteral(value) => Ok(Operand::Const(Constant::Float {
                width: FloatWidth::F32,
                // round through f32 now; the slot really is single precision
                value: (*value as f32) as f64,
            })),
            ExpressionKind::BooleanLiteral(value) => Ok(Operand::Const(Constant::bool(*value))),
            ExpressionKind::StringLiteral(_) => {
                Err(GenError::UnsupportedType(PrimitiveType::String))
            }
            ExpressionKind::Identifier(name) => {
                let slot = self.resolve_local(name)?;
                let stem = format!("{name}_val");

                Ok(self.emit_value(
                    InstKind::Load {
                        ty: slot.ty,
                        address: Operand::Value(slot.address),
                    },
                    slot.ty,
                    &stem,
                ))
            }
            ExpressionKind::Unary { operator, operand } => self.emit_unary(*operator, operand),
            ExpressionKind::Binary { lhs, operator, rhs } => {
                self.emit_binary(lhs, *operator, rhs)
            }
            ExpressionKind::Call { callee, arguments } => self.emit_call(callee, arguments),
            ExpressionKind::Cast { operand, ty } => {
                let operand = self.emit_expression(operand)?;
                let target = map_type(ty.ty)?;

                Ok(self.cast_to_type(operand, target))
            }
        }
    }

    fn emit_unary(
        &mut self,
        operator: UnaryOperatorKind,
        operand: &Expression,
    ) -> Result<Operand, GenError> {
        let operand = self.emit_expression(operand)?;
        let ty = self.operand_ty(&operand);

        match operator {
            UnaryOperatorKind::Negate => {
                if ty.is_integer() {
                    let zero = Operand::Const(Constant::Int {
                        width: match ty {
                            IrType::Int(width) => width,
                            _ => unreachable!("is_integer checked"),
                        },
                        value: 0,
                    });

                    Ok(self.emit_value(
                        InstKind::IntBinary {
                            op: IntBinaryOp::Sub,
                            lhs: zero,
                            rhs: operand,
                        },
                        ty,
                        "neg",
                    ))
                } else if ty.is_float() {
                    Ok(self.emit_value(InstKind::FloatNeg { operand }, ty, "fneg"))
                } else {
                    Err(GenError::IncompatibleOperands {
                        operation: "unary -".to_string(),
                        lhs: ty,
                        rhs: ty,
                    })
                }
            }
            UnaryOperatorKind::LogicalNot => {
                if !ty.is_bool() {
                    return Err(GenError::IncompatibleOperands {
                        operation: "!".to_string(),
                        lhs: ty,
                        rhs: ty,
                    });
                }

                Ok(self.emit_value(
                    InstKind::IntBinary {
                        op: IntBinaryOp::Xor,
                        lhs: operand,
                        rhs: Operand::Const(Constant::bool(true)),
                    },
                    IrType::BOOL,
                    "not",
                ))
            }
        }
    }

    fn emit_binary(
        &mut self,
        lhs: &Expression,
        operator: BinaryOperatorKind,
        rhs: &Expression,
    ) -> Result<Operand, GenError> {
        let lhs = self.emit_expression(lhs)?;
        let rhs = self.emit_expression(rhs)?;

        match operator.class() {
            BinaryOperatorClass::Logical => self.emit_logical(operator, lhs, rhs),
            BinaryOperatorClass::Arithmetic => self.emit_arithmetic(operator, lhs, rhs),
            BinaryOperatorClass::Comparison => self.emit_comparison(operator, lhs, rhs),
        }
    }

    fn emit_logical(
        &mut self,
        operator: BinaryOperatorKind,
        lhs: Operand,
        rhs: Operand,
    ) -> Result<Operand, GenError> {
        let (lhs_ty, rhs_ty) = (self.operand_ty(&lhs), self.operand_ty(&rhs));

        if !lhs_ty.is_bool() || !rhs_ty.is_bool() {
            return Err(GenError::IncompatibleOperands {
                operation: operator.to_string(),
                lhs: lhs_ty,
                rhs: rhs_ty,
            });
        }

        // Bitwise on i1; both sides were already evaluated, there is no
        // short circuit
        let (op, stem) = match operator {
            BinaryOperatorKind::LogicalAnd => (IntBinaryOp::And, "and"),
            BinaryOperatorKind::LogicalOr => (IntBinaryOp::Or, "or"),
            _ => unreachable!("caller matched the logical class"),
        };

        Ok(self.emit_value(InstKind::IntBinary { op, lhs, rhs }, IrType::BOOL, stem))
    }

    /// Brings two operands to a common numeric type: the wider float if any
    /// float is involved, otherwise the wider integer
    fn unify_numeric(
        &mut self,
        operation: &str,
        lhs: Operand,
        rhs: Operand,
    ) -> Result<(Operand, Operand, IrType), GenError> {
        let (lhs_ty, rhs_ty) = (self.operand_ty(&lhs), self.operand_ty(&rhs));

        if lhs_ty == rhs_ty {
            return Ok((lhs, rhs, lhs_ty));
        }

        let common = match (lhs_ty, rhs_ty) {
            (IrType::Float(a), IrType::Float(b)) => IrType::Float(a.max(b)),
            (IrType::Float(a), IrType::Int(b)) | (IrType::Int(b), IrType::Float(a))
                if b != IntWidth::I1 =>
            {
                IrType::Float(a)
            }
            (IrType::Int(a), IrType::Int(b)) if a != IntWidth::I1 && b != IntWidth::I1 => {
                IrType::Int(a.max(b))
            }
            _ => {
                return Err(GenError::IncompatibleOperands {
                    operation: operation.to_string(),
                    lhs: lhs_ty,
                    rhs: rhs_ty,
                });
            }
        };

        let lhs = self.cast_to_type(lhs, common);
        let rhs = self.cast_to_type(rhs, common);

        Ok((lhs, rhs, common))
    }

    fn emit_arithmetic(
        &mut self,
        operator: BinaryOperatorKind,
        lhs: Operand,
        rhs: Operand,
    ) -> Result<Operand, GenError> {
        let (lhs, rhs, ty) = self.unify_numeric(&operator.to_string(), lhs, rhs)?;

        if ty.is_integer() {
            let (op, stem) = match operator {
                BinaryOperatorKind::Add => (IntBinaryOp::Add, "add"),
                BinaryOperatorKind::Subtract => (IntBinaryOp::Sub, "sub"),
                BinaryOperatorKind::Multiply => (IntBinaryOp::Mul, "mul"),
                BinaryOperatorKind::Divide => (IntBinaryOp::Sdiv, "sdiv"),
                BinaryOperatorKind::Modulus => (IntBinaryOp::Srem, "srem"),
                _ => unreachable!("caller matched the arithmetic class"),
            };

            return Ok(self.emit_value(InstKind::IntBinary { op, lhs, rhs }, ty, stem));
        }

        if ty.is_float() {
            let (op, stem) = match operator {
                BinaryOperatorKind::Add => (FloatBinaryOp::Fadd, "fadd"),
                BinaryOperatorKind::Subtract => (FloatBinaryOp::Fsub, "fsub"),
                BinaryOperatorKind::Multiply => (FloatBinaryOp::Fmul, "fmul"),
                BinaryOperatorKind::Divide => (FloatBinaryOp::Fdiv, "fdiv"),
                BinaryOperatorKind::Modulus => {
                    return Err(GenError::IncompatibleOperands {
                        operation: "%".to_string(),
                        lhs: ty,
                        rhs: ty,
                    });
                }
                _ => unreachable!("caller matched the arithmetic class"),
            };

            return Ok(self.emit_value(InstKind::FloatBinary { op, lhs, rhs }, ty, stem));
        }

        Err(GenError::IncompatibleOperands {
            operation: operator.to_string(),
            lhs: ty,
            rhs: ty,
        })
    }

    fn emit_comparison(
        &mut self,
        operator: BinaryOperatorKind,
        lhs: Operand,
        rhs: Operand,
    ) -> Result<Operand, GenError> {
        let (lhs, rhs, ty) = self.unify_numeric(&operator.to_string(), lhs, rhs)?;

        if matches!(ty, IrType::Int(_)) {
            let predicate = match operator {
                BinaryOperatorKind::Equals => IntPredicate::Eq,
                BinaryOperatorKind::NotEquals => IntPredicate::Ne,
                BinaryOperatorKind::LessThan => IntPredicate::Slt,
                BinaryOperatorKind::LessThanOrEqualTo => IntPredicate::Sle,
                BinaryOperatorKind::GreaterThan => IntPredicate::Sgt,
                BinaryOperatorKind::GreaterThanOrEqualTo => IntPredicate::Sge,
                _ => unreachable!("caller matched the comparison class"),
            };

            return Ok(self.emit_value(
                InstKind::IntCompare {
                    predicate,
                    lhs,
                    rhs,
                },
                IrType::BOOL,
                "icmp",
            ));
        }

        if ty.is_float() {
            let predicate = match operator {
                BinaryOperatorKind::Equals => FloatPredicate::Oeq,
                BinaryOperatorKind::NotEquals => FloatPredicate::One,
                BinaryOperatorKind::LessThan => FloatPredicate::Olt,
                BinaryOperatorKind::LessThanOrEqualTo => FloatPredicate::Ole,
                BinaryOperatorKind::GreaterThan => FloatPredicate::Ogt,
                BinaryOperatorKind::GreaterThanOrEqualTo => FloatPredicate::Oge,
                _ => unreachable!("caller matched the comparison class"),
            };

            return Ok(self.emit_value(
                InstKind::FloatCompare {
                    predicate,
                    lhs,
                    rhs,
                },
                IrType::BOOL,
                "fcmp",
            ));
        }

        Err(GenError::IncompatibleOperands {
            operation: operator.to_string(),
            lhs: ty,
            rhs: ty,
        })
    }

    fn emit_call(
        &mut self,
        callee: &Identifier,
        arguments: &[Expression],
    ) -> Result<Operand, GenError> {
        let Some(id) = self.module.function_by_name(&callee.name) else {
            return Err(GenError::UndefinedFunction(callee.name.clone()));
        };

        let (param_types, return_type) = {
            let callee = &self.module.functions[id];
            (callee.param_types.clone(), callee.return_type)
        };

        let mut lowered = Vec::with_capacity(arguments.len());

        for (argument, param_ty) in arguments.iter().zip(&param_types) {
            let argument = self.emit_expression(argument)?;
            lowered.push(self.cast_to_type(argument, *param_ty));
        }

        if return_type == IrType::Void {
            self.push_instruction(Instruction {
                result: None,
                kind: InstKind::Call {
                    callee: id,
                    arguments: lowered,
                },
            });

            // void calls produce nothing; a placeholder false never escapes
            // because the analyzer rejects using a void value
            return Ok(Operand::Const(Constant::bool(false)));
        }

        Ok(self.emit_value(
            InstKind::Call {
                callee: id,
                arguments: lowered,
            },
            return_type,
            "calltmp",
        ))
    }

    /// Implicit conversion applied at store, return, and call-argument
    /// sites. Deterministic and idempotent: converting a value to its own
    /// type returns it untouched, and unconvertible pairings pass through
    /// for the verifier to catch.
    fn cast_to_type(&mut self, value: Operand, to: IrType) -> Operand {
        let from = self.operand_ty(&value);

        if from == to {
            return value;
        }

        match (from, to) {
            (IrType::Int(src), IrType::Int(dst))
                if src != IntWidth::I1 && dst != IntWidth::I1 =>
            {
                if src < dst {
                    self.emit_value(
                        InstKind::Cast {
                            kind: CastKind::Sext,
                            operand: value,
                            to,
                        },
                        to,
                        "sext",
                    )
                } else {
                    self.emit_value(
                        InstKind::Cast {
                            kind: CastKind::Trunc,
                            operand: value,
                            to,
                        },
                        to,
                        "trunc",
                    )
                }
            }
            (IrType::Float(src), IrType::Float(dst)) => {
                let (kind, stem) = if src < dst {
                    (CastKind::Fpext, "fpext")
                } else {
                    (CastKind::Fptrunc, "fptrunc")
                };

                self.emit_value(
                    InstKind::Cast {
                        kind,
                        operand: value,
                        to,
                    },
                    to,
                    stem,
                )
            }
            (IrType::Int(src), IrType::Float(_)) if src != IntWidth::I1 => self.emit_value(
                InstKind::Cast {
                    kind: CastKind::Sitofp,
                    operand: value,
                    to,
                },
                to,
                "sitofp",
            ),
            (IrType::Float(_), IrType::Int(dst)) if dst != IntWidth::I1 => self.emit_value(
                InstKind::Cast {
                    kind: CastKind::Fptosi,
                    operand: value,
                    to,
                },
                to,
                "fptosi",
            ),
            _ => value,
        }
    }
}

/// Language type → backend type. Signedness maps away (operation choice
/// carries it); `string` has no representation here yet.
fn map_type(ty: PrimitiveType) -> Result<IrType, GenError> {
    match ty {
        PrimitiveType::I8 | PrimitiveType::U8 => Ok(IrType::Int(IntWidth::I8)),
        PrimitiveType::I16 | PrimitiveType::U16 => Ok(IrType::Int(IntWidth::I16)),
        PrimitiveType::I32 | PrimitiveType::U32 => Ok(IrType::Int(IntWidth::I32)),
        PrimitiveType::I64 | PrimitiveType::U64 => Ok(IrType::Int(IntWidth::I64)),
        PrimitiveType::F32 => Ok(IrType::Float(FloatWidth::F32)),
        PrimitiveType::F64 => Ok(IrType::Float(FloatWidth::F64)),
        PrimitiveType::Bool => Ok(IrType::BOOL),
        PrimitiveType::Void => Ok(IrType::Void),
        PrimitiveType::String | PrimitiveType::Unknown => Err(GenError::UnsupportedType(ty)),
    }
}

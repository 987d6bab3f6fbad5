//! Module verification. Emission must never hand malformed IR to the
//! backend, so every generated module passes through here before it is
//! printed or lowered further.

use thiserror::Error;

use crate::{
    index::Index,
    ir::{Block, BlockId, Function, InstKind, IrType, Module, Operand, Terminator},
};

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("block '{block}' in function '{function}' has no terminator")]
    MissingTerminator { function: String, block: String },

    #[error("branch in function '{function}' targets a nonexistent block")]
    InvalidBranchTarget { function: String },

    #[error("conditional branch in function '{function}' has a non-i1 condition of type {found}")]
    NonBoolCondition { function: String, found: IrType },

    #[error(
        "operand types {lhs} and {rhs} of '{instruction}' in function '{function}' do not match"
    )]
    OperandMismatch {
        function: String,
        instruction: String,
        lhs: IrType,
        rhs: IrType,
    },

    #[error("'{instruction}' in function '{function}' expects {expected} operands, found {found}")]
    OperandKind {
        function: String,
        instruction: String,
        expected: &'static str,
        found: IrType,
    },

    #[error("function '{function}' returns {found} but is declared to return {expected}")]
    ReturnTypeMismatch {
        function: String,
        expected: IrType,
        found: IrType,
    },

    #[error("call to '{callee}' in function '{function}' passes {found} arguments, expected {expected}")]
    CallArityMismatch {
        function: String,
        callee: String,
        expected: usize,
        found: usize,
    },
}

impl Module {
    pub fn verify(&self) -> Result<(), VerifyError> {
        for function in self.functions.iter().filter(|f| !f.is_declaration()) {
            verify_function(self, function)?;
        }

        Ok(())
    }
}

fn verify_function(module: &Module, function: &Function) -> Result<(), VerifyError> {
    for block in function.blocks.iter() {
        let Some(terminator) = &block.terminator else {
            return Err(VerifyError::MissingTerminator {
                function: function.name.clone(),
                block: block.label.clone(),
            });
        };

        for instruction in &block.instructions {
            verify_instruction(module, function, &instruction.kind)?;
        }

        verify_terminator(function, block, terminator)?;
    }

    Ok(())
}

fn check_target(function: &Function, target: BlockId) -> Result<(), VerifyError> {
    if target.index() >= function.blocks.len() {
        return Err(VerifyError::InvalidBranchTarget {
            function: function.name.clone(),
        });
    }

    Ok(())
}

fn verify_terminator(
    function: &Function,
    _block: &Block,
    terminator: &Terminator,
) -> Result<(), VerifyError> {
    match terminator {
        Terminator::Branch { target } => check_target(function, *target),
        Terminator::CondBranch {
            condition,
            positive,
            negative,
        } => {
            check_target(function, *positive)?;
            check_target(function, *negative)?;

            let found = function.operand_ty(condition);
            if !found.is_bool() {
                return Err(VerifyError::NonBoolCondition {
                    function: function.name.clone(),
                    found,
                });
            }

            Ok(())
        }
        Terminator::Return { value } => {
            let found = match value {
                Some(value) => function.operand_ty(value),
                None => IrType::Void,
            };

            if found != function.return_type {
                return Err(VerifyError::ReturnTypeMismatch {
                    function: function.name.clone(),
                    expected: function.return_type,
                    found,
                });
            }

            Ok(())
        }
    }
}

fn verify_instruction(
    module: &Module,
    function: &Function,
    kind: &InstKind,
) -> Result<(), VerifyError> {
    let matching_operands = |name: &str, lhs: &Operand, rhs: &Operand| {
        let (lhs, rhs) = (function.operand_ty(lhs), function.operand_ty(rhs));

        if lhs != rhs {
            return Err(VerifyError::OperandMismatch {
                function: function.name.clone(),
                instruction: name.to_string(),
                lhs,
                rhs,
            });
        }

        Ok(lhs)
    };

    let expect = |name: &str, expected: &'static str, ok: bool, found: IrType| {
        if ok {
            Ok(())
        } else {
            Err(VerifyError::OperandKind {
                function: function.name.clone(),
                instruction: name.to_string(),
                expected,
                found,
            })
        }
    };

    match kind {
        InstKind::Alloca { .. } => Ok(()),
        InstKind::Load { address, .. } | InstKind::Store { address, .. } => {
            let found = function.operand_ty(address);
            expect("load/store", "a pointer address", found == IrType::Ptr, found)
        }
        InstKind::IntBinary { op, lhs, rhs } => {
            let ty = matching_operands(&op.to_string(), lhs, rhs)?;
            expect(
                &op.to_string(),
                "integer operands",
                matches!(ty, IrType::Int(_)),
                ty,
            )
        }
        InstKind::FloatBinary { op, lhs, rhs } => {
            let ty = matching_operands(&op.to_string(), lhs, rhs)?;
            expect(&op.to_string(), "float operands", ty.is_float(), ty)
        }
        InstKind::IntCompare { lhs, rhs, .. } => {
            let ty = matching_operands("icmp", lhs, rhs)?;
            expect("icmp", "integer operands", matches!(ty, IrType::Int(_)), ty)
        }
        InstKind::FloatCompare { lhs, rhs, .. } => {
            let ty = matching_operands("fcmp", lhs, rhs)?;
            expect("fcmp", "float operands", ty.is_float(), ty)
        }
        InstKind::FloatNeg { operand } => {
            let found = function.operand_ty(operand);
            expect("fneg", "a float operand", found.is_float(), found)
        }
        InstKind::Cast { .. } => Ok(()),
        InstKind::Call { callee, arguments } => {
            let callee = &module.functions[*callee];

            if callee.param_types.len() != arguments.len() {
                return Err(VerifyError::CallArityMismatch {
                    function: function.name.clone(),
                    callee: callee.name.clone(),
                    expected: callee.param_types.len(),
                    found: arguments.len(),
                });
            }

            Ok(())
        }
    }
}

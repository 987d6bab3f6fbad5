//! The optimization pass pipeline.
//!
//! These are cleanup passes over the generator's output: fold what is
//! constant, collapse branches that only go one way, drop blocks nothing can
//! reach, and stitch straight-line chains back together. Every pass keeps
//! the module verifiable; the pipeline's caller re-verifies afterwards.

use hashbrown::{HashMap, HashSet};

use crate::ir::{
    BlockId, Constant, FloatBinaryOp, FloatPredicate, FloatWidth, Function, InstKind, IntBinaryOp,
    IntPredicate, IntWidth, Module, Operand, Terminator, ValueId,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OptLevel {
    O0,
    O1,
    #[default]
    O2,
    O3,
}

impl OptLevel {
    /// Numeric levels clamp into the supported range
    pub fn from_level(level: u8) -> Self {
        match level.min(3) {
            0 => Self::O0,
            1 => Self::O1,
            2 => Self::O2,
            _ => Self::O3,
        }
    }
}

pub fn optimize_module(module: &mut Module, level: OptLevel) {
    if level == OptLevel::O0 {
        return;
    }

    for function in module.functions.iter_mut() {
        if function.is_declaration() {
            continue;
        }

        optimize_function(function, level);
    }
}

fn optimize_function(function: &mut Function, level: OptLevel) {
    let single_round = |function: &mut Function| {
        let mut changed = false;
        changed |= fold_constants(function);
        changed |= simplify_branches(function);
        changed |= remove_unreachable_blocks(function);
        changed |= eliminate_dead_instructions(function);
        changed
    };

    match level {
        OptLevel::O0 => {}
        OptLevel::O1 => {
            single_round(function);
        }
        OptLevel::O2 | OptLevel::O3 => {
            // Run to a fixpoint; the bound is paranoia, not an expectation
            for _ in 0..10 {
                let mut changed = single_round(function);
                changed |= thread_jumps(function);
                changed |= merge_blocks(function);

                if !changed {
                    break;
                }
            }

            if level == OptLevel::O3 {
                fold_constants(function);
                eliminate_dead_instructions(function);
            }
        }
    }
}

/// Wraps `value` to `width` bits with sign extension, mirroring what the
/// machine arithmetic will do
fn wrap(value: i64, width: IntWidth) -> i64 {
    let bits = width.bits();

    if bits >= 64 {
        return value;
    }

    (value << (64 - bits)) >> (64 - bits)
}

fn fold_int(op: IntBinaryOp, lhs: i64, rhs: i64, width: IntWidth) -> Option<i64> {
    let value = match op {
        IntBinaryOp::Add => lhs.wrapping_add(rhs),
        IntBinaryOp::Sub => lhs.wrapping_sub(rhs),
        IntBinaryOp::Mul => lhs.wrapping_mul(rhs),
        // Division by zero is left in place for the backend to deal with
        IntBinaryOp::Sdiv if rhs != 0 => lhs.wrapping_div(rhs),
        IntBinaryOp::Srem if rhs != 0 => lhs.wrapping_rem(rhs),
        IntBinaryOp::Sdiv | IntBinaryOp::Srem => return None,
        IntBinaryOp::And => lhs & rhs,
        IntBinaryOp::Or => lhs | rhs,
        IntBinaryOp::Xor => lhs ^ rhs,
    };

    Some(wrap(value, width))
}

fn fold_float(op: FloatBinaryOp, lhs: f64, rhs: f64, width: FloatWidth) -> f64 {
    let value = match op {
        FloatBinaryOp::Fadd => lhs + rhs,
        FloatBinaryOp::Fsub => lhs - rhs,
        FloatBinaryOp::Fmul => lhs * rhs,
        FloatBinaryOp::Fdiv => lhs / rhs,
    };

    match width {
        // Round through f32 so folding matches runtime single precision
        FloatWidth::F32 => (value as f32) as f64,
        FloatWidth::F64 => value,
    }
}

fn fold_int_compare(predicate: IntPredicate, lhs: i64, rhs: i64) -> bool {
    match predicate {
        IntPredicate::Eq => lhs == rhs,
        IntPredicate::Ne => lhs != rhs,
        IntPredicate::Slt => lhs < rhs,
        IntPredicate::Sle => lhs <= rhs,
        IntPredicate::Sgt => lhs > rhs,
        IntPredicate::Sge => lhs >= rhs,
    }
}

/// Ordered predicates are false whenever either side is NaN
fn fold_float_compare(predicate: FloatPredicate, lhs: f64, rhs: f64) -> bool {
    if lhs.is_nan() || rhs.is_nan() {
        return false;
    }

    match predicate {
        FloatPredicate::Oeq => lhs == rhs,
        FloatPredicate::One => lhs != rhs,
        FloatPredicate::Olt => lhs < rhs,
        FloatPredicate::Ole => lhs <= rhs,
        FloatPredicate::Ogt => lhs > rhs,
        FloatPredicate::Oge => lhs >= rhs,
    }
}

fn as_const(operand: &Operand) -> Option<Constant> {
    match operand {
        Operand::Const(constant) => Some(*constant),
        Operand::Value(_) => None,
    }
}

/// Evaluates instructions whose operands are all constants, replaces their
/// uses with the result, and deletes them
fn fold_constants(function: &mut Function) -> bool {
    let mut folded: HashMap<ValueId, Constant> = HashMap::new();

    for block in function.blocks.iter() {
        for instruction in &block.instructions {
            let Some(result) = instruction.result else {
                continue;
            };

            let constant = match &instruction.kind {
                InstKind::IntBinary { op, lhs, rhs } => {
                    match (as_const(lhs), as_const(rhs)) {
                        (
                            Some(Constant::Int { width, value: a }),
                            Some(Constant::Int { value: b, .. }),
                        ) => fold_int(*op, a, b, width)
                            .map(|value| Constant::Int { width, value }),
                        _ => None,
                    }
                }
                InstKind::FloatBinary { op, lhs, rhs } => {
                    match (as_const(lhs), as_const(rhs)) {
                        (
                            Some(Constant::Float { width, value: a }),
                            Some(Constant::Float { value: b, .. }),
                        ) => Some(Constant::Float {
                            width,
                            value: fold_float(*op, a, b, width),
                        }),
                        _ => None,
                    }
                }
                InstKind::IntCompare {
                    predicate,
                    lhs,
                    rhs,
                } => match (as_const(lhs), as_const(rhs)) {
                    (
                        Some(Constant::Int { value: a, .. }),
                        Some(Constant::Int { value: b, .. }),
                    ) => Some(Constant::bool(fold_int_compare(*predicate, a, b))),
                    _ => None,
                },
                InstKind::FloatCompare {
                    predicate,
                    lhs,
                    rhs,
                } => match (as_const(lhs), as_const(rhs)) {
                    (
                        Some(Constant::Float { value: a, .. }),
                        Some(Constant::Float { value: b, .. }),
                    ) => Some(Constant::bool(fold_float_compare(*predicate, a, b))),
                    _ => None,
                },
                InstKind::FloatNeg { operand } => match as_const(operand) {
                    Some(Constant::Float { width, value }) => Some(Constant::Float {
                        width,
                        value: -value,
                    }),
                    _ => None,
                },
                _ => None,
            };

            if let Some(constant) = constant {
                folded.insert(result, constant);
            }
        }
    }

    if folded.is_empty() {
        return false;
    }

    for block in function.blocks.iter_mut() {
        block
            .instructions
            .retain(|i| !i.result.is_some_and(|r| folded.contains_key(&r)));

        for instruction in &mut block.instructions {
            substitute_instruction(instruction, &folded);
        }

        if let Some(terminator) = &mut block.terminator {
            substitute_terminator(terminator, &folded);
        }
    }

    true
}

fn substitute_operand(operand: &mut Operand, folded: &HashMap<ValueId, Constant>) {
    if let Operand::Value(id) = operand {
        if let Some(constant) = folded.get(id) {
            *operand = Operand::Const(*constant);
        }
    }
}

fn substitute_instruction(
    instruction: &mut crate::ir::Instruction,
    folded: &HashMap<ValueId, Constant>,
) {
    match &mut instruction.kind {
        InstKind::Alloca { .. } => {}
        InstKind::Load { address, .. } => substitute_operand(address, folded),
        InstKind::Store { value, address } => {
            substitute_operand(value, folded);
            substitute_operand(address, folded);
        }
        InstKind::IntBinary { lhs, rhs, .. }
        | InstKind::FloatBinary { lhs, rhs, .. }
        | InstKind::IntCompare { lhs, rhs, .. }
        | InstKind::FloatCompare { lhs, rhs, .. } => {
            substitute_operand(lhs, folded);
            substitute_operand(rhs, folded);
        }
        InstKind::FloatNeg { operand } => substitute_operand(operand, folded),
        InstKind::Cast { operand, .. } => substitute_operand(operand, folded),
        InstKind::Call { arguments, .. } => {
            for argument in arguments {
                substitute_operand(argument, folded);
            }
        }
    }
}

fn substitute_terminator(terminator: &mut Terminator, folded: &HashMap<ValueId, Constant>) {
    match terminator {
        Terminator::Branch { .. } => {}
        Terminator::CondBranch { condition, .. } => substitute_operand(condition, folded),
        Terminator::Return { value: Some(value) } => substitute_operand(value, folded),
        Terminator::Return { value: None } => {}
    }
}

/// Conditional branches on a constant become unconditional
fn simplify_branches(function: &mut Function) -> bool {
    let mut changed = false;

    for block in function.blocks.iter_mut() {
        let Some(Terminator::CondBranch {
            condition: Operand::Const(Constant::Int { value, .. }),
            positive,
            negative,
        }) = block.terminator
        else {
            continue;
        };

        block.terminator = Some(Terminator::Branch {
            target: if value != 0 { positive } else { negative },
        });
        changed = true;
    }

    changed
}

/// Drops every block unreachable from the entry and renumbers the rest
fn remove_unreachable_blocks(function: &mut Function) -> bool {
    let mut reachable = HashSet::new();
    let mut worklist = vec![BlockId::ENTRY];

    while let Some(block) = worklist.pop() {
        if !reachable.insert(block) {
            continue;
        }

        match &function.blocks[block].terminator {
            Some(Terminator::Branch { target }) => worklist.push(*target),
            Some(Terminator::CondBranch {
                positive, negative, ..
            }) => {
                worklist.push(*positive);
                worklist.push(*negative);
            }
            Some(Terminator::Return { .. }) | None => {}
        }
    }

    if reachable.len() == function.blocks.len() {
        return false;
    }

    let old_blocks = std::mem::take(&mut function.blocks);
    let mut remap: HashMap<BlockId, BlockId> = HashMap::new();

    for (old_id, block) in old_blocks.raw.into_iter().enumerate() {
        use crate::index::Index;
        let old_id = BlockId::new(old_id);

        if reachable.contains(&old_id) {
            let new_id = function.blocks.push(block);
            remap.insert(old_id, new_id);
        }
    }

    for block in function.blocks.iter_mut() {
        match &mut block.terminator {
            Some(Terminator::Branch { target }) => *target = remap[target],
            Some(Terminator::CondBranch {
                positive, negative, ..
            }) => {
                *positive = remap[positive];
                *negative = remap[negative];
            }
            Some(Terminator::Return { .. }) | None => {}
        }
    }

    true
}

/// Removes side-effect-free instructions whose results nothing uses.
/// Stores and calls always stay; an alloca stays as long as anything still
/// takes its address.
fn eliminate_dead_instructions(function: &mut Function) -> bool {
    let mut used: HashSet<ValueId> = HashSet::new();

    let mark = |operand: &Operand, used: &mut HashSet<ValueId>| {
        if let Operand::Value(id) = operand {
            used.insert(*id);
        }
    };

    for block in function.blocks.iter() {
        for instruction in &block.instructions {
            match &instruction.kind {
                InstKind::Alloca { .. } => {}
                InstKind::Load { address, .. } => mark(address, &mut used),
                InstKind::Store { value, address } => {
                    mark(value, &mut used);
                    mark(address, &mut used);
                }
                InstKind::IntBinary { lhs, rhs, .. }
                | InstKind::FloatBinary { lhs, rhs, .. }
                | InstKind::IntCompare { lhs, rhs, .. }
                | InstKind::FloatCompare { lhs, rhs, .. } => {
                    mark(lhs, &mut used);
                    mark(rhs, &mut used);
                }
                InstKind::FloatNeg { operand } => mark(operand, &mut used),
                InstKind::Cast { operand, .. } => mark(operand, &mut used),
                InstKind::Call { arguments, .. } => {
                    for argument in arguments {
                        mark(argument, &mut used);
                    }
                }
            }
        }

        match &block.terminator {
            Some(Terminator::CondBranch { condition, .. }) => mark(condition, &mut used),
            Some(Terminator::Return { value: Some(value) }) => mark(value, &mut used),
            _ => {}
        }
    }

    let mut changed = false;

    for block in function.blocks.iter_mut() {
        let before = block.instructions.len();

        block.instructions.retain(|instruction| {
            let Some(result) = instruction.result else {
                return true;
            };

            if used.contains(&result) {
                return true;
            }

            !matches!(
                instruction.kind,
                InstKind::Alloca { .. }
                    | InstKind::Load { .. }
                    | InstKind::IntBinary { .. }
                    | InstKind::FloatBinary { .. }
                    | InstKind::IntCompare { .. }
                    | InstKind::FloatCompare { .. }
                    | InstKind::FloatNeg { .. }
                    | InstKind::Cast { .. }
            )
        });

        changed |= block.instructions.len() != before;
    }

    changed
}

/// Redirects branches that go through an empty block straight to where the
/// empty block was going anyway
fn thread_jumps(function: &mut Function) -> bool {
    let mut redirects: HashMap<BlockId, BlockId> = HashMap::new();

    for (id, block) in function.blocks.enumerate() {
        if id == BlockId::ENTRY || !block.instructions.is_empty() {
            continue;
        }

        if let Some(Terminator::Branch { target }) = block.terminator {
            if target != id {
                redirects.insert(id, target);
            }
        }
    }

    if redirects.is_empty() {
        return false;
    }

    let resolve = |mut id: BlockId| {
        // Follow chains, bailing if the redirects happen to form a cycle
        let mut seen = HashSet::new();
        while let Some(next) = redirects.get(&id) {
            if !seen.insert(id) {
                break;
            }
            id = *next;
        }
        id
    };

    let mut changed = false;

    for block in function.blocks.iter_mut() {
        match &mut block.terminator {
            Some(Terminator::Branch { target }) => {
                let resolved = resolve(*target);
                if resolved != *target {
                    *target = resolved;
                    changed = true;
                }
            }
            Some(Terminator::CondBranch {
                positive, negative, ..
            }) => {
                let resolved = resolve(*positive);
                if resolved != *positive {
                    *positive = resolved;
                    changed = true;
                }

                let resolved = resolve(*negative);
                if resolved != *negative {
                    *negative = resolved;
                    changed = true;
                }
            }
            Some(Terminator::Return { .. }) | None => {}
        }
    }

    changed
}

/// Merges a block into its unconditional predecessor when it is that
/// block's only successor path
fn merge_blocks(function: &mut Function) -> bool {
    let counts = function.predecessor_counts();

    let mut candidate = None;

    for (id, block) in function.blocks.enumerate() {
        if let Some(Terminator::Branch { target }) = block.terminator {
            if target != id && target != BlockId::ENTRY && counts[target] == 1 {
                candidate = Some((id, target));
                break;
            }
        }
    }

    let Some((into, from)) = candidate else {
        return false;
    };

    let (instructions, terminator) = {
        let from = &mut function.blocks[from];
        (
            std::mem::take(&mut from.instructions),
            from.terminator.take(),
        )
    };

    let into = &mut function.blocks[into];
    into.instructions.extend(instructions);
    into.terminator = terminator;

    // `from` is now unreachable and unterminated; the cleanup pass drops it
    remove_unreachable_blocks(function);

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_levels_clamp_to_the_supported_range() {
        assert_eq!(OptLevel::from_level(0), OptLevel::O0);
        assert_eq!(OptLevel::from_level(2), OptLevel::O2);
        assert_eq!(OptLevel::from_level(3), OptLevel::O3);
        assert_eq!(OptLevel::from_level(7), OptLevel::O3);
        assert_eq!(OptLevel::from_level(255), OptLevel::O3);
    }

    #[test]
    fn wrapping_respects_the_integer_width() {
        assert_eq!(wrap(300, IntWidth::I8), 44);
        assert_eq!(wrap(-1, IntWidth::I8), -1);
        assert_eq!(wrap(128, IntWidth::I8), -128);
        assert_eq!(wrap(i64::MAX, IntWidth::I64), i64::MAX);
    }

    #[test]
    fn integer_folding_wraps_and_refuses_division_by_zero() {
        assert_eq!(fold_int(IntBinaryOp::Add, 1, 2, IntWidth::I32), Some(3));
        assert_eq!(
            fold_int(IntBinaryOp::Mul, 200, 2, IntWidth::I8),
            Some(wrap(400, IntWidth::I8))
        );
        assert_eq!(fold_int(IntBinaryOp::Sdiv, 7, 0, IntWidth::I32), None);
        assert_eq!(fold_int(IntBinaryOp::Srem, 7, 0, IntWidth::I32), None);
        assert_eq!(fold_int(IntBinaryOp::Sdiv, 7, 2, IntWidth::I32), Some(3));
    }

    #[test]
    fn single_precision_folding_rounds_through_f32() {
        let folded = fold_float(FloatBinaryOp::Fadd, 0.1, 0.2, FloatWidth::F32);
        assert_eq!(folded, ((0.1f64 + 0.2f64) as f32) as f64);

        let double = fold_float(FloatBinaryOp::Fadd, 0.1, 0.2, FloatWidth::F64);
        assert_eq!(double, 0.1 + 0.2);
    }

    #[test]
    fn ordered_float_compares_are_false_on_nan() {
        assert!(!fold_float_compare(FloatPredicate::Oeq, f64::NAN, f64::NAN));
        assert!(!fold_float_compare(FloatPredicate::One, f64::NAN, 1.0));
        assert!(!fold_float_compare(FloatPredicate::Olt, f64::NAN, 1.0));
        assert!(fold_float_compare(FloatPredicate::Ole, 1.0, 1.0));
    }
}

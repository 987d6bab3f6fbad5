//! M semantic analysis.
//!
//! The pass runs in two phases over the parse tree:
//!
//!   1) signature collection: every function and extern declaration is
//!      registered in the global scope before any body is looked at, so
//!      forward references and mutual recursion type-check
//!   2) body checking: each function body is walked with its own scope,
//!      statements and expressions are typed, and everything suspicious
//!      lands in the diagnostics sink
//!
//! The pass never stops at the first problem. Expressions that fail to type
//! produce `unknown`, which satisfies every later check, so one mistake is
//! reported exactly once.

use crate::{
    frontend::ast::{
        BinaryOperatorClass, BinaryOperatorKind, Expression, ExpressionKind, ExternFunctionDecl,
        FunctionDecl, Item, Program, Statement, StatementKind, UnaryOperatorKind, VariableDecl,
    },
    middle::{
        diagnostics::{DiagnosticKind, DiagnosticSink},
        primitive::{self, PrimitiveType},
        symbol::{FunctionSymbol, Symbol, SymbolTable, VariableSymbol},
    },
};

pub struct SemanticAnalyzer<'sink> {
    symbol_table: SymbolTable,
    sink: &'sink mut DiagnosticSink,
    /// Set while checking a function body; `return` is illegal without it
    current_function: Option<FunctionSymbol>,
    has_return: bool,
}

impl<'sink> SemanticAnalyzer<'sink> {
    /// Checks a whole program, returning the populated symbol table (the
    /// sink decides whether the program was actually valid)
    pub fn check_program(program: &Program, sink: &'sink mut DiagnosticSink) -> SymbolTable {
        let mut analyzer = Self {
            symbol_table: SymbolTable::new(),
            sink,
            current_function: None,
            has_return: false,
        };

        // Phase A: collect every signature before looking at a single body
        for item in &program.items {
            match item {
                Item::Function(function) => analyzer.collect_function_signature(function),
                Item::ExternFunction(function) => analyzer.collect_extern_signature(function),
                Item::Variable(_) => {}
            }
        }

        // Phase B: check the bodies
        for item in &program.items {
            match item {
                Item::Function(function) => analyzer.check_function_body(function),
                Item::ExternFunction(_) => {}
                Item::Variable(decl) => analyzer.check_variable_decl(decl),
            }
        }

        analyzer.symbol_table
    }

    fn collect_function_signature(&mut self, function: &FunctionDecl) {
        let symbol = FunctionSymbol {
            name: function.name.name.clone(),
            return_type: function.return_type.ty,
            parameters: function
                .parameters
                .iter()
                .map(|p| VariableSymbol {
                    name: p.name.name.clone(),
                    ty: p.ty.ty,
                    is_constant: false,
                    is_initialized: false,
                    line: p.line,
                    column: p.column,
                })
                .collect(),
            local_scope: None,
            line: function.line,
            column: function.column,
        };

        if !self.symbol_table.define(Symbol::Function(symbol)) {
            self.sink
                .redefined_symbol(&function.name.name, function.line, function.column);
        }
    }

    fn collect_extern_signature(&mut self, function: &ExternFunctionDecl) {
        let symbol = FunctionSymbol {
            name: function.name.name.clone(),
            return_type: function.return_type.ty,
            parameters: function
                .parameters
                .iter()
                .map(|p| VariableSymbol {
                    name: p.name.name.clone(),
                    ty: p.ty.ty,
                    is_constant: false,
                    is_initialized: false,
                    line: p.line,
                    column: p.column,
                })
                .collect(),
            local_scope: None,
            line: function.line,
            column: function.column,
        };

        if !self.symbol_table.define(Symbol::Function(symbol)) {
            self.sink
                .redefined_symbol(&function.name.name, function.line, function.column);
        }
    }

    fn check_function_body(&mut self, function: &FunctionDecl) {
        let Some(Symbol::Function(symbol)) = self.symbol_table.resolve(&function.name.name) else {
            // a redefinition shadowed by something else; already reported
            return;
        };

        self.current_function = Some(symbol.clone());
        self.has_return = false;

        let scope = self
            .symbol_table
            .enter_scope(Some(function.name.name.as_str()));

        let parameters = self
            .current_function
            .as_ref()
            .expect("set above")
            .parameters
            .clone();

        for parameter in parameters {
            self.symbol_table.define(Symbol::Variable(VariableSymbol {
                is_initialized: true,
                ..parameter
            }));
        }

        for statement in &function.body {
            self.check_statement(statement);
        }

        let return_type = self.current_function.as_ref().expect("set above").return_type;

        // Presence-only: one top-level return satisfies the check even if
        // some path misses it
        if return_type != PrimitiveType::Void && !self.has_return {
            self.sink.error(
                DiagnosticKind::SemanticError,
                format!("Function '{}' must return a value", function.name.name),
                function.line,
                function.column,
            );
        }

        self.symbol_table.exit_scope();
        self.current_function = None;

        if let Some(Symbol::Function(symbol)) = self.symbol_table.resolve_mut(&function.name.name)
        {
            symbol.local_scope = Some(scope);
        }
    }

    fn check_statement(&mut self, statement: &Statement) {
        match &statement.kind {
            StatementKind::VariableDecl(decl) => self.check_variable_decl(decl),
            StatementKind::Assignment { target, value } => {
                self.check_assignment(target, value, statement.line, statement.column);
            }
            StatementKind::If {
                condition,
                positive,
                negative,
            } => {
                self.check_condition(condition);

                self.symbol_table.enter_scope(Some("if"));
                self.check_statement(positive);
                self.symbol_table.exit_scope();

                if let Some(negative) = negative {
                    self.symbol_table.enter_scope(Some("else"));
                    self.check_statement(negative);
                    self.symbol_table.exit_scope();
                }
            }
            StatementKind::While { condition, body } => {
                self.check_condition(condition);

                self.symbol_table.enter_scope(Some("while"));
                self.check_statement(body);
                self.symbol_table.exit_scope();
            }
            StatementKind::For {
                init,
                condition,
                step,
                body,
            } => {
                self.symbol_table.enter_scope(Some("for"));

                if let Some(init) = init {
                    self.check_statement(init);
                }

                if let Some(condition) = condition {
                    self.check_condition(condition);
                }

                if let Some(step) = step {
                    self.check_statement(step);
                }

                self.check_statement(body);
                self.symbol_table.exit_scope();
            }
            StatementKind::Return(value) => {
                self.check_return(value.as_ref(), statement.line, statement.column);
            }
            StatementKind::Expression(expression) => {
                self.check_expression(expression);
            }
            StatementKind::Block(statements) => {
                self.symbol_table.enter_scope(Some("block"));

                for statement in statements {
                    self.check_statement(statement);
                }

                self.symbol_table.exit_scope();
            }
        }
    }

    fn check_variable_decl(&mut self, decl: &VariableDecl) {
        let declared = decl.ty.ty;
        let initializer = self.check_expression(&decl.initializer);

        if !primitive::assignable(declared, initializer) {
            self.sink
                .type_error(declared, initializer, decl.line, decl.column);
        }

        let defined = self.symbol_table.define(Symbol::Variable(VariableSymbol {
            name: decl.name.name.clone(),
            ty: declared,
            is_constant: false,
            is_initialized: true,
            line: decl.line,
            column: decl.column,
        }));

        if !defined {
            self.sink
                .redefined_symbol(&decl.name.name, decl.line, decl.column);
        }
    }

    fn check_assignment(
        &mut self,
        target: &crate::frontend::ast::Identifier,
        value: &Expression,
        line: usize,
        column: usize,
    ) {
        let variable = match self.symbol_table.resolve(&target.name) {
            None => {
                self.sink.undefined_symbol(&target.name, line, column);
                self.check_expression(value);
                return;
            }
            Some(Symbol::Function(_)) => {
                self.sink.error(
                    DiagnosticKind::InvalidAssignment,
                    format!("'{}' is not a variable", target.name),
                    line,
                    column,
                );
                self.check_expression(value);
                return;
            }
            Some(Symbol::Variable(variable)) => variable.clone(),
        };

        if variable.is_constant {
            self.sink.constant_assignment(&target.name, line, column);
            self.check_expression(value);
            return;
        }

        let value_type = self.check_expression(value);

        if !primitive::assignable(variable.ty, value_type) {
            self.sink.type_error(variable.ty, value_type, line, column);
        }

        if let Some(Symbol::Variable(variable)) = self.symbol_table.resolve_mut(&target.name) {
            variable.is_initialized = true;
        }
    }

    fn check_condition(&mut self, condition: &Expression) {
        let ty = self.check_expression(condition);

        if ty != PrimitiveType::Bool && ty != PrimitiveType::Unknown {
            self.sink
                .type_error(PrimitiveType::Bool, ty, condition.line, condition.column);
        }
    }

    fn check_return(&mut self, value: Option<&Expression>, line: usize, column: usize) {
        let Some(function) = self.current_function.clone() else {
            self.sink.error(
                DiagnosticKind::SemanticError,
                "Return statement outside function".to_string(),
                line,
                column,
            );

            if let Some(value) = value {
                self.check_expression(value);
            }
            return;
        };

        self.has_return = true;

        match value {
            Some(value) => {
                let ty = self.check_expression(value);

                if !primitive::assignable(function.return_type, ty) {
                    self.sink.type_error(function.return_type, ty, line, column);
                }
            }
            None => {
                if function.return_type != PrimitiveType::Void {
                    self.sink.error(
                        DiagnosticKind::SemanticError,
                        format!(
                            "Function must return a value of type {}",
                            function.return_type
                        ),
                        line,
                        column,
                    );
                }
            }
        }
    }

    fn check_expression(&mut self, expression: &Expression) -> PrimitiveType {
        let (line, column) = (expression.line, expression.column);

        match &expression.kind {
            ExpressionKind::IntegerLiteral(_) => PrimitiveType::I32,
            ExpressionKind::FloatLiteral(_) => PrimitiveType::F32,
            ExpressionKind::StringLiteral(_) => PrimitiveType::String,
            ExpressionKind::BooleanLiteral(_) => PrimitiveType::Bool,
            ExpressionKind::Identifier(name) => self.check_identifier(name, line, column),
            ExpressionKind::Unary { operator, operand } => {
                let operand_type = self.check_expression(operand);

                match operator {
                    UnaryOperatorKind::LogicalNot => {
                        if operand_type != PrimitiveType::Bool
                            && operand_type != PrimitiveType::Unknown
                        {
                            self.sink
                                .type_error(PrimitiveType::Bool, operand_type, line, column);
                        }

                        PrimitiveType::Bool
                    }
                    UnaryOperatorKind::Negate => {
                        if !operand_type.is_numeric() && operand_type != PrimitiveType::Unknown {
                            self.sink.error(
                                DiagnosticKind::IncompatibleTypes,
                                format!("Cannot apply 'unary -' to type '{operand_type}'"),
                                line,
                                column,
                            );
                        }

                        operand_type
                    }
                }
            }
            ExpressionKind::Binary { lhs, operator, rhs } => {
                let left = self.check_expression(lhs);
                let right = self.check_expression(rhs);

                match operator.class() {
                    BinaryOperatorClass::Arithmetic => {
                        self.check_arithmetic(left, right, *operator, line, column)
                    }
                    BinaryOperatorClass::Comparison => {
                        if !primitive::comparable(left, right) {
                            self.sink
                                .incompatible_types(left, right, &operator.to_string(), line, column);
                        }

                        PrimitiveType::Bool
                    }
                    BinaryOperatorClass::Logical => {
                        if left != PrimitiveType::Bool && left != PrimitiveType::Unknown {
                            self.sink
                                .type_error(PrimitiveType::Bool, left, lhs.line, lhs.column);
                        }

                        if right != PrimitiveType::Bool && right != PrimitiveType::Unknown {
                            self.sink
                                .type_error(PrimitiveType::Bool, right, rhs.line, rhs.column);
                        }

                        PrimitiveType::Bool
                    }
                }
            }
            ExpressionKind::Call { callee, arguments } => {
                self.check_call(callee, arguments, line, column)
            }
            ExpressionKind::Cast { operand, ty } => {
                let source = self.check_expression(operand);
                let target = ty.ty;

                if !primitive::cast_allowed(source, target) {
                    self.sink
                        .incompatible_types(source, target, "as", line, column);
                }

                target
            }
        }
    }

    fn check_identifier(&mut self, name: &str, line: usize, column: usize) -> PrimitiveType {
        match self.symbol_table.resolve(name) {
            None => {
                self.sink.undefined_symbol(name, line, column);
                PrimitiveType::Unknown
            }
            Some(Symbol::Variable(variable)) => {
                let (ty, initialized) = (variable.ty, variable.is_initialized);

                // A read before any write is a warning, not an error; the
                // declared type still flows so checking continues
                if !initialized {
                    self.sink.uninitialized_variable(name, line, column);
                }

                ty
            }
            Some(symbol) => symbol.ty(),
        }
    }

    fn check_arithmetic(
        &mut self,
        left: PrimitiveType,
        right: PrimitiveType,
        operator: BinaryOperatorKind,
        line: usize,
        column: usize,
    ) -> PrimitiveType {
        if left == PrimitiveType::Unknown || right == PrimitiveType::Unknown {
            return PrimitiveType::Unknown;
        }

        if !left.is_numeric() || !right.is_numeric() {
            self.sink
                .incompatible_types(left, right, &operator.to_string(), line, column);

            return PrimitiveType::Unknown;
        }

        primitive::widened(left, right)
    }

    fn check_call(
        &mut self,
        callee: &crate::frontend::ast::Identifier,
        arguments: &[Expression],
        line: usize,
        column: usize,
    ) -> PrimitiveType {
        let function = match self.symbol_table.resolve(&callee.name) {
            None => {
                self.sink.undefined_symbol(&callee.name, line, column);

                for argument in arguments {
                    self.check_expression(argument);
                }
                return PrimitiveType::Unknown;
            }
            Some(Symbol::Variable(_)) => {
                self.sink.error(
                    DiagnosticKind::FunctionNotFound,
                    format!("'{}' is not a function", callee.name),
                    line,
                    column,
                );

                for argument in arguments {
                    self.check_expression(argument);
                }
                return PrimitiveType::Unknown;
            }
            Some(Symbol::Function(function)) => function.clone(),
        };

        // On an arity mismatch the per-argument checks are skipped; the
        // pairing would be meaningless
        if function.parameters.len() != arguments.len() {
            self.sink.wrong_argument_count(
                &callee.name,
                function.parameters.len(),
                arguments.len(),
                line,
                column,
            );

            return function.return_type;
        }

        for (argument, parameter) in arguments.iter().zip(&function.parameters) {
            let argument_type = self.check_expression(argument);

            if !primitive::assignable(parameter.ty, argument_type) {
                self.sink.type_error(
                    parameter.ty,
                    argument_type,
                    argument.line,
                    argument.column,
                );
            }
        }

        function.return_type
    }
}

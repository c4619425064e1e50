use std::collections::HashMap;

use log::debug;
use thiserror::Error;

use crate::ast::{Expr, Function, Program, Statement};

#[derive(Debug, PartialEq, Copy, Clone)]
enum VariableStatus {
    Declared,
    Defined,
}

#[derive(Debug, PartialEq, Copy, Clone)]
enum FunctionKind {
    None,
    Function,
    Method,
    Initializer,
}

#[derive(Debug, PartialEq, Copy, Clone)]
enum ClassKind {
    None,
    Class,
    Subclass,
}

/// A static pass over a parsed program, catching mistakes that the grammar alone lets through.
/// The tree is only borrowed. Superclass names are left for the evaluator to look up.
pub struct Resolver {
    // only local scopes: globals may be redeclared and may refer to themselves.
    scope_stack: Vec<HashMap<String, VariableStatus>>,
    current_function: FunctionKind,
    current_class: ClassKind,
}

#[derive(Debug, Error, PartialEq)]
pub enum ResolverError {
    // var a = a + 1: not allowed. Almost certainly a user mistake.
    #[error("[line {line}] Error at '{name}': Can't read local variable in its own initializer.")]
    LocalVariableSelfReferencedInInitializer { line: usize, name: String },
    #[error("[line {line}] Error at '{name}': Already a variable with this name in this scope.")]
    LocalVariableRedeclaredInScope { line: usize, name: String },
    #[error("[line {line}] Error at 'return': Can't return from top-level code.")]
    ReturnOutsideFunction { line: usize },
    #[error("[line {line}] Error at 'return': Can't return a value from an initializer.")]
    ReturnValueFromInitializer { line: usize },
    #[error("[line {line}] Error at 'this': Can't use 'this' outside of a class.")]
    ThisOutsideClass { line: usize },
    #[error("[line {line}] Error at 'super': Can't use 'super' outside of a class.")]
    SuperOutsideClass { line: usize },
    #[error("[line {line}] Error at 'super': Can't use 'super' in a class with no superclass.")]
    SuperWithoutSuperclass { line: usize },
    #[error("[line {line}] Error at '{name}': A class can't inherit from itself.")]
    ClassInheritsFromItself { line: usize, name: String },
}

impl Default for Resolver {
    fn default() -> Self {
        Resolver::new()
    }
}

impl Resolver {
    pub fn new() -> Resolver {
        Resolver {
            scope_stack: vec![],
            current_function: FunctionKind::None,
            current_class: ClassKind::None,
        }
    }

    fn begin_scope(&mut self) {
        self.scope_stack.push(HashMap::new());
    }
    fn end_scope(&mut self) {
        self.scope_stack.pop();
    }

    fn declare(&mut self, name: &str, line: usize) -> Result<(), ResolverError> {
        let Some(scope) = self.scope_stack.last_mut() else {
            return Ok(());
        };
        if scope.contains_key(name) {
            return Err(ResolverError::LocalVariableRedeclaredInScope {
                line,
                name: name.to_string(),
            });
        }
        scope.insert(name.to_string(), VariableStatus::Declared);
        Ok(())
    }
    fn define(&mut self, name: &str) {
        if let Some(scope) = self.scope_stack.last_mut() {
            scope.insert(name.to_string(), VariableStatus::Defined);
        }
    }

    pub fn resolve_program(&mut self, program: &Program) -> Result<(), ResolverError> {
        for statement in &program.declarations {
            self.resolve_statement(statement)?;
        }
        debug!("resolved {} declarations", program.declarations.len());
        Ok(())
    }

    fn resolve_statements(&mut self, statements: &[Statement]) -> Result<(), ResolverError> {
        for statement in statements {
            self.resolve_statement(statement)?;
        }
        Ok(())
    }

    fn resolve_statement(&mut self, statement: &Statement) -> Result<(), ResolverError> {
        match statement {
            Statement::IfStatement {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition)?;
                self.resolve_statement(then_branch)?;
                if let Some(branch) = else_branch {
                    self.resolve_statement(branch)?;
                }
            }
            Statement::WhileStatement { condition, body } => {
                self.resolve_expr(condition)?;
                self.resolve_statement(body)?;
            }
            Statement::VarDeclaration {
                name,
                initializer,
                line,
            } => {
                self.declare(name, *line)?;
                if let Some(initializer) = initializer {
                    self.resolve_expr(initializer)?;
                }
                self.define(name);
            }
            Statement::FunctionDeclaration(function) => {
                // defined before the body so the function can call itself.
                self.declare(&function.name, function.line)?;
                self.define(&function.name);
                self.resolve_function(function, FunctionKind::Function)?;
            }
            Statement::ClassDeclaration {
                name,
                superclass,
                methods,
                line,
            } => {
                self.declare(name, *line)?;
                self.define(name);
                if superclass.as_deref() == Some(name.as_str()) {
                    return Err(ResolverError::ClassInheritsFromItself {
                        line: *line,
                        name: name.clone(),
                    });
                }

                let enclosing_class = self.current_class;
                self.current_class = match superclass {
                    Some(_) => ClassKind::Subclass,
                    None => ClassKind::Class,
                };
                let result = methods.iter().try_for_each(|method| {
                    let kind = match method.name.as_str() {
                        "init" => FunctionKind::Initializer,
                        _ => FunctionKind::Method,
                    };
                    self.resolve_function(method, kind)
                });
                self.current_class = enclosing_class;
                result?;
            }
            Statement::Block { statements } => {
                self.begin_scope();
                let result = self.resolve_statements(statements);
                self.end_scope();
                result?;
            }
            Statement::ReturnStatement { value, line } => {
                if self.current_function == FunctionKind::None {
                    return Err(ResolverError::ReturnOutsideFunction { line: *line });
                }
                if let Some(value) = value {
                    if self.current_function == FunctionKind::Initializer {
                        return Err(ResolverError::ReturnValueFromInitializer { line: *line });
                    }
                    self.resolve_expr(value)?;
                }
            }
            Statement::ExprStatement { expression } | Statement::PrintStatement { expression } => {
                self.resolve_expr(expression)?;
            }
        }
        Ok(())
    }

    fn resolve_function(
        &mut self,
        function: &Function,
        kind: FunctionKind,
    ) -> Result<(), ResolverError> {
        let enclosing_function = self.current_function;
        self.current_function = kind;
        self.begin_scope();
        let result = (|| {
            for parameter in &function.parameters {
                self.declare(&parameter.name, parameter.line)?;
                self.define(&parameter.name);
            }
            // parameters and the body share one scope.
            self.resolve_statements(&function.body)
        })();
        self.end_scope();
        self.current_function = enclosing_function;
        result
    }

    fn resolve_expr(&mut self, expr: &Expr) -> Result<(), ResolverError> {
        match expr {
            Expr::Literal(_) => {}
            Expr::Assign { value, .. } => {
                self.resolve_expr(value)?;
            }
            Expr::SetAttr { object, value, .. } => {
                self.resolve_expr(value)?;
                self.resolve_expr(object)?;
            }
            Expr::BinaryLogical { left, right, .. } | Expr::Binary { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)?;
            }
            Expr::Unary { expression, .. } => self.resolve_expr(expression)?,
            Expr::Grouping(expr) => self.resolve_expr(expr)?,
            Expr::GetAttr { object, .. } => self.resolve_expr(object)?,
            Expr::Variable { name, line } => {
                let status = self
                    .scope_stack
                    .last()
                    .and_then(|scope| scope.get(name));
                if status == Some(&VariableStatus::Declared) {
                    return Err(
                        ResolverError::LocalVariableSelfReferencedInInitializer {
                            line: *line,
                            name: name.clone(),
                        },
                    );
                }
            }
            Expr::Call { callee, arguments } => {
                self.resolve_expr(callee)?;
                for argument in arguments {
                    self.resolve_expr(argument)?;
                }
            }
            Expr::This { line } => {
                if self.current_class == ClassKind::None {
                    return Err(ResolverError::ThisOutsideClass { line: *line });
                }
            }
            Expr::Super { line, .. } => match self.current_class {
                ClassKind::None => return Err(ResolverError::SuperOutsideClass { line: *line }),
                ClassKind::Class => {
                    return Err(ResolverError::SuperWithoutSuperclass { line: *line })
                }
                ClassKind::Subclass => {}
            },
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::test_helpers::{parse_and_resolve_program, parse_program};

    use super::*;

    fn resolve_error(code: &str) -> ResolverError {
        parse_and_resolve_program(code).expect_err("resolving should have failed")
    }

    #[test]
    fn test_invalid_variable_use_passes_if_global() {
        // this should not crash. That's about it.
        parse_and_resolve_program("fun f() { print x; }").unwrap();
        parse_and_resolve_program("var a = a; var a = 2;").unwrap();
    }

    #[test]
    fn test_local_same_scope_variable_redefinition_errors() {
        assert_eq!(
            resolve_error("{ var a = 1; var a = 2; }"),
            ResolverError::LocalVariableRedeclaredInScope {
                line: 1,
                name: "a".to_string()
            }
        );
    }

    #[test]
    fn test_shadowing_in_nested_block_is_fine() {
        parse_and_resolve_program("{ var a = 1; { var b = a + 1; var a = b; print a; } }").unwrap();
    }

    #[test]
    fn test_local_variable_in_its_own_initializer() {
        let error = resolve_error("{\n  var a = a + 1;\n}");
        assert_eq!(
            error.to_string(),
            "[line 2] Error at 'a': Can't read local variable in its own initializer."
        );
    }

    #[test]
    fn test_duplicate_parameters() {
        assert_eq!(
            resolve_error("fun f(a, b, a) {}"),
            ResolverError::LocalVariableRedeclaredInScope {
                line: 1,
                name: "a".to_string()
            }
        );
        assert_eq!(
            resolve_error("fun f(\n  a,\n  b,\n  a\n) {}"),
            ResolverError::LocalVariableRedeclaredInScope {
                line: 4,
                name: "a".to_string()
            }
        );
        assert!(matches!(
            resolve_error("fun f(a) { var a = 1; }"),
            ResolverError::LocalVariableRedeclaredInScope { .. }
        ));
    }

    #[test]
    fn test_return_rules() {
        assert_eq!(
            resolve_error("return 1;"),
            ResolverError::ReturnOutsideFunction { line: 1 }
        );
        assert_eq!(
            resolve_error("class A {\n init() { return 1; }\n}"),
            ResolverError::ReturnValueFromInitializer { line: 2 }
        );
        // a bare return is fine in an initializer, and `init` outside a class is a plain function.
        parse_and_resolve_program("class A { init() { return; } }").unwrap();
        parse_and_resolve_program("fun init() { return 1; }").unwrap();
    }

    #[test]
    fn test_this_and_super_rules() {
        assert_eq!(
            resolve_error("print this;"),
            ResolverError::ThisOutsideClass { line: 1 }
        );
        assert_eq!(
            resolve_error("fun f() { return super.g; }"),
            ResolverError::SuperOutsideClass { line: 1 }
        );
        assert_eq!(
            resolve_error("class A { f() { return super.f(); } }"),
            ResolverError::SuperWithoutSuperclass { line: 1 }
        );
        parse_and_resolve_program(
            "class A < B { f() { fun g() { return this.x + super.f(); } return g; } }",
        )
        .unwrap();
    }

    #[test]
    fn test_class_kind_is_restored_after_class_body() {
        assert!(matches!(
            resolve_error("class A { f() { return this; } } print this;"),
            ResolverError::ThisOutsideClass { .. }
        ));
    }

    #[test]
    fn test_class_cannot_inherit_from_itself() {
        assert_eq!(
            resolve_error("class A < A {}"),
            ResolverError::ClassInheritsFromItself {
                line: 1,
                name: "A".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_superclass_is_left_to_the_evaluator() {
        let program = parse_program("class B < Missing {}").unwrap();
        Resolver::new().resolve_program(&program).unwrap();
    }
}

use std::fmt::{Display, Formatter};

/// Root of the tree. Owns every node; consumers only borrow it.
#[derive(Debug, PartialEq, Clone)]
pub struct Program {
    pub declarations: Vec<Statement>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Statement {
    IfStatement {
        condition: Expr,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
    },
    WhileStatement {
        condition: Expr,
        body: Box<Statement>,
    },
    VarDeclaration {
        name: String,
        initializer: Option<Expr>,
        line: usize,
    },
    FunctionDeclaration(Function),
    ClassDeclaration {
        name: String,
        // left unresolved, looked up when the class is evaluated.
        superclass: Option<String>,
        methods: Vec<Function>,
        line: usize,
    },
    Block {
        statements: Vec<Statement>,
    },
    ExprStatement {
        expression: Expr,
    },
    PrintStatement {
        expression: Expr,
    },
    ReturnStatement {
        value: Option<Expr>,
        line: usize,
    },
}

/// A named function: either a `fun` declaration or a method in a class body.
#[derive(Debug, PartialEq, Clone)]
pub struct Function {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub body: Vec<Statement>,
    pub line: usize,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Parameter {
    pub name: String,
    pub line: usize,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expr {
    Assign {
        name: String,
        value: Box<Expr>,
    },
    SetAttr {
        object: Box<Expr>,
        name: String,
        value: Box<Expr>,
    },
    BinaryLogical {
        operator: BinaryLogicalOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        operator: UnaryOperator,
        expression: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
    },
    GetAttr {
        object: Box<Expr>,
        name: String,
    },
    /// `super.method`, a reference to the method. Calling it is a separate `Call`.
    Super {
        method: String,
        line: usize,
    },
    This {
        line: usize,
    },
    Literal(Literal),
    Variable {
        name: String,
        line: usize,
    },
    Grouping(Box<Expr>),
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub enum UnaryOperator {
    Minus,
    Not,
}
impl Display for UnaryOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOperator::Minus => write!(f, "-"),
            UnaryOperator::Not => write!(f, "!"),
        }
    }
}
#[derive(Debug, PartialEq, Copy, Clone)]
pub enum BinaryLogicalOperator {
    Or,
    And,
}
impl Display for BinaryLogicalOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryLogicalOperator::Or => write!(f, "or"),
            BinaryLogicalOperator::And => write!(f, "and"),
        }
    }
}
#[derive(Debug, PartialEq, Copy, Clone)]
pub enum BinaryOperator {
    Plus,
    Minus,
    Multiply,
    Divide,
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Display for BinaryOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryOperator::Plus => write!(f, "+"),
            BinaryOperator::Minus => write!(f, "-"),
            BinaryOperator::Multiply => write!(f, "*"),
            BinaryOperator::Divide => write!(f, "/"),
            BinaryOperator::Eq => write!(f, "=="),
            BinaryOperator::Neq => write!(f, "!="),
            BinaryOperator::Gt => write!(f, ">"),
            BinaryOperator::Gte => write!(f, ">="),
            BinaryOperator::Lt => write!(f, "<"),
            BinaryOperator::Lte => write!(f, "<="),
        }
    }
}
#[derive(Debug, PartialEq, Clone)]
pub enum Literal {
    Number(f64),
    String(String),
    Bool(bool),
    Nil,
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{n}"),
            Literal::String(s) => write!(f, "\"{s}\""),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Nil => write!(f, "nil"),
        }
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format_program(self))
    }
}

pub fn format_lisp_like(expr: &Expr) -> String {
    match expr {
        Expr::Literal(ref literal) => {
            format!("{}", literal)
        }
        Expr::Unary {
            expression,
            ref operator,
        } => {
            format!("({} {})", operator, format_lisp_like(expression))
        }
        Expr::Binary {
            operator,
            left,
            right,
        } => {
            format!(
                "({} {} {})",
                operator,
                format_lisp_like(left),
                format_lisp_like(right)
            )
        }
        Expr::BinaryLogical {
            operator,
            left,
            right,
        } => format!(
            "({} {} {})",
            operator,
            format_lisp_like(left),
            format_lisp_like(right),
        ),
        Expr::Grouping(expr) => {
            format!("(group {})", format_lisp_like(expr))
        }
        Expr::Variable { name, .. } => name.clone(),
        Expr::Assign { name, value } => {
            format!("(= {name} {})", format_lisp_like(value))
        }
        Expr::SetAttr {
            object,
            name,
            value,
        } => format!(
            "(= (. {} {name}) {})",
            format_lisp_like(object),
            format_lisp_like(value)
        ),
        Expr::GetAttr { object, name } => {
            format!("(. {} {name})", format_lisp_like(object))
        }
        Expr::Call { callee, arguments } => {
            let mut parts = vec!["call".to_string(), format_lisp_like(callee)];
            parts.extend(arguments.iter().map(format_lisp_like));
            format!("({})", parts.join(" "))
        }
        Expr::Super { method, .. } => format!("(super {method})"),
        Expr::This { .. } => "this".to_string(),
    }
}

pub fn format_statement(statement: &Statement) -> String {
    match statement {
        Statement::ExprStatement { expression } => {
            format!("(expr {})", format_lisp_like(expression))
        }
        Statement::PrintStatement { expression } => {
            format!("(print {})", format_lisp_like(expression))
        }
        Statement::VarDeclaration {
            name, initializer, ..
        } => match initializer {
            Some(initializer) => format!("(var {name} {})", format_lisp_like(initializer)),
            None => format!("(var {name})"),
        },
        Statement::Block { statements } => format_sequence("block", statements),
        Statement::IfStatement {
            condition,
            then_branch,
            else_branch,
        } => match else_branch {
            Some(else_branch) => format!(
                "(if {} {} {})",
                format_lisp_like(condition),
                format_statement(then_branch),
                format_statement(else_branch)
            ),
            None => format!(
                "(if {} {})",
                format_lisp_like(condition),
                format_statement(then_branch)
            ),
        },
        Statement::WhileStatement { condition, body } => format!(
            "(while {} {})",
            format_lisp_like(condition),
            format_statement(body)
        ),
        Statement::ReturnStatement { value, .. } => match value {
            Some(value) => format!("(return {})", format_lisp_like(value)),
            None => "(return)".to_string(),
        },
        Statement::FunctionDeclaration(function) => format_function("fun", function),
        Statement::ClassDeclaration {
            name,
            superclass,
            methods,
            ..
        } => {
            let mut parts = vec!["class".to_string(), name.clone()];
            if let Some(superclass) = superclass {
                parts.push(format!("(< {superclass})"));
            }
            parts.extend(methods.iter().map(|m| format_function("method", m)));
            format!("({})", parts.join(" "))
        }
    }
}

fn format_function(keyword: &str, function: &Function) -> String {
    let parameters: Vec<&str> = function.parameters.iter().map(|p| p.name.as_str()).collect();
    format!(
        "({keyword} {} ({}) {})",
        function.name,
        parameters.join(" "),
        format_sequence("block", &function.body)
    )
}

fn format_sequence(head: &str, statements: &[Statement]) -> String {
    let mut parts = vec![head.to_string()];
    parts.extend(statements.iter().map(format_statement));
    format!("({})", parts.join(" "))
}

/// One top-level declaration per line.
pub fn format_program(program: &Program) -> String {
    program
        .declarations
        .iter()
        .map(format_statement)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use crate::ast::Literal::Number;
    use crate::ast::{
        format_lisp_like, format_statement, BinaryOperator, Expr, Function, Literal, Parameter,
        Statement, UnaryOperator,
    };

    fn get_test_expr() -> Expr {
        // -123 * (45.67)
        Expr::Binary {
            operator: BinaryOperator::Multiply,
            left: Box::new(Expr::Unary {
                expression: Box::new(Expr::Literal(Number(123.0))),
                operator: UnaryOperator::Minus,
            }),
            right: Box::new(Expr::Grouping(Box::new(Expr::Literal(Number(45.67))))),
        }
    }

    fn variable(name: &str) -> Box<Expr> {
        Box::new(Expr::Variable {
            name: name.to_string(),
            line: 1,
        })
    }

    #[test]
    fn test_format_expression_lisp_like() {
        let expr = get_test_expr();
        assert_eq!(
            format_lisp_like(&expr),
            "(* (- 123) (group 45.67))".to_string()
        );
    }

    #[test]
    fn test_format_attribute_access_and_calls() {
        // a.b(1, "x").c = nil
        let expr = Expr::SetAttr {
            object: Box::new(Expr::Call {
                callee: Box::new(Expr::GetAttr {
                    object: variable("a"),
                    name: "b".to_string(),
                }),
                arguments: vec![
                    Expr::Literal(Number(1.)),
                    Expr::Literal(Literal::String("x".to_string())),
                ],
            }),
            name: "c".to_string(),
            value: Box::new(Expr::Literal(Literal::Nil)),
        };
        assert_eq!(format_lisp_like(&expr), "(= (. (call (. a b) 1 \"x\") c) nil)");
    }

    #[test]
    fn test_format_class() {
        let statement = Statement::ClassDeclaration {
            name: "B".to_string(),
            superclass: Some("A".to_string()),
            methods: vec![Function {
                name: "init".to_string(),
                parameters: vec![
                    Parameter {
                        name: "x".to_string(),
                        line: 1,
                    },
                    Parameter {
                        name: "y".to_string(),
                        line: 1,
                    },
                ],
                body: vec![Statement::ReturnStatement {
                    value: None,
                    line: 1,
                }],
                line: 1,
            }],
            line: 1,
        };
        assert_eq!(
            format_statement(&statement),
            "(class B (< A) (method init (x y) (block (return))))"
        );
    }
}

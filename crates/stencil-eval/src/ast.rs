/// Syntax tree for compiled template artifacts
///
/// An artifact is literal text interleaved with `<% ... %>` code islands.
/// Literal text becomes `Statement::Text`; control flow opened in one island
/// may close in a later one, so blocks can contain text.

/// A parsed artifact
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
}

/// Statements inside `{ ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Literal text between code islands
    Text(String),
    /// `echo a, b`
    Echo(Vec<Expr>),
    /// `$name = expr`
    Assign { name: String, value: Expr },
    /// `if cond { ... } else { ... }`; `else if` nests an `If` in the else block
    If {
        condition: Expr,
        then_block: Block,
        else_block: Option<Block>,
    },
    /// `for $item in expr { ... }` or `for $key, $item in expr { ... }`
    ForIn {
        key: Option<String>,
        var: String,
        iter: Expr,
        body: Block,
    },
    /// Expression evaluated for its side effects
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `$name` or a bare identifier
    Variable(String),
    Number(f64),
    String(String),
    True,
    False,
    Null,
    /// `[a, b, c]`
    Array(Vec<Expr>),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    /// Builtin call: `upper($name)`
    Call { name: String, args: Vec<Expr> },
    /// `object->field`
    Member { object: Box<Expr>, field: String },
    /// `object[index]`
    Index { object: Box<Expr>, index: Box<Expr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Not,
    Neg,
}

//! Statement and expression evaluation for compiled artifacts.
//!
//! Every function returns `Result<_, Error>`; the first failure aborts the
//! whole render and propagates with `?`.

use std::collections::BTreeMap;

use crate::ast::{BinOp, Block, Expr, Program, Statement, UnOp};
use crate::error::Error;
use crate::runtime::Runtime;
use crate::value::Value;

/// Evaluate a complete artifact.
pub fn eval_program(program: &Program, runtime: &mut Runtime) -> Result<(), Error> {
    eval_statements(&program.statements, runtime)
}

/// Evaluate a block of statements.
///
/// Blocks do not open a scope; only loop bodies do.
pub fn eval_block(block: &Block, runtime: &mut Runtime) -> Result<(), Error> {
    eval_statements(&block.statements, runtime)
}

fn eval_statements(statements: &[Statement], runtime: &mut Runtime) -> Result<(), Error> {
    for stmt in statements {
        eval_statement(stmt, runtime)?;
    }
    Ok(())
}

/// Evaluate a single statement.
pub fn eval_statement(stmt: &Statement, runtime: &mut Runtime) -> Result<(), Error> {
    match stmt {
        Statement::Text(text) => runtime.emit(text),

        Statement::Echo(values) => {
            for expr in values {
                let value = eval_expr(expr, runtime)?;
                runtime.emit(&value.to_string_value());
            }
        }

        Statement::Assign { name, value } => {
            let value = eval_expr(value, runtime)?;
            runtime.set_var(name, value);
        }

        Statement::If { condition, then_block, else_block } => {
            if eval_expr(condition, runtime)?.to_bool() {
                eval_block(then_block, runtime)?;
            } else if let Some(else_blk) = else_block {
                eval_block(else_blk, runtime)?;
            }
        }

        Statement::ForIn { key, var, iter, body } => {
            let entries = iteration_entries(eval_expr(iter, runtime)?)?;
            for (entry_key, item) in entries {
                runtime.push_scope();
                if let Some(key) = key {
                    runtime.define_var(key, entry_key);
                }
                runtime.define_var(var, item);
                let result = eval_block(body, runtime);
                runtime.pop_scope();
                result?;
            }
        }

        Statement::Expr(expr) => {
            eval_expr(expr, runtime)?;
        }
    }
    Ok(())
}

/// Key/item pairs visited by a `for` loop.
fn iteration_entries(value: Value) -> Result<Vec<(Value, Value)>, Error> {
    match value {
        Value::Array(items) => Ok(items
            .into_iter()
            .enumerate()
            .map(|(i, item)| (Value::Number(i as f64), item))
            .collect()),
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(k, v)| (Value::String(k), v))
            .collect()),
        Value::String(s) => Ok(s
            .lines()
            .enumerate()
            .map(|(i, line)| (Value::Number(i as f64), Value::String(line.to_string())))
            .collect()),
        Value::Null => Ok(Vec::new()),
        other => Err(Error::runtime(format!("Cannot iterate over {}", other.type_name()))),
    }
}

/// Evaluate an expression.
pub fn eval_expr(expr: &Expr, runtime: &mut Runtime) -> Result<Value, Error> {
    match expr {
        Expr::Variable(name) => Ok(runtime.get_var(name).cloned().unwrap_or(Value::Null)),

        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::String(s) => Ok(Value::String(s.clone())),
        Expr::True => Ok(Value::Boolean(true)),
        Expr::False => Ok(Value::Boolean(false)),
        Expr::Null => Ok(Value::Null),

        Expr::Array(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval_expr(item, runtime)?);
            }
            Ok(Value::Array(values))
        }

        Expr::Binary { op, left, right } => eval_binary(*op, left, right, runtime),

        Expr::Unary { op, operand } => {
            let value = eval_expr(operand, runtime)?;
            match (op, value) {
                (UnOp::Not, value) => Ok(Value::Boolean(!value.to_bool())),
                (UnOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
                (UnOp::Neg, other) => {
                    Err(Error::runtime(format!("Cannot negate {}", other.type_name())))
                }
            }
        }

        Expr::Call { name, args } => {
            let mut arg_values = Vec::with_capacity(args.len());
            for arg in args {
                arg_values.push(eval_expr(arg, runtime)?);
            }
            eval_builtin(name, &arg_values)
        }

        Expr::Member { object, field } => {
            let value = eval_expr(object, runtime)?;
            Ok(match value {
                Value::Array(items) => field
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or(Value::Null),
                other => other.member(field),
            })
        }

        Expr::Index { object, index } => {
            let obj_value = eval_expr(object, runtime)?;
            let idx_value = eval_expr(index, runtime)?;

            match (obj_value, idx_value) {
                (Value::Array(arr), Value::Number(n)) => {
                    if n < 0.0 {
                        return Ok(Value::Null);
                    }
                    Ok(arr.get(n as usize).cloned().unwrap_or(Value::Null))
                }
                (Value::Object(map), Value::String(key)) => {
                    Ok(map.get(&key).cloned().unwrap_or(Value::Null))
                }
                (Value::Null, _) => Ok(Value::Null),
                (obj, idx) => Err(Error::runtime(format!(
                    "Cannot index {} with {}", obj.type_name(), idx.type_name()
                ))),
            }
        }
    }
}

/// Evaluate a binary operation.
fn eval_binary(op: BinOp, left: &Expr, right: &Expr, runtime: &mut Runtime) -> Result<Value, Error> {
    let left_val = eval_expr(left, runtime)?;

    // Short-circuit logical operators
    match op {
        BinOp::And if !left_val.to_bool() => return Ok(Value::Boolean(false)),
        BinOp::Or if left_val.to_bool() => return Ok(Value::Boolean(true)),
        _ => {}
    }

    let right_val = eval_expr(right, runtime)?;

    let result = match op {
        BinOp::Add => match (&left_val, &right_val) {
            (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
            (Value::String(_), _) | (_, Value::String(_)) => Value::String(format!(
                "{}{}",
                left_val.to_string_value(),
                right_val.to_string_value()
            )),
            _ => {
                return Err(Error::runtime(format!(
                    "Cannot add {} and {}", left_val.type_name(), right_val.type_name()
                )))
            }
        },
        BinOp::Sub => num_op(&left_val, &right_val, |a, b| a - b)?,
        BinOp::Mul => num_op(&left_val, &right_val, |a, b| a * b)?,
        BinOp::Div => {
            if right_val == Value::Number(0.0) {
                return Err(Error::runtime("Division by zero"));
            }
            num_op(&left_val, &right_val, |a, b| a / b)?
        }
        BinOp::Mod => {
            if right_val == Value::Number(0.0) {
                return Err(Error::runtime("Modulo by zero"));
            }
            num_op(&left_val, &right_val, |a, b| a % b)?
        }
        BinOp::Eq => Value::Boolean(values_equal(&left_val, &right_val)),
        BinOp::NotEq => Value::Boolean(!values_equal(&left_val, &right_val)),
        BinOp::Lt => compare_values(&left_val, &right_val, |ord| ord.is_lt())?,
        BinOp::LtEq => compare_values(&left_val, &right_val, |ord| ord.is_le())?,
        BinOp::Gt => compare_values(&left_val, &right_val, |ord| ord.is_gt())?,
        BinOp::GtEq => compare_values(&left_val, &right_val, |ord| ord.is_ge())?,
        BinOp::And | BinOp::Or => Value::Boolean(right_val.to_bool()),
    };

    Ok(result)
}

/// Numeric binary operation helper.
fn num_op(left: &Value, right: &Value, op: fn(f64, f64) -> f64) -> Result<Value, Error> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(op(*a, *b))),
        _ => Err(Error::runtime(format!(
            "Cannot perform numeric operation on {} and {}",
            left.type_name(), right.type_name()
        ))),
    }
}

/// Check if two values are equal.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => a == b,
        _ => a == b,
    }
}

/// Compare two values.
fn compare_values(a: &Value, b: &Value, pred: fn(std::cmp::Ordering) -> bool) -> Result<Value, Error> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => {
            Ok(Value::Boolean(pred(a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))))
        }
        (Value::String(a), Value::String(b)) => Ok(Value::Boolean(pred(a.cmp(b)))),
        _ => Err(Error::runtime(format!(
            "Cannot compare {} and {}", a.type_name(), b.type_name()
        ))),
    }
}

fn expect_args(name: &str, args: &[Value], count: usize) -> Result<(), Error> {
    if args.len() == count {
        Ok(())
    } else {
        let plural = if count == 1 { "" } else { "s" };
        Err(Error::runtime(format!(
            "{}() takes exactly {} argument{}", name, count, plural
        )))
    }
}

/// Evaluate a builtin function call.
fn eval_builtin(name: &str, args: &[Value]) -> Result<Value, Error> {
    let result = match name {
        "len" => {
            expect_args(name, args, 1)?;
            match &args[0] {
                Value::Array(arr) => Value::Number(arr.len() as f64),
                Value::String(s) => Value::Number(s.chars().count() as f64),
                Value::Object(obj) => Value::Number(obj.len() as f64),
                Value::Null => Value::Number(0.0),
                other => {
                    return Err(Error::runtime(format!("Cannot get length of {}", other.type_name())))
                }
            }
        }

        "upper" => {
            expect_args(name, args, 1)?;
            Value::String(args[0].to_string_value().to_uppercase())
        }

        "lower" => {
            expect_args(name, args, 1)?;
            Value::String(args[0].to_string_value().to_lowercase())
        }

        "trim" => {
            expect_args(name, args, 1)?;
            Value::String(args[0].to_string_value().trim().to_string())
        }

        "escape" => {
            // escape(value) - HTML-escape the string form
            expect_args(name, args, 1)?;
            Value::String(escape_html(&args[0].to_string_value()))
        }

        "json" => {
            expect_args(name, args, 1)?;
            Value::String(args[0].to_json())
        }

        "join" => {
            // join(array, separator = "")
            if args.is_empty() || args.len() > 2 {
                return Err(Error::runtime("join() takes 1 or 2 arguments"));
            }
            let separator = args.get(1).map(|s| s.to_string_value()).unwrap_or_default();
            match &args[0] {
                Value::Array(items) => {
                    let parts: Vec<String> = items.iter().map(|v| v.to_string_value()).collect();
                    Value::String(parts.join(&separator))
                }
                other => {
                    return Err(Error::runtime(format!("Cannot join {}", other.type_name())))
                }
            }
        }

        "default" => {
            // default(value, fallback) - fallback when value is null or empty
            expect_args(name, args, 2)?;
            let empty = args[0].is_null() || matches!(&args[0], Value::String(s) if s.is_empty());
            if empty { args[1].clone() } else { args[0].clone() }
        }

        "keys" => {
            expect_args(name, args, 1)?;
            match &args[0] {
                Value::Object(obj) => {
                    Value::Array(obj.keys().map(|k| Value::String(k.clone())).collect())
                }
                other => {
                    return Err(Error::runtime(format!("Cannot get keys of {}", other.type_name())))
                }
            }
        }

        "typeof" => {
            expect_args(name, args, 1)?;
            Value::String(args[0].type_name().to_string())
        }

        "object" => {
            // object(key, value, ...) - build an object from pairs
            if args.len() % 2 != 0 {
                return Err(Error::runtime("object() takes key/value pairs"));
            }
            let map: BTreeMap<String, Value> = args
                .chunks(2)
                .map(|pair| (pair[0].to_string_value(), pair[1].clone()))
                .collect();
            Value::Object(map)
        }

        _ => return Err(Error::runtime(format!("Unknown function: {}()", name))),
    };

    Ok(result)
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

//! Expression assembly.
//!
//! Compiles an untyped expression AST into a runtime [`Expr`] tree
//! against a symbol table of element handles. Interior evaluation is
//! all-f64 (the consumer casts the root); the jobs here are name
//! binding, constant conversion, and rolling-stats instantiation.
//!
//! Rolling-stat window sizes are themselves expressions: they are
//! compiled and evaluated immediately, against the state vector as it
//! is at compile time. A window that is not an integer in
//! `[1, MAX_WINDOW]` is a compile error.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use surefire_core::{
    AnyElement, BinOp, Error, Expr, ExpressionStats, MAX_WINDOW, StatKind, StateVector, StatsRef,
    UnOp,
};

use crate::diag::ConfigError;
use crate::expr_parse::ExprNode;
use crate::token::Token;

const ERR_CATEGORY: &str = "expression error";

/// Name-to-element bindings for expression compilation. Aliases are
/// plain entries pointing at the same element handle.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    map: HashMap<String, AnyElement>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    /// A table holding every element of a state vector.
    pub fn from_state_vector(sv: &StateVector) -> SymbolTable {
        let mut table = SymbolTable::new();
        for (name, elem) in sv.elements() {
            table.map.insert(name.to_string(), elem.clone());
        }
        table
    }

    /// Bind a name. Returns false when the name was already bound (the
    /// existing binding is kept).
    pub fn insert(&mut self, name: &str, elem: AnyElement) -> bool {
        if self.map.contains_key(name) {
            return false;
        }
        self.map.insert(name.to_string(), elem);
        true
    }

    pub fn get(&self, name: &str) -> Option<&AnyElement> {
        self.map.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }
}

/// A compiled expression plus every rolling-stats instance it created.
/// The caller registers the stats for per-step update.
#[derive(Debug)]
pub struct ExpressionAssembly {
    pub root: Expr,
    pub stats: Vec<StatsRef>,
}

/// Compile an AST against a symbol table.
pub fn compile(node: &ExprNode, symbols: &SymbolTable) -> Result<ExpressionAssembly, ConfigError> {
    let mut stats = Vec::new();
    let root = compile_node(node, symbols, &mut stats)?;
    Ok(ExpressionAssembly { root, stats })
}

fn compile_node(
    node: &ExprNode,
    symbols: &SymbolTable,
    stats: &mut Vec<StatsRef>,
) -> Result<Expr, ConfigError> {
    match node {
        ExprNode::Const(tok) => Ok(Expr::Const(parse_constant(tok)?)),
        ExprNode::Ident(tok) => match symbols.get(&tok.text) {
            Some(elem) => Ok(Expr::Elem(elem.clone())),
            None => Err(ConfigError::at(
                Error::ExcElem,
                ERR_CATEGORY,
                format!("unknown element `{}`", tok.text),
                tok,
            )),
        },
        ExprNode::Unary { op, arg } => {
            let arg = compile_node(arg, symbols, stats)?;
            let op_kind = match op.text.as_str() {
                "NOT" | "not" => UnOp::Not,
                "-" => UnOp::Neg,
                _ => {
                    return Err(ConfigError::at(
                        Error::Unreachable,
                        ERR_CATEGORY,
                        format!("unexpected unary operator `{}`", op.text),
                        op,
                    ));
                }
            };
            Ok(Expr::Unary {
                op: op_kind,
                arg: Box::new(arg),
            })
        }
        ExprNode::Binary { op, left, right } => {
            let left = compile_node(left, symbols, stats)?;
            let right = compile_node(right, symbols, stats)?;
            let op_kind = match op.text.as_str() {
                "+" => BinOp::Add,
                "-" => BinOp::Sub,
                "*" => BinOp::Mul,
                "/" => BinOp::Div,
                "<" => BinOp::Lt,
                "<=" => BinOp::Le,
                ">" => BinOp::Gt,
                ">=" => BinOp::Ge,
                "==" => BinOp::Eq,
                "!=" => BinOp::Ne,
                "AND" | "and" => BinOp::And,
                "OR" | "or" => BinOp::Or,
                _ => {
                    return Err(ConfigError::at(
                        Error::Unreachable,
                        ERR_CATEGORY,
                        format!("unexpected operator `{}`", op.text),
                        op,
                    ));
                }
            };
            Ok(Expr::Binary {
                op: op_kind,
                left: Box::new(left),
                right: Box::new(right),
            })
        }
        ExprNode::Call { name, args } => compile_call(name, args, symbols, stats),
    }
}

fn parse_constant(tok: &Token) -> Result<f64, ConfigError> {
    match tok.text.as_str() {
        "true" | "TRUE" => Ok(1.0),
        "false" | "FALSE" => Ok(0.0),
        text => {
            let value: f64 = text.parse().map_err(|_| overflow_error(tok))?;
            if !value.is_finite() {
                return Err(overflow_error(tok));
            }
            Ok(value)
        }
    }
}

fn overflow_error(tok: &Token) -> ConfigError {
    ConfigError::at(
        Error::ExcOverflow,
        ERR_CATEGORY,
        format!("constant `{}` is out of range", tok.text),
        tok,
    )
}

fn compile_call(
    name: &Token,
    args: &[ExprNode],
    symbols: &SymbolTable,
    stats: &mut Vec<StatsRef>,
) -> Result<Expr, ConfigError> {
    let kind = match name.text.as_str() {
        "ROLL_AVG" => StatKind::Mean,
        "ROLL_MEDIAN" => StatKind::Median,
        "ROLL_MIN" => StatKind::Min,
        "ROLL_MAX" => StatKind::Max,
        "ROLL_RANGE" => StatKind::Range,
        _ => {
            return Err(ConfigError::at(
                Error::ExcFunc,
                ERR_CATEGORY,
                format!("unknown function `{}`", name.text),
                name,
            ));
        }
    };

    if args.len() != 2 {
        return Err(ConfigError::at(
            Error::ExcArity,
            ERR_CATEGORY,
            format!("`{}` expects 2 arguments, got {}", name.text, args.len()),
            name,
        ));
    }

    let inner = compile_node(&args[0], symbols, stats)?;

    // The window size is evaluated once, now. Stats created inside the
    // window expression are compile-time only and are not registered.
    let mut window_stats = Vec::new();
    let window_expr = compile_node(&args[1], symbols, &mut window_stats)?;
    let window = window_expr.evaluate();
    if !window.is_finite() || window.fract() != 0.0 || window < 1.0 || window > MAX_WINDOW as f64 {
        return Err(ConfigError::at(
            Error::ExcWindow,
            ERR_CATEGORY,
            format!("rolling window size must be an integer in [1, {}]", MAX_WINDOW),
            args[1].token(),
        ));
    }

    let handle: StatsRef = Rc::new(RefCell::new(ExpressionStats::new(inner, window as usize)));
    stats.push(handle.clone());
    Ok(Expr::Stat {
        kind,
        stats: handle,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr_parse;
    use crate::token::tokenize;
    use surefire_core::{ElementType, new_store};

    fn table(entries: &[(&str, ElementType)]) -> SymbolTable {
        let size: usize = entries.iter().map(|(_, ty)| ty.size_bytes()).sum();
        let store = new_store(size);
        let mut symbols = SymbolTable::new();
        let mut offset = 0;
        for (name, ty) in entries {
            symbols.insert(name, AnyElement::new(*ty, store.clone(), offset));
            offset += ty.size_bytes();
        }
        symbols
    }

    fn compile_str(src: &str, symbols: &SymbolTable) -> Result<ExpressionAssembly, ConfigError> {
        compile(&expr_parse::parse(&tokenize(src).unwrap()).unwrap(), symbols)
    }

    #[test]
    fn test_constants() {
        let symbols = SymbolTable::new();
        assert_eq!(compile_str("1 + 2.5", &symbols).unwrap().root.evaluate(), 3.5);
        assert_eq!(compile_str("true", &symbols).unwrap().root.evaluate(), 1.0);
        assert_eq!(
            compile_str("FALSE OR TRUE", &symbols).unwrap().root.evaluate(),
            1.0
        );
    }

    #[test]
    fn test_element_binding() {
        let symbols = table(&[("foo", ElementType::Int32)]);
        symbols.get("foo").unwrap().write_f64(41.0);
        let asm = compile_str("foo + 1", &symbols).unwrap();
        assert_eq!(asm.root.evaluate(), 42.0);
        assert!(asm.stats.is_empty());
    }

    #[test]
    fn test_unknown_element_position() {
        let err = compile_str("foo + 1", &SymbolTable::new()).unwrap_err();
        assert_eq!(err.code(), Error::ExcElem);
        assert_eq!((err.line(), err.col()), (1, 1));
    }

    #[test]
    fn test_constant_overflow() {
        let huge = format!("1{}", "0".repeat(309));
        let err = compile_str(&huge, &SymbolTable::new()).unwrap_err();
        assert_eq!(err.code(), Error::ExcOverflow);
    }

    #[test]
    fn test_double_inequality_semantics() {
        let symbols = table(&[("t", ElementType::Uint64)]);
        let asm = compile_str("100 <= t <= 200", &symbols).unwrap();
        for (value, expected) in [(99.0, 0.0), (100.0, 1.0), (200.0, 1.0), (201.0, 0.0)] {
            symbols.get("t").unwrap().write_f64(value);
            assert_eq!(asm.root.evaluate(), expected, "t = {}", value);
        }
    }

    #[test]
    fn test_rolling_stats_compile_and_track() {
        let symbols = table(&[("foo", ElementType::Int32)]);
        let foo = symbols.get("foo").unwrap().clone();
        let asm = compile_str("ROLL_AVG(foo, 2)", &symbols).unwrap();
        assert_eq!(asm.stats.len(), 1);
        assert_eq!(asm.stats[0].borrow().window(), 2);

        for (value, mean) in [(3.0, 3.0), (5.0, 4.0), (7.0, 6.0)] {
            foo.write_f64(value);
            asm.stats[0].borrow_mut().update();
            assert_eq!(asm.root.evaluate(), mean);
        }
    }

    #[test]
    fn test_window_size_from_element() {
        let symbols = table(&[("foo", ElementType::Int32), ("bar", ElementType::Int32)]);
        symbols.get("bar").unwrap().write_f64(-2.0);
        // Window is `bar * -1`, evaluated at compile time.
        let asm = compile_str("ROLL_MIN(foo + 1, bar * -1)", &symbols).unwrap();
        assert_eq!(asm.stats[0].borrow().window(), 2);
    }

    #[test]
    fn test_unknown_function() {
        let err = compile_str("FOO(1, 2)", &SymbolTable::new()).unwrap_err();
        assert_eq!(err.code(), Error::ExcFunc);
        assert_eq!((err.line(), err.col()), (1, 1));
    }

    #[test]
    fn test_wrong_arity() {
        let err = compile_str("ROLL_AVG(1)", &SymbolTable::new()).unwrap_err();
        assert_eq!(err.code(), Error::ExcArity);
        assert_eq!((err.line(), err.col()), (1, 1));
    }

    #[test]
    fn test_unknown_elements_in_call_arguments() {
        let err = compile_str("ROLL_AVG(foo, 4)", &SymbolTable::new()).unwrap_err();
        assert_eq!(err.code(), Error::ExcElem);
        assert_eq!((err.line(), err.col()), (1, 10));

        let err = compile_str("ROLL_AVG(4, foo)", &SymbolTable::new()).unwrap_err();
        assert_eq!(err.code(), Error::ExcElem);
        assert_eq!((err.line(), err.col()), (1, 13));
    }

    #[test]
    fn test_window_validation() {
        let symbols = SymbolTable::new();

        let err = compile_str("ROLL_AVG(4, 0)", &symbols).unwrap_err();
        assert_eq!(err.code(), Error::ExcWindow);
        assert_eq!((err.line(), err.col()), (1, 13));

        let err = compile_str("ROLL_AVG(4, -1)", &symbols).unwrap_err();
        assert_eq!(err.code(), Error::ExcWindow);

        let err = compile_str("ROLL_AVG(4, 1.5)", &symbols).unwrap_err();
        assert_eq!(err.code(), Error::ExcWindow);
        assert_eq!((err.line(), err.col()), (1, 13));

        // Division by zero makes the window non-finite; the error
        // anchors on the window expression's root operator.
        let err = compile_str("ROLL_AVG(4, 1 / 0)", &symbols).unwrap_err();
        assert_eq!(err.code(), Error::ExcWindow);
        assert_eq!((err.line(), err.col()), (1, 15));

        let err = compile_str("ROLL_AVG(4, 10001)", &symbols).unwrap_err();
        assert_eq!(err.code(), Error::ExcWindow);

        assert!(compile_str("ROLL_AVG(4, 10000)", &symbols).is_ok());
    }
}

//! Row-at-a-time expression evaluation
//!
//! The tree handler turns raw parse nodes into [`ExprNode`] trees, which
//! evaluate against one table row at a time. Grouped evaluation
//! ([`ExprNode::eval_group`]) runs the same trees over a set of rows and
//! gives aggregate functions their group semantics.

use super::context::QueryContext;
use super::nodes::{BinaryOp, UnaryOp};
use crate::data::{NdArray, Slice, Value};
use crate::table::TableHandle;
use crate::{Result, TableError};

/// Built-in scalar and aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Abs,
    Sqrt,
    Exp,
    Log,
    Floor,
    Ceil,
    Upper,
    Lower,
    Iif,
    IsNull,
    Shape,
    Ndim,
    Nelements,
    Rowid,
    Sum,
    Min,
    Max,
    Mean,
    Count,
}

impl Function {
    /// Resolve a function by its (case-insensitive) name
    pub fn from_name(name: &str) -> Option<Function> {
        Some(match name.to_ascii_lowercase().as_str() {
            "abs" => Function::Abs,
            "sqrt" => Function::Sqrt,
            "exp" => Function::Exp,
            "log" | "ln" => Function::Log,
            "floor" => Function::Floor,
            "ceil" => Function::Ceil,
            "upper" | "upcase" => Function::Upper,
            "lower" | "downcase" => Function::Lower,
            "iif" => Function::Iif,
            "isnull" => Function::IsNull,
            "shape" => Function::Shape,
            "ndim" => Function::Ndim,
            "nelements" => Function::Nelements,
            "rowid" | "rownumber" => Function::Rowid,
            "sum" | "gsum" => Function::Sum,
            "min" | "gmin" => Function::Min,
            "max" | "gmax" => Function::Max,
            "mean" | "gmean" | "avg" => Function::Mean,
            "count" | "gcount" => Function::Count,
            _ => return None,
        })
    }

    /// Whether the function aggregates over a row group
    pub fn is_aggregate(self) -> bool {
        matches!(
            self,
            Function::Sum | Function::Min | Function::Max | Function::Mean | Function::Count
        )
    }
}

/// One element of a value set used by IN
#[derive(Debug, Clone)]
pub enum SetElement {
    /// A single value to compare against
    Value(ExprNode),
    /// A bounded interval; open ends match everything on that side
    Range {
        lower: Option<ExprNode>,
        upper: Option<ExprNode>,
        incl_lower: bool,
        incl_upper: bool,
    },
}

/// A compiled expression tree
#[derive(Debug, Clone)]
pub enum ExprNode {
    Literal(Value),
    /// Cell of a column in the current row
    Column(String),
    /// Table keyword, or a column keyword when `column` is set
    Keyword {
        column: Option<String>,
        key: String,
    },
    Unary {
        op: UnaryOp,
        child: Box<ExprNode>,
    },
    Binary {
        op: BinaryOp,
        left: Box<ExprNode>,
        right: Box<ExprNode>,
    },
    Func {
        func: Function,
        args: Vec<ExprNode>,
    },
    /// Full-string regex match
    Match {
        target: Box<ExprNode>,
        regex: regex::Regex,
        negate: bool,
    },
    /// Membership in a set of values and intervals
    InSet {
        target: Box<ExprNode>,
        set: Vec<SetElement>,
    },
    /// Array slice; per-axis inclusive bounds, open ends follow the shape
    Slice {
        target: Box<ExprNode>,
        axes: Vec<(Option<usize>, Option<usize>)>,
    },
    /// EXISTS over a prepared, unexecuted subquery
    Exists(Box<QueryContext>),
}

impl ExprNode {
    /// Compile a regex match node; the pattern must match the whole string
    pub fn regex_match(target: ExprNode, pattern: &str, negate: bool) -> Result<ExprNode> {
        let regex = regex::Regex::new(&format!("^(?:{})$", pattern))
            .map_err(|e| TableError::ExprError(format!("bad pattern {:?}: {}", pattern, e)))?;
        Ok(ExprNode::Match {
            target: Box::new(target),
            regex,
            negate,
        })
    }

    /// Whether any aggregate function occurs in this tree
    pub fn has_aggregate(&self) -> bool {
        match self {
            ExprNode::Literal(_)
            | ExprNode::Column(_)
            | ExprNode::Keyword { .. }
            | ExprNode::Exists(_) => false,
            ExprNode::Unary { child, .. } => child.has_aggregate(),
            ExprNode::Binary { left, right, .. } => left.has_aggregate() || right.has_aggregate(),
            ExprNode::Func { func, args } => {
                func.is_aggregate() || args.iter().any(|a| a.has_aggregate())
            }
            ExprNode::Match { target, .. } => target.has_aggregate(),
            ExprNode::InSet { target, set } => {
                target.has_aggregate()
                    || set.iter().any(|e| match e {
                        SetElement::Value(v) => v.has_aggregate(),
                        SetElement::Range { lower, upper, .. } => {
                            lower.as_ref().is_some_and(|l| l.has_aggregate())
                                || upper.as_ref().is_some_and(|u| u.has_aggregate())
                        }
                    })
            }
            ExprNode::Slice { target, .. } => target.has_aggregate(),
        }
    }

    /// Evaluate against one row of the given table.
    ///
    /// Aggregate functions applied to an array argument reduce the array;
    /// over row groups use [`ExprNode::eval_group`].
    pub fn eval(&self, table: Option<&TableHandle>, row: usize) -> Result<Value> {
        match self {
            ExprNode::Literal(v) => Ok(v.clone()),
            ExprNode::Column(name) => {
                let table = require_table(table)?;
                table.write().get_cell(name, row)
            }
            ExprNode::Keyword { column, key } => {
                let table = require_table(table)?;
                let tab = table.read();
                let rec = match column {
                    Some(col) => &tab.column_desc(col)?.keywords,
                    None => tab.keywords(),
                };
                Ok(rec.get(key).cloned().unwrap_or(Value::Null))
            }
            ExprNode::Unary { op, child } => apply_unary(*op, child.eval(table, row)?),
            ExprNode::Binary { op, left, right } => {
                // Short-circuit the logical operators.
                match op {
                    BinaryOp::And => {
                        if !left.eval(table, row)?.is_true() {
                            return Ok(Value::Bool(false));
                        }
                        return Ok(Value::Bool(right.eval(table, row)?.is_true()));
                    }
                    BinaryOp::Or => {
                        if left.eval(table, row)?.is_true() {
                            return Ok(Value::Bool(true));
                        }
                        return Ok(Value::Bool(right.eval(table, row)?.is_true()));
                    }
                    _ => {}
                }
                apply_binary(*op, left.eval(table, row)?, right.eval(table, row)?)
            }
            ExprNode::Func { func, args } => {
                if *func == Function::Rowid {
                    return Ok(Value::Int64(row as i64));
                }
                if *func == Function::Iif {
                    check_arity(*func, args, 3)?;
                    let pick = if args[0].eval(table, row)?.is_true() { 1 } else { 2 };
                    return args[pick].eval(table, row);
                }
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(arg.eval(table, row)?);
                }
                apply_function(*func, &values)
            }
            ExprNode::Match {
                target,
                regex,
                negate,
            } => match target.eval(table, row)? {
                Value::String(s) => Ok(Value::Bool(regex.is_match(&s) != *negate)),
                Value::Null => Ok(Value::Bool(false)),
                other => Err(TableError::ExprError(format!(
                    "pattern match needs a string, got {}",
                    other
                ))),
            },
            ExprNode::InSet { target, set } => {
                let needle = target.eval(table, row)?;
                for elem in set {
                    if set_contains(elem, &needle, table, row)? {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            ExprNode::Slice { target, axes } => match target.eval(table, row)? {
                Value::Array(arr) => {
                    let (start, length) = resolve_axes(axes, arr.shape())?;
                    let out = arr.slice(&Slice::new(start, length))?;
                    // A fully collapsed slice reads as a scalar.
                    if out.shape().iter().product::<usize>() == 1 {
                        return Ok(out.first_value());
                    }
                    Ok(Value::Array(out))
                }
                Value::Null => Ok(Value::Null),
                other => Err(TableError::ExprError(format!(
                    "cannot index into {}",
                    other
                ))),
            },
            ExprNode::Exists(ctx) => {
                let rows = ctx.execute()?.row_count()?;
                Ok(Value::Bool(rows > 0))
            }
        }
    }

    /// Evaluate over a row group; aggregates fold over the rows, other
    /// nodes evaluate on the first row of the group
    pub fn eval_group(&self, table: Option<&TableHandle>, rows: &[usize]) -> Result<Value> {
        match self {
            ExprNode::Func { func, args } if func.is_aggregate() => {
                if *func == Function::Count && args.is_empty() {
                    return Ok(Value::Int64(rows.len() as i64));
                }
                check_arity(*func, args, 1)?;
                let mut values = Vec::with_capacity(rows.len());
                for &row in rows {
                    let v = args[0].eval(table, row)?;
                    if !v.is_null() {
                        values.push(v);
                    }
                }
                fold_aggregate(*func, &values)
            }
            ExprNode::Unary { op, child } => apply_unary(*op, child.eval_group(table, rows)?),
            ExprNode::Binary { op, left, right } if self.has_aggregate() => apply_binary(
                *op,
                left.eval_group(table, rows)?,
                right.eval_group(table, rows)?,
            ),
            other => {
                let row = rows.first().copied().unwrap_or(0);
                other.eval(table, row)
            }
        }
    }
}

fn require_table(table: Option<&TableHandle>) -> Result<&TableHandle> {
    table.ok_or_else(|| TableError::ExprError("no table in scope".into()))
}

fn check_arity(func: Function, args: &[ExprNode], want: usize) -> Result<()> {
    if args.len() != want {
        return Err(TableError::ExprError(format!(
            "{:?} takes {} argument(s), got {}",
            func,
            want,
            args.len()
        )));
    }
    Ok(())
}

fn apply_unary(op: UnaryOp, v: Value) -> Result<Value> {
    if v.is_null() {
        return Ok(Value::Null);
    }
    match op {
        UnaryOp::Not => Ok(Value::Bool(!v.is_true())),
        UnaryOp::Minus => match v {
            Value::Int64(i) => Ok(Value::Int64(-i)),
            Value::Float64(f) => Ok(Value::Float64(-f)),
            other => Err(TableError::ExprError(format!("cannot negate {}", other))),
        },
    }
}

fn apply_binary(op: BinaryOp, left: Value, right: Value) -> Result<Value> {
    use BinaryOp::*;
    match op {
        Eq | Ne | Gt | Ge | Lt | Le => {
            if left.is_null() || right.is_null() {
                return Ok(Value::Bool(false));
            }
            let ord = left.cmp_order(&right);
            let hit = match op {
                Eq => ord.is_eq(),
                Ne => ord.is_ne(),
                Gt => ord.is_gt(),
                Ge => ord.is_ge(),
                Lt => ord.is_lt(),
                Le => ord.is_le(),
                _ => unreachable!(),
            };
            Ok(Value::Bool(hit))
        }
        And => Ok(Value::Bool(left.is_true() && right.is_true())),
        Or => Ok(Value::Bool(left.is_true() || right.is_true())),
        In => Err(TableError::ExprError(
            "IN must be compiled to a set membership node".into(),
        )),
        Plus if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) => {
            match (left, right) {
                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
                (a, b) => Err(TableError::ExprError(format!("cannot add {} and {}", a, b))),
            }
        }
        Plus | Minus | Times | Divide | Modulo | Power => {
            if left.is_null() || right.is_null() {
                return Ok(Value::Null);
            }
            numeric_binary(op, left, right)
        }
    }
}

fn numeric_binary(op: BinaryOp, left: Value, right: Value) -> Result<Value> {
    use BinaryOp::*;
    let both_int = matches!(left, Value::Int64(_)) && matches!(right, Value::Int64(_));
    // Division is always done in floating point.
    if both_int && !matches!(op, Divide | Power) {
        let (a, b) = (left.as_i64().unwrap(), right.as_i64().unwrap());
        return match op {
            Plus | Minus | Times => {
                let out = match op {
                    Plus => a.checked_add(b),
                    Minus => a.checked_sub(b),
                    _ => a.checked_mul(b),
                };
                out.map(Value::Int64).ok_or_else(|| {
                    TableError::ExprError(format!("integer overflow in {} {:?} {}", a, op, b))
                })
            }
            Modulo if b != 0 => Ok(Value::Int64(a.rem_euclid(b))),
            Modulo => Err(TableError::ExprError("modulo by zero".into())),
            _ => unreachable!(),
        };
    }
    let a = left
        .as_f64()
        .ok_or_else(|| TableError::ExprError(format!("{} is not numeric", left)))?;
    let b = right
        .as_f64()
        .ok_or_else(|| TableError::ExprError(format!("{} is not numeric", right)))?;
    let out = match op {
        Plus => a + b,
        Minus => a - b,
        Times => a * b,
        Divide => a / b,
        Modulo => a.rem_euclid(b),
        Power => a.powf(b),
        _ => unreachable!(),
    };
    Ok(Value::Float64(out))
}

fn apply_function(func: Function, args: &[Value]) -> Result<Value> {
    use Function::*;
    match func {
        IsNull => {
            check_values(func, args, 1)?;
            Ok(Value::Bool(args[0].is_null()))
        }
        Upper | Lower => {
            check_values(func, args, 1)?;
            match &args[0] {
                Value::String(s) => Ok(Value::String(if func == Upper {
                    s.to_uppercase()
                } else {
                    s.to_lowercase()
                })),
                Value::Null => Ok(Value::Null),
                other => Err(TableError::ExprError(format!(
                    "{:?} needs a string, got {}",
                    func, other
                ))),
            }
        }
        Shape | Ndim | Nelements => {
            check_values(func, args, 1)?;
            let arr = expect_array(func, &args[0])?;
            Ok(match func {
                Shape => Value::Array(NdArray::from_i64(
                    arr.shape().iter().map(|&e| e as i64).collect(),
                )),
                Ndim => Value::Int64(arr.shape().len() as i64),
                _ => Value::Int64(arr.shape().iter().product::<usize>() as i64),
            })
        }
        Abs | Sqrt | Exp | Log | Floor | Ceil => {
            check_values(func, args, 1)?;
            if args[0].is_null() {
                return Ok(Value::Null);
            }
            if func == Abs {
                if let Value::Int64(i) = args[0] {
                    return Ok(Value::Int64(i.abs()));
                }
            }
            let x = args[0]
                .as_f64()
                .ok_or_else(|| TableError::ExprError(format!("{} is not numeric", args[0])))?;
            let out = match func {
                Abs => x.abs(),
                Sqrt => x.sqrt(),
                Exp => x.exp(),
                Log => x.ln(),
                Floor => x.floor(),
                Ceil => x.ceil(),
                _ => unreachable!(),
            };
            Ok(Value::Float64(out))
        }
        Sum | Min | Max | Mean | Count => {
            // Outside a group these reduce an array argument.
            check_values(func, args, 1)?;
            match &args[0] {
                Value::Array(arr) => fold_aggregate(func, &arr.values()),
                Value::Null => Ok(Value::Null),
                scalar => fold_aggregate(func, std::slice::from_ref(scalar)),
            }
        }
        Iif | Rowid => Err(TableError::ExprError(format!(
            "{:?} cannot be applied to plain values",
            func
        ))),
    }
}

fn check_values(func: Function, args: &[Value], want: usize) -> Result<()> {
    if args.len() != want {
        return Err(TableError::ExprError(format!(
            "{:?} takes {} argument(s), got {}",
            func,
            want,
            args.len()
        )));
    }
    Ok(())
}

fn expect_array<'a>(func: Function, v: &'a Value) -> Result<&'a NdArray> {
    match v {
        Value::Array(arr) => Ok(arr),
        other => Err(TableError::ExprError(format!(
            "{:?} needs an array, got {}",
            func, other
        ))),
    }
}

fn fold_aggregate(func: Function, values: &[Value]) -> Result<Value> {
    use Function::*;
    if func == Count {
        return Ok(Value::Int64(values.len() as i64));
    }
    if values.is_empty() {
        return Ok(Value::Null);
    }
    match func {
        Min | Max => {
            let mut best = values[0].clone();
            for v in &values[1..] {
                let ord = v.cmp_order(&best);
                if (func == Min && ord.is_lt()) || (func == Max && ord.is_gt()) {
                    best = v.clone();
                }
            }
            Ok(best)
        }
        Sum | Mean => {
            let mut all_int = true;
            let mut total = 0.0f64;
            for v in values {
                all_int &= matches!(v, Value::Int64(_));
                total += v
                    .as_f64()
                    .ok_or_else(|| TableError::ExprError(format!("{} is not numeric", v)))?;
            }
            if func == Mean {
                return Ok(Value::Float64(total / values.len() as f64));
            }
            if all_int {
                Ok(Value::Int64(total as i64))
            } else {
                Ok(Value::Float64(total))
            }
        }
        _ => unreachable!(),
    }
}

fn set_contains(
    elem: &SetElement,
    needle: &Value,
    table: Option<&TableHandle>,
    row: usize,
) -> Result<bool> {
    match elem {
        SetElement::Value(e) => {
            let v = e.eval(table, row)?;
            Ok(!needle.is_null() && needle.cmp_order(&v).is_eq())
        }
        SetElement::Range {
            lower,
            upper,
            incl_lower,
            incl_upper,
        } => {
            if needle.is_null() {
                return Ok(false);
            }
            if let Some(lo) = lower {
                let lo = lo.eval(table, row)?;
                let ord = needle.cmp_order(&lo);
                if ord.is_lt() || (!incl_lower && ord.is_eq()) {
                    return Ok(false);
                }
            }
            if let Some(hi) = upper {
                let hi = hi.eval(table, row)?;
                let ord = needle.cmp_order(&hi);
                if ord.is_gt() || (!incl_upper && ord.is_eq()) {
                    return Ok(false);
                }
            }
            Ok(true)
        }
    }
}

/// Turn per-axis inclusive bounds into a (start, length) pair for a shape
fn resolve_axes(
    axes: &[(Option<usize>, Option<usize>)],
    shape: &[usize],
) -> Result<(Vec<usize>, Vec<usize>)> {
    if axes.len() != shape.len() {
        return Err(TableError::ExprError(format!(
            "index has {} axis/axes, array has {}",
            axes.len(),
            shape.len()
        )));
    }
    let mut start = Vec::with_capacity(axes.len());
    let mut length = Vec::with_capacity(axes.len());
    for (axis, (&extent, &(lo, hi))) in shape.iter().zip(axes).enumerate() {
        let s = lo.unwrap_or(0);
        let e = hi.unwrap_or(extent.saturating_sub(1));
        if e < s {
            return Err(TableError::ExprError(format!(
                "empty index range {}:{} on axis {}",
                s, e, axis
            )));
        }
        start.push(s);
        length.push(e - s + 1);
    }
    Ok((start, length))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ArrayData, DataType};
    use crate::table::{handle, ColumnDesc, Table};

    fn sample() -> TableHandle {
        let mut t = Table::new("obs");
        t.add_column(ColumnDesc::scalar("a", DataType::Int64)).unwrap();
        t.add_column(ColumnDesc::scalar("name", DataType::String)).unwrap();
        t.add_rows(3).unwrap();
        for row in 0..3 {
            t.set_cell("a", row, Value::Int64(row as i64 + 1)).unwrap();
            t.set_cell("name", row, Value::String(format!("src{}", row))).unwrap();
        }
        handle(t)
    }

    #[test]
    fn test_arithmetic_and_comparison() {
        let t = sample();
        let e = ExprNode::Binary {
            op: BinaryOp::Plus,
            left: Box::new(ExprNode::Column("a".into())),
            right: Box::new(ExprNode::Literal(Value::Int64(10))),
        };
        assert_eq!(e.eval(Some(&t), 1).unwrap(), Value::Int64(12));

        let cmp = ExprNode::Binary {
            op: BinaryOp::Ge,
            left: Box::new(e),
            right: Box::new(ExprNode::Literal(Value::Float64(12.5))),
        };
        assert_eq!(cmp.eval(Some(&t), 1).unwrap(), Value::Bool(false));
        assert_eq!(cmp.eval(Some(&t), 2).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_int_overflow_is_an_error() {
        for (op, a, b) in [
            (BinaryOp::Plus, i64::MAX, 1),
            (BinaryOp::Minus, i64::MIN, 1),
            (BinaryOp::Times, i64::MAX, 2),
        ] {
            let e = ExprNode::Binary {
                op,
                left: Box::new(ExprNode::Literal(Value::Int64(a))),
                right: Box::new(ExprNode::Literal(Value::Int64(b))),
            };
            let err = e.eval(None, 0).unwrap_err();
            assert!(matches!(err, TableError::ExprError(_)));
        }
    }

    #[test]
    fn test_int_division_is_float() {
        let e = ExprNode::Binary {
            op: BinaryOp::Divide,
            left: Box::new(ExprNode::Literal(Value::Int64(3))),
            right: Box::new(ExprNode::Literal(Value::Int64(2))),
        };
        assert_eq!(e.eval(None, 0).unwrap(), Value::Float64(1.5));
    }

    #[test]
    fn test_regex_match_is_anchored() {
        let t = sample();
        let e = ExprNode::regex_match(ExprNode::Column("name".into()), "src[01]", false).unwrap();
        assert_eq!(e.eval(Some(&t), 0).unwrap(), Value::Bool(true));
        assert_eq!(e.eval(Some(&t), 2).unwrap(), Value::Bool(false));
        // "rc1" is a substring of "src1" but the match covers the whole string.
        let sub = ExprNode::regex_match(ExprNode::Column("name".into()), "rc1", false).unwrap();
        assert_eq!(sub.eval(Some(&t), 1).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_in_set_with_range() {
        let t = sample();
        let e = ExprNode::InSet {
            target: Box::new(ExprNode::Column("a".into())),
            set: vec![
                SetElement::Value(ExprNode::Literal(Value::Int64(7))),
                SetElement::Range {
                    lower: Some(ExprNode::Literal(Value::Int64(2))),
                    upper: None,
                    incl_lower: false,
                    incl_upper: true,
                },
            ],
        };
        assert_eq!(e.eval(Some(&t), 0).unwrap(), Value::Bool(false)); // 1
        assert_eq!(e.eval(Some(&t), 1).unwrap(), Value::Bool(false)); // 2, exclusive
        assert_eq!(e.eval(Some(&t), 2).unwrap(), Value::Bool(true)); // 3
    }

    #[test]
    fn test_array_slice_and_reduction() {
        let arr = NdArray::new(
            vec![2, 3],
            ArrayData::Int64(vec![1, 2, 3, 4, 5, 6]),
        )
        .unwrap();
        let lit = ExprNode::Literal(Value::Array(arr));

        let slice = ExprNode::Slice {
            target: Box::new(lit.clone()),
            axes: vec![(Some(1), Some(1)), (None, None)],
        };
        let row1 = slice.eval(None, 0).unwrap();
        assert_eq!(
            row1,
            Value::Array(NdArray::new(vec![1, 3], ArrayData::Int64(vec![4, 5, 6])).unwrap())
        );

        let total = ExprNode::Func {
            func: Function::Sum,
            args: vec![lit],
        };
        assert_eq!(total.eval(None, 0).unwrap(), Value::Int64(21));
    }

    #[test]
    fn test_single_element_slice_collapses() {
        let arr = NdArray::new(vec![4], ArrayData::Float64(vec![1.0, 2.0, 3.0, 4.0])).unwrap();
        let e = ExprNode::Slice {
            target: Box::new(ExprNode::Literal(Value::Array(arr))),
            axes: vec![(Some(2), Some(2))],
        };
        assert_eq!(e.eval(None, 0).unwrap(), Value::Float64(3.0));
    }

    #[test]
    fn test_group_aggregates() {
        let t = sample();
        let mean = ExprNode::Func {
            func: Function::Mean,
            args: vec![ExprNode::Column("a".into())],
        };
        assert_eq!(mean.eval_group(Some(&t), &[0, 1, 2]).unwrap(), Value::Float64(2.0));

        let twice_sum = ExprNode::Binary {
            op: BinaryOp::Times,
            left: Box::new(ExprNode::Literal(Value::Int64(2))),
            right: Box::new(ExprNode::Func {
                func: Function::Sum,
                args: vec![ExprNode::Column("a".into())],
            }),
        };
        assert_eq!(twice_sum.eval_group(Some(&t), &[0, 2]).unwrap(), Value::Int64(8));
    }
}

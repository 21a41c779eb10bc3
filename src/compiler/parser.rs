//! nom-based grammar and evaluator for modification expressions.
//!
//! Grammar: numeric literals, the `current` variable, `+ - * /` with the
//! usual precedence, unary minus, parentheses, `CLAMP/ROUND/FLOOR/CEIL/MIN/MAX`,
//! and `IF(cond, then, else)` with a single comparison as the condition.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, multispace0},
    combinator::{map, opt, recognize, value},
    error::{Error as NomError, ErrorKind},
    multi::{many0, separated_list0},
    number::complete::double,
    sequence::{pair, preceded},
    Finish, IResult,
};

use crate::error::ExpressionError;

type PResult<'a, T> = IResult<&'a str, T, NomError<&'a str>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Function {
    Clamp,
    Round,
    Floor,
    Ceil,
    Min,
    Max,
}

impl Function {
    fn arity(self) -> usize {
        match self {
            Self::Clamp => 3,
            Self::Round | Self::Floor | Self::Ceil => 1,
            Self::Min | Self::Max => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Comparison {
    pub op: CmpOp,
    pub lhs: Expr,
    pub rhs: Expr,
}

/// Parsed expression tree with one free variable, `current`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Number(f64),
    Current,
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        func: Function,
        args: Vec<Expr>,
    },
    If {
        cond: Box<Comparison>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

impl Expr {
    /// Evaluate against the row's current field value. `source` is the raw
    /// expression text, carried only for error context.
    pub(crate) fn eval(&self, current: f64, source: &str) -> Result<f64, ExpressionError> {
        match self {
            Expr::Number(n) => Ok(*n),
            Expr::Current => Ok(current),
            Expr::Neg(inner) => Ok(-inner.eval(current, source)?),
            Expr::Binary { op, lhs, rhs } => {
                let l = lhs.eval(current, source)?;
                let r = rhs.eval(current, source)?;
                match op {
                    BinaryOp::Add => Ok(l + r),
                    BinaryOp::Sub => Ok(l - r),
                    BinaryOp::Mul => Ok(l * r),
                    BinaryOp::Div => {
                        if r == 0.0 {
                            Err(ExpressionError::DivisionByZero {
                                expression: source.to_string(),
                            })
                        } else {
                            Ok(l / r)
                        }
                    }
                }
            }
            Expr::Call { func, args } => {
                let mut vals = Vec::with_capacity(args.len());
                for arg in args {
                    vals.push(arg.eval(current, source)?);
                }
                Ok(match func {
                    Function::Clamp => vals[0].max(vals[1]).min(vals[2]),
                    Function::Round => vals[0].round(),
                    Function::Floor => vals[0].floor(),
                    Function::Ceil => vals[0].ceil(),
                    Function::Min => vals[0].min(vals[1]),
                    Function::Max => vals[0].max(vals[1]),
                })
            }
            Expr::If {
                cond,
                then,
                otherwise,
            } => {
                let l = cond.lhs.eval(current, source)?;
                let r = cond.rhs.eval(current, source)?;
                let taken = match cond.op {
                    CmpOp::Lt => l < r,
                    CmpOp::Lte => l <= r,
                    CmpOp::Gt => l > r,
                    CmpOp::Gte => l >= r,
                    CmpOp::Eq => l == r,
                    CmpOp::Ne => l != r,
                };
                if taken {
                    then.eval(current, source)
                } else {
                    otherwise.eval(current, source)
                }
            }
        }
    }
}

/// Parse a complete expression; trailing input is an error.
pub(crate) fn parse_expression(input: &str) -> Result<Expr, String> {
    match expr(input).finish() {
        Ok((rest, ast)) => {
            if rest.trim().is_empty() {
                Ok(ast)
            } else {
                Err(format!("unexpected trailing input '{}'", rest.trim()))
            }
        }
        Err(err) => {
            let near: String = err.input.chars().take(24).collect();
            Err(format!("syntax error near '{}'", near.trim()))
        }
    }
}

fn expr(input: &str) -> PResult<'_, Expr> {
    let (input, first) = term(input)?;
    let (input, rest) = many0(pair(
        preceded(
            multispace0,
            alt((
                value(BinaryOp::Add, char('+')),
                value(BinaryOp::Sub, char('-')),
            )),
        ),
        term,
    ))(input)?;
    Ok((input, fold_chain(first, rest)))
}

fn term(input: &str) -> PResult<'_, Expr> {
    let (input, first) = factor(input)?;
    let (input, rest) = many0(pair(
        preceded(
            multispace0,
            alt((
                value(BinaryOp::Mul, char('*')),
                value(BinaryOp::Div, char('/')),
            )),
        ),
        factor,
    ))(input)?;
    Ok((input, fold_chain(first, rest)))
}

fn fold_chain(first: Expr, rest: Vec<(BinaryOp, Expr)>) -> Expr {
    rest.into_iter().fold(first, |lhs, (op, rhs)| Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

fn factor(input: &str) -> PResult<'_, Expr> {
    preceded(multispace0, alt((paren, negated, symbol_or_call, number)))(input)
}

fn paren(input: &str) -> PResult<'_, Expr> {
    let (input, _) = char('(')(input)?;
    let (input, inner) = expr(input)?;
    let (input, _) = preceded(multispace0, char(')'))(input)?;
    Ok((input, inner))
}

fn negated(input: &str) -> PResult<'_, Expr> {
    map(preceded(char('-'), factor), |inner| {
        Expr::Neg(Box::new(inner))
    })(input)
}

fn number(input: &str) -> PResult<'_, Expr> {
    map(double, Expr::Number)(input)
}

fn identifier(input: &str) -> PResult<'_, &str> {
    recognize(pair(alpha1, many0(alt((alphanumeric1, tag("_"))))))(input)
}

/// The `current` variable or a function call. Any other identifier is a
/// parse error: expressions may reference nothing else.
fn symbol_or_call(input: &str) -> PResult<'_, Expr> {
    let (rest, name) = identifier(input)?;
    let (after_open, open) = opt(preceded(multispace0, char('(')))(rest)?;

    if open.is_none() {
        return if name.eq_ignore_ascii_case("current") {
            Ok((rest, Expr::Current))
        } else {
            Err(nom::Err::Error(NomError::new(input, ErrorKind::Tag)))
        };
    }

    let upper = name.to_ascii_uppercase();
    if upper == "IF" {
        let (i, cond) = comparison(after_open)?;
        let (i, _) = preceded(multispace0, char(','))(i)?;
        let (i, then) = expr(i)?;
        let (i, _) = preceded(multispace0, char(','))(i)?;
        let (i, otherwise) = expr(i)?;
        let (i, _) = preceded(multispace0, char(')'))(i)?;
        return Ok((
            i,
            Expr::If {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
        ));
    }

    let func = match upper.as_str() {
        "CLAMP" => Function::Clamp,
        "ROUND" => Function::Round,
        "FLOOR" => Function::Floor,
        "CEIL" => Function::Ceil,
        "MIN" => Function::Min,
        "MAX" => Function::Max,
        _ => return Err(nom::Err::Failure(NomError::new(input, ErrorKind::Tag))),
    };

    let (i, args) = separated_list0(preceded(multispace0, char(',')), expr)(after_open)?;
    let (i, _) = preceded(multispace0, char(')'))(i)?;
    if args.len() != func.arity() {
        return Err(nom::Err::Failure(NomError::new(input, ErrorKind::Verify)));
    }
    Ok((i, Expr::Call { func, args }))
}

fn comparison(input: &str) -> PResult<'_, Comparison> {
    let (input, lhs) = expr(input)?;
    let (input, op) = preceded(
        multispace0,
        alt((
            value(CmpOp::Lte, tag("<=")),
            value(CmpOp::Gte, tag(">=")),
            value(CmpOp::Eq, tag("==")),
            value(CmpOp::Ne, tag("!=")),
            value(CmpOp::Lt, tag("<")),
            value(CmpOp::Gt, tag(">")),
            value(CmpOp::Eq, tag("=")),
        )),
    )(input)?;
    let (input, rhs) = expr(input)?;
    Ok((input, Comparison { op, lhs, rhs }))
}

//! Expression compiler front end: token normalization, percentage-shorthand
//! rewriting, and a bounded cache of parsed expressions.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use regex::Regex;
use tracing::debug;

use crate::compiler::parser::{parse_expression, Expr};
use crate::error::ExpressionError;

/// A compiled modification expression, evaluable against a row's current
/// field value.
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    source: String,
    ast: Expr,
}

impl CompiledExpression {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn eval(&self, current: f64) -> Result<f64, ExpressionError> {
        let result = self.ast.eval(current, &self.source)?;
        if !result.is_finite() {
            return Err(ExpressionError::NonFinite {
                expression: self.source.clone(),
            });
        }
        Ok(result)
    }
}

/// Compiles modification expressions, caching parse results.
///
/// The cache is owned by the compiler instance and bounded (FIFO eviction);
/// there is no process-global state.
pub struct ExpressionCompiler {
    cache: Mutex<ExpressionCache>,
    current_value_re: Regex,
    bare_value_re: Regex,
    percent_re: Regex,
}

struct ExpressionCache {
    capacity: usize,
    map: HashMap<String, Expr>,
    order: VecDeque<String>,
}

impl ExpressionCache {
    fn get(&self, key: &str) -> Option<Expr> {
        self.map.get(key).cloned()
    }

    fn insert(&mut self, key: String, ast: Expr) {
        if self.capacity == 0 || self.map.contains_key(&key) {
            return;
        }
        if self.map.len() >= self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.map.remove(&evicted);
            }
        }
        self.order.push_back(key.clone());
        self.map.insert(key, ast);
    }
}

impl ExpressionCompiler {
    pub fn new(cache_capacity: usize) -> Self {
        Self {
            cache: Mutex::new(ExpressionCache {
                capacity: cache_capacity,
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
            current_value_re: Regex::new(r"(?i)current[\s_]+value").expect("static regex"),
            bare_value_re: Regex::new(r"(?i)\bvalue\b").expect("static regex"),
            percent_re: Regex::new(r"([+\-])\s*(\d+(?:\.\d+)?)\s*%").expect("static regex"),
        }
    }

    /// Compile `raw` into an evaluable expression. Failure is a typed error
    /// carrying the raw text; the compiler never silently defaults.
    pub fn compile(&self, raw: &str) -> Result<CompiledExpression, ExpressionError> {
        if let Ok(cache) = self.cache.lock() {
            if let Some(ast) = cache.get(raw) {
                return Ok(CompiledExpression {
                    source: raw.to_string(),
                    ast,
                });
            }
        }

        let normalized = self.normalize(raw);
        let rewritten = self.rewrite_percentage(&normalized);
        debug!(raw, rewritten = rewritten.as_str(), "compiling expression");

        let ast = parse_expression(&rewritten).map_err(|message| ExpressionError::Compile {
            expression: raw.to_string(),
            message,
        })?;

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(raw.to_string(), ast.clone());
        }
        Ok(CompiledExpression {
            source: raw.to_string(),
            ast,
        })
    }

    /// Canonicalize the "current value" keyword (and its bare `value`
    /// shorthand) and the multiply/divide glyphs. The two-word form is
    /// rewritten first so it cannot degrade into `current current`.
    /// Idempotent.
    fn normalize(&self, raw: &str) -> String {
        let text = self.current_value_re.replace_all(raw, "current");
        let text = self.bare_value_re.replace_all(&text, "current");
        text.replace('×', "*").replace('÷', "/")
    }

    /// Rewrite the percentage shorthand `<lhs> ± N%` to
    /// `<lhs> * (1 ± N / 100)`. Single-occurrence by design: expressions
    /// with multiple percentage clauses are unsupported and fail to parse.
    fn rewrite_percentage(&self, text: &str) -> String {
        self.percent_re
            .replace(text, "* (1 ${1} ${2} / 100)")
            .into_owned()
    }
}

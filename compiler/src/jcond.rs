// jcond.rs — Placement-predicate (jCond) compiler.
//
// Compiles a jCond expression into a pair of (runtime source, static code).
// The code is a 5-bit mask: the tier bits DEVICE/FOG/CLOUD come from
// `sys.type` comparisons, SYNC from `sys.sync` thresholds, RUNTIME marks
// predicates that can only be decided at runtime. `&&` and `||` both OR
// the operand masks; the runtime source stays exact.
//
// Named conditions from `jcond [ns] { ... }` blocks live in the
// `ConditionRegistry`, keyed by their qualified name.

use std::collections::HashMap;

use tracing::debug;

use crate::ast::{JcondBlock, JcondExpr, JcondOperand, Span};
use crate::error::{CompileError, Result};

pub const DEVICE: u8 = 1;
pub const FOG: u8 = 2;
pub const CLOUD: u8 = 4;
pub const SYNC: u8 = 8;
pub const RUNTIME: u8 = 16;

const ALL_BITS: u8 = DEVICE | FOG | CLOUD | SYNC | RUNTIME;
const TIER_BITS: u8 = DEVICE | FOG | CLOUD;

const SYS_TYPE: &str = "sys.type";
const SYS_SYNC: &str = "sys.sync";

/// A compiled placement predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JCond {
    pub source: String,
    pub code: u8,
}

impl JCond {
    /// The predicate of an activity declared without `{cond}`.
    pub fn absent() -> Self {
        JCond {
            source: "true".to_string(),
            code: 0,
        }
    }

    pub fn not(&self) -> Self {
        JCond {
            source: format!("!{}", self.source),
            code: self.code ^ ALL_BITS,
        }
    }
}

impl Default for JCond {
    fn default() -> Self {
        Self::absent()
    }
}

/// Registry of named conditions, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ConditionRegistry {
    order: Vec<String>,
    entries: HashMap<String, JCond>,
}

impl ConditionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, qualified: impl Into<String>, cond: JCond) {
        let qualified = qualified.into();
        if !self.entries.contains_key(&qualified) {
            self.order.push(qualified.clone());
        }
        self.entries.insert(qualified, cond);
    }

    pub fn get(&self, qualified: &str) -> Option<&JCond> {
        self.entries.get(qualified)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &JCond)> {
        self.order
            .iter()
            .filter_map(|q| self.entries.get(q).map(|c| (q.as_str(), c)))
    }

    /// Compile an optional `{cond}` specifier; absent compiles to `true`/0.
    pub fn compile_spec(&self, expr: Option<&JcondExpr>) -> Result<JCond> {
        match expr {
            Some(expr) => self.compile(expr),
            None => Ok(JCond::absent()),
        }
    }

    pub fn compile(&self, expr: &JcondExpr) -> Result<JCond> {
        match expr {
            JcondExpr::Ref { namespace, name } => {
                let qualified = match namespace {
                    Some(ns) => format!("{}.{}", ns.name, name.name),
                    None => name.name.clone(),
                };
                let code = self
                    .get(&qualified)
                    .map(|c| c.code)
                    .ok_or_else(|| CompileError::UnknownCondition {
                        name: qualified.clone(),
                        span: name.span,
                    })?;
                Ok(JCond {
                    source: format!("jcondition.get('{}')", qualified),
                    code,
                })
            }
            JcondExpr::Compare { lhs, op, rhs, span } => compile_comparison(lhs, op, rhs, *span),
            JcondExpr::Not(inner) => Ok(self.compile(inner)?.not()),
            JcondExpr::Paren(inner) => {
                let inner = self.compile(inner)?;
                Ok(JCond {
                    source: format!("({})", inner.source),
                    code: inner.code,
                })
            }
            JcondExpr::Binary { lhs, op, rhs } => {
                let lhs = self.compile(lhs)?;
                let rhs = self.compile(rhs)?;
                Ok(JCond {
                    source: format!("{} {} {}", lhs.source, op.as_str(), rhs.source),
                    code: lhs.code | rhs.code,
                })
            }
        }
    }

    /// Compile and register every entry of a `jcond` block.
    ///
    /// Returns the `(qualified name, condition)` pairs in block order. Later
    /// entries may refer to earlier ones.
    pub fn declare_block(&mut self, block: &JcondBlock) -> Result<Vec<(String, JCond)>> {
        let prefix = block
            .namespace
            .as_ref()
            .map(|ns| format!("{}.", ns.name))
            .unwrap_or_default();
        let mut declared = Vec::with_capacity(block.entries.len());
        for entry in &block.entries {
            let qualified = format!("{}{}", prefix, entry.name.name);
            let cond = self.compile(&entry.expr)?;
            debug!(name = %qualified, code = cond.code, "registered condition");
            self.register(qualified.clone(), cond.clone());
            declared.push((qualified, cond));
        }
        Ok(declared)
    }
}

fn tier_bit(literal: &str) -> u8 {
    match literal.trim_matches(|c| c == '"' || c == '\'') {
        "dev" => DEVICE,
        "fog" => FOG,
        "cloud" => CLOUD,
        _ => 0,
    }
}

fn positive_literal(operand: &JcondOperand) -> bool {
    operand.is_literal && operand.text.parse::<f64>().map_or(false, |n| n > 0.0)
}

fn compile_comparison(
    lhs: &JcondOperand,
    op: &str,
    rhs: &JcondOperand,
    span: Span,
) -> Result<JCond> {
    let (lhs, rhs) = match (lhs.text == SYS_TYPE, rhs.text == SYS_TYPE) {
        (true, true) => return Err(CompileError::SysTypeBothSides { span }),
        (false, true) => (rhs, lhs),
        _ => (lhs, rhs),
    };

    let code = if lhs.text == SYS_TYPE {
        let bit = tier_bit(&rhs.text);
        match op {
            "==" => bit,
            "!=" if bit != 0 => TIER_BITS & !bit,
            "!=" => 0,
            _ => {
                return Err(CompileError::InvalidSysTypeOperator {
                    op: op.to_string(),
                    span,
                })
            }
        }
    } else if lhs.text == SYS_SYNC {
        if matches!(op, ">=" | "==") && positive_literal(rhs) {
            SYNC
        } else {
            0
        }
    } else if !lhs.is_literal || !rhs.is_literal {
        RUNTIME
    } else {
        0
    };

    Ok(JCond {
        source: format!("jcondition_context['{}'] {} {}", lhs.text, op, rhs.text),
        code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Ident, JcondOp};
    use chumsky::span::Span as _;

    fn span() -> Span {
        Span::new((), 0..0)
    }

    fn operand(text: &str) -> JcondOperand {
        let is_literal = text.starts_with('"') || text.parse::<f64>().is_ok();
        JcondOperand {
            text: text.into(),
            is_literal,
            span: span(),
        }
    }

    fn cmp(lhs: &str, op: &str, rhs: &str) -> JcondExpr {
        JcondExpr::Compare {
            lhs: operand(lhs),
            op: op.into(),
            rhs: operand(rhs),
            span: span(),
        }
    }

    fn reference(ns: Option<&str>, name: &str) -> JcondExpr {
        JcondExpr::Ref {
            namespace: ns.map(|n| Ident {
                name: n.into(),
                span: span(),
            }),
            name: Ident {
                name: name.into(),
                span: span(),
            },
        }
    }

    fn code(expr: &JcondExpr) -> u8 {
        ConditionRegistry::new().compile(expr).unwrap().code
    }

    #[test]
    fn tier_equality_bits() {
        assert_eq!(code(&cmp("sys.type", "==", "\"dev\"")), DEVICE);
        assert_eq!(code(&cmp("sys.type", "==", "\"fog\"")), FOG);
        assert_eq!(code(&cmp("sys.type", "==", "\"cloud\"")), CLOUD);
        assert_eq!(code(&cmp("sys.type", "==", "\"moon\"")), 0);
    }

    #[test]
    fn tier_inequality_is_other_two() {
        assert_eq!(code(&cmp("sys.type", "!=", "\"dev\"")), 6);
        assert_eq!(code(&cmp("sys.type", "!=", "\"fog\"")), 5);
        assert_eq!(code(&cmp("sys.type", "!=", "\"cloud\"")), 3);
        assert_eq!(code(&cmp("sys.type", "!=", "\"moon\"")), 0);
    }

    #[test]
    fn sys_type_on_right_is_swapped() {
        let cond = ConditionRegistry::new()
            .compile(&cmp("\"fog\"", "==", "sys.type"))
            .unwrap();
        assert_eq!(cond.code, FOG);
        assert_eq!(cond.source, "jcondition_context['sys.type'] == \"fog\"");
    }

    #[test]
    fn sys_type_errors() {
        let reg = ConditionRegistry::new();
        assert!(matches!(
            reg.compile(&cmp("sys.type", "==", "sys.type")),
            Err(CompileError::SysTypeBothSides { .. })
        ));
        assert!(matches!(
            reg.compile(&cmp("sys.type", ">=", "\"fog\"")),
            Err(CompileError::InvalidSysTypeOperator { .. })
        ));
    }

    #[test]
    fn sync_threshold() {
        assert_eq!(code(&cmp("sys.sync", ">=", "10")), SYNC);
        assert_eq!(code(&cmp("sys.sync", "==", "1")), SYNC);
        assert_eq!(code(&cmp("sys.sync", ">=", "0")), 0);
        assert_eq!(code(&cmp("sys.sync", "<", "5")), 0);
        assert_eq!(code(&cmp("sys.sync", ">=", "limit")), 0);
    }

    #[test]
    fn runtime_bit_for_non_literal_sides() {
        assert_eq!(code(&cmp("battery", ">", "20")), RUNTIME);
        assert_eq!(code(&cmp("1", "<", "2")), 0);
    }

    #[test]
    fn combinators() {
        let expr = JcondExpr::Binary {
            lhs: Box::new(cmp("sys.type", "==", "\"dev\"")),
            op: JcondOp::And,
            rhs: Box::new(JcondExpr::Paren(Box::new(cmp("sys.sync", ">=", "2")))),
        };
        let cond = ConditionRegistry::new().compile(&expr).unwrap();
        assert_eq!(cond.code, DEVICE | SYNC);
        assert_eq!(
            cond.source,
            "jcondition_context['sys.type'] == \"dev\" && (jcondition_context['sys.sync'] >= 2)"
        );

        let not = ConditionRegistry::new()
            .compile(&JcondExpr::Not(Box::new(cmp("sys.type", "==", "\"dev\""))))
            .unwrap();
        assert_eq!(not.code, DEVICE ^ 31);
        assert!(not.source.starts_with('!'));
    }

    #[test]
    fn absent_predicate() {
        let cond = ConditionRegistry::new().compile_spec(None).unwrap();
        assert_eq!(cond, JCond::absent());
        assert_eq!((cond.source.as_str(), cond.code), ("true", 0));
    }

    #[test]
    fn references_resolve_through_registry() {
        let mut reg = ConditionRegistry::new();
        reg.register(
            "app.fogonly",
            JCond {
                source: "x".into(),
                code: FOG,
            },
        );
        let cond = reg.compile(&reference(Some("app"), "fogonly")).unwrap();
        assert_eq!(cond.source, "jcondition.get('app.fogonly')");
        assert_eq!(cond.code, FOG);
        assert!(matches!(
            reg.compile(&reference(None, "fogonly")),
            Err(CompileError::UnknownCondition { .. })
        ));
    }

    #[test]
    fn block_registers_qualified_entries() {
        use crate::ast::{JcondBlock, JcondEntry};
        let block = JcondBlock {
            namespace: Some(Ident {
                name: "app".into(),
                span: span(),
            }),
            entries: vec![
                JcondEntry {
                    name: Ident {
                        name: "edge".into(),
                        span: span(),
                    },
                    expr: cmp("sys.type", "!=", "\"cloud\""),
                    span: span(),
                },
                JcondEntry {
                    name: Ident {
                        name: "edge_sync".into(),
                        span: span(),
                    },
                    expr: JcondExpr::Binary {
                        lhs: Box::new(reference(Some("app"), "edge")),
                        op: JcondOp::Or,
                        rhs: Box::new(cmp("sys.sync", ">=", "1")),
                    },
                    span: span(),
                },
            ],
        };
        let mut reg = ConditionRegistry::new();
        let declared = reg.declare_block(&block).unwrap();
        assert_eq!(declared.len(), 2);
        assert_eq!(declared[1].0, "app.edge_sync");
        assert_eq!(declared[1].1.code, DEVICE | FOG | SYNC);
        let names: Vec<&str> = reg.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["app.edge", "app.edge_sync"]);
    }
}

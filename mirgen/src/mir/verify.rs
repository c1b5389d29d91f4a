//! Structural checks on a finished body
//!
//! Used by the `check` subcommand and by tests to confirm a lowered body is
//! well formed: fixed blocks present, every block properly terminated,
//! every name defined once, and every read dominated by a definition.

use std::collections::{BTreeSet, HashMap, HashSet};

use thiserror::Error;

use super::graph;
use super::{MirBody, MirOp, ENTRY_BLOCK, EXIT_BLOCK, RETURN_ASSIGN_BLOCK};

/// One problem found in a body
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{block}: {message}")]
pub struct BodyViolation {
    pub block: String,
    pub message: String,
}

impl BodyViolation {
    fn new(block: &str, message: impl Into<String>) -> Self {
        Self {
            block: block.to_string(),
            message: message.into(),
        }
    }
}

/// Check `body`; `params` are the names bound on entry
pub fn verify_body(body: &MirBody, params: &[String]) -> Result<(), Vec<BodyViolation>> {
    let mut violations = Vec::new();

    for required in [ENTRY_BLOCK, RETURN_ASSIGN_BLOCK, EXIT_BLOCK] {
        if !body.blocks.contains_key(required) {
            violations.push(BodyViolation::new(required, "required block is missing"));
        }
    }

    check_terminators(body, &mut violations);
    check_single_definition(body, params, &mut violations);
    if violations.is_empty() {
        check_defined_before_use(body, params, &mut violations);
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

fn check_terminators(body: &MirBody, violations: &mut Vec<BodyViolation>) {
    for (label, block) in &body.blocks {
        let n = block.ops.len();
        for (i, op) in block.ops.iter().enumerate() {
            if op.is_terminator() && i + 1 != n {
                violations.push(BodyViolation::new(label, format!("terminator `{}` is not last", op)));
            }
            for target in op.jump_targets() {
                if !body.blocks.contains_key(target) {
                    violations.push(BodyViolation::new(label, format!("jump to undefined block `{}`", target)));
                }
            }
        }
        if label != EXIT_BLOCK && block.terminator().is_none() {
            violations.push(BodyViolation::new(label, "block does not end with a jump"));
        }
    }
}

fn check_single_definition(body: &MirBody, params: &[String], violations: &mut Vec<BodyViolation>) {
    let mut defined: HashSet<String> = params.iter().cloned().collect();
    for (label, block) in &body.blocks {
        for op in &block.ops {
            for def in op.mod_vars() {
                if !defined.insert(def.name_id().to_string()) {
                    violations.push(BodyViolation::new(label, format!("`{}` is defined more than once", def)));
                }
            }
        }
    }
}

/// Forward must-availability over the reachable blocks in reverse post-order
fn check_defined_before_use(body: &MirBody, params: &[String], violations: &mut Vec<BodyViolation>) {
    let preds = graph::predecessors(&body.blocks);
    let rpo = graph::reverse_post_order(&body.blocks);
    let reachable: HashSet<&str> = rpo.iter().map(String::as_str).collect();
    let mut out: HashMap<String, BTreeSet<String>> = HashMap::new();

    for label in &rpo {
        let mut avail: BTreeSet<String> = if label == ENTRY_BLOCK {
            params.iter().cloned().collect()
        } else {
            let mut incoming = preds[label]
                .iter()
                .filter(|p| reachable.contains(p.as_str()))
                .filter_map(|p| out.get(p));
            let first = incoming.next().cloned().unwrap_or_default();
            incoming.fold(first, |acc, s| acc.intersection(s).cloned().collect())
        };

        for op in &body.blocks[label].ops {
            if let MirOp::Phi { src, .. } = op {
                for (pred, reg) in src {
                    let ok = out.get(pred).is_some_and(|s| s.contains(reg.name_id()));
                    if !ok && reachable.contains(pred.as_str()) {
                        violations.push(BodyViolation::new(
                            label,
                            format!("phi input `{}` is not defined at the end of `{}`", reg, pred),
                        ));
                    }
                }
            } else {
                for used in op.used_vars() {
                    if !avail.contains(used.name_id()) {
                        violations.push(BodyViolation::new(
                            label,
                            format!("`{}` may be used before it is defined", used),
                        ));
                    }
                }
            }
            for def in op.mod_vars() {
                avail.insert(def.name_id().to_string());
            }
        }

        out.insert(label.clone(), avail);
    }
}

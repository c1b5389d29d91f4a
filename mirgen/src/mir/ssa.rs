//! SSA conversion
//!
//! Every register definition gets a unique name id: the first definition of a
//! name keeps it, later ones become `name$N`. Reads are rewritten to the
//! version reaching them, and join blocks get a phi for each name that
//! reaches them under different versions. Block graphs are acyclic, so one
//! pass in reverse post-order sees every predecessor before its successors.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use super::cleanup::LoweringPass;
use super::graph;
use super::{Argument, MirBody, MirOp, Register, TempRegister, Variable, ENTRY_BLOCK};
use crate::ast::SourceInfo;

/// base name -> version currently reaching this point
type VersionMap = HashMap<String, Register>;

pub struct SsaConversion {
    params: Vec<String>,
}

impl SsaConversion {
    pub fn new(params: impl IntoIterator<Item = String>) -> Self {
        Self {
            params: params.into_iter().collect(),
        }
    }
}

impl LoweringPass for SsaConversion {
    fn name(&self) -> &'static str {
        "ssa_conversion"
    }

    fn run_on_body(&self, body: &mut MirBody) -> bool {
        let mut renamer = Renamer::default();
        for p in &self.params {
            renamer.defined.insert(p.clone());
        }
        renamer.convert(body, &self.params)
    }
}

#[derive(Default)]
struct Renamer {
    /// Every base name defined so far, across the whole body
    defined: HashSet<String>,
    versions: HashMap<String, u32>,
    changed: bool,
}

impl Renamer {
    fn fresh_name(&mut self, base: &str) -> String {
        let n = self.versions.entry(base.to_string()).or_insert(0);
        *n += 1;
        self.changed = true;
        format!("{}${}", base, n)
    }

    fn convert(&mut self, body: &mut MirBody, params: &[String]) -> bool {
        for block in body.blocks.values() {
            for succ in graph::successors(block) {
                if !body.blocks.contains_key(succ) {
                    panic!("block `{}` jumps to undefined label `{}`", block.label, succ);
                }
            }
        }

        let rpo = graph::reverse_post_order(&body.blocks);
        let reachable: HashSet<String> = rpo.iter().cloned().collect();
        let preds = graph::predecessors(&body.blocks);
        let mut out: HashMap<String, VersionMap> = HashMap::new();

        for label in graph::block_order(&body.blocks) {
            let is_reachable = reachable.contains(&label);
            let block_preds: Vec<&String> = preds
                .get(&label)
                .map(|ps| ps.iter().filter(|p| !is_reachable || reachable.contains(*p)).collect())
                .unwrap_or_default();

            if is_reachable
                && let Some(back) = block_preds.iter().find(|p| !out.contains_key(p.as_str()))
            {
                panic!("cyclic block graph: `{}` reaches back to `{}`", back, label);
            }

            let incoming: Vec<(&String, &VersionMap)> = block_preds
                .iter()
                .filter_map(|p| out.get(p.as_str()).map(|m| (*p, m)))
                .collect();

            let (mut current, phis) = if label == ENTRY_BLOCK {
                let seed = params
                    .iter()
                    .map(|p| (p.clone(), Register::Var(Variable::new(p.as_str()))))
                    .collect();
                (seed, Vec::new())
            } else {
                self.merge(&incoming)
            };

            let Some(block) = body.blocks.get_mut(&label) else {
                continue;
            };

            for op in &mut block.ops {
                self.rename_op(op, &mut current);
            }
            if !phis.is_empty() {
                block.ops.splice(0..0, phis);
            }

            out.insert(label, current);
        }

        self.changed
    }

    /// Combine predecessor versions; names missing on some path are dropped
    fn merge(&mut self, incoming: &[(&String, &VersionMap)]) -> (VersionMap, Vec<MirOp>) {
        let mut merged = VersionMap::new();
        let mut phis = Vec::new();

        let Some(((_, first), rest)) = incoming.split_first() else {
            return (merged, phis);
        };

        let names: BTreeSet<&String> = first
            .keys()
            .filter(|name| rest.iter().all(|(_, m)| m.contains_key(*name)))
            .collect();

        for name in names {
            let reg = &first[name];
            if rest.iter().all(|(_, m)| m[name].name_id() == reg.name_id()) {
                merged.insert(name.clone(), reg.clone());
                continue;
            }

            let trgt = renamed(reg, self.fresh_name(name));
            let src: BTreeMap<String, Register> = incoming
                .iter()
                .map(|(label, m)| ((*label).clone(), m[name].clone()))
                .collect();
            phis.push(MirOp::Phi {
                sinfo: SourceInfo::synthetic(),
                src,
                trgt: trgt.clone(),
            });
            merged.insert(name.clone(), trgt);
        }

        (merged, phis)
    }

    fn rename_op(&mut self, op: &mut MirOp, current: &mut VersionMap) {
        for arg in op.args_mut() {
            if let Argument::Register(reg) = arg
                && let Some(version) = current.get(&reg.base_name())
                && version.name_id() != reg.name_id()
            {
                *reg = version.clone();
                self.changed = true;
            }
        }
        for mut slot in op.use_slots_mut() {
            if let Some(version) = current.get(&slot.base_name())
                && version.name_id() != slot.name_id()
            {
                slot.set_name_id(version.name_id());
                self.changed = true;
            }
        }

        for mut slot in op.def_slots_mut() {
            let base = slot.base_name();
            if !self.defined.insert(base.clone()) {
                let name = self.fresh_name(&base);
                slot.set_name_id(name);
            }
            current.insert(base, slot.to_register());
        }
    }
}

fn renamed(reg: &Register, name_id: String) -> Register {
    match reg {
        Register::Temp(t) => Register::Temp(TempRegister {
            reg_id: t.reg_id,
            name_id,
        }),
        Register::Var(v) => Register::Var(Variable {
            lname: v.lname.clone(),
            name_id,
        }),
    }
}

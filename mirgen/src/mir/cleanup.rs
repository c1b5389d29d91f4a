//! Body lowering passes
//!
//! Each finished body goes through a small pipeline: temporary copy
//! propagation and dead temporary elimination run to a fixed point, then the
//! one-shot SSA conversion renames every definition.

use std::collections::{BTreeMap, HashMap, HashSet};

use super::ssa::SsaConversion;
use super::{Argument, MirBody, MirOp, MirType, Register, RegisterSlot};

/// Lowering pass trait
pub trait LoweringPass {
    /// Name of the pass
    fn name(&self) -> &'static str;

    /// Run the pass on a body; returns true if anything changed
    fn run_on_body(&self, body: &mut MirBody) -> bool;
}

/// Lowering pipeline
pub struct LoweringPipeline {
    /// Repeated until none of them reports a change
    passes: Vec<Box<dyn LoweringPass>>,
    /// Run once, in order, after the fixed point
    finish: Vec<Box<dyn LoweringPass>>,
    max_iterations: usize,
}

impl LoweringPipeline {
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            finish: Vec::new(),
            max_iterations: 10,
        }
    }

    /// The standard pipeline for a body with the given parameters
    pub fn for_body(params: &BTreeMap<String, MirType>) -> Self {
        let mut pipeline = Self::new();
        pipeline.add_pass(Box::new(TempCopyPropagation));
        pipeline.add_pass(Box::new(DeadTempElimination));
        pipeline.add_finish_pass(Box::new(SsaConversion::new(params.keys().cloned())));
        pipeline
    }

    pub fn add_pass(&mut self, pass: Box<dyn LoweringPass>) {
        self.passes.push(pass);
    }

    pub fn add_finish_pass(&mut self, pass: Box<dyn LoweringPass>) {
        self.finish.push(pass);
    }

    pub fn run(&self, body: &mut MirBody) -> LoweringStats {
        let mut stats = LoweringStats::default();
        let mut iteration = 0;

        loop {
            let mut changed = false;
            iteration += 1;

            for pass in &self.passes {
                if pass.run_on_body(body) {
                    changed = true;
                    stats.record_pass(pass.name());
                }
            }

            if !changed || iteration >= self.max_iterations {
                break;
            }
        }

        for pass in &self.finish {
            if pass.run_on_body(body) {
                stats.record_pass(pass.name());
            }
        }

        stats.iterations = iteration;
        stats
    }
}

impl Default for LoweringPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics from a pipeline run
#[derive(Debug, Default)]
pub struct LoweringStats {
    pub iterations: usize,
    pub pass_counts: HashMap<String, usize>,
}

impl LoweringStats {
    pub fn record_pass(&mut self, name: &str) {
        *self.pass_counts.entry(name.to_string()).or_insert(0) += 1;
    }
}

// ============================================================================
// Temporary copy propagation
// ============================================================================

/// Replace reads of `#t` with `x` after `#t = x`, within a block
pub struct TempCopyPropagation;

impl LoweringPass for TempCopyPropagation {
    fn name(&self) -> &'static str {
        "temp_copy_propagation"
    }

    fn run_on_body(&self, body: &mut MirBody) -> bool {
        let mut changed = false;

        for block in body.blocks.values_mut() {
            // temp name -> the value it copies
            let mut copies: HashMap<String, Argument> = HashMap::new();

            for op in &mut block.ops {
                for arg in op.args_mut() {
                    if let Argument::Register(Register::Temp(t)) = &*arg
                        && let Some(src) = copies.get(&t.name_id)
                    {
                        *arg = src.clone();
                        changed = true;
                    }
                }
                for slot in op.use_slots_mut() {
                    if let RegisterSlot::Temp(t) = slot
                        && let Some(Argument::Register(Register::Temp(src))) = copies.get(&t.name_id)
                    {
                        *t = src.clone();
                        changed = true;
                    }
                }

                // a redefinition invalidates copies into or out of that name
                for def in op.mod_vars() {
                    let name = def.name_id().to_string();
                    copies.remove(&name);
                    copies.retain(|_, src| src.name_id() != name);
                }

                if let MirOp::RegAssign { src, trgt, .. } = op {
                    copies.insert(trgt.name_id.clone(), src.clone());
                }
            }
        }

        changed
    }
}

// ============================================================================
// Dead temporary elimination
// ============================================================================

/// Drop side-effect-free ops whose temporary is never read
pub struct DeadTempElimination;

impl LoweringPass for DeadTempElimination {
    fn name(&self) -> &'static str {
        "dead_temp_elimination"
    }

    fn run_on_body(&self, body: &mut MirBody) -> bool {
        let mut changed = false;

        loop {
            let used: HashSet<String> = body
                .blocks
                .values()
                .flat_map(|b| b.ops.iter())
                .flat_map(|op| op.used_vars())
                .filter(Register::is_temp)
                .map(|r| r.name_id().to_string())
                .collect();

            let mut removed = false;
            for block in body.blocks.values_mut() {
                let before = block.ops.len();
                block.ops.retain(|op| match op.removable_target() {
                    Some(trgt) => used.contains(&trgt.name_id),
                    None => true,
                });
                removed |= block.ops.len() != before;
            }

            if !removed {
                break;
            }
            changed = true;
        }

        changed
    }
}

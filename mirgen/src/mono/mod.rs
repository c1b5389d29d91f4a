//! Monomorphization driver
//!
//! The driver owns every piece of shared state for one compilation: the
//! assembly under construction, the body emitter and the seven pending
//! queues. The checker is re-entered once per queued item through the
//! [`Checker`] trait and registers whatever new instantiations it meets back
//! into the [`MirEmitter`]. The loop stops when every queue is empty and
//! virtual dispatch resolution yields nothing new.
//!
//! # Round structure
//! 1. Drain all pending types.
//! 2. Drain globals and static constants.
//! 3. Process one invoke: namespace function, else lambda, else static,
//!    else method.
//! 4. With every queue empty, resolve virtual call sites against the
//!    instantiated entities and concepts and enqueue the new targets.

mod dispatch;
mod queue;

pub use dispatch::resolve_virtual_targets;
pub use queue::PendingQueue;

use std::collections::HashSet;

use crate::ast::{
    BindMap, ConstDeclId, InvokeDeclId, PCode, Program, ResolvedAtom, ResolvedFunctionType,
    ResolvedType, TypeDeclId,
};
use crate::config::EmitterConfig;
use crate::error::{Diagnostic, MirError, Result};
use crate::mir::keys::{self, ConstantKey, InvokeKey, NominalTypeKey, VirtualMethodKey};
use crate::mir::{
    build_subtype_table, close_vtables, infer_var_types, BodyEmitter, MirAssembly, MirRecordEntry,
    MirTupleEntry, MirType, MirTypeOption,
};

// ============================================================================
// Pending work items
// ============================================================================

#[derive(Debug, Clone)]
pub struct PendingType {
    pub tkey: NominalTypeKey,
    pub decl: TypeDeclId,
    pub binds: BindMap,
}

#[derive(Debug, Clone)]
pub struct PendingGlobal {
    pub gkey: ConstantKey,
    pub decl: ConstDeclId,
}

#[derive(Debug, Clone)]
pub struct PendingConst {
    pub ckey: ConstantKey,
    pub containing: TypeDeclId,
    pub decl: ConstDeclId,
    pub cbinds: BindMap,
}

/// A namespace function instantiation
#[derive(Debug, Clone)]
pub struct PendingInvoke {
    pub ikey: InvokeKey,
    pub decl: InvokeDeclId,
    pub binds: BindMap,
    pub pcodes: Vec<PCode>,
}

#[derive(Debug, Clone)]
pub struct PendingLambda {
    pub lkey: InvokeKey,
    pub decl: InvokeDeclId,
    pub ftype: ResolvedFunctionType,
    /// Bindings in scope where the closure was written
    pub binds: BindMap,
}

#[derive(Debug, Clone)]
pub struct PendingStatic {
    pub ikey: InvokeKey,
    pub containing: TypeDeclId,
    pub cbinds: BindMap,
    pub decl: InvokeDeclId,
    pub binds: BindMap,
    pub pcodes: Vec<PCode>,
}

/// A member method instantiation, direct or found through virtual dispatch
#[derive(Debug, Clone)]
pub struct PendingMethod {
    pub ikey: InvokeKey,
    /// Slot this implementation fills, for dispatch targets
    pub vkey: Option<VirtualMethodKey>,
    /// Entity or concept the dispatch target was resolved for
    pub receiver: Option<NominalTypeKey>,
    pub decl: InvokeDeclId,
    pub containing: TypeDeclId,
    pub cbinds: BindMap,
    pub binds: BindMap,
    pub pcodes: Vec<PCode>,
}

/// Every nominal type registered so far, in registration order
#[derive(Debug, Clone)]
pub struct TypeInstantiation {
    pub tkey: NominalTypeKey,
    pub decl: TypeDeclId,
    pub binds: BindMap,
}

/// A virtual invocation seen while lowering some body
#[derive(Debug, Clone)]
pub struct VirtualCallSite {
    pub vkey: VirtualMethodKey,
    /// Static type of the receiver
    pub receiver: ResolvedType,
    pub name: String,
    pub binds: BindMap,
    pub pcodes: Vec<PCode>,
}

/// Result of a unique member method lookup
#[derive(Debug, Clone)]
pub struct MemberMethodLookup {
    /// Type declaring the implementation (may be a concept default)
    pub containing: TypeDeclId,
    pub cbinds: BindMap,
    pub decl: InvokeDeclId,
}

// ============================================================================
// Checker interface
// ============================================================================

/// The type checker, re-entered by the driver for every pending item
///
/// An `Err` from a `process_*` callback is a hard failure: the driver stops
/// and the compilation is rejected. Semantic problems that should not stop
/// the loop go to [`Checker::error_list`] instead.
pub trait Checker {
    fn process_oo_type(&mut self, emitter: &mut MirEmitter<'_>, item: &PendingType) -> Result<()>;

    fn process_global(&mut self, emitter: &mut MirEmitter<'_>, item: &PendingGlobal) -> Result<()>;

    fn process_const(&mut self, emitter: &mut MirEmitter<'_>, item: &PendingConst) -> Result<()>;

    fn process_namespace_function(
        &mut self,
        emitter: &mut MirEmitter<'_>,
        item: &PendingInvoke,
    ) -> Result<()>;

    fn process_lambda_function(&mut self, emitter: &mut MirEmitter<'_>, item: &PendingLambda) -> Result<()>;

    fn process_static_function(&mut self, emitter: &mut MirEmitter<'_>, item: &PendingStatic) -> Result<()>;

    fn process_method_function(&mut self, emitter: &mut MirEmitter<'_>, item: &PendingMethod) -> Result<()>;

    fn is_subtype(&self, t1: &ResolvedType, t2: &ResolvedType) -> bool;

    /// The single member method `name` an instance of `ty` would run
    fn try_get_member_method_unique(&self, ty: &ResolvedType, name: &str) -> Option<MemberMethodLookup>;

    fn process_regex_info(&mut self, _emitter: &mut MirEmitter<'_>) -> Result<()> {
        Ok(())
    }

    fn run_final_exhaustive_checks(&mut self, _emitter: &mut MirEmitter<'_>) -> Result<()> {
        Ok(())
    }

    fn error_list(&self) -> &[Diagnostic];
}

// ============================================================================
// Driver state
// ============================================================================

/// Driver-owned state for one compilation
pub struct MirEmitter<'p> {
    program: &'p Program,
    pub masm: MirAssembly,
    pub body_emitter: BodyEmitter,

    pending_types: PendingQueue<PendingType>,
    pending_globals: PendingQueue<PendingGlobal>,
    pending_consts: PendingQueue<PendingConst>,
    pending_functions: PendingQueue<PendingInvoke>,
    pending_lambdas: PendingQueue<PendingLambda>,
    pending_statics: PendingQueue<PendingStatic>,
    pending_methods: PendingQueue<PendingMethod>,

    instantiations: Vec<TypeInstantiation>,
    vcall_sites: Vec<VirtualCallSite>,
    /// (vkey, receiver type key) pairs already in `vcall_sites`
    vcall_seen: HashSet<(VirtualMethodKey, String)>,
}

impl<'p> MirEmitter<'p> {
    pub fn new(program: &'p Program, config: &EmitterConfig) -> Self {
        Self {
            program,
            masm: MirAssembly::new(),
            body_emitter: BodyEmitter::new(&config.core_namespace),
            pending_types: PendingQueue::new(),
            pending_globals: PendingQueue::new(),
            pending_consts: PendingQueue::new(),
            pending_functions: PendingQueue::new(),
            pending_lambdas: PendingQueue::new(),
            pending_statics: PendingQueue::new(),
            pending_methods: PendingQueue::new(),
            instantiations: Vec::new(),
            vcall_sites: Vec::new(),
            vcall_seen: HashSet::new(),
        }
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    pub fn instantiations(&self) -> &[TypeInstantiation] {
        &self.instantiations
    }

    pub fn virtual_call_sites(&self) -> &[VirtualCallSite] {
        &self.vcall_sites
    }

    /// Items waiting across all seven queues
    pub fn pending_len(&self) -> usize {
        self.pending_types.len()
            + self.pending_globals.len()
            + self.pending_consts.len()
            + self.pending_functions.len()
            + self.pending_lambdas.len()
            + self.pending_statics.len()
            + self.pending_methods.len()
    }

    fn queues_empty(&self) -> bool {
        self.pending_types.is_empty()
            && self.pending_globals.is_empty()
            && self.pending_consts.is_empty()
            && self.pending_functions.is_empty()
            && self.pending_lambdas.is_empty()
            && self.pending_statics.is_empty()
            && self.pending_methods.is_empty()
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    /// Request a nominal type instantiation; returns its key
    pub fn register_type_instantiation(&mut self, decl: TypeDeclId, binds: BindMap) -> NominalTypeKey {
        let tkey = keys::type_key(self.program.type_decl(decl), &binds);
        if self.masm.has_nominal(&tkey) || self.pending_types.contains(&tkey) {
            return tkey;
        }

        tracing::trace!(%tkey, "register type");
        self.instantiations.push(TypeInstantiation {
            tkey: tkey.clone(),
            decl,
            binds: binds.clone(),
        });
        self.pending_types.push(
            &tkey,
            PendingType {
                tkey: tkey.clone(),
                decl,
                binds,
            },
        );
        tkey
    }

    /// Intern a resolved type, registering every nominal type it mentions
    pub fn register_resolved_type_reference(&mut self, ty: &ResolvedType) -> MirType {
        if let Some(existing) = self.masm.type_map.get(ty.id()) {
            return existing.clone();
        }

        let options: Vec<MirTypeOption> = ty.options().iter().map(|atom| self.register_atom(atom)).collect();
        let mty = MirType::create(options);
        self.masm
            .type_map
            .entry(mty.trkey.clone())
            .or_insert_with(|| mty.clone());
        mty
    }

    fn register_atom(&mut self, atom: &ResolvedAtom) -> MirTypeOption {
        let option = match atom {
            ResolvedAtom::Entity(e) => {
                MirTypeOption::entity(self.register_type_instantiation(e.decl, e.binds.clone()))
            }
            ResolvedAtom::Concept(c) => {
                // Each component is interned on its own for single-concept subtype checks
                if c.entries.len() > 1 {
                    for entry in &c.entries {
                        self.register_resolved_type_reference(&ResolvedType::concept(vec![entry.clone()]));
                    }
                }
                MirTypeOption::concept(
                    c.entries
                        .iter()
                        .map(|entry| self.register_type_instantiation(entry.decl, entry.binds.clone()))
                        .collect(),
                )
            }
            ResolvedAtom::Tuple(t) => MirTypeOption::tuple(
                t.entries
                    .iter()
                    .map(|e| MirTupleEntry {
                        ty: self.register_resolved_type_reference(&e.ty),
                        is_optional: e.is_optional,
                    })
                    .collect(),
            ),
            ResolvedAtom::Record(r) => MirTypeOption::record(
                r.entries
                    .iter()
                    .map(|e| MirRecordEntry {
                        name: e.name.clone(),
                        ty: self.register_resolved_type_reference(&e.ty),
                        is_optional: e.is_optional,
                    })
                    .collect(),
            ),
            ResolvedAtom::EphemeralList(l) => MirTypeOption::ephemeral_list(
                l.types
                    .iter()
                    .map(|t| self.register_resolved_type_reference(t))
                    .collect(),
            ),
        };

        self.masm
            .type_map
            .entry(option.trkey().to_string())
            .or_insert_with(|| MirType::single(option.clone()));
        option
    }

    pub fn register_pending_global_processing(&mut self, decl: ConstDeclId) -> ConstantKey {
        let gkey = keys::global_key(self.program.const_decl(decl));
        if !self.masm.constant_decls.contains_key(&gkey) {
            self.pending_globals.push(&gkey, PendingGlobal { gkey: gkey.clone(), decl });
        }
        gkey
    }

    pub fn register_pending_const_processing(
        &mut self,
        containing: TypeDeclId,
        cbinds: BindMap,
        decl: ConstDeclId,
    ) -> ConstantKey {
        let name = &self.program.const_decl(decl).name;
        let ckey = keys::const_key(self.program.type_decl(containing), &cbinds, name);
        if !self.masm.constant_decls.contains_key(&ckey) {
            self.pending_consts.push(
                &ckey,
                PendingConst {
                    ckey: ckey.clone(),
                    containing,
                    decl,
                    cbinds,
                },
            );
        }
        ckey
    }

    pub fn register_function_call(&mut self, decl: InvokeDeclId, binds: BindMap, pcodes: Vec<PCode>) -> InvokeKey {
        let idecl = self.program.invoke_decl(decl);
        let ikey = keys::function_key(&idecl.ns, &idecl.name, &binds, &pcodes);
        if !self.masm.has_invoke(&ikey) {
            self.pending_functions.push(
                &ikey,
                PendingInvoke {
                    ikey: ikey.clone(),
                    decl,
                    binds,
                    pcodes,
                },
            );
        }
        ikey
    }

    /// `cbinds` bind the containing type's terms, `binds` the static's own
    pub fn register_static_call(
        &mut self,
        containing: TypeDeclId,
        cbinds: BindMap,
        decl: InvokeDeclId,
        binds: BindMap,
        pcodes: Vec<PCode>,
    ) -> InvokeKey {
        let full = merge_binds(&cbinds, &binds);
        let name = &self.program.invoke_decl(decl).name;
        let ikey = keys::static_key(self.program.type_decl(containing), name, &full, &pcodes);
        if !self.masm.has_invoke(&ikey) {
            self.pending_statics.push(
                &ikey,
                PendingStatic {
                    ikey: ikey.clone(),
                    containing,
                    cbinds,
                    decl,
                    binds,
                    pcodes,
                },
            );
        }
        ikey
    }

    /// Direct (statically resolved) member method call
    pub fn register_method_call(
        &mut self,
        containing: TypeDeclId,
        cbinds: BindMap,
        decl: InvokeDeclId,
        binds: BindMap,
        pcodes: Vec<PCode>,
    ) -> InvokeKey {
        let full = merge_binds(&cbinds, &binds);
        let name = &self.program.invoke_decl(decl).name;
        let ikey = keys::method_key(self.program.type_decl(containing), name, &full, &pcodes);
        if !self.masm.has_invoke(&ikey) {
            self.pending_methods.push(
                &ikey,
                PendingMethod {
                    ikey: ikey.clone(),
                    vkey: None,
                    receiver: None,
                    decl,
                    containing,
                    cbinds,
                    binds,
                    pcodes,
                },
            );
        }
        ikey
    }

    /// Record a virtual call site; its targets are found once the queues drain
    pub fn register_virtual_method_call(
        &mut self,
        receiver: &ResolvedType,
        name: &str,
        binds: BindMap,
        pcodes: Vec<PCode>,
    ) -> VirtualMethodKey {
        let vkey = keys::virtual_method_key(name, &binds);
        if self.vcall_seen.insert((vkey.clone(), receiver.id().to_string())) {
            tracing::trace!(%vkey, receiver = %receiver, "register virtual call");
            self.vcall_sites.push(VirtualCallSite {
                vkey: vkey.clone(),
                receiver: receiver.clone(),
                name: name.to_string(),
                binds,
                pcodes,
            });
        }
        vkey
    }

    /// Request the body of a closure
    pub fn register_pcode(&mut self, decl: InvokeDeclId, ftype: ResolvedFunctionType, binds: BindMap) -> InvokeKey {
        let lkey = keys::closure_key(self.program.invoke_decl(decl));
        if !self.masm.has_invoke(&lkey) {
            self.pending_lambdas.push(
                &lkey,
                PendingLambda {
                    lkey: lkey.clone(),
                    decl,
                    ftype,
                    binds,
                },
            );
        }
        lkey
    }

    // ------------------------------------------------------------------------
    // Fixpoint
    // ------------------------------------------------------------------------

    fn seed(&mut self, config: &EmitterConfig) {
        for name in &config.core_types {
            let Some(id) = self.program.lookup_type(&config.core_namespace, name) else {
                tracing::debug!(core_type = %name, "core type not declared");
                continue;
            };
            let decl = self.program.type_decl(id);
            if decl.terms.is_empty() {
                let ty = ResolvedType::nominal(decl, BindMap::new());
                self.register_resolved_type_reference(&ty);
            }
        }

        let entries: Vec<InvokeDeclId> = self
            .program
            .entrypoints(&config.entrypoint_attribute)
            .map(|d| d.id)
            .collect();
        for decl in entries {
            let ikey = self.register_function_call(decl, BindMap::new(), Vec::new());
            tracing::debug!(%ikey, "entry point");
            self.masm.entry_points.push(ikey);
        }
    }

    /// Run one item through the checker, tagging foreign errors with its key
    fn dispatch<T>(
        &mut self,
        key: &str,
        item: &T,
        f: impl FnOnce(&mut Self, &T) -> Result<()>,
    ) -> Result<()> {
        tracing::trace!(key, "process");
        f(self, item).map_err(|e| match e {
            e @ MirError::HardFailure { .. } => e,
            other => MirError::hard_failure(key, other.to_string()),
        })
    }

    /// Drain the queues until nothing new is reachable; returns the round count
    fn run_fixpoint<C: Checker + ?Sized>(&mut self, checker: &mut C, max_rounds: Option<usize>) -> Result<usize> {
        let mut rounds = 0;

        loop {
            while !self.queues_empty() {
                while let Some(item) = self.pending_types.pop() {
                    self.dispatch(&item.tkey, &item, |em, it| checker.process_oo_type(em, it))?;
                }

                while !self.pending_globals.is_empty() || !self.pending_consts.is_empty() {
                    if let Some(item) = self.pending_globals.pop() {
                        self.dispatch(&item.gkey, &item, |em, it| checker.process_global(em, it))?;
                    }
                    if let Some(item) = self.pending_consts.pop() {
                        self.dispatch(&item.ckey, &item, |em, it| checker.process_const(em, it))?;
                    }
                }

                if let Some(item) = self.pending_functions.pop() {
                    self.dispatch(&item.ikey, &item, |em, it| checker.process_namespace_function(em, it))?;
                } else if let Some(item) = self.pending_lambdas.pop() {
                    self.dispatch(&item.lkey, &item, |em, it| checker.process_lambda_function(em, it))?;
                } else if let Some(item) = self.pending_statics.pop() {
                    self.dispatch(&item.ikey, &item, |em, it| checker.process_static_function(em, it))?;
                } else if let Some(item) = self.pending_methods.pop() {
                    self.dispatch(&item.ikey, &item, |em, it| checker.process_method_function(em, it))?;
                }
            }

            rounds += 1;
            let targets = resolve_virtual_targets(self.program, &*checker, &self.vcall_sites, &self.instantiations);

            let mut fresh = 0;
            for target in targets {
                if let (Some(vkey), Some(receiver)) = (&target.vkey, &target.receiver) {
                    let vcall_map = match self.masm.entity_decls.get_mut(receiver) {
                        Some(entity) => Some(&mut entity.vcall_map),
                        None => self.masm.concept_decls.get_mut(receiver).map(|c| &mut c.vcall_map),
                    };
                    if let Some(vcall_map) = vcall_map {
                        vcall_map.entry(vkey.clone()).or_insert_with(|| target.ikey.clone());
                    }
                }
                if !self.masm.has_invoke(&target.ikey) {
                    let key = target.ikey.clone();
                    if self.pending_methods.push(&key, target) {
                        fresh += 1;
                    }
                }
            }

            tracing::debug!(round = rounds, fresh, "virtual dispatch round");
            if fresh == 0 {
                return Ok(rounds);
            }
            if let Some(max) = max_rounds
                && rounds >= max
            {
                return Err(MirError::hard_failure(
                    "fixpoint",
                    format!("no convergence after {} rounds", rounds),
                ));
            }
        }
    }
}

/// Containing-type bindings overlaid with the invoke's own
fn merge_binds(cbinds: &BindMap, binds: &BindMap) -> BindMap {
    let mut full = cbinds.clone();
    full.extend(binds.iter().map(|(k, v)| (k.clone(), v.clone())));
    full
}

// ============================================================================
// Entry point
// ============================================================================

/// Build the closed assembly for `program`
///
/// Returns every collected diagnostic when the checker reported errors or a
/// hard failure stopped the fixpoint; no partial assembly is ever returned.
#[tracing::instrument(skip_all)]
pub fn generate_masm<C: Checker + ?Sized>(
    program: &Program,
    checker: &mut C,
    config: &EmitterConfig,
) -> Result<MirAssembly> {
    let mut emitter = MirEmitter::new(program, config);
    emitter.seed(config);

    let outcome = emitter.run_fixpoint(checker, config.max_fixpoint_rounds);
    let outcome = outcome.and_then(|rounds| {
        if !checker.error_list().is_empty() {
            return Ok(rounds);
        }
        checker.process_regex_info(&mut emitter)?;
        checker.run_final_exhaustive_checks(&mut emitter)?;
        Ok(rounds)
    });

    let mut diagnostics = checker.error_list().to_vec();
    match outcome {
        Ok(rounds) if diagnostics.is_empty() => {
            tracing::info!(
                rounds,
                types = emitter.masm.type_map.len(),
                invokes = emitter.masm.invoke_decls.len(),
                "fixpoint converged"
            );
        }
        Ok(_) => {}
        Err(e) => {
            tracing::debug!(error = %e, "hard failure");
            diagnostics.push(Diagnostic::unlocated(e.to_string()));
        }
    }
    if !diagnostics.is_empty() {
        return Err(MirError::Rejected(diagnostics));
    }

    let mut masm = emitter.masm;
    close_vtables(&mut masm);
    build_subtype_table(&mut masm);

    if config.infer_var_types {
        let inferred: Vec<(InvokeKey, _)> = masm
            .invoke_decls
            .iter()
            .map(|(key, decl)| {
                let vtypes = infer_var_types(&decl.body, &decl.params, &decl.result_type, &masm, &config.core_namespace);
                (key.clone(), vtypes)
            })
            .collect();
        for (key, vtypes) in inferred {
            if let Some(decl) = masm.invoke_decls.get_mut(&key) {
                decl.body.vtypes = Some(vtypes);
            }
        }
    }

    Ok(masm)
}

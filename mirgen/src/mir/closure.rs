//! Inheritance closure
//!
//! Runs once the fixpoint has converged. Concepts are visited in post-order
//! over their `provides` edges so each provider is complete before anything
//! that inherits from it; entities then pull from their direct providers.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::keys::{InvokeKey, NominalTypeKey, VirtualMethodKey};
use super::MirAssembly;

/// Concept keys, every provider before the concepts that provide it
///
/// # Panics
/// Panics when a `provides` edge names a concept missing from the assembly.
fn concept_post_order(masm: &MirAssembly) -> Vec<NominalTypeKey> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut order = Vec::with_capacity(masm.concept_decls.len());

    for root in masm.concept_decls.keys() {
        // (key, children already pushed)
        let mut stack: Vec<(&str, bool)> = vec![(root.as_str(), false)];
        while let Some((key, expanded)) = stack.pop() {
            if expanded {
                order.push(key.to_string());
                continue;
            }
            if !visited.insert(key) {
                continue;
            }
            stack.push((key, true));
            for p in masm.concept_decls[key].provides.iter().rev() {
                if !masm.concept_decls.contains_key(p) {
                    panic!("concept `{}` provides unknown concept `{}`", key, p);
                }
                if !visited.contains(p.as_str()) {
                    stack.push((p.as_str(), false));
                }
            }
        }
    }

    order
}

fn inherit(
    own: &mut BTreeMap<VirtualMethodKey, InvokeKey>,
    provided: &BTreeMap<VirtualMethodKey, InvokeKey>,
) {
    for (vkey, ikey) in provided {
        own.entry(vkey.clone()).or_insert_with(|| ikey.clone());
    }
}

/// Complete every vtable with the entries inherited through `provides`
///
/// Entries a type already has are never overwritten.
pub fn close_vtables(masm: &mut MirAssembly) {
    for key in concept_post_order(masm) {
        let provides = masm.concept_decls[&key].provides.clone();
        let mut vcalls = masm.concept_decls[&key].vcall_map.clone();
        for p in &provides {
            inherit(&mut vcalls, &masm.concept_decls[p].vcall_map);
        }
        if let Some(decl) = masm.concept_decls.get_mut(&key) {
            decl.vcall_map = vcalls;
        }
    }

    let concepts = &masm.concept_decls;
    for entity in masm.entity_decls.values_mut() {
        for p in &entity.provides {
            let Some(provider) = concepts.get(p) else {
                panic!("entity `{}` provides unknown concept `{}`", entity.tkey, p);
            };
            inherit(&mut entity.vcall_map, &provider.vcall_map);
        }
    }

    tracing::debug!(
        concepts = masm.concept_decls.len(),
        entities = masm.entity_decls.len(),
        "closed vtables"
    );
}

/// Record the transitive supertypes of every nominal type
pub fn build_subtype_table(masm: &mut MirAssembly) {
    let mut table: BTreeMap<NominalTypeKey, BTreeSet<NominalTypeKey>> = BTreeMap::new();

    for key in concept_post_order(masm) {
        let mut supers = BTreeSet::from([key.clone()]);
        for p in &masm.concept_decls[&key].provides {
            supers.extend(table[p].iter().cloned());
        }
        table.insert(key, supers);
    }

    for (key, entity) in &masm.entity_decls {
        let mut supers = BTreeSet::from([key.clone()]);
        for p in &entity.provides {
            let Some(provided) = table.get(p) else {
                panic!("entity `{}` provides unknown concept `{}`", key, p);
            };
            supers.extend(provided.iter().cloned());
        }
        table.insert(key.clone(), supers);
    }

    masm.subtype_table = table
        .into_iter()
        .map(|(k, supers)| (k, supers.into_iter().collect()))
        .collect();
}

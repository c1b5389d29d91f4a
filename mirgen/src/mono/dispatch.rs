//! Virtual dispatch resolution
//!
//! Pairs every recorded virtual call site with every instantiated entity or
//! concept whose type is a subtype of the receiver, and resolves the unique
//! member method that instance would run.

use crate::ast::{Program, ResolvedType};
use crate::mir::keys;

use super::{merge_binds, Checker, PendingMethod, TypeInstantiation, VirtualCallSite};

/// Method instantiations reachable from the given call sites
///
/// The result may repeat targets found in earlier rounds; the caller
/// decides what is new.
pub fn resolve_virtual_targets<C: Checker + ?Sized>(
    program: &Program,
    checker: &C,
    sites: &[VirtualCallSite],
    instantiations: &[TypeInstantiation],
) -> Vec<PendingMethod> {
    let mut targets = Vec::new();

    for site in sites {
        for inst in instantiations {
            // Concepts qualify too: one may be reached through a wider view
            let decl = program.type_decl(inst.decl);
            let itype = ResolvedType::nominal(decl, inst.binds.clone());
            if !checker.is_subtype(&itype, &site.receiver) {
                continue;
            }

            let Some(found) = checker.try_get_member_method_unique(&itype, &site.name) else {
                tracing::trace!(vkey = %site.vkey, receiver = %inst.tkey, "no implementation");
                continue;
            };

            let containing = program.type_decl(found.containing);
            let full = merge_binds(&found.cbinds, &site.binds);
            let ikey = keys::method_key(containing, &site.name, &full, &site.pcodes);

            targets.push(PendingMethod {
                ikey,
                vkey: Some(site.vkey.clone()),
                receiver: Some(inst.tkey.clone()),
                decl: found.decl,
                containing: found.containing,
                cbinds: found.cbinds,
                binds: site.binds.clone(),
                pcodes: site.pcodes.clone(),
            });
        }
    }

    targets
}

//! Middle Intermediate Representation (MIR)
//!
//! MIR is the closed, fully monomorphized program handed to native code
//! generation. Every function body is a map of basic blocks in SSA form;
//! every type is interned once under its canonical key.
//!
//! # Lowering
//!
//! Bodies are built by the [`BodyEmitter`] and finalized through the
//! [`LoweringPipeline`]:
//! - Temporary copy propagation
//! - Dead temporary elimination
//! - SSA conversion

mod assembly;
mod body;
mod cleanup;
mod closure;
pub mod graph;
pub mod keys;
mod ops;
mod ssa;
mod vartype;
mod verify;

pub use assembly::{
    MirAssembly, MirConceptTypeDecl, MirConstantDecl, MirEntityTypeDecl, MirFieldDecl,
    MirFunctionParameter, MirInvokeBodyDecl, MirInvokePrimitiveDecl,
};
pub use body::{BodyEmitter, RefReturn};
pub use cleanup::{
    DeadTempElimination, LoweringPass, LoweringPipeline, LoweringStats, TempCopyPropagation,
};
pub use closure::{build_subtype_table, close_vtables};
pub use keys::{ConstantKey, FieldKey, InvokeKey, NominalTypeKey, ResolvedTypeKey, VirtualMethodKey};
pub use ops::{
    Argument, Constant, MirOp, OpKind, Register, RegisterSlot, TempRegister, Variable, RETURN_VAR,
};
pub use ssa::SsaConversion;
pub use vartype::infer_var_types;
pub use verify::{verify_body, BodyViolation};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ast::SourceInfo;

/// Block where execution starts
pub const ENTRY_BLOCK: &str = "entry";
/// Block holding the return-value assignment
pub const RETURN_ASSIGN_BLOCK: &str = "returnassign";
/// Terminal block; performs cleanup and the native return
pub const EXIT_BLOCK: &str = "exit";

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirTupleEntry {
    pub ty: MirType,
    pub is_optional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirRecordEntry {
    pub name: String,
    pub ty: MirType,
    pub is_optional: bool,
}

/// One option of an interned type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MirTypeOption {
    Entity {
        trkey: NominalTypeKey,
    },
    /// Intersection of the listed concepts
    Concept {
        ckeys: Vec<NominalTypeKey>,
        trkey: ResolvedTypeKey,
    },
    Tuple {
        entries: Vec<MirTupleEntry>,
        trkey: ResolvedTypeKey,
    },
    Record {
        entries: Vec<MirRecordEntry>,
        trkey: ResolvedTypeKey,
    },
    EphemeralList {
        entries: Vec<MirType>,
        trkey: ResolvedTypeKey,
    },
}

impl MirTypeOption {
    pub fn entity(tkey: impl Into<NominalTypeKey>) -> Self {
        MirTypeOption::Entity { trkey: tkey.into() }
    }

    pub fn concept(mut ckeys: Vec<NominalTypeKey>) -> Self {
        ckeys.sort();
        ckeys.dedup();
        let trkey = ckeys.join(" & ");
        MirTypeOption::Concept { ckeys, trkey }
    }

    pub fn tuple(entries: Vec<MirTupleEntry>) -> Self {
        let trkey = format!(
            "[{}]",
            entries
                .iter()
                .map(|e| format!("{}{}", if e.is_optional { "?:" } else { "" }, e.ty.trkey))
                .collect::<Vec<_>>()
                .join(", ")
        );
        MirTypeOption::Tuple { entries, trkey }
    }

    pub fn record(mut entries: Vec<MirRecordEntry>) -> Self {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        let trkey = format!(
            "{{{}}}",
            entries
                .iter()
                .map(|e| format!("{}{}:{}", e.name, if e.is_optional { "?" } else { "" }, e.ty.trkey))
                .collect::<Vec<_>>()
                .join(", ")
        );
        MirTypeOption::Record { entries, trkey }
    }

    pub fn ephemeral_list(entries: Vec<MirType>) -> Self {
        let trkey = format!(
            "(|{}|)",
            entries.iter().map(|e| e.trkey.as_str()).collect::<Vec<_>>().join(", ")
        );
        MirTypeOption::EphemeralList { entries, trkey }
    }

    pub fn trkey(&self) -> &str {
        match self {
            MirTypeOption::Entity { trkey }
            | MirTypeOption::Concept { trkey, .. }
            | MirTypeOption::Tuple { trkey, .. }
            | MirTypeOption::Record { trkey, .. }
            | MirTypeOption::EphemeralList { trkey, .. } => trkey,
        }
    }
}

/// An interned type: a non-empty union of options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirType {
    pub trkey: ResolvedTypeKey,
    pub options: Vec<MirTypeOption>,
}

impl MirType {
    /// Sorted, deduplicated union of the given options
    pub fn create(options: impl IntoIterator<Item = MirTypeOption>) -> Self {
        let mut options: Vec<MirTypeOption> = options.into_iter().collect();
        options.sort_by(|a, b| a.trkey().cmp(b.trkey()));
        options.dedup_by(|a, b| a.trkey() == b.trkey());
        let trkey = options.iter().map(|o| o.trkey()).collect::<Vec<_>>().join(" | ");
        Self { trkey, options }
    }

    pub fn single(option: MirTypeOption) -> Self {
        Self::create([option])
    }
}

// ============================================================================
// Blocks and bodies
// ============================================================================

/// A label plus its straight-line operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub label: String,
    pub ops: Vec<MirOp>,
}

impl BasicBlock {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ops: Vec::new(),
        }
    }

    /// Final op, when it ends the block
    pub fn terminator(&self) -> Option<&MirOp> {
        self.ops.last().filter(|op| op.is_terminator())
    }
}

/// A finished function body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "BodyRepr", from = "BodyRepr")]
pub struct MirBody {
    pub file: String,
    pub sinfo: SourceInfo,
    pub blocks: BTreeMap<String, BasicBlock>,
    /// Variable name -> type key, filled after lowering
    pub vtypes: Option<BTreeMap<String, ResolvedTypeKey>>,
}

impl MirBody {
    /// Blocks in reverse post-order from `entry`, then any unreachable ones
    pub fn ordered_blocks(&self) -> Vec<&BasicBlock> {
        graph::block_order(&self.blocks)
            .iter()
            .filter_map(|label| self.blocks.get(label))
            .collect()
    }
}

/// Interchange form: blocks listed in topological order
#[derive(Serialize, Deserialize)]
struct BodyRepr {
    file: String,
    sinfo: SourceInfo,
    blocks: Vec<BasicBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    vtypes: Option<BTreeMap<String, ResolvedTypeKey>>,
}

impl From<MirBody> for BodyRepr {
    fn from(body: MirBody) -> Self {
        let order = graph::block_order(&body.blocks);
        let mut blocks = body.blocks;
        BodyRepr {
            file: body.file,
            sinfo: body.sinfo,
            blocks: order.iter().filter_map(|l| blocks.remove(l)).collect(),
            vtypes: body.vtypes,
        }
    }
}

impl From<BodyRepr> for MirBody {
    fn from(repr: BodyRepr) -> Self {
        MirBody {
            file: repr.file,
            sinfo: repr.sinfo,
            blocks: repr
                .blocks
                .into_iter()
                .map(|b| (b.label.clone(), b))
                .collect(),
            vtypes: repr.vtypes,
        }
    }
}

// ============================================================================
// Text output
// ============================================================================

/// Format a whole assembly as text
pub fn format_assembly(masm: &MirAssembly) -> String {
    let mut out = String::new();

    for (i, (key, decl)) in masm.invoke_decls.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let params: Vec<String> = decl
            .params
            .iter()
            .map(|p| format!("{}: {}", p.name, p.ty))
            .collect();
        out.push_str(&format!("fn {}({}) -> {} {{\n", key, params.join(", "), decl.result_type));
        out.push_str(&format_blocks(&decl.body));
        out.push_str("}\n");
    }

    out
}

/// Format a single body as text
pub fn format_body(body: &MirBody) -> String {
    format!("body {} {{\n{}}}\n", body.file, format_blocks(body))
}

fn format_blocks(body: &MirBody) -> String {
    let mut out = String::new();
    for block in body.ordered_blocks() {
        out.push_str(&format!("{}:\n", block.label));
        for op in &block.ops {
            out.push_str(&format!("  {}\n", op));
        }
    }
    out
}

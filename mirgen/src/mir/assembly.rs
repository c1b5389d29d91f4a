//! The MIR assembly: every table the driver fills, keyed canonically
//!
//! Tables are append-only while the fixpoint runs. After it converges the
//! inheritance closure completes the vtables and records the subtype table,
//! and the assembly is frozen.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::keys::{ConstantKey, FieldKey, InvokeKey, NominalTypeKey, ResolvedTypeKey, VirtualMethodKey};
use super::{MirBody, MirType};
use crate::ast::SourceInfo;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirConceptTypeDecl {
    pub tkey: NominalTypeKey,
    pub ns: String,
    pub name: String,
    pub src_file: String,
    pub sinfo: SourceInfo,
    pub attributes: Vec<String>,
    /// Type parameter -> bound type key
    pub terms: BTreeMap<String, ResolvedTypeKey>,
    /// Direct supertypes
    pub provides: Vec<NominalTypeKey>,
    pub vcall_map: BTreeMap<VirtualMethodKey, InvokeKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirEntityTypeDecl {
    pub tkey: NominalTypeKey,
    pub ns: String,
    pub name: String,
    pub src_file: String,
    pub sinfo: SourceInfo,
    pub attributes: Vec<String>,
    pub terms: BTreeMap<String, ResolvedTypeKey>,
    pub provides: Vec<NominalTypeKey>,
    pub fields: Vec<FieldKey>,
    pub vcall_map: BTreeMap<VirtualMethodKey, InvokeKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirConstantDecl {
    pub ckey: ConstantKey,
    pub src_file: String,
    pub sinfo: SourceInfo,
    pub declared_type: ResolvedTypeKey,
    /// Zero-argument invoke computing the value
    pub value: InvokeKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirFieldDecl {
    pub fkey: FieldKey,
    pub name: String,
    pub enclosing: NominalTypeKey,
    pub src_file: String,
    pub sinfo: SourceInfo,
    pub declared_type: ResolvedTypeKey,
    /// Default-value invoke, when the field declares one
    pub value: Option<InvokeKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirFunctionParameter {
    pub name: String,
    pub ty: ResolvedTypeKey,
}

impl MirFunctionParameter {
    pub fn new(name: impl Into<String>, ty: impl Into<ResolvedTypeKey>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

/// An invoke with a lowered body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirInvokeBodyDecl {
    pub key: InvokeKey,
    pub ns: String,
    pub name: String,
    pub attributes: Vec<String>,
    pub src_file: String,
    pub sinfo: SourceInfo,
    pub params: Vec<MirFunctionParameter>,
    pub result_type: ResolvedTypeKey,
    pub body: MirBody,
}

/// An invoke implemented natively by the runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirInvokePrimitiveDecl {
    pub key: InvokeKey,
    pub ns: String,
    pub name: String,
    pub attributes: Vec<String>,
    pub src_file: String,
    pub sinfo: SourceInfo,
    pub params: Vec<MirFunctionParameter>,
    pub result_type: ResolvedTypeKey,
    /// Runtime implementation name
    pub implkey: String,
}

/// The closed program handed to code generation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirAssembly {
    pub entry_points: Vec<InvokeKey>,
    pub type_map: BTreeMap<ResolvedTypeKey, MirType>,
    pub concept_decls: BTreeMap<NominalTypeKey, MirConceptTypeDecl>,
    pub entity_decls: BTreeMap<NominalTypeKey, MirEntityTypeDecl>,
    pub constant_decls: BTreeMap<ConstantKey, MirConstantDecl>,
    pub field_decls: BTreeMap<FieldKey, MirFieldDecl>,
    pub invoke_decls: BTreeMap<InvokeKey, MirInvokeBodyDecl>,
    pub primitive_invoke_decls: BTreeMap<InvokeKey, MirInvokePrimitiveDecl>,
    pub literal_regexs: Vec<String>,
    /// Nominal key -> sorted transitive supertypes, itself included
    pub subtype_table: BTreeMap<NominalTypeKey, Vec<NominalTypeKey>>,
}

impl MirAssembly {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Whether a nominal key names a concept or entity declared here
    pub fn has_nominal(&self, tkey: &str) -> bool {
        self.concept_decls.contains_key(tkey) || self.entity_decls.contains_key(tkey)
    }

    /// Whether an invoke key has been finished, either lowered or primitive
    pub fn has_invoke(&self, ikey: &str) -> bool {
        self.invoke_decls.contains_key(ikey) || self.primitive_invoke_decls.contains_key(ikey)
    }

    /// Answered from the subtype table; unknown keys are only subtypes of themselves
    pub fn is_subtype(&self, sub: &str, sup: &str) -> bool {
        if sub == sup {
            return true;
        }
        self.subtype_table
            .get(sub)
            .is_some_and(|supers| supers.binary_search_by(|k| k.as_str().cmp(sup)).is_ok())
    }

    /// Entities whose nominal key is a subtype of `sup`
    pub fn entities_of(&self, sup: &str) -> Vec<&NominalTypeKey> {
        self.entity_decls
            .keys()
            .filter(|k| self.is_subtype(k, sup))
            .collect()
    }

    pub fn body(&self, ikey: &str) -> Option<&MirBody> {
        self.invoke_decls.get(ikey).map(|decl| &decl.body)
    }
}

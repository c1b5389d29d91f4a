//! Resolved (checker-produced) types
//!
//! A [`ResolvedType`] is a non-empty union of atoms. Each atom caches its
//! canonical id at construction so keys can be rendered without going back
//! to the declaration arena.

use std::collections::HashMap;

use super::{InvokeDecl, InvokeDeclId, SourceInfo, TypeDecl, TypeDeclId, TypeDeclKind};
use crate::mir::keys;

/// Generic parameter name -> concrete type
pub type BindMap = HashMap<String, ResolvedType>;

/// One nominal entity instantiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityAtom {
    pub decl: TypeDeclId,
    pub binds: BindMap,
    id: String,
}

/// One concept component of a (possibly intersected) concept atom
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptEntry {
    pub decl: TypeDeclId,
    pub binds: BindMap,
    id: String,
}

impl ConceptEntry {
    pub fn new(decl: &TypeDecl, binds: BindMap) -> Self {
        let id = keys::type_key(decl, &binds);
        Self {
            decl: decl.id,
            binds,
            id,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Intersection of one or more concepts, sorted by id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptAtom {
    pub entries: Vec<ConceptEntry>,
    id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleEntry {
    pub ty: ResolvedType,
    pub is_optional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleAtom {
    pub entries: Vec<TupleEntry>,
    id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEntry {
    pub name: String,
    pub ty: ResolvedType,
    pub is_optional: bool,
}

/// Record entries are kept sorted by property name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordAtom {
    pub entries: Vec<RecordEntry>,
    id: String,
}

/// In-flight multi-value result, never stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EphemeralListAtom {
    pub types: Vec<ResolvedType>,
    id: String,
}

/// Closed set of type option kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedAtom {
    Entity(EntityAtom),
    Concept(ConceptAtom),
    Tuple(TupleAtom),
    Record(RecordAtom),
    EphemeralList(EphemeralListAtom),
}

impl ResolvedAtom {
    pub fn id(&self) -> &str {
        match self {
            ResolvedAtom::Entity(a) => &a.id,
            ResolvedAtom::Concept(a) => &a.id,
            ResolvedAtom::Tuple(a) => &a.id,
            ResolvedAtom::Record(a) => &a.id,
            ResolvedAtom::EphemeralList(a) => &a.id,
        }
    }
}

/// A non-empty union of atoms, sorted and deduplicated by id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedType {
    options: Vec<ResolvedAtom>,
    id: String,
}

impl ResolvedType {
    /// Build a union; nested unions are flattened.
    ///
    /// # Panics
    /// Panics on an empty option list.
    pub fn union(options: impl IntoIterator<Item = ResolvedAtom>) -> Self {
        let mut options: Vec<ResolvedAtom> = options.into_iter().collect();
        assert!(!options.is_empty(), "a resolved type needs at least one option");
        options.sort_by(|a, b| a.id().cmp(b.id()));
        options.dedup_by(|a, b| a.id() == b.id());
        let id = options.iter().map(|o| o.id()).collect::<Vec<_>>().join(" | ");
        Self { options, id }
    }

    pub fn single(atom: ResolvedAtom) -> Self {
        Self::union([atom])
    }

    /// Union of several resolved types
    pub fn join(types: impl IntoIterator<Item = ResolvedType>) -> Self {
        Self::union(types.into_iter().flat_map(|t| t.options))
    }

    pub fn entity(decl: &TypeDecl, binds: BindMap) -> Self {
        debug_assert_eq!(decl.kind, TypeDeclKind::Entity);
        let id = keys::type_key(decl, &binds);
        Self::single(ResolvedAtom::Entity(EntityAtom {
            decl: decl.id,
            binds,
            id,
        }))
    }

    pub fn concept(entries: Vec<ConceptEntry>) -> Self {
        let mut entries = entries;
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries.dedup_by(|a, b| a.id == b.id);
        let id = entries.iter().map(|e| e.id.as_str()).collect::<Vec<_>>().join(" & ");
        Self::single(ResolvedAtom::Concept(ConceptAtom { entries, id }))
    }

    /// Entity or single-entry concept type for a nominal declaration
    pub fn nominal(decl: &TypeDecl, binds: BindMap) -> Self {
        match decl.kind {
            TypeDeclKind::Entity => Self::entity(decl, binds),
            TypeDeclKind::Concept => Self::concept(vec![ConceptEntry::new(decl, binds)]),
        }
    }

    pub fn tuple(entries: Vec<TupleEntry>) -> Self {
        let id = format!(
            "[{}]",
            entries
                .iter()
                .map(|e| format!("{}{}", if e.is_optional { "?:" } else { "" }, e.ty.id))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Self::single(ResolvedAtom::Tuple(TupleAtom { entries, id }))
    }

    pub fn record(entries: Vec<RecordEntry>) -> Self {
        let mut entries = entries;
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        let id = format!(
            "{{{}}}",
            entries
                .iter()
                .map(|e| format!("{}{}:{}", e.name, if e.is_optional { "?" } else { "" }, e.ty.id))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Self::single(ResolvedAtom::Record(RecordAtom { entries, id }))
    }

    pub fn ephemeral_list(types: Vec<ResolvedType>) -> Self {
        let id = format!(
            "(|{}|)",
            types.iter().map(|t| t.id.as_str()).collect::<Vec<_>>().join(", ")
        );
        Self::single(ResolvedAtom::EphemeralList(EphemeralListAtom { types, id }))
    }

    pub fn options(&self) -> &[ResolvedAtom] {
        &self.options
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The only atom of a non-union type
    pub fn as_single(&self) -> Option<&ResolvedAtom> {
        match self.options.as_slice() {
            [atom] => Some(atom),
            _ => None,
        }
    }

    pub fn is_union(&self) -> bool {
        self.options.len() > 1
    }
}

impl std::fmt::Display for ResolvedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionParam {
    pub name: String,
    pub ty: ResolvedType,
    pub is_optional: bool,
}

/// Signature of a first-class function value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFunctionType {
    pub params: Vec<FunctionParam>,
    pub result: ResolvedType,
}

impl ResolvedFunctionType {
    pub fn id(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|p| format!("{}{}: {}", p.name, if p.is_optional { "?" } else { "" }, p.ty))
            .collect::<Vec<_>>()
            .join(", ");
        format!("fn({}) -> {}", params, self.result)
    }
}

/// A closure value passed into a callable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PCode {
    pub code: InvokeDeclId,
    pub src_file: String,
    pub sinfo: SourceInfo,
    /// Key of the invocation the closure was created in
    pub scope: String,
    pub captured: BindMap,
    pub ftype: ResolvedFunctionType,
}

impl PCode {
    pub fn new(
        code: &InvokeDecl,
        scope: impl Into<String>,
        captured: BindMap,
        ftype: ResolvedFunctionType,
    ) -> Self {
        Self {
            code: code.id,
            src_file: code.src_file.clone(),
            sinfo: code.sinfo,
            scope: scope.into(),
            captured,
            ftype,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Program;

    fn core() -> (Program, TypeDeclId, TypeDeclId, TypeDeclId) {
        let mut program = Program::new();
        let int = program.add_type(TypeDecl::entity("NSCore", "Int"));
        let string = program.add_type(TypeDecl::entity("NSCore", "String"));
        let list = program.add_type(TypeDecl::entity("NSCore", "List").with_terms(["T"]));
        (program, int, string, list)
    }

    #[test]
    fn test_entity_id_includes_binds() {
        let (program, int, _, list) = core();
        let int_t = ResolvedType::entity(program.type_decl(int), BindMap::new());
        let binds = BindMap::from([("T".to_string(), int_t)]);
        let list_t = ResolvedType::entity(program.type_decl(list), binds);
        assert_eq!(list_t.id(), "NSCore::List<T=NSCore::Int>");
    }

    #[test]
    fn test_union_sorted_and_deduplicated() {
        let (program, int, string, _) = core();
        let int_t = ResolvedType::entity(program.type_decl(int), BindMap::new());
        let str_t = ResolvedType::entity(program.type_decl(string), BindMap::new());
        let u = ResolvedType::join([str_t.clone(), int_t.clone(), str_t]);
        assert_eq!(u.id(), "NSCore::Int | NSCore::String");
        assert!(u.is_union());
        assert!(u.as_single().is_none());
    }

    #[test]
    fn test_tuple_and_record_ids() {
        let (program, int, string, _) = core();
        let int_t = ResolvedType::entity(program.type_decl(int), BindMap::new());
        let str_t = ResolvedType::entity(program.type_decl(string), BindMap::new());
        let tup = ResolvedType::tuple(vec![
            TupleEntry { ty: int_t.clone(), is_optional: false },
            TupleEntry { ty: str_t.clone(), is_optional: true },
        ]);
        assert_eq!(tup.id(), "[NSCore::Int, ?:NSCore::String]");

        let rec = ResolvedType::record(vec![
            RecordEntry { name: "y".into(), ty: str_t, is_optional: true },
            RecordEntry { name: "x".into(), ty: int_t.clone(), is_optional: false },
        ]);
        assert_eq!(rec.id(), "{x:NSCore::Int, y?:NSCore::String}");

        let el = ResolvedType::ephemeral_list(vec![int_t.clone(), int_t]);
        assert_eq!(el.id(), "(|NSCore::Int, NSCore::Int|)");
    }

    #[test]
    fn test_concept_intersection_sorted() {
        let mut program = Program::new();
        let b = program.add_type(TypeDecl::concept("NSMain", "B"));
        let a = program.add_type(TypeDecl::concept("NSMain", "A"));
        let t = ResolvedType::concept(vec![
            ConceptEntry::new(program.type_decl(b), BindMap::new()),
            ConceptEntry::new(program.type_decl(a), BindMap::new()),
        ]);
        assert_eq!(t.id(), "NSMain::A & NSMain::B");
    }

    #[test]
    fn test_function_type_id() {
        let (program, int, _, _) = core();
        let int_t = ResolvedType::entity(program.type_decl(int), BindMap::new());
        let ft = ResolvedFunctionType {
            params: vec![FunctionParam { name: "x".into(), ty: int_t.clone(), is_optional: false }],
            result: int_t,
        };
        assert_eq!(ft.id(), "fn(x: NSCore::Int) -> NSCore::Int");
    }
}

//! Declaration model consumed from the front end
//!
//! The parser and checker own the full program tree; the MIR engine only
//! needs the identity of each declaration (namespace, name, source position,
//! attributes) plus the provides edges between nominal types. Declarations
//! live in a [`Program`] arena and are addressed by copyable ids.

mod span;
mod types;

pub use span::*;
pub use types::*;

use serde::{Deserialize, Serialize};

/// Index of a type declaration in its [`Program`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeDeclId(pub u32);

/// Index of a function, method, static or lambda declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InvokeDeclId(pub u32);

/// Index of a global or static-member constant declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConstDeclId(pub u32);

/// Entity (concrete) or concept (abstract, multiply inheritable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeDeclKind {
    Entity,
    Concept,
}

/// A nominal type declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDecl {
    pub id: TypeDeclId,
    pub ns: String,
    pub name: String,
    pub kind: TypeDeclKind,
    /// Generic parameter names
    pub terms: Vec<String>,
    /// Concepts this type provides (direct supertypes)
    pub provides: Vec<TypeDeclId>,
    pub attributes: Vec<String>,
    pub src_file: String,
    pub sinfo: SourceInfo,
}

impl TypeDecl {
    fn new(kind: TypeDeclKind, ns: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: TypeDeclId(u32::MAX),
            ns: ns.into(),
            name: name.into(),
            kind,
            terms: Vec::new(),
            provides: Vec::new(),
            attributes: Vec::new(),
            src_file: String::new(),
            sinfo: SourceInfo::default(),
        }
    }

    pub fn entity(ns: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(TypeDeclKind::Entity, ns, name)
    }

    pub fn concept(ns: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(TypeDeclKind::Concept, ns, name)
    }

    pub fn with_terms<S: Into<String>>(mut self, terms: impl IntoIterator<Item = S>) -> Self {
        self.terms = terms.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_provides(mut self, provides: impl IntoIterator<Item = TypeDeclId>) -> Self {
        self.provides = provides.into_iter().collect();
        self
    }

    pub fn at(mut self, file: impl Into<String>, sinfo: SourceInfo) -> Self {
        self.src_file = file.into();
        self.sinfo = sinfo;
        self
    }

    pub fn is_entity(&self) -> bool {
        self.kind == TypeDeclKind::Entity
    }

    pub fn is_concept(&self) -> bool {
        self.kind == TypeDeclKind::Concept
    }

    /// `ns::name` without bindings
    pub fn full_name(&self) -> String {
        format!("{}::{}", self.ns, self.name)
    }
}

/// Where a callable lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvokeKind {
    NamespaceFunction,
    StaticFunction { containing: TypeDeclId },
    MemberMethod { containing: TypeDeclId },
    /// Anonymous closure body
    Lambda,
}

/// A function, static, method or lambda declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeDecl {
    pub id: InvokeDeclId,
    pub ns: String,
    pub name: String,
    pub kind: InvokeKind,
    pub terms: Vec<String>,
    pub params: Vec<String>,
    pub attributes: Vec<String>,
    pub src_file: String,
    pub sinfo: SourceInfo,
}

impl InvokeDecl {
    pub fn new(kind: InvokeKind, ns: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: InvokeDeclId(u32::MAX),
            ns: ns.into(),
            name: name.into(),
            kind,
            terms: Vec::new(),
            params: Vec::new(),
            attributes: Vec::new(),
            src_file: String::new(),
            sinfo: SourceInfo::default(),
        }
    }

    pub fn function(ns: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(InvokeKind::NamespaceFunction, ns, name)
    }

    pub fn method(containing: &TypeDecl, name: impl Into<String>) -> Self {
        Self::new(
            InvokeKind::MemberMethod {
                containing: containing.id,
            },
            containing.ns.clone(),
            name,
        )
    }

    pub fn static_function(containing: &TypeDecl, name: impl Into<String>) -> Self {
        Self::new(
            InvokeKind::StaticFunction {
                containing: containing.id,
            },
            containing.ns.clone(),
            name,
        )
    }

    /// Lambdas are named after their source position
    pub fn lambda(ns: impl Into<String>, file: impl Into<String>, sinfo: SourceInfo) -> Self {
        Self::new(InvokeKind::Lambda, ns, "lambda").at(file, sinfo)
    }

    pub fn with_terms<S: Into<String>>(mut self, terms: impl IntoIterator<Item = S>) -> Self {
        self.terms = terms.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_params<S: Into<String>>(mut self, params: impl IntoIterator<Item = S>) -> Self {
        self.params = params.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_attribute(mut self, attr: impl Into<String>) -> Self {
        self.attributes.push(attr.into());
        self
    }

    pub fn at(mut self, file: impl Into<String>, sinfo: SourceInfo) -> Self {
        self.src_file = file.into();
        self.sinfo = sinfo;
        self
    }

    pub fn has_attribute(&self, attr: &str) -> bool {
        self.attributes.iter().any(|a| a == attr)
    }

    /// Declaring type for statics and methods
    pub fn containing_type(&self) -> Option<TypeDeclId> {
        match self.kind {
            InvokeKind::StaticFunction { containing } | InvokeKind::MemberMethod { containing } => {
                Some(containing)
            }
            InvokeKind::NamespaceFunction | InvokeKind::Lambda => None,
        }
    }
}

/// A namespace global or a static-member constant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstDecl {
    pub id: ConstDeclId,
    pub ns: String,
    pub name: String,
    pub containing: Option<TypeDeclId>,
    pub src_file: String,
    pub sinfo: SourceInfo,
}

impl ConstDecl {
    pub fn global(ns: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ConstDeclId(u32::MAX),
            ns: ns.into(),
            name: name.into(),
            containing: None,
            src_file: String::new(),
            sinfo: SourceInfo::default(),
        }
    }

    pub fn member(containing: &TypeDecl, name: impl Into<String>) -> Self {
        Self {
            containing: Some(containing.id),
            ..Self::global(containing.ns.clone(), name)
        }
    }
}

/// Arena of every declaration in the program
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    types: Vec<TypeDecl>,
    invokes: Vec<InvokeDecl>,
    consts: Vec<ConstDecl>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_type(&mut self, mut decl: TypeDecl) -> TypeDeclId {
        let id = TypeDeclId(self.types.len() as u32);
        decl.id = id;
        self.types.push(decl);
        id
    }

    pub fn add_invoke(&mut self, mut decl: InvokeDecl) -> InvokeDeclId {
        let id = InvokeDeclId(self.invokes.len() as u32);
        decl.id = id;
        self.invokes.push(decl);
        id
    }

    pub fn add_const(&mut self, mut decl: ConstDecl) -> ConstDeclId {
        let id = ConstDeclId(self.consts.len() as u32);
        decl.id = id;
        self.consts.push(decl);
        id
    }

    /// Ids are only minted by this arena, so lookups are infallible
    pub fn type_decl(&self, id: TypeDeclId) -> &TypeDecl {
        &self.types[id.0 as usize]
    }

    pub fn invoke_decl(&self, id: InvokeDeclId) -> &InvokeDecl {
        &self.invokes[id.0 as usize]
    }

    pub fn const_decl(&self, id: ConstDeclId) -> &ConstDecl {
        &self.consts[id.0 as usize]
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDecl> {
        self.types.iter()
    }

    pub fn invokes(&self) -> impl Iterator<Item = &InvokeDecl> {
        self.invokes.iter()
    }

    pub fn lookup_type(&self, ns: &str, name: &str) -> Option<TypeDeclId> {
        self.types
            .iter()
            .find(|t| t.ns == ns && t.name == name)
            .map(|t| t.id)
    }

    /// Member methods declared directly on `containing` with the given name
    pub fn member_methods<'a>(
        &'a self,
        containing: TypeDeclId,
        name: &'a str,
    ) -> impl Iterator<Item = &'a InvokeDecl> + 'a {
        self.invokes.iter().filter(move |d| {
            d.name == name && d.kind == InvokeKind::MemberMethod { containing }
        })
    }

    /// Namespace functions carrying the entrypoint attribute
    pub fn entrypoints<'a>(&'a self, attribute: &'a str) -> impl Iterator<Item = &'a InvokeDecl> + 'a {
        self.invokes
            .iter()
            .filter(move |d| d.kind == InvokeKind::NamespaceFunction && d.has_attribute(attribute))
    }

    /// True when `sub` reaches `sup` through provides edges (reflexive)
    pub fn provides_transitively(&self, sub: TypeDeclId, sup: TypeDeclId) -> bool {
        let mut stack = vec![sub];
        let mut seen = std::collections::HashSet::new();
        while let Some(cur) = stack.pop() {
            if cur == sup {
                return true;
            }
            if seen.insert(cur) {
                stack.extend(self.type_decl(cur).provides.iter().copied());
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shapes() -> (Program, TypeDeclId, TypeDeclId, TypeDeclId) {
        let mut program = Program::new();
        let any = program.add_type(TypeDecl::concept("NSCore", "Any"));
        let shape = program.add_type(TypeDecl::concept("NSMain", "Shape").with_provides([any]));
        let circle = program.add_type(TypeDecl::entity("NSMain", "Circle").with_provides([shape]));
        (program, any, shape, circle)
    }

    #[test]
    fn test_ids_are_assigned_in_order() {
        let (program, any, shape, circle) = shapes();
        assert_eq!(any, TypeDeclId(0));
        assert_eq!(program.type_decl(shape).name, "Shape");
        assert_eq!(program.type_decl(circle).id, circle);
    }

    #[test]
    fn test_lookup_type() {
        let (program, _, shape, _) = shapes();
        assert_eq!(program.lookup_type("NSMain", "Shape"), Some(shape));
        assert_eq!(program.lookup_type("NSMain", "Triangle"), None);
    }

    #[test]
    fn test_provides_transitively() {
        let (program, any, shape, circle) = shapes();
        assert!(program.provides_transitively(circle, any));
        assert!(program.provides_transitively(circle, circle));
        assert!(!program.provides_transitively(shape, circle));
    }

    #[test]
    fn test_entrypoints_filter_by_attribute() {
        let mut program = Program::new();
        program.add_invoke(InvokeDecl::function("NSMain", "main").with_attribute("entrypoint"));
        program.add_invoke(InvokeDecl::function("NSMain", "helper"));
        let names: Vec<_> = program.entrypoints("entrypoint").map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["main"]);
    }

    #[test]
    fn test_member_methods() {
        let (mut program, _, _, circle) = shapes();
        let decl = program.type_decl(circle).clone();
        let area = program.add_invoke(InvokeDecl::method(&decl, "area"));
        program.add_invoke(InvokeDecl::static_function(&decl, "area"));
        let found: Vec<_> = program.member_methods(circle, "area").map(|d| d.id).collect();
        assert_eq!(found, vec![area]);
        assert_eq!(program.invoke_decl(area).containing_type(), Some(circle));
    }
}

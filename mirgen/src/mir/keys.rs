//! Canonical keys for every instantiation
//!
//! Keys are the sole identity of a specialization: two requests producing
//! the same key are the same work item. Bindings are always rendered in
//! parameter-name order so map insertion order never leaks into a key.

use crate::ast::{BindMap, ConstDecl, InvokeDecl, PCode, TypeDecl};

/// Key of a fully bound nominal type (`ns::Name<T=...>`)
pub type NominalTypeKey = String;
/// Key of any interned type shape (nominal, structural or union)
pub type ResolvedTypeKey = String;
/// Key of a function, method, static or lambda instantiation
pub type InvokeKey = String;
/// Key of a global or static-member constant
pub type ConstantKey = String;
/// Key of a field on a bound nominal type
pub type FieldKey = String;
/// Receiver-independent key of a virtual method slot
pub type VirtualMethodKey = String;

/// `<A=..., B=...>` sorted by parameter name, empty for no bindings
pub fn binds_key_info(binds: &BindMap) -> String {
    if binds.is_empty() {
        return String::new();
    }

    let mut terms: Vec<(&String, &str)> = binds.iter().map(|(k, v)| (k, v.id())).collect();
    terms.sort_by(|a, b| a.0.cmp(b.0));
    let rendered: Vec<String> = terms.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("<{}>", rendered.join(", "))
}

/// `[file%line%column,...]` in argument order, empty for no closures
pub fn pcode_key_info(pcodes: &[PCode]) -> String {
    if pcodes.is_empty() {
        return String::new();
    }

    let rendered: Vec<String> = pcodes
        .iter()
        .map(|pc| format!("{}%{}%{}", pc.src_file, pc.sinfo.line, pc.sinfo.column))
        .collect();
    format!("[{}]", rendered.join(","))
}

pub fn type_key(decl: &TypeDecl, binds: &BindMap) -> NominalTypeKey {
    format!("{}::{}{}", decl.ns, decl.name, binds_key_info(binds))
}

pub fn global_key(decl: &ConstDecl) -> ConstantKey {
    format!("{}::{}", decl.ns, decl.name)
}

pub fn const_key(containing: &TypeDecl, binds: &BindMap, name: &str) -> ConstantKey {
    format!("{}::{}", type_key(containing, binds), name)
}

pub fn field_key(containing: &TypeDecl, binds: &BindMap, name: &str) -> FieldKey {
    format!("{}.{}", type_key(containing, binds), name)
}

pub fn function_key(ns: &str, name: &str, binds: &BindMap, pcodes: &[PCode]) -> InvokeKey {
    format!(
        "{}::{}{}{}",
        ns,
        name,
        binds_key_info(binds),
        pcode_key_info(pcodes)
    )
}

/// `binds` is the full binding map (containing type terms and the
/// static's own terms together)
pub fn static_key(containing: &TypeDecl, name: &str, binds: &BindMap, pcodes: &[PCode]) -> InvokeKey {
    member_key(containing, name, binds, pcodes)
}

/// `binds` is the full binding map, as for [`static_key`]
pub fn method_key(containing: &TypeDecl, name: &str, binds: &BindMap, pcodes: &[PCode]) -> InvokeKey {
    member_key(containing, name, binds, pcodes)
}

fn member_key(containing: &TypeDecl, name: &str, binds: &BindMap, pcodes: &[PCode]) -> InvokeKey {
    format!(
        "{}::{}::{}{}{}",
        containing.ns,
        containing.name,
        name,
        binds_key_info(binds),
        pcode_key_info(pcodes)
    )
}

pub fn virtual_method_key(name: &str, binds: &BindMap) -> VirtualMethodKey {
    format!("{}{}", name, binds_key_info(binds))
}

/// Closures are anonymous; identify them by declaration position
pub fn closure_key(decl: &InvokeDecl) -> InvokeKey {
    format!("fn--{}+{}##{}", decl.src_file, decl.sinfo.line, decl.sinfo.pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Program, ResolvedFunctionType, ResolvedType, SourceInfo};

    struct Fixture {
        program: Program,
        int: ResolvedType,
        string: ResolvedType,
    }

    fn fixture() -> Fixture {
        let mut program = Program::new();
        let int = program.add_type(TypeDecl::entity("NSCore", "Int"));
        let string = program.add_type(TypeDecl::entity("NSCore", "String"));
        let int = ResolvedType::entity(program.type_decl(int), BindMap::new());
        let string = ResolvedType::entity(program.type_decl(string), BindMap::new());
        Fixture {
            program,
            int,
            string,
        }
    }

    #[test]
    fn test_empty_binds_render_empty() {
        assert_eq!(binds_key_info(&BindMap::new()), "");
        assert_eq!(pcode_key_info(&[]), "");
    }

    #[test]
    fn test_binds_sorted_regardless_of_insertion_order() {
        let f = fixture();
        let mut first = BindMap::new();
        first.insert("V".to_string(), f.string.clone());
        first.insert("K".to_string(), f.int.clone());

        let mut second = BindMap::new();
        second.insert("K".to_string(), f.int.clone());
        second.insert("V".to_string(), f.string.clone());

        assert_eq!(binds_key_info(&first), "<K=NSCore::Int, V=NSCore::String>");
        assert_eq!(binds_key_info(&first), binds_key_info(&second));
        assert_eq!(
            function_key("NSMain", "lookup", &first, &[]),
            function_key("NSMain", "lookup", &second, &[])
        );
    }

    #[test]
    fn test_binds_sort_by_name_not_rendered_pair() {
        let f = fixture();
        let binds = BindMap::from([
            ("T".to_string(), f.int.clone()),
            ("T2".to_string(), f.string.clone()),
        ]);
        assert_eq!(binds_key_info(&binds), "<T=NSCore::Int, T2=NSCore::String>");
    }

    #[test]
    fn test_nominal_keys() {
        let mut f = fixture();
        let map = f.program.add_type(
            TypeDecl::entity("NSCore", "Map").with_terms(["K", "V"]),
        );
        let decl = f.program.type_decl(map);
        let binds = BindMap::from([
            ("K".to_string(), f.int.clone()),
            ("V".to_string(), f.string.clone()),
        ]);

        assert_eq!(type_key(decl, &binds), "NSCore::Map<K=NSCore::Int, V=NSCore::String>");
        assert_eq!(
            const_key(decl, &binds, "empty"),
            "NSCore::Map<K=NSCore::Int, V=NSCore::String>::empty"
        );
        assert_eq!(
            field_key(decl, &binds, "size"),
            "NSCore::Map<K=NSCore::Int, V=NSCore::String>.size"
        );
        assert_eq!(
            method_key(decl, "get", &binds, &[]),
            "NSCore::Map::get<K=NSCore::Int, V=NSCore::String>"
        );
        assert_eq!(static_key(decl, "create", &BindMap::new(), &[]), "NSCore::Map::create");
    }

    #[test]
    fn test_global_and_virtual_keys() {
        let f = fixture();
        let g = ConstDecl::global("NSMain", "limit");
        assert_eq!(global_key(&g), "NSMain::limit");
        assert_eq!(virtual_method_key("area", &BindMap::new()), "area");
        let binds = BindMap::from([("U".to_string(), f.int.clone())]);
        assert_eq!(virtual_method_key("map", &binds), "map<U=NSCore::Int>");
    }

    #[test]
    fn test_pcode_list_is_order_preserving() {
        let f = fixture();
        let l1 = InvokeDecl::lambda("NSMain", "main.bsq", SourceInfo::new(4, 9, 40, 10));
        let l2 = InvokeDecl::lambda("NSMain", "main.bsq", SourceInfo::new(7, 2, 80, 10));
        let ftype = ResolvedFunctionType {
            params: Vec::new(),
            result: f.int.clone(),
        };
        let p1 = PCode::new(&l1, "NSMain::main", BindMap::new(), ftype.clone());
        let p2 = PCode::new(&l2, "NSMain::main", BindMap::new(), ftype);

        assert_eq!(pcode_key_info(&[p1.clone(), p2.clone()]), "[main.bsq%4%9,main.bsq%7%2]");
        assert_ne!(
            function_key("NSMain", "apply", &BindMap::new(), &[p1.clone(), p2.clone()]),
            function_key("NSMain", "apply", &BindMap::new(), &[p2, p1])
        );
    }

    #[test]
    fn test_closure_key_uses_position() {
        let l = InvokeDecl::lambda("NSMain", "main.bsq", SourceInfo::new(4, 9, 40, 10));
        assert_eq!(closure_key(&l), "fn--main.bsq+4##40");
    }
}

//! Variable type inference
//!
//! Fills `MirBody::vtypes` once the assembly is closed: every SSA name is
//! mapped to the type key of the value it holds, taken from parameter
//! types, the result type recorded on each op, and literal kinds.

use std::collections::{BTreeMap, HashMap};

use super::keys::ResolvedTypeKey;
use super::{Argument, Constant, MirAssembly, MirBody, MirFunctionParameter, MirOp, MirType, Register};

struct TypeEnv<'a> {
    masm: &'a MirAssembly,
    core_ns: &'a str,
    vtypes: BTreeMap<String, ResolvedTypeKey>,
    /// Declared type of each local, by unversioned name
    declared: HashMap<String, ResolvedTypeKey>,
}

impl TypeEnv<'_> {
    fn core(&self, name: &str) -> ResolvedTypeKey {
        format!("{}::{}", self.core_ns, name)
    }

    fn constant_type(&self, c: &Constant) -> ResolvedTypeKey {
        match c {
            Constant::None => self.core("None"),
            Constant::True | Constant::False => self.core("Bool"),
            Constant::Int(_) => self.core("Int"),
            Constant::BigInt(_) => self.core("BigInt"),
            Constant::Float(_) => self.core("Float64"),
            Constant::String(_) => self.core("String"),
            Constant::Regex(_) => self.core("Regex"),
        }
    }

    fn argument_type(&self, arg: &Argument) -> Option<ResolvedTypeKey> {
        match arg {
            Argument::Constant(c) => Some(self.constant_type(c)),
            Argument::Register(r) => self.vtypes.get(r.name_id()).cloned(),
        }
    }

    /// Union of the given types; None when a member is not interned
    fn join(&self, types: impl IntoIterator<Item = ResolvedTypeKey>) -> Option<ResolvedTypeKey> {
        let mut types: Vec<ResolvedTypeKey> = types.into_iter().collect();
        types.sort();
        types.dedup();
        match types.as_slice() {
            [] => None,
            [only] => Some(only.clone()),
            _ => {
                let options = types
                    .iter()
                    .map(|t| self.masm.type_map.get(t).map(|m| m.options.clone()))
                    .collect::<Option<Vec<_>>>()?;
                Some(MirType::create(options.into_iter().flatten()).trkey)
            }
        }
    }

    fn result_of(&self, op: &MirOp, result_type: &str) -> Option<ResolvedTypeKey> {
        let bool_type = || Some(self.core("Bool"));
        match op {
            MirOp::LoadConst { src, .. } => Some(self.constant_type(src)),
            MirOp::LoadConstSafeString { tkey, .. } | MirOp::LoadConstTypedString { tkey, .. } => {
                Some(tkey.clone())
            }
            MirOp::AccessConstantValue { ckey, .. } => {
                self.masm.constant_decls.get(ckey).map(|c| c.declared_type.clone())
            }
            MirOp::LoadFieldDefaultValue { fkey, .. } => {
                self.masm.field_decls.get(fkey).map(|f| f.declared_type.clone())
            }
            MirOp::AccessArgVariable { name, .. } | MirOp::AccessLocalVariable { name, .. } => self
                .vtypes
                .get(&name.name_id)
                .or_else(|| self.declared.get(&name.lname))
                .cloned(),
            MirOp::InvokeInvariantCheckDirect { .. }
            | MirOp::InvokeInvariantCheckVirtualTarget { .. }
            | MirOp::BinEq { .. }
            | MirOp::BinLess { .. }
            | MirOp::BinCmp { .. }
            | MirOp::IsTypeOfNone { .. }
            | MirOp::IsTypeOfSome { .. }
            | MirOp::IsTypeOf { .. }
            | MirOp::TruthyConvert { .. } => bool_type(),
            MirOp::ConstructorPrimary { tkey, .. }
            | MirOp::ConstructorPrimaryCollectionEmpty { tkey, .. }
            | MirOp::ConstructorPrimaryCollectionSingletons { tkey, .. }
            | MirOp::ConstructorPrimaryCollectionCopies { tkey, .. }
            | MirOp::ConstructorPrimaryCollectionMixed { tkey, .. } => Some(tkey.clone()),
            MirOp::ConstructorTuple { result_type, .. }
            | MirOp::ConstructorRecord { result_type, .. }
            | MirOp::ConstructorEphemeralValueList { result_type, .. }
            | MirOp::AccessFromIndex { result_type, .. }
            | MirOp::ProjectFromIndices { result_type, .. }
            | MirOp::AccessFromProperty { result_type, .. }
            | MirOp::ProjectFromProperties { result_type, .. }
            | MirOp::AccessFromField { result_type, .. }
            | MirOp::ProjectFromFields { result_type, .. }
            | MirOp::ProjectFromTypeTuple { result_type, .. }
            | MirOp::ProjectFromTypeRecord { result_type, .. }
            | MirOp::ProjectFromTypeNominal { result_type, .. }
            | MirOp::ModifyWithIndices { result_type, .. }
            | MirOp::ModifyWithProperties { result_type, .. }
            | MirOp::ModifyWithFields { result_type, .. }
            | MirOp::StructuredExtendTuple { result_type, .. }
            | MirOp::StructuredExtendRecord { result_type, .. }
            | MirOp::StructuredExtendObject { result_type, .. }
            | MirOp::LoadFromEphemeralList { result_type, .. }
            | MirOp::InvokeFixedFunction { result_type, .. }
            | MirOp::InvokeVirtualFunction { result_type, .. } => Some(result_type.clone()),
            MirOp::PrefixOp { op, infer_type, .. } => {
                if op == "!" { bool_type() } else { Some(infer_type.clone()) }
            }
            MirOp::BinOp { lhs_infer_type, .. } => Some(lhs_infer_type.clone()),
            MirOp::RegAssign { src, .. } => self.argument_type(src),
            MirOp::VarStore { src, name, .. } => self
                .declared
                .get(&name.lname)
                .cloned()
                .or_else(|| self.argument_type(src)),
            MirOp::PackSlice { sltype, .. } | MirOp::PackExtend { sltype, .. } => Some(sltype.clone()),
            MirOp::ReturnAssign { .. } => Some(result_type.to_string()),
            MirOp::Phi { src, trgt, .. } => {
                if let Register::Var(v) = trgt
                    && let Some(declared) = self.declared.get(&v.lname)
                {
                    return Some(declared.clone());
                }
                self.join(src.values().filter_map(|r| self.vtypes.get(r.name_id()).cloned()))
            }
            MirOp::Abort { .. }
            | MirOp::Debug { .. }
            | MirOp::Jump { .. }
            | MirOp::JumpCond { .. }
            | MirOp::JumpNone { .. }
            | MirOp::VarLifetimeStart { .. }
            | MirOp::VarLifetimeEnd { .. } => None,
        }
    }
}

/// Map every name defined in `body` to its type key
///
/// A phi takes the declared type of its variable, else the union of its
/// typed inputs. Names whose type cannot be determined (reads of an unknown
/// constant, phis over untyped inputs) are left out.
pub fn infer_var_types(
    body: &MirBody,
    params: &[MirFunctionParameter],
    result_type: &str,
    masm: &MirAssembly,
    core_ns: &str,
) -> BTreeMap<String, ResolvedTypeKey> {
    let mut env = TypeEnv {
        masm,
        core_ns,
        vtypes: params.iter().map(|p| (p.name.clone(), p.ty.clone())).collect(),
        declared: HashMap::new(),
    };

    for block in body.ordered_blocks() {
        for op in &block.ops {
            if let MirOp::VarLifetimeStart { name, rtype, .. } = op {
                env.declared.insert(name.clone(), rtype.clone());
                continue;
            }

            let Some(ty) = env.result_of(op, result_type) else {
                continue;
            };
            for def in op.mod_vars() {
                env.vtypes.insert(def.name_id().to_string(), ty.clone());
            }
        }
    }

    env.vtypes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SourceInfo;
    use crate::mir::{BasicBlock, MirTypeOption, TempRegister, Variable, ENTRY_BLOCK};

    fn s() -> SourceInfo {
        SourceInfo::default()
    }

    fn body_of(ops: Vec<MirOp>) -> MirBody {
        let mut entry = BasicBlock::new(ENTRY_BLOCK);
        entry.ops = ops;
        MirBody {
            file: "test.bsq".into(),
            sinfo: s(),
            blocks: BTreeMap::from([(ENTRY_BLOCK.to_string(), entry)]),
            vtypes: None,
        }
    }

    #[test]
    fn test_types_from_literals_params_and_results() {
        let body = body_of(vec![
            MirOp::LoadConst { sinfo: s(), src: Constant::Int("1".into()), trgt: TempRegister::new(0) },
            MirOp::AccessArgVariable { sinfo: s(), name: Variable::new("p"), trgt: TempRegister::new(1) },
            MirOp::BinLess {
                sinfo: s(),
                lhs_infer_type: "NSCore::Int".into(),
                lhs: TempRegister::new(0).into(),
                rhs_infer_type: "NSCore::Int".into(),
                rhs: TempRegister::new(1).into(),
                relaxed: false,
                trgt: TempRegister::new(2),
            },
            MirOp::VarLifetimeStart { sinfo: s(), name: "y".into(), rtype: "NSCore::Int | NSCore::None".into() },
            MirOp::VarStore { sinfo: s(), src: TempRegister::new(0).into(), name: Variable::new("y") },
            MirOp::ReturnAssign { sinfo: s(), src: TempRegister::new(2).into(), name: Variable::return_var() },
        ]);
        let params = vec![MirFunctionParameter::new("p", "NSCore::Int")];

        let vtypes = infer_var_types(&body, &params, "NSCore::Bool", &MirAssembly::new(), "NSCore");

        assert_eq!(vtypes["#tmp_0"], "NSCore::Int");
        assert_eq!(vtypes["#tmp_1"], "NSCore::Int");
        assert_eq!(vtypes["#tmp_2"], "NSCore::Bool");
        assert_eq!(vtypes["y"], "NSCore::Int | NSCore::None");
        assert_eq!(vtypes["$__ir_ret__"], "NSCore::Bool");
    }

    fn interned(masm: &mut MirAssembly, tkey: &str) {
        masm.type_map
            .insert(tkey.to_string(), MirType::single(MirTypeOption::entity(tkey)));
    }

    #[test]
    fn test_phi_joins_its_inputs() {
        let mut masm = MirAssembly::new();
        interned(&mut masm, "NSCore::Int");
        interned(&mut masm, "NSCore::String");

        let x = |n: &str| Register::Var(Variable { lname: "x".into(), name_id: n.into() });
        let mut entry = BasicBlock::new(ENTRY_BLOCK);
        entry.ops = vec![
            MirOp::LoadConst { sinfo: s(), src: Constant::Int("1".into()), trgt: TempRegister::new(0) },
            MirOp::VarStore { sinfo: s(), src: TempRegister::new(0).into(), name: Variable::new("x") },
            MirOp::LoadConst { sinfo: s(), src: Constant::String("a".into()), trgt: TempRegister::new(1) },
            MirOp::VarStore {
                sinfo: s(),
                src: TempRegister::new(1).into(),
                name: Variable { lname: "x".into(), name_id: "x$1".into() },
            },
            MirOp::Phi {
                sinfo: s(),
                src: BTreeMap::from([("a_1".to_string(), x("x")), ("b_2".to_string(), x("x$1"))]),
                trgt: x("x$2"),
            },
        ];
        let body = MirBody {
            file: "test.bsq".into(),
            sinfo: s(),
            blocks: BTreeMap::from([(ENTRY_BLOCK.to_string(), entry)]),
            vtypes: None,
        };

        let vtypes = infer_var_types(&body, &[], "NSCore::None", &masm, "NSCore");
        assert_eq!(vtypes["x"], "NSCore::Int");
        assert_eq!(vtypes["x$1"], "NSCore::String");
        assert_eq!(vtypes["x$2"], "NSCore::Int | NSCore::String");
    }

    #[test]
    fn test_unknown_constant_is_left_out() {
        let body = body_of(vec![MirOp::AccessConstantValue {
            sinfo: s(),
            ckey: "NSMain::missing".into(),
            trgt: TempRegister::new(0),
        }]);
        let vtypes = infer_var_types(&body, &[], "NSCore::None", &MirAssembly::new(), "NSCore");
        assert!(!vtypes.contains_key("#tmp_0"));
    }
}

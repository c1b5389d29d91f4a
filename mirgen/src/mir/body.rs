//! Body emitter
//!
//! Append-only builder for one function body. The checker drives it while
//! lowering a declaration: allocate temporaries, create and switch blocks,
//! append one op per `emit_*` call, then finalize with [`BodyEmitter::get_body`].

use std::collections::BTreeMap;

use super::cleanup::LoweringPipeline;
use super::keys::{ConstantKey, FieldKey, InvokeKey, NominalTypeKey, ResolvedTypeKey, VirtualMethodKey};
use super::{
    Argument, BasicBlock, Constant, MirBody, MirOp, MirType, Register, TempRegister, Variable,
    ENTRY_BLOCK, EXIT_BLOCK, RETURN_ASSIGN_BLOCK,
};
use crate::ast::SourceInfo;

/// Return shape of a call whose callee also writes back by-ref parameters
///
/// The callee returns an ephemeral list: the declared result (or a pack
/// of results starting at `pack_base`) followed by one entry per ref param.
#[derive(Debug, Clone)]
pub struct RefReturn {
    pub declared: MirType,
    pub elist: MirType,
    pub pack_base: Option<usize>,
    pub ref_params: Vec<(String, MirType)>,
}

impl RefReturn {
    /// A call with no by-ref parameters
    pub fn plain(declared: MirType) -> Self {
        Self {
            elist: declared.clone(),
            declared,
            pack_base: None,
            ref_params: Vec::new(),
        }
    }
}

/// Builder for a single function body
#[derive(Debug)]
pub struct BodyEmitter {
    blocks: BTreeMap<String, BasicBlock>,
    /// Active block, detached from `blocks` while it is appended to
    current: BasicBlock,
    tmp_id_ctr: u32,
    none_key: NominalTypeKey,
    some_key: NominalTypeKey,
}

impl Default for BodyEmitter {
    fn default() -> Self {
        Self::new("NSCore")
    }
}

#[allow(clippy::too_many_arguments)]
impl BodyEmitter {
    pub fn new(core_namespace: &str) -> Self {
        let mut emitter = Self {
            blocks: BTreeMap::new(),
            current: BasicBlock::new(ENTRY_BLOCK),
            tmp_id_ctr: 0,
            none_key: format!("{}::None", core_namespace),
            some_key: format!("{}::Some", core_namespace),
        };
        emitter.initialize();
        emitter
    }

    /// Reset for a new body: fresh temp counter and the three fixed blocks
    pub fn initialize(&mut self) {
        self.tmp_id_ctr = 0;
        self.blocks = BTreeMap::new();
        self.blocks
            .insert(RETURN_ASSIGN_BLOCK.to_string(), BasicBlock::new(RETURN_ASSIGN_BLOCK));
        self.blocks.insert(EXIT_BLOCK.to_string(), BasicBlock::new(EXIT_BLOCK));
        self.current = BasicBlock::new(ENTRY_BLOCK);
    }

    pub fn generate_tmp_register(&mut self) -> TempRegister {
        let reg = TempRegister::new(self.tmp_id_ctr);
        self.tmp_id_ctr += 1;
        reg
    }

    pub fn generate_captured_var_name(&self, name: &str) -> String {
        format!("__c_{}", name)
    }

    /// Create an empty block labelled `{prefix}_{block count}`
    pub fn create_new_block(&mut self, prefix: &str) -> String {
        let label = format!("{}_{}", prefix, self.blocks.len() + 1);
        self.blocks.insert(label.clone(), BasicBlock::new(label.clone()));
        label
    }

    /// # Panics
    /// Panics when `label` was never created in this body.
    pub fn set_active_block(&mut self, label: &str) {
        if self.current.label == label {
            return;
        }
        let next = self
            .blocks
            .remove(label)
            .unwrap_or_else(|| panic!("set_active_block: unknown block `{}`", label));
        let prev = std::mem::replace(&mut self.current, next);
        self.blocks.insert(prev.label.clone(), prev);
    }

    pub fn active_block(&self) -> &str {
        &self.current.label
    }

    fn push(&mut self, op: MirOp) {
        self.current.ops.push(op);
    }

    // ========================================================================
    // Constants and variables
    // ========================================================================

    pub fn emit_load_const_none(&mut self, sinfo: SourceInfo, trgt: TempRegister) {
        self.push(MirOp::LoadConst { sinfo, src: Constant::None, trgt });
    }

    pub fn emit_load_const_bool(&mut self, sinfo: SourceInfo, value: bool, trgt: TempRegister) {
        self.push(MirOp::LoadConst { sinfo, src: Constant::bool(value), trgt });
    }

    pub fn emit_load_const_int(&mut self, sinfo: SourceInfo, value: &str, trgt: TempRegister) {
        self.push(MirOp::LoadConst { sinfo, src: Constant::Int(value.to_string()), trgt });
    }

    pub fn emit_load_const_big_int(&mut self, sinfo: SourceInfo, value: &str, trgt: TempRegister) {
        self.push(MirOp::LoadConst { sinfo, src: Constant::BigInt(value.to_string()), trgt });
    }

    pub fn emit_load_const_float(&mut self, sinfo: SourceInfo, value: &str, trgt: TempRegister) {
        self.push(MirOp::LoadConst { sinfo, src: Constant::Float(value.to_string()), trgt });
    }

    pub fn emit_load_const_string(&mut self, sinfo: SourceInfo, value: &str, trgt: TempRegister) {
        self.push(MirOp::LoadConst { sinfo, src: Constant::String(value.to_string()), trgt });
    }

    pub fn emit_load_literal_regex(&mut self, sinfo: SourceInfo, restr: &str, trgt: TempRegister) {
        self.push(MirOp::LoadConst { sinfo, src: Constant::Regex(restr.to_string()), trgt });
    }

    pub fn emit_load_validated_typed_string(
        &mut self,
        sinfo: SourceInfo,
        value: &str,
        tkey: NominalTypeKey,
        tskey: ResolvedTypeKey,
        trgt: TempRegister,
    ) {
        self.push(MirOp::LoadConstSafeString {
            sinfo,
            ivalue: value.to_string(),
            tkey,
            tskey,
            trgt,
        });
    }

    pub fn emit_load_const_typed_string(
        &mut self,
        sinfo: SourceInfo,
        value: &str,
        tkey: NominalTypeKey,
        tskey: ResolvedTypeKey,
        pfunckey: Option<InvokeKey>,
        errtype: Option<ResolvedTypeKey>,
        trgt: TempRegister,
    ) {
        self.push(MirOp::LoadConstTypedString {
            sinfo,
            ivalue: value.to_string(),
            tkey,
            tskey,
            pfunckey,
            errtype,
            trgt,
        });
    }

    pub fn emit_access_constant(&mut self, sinfo: SourceInfo, ckey: ConstantKey, trgt: TempRegister) {
        self.push(MirOp::AccessConstantValue { sinfo, ckey, trgt });
    }

    pub fn emit_load_member_field_default_value(
        &mut self,
        sinfo: SourceInfo,
        fkey: FieldKey,
        trgt: TempRegister,
    ) {
        self.push(MirOp::LoadFieldDefaultValue { sinfo, fkey, trgt });
    }

    pub fn emit_access_arg_variable(&mut self, sinfo: SourceInfo, name: &str, trgt: TempRegister) {
        self.push(MirOp::AccessArgVariable { sinfo, name: Variable::new(name), trgt });
    }

    pub fn emit_access_local_variable(&mut self, sinfo: SourceInfo, name: &str, trgt: TempRegister) {
        self.push(MirOp::AccessLocalVariable { sinfo, name: Variable::new(name), trgt });
    }

    // ========================================================================
    // Invariants and constructors
    // ========================================================================

    pub fn emit_invoke_invariant_check_direct(
        &mut self,
        sinfo: SourceInfo,
        ikey: InvokeKey,
        tkey: NominalTypeKey,
        rcvr: Argument,
        trgt: TempRegister,
    ) {
        self.push(MirOp::InvokeInvariantCheckDirect { sinfo, ikey, tkey, rcvr, trgt });
    }

    pub fn emit_invoke_invariant_check_virtual_target(
        &mut self,
        sinfo: SourceInfo,
        infer_type: ResolvedTypeKey,
        rcvr: Argument,
        trgt: TempRegister,
    ) {
        self.push(MirOp::InvokeInvariantCheckVirtualTarget { sinfo, infer_type, rcvr, trgt });
    }

    pub fn emit_constructor_primary(
        &mut self,
        sinfo: SourceInfo,
        tkey: NominalTypeKey,
        args: Vec<Argument>,
        trgt: TempRegister,
    ) {
        self.push(MirOp::ConstructorPrimary { sinfo, tkey, args, trgt });
    }

    pub fn emit_constructor_primary_collection_empty(
        &mut self,
        sinfo: SourceInfo,
        tkey: NominalTypeKey,
        trgt: TempRegister,
    ) {
        self.push(MirOp::ConstructorPrimaryCollectionEmpty { sinfo, tkey, trgt });
    }

    pub fn emit_constructor_primary_collection_singletons(
        &mut self,
        sinfo: SourceInfo,
        tkey: NominalTypeKey,
        args: Vec<Argument>,
        trgt: TempRegister,
    ) {
        self.push(MirOp::ConstructorPrimaryCollectionSingletons { sinfo, tkey, args, trgt });
    }

    pub fn emit_constructor_primary_collection_copies(
        &mut self,
        sinfo: SourceInfo,
        tkey: NominalTypeKey,
        args: Vec<Argument>,
        trgt: TempRegister,
    ) {
        self.push(MirOp::ConstructorPrimaryCollectionCopies { sinfo, tkey, args, trgt });
    }

    pub fn emit_constructor_primary_collection_mixed(
        &mut self,
        sinfo: SourceInfo,
        tkey: NominalTypeKey,
        args: Vec<(bool, Argument)>,
        trgt: TempRegister,
    ) {
        self.push(MirOp::ConstructorPrimaryCollectionMixed { sinfo, tkey, args, trgt });
    }

    pub fn emit_constructor_tuple(
        &mut self,
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        args: Vec<Argument>,
        trgt: TempRegister,
    ) {
        self.push(MirOp::ConstructorTuple { sinfo, result_type, args, trgt });
    }

    pub fn emit_constructor_record(
        &mut self,
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        args: Vec<(String, Argument)>,
        trgt: TempRegister,
    ) {
        self.push(MirOp::ConstructorRecord { sinfo, result_type, args, trgt });
    }

    pub fn emit_constructor_value_list(
        &mut self,
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        args: Vec<Argument>,
        trgt: TempRegister,
    ) {
        self.push(MirOp::ConstructorEphemeralValueList { sinfo, result_type, args, trgt });
    }

    // ========================================================================
    // Access, projection and update
    // ========================================================================

    pub fn emit_load_from_ephemeral_list(
        &mut self,
        sinfo: SourceInfo,
        arg: Register,
        result_type: ResolvedTypeKey,
        arg_infer_type: ResolvedTypeKey,
        idx: usize,
        trgt: TempRegister,
    ) {
        self.push(MirOp::LoadFromEphemeralList { sinfo, arg, result_type, arg_infer_type, idx, trgt });
    }

    pub fn emit_access_from_index(
        &mut self,
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        arg: Argument,
        arg_infer_type: ResolvedTypeKey,
        idx: usize,
        trgt: TempRegister,
    ) {
        self.push(MirOp::AccessFromIndex { sinfo, result_type, arg, arg_infer_type, idx, trgt });
    }

    pub fn emit_project_from_indices(
        &mut self,
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        arg: Argument,
        arg_infer_type: ResolvedTypeKey,
        indices: Vec<usize>,
        trgt: TempRegister,
    ) {
        self.push(MirOp::ProjectFromIndices { sinfo, result_type, arg, arg_infer_type, indices, trgt });
    }

    pub fn emit_access_from_property(
        &mut self,
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        arg: Argument,
        arg_infer_type: ResolvedTypeKey,
        property: String,
        trgt: TempRegister,
    ) {
        self.push(MirOp::AccessFromProperty { sinfo, result_type, arg, arg_infer_type, property, trgt });
    }

    pub fn emit_project_from_properties(
        &mut self,
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        arg: Argument,
        arg_infer_type: ResolvedTypeKey,
        properties: Vec<String>,
        trgt: TempRegister,
    ) {
        self.push(MirOp::ProjectFromProperties {
            sinfo,
            result_type,
            arg,
            arg_infer_type,
            properties,
            trgt,
        });
    }

    pub fn emit_access_from_field(
        &mut self,
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        arg: Argument,
        arg_infer_type: ResolvedTypeKey,
        field: FieldKey,
        trgt: TempRegister,
    ) {
        self.push(MirOp::AccessFromField { sinfo, result_type, arg, arg_infer_type, field, trgt });
    }

    pub fn emit_project_from_fields(
        &mut self,
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        arg: Argument,
        arg_infer_type: ResolvedTypeKey,
        fields: Vec<FieldKey>,
        trgt: TempRegister,
    ) {
        self.push(MirOp::ProjectFromFields { sinfo, result_type, arg, arg_infer_type, fields, trgt });
    }

    pub fn emit_project_from_type_tuple(
        &mut self,
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        arg: Argument,
        arg_infer_type: ResolvedTypeKey,
        istry: bool,
        ptype: ResolvedTypeKey,
        trgt: TempRegister,
    ) {
        self.push(MirOp::ProjectFromTypeTuple { sinfo, result_type, arg, arg_infer_type, istry, ptype, trgt });
    }

    pub fn emit_project_from_type_record(
        &mut self,
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        arg: Argument,
        arg_infer_type: ResolvedTypeKey,
        istry: bool,
        ptype: ResolvedTypeKey,
        trgt: TempRegister,
    ) {
        self.push(MirOp::ProjectFromTypeRecord { sinfo, result_type, arg, arg_infer_type, istry, ptype, trgt });
    }

    pub fn emit_project_from_type_nominal(
        &mut self,
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        arg: Argument,
        arg_infer_type: ResolvedTypeKey,
        istry: bool,
        ptype: ResolvedTypeKey,
        trgt: TempRegister,
    ) {
        self.push(MirOp::ProjectFromTypeNominal { sinfo, result_type, arg, arg_infer_type, istry, ptype, trgt });
    }

    pub fn emit_modify_with_indices(
        &mut self,
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        arg: Argument,
        arg_infer_type: ResolvedTypeKey,
        updates: Vec<(usize, Argument)>,
        trgt: TempRegister,
    ) {
        self.push(MirOp::ModifyWithIndices { sinfo, result_type, arg, arg_infer_type, updates, trgt });
    }

    pub fn emit_modify_with_properties(
        &mut self,
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        arg: Argument,
        arg_infer_type: ResolvedTypeKey,
        updates: Vec<(String, Argument)>,
        trgt: TempRegister,
    ) {
        self.push(MirOp::ModifyWithProperties { sinfo, result_type, arg, arg_infer_type, updates, trgt });
    }

    pub fn emit_modify_with_fields(
        &mut self,
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        arg: Argument,
        arg_infer_type: ResolvedTypeKey,
        updates: Vec<(FieldKey, Argument)>,
        trgt: TempRegister,
    ) {
        self.push(MirOp::ModifyWithFields { sinfo, result_type, arg, arg_infer_type, updates, trgt });
    }

    pub fn emit_structured_extend_tuple(
        &mut self,
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        arg: Argument,
        arg_infer_type: ResolvedTypeKey,
        update: Argument,
        update_infer_type: ResolvedTypeKey,
        trgt: TempRegister,
    ) {
        self.push(MirOp::StructuredExtendTuple {
            sinfo,
            result_type,
            arg,
            arg_infer_type,
            update,
            update_infer_type,
            trgt,
        });
    }

    pub fn emit_structured_extend_record(
        &mut self,
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        arg: Argument,
        arg_infer_type: ResolvedTypeKey,
        update: Argument,
        update_infer_type: ResolvedTypeKey,
        trgt: TempRegister,
    ) {
        self.push(MirOp::StructuredExtendRecord {
            sinfo,
            result_type,
            arg,
            arg_infer_type,
            update,
            update_infer_type,
            trgt,
        });
    }

    pub fn emit_structured_extend_object(
        &mut self,
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        arg: Argument,
        arg_infer_type: ResolvedTypeKey,
        update: Argument,
        update_infer_type: ResolvedTypeKey,
        field_resolves: Vec<(String, FieldKey)>,
        trgt: TempRegister,
    ) {
        self.push(MirOp::StructuredExtendObject {
            sinfo,
            result_type,
            arg,
            arg_infer_type,
            update,
            update_infer_type,
            field_resolves,
            trgt,
        });
    }

    // ========================================================================
    // Calls and operators
    // ========================================================================

    /// Direct call; by-ref parameters are unpacked from the returned list
    pub fn emit_invoke_fixed_function(
        &mut self,
        sinfo: SourceInfo,
        ikey: InvokeKey,
        args: Vec<Argument>,
        retinfo: &RefReturn,
        trgt: TempRegister,
    ) {
        if retinfo.ref_params.is_empty() {
            self.push(MirOp::InvokeFixedFunction {
                sinfo,
                result_type: retinfo.declared.trkey.clone(),
                mkey: ikey,
                args,
                trgt,
            });
            return;
        }

        let rr = self.generate_tmp_register();
        self.push(MirOp::InvokeFixedFunction {
            sinfo,
            result_type: retinfo.elist.trkey.clone(),
            mkey: ikey,
            args,
            trgt: rr.clone(),
        });

        match retinfo.pack_base {
            None => self.push(MirOp::LoadFromEphemeralList {
                sinfo,
                arg: Register::Temp(rr.clone()),
                result_type: retinfo.declared.trkey.clone(),
                arg_infer_type: retinfo.elist.trkey.clone(),
                idx: 0,
                trgt,
            }),
            Some(_) => self.push(MirOp::PackSlice {
                sinfo,
                src: rr.clone().into(),
                sltype: retinfo.declared.trkey.clone(),
                trgt,
            }),
        }

        let refbase = retinfo.pack_base.unwrap_or(1);
        for (i, (name, ty)) in retinfo.ref_params.iter().enumerate() {
            let tr = self.generate_tmp_register();
            self.push(MirOp::LoadFromEphemeralList {
                sinfo,
                arg: Register::Temp(rr.clone()),
                result_type: ty.trkey.clone(),
                arg_infer_type: retinfo.elist.trkey.clone(),
                idx: refbase + i,
                trgt: tr.clone(),
            });
            self.push(MirOp::VarStore { sinfo, src: tr.into(), name: Variable::new(name.as_str()) });
        }
    }

    pub fn emit_invoke_virtual_function(
        &mut self,
        sinfo: SourceInfo,
        vresolve: VirtualMethodKey,
        this_infer_type: ResolvedTypeKey,
        args: Vec<Argument>,
        result_type: ResolvedTypeKey,
        trgt: TempRegister,
    ) {
        self.push(MirOp::InvokeVirtualFunction { sinfo, result_type, vresolve, args, this_infer_type, trgt });
    }

    /// Non-strict operands are coerced through a truthy conversion first
    pub fn emit_prefix_not(
        &mut self,
        sinfo: SourceInfo,
        op: &str,
        isstrict: bool,
        arg: Argument,
        infer_type: ResolvedTypeKey,
        trgt: TempRegister,
    ) {
        let arg = if isstrict {
            arg
        } else {
            let tr = self.generate_tmp_register();
            self.push(MirOp::TruthyConvert { sinfo, src: arg, trgt: tr.clone() });
            tr.into()
        };
        self.push(MirOp::PrefixOp { sinfo, op: op.to_string(), arg, infer_type, trgt });
    }

    pub fn emit_prefix_op(
        &mut self,
        sinfo: SourceInfo,
        op: &str,
        arg: Argument,
        infer_type: ResolvedTypeKey,
        trgt: TempRegister,
    ) {
        self.push(MirOp::PrefixOp { sinfo, op: op.to_string(), arg, infer_type, trgt });
    }

    pub fn emit_bin_op(
        &mut self,
        sinfo: SourceInfo,
        lhs_infer_type: ResolvedTypeKey,
        lhs: Argument,
        op: &str,
        rhs_infer_type: ResolvedTypeKey,
        rhs: Argument,
        trgt: TempRegister,
    ) {
        self.push(MirOp::BinOp { sinfo, lhs_infer_type, lhs, op: op.to_string(), rhs_infer_type, rhs, trgt });
    }

    pub fn emit_bin_eq(
        &mut self,
        sinfo: SourceInfo,
        lhs_infer_type: ResolvedTypeKey,
        lhs: Argument,
        op: &str,
        rhs_infer_type: ResolvedTypeKey,
        rhs: Argument,
        trgt: TempRegister,
        relaxed: bool,
    ) {
        self.push(MirOp::BinEq {
            sinfo,
            lhs_infer_type,
            lhs,
            op: op.to_string(),
            rhs_infer_type,
            rhs,
            relaxed,
            trgt,
        });
    }

    pub fn emit_bin_less(
        &mut self,
        sinfo: SourceInfo,
        lhs_infer_type: ResolvedTypeKey,
        lhs: Argument,
        rhs_infer_type: ResolvedTypeKey,
        rhs: Argument,
        trgt: TempRegister,
        relaxed: bool,
    ) {
        self.push(MirOp::BinLess { sinfo, lhs_infer_type, lhs, rhs_infer_type, rhs, relaxed, trgt });
    }

    pub fn emit_bin_cmp(
        &mut self,
        sinfo: SourceInfo,
        lhs_infer_type: ResolvedTypeKey,
        lhs: Argument,
        op: &str,
        rhs_infer_type: ResolvedTypeKey,
        rhs: Argument,
        trgt: TempRegister,
    ) {
        self.push(MirOp::BinCmp { sinfo, lhs_infer_type, lhs, op: op.to_string(), rhs_infer_type, rhs, trgt });
    }

    /// Tests against the core None/Some types get dedicated ops
    pub fn emit_type_of(
        &mut self,
        sinfo: SourceInfo,
        trgt: TempRegister,
        chktype: ResolvedTypeKey,
        src_infer_type: ResolvedTypeKey,
        src: Argument,
    ) {
        if chktype == self.none_key {
            self.push(MirOp::IsTypeOfNone { sinfo, arg: src, trgt });
        } else if chktype == self.some_key {
            self.push(MirOp::IsTypeOfSome { sinfo, arg: src, trgt });
        } else {
            self.push(MirOp::IsTypeOf { sinfo, arg_infer_type: src_infer_type, arg: src, oftype: chktype, trgt });
        }
    }

    // ========================================================================
    // Flow
    // ========================================================================

    pub fn emit_reg_assign(&mut self, sinfo: SourceInfo, src: Argument, trgt: TempRegister) {
        self.push(MirOp::RegAssign { sinfo, src, trgt });
    }

    pub fn emit_truthy_conversion(&mut self, sinfo: SourceInfo, src: Argument, trgt: TempRegister) {
        self.push(MirOp::TruthyConvert { sinfo, src, trgt });
    }

    pub fn local_lifetime_start(&mut self, sinfo: SourceInfo, name: &str, rtype: ResolvedTypeKey) {
        self.push(MirOp::VarLifetimeStart { sinfo, name: name.to_string(), rtype });
    }

    pub fn local_lifetime_end(&mut self, sinfo: SourceInfo, name: &str) {
        self.push(MirOp::VarLifetimeEnd { sinfo, name: name.to_string() });
    }

    pub fn emit_var_store(&mut self, sinfo: SourceInfo, src: Argument, name: &str) {
        self.push(MirOp::VarStore { sinfo, src, name: Variable::new(name) });
    }

    pub fn emit_pack_slice(
        &mut self,
        sinfo: SourceInfo,
        src: Argument,
        sltype: ResolvedTypeKey,
        trgt: TempRegister,
    ) {
        self.push(MirOp::PackSlice { sinfo, src, sltype, trgt });
    }

    pub fn emit_pack_extend(
        &mut self,
        sinfo: SourceInfo,
        basepack: Argument,
        ext: Vec<Argument>,
        sltype: ResolvedTypeKey,
        trgt: TempRegister,
    ) {
        self.push(MirOp::PackExtend { sinfo, basepack, ext, sltype, trgt });
    }

    pub fn emit_return_assign(&mut self, sinfo: SourceInfo, src: Argument) {
        self.push(MirOp::ReturnAssign { sinfo, src, name: Variable::return_var() });
    }

    pub fn emit_abort(&mut self, sinfo: SourceInfo, info: &str) {
        self.push(MirOp::Abort { sinfo, info: info.to_string() });
    }

    pub fn emit_debug_break(&mut self, sinfo: SourceInfo) {
        self.push(MirOp::Debug { sinfo, value: None });
    }

    pub fn emit_debug_print(&mut self, sinfo: SourceInfo, value: Argument) {
        self.push(MirOp::Debug { sinfo, value: Some(value) });
    }

    // ========================================================================
    // Jumps
    // ========================================================================

    pub fn emit_direct_jump(&mut self, sinfo: SourceInfo, block: &str) {
        self.push(MirOp::Jump { sinfo, trgtblock: block.to_string() });
    }

    pub fn emit_bool_jump(
        &mut self,
        sinfo: SourceInfo,
        arg: Argument,
        isstrict: bool,
        trueblock: &str,
        falseblock: &str,
    ) {
        let arg = if isstrict {
            arg
        } else {
            let tr = self.generate_tmp_register();
            self.push(MirOp::TruthyConvert { sinfo, src: arg, trgt: tr.clone() });
            tr.into()
        };
        self.push(MirOp::JumpCond {
            sinfo,
            arg,
            trueblock: trueblock.to_string(),
            falseblock: falseblock.to_string(),
        });
    }

    pub fn emit_none_jump(&mut self, sinfo: SourceInfo, arg: Argument, noneblock: &str, someblock: &str) {
        self.push(MirOp::JumpNone {
            sinfo,
            arg,
            noneblock: noneblock.to_string(),
            someblock: someblock.to_string(),
        });
    }

    // ========================================================================
    // Finalization
    // ========================================================================

    /// Finish the body: run the lowering pipeline and reset the emitter
    ///
    /// `params` maps each parameter name to its static type.
    pub fn get_body(&mut self, file: &str, sinfo: SourceInfo, params: &BTreeMap<String, MirType>) -> MirBody {
        let current = std::mem::replace(&mut self.current, BasicBlock::new(ENTRY_BLOCK));
        let mut blocks = std::mem::take(&mut self.blocks);
        blocks.insert(current.label.clone(), current);

        let mut body = MirBody {
            file: file.to_string(),
            sinfo,
            blocks,
            vtypes: None,
        };

        let stats = LoweringPipeline::for_body(params).run(&mut body);
        tracing::trace!(file, ?stats, "finalized body");

        self.initialize();
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mir::MirTypeOption;

    fn s() -> SourceInfo {
        SourceInfo::default()
    }

    fn ty(key: &str) -> MirType {
        MirType::single(MirTypeOption::entity(key))
    }

    #[test]
    fn test_temps_are_monotonic_and_reset() {
        let mut e = BodyEmitter::default();
        assert_eq!(e.generate_tmp_register().reg_id, 0);
        assert_eq!(e.generate_tmp_register().reg_id, 1);
        e.initialize();
        assert_eq!(e.generate_tmp_register().name_id, "#tmp_0");
    }

    #[test]
    fn test_block_labels_are_unique() {
        let mut e = BodyEmitter::default();
        let a = e.create_new_block("then");
        let b = e.create_new_block("then");
        assert_eq!(a, "then_3");
        assert_eq!(b, "then_4");
        assert_ne!(a, b);
    }

    #[test]
    #[should_panic(expected = "unknown block")]
    fn test_set_active_unknown_block_panics() {
        let mut e = BodyEmitter::default();
        e.set_active_block("nowhere_9");
    }

    #[test]
    fn test_non_strict_bool_jump_inserts_truthy() {
        let mut e = BodyEmitter::default();
        let t = e.generate_tmp_register();
        e.emit_bool_jump(s(), t.into(), false, "returnassign", "exit");
        let ops = &e.current.ops;
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[0], MirOp::TruthyConvert { .. }));
        assert!(matches!(&ops[1], MirOp::JumpCond { arg, .. } if arg.name_id() == "#tmp_1"));
    }

    #[test]
    fn test_type_of_specializes_none_and_some() {
        let mut e = BodyEmitter::default();
        let t0 = e.generate_tmp_register();
        let t1 = e.generate_tmp_register();
        let t2 = e.generate_tmp_register();
        e.emit_type_of(s(), t0, "NSCore::None".into(), "NSCore::Any".into(), Constant::None.into());
        e.emit_type_of(s(), t1, "NSCore::Some".into(), "NSCore::Any".into(), Constant::None.into());
        e.emit_type_of(s(), t2, "NSCore::Int".into(), "NSCore::Any".into(), Constant::None.into());
        let ops = &e.current.ops;
        assert!(matches!(ops[0], MirOp::IsTypeOfNone { .. }));
        assert!(matches!(ops[1], MirOp::IsTypeOfSome { .. }));
        assert!(matches!(ops[2], MirOp::IsTypeOf { .. }));
    }

    #[test]
    fn test_invoke_with_ref_params_unpacks_list() {
        let mut e = BodyEmitter::default();
        let trgt = e.generate_tmp_register();
        let retinfo = RefReturn {
            declared: ty("NSCore::Int"),
            elist: MirType::single(MirTypeOption::ephemeral_list(vec![ty("NSCore::Int"), ty("NSCore::Bool")])),
            pack_base: None,
            ref_params: vec![("flag".to_string(), ty("NSCore::Bool"))],
        };
        e.emit_invoke_fixed_function(s(), "NSMain::f".into(), Vec::new(), &retinfo, trgt);

        let text: Vec<String> = e.current.ops.iter().map(|op| op.to_string()).collect();
        assert_eq!(
            text,
            vec![
                "#tmp_1 = NSMain::f::()",
                "#tmp_0 = #tmp_1(0)",
                "#tmp_2 = #tmp_1(1)",
                "flag = #tmp_2",
            ]
        );
    }

    #[test]
    fn test_get_body_has_fixed_blocks_and_resets() {
        let mut e = BodyEmitter::default();
        let t0 = e.generate_tmp_register();
        e.emit_load_const_int(s(), "1", t0.clone());
        let t1 = e.generate_tmp_register();
        e.emit_reg_assign(s(), t0.into(), t1.clone());
        e.emit_return_assign(s(), t1.into());
        e.emit_direct_jump(s(), RETURN_ASSIGN_BLOCK);
        e.set_active_block(RETURN_ASSIGN_BLOCK);
        e.emit_direct_jump(s(), EXIT_BLOCK);

        let body = e.get_body("main.bsq", s(), &BTreeMap::new());
        for label in [ENTRY_BLOCK, RETURN_ASSIGN_BLOCK, EXIT_BLOCK] {
            assert!(body.blocks.contains_key(label), "missing {}", label);
        }

        // the copy through #tmp_1 is propagated and then dropped
        let entry: Vec<String> = body.blocks[ENTRY_BLOCK].ops.iter().map(|op| op.to_string()).collect();
        assert_eq!(entry, vec!["#tmp_0 = 1", "$__ir_ret__ = #tmp_0", "jump returnassign"]);

        assert_eq!(e.active_block(), ENTRY_BLOCK);
        assert_eq!(e.generate_tmp_register().reg_id, 0);
    }
}

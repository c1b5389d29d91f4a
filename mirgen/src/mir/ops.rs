//! MIR instruction set
//!
//! Operations fall into three kinds:
//! - *value* ops define exactly one fresh temporary
//! - *flow* ops rebind an existing temporary or variable
//! - *jump* ops end a block (plus the lifetime markers)
//!
//! The use/def views (`used_vars`, `mod_vars` and their mutable slot
//! variants) are what the lowering passes rely on, so every variant must
//! list every register it reads and writes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::keys::{ConstantKey, FieldKey, InvokeKey, ResolvedTypeKey, VirtualMethodKey};
use crate::ast::SourceInfo;

/// Name of the variable the return value is assigned to
pub const RETURN_VAR: &str = "$__ir_ret__";

// ============================================================================
// Registers and arguments
// ============================================================================

/// A compiler temporary, never reused within a body
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RegisterRepr", into = "RegisterRepr")]
pub struct TempRegister {
    pub reg_id: u32,
    /// Versioned name; differs from the base name after SSA renaming
    pub name_id: String,
}

impl TempRegister {
    pub fn new(reg_id: u32) -> Self {
        Self {
            reg_id,
            name_id: format!("#tmp_{}", reg_id),
        }
    }

    pub fn base_name(&self) -> String {
        format!("#tmp_{}", self.reg_id)
    }
}

/// A named local, parameter or captured variable
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RegisterRepr", into = "RegisterRepr")]
pub struct Variable {
    pub lname: String,
    pub name_id: String,
}

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        let lname = name.into();
        Self {
            name_id: lname.clone(),
            lname,
        }
    }

    pub fn return_var() -> Self {
        Self::new(RETURN_VAR)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RegisterRepr", into = "RegisterRepr")]
pub enum Register {
    Temp(TempRegister),
    Var(Variable),
}

impl Register {
    pub fn name_id(&self) -> &str {
        match self {
            Register::Temp(t) => &t.name_id,
            Register::Var(v) => &v.name_id,
        }
    }

    /// Name shared by every SSA version of this register
    pub fn base_name(&self) -> String {
        match self {
            Register::Temp(t) => t.base_name(),
            Register::Var(v) => v.lname.clone(),
        }
    }

    pub fn is_temp(&self) -> bool {
        matches!(self, Register::Temp(_))
    }
}

impl From<TempRegister> for Register {
    fn from(t: TempRegister) -> Self {
        Register::Temp(t)
    }
}

impl From<Variable> for Register {
    fn from(v: Variable) -> Self {
        Register::Var(v)
    }
}

/// Mutable view of one register slot inside an operation
pub enum RegisterSlot<'a> {
    Temp(&'a mut TempRegister),
    Var(&'a mut Variable),
}

impl<'a> RegisterSlot<'a> {
    fn of(reg: &'a mut Register) -> Self {
        match reg {
            Register::Temp(t) => RegisterSlot::Temp(t),
            Register::Var(v) => RegisterSlot::Var(v),
        }
    }

    pub fn base_name(&self) -> String {
        match self {
            RegisterSlot::Temp(t) => t.base_name(),
            RegisterSlot::Var(v) => v.lname.clone(),
        }
    }

    pub fn name_id(&self) -> &str {
        match self {
            RegisterSlot::Temp(t) => &t.name_id,
            RegisterSlot::Var(v) => &v.name_id,
        }
    }

    pub fn set_name_id(&mut self, name_id: impl Into<String>) {
        match self {
            RegisterSlot::Temp(t) => t.name_id = name_id.into(),
            RegisterSlot::Var(v) => v.name_id = name_id.into(),
        }
    }

    pub fn to_register(&self) -> Register {
        match self {
            RegisterSlot::Temp(t) => Register::Temp((**t).clone()),
            RegisterSlot::Var(v) => Register::Var((**v).clone()),
        }
    }
}

/// A literal operand
///
/// Numeric payloads are kept as source text; integer payloads are decimal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ArgumentRepr", into = "ArgumentRepr")]
pub enum Constant {
    None,
    True,
    False,
    Int(String),
    BigInt(String),
    Float(String),
    String(String),
    Regex(String),
}

impl Constant {
    /// Identity of the literal, disjoint from every register name
    pub fn name_id(&self) -> String {
        match self {
            Constant::None => "=none=".to_string(),
            Constant::True => "=true=".to_string(),
            Constant::False => "=false=".to_string(),
            Constant::Int(v) => format!("=int={}", v),
            Constant::BigInt(v) => format!("=bigint={}", v),
            Constant::Float(v) => format!("=float64={}", v),
            Constant::String(v) => format!("=string={}", v),
            Constant::Regex(v) => format!("=regex={}", v),
        }
    }

    pub fn bool(value: bool) -> Self {
        if value { Constant::True } else { Constant::False }
    }
}

/// An operand: a register or a literal
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ArgumentRepr", into = "ArgumentRepr")]
pub enum Argument {
    Register(Register),
    Constant(Constant),
}

impl Argument {
    pub fn name_id(&self) -> String {
        match self {
            Argument::Register(r) => r.name_id().to_string(),
            Argument::Constant(c) => c.name_id(),
        }
    }

    pub fn as_register(&self) -> Option<&Register> {
        match self {
            Argument::Register(r) => Some(r),
            Argument::Constant(_) => None,
        }
    }
}

impl From<TempRegister> for Argument {
    fn from(t: TempRegister) -> Self {
        Argument::Register(Register::Temp(t))
    }
}

impl From<Variable> for Argument {
    fn from(v: Variable) -> Self {
        Argument::Register(Register::Var(v))
    }
}

impl From<Register> for Argument {
    fn from(r: Register) -> Self {
        Argument::Register(r)
    }
}

impl From<Constant> for Argument {
    fn from(c: Constant) -> Self {
        Argument::Constant(c)
    }
}

// ============================================================================
// Wire representation
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "lowercase")]
enum RegisterRepr {
    Temp {
        #[serde(rename = "regID")]
        reg_id: u32,
        #[serde(rename = "nameID")]
        name_id: String,
    },
    Var {
        lname: String,
        #[serde(rename = "nameID")]
        name_id: String,
    },
}

impl From<Register> for RegisterRepr {
    fn from(reg: Register) -> Self {
        match reg {
            Register::Temp(t) => t.into(),
            Register::Var(v) => v.into(),
        }
    }
}

impl From<RegisterRepr> for Register {
    fn from(repr: RegisterRepr) -> Self {
        match repr {
            RegisterRepr::Temp { reg_id, name_id } => Register::Temp(TempRegister { reg_id, name_id }),
            RegisterRepr::Var { lname, name_id } => Register::Var(Variable { lname, name_id }),
        }
    }
}

impl From<TempRegister> for RegisterRepr {
    fn from(t: TempRegister) -> Self {
        RegisterRepr::Temp {
            reg_id: t.reg_id,
            name_id: t.name_id,
        }
    }
}

impl TryFrom<RegisterRepr> for TempRegister {
    type Error = String;

    fn try_from(repr: RegisterRepr) -> Result<Self, Self::Error> {
        match Register::from(repr) {
            Register::Temp(t) => Ok(t),
            Register::Var(v) => Err(format!("expected a temporary, found variable `{}`", v.lname)),
        }
    }
}

impl From<Variable> for RegisterRepr {
    fn from(v: Variable) -> Self {
        RegisterRepr::Var {
            lname: v.lname,
            name_id: v.name_id,
        }
    }
}

impl TryFrom<RegisterRepr> for Variable {
    type Error = String;

    fn try_from(repr: RegisterRepr) -> Result<Self, Self::Error> {
        match Register::from(repr) {
            Register::Var(v) => Ok(v),
            Register::Temp(t) => Err(format!("expected a variable, found temporary {}", t.reg_id)),
        }
    }
}

/// Literals encode as themselves; registers as tagged objects
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ArgumentRepr {
    Null,
    Bool(bool),
    Numeric(String),
    Text(Vec<String>),
    Register(RegisterRepr),
}

impl From<Constant> for ArgumentRepr {
    fn from(c: Constant) -> Self {
        match c {
            Constant::None => ArgumentRepr::Null,
            Constant::True => ArgumentRepr::Bool(true),
            Constant::False => ArgumentRepr::Bool(false),
            Constant::Int(v) => ArgumentRepr::Numeric(v),
            Constant::BigInt(v) => ArgumentRepr::Numeric(format!("{}n", v)),
            Constant::Float(v) if v.contains('.') => ArgumentRepr::Numeric(v),
            Constant::Float(v) => ArgumentRepr::Numeric(format!("{}f", v)),
            Constant::String(v) => ArgumentRepr::Text(vec![v]),
            Constant::Regex(v) => ArgumentRepr::Text(vec![v, "regex".to_string()]),
        }
    }
}

impl From<Argument> for ArgumentRepr {
    fn from(arg: Argument) -> Self {
        match arg {
            Argument::Register(r) => ArgumentRepr::Register(r.into()),
            Argument::Constant(c) => c.into(),
        }
    }
}

impl TryFrom<ArgumentRepr> for Constant {
    type Error = String;

    fn try_from(repr: ArgumentRepr) -> Result<Self, Self::Error> {
        match repr {
            ArgumentRepr::Null => Ok(Constant::None),
            ArgumentRepr::Bool(b) => Ok(Constant::bool(b)),
            ArgumentRepr::Numeric(v) => Ok(parse_numeric(v)),
            ArgumentRepr::Text(mut parts) => match parts.len() {
                1 => Ok(Constant::String(parts.remove(0))),
                2 if parts[1] == "regex" => Ok(Constant::Regex(parts.remove(0))),
                _ => Err(format!("malformed string constant {:?}", parts)),
            },
            ArgumentRepr::Register(_) => Err("expected a constant, found a register".to_string()),
        }
    }
}

impl TryFrom<ArgumentRepr> for Argument {
    type Error = String;

    fn try_from(repr: ArgumentRepr) -> Result<Self, Self::Error> {
        match repr {
            ArgumentRepr::Register(r) => Ok(Argument::Register(r.into())),
            other => Constant::try_from(other).map(Argument::Constant),
        }
    }
}

/// A present field is always `Some`, even when it encodes the none constant
fn present_argument<'de, D>(deserializer: D) -> Result<Option<Argument>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Argument::deserialize(deserializer).map(Some)
}

fn parse_numeric(v: String) -> Constant {
    if let Some(big) = v.strip_suffix('n') {
        Constant::BigInt(big.to_string())
    } else if v.contains('.') {
        Constant::Float(v)
    } else if let Some(float) = v.strip_suffix('f') {
        Constant::Float(float.to_string())
    } else {
        Constant::Int(v)
    }
}

// ============================================================================
// Operations
// ============================================================================

/// Value / flow / jump taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Value,
    Flow,
    Jump,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum MirOp {
    // --- value ---
    /// Load a literal
    LoadConst { sinfo: SourceInfo, src: Constant, trgt: TempRegister },
    /// String literal of a validated string type
    LoadConstSafeString {
        sinfo: SourceInfo,
        ivalue: String,
        tkey: ResolvedTypeKey,
        tskey: ResolvedTypeKey,
        trgt: TempRegister,
    },
    /// String literal of a typed string, optionally checked by a parse function
    LoadConstTypedString {
        sinfo: SourceInfo,
        ivalue: String,
        tkey: ResolvedTypeKey,
        tskey: ResolvedTypeKey,
        pfunckey: Option<InvokeKey>,
        errtype: Option<ResolvedTypeKey>,
        trgt: TempRegister,
    },
    AccessConstantValue { sinfo: SourceInfo, ckey: ConstantKey, trgt: TempRegister },
    LoadFieldDefaultValue { sinfo: SourceInfo, fkey: FieldKey, trgt: TempRegister },
    AccessArgVariable { sinfo: SourceInfo, name: Variable, trgt: TempRegister },
    AccessLocalVariable { sinfo: SourceInfo, name: Variable, trgt: TempRegister },
    InvokeInvariantCheckDirect {
        sinfo: SourceInfo,
        ikey: InvokeKey,
        tkey: ResolvedTypeKey,
        rcvr: Argument,
        trgt: TempRegister,
    },
    InvokeInvariantCheckVirtualTarget {
        sinfo: SourceInfo,
        infer_type: ResolvedTypeKey,
        rcvr: Argument,
        trgt: TempRegister,
    },
    ConstructorPrimary {
        sinfo: SourceInfo,
        tkey: ResolvedTypeKey,
        args: Vec<Argument>,
        trgt: TempRegister,
    },
    ConstructorPrimaryCollectionEmpty { sinfo: SourceInfo, tkey: ResolvedTypeKey, trgt: TempRegister },
    ConstructorPrimaryCollectionSingletons {
        sinfo: SourceInfo,
        tkey: ResolvedTypeKey,
        args: Vec<Argument>,
        trgt: TempRegister,
    },
    ConstructorPrimaryCollectionCopies {
        sinfo: SourceInfo,
        tkey: ResolvedTypeKey,
        args: Vec<Argument>,
        trgt: TempRegister,
    },
    /// `(true, a)` entries are expanded copies, `(false, a)` singletons
    ConstructorPrimaryCollectionMixed {
        sinfo: SourceInfo,
        tkey: ResolvedTypeKey,
        args: Vec<(bool, Argument)>,
        trgt: TempRegister,
    },
    ConstructorTuple {
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        args: Vec<Argument>,
        trgt: TempRegister,
    },
    ConstructorRecord {
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        args: Vec<(String, Argument)>,
        trgt: TempRegister,
    },
    ConstructorEphemeralValueList {
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        args: Vec<Argument>,
        trgt: TempRegister,
    },
    AccessFromIndex {
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        arg: Argument,
        arg_infer_type: ResolvedTypeKey,
        idx: usize,
        trgt: TempRegister,
    },
    ProjectFromIndices {
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        arg: Argument,
        arg_infer_type: ResolvedTypeKey,
        indices: Vec<usize>,
        trgt: TempRegister,
    },
    AccessFromProperty {
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        arg: Argument,
        arg_infer_type: ResolvedTypeKey,
        property: String,
        trgt: TempRegister,
    },
    ProjectFromProperties {
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        arg: Argument,
        arg_infer_type: ResolvedTypeKey,
        properties: Vec<String>,
        trgt: TempRegister,
    },
    AccessFromField {
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        arg: Argument,
        arg_infer_type: ResolvedTypeKey,
        field: FieldKey,
        trgt: TempRegister,
    },
    ProjectFromFields {
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        arg: Argument,
        arg_infer_type: ResolvedTypeKey,
        fields: Vec<FieldKey>,
        trgt: TempRegister,
    },
    ProjectFromTypeTuple {
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        arg: Argument,
        arg_infer_type: ResolvedTypeKey,
        istry: bool,
        ptype: ResolvedTypeKey,
        trgt: TempRegister,
    },
    ProjectFromTypeRecord {
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        arg: Argument,
        arg_infer_type: ResolvedTypeKey,
        istry: bool,
        ptype: ResolvedTypeKey,
        trgt: TempRegister,
    },
    ProjectFromTypeNominal {
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        arg: Argument,
        arg_infer_type: ResolvedTypeKey,
        istry: bool,
        ptype: ResolvedTypeKey,
        trgt: TempRegister,
    },
    ModifyWithIndices {
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        arg: Argument,
        arg_infer_type: ResolvedTypeKey,
        updates: Vec<(usize, Argument)>,
        trgt: TempRegister,
    },
    ModifyWithProperties {
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        arg: Argument,
        arg_infer_type: ResolvedTypeKey,
        updates: Vec<(String, Argument)>,
        trgt: TempRegister,
    },
    ModifyWithFields {
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        arg: Argument,
        arg_infer_type: ResolvedTypeKey,
        updates: Vec<(FieldKey, Argument)>,
        trgt: TempRegister,
    },
    StructuredExtendTuple {
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        arg: Argument,
        arg_infer_type: ResolvedTypeKey,
        update: Argument,
        update_infer_type: ResolvedTypeKey,
        trgt: TempRegister,
    },
    StructuredExtendRecord {
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        arg: Argument,
        arg_infer_type: ResolvedTypeKey,
        update: Argument,
        update_infer_type: ResolvedTypeKey,
        trgt: TempRegister,
    },
    /// `field_resolves` maps update property names to field keys
    StructuredExtendObject {
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        arg: Argument,
        arg_infer_type: ResolvedTypeKey,
        update: Argument,
        update_infer_type: ResolvedTypeKey,
        field_resolves: Vec<(String, FieldKey)>,
        trgt: TempRegister,
    },
    LoadFromEphemeralList {
        sinfo: SourceInfo,
        arg: Register,
        result_type: ResolvedTypeKey,
        arg_infer_type: ResolvedTypeKey,
        idx: usize,
        trgt: TempRegister,
    },
    InvokeFixedFunction {
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        mkey: InvokeKey,
        args: Vec<Argument>,
        trgt: TempRegister,
    },
    /// `args[0]` is the receiver
    InvokeVirtualFunction {
        sinfo: SourceInfo,
        result_type: ResolvedTypeKey,
        vresolve: VirtualMethodKey,
        args: Vec<Argument>,
        this_infer_type: ResolvedTypeKey,
        trgt: TempRegister,
    },
    PrefixOp {
        sinfo: SourceInfo,
        op: String,
        arg: Argument,
        infer_type: ResolvedTypeKey,
        trgt: TempRegister,
    },
    BinOp {
        sinfo: SourceInfo,
        lhs_infer_type: ResolvedTypeKey,
        lhs: Argument,
        op: String,
        rhs_infer_type: ResolvedTypeKey,
        rhs: Argument,
        trgt: TempRegister,
    },
    BinEq {
        sinfo: SourceInfo,
        lhs_infer_type: ResolvedTypeKey,
        lhs: Argument,
        op: String,
        rhs_infer_type: ResolvedTypeKey,
        rhs: Argument,
        relaxed: bool,
        trgt: TempRegister,
    },
    BinLess {
        sinfo: SourceInfo,
        lhs_infer_type: ResolvedTypeKey,
        lhs: Argument,
        rhs_infer_type: ResolvedTypeKey,
        rhs: Argument,
        relaxed: bool,
        trgt: TempRegister,
    },
    BinCmp {
        sinfo: SourceInfo,
        lhs_infer_type: ResolvedTypeKey,
        lhs: Argument,
        op: String,
        rhs_infer_type: ResolvedTypeKey,
        rhs: Argument,
        trgt: TempRegister,
    },
    IsTypeOfNone { sinfo: SourceInfo, arg: Argument, trgt: TempRegister },
    IsTypeOfSome { sinfo: SourceInfo, arg: Argument, trgt: TempRegister },
    IsTypeOf {
        sinfo: SourceInfo,
        arg_infer_type: ResolvedTypeKey,
        arg: Argument,
        oftype: ResolvedTypeKey,
        trgt: TempRegister,
    },

    // --- flow ---
    RegAssign { sinfo: SourceInfo, src: Argument, trgt: TempRegister },
    TruthyConvert { sinfo: SourceInfo, src: Argument, trgt: TempRegister },
    VarStore { sinfo: SourceInfo, src: Argument, name: Variable },
    PackSlice {
        sinfo: SourceInfo,
        src: Argument,
        sltype: ResolvedTypeKey,
        trgt: TempRegister,
    },
    PackExtend {
        sinfo: SourceInfo,
        basepack: Argument,
        ext: Vec<Argument>,
        sltype: ResolvedTypeKey,
        trgt: TempRegister,
    },
    ReturnAssign { sinfo: SourceInfo, src: Argument, name: Variable },
    Abort { sinfo: SourceInfo, info: String },
    Debug {
        sinfo: SourceInfo,
        #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present_argument")]
        value: Option<Argument>,
    },
    /// SSA merge; `src` maps predecessor label to incoming version
    Phi {
        sinfo: SourceInfo,
        src: BTreeMap<String, Register>,
        trgt: Register,
    },

    // --- jump ---
    Jump { sinfo: SourceInfo, trgtblock: String },
    JumpCond {
        sinfo: SourceInfo,
        arg: Argument,
        trueblock: String,
        falseblock: String,
    },
    JumpNone {
        sinfo: SourceInfo,
        arg: Argument,
        noneblock: String,
        someblock: String,
    },
    VarLifetimeStart { sinfo: SourceInfo, name: String, rtype: ResolvedTypeKey },
    VarLifetimeEnd { sinfo: SourceInfo, name: String },
}

impl MirOp {
    pub fn sinfo(&self) -> &SourceInfo {
        match self {
            MirOp::LoadConst { sinfo, .. }
            | MirOp::LoadConstSafeString { sinfo, .. }
            | MirOp::LoadConstTypedString { sinfo, .. }
            | MirOp::AccessConstantValue { sinfo, .. }
            | MirOp::LoadFieldDefaultValue { sinfo, .. }
            | MirOp::AccessArgVariable { sinfo, .. }
            | MirOp::AccessLocalVariable { sinfo, .. }
            | MirOp::InvokeInvariantCheckDirect { sinfo, .. }
            | MirOp::InvokeInvariantCheckVirtualTarget { sinfo, .. }
            | MirOp::ConstructorPrimary { sinfo, .. }
            | MirOp::ConstructorPrimaryCollectionEmpty { sinfo, .. }
            | MirOp::ConstructorPrimaryCollectionSingletons { sinfo, .. }
            | MirOp::ConstructorPrimaryCollectionCopies { sinfo, .. }
            | MirOp::ConstructorPrimaryCollectionMixed { sinfo, .. }
            | MirOp::ConstructorTuple { sinfo, .. }
            | MirOp::ConstructorRecord { sinfo, .. }
            | MirOp::ConstructorEphemeralValueList { sinfo, .. }
            | MirOp::AccessFromIndex { sinfo, .. }
            | MirOp::ProjectFromIndices { sinfo, .. }
            | MirOp::AccessFromProperty { sinfo, .. }
            | MirOp::ProjectFromProperties { sinfo, .. }
            | MirOp::AccessFromField { sinfo, .. }
            | MirOp::ProjectFromFields { sinfo, .. }
            | MirOp::ProjectFromTypeTuple { sinfo, .. }
            | MirOp::ProjectFromTypeRecord { sinfo, .. }
            | MirOp::ProjectFromTypeNominal { sinfo, .. }
            | MirOp::ModifyWithIndices { sinfo, .. }
            | MirOp::ModifyWithProperties { sinfo, .. }
            | MirOp::ModifyWithFields { sinfo, .. }
            | MirOp::StructuredExtendTuple { sinfo, .. }
            | MirOp::StructuredExtendRecord { sinfo, .. }
            | MirOp::StructuredExtendObject { sinfo, .. }
            | MirOp::LoadFromEphemeralList { sinfo, .. }
            | MirOp::InvokeFixedFunction { sinfo, .. }
            | MirOp::InvokeVirtualFunction { sinfo, .. }
            | MirOp::PrefixOp { sinfo, .. }
            | MirOp::BinOp { sinfo, .. }
            | MirOp::BinEq { sinfo, .. }
            | MirOp::BinLess { sinfo, .. }
            | MirOp::BinCmp { sinfo, .. }
            | MirOp::IsTypeOfNone { sinfo, .. }
            | MirOp::IsTypeOfSome { sinfo, .. }
            | MirOp::IsTypeOf { sinfo, .. }
            | MirOp::RegAssign { sinfo, .. }
            | MirOp::TruthyConvert { sinfo, .. }
            | MirOp::VarStore { sinfo, .. }
            | MirOp::PackSlice { sinfo, .. }
            | MirOp::PackExtend { sinfo, .. }
            | MirOp::ReturnAssign { sinfo, .. }
            | MirOp::Abort { sinfo, .. }
            | MirOp::Debug { sinfo, .. }
            | MirOp::Phi { sinfo, .. }
            | MirOp::Jump { sinfo, .. }
            | MirOp::JumpCond { sinfo, .. }
            | MirOp::JumpNone { sinfo, .. }
            | MirOp::VarLifetimeStart { sinfo, .. }
            | MirOp::VarLifetimeEnd { sinfo, .. } => sinfo,
        }
    }

    pub fn kind(&self) -> OpKind {
        match self {
            MirOp::RegAssign { .. }
            | MirOp::TruthyConvert { .. }
            | MirOp::VarStore { .. }
            | MirOp::PackSlice { .. }
            | MirOp::PackExtend { .. }
            | MirOp::ReturnAssign { .. }
            | MirOp::Abort { .. }
            | MirOp::Debug { .. }
            | MirOp::Phi { .. } => OpKind::Flow,
            MirOp::Jump { .. }
            | MirOp::JumpCond { .. }
            | MirOp::JumpNone { .. }
            | MirOp::VarLifetimeStart { .. }
            | MirOp::VarLifetimeEnd { .. } => OpKind::Jump,
            _ => OpKind::Value,
        }
    }

    /// Block-ending jumps (lifetime markers are jump-kind but do not end a block)
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            MirOp::Jump { .. } | MirOp::JumpCond { .. } | MirOp::JumpNone { .. }
        )
    }

    /// Successor labels of a terminator, in branch order
    pub fn jump_targets(&self) -> Vec<&str> {
        match self {
            MirOp::Jump { trgtblock, .. } => vec![trgtblock],
            MirOp::JumpCond {
                trueblock,
                falseblock,
                ..
            } => vec![trueblock, falseblock],
            MirOp::JumpNone {
                noneblock,
                someblock,
                ..
            } => vec![noneblock, someblock],
            _ => Vec::new(),
        }
    }

    /// Temporary defined by an op that can be dropped when the temporary is unread
    ///
    /// Calls and anything that may abort at runtime (arithmetic, indexing,
    /// constructors with invariants, checked type projections) always stay.
    pub fn removable_target(&self) -> Option<&TempRegister> {
        match self {
            MirOp::InvokeInvariantCheckDirect { .. }
            | MirOp::InvokeInvariantCheckVirtualTarget { .. }
            | MirOp::InvokeFixedFunction { .. }
            | MirOp::InvokeVirtualFunction { .. }
            | MirOp::LoadConstTypedString { .. }
            | MirOp::PrefixOp { .. }
            | MirOp::BinOp { .. }
            | MirOp::AccessFromIndex { .. }
            | MirOp::ConstructorPrimary { .. }
            | MirOp::ConstructorPrimaryCollectionEmpty { .. }
            | MirOp::ConstructorPrimaryCollectionSingletons { .. }
            | MirOp::ConstructorPrimaryCollectionCopies { .. }
            | MirOp::ConstructorPrimaryCollectionMixed { .. } => None,
            MirOp::ProjectFromTypeTuple { istry: false, .. }
            | MirOp::ProjectFromTypeRecord { istry: false, .. }
            | MirOp::ProjectFromTypeNominal { istry: false, .. } => None,
            MirOp::RegAssign { trgt, .. }
            | MirOp::TruthyConvert { trgt, .. }
            | MirOp::PackSlice { trgt, .. }
            | MirOp::PackExtend { trgt, .. } => Some(trgt),
            _ if self.kind() == OpKind::Value => self.value_target(),
            _ => None,
        }
    }

    fn value_target(&self) -> Option<&TempRegister> {
        match self {
            MirOp::LoadConst { trgt, .. }
            | MirOp::LoadConstSafeString { trgt, .. }
            | MirOp::LoadConstTypedString { trgt, .. }
            | MirOp::AccessConstantValue { trgt, .. }
            | MirOp::LoadFieldDefaultValue { trgt, .. }
            | MirOp::AccessArgVariable { trgt, .. }
            | MirOp::AccessLocalVariable { trgt, .. }
            | MirOp::InvokeInvariantCheckDirect { trgt, .. }
            | MirOp::InvokeInvariantCheckVirtualTarget { trgt, .. }
            | MirOp::ConstructorPrimary { trgt, .. }
            | MirOp::ConstructorPrimaryCollectionEmpty { trgt, .. }
            | MirOp::ConstructorPrimaryCollectionSingletons { trgt, .. }
            | MirOp::ConstructorPrimaryCollectionCopies { trgt, .. }
            | MirOp::ConstructorPrimaryCollectionMixed { trgt, .. }
            | MirOp::ConstructorTuple { trgt, .. }
            | MirOp::ConstructorRecord { trgt, .. }
            | MirOp::ConstructorEphemeralValueList { trgt, .. }
            | MirOp::AccessFromIndex { trgt, .. }
            | MirOp::ProjectFromIndices { trgt, .. }
            | MirOp::AccessFromProperty { trgt, .. }
            | MirOp::ProjectFromProperties { trgt, .. }
            | MirOp::AccessFromField { trgt, .. }
            | MirOp::ProjectFromFields { trgt, .. }
            | MirOp::ProjectFromTypeTuple { trgt, .. }
            | MirOp::ProjectFromTypeRecord { trgt, .. }
            | MirOp::ProjectFromTypeNominal { trgt, .. }
            | MirOp::ModifyWithIndices { trgt, .. }
            | MirOp::ModifyWithProperties { trgt, .. }
            | MirOp::ModifyWithFields { trgt, .. }
            | MirOp::StructuredExtendTuple { trgt, .. }
            | MirOp::StructuredExtendRecord { trgt, .. }
            | MirOp::StructuredExtendObject { trgt, .. }
            | MirOp::LoadFromEphemeralList { trgt, .. }
            | MirOp::InvokeFixedFunction { trgt, .. }
            | MirOp::InvokeVirtualFunction { trgt, .. }
            | MirOp::PrefixOp { trgt, .. }
            | MirOp::BinOp { trgt, .. }
            | MirOp::BinEq { trgt, .. }
            | MirOp::BinLess { trgt, .. }
            | MirOp::BinCmp { trgt, .. }
            | MirOp::IsTypeOfNone { trgt, .. }
            | MirOp::IsTypeOfSome { trgt, .. }
            | MirOp::IsTypeOf { trgt, .. } => Some(trgt),
            _ => None,
        }
    }

    /// Argument-typed operands, in field order
    pub fn args(&self) -> Vec<&Argument> {
        match self {
            MirOp::InvokeInvariantCheckDirect { rcvr, .. }
            | MirOp::InvokeInvariantCheckVirtualTarget { rcvr, .. } => vec![rcvr],
            MirOp::ConstructorPrimary { args, .. }
            | MirOp::ConstructorPrimaryCollectionSingletons { args, .. }
            | MirOp::ConstructorPrimaryCollectionCopies { args, .. }
            | MirOp::ConstructorTuple { args, .. }
            | MirOp::ConstructorEphemeralValueList { args, .. }
            | MirOp::InvokeFixedFunction { args, .. }
            | MirOp::InvokeVirtualFunction { args, .. } => args.iter().collect(),
            MirOp::ConstructorPrimaryCollectionMixed { args, .. } => {
                args.iter().map(|(_, a)| a).collect()
            }
            MirOp::ConstructorRecord { args, .. } => args.iter().map(|(_, a)| a).collect(),
            MirOp::AccessFromIndex { arg, .. }
            | MirOp::ProjectFromIndices { arg, .. }
            | MirOp::AccessFromProperty { arg, .. }
            | MirOp::ProjectFromProperties { arg, .. }
            | MirOp::AccessFromField { arg, .. }
            | MirOp::ProjectFromFields { arg, .. }
            | MirOp::ProjectFromTypeTuple { arg, .. }
            | MirOp::ProjectFromTypeRecord { arg, .. }
            | MirOp::ProjectFromTypeNominal { arg, .. }
            | MirOp::PrefixOp { arg, .. }
            | MirOp::IsTypeOfNone { arg, .. }
            | MirOp::IsTypeOfSome { arg, .. }
            | MirOp::IsTypeOf { arg, .. }
            | MirOp::JumpCond { arg, .. }
            | MirOp::JumpNone { arg, .. } => vec![arg],
            MirOp::ModifyWithIndices { arg, updates, .. } => {
                std::iter::once(arg).chain(updates.iter().map(|(_, a)| a)).collect()
            }
            MirOp::ModifyWithProperties { arg, updates, .. } => {
                std::iter::once(arg).chain(updates.iter().map(|(_, a)| a)).collect()
            }
            MirOp::ModifyWithFields { arg, updates, .. } => {
                std::iter::once(arg).chain(updates.iter().map(|(_, a)| a)).collect()
            }
            MirOp::StructuredExtendTuple { arg, update, .. }
            | MirOp::StructuredExtendRecord { arg, update, .. }
            | MirOp::StructuredExtendObject { arg, update, .. } => vec![arg, update],
            MirOp::BinOp { lhs, rhs, .. }
            | MirOp::BinEq { lhs, rhs, .. }
            | MirOp::BinLess { lhs, rhs, .. }
            | MirOp::BinCmp { lhs, rhs, .. } => vec![lhs, rhs],
            MirOp::RegAssign { src, .. }
            | MirOp::TruthyConvert { src, .. }
            | MirOp::VarStore { src, .. }
            | MirOp::PackSlice { src, .. }
            | MirOp::ReturnAssign { src, .. } => vec![src],
            MirOp::PackExtend { basepack, ext, .. } => {
                std::iter::once(basepack).chain(ext.iter()).collect()
            }
            MirOp::Debug { value, .. } => value.iter().collect(),
            MirOp::LoadConst { .. }
            | MirOp::LoadConstSafeString { .. }
            | MirOp::LoadConstTypedString { .. }
            | MirOp::AccessConstantValue { .. }
            | MirOp::LoadFieldDefaultValue { .. }
            | MirOp::AccessArgVariable { .. }
            | MirOp::AccessLocalVariable { .. }
            | MirOp::ConstructorPrimaryCollectionEmpty { .. }
            | MirOp::LoadFromEphemeralList { .. }
            | MirOp::Abort { .. }
            | MirOp::Phi { .. }
            | MirOp::Jump { .. }
            | MirOp::VarLifetimeStart { .. }
            | MirOp::VarLifetimeEnd { .. } => Vec::new(),
        }
    }

    /// Mutable counterpart of [`MirOp::args`]
    pub fn args_mut(&mut self) -> Vec<&mut Argument> {
        match self {
            MirOp::InvokeInvariantCheckDirect { rcvr, .. }
            | MirOp::InvokeInvariantCheckVirtualTarget { rcvr, .. } => vec![rcvr],
            MirOp::ConstructorPrimary { args, .. }
            | MirOp::ConstructorPrimaryCollectionSingletons { args, .. }
            | MirOp::ConstructorPrimaryCollectionCopies { args, .. }
            | MirOp::ConstructorTuple { args, .. }
            | MirOp::ConstructorEphemeralValueList { args, .. }
            | MirOp::InvokeFixedFunction { args, .. }
            | MirOp::InvokeVirtualFunction { args, .. } => args.iter_mut().collect(),
            MirOp::ConstructorPrimaryCollectionMixed { args, .. } => {
                args.iter_mut().map(|(_, a)| a).collect()
            }
            MirOp::ConstructorRecord { args, .. } => args.iter_mut().map(|(_, a)| a).collect(),
            MirOp::AccessFromIndex { arg, .. }
            | MirOp::ProjectFromIndices { arg, .. }
            | MirOp::AccessFromProperty { arg, .. }
            | MirOp::ProjectFromProperties { arg, .. }
            | MirOp::AccessFromField { arg, .. }
            | MirOp::ProjectFromFields { arg, .. }
            | MirOp::ProjectFromTypeTuple { arg, .. }
            | MirOp::ProjectFromTypeRecord { arg, .. }
            | MirOp::ProjectFromTypeNominal { arg, .. }
            | MirOp::PrefixOp { arg, .. }
            | MirOp::IsTypeOfNone { arg, .. }
            | MirOp::IsTypeOfSome { arg, .. }
            | MirOp::IsTypeOf { arg, .. }
            | MirOp::JumpCond { arg, .. }
            | MirOp::JumpNone { arg, .. } => vec![arg],
            MirOp::ModifyWithIndices { arg, updates, .. } => {
                std::iter::once(arg).chain(updates.iter_mut().map(|(_, a)| a)).collect()
            }
            MirOp::ModifyWithProperties { arg, updates, .. } => {
                std::iter::once(arg).chain(updates.iter_mut().map(|(_, a)| a)).collect()
            }
            MirOp::ModifyWithFields { arg, updates, .. } => {
                std::iter::once(arg).chain(updates.iter_mut().map(|(_, a)| a)).collect()
            }
            MirOp::StructuredExtendTuple { arg, update, .. }
            | MirOp::StructuredExtendRecord { arg, update, .. }
            | MirOp::StructuredExtendObject { arg, update, .. } => vec![arg, update],
            MirOp::BinOp { lhs, rhs, .. }
            | MirOp::BinEq { lhs, rhs, .. }
            | MirOp::BinLess { lhs, rhs, .. }
            | MirOp::BinCmp { lhs, rhs, .. } => vec![lhs, rhs],
            MirOp::RegAssign { src, .. }
            | MirOp::TruthyConvert { src, .. }
            | MirOp::VarStore { src, .. }
            | MirOp::PackSlice { src, .. }
            | MirOp::ReturnAssign { src, .. } => vec![src],
            MirOp::PackExtend { basepack, ext, .. } => {
                std::iter::once(basepack).chain(ext.iter_mut()).collect()
            }
            MirOp::Debug { value, .. } => value.iter_mut().collect(),
            MirOp::LoadConst { .. }
            | MirOp::LoadConstSafeString { .. }
            | MirOp::LoadConstTypedString { .. }
            | MirOp::AccessConstantValue { .. }
            | MirOp::LoadFieldDefaultValue { .. }
            | MirOp::AccessArgVariable { .. }
            | MirOp::AccessLocalVariable { .. }
            | MirOp::ConstructorPrimaryCollectionEmpty { .. }
            | MirOp::LoadFromEphemeralList { .. }
            | MirOp::Abort { .. }
            | MirOp::Phi { .. }
            | MirOp::Jump { .. }
            | MirOp::VarLifetimeStart { .. }
            | MirOp::VarLifetimeEnd { .. } => Vec::new(),
        }
    }

    /// Register-typed use positions (never replaceable by a constant)
    pub fn use_slots_mut(&mut self) -> Vec<RegisterSlot<'_>> {
        match self {
            MirOp::AccessArgVariable { name, .. } | MirOp::AccessLocalVariable { name, .. } => {
                vec![RegisterSlot::Var(name)]
            }
            MirOp::LoadFromEphemeralList { arg, .. } => vec![RegisterSlot::of(arg)],
            MirOp::Phi { src, .. } => src.values_mut().map(RegisterSlot::of).collect(),
            _ => Vec::new(),
        }
    }

    /// Every register the op writes
    pub fn def_slots_mut(&mut self) -> Vec<RegisterSlot<'_>> {
        match self {
            MirOp::VarStore { name, .. } | MirOp::ReturnAssign { name, .. } => {
                vec![RegisterSlot::Var(name)]
            }
            MirOp::Phi { trgt, .. } => vec![RegisterSlot::of(trgt)],
            MirOp::RegAssign { trgt, .. }
            | MirOp::TruthyConvert { trgt, .. }
            | MirOp::PackSlice { trgt, .. }
            | MirOp::PackExtend { trgt, .. } => vec![RegisterSlot::Temp(trgt)],
            _ => match self.value_target_mut() {
                Some(trgt) => vec![RegisterSlot::Temp(trgt)],
                None => Vec::new(),
            },
        }
    }

    fn value_target_mut(&mut self) -> Option<&mut TempRegister> {
        if self.kind() != OpKind::Value {
            return None;
        }
        match self {
            MirOp::LoadConst { trgt, .. }
            | MirOp::LoadConstSafeString { trgt, .. }
            | MirOp::LoadConstTypedString { trgt, .. }
            | MirOp::AccessConstantValue { trgt, .. }
            | MirOp::LoadFieldDefaultValue { trgt, .. }
            | MirOp::AccessArgVariable { trgt, .. }
            | MirOp::AccessLocalVariable { trgt, .. }
            | MirOp::InvokeInvariantCheckDirect { trgt, .. }
            | MirOp::InvokeInvariantCheckVirtualTarget { trgt, .. }
            | MirOp::ConstructorPrimary { trgt, .. }
            | MirOp::ConstructorPrimaryCollectionEmpty { trgt, .. }
            | MirOp::ConstructorPrimaryCollectionSingletons { trgt, .. }
            | MirOp::ConstructorPrimaryCollectionCopies { trgt, .. }
            | MirOp::ConstructorPrimaryCollectionMixed { trgt, .. }
            | MirOp::ConstructorTuple { trgt, .. }
            | MirOp::ConstructorRecord { trgt, .. }
            | MirOp::ConstructorEphemeralValueList { trgt, .. }
            | MirOp::AccessFromIndex { trgt, .. }
            | MirOp::ProjectFromIndices { trgt, .. }
            | MirOp::AccessFromProperty { trgt, .. }
            | MirOp::ProjectFromProperties { trgt, .. }
            | MirOp::AccessFromField { trgt, .. }
            | MirOp::ProjectFromFields { trgt, .. }
            | MirOp::ProjectFromTypeTuple { trgt, .. }
            | MirOp::ProjectFromTypeRecord { trgt, .. }
            | MirOp::ProjectFromTypeNominal { trgt, .. }
            | MirOp::ModifyWithIndices { trgt, .. }
            | MirOp::ModifyWithProperties { trgt, .. }
            | MirOp::ModifyWithFields { trgt, .. }
            | MirOp::StructuredExtendTuple { trgt, .. }
            | MirOp::StructuredExtendRecord { trgt, .. }
            | MirOp::StructuredExtendObject { trgt, .. }
            | MirOp::LoadFromEphemeralList { trgt, .. }
            | MirOp::InvokeFixedFunction { trgt, .. }
            | MirOp::InvokeVirtualFunction { trgt, .. }
            | MirOp::PrefixOp { trgt, .. }
            | MirOp::BinOp { trgt, .. }
            | MirOp::BinEq { trgt, .. }
            | MirOp::BinLess { trgt, .. }
            | MirOp::BinCmp { trgt, .. }
            | MirOp::IsTypeOfNone { trgt, .. }
            | MirOp::IsTypeOfSome { trgt, .. }
            | MirOp::IsTypeOf { trgt, .. } => Some(trgt),
            _ => None,
        }
    }

    /// Registers read by this op
    pub fn used_vars(&self) -> Vec<Register> {
        let mut used: Vec<Register> = self
            .args()
            .into_iter()
            .filter_map(|a| a.as_register().cloned())
            .collect();
        match self {
            MirOp::AccessArgVariable { name, .. } | MirOp::AccessLocalVariable { name, .. } => {
                used.push(Register::Var(name.clone()));
            }
            MirOp::LoadFromEphemeralList { arg, .. } => used.push(arg.clone()),
            MirOp::Phi { src, .. } => used.extend(src.values().cloned()),
            _ => {}
        }
        used
    }

    /// Registers written by this op
    pub fn mod_vars(&self) -> Vec<Register> {
        match self {
            MirOp::VarStore { name, .. } | MirOp::ReturnAssign { name, .. } => {
                vec![Register::Var(name.clone())]
            }
            MirOp::Phi { trgt, .. } => vec![trgt.clone()],
            MirOp::RegAssign { trgt, .. }
            | MirOp::TruthyConvert { trgt, .. }
            | MirOp::PackSlice { trgt, .. }
            | MirOp::PackExtend { trgt, .. } => vec![Register::Temp(trgt.clone())],
            _ => self
                .value_target()
                .map(|t| vec![Register::Temp(t.clone())])
                .unwrap_or_default(),
        }
    }
}

// ============================================================================
// Text form
// ============================================================================

impl fmt::Display for TempRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name_id)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name_id)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name_id())
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::None => write!(f, "none"),
            Constant::True => write!(f, "true"),
            Constant::False => write!(f, "false"),
            Constant::Int(v) => write!(f, "{}", v),
            Constant::BigInt(v) => write!(f, "{}n", v),
            Constant::Float(v) => write!(f, "{}f", v),
            Constant::String(v) => write!(f, "{:?}", v),
            Constant::Regex(v) => write!(f, "/{}/", v),
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Register(r) => write!(f, "{}", r),
            Argument::Constant(c) => write!(f, "{}", c),
        }
    }
}

fn join<T: fmt::Display>(items: impl IntoIterator<Item = T>) -> String {
    items
        .into_iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_pairs<K: fmt::Display>(items: &[(K, Argument)]) -> String {
    join(items.iter().map(|(k, a)| format!("{}={}", k, a)))
}

impl fmt::Display for MirOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirOp::LoadConst { src, trgt, .. } => write!(f, "{} = {}", trgt, src),
            MirOp::LoadConstSafeString { ivalue, tkey, trgt, .. } => {
                write!(f, "{} = {:?}#{}", trgt, ivalue, tkey)
            }
            MirOp::LoadConstTypedString { ivalue, tkey, trgt, .. } => {
                write!(f, "{} = {:?}#{}", trgt, ivalue, tkey)
            }
            MirOp::AccessConstantValue { ckey, trgt, .. } => write!(f, "{} = {}", trgt, ckey),
            MirOp::LoadFieldDefaultValue { fkey, trgt, .. } => {
                write!(f, "{} = default({})", trgt, fkey)
            }
            MirOp::AccessArgVariable { name, trgt, .. }
            | MirOp::AccessLocalVariable { name, trgt, .. } => write!(f, "{} = {}", trgt, name),
            MirOp::InvokeInvariantCheckDirect { ikey, rcvr, trgt, .. } => {
                write!(f, "{} = {}({})", trgt, ikey, rcvr)
            }
            MirOp::InvokeInvariantCheckVirtualTarget { rcvr, trgt, .. } => {
                write!(f, "{} = $invariant_check({})", trgt, rcvr)
            }
            MirOp::ConstructorPrimary { tkey, args, trgt, .. } => {
                write!(f, "{} = {}@({})", trgt, tkey, join(args))
            }
            MirOp::ConstructorPrimaryCollectionEmpty { tkey, trgt, .. } => {
                write!(f, "{} = {}{{}}", trgt, tkey)
            }
            MirOp::ConstructorPrimaryCollectionSingletons { tkey, args, trgt, .. } => {
                write!(f, "{} = {}{{{}}}", trgt, tkey, join(args))
            }
            MirOp::ConstructorPrimaryCollectionCopies { tkey, args, trgt, .. } => {
                let items = join(args.iter().map(|a| format!("expand({})", a)));
                write!(f, "{} = {}{{{}}}", trgt, tkey, items)
            }
            MirOp::ConstructorPrimaryCollectionMixed { tkey, args, trgt, .. } => {
                let items = join(args.iter().map(|(expand, a)| {
                    if *expand { format!("expand({})", a) } else { a.to_string() }
                }));
                write!(f, "{} = {}{{{}}}", trgt, tkey, items)
            }
            MirOp::ConstructorTuple { args, trgt, .. } => write!(f, "{} = [{}]", trgt, join(args)),
            MirOp::ConstructorRecord { args, trgt, .. } => {
                write!(f, "{} = {{{}}}", trgt, join_pairs(args))
            }
            MirOp::ConstructorEphemeralValueList { args, trgt, .. } => {
                write!(f, "{} = (|{}|)", trgt, join(args))
            }
            MirOp::AccessFromIndex { arg, idx, trgt, .. } => write!(f, "{} = {}.{}", trgt, arg, idx),
            MirOp::ProjectFromIndices { arg, indices, trgt, .. } => {
                write!(f, "{} = {}@[{}]", trgt, arg, join(indices))
            }
            MirOp::AccessFromProperty { arg, property, trgt, .. } => {
                write!(f, "{} = {}.{}", trgt, arg, property)
            }
            MirOp::ProjectFromProperties { arg, properties, trgt, .. } => {
                write!(f, "{} = {}{{{}}}", trgt, arg, properties.join(", "))
            }
            MirOp::AccessFromField { arg, field, trgt, .. } => {
                write!(f, "{} = {}.{}", trgt, arg, field)
            }
            MirOp::ProjectFromFields { arg, fields, trgt, .. } => {
                write!(f, "{} = {}{{{}}}", trgt, arg, fields.join(", "))
            }
            MirOp::ProjectFromTypeTuple { arg, istry, ptype, trgt, .. }
            | MirOp::ProjectFromTypeRecord { arg, istry, ptype, trgt, .. }
            | MirOp::ProjectFromTypeNominal { arg, istry, ptype, trgt, .. } => {
                write!(f, "{} = {}#{}{}", trgt, arg, if *istry { "?" } else { "" }, ptype)
            }
            MirOp::ModifyWithIndices { arg, updates, trgt, .. } => {
                write!(f, "{} = {}<~[{}]", trgt, arg, join_pairs(updates))
            }
            MirOp::ModifyWithProperties { arg, updates, trgt, .. } => {
                write!(f, "{} = {}<~{{{}}}", trgt, arg, join_pairs(updates))
            }
            MirOp::ModifyWithFields { arg, updates, trgt, .. } => {
                write!(f, "{} = {}<~{{{}}}", trgt, arg, join_pairs(updates))
            }
            MirOp::StructuredExtendTuple { arg, update, trgt, .. }
            | MirOp::StructuredExtendRecord { arg, update, trgt, .. }
            | MirOp::StructuredExtendObject { arg, update, trgt, .. } => {
                write!(f, "{} = {} <+ {}", trgt, arg, update)
            }
            MirOp::LoadFromEphemeralList { arg, idx, trgt, .. } => {
                write!(f, "{} = {}({})", trgt, arg, idx)
            }
            MirOp::InvokeFixedFunction { mkey, args, trgt, .. } => {
                write!(f, "{} = {}::({})", trgt, mkey, join(args))
            }
            MirOp::InvokeVirtualFunction { vresolve, args, trgt, .. } => match args.split_first() {
                Some((rcvr, rest)) => write!(f, "{} = {}.{}({})", trgt, rcvr, vresolve, join(rest)),
                None => write!(f, "{} = ?.{}()", trgt, vresolve),
            },
            MirOp::PrefixOp { op, arg, trgt, .. } => write!(f, "{} = {}{}", trgt, op, arg),
            MirOp::BinOp { lhs, op, rhs, trgt, .. }
            | MirOp::BinEq { lhs, op, rhs, trgt, .. }
            | MirOp::BinCmp { lhs, op, rhs, trgt, .. } => {
                write!(f, "{} = {} {} {}", trgt, lhs, op, rhs)
            }
            MirOp::BinLess { lhs, rhs, trgt, .. } => write!(f, "{} = {} < {}", trgt, lhs, rhs),
            MirOp::IsTypeOfNone { arg, trgt, .. } => write!(f, "{} = $isNoneType({})", trgt, arg),
            MirOp::IsTypeOfSome { arg, trgt, .. } => write!(f, "{} = $isSomeType({})", trgt, arg),
            MirOp::IsTypeOf { arg, oftype, trgt, .. } => {
                write!(f, "{} = $isTypeOf({}, {})", trgt, arg, oftype)
            }
            MirOp::RegAssign { src, trgt, .. } => write!(f, "{} = {}", trgt, src),
            MirOp::TruthyConvert { src, trgt, .. } => write!(f, "{} = $truthy({})", trgt, src),
            MirOp::VarStore { src, name, .. } => write!(f, "{} = {}", name, src),
            MirOp::PackSlice { src, sltype, trgt, .. } => {
                write!(f, "{} = {}@(|{}|)", trgt, sltype, src)
            }
            MirOp::PackExtend { basepack, ext, sltype, trgt, .. } => {
                write!(f, "{} = {}@(|{}, {}|)", trgt, sltype, basepack, join(ext))
            }
            MirOp::ReturnAssign { src, name, .. } => write!(f, "{} = {}", name, src),
            MirOp::Abort { info, .. } => write!(f, "abort -- {}", info),
            MirOp::Debug { value, .. } => match value {
                Some(v) => write!(f, "_debug {}", v),
                None => write!(f, "_debug break"),
            },
            MirOp::Phi { src, trgt, .. } => {
                let phis = join(src.iter().map(|(label, r)| format!("{} -- {}", r, label)));
                write!(f, "{} = ({})", trgt, phis)
            }
            MirOp::Jump { trgtblock, .. } => write!(f, "jump {}", trgtblock),
            MirOp::JumpCond {
                arg,
                trueblock,
                falseblock,
                ..
            } => write!(f, "cjump {} {} {}", arg, trueblock, falseblock),
            MirOp::JumpNone {
                arg,
                noneblock,
                someblock,
                ..
            } => write!(f, "njump {} {} {}", arg, noneblock, someblock),
            MirOp::VarLifetimeStart { name, .. } => write!(f, "v-begin {}", name),
            MirOp::VarLifetimeEnd { name, .. } => write!(f, "v-end {}", name),
        }
    }
}

//! Integration tests for the MIR driver
//!
//! A scripted checker stands in for the front end: every declaration maps to
//! a list of steps that register instantiations and emit a small body, so the
//! tests exercise the full pipeline:
//! - Worklist seeding from entry points and core types
//! - Generic instantiation per distinct binding
//! - Virtual dispatch resolution across fixpoint rounds
//! - Inheritance closure and subtype table
//! - Rejection on checker errors and hard failures

use std::collections::{BTreeMap, HashMap};

use mirgen::ast::{
    BindMap, ConceptEntry, ConstDecl, ConstDeclId, InvokeDecl, InvokeDeclId, Program, ResolvedAtom,
    ResolvedFunctionType, ResolvedType, SourceInfo, TypeDecl, TypeDeclId, TypeDeclKind,
};
use mirgen::error::Diagnostic;
use mirgen::mir::{
    format_body, verify_body, Argument, Constant, MirAssembly, MirConceptTypeDecl, MirConstantDecl,
    MirEntityTypeDecl, MirFunctionParameter, MirInvokeBodyDecl, MirType, RefReturn, EXIT_BLOCK,
    RETURN_ASSIGN_BLOCK,
};
use mirgen::mono::{
    Checker, MemberMethodLookup, MirEmitter, PendingConst, PendingGlobal, PendingInvoke,
    PendingLambda, PendingMethod, PendingStatic, PendingType,
};
use mirgen::{generate_masm, EmitterConfig, MirError, Result};

// ============================================
// Test program
// ============================================

struct World {
    program: Program,
    int: TypeDeclId,
    string: TypeDeclId,
    any: TypeDeclId,
    shape: TypeDeclId,
    polygon: TypeDeclId,
    circle: TypeDeclId,
    square: TypeDeclId,
    point: TypeDeclId,
    id_fn: InvokeDeclId,
    main: InvokeDeclId,
    circle_area: InvokeDeclId,
    make: InvokeDeclId,
    lambda: InvokeDeclId,
    limit: ConstDeclId,
    pi: ConstDeclId,
}

fn world() -> World {
    let mut p = Program::new();
    let any = p.add_type(TypeDecl::concept("NSCore", "Any"));
    let int = p.add_type(TypeDecl::entity("NSCore", "Int").with_provides([any]));
    let string = p.add_type(TypeDecl::entity("NSCore", "String").with_provides([any]));
    p.add_type(TypeDecl::entity("NSCore", "Bool").with_provides([any]));
    p.add_type(TypeDecl::entity("NSCore", "None").with_provides([any]));

    let shape = p.add_type(TypeDecl::concept("NSMain", "Shape").with_provides([any]));
    let circle = p.add_type(TypeDecl::entity("NSMain", "Circle").with_provides([shape]));
    let square = p.add_type(TypeDecl::entity("NSMain", "Square").with_provides([shape]));
    let point = p.add_type(TypeDecl::entity("NSMain", "Point").with_provides([any]));
    let polygon = p.add_type(TypeDecl::concept("NSMain", "Polygon").with_provides([shape]));

    let circle_decl = p.type_decl(circle).clone();
    let square_decl = p.type_decl(square).clone();
    let point_decl = p.type_decl(point).clone();
    let polygon_decl = p.type_decl(polygon).clone();

    let circle_area = p.add_invoke(InvokeDecl::method(&circle_decl, "area").at("main.bsq", SourceInfo::new(12, 5, 240, 30)));
    p.add_invoke(InvokeDecl::method(&square_decl, "area").at("main.bsq", SourceInfo::new(16, 5, 320, 30)));
    p.add_invoke(InvokeDecl::method(&point_decl, "area").at("main.bsq", SourceInfo::new(20, 5, 400, 30)));
    p.add_invoke(InvokeDecl::method(&polygon_decl, "area").at("main.bsq", SourceInfo::new(24, 5, 480, 30)));
    let make = p.add_invoke(InvokeDecl::static_function(&circle_decl, "make").at("main.bsq", SourceInfo::new(13, 5, 280, 20)));

    let id_fn = p.add_invoke(
        InvokeDecl::function("NSMain", "id")
            .with_terms(["T"])
            .with_params(["x"])
            .at("main.bsq", SourceInfo::new(2, 1, 10, 30)),
    );
    let main = p.add_invoke(
        InvokeDecl::function("NSMain", "main")
            .with_attribute("entrypoint")
            .at("main.bsq", SourceInfo::new(5, 1, 60, 80)),
    );
    let lambda = p.add_invoke(InvokeDecl::lambda("NSMain", "main.bsq", SourceInfo::new(7, 3, 120, 10)));

    let limit = p.add_const(ConstDecl::global("NSMain", "limit"));
    let pi = p.add_const(ConstDecl::member(&circle_decl, "pi"));

    World {
        program: p,
        int,
        string,
        any,
        shape,
        polygon,
        circle,
        square,
        point,
        id_fn,
        main,
        circle_area,
        make,
        lambda,
        limit,
        pi,
    }
}

impl World {
    fn ty(&self, id: TypeDeclId) -> ResolvedType {
        ResolvedType::nominal(self.program.type_decl(id), BindMap::new())
    }

    fn t_is(&self, id: TypeDeclId) -> BindMap {
        BindMap::from([("T".to_string(), self.ty(id))])
    }
}

// ============================================
// Scripted checker
// ============================================

#[derive(Clone)]
enum Step {
    Call(InvokeDeclId, BindMap),
    CallVirtual(ResolvedType, &'static str),
    CallStatic(TypeDeclId, InvokeDeclId),
    Construct(ResolvedType),
    Lambda(InvokeDeclId),
    Global(ConstDeclId),
    Const(TypeDeclId, ConstDeclId),
    Report(&'static str),
    Fail(&'static str),
}

struct ScriptedChecker<'p> {
    program: &'p Program,
    scripts: HashMap<InvokeDeclId, Vec<Step>>,
    errors: Vec<Diagnostic>,
}

impl<'p> ScriptedChecker<'p> {
    fn new(program: &'p Program, scripts: Vec<(InvokeDeclId, Vec<Step>)>) -> Self {
        Self {
            program,
            scripts: scripts.into_iter().collect(),
            errors: Vec::new(),
        }
    }

    fn core(&self, name: &str) -> ResolvedType {
        let id = self.program.lookup_type("NSCore", name).expect("core type");
        ResolvedType::nominal(self.program.type_decl(id), BindMap::new())
    }

    fn emit_invoke(
        &mut self,
        em: &mut MirEmitter<'_>,
        key: &str,
        decl_id: InvokeDeclId,
        binds: &BindMap,
    ) -> Result<()> {
        let program = self.program;
        let decl = program.invoke_decl(decl_id);
        let sinfo = decl.sinfo;

        let int_ty = em.register_resolved_type_reference(&self.core("Int"));
        let param_ty = match binds.get("T") {
            Some(t) => em.register_resolved_type_reference(t),
            None => int_ty.clone(),
        };

        let mut last: Option<Argument> = None;
        for step in self.scripts.get(&decl_id).cloned().unwrap_or_default() {
            match step {
                Step::Call(callee, cbinds) => {
                    let result = match cbinds.get("T") {
                        Some(t) => em.register_resolved_type_reference(t),
                        None => int_ty.clone(),
                    };
                    let ikey = em.register_function_call(callee, cbinds, Vec::new());
                    let arg = em.body_emitter.generate_tmp_register();
                    em.body_emitter.emit_load_const_int(sinfo, "1", arg.clone());
                    let trgt = em.body_emitter.generate_tmp_register();
                    em.body_emitter
                        .emit_invoke_fixed_function(sinfo, ikey, vec![arg.into()], &RefReturn::plain(result), trgt.clone());
                    last = Some(trgt.into());
                }
                Step::CallVirtual(receiver, name) => {
                    let rty = em.register_resolved_type_reference(&receiver);
                    let vkey = em.register_virtual_method_call(&receiver, name, BindMap::new(), Vec::new());
                    let trgt = em.body_emitter.generate_tmp_register();
                    em.body_emitter.emit_invoke_virtual_function(
                        sinfo,
                        vkey,
                        rty.trkey,
                        vec![Constant::None.into()],
                        int_ty.trkey.clone(),
                        trgt.clone(),
                    );
                    last = Some(trgt.into());
                }
                Step::CallStatic(containing, callee) => {
                    let ikey = em.register_static_call(containing, BindMap::new(), callee, BindMap::new(), Vec::new());
                    let trgt = em.body_emitter.generate_tmp_register();
                    em.body_emitter
                        .emit_invoke_fixed_function(sinfo, ikey, Vec::new(), &RefReturn::plain(int_ty.clone()), trgt.clone());
                    last = Some(trgt.into());
                }
                Step::Construct(ty) => {
                    em.register_resolved_type_reference(&ty);
                }
                Step::Lambda(code) => {
                    let ftype = ResolvedFunctionType {
                        params: Vec::new(),
                        result: self.core("Int"),
                    };
                    em.register_pcode(code, ftype, binds.clone());
                }
                Step::Global(c) => {
                    let gkey = em.register_pending_global_processing(c);
                    let trgt = em.body_emitter.generate_tmp_register();
                    em.body_emitter.emit_access_constant(sinfo, gkey, trgt.clone());
                    last = Some(trgt.into());
                }
                Step::Const(containing, c) => {
                    let ckey = em.register_pending_const_processing(containing, BindMap::new(), c);
                    let trgt = em.body_emitter.generate_tmp_register();
                    em.body_emitter.emit_access_constant(sinfo, ckey, trgt.clone());
                    last = Some(trgt.into());
                }
                Step::Report(msg) => self.errors.push(Diagnostic::unlocated(msg)),
                Step::Fail(msg) => return Err(MirError::hard_failure(key, msg)),
            }
        }

        let ret = match (last, decl.params.first()) {
            (Some(arg), _) => arg,
            (None, Some(p)) => {
                let trgt = em.body_emitter.generate_tmp_register();
                em.body_emitter.emit_access_arg_variable(sinfo, p, trgt.clone());
                trgt.into()
            }
            (None, None) => Constant::Int("0".into()).into(),
        };

        em.body_emitter.emit_return_assign(sinfo, ret);
        em.body_emitter.emit_direct_jump(sinfo, RETURN_ASSIGN_BLOCK);
        em.body_emitter.set_active_block(RETURN_ASSIGN_BLOCK);
        em.body_emitter.emit_direct_jump(sinfo, EXIT_BLOCK);

        let params: BTreeMap<String, MirType> = decl
            .params
            .iter()
            .map(|p| (p.clone(), param_ty.clone()))
            .collect();
        let body = em.body_emitter.get_body(&decl.src_file, sinfo, &params);

        let result_type = if decl.params.is_empty() { int_ty.trkey } else { param_ty.trkey.clone() };
        em.masm.invoke_decls.insert(
            key.to_string(),
            MirInvokeBodyDecl {
                key: key.to_string(),
                ns: decl.ns.clone(),
                name: decl.name.clone(),
                attributes: decl.attributes.clone(),
                src_file: decl.src_file.clone(),
                sinfo,
                params: decl
                    .params
                    .iter()
                    .map(|p| MirFunctionParameter::new(p.as_str(), param_ty.trkey.clone()))
                    .collect(),
                result_type,
                body,
            },
        );
        Ok(())
    }

    fn emit_constant(&mut self, em: &mut MirEmitter<'_>, ckey: &str, src_file: &str, sinfo: SourceInfo) {
        let declared = em.register_resolved_type_reference(&self.core("Int"));
        em.masm.constant_decls.insert(
            ckey.to_string(),
            MirConstantDecl {
                ckey: ckey.to_string(),
                src_file: src_file.to_string(),
                sinfo,
                declared_type: declared.trkey,
                value: format!("{}$init", ckey),
            },
        );
    }
}

impl Checker for ScriptedChecker<'_> {
    fn process_oo_type(&mut self, em: &mut MirEmitter<'_>, item: &PendingType) -> Result<()> {
        let decl = self.program.type_decl(item.decl);
        let provides: Vec<String> = decl
            .provides
            .iter()
            .map(|p| em.register_type_instantiation(*p, BindMap::new()))
            .collect();
        let terms = item
            .binds
            .iter()
            .map(|(k, v)| (k.clone(), em.register_resolved_type_reference(v).trkey))
            .collect();

        match decl.kind {
            TypeDeclKind::Entity => {
                em.masm.entity_decls.insert(
                    item.tkey.clone(),
                    MirEntityTypeDecl {
                        tkey: item.tkey.clone(),
                        ns: decl.ns.clone(),
                        name: decl.name.clone(),
                        src_file: decl.src_file.clone(),
                        sinfo: decl.sinfo,
                        attributes: decl.attributes.clone(),
                        terms,
                        provides,
                        fields: Vec::new(),
                        vcall_map: BTreeMap::new(),
                    },
                );
            }
            TypeDeclKind::Concept => {
                em.masm.concept_decls.insert(
                    item.tkey.clone(),
                    MirConceptTypeDecl {
                        tkey: item.tkey.clone(),
                        ns: decl.ns.clone(),
                        name: decl.name.clone(),
                        src_file: decl.src_file.clone(),
                        sinfo: decl.sinfo,
                        attributes: decl.attributes.clone(),
                        terms,
                        provides,
                        vcall_map: BTreeMap::new(),
                    },
                );
            }
        }
        Ok(())
    }

    fn process_global(&mut self, em: &mut MirEmitter<'_>, item: &PendingGlobal) -> Result<()> {
        let decl = self.program.const_decl(item.decl);
        self.emit_constant(em, &item.gkey, &decl.src_file, decl.sinfo);
        Ok(())
    }

    fn process_const(&mut self, em: &mut MirEmitter<'_>, item: &PendingConst) -> Result<()> {
        let decl = self.program.const_decl(item.decl);
        self.emit_constant(em, &item.ckey, &decl.src_file, decl.sinfo);
        Ok(())
    }

    fn process_namespace_function(&mut self, em: &mut MirEmitter<'_>, item: &PendingInvoke) -> Result<()> {
        self.emit_invoke(em, &item.ikey, item.decl, &item.binds)
    }

    fn process_lambda_function(&mut self, em: &mut MirEmitter<'_>, item: &PendingLambda) -> Result<()> {
        self.emit_invoke(em, &item.lkey, item.decl, &item.binds)
    }

    fn process_static_function(&mut self, em: &mut MirEmitter<'_>, item: &PendingStatic) -> Result<()> {
        self.emit_invoke(em, &item.ikey, item.decl, &item.binds)
    }

    fn process_method_function(&mut self, em: &mut MirEmitter<'_>, item: &PendingMethod) -> Result<()> {
        self.emit_invoke(em, &item.ikey, item.decl, &item.binds)
    }

    fn is_subtype(&self, t1: &ResolvedType, t2: &ResolvedType) -> bool {
        let Some((sub, _)) = nominal_of(t1) else {
            return false;
        };
        t2.options().iter().any(|opt| match opt {
            ResolvedAtom::Entity(_) => opt.id() == t1.id(),
            ResolvedAtom::Concept(c) => c
                .entries
                .iter()
                .all(|e| self.program.provides_transitively(sub, e.decl)),
            _ => false,
        })
    }

    fn try_get_member_method_unique(&self, ty: &ResolvedType, name: &str) -> Option<MemberMethodLookup> {
        let (start, binds) = nominal_of(ty)?;
        let mut stack = vec![start];
        while let Some(cur) = stack.pop() {
            if let Some(m) = self.program.member_methods(cur, name).next() {
                let cbinds = if cur == start { binds.clone() } else { BindMap::new() };
                return Some(MemberMethodLookup {
                    containing: cur,
                    cbinds,
                    decl: m.id,
                });
            }
            stack.extend(self.program.type_decl(cur).provides.iter().copied());
        }
        None
    }

    fn error_list(&self) -> &[Diagnostic] {
        &self.errors
    }
}

/// Declaration and bindings of an entity or single-concept type
fn nominal_of(ty: &ResolvedType) -> Option<(TypeDeclId, &BindMap)> {
    match ty.as_single()? {
        ResolvedAtom::Entity(e) => Some((e.decl, &e.binds)),
        ResolvedAtom::Concept(c) => match c.entries.as_slice() {
            [only] => Some((only.decl, &only.binds)),
            _ => None,
        },
        _ => None,
    }
}

fn run(w: &World, scripts: Vec<(InvokeDeclId, Vec<Step>)>, config: &EmitterConfig) -> Result<MirAssembly> {
    let mut checker = ScriptedChecker::new(&w.program, scripts);
    generate_masm(&w.program, &mut checker, config)
}

fn invoke_keys(masm: &MirAssembly) -> Vec<&str> {
    masm.invoke_decls.keys().map(String::as_str).collect()
}

// ============================================
// Generic instantiation
// ============================================

fn generic_scripts(w: &World) -> Vec<(InvokeDeclId, Vec<Step>)> {
    vec![(
        w.main,
        vec![
            Step::Call(w.id_fn, w.t_is(w.int)),
            Step::Call(w.id_fn, w.t_is(w.string)),
            Step::Call(w.id_fn, w.t_is(w.int)),
        ],
    )]
}

#[test]
fn test_generic_function_instantiated_once_per_binding() {
    let w = world();
    let masm = run(&w, generic_scripts(&w), &EmitterConfig::default()).unwrap();

    assert_eq!(masm.entry_points, vec!["NSMain::main".to_string()]);
    assert_eq!(
        invoke_keys(&masm),
        vec!["NSMain::id<T=NSCore::Int>", "NSMain::id<T=NSCore::String>", "NSMain::main"]
    );

    let id_str = &masm.invoke_decls["NSMain::id<T=NSCore::String>"];
    assert_eq!(id_str.params, vec![MirFunctionParameter::new("x", "NSCore::String")]);
    assert_eq!(id_str.result_type, "NSCore::String");
}

#[test]
fn test_core_types_are_registered_up_front() {
    let w = world();
    let masm = run(&w, Vec::new(), &EmitterConfig::default()).unwrap();

    for key in ["NSCore::Int", "NSCore::String", "NSCore::Bool", "NSCore::None"] {
        assert!(masm.entity_decls.contains_key(key), "missing {}", key);
        assert!(masm.type_map.contains_key(key), "missing {}", key);
    }
    assert!(masm.concept_decls.contains_key("NSCore::Any"));
    // Declared nowhere, so skipped rather than fatal
    assert!(!masm.type_map.contains_key("NSCore::Regex"));
}

#[test]
fn test_main_body_snapshot() {
    let w = world();
    let masm = run(&w, generic_scripts(&w), &EmitterConfig::default()).unwrap();
    let body = masm.body("NSMain::main").unwrap();

    insta::assert_snapshot!(format_body(body), @r"
body main.bsq {
entry:
  #tmp_0 = 1
  #tmp_1 = NSMain::id<T=NSCore::Int>::(#tmp_0)
  #tmp_2 = 1
  #tmp_3 = NSMain::id<T=NSCore::String>::(#tmp_2)
  #tmp_4 = 1
  #tmp_5 = NSMain::id<T=NSCore::Int>::(#tmp_4)
  $__ir_ret__ = #tmp_5
  jump returnassign
returnassign:
  jump exit
exit:
}
");
}

#[test]
fn test_var_types_inferred_after_closure() {
    let w = world();
    let masm = run(&w, generic_scripts(&w), &EmitterConfig::default()).unwrap();

    let vtypes = masm.body("NSMain::main").unwrap().vtypes.as_ref().unwrap();
    assert_eq!(vtypes["#tmp_0"], "NSCore::Int");
    assert_eq!(vtypes["#tmp_3"], "NSCore::String");

    let id_int = masm.body("NSMain::id<T=NSCore::Int>").unwrap();
    assert_eq!(id_int.vtypes.as_ref().unwrap()["x"], "NSCore::Int");

    let off = EmitterConfig::default().infer_var_types(false);
    let masm = run(&w, generic_scripts(&w), &off).unwrap();
    assert!(masm.body("NSMain::main").unwrap().vtypes.is_none());
}

// ============================================
// Virtual dispatch
// ============================================

/// main only builds a Circle; Circle::area builds a Square, whose `area`
/// is only discovered in the second dispatch round.
fn dispatch_scripts(w: &World) -> Vec<(InvokeDeclId, Vec<Step>)> {
    vec![
        (
            w.main,
            vec![
                Step::Construct(w.ty(w.circle)),
                Step::Construct(w.ty(w.point)),
                Step::CallVirtual(w.ty(w.shape), "area"),
            ],
        ),
        (w.circle_area, vec![Step::Construct(w.ty(w.square))]),
    ]
}

#[test]
fn test_virtual_dispatch_reaches_subtypes_only() {
    let w = world();
    let masm = run(&w, dispatch_scripts(&w), &EmitterConfig::default()).unwrap();

    assert!(masm.has_invoke("NSMain::Circle::area"));
    assert!(masm.has_invoke("NSMain::Square::area"));
    assert!(!masm.has_invoke("NSMain::Point::area"));
    assert!(masm.has_nominal("NSMain::Point"));

    assert_eq!(
        masm.entity_decls["NSMain::Square"].vcall_map.get("area").map(String::as_str),
        Some("NSMain::Square::area")
    );
    assert!(masm.entity_decls["NSMain::Point"].vcall_map.is_empty());
}

#[test]
fn test_concept_instantiation_is_a_dispatch_target() {
    let w = world();
    let scripts = vec![(
        w.main,
        vec![
            Step::Construct(w.ty(w.polygon)),
            Step::CallVirtual(w.ty(w.shape), "area"),
        ],
    )];
    let masm = run(&w, scripts, &EmitterConfig::default()).unwrap();

    assert!(masm.has_invoke("NSMain::Polygon::area"));
    assert_eq!(
        masm.concept_decls["NSMain::Polygon"].vcall_map.get("area").map(String::as_str),
        Some("NSMain::Polygon::area")
    );
    // The wider concept has no implementation of its own
    assert!(masm.concept_decls["NSMain::Shape"].vcall_map.is_empty());
}

#[test]
fn test_subtype_table_is_closed() {
    let w = world();
    let masm = run(&w, dispatch_scripts(&w), &EmitterConfig::default()).unwrap();

    assert!(masm.is_subtype("NSMain::Circle", "NSMain::Shape"));
    assert!(masm.is_subtype("NSMain::Circle", "NSCore::Any"));
    assert!(!masm.is_subtype("NSMain::Point", "NSMain::Shape"));
    assert_eq!(
        masm.entities_of("NSMain::Shape"),
        vec!["NSMain::Circle", "NSMain::Square"]
    );
}

#[test]
fn test_fixpoint_round_limit() {
    let w = world();
    let config = EmitterConfig::default().max_fixpoint_rounds(1);
    let err = run(&w, dispatch_scripts(&w), &config).unwrap_err();

    let messages: Vec<&str> = err.diagnostics().iter().map(|d| d.message.as_str()).collect();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("no convergence after 1 rounds"), "{}", messages[0]);
}

// ============================================
// Other queues
// ============================================

#[test]
fn test_lambdas_statics_and_constants_drain() {
    let w = world();
    let scripts = vec![(
        w.main,
        vec![
            Step::Lambda(w.lambda),
            Step::CallStatic(w.circle, w.make),
            Step::Global(w.limit),
            Step::Const(w.circle, w.pi),
        ],
    )];
    let masm = run(&w, scripts, &EmitterConfig::default()).unwrap();

    assert!(masm.has_invoke("fn--main.bsq+7##120"));
    assert!(masm.has_invoke("NSMain::Circle::make"));
    assert!(masm.constant_decls.contains_key("NSMain::limit"));
    assert!(masm.constant_decls.contains_key("NSMain::Circle::pi"));
}

// ============================================
// Rejection
// ============================================

#[test]
fn test_checker_errors_reject_the_program() {
    let w = world();
    let scripts = vec![
        (w.main, vec![Step::Call(w.id_fn, w.t_is(w.int)), Step::Report("x is never used")]),
        (w.id_fn, vec![Step::Report("T is unconstrained")]),
    ];
    let err = run(&w, scripts, &EmitterConfig::default()).unwrap_err();

    assert!(matches!(err, MirError::Rejected(_)));
    let messages: Vec<&str> = err.diagnostics().iter().map(|d| d.message.as_str()).collect();
    assert_eq!(messages, vec!["x is never used", "T is unconstrained"]);
}

#[test]
fn test_hard_failure_names_the_item() {
    let w = world();
    let scripts = vec![
        (w.main, vec![Step::Call(w.id_fn, w.t_is(w.int))]),
        (w.id_fn, vec![Step::Fail("unsupported expression")]),
    ];
    let err = run(&w, scripts, &EmitterConfig::default()).unwrap_err();

    let messages: Vec<&str> = err.diagnostics().iter().map(|d| d.message.as_str()).collect();
    assert_eq!(
        messages,
        vec!["Hard failure while processing `NSMain::id<T=NSCore::Int>`: unsupported expression"]
    );
}

// ============================================
// Registration
// ============================================

#[test]
fn test_registration_is_idempotent() {
    let w = world();
    let config = EmitterConfig::default();
    let mut em = MirEmitter::new(&w.program, &config);

    let a = em.register_function_call(w.id_fn, w.t_is(w.int), Vec::new());
    let b = em.register_function_call(w.id_fn, w.t_is(w.int), Vec::new());
    assert_eq!(a, b);

    let shape = w.ty(w.shape);
    let v1 = em.register_virtual_method_call(&shape, "area", BindMap::new(), Vec::new());
    let v2 = em.register_virtual_method_call(&shape, "area", BindMap::new(), Vec::new());
    assert_eq!(v1, v2);
    assert_eq!(em.virtual_call_sites().len(), 1);

    em.register_type_instantiation(w.square, BindMap::new());
    em.register_type_instantiation(w.square, BindMap::new());
    assert_eq!(em.instantiations().len(), 1);

    let union = ResolvedType::join([w.ty(w.int), w.ty(w.string)]);
    let mty = em.register_resolved_type_reference(&union);
    assert_eq!(mty.trkey, "NSCore::Int | NSCore::String");
    assert!(em.masm.type_map.contains_key("NSCore::Int"));
    assert_eq!(em.instantiations().len(), 3);
}

/// One registration into each of the seven queues
fn register_all(w: &World, em: &mut MirEmitter<'_>) {
    let ftype = ResolvedFunctionType {
        params: Vec::new(),
        result: w.ty(w.int),
    };
    em.register_type_instantiation(w.square, BindMap::new());
    em.register_pending_global_processing(w.limit);
    em.register_pending_const_processing(w.circle, BindMap::new(), w.pi);
    em.register_function_call(w.id_fn, w.t_is(w.int), Vec::new());
    em.register_pcode(w.lambda, ftype, BindMap::new());
    em.register_static_call(w.circle, BindMap::new(), w.make, BindMap::new(), Vec::new());
    em.register_method_call(w.circle, BindMap::new(), w.circle_area, BindMap::new(), Vec::new());
}

#[test]
fn test_duplicate_registration_leaves_queues_unchanged() {
    let w = world();
    let config = EmitterConfig::default();
    let mut em = MirEmitter::new(&w.program, &config);

    register_all(&w, &mut em);
    let pending = em.pending_len();
    assert_eq!(pending, 7);

    register_all(&w, &mut em);
    assert_eq!(em.pending_len(), pending);
}

#[test]
fn test_concept_intersection_interns_each_component() {
    let w = world();
    let config = EmitterConfig::default();
    let mut em = MirEmitter::new(&w.program, &config);

    let both = ResolvedType::concept(vec![
        ConceptEntry::new(w.program.type_decl(w.shape), BindMap::new()),
        ConceptEntry::new(w.program.type_decl(w.any), BindMap::new()),
    ]);
    let mty = em.register_resolved_type_reference(&both);

    assert_eq!(mty.trkey, "NSCore::Any & NSMain::Shape");
    for key in ["NSCore::Any", "NSMain::Shape", "NSCore::Any & NSMain::Shape"] {
        assert!(em.masm.type_map.contains_key(key), "missing {}", key);
    }
    assert_eq!(em.instantiations().len(), 2);
}

// ============================================
// Body shape
// ============================================

#[test]
fn test_every_body_is_well_formed() {
    let w = world();
    let masm = run(&w, dispatch_scripts(&w), &EmitterConfig::default()).unwrap();

    for (key, decl) in &masm.invoke_decls {
        let params: Vec<String> = decl.params.iter().map(|p| p.name.clone()).collect();
        assert_eq!(verify_body(&decl.body, &params), Ok(()), "{}", key);
    }
}

#[test]
fn test_assembly_json_roundtrip() {
    let w = world();
    let masm = run(&w, dispatch_scripts(&w), &EmitterConfig::default()).unwrap();

    let json = masm.to_json().unwrap();
    let back = MirAssembly::from_json(&json).unwrap();
    assert_eq!(back, masm);
}

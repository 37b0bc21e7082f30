//! Lowering of an analyzed unit to JVM class files.
//!
//! Each class in the unit becomes one class; top-level functions become
//! static methods of a facade class named after the source file.

pub mod annotations;
pub mod classfile;
pub mod code;
pub mod descriptor;
pub mod jvm;
mod lower;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use crate::ast::{ClassDecl, CompilationUnit, Decl, Function, Visibility};
use crate::diagnostics::CompileError;
use crate::typeck::types::QualifiedName;
use crate::typeck::{Analysis, DEFAULT_MODULE};

use annotations::lower_annotations;
use descriptor::{access, ClassDescriptor, FieldDescriptor, MethodDescriptor, MethodOrigin};
use jvm::{TypeMapper, OBJECT};
use lower::{ClassInfo, FieldInfo, MethodInfo, Signature, UnitInfo};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LowerOptions {
    /// Package for units without a `module` declaration.
    pub default_module: String,
    /// Emit a `SourceFile` attribute naming the unit's file.
    pub source_file_attribute: bool,
}

impl Default for LowerOptions {
    fn default() -> Self {
        Self { default_module: DEFAULT_MODULE.to_string(), source_file_attribute: true }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoweredUnit {
    /// Unit classes in declaration order, then the facade.
    pub classes: Vec<ClassDescriptor>,
}

impl LoweredUnit {
    pub fn class(&self, internal_name: &str) -> Option<&ClassDescriptor> {
        self.classes.iter().find(|c| c.internal_name == internal_name)
    }

    /// `(class, method, reason)` for every method lowered to a throwing stub.
    pub fn stubs(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.classes.iter().flat_map(|c| {
            c.methods
                .iter()
                .filter_map(move |m| m.stub_reason().map(|r| (c.internal_name.as_str(), m.name.as_str(), r)))
        })
    }

    /// Encode every class, keyed by internal name.
    pub fn emit(&self) -> Result<BTreeMap<String, Vec<u8>>, CompileError> {
        let mut out = BTreeMap::new();
        for class in &self.classes {
            out.insert(class.internal_name.clone(), classfile::write_class(class)?);
        }
        Ok(out)
    }
}

/// `user_service` -> `UserService`.
pub fn pascal_case(stem: &str) -> String {
    let mut out = String::with_capacity(stem.len());
    for part in stem.split(|c: char| !c.is_alphanumeric()).filter(|p| !p.is_empty()) {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    if out.is_empty() { "Main".to_string() } else { out }
}

pub fn facade_name(unit: &CompilationUnit, default_module: &str) -> String {
    let package = unit.package(default_module).replace('.', "/");
    format!("{package}/{}Module", pascal_case(unit.file_stem()))
}

fn member_access(visibility: Visibility) -> u16 {
    match visibility {
        Visibility::Public => access::PUBLIC,
        Visibility::Private => access::PRIVATE,
        Visibility::Internal => 0,
    }
}

/// Lower an analyzed unit. Refuses units whose analysis reported errors.
pub fn lower_unit(unit: &CompilationUnit, analysis: &Analysis, options: &LowerOptions) -> Result<LoweredUnit, CompileError> {
    if analysis.has_errors() {
        return Err(CompileError::rejected(analysis.diagnostics.clone()));
    }
    let _span = tracing::debug_span!("lower", file = %unit.path).entered();

    let package = unit.package(&options.default_module);
    let mut types = analysis.types.clone();
    for class in unit.classes() {
        types.record(class.name.node.clone(), QualifiedName::new(format!("{package}.{}", class.name.node)));
    }
    let mapper = TypeMapper::new(&types);
    let info = collect_unit_info(unit, &mapper, &options.default_module)?;
    let source_file = options
        .source_file_attribute
        .then(|| Path::new(&unit.path).file_name().and_then(|n| n.to_str()).unwrap_or(&unit.path).to_string());

    let mut classes = Vec::new();
    for class in unit.classes() {
        let class_info = info
            .classes
            .get(&class.name.node)
            .ok_or_else(|| CompileError::lowering(format!("class '{}' was not collected", class.name.node)))?;
        let mut descriptor = lower_class(class, class_info, &info, &mapper)?;
        descriptor.source_file = source_file.clone();
        classes.push(descriptor);
    }

    let functions: Vec<&Function> = unit
        .declarations
        .iter()
        .filter_map(|d| match &d.node {
            Decl::Function(f) => Some(f),
            Decl::Class(_) => None,
        })
        .collect();
    if !functions.is_empty() {
        let mut facade = lower_facade(&functions, &info, &mapper)?;
        facade.source_file = source_file;
        classes.push(facade);
    }

    let lowered = LoweredUnit { classes };
    for (class, method, reason) in lowered.stubs() {
        tracing::warn!(class, method, reason, "method lowered to a throwing stub");
    }
    tracing::debug!(classes = lowered.classes.len(), "unit lowered");
    Ok(lowered)
}

fn signature(func: &Function, mapper: &TypeMapper<'_>) -> Result<Signature, CompileError> {
    let mapper = mapper.with_params(&func.type_params);
    let params = func.params.iter().map(|p| mapper.map(&p.ty)).collect::<Result<Vec<_>, _>>()?;
    Ok(Signature { params, ret: mapper.map_return(func.return_type.as_ref())? })
}

fn collect_unit_info(unit: &CompilationUnit, mapper: &TypeMapper<'_>, default_module: &str) -> Result<UnitInfo, CompileError> {
    let package_path = unit.package(default_module).replace('.', "/");
    let facade = facade_name(unit, default_module);
    let mut info = UnitInfo { facade: facade.clone(), ..Default::default() };

    for decl in &unit.declarations {
        match &decl.node {
            Decl::Function(func) => {
                info.functions.insert(func.name.node.clone(), signature(func, mapper)?);
            }
            Decl::Class(class) => {
                let internal_name = format!("{package_path}/{}", class.name.node);
                if internal_name == facade {
                    return Err(CompileError::lowering(format!(
                        "class '{}' collides with the facade class {facade}",
                        class.name.node
                    )));
                }
                info.classes.insert(class.name.node.clone(), collect_class(class, internal_name, mapper)?);
            }
        }
    }
    Ok(info)
}

fn collect_class(class: &ClassDecl, internal_name: String, mapper: &TypeMapper<'_>) -> Result<ClassInfo, CompileError> {
    let mapper = mapper.with_params(&class.type_params);
    let superclass = match &class.superclass {
        Some(ty) => mapper.internal_name(ty)?,
        None => OBJECT.to_string(),
    };
    let fields = class
        .fields
        .iter()
        .map(|f| Ok(FieldInfo { name: f.name.node.clone(), ty: mapper.map(&f.ty)?, mutable: f.mutable }))
        .collect::<Result<Vec<_>, CompileError>>()?;

    let mut methods: HashMap<String, Vec<MethodInfo>> = HashMap::new();
    for method in &class.methods {
        let m = &method.node;
        let sig = signature(m, &mapper)?;
        methods
            .entry(m.name.node.clone())
            .or_default()
            .push(MethodInfo { sig, private: m.visibility == Visibility::Private });
    }
    for field in &fields {
        let getter = lower::accessor_name(&field.name);
        if !has_explicit_getter(class, &getter) {
            let sig = Signature { params: Vec::new(), ret: field.ty.clone() };
            methods.entry(getter).or_default().push(MethodInfo { sig, private: false });
        }
    }
    Ok(ClassInfo { internal_name, superclass, fields, methods })
}

/// A declared zero-parameter method with the getter's name replaces the accessor.
fn has_explicit_getter(class: &ClassDecl, getter: &str) -> bool {
    class.methods.iter().any(|m| m.node.name.node == getter && m.node.params.is_empty())
}

fn lower_class(class: &ClassDecl, info: &ClassInfo, unit: &UnitInfo, mapper: &TypeMapper<'_>) -> Result<ClassDescriptor, CompileError> {
    let _span = tracing::debug_span!("class", name = %info.internal_name).entered();
    let mapper = mapper.with_params(&class.type_params);

    let interfaces = class.interfaces.iter().map(|i| mapper.internal_name(i)).collect::<Result<Vec<_>, _>>()?;

    let mut fields = Vec::with_capacity(class.fields.len());
    for (decl, field) in class.fields.iter().zip(&info.fields) {
        let mut flags = member_access(decl.visibility);
        if !decl.mutable {
            flags |= access::FINAL;
        }
        fields.push(FieldDescriptor {
            name: field.name.clone(),
            descriptor: field.ty.descriptor(),
            access: flags,
            annotations: lower_annotations(&decl.annotations, &mapper)?,
        });
    }

    let mut methods = Vec::with_capacity(class.methods.len() + class.fields.len() + 1);
    methods.push(MethodDescriptor {
        name: "<init>".into(),
        descriptor: unit.constructor_signature(info).descriptor(),
        access: access::PUBLIC,
        parameter_names: unit.constructor_fields(info).iter().map(|f| f.name.clone()).collect(),
        origin: MethodOrigin::Constructor,
        annotations: Vec::new(),
        parameter_annotations: Vec::new(),
        code: lower::constructor_code(info, unit),
        stub_reason: None,
    });

    let mut seen = HashSet::new();
    for method in &class.methods {
        let func = &method.node;
        let method_mapper = mapper.with_params(&func.type_params);
        let sig = signature(func, &mapper)?;
        if !seen.insert((func.name.node.clone(), sig.descriptor())) {
            return Err(CompileError::lowering(format!(
                "{} declares '{}{}' twice",
                info.internal_name,
                func.name.node,
                sig.descriptor()
            )));
        }
        let body = lower::lower_function_body(func, &sig, Some(info), unit, &method_mapper)?;
        methods.push(declared_method(func, &sig, member_access(func.visibility), body, &method_mapper)?);
    }

    for field in &info.fields {
        let getter = lower::accessor_name(&field.name);
        if has_explicit_getter(class, &getter) {
            continue;
        }
        methods.push(MethodDescriptor {
            descriptor: jvm::method_descriptor(&[], &field.ty),
            name: getter,
            access: access::PUBLIC,
            parameter_names: Vec::new(),
            origin: MethodOrigin::Accessor,
            annotations: Vec::new(),
            parameter_annotations: Vec::new(),
            code: lower::accessor_code(info, field),
            stub_reason: None,
        });
    }

    Ok(ClassDescriptor {
        internal_name: info.internal_name.clone(),
        superclass: info.superclass.clone(),
        interfaces,
        access: access::PUBLIC | access::SUPER,
        source_file: None,
        fields,
        methods,
        annotations: lower_annotations(&class.annotations, &mapper)?,
    })
}

fn declared_method(
    func: &Function,
    sig: &Signature,
    flags: u16,
    body: lower::LoweredBody,
    mapper: &TypeMapper<'_>,
) -> Result<MethodDescriptor, CompileError> {
    let parameter_annotations = func
        .params
        .iter()
        .map(|p| lower_annotations(&p.annotations, mapper))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(MethodDescriptor {
        name: func.name.node.clone(),
        descriptor: sig.descriptor(),
        access: flags,
        parameter_names: func.params.iter().map(|p| p.name.node.clone()).collect(),
        origin: MethodOrigin::Declared,
        annotations: lower_annotations(&func.annotations, mapper)?,
        parameter_annotations,
        code: body.code,
        stub_reason: body.stub_reason,
    })
}

fn lower_facade(functions: &[&Function], unit: &UnitInfo, mapper: &TypeMapper<'_>) -> Result<ClassDescriptor, CompileError> {
    let _span = tracing::debug_span!("facade", name = %unit.facade).entered();
    let mut methods = Vec::with_capacity(functions.len() + 1);
    let mut entry = None;
    for func in functions {
        let func_mapper = mapper.with_params(&func.type_params);
        let sig = signature(func, mapper)?;
        let body = lower::lower_function_body(func, &sig, None, unit, &func_mapper)?;
        methods.push(declared_method(func, &sig, access::PUBLIC | access::STATIC, body, &func_mapper)?);
        if func.name.node == "main" && func.params.is_empty() {
            entry = Some(sig);
        }
    }
    if let Some(target) = entry {
        methods.push(MethodDescriptor {
            name: "main".into(),
            descriptor: "([Ljava/lang/String;)V".into(),
            access: access::PUBLIC | access::STATIC,
            parameter_names: vec!["args".into()],
            origin: MethodOrigin::EntryBridge,
            annotations: Vec::new(),
            parameter_annotations: Vec::new(),
            code: lower::entry_bridge_code(&unit.facade, &target),
            stub_reason: None,
        });
    }
    Ok(ClassDescriptor {
        internal_name: unit.facade.clone(),
        superclass: OBJECT.to_string(),
        interfaces: Vec::new(),
        access: access::PUBLIC | access::FINAL | access::SUPER,
        source_file: None,
        fields: Vec::new(),
        methods,
        annotations: Vec::new(),
    })
}

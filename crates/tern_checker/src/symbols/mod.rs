//! Session-wide declarations: classes in the registry, callable signatures,
//! package scopes and the list of bodies to analyze.
//!
//! The table is built once by [`collector::DeclarationCollector`] and is
//! read-only afterwards, so every body worker shares it by reference.

pub mod annotations;
pub mod builtins;
pub mod collector;

pub use annotations::{ScopedType, TypeNames, TypeResolver, TypeScope};

use rustc_hash::FxHashMap;
use std::sync::Arc;
use tern_ast::{
    Block, ClassDeclaration, FunctionDeclaration, Import, NodeId, Parameter, PropertyDeclaration, SourceFile, Span,
};
use tern_inference::{CallableSignature, ClassId, DeclId, Diagnostic, TypeParamId, TypeRegistry};

/// Package and imports of one source file.
#[derive(Debug, Clone)]
pub struct FileContext {
    pub index: usize,
    pub path: String,
    pub package: String,
    pub imports: Vec<ImportEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    /// Name the import introduces; empty for star imports.
    pub visible: String,
    pub package: String,
    /// Imported declaration name; empty for star imports.
    pub name: String,
    pub star: bool,
}

impl ImportEntry {
    fn from_import(import: &Import) -> Self {
        if import.is_star {
            return Self {
                visible: String::new(),
                package: import.path.clone(),
                name: String::new(),
                star: true,
            };
        }
        let (package, name) = match import.path.rsplit_once('.') {
            Some((package, name)) => (package.to_string(), name.to_string()),
            None => (String::new(), import.path.clone()),
        };
        Self {
            visible: import.visible_name().unwrap_or(&name).to_string(),
            package,
            name,
            star: false,
        }
    }
}

impl FileContext {
    pub fn new(index: usize, file: &SourceFile) -> Self {
        Self {
            index,
            path: file.path.clone(),
            package: file.package_name().to_string(),
            imports: file.imports.iter().map(ImportEntry::from_import).collect(),
        }
    }

    pub fn explicit_imports(&self) -> impl Iterator<Item = &ImportEntry> {
        self.imports.iter().filter(|import| !import.star)
    }

    pub fn star_imports(&self) -> impl Iterator<Item = &ImportEntry> {
        self.imports.iter().filter(|import| import.star)
    }
}

/// Top-level names of one package.
#[derive(Debug, Clone, Default)]
pub struct PackageScope {
    /// Functions, properties and constructors by simple name.
    pub callables: FxHashMap<String, Vec<DeclId>>,
    /// Classes by simple name; nested classes as `Outer.Inner`.
    pub classes: FxHashMap<String, ClassId>,
}

#[derive(Debug, Clone, Copy)]
pub enum DeclSource<'a> {
    Builtin,
    Function(&'a FunctionDeclaration),
    Property(&'a PropertyDeclaration),
    Constructor(ClassId),
    ConstructorProperty(&'a Parameter),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyFacts {
    pub mutable: bool,
    /// Reads of the property may be narrowed across calls.
    pub stable: bool,
}

#[derive(Debug, Clone)]
pub struct DeclInfo<'a> {
    pub id: DeclId,
    /// Return type is `Error` while `implicit` is set and not yet computed.
    pub signature: Arc<CallableSignature>,
    pub implicit: bool,
    pub package: String,
    pub file: Option<usize>,
    pub is_local: bool,
    pub source: DeclSource<'a>,
    pub property: Option<PropertyFacts>,
}

#[derive(Debug, Clone, Copy)]
pub enum BodyKind<'a> {
    Function(&'a FunctionDeclaration),
    PropertyInitializer(&'a PropertyDeclaration),
    InitBlock(&'a Block),
}

/// One unit of analysis: gets its own flow graph and typing pass.
#[derive(Debug, Clone)]
pub struct BodyRef<'a> {
    pub kind: BodyKind<'a>,
    pub file: usize,
    pub owner: Option<ClassId>,
    pub class: Option<&'a ClassDeclaration>,
    pub decl: Option<DeclId>,
    pub name: String,
    pub node: NodeId,
    pub span: Span,
}

#[derive(Debug, Clone, Copy)]
pub struct ClassSource<'a> {
    pub declaration: &'a ClassDeclaration,
    pub file: usize,
}

#[derive(Debug)]
pub struct SymbolTable<'a> {
    pub(crate) registry: TypeRegistry,
    pub(crate) declarations: Vec<DeclInfo<'a>>,
    pub(crate) files: Vec<FileContext>,
    pub(crate) packages: FxHashMap<String, PackageScope>,
    pub(crate) members: FxHashMap<ClassId, FxHashMap<String, Vec<DeclId>>>,
    pub(crate) constructors: FxHashMap<ClassId, Vec<DeclId>>,
    pub(crate) classes: FxHashMap<ClassId, ClassSource<'a>>,
    pub(crate) local_functions: FxHashMap<NodeId, DeclId>,
    pub(crate) local_classes: FxHashMap<NodeId, ClassId>,
    pub(crate) type_parameters: FxHashMap<NodeId, Vec<TypeParamId>>,
    pub(crate) bodies: Vec<BodyRef<'a>>,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl<'a> SymbolTable<'a> {
    pub fn collect(files: &'a [SourceFile]) -> Self {
        collector::DeclarationCollector::new(files).collect()
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn into_registry(self) -> TypeRegistry {
        self.registry
    }

    pub fn decl(&self, id: DeclId) -> &DeclInfo<'a> {
        &self.declarations[id.index()]
    }

    pub fn declaration_count(&self) -> usize {
        self.declarations.len()
    }

    pub fn file(&self, index: usize) -> &FileContext {
        &self.files[index]
    }

    pub fn packages(&self) -> &FxHashMap<String, PackageScope> {
        &self.packages
    }

    pub fn package(&self, name: &str) -> Option<&PackageScope> {
        self.packages.get(name)
    }

    pub fn package_callables(&self, package: &str, name: &str) -> &[DeclId] {
        self.packages
            .get(package)
            .and_then(|scope| scope.callables.get(name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn package_class(&self, package: &str, name: &str) -> Option<ClassId> {
        self.packages
            .get(package)
            .and_then(|scope| scope.classes.get(name))
            .copied()
    }

    /// Members declared directly in `class`, not inherited ones.
    pub fn members_named(&self, class: ClassId, name: &str) -> &[DeclId] {
        self.members
            .get(&class)
            .and_then(|members| members.get(name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn constructors(&self, class: ClassId) -> &[DeclId] {
        self.constructors
            .get(&class)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn class_source(&self, class: ClassId) -> Option<&ClassSource<'a>> {
        self.classes.get(&class)
    }

    pub fn local_function(&self, node: NodeId) -> Option<DeclId> {
        self.local_functions.get(&node).copied()
    }

    pub fn local_class(&self, node: NodeId) -> Option<ClassId> {
        self.local_classes.get(&node).copied()
    }

    pub fn type_parameters_of(&self, node: NodeId) -> &[TypeParamId] {
        self.type_parameters
            .get(&node)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn bodies(&self) -> &[BodyRef<'a>] {
        &self.bodies
    }

    /// Problems found in declaration headers.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn type_resolver(&self, file: usize) -> TypeResolver<'_> {
        TypeResolver::new(&self.registry, &self.packages, &self.files[file])
    }
}

impl<'a> SymbolTable<'a> {
    pub(crate) fn empty() -> Self {
        Self {
            registry: TypeRegistry::with_builtins(),
            declarations: Vec::new(),
            files: Vec::new(),
            packages: FxHashMap::default(),
            members: FxHashMap::default(),
            constructors: FxHashMap::default(),
            classes: FxHashMap::default(),
            local_functions: FxHashMap::default(),
            local_classes: FxHashMap::default(),
            type_parameters: FxHashMap::default(),
            bodies: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn next_decl_id(&self) -> DeclId {
        DeclId::new(self.declarations.len() as u32)
    }

    pub(crate) fn push_declaration(&mut self, info: DeclInfo<'a>) -> DeclId {
        let id = info.id;
        debug_assert_eq!(id, self.next_decl_id());
        self.declarations.push(info);
        id
    }

    pub(crate) fn register_member(&mut self, class: ClassId, name: &str, decl: DeclId) {
        self.members
            .entry(class)
            .or_default()
            .entry(name.to_string())
            .or_default()
            .push(decl);
    }

    pub(crate) fn register_package_callable(&mut self, package: &str, name: &str, decl: DeclId) {
        self.packages
            .entry(package.to_string())
            .or_default()
            .callables
            .entry(name.to_string())
            .or_default()
            .push(decl);
    }

    pub(crate) fn register_package_class(&mut self, package: &str, name: &str, class: ClassId) {
        self.packages
            .entry(package.to_string())
            .or_default()
            .classes
            .insert(name.to_string(), class);
    }
}

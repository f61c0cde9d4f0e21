//! Scope tower: which declarations a name can refer to at one point of a
//! body, grouped by scope level from the closest outwards.
//!
//! A declaration in a closer group hides every declaration of an outer
//! group with the same shadowing key (receiver plus parameter types), so
//! outer overloads with the same shape never reach overload resolution.

use crate::symbols::{FileContext, ScopedType, SymbolTable, TypeNames};
use rustc_hash::{FxHashMap, FxHashSet};
use tern_ast::NodeId;
use tern_inference::{
    builtins, CallableKind, CallableSignature, ClassId, DeclId, ScopeLevel, Substitutor, Type, TypeParamId,
    TypeRelations, TypeVarId,
};

/// One declaration found by a lookup, with the implicit receiver it would be
/// called on.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupEntry {
    pub decl: DeclId,
    pub implicit_receiver: Option<Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LookupGroup {
    pub level: ScopeLevel,
    pub entries: Vec<LookupEntry>,
}

#[derive(Debug, Default, Clone)]
struct LexicalLevel {
    functions: FxHashMap<String, Vec<DeclId>>,
    classes: FxHashMap<String, ClassId>,
    type_parameters: FxHashMap<String, TypeParamId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImplicitReceiver {
    pub ty: Type,
    pub class: ClassId,
}

/// Parameter shape used for shadowing, with the callable's own type
/// parameters replaced by positional placeholders. Properties and functions
/// never shadow each other.
type ShadowKey = (bool, Option<Type>, Vec<(Type, bool)>);

pub struct ScopeTower<'s, 'a> {
    table: &'s SymbolTable<'a>,
    file: &'s FileContext,
    levels: Vec<LexicalLevel>,
    receivers: Vec<ImplicitReceiver>,
}

impl<'s, 'a> ScopeTower<'s, 'a> {
    pub fn new(table: &'s SymbolTable<'a>, file: usize) -> Self {
        Self {
            table,
            file: table.file(file),
            levels: vec![LexicalLevel::default()],
            receivers: Vec::new(),
        }
    }

    pub fn file(&self) -> &'s FileContext {
        self.file
    }

    pub fn push_level(&mut self) {
        self.levels.push(LexicalLevel::default());
    }

    pub fn pop_level(&mut self) {
        if self.levels.len() > 1 {
            self.levels.pop();
        }
    }

    fn innermost(&mut self) -> &mut LexicalLevel {
        if self.levels.is_empty() {
            self.levels.push(LexicalLevel::default());
        }
        let last = self.levels.len() - 1;
        &mut self.levels[last]
    }

    pub fn declare_local_function(&mut self, name: &str, decl: DeclId) {
        self.innermost()
            .functions
            .entry(name.to_string())
            .or_default()
            .push(decl);
    }

    pub fn declare_local_class(&mut self, name: &str, class: ClassId) {
        self.innermost().classes.insert(name.to_string(), class);
    }

    /// Makes the type parameters of a declaration visible by name.
    pub fn declare_type_parameters(&mut self, node: NodeId) {
        let registry = self.table.registry();
        let parameters: Vec<(String, TypeParamId)> = self
            .table
            .type_parameters_of(node)
            .iter()
            .map(|param| (registry.type_parameter(*param).name.clone(), *param))
            .collect();
        let level = self.innermost();
        for (name, param) in parameters {
            level.type_parameters.insert(name, param);
        }
    }

    pub fn push_receiver(&mut self, class: ClassId) {
        let ty = self.table.registry().declared_type(class);
        self.receivers.push(ImplicitReceiver { ty, class });
    }

    pub fn pop_receiver(&mut self) {
        self.receivers.pop();
    }

    /// Innermost implicit `this`.
    pub fn this_receiver(&self) -> Option<&ImplicitReceiver> {
        self.receivers.last()
    }

    /// Class named `name` as seen from this point: local classes first, then
    /// the file's package, imports and the default package.
    pub fn lookup_class(&self, name: &str) -> Option<ClassId> {
        match self.lookup_type(name) {
            Some(ScopedType::Class(class)) => Some(class),
            Some(ScopedType::Parameter(_)) => None,
            None => self.table.type_resolver(self.file.index).lookup_class(name),
        }
    }

    /// Groups for a call or property access without an explicit receiver.
    pub fn lookup(&self, name: &str) -> Vec<LookupGroup> {
        let mut groups = Vec::new();

        let mut locals = Vec::new();
        for level in self.levels.iter().rev() {
            for decl in level.functions.get(name).into_iter().flatten() {
                let receiver = self
                    .table
                    .decl(*decl)
                    .signature
                    .is_extension()
                    .then(|| self.receivers.last().map(|receiver| receiver.ty.clone()))
                    .flatten();
                locals.push(LookupEntry {
                    decl: *decl,
                    implicit_receiver: receiver,
                });
            }
        }
        groups.push(LookupGroup {
            level: ScopeLevel::Local,
            entries: locals,
        });

        for receiver in self.receivers.iter().rev() {
            groups.push(LookupGroup {
                level: ScopeLevel::Member,
                entries: self
                    .members(&receiver.ty, name)
                    .into_iter()
                    .map(|decl| LookupEntry {
                        decl,
                        implicit_receiver: Some(receiver.ty.clone()),
                    })
                    .collect(),
            });
        }

        for receiver in self.receivers.iter().rev() {
            let mut entries = Vec::new();
            for (_, decls) in self.top_level(name) {
                for decl in decls {
                    if self.table.decl(decl).signature.is_extension() {
                        entries.push(LookupEntry {
                            decl,
                            implicit_receiver: Some(receiver.ty.clone()),
                        });
                    }
                }
            }
            groups.push(LookupGroup {
                level: ScopeLevel::Extension,
                entries,
            });
        }

        for (level, decls) in self.top_level(name) {
            groups.push(LookupGroup {
                level,
                entries: decls
                    .into_iter()
                    .filter(|decl| !self.table.decl(*decl).signature.is_extension())
                    .map(|decl| LookupEntry {
                        decl,
                        implicit_receiver: None,
                    })
                    .collect(),
            });
        }

        self.finish(groups)
    }

    /// Groups for `receiver.name`: members of the receiver type, then
    /// extensions from the closest scope outwards.
    pub fn lookup_with_receiver(&self, receiver: &Type, name: &str) -> Vec<LookupGroup> {
        let mut groups = vec![LookupGroup {
            level: ScopeLevel::Member,
            entries: self
                .members(receiver, name)
                .into_iter()
                .map(|decl| LookupEntry {
                    decl,
                    implicit_receiver: None,
                })
                .collect(),
        }];

        let mut locals = Vec::new();
        for level in self.levels.iter().rev() {
            for decl in level.functions.get(name).into_iter().flatten() {
                if self.table.decl(*decl).signature.is_extension() {
                    locals.push(LookupEntry {
                        decl: *decl,
                        implicit_receiver: None,
                    });
                }
            }
        }
        groups.push(LookupGroup {
            level: ScopeLevel::Extension,
            entries: locals,
        });
        for (_, decls) in self.top_level(name) {
            groups.push(LookupGroup {
                level: ScopeLevel::Extension,
                entries: decls
                    .into_iter()
                    .filter(|decl| self.table.decl(*decl).signature.is_extension())
                    .map(|decl| LookupEntry {
                        decl,
                        implicit_receiver: None,
                    })
                    .collect(),
            });
        }
        self.finish(groups)
    }

    /// Top-level declarations named `name`, per import level.
    fn top_level(&self, name: &str) -> Vec<(ScopeLevel, Vec<DeclId>)> {
        let mut out = vec![(
            ScopeLevel::Package,
            self.table.package_callables(&self.file.package, name).to_vec(),
        )];
        let mut explicit = Vec::new();
        for import in self.file.explicit_imports() {
            if import.visible == name {
                explicit.extend_from_slice(self.table.package_callables(&import.package, &import.name));
            }
        }
        out.push((ScopeLevel::ExplicitImport, explicit));
        let mut star = Vec::new();
        for import in self.file.star_imports() {
            star.extend_from_slice(self.table.package_callables(&import.package, name));
        }
        out.push((ScopeLevel::StarImport, star));
        out.push((
            ScopeLevel::Default,
            self.table.package_callables(builtins::PACKAGE, name).to_vec(),
        ));
        out
    }

    /// Members named `name` visible on `receiver`, overridden ones removed.
    pub fn members(&self, receiver: &Type, name: &str) -> Vec<DeclId> {
        let registry = self.table.registry();
        let relations = TypeRelations::new(registry);
        let mut roots: Vec<(ClassId, Vec<Type>)> = Vec::new();
        collect_member_roots(&relations, &receiver.make_non_null(), &mut roots);
        if roots.is_empty() && !receiver.is_error() {
            roots.push((builtins::ANY, Vec::new()));
        }

        let mut seen_classes = FxHashSet::default();
        let mut keys = FxHashSet::default();
        let mut found = Vec::new();
        for (class, arguments) in roots {
            for (current, current_arguments) in relations.supertype_closure(class, &arguments) {
                if !seen_classes.insert(current) {
                    continue;
                }
                let class_substitutor = Substitutor::for_class(registry.class(current), &current_arguments);
                for decl in self.table.members_named(current, name) {
                    let key = shadow_key(&self.table.decl(*decl).signature, &class_substitutor);
                    if keys.insert(key) {
                        found.push(*decl);
                    }
                }
            }
        }
        found
    }

    /// Drops empty groups and applies shadowing across groups.
    fn finish(&self, groups: Vec<LookupGroup>) -> Vec<LookupGroup> {
        let mut visible = FxHashSet::default();
        let mut out = Vec::new();
        for group in groups {
            let mut keys = Vec::new();
            let mut entries = Vec::new();
            for entry in group.entries {
                let key = shadow_key(&self.table.decl(entry.decl).signature, &Substitutor::new());
                if visible.contains(&key) {
                    continue;
                }
                keys.push(key);
                entries.push(entry);
            }
            visible.extend(keys);
            if !entries.is_empty() {
                out.push(LookupGroup {
                    level: group.level,
                    entries,
                });
            }
        }
        out
    }
}

impl TypeNames for ScopeTower<'_, '_> {
    fn lookup_type(&self, name: &str) -> Option<ScopedType> {
        for level in self.levels.iter().rev() {
            if let Some(param) = level.type_parameters.get(name) {
                return Some(ScopedType::Parameter(*param));
            }
            if let Some(class) = level.classes.get(name) {
                return Some(ScopedType::Class(*class));
            }
        }
        None
    }
}

fn collect_member_roots(relations: &TypeRelations<'_>, ty: &Type, out: &mut Vec<(ClassId, Vec<Type>)>) {
    match ty {
        Type::Nominal { class, arguments, .. } => out.push((*class, arguments.clone())),
        Type::Parameter { param, .. } => {
            for bound in relations.registry().type_parameter(*param).effective_bounds() {
                collect_member_roots(relations, &bound.make_non_null(), out);
            }
        }
        Type::Intersection(members) => {
            for member in members {
                collect_member_roots(relations, member, out);
            }
        }
        Type::Variable { .. } | Type::Error | Type::Star => {}
    }
}

fn shadow_key(signature: &CallableSignature, class_substitutor: &Substitutor) -> ShadowKey {
    let mut substitutor = class_substitutor.clone();
    for (index, param) in signature.type_parameters.iter().enumerate() {
        substitutor.insert_parameter(*param, Type::variable(TypeVarId::new(index as u32)));
    }
    let receiver = signature
        .extension_receiver
        .as_ref()
        .map(|receiver| substitutor.apply(receiver));
    let parameters = signature
        .parameters
        .iter()
        .map(|parameter| (substitutor.apply(&parameter.ty), parameter.is_vararg))
        .collect();
    (signature.kind == CallableKind::Property, receiver, parameters)
}

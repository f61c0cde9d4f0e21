//! Closed domains: the finite set of runtime shapes a subject can take.

use std::fmt;
use tern_inference::{builtins, ClassId, Type, TypeRegistry};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DomainElement {
    True,
    False,
    EnumEntry(String),
    /// A non-sealed inheritor of a sealed hierarchy.
    Leaf(ClassId),
    Null,
}

impl DomainElement {
    pub fn render(&self, registry: &TypeRegistry) -> String {
        match self {
            DomainElement::True => "'true'".to_string(),
            DomainElement::False => "'false'".to_string(),
            DomainElement::EnumEntry(name) => format!("'{name}'"),
            DomainElement::Leaf(class) => format!("'is {}'", registry.class(*class).name),
            DomainElement::Null => "'null'".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClosedDomain {
    Boolean {
        nullable: bool,
    },
    EnumEntries {
        class: ClassId,
        entries: Vec<String>,
        nullable: bool,
    },
    SealedHierarchy {
        root: ClassId,
        leaves: Vec<ClassId>,
        nullable: bool,
    },
}

impl ClosedDomain {
    /// Domain of a (possibly narrowed) subject type, if it is closed.
    pub fn of(ty: &Type, registry: &TypeRegistry) -> Option<Self> {
        match ty {
            Type::Nominal { class, nullable, .. } => Self::of_class(*class, *nullable, registry),
            Type::Intersection(members) => {
                let nullable = ty.is_nullable();
                members.iter().find_map(|member| {
                    let class = member.class_id()?;
                    Self::of_class(class, nullable, registry)
                })
            }
            _ => None,
        }
    }

    fn of_class(class: ClassId, nullable: bool, registry: &TypeRegistry) -> Option<Self> {
        if class == builtins::BOOLEAN {
            return Some(ClosedDomain::Boolean { nullable });
        }
        let info = registry.class(class);
        if info.is_enum() {
            return Some(ClosedDomain::EnumEntries {
                class,
                entries: info.enum_entries.clone(),
                nullable,
            });
        }
        if info.is_sealed() {
            let mut leaves = Vec::new();
            collect_leaves(class, registry, &mut leaves);
            return Some(ClosedDomain::SealedHierarchy {
                root: class,
                leaves,
                nullable,
            });
        }
        None
    }

    pub fn is_nullable(&self) -> bool {
        match self {
            ClosedDomain::Boolean { nullable }
            | ClosedDomain::EnumEntries { nullable, .. }
            | ClosedDomain::SealedHierarchy { nullable, .. } => *nullable,
        }
    }

    pub fn elements(&self) -> Vec<DomainElement> {
        let mut elements = match self {
            ClosedDomain::Boolean { .. } => vec![DomainElement::True, DomainElement::False],
            ClosedDomain::EnumEntries { entries, .. } => {
                entries.iter().cloned().map(DomainElement::EnumEntry).collect()
            }
            ClosedDomain::SealedHierarchy { leaves, .. } => leaves.iter().copied().map(DomainElement::Leaf).collect(),
        };
        if self.is_nullable() {
            elements.push(DomainElement::Null);
        }
        elements
    }

    /// Class every non-null element is an instance of.
    pub fn element_class(&self, element: &DomainElement) -> Option<ClassId> {
        match (self, element) {
            (_, DomainElement::True | DomainElement::False) => Some(builtins::BOOLEAN),
            (ClosedDomain::EnumEntries { class, .. }, DomainElement::EnumEntry(_)) => Some(*class),
            (_, DomainElement::Leaf(class)) => Some(*class),
            _ => None,
        }
    }
}

impl fmt::Display for ClosedDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClosedDomain::Boolean { .. } => write!(f, "Boolean")?,
            ClosedDomain::EnumEntries { entries, .. } => write!(f, "enum({} entries)", entries.len())?,
            ClosedDomain::SealedHierarchy { leaves, .. } => write!(f, "sealed({} leaves)", leaves.len())?,
        }
        if self.is_nullable() {
            write!(f, "?")?;
        }
        Ok(())
    }
}

/// Sealed inheritors expand into their own inheritors; everything else is a
/// leaf. Registration order is kept so missing cases render in source order.
fn collect_leaves(class: ClassId, registry: &TypeRegistry, leaves: &mut Vec<ClassId>) {
    for child in &registry.class(class).sealed_inheritors {
        if *child == class || leaves.contains(child) {
            continue;
        }
        if registry.class(*child).is_sealed() {
            collect_leaves(*child, registry, leaves);
        } else {
            leaves.push(*child);
        }
    }
}

/// Nominal subclass check that ignores type arguments, as `is` checks do.
pub fn is_subclass(registry: &TypeRegistry, sub: ClassId, sup: ClassId) -> bool {
    if sub == sup || sup == builtins::ANY {
        return true;
    }
    let mut stack = vec![sub];
    let mut visited = Vec::new();
    while let Some(current) = stack.pop() {
        if current == sup {
            return true;
        }
        if visited.contains(&current) {
            continue;
        }
        visited.push(current);
        stack.extend(
            registry
                .class(current)
                .supertypes
                .iter()
                .filter_map(Type::class_id),
        );
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_ast::{ClassKind, Modality};

    #[test]
    fn sealed_children_expand_transitively() {
        let mut registry = TypeRegistry::with_builtins();
        let root = registry.add_class("Shape", "app.Shape", ClassKind::Interface, Modality::Sealed);
        let round = registry.add_class("Round", "app.Round", ClassKind::Interface, Modality::Sealed);
        let circle = registry.add_class("Circle", "app.Circle", ClassKind::Class, Modality::Final);
        let square = registry.add_class("Square", "app.Square", ClassKind::Object, Modality::Final);
        registry.set_supertypes(round, vec![Type::nominal(root)]);
        registry.set_supertypes(circle, vec![Type::nominal(round)]);
        registry.set_supertypes(square, vec![Type::nominal(root)]);
        registry.register_sealed_inheritor(root, round);
        registry.register_sealed_inheritor(root, square);
        registry.register_sealed_inheritor(round, circle);

        let domain = ClosedDomain::of(&Type::nominal(root).make_nullable(), &registry).expect("closed");
        assert_eq!(
            domain.elements(),
            vec![DomainElement::Leaf(circle), DomainElement::Leaf(square), DomainElement::Null]
        );
        assert!(is_subclass(&registry, circle, root));
        assert!(!is_subclass(&registry, square, round));
    }

    #[test]
    fn open_classes_have_no_domain() {
        let registry = TypeRegistry::with_builtins();
        assert!(ClosedDomain::of(&Type::string(), &registry).is_none());
        assert_eq!(
            ClosedDomain::of(&Type::boolean(), &registry).map(|domain| domain.elements().len()),
            Some(2)
        );
    }
}

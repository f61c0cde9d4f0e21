//! Per-flow-point knowledge about the runtime types of bindings.
//!
//! A fact says "this binding currently holds a value of every type in the
//! set". The narrowed type of a read is the declared type intersected with
//! each fact, so it never leaves the declared type.

use crate::binding::BindingId;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tern_inference::{DeclId, Type, TypeRelations};

/// Something whose type can be narrowed: a local binding, or a property read
/// through the implicit receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FlowVariable {
    Local(BindingId),
    Property(DeclId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeStatement {
    pub types: BTreeSet<Type>,
    /// Stable statements survive calls and enter lambdas.
    pub stable: bool,
}

impl TypeStatement {
    fn single(ty: Type, stable: bool) -> Self {
        let mut types = BTreeSet::new();
        types.insert(ty);
        Self { types, stable }
    }
}

/// Immutable snapshot shared by every flow point that did not change it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataFlowInfo {
    facts: Arc<BTreeMap<FlowVariable, TypeStatement>>,
}

impl DataFlowInfo {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn get(&self, variable: FlowVariable) -> Option<&TypeStatement> {
        self.facts.get(&variable)
    }

    pub fn variables(&self) -> impl Iterator<Item = FlowVariable> + '_ {
        self.facts.keys().copied()
    }

    fn updated(&self, f: impl FnOnce(&mut BTreeMap<FlowVariable, TypeStatement>)) -> Self {
        let mut facts = (*self.facts).clone();
        f(&mut facts);
        Self { facts: Arc::new(facts) }
    }

    /// Adds `ty` to what is known about `variable`.
    pub fn narrow(&self, variable: FlowVariable, ty: Type, stable: bool) -> Self {
        if ty.is_error() {
            return self.clone();
        }
        if self
            .facts
            .get(&variable)
            .map_or(false, |statement| statement.types.contains(&ty))
        {
            return self.clone();
        }
        self.updated(|facts| {
            facts
                .entry(variable)
                .and_modify(|statement| {
                    statement.types.insert(ty.clone());
                })
                .or_insert_with(|| TypeStatement::single(ty.clone(), stable));
        })
    }

    /// Drops everything known about `variable` and records the type of the
    /// value just assigned. `Nothing` values never complete, so they record
    /// nothing.
    pub fn assign(&self, variable: FlowVariable, ty: &Type, stable: bool) -> Self {
        let cleared = self.forget(variable);
        if ty.is_error() || ty.is_nothing() {
            return cleared;
        }
        cleared.narrow(variable, ty.clone(), stable)
    }

    pub fn forget(&self, variable: FlowVariable) -> Self {
        if !self.facts.contains_key(&variable) {
            return self.clone();
        }
        self.updated(|facts| {
            facts.remove(&variable);
        })
    }

    pub fn forget_all(&self, variables: &[FlowVariable]) -> Self {
        if variables.iter().all(|variable| !self.facts.contains_key(variable)) {
            return self.clone();
        }
        self.updated(|facts| {
            for variable in variables {
                facts.remove(variable);
            }
        })
    }

    /// What survives a call or the entry into a lambda.
    pub fn retain_stable(&self) -> Self {
        if self.facts.values().all(|statement| statement.stable) {
            return self.clone();
        }
        self.updated(|facts| facts.retain(|_, statement| statement.stable))
    }

    pub fn apply(&self, delta: &FlowDelta) -> Self {
        delta
            .facts
            .iter()
            .fold(self.clone(), |info, fact| info.narrow(fact.variable, fact.ty.clone(), fact.stable))
    }

    /// Facts valid on both incoming paths: shared variables keep the types
    /// both sides agree on.
    pub fn merge(&self, other: &DataFlowInfo) -> Self {
        if Arc::ptr_eq(&self.facts, &other.facts) || self == other {
            return self.clone();
        }
        let mut merged = BTreeMap::new();
        for (variable, left) in self.facts.iter() {
            if let Some(right) = other.facts.get(variable) {
                let types: BTreeSet<Type> = left.types.intersection(&right.types).cloned().collect();
                if !types.is_empty() {
                    merged.insert(
                        *variable,
                        TypeStatement {
                            types,
                            stable: left.stable && right.stable,
                        },
                    );
                }
            }
        }
        Self {
            facts: Arc::new(merged),
        }
    }

    /// Declared type intersected with every fact, or `None` when nothing is
    /// known about `variable`.
    pub fn narrowed_type(&self, variable: FlowVariable, declared: &Type, relations: &TypeRelations<'_>) -> Option<Type> {
        let statement = self.facts.get(&variable)?;
        let narrowed = statement
            .types
            .iter()
            .fold(declared.clone(), |current, fact| relations.intersect(&current, fact));
        (narrowed != *declared).then_some(narrowed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fact {
    pub variable: FlowVariable,
    pub ty: Type,
    pub stable: bool,
}

/// Facts added along one branch edge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowDelta {
    pub facts: Vec<Fact>,
    /// The edge can never be taken, e.g. the false side of `while (true)`.
    pub unreachable: bool,
}

impl FlowDelta {
    pub fn fact(variable: FlowVariable, ty: Type, stable: bool) -> Self {
        Self {
            facts: vec![Fact { variable, ty, stable }],
            unreachable: false,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            facts: Vec::new(),
            unreachable: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty() && !self.unreachable
    }
}

/// Deltas of an atomic condition for its two outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionFacts {
    pub when_true: FlowDelta,
    pub when_false: FlowDelta,
}

impl ConditionFacts {
    pub fn negated(self) -> Self {
        Self {
            when_true: self.when_false,
            when_false: self.when_true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_inference::{builtins, TypeRegistry};

    fn local(raw: u32) -> FlowVariable {
        FlowVariable::Local(BindingId::new(raw))
    }

    #[test]
    fn narrowed_type_stays_below_declared() {
        let registry = TypeRegistry::with_builtins();
        let relations = TypeRelations::new(&registry);
        let info = DataFlowInfo::empty().narrow(local(0), Type::any(), true);
        let declared = Type::string().make_nullable();
        let narrowed = info.narrowed_type(local(0), &declared, &relations).expect("narrowed");
        assert_eq!(narrowed, Type::string());
        assert!(relations.is_subtype(&narrowed, &declared));
    }

    #[test]
    fn merge_keeps_only_shared_facts() {
        let left = DataFlowInfo::empty()
            .narrow(local(0), Type::string(), true)
            .narrow(local(1), Type::int(), true);
        let right = DataFlowInfo::empty()
            .narrow(local(0), Type::string(), false)
            .narrow(local(0), Type::any(), false);
        let merged = left.merge(&right);
        let statement = merged.get(local(0)).expect("shared");
        assert_eq!(statement.types.len(), 1);
        assert!(!statement.stable);
        assert!(merged.get(local(1)).is_none());
    }

    #[test]
    fn assignment_replaces_previous_facts() {
        let info = DataFlowInfo::empty().narrow(local(0), Type::string(), true);
        let assigned = info.assign(local(0), &Type::int(), true);
        let types: Vec<_> = assigned.get(local(0)).expect("fact").types.iter().cloned().collect();
        assert_eq!(types, vec![Type::int()]);
        let thrown = info.assign(local(0), &Type::nothing(), true);
        assert!(thrown.get(local(0)).is_none());
    }

    #[test]
    fn unstable_facts_are_dropped_at_calls() {
        let info = DataFlowInfo::empty()
            .narrow(local(0), Type::string(), false)
            .narrow(FlowVariable::Property(DeclId::new(3)), Type::nominal(builtins::INT), true);
        let after_call = info.retain_stable();
        assert!(after_call.get(local(0)).is_none());
        assert!(after_call.get(FlowVariable::Property(DeclId::new(3))).is_some());
    }
}

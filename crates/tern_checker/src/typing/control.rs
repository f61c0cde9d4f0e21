use super::{BodyTyper, Usage};
use crate::flow::{ConditionFacts, Fact, FlowDelta, FlowEdgeKind, FlowEvent, FlowNodeId, FlowNodeKind, FlowVariable};
use crate::pattern::{CaseLabel, ClosedDomain, DomainElement, ExhaustivenessChecker, WhenCase, WhenShape};
use tern_ast::{BinaryOp, Expression, ExpressionKind, Literal, NodeId, Span, TryExpression, UnaryOp, WhenCondition, WhenExpression};
use tern_inference::{builtins, Diagnostic, DiagnosticCode, Type};
use tracing::trace;

impl<'c, 'a> BodyTyper<'c, 'a> {
    /// Types a condition and reports it when it is not `Boolean`.
    pub(super) fn check_condition(&mut self, condition: &'a Expression) -> ConditionFacts {
        let facts = self.condition(condition);
        let ty = self.expression_types.get(&condition.id).cloned().unwrap_or(Type::Error);
        if !ty.is_boolean() && !ty.contains_error() && !ty.is_nothing() {
            let rendered = self.render(&ty);
            self.report(
                Diagnostic::new(DiagnosticCode::ConditionTypeMismatch, condition.span)
                    .at_node(condition.id)
                    .with_argument(rendered),
            );
        }
        facts
    }

    /// Types `condition` and returns what each outcome tells about flow
    /// variables. The flow continues at a single point; the deltas apply to
    /// its information.
    pub(super) fn condition(&mut self, condition: &'a Expression) -> ConditionFacts {
        let facts = match &condition.kind {
            ExpressionKind::Literal(Literal::Boolean(value)) => {
                self.flow.emit(FlowNodeKind::Condition, Some(condition.id), condition.span);
                if *value {
                    ConditionFacts {
                        when_true: FlowDelta::default(),
                        when_false: FlowDelta::unreachable(),
                    }
                } else {
                    ConditionFacts {
                        when_true: FlowDelta::unreachable(),
                        when_false: FlowDelta::default(),
                    }
                }
            }
            ExpressionKind::Unary {
                op: UnaryOp::Not,
                operand,
            } => {
                let facts = self.check_condition(operand).negated();
                self.flow.emit(FlowNodeKind::Condition, Some(condition.id), condition.span);
                facts
            }
            ExpressionKind::Binary {
                op: op @ (BinaryOp::And | BinaryOp::Or),
                left,
                right,
            } => self.logical(condition, *op == BinaryOp::And, left, right),
            ExpressionKind::Binary {
                op: op @ (BinaryOp::Equal | BinaryOp::NotEqual | BinaryOp::Identical | BinaryOp::NotIdentical),
                left,
                right,
            } => {
                let facts = self.equality(condition, left, right);
                if matches!(op, BinaryOp::NotEqual | BinaryOp::NotIdentical) {
                    facts.negated()
                } else {
                    facts
                }
            }
            ExpressionKind::Is {
                expr,
                type_annotation,
                negated,
            } => {
                let actual = self.infer(expr, None);
                let target = self.resolve_annotation(type_annotation);
                self.flow.emit(FlowNodeKind::Condition, Some(condition.id), condition.span);
                self.check_overlap(&actual, &target, condition.span, condition.id);
                let facts = match self.flow_variable(expr) {
                    Some((variable, stable)) => ConditionFacts {
                        when_true: FlowDelta::fact(variable, target, stable),
                        when_false: FlowDelta::default(),
                    },
                    None => ConditionFacts::default(),
                };
                if *negated {
                    facts.negated()
                } else {
                    facts
                }
            }
            _ => {
                self.infer(condition, Some(&Type::boolean()));
                return ConditionFacts::default();
            }
        };
        self.record_type(condition.id, &Type::boolean());
        facts
    }

    /// `&&` evaluates the right side only when the left is true, `||` only
    /// when it is false. Both outcomes merge at one node.
    fn logical(&mut self, condition: &'a Expression, conjunction: bool, left: &'a Expression, right: &'a Expression) -> ConditionFacts {
        let left_facts = self.check_condition(left);
        let decision = self.flow.current();
        let (into_right, short_circuit) = if conjunction {
            (left_facts.when_true.clone(), left_facts.when_false.clone())
        } else {
            (left_facts.when_false.clone(), left_facts.when_true.clone())
        };
        let entry = self.flow.branch(decision, conjunction, into_right);
        self.flow.join(vec![entry], FlowNodeKind::Merge, None, right.span);
        let right_facts = self.check_condition(right);
        let right_end = self.flow.current();
        let skip = self.flow.branch(decision, !conjunction, short_circuit);
        self.flow.join(
            vec![skip, (right_end, FlowEdgeKind::Normal)],
            FlowNodeKind::Merge,
            Some(condition.id),
            condition.span,
        );

        if conjunction {
            ConditionFacts {
                when_true: combine(&left_facts.when_true, &right_facts.when_true),
                when_false: common(&left_facts.when_false, &right_facts.when_false),
            }
        } else {
            ConditionFacts {
                when_true: common(&left_facts.when_true, &right_facts.when_true),
                when_false: combine(&left_facts.when_false, &right_facts.when_false),
            }
        }
    }

    /// Facts of `left == right`; `x == null` makes `x` non-null on the false
    /// side and a comparison with a non-null value makes it non-null on the
    /// true side.
    fn equality(&mut self, condition: &'a Expression, left: &'a Expression, right: &'a Expression) -> ConditionFacts {
        let left_ty = self.infer(left, None);
        let right_ty = self.infer(right, None);
        self.flow.emit(FlowNodeKind::Condition, Some(condition.id), condition.span);

        let mut facts = ConditionFacts::default();
        for (subject, other, other_ty) in [(left, right, &right_ty), (right, left, &left_ty)] {
            let Some((variable, stable)) = self.flow_variable(subject) else {
                continue;
            };
            if is_null_literal(other) {
                facts.when_false = FlowDelta::fact(variable, Type::any(), stable);
            } else if !other_ty.is_nullable() && !other_ty.contains_error() && !other_ty.has_variables() {
                facts.when_true = FlowDelta::fact(variable, Type::any(), stable);
            }
            break;
        }
        facts
    }

    fn check_overlap(&mut self, actual: &Type, target: &Type, span: Span, node: NodeId) {
        if actual.contains_error() || target.contains_error() {
            return;
        }
        if !self.relations().may_overlap(actual, target) {
            let diagnostic = Diagnostic::new(DiagnosticCode::IncompatibleTypes, span)
                .at_node(node)
                .with_arguments([self.render(actual), self.render(target)]);
            self.report(diagnostic);
        }
    }

    // ---- if -------------------------------------------------------------------

    pub(super) fn infer_if(
        &mut self,
        expression: &'a Expression,
        condition: &'a Expression,
        then_branch: &'a Expression,
        else_branch: Option<&'a Expression>,
        expected: Option<&Type>,
        usage: Usage,
    ) -> Type {
        let facts = self.check_condition(condition);
        let decision = self.flow.current();

        let entry = self.flow.branch(decision, true, facts.when_true);
        self.flow.join(vec![entry], FlowNodeKind::Merge, None, then_branch.span);
        let then_ty = self.infer_with(then_branch, expected, usage);
        let then_end = self.flow.current();

        let (else_ty, else_end) = match else_branch {
            Some(else_branch) => {
                let entry = self.flow.branch(decision, false, facts.when_false);
                self.flow.join(vec![entry], FlowNodeKind::Merge, None, else_branch.span);
                let ty = self.infer_with(else_branch, expected, usage);
                (Some(ty), (self.flow.current(), FlowEdgeKind::Normal))
            }
            None => (None, self.flow.branch(decision, false, facts.when_false)),
        };
        self.flow.join(
            vec![(then_end, FlowEdgeKind::Normal), else_end],
            FlowNodeKind::Merge,
            Some(expression.id),
            expression.span,
        );

        match (usage, else_ty) {
            (Usage::Statement, _) => Type::unit(),
            (Usage::Expression, Some(else_ty)) => self.branch_type(&[then_ty, else_ty]),
            (Usage::Expression, None) => {
                self.report(
                    Diagnostic::new(DiagnosticCode::InvalidIfAsExpression, expression.span).at_node(expression.id),
                );
                Type::unit()
            }
        }
    }

    // ---- when -------------------------------------------------------------------

    pub(super) fn infer_when(
        &mut self,
        expression: &'a Expression,
        when: &'a WhenExpression,
        expected: Option<&Type>,
        usage: Usage,
    ) -> Type {
        let subject = when.subject.as_ref().map(|subject| {
            let ty = self.infer(&subject.expression, None);
            let variable = match (&subject.binding, self.bindings.declared_at(subject.id)) {
                (Some(_), Some(binding)) => {
                    self.binding_types.insert(binding, ty.clone());
                    self.flow.emit(FlowNodeKind::Statement, Some(subject.id), subject.span);
                    self.flow.record(FlowEvent::Declare {
                        binding,
                        initialized: true,
                    });
                    Some((FlowVariable::Local(binding), true))
                }
                _ => self.flow_variable(&subject.expression),
            };
            WhenSubjectInfo { ty, variable }
        });

        let mut cases = Vec::new();
        let mut types = Vec::new();
        let mut ends: Vec<(FlowNodeId, FlowEdgeKind)> = Vec::new();
        for branch in &when.branches {
            let mut entries = Vec::new();
            for condition in &branch.conditions {
                let (facts, case) = self.when_condition(condition, subject.as_ref());
                cases.push(case);
                let point = self.flow.current();
                entries.push(self.flow.branch(point, true, facts.when_true));
                let next = self.flow.branch(point, false, facts.when_false);
                self.flow.join(vec![next], FlowNodeKind::Merge, None, branch.span);
            }
            let otherwise = self.flow.current();
            self.flow.join(entries, FlowNodeKind::Merge, Some(branch.id), branch.span);
            types.push(self.infer_with(&branch.body, expected, usage));
            ends.push((self.flow.current(), FlowEdgeKind::Normal));
            self.flow.resume_at(otherwise);
        }

        let shape = WhenShape {
            node: expression.id,
            span: expression.span,
            domain: subject
                .as_ref()
                .and_then(|subject| ClosedDomain::of(&subject.ty, self.registry)),
            cases,
            else_span: when.else_branch.as_ref().map(|branch| branch.span),
            used_as_expression: usage == Usage::Expression,
        };
        let report = ExhaustivenessChecker::new(self.registry).check(&shape);
        trace!(node = expression.id.to_raw(), exhaustive = report.is_exhaustive(), "when checked");
        let exhaustive = report.is_exhaustive();
        self.diagnostics.extend(report.diagnostics);

        match &when.else_branch {
            Some(else_branch) => {
                types.push(self.infer_with(else_branch, expected, usage));
                ends.push((self.flow.current(), FlowEdgeKind::Normal));
            }
            // Every value matched a branch; falling through is impossible.
            None if exhaustive => {}
            None => ends.push((self.flow.current(), FlowEdgeKind::Normal)),
        }
        self.flow.join(ends, FlowNodeKind::Merge, Some(expression.id), expression.span);

        match usage {
            Usage::Statement => Type::unit(),
            Usage::Expression => self.branch_type(&types),
        }
    }

    fn when_condition(&mut self, condition: &'a WhenCondition, subject: Option<&WhenSubjectInfo>) -> (ConditionFacts, WhenCase) {
        match condition {
            WhenCondition::IsType {
                id,
                type_annotation,
                negated,
                span,
            } => {
                let target = self.resolve_annotation(type_annotation);
                self.flow.emit(FlowNodeKind::Condition, Some(*id), *span);
                self.record_type(*id, &Type::boolean());
                let Some(subject) = subject else {
                    let case = WhenCase {
                        node: *id,
                        label: CaseLabel::Opaque,
                        span: *span,
                    };
                    return (ConditionFacts::default(), case);
                };
                self.check_overlap(&subject.ty, &target, *span, *id);
                let mut facts = match subject.variable {
                    Some((variable, stable)) => ConditionFacts {
                        when_true: FlowDelta::fact(variable, target.clone(), stable),
                        when_false: FlowDelta::default(),
                    },
                    None => ConditionFacts::default(),
                };
                if *negated {
                    facts = facts.negated();
                }
                let case = WhenCase {
                    node: *id,
                    label: CaseLabel::IsType {
                        ty: target,
                        negated: *negated,
                    },
                    span: *span,
                };
                (facts, case)
            }
            WhenCondition::Expression(value) => match subject {
                Some(subject) => {
                    self.infer(value, Some(&subject.ty));
                    self.flow.emit(FlowNodeKind::Condition, None, value.span);
                    let label = self.case_label(value);
                    let mut facts = ConditionFacts::default();
                    if let (CaseLabel::Value(DomainElement::Null), Some((variable, stable))) = (&label, subject.variable) {
                        facts.when_false = FlowDelta::fact(variable, Type::any(), stable);
                    }
                    let case = WhenCase {
                        node: value.id,
                        label,
                        span: value.span,
                    };
                    (facts, case)
                }
                None => {
                    let facts = self.check_condition(value);
                    let case = WhenCase {
                        node: value.id,
                        label: CaseLabel::Opaque,
                        span: value.span,
                    };
                    (facts, case)
                }
            },
        }
    }

    /// Which value of a closed domain a branch value denotes.
    fn case_label(&self, value: &Expression) -> CaseLabel {
        match &value.kind {
            ExpressionKind::Literal(Literal::Boolean(true)) => CaseLabel::Value(DomainElement::True),
            ExpressionKind::Literal(Literal::Boolean(false)) => CaseLabel::Value(DomainElement::False),
            ExpressionKind::Literal(Literal::Null) => CaseLabel::Value(DomainElement::Null),
            _ => {
                if let Some(entry) = self.enum_entries.get(&value.id) {
                    CaseLabel::Value(DomainElement::EnumEntry(entry.clone()))
                } else if let Some(class) = self.object_references.get(&value.id) {
                    CaseLabel::Value(DomainElement::Leaf(*class))
                } else {
                    CaseLabel::Opaque
                }
            }
        }
    }

    // ---- try ------------------------------------------------------------------

    pub(super) fn infer_try(
        &mut self,
        expression: &'a Expression,
        try_expression: &'a TryExpression,
        expected: Option<&Type>,
        usage: Usage,
    ) -> Type {
        let handle = self.flow.enter_try(
            expression.id,
            expression.span,
            !try_expression.catches.is_empty(),
            try_expression.finally.is_some(),
        );
        let mut types = vec![self.block(&try_expression.body, usage, expected)];
        let mut exits = vec![self.flow.current()];

        if let Some(dispatch) = self.flow.begin_catches(handle) {
            for catch in &try_expression.catches {
                self.flow
                    .join(vec![(dispatch, FlowEdgeKind::Normal)], FlowNodeKind::CatchEnter, Some(catch.id), catch.span);
                let parameter = &catch.parameter;
                let ty = match &parameter.type_annotation {
                    Some(annotation) => self.resolve_annotation(annotation),
                    None => Type::nominal(builtins::THROWABLE),
                };
                if let Some(binding) = self.bindings.declared_at(parameter.id) {
                    self.binding_types.insert(binding, ty);
                    self.flow.record(FlowEvent::Declare {
                        binding,
                        initialized: true,
                    });
                }
                types.push(self.block(&catch.body, usage, expected));
                exits.push(self.flow.current());
            }
        }

        match &try_expression.finally {
            Some(finally) => {
                let region = self.flow.begin_finally(handle, exits, finally.span);
                self.block(finally, Usage::Statement, None);
                self.flow.end_finally(region, finally.span);
            }
            None => self.flow.leave_try(exits, expression.span),
        }

        match usage {
            Usage::Statement => Type::unit(),
            Usage::Expression => self.branch_type(&types),
        }
    }
}

struct WhenSubjectInfo {
    ty: Type,
    variable: Option<(FlowVariable, bool)>,
}

fn is_null_literal(expression: &Expression) -> bool {
    matches!(expression.kind, ExpressionKind::Literal(Literal::Null))
}

/// Both deltas hold.
fn combine(left: &FlowDelta, right: &FlowDelta) -> FlowDelta {
    let mut facts = left.facts.clone();
    for fact in &right.facts {
        if !facts.contains(fact) {
            facts.push(fact.clone());
        }
    }
    FlowDelta {
        facts,
        unreachable: left.unreachable || right.unreachable,
    }
}

/// One of the deltas holds: only shared facts survive.
fn common(left: &FlowDelta, right: &FlowDelta) -> FlowDelta {
    if left.unreachable {
        return right.clone();
    }
    if right.unreachable {
        return left.clone();
    }
    let facts: Vec<Fact> = left
        .facts
        .iter()
        .filter(|fact| right.facts.contains(fact))
        .cloned()
        .collect();
    FlowDelta {
        facts,
        unreachable: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::BindingId;

    fn fact(raw: u32, ty: Type) -> Fact {
        Fact {
            variable: FlowVariable::Local(BindingId::new(raw)),
            ty,
            stable: true,
        }
    }

    #[test]
    fn combined_deltas_keep_every_fact() {
        let left = FlowDelta {
            facts: vec![fact(0, Type::string())],
            unreachable: false,
        };
        let right = FlowDelta {
            facts: vec![fact(1, Type::int()), fact(0, Type::string())],
            unreachable: false,
        };
        let both = combine(&left, &right);
        assert_eq!(both.facts.len(), 2);
        assert!(!both.unreachable);
    }

    #[test]
    fn common_delta_skips_impossible_side() {
        let left = FlowDelta::unreachable();
        let right = FlowDelta {
            facts: vec![fact(0, Type::any())],
            unreachable: false,
        };
        assert_eq!(common(&left, &right), right);
        let shared = common(
            &FlowDelta {
                facts: vec![fact(0, Type::any()), fact(1, Type::int())],
                unreachable: false,
            },
            &right,
        );
        assert_eq!(shared.facts, vec![fact(0, Type::any())]);
    }
}

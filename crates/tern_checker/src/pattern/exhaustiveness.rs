//! Coverage of ordered `when` branches over a closed domain.

use super::domain::{is_subclass, ClosedDomain, DomainElement};
use std::collections::BTreeSet;
use tern_ast::{NodeId, Span};
use tern_inference::{Diagnostic, DiagnosticCode, Severity, Type, TypeRegistry};
use tracing::debug;

/// What one branch condition matches, as seen by coverage.
#[derive(Debug, Clone, PartialEq)]
pub enum CaseLabel {
    /// A constant that is exactly one element: `true`, `null`, `Color.RED`.
    Value(DomainElement),
    IsType { ty: Type, negated: bool },
    /// Any other condition; it covers nothing.
    Opaque,
}

#[derive(Debug, Clone)]
pub struct WhenCase {
    pub node: NodeId,
    pub label: CaseLabel,
    pub span: Span,
}

/// A `when` ready for checking. Cases appear in source order; a branch with
/// several conditions contributes one case per condition.
#[derive(Debug, Clone)]
pub struct WhenShape {
    pub node: NodeId,
    pub span: Span,
    pub domain: Option<ClosedDomain>,
    pub cases: Vec<WhenCase>,
    pub else_span: Option<Span>,
    pub used_as_expression: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ExhaustivenessReport {
    /// Some branch is taken for every value, counting `else`.
    pub exhaustive: bool,
    /// Elements no branch covers when there is no `else`.
    pub missing: Vec<DomainElement>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ExhaustivenessReport {
    pub fn is_exhaustive(&self) -> bool {
        self.exhaustive
    }
}

pub struct ExhaustivenessChecker<'r> {
    registry: &'r TypeRegistry,
}

impl<'r> ExhaustivenessChecker<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self { registry }
    }

    pub fn check(&self, shape: &WhenShape) -> ExhaustivenessReport {
        let mut report = ExhaustivenessReport {
            exhaustive: shape.else_span.is_some(),
            ..ExhaustivenessReport::default()
        };
        let Some(domain) = &shape.domain else {
            if shape.else_span.is_none() && shape.used_as_expression {
                report.diagnostics.push(
                    Diagnostic::new(DiagnosticCode::NoElseInWhen, shape.span.clone())
                        .at_node(shape.node)
                        .with_argument("'else'"),
                );
            }
            return report;
        };

        let elements = domain.elements();
        let mut covered: BTreeSet<DomainElement> = BTreeSet::new();
        for case in &shape.cases {
            let matched = self.covered_by(domain, &elements, &case.label);
            if matched.is_empty() {
                continue;
            }
            if matched.iter().all(|element| covered.contains(element)) {
                report.diagnostics.push(
                    Diagnostic::new(DiagnosticCode::DuplicateLabelInWhen, case.span.clone())
                        .at_node(case.node)
                        .with_argument(describe(&case.label, self.registry)),
                );
            }
            covered.extend(matched);
        }

        let missing: Vec<DomainElement> = elements
            .into_iter()
            .filter(|element| !covered.contains(element))
            .collect();
        debug!(
            node = shape.node.0,
            domain = %domain,
            missing = missing.len(),
            has_else = shape.else_span.is_some(),
            "checked when coverage"
        );

        match &shape.else_span {
            Some(span) if missing.is_empty() => {
                report
                    .diagnostics
                    .push(Diagnostic::new(DiagnosticCode::RedundantElseInWhen, span.clone()).at_node(shape.node));
            }
            Some(_) => {}
            None if !missing.is_empty() => {
                let rendered: Vec<String> = missing.iter().map(|element| element.render(self.registry)).collect();
                let severity = if shape.used_as_expression {
                    Severity::Error
                } else {
                    Severity::Warning
                };
                report.diagnostics.push(
                    Diagnostic::new(DiagnosticCode::NoElseInWhen, shape.span.clone())
                        .at_node(shape.node)
                        .with_severity(severity)
                        .with_argument(rendered.join(", ")),
                );
            }
            None => {}
        }
        if shape.else_span.is_none() {
            report.exhaustive = missing.is_empty();
            report.missing = missing;
        }
        report
    }

    fn covered_by(&self, domain: &ClosedDomain, elements: &[DomainElement], label: &CaseLabel) -> Vec<DomainElement> {
        match label {
            CaseLabel::Value(element) => {
                if elements.contains(element) {
                    vec![element.clone()]
                } else {
                    Vec::new()
                }
            }
            CaseLabel::IsType { ty, negated } => elements
                .iter()
                .filter(|element| self.matches_type(domain, element, ty) != *negated)
                .cloned()
                .collect(),
            CaseLabel::Opaque => Vec::new(),
        }
    }

    fn matches_type(&self, domain: &ClosedDomain, element: &DomainElement, ty: &Type) -> bool {
        if *element == DomainElement::Null {
            return ty.is_nullable();
        }
        let Some(element_class) = domain.element_class(element) else {
            return false;
        };
        match ty {
            Type::Nominal { class, .. } => is_subclass(self.registry, element_class, *class),
            Type::Intersection(members) => members.iter().all(|member| match member.class_id() {
                Some(class) => is_subclass(self.registry, element_class, class),
                None => false,
            }),
            _ => false,
        }
    }
}

fn describe(label: &CaseLabel, registry: &TypeRegistry) -> String {
    match label {
        CaseLabel::Value(element) => element.render(registry),
        CaseLabel::IsType { ty, negated } => {
            let keyword = if *negated { "!is" } else { "is" };
            format!("'{keyword} {}'", registry.render(ty))
        }
        CaseLabel::Opaque => "condition".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_ast::{ClassKind, Modality};

    fn shape(domain: Option<ClosedDomain>, cases: Vec<CaseLabel>, has_else: bool, expression: bool) -> WhenShape {
        WhenShape {
            node: NodeId(1),
            span: Span::dummy(),
            domain,
            cases: cases
                .into_iter()
                .enumerate()
                .map(|(index, label)| WhenCase {
                    node: NodeId(10 + index as u32),
                    label,
                    span: Span::new(index + 2, 1, index + 2, 5),
                })
                .collect(),
            else_span: has_else.then(Span::dummy),
            used_as_expression: expression,
        }
    }

    #[test]
    fn boolean_expression_reports_missing_false() {
        let registry = TypeRegistry::with_builtins();
        let checker = ExhaustivenessChecker::new(&registry);
        let report = checker.check(&shape(
            Some(ClosedDomain::Boolean { nullable: false }),
            vec![CaseLabel::Value(DomainElement::True)],
            false,
            true,
        ));
        assert_eq!(report.missing, vec![DomainElement::False]);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].code, DiagnosticCode::NoElseInWhen);
        assert_eq!(report.diagnostics[0].arguments, vec!["'false'".to_string()]);
        assert!(report.diagnostics[0].is_error());
    }

    #[test]
    fn statement_over_closed_domain_only_warns() {
        let registry = TypeRegistry::with_builtins();
        let checker = ExhaustivenessChecker::new(&registry);
        let report = checker.check(&shape(
            Some(ClosedDomain::Boolean { nullable: true }),
            vec![CaseLabel::Value(DomainElement::True), CaseLabel::Value(DomainElement::False)],
            false,
            false,
        ));
        assert_eq!(report.missing, vec![DomainElement::Null]);
        assert_eq!(report.diagnostics[0].severity, Severity::Warning);
    }

    #[test]
    fn redundant_else_and_duplicate_label() {
        let mut registry = TypeRegistry::with_builtins();
        let color = registry.add_class("Color", "app.Color", ClassKind::EnumClass, Modality::Final);
        registry.set_enum_entries(color, vec!["RED".into(), "GREEN".into()]);
        let domain = ClosedDomain::of(&Type::nominal(color), &registry);
        let checker = ExhaustivenessChecker::new(&registry);
        let report = checker.check(&shape(
            domain,
            vec![
                CaseLabel::Value(DomainElement::EnumEntry("RED".into())),
                CaseLabel::Value(DomainElement::EnumEntry("RED".into())),
                CaseLabel::IsType {
                    ty: Type::nominal(color),
                    negated: false,
                },
            ],
            true,
            true,
        ));
        let codes: Vec<DiagnosticCode> = report.diagnostics.iter().map(|diagnostic| diagnostic.code).collect();
        assert_eq!(
            codes,
            vec![DiagnosticCode::DuplicateLabelInWhen, DiagnosticCode::RedundantElseInWhen]
        );
        assert!(report.is_exhaustive());
        assert!(report.missing.is_empty());
    }

    #[test]
    fn subjectless_expression_needs_else() {
        let registry = TypeRegistry::with_builtins();
        let checker = ExhaustivenessChecker::new(&registry);
        let report = checker.check(&shape(None, vec![CaseLabel::Opaque], false, true));
        assert!(!report.is_exhaustive());
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].arguments, vec!["'else'".to_string()]);
        assert!(checker.check(&shape(None, vec![CaseLabel::Opaque], false, false)).diagnostics.is_empty());
    }
}

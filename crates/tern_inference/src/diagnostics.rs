//! Diagnostic vocabulary shared by resolution, flow analysis and tooling.
//!
//! Codes form a closed set with stable SCREAMING_SNAKE_CASE names. Each code
//! has a descriptor with a message template (`{0}`, `{1}` are replaced by the
//! diagnostic arguments) and a remediation hint.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use tern_ast::{NodeId, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    TypeMismatch,
    OverloadResolutionAmbiguity,
    UnresolvedReference,
    NoneApplicable,
    NoValueForParameter,
    TooManyArguments,
    NamedParameterNotFound,
    ArgumentPassedTwice,
    MixingNamedAndPositionedArguments,
    WrongNumberOfTypeArguments,
    UpperBoundViolated,
    CannotInferType,
    CannotInferParameterType,
    CallableReferenceResolutionAmbiguity,
    UnsafeCall,
    UnnecessaryNotNullAssertion,
    IncompatibleTypes,
    NoCompanionObject,
    NoElseInWhen,
    RedundantElseInWhen,
    DuplicateLabelInWhen,
    ValReassignment,
    UninitializedVariable,
    CapturedValInitialization,
    InvalidIfAsExpression,
    ConditionTypeMismatch,
    NoReturnInFunctionWithBlockBody,
    UnreachableCode,
    TypecheckerHasRunIntoRecursiveProblem,
    InferenceLimitExceeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticDescriptor {
    pub code: DiagnosticCode,
    pub name: &'static str,
    pub severity: Severity,
    pub template: &'static str,
    pub help: &'static str,
}

macro_rules! descriptor {
    ($code:ident, $name:literal, $severity:ident, $template:literal, $help:literal) => {
        DiagnosticDescriptor {
            code: DiagnosticCode::$code,
            name: $name,
            severity: Severity::$severity,
            template: $template,
            help: $help,
        }
    };
}

/// Ordered like the `DiagnosticCode` variants.
const DESCRIPTORS: &[DiagnosticDescriptor] = &[
    descriptor!(TypeMismatch, "TYPE_MISMATCH", Error,
        "Type mismatch: inferred type is {1} but {0} was expected",
        "Change the expression or the expected type so that they agree."),
    descriptor!(OverloadResolutionAmbiguity, "OVERLOAD_RESOLUTION_AMBIGUITY", Error,
        "Overload resolution ambiguity between candidates: {0}",
        "Add explicit argument types or type arguments to select one candidate."),
    descriptor!(UnresolvedReference, "UNRESOLVED_REFERENCE", Error,
        "Unresolved reference: {0}",
        "Check the spelling or add the missing import."),
    descriptor!(NoneApplicable, "NONE_APPLICABLE", Error,
        "None of the following candidates is applicable: {0}",
        "Adjust the arguments to match one of the candidate signatures."),
    descriptor!(NoValueForParameter, "NO_VALUE_FOR_PARAMETER", Error,
        "No value passed for parameter '{0}'",
        "Pass an argument for the parameter or give it a default value."),
    descriptor!(TooManyArguments, "TOO_MANY_ARGUMENTS", Error,
        "Too many arguments for {0}",
        "Remove the extra arguments."),
    descriptor!(NamedParameterNotFound, "NAMED_PARAMETER_NOT_FOUND", Error,
        "Cannot find a parameter with this name: {0}",
        "Use one of the parameter names declared by the callee."),
    descriptor!(ArgumentPassedTwice, "ARGUMENT_PASSED_TWICE", Error,
        "An argument is already passed for parameter '{0}'",
        "Pass each parameter at most once."),
    descriptor!(MixingNamedAndPositionedArguments, "MIXING_NAMED_AND_POSITIONED_ARGUMENTS", Error,
        "Mixing named and positioned arguments is not allowed",
        "Name the remaining arguments as well."),
    descriptor!(WrongNumberOfTypeArguments, "WRONG_NUMBER_OF_TYPE_ARGUMENTS", Error,
        "{0} type arguments expected for {1}",
        "Pass one type argument per declared type parameter."),
    descriptor!(UpperBoundViolated, "UPPER_BOUND_VIOLATED", Error,
        "Type argument is not within its bounds: expected {0}, found {1}",
        "Choose a type argument that satisfies the declared upper bound."),
    descriptor!(CannotInferType, "CANNOT_INFER_TYPE", Error,
        "Not enough information to infer type variable {0}",
        "Specify the type arguments explicitly."),
    descriptor!(CannotInferParameterType, "CANNOT_INFER_PARAMETER_TYPE", Error,
        "Cannot infer a type for this parameter: {0}",
        "Declare the lambda parameter type explicitly."),
    descriptor!(CallableReferenceResolutionAmbiguity, "CALLABLE_REFERENCE_RESOLUTION_AMBIGUITY", Error,
        "Callable reference resolution ambiguity: {0}",
        "Give the reference an explicit expected function type."),
    descriptor!(UnsafeCall, "UNSAFE_CALL", Error,
        "Only safe (?.) or non-null asserted (!!.) calls are allowed on a nullable receiver of type {0}",
        "Check the receiver for null first or use a safe call."),
    descriptor!(UnnecessaryNotNullAssertion, "UNNECESSARY_NOT_NULL_ASSERTION", Warning,
        "Unnecessary non-null assertion (!!) on a non-null receiver of type {0}",
        "Remove the assertion."),
    descriptor!(IncompatibleTypes, "INCOMPATIBLE_TYPES", Error,
        "Incompatible types: {0} and {1}",
        "The check can never succeed; remove it or fix the type."),
    descriptor!(NoCompanionObject, "NO_COMPANION_OBJECT", Error,
        "Classifier '{0}' does not have a companion object, and thus must be initialized here",
        "Call a constructor or refer to a member of the class."),
    descriptor!(NoElseInWhen, "NO_ELSE_IN_WHEN", Error,
        "'when' expression must be exhaustive, add necessary {0} branches or 'else' branch instead",
        "Add the missing branches or an 'else' branch."),
    descriptor!(RedundantElseInWhen, "REDUNDANT_ELSE_IN_WHEN", Warning,
        "'when' is exhaustive so 'else' is redundant here",
        "Remove the 'else' branch."),
    descriptor!(DuplicateLabelInWhen, "DUPLICATE_LABEL_IN_WHEN", Warning,
        "Duplicate label in when: {0}",
        "Remove the branch condition that can never match."),
    descriptor!(ValReassignment, "VAL_REASSIGNMENT", Error,
        "Val cannot be reassigned: {0}",
        "Declare the variable with 'var' or assign it only once."),
    descriptor!(UninitializedVariable, "UNINITIALIZED_VARIABLE", Error,
        "Variable '{0}' must be initialized",
        "Assign the variable on every path before reading it."),
    descriptor!(CapturedValInitialization, "CAPTURED_VAL_INITIALIZATION", Error,
        "Captured values initialization is forbidden due to possible reassignment: {0}",
        "Initialize the value outside of the lambda."),
    descriptor!(InvalidIfAsExpression, "INVALID_IF_AS_EXPRESSION", Error,
        "'if' must have both main and 'else' branches if used as an expression",
        "Add an 'else' branch."),
    descriptor!(ConditionTypeMismatch, "CONDITION_TYPE_MISMATCH", Error,
        "Condition type mismatch: inferred type is {0} but Boolean was expected",
        "Use a Boolean expression as the condition."),
    descriptor!(NoReturnInFunctionWithBlockBody, "NO_RETURN_IN_FUNCTION_WITH_BLOCK_BODY", Error,
        "A 'return' expression required in a function with a block body: {0}",
        "Return a value on every path or change the return type to Unit."),
    descriptor!(UnreachableCode, "UNREACHABLE_CODE", Warning,
        "Unreachable code",
        "Remove the code or the jump that precedes it."),
    descriptor!(TypecheckerHasRunIntoRecursiveProblem, "TYPECHECKER_HAS_RUN_INTO_RECURSIVE_PROBLEM", Error,
        "Type checking has run into a recursive problem: {0}",
        "Declare the return type explicitly."),
    descriptor!(InferenceLimitExceeded, "INFERENCE_LIMIT_EXCEEDED", Error,
        "Inference limit exceeded: {0}",
        "Split the expression or raise the configured limit."),
];

/// The whole vocabulary in code order.
pub fn descriptors() -> &'static [DiagnosticDescriptor] {
    DESCRIPTORS
}

static BY_NAME: Lazy<FxHashMap<&'static str, DiagnosticCode>> = Lazy::new(|| {
    DESCRIPTORS
        .iter()
        .map(|descriptor| (descriptor.name, descriptor.code))
        .collect()
});

impl DiagnosticCode {
    pub fn descriptor(self) -> &'static DiagnosticDescriptor {
        &DESCRIPTORS[self as usize]
    }

    pub fn as_str(self) -> &'static str {
        self.descriptor().name
    }

    pub fn default_severity(self) -> Severity {
        self.descriptor().severity
    }

    pub fn all() -> impl Iterator<Item = DiagnosticCode> {
        DESCRIPTORS.iter().map(|descriptor| descriptor.code)
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Looks up a code by its stable name.
pub fn lookup(name: &str) -> Option<&'static DiagnosticDescriptor> {
    BY_NAME.get(name).map(|code| code.descriptor())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub span: Span,
    pub node: Option<NodeId>,
    pub arguments: Vec<String>,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, span: Span) -> Self {
        Self {
            code,
            severity: code.default_severity(),
            span,
            node: None,
            arguments: Vec::new(),
        }
    }

    pub fn at_node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_argument(mut self, argument: impl Into<String>) -> Self {
        self.arguments.push(argument.into());
        self
    }

    pub fn with_arguments<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(arguments.into_iter().map(Into::into));
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Renders the descriptor template with the arguments.
    pub fn message(&self) -> String {
        let mut message = self.code.descriptor().template.to_string();
        for (index, argument) in self.arguments.iter().enumerate() {
            message = message.replace(&format!("{{{index}}}"), argument);
        }
        message
    }

    /// Ordering used for stable output: position, then code, then arguments.
    pub fn sort_key(&self) -> (&Span, DiagnosticCode, &[String]) {
        (&self.span, self.code, &self.arguments)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} [{}] {}", self.span, self.severity, self.code, self.message())
    }
}

/// Sorts by position and drops exact duplicates.
pub fn normalize(diagnostics: &mut Vec<Diagnostic>) {
    diagnostics.sort_by(|left, right| left.sort_key().cmp(&right.sort_key()));
    diagnostics.dedup();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_table_follows_variant_order() {
        for (index, descriptor) in DESCRIPTORS.iter().enumerate() {
            assert_eq!(descriptor.code as usize, index, "{} out of order", descriptor.name);
        }
    }

    #[test]
    fn names_match_serde_representation() {
        for code in DiagnosticCode::all() {
            let json = serde_json::to_string(&code).expect("serialize");
            assert_eq!(json, format!("\"{}\"", code.as_str()));
            assert_eq!(lookup(code.as_str()).map(|d| d.code), Some(code));
        }
    }

    #[test]
    fn message_substitutes_arguments() {
        let diagnostic = Diagnostic::new(DiagnosticCode::TypeMismatch, Span::dummy())
            .with_arguments(["Int", "String"]);
        assert_eq!(
            diagnostic.message(),
            "Type mismatch: inferred type is String but Int was expected"
        );
        assert!(diagnostic.is_error());
    }

    #[test]
    fn normalize_sorts_and_dedups() {
        let late = Diagnostic::new(DiagnosticCode::UnreachableCode, Span::new(9, 1, 9, 1));
        let early = Diagnostic::new(DiagnosticCode::UnsafeCall, Span::new(2, 1, 2, 1));
        let mut diagnostics = vec![late.clone(), early.clone(), late.clone()];
        normalize(&mut diagnostics);
        assert_eq!(diagnostics, vec![early, late]);
    }
}

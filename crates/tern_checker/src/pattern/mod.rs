//! Exhaustiveness of `when`: closed domains of subject types and coverage of
//! their branches.

mod domain;
mod exhaustiveness;

pub use domain::{is_subclass, ClosedDomain, DomainElement};
pub use exhaustiveness::{CaseLabel, ExhaustivenessChecker, ExhaustivenessReport, WhenCase, WhenShape};

use std::fmt;

use super::expression::Expression;

/// Decides whether an utterance expression satisfies a trigger expression.
pub trait ExpressionMatcher: fmt::Debug {
    fn matches(&self, said: &Expression, trigger: &Expression) -> bool;
}

/// Normalized forms equal ignoring case; type tags are not compared.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaseInsensitiveMatcher;

impl ExpressionMatcher for CaseInsensitiveMatcher {
    fn matches(&self, said: &Expression, trigger: &Expression) -> bool {
        said.normalized().to_lowercase() == trigger.normalized().to_lowercase()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatcher;

impl ExpressionMatcher for ExactMatcher {
    fn matches(&self, said: &Expression, trigger: &Expression) -> bool {
        said.normalized() == trigger.normalized()
    }
}

/// Case-insensitive text match that also requires equal type tags.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeMatcher;

impl ExpressionMatcher for TypeMatcher {
    fn matches(&self, said: &Expression, trigger: &Expression) -> bool {
        said.type_tag() == trigger.type_tag() && CaseInsensitiveMatcher.matches(said, trigger)
    }
}

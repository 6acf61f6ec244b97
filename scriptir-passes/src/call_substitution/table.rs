//! Tables deciding how calls to named functions are rewritten.

use std::str::FromStr;

use derive_more::Display;
use indexmap::IndexMap;
use scriptir_core::callable::QualifiedName;
use scriptir_core::ops::{OpType, Symbol};
use smol_str::SmolStr;
use thiserror::Error;

/// How a call to a function is rewritten.
#[derive(Clone, Debug, Display, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CallRule {
    /// Replace the call with a single node performing the operation.
    #[display("{_0}")]
    SubstituteOp(OpType),
    /// Inline the body of the callee, if it has one.
    #[display("inline")]
    Inline,
}

/// A single entry of a [`SubstitutionTable`].
#[derive(Clone, Debug, Display, PartialEq, Eq)]
#[display("{namespace}.{name}={rule}")]
pub struct SubstitutionRule {
    /// Trailing atoms of the callee namespace.
    pub namespace: QualifiedName,
    /// Local name of the callee.
    pub name: SmolStr,
    /// The rewrite to apply.
    pub rule: CallRule,
}

/// Error parsing a [`SubstitutionRule`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("Invalid substitution rule {0:?}, expected `namespace.name=ns::op` or `namespace.name=inline`")]
pub struct InvalidRule(pub String);

impl FromStr for SubstitutionRule {
    type Err = InvalidRule;

    /// Parses `torch.nn.functional.interpolate=aten::__interpolate`, or
    /// `some.namespace.f=inline`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidRule(s.to_owned());
        let (callee, target) = s.split_once('=').ok_or_else(invalid)?;
        let callee: QualifiedName = callee.trim().parse().map_err(|_| invalid())?;
        let namespace = QualifiedName::new(callee.prefix().iter().cloned()).map_err(|_| invalid())?;
        let rule = match target.trim() {
            "inline" => CallRule::Inline,
            op => CallRule::SubstituteOp(op.parse::<Symbol>().map_err(|_| invalid())?.into()),
        };
        Ok(Self {
            namespace,
            name: callee.name().into(),
            rule,
        })
    }
}

/// Maps `(namespace, name)` pairs to the [`CallRule`] applied to calls of
/// matching functions.
///
/// A callee matches an entry if its local name equals the entry name and its
/// namespace ends with the entry namespace, compared atom by atom. Hence
/// `torch.nn.functional` matches both `torch.nn.functional.interpolate` and
/// `__torch__.torch.nn.functional.interpolate`, but not
/// `mytorch.nn.functional.interpolate`. Entries are tried in insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubstitutionTable {
    rules: IndexMap<(QualifiedName, SmolStr), CallRule>,
}

impl SubstitutionTable {
    /// Creates an empty table: every call is inlined.
    pub fn new() -> Self {
        Self::default()
    }

    /// The rules used when exporting to ONNX: `torch.nn.functional.interpolate`
    /// is replaced by `aten::__interpolate`.
    pub fn onnx() -> Self {
        Self::new().with_rule(
            QualifiedName::new_unchecked(["torch", "nn", "functional"]),
            "interpolate",
            CallRule::SubstituteOp(Symbol::aten("__interpolate").into()),
        )
    }

    /// Adds a rule, replacing any rule for the same namespace and name.
    pub fn with_rule(
        mut self,
        namespace: QualifiedName,
        name: impl Into<SmolStr>,
        rule: CallRule,
    ) -> Self {
        self.insert(namespace, name, rule);
        self
    }

    /// Adds a rule, returning the rule previously registered for the same
    /// namespace and name.
    pub fn insert(
        &mut self,
        namespace: QualifiedName,
        name: impl Into<SmolStr>,
        rule: CallRule,
    ) -> Option<CallRule> {
        self.rules.insert((namespace, name.into()), rule)
    }

    /// The rule applying to calls of `callee`, if any.
    pub fn lookup(&self, callee: &QualifiedName) -> Option<&CallRule> {
        self.rules
            .iter()
            .find(|((namespace, name), _)| {
                name.as_str() == callee.name() && callee.prefix().ends_with(namespace.atoms())
            })
            .map(|(_, rule)| rule)
    }

    /// Iterates over the rules in insertion order.
    pub fn rules(&self) -> impl Iterator<Item = SubstitutionRule> + '_ {
        self.rules
            .iter()
            .map(|((namespace, name), rule)| SubstitutionRule {
                namespace: namespace.clone(),
                name: name.clone(),
                rule: rule.clone(),
            })
    }

    /// Returns `true` if the table has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Extend<SubstitutionRule> for SubstitutionTable {
    fn extend<T: IntoIterator<Item = SubstitutionRule>>(&mut self, iter: T) {
        for r in iter {
            self.insert(r.namespace, r.name, r.rule);
        }
    }
}

impl FromIterator<SubstitutionRule> for SubstitutionTable {
    fn from_iter<T: IntoIterator<Item = SubstitutionRule>>(iter: T) -> Self {
        let mut table = Self::new();
        table.extend(iter);
        table
    }
}

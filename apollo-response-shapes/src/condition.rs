//! Symbolic presence conditions over directive variables and type conditions.

use std::collections::BTreeSet;
use std::fmt;

use apollo_compiler::Name;
use apollo_compiler::collections::IndexSet;
use itertools::Itertools;
use serde::Serialize;

/// A boolean expression describing when a field or fragment is present in a
/// response.
///
/// Atoms are boolean directive variables and type conditions. `And`/`Or`
/// operands are kept as ordered sets so that structurally equal conditions
/// compare equal regardless of construction order. The [`and`](Self::and) and
/// [`or`](Self::or) constructors simplify as they combine, so conditions
/// built through them stay free of redundant constants.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Condition {
    True,
    False,
    /// True iff the runtime type is one of the possible types of this name.
    Type(Name),
    /// True iff the boolean variable with this name is true.
    Variable(Name),
    Not(Box<Condition>),
    And(BTreeSet<Condition>),
    Or(BTreeSet<Condition>),
}

impl Condition {
    /// The conjunction of `self` and `other`. Adjacent `And` nodes are
    /// flattened into one operand set.
    pub fn and(self, other: Condition) -> Condition {
        let mut operands = BTreeSet::new();
        for condition in [self, other] {
            match condition {
                Condition::And(inner) => operands.extend(inner),
                condition => {
                    operands.insert(condition);
                }
            }
        }
        Condition::And(operands).simplify()
    }

    /// The disjunction of `self` and `other`. Adjacent `Or` nodes are
    /// flattened into one operand set.
    pub fn or(self, other: Condition) -> Condition {
        let mut operands = BTreeSet::new();
        for condition in [self, other] {
            match condition {
                Condition::Or(inner) => operands.extend(inner),
                condition => {
                    operands.insert(condition);
                }
            }
        }
        Condition::Or(operands).simplify()
    }

    /// Evaluates against the set of variables that are true and the set of
    /// type conditions the runtime type satisfies. Names absent from either
    /// set count as false.
    pub fn evaluate(&self, variables: &IndexSet<Name>, type_conditions: &IndexSet<Name>) -> bool {
        match self {
            Condition::True => true,
            Condition::False => false,
            Condition::Type(name) => type_conditions.contains(name),
            Condition::Variable(name) => variables.contains(name),
            Condition::Not(inner) => !inner.evaluate(variables, type_conditions),
            Condition::And(operands) => operands
                .iter()
                .all(|operand| operand.evaluate(variables, type_conditions)),
            Condition::Or(operands) => operands
                .iter()
                .any(|operand| operand.evaluate(variables, type_conditions)),
        }
    }

    /// Returns an equivalent condition with constants removed from `And`/`Or`
    /// operand sets, single-operand nodes collapsed to the operand, and empty
    /// `And`/`Or` collapsed to `True`/`False`.
    ///
    /// Idempotent, but not a normal form: `Not` passes through unchanged and
    /// no cross-operand factoring is attempted.
    pub fn simplify(&self) -> Condition {
        match self {
            Condition::And(operands) => {
                let simplified: BTreeSet<Condition> = operands
                    .iter()
                    .map(|operand| operand.simplify())
                    .filter(|operand| *operand != Condition::True)
                    .collect();
                if simplified.contains(&Condition::False) {
                    return Condition::False;
                }
                let mut operands = simplified.into_iter();
                match (operands.next(), operands.next()) {
                    (None, _) => Condition::True,
                    (Some(only), None) => only,
                    (Some(first), Some(second)) => {
                        Condition::And([first, second].into_iter().chain(operands).collect())
                    }
                }
            }
            Condition::Or(operands) => {
                let simplified: BTreeSet<Condition> = operands
                    .iter()
                    .map(|operand| operand.simplify())
                    .filter(|operand| *operand != Condition::False)
                    .collect();
                if simplified.contains(&Condition::True) {
                    return Condition::True;
                }
                let mut operands = simplified.into_iter();
                match (operands.next(), operands.next()) {
                    (None, _) => Condition::False,
                    (Some(only), None) => only,
                    (Some(first), Some(second)) => {
                        Condition::Or([first, second].into_iter().chain(operands).collect())
                    }
                }
            }
            Condition::True
            | Condition::False
            | Condition::Type(_)
            | Condition::Variable(_)
            | Condition::Not(_) => self.clone(),
        }
    }

    /// The variable names appearing anywhere in the condition.
    pub fn variables(&self) -> IndexSet<Name> {
        let mut variables = IndexSet::default();
        self.collect_variables(&mut variables);
        variables
    }

    fn collect_variables(&self, variables: &mut IndexSet<Name>) {
        match self {
            Condition::Variable(name) => {
                variables.insert(name.clone());
            }
            Condition::Not(inner) => inner.collect_variables(variables),
            Condition::And(operands) | Condition::Or(operands) => {
                for operand in operands {
                    operand.collect_variables(variables);
                }
            }
            Condition::True | Condition::False | Condition::Type(_) => {}
        }
    }
}

impl std::ops::Not for Condition {
    type Output = Condition;

    fn not(self) -> Condition {
        Condition::Not(Box::new(self))
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::True => f.write_str("true"),
            Condition::False => f.write_str("false"),
            Condition::Type(name) => write!(f, "{name}"),
            Condition::Variable(name) => write!(f, "${name}"),
            Condition::Not(inner) => write!(f, "¬{inner}"),
            Condition::And(operands) => write!(f, "({})", operands.iter().format(" ∧ ")),
            Condition::Or(operands) => write!(f, "({})", operands.iter().format(" ∨ ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use apollo_compiler::name;
    use rstest::rstest;

    use super::*;

    fn var(name: &str) -> Condition {
        Condition::Variable(Name::new(name).unwrap())
    }

    fn ty(name: &str) -> Condition {
        Condition::Type(Name::new(name).unwrap())
    }

    #[rstest]
    #[case(Condition::True.and(var("a")), var("a"))]
    #[case(Condition::False.and(var("a")), Condition::False)]
    #[case(Condition::True.or(var("a")), Condition::True)]
    #[case(Condition::False.or(var("a")), var("a"))]
    #[case(Condition::And(BTreeSet::new()), Condition::True)]
    #[case(Condition::Or(BTreeSet::new()), Condition::False)]
    #[case(var("a").and(var("a")), var("a"))]
    #[case(
        Condition::Or(BTreeSet::from([Condition::And(BTreeSet::from([Condition::True]))])),
        Condition::True
    )]
    fn simplify_removes_redundant_constants(#[case] input: Condition, #[case] expected: Condition) {
        assert_eq!(input.simplify(), expected);
    }

    #[test]
    fn and_flattens_adjacent_conjunctions() {
        let condition = ty("Character").and(var("a")).and(ty("Character"));
        assert_eq!(
            condition,
            Condition::And(BTreeSet::from([ty("Character"), var("a")]))
        );
    }

    #[test]
    fn simplify_is_idempotent() {
        let conditions = [
            Condition::True,
            !var("a"),
            ty("Human").and(var("a")).or(ty("Droid")),
            Condition::And(BTreeSet::from([Condition::True, Condition::False])),
            Condition::Or(BTreeSet::from([var("a"), Condition::False])),
        ];
        for condition in conditions {
            let once = condition.simplify();
            assert_eq!(once.simplify(), once);
        }
    }

    #[test]
    fn simplify_preserves_evaluation() {
        let conditions = [
            ty("Human").and(var("a")).or(ty("Droid")),
            Condition::And(BTreeSet::from([Condition::True, var("a"), var("b")])),
            Condition::Or(BTreeSet::from([Condition::False, !var("a")])),
            (!var("a")).and(ty("Human")),
        ];
        let variable_sets: [&[&str]; 4] = [&[], &["a"], &["b"], &["a", "b"]];
        let type_sets: [&[&str]; 2] = [&[], &["Human"]];
        for condition in &conditions {
            for variable_names in &variable_sets {
                for type_names in &type_sets {
                    let variables: IndexSet<Name> = variable_names
                        .iter()
                        .map(|name| Name::new(name).unwrap())
                        .collect();
                    let types: IndexSet<Name> = type_names
                        .iter()
                        .map(|name| Name::new(name).unwrap())
                        .collect();
                    assert_eq!(
                        condition.evaluate(&variables, &types),
                        condition.simplify().evaluate(&variables, &types),
                        "{condition} diverged after simplification",
                    );
                }
            }
        }
    }

    #[test]
    fn evaluate_treats_absent_names_as_false() {
        let condition = ty("Human").and(!var("a"));
        let no_variables = IndexSet::default();
        let human = IndexSet::from_iter([name!("Human")]);
        assert!(condition.evaluate(&no_variables, &human));
        let a_true = IndexSet::from_iter([name!("a")]);
        assert!(!condition.evaluate(&a_true, &human));
        assert!(!condition.evaluate(&no_variables, &IndexSet::default()));
    }

    #[test]
    fn variables_are_extracted_from_nested_operands() {
        let condition = ty("Human").and(var("a")).or(!var("b"));
        let variables = condition.variables();
        assert_eq!(
            variables,
            IndexSet::from_iter([name!("a"), name!("b")])
        );
    }

    #[test]
    fn display_uses_logical_connectives() {
        assert_eq!(ty("Character").and(var("a")).to_string(), "(Character ∧ $a)");
        assert_eq!(ty("Character").or(!var("a")).to_string(), "(Character ∨ ¬$a)");
        assert_eq!(Condition::True.to_string(), "true");
    }
}

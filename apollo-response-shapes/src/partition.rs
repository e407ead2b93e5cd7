//! Reduces the observed type conditions to the combinations actually
//! distinguishable among the base type's concrete types.

use apollo_compiler::Name;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::collections::IndexSet;

use crate::error::ShapeError;
use crate::internal_error;
use crate::schema::ShapeSchema;

/// One distinguishable combination of type conditions, together with the
/// directive variables guarding entry into any of them.
#[derive(Debug, Clone)]
pub(crate) struct ShapePartition {
    pub(crate) type_conditions: IndexSet<Name>,
    pub(crate) variables: IndexSet<Name>,
}

impl ShapePartition {
    /// All `2^k` truth assignments over this partition's variables, each as
    /// the set of variables assigned true. The all-false assignment comes
    /// first. `k` counts the variables guarding this partition's type
    /// conditions, not the operation's whole variable list.
    pub(crate) fn variable_assignments(&self) -> Vec<IndexSet<Name>> {
        (0..1_usize << self.variables.len())
            .map(|mask| {
                self.variables
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| mask & (1 << index) != 0)
                    .map(|(_, variable)| variable.clone())
                    .collect()
            })
            .collect()
    }
}

/// Groups the base type's concrete types by the subset of observed type
/// conditions each satisfies. Distinct subsets become partitions, so two
/// concrete types selecting the same fields share one partition. The
/// degenerate base-type partition is always present.
pub(crate) fn partition_type_conditions(
    schema: &ShapeSchema,
    base_type: &Name,
    observed: &IndexMap<Name, IndexSet<Name>>,
) -> Result<Vec<ShapePartition>, ShapeError> {
    let mut possible_types = IndexMap::default();
    for type_condition in observed.keys() {
        possible_types.insert(
            type_condition.clone(),
            schema.possible_types(type_condition)?,
        );
    }
    let base_possible_types = possible_types
        .get(base_type)
        .ok_or_else(|| internal_error!("base type {base_type} was not collected"))?;

    let mut subsets: Vec<IndexSet<Name>> = Vec::new();
    for concrete_type in base_possible_types {
        let satisfied: IndexSet<Name> = observed
            .keys()
            .filter(|type_condition| possible_types[*type_condition].contains(concrete_type))
            .cloned()
            .collect();
        if !subsets.contains(&satisfied) {
            subsets.push(satisfied);
        }
    }
    let degenerate = IndexSet::from_iter([base_type.clone()]);
    if !subsets.contains(&degenerate) {
        subsets.push(degenerate);
    }

    Ok(subsets
        .into_iter()
        .map(|type_conditions| {
            let variables = type_conditions
                .iter()
                .flat_map(|type_condition| {
                    observed.get(type_condition).into_iter().flatten().cloned()
                })
                .collect();
            ShapePartition {
                type_conditions,
                variables,
            }
        })
        .collect())
}

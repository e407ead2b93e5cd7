//! Materializes one field set per partition cell, then merges the
//! structurally identical ones into the final shape list.

use std::fmt;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::collections::IndexSet;
use apollo_compiler::executable::Fragment;
use apollo_compiler::executable::SelectionSet;
use itertools::Itertools;
use serde::Serialize;
use tracing::trace;

use crate::bail;
use crate::collect::CollectedField;
use crate::collect::CollectedSelections;
use crate::collect::FieldCollector;
use crate::condition::Condition;
use crate::display_helpers::State;
use crate::error::ShapeError;
use crate::partition::ShapePartition;
use crate::partition::partition_type_conditions;
use crate::schema::ShapeSchema;

/// The conjunction of atoms under which one field set applies: the
/// partition's type conditions plus the directive variables assigned true.
/// The conditions of one [`FieldSet`] are alternatives, implicitly or'd.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSetCondition {
    pub type_conditions: IndexSet<Name>,
    pub variables: IndexSet<Name>,
}

impl FieldSetCondition {
    /// Merges two conditions whose symmetric difference is at most one atom
    /// into their intersection (`A∧B ∨ A∧¬B = A`). Returns `None` when they
    /// differ by more than that.
    fn merge_with(&self, other: &Self) -> Option<Self> {
        let common_types: IndexSet<Name> = self
            .type_conditions
            .intersection(&other.type_conditions)
            .cloned()
            .collect();
        let common_variables: IndexSet<Name> = self
            .variables
            .intersection(&other.variables)
            .cloned()
            .collect();
        let extra_atoms = (self.type_conditions.len() - common_types.len())
            + (other.type_conditions.len() - common_types.len())
            + (self.variables.len() - common_variables.len())
            + (other.variables.len() - common_variables.len());
        (extra_atoms <= 1).then(|| Self {
            type_conditions: common_types,
            variables: common_variables,
        })
    }
}

impl fmt::Display for FieldSetCondition {
    fn fmt(&self, output: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            output,
            "[{}]",
            self.type_conditions
                .iter()
                .map(|name| name.to_string())
                .chain(self.variables.iter().map(|name| format!("${name}")))
                .format(" ∧ ")
        )
    }
}

/// One response field of a field set, synthesized from every collected
/// occurrence sharing its response name within one partition cell.
#[derive(Debug, Clone, Serialize)]
pub struct ShapeField {
    pub name: Name,
    pub alias: Option<Name>,
    #[serde(serialize_with = "crate::display_helpers::serialize_as_debug_string")]
    pub(crate) definition: Node<ast::FieldDefinition>,
    pub can_be_skipped: bool,
    /// Exact runtime presence condition: the or of every contributing
    /// occurrence's condition.
    pub condition: Condition,
    /// Recursively derived shapes for composite fields, `None` for leaves.
    pub shapes: Option<Shapes>,
}

impl ShapeField {
    pub fn response_name(&self) -> &Name {
        self.alias.as_ref().unwrap_or(&self.name)
    }

    /// The schema definition this field resolves to. Code generation reads
    /// the description and deprecation off it.
    pub fn definition(&self) -> &Node<ast::FieldDefinition> {
        &self.definition
    }

    /// The declared schema type, with its list and non-null wrappers.
    pub fn ty(&self) -> &ast::Type {
        &self.definition.ty
    }

    /// A field is nullable in the generated model when its schema type is
    /// nullable or when any directive can remove it at runtime.
    pub fn is_nullable(&self) -> bool {
        self.can_be_skipped || !self.ty().is_non_null()
    }

    fn write_indented(&self, state: &mut State<'_, '_>) -> fmt::Result {
        state.write_fmt(format_args!("{}: {}", self.response_name(), self.ty()))?;
        if self.can_be_skipped {
            state.write(" [skippable]")?;
        }
        if self.condition != Condition::True {
            state.write_fmt(format_args!(" if {}", self.condition))?;
        }
        if let Some(shapes) = &self.shapes {
            state.write(" ")?;
            shapes.write_indented(state)?;
        }
        Ok(())
    }
}

impl fmt::Display for ShapeField {
    fn fmt(&self, output: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(&mut State::new(output))
    }
}

/// One concrete form the response can take: a fully resolved field list, the
/// alternative conditions under which it applies, and the named fragments a
/// response of this form implements.
#[derive(Debug, Clone, Serialize)]
pub struct FieldSet {
    pub conditions: Vec<FieldSetCondition>,
    pub implemented_fragments: Vec<Name>,
    pub fields: Vec<ShapeField>,
}

impl FieldSet {
    pub fn field(&self, response_name: &str) -> Option<&ShapeField> {
        self.fields
            .iter()
            .find(|field| field.response_name() == response_name)
    }

    /// Whether this is the degenerate form, reached without entering any type
    /// condition or directive variable.
    pub fn is_base(&self, base_type: &Name) -> bool {
        self.conditions.iter().any(|condition| {
            condition.variables.is_empty()
                && condition.type_conditions.len() == 1
                && condition.type_conditions.contains(base_type)
        })
    }

    fn write_indented(&self, state: &mut State<'_, '_>) -> fmt::Result {
        state.write_fmt(format_args!("{}", self.conditions.iter().format(" ∨ ")))?;
        if !self.implemented_fragments.is_empty() {
            state.write(" implements ")?;
            state.write_fmt(format_args!(
                "{}",
                self.implemented_fragments.iter().format(", ")
            ))?;
        }
        if self.fields.is_empty() {
            return state.write(" {}");
        }
        state.write(" {")?;
        state.indent_no_new_line();
        for field in &self.fields {
            state.new_line()?;
            field.write_indented(state)?;
        }
        state.dedent()?;
        state.write("}")
    }
}

impl fmt::Display for FieldSet {
    fn fmt(&self, output: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(&mut State::new(output))
    }
}

/// Every distinct form one selection's response can take.
#[derive(Debug, Clone, Serialize)]
pub struct Shapes {
    /// Representative fields present, with identical type and nullability, in
    /// every field set.
    pub common_fields: Vec<ShapeField>,
    pub field_sets: Vec<FieldSet>,
}

impl Shapes {
    pub(crate) fn write_indented(&self, state: &mut State<'_, '_>) -> fmt::Result {
        state.write("{")?;
        state.indent_no_new_line();
        if !self.common_fields.is_empty() {
            state.new_line()?;
            state.write("common: ")?;
            state.write_fmt(format_args!(
                "{}",
                self.common_fields
                    .iter()
                    .map(ShapeField::response_name)
                    .format(", ")
            ))?;
        }
        for field_set in &self.field_sets {
            state.new_line()?;
            field_set.write_indented(state)?;
        }
        state.dedent()?;
        state.write("}")
    }
}

impl fmt::Display for Shapes {
    fn fmt(&self, output: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(&mut State::new(output))
    }
}

/// Runs the whole pipeline for one group of sibling selection sets:
/// collection, partitioning, materialization, then structural deduplication.
/// Composite fields re-enter [`ShapesBuilder::shapes`] with their own
/// selection sets and leaf type.
pub(crate) struct ShapesBuilder<'a> {
    schema: &'a ShapeSchema,
    fragment_defs: &'a IndexMap<Name, Node<Fragment>>,
}

impl<'a> ShapesBuilder<'a> {
    pub(crate) fn new(
        schema: &'a ShapeSchema,
        fragment_defs: &'a IndexMap<Name, Node<Fragment>>,
    ) -> Self {
        Self {
            schema,
            fragment_defs,
        }
    }

    pub(crate) fn shapes(
        &self,
        selection_sets: &[&SelectionSet],
        base_type: &Name,
    ) -> Result<Shapes, ShapeError> {
        let collected =
            FieldCollector::collect(self.schema, self.fragment_defs, selection_sets, base_type)?;
        if collected.fields.is_empty() {
            return Ok(Shapes {
                common_fields: Vec::new(),
                field_sets: Vec::new(),
            });
        }
        let partitions =
            partition_type_conditions(self.schema, base_type, &collected.type_conditions)?;
        trace!(
            base_type = %base_type,
            fields = collected.fields.len(),
            partitions = partitions.len(),
            "materializing response shapes"
        );
        let mut field_sets = Vec::new();
        for partition in &partitions {
            for assignment in partition.variable_assignments() {
                field_sets.push(self.materialize(&collected, partition, &assignment)?);
            }
        }
        let mut field_sets = merge_identical_field_sets(field_sets);
        for field_set in &mut field_sets {
            field_set.conditions = simplify_conditions(std::mem::take(&mut field_set.conditions));
        }
        let common_fields = common_fields(&field_sets);
        trace!(field_sets = field_sets.len(), "deduplicated response shapes");
        Ok(Shapes {
            common_fields,
            field_sets,
        })
    }

    /// Builds the field set for one (partition, assignment) cell: the
    /// collected fields whose shape condition holds there, grouped by
    /// response name.
    fn materialize(
        &self,
        collected: &CollectedSelections,
        partition: &ShapePartition,
        assignment: &IndexSet<Name>,
    ) -> Result<FieldSet, ShapeError> {
        let mut groups: IndexMap<Name, Vec<&CollectedField>> = IndexMap::default();
        for field in &collected.fields {
            if field
                .shape_boolean_expression
                .evaluate(assignment, &partition.type_conditions)
            {
                groups
                    .entry(field.response_name().clone())
                    .or_default()
                    .push(field);
            }
        }
        let mut fields = Vec::with_capacity(groups.len());
        for (response_name, group) in &groups {
            fields.push(self.merge_group(response_name, group)?);
        }
        let implemented_fragments = collected
            .fragments
            .iter()
            .filter(|fragment| {
                fragment
                    .shape_boolean_expression
                    .evaluate(assignment, &partition.type_conditions)
            })
            .map(|fragment| fragment.name.clone())
            .unique()
            .collect();
        Ok(FieldSet {
            conditions: vec![FieldSetCondition {
                type_conditions: partition.type_conditions.clone(),
                variables: assignment.clone(),
            }],
            implemented_fragments,
            fields,
        })
    }

    /// Synthesizes the single response field for one group of occurrences
    /// sharing a response name. The field is skippable only when every
    /// occurrence is; composite groups recurse with every occurrence's
    /// selection set against the first occurrence's leaf type.
    fn merge_group(
        &self,
        response_name: &Name,
        group: &[&CollectedField],
    ) -> Result<ShapeField, ShapeError> {
        let Some((first, rest)) = group.split_first() else {
            bail!("empty field group for {response_name}");
        };
        for other in rest {
            if other.field.name != first.field.name {
                return Err(ShapeError::ResponseShapeMismatch {
                    response_name: response_name.clone(),
                    message: format!(
                        "selects both {}.{} and {}.{}",
                        first.parent_type, first.field.name, other.parent_type, other.field.name
                    ),
                });
            }
            if !types_can_be_merged(self.schema, &first.definition.ty, &other.definition.ty)? {
                return Err(ShapeError::ResponseShapeMismatch {
                    response_name: response_name.clone(),
                    message: format!(
                        "has incompatible types {} on {} and {} on {}",
                        first.definition.ty,
                        first.parent_type,
                        other.definition.ty,
                        other.parent_type
                    ),
                });
            }
        }
        let can_be_skipped = group.iter().all(|field| field.can_be_skipped);
        let condition = group.iter().fold(Condition::False, |condition, field| {
            condition.or(field.boolean_expression.clone())
        });
        let leaf_type = first.definition.ty.inner_named_type();
        let shapes = if self.schema.is_composite(leaf_type)? {
            let selection_sets: Vec<&SelectionSet> = group
                .iter()
                .map(|field| &field.field.selection_set)
                .collect();
            Some(self.shapes(&selection_sets, leaf_type)?)
        } else {
            None
        };
        Ok(ShapeField {
            name: first.field.name.clone(),
            alias: first.field.alias.clone(),
            definition: first.definition.clone(),
            can_be_skipped,
            condition,
            shapes,
        })
    }
}

/// The "same response shape" rule for two occurrences of one response name:
/// identical list and non-null structure, identical leaf type for scalars and
/// enums. Composite leaf types may differ (covariant overrides across type
/// conditions).
fn types_can_be_merged(
    schema: &ShapeSchema,
    first: &ast::Type,
    second: &ast::Type,
) -> Result<bool, ShapeError> {
    match (first, second) {
        (ast::Type::Named(first_name), ast::Type::Named(second_name))
        | (ast::Type::NonNullNamed(first_name), ast::Type::NonNullNamed(second_name)) => {
            Ok(first_name == second_name
                || (schema.is_composite(first_name)? && schema.is_composite(second_name)?))
        }
        (ast::Type::List(first_inner), ast::Type::List(second_inner))
        | (ast::Type::NonNullList(first_inner), ast::Type::NonNullList(second_inner)) => {
            types_can_be_merged(schema, first_inner, second_inner)
        }
        _ => Ok(false),
    }
}

/// Keeps the first-encountered field set of every structural equivalence
/// class, unioning the conditions and implemented fragments of the others
/// into it.
fn merge_identical_field_sets(field_sets: Vec<FieldSet>) -> Vec<FieldSet> {
    let mut merged: Vec<FieldSet> = Vec::new();
    for field_set in field_sets {
        if let Some(representative) = merged
            .iter_mut()
            .find(|candidate| field_sets_identical(candidate, &field_set))
        {
            for condition in field_set.conditions {
                if !representative.conditions.contains(&condition) {
                    representative.conditions.push(condition);
                }
            }
            for fragment in field_set.implemented_fragments {
                if !representative.implemented_fragments.contains(&fragment) {
                    representative.implemented_fragments.push(fragment);
                }
            }
        } else {
            merged.push(field_set);
        }
    }
    merged
}

/// Two field sets produce the same generated model: same response names, and
/// per name the same nullability, the same type modulo the outermost
/// non-null, and recursively the same common fields.
fn field_sets_identical(first: &FieldSet, second: &FieldSet) -> bool {
    first.fields.len() == second.fields.len()
        && first.fields.iter().all(|field| {
            second
                .field(field.response_name())
                .is_some_and(|candidate| fields_identical(field, candidate))
        })
}

fn fields_identical(first: &ShapeField, second: &ShapeField) -> bool {
    if first.is_nullable() != second.is_nullable() {
        return false;
    }
    if !stripped_types_equal(first.ty(), second.ty()) {
        return false;
    }
    match (&first.shapes, &second.shapes) {
        (None, None) => true,
        (Some(first_shapes), Some(second_shapes)) => common_fields_identical(
            &first_shapes.common_fields,
            &second_shapes.common_fields,
        ),
        _ => false,
    }
}

fn common_fields_identical(first: &[ShapeField], second: &[ShapeField]) -> bool {
    first.len() == second.len()
        && first.iter().all(|field| {
            second.iter().any(|candidate| {
                candidate.response_name() == field.response_name()
                    && fields_identical(field, candidate)
            })
        })
}

/// Same type modulo the outermost non-null marker. A skippable `String!` and
/// a plain `String` field produce the same generated shape; nullability is
/// compared separately.
fn stripped_types_equal(first: &ast::Type, second: &ast::Type) -> bool {
    match (first, second) {
        (
            ast::Type::Named(first_name) | ast::Type::NonNullNamed(first_name),
            ast::Type::Named(second_name) | ast::Type::NonNullNamed(second_name),
        ) => first_name == second_name,
        (
            ast::Type::List(first_inner) | ast::Type::NonNullList(first_inner),
            ast::Type::List(second_inner) | ast::Type::NonNullList(second_inner),
        ) => first_inner == second_inner,
        _ => false,
    }
}

/// `A∧B ∨ A∧¬B = A`: repeatedly merges any two conditions whose symmetric
/// difference is at most one atom, restarting after every merge. A heuristic,
/// not a minimal-form reducer.
fn simplify_conditions(mut conditions: Vec<FieldSetCondition>) -> Vec<FieldSetCondition> {
    'restart: loop {
        for first_index in 0..conditions.len() {
            for second_index in first_index + 1..conditions.len() {
                if let Some(merged) =
                    conditions[first_index].merge_with(&conditions[second_index])
                {
                    conditions[first_index] = merged;
                    conditions.remove(second_index);
                    continue 'restart;
                }
            }
        }
        return conditions;
    }
}

/// The fields shared by every field set, identical in type and nullability.
/// One representative per response name, taken from the first set.
fn common_fields(field_sets: &[FieldSet]) -> Vec<ShapeField> {
    let Some((first, rest)) = field_sets.split_first() else {
        return Vec::new();
    };
    first
        .fields
        .iter()
        .filter(|field| {
            rest.iter().all(|field_set| {
                field_set
                    .field(field.response_name())
                    .is_some_and(|candidate| fields_identical(field, candidate))
            })
        })
        .cloned()
        .collect()
}

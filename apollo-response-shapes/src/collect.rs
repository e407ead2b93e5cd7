//! Flattens validated selection trees into condition-annotated field lists.

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::collections::IndexSet;
use apollo_compiler::executable;
use apollo_compiler::executable::Fragment;
use apollo_compiler::executable::Selection;
use apollo_compiler::executable::SelectionSet;

use crate::condition::Condition;
use crate::error::ShapeError;
use crate::schema::ShapeSchema;

/// One occurrence of a field in the traversed selection tree.
///
/// `boolean_expression` is the exact runtime presence condition.
/// `shape_boolean_expression` leaves out inline-fragment directive conditions
/// so that conditional inline fragments never multiply the generated shape
/// count. Collapsing the two changes which fields become nullable versus
/// which shapes get generated.
#[derive(Debug, Clone)]
pub(crate) struct CollectedField {
    pub(crate) field: Node<executable::Field>,
    pub(crate) parent_type: Name,
    pub(crate) definition: Node<ast::FieldDefinition>,
    pub(crate) can_be_skipped: bool,
    pub(crate) boolean_expression: Condition,
    pub(crate) shape_boolean_expression: Condition,
}

impl CollectedField {
    pub(crate) fn response_name(&self) -> &Name {
        self.field.response_key()
    }
}

/// One fragment-spread occurrence. The condition includes the fragment's own
/// type condition, so evaluating it under a partition and assignment answers
/// whether the resulting shape implements the fragment.
#[derive(Debug, Clone)]
pub(crate) struct CollectedFragment {
    pub(crate) name: Name,
    pub(crate) shape_boolean_expression: Condition,
}

/// Everything the collector found in one group of sibling selection sets.
#[derive(Debug, Clone)]
pub(crate) struct CollectedSelections {
    pub(crate) fields: Vec<CollectedField>,
    pub(crate) fragments: Vec<CollectedFragment>,
    /// Observed type conditions, each mapped to the directive variables
    /// guarding entry into it. The base type is always present.
    pub(crate) type_conditions: IndexMap<Name, IndexSet<Name>>,
}

/// Depth-first collector over `Field`/`InlineFragment`/`FragmentSpread`
/// selections. Fragment reuse is handled by re-walking the fragment's
/// selections at every usage site, so the output is a plain value tree.
pub(crate) struct FieldCollector<'a> {
    schema: &'a ShapeSchema,
    fragment_defs: &'a IndexMap<Name, Node<Fragment>>,
    fields: Vec<CollectedField>,
    fragments: Vec<CollectedFragment>,
    type_conditions: IndexMap<Name, IndexSet<Name>>,
}

impl<'a> FieldCollector<'a> {
    pub(crate) fn collect(
        schema: &'a ShapeSchema,
        fragment_defs: &'a IndexMap<Name, Node<Fragment>>,
        selection_sets: &[&'a SelectionSet],
        base_type: &Name,
    ) -> Result<CollectedSelections, ShapeError> {
        let mut collector = Self {
            schema,
            fragment_defs,
            fields: Vec::new(),
            fragments: Vec::new(),
            type_conditions: IndexMap::default(),
        };
        collector
            .type_conditions
            .insert(base_type.clone(), IndexSet::default());
        for selection_set in selection_sets {
            collector.collect_selection_set(
                selection_set,
                Condition::True,
                Condition::True,
                base_type,
                false,
            )?;
        }
        Ok(CollectedSelections {
            fields: collector.fields,
            fragments: collector.fragments,
            type_conditions: collector.type_conditions,
        })
    }

    fn collect_selection_set(
        &mut self,
        selection_set: &SelectionSet,
        condition: Condition,
        shape_condition: Condition,
        parent_type: &Name,
        can_be_skipped: bool,
    ) -> Result<(), ShapeError> {
        let condition = condition.and(Condition::Type(parent_type.clone()));
        let shape_condition = shape_condition.and(Condition::Type(parent_type.clone()));
        for selection in &selection_set.selections {
            match selection {
                Selection::Field(field) => {
                    let definition = self.schema.field_definition(parent_type, &field.name)?;
                    let local_condition = condition_from_directives(&field.directives)?;
                    self.fields.push(CollectedField {
                        field: field.clone(),
                        parent_type: parent_type.clone(),
                        definition,
                        can_be_skipped: can_be_skipped || local_condition != Condition::True,
                        boolean_expression: condition.clone().and(local_condition),
                        shape_boolean_expression: shape_condition.clone(),
                    });
                }
                Selection::InlineFragment(inline) => {
                    let directive_condition = condition_from_directives(&inline.directives)?;
                    let type_condition = inline.type_condition.as_ref().unwrap_or(parent_type);
                    self.type_conditions
                        .entry(type_condition.clone())
                        .or_default();
                    // Inline-fragment directives join the runtime condition
                    // but not the shape condition.
                    self.collect_selection_set(
                        &inline.selection_set,
                        condition.clone().and(directive_condition.clone()),
                        shape_condition.clone(),
                        type_condition,
                        can_be_skipped || directive_condition != Condition::True,
                    )?;
                }
                Selection::FragmentSpread(spread) => {
                    let fragment =
                        self.fragment_defs
                            .get(&spread.fragment_name)
                            .ok_or_else(|| ShapeError::UnknownFragment {
                                name: spread.fragment_name.clone(),
                            })?;
                    let directive_condition = condition_from_directives(&spread.directives)?;
                    let type_condition = fragment.type_condition();
                    self.type_conditions
                        .entry(type_condition.clone())
                        .or_default()
                        .extend(directive_condition.variables());
                    let spread_condition = condition.clone().and(directive_condition.clone());
                    let spread_shape_condition =
                        shape_condition.clone().and(directive_condition.clone());
                    self.fragments.push(CollectedFragment {
                        name: spread.fragment_name.clone(),
                        shape_boolean_expression: spread_shape_condition
                            .clone()
                            .and(Condition::Type(type_condition.clone())),
                    });
                    // Spread directives split shapes (their variables guard
                    // the fragment's type condition), so they do not make the
                    // spread fields skippable within one shape.
                    self.collect_selection_set(
                        &fragment.selection_set,
                        spread_condition,
                        spread_shape_condition,
                        type_condition,
                        can_be_skipped,
                    )?;
                }
            }
        }
        Ok(())
    }
}

/// Translates the `@skip`/`@include` directives of one selection into a
/// condition over their `if` arguments. Returns `True` when neither is
/// present; when both are, their conditions are conjoined.
fn condition_from_directives(
    directives: &ast::DirectiveList,
) -> Result<Condition, ShapeError> {
    let mut condition = Condition::True;
    for (directive_name, negate) in [("include", false), ("skip", true)] {
        let Some(directive) = directives.get(directive_name) else {
            continue;
        };
        let Some(value) = directive.specified_argument_by_name("if") else {
            return Err(ShapeError::MalformedCondition {
                directive: directive_name,
            });
        };
        let argument_condition = match value.as_ref() {
            ast::Value::Boolean(value) => {
                if *value != negate {
                    Condition::True
                } else {
                    Condition::False
                }
            }
            ast::Value::Variable(variable) => {
                let atom = Condition::Variable(variable.clone());
                if negate { !atom } else { atom }
            }
            _ => {
                return Err(ShapeError::MalformedCondition {
                    directive: directive_name,
                });
            }
        };
        condition = condition.and(argument_condition);
    }
    Ok(condition)
}

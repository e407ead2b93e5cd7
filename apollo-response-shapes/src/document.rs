//! Document-level driver: derives shapes for every operation and, when
//! enabled, every named fragment definition of a validated document.

use apollo_compiler::ExecutableDocument;
use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast;
use apollo_compiler::collections::IndexSet;
use apollo_compiler::executable::Fragment;
use apollo_compiler::executable::Operation;
use apollo_compiler::executable::OperationType;
use apollo_compiler::executable::Selection;
use apollo_compiler::executable::SelectionSet;
use apollo_compiler::validation::Valid;
use serde::Serialize;
use tracing::debug;

use crate::error::ShapeError;
use crate::field_set::Shapes;
use crate::field_set::ShapesBuilder;
use crate::schema::ShapeSchema;

#[derive(Debug, Clone)]
pub struct ShapeOptions {
    /// Also derive shapes for every named fragment definition, as roots in
    /// their own right. Clients generating standalone fragment models want
    /// this; servers checking operations usually do not.
    pub fragment_definition_shapes: bool,
}

impl Default for ShapeOptions {
    fn default() -> Self {
        Self {
            fragment_definition_shapes: true,
        }
    }
}

/// Derived shapes for one whole document.
#[derive(Debug, Clone, Serialize)]
pub struct ShapedDocument {
    pub operations: Vec<ShapedOperation>,
    pub fragments: Vec<ShapedFragment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShapedOperation {
    pub name: Option<Name>,
    #[serde(serialize_with = "crate::display_helpers::serialize_as_debug_string")]
    pub operation_type: OperationType,
    pub root_type: Name,
    #[serde(skip)]
    pub variables: Vec<Node<ast::VariableDefinition>>,
    pub shapes: Shapes,
    /// The serialized operation followed by every transitively used fragment
    /// in first-use order: the text a client sends over the wire.
    pub source_with_fragments: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShapedFragment {
    pub name: Name,
    pub type_condition: Name,
    /// Fragment definitions declare no variables; these are the ones the
    /// fragment (or any fragment it spreads) references.
    pub inferred_variables: IndexSet<Name>,
    pub shapes: Shapes,
    pub source: String,
}

/// Derives shapes for every operation in `document`, and for every named
/// fragment when [`ShapeOptions::fragment_definition_shapes`] is set.
pub fn shape_document(
    schema: &ShapeSchema,
    document: &Valid<ExecutableDocument>,
    options: &ShapeOptions,
) -> Result<ShapedDocument, ShapeError> {
    let mut operations = Vec::new();
    for operation in document
        .operations
        .anonymous
        .iter()
        .chain(document.operations.named.values())
    {
        operations.push(shape_operation(schema, document, operation)?);
    }
    let mut fragments = Vec::new();
    if options.fragment_definition_shapes {
        for fragment in document.fragments.values() {
            fragments.push(shape_fragment(schema, document, fragment)?);
        }
    }
    Ok(ShapedDocument {
        operations,
        fragments,
    })
}

pub fn shape_operation(
    schema: &ShapeSchema,
    document: &Valid<ExecutableDocument>,
    operation: &Node<Operation>,
) -> Result<ShapedOperation, ShapeError> {
    debug!(name = ?operation.name, "deriving operation shapes");
    let shapes = ShapesBuilder::new(schema, &document.fragments)
        .shapes(&[&operation.selection_set], &operation.selection_set.ty)?;
    Ok(ShapedOperation {
        name: operation.name.clone(),
        operation_type: operation.operation_type,
        root_type: operation.selection_set.ty.clone(),
        variables: operation.variables.clone(),
        shapes,
        source_with_fragments: source_with_fragments(document, operation)?,
    })
}

pub fn shape_fragment(
    schema: &ShapeSchema,
    document: &Valid<ExecutableDocument>,
    fragment: &Node<Fragment>,
) -> Result<ShapedFragment, ShapeError> {
    debug!(name = %fragment.name, "deriving fragment shapes");
    let shapes = ShapesBuilder::new(schema, &document.fragments)
        .shapes(&[&fragment.selection_set], fragment.type_condition())?;
    Ok(ShapedFragment {
        name: fragment.name.clone(),
        type_condition: fragment.type_condition().clone(),
        inferred_variables: inferred_variables(document, fragment)?,
        shapes,
        source: fragment.serialize().to_string(),
    })
}

fn source_with_fragments(
    document: &ExecutableDocument,
    operation: &Node<Operation>,
) -> Result<String, ShapeError> {
    let mut used = IndexSet::default();
    collect_used_fragments(document, &operation.selection_set, &mut used)?;
    let mut source = operation.serialize().to_string();
    for name in &used {
        let fragment = document
            .fragments
            .get(name)
            .ok_or_else(|| ShapeError::UnknownFragment { name: name.clone() })?;
        source.push_str("\n\n");
        source.push_str(&fragment.serialize().to_string());
    }
    Ok(source)
}

fn collect_used_fragments(
    document: &ExecutableDocument,
    selection_set: &SelectionSet,
    used: &mut IndexSet<Name>,
) -> Result<(), ShapeError> {
    for selection in &selection_set.selections {
        match selection {
            Selection::Field(field) => {
                collect_used_fragments(document, &field.selection_set, used)?;
            }
            Selection::InlineFragment(inline) => {
                collect_used_fragments(document, &inline.selection_set, used)?;
            }
            Selection::FragmentSpread(spread) => {
                if used.insert(spread.fragment_name.clone()) {
                    let fragment = document
                        .fragments
                        .get(&spread.fragment_name)
                        .ok_or_else(|| ShapeError::UnknownFragment {
                            name: spread.fragment_name.clone(),
                        })?;
                    collect_used_fragments(document, &fragment.selection_set, used)?;
                }
            }
        }
    }
    Ok(())
}

fn inferred_variables(
    document: &ExecutableDocument,
    fragment: &Node<Fragment>,
) -> Result<IndexSet<Name>, ShapeError> {
    let mut variables = IndexSet::default();
    let mut seen_fragments = IndexSet::default();
    seen_fragments.insert(fragment.name.clone());
    collect_variable_references(
        document,
        &fragment.selection_set,
        &mut variables,
        &mut seen_fragments,
    )?;
    Ok(variables)
}

fn collect_variable_references(
    document: &ExecutableDocument,
    selection_set: &SelectionSet,
    variables: &mut IndexSet<Name>,
    seen_fragments: &mut IndexSet<Name>,
) -> Result<(), ShapeError> {
    for selection in &selection_set.selections {
        match selection {
            Selection::Field(field) => {
                for argument in &field.arguments {
                    value_variable_references(&argument.value, variables);
                }
                directive_variable_references(&field.directives, variables);
                collect_variable_references(
                    document,
                    &field.selection_set,
                    variables,
                    seen_fragments,
                )?;
            }
            Selection::InlineFragment(inline) => {
                directive_variable_references(&inline.directives, variables);
                collect_variable_references(
                    document,
                    &inline.selection_set,
                    variables,
                    seen_fragments,
                )?;
            }
            Selection::FragmentSpread(spread) => {
                directive_variable_references(&spread.directives, variables);
                if seen_fragments.insert(spread.fragment_name.clone()) {
                    let fragment = document
                        .fragments
                        .get(&spread.fragment_name)
                        .ok_or_else(|| ShapeError::UnknownFragment {
                            name: spread.fragment_name.clone(),
                        })?;
                    collect_variable_references(
                        document,
                        &fragment.selection_set,
                        variables,
                        seen_fragments,
                    )?;
                }
            }
        }
    }
    Ok(())
}

fn directive_variable_references(
    directives: &ast::DirectiveList,
    variables: &mut IndexSet<Name>,
) {
    for directive in directives.iter() {
        for argument in &directive.arguments {
            value_variable_references(&argument.value, variables);
        }
    }
}

fn value_variable_references(value: &ast::Value, variables: &mut IndexSet<Name>) {
    match value {
        ast::Value::Variable(name) => {
            variables.insert(name.clone());
        }
        ast::Value::List(items) => {
            for item in items {
                value_variable_references(item, variables);
            }
        }
        ast::Value::Object(entries) => {
            for (_, entry) in entries {
                value_variable_references(entry, variables);
            }
        }
        _ => {}
    }
}

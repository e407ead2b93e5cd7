//! Read-only schema index injected into shape derivation.

use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::ast;
use apollo_compiler::collections::HashMap;
use apollo_compiler::collections::IndexSet;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::FieldLookupError;
use apollo_compiler::schema::Implementers;
use apollo_compiler::validation::Valid;

use crate::error::ShapeError;

/// A validated schema with its possible-types relation precomputed.
///
/// Encloses the data in an `Arc` so cloning is cheap; derivations for
/// different operations can share one instance across threads.
#[derive(Debug, Clone)]
pub struct ShapeSchema {
    inner: Arc<SchemaIndex>,
}

#[derive(Debug)]
struct SchemaIndex {
    schema: Valid<Schema>,
    implementers: HashMap<Name, Implementers>,
}

impl ShapeSchema {
    pub fn new(schema: Valid<Schema>) -> Self {
        let implementers = schema.implementers_map();
        Self {
            inner: Arc::new(SchemaIndex {
                schema,
                implementers,
            }),
        }
    }

    pub fn schema(&self) -> &Valid<Schema> {
        &self.inner.schema
    }

    pub(crate) fn type_definition(&self, name: &Name) -> Result<&ExtendedType, ShapeError> {
        self.inner
            .schema
            .types
            .get(name)
            .ok_or_else(|| ShapeError::UnknownType { name: name.clone() })
    }

    /// Whether values of this type carry sub-selections (object, interface or
    /// union as opposed to scalar or enum).
    pub(crate) fn is_composite(&self, name: &Name) -> Result<bool, ShapeError> {
        Ok(matches!(
            self.type_definition(name)?,
            ExtendedType::Object(_) | ExtendedType::Interface(_) | ExtendedType::Union(_)
        ))
    }

    /// The concrete object types a runtime value of `name` can take.
    pub(crate) fn possible_types(&self, name: &Name) -> Result<IndexSet<Name>, ShapeError> {
        match self.type_definition(name)? {
            ExtendedType::Object(_) => Ok(IndexSet::from_iter([name.clone()])),
            ExtendedType::Interface(_) => Ok(self
                .inner
                .implementers
                .get(name)
                .map(|implementers| implementers.objects.clone())
                .unwrap_or_default()),
            ExtendedType::Union(union_type) => Ok(union_type
                .members
                .iter()
                .map(|member| member.name.clone())
                .collect()),
            ExtendedType::Scalar(_) | ExtendedType::Enum(_) | ExtendedType::InputObject(_) => {
                Err(ShapeError::NonCompositeTypeCondition { name: name.clone() })
            }
        }
    }

    /// Resolves a field against a parent type, including meta-fields such as
    /// `__typename`.
    pub(crate) fn field_definition(
        &self,
        parent_type: &Name,
        field_name: &Name,
    ) -> Result<Node<ast::FieldDefinition>, ShapeError> {
        self.inner
            .schema
            .type_field(parent_type, field_name)
            .map(|component| component.node.clone())
            .map_err(|error| match error {
                FieldLookupError::NoSuchType => ShapeError::UnknownType {
                    name: parent_type.clone(),
                },
                FieldLookupError::NoSuchField(..) => ShapeError::UnknownField {
                    parent_type: parent_type.clone(),
                    field_name: field_name.clone(),
                },
            })
    }
}

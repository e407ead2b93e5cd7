//! Derivation of GraphQL response shapes.
//!
//! Given a validated operation or fragment, this crate enumerates every
//! distinct form its response can take at runtime under `@include`/`@skip`
//! variables and polymorphic type conditions, and annotates every field with
//! a symbolic presence condition. The resulting [`Shapes`] tree is what a
//! strongly-typed client code generator consumes to decide how many result
//! types to emit and which of their fields are optional. Each field set also
//! records the named fragments a response of that form implements.
//!
//! Parsing and validation are out of scope: inputs come in as
//! [`apollo_compiler`] `Valid<Schema>` / `Valid<ExecutableDocument>` values,
//! and anything a validator would have rejected surfaces here as a fatal
//! [`ShapeError`].

#![warn(
    rustdoc::broken_intra_doc_links,
    unreachable_pub,
    unreachable_patterns,
    unused,
    unused_qualifications,
    dead_code,
    while_true,
    unconditional_panic,
    clippy::all
)]

mod collect;
mod condition;
mod display_helpers;
mod document;
pub mod error;
mod field_set;
mod partition;
mod schema;

pub use crate::condition::Condition;
pub use crate::document::ShapeOptions;
pub use crate::document::ShapedDocument;
pub use crate::document::ShapedFragment;
pub use crate::document::ShapedOperation;
pub use crate::document::shape_document;
pub use crate::document::shape_fragment;
pub use crate::document::shape_operation;
pub use crate::error::ShapeError;
pub use crate::field_set::FieldSet;
pub use crate::field_set::FieldSetCondition;
pub use crate::field_set::ShapeField;
pub use crate::field_set::Shapes;
pub use crate::schema::ShapeSchema;

const _: () = {
    const fn assert_thread_safe<T: Sync + Send>() {}

    assert_thread_safe::<ShapeSchema>();
    assert_thread_safe::<Shapes>();
    assert_thread_safe::<ShapedDocument>();
};

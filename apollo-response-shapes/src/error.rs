use apollo_compiler::Name;

/// An error raised while deriving response shapes.
///
/// Shape derivation runs after document validation, so none of these are user
/// errors: every variant signals a broken invariant upstream or in this crate
/// and is unrecoverable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    #[error("type `{name}` is not defined in the schema")]
    UnknownType { name: Name },
    #[error("type `{parent_type}` has no field named `{field_name}`")]
    UnknownField {
        parent_type: Name,
        field_name: Name,
    },
    #[error("fragment `{name}` is not defined in the document")]
    UnknownFragment { name: Name },
    #[error("type condition `{name}` is not an object, interface or union type")]
    NonCompositeTypeCondition { name: Name },
    #[error("`@{directive}(if:)` expects a boolean literal or a variable argument")]
    MalformedCondition { directive: &'static str },
    #[error("selections for response name `{response_name}` have incompatible shapes: {message}")]
    ResponseShapeMismatch {
        response_name: Name,
        message: String,
    },
    #[error("{message}")]
    Internal { message: String },
}

impl ShapeError {
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Builds a [`ShapeError::Internal`] from format arguments.
#[macro_export]
macro_rules! internal_error {
    ( $( $arg:tt )+ ) => {
        $crate::error::ShapeError::internal(format!( $( $arg )+ ))
    };
}

/// Returns a [`ShapeError::Internal`] from the enclosing function.
#[macro_export]
macro_rules! bail {
    ( $( $arg:tt )+ ) => {
        return Err($crate::internal_error!( $( $arg )+ ).into());
    };
}

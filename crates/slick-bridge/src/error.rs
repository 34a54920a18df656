//! Error types for the bridge
//!
//! Every failure a script can trigger maps to one `BridgeError` variant.
//! Converting into `mlua::Error` turns it into an ordinary script error,
//! catchable with `pcall`.

use crate::config::ConfigError;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Bridge error types
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// A value shape has no representation on the other side
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// The host runtime could not resolve a class name
    #[error("Class not found: {0}")]
    ClassNotFound(String),

    /// No overload survived arity and type filtering
    #[error("No method found: {name}")]
    NoApplicableMethod {
        /// Method name (`<init>` for constructors)
        name: String,
    },

    /// More than one overload survived type filtering
    #[error("Ambiguous method: ({}) {name} {}", candidates.len(), candidates.join(" | "))]
    AmbiguousMethod {
        /// Method name (`<init>` for constructors)
        name: String,
        /// Declared parameter list of every surviving candidate
        candidates: Vec<String>,
    },

    /// The invoked host constructor or method failed
    #[error("Invocation failed: {0}")]
    Invocation(String),

    /// `require` failed for a module named by the host
    #[error("Error loading module {module}: {source}")]
    ModuleLoad {
        /// Dotted module name
        module: String,
        /// Script error raised while resolving or running the module
        source: mlua::Error,
    },

    /// The module loaded but has no such function
    #[error("Cannot find function {function} in module {module}")]
    FunctionNotFound {
        module: String,
        function: String,
    },

    /// The entry function raised a script error
    #[error("Error calling {module}.{function}: {source}")]
    Call {
        module: String,
        function: String,
        source: mlua::Error,
    },

    /// A reflective host operation failed outside of an invocation
    #[error("Host error: {0}")]
    Host(String),

    /// The asset archive could not be read
    #[error("Archive error: {0}")]
    Archive(String),

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Error raised by the scripting runtime itself
    #[error(transparent)]
    Lua(#[from] mlua::Error),
}

impl From<std::io::Error> for BridgeError {
    fn from(e: std::io::Error) -> Self {
        BridgeError::Archive(e.to_string())
    }
}

impl From<zip::result::ZipError> for BridgeError {
    fn from(e: zip::result::ZipError) -> Self {
        BridgeError::Archive(e.to_string())
    }
}

impl From<BridgeError> for mlua::Error {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::Lua(inner) => inner,
            other => mlua::Error::external(other),
        }
    }
}

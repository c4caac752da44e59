use thiserror::Error;

/// A location in script or inline-expression input, used for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Errors produced anywhere in the packet-flow pipeline.
#[derive(Error, Debug)]
pub enum PumpError {
    #[error("malformed parameter '{name}': {found}")]
    ParamFormat { name: String, found: String },

    #[error("parameter '{name}' out of range: {found}")]
    ParamRange { name: String, found: String },

    #[error("unknown parameter '{name}'")]
    ParamUnknown { name: String },

    #[error("{span}: {message}")]
    Parse { message: String, span: Span },

    #[error("{path}: {operation} failed: {source}")]
    FileIo { path: String, operation: String, #[source] source: std::io::Error },

    #[error("could not resolve host(s): {0}")]
    Resolution(String),

    #[error("could not send packet: {0}")]
    Send(String),

    #[error("buffer capacity exceeded: {0}")]
    Overflow(String),
}

pub type Result<T> = std::result::Result<T, PumpError>;

impl PumpError {
    pub fn parse(message: impl Into<String>, span: Span) -> Self {
        PumpError::Parse { message: message.into(), span }
    }

    pub fn file_io(path: impl Into<String>, operation: impl Into<String>, source: std::io::Error) -> Self {
        PumpError::FileIo { path: path.into(), operation: operation.into(), source }
    }
}

use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Parse,
    Verify,
    MissingEntry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CompilerError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for CompilerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

impl std::error::Error for CompilerError {}

#[macro_export]
macro_rules! compiler_error {
    ($kind:ident, $($arg:tt)*) => {
        $crate::CompilerError::new($crate::ErrorKind::$kind, format!($($arg)*))
    }
}

pub type Result<T> = std::result::Result<T, CompilerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let e = compiler_error!(MissingEntry, "function @{} not found", "main");
        assert_eq!(e.kind, ErrorKind::MissingEntry);
        assert_eq!(e.to_string(), "missing_entry error: function @main not found");
    }
}

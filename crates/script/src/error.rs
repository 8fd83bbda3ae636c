use std::fmt;

#[derive(Debug)]
pub enum ScriptError {
    Compile(String),
    Runtime(String),
    Panic(String),
    Io(String),
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::Compile(e) => write!(f, "script compile error: {e}"),
            ScriptError::Runtime(e) => write!(f, "script runtime error: {e}"),
            ScriptError::Panic(e) => write!(f, "script panicked: {e}"),
            ScriptError::Io(e) => write!(f, "script io error: {e}"),
        }
    }
}

impl std::error::Error for ScriptError {}

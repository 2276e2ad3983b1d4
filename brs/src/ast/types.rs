//! Type AST nodes

use serde::{Deserialize, Serialize};

/// Runtime type of a value, also used for declared parameter/return types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Interface,
    Invalid,
    Boolean,
    String,
    Int32,
    Int64,
    Float,
    Double,
    Callable,
    Uninitialized,
    Dynamic,
    Void,
    Object,
}

impl ValueKind {
    /// Parse a type name as written after `as` (case-insensitive)
    pub fn from_name(name: &str) -> Option<ValueKind> {
        match name.to_ascii_lowercase().as_str() {
            "interface" => Some(ValueKind::Interface),
            "invalid" => Some(ValueKind::Invalid),
            "boolean" => Some(ValueKind::Boolean),
            "string" => Some(ValueKind::String),
            "integer" => Some(ValueKind::Int32),
            "longinteger" => Some(ValueKind::Int64),
            "float" => Some(ValueKind::Float),
            "double" => Some(ValueKind::Double),
            "function" => Some(ValueKind::Callable),
            "dynamic" => Some(ValueKind::Dynamic),
            "void" => Some(ValueKind::Void),
            "object" => Some(ValueKind::Object),
            _ => None,
        }
    }

    /// Type implied by a trailing type designator (`a$`, `n%`, ...)
    pub fn from_designator(name: &str) -> Option<ValueKind> {
        match name.chars().last()? {
            '$' => Some(ValueKind::String),
            '%' => Some(ValueKind::Int32),
            '!' => Some(ValueKind::Float),
            '#' => Some(ValueKind::Double),
            '&' => Some(ValueKind::Int64),
            _ => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ValueKind::Int32 | ValueKind::Int64 | ValueKind::Float | ValueKind::Double
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Interface => "Interface",
            ValueKind::Invalid => "Invalid",
            ValueKind::Boolean => "Boolean",
            ValueKind::String => "String",
            ValueKind::Int32 => "Integer",
            ValueKind::Int64 => "LongInteger",
            ValueKind::Float => "Float",
            ValueKind::Double => "Double",
            ValueKind::Callable => "Function",
            ValueKind::Uninitialized => "<uninitialized>",
            ValueKind::Dynamic => "Dynamic",
            ValueKind::Void => "Void",
            ValueKind::Object => "Object",
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_case_insensitive() {
        assert_eq!(ValueKind::from_name("Integer"), Some(ValueKind::Int32));
        assert_eq!(ValueKind::from_name("LONGINTEGER"), Some(ValueKind::Int64));
        assert_eq!(ValueKind::from_name("function"), Some(ValueKind::Callable));
        assert_eq!(ValueKind::from_name("widget"), None);
    }

    #[test]
    fn test_from_designator() {
        assert_eq!(ValueKind::from_designator("name$"), Some(ValueKind::String));
        assert_eq!(ValueKind::from_designator("count%"), Some(ValueKind::Int32));
        assert_eq!(ValueKind::from_designator("ratio!"), Some(ValueKind::Float));
        assert_eq!(ValueKind::from_designator("big&"), Some(ValueKind::Int64));
        assert_eq!(ValueKind::from_designator("plain"), None);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(ValueKind::Int32.to_string(), "Integer");
        assert_eq!(ValueKind::Callable.to_string(), "Function");
        assert_eq!(ValueKind::Uninitialized.to_string(), "<uninitialized>");
    }
}

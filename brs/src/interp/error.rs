//! Runtime errors for the interpreter

use crate::ast::Location;
use std::fmt;

/// Fixed runtime error codes; each kind maps to an errno and a default message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NextWithoutFor,
    BadSyntax,
    MissingLineNumber,
    IndexOutOfBounds,
    DivideByZero,
    TypeMismatch,
    BadBitShift,
    MalformedThrow,
    UserDefined,
    ContinueForWithoutFor,
    ContinueWhileWithoutWhile,
    NameShadowsBuiltin,
    VarShadowsFunctionName,
    ExitForWithoutFor,
    ReturnWithoutValue,
    ReturnWithValue,
    ExitWhileWithoutWhile,
    StackOverflow,
    NotAFunction,
    BadLHS,
    UninitializedVariable,
    DotOnNonObject,
    MemberFunctionNotFound,
    ObjectClassNotFound,
    Stop,
    Break,
    NormalEnd,
    Internal,
    /// Code thrown by user code that has no entry in the table
    Custom(i32),
}

impl ErrorKind {
    const TABLE: [ErrorKind; 28] = [
        ErrorKind::NextWithoutFor,
        ErrorKind::BadSyntax,
        ErrorKind::MissingLineNumber,
        ErrorKind::IndexOutOfBounds,
        ErrorKind::DivideByZero,
        ErrorKind::TypeMismatch,
        ErrorKind::BadBitShift,
        ErrorKind::MalformedThrow,
        ErrorKind::UserDefined,
        ErrorKind::ContinueForWithoutFor,
        ErrorKind::ContinueWhileWithoutWhile,
        ErrorKind::NameShadowsBuiltin,
        ErrorKind::VarShadowsFunctionName,
        ErrorKind::ExitForWithoutFor,
        ErrorKind::ReturnWithoutValue,
        ErrorKind::ReturnWithValue,
        ErrorKind::ExitWhileWithoutWhile,
        ErrorKind::StackOverflow,
        ErrorKind::NotAFunction,
        ErrorKind::BadLHS,
        ErrorKind::UninitializedVariable,
        ErrorKind::DotOnNonObject,
        ErrorKind::MemberFunctionNotFound,
        ErrorKind::ObjectClassNotFound,
        ErrorKind::Stop,
        ErrorKind::Break,
        ErrorKind::NormalEnd,
        ErrorKind::Internal,
    ];

    pub fn errno(self) -> i32 {
        match self {
            ErrorKind::NextWithoutFor => 0,
            ErrorKind::BadSyntax => 2,
            ErrorKind::MissingLineNumber => 14,
            ErrorKind::IndexOutOfBounds => 16,
            ErrorKind::DivideByZero => 20,
            ErrorKind::TypeMismatch => 24,
            ErrorKind::BadBitShift => 30,
            ErrorKind::MalformedThrow => 38,
            ErrorKind::UserDefined => 40,
            ErrorKind::ContinueForWithoutFor => 141,
            ErrorKind::ContinueWhileWithoutWhile => 142,
            ErrorKind::NameShadowsBuiltin => 157,
            ErrorKind::VarShadowsFunctionName => 160,
            ErrorKind::ExitForWithoutFor => 165,
            ErrorKind::ReturnWithoutValue => 169,
            ErrorKind::ReturnWithValue => 170,
            ErrorKind::ExitWhileWithoutWhile => 175,
            ErrorKind::StackOverflow => 223,
            ErrorKind::NotAFunction => 224,
            ErrorKind::BadLHS => 228,
            ErrorKind::UninitializedVariable => 233,
            ErrorKind::DotOnNonObject => 236,
            ErrorKind::MemberFunctionNotFound => 244,
            ErrorKind::ObjectClassNotFound => 246,
            ErrorKind::Stop => 247,
            ErrorKind::Break => 248,
            ErrorKind::NormalEnd => 252,
            ErrorKind::Internal => 254,
            ErrorKind::Custom(errno) => errno,
        }
    }

    pub fn default_message(self) -> &'static str {
        match self {
            ErrorKind::NextWithoutFor => "Next Without For.",
            ErrorKind::BadSyntax => "Syntax Error.",
            ErrorKind::MissingLineNumber => "Label/Line Not Found.",
            ErrorKind::IndexOutOfBounds => "Array subscript out of bounds.",
            ErrorKind::DivideByZero => "Divide by Zero.",
            ErrorKind::TypeMismatch => "Type Mismatch.",
            ErrorKind::BadBitShift => "Invalid Bitwise Shift.",
            ErrorKind::MalformedThrow => "Thrown value neither string nor roAssociativeArray.",
            ErrorKind::UserDefined => "User-specified exception",
            ErrorKind::ContinueForWithoutFor => "Continue For is not inside a For loop",
            ErrorKind::ContinueWhileWithoutWhile => "Continue While is not inside a While",
            ErrorKind::NameShadowsBuiltin => "Syntax Error. Builtin function call expected.",
            ErrorKind::VarShadowsFunctionName => {
                "Variable name cannot be the same as that of a declared function."
            }
            ErrorKind::ExitForWithoutFor => "Exit For is not inside a For loop.",
            ErrorKind::ReturnWithoutValue => "Return must return a value.",
            ErrorKind::ReturnWithValue => {
                "Return can not have a return-value if inside a Sub or Function with Void return type."
            }
            ErrorKind::ExitWhileWithoutWhile => "Exit While is not inside a While.",
            ErrorKind::StackOverflow => "Stack overflow.",
            ErrorKind::NotAFunction => "Function Call Operator ( ) attempted on non-function.",
            ErrorKind::BadLHS => "Invalid value for left-side of expression.",
            ErrorKind::UninitializedVariable => "Use of uninitialized variable.",
            ErrorKind::DotOnNonObject => {
                "'Dot' Operator attempted with invalid BrightScript Component or interface reference."
            }
            ErrorKind::MemberFunctionNotFound => {
                "Member function not found in BrightScript Component or interface."
            }
            ErrorKind::ObjectClassNotFound => "BrightScript Component Class not Found.",
            ErrorKind::Stop => "STOP",
            ErrorKind::Break => "BREAK",
            ErrorKind::NormalEnd => "Normal End.",
            ErrorKind::Internal => "UNEXPECTED INTERNAL.",
            ErrorKind::Custom(_) => "UNKNOWN ERROR",
        }
    }

    /// Kind for an errno; codes outside the table become `Custom`
    pub fn from_errno(errno: i32) -> ErrorKind {
        Self::TABLE
            .into_iter()
            .find(|kind| kind.errno() == errno)
            .unwrap_or(ErrorKind::Custom(errno))
    }
}

/// One frame of the call stack
#[derive(Debug, Clone, PartialEq)]
pub struct TracePoint {
    pub function_name: String,
    pub function_loc: Location,
    pub call_loc: Location,
    /// `name(a As Integer) As Void`
    pub signature: String,
}

/// Runtime error raised while executing a program
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
    pub location: Option<Location>,
    /// Call stack captured when the error left its innermost function (outermost first)
    pub backtrace: Vec<TracePoint>,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        RuntimeError {
            kind,
            message: message.into(),
            location: None,
            backtrace: Vec::new(),
        }
    }

    /// Error carrying the kind's default message
    pub fn from_kind(kind: ErrorKind) -> Self {
        Self::new(kind, kind.default_message())
    }

    pub fn type_mismatch(detail: &str) -> Self {
        Self::new(ErrorKind::TypeMismatch, format!("Type Mismatch. {detail}"))
    }

    /// Failed conversion of a value into a declared or designated type
    pub fn cast(from: &str, to: &str) -> Self {
        Self::type_mismatch(&format!("Unable to cast \"{from}\" to \"{to}\"."))
    }

    pub fn divide_by_zero() -> Self {
        Self::from_kind(ErrorKind::DivideByZero)
    }

    pub fn index_out_of_bounds() -> Self {
        Self::from_kind(ErrorKind::IndexOutOfBounds)
    }

    pub fn bad_bit_shift() -> Self {
        Self::from_kind(ErrorKind::BadBitShift)
    }

    pub fn uninitialized() -> Self {
        Self::from_kind(ErrorKind::UninitializedVariable)
    }

    pub fn not_a_function(name: &str) -> Self {
        Self::new(
            ErrorKind::NotAFunction,
            format!("'{name}' is not a function and cannot be called."),
        )
    }

    pub fn member_not_found(name: &str) -> Self {
        Self::new(
            ErrorKind::MemberFunctionNotFound,
            format!(
                "{} ('{name}')",
                ErrorKind::MemberFunctionNotFound.default_message()
            ),
        )
    }

    pub fn dot_on_non_object() -> Self {
        Self::from_kind(ErrorKind::DotOnNonObject)
    }

    pub fn stack_overflow() -> Self {
        Self::from_kind(ErrorKind::StackOverflow)
    }

    pub fn missing_label(label: &str) -> Self {
        Self::new(
            ErrorKind::MissingLineNumber,
            format!("{} ('{label}')", ErrorKind::MissingLineNumber.default_message()),
        )
    }

    pub fn internal(detail: &str) -> Self {
        Self::new(
            ErrorKind::Internal,
            format!("{} {detail}", ErrorKind::Internal.default_message()),
        )
    }

    pub fn errno(&self) -> i32 {
        self.kind.errno()
    }

    /// Attach a location unless one is already set
    pub fn at(mut self, location: &Location) -> Self {
        if self.location.is_none() {
            self.location = Some(location.clone());
        }
        self
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{loc}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// Why execution ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// `end` statement
    EndStatement,
    /// `EXIT` issued by the debugger
    DebugExit,
    /// `stop` with no debugger attached
    Stop,
}

/// Everything that unwinds the interpreter: errors and terminations
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Error(RuntimeError),
    End(EndReason),
}

impl From<RuntimeError> for Signal {
    fn from(e: RuntimeError) -> Self {
        Signal::Error(e)
    }
}

impl Signal {
    /// Attach a location to an error signal
    pub fn at(self, location: &Location) -> Self {
        match self {
            Signal::Error(e) => Signal::Error(e.at(location)),
            end => end,
        }
    }
}

/// Result type for interpreter operations
pub type InterpResult<T> = Result<T, Signal>;

//! Error codes shared by the Surefire runtime and config compiler.
//!
//! Every fallible operation in the workspace threads one of these codes.
//! Compile-time failures are additionally wrapped with file/line/column
//! context by the compiler crate; the codes themselves stay flat so that
//! integrators can match on them without caring which subsystem fired.

/// Result alias used throughout the runtime.
pub type Result<T> = std::result::Result<T, Error>;

/// Flat error code enum, grouped by subsystem.
///
/// `Tok*` tokenizer, `Exp*` expression parser, `Exc*` expression
/// compiler, `Sv*`/`Svp*` state vector, `Smp*` state machine parser,
/// `Smc*` state machine compiler, `Sm*` state machine runtime, plus the
/// general codes at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Tokenizer
    /// Input contains a character sequence that matches no token rule.
    TokInvalid,

    // Expression parser
    /// Expression contains no tokens.
    ExpEmpty,
    /// Unbalanced parentheses.
    ExpParen,
    /// Token kind not allowed in an expression.
    ExpToken,
    /// Expression does not match any grammar rule.
    ExpSyntax,

    // Expression compiler
    /// Identifier does not name a known element.
    ExcElem,
    /// Numeric constant cannot be represented.
    ExcOverflow,
    /// Function called with the wrong number of arguments.
    ExcArity,
    /// Rolling window size is not an integer in [1, 10000].
    ExcWindow,
    /// Unknown function name.
    ExcFunc,

    // State vector parser
    /// Expected an element type identifier.
    SvpElemType,
    /// Expected an element name after the type.
    SvpElemName,
    /// Unexpected token in a state vector config.
    SvpToken,

    // State vector compiler / runtime table
    /// Config declares no regions.
    SvEmpty,
    /// Region name used more than once.
    SvRegionDupe,
    /// Element name used more than once.
    SvElemDupe,
    /// Region contains no elements.
    SvRegionEmpty,
    /// Unknown element type name.
    SvElemType,
    /// Elements do not exactly span the configured regions.
    SvLayout,

    // State machine parser
    /// Expected a label at the start of a state section.
    SmpNoLabel,
    /// Unknown label name.
    SmpLabel,
    /// Label appears more than once in a state.
    SmpLabelDupe,
    /// Expected an element type identifier.
    SmpElemType,
    /// Expected an element name after the type.
    SmpElemName,
    /// Expected `=` after a local element name.
    SmpLocalOp,
    /// Expected an initial value expression after `=`.
    SmpLocalValue,
    /// Redundant read-only annotation.
    SmpReadOnlyDupe,
    /// Element annotated with more than one alias.
    SmpAliasDupe,
    /// Expected an alias name after `@ALIAS`.
    SmpAlias,
    /// Unknown annotation.
    SmpAnnotation,
    /// More than one `[STATE_VECTOR]` section.
    SmpSvDupe,
    /// More than one `[LOCAL]` section.
    SmpLocalDupe,
    /// Unexpected token in a state machine config.
    SmpToken,
    /// Expected an assignment after an element name.
    SmpActionElem,
    /// Expected an assignment operator.
    SmpActionOp,
    /// Expected an expression after the assignment operator.
    SmpActionExpr,
    /// Statement is neither an assignment nor a transition.
    SmpActionToken,
    /// Expected a destination state after `->`.
    SmpTransDest,
    /// Token after `->` is not a state name.
    SmpTransToken,
    /// Unexpected token after a transition destination.
    SmpTransJunk,
    /// Expected a guard expression.
    SmpGuard,
    /// Unbalanced brace.
    SmpBrace,
    /// `ELSE` without a matching guard, or with an empty branch.
    SmpElse,

    // State machine compiler
    /// Element does not exist in the state vector.
    SmcSvElem,
    /// Unknown element type name.
    SmcType,
    /// Element type disagrees with the state vector.
    SmcTypeMismatch,
    /// Element name or alias used more than once.
    SmcElemDupe,
    /// State name used more than once.
    SmcStateDupe,
    /// No element named or aliased `G`.
    SmcNoGlobalTime,
    /// No element named or aliased `S`.
    SmcNoStateElem,
    /// Global time element is not U64.
    SmcGlobalTimeType,
    /// State element is not U32.
    SmcStateElemType,
    /// Local element initializer references the element itself.
    SmcSelfRef,
    /// Local element initializer references a later local element.
    SmcUseBeforeInit,
    /// Local element initializer references a state vector element.
    SmcLocalRefsSv,
    /// Assignment target is not a known element.
    SmcAssignElem,
    /// Assignment target is read-only.
    SmcElemReadOnly,
    /// Transition inside an exit label.
    SmcTransExit,
    /// Transition to an unknown state.
    SmcUnknownState,
    /// Config defines no states.
    SmcNoStates,

    // State machine runtime
    /// Step time is less than the previous step time.
    SmNonMonotonicTime,
    /// State id collides with the reserved `NO_STATE` value.
    SmStateReserved,
    /// Duplicate state id.
    SmStateDupe,
    /// State id not present in the state table.
    SmState,
    /// Transition action reached an exit label at runtime.
    SmTransExit,

    // General
    /// Config file could not be opened or read.
    File,
    /// Required configuration entry is missing.
    Null,
    /// Requested type does not match the stored type.
    TypeMismatch,
    /// Byte count does not match the region size.
    SizeMismatch,
    /// Name not present in the table.
    KeyNotFound,
    /// Lookup on a table with no entries of that kind.
    Empty,
    /// Reserved for integrations that decouple construction from use;
    /// safe construction in this crate returns `Err` instead of a
    /// partially-built object, so the runtime never produces this code.
    Uninitialized,
    /// Internal invariant violated.
    Unreachable,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Error::TokInvalid => "invalid token",
            Error::ExpEmpty => "empty expression",
            Error::ExpParen => "unbalanced parenthese",
            Error::ExpToken => "unexpected token in expression",
            Error::ExpSyntax => "invalid expression syntax",
            Error::ExcElem => "unknown element in expression",
            Error::ExcOverflow => "constant out of range",
            Error::ExcArity => "wrong number of function arguments",
            Error::ExcWindow => "invalid rolling window size",
            Error::ExcFunc => "unknown function",
            Error::SvpElemType => "expected element type",
            Error::SvpElemName => "expected element name",
            Error::SvpToken => "unexpected token in state vector config",
            Error::SvEmpty => "state vector config has no regions",
            Error::SvRegionDupe => "duplicate region name",
            Error::SvElemDupe => "duplicate element name",
            Error::SvRegionEmpty => "region is empty",
            Error::SvElemType => "unknown element type",
            Error::SvLayout => "elements do not span the configured regions",
            Error::SmpNoLabel => "expected label",
            Error::SmpLabel => "unknown label",
            Error::SmpLabelDupe => "duplicate label",
            Error::SmpElemType => "expected element type",
            Error::SmpElemName => "expected element name",
            Error::SmpLocalOp => "expected `=` after element name",
            Error::SmpLocalValue => "expected element initial value",
            Error::SmpReadOnlyDupe => "redundant read-only annotation",
            Error::SmpAliasDupe => "an element may only have one alias",
            Error::SmpAlias => "expected alias name",
            Error::SmpAnnotation => "unknown annotation",
            Error::SmpSvDupe => "more than one state vector section",
            Error::SmpLocalDupe => "more than one local section",
            Error::SmpToken => "unexpected token in state machine config",
            Error::SmpActionElem => "expected assignment after element name",
            Error::SmpActionOp => "expected assignment operator",
            Error::SmpActionExpr => "expected expression after assignment",
            Error::SmpActionToken => "expected assignment or transition",
            Error::SmpTransDest => "expected destination state",
            Error::SmpTransToken => "expected state name after `->`",
            Error::SmpTransJunk => "unexpected token after transition",
            Error::SmpGuard => "expected guard",
            Error::SmpBrace => "unbalanced brace",
            Error::SmpElse => "else without matching guard",
            Error::SmcSvElem => "element does not exist in state vector",
            Error::SmcType => "unknown element type",
            Error::SmcTypeMismatch => "element type mismatch",
            Error::SmcElemDupe => "element listed more than once",
            Error::SmcStateDupe => "duplicate state name",
            Error::SmcNoGlobalTime => "no global time element aliased to `G`",
            Error::SmcNoStateElem => "no state element aliased to `S`",
            Error::SmcGlobalTimeType => "global time element must be U64",
            Error::SmcStateElemType => "state element must be U32",
            Error::SmcSelfRef => "element initializer references itself",
            Error::SmcUseBeforeInit => "element used before initialization",
            Error::SmcLocalRefsSv => {
                "local element initializer references state vector element"
            }
            Error::SmcAssignElem => "unknown assignment target",
            Error::SmcElemReadOnly => "element is read-only",
            Error::SmcTransExit => "illegal transition in exit label",
            Error::SmcUnknownState => "unknown state",
            Error::SmcNoStates => "no states",
            Error::SmNonMonotonicTime => "step time is non-monotonic",
            Error::SmStateReserved => "state id is reserved",
            Error::SmStateDupe => "duplicate state id",
            Error::SmState => "state not found",
            Error::SmTransExit => "transition in exit label",
            Error::File => "failed to open file",
            Error::Null => "missing configuration entry",
            Error::TypeMismatch => "type mismatch",
            Error::SizeMismatch => "size mismatch",
            Error::KeyNotFound => "key not found",
            Error::Empty => "no entries",
            Error::Uninitialized => "used before initialization",
            Error::Unreachable => "internal invariant violated",
        };
        write!(f, "{}", msg)
    }
}

impl std::error::Error for Error {}

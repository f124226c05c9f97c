// types.rs — The fixed JAM type table.
//
// Maps each JAM host type to its spellings on both sides of the
// remote-execution protocol: the C format pattern, the `arg_t` union field,
// the JS type name, the one-letter signature codes, the C caster used when
// reading broadcast values, and the runtime broadcast tag.

use crate::ast::{Span, TypeName};
use crate::error::{CompileError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JamType {
    Int,
    Float,
    /// `char*`
    Str,
    /// `char`, carried as a string on the wire.
    Char,
    /// Name of a callback function, carried as a string.
    Callback,
}

impl JamType {
    /// Resolve a parameter or jdata type. `void` and unknown names fail.
    pub fn from_type_name(ty: &TypeName) -> Result<JamType> {
        Self::from_spelling(&ty.spelling()).ok_or_else(|| CompileError::UnsupportedType {
            ty: ty.spelling(),
            span: ty.span,
        })
    }

    pub fn from_spelling(spelling: &str) -> Option<JamType> {
        match spelling {
            "int" => Some(JamType::Int),
            "float" => Some(JamType::Float),
            "char*" => Some(JamType::Str),
            "char" => Some(JamType::Char),
            "jcallback" => Some(JamType::Callback),
            _ => None,
        }
    }

    /// C declaration spelling.
    pub fn c_spelling(self) -> &'static str {
        match self {
            JamType::Int => "int",
            JamType::Float => "float",
            JamType::Str => "char*",
            JamType::Char => "char",
            JamType::Callback => "jcallback",
        }
    }

    /// `sprintf` pattern used when serializing a value for a logger.
    pub fn c_pattern(self) -> &'static str {
        match self {
            JamType::Int => "%i",
            JamType::Float => "%f",
            JamType::Str | JamType::Char | JamType::Callback => "\\\"%s\\\"",
        }
    }

    /// Field of the runtime `arg_t` value union.
    pub fn union_field(self) -> &'static str {
        match self {
            JamType::Int => "ival",
            JamType::Float => "dval",
            JamType::Str | JamType::Char | JamType::Callback => "sval",
        }
    }

    pub fn js_type(self) -> &'static str {
        match self {
            JamType::Int | JamType::Float => "number",
            JamType::Str | JamType::Char | JamType::Callback => "string",
        }
    }

    /// Signature code understood by the embedded runtime.
    pub fn c_code(self) -> char {
        match self {
            JamType::Int => 'i',
            JamType::Float => 'f',
            JamType::Str | JamType::Char | JamType::Callback => 's',
        }
    }

    /// Signature code understood by the managed runtime.
    pub fn js_code(self) -> char {
        match self {
            JamType::Int | JamType::Float => 'n',
            JamType::Str | JamType::Char | JamType::Callback => 's',
        }
    }

    /// C function converting a broadcast string to this type (`None` = identity).
    pub fn caster(self) -> Option<&'static str> {
        match self {
            JamType::Int => Some("atoi"),
            JamType::Float => Some("atof"),
            JamType::Str | JamType::Char | JamType::Callback => None,
        }
    }

    pub fn broadcast_tag(self) -> Option<&'static str> {
        match self {
            JamType::Int => Some("JBROADCAST_INT"),
            JamType::Float => Some("JBROADCAST_FLOAT"),
            JamType::Str | JamType::Char => Some("JBROADCAST_STRING"),
            JamType::Callback => None,
        }
    }

    /// Text types are passed through to loggers without formatting.
    pub fn is_text(self) -> bool {
        matches!(self, JamType::Str | JamType::Char)
    }
}

/// Return type of an activity or prototype: a JAM type or `void`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnType {
    Void,
    Value(JamType),
}

impl ReturnType {
    pub fn from_type_name(ty: &TypeName) -> Result<ReturnType> {
        if ty.is_void() {
            Ok(ReturnType::Void)
        } else {
            JamType::from_type_name(ty).map(ReturnType::Value)
        }
    }

    pub fn c_spelling(self) -> &'static str {
        match self {
            ReturnType::Void => "void",
            ReturnType::Value(ty) => ty.c_spelling(),
        }
    }

    pub fn js_type(self) -> &'static str {
        match self {
            ReturnType::Void => "void",
            ReturnType::Value(ty) => ty.js_type(),
        }
    }

    /// `activity_complete` format code (empty for `void`).
    pub fn c_code(self) -> String {
        match self {
            ReturnType::Void => String::new(),
            ReturnType::Value(ty) => ty.c_code().to_string(),
        }
    }
}

/// Concatenated C signature codes (`"ii"` for `(int, int)`).
pub fn c_codes(types: &[JamType]) -> String {
    types.iter().map(|t| t.c_code()).collect()
}

/// Concatenated JS signature codes (`"nn"` for `(int, int)`).
pub fn js_codes(types: &[JamType]) -> String {
    types.iter().map(|t| t.js_code()).collect()
}

/// Resolve every parameter type of a prototype.
pub fn resolve_all(types: &[TypeName]) -> Result<Vec<JamType>> {
    types.iter().map(JamType::from_type_name).collect()
}

/// Unsupported-type error for a missing annotation (untyped C parameter).
pub fn missing_type(name: &str, span: Span) -> CompileError {
    CompileError::UnsupportedType {
        ty: format!("<untyped {}>", name),
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chumsky::span::Span as _;

    fn ty(base: &str, pointer: usize) -> TypeName {
        TypeName {
            base: base.into(),
            pointer,
            span: Span::new((), 0..0),
        }
    }

    #[test]
    fn table_rows() {
        let int = JamType::from_type_name(&ty("int", 0)).unwrap();
        assert_eq!(
            (int.c_pattern(), int.union_field(), int.js_type()),
            ("%i", "ival", "number")
        );
        assert_eq!((int.c_code(), int.js_code()), ('i', 'n'));
        assert_eq!(int.caster(), Some("atoi"));
        assert_eq!(int.broadcast_tag(), Some("JBROADCAST_INT"));

        let float = JamType::from_type_name(&ty("float", 0)).unwrap();
        assert_eq!((float.union_field(), float.caster()), ("dval", Some("atof")));

        let s = JamType::from_type_name(&ty("char", 1)).unwrap();
        assert_eq!(s, JamType::Str);
        assert_eq!(s.c_pattern(), "\\\"%s\\\"");
        assert_eq!(s.caster(), None);

        let cb = JamType::from_type_name(&ty("jcallback", 0)).unwrap();
        assert_eq!((cb.js_code(), cb.broadcast_tag()), ('s', None));
    }

    #[test]
    fn void_only_as_return() {
        assert!(matches!(
            JamType::from_type_name(&ty("void", 0)),
            Err(CompileError::UnsupportedType { .. })
        ));
        assert_eq!(
            ReturnType::from_type_name(&ty("void", 0)),
            Ok(ReturnType::Void)
        );
    }

    #[test]
    fn unknown_type_rejected() {
        let err = JamType::from_type_name(&ty("double", 0)).unwrap_err();
        assert_eq!(err.to_string(), "unsupported type `double`");
        assert!(JamType::from_type_name(&ty("int", 2)).is_err());
    }

    #[test]
    fn signature_codes() {
        let params = [JamType::Int, JamType::Str, JamType::Float];
        assert_eq!(c_codes(&params), "isf");
        assert_eq!(js_codes(&params), "nsn");
    }
}

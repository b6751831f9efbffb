//! Tagged task argument values
//!
//! Every argument handed to `spawn` is copied into an [`ArgValue`] and tagged
//! with the [`ArgType`] of the Rust value it came from. The tag travels with
//! the value through the ready queue and is checked against the parameter
//! type of the task body when the worker unpacks it.

use std::any::{self, Any, TypeId};
use std::fmt;

/// Integer width variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    I8,
    I16,
    I32,
    I64,
    ISize,
    U8,
    U16,
    U32,
    U64,
    USize,
}

impl IntWidth {
    /// Rust spelling of the integer type
    pub fn name(&self) -> &'static str {
        match self {
            IntWidth::I8 => "i8",
            IntWidth::I16 => "i16",
            IntWidth::I32 => "i32",
            IntWidth::I64 => "i64",
            IntWidth::ISize => "isize",
            IntWidth::U8 => "u8",
            IntWidth::U16 => "u16",
            IntWidth::U32 => "u32",
            IntWidth::U64 => "u64",
            IntWidth::USize => "usize",
        }
    }
}

/// Float width variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    F32,
    F64,
}

/// Type tag carried by every argument slot.
///
/// Describes the type structure of a packed argument, not the instance data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArgType {
    /// Empty value
    Unit,
    /// Boolean
    Bool,
    /// Integer with specific width
    Int(IntWidth),
    /// Float with specific width
    Float(FloatWidth),
    /// Character (Unicode scalar value)
    Char,
    /// Owned string
    String,
    /// Homogeneous array with element type
    Array(Box<ArgType>),
    /// Single-assignment cell carrying the inner type
    IVar(Box<ArgType>),
    /// Any other `'static` type registered with `opaque_arg!`
    Opaque {
        /// Type name, for diagnostics only
        name: &'static str,
        /// Identity used for comparison
        id: TypeId,
    },
}

impl ArgType {
    /// Tag for an opaque user type.
    #[inline]
    pub fn opaque<T: 'static>() -> Self {
        ArgType::Opaque {
            name: any::type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }

    /// Check if this tag describes a cell.
    #[inline]
    pub fn is_ivar(&self) -> bool {
        matches!(self, ArgType::IVar(_))
    }
}

impl fmt::Display for ArgType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ArgType::Unit => write!(f, "()"),
            ArgType::Bool => write!(f, "bool"),
            ArgType::Int(width) => write!(f, "{}", width.name()),
            ArgType::Float(FloatWidth::F32) => write!(f, "f32"),
            ArgType::Float(FloatWidth::F64) => write!(f, "f64"),
            ArgType::Char => write!(f, "char"),
            ArgType::String => write!(f, "String"),
            ArgType::Array(element) => write!(f, "[{}]", element),
            ArgType::IVar(inner) => write!(f, "IVar<{}>", inner),
            ArgType::Opaque { name, .. } => write!(f, "{}", name),
        }
    }
}

/// Packed argument value.
///
/// Integers are widened to `i128` and floats to `f64`; the width lives in
/// the accompanying [`ArgType`]. Cells and opaque values are boxed as
/// `dyn Any` and recovered by downcasting.
pub enum ArgValue {
    Unit,
    Bool(bool),
    Int(i128),
    Float(f64),
    Char(char),
    String(String),
    Array(Vec<ArgValue>),
    Any(Box<dyn Any + Send>),
}

impl ArgValue {
    /// Box an arbitrary value.
    #[inline]
    pub fn boxed<T: Any + Send>(value: T) -> Self {
        ArgValue::Any(Box::new(value))
    }

    /// Recover a boxed value of type `T`.
    pub fn downcast<T: Any>(self) -> Option<T> {
        match self {
            ArgValue::Any(boxed) => boxed.downcast::<T>().ok().map(|b| *b),
            _ => None,
        }
    }
}

impl fmt::Debug for ArgValue {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ArgValue::Unit => write!(f, "Unit"),
            ArgValue::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            ArgValue::Int(i) => f.debug_tuple("Int").field(i).finish(),
            ArgValue::Float(x) => f.debug_tuple("Float").field(x).finish(),
            ArgValue::Char(c) => f.debug_tuple("Char").field(c).finish(),
            ArgValue::String(s) => f.debug_tuple("String").field(s).finish(),
            ArgValue::Array(items) => f.debug_tuple("Array").field(items).finish(),
            ArgValue::Any(_) => write!(f, "Any(..)"),
        }
    }
}

/// A type that can be copied into a task argument slot.
///
/// `arg_type` is the static tag checked on unpack; `from_value` is only
/// called once the tag has matched.
pub trait TaskArg: Send + Sized + 'static {
    /// Static type tag.
    fn arg_type() -> ArgType;

    /// Move the value into its packed form.
    fn into_value(self) -> ArgValue;

    /// Rebuild the value from its packed form.
    fn from_value(value: ArgValue) -> Option<Self>;
}

impl TaskArg for () {
    fn arg_type() -> ArgType {
        ArgType::Unit
    }

    fn into_value(self) -> ArgValue {
        ArgValue::Unit
    }

    fn from_value(value: ArgValue) -> Option<Self> {
        matches!(value, ArgValue::Unit).then_some(())
    }
}

impl TaskArg for bool {
    fn arg_type() -> ArgType {
        ArgType::Bool
    }

    fn into_value(self) -> ArgValue {
        ArgValue::Bool(self)
    }

    fn from_value(value: ArgValue) -> Option<Self> {
        match value {
            ArgValue::Bool(b) => Some(b),
            _ => None,
        }
    }
}

impl TaskArg for char {
    fn arg_type() -> ArgType {
        ArgType::Char
    }

    fn into_value(self) -> ArgValue {
        ArgValue::Char(self)
    }

    fn from_value(value: ArgValue) -> Option<Self> {
        match value {
            ArgValue::Char(c) => Some(c),
            _ => None,
        }
    }
}

impl TaskArg for String {
    fn arg_type() -> ArgType {
        ArgType::String
    }

    fn into_value(self) -> ArgValue {
        ArgValue::String(self)
    }

    fn from_value(value: ArgValue) -> Option<Self> {
        match value {
            ArgValue::String(s) => Some(s),
            _ => None,
        }
    }
}

macro_rules! impl_int_arg {
    ($($ty:ty => $width:ident),+ $(,)?) => {$(
        impl TaskArg for $ty {
            fn arg_type() -> ArgType {
                ArgType::Int(IntWidth::$width)
            }

            fn into_value(self) -> ArgValue {
                ArgValue::Int(self as i128)
            }

            fn from_value(value: ArgValue) -> Option<Self> {
                match value {
                    ArgValue::Int(i) => <$ty>::try_from(i).ok(),
                    _ => None,
                }
            }
        }
    )+};
}

impl_int_arg! {
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    isize => ISize,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    usize => USize,
}

impl TaskArg for f32 {
    fn arg_type() -> ArgType {
        ArgType::Float(FloatWidth::F32)
    }

    fn into_value(self) -> ArgValue {
        ArgValue::Float(self as f64)
    }

    fn from_value(value: ArgValue) -> Option<Self> {
        match value {
            ArgValue::Float(x) => Some(x as f32),
            _ => None,
        }
    }
}

impl TaskArg for f64 {
    fn arg_type() -> ArgType {
        ArgType::Float(FloatWidth::F64)
    }

    fn into_value(self) -> ArgValue {
        ArgValue::Float(self)
    }

    fn from_value(value: ArgValue) -> Option<Self> {
        match value {
            ArgValue::Float(x) => Some(x),
            _ => None,
        }
    }
}

impl<T: TaskArg> TaskArg for Vec<T> {
    fn arg_type() -> ArgType {
        ArgType::Array(Box::new(T::arg_type()))
    }

    fn into_value(self) -> ArgValue {
        ArgValue::Array(self.into_iter().map(TaskArg::into_value).collect())
    }

    fn from_value(value: ArgValue) -> Option<Self> {
        match value {
            ArgValue::Array(items) => items.into_iter().map(T::from_value).collect(),
            _ => None,
        }
    }
}

/// Register types as opaque task arguments.
///
/// The type must be `Send + 'static`; it is moved into the slot as a boxed
/// `dyn Any` and tagged with its `TypeId`.
///
/// ```
/// use ivarpool::opaque_arg;
///
/// struct Matrix(Vec<f64>);
/// opaque_arg!(Matrix);
/// ```
#[macro_export]
macro_rules! opaque_arg {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::runtime::value::TaskArg for $ty {
            fn arg_type() -> $crate::runtime::value::ArgType {
                $crate::runtime::value::ArgType::opaque::<$ty>()
            }

            fn into_value(self) -> $crate::runtime::value::ArgValue {
                $crate::runtime::value::ArgValue::boxed(self)
            }

            fn from_value(value: $crate::runtime::value::ArgValue) -> Option<Self> {
                value.downcast::<$ty>()
            }
        }
    )+};
}

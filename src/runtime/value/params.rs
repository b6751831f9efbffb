//! Positional task parameters
//!
//! [`Params`] is the homogeneous storage format of a task descriptor: an
//! ordered list of tagged slots filled at spawn time. [`FromParams`] turns it
//! back into a typed tuple on the worker side.

use smallvec::SmallVec;

use super::arg_value::{ArgType, ArgValue, TaskArg};
use crate::runtime::error::{RuntimeError, RuntimeResult};

/// A single tagged argument.
#[derive(Debug)]
pub struct ArgSlot {
    tag: ArgType,
    value: ArgValue,
}

impl ArgSlot {
    /// Pack a value, tagging it with its static type.
    #[inline]
    pub fn new<T: TaskArg>(value: T) -> Self {
        Self {
            tag: T::arg_type(),
            value: value.into_value(),
        }
    }

    /// Get the type tag.
    #[inline]
    pub fn tag(&self) -> &ArgType {
        &self.tag
    }

    /// Unpack the slot as `T`, checking the tag first.
    pub fn take<T: TaskArg>(
        self,
        index: usize,
    ) -> RuntimeResult<T> {
        let expected = T::arg_type();
        if self.tag != expected {
            return Err(RuntimeError::TypeMismatch {
                index,
                expected,
                found: self.tag,
            });
        }

        let found = self.tag;
        T::from_value(self.value).ok_or(RuntimeError::TypeMismatch {
            index,
            expected,
            found,
        })
    }
}

/// Ordered, tagged argument list of a task.
#[derive(Debug, Default)]
pub struct Params {
    slots: SmallVec<[ArgSlot; 4]>,
}

impl Params {
    /// Create an empty argument list.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an argument.
    #[inline]
    pub fn push<T: TaskArg>(
        &mut self,
        value: T,
    ) {
        self.slots.push(ArgSlot::new(value));
    }

    /// Append an argument, builder style.
    #[inline]
    pub fn with<T: TaskArg>(
        mut self,
        value: T,
    ) -> Self {
        self.push(value);
        self
    }

    /// Get the number of arguments.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if there are no arguments.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Type tags in positional order.
    pub fn types(&self) -> impl Iterator<Item = &ArgType> + '_ {
        self.slots.iter().map(ArgSlot::tag)
    }

    /// Start unpacking, checking the arity first.
    pub fn unpacker(
        self,
        arity: usize,
    ) -> RuntimeResult<Unpacker> {
        if self.slots.len() != arity {
            return Err(RuntimeError::ArityMismatch {
                expected: arity,
                found: self.slots.len(),
            });
        }

        Ok(Unpacker {
            arity,
            index: 0,
            slots: self.slots.into_iter(),
        })
    }
}

/// Sequential reader over a [`Params`] list.
pub struct Unpacker {
    arity: usize,
    index: usize,
    slots: smallvec::IntoIter<[ArgSlot; 4]>,
}

impl Unpacker {
    /// Take the next argument as `T`.
    pub fn next<T: TaskArg>(&mut self) -> RuntimeResult<T> {
        let index = self.index;
        let slot = self.slots.next().ok_or(RuntimeError::ArityMismatch {
            expected: self.arity,
            found: index,
        })?;
        self.index += 1;
        slot.take(index)
    }
}

/// Typed argument tuples that can be rebuilt from [`Params`].
pub trait FromParams: Sized {
    /// Number of positional arguments.
    const ARITY: usize;

    /// Unpack every slot, checking arity and tags.
    fn from_params(params: Params) -> RuntimeResult<Self>;
}

macro_rules! impl_from_params {
    ($arity:expr; $($arg:ident),*) => {
        impl<$($arg: TaskArg,)*> FromParams for ($($arg,)*) {
            const ARITY: usize = $arity;

            #[allow(unused_mut, unused_variables)]
            fn from_params(params: Params) -> RuntimeResult<Self> {
                let mut unpacker = params.unpacker(Self::ARITY)?;
                Ok(($(unpacker.next::<$arg>()?,)*))
            }
        }
    };
}

impl_from_params!(0;);
impl_from_params!(1; A1);
impl_from_params!(2; A1, A2);
impl_from_params!(3; A1, A2, A3);
impl_from_params!(4; A1, A2, A3, A4);
impl_from_params!(5; A1, A2, A3, A4, A5);
impl_from_params!(6; A1, A2, A3, A4, A5, A6);
impl_from_params!(7; A1, A2, A3, A4, A5, A6, A7);
impl_from_params!(8; A1, A2, A3, A4, A5, A6, A7, A8);

/// Build a [`Params`] list from values, copying each into a tagged slot.
///
/// ```
/// use ivarpool::{params, IVar};
///
/// let out: IVar<u32> = IVar::new();
/// let p = params![5u32, out.clone()];
/// assert_eq!(p.len(), 2);
/// ```
#[macro_export]
macro_rules! params {
    () => {
        $crate::runtime::value::Params::new()
    };
    ($($value:expr),+ $(,)?) => {{
        let mut params = $crate::runtime::value::Params::new();
        $(params.push($value);)+
        params
    }};
}

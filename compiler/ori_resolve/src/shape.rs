//! Result shapes: one optional element, or an ordered candidate list.
//!
//! A single generic resolution path serves both shapes. The shape tag picks
//! the `poly` partition axis and converts between the caller-facing output
//! type and the cache's normalized [`Resolved`] form.

use crate::query::Element;
use std::fmt;
use std::sync::Arc;

/// Normalized resolution result.
///
/// `Nothing` covers both "resolved to nothing" for [`Mono`] and "no
/// candidates" for [`Poly`]; the cache stores it as a sentinel.
pub enum Resolved<T> {
    Nothing,
    One(Arc<T>),
    Many(Arc<[T]>),
}

impl<T> Resolved<T> {
    #[inline]
    pub fn is_nothing(&self) -> bool {
        matches!(self, Resolved::Nothing)
    }

    /// Whether `self` and `other` share the same allocation (or are both
    /// `Nothing`).
    pub fn same_as(&self, other: &Resolved<T>) -> bool {
        match (self, other) {
            (Resolved::Nothing, Resolved::Nothing) => true,
            (Resolved::One(a), Resolved::One(b)) => Arc::ptr_eq(a, b),
            (Resolved::Many(a), Resolved::Many(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<T: Element> Resolved<T> {
    /// Whether every element reports itself valid.
    pub fn all_valid(&self) -> bool {
        match self {
            Resolved::Nothing => true,
            Resolved::One(element) => element.is_valid(),
            Resolved::Many(elements) => elements.iter().all(Element::is_valid),
        }
    }
}

// Manual impl: cloning only bumps reference counts, so `T: Clone` is not needed.
impl<T> Clone for Resolved<T> {
    fn clone(&self) -> Self {
        match self {
            Resolved::Nothing => Resolved::Nothing,
            Resolved::One(element) => Resolved::One(Arc::clone(element)),
            Resolved::Many(elements) => Resolved::Many(Arc::clone(elements)),
        }
    }
}

impl<T> fmt::Debug for Resolved<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Nothing => write!(f, "Nothing"),
            Resolved::One(_) => write!(f, "One"),
            Resolved::Many(elements) => write!(f, "Many({})", elements.len()),
        }
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Mono {}
    impl Sealed for super::Poly {}
}

/// Result shape tag. Implemented only by [`Mono`] and [`Poly`].
pub trait Shape<T>: sealed::Sealed {
    /// Value of the partition's `poly` axis.
    const POLY: bool;

    /// What resolvers return and callers receive.
    type Output: Clone;

    /// Normalize a caller-facing result.
    fn to_resolved(output: &Self::Output) -> Resolved<T>;

    /// Convert a normalized result back, or `None` if it does not fit this
    /// shape. `empty` is the cache's shared empty candidate list.
    fn from_resolved(resolved: Resolved<T>, empty: &Arc<[T]>) -> Option<Self::Output>;

    /// The "nothing" output, also returned on prevented recursion.
    fn nothing(empty: &Arc<[T]>) -> Self::Output;
}

/// Single optional element: `Option<Arc<T>>`.
#[derive(Copy, Clone, Debug)]
pub enum Mono {}

/// Ordered candidate list: `Arc<[T]>`, never null.
#[derive(Copy, Clone, Debug)]
pub enum Poly {}

impl<T> Shape<T> for Mono {
    const POLY: bool = false;
    type Output = Option<Arc<T>>;

    fn to_resolved(output: &Self::Output) -> Resolved<T> {
        match output {
            Some(element) => Resolved::One(Arc::clone(element)),
            None => Resolved::Nothing,
        }
    }

    fn from_resolved(resolved: Resolved<T>, _empty: &Arc<[T]>) -> Option<Self::Output> {
        match resolved {
            Resolved::Nothing => Some(None),
            Resolved::One(element) => Some(Some(element)),
            Resolved::Many(_) => None,
        }
    }

    fn nothing(_empty: &Arc<[T]>) -> Self::Output {
        None
    }
}

impl<T> Shape<T> for Poly {
    const POLY: bool = true;
    type Output = Arc<[T]>;

    fn to_resolved(output: &Self::Output) -> Resolved<T> {
        if output.is_empty() {
            Resolved::Nothing
        } else {
            Resolved::Many(Arc::clone(output))
        }
    }

    fn from_resolved(resolved: Resolved<T>, empty: &Arc<[T]>) -> Option<Self::Output> {
        match resolved {
            Resolved::Nothing => Some(Arc::clone(empty)),
            Resolved::Many(elements) => Some(elements),
            Resolved::One(_) => None,
        }
    }

    fn nothing(empty: &Arc<[T]>) -> Self::Output {
        Arc::clone(empty)
    }
}

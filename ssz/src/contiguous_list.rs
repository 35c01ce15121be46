use core::{fmt::Debug, hash::Hash, marker::PhantomData};

use derivative::Derivative;
use derive_more::{Deref, DerefMut};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use typenum::Unsigned;

use crate::error::ReadError;

/// A list with at most `N` elements.
#[derive(Deref, DerefMut, Derivative, Serialize)]
#[derivative(
    Clone(bound = "T: Clone"),
    PartialEq(bound = "T: PartialEq"),
    Eq(bound = "T: Eq"),
    Hash(bound = "T: Hash"),
    Default(bound = ""),
    Debug(bound = "T: Debug", transparent = "true")
)]
#[serde(transparent)]
pub struct ContiguousList<T, N> {
    #[deref]
    #[deref_mut]
    elements: Box<[T]>,
    #[derivative(Debug = "ignore")]
    #[serde(skip)]
    phantom: PhantomData<N>,
}

impl<T, N> AsRef<[T]> for ContiguousList<T, N> {
    fn as_ref(&self) -> &[T] {
        self.elements.as_ref()
    }
}

impl<T, N: Unsigned> TryFrom<Vec<T>> for ContiguousList<T, N> {
    type Error = ReadError;

    fn try_from(vec: Vec<T>) -> Result<Self, Self::Error> {
        Self::validate_length(vec.len())?;
        Ok(Self::new_unchecked(vec.into()))
    }
}

impl<T, N> IntoIterator for ContiguousList<T, N> {
    type Item = T;
    type IntoIter = <Vec<T> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        // `Box::into_iter` cannot be called like a method until Rust 2024.
        // See <https://github.com/rust-lang/rust/pull/124097/>.
        Box::into_iter(self.elements)
    }
}

impl<'list, T, N> IntoIterator for &'list ContiguousList<T, N> {
    type Item = &'list T;
    type IntoIter = <&'list [T] as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'de, T: Deserialize<'de>, N: Unsigned> Deserialize<'de> for ContiguousList<T, N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let elements = Vec::deserialize(deserializer)?;
        elements.try_into().map_err(D::Error::custom)
    }
}

impl<T, N> ContiguousList<T, N> {
    pub fn try_from_iter(elements: impl IntoIterator<Item = T>) -> Result<Self, ReadError>
    where
        N: Unsigned,
    {
        let elements = Box::from_iter(elements);
        Self::validate_length(elements.len())?;
        Ok(Self::new_unchecked(elements))
    }

    /// Collects at most `N` elements and ignores the rest.
    #[must_use]
    pub fn truncating_from_iter(elements: impl IntoIterator<Item = T>) -> Self
    where
        N: Unsigned,
    {
        Self::new_unchecked(elements.into_iter().take(N::USIZE).collect())
    }

    const fn validate_length(actual: usize) -> Result<(), ReadError>
    where
        N: Unsigned,
    {
        let maximum = N::USIZE;

        if actual > maximum {
            return Err(ReadError::ListTooLong { maximum, actual });
        }

        Ok(())
    }

    fn new_unchecked(elements: Box<[T]>) -> Self {
        Self {
            elements,
            phantom: PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use typenum::U2;

    use super::*;

    #[test]
    fn try_from_iter_enforces_maximum_length() {
        assert_eq!(
            ContiguousList::<_, U2>::try_from_iter([1, 2, 3]),
            Err(ReadError::ListTooLong {
                maximum: 2,
                actual: 3,
            }),
        );

        assert_eq!(
            ContiguousList::<_, U2>::try_from_iter([1, 2]).map(|list| list.to_vec()),
            Ok(vec![1, 2]),
        );
    }

    #[test]
    fn truncating_from_iter_keeps_first_elements() {
        let list = ContiguousList::<_, U2>::truncating_from_iter([1, 2, 3]);

        assert_eq!(list.as_ref(), [1, 2]);
    }
}

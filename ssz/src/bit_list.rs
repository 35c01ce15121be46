use core::{
    fmt::{Debug, Formatter, Result as FmtResult},
    marker::PhantomData,
    ops::BitOrAssign,
};

use bitvec::{boxed::BitBox, vec::BitVec};
use derivative::Derivative;
use derive_more::{Deref, DerefMut};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use static_assertions::assert_eq_size;
use typenum::{Unsigned, U2048};

use crate::{error::ReadError, shared, BITS_PER_BYTE};

/// A bitfield of at most `N` bits laid out least significant bit first.
///
/// In attestations bit `i` being set means that member `i` of the committee participated.
#[derive(Deref, DerefMut, Derivative)]
#[derivative(
    Clone(bound = ""),
    PartialEq(bound = ""),
    Eq(bound = ""),
    PartialOrd(bound = ""),
    Ord(bound = ""),
    Hash(bound = ""),
    Default(bound = "")
)]
pub struct BitList<N> {
    // Unused bits in the last byte are always cleared.
    // The set operations below compare raw bytes and rely on it.
    #[deref]
    #[deref_mut]
    bits: BitBox<u8>,
    #[derivative(
        PartialEq = "ignore",
        PartialOrd = "ignore",
        Ord = "ignore",
        Hash = "ignore"
    )]
    phantom: PhantomData<N>,
}

// The `U2048` is in reference to `MaxValidatorsPerCommittee`.
assert_eq_size!(BitList<U2048>, [usize; 2]);

impl<N> From<BitList<N>> for Vec<u8> {
    fn from(bit_list: BitList<N>) -> Self {
        bit_list.to_ssz_bytes()
    }
}

impl<N: Unsigned> TryFrom<Vec<u8>> for BitList<N> {
    type Error = ReadError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        let length = Self::measure_length(bytes.as_slice())?;
        Ok(Self::from_vec_with_length(bytes, length))
    }
}

impl<N> BitOrAssign<&Self> for BitList<N> {
    fn bitor_assign(&mut self, other: &Self) {
        assert_eq!(self.len(), other.len());

        self.bits |= &other.bits;
    }
}

// This sort of code arguably belongs in an impl of `core::fmt::Binary` rather than `Debug`,
// but we don't ever format bit lists directly and we need a `Debug` impl anyway.
impl<N> Debug for BitList<N> {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        formatter.write_str("0b")?;

        for bit in self.iter().by_vals() {
            formatter.write_str(if bit { "1" } else { "0" })?;
        }

        Ok(())
    }
}

// `BitBox` deserializes itself as a struct with multiple fields.
impl<'de, N: Unsigned> Deserialize<'de> for BitList<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        impl_serde::serialize::deserialize(deserializer)?
            .try_into()
            .map_err(D::Error::custom)
    }
}

impl<N> Serialize for BitList<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        impl_serde::serialize::serialize(self.to_ssz_bytes().as_slice(), serializer)
    }
}

impl<N> BitList<N> {
    /// Decodes SSZ bytes, where the highest set bit of the last byte marks the length.
    pub fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, ReadError>
    where
        N: Unsigned,
    {
        let length = Self::measure_length(bytes)?;
        let bytes = bytes[..bytes_without_delimiting_bit(length)].to_vec();
        Ok(Self::from_vec_with_length(bytes, length))
    }

    pub fn from_bits(bits: impl IntoIterator<Item = bool>) -> Result<Self, ReadError>
    where
        N: Unsigned,
    {
        let bits = bits.into_iter().collect::<BitVec<u8>>();

        let maximum = N::USIZE;
        let actual = bits.len();

        if actual > maximum {
            return Err(ReadError::BitListTooLong { maximum, actual });
        }

        Ok(Self::from_bit_box(bits.into_boxed_bitslice()))
    }

    #[must_use]
    pub fn to_ssz_bytes(&self) -> Vec<u8> {
        let length = self.len();
        let mut bytes = vec![0; bytes_with_delimiting_bit(length)];

        bytes[..bytes_without_delimiting_bit(length)].copy_from_slice(self.as_raw_slice());
        bytes[length / BITS_PER_BYTE] |= 1 << (length % BITS_PER_BYTE);

        bytes
    }

    /// Bit lists of different lengths belong to different committees and are never subsets of
    /// each other.
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.len() == other.len() && shared::is_subset(self.as_raw_slice(), other.as_raw_slice())
    }

    /// Returns the number of set bits that are not set in `other`,
    /// or `None` if the lists have different lengths.
    #[must_use]
    pub fn count_not_in(&self, other: &Self) -> Option<usize> {
        (self.len() == other.len())
            .then(|| shared::count_not_in(self.as_raw_slice(), other.as_raw_slice()))
    }

    fn measure_length(bytes: &[u8]) -> Result<usize, ReadError>
    where
        N: Unsigned,
    {
        let last_byte = *bytes.last().ok_or(ReadError::BitListEmptySlice)?;

        let last_byte_bits: BitVec<u8> = BitVec::from_element(last_byte);

        let data_bits_in_last_byte = last_byte_bits
            .last_one()
            .ok_or(ReadError::BitListNoDelimitingBit)?;

        let maximum = N::USIZE;
        let actual = (bytes.len() - 1) * BITS_PER_BYTE + data_bits_in_last_byte;

        if actual > maximum {
            return Err(ReadError::BitListTooLong { maximum, actual });
        }

        Ok(actual)
    }

    fn from_vec_with_length(bytes: Vec<u8>, length: usize) -> Self {
        let mut bits = BitVec::from_vec(bytes);
        bits.truncate(length);
        Self::from_bit_box(bits.into_boxed_bitslice())
    }

    fn from_bit_box(mut bits: BitBox<u8>) -> Self {
        bits.fill_uninitialized(false);

        Self {
            bits,
            phantom: PhantomData,
        }
    }
}

const fn bytes_without_delimiting_bit(length: usize) -> usize {
    length.div_ceil(BITS_PER_BYTE)
}

const fn bytes_with_delimiting_bit(length: usize) -> usize {
    length.saturating_add(1).div_ceil(BITS_PER_BYTE)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;
    use typenum::{U1, U16, U8};

    use super::*;

    // Unused bits in the last byte must be cleared for byte-wise set operations.
    // Remove the call to `BitBox::fill_uninitialized` in `BitList::from_bit_box` to see these fail.
    #[test]
    fn from_bits_clears_unused_bits() -> Result<(), ReadError> {
        assert_eq!(BitList::<U1>::from_bits([true])?.bits.as_raw_slice(), [1]);
        Ok(())
    }

    #[test]
    fn from_ssz_bytes_clears_delimiting_bit_in_buffer() -> Result<(), ReadError> {
        assert_eq!(
            BitList::<U1>::from_ssz_bytes(&[0b11])?.bits.as_raw_slice(),
            [1],
        );
        Ok(())
    }

    #[test]
    fn from_ssz_bytes_strips_delimiting_bit() -> Result<(), ReadError> {
        let bit_list = BitList::<U16>::from_ssz_bytes(&[0b1100_0011, 0b1])?;

        assert_eq!(bit_list.len(), 8);
        assert_eq!(bit_list.count_ones(), 4);
        assert_eq!(bit_list.iter_ones().collect::<Vec<_>>(), [0, 1, 6, 7]);
        assert_eq!(bit_list.to_ssz_bytes(), [0b1100_0011, 0b1]);

        Ok(())
    }

    #[test]
    fn from_ssz_bytes_handles_delimiting_bit_inside_data_byte() -> Result<(), ReadError> {
        let bit_list = BitList::<U8>::from_ssz_bytes(&[0b0001_0101])?;

        assert_eq!(bit_list.len(), 4);
        assert_eq!(bit_list.iter_ones().collect::<Vec<_>>(), [0, 2]);
        assert_eq!(Vec::from(bit_list), [0b0001_0101]);

        Ok(())
    }

    #[test_case(&[] => Err(ReadError::BitListEmptySlice))]
    #[test_case(&[0b1, 0] => Err(ReadError::BitListNoDelimitingBit))]
    #[test_case(&[0, 0, 0b1] => Err(ReadError::BitListTooLong { maximum: 8, actual: 16 }))]
    #[test_case(&[0b1] => Ok(0))]
    fn from_ssz_bytes_validates_input(bytes: &[u8]) -> Result<usize, ReadError> {
        BitList::<U8>::from_ssz_bytes(bytes).map(|bit_list| bit_list.len())
    }

    #[test]
    fn set_operations_respect_lengths() -> Result<(), ReadError> {
        let small = BitList::<U16>::from_bits([true, false, false, true])?;
        let large = BitList::<U16>::from_bits([true, true, false, true])?;
        let other_committee = BitList::<U16>::from_bits([true, false, false, true, false])?;

        assert!(small.is_subset_of(&large));
        assert!(!large.is_subset_of(&small));
        assert!(small.is_subset_of(&small));
        assert!(!small.is_subset_of(&other_committee));

        assert_eq!(large.count_not_in(&small), Some(1));
        assert_eq!(small.count_not_in(&large), Some(0));
        assert_eq!(small.count_not_in(&other_committee), None);

        Ok(())
    }

    #[test]
    fn bitor_assign_takes_union() -> Result<(), ReadError> {
        let mut bit_list = BitList::<U8>::from_bits([true, false, false])?;
        bit_list |= &BitList::from_bits([false, false, true])?;

        assert_eq!(bit_list, BitList::from_bits([true, false, true])?);

        Ok(())
    }

    #[test]
    fn from_bits_rejects_too_many_bits() {
        assert_eq!(
            BitList::<U1>::from_bits([true, true]),
            Err(ReadError::BitListTooLong {
                maximum: 1,
                actual: 2,
            }),
        );
    }
}

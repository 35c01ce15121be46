use core::{
    fmt::{Debug, Formatter, Result as FmtResult},
    marker::PhantomData,
};

use bitvec::{bitbox, boxed::BitBox, vec::BitVec};
use derivative::Derivative;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use typenum::Unsigned;

use crate::{
    error::{IndexError, ReadError},
    shared, BITS_PER_BYTE,
};

/// A bitfield of exactly `N` bits laid out least significant bit first.
#[derive(Derivative)]
#[derivative(
    Clone(bound = ""),
    PartialEq(bound = ""),
    Eq(bound = ""),
    Hash(bound = "")
)]
pub struct BitVector<N> {
    bits: BitBox<u8>,
    #[derivative(PartialEq = "ignore", Hash = "ignore")]
    phantom: PhantomData<N>,
}

impl<N: Unsigned> Default for BitVector<N> {
    fn default() -> Self {
        Self {
            bits: bitbox![_, _; 0; N::USIZE],
            phantom: PhantomData,
        }
    }
}

impl<N> Debug for BitVector<N> {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        formatter.write_str("0b")?;

        for bit in self.bits.iter().by_vals() {
            formatter.write_str(if bit { "1" } else { "0" })?;
        }

        Ok(())
    }
}

impl<'de, N: Unsigned> Deserialize<'de> for BitVector<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = impl_serde::serialize::deserialize(deserializer)?;
        Self::from_ssz_bytes(bytes.as_slice()).map_err(D::Error::custom)
    }
}

impl<N> Serialize for BitVector<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        impl_serde::serialize::serialize(self.bits.as_raw_slice(), serializer)
    }
}

impl<N> BitVector<N> {
    pub fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, ReadError>
    where
        N: Unsigned,
    {
        let expected = N::USIZE.div_ceil(BITS_PER_BYTE);
        let actual = bytes.len();

        if actual != expected {
            return Err(ReadError::BitVectorSizeMismatch {
                expected: N::USIZE,
                actual: actual * BITS_PER_BYTE,
            });
        }

        let mut bits: BitVec<u8> = BitVec::from_slice(bytes);

        // Bits past the end must be zero. Otherwise equal vectors could differ in raw bytes.
        if bits[N::USIZE..].any() {
            return Err(ReadError::BitVectorSizeMismatch {
                expected: N::USIZE,
                actual: bits.last_one().map_or(0, |index| index + 1),
            });
        }

        bits.truncate(N::USIZE);

        let mut bits = bits.into_boxed_bitslice();
        bits.fill_uninitialized(false);

        Ok(Self {
            bits,
            phantom: PhantomData,
        })
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<bool> {
        self.bits.get(index).as_deref().copied()
    }

    pub fn set(&mut self, index: usize, value: bool) -> Result<(), IndexError> {
        let length = self.bits.len();

        let mut bit = self
            .bits
            .get_mut(index)
            .ok_or(IndexError::OutOfBounds { length, index })?;

        *bit = value;

        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    #[must_use]
    pub fn count_ones(&self) -> usize {
        self.bits.count_ones()
    }

    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.iter_ones()
    }

    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        shared::is_subset(self.bits.as_raw_slice(), other.bits.as_raw_slice())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.bits.as_raw_slice()
    }
}

#[cfg(test)]
mod tests {
    use typenum::{U16, U8};

    use super::*;

    #[test]
    fn default_bit_vector_has_fixed_length_and_no_bits_set() {
        let bit_vector = BitVector::<U16>::default();

        assert_eq!(bit_vector.len(), 16);
        assert_eq!(bit_vector.count_ones(), 0);
        assert_eq!(bit_vector.as_bytes(), [0, 0]);
    }

    #[test]
    fn set_rejects_out_of_bounds_index() -> Result<(), IndexError> {
        let mut bit_vector = BitVector::<U8>::default();

        bit_vector.set(7, true)?;

        assert_eq!(bit_vector.get(7), Some(true));
        assert_eq!(bit_vector.get(8), None);
        assert_eq!(
            bit_vector.set(8, true),
            Err(IndexError::OutOfBounds {
                length: 8,
                index: 8,
            }),
        );

        Ok(())
    }

    #[test]
    fn from_ssz_bytes_requires_exact_size() -> Result<(), ReadError> {
        let bit_vector = BitVector::<U16>::from_ssz_bytes(&[0b0000_0101, 0b1000_0000])?;

        assert_eq!(bit_vector.iter_ones().collect::<Vec<_>>(), [0, 2, 15]);

        assert_eq!(
            BitVector::<U16>::from_ssz_bytes(&[0]),
            Err(ReadError::BitVectorSizeMismatch {
                expected: 16,
                actual: 8,
            }),
        );

        Ok(())
    }

    #[test]
    fn subset_checks() -> Result<(), ReadError> {
        let small = BitVector::<U8>::from_ssz_bytes(&[0b0000_0011])?;
        let large = BitVector::<U8>::from_ssz_bytes(&[0b0000_0111])?;

        assert!(small.is_subset_of(&large));
        assert!(!large.is_subset_of(&small));

        Ok(())
    }
}

//! Bounded collections with SSZ bit layouts.
//!
//! Only the parts needed to assemble blocks are implemented: bit lists and bit vectors with
//! set operations over committee positions, and lists with a type-level maximum length.
//! Encoding is limited to the byte layout of bitfields, which is what attestations and sync
//! committee contributions arrive in.

pub use crate::{
    bit_list::BitList,
    bit_vector::BitVector,
    contiguous_list::ContiguousList,
    error::{IndexError, ReadError},
};

mod bit_list;
mod bit_vector;
mod contiguous_list;
mod error;
mod shared;

const BITS_PER_BYTE: usize = 8;

//! Integer codec and byte-level wrappers shared by every domain encoder.

pub mod block;
pub mod elias_fano;
pub mod transform;

pub use block::{
    compress, decode_base64, decode_monotone, decompress, encode_base64, encode_monotone,
    pack_words, unpack_words,
};
pub use elias_fano::EfWord;
pub use transform::{prefix_sum, successive_differences};

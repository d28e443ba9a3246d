//! Embedded tag container handling: the binary codec, the selective tag
//! remover, and the general-purpose read path.
//!
//! The JPEG selective-edit path works on a [`TagDirectory`](tags::TagDirectory):
//! [`codec::decode`] builds one from the file's tag segment,
//! [`remover::remove`] filters it per the requested categories, and
//! [`codec::encode`] + [`codec::splice`] put the result back without
//! touching the image scan data. [`reader`] covers the containers the codec
//! does not own (HEIC, PNG, WebP, TIFF, video tracks) for display-only
//! extraction.

pub mod codec;
pub mod reader;
pub mod remover;
pub mod tags;

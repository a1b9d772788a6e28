//! Crate that validates EVM Object Format (EOF) containers.
//!
//! An EOF container is a versioned, sectioned envelope for EVM contracts.
//! [`validate_eof`] decides whether a byte sequence is a well-formed EOF v1
//! container under a given [`SpecId`]: the binary layout, every instruction
//! encoding, all relative-jump destinations and the declared per-function
//! stack bounds are checked. Legacy (non-EOF) code never enters this crate;
//! callers detect it with [`is_eof_container`].
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc as std;

pub mod eof;
pub mod opcode;
pub mod spec;
pub mod utils;

pub use eof::{
    append_data_section, eof_version, is_eof_container, read_valid_header, validate_eof, CodeInfo,
    EofHeader, EofValidationError,
};
pub use opcode::OpCode;
pub use spec::SpecId;

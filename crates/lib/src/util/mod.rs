//! Digest hashing shared by the registry layer, plus in-memory fakes for tests.

pub mod hash;

#[cfg(test)]
pub mod testutil;

//! Camera authentication.
//!
//! The camera answers unauthenticated requests with a `401` carrying a
//! `WWW-Authenticate: Digest ...` challenge. This module parses challenges
//! and computes responses; [`crate::download::HttpClient`] drives the
//! challenge/response round trips.

mod digest;

pub use digest::{
    Challenge, Credentials, DigestAlgorithm, DigestChallenge, DigestError, generate_cnonce,
    parse_challenges, select_challenge,
};

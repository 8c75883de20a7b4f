#![forbid(unsafe_code)]

//! Reader, extractor and patch-rewrite engine for RCAR compiled asset
//! catalogs.

pub mod car;

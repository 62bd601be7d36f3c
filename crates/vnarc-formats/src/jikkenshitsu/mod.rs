//! Studio Jikkenshitsu engine
//!
//! `SJDAT` archives whose index and payloads are encrypted with the
//! per-title [`SjTransform`](vnarc_crypto::SjTransform) Feistel cipher.

mod dat;

pub use dat::{DatOpener, SIGNATURE};

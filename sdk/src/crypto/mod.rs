//! Envelope encryption for stored documents.
//!
//! A single 256-bit key is derived from the operator secret with scrypt
//! (N = 2^14, r = 8, p = 1, salt `"salt"`). These parameters match the ones
//! documents were historically sealed with, so changing them makes existing
//! ciphertexts unreadable. The key is derived once per [`Cipher`] and is kept in
//! zeroizing memory.
//!
//! Two modes are supported:
//!
//! - AES-256-GCM with a 16-byte nonce. The 16-byte authentication tag is kept
//!   separately from the ciphertext (detached), so the stored ciphertext has the
//!   same length as the plaintext.
//! - AES-256-CBC with PKCS#7 padding. There is no tag; integrity of the document
//!   body relies on the SHA-256 hash recorded at store time.
//!
//! Every call to [`Cipher::encrypt`] draws a fresh random 16-byte IV. The document
//! body and its metadata are encrypted independently, each with its own IV (and tag
//! in GCM mode).

mod cipher;

pub use cipher::{Cipher, EncryptionKey, IV_LENGTH, KEY_LENGTH, SealedBlob, TAG_LENGTH};

use {
    aes_gcm::{
        AesGcm, KeyInit,
        aead::{AeadInPlace, consts::U16, generic_array::GenericArray},
        aes::Aes256,
    },
    cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7},
    securedoc_protocol::{EncryptionSecret, EncryptionType, StorageError, StorageResult},
    std::fmt,
    zeroize::Zeroizing,
};

pub const KEY_LENGTH: usize = 32;
pub const IV_LENGTH: usize = 16;
pub const TAG_LENGTH: usize = 16;

const KDF_SALT: &[u8] = b"salt";
const KDF_LOG_N: u8 = 14;
const KDF_R: u32 = 8;
const KDF_P: u32 = 1;
const BLOCK_SIZE: usize = 16;

type Aes256Gcm16 = AesGcm<Aes256, U16>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Symmetric key used for both the document body and its metadata.
#[derive(Clone)]
pub struct EncryptionKey(Zeroizing<[u8; KEY_LENGTH]>);

impl EncryptionKey {
    /// Derives the key from the operator secret.
    #[inline]
    pub fn derive(secret: &EncryptionSecret) -> StorageResult<Self> {
        let params = scrypt::Params::new(KDF_LOG_N, KDF_R, KDF_P, KEY_LENGTH)
            .map_err(|err| StorageError::Configuration(format!("invalid scrypt params: {err}")))?;
        let mut key = Zeroizing::new([0; KEY_LENGTH]);
        scrypt::scrypt(
            secret.as_unmasked_str().as_bytes(),
            KDF_SALT,
            &params,
            key.as_mut_slice(),
        )
        .map_err(|err| StorageError::Configuration(format!("key derivation failed: {err}")))?;
        Ok(Self(key))
    }

    /// Random key, for instances that never need to read data sealed elsewhere.
    #[must_use]
    #[inline]
    pub fn generate() -> Self {
        Self(Zeroizing::new(rand::random()))
    }

    #[must_use]
    #[inline]
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for EncryptionKey {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey").finish()
    }
}

/// Output of [`Cipher::encrypt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBlob {
    pub ciphertext: Vec<u8>,
    pub iv: [u8; IV_LENGTH],
    /// Present for GCM only.
    pub auth_tag: Option<[u8; TAG_LENGTH]>,
}

pub struct Cipher {
    key: EncryptionKey,
    gcm: Aes256Gcm16,
}

impl Cipher {
    #[must_use]
    #[inline]
    pub fn new(key: &EncryptionKey) -> Self {
        Self {
            gcm: Aes256Gcm16::new(GenericArray::from_slice(key.as_bytes())),
            key: key.clone(),
        }
    }

    /// Runs scrypt, which is deliberately slow. Call once per backend.
    #[inline]
    pub fn derive(secret: &EncryptionSecret) -> StorageResult<Self> {
        Ok(Self::new(&EncryptionKey::derive(secret)?))
    }

    #[inline]
    pub fn encrypt(&self, data: &[u8], mode: EncryptionType) -> StorageResult<SealedBlob> {
        let iv: [u8; IV_LENGTH] = rand::random();
        match mode {
            EncryptionType::Aes256Gcm => {
                let mut buffer = data.to_vec();
                let tag = self
                    .gcm
                    .encrypt_in_place_detached(&GenericArray::from(iv), &[], &mut buffer)
                    .map_err(|err| StorageError::Encryption(format!("aes-256-gcm: {err}")))?;
                Ok(SealedBlob {
                    ciphertext: buffer,
                    iv,
                    auth_tag: Some(tag.into()),
                })
            }
            EncryptionType::Aes256Cbc => {
                let encryptor = Aes256CbcEnc::new_from_slices(self.key.as_bytes(), &iv)
                    .map_err(|err| StorageError::Encryption(format!("aes-256-cbc: {err}")))?;
                Ok(SealedBlob {
                    ciphertext: encryptor.encrypt_padded_vec_mut::<Pkcs7>(data),
                    iv,
                    auth_tag: None,
                })
            }
        }
    }

    /// Tag verification failure is an `Integrity` error; malformed input is a
    /// `Decryption` error.
    #[inline]
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        iv: &[u8],
        mode: EncryptionType,
        auth_tag: Option<&[u8]>,
    ) -> StorageResult<Vec<u8>> {
        let iv = <[u8; IV_LENGTH]>::try_from(iv).map_err(|_| {
            StorageError::Decryption(format!(
                "invalid IV length; got {}, expected {IV_LENGTH}",
                iv.len()
            ))
        })?;
        match mode {
            EncryptionType::Aes256Gcm => {
                let tag = auth_tag.ok_or_else(|| {
                    StorageError::Integrity("authentication tag is missing".into())
                })?;
                let tag = <[u8; TAG_LENGTH]>::try_from(tag).map_err(|_| {
                    StorageError::Decryption(format!(
                        "invalid authentication tag length; got {}, expected {TAG_LENGTH}",
                        tag.len()
                    ))
                })?;
                let mut buffer = ciphertext.to_vec();
                self.gcm
                    .decrypt_in_place_detached(
                        &GenericArray::from(iv),
                        &[],
                        &mut buffer,
                        &GenericArray::from(tag),
                    )
                    .map_err(|err| {
                        StorageError::Integrity(format!(
                            "authentication tag verification failed: {err}"
                        ))
                    })?;
                Ok(buffer)
            }
            EncryptionType::Aes256Cbc => {
                if ciphertext.is_empty() || !ciphertext.len().is_multiple_of(BLOCK_SIZE) {
                    return Err(StorageError::Decryption(format!(
                        "invalid aes-256-cbc ciphertext length: {}",
                        ciphertext.len()
                    )));
                }
                let decryptor = Aes256CbcDec::new_from_slices(self.key.as_bytes(), &iv)
                    .map_err(|err| StorageError::Decryption(format!("aes-256-cbc: {err}")))?;
                decryptor
                    .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                    .map_err(|err| {
                        StorageError::Integrity(format!("invalid aes-256-cbc padding: {err}"))
                    })
            }
        }
    }
}

impl fmt::Debug for Cipher {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cipher").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[expect(clippy::indexing_slicing, reason = "test")]
mod tests {
    use super::*;

    const MODES: [EncryptionType; 2] = [EncryptionType::Aes256Gcm, EncryptionType::Aes256Cbc];

    fn random_bytes(len: usize) -> Vec<u8> {
        (0..len).map(|_| rand::random::<u8>()).collect()
    }

    fn open(cipher: &Cipher, blob: &SealedBlob, mode: EncryptionType) -> StorageResult<Vec<u8>> {
        cipher.decrypt(
            &blob.ciphertext,
            &blob.iv,
            mode,
            blob.auth_tag.as_ref().map(|tag| &tag[..]),
        )
    }

    #[test]
    pub fn roundtrip() {
        let cipher = Cipher::new(&EncryptionKey::generate());
        for mode in MODES {
            for len in [0, 1, 15, 16, 17, 1024, 100_000] {
                let data = random_bytes(len);
                let blob = cipher.encrypt(&data, mode).unwrap();
                assert_eq!(blob.auth_tag.is_some(), mode.is_authenticated());
                if len > 0 {
                    assert_ne!(blob.ciphertext, data);
                }
                assert_eq!(open(&cipher, &blob, mode).unwrap(), data);
            }
        }
    }

    #[test]
    pub fn cbc_is_padded() {
        let cipher = Cipher::new(&EncryptionKey::generate());
        let blob = cipher.encrypt(&[7; 16], EncryptionType::Aes256Cbc).unwrap();
        assert_eq!(blob.ciphertext.len(), 32);
        let blob = cipher.encrypt(&[], EncryptionType::Aes256Cbc).unwrap();
        assert_eq!(blob.ciphertext.len(), 16);
    }

    #[test]
    pub fn fresh_iv_per_call() {
        let cipher = Cipher::new(&EncryptionKey::generate());
        for mode in MODES {
            let a = cipher.encrypt(b"same content", mode).unwrap();
            let b = cipher.encrypt(b"same content", mode).unwrap();
            assert_ne!(a.iv, b.iv);
            assert_ne!(a.ciphertext, b.ciphertext);
        }
    }

    #[test]
    pub fn gcm_detects_tampering() {
        let cipher = Cipher::new(&EncryptionKey::generate());
        let data = random_bytes(1024);
        let blob = cipher.encrypt(&data, EncryptionType::Aes256Gcm).unwrap();

        let mut flipped = blob.clone();
        flipped.ciphertext[500] ^= 0x01;
        let err = open(&cipher, &flipped, EncryptionType::Aes256Gcm).unwrap_err();
        assert!(matches!(err, StorageError::Integrity(_)), "{err:?}");

        let mut flipped = blob.clone();
        if let Some(tag) = &mut flipped.auth_tag {
            tag[0] ^= 0x80;
        }
        let err = open(&cipher, &flipped, EncryptionType::Aes256Gcm).unwrap_err();
        assert!(matches!(err, StorageError::Integrity(_)), "{err:?}");

        let err = cipher
            .decrypt(&blob.ciphertext, &blob.iv, EncryptionType::Aes256Gcm, None)
            .unwrap_err();
        assert!(matches!(err, StorageError::Integrity(_)), "{err:?}");
    }

    #[test]
    pub fn malformed_input() {
        let cipher = Cipher::new(&EncryptionKey::generate());
        let blob = cipher.encrypt(b"abc", EncryptionType::Aes256Gcm).unwrap();
        let tag = blob.auth_tag.unwrap();

        let err = cipher
            .decrypt(
                &blob.ciphertext,
                &blob.iv[..12],
                EncryptionType::Aes256Gcm,
                Some(&tag),
            )
            .unwrap_err();
        assert!(matches!(err, StorageError::Decryption(_)), "{err:?}");

        let err = cipher
            .decrypt(
                &blob.ciphertext,
                &blob.iv,
                EncryptionType::Aes256Gcm,
                Some(&tag[..8]),
            )
            .unwrap_err();
        assert!(matches!(err, StorageError::Decryption(_)), "{err:?}");

        let blob = cipher
            .encrypt(&random_bytes(100), EncryptionType::Aes256Cbc)
            .unwrap();
        for truncated in [&blob.ciphertext[..0], &blob.ciphertext[..20]] {
            let err = cipher
                .decrypt(truncated, &blob.iv, EncryptionType::Aes256Cbc, None)
                .unwrap_err();
            assert!(matches!(err, StorageError::Decryption(_)), "{err:?}");
        }
    }

    #[test]
    pub fn cbc_bad_padding_is_integrity_error() {
        let cipher = Cipher::new(&EncryptionKey::generate());
        let blob = cipher.encrypt(b"short", EncryptionType::Aes256Cbc).unwrap();
        let wrong_key = Cipher::new(&EncryptionKey::generate());
        // A single-block ciphertext under a different key decrypts to noise,
        // which is almost never valid padding. Retry a few IVs to be sure.
        let failed = (0..8).any(|i| {
            let mut iv = blob.iv;
            iv[0] ^= i;
            matches!(
                wrong_key.decrypt(&blob.ciphertext, &iv, EncryptionType::Aes256Cbc, None),
                Err(StorageError::Integrity(_))
            )
        });
        assert!(failed);
    }

    #[test]
    pub fn derivation_is_deterministic() {
        let secret: EncryptionSecret = "test-secret".parse().unwrap();
        let a = EncryptionKey::derive(&secret).unwrap();
        let b = EncryptionKey::derive(&secret).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());

        let other = EncryptionKey::derive(&"other-secret".parse().unwrap()).unwrap();
        assert_ne!(a.as_bytes(), other.as_bytes());
        assert_eq!(format!("{a:?}"), "EncryptionKey");

        let blob = Cipher::new(&a)
            .encrypt(b"sealed", EncryptionType::Aes256Gcm)
            .unwrap();
        assert_eq!(
            open(&Cipher::new(&b), &blob, EncryptionType::Aes256Gcm).unwrap(),
            b"sealed"
        );
    }
}

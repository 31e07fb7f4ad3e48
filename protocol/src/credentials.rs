use {
    anyhow::{Error, ensure, format_err},
    rand::{TryRngCore, rngs::OsRng},
    serde::{Deserialize, Deserializer, Serialize, Serializer, de},
    std::{
        borrow::Cow,
        fmt::{self, Debug, Display},
        str::FromStr,
    },
};

/// Operator secret from which the symmetric encryption key is derived.
///
/// The same secret must be used for the lifetime of the stored data: documents
/// sealed under one secret cannot be opened under another.
#[derive(Clone)]
pub struct EncryptionSecret(String);

impl EncryptionSecret {
    #[must_use]
    #[inline]
    pub fn as_unmasked_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for EncryptionSecret {
    type Err = Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ensure!(!s.is_empty(), "encryption secret must not be empty");
        Ok(Self(s.to_owned()))
    }
}

impl<'de> Deserialize<'de> for EncryptionSecret {
    #[inline]
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Cow::<'_, str>::deserialize(deserializer)?
            .parse()
            .map_err(de::Error::custom)
    }
}

impl Serialize for EncryptionSecret {
    #[inline]
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl Debug for EncryptionSecret {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionSecret").finish()
    }
}

const DOWNLOAD_TOKEN_LENGTH: usize = 16;

/// Random one-off token embedded in filesystem download URLs.
#[derive(Clone, PartialEq, Eq)]
pub struct DownloadToken([u8; DOWNLOAD_TOKEN_LENGTH]);

impl DownloadToken {
    #[inline]
    pub fn generate() -> anyhow::Result<Self> {
        let mut bytes = [0; DOWNLOAD_TOKEN_LENGTH];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|err| format_err!("failed to generate download token: {err}"))?;
        Ok(Self(bytes))
    }

    #[must_use]
    #[inline]
    pub fn display_unmasked(&self) -> impl Display + '_ {
        hex::encode(self.0)
    }
}

impl FromStr for DownloadToken {
    type Err = Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let array = <[u8; DOWNLOAD_TOKEN_LENGTH]>::try_from(bytes).map_err(|bytes| {
            format_err!(
                "invalid length; got {}, expected {DOWNLOAD_TOKEN_LENGTH}",
                bytes.len()
            )
        })?;
        Ok(Self(array))
    }
}

impl Debug for DownloadToken {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadToken").finish()
    }
}

#[cfg(test)]
#[expect(clippy::string_slice, reason = "test")]
mod test {
    use super::*;

    #[test]
    fn encryption_secret_from_str() {
        let secret = EncryptionSecret::from_str("correct horse battery staple").unwrap();
        assert_eq!(secret.as_unmasked_str(), "correct horse battery staple");
        assert_eq!(format!("{secret:?}"), "EncryptionSecret");
        EncryptionSecret::from_str("").unwrap_err();
        serde_json::from_str::<EncryptionSecret>(r#""""#).unwrap_err();
    }

    #[test]
    fn download_token_from_str() {
        static TOKEN: &str = "00112233445566778899aabbccddeeff";
        assert_eq!(
            DownloadToken::from_str(TOKEN)
                .unwrap()
                .display_unmasked()
                .to_string(),
            TOKEN,
        );
        DownloadToken::from_str("").unwrap_err();
        DownloadToken::from_str(&TOKEN[2..]).unwrap_err();
        DownloadToken::from_str(&format!("{TOKEN}00")).unwrap_err();
        DownloadToken::from_str(&format!("{}zz", &TOKEN[2..])).unwrap_err();
    }

    #[test]
    fn download_token_generate() {
        let a = DownloadToken::generate().unwrap();
        let b = DownloadToken::generate().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.display_unmasked().to_string().len(), 32);
    }
}

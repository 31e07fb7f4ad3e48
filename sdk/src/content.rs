use {
    crate::crypto::{Cipher, SealedBlob},
    securedoc_protocol::{
        CustomMetadata, DocumentHash, DocumentId, DocumentMetadata, EncryptionType,
        MetadataEnvelope, RetrieveOptions, RetrievedDocument, StorageError, StorageRecord,
        StorageResult,
        encoding::{decode_base64, deserialize, encode_base64, serialize},
    },
    sha2::{Digest, Sha256},
};

#[must_use]
#[inline]
pub fn document_hash(data: &[u8]) -> DocumentHash {
    DocumentHash(Sha256::digest(data).into())
}

/// Encrypted document body together with its sealed metadata, ready to be written
/// by a backend.
#[derive(Debug)]
pub struct SealedDocument {
    pub document_hash: DocumentHash,
    pub encryption_type: EncryptionType,
    pub body: SealedBlob,
    pub metadata: MetadataEnvelope,
}

/// Hashes and encrypts `data`, then encrypts the extended metadata with its own IV.
#[inline]
pub fn seal_document(
    cipher: &Cipher,
    document_id: DocumentId,
    data: &[u8],
    custom: CustomMetadata,
    encryption_type: EncryptionType,
) -> StorageResult<SealedDocument> {
    let document_hash = document_hash(data);
    let body = cipher.encrypt(data, encryption_type)?;
    let metadata = DocumentMetadata::new(
        custom,
        document_id,
        document_hash,
        encryption_type,
        encode_base64(&body.iv),
        body.auth_tag.as_ref().map(|tag| encode_base64(tag)),
    );
    let metadata = seal_metadata(cipher, &metadata, encryption_type)?;
    Ok(SealedDocument {
        document_hash,
        encryption_type,
        body,
        metadata,
    })
}

#[inline]
pub fn seal_metadata(
    cipher: &Cipher,
    metadata: &DocumentMetadata,
    encryption_type: EncryptionType,
) -> StorageResult<MetadataEnvelope> {
    let json = serialize(metadata)
        .map_err(|err| StorageError::Encryption(format!("failed to serialize metadata: {err}")))?;
    let sealed = cipher.encrypt(&json, encryption_type)?;
    Ok(MetadataEnvelope {
        encrypted_metadata_base64: encode_base64(&sealed.ciphertext),
        metadata_iv: encode_base64(&sealed.iv),
        metadata_auth_tag: sealed.auth_tag.as_ref().map(|tag| encode_base64(tag)),
        metadata_path: None,
    })
}

#[inline]
pub fn open_metadata(
    cipher: &Cipher,
    envelope: &MetadataEnvelope,
    encryption_type: EncryptionType,
) -> StorageResult<DocumentMetadata> {
    let ciphertext = decode_base64(
        "encryptedMetadataBase64",
        &envelope.encrypted_metadata_base64,
    )?;
    let iv = decode_base64("metadataIv", &envelope.metadata_iv)?;
    let auth_tag = envelope
        .metadata_auth_tag
        .as_deref()
        .map(|tag| decode_base64("metadataAuthTag", tag))
        .transpose()?;
    let json = cipher.decrypt(&ciphertext, &iv, encryption_type, auth_tag.as_deref())?;
    deserialize(&json)
        .map_err(|err| StorageError::Decryption(format!("malformed document metadata: {err}")))
}

/// Opens a document read back from a backend.
///
/// The metadata is always decrypted. The body is decrypted only if requested, in
/// which case its SHA-256 must match the hash recorded at store time.
#[inline]
pub fn open_document(
    cipher: &Cipher,
    record: &StorageRecord,
    ciphertext: Vec<u8>,
    options: RetrieveOptions,
) -> StorageResult<RetrievedDocument> {
    let metadata = open_metadata(cipher, &record.metadata, record.encryption_type)?;
    if metadata.document_hash != record.document_hash {
        return Err(StorageError::Integrity(format!(
            "sealed metadata hash {} does not match record hash {}",
            metadata.document_hash, record.document_hash
        )));
    }
    if !options.decrypt {
        return Ok(RetrievedDocument {
            data: ciphertext,
            metadata,
        });
    }

    let iv = decode_base64("iv", &metadata.iv)?;
    let auth_tag = metadata
        .auth_tag
        .as_deref()
        .map(|tag| decode_base64("authTag", tag))
        .transpose()?;
    let data = cipher.decrypt(
        &ciphertext,
        &iv,
        record.encryption_type,
        auth_tag.as_deref(),
    )?;
    let actual = document_hash(&data);
    if actual != record.document_hash {
        return Err(StorageError::HashMismatch {
            expected: record.document_hash,
            actual,
        });
    }
    Ok(RetrievedDocument { data, metadata })
}

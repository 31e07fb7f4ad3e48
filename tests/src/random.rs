use {
    rand::{
        Rng,
        distr::{Alphanumeric, SampleString},
        seq::IndexedRandom,
    },
    securedoc_protocol::{
        CustomMetadata, DocumentId, EncryptionType, StorageProvider, StoreOptions,
    },
    serde_json::json,
};

const TITLES: &[&str] = &[
    "Contrato de arriendo",
    "Poder simple",
    "Declaración jurada",
    "Finiquito",
    "Compraventa",
];

pub fn random_content() -> Vec<u8> {
    let mut rng = rand::rng();
    let len: usize = if rng.random_bool(0.05) {
        0
    } else if rng.random_bool(0.3) {
        rng.random_range(1..=64)
    } else {
        rng.random_range(1..=256 * 1024)
    };
    (0..len).map(|_| rng.random::<u8>()).collect()
}

pub fn random_document_id() -> DocumentId {
    DocumentId(rand::rng().random_range(1..=20))
}

pub fn random_title() -> String {
    let mut rng = rand::rng();
    TITLES
        .choose(&mut rng)
        .map_or_else(|| "Documento".to_owned(), |title| (*title).to_owned())
}

pub fn random_metadata(title: &str) -> CustomMetadata {
    let mut rng = rand::rng();
    let mut metadata = CustomMetadata::new();
    metadata.insert("title".into(), json!(title));
    if rng.random_bool(0.5) {
        metadata.insert(
            "notary".into(),
            json!(Alphanumeric.sample_string(&mut rng, 12)),
        );
    }
    if rng.random_bool(0.1) {
        // Reserved keys supplied by the caller must be ignored.
        metadata.insert("documentHash".into(), json!("forged"));
        metadata.insert("iv".into(), json!("forged"));
    }
    metadata
}

pub fn random_options() -> StoreOptions {
    let mut rng = rand::rng();
    StoreOptions {
        provider: *[None, Some(StorageProvider::LocalFs), Some(StorageProvider::ObjectStore)]
            .choose(&mut rng)
            .unwrap_or(&None),
        encryption_type: *[None, Some(EncryptionType::Aes256Gcm), Some(EncryptionType::Aes256Cbc)]
            .choose(&mut rng)
            .unwrap_or(&None),
    }
}

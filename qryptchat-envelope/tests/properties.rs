use proptest::prelude::*;

use qryptchat_envelope::cipher::{decrypt, encrypt_for};
use qryptchat_envelope::kem::{self, KemAlgorithm, SecretKey};

fn resolver(alg: KemAlgorithm, sk: SecretKey) -> impl Fn(KemAlgorithm) -> Option<SecretKey> {
    move |requested| {
        (requested == alg).then(|| SecretKey::from_bytes(requested, sk.as_bytes().to_vec()).unwrap())
    }
}

proptest! {
    #[test]
    fn arbitrary_utf8_plaintext_round_trips(plaintext in "\\PC*") {
        let (pk, sk) = kem::generate_keypair(KemAlgorithm::Primary);
        let pk_b64 = base64::encode(pk.as_bytes());

        let envelope = encrypt_for(&pk_b64, &plaintext).unwrap();
        let out = decrypt(&envelope, resolver(KemAlgorithm::Primary, sk));
        prop_assert_eq!(out, plaintext);
    }

    #[test]
    fn single_bit_flip_in_ciphertext_never_yields_plaintext(
        plaintext in "[a-zA-Z0-9 ]{1,64}",
        flip_byte in 0usize..64,
    ) {
        let (pk, sk) = kem::generate_keypair(KemAlgorithm::Legacy);
        let pk_b64 = base64::encode(pk.as_bytes());
        let envelope = encrypt_for(&pk_b64, &plaintext).unwrap();

        let mut value: serde_json::Value = serde_json::from_str(&envelope).unwrap();
        let mut raw = base64::decode(value["c"].as_str().unwrap()).unwrap();
        let idx = flip_byte % raw.len();
        raw[idx] ^= 0x01;
        value["c"] = serde_json::Value::String(base64::encode(&raw));
        let tampered = serde_json::to_string(&value).unwrap();

        let out = decrypt(&tampered, resolver(KemAlgorithm::Legacy, sk));
        prop_assert_ne!(out, plaintext);
    }
}

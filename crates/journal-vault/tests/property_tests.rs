//! Property-based tests for journal-vault
//!
//! Uses proptest to verify encryption invariants across randomized bundles

use journal_vault::engine;
use journal_vault::{derive_key, EncryptedBlob, Error, KdfParams, SensitiveFieldBundle, VaultKey};
use proptest::prelude::*;
use std::sync::OnceLock;

// ============================================================================
// Fixtures
// ============================================================================

const SALT_A: [u8; 32] = [7u8; 32];
const SALT_B: [u8; 32] = [9u8; 32];

fn key_a() -> &'static VaultKey {
    static KEY: OnceLock<VaultKey> = OnceLock::new();
    KEY.get_or_init(|| {
        derive_key("correct-horse-battery-staple12", &SALT_A, &KdfParams::for_test()).unwrap()
    })
}

fn key_b() -> &'static VaultKey {
    static KEY: OnceLock<VaultKey> = OnceLock::new();
    KEY.get_or_init(|| {
        derive_key("correct-horse-battery-staple12", &SALT_B, &KdfParams::for_test()).unwrap()
    })
}

// ============================================================================
// Property Test Strategies
// ============================================================================

fn text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 .,'ü🌿]{0,80}").unwrap()
}

fn list_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(text_strategy(), 0..5)
}

/// Percentages in tenths, 0.0 to 100.0
fn percentage_strategy() -> impl Strategy<Value = Option<f64>> {
    prop::option::of((0u32..=1000).prop_map(|t| t as f64 / 10.0))
}

fn score_strategy() -> impl Strategy<Value = Option<u8>> {
    prop::option::of(0u8..=10)
}

fn bundle_strategy() -> impl Strategy<Value = SensitiveFieldBundle> {
    let text = (
        text_strategy(),
        list_strategy(),
        text_strategy(),
        text_strategy(),
        text_strategy(),
        text_strategy(),
        text_strategy(),
    );
    let lists = (list_strategy(), list_strategy(), list_strategy());
    let numbers = (
        percentage_strategy(),
        percentage_strategy(),
        prop::option::of(0u32..=1440),
    );
    let scores = prop::collection::vec(score_strategy(), 10);

    (text, lists, numbers, scores).prop_map(
        |(
            (strain_name, strain_names, dosage, method, notes_before, notes_after, icon),
            (observations, activities, side_effects),
            (thc_percentage, cbd_percentage, duration_minutes),
            s,
        )| SensitiveFieldBundle {
            strain_name,
            strain_names,
            thc_percentage,
            cbd_percentage,
            dosage,
            method,
            notes_before,
            notes_after,
            observations,
            activities,
            side_effects,
            before_mood: s[0],
            after_mood: s[1],
            before_pain: s[2],
            after_pain: s[3],
            before_anxiety: s[4],
            after_anxiety: s[5],
            before_energy: s[6],
            after_energy: s[7],
            before_focus: s[8],
            after_focus: s[9],
            duration_minutes,
            icon,
        },
    )
}

// ============================================================================
// Engine Properties
// ============================================================================

proptest! {
    /// Property: decrypt(encrypt(b)) == b
    #[test]
    fn prop_roundtrip(bundle in bundle_strategy()) {
        let blob = engine::encrypt(key_a(), &bundle, 1).unwrap();
        let decrypted = engine::decrypt(key_a(), &blob).unwrap();
        prop_assert_eq!(decrypted, bundle);
    }

    /// Property: the stored form survives its own serialization
    #[test]
    fn prop_roundtrip_through_column(bundle in bundle_strategy()) {
        let column = engine::encrypt(key_a(), &bundle, 1).unwrap().to_json_string().unwrap();
        let blob = EncryptedBlob::parse(&column).unwrap();
        prop_assert_eq!(engine::decrypt(key_a(), &blob).unwrap(), bundle);
    }

    /// Property: a key from another salt never opens the blob
    #[test]
    fn prop_wrong_key_fails(bundle in bundle_strategy()) {
        let blob = engine::encrypt(key_a(), &bundle, 1).unwrap();
        prop_assert!(matches!(
            engine::decrypt(key_b(), &blob),
            Err(Error::DecryptionFailure(_))
        ));
    }

    /// Property: identical plaintext never yields identical blobs
    #[test]
    fn prop_fresh_nonce_per_write(bundle in bundle_strategy()) {
        let first = engine::encrypt(key_a(), &bundle, 1).unwrap();
        let second = engine::encrypt(key_a(), &bundle, 1).unwrap();
        prop_assert_ne!(first.iv, second.iv);
        prop_assert_ne!(first.ciphertext, second.ciphertext);
    }

    /// Property: no plaintext text field is visible in the blob
    #[test]
    fn prop_blob_hides_notes(notes in "[a-z]{12,40}") {
        let bundle = SensitiveFieldBundle {
            notes_before: notes.clone(),
            ..Default::default()
        };
        let column = engine::encrypt(key_a(), &bundle, 1).unwrap().to_json_string().unwrap();
        prop_assert!(!column.contains(&notes));
    }
}

// ============================================================================
// Key Derivation Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Property: same password + salt = same key
    #[test]
    fn prop_deterministic_derivation(
        password in "[a-zA-Z0-9 ]{1,40}",
        salt in prop::array::uniform32(any::<u8>())
    ) {
        let k1 = derive_key(&password, &salt, &KdfParams::for_test()).unwrap();
        let k2 = derive_key(&password, &salt, &KdfParams::for_test()).unwrap();
        prop_assert_eq!(*k1.verifier(), *k2.verifier());
    }

    /// Property: a different password yields a key that cannot decrypt
    #[test]
    fn prop_different_password_cannot_decrypt(suffix in "[a-z0-9]{1,12}") {
        let password = format!("correct-horse-battery-staple12{}", suffix);
        let other = derive_key(&password, &SALT_A, &KdfParams::for_test()).unwrap();

        let blob = engine::encrypt(key_a(), &SensitiveFieldBundle::default(), 1).unwrap();
        prop_assert!(matches!(
            engine::decrypt(&other, &blob),
            Err(Error::DecryptionFailure(_))
        ));
    }
}

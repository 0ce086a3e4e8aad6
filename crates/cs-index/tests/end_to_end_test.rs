//! End-to-end tests: a client engine ingests into the store, then searches
//! with tokens only and decrypts the hits.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use cs_core::{CsError, EncryptedRecord, SearchOp};
use cs_crypto::{Engine, KdfParams};
use cs_index::Store;
use secrecy::SecretString;

const SALT: [u8; 16] = [0x5Au8; 16];

fn engine() -> &'static Engine {
    static ENGINE: OnceLock<Engine> = OnceLock::new();
    ENGINE.get_or_init(|| {
        Engine::new(
            &SecretString::from("hackathon_demo_2024"),
            Some(SALT.to_vec()),
            &KdfParams::default(),
        )
        .expect("engine")
    })
}

fn intruder() -> &'static Engine {
    static ENGINE: OnceLock<Engine> = OnceLock::new();
    ENGINE.get_or_init(|| {
        Engine::new(
            &SecretString::from("wrongpassword"),
            Some(SALT.to_vec()),
            &KdfParams::default(),
        )
        .expect("engine")
    })
}

fn ingest(store: &Store, id: &str, content: &str) {
    let request = engine().prepare_ingest(id, content, 3).expect("prepare");
    store.ingest(&request).expect("ingest");
}

fn ids(records: &[EncryptedRecord]) -> Vec<&str> {
    records.iter().map(|r| r.document_id.as_str()).collect()
}

fn corpus() -> Store {
    let store = Store::in_memory();
    ingest(
        &store,
        "P001",
        "Patient John Smith diagnosed with Type 2 Diabetes and Hypertension. \
         Prescribed Metformin 500mg and Lisinopril 10mg.",
    );
    ingest(
        &store,
        "P002",
        "Patient Jane Doe reports chronic migraine and anxiety. \
         Prescribed Sumatriptan and Sertraline.",
    );
    ingest(
        &store,
        "P003",
        "Patient Bob Chen has Coronary Artery Disease and Diabetes. \
         On Aspirin, Atorvastatin, and Metformin.",
    );
    store
}

#[test]
fn exact_search_finds_only_matching_document() {
    let store = Store::in_memory();
    ingest(&store, "D1", "diabetes and hypertension");

    let hits = store.search_token(&engine().generate_token("diabetes").unwrap());
    assert_eq!(ids(&hits), vec!["D1"]);
    assert_eq!(
        engine().decrypt_record(&hits[0]).unwrap(),
        "diabetes and hypertension"
    );

    let foreign = intruder().generate_token("diabetes").unwrap();
    assert!(store.search_token(&foreign).is_empty());
}

#[test]
fn search_is_case_insensitive_on_the_client() {
    let store = corpus();
    let hits = store.search_token(&engine().generate_token("  METFORMIN ").unwrap());
    assert_eq!(ids(&hits), vec!["P001", "P003"]);
}

#[test]
fn boolean_search_obeys_set_algebra() {
    let store = corpus();
    let diabetes = engine().generate_token("diabetes").unwrap();
    let metformin = engine().generate_token("metformin").unwrap();
    let migraine = engine().generate_token("migraine").unwrap();

    let and = store
        .search_multi(&[diabetes.clone(), metformin.clone()], SearchOp::And)
        .unwrap();
    assert_eq!(ids(&and), vec!["P001", "P003"]);

    let and = store
        .search_multi(&[diabetes.clone(), migraine.clone()], SearchOp::And)
        .unwrap();
    assert!(and.is_empty());

    let or = store
        .search_multi(&[diabetes.clone(), migraine.clone()], SearchOp::Or)
        .unwrap();
    assert_eq!(ids(&or), vec!["P001", "P002", "P003"]);

    let per_token: BTreeSet<String> = [&diabetes, &migraine]
        .iter()
        .flat_map(|t| store.search_token(t))
        .map(|r| r.document_id)
        .collect();
    let or_ids: BTreeSet<String> = or.into_iter().map(|r| r.document_id).collect();
    assert_eq!(per_token, or_ids);
}

#[test]
fn fuzzy_search_tolerates_typos() {
    let store = corpus();
    let grams = engine().generate_ngram_tokens("diabetis", 3).unwrap();

    // 7 of 10 windows shared with "diabetes"; floor(10 * 0.6) = 6
    let hits = store.search_fuzzy(&grams, 0.6).unwrap();
    assert_eq!(ids(&hits), vec!["P001", "P003"]);

    for hit in &hits {
        assert!(engine().decrypt_record(hit).unwrap().contains("Diabetes"));
    }
}

#[test]
fn fuzzy_full_threshold_on_stored_keyword() {
    let store = corpus();
    let grams = engine().generate_ngram_tokens("sertraline", 3).unwrap();

    let hits = store.search_fuzzy(&grams, 1.0).unwrap();
    assert_eq!(ids(&hits), vec!["P002"]);
}

#[test]
fn fuzzy_zero_threshold_returns_any_shared_gram() {
    let store = Store::in_memory();
    ingest(&store, "A", "zebra");
    ingest(&store, "B", "quokka");

    // shares only the "$$z" window with "zebra"
    let grams = engine().generate_ngram_tokens("zoo", 3).unwrap();
    assert_eq!(ids(&store.search_fuzzy(&grams, 0.0).unwrap()), vec!["A"]);
}

#[test]
fn fuzzy_minimum_uses_full_query_length() {
    let store = Store::in_memory();
    ingest(&store, "BANK", "bank");

    // "banana" yields 8 windows (7 distinct); "bank" shares 3 of them
    let grams = engine().generate_ngram_tokens("banana", 3).unwrap();
    assert_eq!(grams.len(), 8);
    assert!(store.search_fuzzy(&grams, 0.5).unwrap().is_empty());
    assert_eq!(ids(&store.search_fuzzy(&grams, 0.375).unwrap()), vec!["BANK"]);
}

#[test]
fn fuzzy_tokens_from_other_secret_match_nothing() {
    let store = corpus();
    let grams = intruder().generate_ngram_tokens("diabetes", 3).unwrap();
    assert!(store.search_fuzzy(&grams, 0.0).unwrap().is_empty());
}

#[test]
fn delete_removes_document_from_both_indexes() {
    let store = Store::in_memory();
    ingest(&store, "D1", "diabetes and hypertension");
    assert!(store.delete_document("D1").unwrap());

    assert!(store
        .search_token(&engine().generate_token("diabetes").unwrap())
        .is_empty());
    let grams = engine().generate_ngram_tokens("diabetes", 3).unwrap();
    assert!(store.search_fuzzy(&grams, 0.0).unwrap().is_empty());
    assert_eq!(store.get_stats().index_entries, 0);
}

#[test]
fn clear_all_resets_everything() {
    let store = corpus();
    store.search_token(&engine().generate_token("diabetes").unwrap());
    store.clear_all().unwrap();

    let stats = store.get_stats();
    assert_eq!(stats.documents, 0);
    assert_eq!(stats.index_entries, 0);
    assert_eq!(stats.unique_tokens, 0);
    assert_eq!(stats.audit_events, 0);
    assert!(store.audit_log().is_empty());
}

#[test]
fn swapped_ciphertexts_fail_authentication() {
    let store = corpus();
    let docs = store.get_all_documents_raw();
    let (p1, p2) = (&docs[0], &docs[1]);

    let err = engine()
        .decrypt_text(&p1.ciphertext, &p1.nonce, &p2.document_id)
        .unwrap_err();
    assert!(matches!(err, CsError::Authentication));
}

#[test]
fn server_view_holds_no_plaintext() {
    let store = corpus();

    for doc in store.get_all_documents_raw() {
        assert!(!doc.ciphertext.to_lowercase().contains("diabetes"));
        assert_eq!(doc.keyword_count, 0);
    }
    for entry in store.get_all_tokens_raw(50) {
        assert_eq!(entry.token.as_str().len(), 44);
        assert!(!entry.token.as_str().contains("diabetes"));
    }
    for entry in store.audit_log() {
        let rendered = serde_json::to_string(&entry).unwrap();
        assert!(!rendered.contains("diabetes"));
    }
}

#[test]
fn reingest_is_idempotent() {
    let store = corpus();
    let before = store.get_stats();

    ingest(
        &store,
        "P002",
        "Patient Jane Doe reports chronic migraine and anxiety. \
         Prescribed Sumatriptan and Sertraline.",
    );

    let after = store.get_stats();
    assert_eq!(before.documents, after.documents);
    assert_eq!(before.index_entries, after.index_entries);
    assert_eq!(before.unique_tokens, after.unique_tokens);
}

use std::collections::BTreeMap;
use std::fs;

use passdb_core::crypto::{self, SALT_LEN};
use passdb_core::{CryptoError, DbError, Item, KdfParams, PassDb, Store, StoreError, StoreOptions};
use tempfile::tempdir;

const PASSWORD: &str = "!Password!123";

fn options() -> StoreOptions {
    StoreOptions {
        kdf: KdfParams::new(256, 1, 1),
        sync_before_rename: false,
    }
}

#[test]
fn roundtrip_over_varied_inputs() {
    let passwords: [&[u8]; 4] = [b"12345", b"validpass123", "pässwörd-ünïcode".as_bytes(), &[0u8; 64]];
    let plaintexts: [&[u8]; 4] = [b"x", b"{\"name\":\"n\"}", &[0xFF; 1], &[7u8; 10_000]];
    for password in passwords {
        for plaintext in plaintexts {
            let sealed = crypto::encrypt_with(plaintext, password, &options().kdf).unwrap();
            assert_eq!(&crypto::decrypt(&sealed, password).unwrap()[..], plaintext);
        }
    }
}

#[test]
fn wrong_key_and_salt_swap_are_rejected() {
    let a = crypto::encrypt_with(b"message", b"password-one", &options().kdf).unwrap();
    let b = crypto::encrypt_with(b"message", b"password-one", &options().kdf).unwrap();
    assert!(matches!(
        crypto::decrypt(&a, b"password-two"),
        Err(CryptoError::CannotDecrypt)
    ));

    // Grafting another envelope's salt yields a different key.
    let mut grafted = a.clone();
    let at = grafted.len() - SALT_LEN;
    grafted[at..].copy_from_slice(&b[b.len() - SALT_LEN..]);
    assert!(matches!(
        crypto::decrypt(&grafted, b"password-one"),
        Err(CryptoError::CannotDecrypt)
    ));
}

#[test]
fn persistence_is_idempotent() {
    let mut store = Store::create_with(std::io::sink(), "test-store", PASSWORD, options()).unwrap();
    store.create_key("github", "{\"user\":\"me\"}").unwrap();
    store.create_key("bank", "{\"user\":\"also me\"}").unwrap();
    store.update_key("bank", "{\"user\":\"still me\"}").unwrap();
    store.delete_key("github").unwrap();
    store.create_key("email", "{}").unwrap();
    let before: BTreeMap<String, String> = store.all_entries();

    let mut disk = Vec::new();
    store.save(&mut disk).unwrap();
    let loaded = Store::load_with(&disk[..], PASSWORD, options()).unwrap();

    assert_eq!(loaded.all_entries(), before);
    assert_eq!(loaded.name(), "test-store");
    assert_eq!(loaded.get_key("bank").unwrap(), "{\"user\":\"still me\"}");
}

#[test]
fn crash_after_staging_leaves_store_intact() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vault.db");
    let mut db = PassDb::create_with(&path, "testpassdb", PASSWORD, options()).unwrap();
    db.save_new_item(&Item::new("email", "me", "pw", "", vec![]).unwrap())
        .unwrap();
    let original = fs::read(&path).unwrap();

    // What a process killed mid-commit leaves behind: a half-written stage file.
    let orphan = dir.path().join(".vault.db.a1b2c3.tmp");
    fs::write(&orphan, &original[..original.len() / 2]).unwrap();

    assert_eq!(fs::read(&path).unwrap(), original);
    let reloaded = PassDb::load_with(&path, PASSWORD, options()).unwrap();
    assert_eq!(reloaded.list_items(), vec!["email".to_string()]);
    assert_eq!(reloaded.retrieve_item("email").unwrap().password, "pw");
    assert!(!orphan.exists());
}

#[test]
fn corrupted_file_is_indistinguishable_from_wrong_password() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vault.db");
    PassDb::create_with(&path, "testpassdb", PASSWORD, options()).unwrap();

    let mut bytes = fs::read(&path).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0x80;
    fs::write(&path, &bytes).unwrap();

    let corrupt = PassDb::load_with(&path, PASSWORD, options()).unwrap_err();
    let wrong = PassDb::load_with(&path, "another-password", options()).unwrap_err();
    for err in [corrupt, wrong] {
        assert!(matches!(
            err,
            DbError::Store(StoreError::Crypto(CryptoError::CannotDecrypt))
        ));
    }
}

#[test]
fn options_upgrade_kdf_on_next_write() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vault.db");
    PassDb::create_with(&path, "testpassdb", PASSWORD, options()).unwrap();
    assert_eq!(
        crypto::inspect(&fs::read(&path).unwrap()).unwrap().kdf,
        options().kdf
    );

    let stronger = StoreOptions {
        kdf: KdfParams::new(512, 2, 1),
        ..options()
    };
    let mut db = PassDb::load_with(&path, PASSWORD, stronger).unwrap();
    db.save_new_item(&Item::new("x", "u", "", "", vec![]).unwrap())
        .unwrap();
    assert_eq!(
        crypto::inspect(&fs::read(&path).unwrap()).unwrap().kdf,
        stronger.kdf
    );
}

#[test]
fn weaker_options_never_downgrade_kdf() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vault.db");
    let strong = StoreOptions {
        kdf: KdfParams::new(1024, 4, 2),
        ..options()
    };
    PassDb::create_with(&path, "testpassdb", PASSWORD, strong).unwrap();

    let mut db = PassDb::load_with(&path, PASSWORD, options()).unwrap();
    db.save_new_item(&Item::new("x", "u", "", "", vec![]).unwrap())
        .unwrap();
    assert_eq!(
        crypto::inspect(&fs::read(&path).unwrap()).unwrap().kdf,
        strong.kdf
    );
}

use super::*;

const HELLO_SHA256: &str = "2CF24DBA5FB0A30E26E83B2AC5B9E29E1B161E5C1FA7425E73043362938B9824";

#[test]
fn storage_key_is_uppercase_hash() {
    assert_eq!(storage_key(b"hello"), HELLO_SHA256);
}

#[test]
fn identical_content_is_stored_once() {
    let tmp = tempfile::tempdir().expect("create temp dir");
    let store = FsMediaStore::new(tmp.path()).expect("create store");

    let key = storage_key(b"same bytes");
    assert_eq!(store.store(&key, b"same bytes").expect("store"), key);
    assert_eq!(store.store(&key, b"same bytes").expect("store again"), key);
    assert_ne!(key, storage_key(b"other bytes"));

    // Only the object itself: no temp files are left behind.
    assert_eq!(fs::read_dir(tmp.path()).expect("list root").count(), 1);
}

#[test]
fn fs_store_writes_each_key_once() {
    let tmp = tempfile::tempdir().expect("create temp dir");
    let store = FsMediaStore::new(tmp.path().join("media")).expect("create store");

    let stored = store.store("KEY", b"first").expect("store");
    assert_eq!(stored, "KEY");

    // A second write of the same key leaves the original bytes alone.
    store.store("KEY", b"second").expect("store again");

    let bytes = fs::read(store.root().join("KEY")).expect("read stored");
    assert_eq!(bytes, b"first");
}

/// Yields a few bytes, then fails.
struct BrokenBody {
    sent: bool,
}

impl Read for BrokenBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.sent {
            return Err(io::Error::other("connection reset"));
        }
        self.sent = true;
        buf[..4].copy_from_slice(b"part");
        Ok(4)
    }
}

#[test]
fn interrupted_write_leaves_no_file_under_the_key() {
    let tmp = tempfile::tempdir().expect("create temp dir");
    let store = FsMediaStore::new(tmp.path()).expect("create store");
    let dest = store.root().join("KEY");

    let err = store
        .write_new(&dest, BrokenBody { sent: false })
        .expect_err("broken body must fail");
    assert!(format!("{err:#}").contains("connection reset"), "{err:#}");
    assert!(!dest.exists());
    assert_eq!(fs::read_dir(tmp.path()).expect("list root").count(), 0);

    // The key is still free for a complete write.
    store.store("KEY", b"whole").expect("store");
    assert_eq!(fs::read(&dest).expect("read stored"), b"whole");
}

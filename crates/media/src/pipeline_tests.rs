use super::*;

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use anyhow::bail;
use serde_json::{Map, Value};

use crate::FetchedObject;

struct StubFetcher {
    bodies: HashMap<String, Vec<u8>>,
    calls: AtomicUsize,
}

impl StubFetcher {
    fn new(entries: &[(&str, &str)]) -> Self {
        Self {
            bodies: entries
                .iter()
                .map(|(url, body)| (url.to_string(), body.as_bytes().to_vec()))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl Fetcher for StubFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedObject> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let Some(body) = self.bodies.get(url) else {
            bail!("404 for {url}");
        };

        let mut headers = Map::new();
        headers.insert("content-type".into(), Value::from("image/png"));

        Ok(FetchedObject {
            url: url.to_string(),
            body: body.clone(),
            content_type: Some("image/png".into()),
            headers,
        })
    }
}

#[derive(Default)]
struct MemoryStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MediaStore for MemoryStore {
    fn store(&self, key: &str, body: &[u8]) -> Result<String> {
        self.objects
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_insert_with(|| body.to_vec());
        Ok(key.to_string())
    }
}

fn doc_with(objects: Vec<ObjectRef>) -> CdrV3Document {
    let mut doc = CdrV3Document::new("http://example.com", "c", "t", "ts".into());
    doc.objects = Some(objects);
    doc
}

fn stored(obj: &ObjectRef) -> &MediaObject {
    match obj {
        ObjectRef::Stored(m) => m,
        other => panic!("expected stored object, got {other:?}"),
    }
}

#[test]
fn fetches_and_deduplicates_by_content() {
    let fetcher = StubFetcher::new(&[
        ("http://example.com/1.png", "pixels"),
        ("http://mirror.example.com/copy.png", "pixels"),
        ("http://example.com/2.png", "other"),
    ]);
    let pipeline = MediaPipeline::new(fetcher, MemoryStore::default(), 4);

    let mut doc = doc_with(vec![
        ObjectRef::Url("http://example.com/1.png".into()),
        ObjectRef::Url("http://mirror.example.com/copy.png".into()),
        ObjectRef::Url("http://example.com/2.png".into()),
    ]);

    assert_eq!(pipeline.process(&mut doc), 3);

    let objects = doc.objects.as_ref().expect("objects");
    let first = stored(&objects[0]);
    let mirror = stored(&objects[1]);
    let other = stored(&objects[2]);

    // Order follows the original list.
    assert_eq!(first.obj_original_url, "http://example.com/1.png");
    assert_eq!(mirror.obj_original_url, "http://mirror.example.com/copy.png");
    assert_eq!(other.obj_original_url, "http://example.com/2.png");

    assert_eq!(first.obj_stored_url, mirror.obj_stored_url);
    assert_ne!(first.obj_stored_url, other.obj_stored_url);
    assert!(!first.obj_stored_url.ends_with(".png"));
    assert_eq!(first.content_type.as_deref(), Some("image/png"));
    assert!(first.timestamp_crawl.is_some());
    assert_eq!(first.response_headers["content-type"], Value::from("image/png"));

    assert_eq!(pipeline.store.objects.lock().unwrap().len(), 2);
}

#[test]
fn same_bytes_from_differently_suffixed_urls_share_a_key() {
    let urls = [
        "http://a.com/x.png",
        "http://b.org/y.jpg",
        "http://example.com/file.pdf",
        "http://example.com/file.pdf?allow=true",
        "http://example.com/download",
    ];
    let entries: Vec<(&str, &str)> = urls.iter().map(|url| (*url, "same bytes")).collect();
    let pipeline = MediaPipeline::new(StubFetcher::new(&entries), MemoryStore::default(), 3);

    let mut doc = doc_with(urls.iter().map(|url| ObjectRef::Url(url.to_string())).collect());
    assert_eq!(pipeline.process(&mut doc), urls.len());

    let objects = doc.objects.as_ref().expect("objects");
    let key = &stored(&objects[0]).obj_stored_url;
    assert_eq!(key, &storage_key(b"same bytes"));
    assert!(!key.ends_with(".pdf"));
    for obj in objects {
        assert_eq!(&stored(obj).obj_stored_url, key);
    }

    assert_eq!(pipeline.store.objects.lock().unwrap().len(), 1);
}

#[test]
fn failed_fetch_drops_only_that_object() {
    let fetcher = StubFetcher::new(&[("http://example.com/ok.png", "ok")]);
    let pipeline = MediaPipeline::new(fetcher, MemoryStore::default(), 2);

    let already = MediaObject::new("http://example.com/old.gif", "OLD.gif", None, Map::new());
    let mut doc = doc_with(vec![
        ObjectRef::Url("http://example.com/missing.png".into()),
        ObjectRef::Stored(already.clone()),
        ObjectRef::Url("http://example.com/ok.png".into()),
    ]);

    assert_eq!(pipeline.process(&mut doc), 2);

    let objects = doc.objects.as_ref().expect("objects");
    assert_eq!(stored(&objects[0]), &already);
    assert_eq!(stored(&objects[1]).obj_original_url, "http://example.com/ok.png");

    // Stored objects are never re-fetched.
    assert_eq!(pipeline.fetcher.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn document_without_objects_is_untouched() {
    let pipeline = MediaPipeline::new(StubFetcher::new(&[]), MemoryStore::default(), 1);
    let mut doc = CdrV3Document::new("http://example.com", "c", "t", "ts".into());

    assert_eq!(pipeline.process(&mut doc), 0);
    assert!(doc.objects.is_none());
}

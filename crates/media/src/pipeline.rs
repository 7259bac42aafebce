use std::thread;

use anyhow::Result;
use cdr_schema::{CdrV3Document, MediaObject, ObjectRef};
use crossbeam::channel;
use log::{debug, warn};

use crate::{fetch::Fetcher, store::MediaStore, storage_key};

/// Downloads the objects referenced by a document and rewrites its `objects`
/// list to point at the stored, content-addressed copies.
pub struct MediaPipeline<F, S> {
    fetcher: F,
    store: S,
    concurrency: usize,
}

impl<F: Fetcher, S: MediaStore> MediaPipeline<F, S> {
    pub fn new(fetcher: F, store: S, concurrency: usize) -> Self {
        Self {
            fetcher,
            store,
            concurrency: concurrency.max(1),
        }
    }

    /// Fetch every bare-URL object of `doc`.
    ///
    /// Objects that fail to download or store are dropped from the list;
    /// already stored objects are kept. Returns the number of objects left.
    pub fn process(&self, doc: &mut CdrV3Document) -> usize {
        let Some(objects) = doc.objects.take() else {
            return 0;
        };

        let jobs: Vec<(usize, String)> = objects
            .iter()
            .enumerate()
            .filter_map(|(i, obj)| match obj {
                ObjectRef::Url(url) => Some((i, url.clone())),
                ObjectRef::Stored(_) => None,
            })
            .collect();

        let mut fetched: Vec<Option<MediaObject>> = vec![None; objects.len()];
        for (i, obj) in self.fetch_all(jobs) {
            fetched[i] = obj;
        }

        let kept: Vec<ObjectRef> = objects
            .into_iter()
            .zip(fetched)
            .filter_map(|(obj, fetched)| match obj {
                ObjectRef::Stored(_) => Some(obj),
                ObjectRef::Url(_) => fetched.map(ObjectRef::Stored),
            })
            .collect();

        let count = kept.len();
        doc.objects = Some(kept);
        count
    }

    fn fetch_all(&self, jobs: Vec<(usize, String)>) -> Vec<(usize, Option<MediaObject>)> {
        if jobs.is_empty() {
            return Vec::new();
        }

        let workers = self.concurrency.min(jobs.len());
        let (job_tx, job_rx) = channel::unbounded::<(usize, String)>();
        let (res_tx, res_rx) = channel::unbounded();

        for job in jobs {
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        thread::scope(|s| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let res_tx = res_tx.clone();

                s.spawn(move || {
                    for (i, url) in job_rx {
                        let _ = res_tx.send((i, self.fetch_one(&url)));
                    }
                });
            }
        });

        drop(res_tx);
        res_rx.into_iter().collect()
    }

    fn fetch_one(&self, url: &str) -> Option<MediaObject> {
        match self.try_fetch(url) {
            Ok(obj) => {
                debug!("[media] stored {url} as {}", obj.obj_stored_url);
                Some(obj)
            }
            Err(e) => {
                warn!("[media] dropping {url}: {e:#}");
                None
            }
        }
    }

    fn try_fetch(&self, url: &str) -> Result<MediaObject> {
        let fetched = self.fetcher.fetch(url)?;
        let key = storage_key(&fetched.body);
        let stored_url = self.store.store(&key, &fetched.body)?;

        Ok(MediaObject::new(
            url,
            stored_url,
            fetched.content_type,
            fetched.headers,
        ))
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;

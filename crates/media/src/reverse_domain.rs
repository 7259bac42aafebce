use std::{fs, path::Path};

use anyhow::{Context, Result, ensure};
use cdr_schema::{CdrV3Document, ObjectRef};
use url::Url;

/// Key of a stored object inside the reversed-domain layout:
/// `http://www.example.com:8080/a.png` stored as `ABC.png` becomes
/// `com/example/www/ABC`.
pub fn reverse_domain_key(original_url: &str, stored_url: &str) -> Result<String> {
    ensure!(
        !stored_url.contains('/'),
        "stored url {stored_url} is already nested"
    );

    let parsed =
        Url::parse(original_url).with_context(|| format!("invalid object url {original_url}"))?;
    let host = parsed
        .host_str()
        .with_context(|| format!("object url {original_url} has no host"))?;

    let stem = match stored_url.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => stored_url,
    };

    let mut parts: Vec<&str> = host.split('.').rev().filter(|p| !p.is_empty()).collect();
    parts.push(stem);

    Ok(parts.join("/"))
}

/// Copy every stored object of `doc` into the reversed-domain layout under
/// `media_root` and point the document at the new keys.
pub fn relocate_objects(doc: &mut CdrV3Document, media_root: &Path) -> Result<()> {
    let Some(objects) = doc.objects.as_mut() else {
        return Ok(());
    };

    for obj in objects.iter_mut() {
        let ObjectRef::Stored(obj) = obj else {
            continue;
        };

        let new_key = reverse_domain_key(&obj.obj_original_url, &obj.obj_stored_url)?;
        let dest = media_root.join(&new_key);

        if !dest.exists() {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let src = media_root.join(&obj.obj_stored_url);
            fs::copy(&src, &dest).with_context(|| {
                format!("Failed to copy {} to {}", src.display(), dest.display())
            })?;
        }

        obj.obj_stored_url = new_key;
    }

    Ok(())
}

#[cfg(test)]
#[path = "reverse_domain_tests.rs"]
mod tests;

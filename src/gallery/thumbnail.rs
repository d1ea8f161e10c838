use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use crossbeam_channel::unbounded;

use crate::eagle::{EagleApi, EagleError, ItemRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Thumbnail {
    Image {
        path: PathBuf,
        mime: String,
        bytes: Vec<u8>,
    },
    /// Generic icon for files whose thumbnail is missing on disk.
    FileIcon { extension: String },
}

impl Thumbnail {
    pub fn is_icon(&self) -> bool {
        matches!(self, Thumbnail::FileIcon { .. })
    }

    pub fn byte_len(&self) -> usize {
        match self {
            Thumbnail::Image { bytes, .. } => bytes.len(),
            Thumbnail::FileIcon { .. } => 0,
        }
    }
}

fn mime_for(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg".into(),
        "svg" => "image/svg+xml".into(),
        "" => "application/octet-stream".into(),
        other => format!("image/{other}"),
    }
}

fn read_thumbnail(path: &Path) -> Result<Vec<u8>, EagleError> {
    fs::read(path).map_err(|source| EagleError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Looks up the item's thumbnail and loads its bytes. A thumbnail file that
/// is absent degrades to a file-type icon; every other failure drops the item.
pub fn resolve_thumbnail(api: &dyn EagleApi, item: &ItemRecord) -> Option<Thumbnail> {
    let path = match api.item_thumbnail(&item.id) {
        Ok(path) => path,
        Err(err) => {
            tracing::warn!(%err, item_id = %item.id, "thumbnail lookup failed");
            return None;
        }
    };
    match read_thumbnail(&path) {
        Ok(bytes) => Some(Thumbnail::Image {
            mime: mime_for(&path),
            path,
            bytes,
        }),
        Err(err) if err.is_file_absent() => {
            tracing::debug!(item_id = %item.id, path = %path.display(), "thumbnail missing, using file icon");
            Some(Thumbnail::FileIcon {
                extension: item.ext.clone(),
            })
        }
        Err(err) => {
            tracing::warn!(%err, item_id = %item.id, "thumbnail unreadable");
            None
        }
    }
}

/// Resolves every thumbnail on at most `workers` threads. The output is
/// indexed like `items`, whatever order the lookups complete in.
pub fn resolve_all(
    api: &dyn EagleApi,
    items: &[ItemRecord],
    workers: usize,
) -> Vec<Option<Thumbnail>> {
    let mut slots: Vec<Option<Thumbnail>> = vec![None; items.len()];
    if items.is_empty() {
        return slots;
    }

    let (job_tx, job_rx) = unbounded::<usize>();
    let (done_tx, done_rx) = unbounded::<(usize, Option<Thumbnail>)>();
    for index in 0..items.len() {
        let _ = job_tx.send(index);
    }
    drop(job_tx);

    thread::scope(|scope| {
        for _ in 0..workers.clamp(1, items.len()) {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            scope.spawn(move || {
                for index in job_rx.iter() {
                    let thumbnail = resolve_thumbnail(api, &items[index]);
                    if done_tx.send((index, thumbnail)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(done_tx);
        for (index, thumbnail) in done_rx.iter() {
            slots[index] = thumbnail;
        }
    });
    slots
}

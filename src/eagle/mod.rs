use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};
use thiserror::Error;

mod client;

pub use client::HttpEagleClient;

/// Page cap applied to every item list query.
pub const ITEM_LIST_LIMIT: usize = 300;

const STATUS_SUCCESS: &str = "success";

pub type FolderId = String;
pub type ItemId = String;

#[derive(Debug, Error)]
pub enum EagleError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("could not decode {endpoint} response: {message}")]
    Decode {
        endpoint: &'static str,
        message: String,
    },
    #[error("{endpoint} answered with status {status:?}")]
    Status {
        endpoint: &'static str,
        status: String,
        message: Option<String>,
    },
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl EagleError {
    pub fn is_file_absent(&self) -> bool {
        matches!(self, EagleError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

/// Folder node as returned by `/api/folder/list`. Children form a strict tree.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FolderRecord {
    pub id: FolderId,
    pub name: String,
    pub description: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub children: Vec<FolderRecord>,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub tags: Vec<String>,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub extend_tags: Vec<String>,
    pub modification_time: i64,
    pub image_count: u64,
    pub descendant_image_count: u64,
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemRecord {
    pub id: ItemId,
    pub name: String,
    pub ext: String,
    pub size: u64,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub tags: Vec<String>,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub folders: Vec<FolderId>,
    pub is_deleted: bool,
    pub url: String,
    pub annotation: String,
    pub modification_time: i64,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationInfo {
    pub version: String,
    pub build_version: String,
    pub platform: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemListQuery {
    pub folders: Vec<FolderId>,
    pub limit: usize,
}

impl ItemListQuery {
    pub fn for_folders(folders: &[FolderId]) -> Self {
        Self {
            folders: folders.to_vec(),
            limit: ITEM_LIST_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderUpdate {
    pub folder_id: FolderId,
    pub new_description: String,
}

/// Operations the sync layer needs from the Eagle HTTP API.
pub trait EagleApi: Send + Sync {
    fn application_info(&self) -> Result<ApplicationInfo, EagleError>;
    fn folder_list(&self) -> Result<Vec<FolderRecord>, EagleError>;
    fn item_list(&self, query: &ItemListQuery) -> Result<Vec<ItemRecord>, EagleError>;
    /// Filesystem path of the item's thumbnail inside the library.
    fn item_thumbnail(&self, item_id: &str) -> Result<PathBuf, EagleError>;
    fn update_folder(&self, update: &FolderUpdate) -> Result<(), EagleError>;
}

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(default)]
    status: String,
    data: Option<T>,
    message: Option<String>,
}

impl<T> Envelope<T> {
    pub(crate) fn into_data(self, endpoint: &'static str) -> Result<T, EagleError> {
        if self.status != STATUS_SUCCESS {
            return Err(EagleError::Status {
                endpoint,
                status: self.status,
                message: self.message,
            });
        }
        self.data.ok_or_else(|| EagleError::Decode {
            endpoint,
            message: "missing data field".into(),
        })
    }

    pub(crate) fn check_status(self, endpoint: &'static str) -> Result<(), EagleError> {
        if self.status == STATUS_SUCCESS {
            Ok(())
        } else {
            Err(EagleError::Status {
                endpoint,
                status: self.status,
                message: self.message,
            })
        }
    }
}

pub(crate) fn decode_envelope<T>(endpoint: &'static str, body: &str) -> Result<Envelope<T>, EagleError>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_str(body).map_err(|err| EagleError::Decode {
        endpoint,
        message: err.to_string(),
    })
}

pub fn deep_link(item_id: &str) -> String {
    format!("eagle://item/{item_id}")
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::io;
    use std::path::PathBuf;

    use parking_lot::Mutex;

    use super::*;

    /// In-memory API double. Every call is recorded so tests can assert on queries.
    #[derive(Default)]
    pub struct FakeEagle {
        pub online: bool,
        pub folders: Vec<FolderRecord>,
        pub items: Option<Vec<ItemRecord>>,
        pub item_status: Option<String>,
        pub transport_down: bool,
        pub thumbnails: HashMap<String, PathBuf>,
        pub item_queries: Mutex<Vec<ItemListQuery>>,
        pub updates: Mutex<Vec<FolderUpdate>>,
    }

    impl FakeEagle {
        fn transport(endpoint: &'static str) -> EagleError {
            EagleError::Transport {
                endpoint,
                source: Box::new(io::Error::new(io::ErrorKind::ConnectionRefused, "refused")),
            }
        }
    }

    impl EagleApi for FakeEagle {
        fn application_info(&self) -> Result<ApplicationInfo, EagleError> {
            if !self.online {
                return Err(Self::transport("application/info"));
            }
            Ok(ApplicationInfo {
                version: "4.0.0".into(),
                ..ApplicationInfo::default()
            })
        }

        fn folder_list(&self) -> Result<Vec<FolderRecord>, EagleError> {
            if self.transport_down {
                return Err(Self::transport("folder/list"));
            }
            Ok(self.folders.clone())
        }

        fn item_list(&self, query: &ItemListQuery) -> Result<Vec<ItemRecord>, EagleError> {
            self.item_queries.lock().push(query.clone());
            if self.transport_down {
                return Err(Self::transport("item/list"));
            }
            if let Some(status) = &self.item_status {
                return Err(EagleError::Status {
                    endpoint: "item/list",
                    status: status.clone(),
                    message: None,
                });
            }
            Ok(self.items.clone().unwrap_or_default())
        }

        fn item_thumbnail(&self, item_id: &str) -> Result<PathBuf, EagleError> {
            self.thumbnails
                .get(item_id)
                .cloned()
                .ok_or_else(|| EagleError::Status {
                    endpoint: "item/thumbnail",
                    status: "error".into(),
                    message: Some(format!("no item {item_id}")),
                })
        }

        fn update_folder(&self, update: &FolderUpdate) -> Result<(), EagleError> {
            if self.transport_down {
                return Err(Self::transport("folder/update"));
            }
            self.updates.lock().push(update.clone());
            Ok(())
        }
    }
}

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::eagle::EagleApi;
use crate::tags::{sync_note_tags, SyncOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerStatus {
    Unknown,
    Running { version: String },
    NotRunning,
}

impl ServerStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ServerStatus::Unknown => "Eagle Sync is starting",
            ServerStatus::Running { .. } => "Eagle Sync is running",
            ServerStatus::NotRunning => "Eagle Sync is not running",
        }
    }
}

pub fn describe_sync(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Synced { folder_id, tags } => {
            let plural = if tags.len() == 1 { "" } else { "s" };
            format!("Pushed {} tag{plural} to folder {folder_id}", tags.len())
        }
        SyncOutcome::NoFolderId => "Note has no Eagle folder id".into(),
        SyncOutcome::NoPageTags => "Note has no tags to sync".into(),
        SyncOutcome::FolderNotFound { folder_id } => {
            format!("Folder {folder_id} not found in the Eagle library")
        }
        SyncOutcome::Failed { folder_id } => format!("Tag sync for folder {folder_id} failed"),
    }
}

pub struct ActionDispatcher<'a> {
    api: &'a dyn EagleApi,
}

impl<'a> ActionDispatcher<'a> {
    pub fn new(api: &'a dyn EagleApi) -> Self {
        Self { api }
    }

    pub fn check_server(&self) -> ServerStatus {
        match self.api.application_info() {
            Ok(info) => ServerStatus::Running {
                version: info.version,
            },
            Err(err) => {
                tracing::warn!(%err, "eagle server status check failed");
                ServerStatus::NotRunning
            }
        }
    }

    pub fn sync_tags(&self, note: &Path, folder_field: &str) -> Result<SyncOutcome> {
        let text = fs::read_to_string(note)
            .with_context(|| format!("reading note {}", note.display()))?;
        Ok(sync_note_tags(self.api, &text, folder_field))
    }

    pub fn open_link(&self, link: &str) -> Result<()> {
        tracing::info!(%link, "opening deep link");
        open::that(link).with_context(|| format!("opening {link}"))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    use super::*;
    use crate::eagle::testing::FakeEagle;

    #[test]
    fn server_status_reflects_application_info() {
        let online = FakeEagle {
            online: true,
            ..FakeEagle::default()
        };
        assert_eq!(
            ActionDispatcher::new(&online).check_server(),
            ServerStatus::Running {
                version: "4.0.0".into()
            }
        );
        let offline = FakeEagle::default();
        let status = ActionDispatcher::new(&offline).check_server();
        assert_eq!(status, ServerStatus::NotRunning);
        assert_eq!(status.label(), "Eagle Sync is not running");
    }

    #[test]
    fn sync_tags_reads_the_note() -> Result<()> {
        let temp = TempDir::new()?;
        let note = temp.path().join("note.md");
        fs::write(&note, "no folder here #tag")?;
        let api = FakeEagle::default();
        let dispatcher = ActionDispatcher::new(&api);
        assert_eq!(dispatcher.sync_tags(&note, "eagle_folder_id")?, SyncOutcome::NoFolderId);
        assert_matches!(dispatcher.sync_tags(&temp.path().join("missing.md"), "eagle_folder_id"), Err(_));
        Ok(())
    }

    #[test]
    fn sync_descriptions() {
        let synced = SyncOutcome::Synced {
            folder_id: "A1B2C3D4E5F6G".into(),
            tags: vec!["sky".into()],
        };
        assert_eq!(describe_sync(&synced), "Pushed 1 tag to folder A1B2C3D4E5F6G");
        assert_eq!(describe_sync(&SyncOutcome::NoPageTags), "Note has no tags to sync");
    }
}

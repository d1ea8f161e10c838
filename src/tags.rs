use crate::eagle::{EagleApi, FolderId, FolderUpdate};
use crate::folders::find_folder;
use crate::metadata::{extract_folder_id, extract_page_tags};

pub const TAG_MARKER: char = '#';

/// Display form used inside notes: exactly one leading marker. Runs of
/// leading markers collapse into one. A marker inside the name (`c#`) is
/// not a well-formed tag and is passed through untouched.
pub fn format_tag_for_page(tag: &str) -> String {
    format!("{TAG_MARKER}{}", tag.trim_start_matches(TAG_MARKER))
}

pub fn format_tags_for_page(tags: &[String]) -> Vec<String> {
    tags.iter().map(|tag| format_tag_for_page(tag)).collect()
}

/// Storage form used by Eagle: one leading marker removed, nothing else touched.
pub fn format_tag_for_eagle(tag: &str) -> String {
    tag.strip_prefix(TAG_MARKER).unwrap_or(tag).to_owned()
}

pub fn format_tags_for_eagle(tags: &[String]) -> Vec<String> {
    tags.iter().map(|tag| format_tag_for_eagle(tag)).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced { folder_id: FolderId, tags: Vec<String> },
    NoFolderId,
    NoPageTags,
    FolderNotFound { folder_id: FolderId },
    Failed { folder_id: FolderId },
}

/// Pushes the note's tags followed by the folder's extended tags to the
/// folder description. The lists are concatenated verbatim: no dedup, no diff.
pub fn sync_note_tags(api: &dyn EagleApi, note_text: &str, folder_field: &str) -> SyncOutcome {
    let Some(folder_id) = extract_folder_id(note_text, folder_field) else {
        return SyncOutcome::NoFolderId;
    };
    let page_tags = extract_page_tags(note_text);
    if page_tags.is_empty() {
        return SyncOutcome::NoPageTags;
    }

    let folders = match api.folder_list() {
        Ok(folders) => folders,
        Err(err) => {
            tracing::warn!(%err, %folder_id, "could not list folders for tag sync");
            return SyncOutcome::Failed { folder_id };
        }
    };
    let Some(folder) = find_folder(&folder_id, &folders) else {
        tracing::info!(%folder_id, "folder not present in library, skipping tag sync");
        return SyncOutcome::FolderNotFound { folder_id };
    };

    let mut tags = format_tags_for_eagle(&page_tags);
    tags.extend(format_tags_for_eagle(&folder.extend_tags));
    tracing::debug!(%folder_id, ?tags, "pushing tags to folder");

    let update = FolderUpdate {
        folder_id: folder_id.clone(),
        new_description: tags.join(", "),
    };
    match api.update_folder(&update) {
        Ok(()) => SyncOutcome::Synced { folder_id, tags },
        Err(err) => {
            tracing::error!(%err, %folder_id, "folder update failed");
            SyncOutcome::Failed { folder_id }
        }
    }
}

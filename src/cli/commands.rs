use std::fmt::Write as _;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;

use crate::app::{describe_sync, ActionDispatcher, App, ServerStatus};
use crate::config::{AppConfig, ConfigPaths};
use crate::eagle::{deep_link, EagleApi};
use crate::gallery::{load_note_gallery, GalleryLoad, Thumbnail, Tile};
use crate::tags::{format_tags_for_page, sync_note_tags, SyncOutcome};

#[derive(Args, Debug, Clone)]
pub struct GalleryArgs {
    /// Markdown note or vault directory (defaults to the current directory)
    #[arg()]
    pub path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct NoteArgs {
    /// Markdown note to read; `-` reads the note from stdin
    #[arg()]
    pub note: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct OpenArgs {
    /// Eagle item identifier
    pub item_id: String,
}

pub fn run_gallery(config: Arc<AppConfig>, api: Arc<dyn EagleApi>, args: GalleryArgs) -> Result<()> {
    let target = match args.path {
        Some(path) => path,
        None => std::env::current_dir().context("resolving current directory")?,
    };
    if !target.exists() {
        bail!("{} does not exist", target.display());
    }
    let mut app = App::new(config, api, &target)?;
    app.run()
}

pub fn list_items(config: &AppConfig, api: &dyn EagleApi, args: NoteArgs) -> Result<()> {
    let text = read_note(&args.note)?;
    let output = match load_note_gallery(api, &text, &config.folder_field, &config.gallery) {
        GalleryLoad::NoFolderId => {
            bail!("note has no `{}` field with an Eagle folder id", config.folder_field)
        }
        GalleryLoad::FetchFailed { folder_id } => {
            bail!("could not fetch items of folder {folder_id} from {}", config.api_base_url)
        }
        GalleryLoad::Loaded { tiles, skipped, .. } => format_tiles(&tiles, skipped),
    };
    print!("{output}");
    Ok(())
}

pub fn sync_tags(config: &AppConfig, api: &dyn EagleApi, args: NoteArgs) -> Result<()> {
    let text = read_note(&args.note)?;
    let outcome = sync_note_tags(api, &text, &config.folder_field);
    println!("{}", describe_sync(&outcome));
    match outcome {
        SyncOutcome::Synced { .. } | SyncOutcome::NoPageTags => Ok(()),
        SyncOutcome::Failed { .. } => bail!("tag sync failed, see log output"),
        SyncOutcome::NoFolderId | SyncOutcome::FolderNotFound { .. } => Ok(()),
    }
}

pub fn server_status(config: &AppConfig, api: &dyn EagleApi) -> Result<()> {
    let status = ActionDispatcher::new(api).check_server();
    match &status {
        ServerStatus::Running { version } => {
            println!("{} (Eagle {version} at {})", status.label(), config.api_base_url);
        }
        _ => println!("{} ({} unreachable)", status.label(), config.api_base_url),
    }
    Ok(())
}

pub fn open_item(api: &dyn EagleApi, args: OpenArgs) -> Result<()> {
    let item_id = args.item_id.trim();
    if item_id.is_empty() {
        bail!("item id cannot be empty");
    }
    let link = deep_link(item_id);
    ActionDispatcher::new(api).open_link(&link)?;
    println!("Opened {link}");
    Ok(())
}

pub fn show_config(config: &AppConfig, paths: &ConfigPaths) -> Result<()> {
    let mut shown = config.clone();
    shown.api_token = config.redacted_token().to_string();
    let toml = toml::to_string_pretty(&shown).context("serializing config")?;
    println!("# {}", paths.config_file.display());
    println!("# logs in {}", paths.log_dir.display());
    print!("{toml}");
    Ok(())
}

fn read_note(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        return read_stdin()?.context("expected note contents on stdin");
    }
    fs::read_to_string(path).with_context(|| format!("reading note {}", path.display()))
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(Some(buf))
}

fn format_tiles(tiles: &[Tile], skipped: usize) -> String {
    if tiles.is_empty() && skipped == 0 {
        return "Folder is empty.\n".to_string();
    }
    let mut out = String::new();
    for (position, tile) in tiles.iter().enumerate() {
        let item = &tile.item;
        let preview = match tile.thumbnail() {
            Some(Thumbnail::FileIcon { .. }) => "icon".to_string(),
            _ if item.width > 0 && item.height > 0 => format!("{}x{}", item.width, item.height),
            _ => "image".to_string(),
        };
        let _ = writeln!(
            &mut out,
            "#{}  {}  {}  {}  {}",
            position + 1,
            item.name,
            item.ext.to_uppercase(),
            preview,
            tile.deep_link()
        );
        if !item.tags.is_empty() {
            let _ = writeln!(&mut out, "    tags  {}", format_tags_for_page(&item.tags).join(" "));
        }
    }
    if skipped > 0 {
        let plural = if skipped == 1 { "" } else { "s" };
        let _ = writeln!(&mut out, "({skipped} item{plural} without thumbnail omitted)");
    }
    out
}

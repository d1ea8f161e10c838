use indexmap::IndexMap;
use strum::{Display, EnumIter};
use time::{macros::format_description, OffsetDateTime};

use crate::config::GalleryOptions;
use crate::eagle::{deep_link, EagleApi, FolderId, ItemListQuery, ItemRecord};
use crate::metadata::extract_folder_id;

mod layout;
mod thumbnail;

pub use layout::{layout_rows, PlacedTile};
pub use thumbnail::{resolve_all, resolve_thumbnail, Thumbnail};

/// Runs the bounded item query for `folders`. Any failure is logged and
/// collapses into `None`; callers cannot tell transport from status errors.
pub fn fetch_items(api: &dyn EagleApi, folders: &[FolderId]) -> Option<Vec<ItemRecord>> {
    let query = ItemListQuery::for_folders(folders);
    match api.item_list(&query) {
        Ok(items) => Some(items),
        Err(err) => {
            tracing::warn!(%err, ?folders, "item list query failed");
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TileState {
    Unrendered,
    ImageLoading,
    Rendered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum ContextAction {
    #[strum(to_string = "Open in Eagle")]
    OpenInEagle,
}

#[derive(Debug, Clone, Copy)]
pub struct TileMetrics {
    pub row_height: f32,
    pub shrink_factor: f32,
}

impl From<&GalleryOptions> for TileMetrics {
    fn from(options: &GalleryOptions) -> Self {
        Self {
            row_height: options.row_height,
            shrink_factor: options.shrink_factor,
        }
    }
}

impl Default for TileMetrics {
    fn default() -> Self {
        (&GalleryOptions::default()).into()
    }
}

/// One gallery cell. Moves strictly forward through [`TileState`].
#[derive(Debug, Clone)]
pub struct Tile {
    pub item: ItemRecord,
    thumbnail: Option<Thumbnail>,
    state: TileState,
    width: f32,
}

impl Tile {
    pub fn new(item: ItemRecord) -> Self {
        Self {
            item,
            thumbnail: None,
            state: TileState::Unrendered,
            width: 0.0,
        }
    }

    pub fn state(&self) -> TileState {
        self.state
    }

    pub fn thumbnail(&self) -> Option<&Thumbnail> {
        self.thumbnail.as_ref()
    }

    /// Base width in pixels; zero until the tile is rendered.
    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn begin_loading(&mut self, thumbnail: Thumbnail) -> bool {
        if self.state != TileState::Unrendered {
            return false;
        }
        self.thumbnail = Some(thumbnail);
        self.state = TileState::ImageLoading;
        true
    }

    pub fn finish_loading(&mut self, metrics: TileMetrics) -> bool {
        if self.state != TileState::ImageLoading {
            return false;
        }
        self.width = self.aspect_ratio() * metrics.row_height * metrics.shrink_factor;
        self.state = TileState::Rendered;
        true
    }

    pub fn aspect_ratio(&self) -> f32 {
        match &self.thumbnail {
            Some(Thumbnail::Image { .. }) if self.item.width > 0 && self.item.height > 0 => {
                self.item.width as f32 / self.item.height as f32
            }
            _ => 1.0,
        }
    }

    pub fn deep_link(&self) -> String {
        deep_link(&self.item.id)
    }

    /// Fields shown while the tile is hovered, in display order.
    pub fn metadata(&self) -> IndexMap<&'static str, String> {
        let item = &self.item;
        let mut fields = IndexMap::new();
        fields.insert("name", item.name.clone());
        if !item.annotation.is_empty() {
            fields.insert("annotation", item.annotation.clone());
        }
        fields.insert("type", item.ext.to_uppercase());
        if item.width > 0 && item.height > 0 {
            fields.insert("dimensions", format!("{} x {}", item.width, item.height));
        }
        fields.insert("size", human_size(item.size));
        if let Some(modified) = format_millis(item.modification_time) {
            fields.insert("modified", modified);
        }
        if !item.tags.is_empty() {
            fields.insert("tags", item.tags.join(", "));
        }
        fields.insert("link", self.deep_link());
        fields
    }
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn format_millis(millis: i64) -> Option<String> {
    if millis <= 0 {
        return None;
    }
    let dt = OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000).ok()?;
    dt.format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
        .ok()
}

/// Host capability for something that can display a gallery.
pub trait GalleryPanel {
    fn show(&mut self);
    fn clear(&mut self);
    fn render(&mut self, tiles: Vec<Tile>);
}

#[derive(Debug, Clone, Default)]
pub struct GalleryContainer {
    pub tiles: Vec<Tile>,
}

/// Panel state owned by the visible view. Every render discards the previous
/// container instead of diffing it.
#[derive(Debug, Clone, Default)]
pub struct GalleryState {
    visible: bool,
    container: Option<GalleryContainer>,
    hovered: Option<usize>,
}

impl GalleryPanel for GalleryState {
    fn show(&mut self) {
        self.visible = true;
    }

    fn clear(&mut self) {
        self.container = None;
        self.hovered = None;
    }

    fn render(&mut self, tiles: Vec<Tile>) {
        self.clear();
        self.container = Some(GalleryContainer { tiles });
    }
}

impl GalleryState {
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn container_count(&self) -> usize {
        usize::from(self.container.is_some())
    }

    pub fn tiles(&self) -> &[Tile] {
        self.container
            .as_ref()
            .map(|container| container.tiles.as_slice())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles().is_empty()
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    pub fn hovered_tile(&self) -> Option<&Tile> {
        self.hovered.and_then(|index| self.tiles().get(index))
    }

    /// Only rendered tiles carry hover bindings.
    pub fn hover(&mut self, index: usize) -> bool {
        match self.tiles().get(index) {
            Some(tile) if tile.state() == TileState::Rendered => {
                self.hovered = Some(index);
                true
            }
            _ => false,
        }
    }

    pub fn unhover(&mut self) {
        self.hovered = None;
    }

    pub fn move_hover(&mut self, delta: isize) {
        let len = self.tiles().len();
        if len == 0 {
            self.hovered = None;
            return;
        }
        let current = self.hovered.unwrap_or(0) as isize;
        let next = (current + delta).clamp(0, len as isize - 1) as usize;
        self.hover(next);
    }

    /// Deep link opened when a tile is activated.
    pub fn activate(&self, index: usize) -> Option<String> {
        self.tiles()
            .get(index)
            .filter(|tile| tile.state() == TileState::Rendered)
            .map(Tile::deep_link)
    }

    pub fn context_menu(&self, index: usize) -> Vec<ContextAction> {
        use strum::IntoEnumIterator;
        if self.activate(index).is_none() {
            return Vec::new();
        }
        ContextAction::iter().collect()
    }

    pub fn run_context_action(&self, index: usize, action: ContextAction) -> Option<String> {
        match action {
            ContextAction::OpenInEagle => self.activate(index),
        }
    }
}

pub struct GalleryRenderer<'a> {
    api: &'a dyn EagleApi,
    options: &'a GalleryOptions,
}

impl<'a> GalleryRenderer<'a> {
    pub fn new(api: &'a dyn EagleApi, options: &'a GalleryOptions) -> Self {
        Self { api, options }
    }

    /// Resolves thumbnails and builds rendered tiles in input order. Items
    /// whose thumbnail cannot be resolved are left out entirely.
    pub fn build_tiles(&self, items: &[ItemRecord]) -> Vec<Tile> {
        let metrics = TileMetrics::from(self.options);
        let thumbnails = resolve_all(self.api, items, self.options.thumbnail_workers);
        items
            .iter()
            .zip(thumbnails)
            .filter_map(|(item, thumbnail)| {
                let mut tile = Tile::new(item.clone());
                tile.begin_loading(thumbnail?);
                tile.finish_loading(metrics);
                Some(tile)
            })
            .collect()
    }

    /// Clears `panel` and fills it with tiles for `items`. Returns the tile count.
    ///
    /// The TUI splits this in two: loader threads call [`Self::build_tiles`]
    /// and the event loop hands the result to [`present_tiles`].
    pub fn set_gallery(&self, panel: &mut dyn GalleryPanel, items: &[ItemRecord]) -> usize {
        panel.clear();
        let tiles = self.build_tiles(items);
        tracing::debug!(items = items.len(), tiles = tiles.len(), "gallery built");
        present_tiles(panel, tiles)
    }
}

/// Replaces whatever `panel` shows with `tiles`. Returns the tile count.
pub fn present_tiles(panel: &mut dyn GalleryPanel, tiles: Vec<Tile>) -> usize {
    let count = tiles.len();
    panel.clear();
    panel.render(tiles);
    count
}

#[derive(Debug, Clone)]
pub enum GalleryLoad {
    NoFolderId,
    FetchFailed { folder_id: FolderId },
    Loaded {
        folder_id: FolderId,
        tiles: Vec<Tile>,
        skipped: usize,
    },
}

/// Full pipeline for one document: folder id, item query, tiles.
pub fn load_note_gallery(
    api: &dyn EagleApi,
    note_text: &str,
    folder_field: &str,
    options: &GalleryOptions,
) -> GalleryLoad {
    let Some(folder_id) = extract_folder_id(note_text, folder_field) else {
        return GalleryLoad::NoFolderId;
    };
    let Some(items) = fetch_items(api, &[folder_id.clone()]) else {
        return GalleryLoad::FetchFailed { folder_id };
    };
    let tiles = GalleryRenderer::new(api, options).build_tiles(&items);
    let skipped = items.len() - tiles.len();
    if skipped > 0 {
        tracing::info!(%folder_id, skipped, "items without a usable thumbnail were omitted");
    }
    GalleryLoad::Loaded {
        folder_id,
        tiles,
        skipped,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;
    use std::path::PathBuf;

    use assert_matches::assert_matches;
    use tempfile::TempDir;

    use super::*;
    use crate::eagle::testing::FakeEagle;
    use crate::eagle::{FolderRecord, ITEM_LIST_LIMIT};
    use crate::folders::find_folder;

    fn item(id: &str, width: u32, height: u32) -> ItemRecord {
        ItemRecord {
            id: id.into(),
            name: format!("{id} name"),
            ext: "png".into(),
            width,
            height,
            ..ItemRecord::default()
        }
    }

    fn write_thumbs(dir: &TempDir, ids: &[&str]) -> anyhow::Result<HashMap<String, PathBuf>> {
        let mut map = HashMap::new();
        for id in ids {
            let path = dir.path().join(format!("{id}_thumbnail.png"));
            fs::write(&path, id.as_bytes())?;
            map.insert(id.to_string(), path);
        }
        Ok(map)
    }

    #[test]
    fn fetch_items_returns_data_unmodified() {
        let items = vec![item("A", 10, 10), item("B", 20, 10)];
        let api = FakeEagle {
            items: Some(items.clone()),
            ..FakeEagle::default()
        };
        assert_eq!(fetch_items(&api, &["A1B2C3D4E5F6G".into()]), Some(items));
    }

    #[test]
    fn fetch_items_hides_error_kind() {
        let status_error = FakeEagle {
            item_status: Some("error".into()),
            ..FakeEagle::default()
        };
        let transport_error = FakeEagle {
            transport_down: true,
            ..FakeEagle::default()
        };
        let folders = vec!["A1B2C3D4E5F6G".to_string()];
        assert_eq!(fetch_items(&status_error, &folders), None);
        assert_eq!(fetch_items(&transport_error, &folders), None);
    }

    #[test]
    fn tile_state_only_moves_forward() {
        let mut tile = Tile::new(item("A", 300, 150));
        assert_eq!(tile.state(), TileState::Unrendered);
        assert!(!tile.finish_loading(TileMetrics::default()));
        assert!(tile.begin_loading(Thumbnail::FileIcon { extension: "png".into() }));
        assert!(!tile.begin_loading(Thumbnail::FileIcon { extension: "png".into() }));
        assert!(tile.finish_loading(TileMetrics::default()));
        assert_eq!(tile.state(), TileState::Rendered);
        assert!(!tile.finish_loading(TileMetrics::default()));
    }

    #[test]
    fn width_follows_aspect_ratio() {
        let metrics = TileMetrics {
            row_height: 128.0,
            shrink_factor: 0.8,
        };
        let mut wide = Tile::new(item("A", 400, 200));
        wide.begin_loading(Thumbnail::Image {
            path: PathBuf::from("a.png"),
            mime: "image/png".into(),
            bytes: vec![1],
        });
        wide.finish_loading(metrics);
        assert!((wide.width() - 204.8).abs() < 1e-3);

        let mut icon = Tile::new(item("B", 400, 200));
        icon.begin_loading(Thumbnail::FileIcon { extension: "png".into() });
        icon.finish_loading(metrics);
        assert!((icon.width() - 102.4).abs() < 1e-3);
    }

    #[test]
    fn set_gallery_twice_does_not_accumulate() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let api = FakeEagle {
            thumbnails: write_thumbs(&temp, &["A", "B", "C"])?,
            ..FakeEagle::default()
        };
        let options = GalleryOptions::default();
        let renderer = GalleryRenderer::new(&api, &options);
        let items = vec![item("A", 1, 1), item("B", 2, 1), item("C", 1, 2)];

        let mut panel = GalleryState::default();
        panel.show();
        assert_eq!(renderer.set_gallery(&mut panel, &items), 3);
        assert_eq!(renderer.set_gallery(&mut panel, &items), 3);
        assert_eq!(panel.container_count(), 1);
        assert_eq!(panel.tiles().len(), 3);
        assert!(panel.is_visible());
        Ok(())
    }

    #[test]
    fn hover_activation_and_context_menu() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let api = FakeEagle {
            thumbnails: write_thumbs(&temp, &["LRJ5T2ZD6TWUY"])?,
            ..FakeEagle::default()
        };
        let options = GalleryOptions::default();
        let mut panel = GalleryState::default();
        let mut annotated = item("LRJ5T2ZD6TWUY", 1920, 1080);
        annotated.annotation = "warm light".into();
        annotated.tags = vec!["sky".into(), "sunset".into()];
        GalleryRenderer::new(&api, &options).set_gallery(&mut panel, &[annotated]);

        assert!(panel.hover(0));
        assert!(!panel.hover(1));
        let meta = panel.hovered_tile().expect("hovered").metadata();
        assert_eq!(meta.get("annotation").map(String::as_str), Some("warm light"));
        assert_eq!(meta.get("tags").map(String::as_str), Some("sky, sunset"));
        assert_eq!(meta.get("dimensions").map(String::as_str), Some("1920 x 1080"));
        assert_eq!(meta.keys().next(), Some(&"name"));

        let link = Some("eagle://item/LRJ5T2ZD6TWUY".to_string());
        assert_eq!(panel.activate(0), link);
        assert_eq!(panel.context_menu(0), vec![ContextAction::OpenInEagle]);
        assert_eq!(ContextAction::OpenInEagle.to_string(), "Open in Eagle");
        assert_eq!(panel.run_context_action(0, ContextAction::OpenInEagle), link);
        assert!(panel.context_menu(5).is_empty());

        panel.clear();
        assert_eq!(panel.hovered(), None);
        assert_eq!(panel.container_count(), 0);
        Ok(())
    }

    #[test]
    fn end_to_end_note_to_tiles() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let target = "A1B2C3D4E5F6G";
        let tree = vec![FolderRecord {
            id: "ROOT000000000".into(),
            children: vec![FolderRecord {
                id: "MID0000000000".into(),
                children: vec![FolderRecord {
                    id: target.into(),
                    name: "deep".into(),
                    ..FolderRecord::default()
                }],
                ..FolderRecord::default()
            }],
            ..FolderRecord::default()
        }];
        let items = vec![item("ONE", 3, 2), item("TWO", 1, 1), item("THREE", 2, 3)];
        let mut thumbnails = write_thumbs(&temp, &["ONE", "THREE"])?;
        thumbnails.insert("TWO".into(), temp.path().join("two_missing.png"));
        let api = FakeEagle {
            folders: tree,
            items: Some(items),
            thumbnails,
            ..FakeEagle::default()
        };

        let note = "# Trip\n\neagle_folder_id:: A1B2C3D4E5F6G\n";
        assert_eq!(find_folder(target, &api.folders).map(|f| f.name.as_str()), Some("deep"));

        let load = load_note_gallery(&api, note, "eagle_folder_id", &GalleryOptions::default());
        let tiles = assert_matches!(load, GalleryLoad::Loaded { folder_id, tiles, skipped: 0 } if folder_id == target => tiles);
        assert_eq!(tiles.len(), 3);
        assert!(tiles[1].thumbnail().is_some_and(Thumbnail::is_icon));
        let names: Vec<_> = tiles.iter().map(|t| t.item.id.as_str()).collect();
        assert_eq!(names, vec!["ONE", "TWO", "THREE"]);

        let queries = api.item_queries.lock();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].folders, vec![target.to_string()]);
        assert_eq!(queries[0].limit, ITEM_LIST_LIMIT);
        Ok(())
    }

    #[test]
    fn failed_thumbnails_are_omitted() {
        let api = FakeEagle {
            items: Some(vec![item("ONE", 1, 1), item("TWO", 1, 1)]),
            ..FakeEagle::default()
        };
        let load = load_note_gallery(
            &api,
            "eagle_folder_id: A1B2C3D4E5F6G",
            "eagle_folder_id",
            &GalleryOptions::default(),
        );
        assert_matches!(load, GalleryLoad::Loaded { ref tiles, skipped: 2, .. } if tiles.is_empty());
    }

    #[test]
    fn pipeline_short_circuits() {
        let api = FakeEagle {
            transport_down: true,
            ..FakeEagle::default()
        };
        let options = GalleryOptions::default();
        assert_matches!(
            load_note_gallery(&api, "no metadata", "eagle_folder_id", &options),
            GalleryLoad::NoFolderId
        );
        assert_matches!(
            load_note_gallery(&api, "eagle_folder_id:: A1B2C3D4E5F6G", "eagle_folder_id", &options),
            GalleryLoad::FetchFailed { .. }
        );
        assert!(api.item_queries.lock().len() == 1);
    }

    #[test]
    fn human_sizes() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MB");
    }
}

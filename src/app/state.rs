use std::path::{Path, PathBuf};

use crate::config::GalleryOptions;
use crate::eagle::FolderId;
use crate::gallery::{
    layout_rows, present_tiles, ContextAction, GalleryLoad, GalleryPanel, GalleryState, PlacedTile,
};

use super::actions::ServerStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Idle,
    Loading { generation: u64 },
    NoFolderId,
    FetchFailed,
    Unreadable,
    Loaded { skipped: usize },
}

#[derive(Debug, Clone)]
pub struct ContextMenuOverlay {
    pub tile_index: usize,
    pub actions: Vec<ContextAction>,
    pub selected: usize,
}

/// Tile layout in terminal columns, recomputed whenever the panel width changes.
#[derive(Debug, Clone, Default)]
pub struct GridLayout {
    pub width_cols: u16,
    pub rows: Vec<Vec<PlacedTile>>,
}

impl GridLayout {
    fn position_of(&self, index: usize) -> Option<(usize, usize)> {
        self.rows.iter().enumerate().find_map(|(row_idx, row)| {
            row.iter()
                .position(|tile| tile.index == index)
                .map(|col| (row_idx, col))
        })
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub label: String,
    pub gallery: GalleryState,
    pub grid: GridLayout,
    pub server: ServerStatus,
    pub document: Option<PathBuf>,
    pub folder_id: Option<FolderId>,
    pub load: LoadStatus,
    pub context_menu: Option<ContextMenuOverlay>,
    status_message: Option<String>,
    generation: u64,
}

impl AppState {
    pub fn new(label: impl Into<String>) -> Self {
        let mut gallery = GalleryState::default();
        gallery.show();
        Self {
            label: label.into(),
            gallery,
            grid: GridLayout::default(),
            server: ServerStatus::Unknown,
            document: None,
            folder_id: None,
            load: LoadStatus::Idle,
            context_menu: None,
            status_message: None,
            generation: 0,
        }
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(Into::into);
    }

    /// Starts a new reload and returns its generation. Older generations
    /// still in flight are ignored once they finish.
    pub fn begin_load(&mut self, document: &Path) -> u64 {
        self.generation += 1;
        self.document = Some(document.to_path_buf());
        self.load = LoadStatus::Loading {
            generation: self.generation,
        };
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    /// Applies a finished load. Returns false for stale generations.
    pub fn finish_load(&mut self, generation: u64, load: GalleryLoad) -> bool {
        if !self.is_current(generation) {
            tracing::debug!(generation, current = self.generation, "discarding stale gallery load");
            return false;
        }
        self.context_menu = None;
        match load {
            GalleryLoad::NoFolderId => {
                self.folder_id = None;
                self.gallery.clear();
                self.grid.rows.clear();
                self.load = LoadStatus::NoFolderId;
            }
            GalleryLoad::FetchFailed { folder_id } => {
                // keep whatever the panel showed before
                self.folder_id = Some(folder_id);
                self.load = LoadStatus::FetchFailed;
            }
            GalleryLoad::Loaded {
                folder_id,
                tiles,
                skipped,
            } => {
                self.folder_id = Some(folder_id);
                present_tiles(&mut self.gallery, tiles);
                self.gallery.hover(0);
                self.load = LoadStatus::Loaded { skipped };
                self.grid.width_cols = 0;
            }
        }
        true
    }

    pub fn fail_load(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.load = LoadStatus::Unreadable;
        true
    }

    pub fn relayout(&mut self, width_cols: u16, options: &GalleryOptions) {
        if width_cols == self.grid.width_cols && !self.grid.rows.is_empty() {
            return;
        }
        let cell = options.cell_width_px;
        let widths: Vec<f32> = self.gallery.tiles().iter().map(|tile| tile.width()).collect();
        let rows = layout_rows(&widths, f32::from(width_cols) * cell);
        self.grid = GridLayout {
            width_cols,
            rows: rows
                .into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|tile| PlacedTile {
                            index: tile.index,
                            width: (tile.width / cell).floor().max(1.0),
                        })
                        .collect()
                })
                .collect(),
        };
    }

    pub fn move_horizontal(&mut self, delta: isize) {
        self.gallery.move_hover(delta);
    }

    pub fn move_vertical(&mut self, delta: isize) {
        let Some(current) = self.gallery.hovered() else {
            self.gallery.move_hover(0);
            return;
        };
        let Some((row, col)) = self.grid.position_of(current) else {
            self.gallery.move_hover(delta);
            return;
        };
        let target_row = row as isize + delta;
        if target_row < 0 || target_row as usize >= self.grid.rows.len() {
            return;
        }
        let target = &self.grid.rows[target_row as usize];
        let col = col.min(target.len().saturating_sub(1));
        if let Some(tile) = target.get(col) {
            self.gallery.hover(tile.index);
        }
    }

    pub fn open_context_menu(&mut self) {
        let Some(index) = self.gallery.hovered() else {
            return;
        };
        let actions = self.gallery.context_menu(index);
        if actions.is_empty() {
            return;
        }
        self.context_menu = Some(ContextMenuOverlay {
            tile_index: index,
            actions,
            selected: 0,
        });
    }

    pub fn close_context_menu(&mut self) {
        self.context_menu = None;
    }

    pub fn move_context_selection(&mut self, delta: isize) {
        if let Some(menu) = &mut self.context_menu {
            let len = menu.actions.len() as isize;
            if len > 0 {
                menu.selected = (menu.selected as isize + delta).rem_euclid(len) as usize;
            }
        }
    }

    /// Runs the selected context action and closes the menu.
    pub fn confirm_context_menu(&mut self) -> Option<String> {
        let menu = self.context_menu.take()?;
        let action = *menu.actions.get(menu.selected)?;
        self.gallery.run_context_action(menu.tile_index, action)
    }

    pub fn hovered_link(&self) -> Option<String> {
        self.gallery.hovered().and_then(|index| self.gallery.activate(index))
    }
}

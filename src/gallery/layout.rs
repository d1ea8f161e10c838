/// A tile positioned in a row, with its final width after growing or shrinking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedTile {
    pub index: usize,
    pub width: f32,
}

/// Packs tile base widths into rows no wider than `container_width`.
///
/// Full rows grow every tile in proportion to its base width until the row
/// spans the container. The last row keeps base widths. A single tile wider
/// than the container is shrunk to fit.
pub fn layout_rows(widths: &[f32], container_width: f32) -> Vec<Vec<PlacedTile>> {
    let mut rows = Vec::new();
    if container_width <= 0.0 {
        return rows;
    }

    let mut row: Vec<PlacedTile> = Vec::new();
    let mut used = 0.0f32;
    for (index, &width) in widths.iter().enumerate() {
        let width = width.max(1.0);
        if !row.is_empty() && used + width > container_width {
            rows.push(fit_row(std::mem::take(&mut row), used, container_width, true));
            used = 0.0;
        }
        row.push(PlacedTile { index, width });
        used += width;
    }
    if !row.is_empty() {
        rows.push(fit_row(row, used, container_width, false));
    }
    rows
}

fn fit_row(mut row: Vec<PlacedTile>, used: f32, container_width: f32, grow: bool) -> Vec<PlacedTile> {
    if used > container_width || (grow && used < container_width) {
        let factor = container_width / used;
        for tile in &mut row {
            tile.width *= factor;
        }
    }
    row
}

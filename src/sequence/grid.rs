use rand::Rng;

use crate::models::{GridCell, Viewport};

use super::{fisher_yates, TargetSequence};

/// All cells of a `size`×`size` grid in row-major order.
pub fn grid_cells(size: u32) -> Vec<GridCell> {
    (0..size)
        .flat_map(|row| (0..size).map(move |col| GridCell { row, col }))
        .collect()
}

/// Shuffled grid cells converted to screen coordinates.
pub fn grid_sequence<R: Rng + ?Sized>(
    size: u32,
    viewport: Viewport,
    rng: &mut R,
) -> TargetSequence {
    let mut cells = grid_cells(size);
    fisher_yates(&mut cells, rng);

    let targets = cells
        .into_iter()
        .map(|cell| cell.to_target(size, viewport))
        .collect();
    TargetSequence::new(targets, None)
}

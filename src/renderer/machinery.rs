use std::{
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
};

use anyhow::anyhow;
use core_affinity::CoreId;

use crate::kernel::{Kernel, Rgb};

/// Number of image rows in one unit of work.
pub const TILE_ROWS: usize = 8;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameProgress {
    pub finished: usize,
    pub total: usize,
}

/// One worker per core, pinned if the core list is available.
fn worker_cores(tile_count: usize) -> Vec<Option<CoreId>> {
    let cores = match core_affinity::get_core_ids() {
        Some(ids) if !ids.is_empty() => ids.into_iter().map(Some).collect(),
        _ => vec![None; num_cpus::get().max(1)],
    };
    cores.into_iter().take(tile_count.max(1)).collect()
}

/// Runs the kernel for every pixel of the image on all cores.
/// Returns the row-major radiance of the frame, `tile_finished` is called from the worker
/// threads after each tile.
#[tracing::instrument(skip_all, fields(
    width = kernel.context().settings.width,
    height = kernel.context().settings.height,
    frame = kernel.context().frame,
))]
pub fn render_frame<F>(kernel: &Kernel<'_>, tile_finished: F) -> anyhow::Result<Vec<Rgb>>
where
    F: Fn(FrameProgress) + Sync,
{
    let settings = &kernel.context().settings;
    let width = settings.width as usize;
    let tile_len = width * TILE_ROWS;

    let mut output = vec![Rgb::default(); settings.pixel_count()];
    let total = output.len().div_ceil(tile_len);
    let tiles = Mutex::new(output.chunks_mut(tile_len).enumerate());
    let finished = AtomicUsize::new(0);

    let cores = worker_cores(total);
    tracing::debug!(workers = cores.len(), tiles = total, "Starting frame");

    thread::scope(|scope| -> anyhow::Result<()> {
        let (tiles, finished, tile_finished) = (&tiles, &finished, &tile_finished);

        let handles = cores
            .into_iter()
            .enumerate()
            .map(|(worker_id, core)| {
                thread::Builder::new()
                    .name(format!("worker{worker_id}"))
                    .spawn_scoped(scope, move || -> anyhow::Result<()> {
                        if let Some(core) = core {
                            core_affinity::set_for_current(core);
                        }

                        loop {
                            let next = tiles
                                .lock()
                                .map_err(|_| anyhow!("Tile queue lock poisoned"))?
                                .next();
                            let Some((tile_index, tile)) = next else {
                                break;
                            };

                            render_tile(kernel, tile_index * TILE_ROWS, tile);

                            let done = finished.fetch_add(1, Ordering::AcqRel) + 1;
                            tile_finished(FrameProgress {
                                finished: done,
                                total,
                            });
                        }
                        Ok(())
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        for handle in handles {
            handle
                .join()
                .map_err(|_| anyhow!("Render worker panicked"))??;
        }
        Ok(())
    })?;

    drop(tiles);
    Ok(output)
}

/// Fills whole image rows starting at `first_row`.
fn render_tile(kernel: &Kernel<'_>, first_row: usize, tile: &mut [Rgb]) {
    let width = kernel.context().settings.width as usize;
    for (i, pixel) in tile.iter_mut().enumerate() {
        let x = i % width;
        let y = first_row + i / width;
        *pixel = kernel.render_pixel(x as u32, y as u32);
    }
}

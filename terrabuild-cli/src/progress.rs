//! Progress reporting around an emitter.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use terrabuild::emit::{EmitError, EmittedGroup, EmittedTile, TileEmitter};

const TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tiles {msg}";

/// Forwards to `inner` and advances a progress bar per tile.
pub struct ProgressEmitter<E> {
    inner: E,
    bar: ProgressBar,
}

impl<E: TileEmitter> ProgressEmitter<E> {
    pub fn new(inner: E, total_tiles: u64) -> Self {
        let style = ProgressStyle::with_template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        let bar = ProgressBar::new(total_tiles).with_style(style);
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { inner, bar }
    }

    /// A bar that draws nothing, for quiet runs.
    pub fn hidden(inner: E) -> Self {
        Self {
            inner,
            bar: ProgressBar::hidden(),
        }
    }

    pub fn into_inner(self) -> E {
        self.inner
    }
}

impl<E: TileEmitter> TileEmitter for ProgressEmitter<E> {
    fn emit_tile(&mut self, tile: &EmittedTile<'_>) -> Result<(), EmitError> {
        self.inner.emit_tile(tile)?;
        self.bar.set_message(tile.name.to_string());
        self.bar.inc(1);
        Ok(())
    }

    fn emit_group(&mut self, group: &EmittedGroup) -> Result<(), EmitError> {
        self.inner.emit_group(group)
    }

    fn finish(&mut self) -> Result<(), EmitError> {
        let result = self.inner.finish();
        self.bar.finish_with_message("done");
        result
    }
}

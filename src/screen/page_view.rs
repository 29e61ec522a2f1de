//! Half-block display of the drawing surface
//!
//! Each terminal cell shows two vertically stacked pixels using the upper
//! half block glyph: foreground is the top pixel, background the bottom one.

use image::RgbImage;
use image::imageops::{self, FilterType};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Color;
use ratatui::widgets::Widget;

use crate::pdf::Surface;

const UPPER_HALF_BLOCK: &str = "\u{2580}";

/// Pixel size of one terminal cell
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellSize {
    pub width: u16,
    pub height: u16,
}

impl CellSize {
    #[must_use]
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }
}

/// Surface downsampled to half-block resolution, reused until the surface changes
#[derive(Default)]
pub struct PageViewCache {
    key: Option<(u64, CellSize)>,
    cells: RgbImage,
}

impl PageViewCache {
    /// Downsampled image for `surface`; `generation` changes whenever a new
    /// render is committed
    pub fn cells(&mut self, surface: &Surface, generation: u64, cell_size: CellSize) -> &RgbImage {
        let key = Some((generation, cell_size));
        if self.key != key {
            self.cells = downsample(surface.image(), cell_size);
            self.key = key;
        }
        &self.cells
    }
}

fn downsample(image: &RgbImage, cell_size: CellSize) -> RgbImage {
    if image.width() == 0 || image.height() == 0 {
        return RgbImage::new(0, 0);
    }
    let px_per_col = u32::from(cell_size.width.max(1));
    let px_per_half_row = u32::from((cell_size.height / 2).max(1));
    let width = image.width().div_ceil(px_per_col).max(1);
    let height = image.height().div_ceil(px_per_half_row).max(1);
    imageops::resize(image, width, height, FilterType::Triangle)
}

/// Widget painting a downsampled page, horizontally centered and scrolled
/// down by `scroll` rows
pub struct PageView<'a> {
    cells: &'a RgbImage,
    scroll: u16,
}

impl<'a> PageView<'a> {
    #[must_use]
    pub fn new(cells: &'a RgbImage, scroll: u16) -> Self {
        Self { cells, scroll }
    }

    /// Number of terminal rows the page occupies
    #[must_use]
    pub fn rows(cells: &RgbImage) -> u16 {
        u16::try_from(cells.height().div_ceil(2)).unwrap_or(u16::MAX)
    }
}

impl Widget for PageView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let img_w = self.cells.width();
        let img_h = self.cells.height();
        if img_w == 0 || img_h == 0 || area.is_empty() {
            return;
        }

        let cols = img_w.min(u32::from(area.width));
        let left_pad = (u32::from(area.width) - cols) / 2;
        let first_row = u32::from(self.scroll);

        for row in 0..u32::from(area.height) {
            let top_y = (first_row + row) * 2;
            if top_y >= img_h {
                break;
            }
            let bottom_y = top_y + 1;
            for col in 0..cols {
                let top = self.cells.get_pixel(col, top_y);
                let bottom = if bottom_y < img_h {
                    to_color(*self.cells.get_pixel(col, bottom_y))
                } else {
                    Color::Reset
                };

                let x = area.x + (left_pad + col) as u16;
                let y = area.y + row as u16;
                if let Some(cell) = buf.cell_mut((x, y)) {
                    cell.set_symbol(UPPER_HALF_BLOCK)
                        .set_fg(to_color(*top))
                        .set_bg(bottom);
                }
            }
        }
    }
}

fn to_color(px: image::Rgb<u8>) -> Color {
    Color::Rgb(px[0], px[1], px[2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn downsample_maps_cells_to_half_rows() {
        let image = RgbImage::from_pixel(80, 64, Rgb([10, 20, 30]));
        let cells = downsample(&image, CellSize::new(8, 16));
        assert_eq!(cells.dimensions(), (10, 8));
        assert_eq!(PageView::rows(&cells), 4);
    }

    #[test]
    fn renders_top_and_bottom_pixels() {
        let mut cells = RgbImage::new(2, 2);
        cells.put_pixel(0, 0, Rgb([255, 0, 0]));
        cells.put_pixel(0, 1, Rgb([0, 0, 255]));

        let area = Rect::new(0, 0, 4, 1);
        let mut buf = Buffer::empty(area);
        PageView::new(&cells, 0).render(area, &mut buf);

        // 2 columns centered in 4
        let cell = &buf[(1, 0)];
        assert_eq!(cell.symbol(), UPPER_HALF_BLOCK);
        assert_eq!(cell.fg, Color::Rgb(255, 0, 0));
        assert_eq!(cell.bg, Color::Rgb(0, 0, 255));
        assert_eq!(buf[(0, 0)].symbol(), " ");
    }
}

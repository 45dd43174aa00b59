//! Overlays drawn onto the visualization field.

use image::Rgb;
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_hollow_rect_mut},
    rect::Rect,
};
use itertools::iproduct;

use crate::{
    classify::Classification,
    config::Configuration,
    font::{self, ADVANCE, GLYPH_HEIGHT, GLYPH_WIDTH},
    frame::VisualizationField,
    region::BoundingBox,
};

/// Font pixel size of region labels.
pub const LABEL_SCALE: u32 = 2;
/// Font pixel size of the alert caption.
pub const CAPTION_SCALE: u32 = 3;

/// Draw `text` with its bottom-left corner at `(x, y)`.
/// Parts falling outside the field are clipped.
pub fn draw_text(field: &mut VisualizationField, x: i32, y: i32, text: &str, color: Rgb<u8>, scale: u32) {
    let top = y - (GLYPH_HEIGHT * scale) as i32;
    for (i, c) in text.chars().enumerate() {
        let g = match font::glyph(c) {
            Some(g) => g,
            None => continue,
        };
        let left = x + (i as u32 * ADVANCE * scale) as i32;
        for (row, col) in iproduct!(0..GLYPH_HEIGHT, 0..GLYPH_WIDTH) {
            if font::is_ink(g, col, row) {
                let px = Rect::at(left + (col * scale) as i32, top + (row * scale) as i32)
                    .of_size(scale, scale);
                draw_filled_rect_mut(field, px, color);
            }
        }
    }
}

/// Two pixel wide outline spanning `(x, y)` to
/// `(x + width, y + height)`.
pub fn draw_box(field: &mut VisualizationField, bb: BoundingBox, color: Rgb<u8>) {
    let (x, y) = (bb.x as i32, bb.y as i32);
    let (w, h) = (bb.width as u32, bb.height as u32);
    draw_hollow_rect_mut(field, Rect::at(x, y).of_size(w + 1, h + 1), color);
    draw_hollow_rect_mut(field, Rect::at(x - 1, y - 1).of_size(w + 3, h + 3), color);
}

/// Box and temperature label of one region.
pub fn draw_region(field: &mut VisualizationField, bb: BoundingBox, classification: &Classification) {
    draw_box(field, bb, classification.color);
    draw_text(
        field,
        bb.x as i32,
        bb.y as i32 - 2,
        &classification.label(),
        classification.color,
        LABEL_SCALE,
    );
}

/// The alert caption at `caption_origin`, moved left as
/// far as needed to keep it inside a narrow field.
pub fn draw_caption(field: &mut VisualizationField, config: &Configuration) {
    let (x, y) = config.caption_origin;
    let width = font::text_width(&config.alert_caption) * CAPTION_SCALE;
    let x = x.min(field.width().saturating_sub(width));
    draw_text(
        field,
        x as i32,
        y as i32,
        &config.alert_caption,
        Rgb(config.palette.alert),
        CAPTION_SCALE,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;

    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    fn painted(field: &VisualizationField) -> usize {
        field.pixels().filter(|p| **p != BLACK).count()
    }

    #[test]
    fn box_outline_hits_both_rings() {
        let mut field = VisualizationField::new(40, 40);
        let bb = BoundingBox { x: 10, y: 10, width: 10, height: 5 };
        draw_box(&mut field, bb, Rgb([0, 255, 0]));
        assert_eq!(*field.get_pixel(10, 10), Rgb([0, 255, 0]));
        assert_eq!(*field.get_pixel(20, 15), Rgb([0, 255, 0]));
        assert_eq!(*field.get_pixel(9, 9), Rgb([0, 255, 0]));
        assert_eq!(*field.get_pixel(21, 16), Rgb([0, 255, 0]));
        assert_eq!(*field.get_pixel(15, 12), BLACK);
    }

    #[test]
    fn drawing_is_clipped_at_edges() {
        let mut field = VisualizationField::new(8, 8);
        let bb = BoundingBox { x: 0, y: 0, width: 8, height: 8 };
        let c = classify(120., &Configuration::default());
        draw_region(&mut field, bb, &c);
        draw_text(&mut field, -20, 100, "HOT", c.color, 4);
        assert!(painted(&field) > 0);
    }

    #[test]
    fn text_lands_above_its_origin() {
        let mut field = VisualizationField::new(30, 30);
        draw_text(&mut field, 2, 20, "1", Rgb([255, 255, 255]), 2);
        let rows: Vec<u32> = field
            .enumerate_pixels()
            .filter(|(_, _, p)| **p != BLACK)
            .map(|(_, y, _)| y)
            .collect();
        assert_eq!(rows.iter().min(), Some(&6));
        assert_eq!(rows.iter().max(), Some(&19));
    }

    #[test]
    fn caption_is_shifted_into_narrow_fields() {
        let config = Configuration::default();
        let mut wide = VisualizationField::new(640, 80);
        draw_caption(&mut wide, &config);
        let mut narrow = VisualizationField::new(520, 80);
        draw_caption(&mut narrow, &config);
        assert_eq!(painted(&narrow), painted(&wide));
        assert!(narrow.enumerate_pixels().any(|(x, _, p)| x < 50 && *p != BLACK));
    }

    #[test]
    fn caption_uses_alert_color() {
        let config = Configuration::default();
        let mut field = VisualizationField::new(640, 120);
        draw_caption(&mut field, &config);
        assert!(field.pixels().any(|p| *p == Rgb(config.palette.alert)));
        assert!(field.pixels().all(|p| *p == BLACK || *p == Rgb(config.palette.alert)));
    }
}

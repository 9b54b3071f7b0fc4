use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::models::Detection;

const PALETTE: [[u8; 3]; 6] = [
    [0, 255, 0],
    [255, 64, 64],
    [64, 128, 255],
    [255, 200, 0],
    [255, 0, 255],
    [0, 220, 220],
];

/// Same label, same colour
fn label_color(label: &str) -> Rgb<u8> {
    let hash = label.bytes().fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
    Rgb(PALETTE[hash % PALETTE.len()])
}

/// Copy of `image` with a 2px box and a centre cross for every detection
pub fn draw_detections(image: &DynamicImage, detections: &[Detection]) -> RgbImage {
    let mut canvas = image.to_rgb8();

    for detection in detections {
        let bbox = detection.bbox();
        let color = label_color(detection.label());
        let x = bbox.x1().round() as i32;
        let y = bbox.y1().round() as i32;
        let width = bbox.width().round().max(1.0) as u32;
        let height = bbox.height().round().max(1.0) as u32;

        draw_hollow_rect_mut(&mut canvas, Rect::at(x, y).of_size(width, height), color);
        if width > 2 && height > 2 {
            let inner = Rect::at(x + 1, y + 1).of_size(width - 2, height - 2);
            draw_hollow_rect_mut(&mut canvas, inner, color);
        }

        let (cx, cy) = bbox.center();
        draw_cross_mut(&mut canvas, color, cx.round() as i32, cy.round() as i32);
    }

    canvas
}

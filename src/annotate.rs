use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::models::{BoundingBox, Detection};

const BOX_THICKNESS: u32 = 2;
const TEXT_SCALE: u32 = 2;
const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;

const PALETTE: [[u8; 3]; 6] = [
    [230, 57, 70],
    [42, 157, 143],
    [69, 123, 157],
    [244, 162, 97],
    [142, 68, 173],
    [38, 70, 83],
];

/// Render detection boxes and labels onto a copy of the source image.
pub fn render(image: &DynamicImage, detections: &[Detection]) -> RgbaImage {
    let mut canvas = image.to_rgba8();
    for det in detections {
        let color = color_for(&det.label);
        draw_box(&mut canvas, &det.bbox, color);
        let text = format!("{} {:.2}", det.label, det.confidence);
        draw_label(&mut canvas, &det.bbox, &text, color);
    }
    canvas
}

fn color_for(label: &str) -> Rgba<u8> {
    let idx = label.bytes().map(|b| b as usize).sum::<usize>() % PALETTE.len();
    let [r, g, b] = PALETTE[idx];
    Rgba([r, g, b, 255])
}

fn draw_box(canvas: &mut RgbaImage, bbox: &BoundingBox, color: Rgba<u8>) {
    let (w, h) = canvas.dimensions();
    for t in 0..BOX_THICKNESS {
        let x = bbox.x.saturating_add(t).min(w.saturating_sub(1));
        let y = bbox.y.saturating_add(t).min(h.saturating_sub(1));
        let rw = bbox.width.saturating_sub(2 * t).max(1);
        let rh = bbox.height.saturating_sub(2 * t).max(1);
        draw_hollow_rect_mut(
            canvas,
            Rect::at(x as i32, y as i32).of_size(rw, rh),
            color,
        );
    }
}

fn draw_label(canvas: &mut RgbaImage, bbox: &BoundingBox, text: &str, color: Rgba<u8>) {
    let bar_height = GLYPH_HEIGHT * TEXT_SCALE + 4;
    let bar_width = text.chars().count() as u32 * (GLYPH_WIDTH + 1) * TEXT_SCALE + 4;

    // Above the box when there is room, inside its top edge otherwise.
    let bar_y = bbox.y.saturating_sub(bar_height);
    let bar_x = bbox.x;
    draw_filled_rect_mut(
        canvas,
        Rect::at(bar_x as i32, bar_y as i32).of_size(bar_width.max(1), bar_height),
        color,
    );
    draw_text(
        canvas,
        bar_x + 2,
        bar_y + 2,
        text,
        TEXT_SCALE,
        Rgba([255, 255, 255, 255]),
    );
}

/// Minimal 5x7 bitmap text renderer (uppercase letters, digits and a few
/// punctuation marks); unknown characters render as a solid block.
fn draw_text(canvas: &mut RgbaImage, x: u32, y: u32, text: &str, scale: u32, color: Rgba<u8>) {
    let (img_w, img_h) = canvas.dimensions();
    let mut cursor_x = x;
    for ch in text.chars() {
        let rows = glyph(ch.to_ascii_uppercase());
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let px = cursor_x + col * scale + dx;
                        let py = y + row as u32 * scale + dy;
                        if px < img_w && py < img_h {
                            canvas.put_pixel(px, py, color);
                        }
                    }
                }
            }
        }
        cursor_x += (GLYPH_WIDTH + 1) * scale;
    }
}

fn glyph(c: char) -> [u8; 7] {
    match c {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01110],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        ' ' => [0, 0, 0, 0, 0, 0, 0],
        '.' => [0, 0, 0, 0, 0, 0b00100, 0b00100],
        '-' => [0, 0, 0, 0b01110, 0, 0, 0],
        '_' => [0, 0, 0, 0, 0, 0, 0b11111],
        ':' => [0, 0b00100, 0b00100, 0, 0b00100, 0b00100, 0],
        _ => [0b11111; 7],
    }
}

//! Black/white frame buffer handed to render functions
//!
//! The panels have inverted polarity: a set bit is a white (off) pixel, a cleared
//! bit is black (on). Rows are `controller_width` pixels wide, which is wider than
//! the visible area on the 2.13" panels.

use core::convert::Infallible;

use embedded_graphics::mono_font::{ascii::FONT_6X10, MonoTextStyle};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::{DrawTarget, Drawable, OriginDimensions, Point, Primitive, Size};
use embedded_graphics::primitives::{Line, PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Alignment, Text};
use embedded_graphics::Pixel;

use crate::weact_epaper::model::TypeAModel;
use crate::weact_epaper::schema::Rotation;

/// Frame buffer for one family A panel
pub struct DisplayBuffer {
    model: TypeAModel,
    rotation: Rotation,
    buffer: Vec<u8>,
}

impl DisplayBuffer {
    /// Create a white buffer sized for `model`
    pub fn new(model: TypeAModel, rotation: Rotation) -> Self {
        Self {
            model,
            rotation,
            buffer: vec![0xFF; model.buffer_length()],
        }
    }

    /// Raw bytes in controller order
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Set every pixel to `color`
    pub fn fill(&mut self, color: BinaryColor) {
        let fill = if color.is_on() { 0x00 } else { 0xFF };
        self.buffer.iter_mut().for_each(|b| *b = fill);
    }

    /// Pixel at unrotated panel coordinates, `None` outside the visible area
    pub fn pixel(&self, x: u32, y: u32) -> Option<BinaryColor> {
        let (pos, mask) = self.locate(x, y)?;
        Some(if self.buffer[pos] & mask == 0 {
            BinaryColor::On
        } else {
            BinaryColor::Off
        })
    }

    fn locate(&self, x: u32, y: u32) -> Option<(usize, u8)> {
        if x >= u32::from(self.model.width()) || y >= u32::from(self.model.height()) {
            return None;
        }
        let pos = (x + y * u32::from(self.model.controller_width())) as usize / 8;
        Some((pos, 0x80 >> (x & 0x07)))
    }

    fn draw_absolute_pixel(&mut self, x: u32, y: u32, color: BinaryColor) {
        if let Some((pos, mask)) = self.locate(x, y) {
            if color.is_on() {
                self.buffer[pos] &= !mask;
            } else {
                self.buffer[pos] |= mask;
            }
        }
    }

    // Maps rotated coordinates back onto the panel.
    fn to_absolute(&self, x: i32, y: i32) -> Option<(u32, u32)> {
        if x < 0 || y < 0 {
            return None;
        }
        let width = i32::from(self.model.width());
        let height = i32::from(self.model.height());
        let (ax, ay) = match self.rotation {
            Rotation::Rotate0 => (x, y),
            Rotation::Rotate90 => (width - y - 1, x),
            Rotation::Rotate180 => (width - x - 1, height - y - 1),
            Rotation::Rotate270 => (y, height - x - 1),
        };
        if ax < 0 || ay < 0 {
            return None;
        }
        Some((ax as u32, ay as u32))
    }
}

impl OriginDimensions for DisplayBuffer {
    fn size(&self) -> Size {
        let width = u32::from(self.model.width());
        let height = u32::from(self.model.height());
        match self.rotation {
            Rotation::Rotate0 | Rotation::Rotate180 => Size::new(width, height),
            Rotation::Rotate90 | Rotation::Rotate270 => Size::new(height, width),
        }
    }
}

impl DrawTarget for DisplayBuffer {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if let Some((x, y)) = self.to_absolute(point.x, point.y) {
                self.draw_absolute_pixel(x, y, color);
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.fill(color);
        Ok(())
    }
}

/// Border, diagonals and a centered label, for checking wiring and rotation
pub fn draw_test_card(display: &mut DisplayBuffer) {
    let size = display.size();
    let stroke = PrimitiveStyle::with_stroke(BinaryColor::On, 1);
    let bottom_right = Point::new(size.width as i32 - 1, size.height as i32 - 1);

    let _ = Rectangle::new(Point::zero(), size)
        .into_styled(stroke)
        .draw(display);
    let _ = Line::new(Point::zero(), bottom_right)
        .into_styled(stroke)
        .draw(display);
    let _ = Line::new(
        Point::new(0, bottom_right.y),
        Point::new(bottom_right.x, 0),
    )
    .into_styled(stroke)
    .draw(display);

    let label = format!("{}x{}", size.width, size.height);
    let _ = Text::with_alignment(
        &label,
        Point::new(size.width as i32 / 2, size.height as i32 / 2 - 4),
        MonoTextStyle::new(&FONT_6X10, BinaryColor::On),
        Alignment::Center,
    )
    .draw(display);
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::prelude::*;
    use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};

    #[test]
    fn test_new_buffer_is_white() {
        let display = DisplayBuffer::new(TypeAModel::WeactEpaper1in54, Rotation::Rotate0);
        assert_eq!(display.buffer().len(), 5000);
        assert!(display.buffer().iter().all(|b| *b == 0xFF));
        assert_eq!(display.pixel(0, 0), Some(BinaryColor::Off));
    }

    #[test]
    fn test_on_pixel_clears_bit() {
        let mut display = DisplayBuffer::new(TypeAModel::WeactEpaper1in54, Rotation::Rotate0);
        Pixel(Point::new(1, 0), BinaryColor::On)
            .draw(&mut display)
            .unwrap();
        assert_eq!(display.buffer()[0], 0b1011_1111);
        assert_eq!(display.pixel(1, 0), Some(BinaryColor::On));
    }

    #[test]
    fn test_rows_use_controller_width() {
        let mut display = DisplayBuffer::new(TypeAModel::WeactEpaper2in13, Rotation::Rotate0);
        Pixel(Point::new(0, 1), BinaryColor::On)
            .draw(&mut display)
            .unwrap();
        // 128 pixel rows, so row 1 starts at byte 16
        assert_eq!(display.buffer()[16], 0b0111_1111);
        // Columns past the glass are ignored
        Pixel(Point::new(125, 0), BinaryColor::On)
            .draw(&mut display)
            .unwrap();
        assert!(display.buffer()[..16].iter().all(|b| *b == 0xFF));
    }

    #[test]
    fn test_rotation_swaps_size_and_maps_pixels() {
        let mut display = DisplayBuffer::new(TypeAModel::WeactEpaper2in9, Rotation::Rotate90);
        assert_eq!(display.size(), Size::new(296, 128));
        Pixel(Point::new(0, 0), BinaryColor::On)
            .draw(&mut display)
            .unwrap();
        assert_eq!(display.pixel(127, 0), Some(BinaryColor::On));

        let mut display = DisplayBuffer::new(TypeAModel::WeactEpaper2in9, Rotation::Rotate270);
        Pixel(Point::new(0, 0), BinaryColor::On)
            .draw(&mut display)
            .unwrap();
        assert_eq!(display.pixel(0, 295), Some(BinaryColor::On));
    }

    #[test]
    fn test_clear_and_fill() {
        let mut display = DisplayBuffer::new(TypeAModel::WeactEpaper4in2, Rotation::Rotate180);
        display.clear(BinaryColor::On).unwrap();
        assert!(display.buffer().iter().all(|b| *b == 0x00));
        Rectangle::new(Point::new(0, 0), Size::new(8, 1))
            .into_styled(PrimitiveStyle::with_fill(BinaryColor::Off))
            .draw(&mut display)
            .unwrap();
        // Rotated 180, so the top-left run lands in the last byte
        assert_eq!(*display.buffer().last().unwrap(), 0xFF);
    }

    #[test]
    fn test_card_draws_corners() {
        let mut display = DisplayBuffer::new(TypeAModel::WeactEpaper2in13V2, Rotation::Rotate0);
        draw_test_card(&mut display);
        assert_eq!(display.pixel(0, 0), Some(BinaryColor::On));
        assert_eq!(display.pixel(121, 249), Some(BinaryColor::On));
        assert_eq!(display.pixel(121, 0), Some(BinaryColor::On));
        assert_eq!(display.pixel(5, 1), Some(BinaryColor::Off));
    }
}

use anyhow::ensure;
use image::RgbImage;

use crate::{geometry::FloatType, kernel::Rgb};

/// Running average of successive frames of the same view.
#[derive(Clone, Debug)]
pub struct Accumulator {
    width: u32,
    height: u32,
    sum: Vec<Rgb>,
    frames: u32,
}

fn sanitize(value: FloatType) -> FloatType {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}

impl Accumulator {
    pub fn new(width: u32, height: u32) -> Accumulator {
        Accumulator {
            width,
            height,
            sum: vec![Rgb::default(); width as usize * height as usize],
            frames: 0,
        }
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Adds one frame of linear radiance. Negative and non-finite values count as zero.
    pub fn add_frame(&mut self, frame: &[Rgb]) -> anyhow::Result<()> {
        ensure!(
            frame.len() == self.sum.len(),
            "Frame has {} pixels, expected {}x{}",
            frame.len(),
            self.width,
            self.height
        );

        for (sum, pixel) in self.sum.iter_mut().zip(frame) {
            sum.r += sanitize(pixel.r);
            sum.g += sanitize(pixel.g);
            sum.b += sanitize(pixel.b);
        }
        self.frames += 1;
        Ok(())
    }

    /// Average of all frames so far, black before the first one.
    pub fn mean(&self) -> Vec<Rgb> {
        let scale = 1.0 / self.frames.max(1) as FloatType;
        self.sum
            .iter()
            .map(|p| Rgb::new(p.r * scale, p.g * scale, p.b * scale))
            .collect()
    }

    pub fn to_image(&self) -> RgbImage {
        let mean = self.mean();
        RgbImage::from_fn(self.width, self.height, |x, y| {
            color_to_image(mean[y as usize * self.width as usize + x as usize])
        })
    }
}

/// Maps a 0-1 f32 rgb pixel to pixel type compatible with module image.
pub fn color_to_image(color: Rgb) -> image::Rgb<u8> {
    let channel = |c: FloatType| (c * 255.0).round().clamp(0.0, 255.0) as u8;
    image::Rgb([channel(color.r), channel(color.g), channel(color.b)])
}

#[cfg(test)]
mod test {
    use super::*;
    use assert2::{assert, let_assert};
    use test_case::test_case;

    #[test]
    fn averages_frames() {
        let mut acc = Accumulator::new(2, 1);
        acc.add_frame(&[Rgb::new(1.0, 0.0, 0.5), Rgb::new(0.0, 0.0, 0.0)])
            .unwrap();
        acc.add_frame(&[Rgb::new(0.0, 1.0, 0.5), Rgb::new(2.0, 2.0, 2.0)])
            .unwrap();

        assert!(acc.frames() == 2);
        assert!(acc.mean() == vec![Rgb::new(0.5, 0.5, 0.5), Rgb::new(1.0, 1.0, 1.0)]);
    }

    #[test]
    fn invalid_samples_are_black() {
        let mut acc = Accumulator::new(1, 1);
        acc.add_frame(&[Rgb::new(-1.0, f32::NAN, f32::INFINITY)])
            .unwrap();
        assert!(acc.mean() == vec![Rgb::new(0.0, 0.0, 0.0)]);
    }

    #[test]
    fn empty_accumulator_is_black() {
        let acc = Accumulator::new(3, 2);
        assert!(acc.mean().iter().all(|p| *p == Rgb::default()));
        assert!(acc.to_image().dimensions() == (3, 2));
    }

    #[test]
    fn wrong_frame_size() {
        let mut acc = Accumulator::new(2, 2);
        let_assert!(Err(_) = acc.add_frame(&[Rgb::default(); 3]));
        assert!(acc.frames() == 0);
    }

    #[test]
    fn image_layout() {
        let mut acc = Accumulator::new(2, 2);
        let frame = [
            Rgb::new(1.0, 0.0, 0.0),
            Rgb::new(0.0, 1.0, 0.0),
            Rgb::new(0.0, 0.0, 1.0),
            Rgb::new(0.5, 0.5, 0.5),
        ];
        acc.add_frame(&frame).unwrap();
        let image = acc.to_image();
        assert!(*image.get_pixel(1, 0) == image::Rgb([0, 255, 0]));
        assert!(*image.get_pixel(0, 1) == image::Rgb([0, 0, 255]));
        assert!(*image.get_pixel(1, 1) == image::Rgb([128, 128, 128]));
    }

    #[test_case(0.0, 0)]
    #[test_case(1.0, 255)]
    #[test_case(7.5, 255)]
    #[test_case(-0.2, 0)]
    #[test_case(0.5, 128)]
    fn clamps_to_8_bits(value: f32, expected: u8) {
        assert!(color_to_image(Rgb::new(value, value, value)) == image::Rgb([expected; 3]));
    }
}

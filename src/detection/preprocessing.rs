use image::{DynamicImage, Rgb, RgbImage, imageops::FilterType};

const PAD_VALUE: u8 = 114;

/// Geometry of a letterbox resize, used to map network coordinates back to the source image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: u32,
    pub pad_y: u32,
    pub source_width: u32,
    pub source_height: u32,
}

impl Letterbox {
    /// Fit a `width`x`height` image into a `target`x`target` square, preserving aspect ratio
    pub fn fit(width: u32, height: u32, target: u32) -> Self {
        let scale = (target as f32 / width.max(1) as f32).min(target as f32 / height.max(1) as f32);
        let (scaled_w, scaled_h) = Self::scaled_size(width, height, scale, target);
        Self {
            scale,
            pad_x: (target - scaled_w) / 2,
            pad_y: (target - scaled_h) / 2,
            source_width: width,
            source_height: height,
        }
    }

    fn scaled_size(width: u32, height: u32, scale: f32, target: u32) -> (u32, u32) {
        let w = ((width as f32 * scale).round() as u32).clamp(1, target);
        let h = ((height as f32 * scale).round() as u32).clamp(1, target);
        (w, h)
    }

    /// Map a point in network input space back to source pixels, clamped to the image
    pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        let sx = (x - self.pad_x as f32) / self.scale;
        let sy = (y - self.pad_y as f32) / self.scale;
        (
            sx.clamp(0.0, self.source_width as f32),
            sy.clamp(0.0, self.source_height as f32),
        )
    }
}

/// Resize into a grey-padded square canvas of `target` pixels
pub fn letterbox(img: &DynamicImage, target: u32) -> (RgbImage, Letterbox) {
    let geometry = Letterbox::fit(img.width(), img.height(), target);
    let (scaled_w, scaled_h) =
        Letterbox::scaled_size(img.width(), img.height(), geometry.scale, target);

    let resized = image::imageops::resize(&img.to_rgb8(), scaled_w, scaled_h, FilterType::Triangle);
    let mut canvas = RgbImage::from_pixel(target, target, Rgb([PAD_VALUE; 3]));
    image::imageops::overlay(&mut canvas, &resized, geometry.pad_x.into(), geometry.pad_y.into());

    (canvas, geometry)
}

/// Planar RGB in [0, 1], laid out channel-major (CHW)
pub fn to_chw(img: &RgbImage) -> Vec<f32> {
    let (width, height) = img.dimensions();
    let plane = (width * height) as usize;
    let mut data = vec![0.0f32; plane * 3];

    for (x, y, pixel) in img.enumerate_pixels() {
        let idx = (y * width + x) as usize;
        for ch in 0..3 {
            data[ch * plane + idx] = pixel[ch] as f32 / 255.0;
        }
    }

    data
}

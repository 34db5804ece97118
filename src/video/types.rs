use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, Pixel, Primitive, Rgb, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};

/// Channel value type of a raster: `u8` for colour, `f32` for opacity.
pub trait ChannelValue: Primitive + Send + Sync + 'static {
    fn to_f32(self) -> f32;
    fn from_f32(value: f32) -> Self;
}

impl ChannelValue for u8 {
    fn to_f32(self) -> f32 {
        f32::from(self)
    }

    fn from_f32(value: f32) -> Self {
        value.round().clamp(0.0, 255.0) as u8
    }
}

impl ChannelValue for f32 {
    fn to_f32(self) -> f32 {
        self
    }

    fn from_f32(value: f32) -> Self {
        value
    }
}

/// Geometric operations shared by colour frames and masks.
///
/// Every operation returns a new raster; none of them stretches content
/// unless asked to (`resized`).
pub trait Raster: Clone + Send + Sync + 'static {
    type Value: ChannelValue;
    type Pixel: Pixel<Subpixel = Self::Value> + Send + Sync + 'static;

    fn buffer(&self) -> &ImageBuffer<Self::Pixel, Vec<Self::Value>>;

    fn from_buffer(buffer: ImageBuffer<Self::Pixel, Vec<Self::Value>>) -> Self;

    fn width(&self) -> u32 {
        self.buffer().width()
    }

    fn height(&self) -> u32 {
        self.buffer().height()
    }

    fn size(&self) -> (u32, u32) {
        self.buffer().dimensions()
    }

    fn resized(&self, width: u32, height: u32) -> Self {
        if self.size() == (width, height) {
            return self.clone();
        }
        Self::from_buffer(imageops::resize(self.buffer(), width.max(1), height.max(1), FilterType::Triangle))
    }

    /// The `width`x`height` region at (`x`, `y`), clipped to the raster.
    fn cropped(&self, x: u32, y: u32, width: u32, height: u32) -> Self {
        Self::from_buffer(imageops::crop_imm(self.buffer(), x, y, width, height).to_image())
    }

    fn flipped_horizontal(&self) -> Self {
        Self::from_buffer(imageops::flip_horizontal(self.buffer()))
    }

    fn flipped_vertical(&self) -> Self {
        Self::from_buffer(imageops::flip_vertical(self.buffer()))
    }

    /// Exact counter-clockwise rotation by `quarter_turns * 90` degrees.
    fn rotated_quarters(&self, quarter_turns: u32) -> Self {
        match quarter_turns % 4 {
            1 => Self::from_buffer(imageops::rotate270(self.buffer())),
            2 => Self::from_buffer(imageops::rotate180(self.buffer())),
            3 => Self::from_buffer(imageops::rotate90(self.buffer())),
            _ => self.clone(),
        }
    }

    /// Counter-clockwise rotation by `degrees` around `center` (defaults to
    /// the middle of the raster).
    ///
    /// Multiples of 90 degrees about the default center are exact
    /// transposes. Other angles use bilinear sampling; samples falling off
    /// the source read `fill`. With `expand` the output grows to hold the
    /// whole rotated raster.
    fn rotated(&self, degrees: f64, center: Option<(f64, f64)>, expand: bool, fill: Self::Pixel) -> Self {
        let normalized = degrees.rem_euclid(360.0);
        let quarters = (normalized / 90.0).round();
        let (width, height) = self.size();
        if (normalized - quarters * 90.0).abs() < 1e-9 && center.is_none() {
            let quarters = quarters as u32 % 4;
            if quarters % 2 == 0 || expand || width == height {
                return self.rotated_quarters(quarters);
            }
        }
        Self::from_buffer(rotate_bilinear(self.buffer(), normalized, center, expand, fill))
    }
}

fn rotate_bilinear<P>(
    source: &ImageBuffer<P, Vec<P::Subpixel>>,
    degrees: f64,
    center: Option<(f64, f64)>,
    expand: bool,
    fill: P,
) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    P: Pixel + 'static,
    P::Subpixel: ChannelValue,
{
    let (width, height) = (f64::from(source.width()), f64::from(source.height()));
    let (cx, cy) = center.unwrap_or((width / 2.0, height / 2.0));
    let (sin, cos) = degrees.to_radians().sin_cos();

    // Screen coordinates have y pointing down, so a visual counter-clockwise
    // turn is (x, y) -> (cos x + sin y, -sin x + cos y) about the center.
    let forward = |x: f64, y: f64| {
        let (dx, dy) = (x - cx, y - cy);
        (cos * dx + sin * dy, -sin * dx + cos * dy)
    };

    let (out_width, out_height, origin_x, origin_y) = if expand {
        let corners = [forward(0.0, 0.0), forward(width, 0.0), forward(0.0, height), forward(width, height)];
        let min_x = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min);
        let max_x = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max);
        let min_y = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);
        let max_y = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max);
        (
            ((max_x - min_x) - 1e-6).ceil().max(1.0) as u32,
            ((max_y - min_y) - 1e-6).ceil().max(1.0) as u32,
            -min_x,
            -min_y,
        )
    } else {
        (source.width(), source.height(), cx, cy)
    };

    let channels = usize::from(P::CHANNEL_COUNT);
    let fill_values: Vec<f32> = fill.channels().iter().map(|v| ChannelValue::to_f32(*v)).collect();
    let sample = |x: i64, y: i64, channel: usize| -> f32 {
        if x < 0 || y < 0 || x >= i64::from(source.width()) || y >= i64::from(source.height()) {
            fill_values[channel]
        } else {
            ChannelValue::to_f32(source.get_pixel(x as u32, y as u32).channels()[channel])
        }
    };

    let mut output = ImageBuffer::from_pixel(out_width, out_height, fill);
    for (x, y, pixel) in output.enumerate_pixels_mut() {
        let qx = f64::from(x) + 0.5 - origin_x;
        let qy = f64::from(y) + 0.5 - origin_y;
        let sx = cos * qx - sin * qy + cx - 0.5;
        let sy = sin * qx + cos * qy + cy - 0.5;

        let (x0, y0) = (sx.floor(), sy.floor());
        let (fx, fy) = ((sx - x0) as f32, (sy - y0) as f32);
        let (x0, y0) = (x0 as i64, y0 as i64);
        if x0 < -1 || y0 < -1 || x0 >= i64::from(source.width()) || y0 >= i64::from(source.height()) {
            continue;
        }

        let values = pixel.channels_mut();
        for (channel, value) in values.iter_mut().enumerate().take(channels) {
            let top = sample(x0, y0, channel) * (1.0 - fx) + sample(x0 + 1, y0, channel) * fx;
            let bottom = sample(x0, y0 + 1, channel) * (1.0 - fx) + sample(x0 + 1, y0 + 1, channel) * fx;
            *value = <P::Subpixel as ChannelValue>::from_f32(top * (1.0 - fy) + bottom * fy);
        }
    }
    output
}

/// A single RGB video frame
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    buffer: RgbImage,
}

impl Frame {
    /// Create a new frame from an RGB image buffer
    pub fn new(buffer: RgbImage) -> Self {
        Self { buffer }
    }

    /// Create a new frame with the given dimensions filled with black
    pub fn new_black(width: u32, height: u32) -> Self {
        Self::new(ImageBuffer::new(width, height))
    }

    /// Create a new frame with the given dimensions filled with the specified color
    pub fn new_filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        Self::new(ImageBuffer::from_pixel(width, height, Rgb(color)))
    }

    /// Get a pixel at the given coordinates (returns RGB array)
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.buffer.get_pixel(x, y).0
    }

    /// Set a pixel at the given coordinates
    pub fn set_pixel(&mut self, x: u32, y: u32, color: [u8; 3]) {
        self.buffer.put_pixel(x, y, Rgb(color));
    }

    /// Get the underlying image buffer
    pub fn as_image(&self) -> &RgbImage {
        &self.buffer
    }

    pub fn into_image(self) -> RgbImage {
        self.buffer
    }

    /// Raw interleaved RGB bytes, row-major.
    pub fn as_raw(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    pub(crate) fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    /// Create a frame from raw RGB bytes
    pub fn from_rgb_bytes(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        ImageBuffer::from_raw(width, height, data).map(Self::new)
    }

    /// Split an RGBA image into a colour frame and an opacity mask.
    pub fn from_rgba(image: &RgbaImage) -> (Self, MaskFrame) {
        let colour = ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
            let [r, g, b, _] = image.get_pixel(x, y).0;
            Rgb([r, g, b])
        });
        (Self::new(colour), MaskFrame::from_alpha(image))
    }

    /// Multiply every channel by `factor`, saturating.
    pub fn multiplied(&self, factor: f32) -> Self {
        let mut frame = self.clone();
        for value in frame.as_raw_mut() {
            *value = u8::from_f32(f32::from(*value) * factor);
        }
        frame
    }

    /// Save the frame as a PNG file
    pub fn save_png<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), image::ImageError> {
        self.buffer.save(path)
    }
}

impl Raster for Frame {
    type Value = u8;
    type Pixel = Rgb<u8>;

    fn buffer(&self) -> &RgbImage {
        &self.buffer
    }

    fn from_buffer(buffer: RgbImage) -> Self {
        Self::new(buffer)
    }
}

/// Single-channel opacity grid with values in `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct MaskFrame {
    buffer: ImageBuffer<Luma<f32>, Vec<f32>>,
}

impl MaskFrame {
    pub fn new_filled(width: u32, height: u32, value: f32) -> Self {
        Self {
            buffer: ImageBuffer::from_pixel(width, height, Luma([value])),
        }
    }

    pub fn opaque(width: u32, height: u32) -> Self {
        Self::new_filled(width, height, 1.0)
    }

    pub fn transparent(width: u32, height: u32) -> Self {
        Self::new_filled(width, height, 0.0)
    }

    pub fn from_fn<G>(width: u32, height: u32, mut func: G) -> Self
    where
        G: FnMut(u32, u32) -> f32,
    {
        Self {
            buffer: ImageBuffer::from_fn(width, height, |x, y| Luma([func(x, y)])),
        }
    }

    /// Opacity from the alpha channel of `image`.
    pub fn from_alpha(image: &RgbaImage) -> Self {
        Self::from_fn(image.width(), image.height(), |x, y| f32::from(image.get_pixel(x, y)[3]) / 255.0)
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.buffer.get_pixel(x, y)[0]
    }

    pub fn set(&mut self, x: u32, y: u32, value: f32) {
        self.buffer.put_pixel(x, y, Luma([value]));
    }

    pub fn as_raw(&self) -> &[f32] {
        self.buffer.as_raw()
    }

    pub(crate) fn as_raw_mut(&mut self) -> &mut [f32] {
        &mut self.buffer
    }

    /// Every value multiplied by `factor`.
    pub fn scaled(mut self, factor: f32) -> Self {
        for value in self.as_raw_mut() {
            *value *= factor;
        }
        self
    }

    /// The mask as an 8-bit greyscale image (for debugging and export).
    pub fn to_luma8(&self) -> image::GrayImage {
        ImageBuffer::from_fn(self.width(), self.height(), |x, y| Luma([u8::from_f32(self.get(x, y) * 255.0)]))
    }
}

impl Raster for MaskFrame {
    type Value = f32;
    type Pixel = Luma<f32>;

    fn buffer(&self) -> &ImageBuffer<Luma<f32>, Vec<f32>> {
        &self.buffer
    }

    fn from_buffer(buffer: ImageBuffer<Luma<f32>, Vec<f32>>) -> Self {
        Self { buffer }
    }
}

/// Video processing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoParams {
    /// Target frame rate for output
    pub fps: f64,

    /// Target resolution (width, height)
    pub resolution: (u32, u32),

    /// Video codec to use for output
    pub codec: String,

    /// Quality setting (0-100, higher is better)
    pub quality: u8,
}

impl Default for VideoParams {
    fn default() -> Self {
        Self {
            fps: 24.0,
            resolution: (1280, 720),
            codec: "libx264".to_string(),
            quality: 85,
        }
    }
}

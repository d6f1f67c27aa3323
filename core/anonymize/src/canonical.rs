use image::RgbImage;

/// The engine's working image: a single tightly packed plane of B, G, R
/// bytes.
///
/// Created at call entry and dropped at call exit. It either owns its
/// buffer (any conversion path) or mutably borrows the caller's plane
/// (tightly packed BGR input), in which case every pipeline mutation lands
/// directly in caller memory and no write-back is needed.
#[derive(Debug)]
pub struct CanonicalImage<'a> {
    width: u32,
    height: u32,
    data: Buf<'a>,
}

#[derive(Debug)]
enum Buf<'a> {
    Owned(Vec<u8>),
    Borrowed(&'a mut [u8]),
}

impl CanonicalImage<'static> {
    /// A zero-filled owned canonical image.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: Buf::Owned(vec![0u8; width as usize * height as usize * 3]),
        }
    }

    /// Wrap an owned, tightly packed BGR buffer of exactly
    /// `width × height × 3` bytes.
    pub fn from_vec(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * 3);
        Self {
            width,
            height,
            data: Buf::Owned(data),
        }
    }

    /// Convert an RGB image (the image-codec and resize interchange format)
    /// into an owned canonical image.
    pub fn from_rgb_image(image: &RgbImage) -> Self {
        let (width, height) = image.dimensions();
        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for pixel in image.pixels() {
            let [r, g, b] = pixel.0;
            data.extend_from_slice(&[b, g, r]);
        }
        Self::from_vec(width, height, data)
    }
}

impl<'a> CanonicalImage<'a> {
    /// Wrap a caller's tightly packed BGR plane without copying.
    pub fn from_bgr_mut(width: u32, height: u32, data: &'a mut [u8]) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * 3);
        Self {
            width,
            height,
            data: Buf::Borrowed(data),
        }
    }

    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether the pixel data lives in the caller's buffer.
    pub fn is_borrowed(&self) -> bool {
        matches!(self.data, Buf::Borrowed(_))
    }

    /// The packed B,G,R bytes.
    pub fn data(&self) -> &[u8] {
        match &self.data {
            Buf::Owned(v) => v,
            Buf::Borrowed(s) => s,
        }
    }

    /// Mutable access to the packed B,G,R bytes.
    pub fn data_mut(&mut self) -> &mut [u8] {
        match &mut self.data {
            Buf::Owned(v) => v,
            Buf::Borrowed(s) => s,
        }
    }

    /// One row of packed B,G,R bytes.
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.width as usize * 3;
        let start = y as usize * stride;
        &self.data()[start..start + stride]
    }

    /// Mutable access to one row.
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let stride = self.width as usize * 3;
        let start = y as usize * stride;
        &mut self.data_mut()[start..start + stride]
    }

    /// Copy into an [`RgbImage`] for codec or resize operations.
    pub fn to_rgb_image(&self) -> RgbImage {
        let mut out = RgbImage::new(self.width, self.height);
        for (x, y, pixel) in out.enumerate_pixels_mut() {
            let i = (y as usize * self.width as usize + x as usize) * 3;
            let data = self.data();
            *pixel = image::Rgb([data[i + 2], data[i + 1], data[i]]);
        }
        out
    }
}

use std::{
    fmt,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use anyhow::Context;

use crate::foundation::{
    core::{ISize, Rgba8},
    error::{LaminateError, LaminateResult},
};

static NEXT_IMAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Pixels living in a backend texture.
///
/// Implemented by GPU contexts for imported external textures and for GPU-resident
/// snapshot results. Reading pixels back may fail, e.g. after context loss.
pub trait TextureSource: Send + Sync + fmt::Debug {
    /// Pixel size of the texture.
    fn size(&self) -> ISize;

    /// Read the texture into tightly packed premultiplied RGBA8.
    fn read_pixels(&self) -> Option<Vec<u8>>;

    /// Backend handle of the texture (texture name or native pointer).
    fn backend_handle(&self) -> u64;
}

enum Storage {
    Raster(Arc<vello_cpu::Pixmap>),
    Texture(Arc<dyn TextureSource>),
}

struct Inner {
    id: u64,
    size: ISize,
    storage: Storage,
}

/// Immutable, shareable handle to rasterized pixels.
///
/// The pixels are either CPU resident (a raster image, safe to hand to any thread without a
/// live GPU context) or held by a backend texture. Use [`PortableImage::make_raster_image`]
/// to force a texture-backed image into host memory.
#[derive(Clone)]
pub struct PortableImage {
    inner: Arc<Inner>,
}

impl fmt::Debug for PortableImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortableImage")
            .field("id", &self.inner.id)
            .field("size", &self.inner.size)
            .field("texture_backed", &self.is_texture_backed())
            .finish()
    }
}

impl PortableImage {
    fn new(size: ISize, storage: Storage) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed),
                size,
                storage,
            }),
        }
    }

    /// Wrap a rendered pixmap.
    pub fn from_pixmap(pixmap: vello_cpu::Pixmap) -> Self {
        let size = ISize::new(u32::from(pixmap.width()), u32::from(pixmap.height()));
        Self::new(size, Storage::Raster(Arc::new(pixmap)))
    }

    /// Build a raster image from tightly packed premultiplied RGBA8.
    pub fn from_rgba8_premul(size: ISize, rgba8_premul: &[u8]) -> LaminateResult<Self> {
        let w: u16 = size
            .width
            .try_into()
            .map_err(|_| LaminateError::validation("image width exceeds u16"))?;
        let h: u16 = size
            .height
            .try_into()
            .map_err(|_| LaminateError::validation("image height exceeds u16"))?;
        if rgba8_premul.len() != size.rgba8_byte_len() {
            return Err(LaminateError::validation(format!(
                "image byte length {} does not match {}x{}",
                rgba8_premul.len(),
                size.width,
                size.height
            )));
        }

        let mut may_have_opacities = false;
        let mut pixels = Vec::with_capacity(size.width as usize * size.height as usize);
        for px in rgba8_premul.chunks_exact(4) {
            let a = px[3];
            may_have_opacities |= a != 255;
            pixels.push(vello_cpu::peniko::color::PremulRgba8 {
                r: px[0],
                g: px[1],
                b: px[2],
                a,
            });
        }

        Ok(Self::from_pixmap(vello_cpu::Pixmap::from_parts_with_opacity(
            pixels,
            w,
            h,
            may_have_opacities,
        )))
    }

    /// Raster image filled with a single color.
    pub fn solid(size: ISize, color: Rgba8) -> LaminateResult<Self> {
        let px = color.to_premul();
        let data: Vec<u8> = std::iter::repeat_n(px, size.width as usize * size.height as usize)
            .flatten()
            .collect();
        Self::from_rgba8_premul(size, &data)
    }

    /// Wrap a backend texture.
    pub fn from_texture(source: Arc<dyn TextureSource>) -> Self {
        let size = source.size();
        Self::new(size, Storage::Texture(source))
    }

    /// Process-unique identity of this image.
    pub fn unique_id(&self) -> u64 {
        self.inner.id
    }

    /// Pixel size.
    pub fn size(&self) -> ISize {
        self.inner.size
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.inner.size.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.inner.size.height
    }

    /// Return `true` when the pixels live in a backend texture.
    pub fn is_texture_backed(&self) -> bool {
        matches!(self.inner.storage, Storage::Texture(_))
    }

    /// Backend handle for texture-backed images.
    pub fn backend_handle(&self) -> Option<u64> {
        match &self.inner.storage {
            Storage::Raster(_) => None,
            Storage::Texture(t) => Some(t.backend_handle()),
        }
    }

    /// Approximate memory held by the pixels.
    pub fn byte_size(&self) -> usize {
        self.inner.size.rgba8_byte_len()
    }

    /// CPU pixmap for raster images.
    pub fn pixmap(&self) -> Option<&Arc<vello_cpu::Pixmap>> {
        match &self.inner.storage {
            Storage::Raster(p) => Some(p),
            Storage::Texture(_) => None,
        }
    }

    /// Return a CPU-resident version of this image.
    ///
    /// Raster images are returned as-is. Texture-backed images are read back; `None` when
    /// the readback fails.
    pub fn make_raster_image(&self) -> Option<PortableImage> {
        match &self.inner.storage {
            Storage::Raster(_) => Some(self.clone()),
            Storage::Texture(t) => {
                let Some(pixels) = t.read_pixels() else {
                    tracing::warn!(id = self.inner.id, "texture readback failed");
                    return None;
                };
                match Self::from_rgba8_premul(self.inner.size, &pixels) {
                    Ok(img) => Some(img),
                    Err(err) => {
                        tracing::warn!(id = self.inner.id, %err, "texture readback is malformed");
                        None
                    }
                }
            }
        }
    }

    /// Premultiplied RGBA8 bytes of the image, reading textures back when needed.
    pub fn rgba8_premul(&self) -> Option<Vec<u8>> {
        match &self.inner.storage {
            Storage::Raster(p) => Some(p.data_as_u8_slice().to_vec()),
            Storage::Texture(t) => t.read_pixels(),
        }
    }

    /// Premultiplied RGBA8 value of one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        let idx = (y as usize * self.width() as usize + x as usize) * 4;
        match &self.inner.storage {
            Storage::Raster(p) => {
                let d = p.data_as_u8_slice();
                Some([d[idx], d[idx + 1], d[idx + 2], d[idx + 3]])
            }
            Storage::Texture(t) => {
                let d = t.read_pixels()?;
                d.get(idx..idx + 4).map(|s| [s[0], s[1], s[2], s[3]])
            }
        }
    }

    /// Convert to a straight-alpha `image::RgbaImage`.
    pub fn to_rgba_image(&self) -> Option<::image::RgbaImage> {
        let mut data = self.rgba8_premul()?;
        unpremultiply_rgba8_in_place(&mut data);
        ::image::RgbaImage::from_raw(self.width(), self.height(), data)
    }

    /// Write the image as PNG.
    pub fn save_png(&self, path: &Path) -> LaminateResult<()> {
        let img = self
            .to_rgba_image()
            .ok_or_else(|| LaminateError::backend("image pixels are not readable"))?;
        img.save_with_format(path, ::image::ImageFormat::Png)
            .with_context(|| format!("write png '{}'", path.display()))?;
        Ok(())
    }
}

fn unpremultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 0 || a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u16::from(*c) * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/image/portable.rs"]
mod tests;

use super::*;

#[derive(Debug)]
struct FakeTexture {
    size: ISize,
    readable: bool,
}

impl TextureSource for FakeTexture {
    fn size(&self) -> ISize {
        self.size
    }

    fn read_pixels(&self) -> Option<Vec<u8>> {
        self.readable
            .then(|| vec![0, 0, 128, 128].repeat(self.size.width as usize * self.size.height as usize))
    }

    fn backend_handle(&self) -> u64 {
        42
    }
}

#[test]
fn solid_image_has_premultiplied_pixels() {
    let img = PortableImage::solid(ISize::new(3, 2), Rgba8::new(255, 0, 0, 128)).unwrap();
    assert_eq!(img.size(), ISize::new(3, 2));
    assert_eq!(img.pixel(2, 1), Some([128, 0, 0, 128]));
    assert_eq!(img.pixel(3, 0), None);
    assert!(!img.is_texture_backed());
    assert_eq!(img.byte_size(), 24);
}

#[test]
fn byte_length_mismatch_is_rejected() {
    let err = PortableImage::from_rgba8_premul(ISize::new(2, 2), &[0; 12]).unwrap_err();
    assert!(err.to_string().contains("byte length"));
}

#[test]
fn unique_ids_differ_and_clones_share() {
    let a = PortableImage::solid(ISize::new(1, 1), Rgba8::opaque(1, 2, 3)).unwrap();
    let b = PortableImage::solid(ISize::new(1, 1), Rgba8::opaque(1, 2, 3)).unwrap();
    assert_ne!(a.unique_id(), b.unique_id());
    assert_eq!(a.clone().unique_id(), a.unique_id());
}

#[test]
fn texture_images_read_back_into_raster() {
    let tex = PortableImage::from_texture(Arc::new(FakeTexture {
        size: ISize::new(2, 2),
        readable: true,
    }));
    assert!(tex.is_texture_backed());
    assert_eq!(tex.backend_handle(), Some(42));

    let raster = tex.make_raster_image().unwrap();
    assert!(!raster.is_texture_backed());
    assert_ne!(raster.unique_id(), tex.unique_id());
    assert_eq!(raster.pixel(1, 1), Some([0, 0, 128, 128]));
}

#[test]
fn failed_readback_yields_none() {
    let tex = PortableImage::from_texture(Arc::new(FakeTexture {
        size: ISize::new(2, 2),
        readable: false,
    }));
    assert!(tex.make_raster_image().is_none());
}

#[test]
fn rgba_export_unpremultiplies() {
    let img = PortableImage::from_rgba8_premul(ISize::new(1, 1), &[64, 0, 0, 128]).unwrap();
    let rgba = img.to_rgba_image().unwrap();
    assert_eq!(rgba.get_pixel(0, 0).0, [128, 0, 0, 128]);
}

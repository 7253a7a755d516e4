/// GL `TEXTURE_2D` target.
pub(crate) const GL_TEXTURE_2D: u32 = 0x0DE1;
/// GL `TEXTURE_EXTERNAL_OES` target used for camera/video streams.
pub(crate) const GL_TEXTURE_EXTERNAL_OES: u32 = 0x8D65;
/// GL `RGBA8` sized internal format.
pub(crate) const GL_RGBA8: u32 = 0x8058;

/// How a platform identifies external textures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureAddressing {
    /// Integer texture names (GL-style).
    Id,
    /// Native object pointers encoded as integers (Metal-style).
    Pointer,
}

/// Pixel layout of texture or image memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorType {
    /// 8-bit RGBA.
    Rgba8888,
    /// 8-bit BGRA.
    Bgra8888,
    /// Unsupported or unrecognized layout.
    Unknown,
}

/// Color space images are tagged with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorSpace {
    /// sRGB.
    #[default]
    Srgb,
}

/// Platform conventions for external textures, resolved once at startup.
///
/// The compositor and snapshot code consume this as data instead of branching on the
/// target platform, so there is a single code path for every host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct PlatformTraits {
    /// Short platform name for logs.
    pub name: &'static str,
    /// How external textures are addressed.
    pub addressing: TextureAddressing,
    /// GL target used when sampling an id-addressed external texture.
    pub sample_target: u32,
    /// GL target used when rendering into an id-addressed texture.
    pub render_target: u32,
    /// GL sized internal format assumed for id-addressed textures.
    pub gl_format: u32,
    /// Pixel layout assumed for textures wrapped as images.
    pub assumed_color_type: ColorType,
    /// Color space images are tagged with.
    pub color_space: ColorSpace,
}

impl PlatformTraits {
    /// Id-addressed GL platform with external OES sampling.
    pub const ANDROID: Self = Self {
        name: "android",
        addressing: TextureAddressing::Id,
        sample_target: GL_TEXTURE_EXTERNAL_OES,
        render_target: GL_TEXTURE_2D,
        gl_format: GL_RGBA8,
        assumed_color_type: ColorType::Rgba8888,
        color_space: ColorSpace::Srgb,
    };

    /// Pointer-addressed Metal platform.
    pub const IOS: Self = Self {
        name: "ios",
        addressing: TextureAddressing::Pointer,
        sample_target: 0,
        render_target: 0,
        gl_format: 0,
        assumed_color_type: ColorType::Bgra8888,
        color_space: ColorSpace::Srgb,
    };

    /// Desktop hosts: id-addressed plain 2D textures.
    pub const HOST: Self = Self {
        name: "host",
        addressing: TextureAddressing::Id,
        sample_target: GL_TEXTURE_2D,
        render_target: GL_TEXTURE_2D,
        gl_format: GL_RGBA8,
        assumed_color_type: ColorType::Rgba8888,
        color_space: ColorSpace::Srgb,
    };

    /// Traits of the platform this binary was built for.
    pub fn detect() -> Self {
        if cfg!(target_os = "android") {
            Self::ANDROID
        } else if cfg!(any(target_os = "ios", target_os = "tvos")) {
            Self::IOS
        } else {
            Self::HOST
        }
    }
}

impl Default for PlatformTraits {
    fn default() -> Self {
        Self::detect()
    }
}

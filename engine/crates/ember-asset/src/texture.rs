use std::path::Path;

use anyhow::Context;
use ember_gfx::{gfx_context::GfxContext, resources::texture::GfxTexture2D};
use ember_render_interface::{gfx_resource_manager::GfxResourceManager, handles::GfxTextureHandle};

use crate::asset::{Asset, AssetData, AssetKind, has_extension};

/// RGBA8 像素数据，上传后持有 GPU 端的纹理句柄
#[derive(Clone, Debug)]
pub struct TextureAsset {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    gpu: Option<GfxTextureHandle>,
}
// new & init
impl TextureAsset {
    pub const EXTENSIONS: [&'static str; 5] = ["png", "jpg", "jpeg", "bmp", "tga"];

    /// pixels 的长度必须为 width * height * 4
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> anyhow::Result<Self> {
        if width == 0 || height == 0 {
            anyhow::bail!("texture must not be empty: {width}x{height}");
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            anyhow::bail!("texture {width}x{height} expects {expected} bytes, got {}", pixels.len());
        }
        Ok(Self {
            width,
            height,
            pixels,
            gpu: None,
        })
    }

    pub fn from_image_file(path: &Path) -> anyhow::Result<Self> {
        let _span = tracy_client::span!("TextureAsset::from_image_file");
        let img = image::open(path).with_context(|| format!("Failed to decode image: {}", path.display()))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        log::info!("loaded texture {}: {}x{}", path.display(), width, height);
        Self::from_rgba8(width, height, rgba.into_raw())
    }
}
// getters
impl TextureAsset {
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    pub fn gpu(&self) -> Option<GfxTextureHandle> {
        self.gpu
    }
}
// gpu
impl TextureAsset {
    pub fn upload(
        &mut self,
        ctx: &GfxContext,
        resource_manager: &mut GfxResourceManager,
        name: &str,
    ) -> anyhow::Result<GfxTextureHandle> {
        if let Some(handle) = self.gpu {
            return Ok(handle);
        }
        let texture = GfxTexture2D::from_rgba8(ctx, self.width, self.height, &self.pixels, name)?;
        let handle = resource_manager.register_texture(texture);
        self.gpu = Some(handle);
        Ok(handle)
    }

    pub fn release_gpu(&mut self, resource_manager: &mut GfxResourceManager, frame_id: u64) {
        if let Some(handle) = self.gpu.take() {
            resource_manager.destroy_texture(handle, frame_id);
        }
    }
}
impl Asset for TextureAsset {
    const KIND: AssetKind = AssetKind::Texture;

    fn supports_path(path: &Path) -> bool {
        has_extension(path, &Self::EXTENSIONS)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        Self::from_image_file(path)
    }

    fn into_data(self) -> AssetData {
        AssetData::Texture(self)
    }

    fn from_data(data: &AssetData) -> Option<&Self> {
        match data {
            AssetData::Texture(t) => Some(t),
            _ => None,
        }
    }

    fn from_data_mut(data: &mut AssetData) -> Option<&mut Self> {
        match data {
            AssetData::Texture(t) => Some(t),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgba8_validates_length() {
        assert!(TextureAsset::from_rgba8(2, 2, vec![255; 16]).is_ok());
        assert!(TextureAsset::from_rgba8(2, 2, vec![255; 12]).is_err());
        assert!(TextureAsset::from_rgba8(0, 2, vec![]).is_err());
    }

    #[test]
    fn test_decode_png() {
        let dir = std::env::temp_dir().join(uuid::Uuid::new_v4().to_string());
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("checker.png");

        let mut img = image::RgbImage::new(3, 2);
        img.put_pixel(1, 0, image::Rgb([255, 0, 0]));
        img.save(&path).unwrap();

        let tex = TextureAsset::load_from_file(&path).unwrap();
        assert_eq!((tex.width(), tex.height()), (3, 2));
        assert_eq!(tex.pixels().len(), 3 * 2 * 4);
        // 补齐 alpha
        assert_eq!(&tex.pixels()[4..8], &[255, 0, 0, 255]);
        assert!(tex.gpu().is_none());
    }

    #[test]
    fn test_supports_path() {
        assert!(TextureAsset::supports_path(Path::new("a.PNG")));
        assert!(TextureAsset::supports_path(Path::new("a.jpeg")));
        assert!(!TextureAsset::supports_path(Path::new("a.obj")));
    }
}

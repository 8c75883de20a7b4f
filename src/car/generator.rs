#![forbid(unsafe_code)]

use image::RgbaImage;

use crate::car::csi::{Blob, ClassTag, PayloadBody, RenditionFlags, RenditionPayload};
use crate::car::error::{CatalogError, CatalogResult};
use crate::car::format::{Rect, Size};

/// Builds a fresh pixel payload from a canvas plus carried-over metadata.
#[derive(Debug, Clone)]
pub struct RenditionGenerator {
    canvas: Size,
    slice_count: u32,
    layout: u16,
    bitmap: Option<RgbaImage>,
    slices: Vec<Rect>,

    pub tag: ClassTag,
    pub name: String,
    pub blend_mode: u16,
    pub color_space_id: u16,
    pub exif_orientation: u16,
    pub opacity: f32,
    pub scale_factor: u32,
    pub template_rendering_mode: u16,
    pub uti_type: Option<String>,
    pub is_vector_based: bool,
    pub excluded_from_contrast_filter: bool,
}

impl RenditionGenerator {
    /// `None` for an empty canvas or a zero slice count.
    pub fn new(canvas: Size, slice_count: u32, layout: u16) -> Option<Self> {
        if canvas.is_empty() || slice_count == 0 {
            return None;
        }
        Some(Self {
            canvas,
            slice_count,
            layout,
            bitmap: None,
            slices: Vec::new(),
            tag: ClassTag::ThemePixel,
            name: String::new(),
            blend_mode: 0,
            color_space_id: 0,
            exif_orientation: 1,
            opacity: 1.0,
            scale_factor: 1,
            template_rendering_mode: 0,
            uti_type: None,
            is_vector_based: false,
            excluded_from_contrast_filter: false,
        })
    }

    pub fn canvas(&self) -> Size {
        self.canvas
    }

    pub fn add_bitmap(&mut self, bitmap: RgbaImage) {
        self.bitmap = Some(bitmap);
    }

    pub fn add_slice_rect(&mut self, rect: Rect) {
        self.slices.push(rect);
    }

    pub fn payload(&self, compress: bool, zstd_level: i32) -> CatalogResult<RenditionPayload> {
        let bitmap = self
            .bitmap
            .as_ref()
            .ok_or_else(|| CatalogError::Invalid("generator has no bitmap".into()))?;
        if bitmap.dimensions() != (self.canvas.width, self.canvas.height) {
            return Err(CatalogError::Invalid(format!(
                "bitmap is {}x{}, canvas is {}",
                bitmap.width(),
                bitmap.height(),
                self.canvas
            )));
        }
        if self.slices.len() != self.slice_count as usize {
            return Err(CatalogError::Invalid(format!(
                "generator declared {} slices, got {}",
                self.slice_count,
                self.slices.len()
            )));
        }
        if let Some(bad) = self.slices.iter().find(|r| !r.fits_within(self.canvas)) {
            return Err(CatalogError::Invalid(format!(
                "slice {bad} lies outside the {} canvas",
                self.canvas
            )));
        }

        let is_opaque = bitmap.pixels().all(|p| p.0[3] == u8::MAX);
        let body = PayloadBody::Bitmap(Blob::pack(bitmap.as_raw(), compress, zstd_level)?);

        Ok(RenditionPayload {
            tag: self.tag,
            flags: Some(RenditionFlags {
                is_vector_based: self.is_vector_based,
                excluded_from_contrast_filter: self.excluded_from_contrast_filter,
                is_opaque,
            }),
            width: self.canvas.width,
            height: self.canvas.height,
            scale_factor: self.scale_factor,
            layout: self.layout,
            color_space_id: self.color_space_id,
            blend_mode: self.blend_mode,
            opacity: self.opacity,
            exif_orientation: self.exif_orientation,
            template_rendering_mode: self.template_rendering_mode,
            name: self.name.clone(),
            uti: self.uti_type.clone(),
            slices: self.slices.clone(),
            body,
        })
    }

    /// Serialized on-disk form of [`Self::payload`].
    pub fn representation(&self, compress: bool, zstd_level: i32) -> CatalogResult<Vec<u8>> {
        self.payload(compress, zstd_level)?.to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn generator(w: u32, h: u32) -> RenditionGenerator {
        let mut g = RenditionGenerator::new(Size::new(w, h), 1, 12).unwrap();
        g.name = "button.png".into();
        g.scale_factor = 3;
        g.uti_type = Some("public.png".into());
        g.excluded_from_contrast_filter = true;
        g
    }

    #[test]
    fn empty_canvas_is_refused() {
        assert!(RenditionGenerator::new(Size::new(0, 4), 1, 0).is_none());
        assert!(RenditionGenerator::new(Size::new(4, 4), 0, 0).is_none());
    }

    #[test]
    fn carries_metadata_into_payload() {
        let mut g = generator(2, 2);
        g.add_bitmap(RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255])));
        g.add_slice_rect(Rect::new(0, 0, 2, 2));

        let p = RenditionPayload::parse(&g.representation(false, 0).unwrap()).unwrap();
        assert_eq!(p.name, "button.png");
        assert_eq!(p.layout, 12);
        assert_eq!(p.scale_factor, 3);
        assert_eq!(p.uti.as_deref(), Some("public.png"));
        assert!(p.excluded_from_contrast_filter());
        assert!(p.flags.unwrap().is_opaque);
        assert_eq!(p.slices, vec![Rect::new(0, 0, 2, 2)]);
        assert_eq!(p.decode_bitmap().unwrap().unwrap().get_pixel(1, 1).0, [1, 2, 3, 255]);
    }

    #[test]
    fn mismatched_bitmap_or_slices_fail() {
        let mut g = generator(2, 2);
        g.add_slice_rect(Rect::new(0, 0, 2, 2));
        assert!(g.payload(false, 0).is_err());

        g.add_bitmap(RgbaImage::new(3, 2));
        assert!(g.payload(false, 0).is_err());

        g.add_bitmap(RgbaImage::new(2, 2));
        g.add_slice_rect(Rect::new(0, 0, 1, 1));
        assert!(g.payload(false, 0).is_err());
    }

    #[test]
    fn slice_outside_canvas_fails() {
        let mut g = generator(2, 2);
        g.add_bitmap(RgbaImage::new(2, 2));
        g.add_slice_rect(Rect::new(1, 1, 2, 2));
        assert!(g.payload(false, 0).is_err());
    }
}

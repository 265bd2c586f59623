//! Bitmap font rasterization.
//!
//! Rasterizes a TTF font at the requested pixel sizes and codepoint ranges
//! into a `no_std`-compatible Rust source file: a flat byte array per glyph
//! plus a lookup table mapping codepoints to glyph offsets.

use std::fmt::Write as _;
use std::path::Path;

use fontdue::{Font, FontSettings};

use crate::config::{FontSpec, PixelFormat};
use crate::error::CodegenError;

/// Generates the Rust source for `spec`, rasterizing from the TTF at
/// `spec.ttf_path` (resolved relative to `workspace_root`).
///
/// # Errors
///
/// Returns [`CodegenError::FontIo`] if the TTF file can't be read,
/// [`CodegenError::FontLoad`] if fontdue rejects it, or
/// [`CodegenError::InvalidCodepoint`] if a range contains no glyphs.
pub fn generate(spec: &FontSpec, workspace_root: &Path) -> Result<String, CodegenError> {
    let Some(ttf_path) = &spec.ttf_path else {
        return Err(CodegenError::FontLoad(format!(
            "font '{}' has no ttf_path and no embedded fallback is built into this tool",
            spec.name
        )));
    };

    let ttf_bytes = std::fs::read(workspace_root.join(ttf_path))?;
    let font = Font::from_bytes(ttf_bytes, FontSettings::default())
        .map_err(|e| CodegenError::FontLoad(e.to_string()))?;

    let mut glyphs = Vec::new();
    for size in &spec.sizes {
        for range in &spec.ranges {
            let [lo, hi] = *range;
            for codepoint in lo..=hi {
                let Some(ch) = char::from_u32(codepoint) else {
                    return Err(CodegenError::InvalidCodepoint(codepoint));
                };
                let (metrics, bitmap) = font.rasterize(ch, as_px(*size));
                let packed = pack_bitmap(&bitmap, metrics.width, metrics.height, spec.format);
                glyphs.push(Glyph {
                    codepoint,
                    size_px: *size,
                    width: metrics.width as u32,
                    height: metrics.height as u32,
                    advance: metrics.advance_width,
                    data: packed,
                });
            }
        }
    }

    Ok(render_source(spec, &glyphs))
}

#[allow(non_snake_case)]
fn as_px(size: u32) -> f32 {
    size as f32
}

struct Glyph {
    codepoint: u32,
    size_px: u32,
    width: u32,
    height: u32,
    advance: f32,
    data: Vec<u8>,
}

/// Packs an 8-bit coverage bitmap into the requested output format.
fn pack_bitmap(coverage: &[u8], width: usize, height: usize, format: PixelFormat) -> Vec<u8> {
    match format {
        PixelFormat::Grayscale8bpp => coverage.to_vec(),
        PixelFormat::Bitmap1bpp => {
            let stride = width.div_ceil(8);
            let mut out = vec![0u8; stride * height];
            for y in 0..height {
                for x in 0..width {
                    if coverage[y * width + x] >= 128 {
                        out[y * stride + x / 8] |= 0x80 >> (x % 8);
                    }
                }
            }
            out
        }
    }
}

/// Renders the collected glyphs as a `no_std` Rust source module.
fn render_source(spec: &FontSpec, glyphs: &[Glyph]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "//! Generated bitmap font data for `{}`.", spec.name);
    let _ = writeln!(out, "//! Do not edit by hand; run `cargo xtask codegen`.");
    out.push('\n');

    let prefix = spec.name.to_uppercase();
    let _ = writeln!(out, "/// A single rasterized glyph.");
    out.push_str("pub struct Glyph {\n");
    out.push_str("    pub codepoint: u32,\n");
    out.push_str("    pub width: u32,\n");
    out.push_str("    pub height: u32,\n");
    out.push_str("    pub advance: f32,\n");
    out.push_str("    pub data: &'static [u8],\n");
    out.push_str("}\n\n");

    let _ = writeln!(
        out,
        "pub const {prefix}_GLYPH_COUNT: usize = {};",
        glyphs.len()
    );
    out.push('\n');

    let _ = writeln!(out, "pub static {prefix}_GLYPHS: &[Glyph] = &[");
    for g in glyphs {
        out.push_str("    Glyph {\n");
        let _ = writeln!(out, "        codepoint: 0x{:04X}, // size {}px", g.codepoint, g.size_px);
        let _ = writeln!(out, "        width: {},", g.width);
        let _ = writeln!(out, "        height: {},", g.height);
        let _ = writeln!(out, "        advance: {:.3},", g.advance);
        out.push_str("        data: &[");
        for (i, byte) in g.data.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let _ = write!(out, "{byte}");
        }
        out.push_str("],\n");
        out.push_str("    },\n");
    }
    out.push_str("];\n");

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_bitmap1bpp_sets_high_bit_first() {
        // 2x1 coverage, both pixels fully covered.
        let coverage = [255u8, 255u8];
        let packed = pack_bitmap(&coverage, 2, 1, PixelFormat::Bitmap1bpp);
        assert_eq!(packed, vec![0b1100_0000]);
    }

    #[test]
    fn pack_bitmap1bpp_respects_threshold() {
        let coverage = [0u8, 200u8];
        let packed = pack_bitmap(&coverage, 2, 1, PixelFormat::Bitmap1bpp);
        assert_eq!(packed, vec![0b0100_0000]);
    }

    #[test]
    fn pack_grayscale_passes_through() {
        let coverage = [10u8, 20u8, 30u8];
        let packed = pack_bitmap(&coverage, 3, 1, PixelFormat::Grayscale8bpp);
        assert_eq!(packed, vec![10, 20, 30]);
    }

    #[test]
    fn generate_without_ttf_path_errors() {
        let spec = FontSpec {
            name: "console".into(),
            ttf_path: None,
            sizes: vec![16],
            ranges: vec![[0x20, 0x7E]],
            format: PixelFormat::Bitmap1bpp,
            output: "console_font.rs".into(),
        };
        let err = generate(&spec, Path::new(".")).unwrap_err();
        assert!(matches!(err, CodegenError::FontLoad(_)));
    }
}

use crate::error::ExtractionError;
use std::fs;
use std::path::Path;

/// Largest raster a capture may decode to.
pub const MAX_PIXELS: usize = 1 << 26;

/// 8-bit luma raster, row-major, 0 = black ink, 255 = white paper.
#[derive(Debug, Clone, PartialEq)]
pub struct InkImage {
    pub width: usize,
    pub height: usize,
    pub luma: Vec<u8>,
}

/// Binary ink mask produced by thresholding an [`InkImage`].
#[derive(Debug, Clone, PartialEq)]
pub struct InkMask {
    pub width: usize,
    pub height: usize,
    pub ink: Vec<bool>,
}

impl InkMask {
    #[inline(always)]
    pub fn idx(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    #[inline(always)]
    pub fn get(&self, x: usize, y: usize) -> bool {
        self.ink[self.idx(x, y)]
    }

    pub fn ink_count(&self) -> usize {
        self.ink.iter().filter(|&&b| b).count()
    }
}

impl InkImage {
    pub fn from_luma(width: usize, height: usize, luma: Vec<u8>) -> Result<Self, ExtractionError> {
        if width == 0 || height == 0 {
            return Err(ExtractionError::EmptyImage { width, height });
        }
        let expected = width.saturating_mul(height);
        if luma.len() != expected {
            return Err(ExtractionError::BufferSize {
                expected,
                actual: luma.len(),
            });
        }
        Ok(Self {
            width,
            height,
            luma,
        })
    }

    /// Interleaved RGB input, converted with Rec. 601 luma weights.
    pub fn from_rgb(width: usize, height: usize, rgb: &[u8]) -> Result<Self, ExtractionError> {
        let expected = width.saturating_mul(height).saturating_mul(3);
        if rgb.len() != expected {
            return Err(ExtractionError::BufferSize {
                expected,
                actual: rgb.len(),
            });
        }
        let luma = rgb
            .chunks_exact(3)
            .map(|c| {
                let y = 0.299 * c[0] as f64 + 0.587 * c[1] as f64 + 0.114 * c[2] as f64;
                y.round().clamp(0.0, 255.0) as u8
            })
            .collect();
        Self::from_luma(width, height, luma)
    }

    /// A white page.
    pub fn blank(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            luma: vec![255; width * height],
        }
    }

    #[inline(always)]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.luma[y * self.width + x]
    }

    #[inline(always)]
    pub fn set(&mut self, x: usize, y: usize, value: u8) {
        let i = y * self.width + x;
        self.luma[i] = value;
    }

    pub fn histogram(&self) -> [u64; 256] {
        let mut hist = [0u64; 256];
        for &v in &self.luma {
            hist[v as usize] += 1;
        }
        hist
    }

    /// Otsu's method: the threshold maximising between-class variance.
    /// Pixels `<= threshold` are ink. A uniform image yields 0, which marks
    /// nothing as ink unless the image is pure black.
    pub fn otsu_threshold(&self) -> u8 {
        let hist = self.histogram();
        let total = self.luma.len() as f64;
        let sum_all: f64 = hist
            .iter()
            .enumerate()
            .map(|(i, &c)| i as f64 * c as f64)
            .sum();

        let mut sum_bg = 0.0;
        let mut weight_bg = 0.0;
        let mut best_var = -1.0;
        let mut best = 0u8;

        for (t, &count) in hist.iter().enumerate() {
            weight_bg += count as f64;
            if weight_bg == 0.0 {
                continue;
            }
            let weight_fg = total - weight_bg;
            if weight_fg == 0.0 {
                break;
            }
            sum_bg += t as f64 * count as f64;
            let mean_bg = sum_bg / weight_bg;
            let mean_fg = (sum_all - sum_bg) / weight_fg;
            let between = weight_bg * weight_fg * (mean_bg - mean_fg).powi(2);
            if between > best_var {
                best_var = between;
                best = t as u8;
            }
        }
        best
    }

    pub fn binarize(&self, threshold: u8) -> InkMask {
        InkMask {
            width: self.width,
            height: self.height,
            ink: self.luma.iter().map(|&v| v <= threshold).collect(),
        }
    }

    pub fn load_pnm<P: AsRef<Path>>(path: P) -> Result<Self, ExtractionError> {
        let bytes = fs::read(path.as_ref()).map_err(|e| {
            ExtractionError::Decode(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::decode_pnm(&bytes)
    }

    /// Decodes binary or ASCII greymap/pixmap data (P2, P3, P5, P6).
    pub fn decode_pnm(bytes: &[u8]) -> Result<Self, ExtractionError> {
        let mut reader = PnmReader { bytes, pos: 0 };
        let magic = reader.token()?;
        let (binary, channels) = match magic.as_str() {
            "P2" => (false, 1),
            "P3" => (false, 3),
            "P5" => (true, 1),
            "P6" => (true, 3),
            other => {
                return Err(ExtractionError::Decode(format!(
                    "Unsupported PNM magic '{}'",
                    other
                )))
            }
        };
        let width = reader.number()?;
        let height = reader.number()?;
        let max_val = reader.number()?;
        if max_val == 0 || max_val > 255 {
            return Err(ExtractionError::Decode(format!(
                "Unsupported max value {}",
                max_val
            )));
        }

        let count = width
            .checked_mul(height)
            .filter(|&n| n <= MAX_PIXELS)
            .and_then(|n| n.checked_mul(channels))
            .ok_or_else(|| {
                ExtractionError::Decode(format!(
                    "Image size {}x{} is out of range",
                    width, height
                ))
            })?;
        let raw: Vec<u8> = if binary {
            // Exactly one whitespace byte separates the header from the raster.
            let start = reader.pos + 1;
            let end = start + count;
            if end > bytes.len() {
                return Err(ExtractionError::Decode(format!(
                    "Truncated raster: need {} bytes, have {}",
                    count,
                    bytes.len().saturating_sub(start)
                )));
            }
            bytes[start..end].to_vec()
        } else {
            let mut v = Vec::with_capacity(count.min(bytes.len()));
            for _ in 0..count {
                v.push(reader.number()?.min(max_val) as u8);
            }
            v
        };

        let scaled: Vec<u8> = if max_val == 255 {
            raw
        } else {
            raw.iter()
                .map(|&v| ((v as usize * 255) / max_val) as u8)
                .collect()
        };

        if channels == 3 {
            Self::from_rgb(width, height, &scaled)
        } else {
            Self::from_luma(width, height, scaled)
        }
    }

    /// Binary greymap (P5) encoding.
    pub fn encode_pgm(&self) -> Vec<u8> {
        let mut out = format!("P5\n{} {}\n255\n", self.width, self.height).into_bytes();
        out.extend_from_slice(&self.luma);
        out
    }
}

struct PnmReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl PnmReader<'_> {
    fn skip_space_and_comments(&mut self) {
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            if b == b'#' {
                while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
                    self.pos += 1;
                }
            } else if b.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn token(&mut self) -> Result<String, ExtractionError> {
        self.skip_space_and_comments();
        let start = self.pos;
        while self.pos < self.bytes.len() && !self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(ExtractionError::Decode("Unexpected end of header".into()));
        }
        Ok(String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned())
    }

    fn number(&mut self) -> Result<usize, ExtractionError> {
        let tok = self.token()?;
        tok.parse()
            .map_err(|_| ExtractionError::Decode(format!("Invalid number '{}'", tok)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otsu_splits_bimodal() {
        let mut luma = vec![240u8; 50];
        luma.extend(vec![20u8; 50]);
        let img = InkImage::from_luma(10, 10, luma).unwrap();
        let t = img.otsu_threshold();
        assert!((20..240).contains(&t));
        assert_eq!(img.binarize(t).ink_count(), 50);
    }

    #[test]
    fn test_pgm_roundtrip_header() {
        let mut img = InkImage::blank(3, 2);
        img.set(1, 1, 0);
        let decoded = InkImage::decode_pnm(&img.encode_pgm()).unwrap();
        assert_eq!(decoded, img);
    }

    #[test]
    fn test_ascii_pixmap_with_comment() {
        let data = b"P3\n# tiny\n2 1\n255\n255 255 255 0 0 0\n";
        let img = InkImage::decode_pnm(data).unwrap();
        assert_eq!(img.luma, vec![255, 0]);
    }

    #[test]
    fn test_rejects_oversized_header() {
        for data in [
            &b"P5\n4294967296 4294967296\n255\n\0"[..],
            &b"P2\n18446744073709551615 2\n255\n0 0\n"[..],
            &b"P6\n10000 10000\n255\n\0"[..],
        ] {
            let err = InkImage::decode_pnm(data).unwrap_err();
            assert!(matches!(err, ExtractionError::Decode(_)), "{:?}", err);
        }
    }

    #[test]
    fn test_truncated_raster_is_an_error() {
        let err = InkImage::decode_pnm(b"P5\n4 4\n255\n\0\0").unwrap_err();
        assert!(matches!(err, ExtractionError::Decode(_)));
    }

    #[test]
    fn test_rejects_wrong_buffer() {
        let err = InkImage::from_luma(4, 4, vec![0; 3]).unwrap_err();
        assert!(matches!(err, ExtractionError::BufferSize { expected: 16, actual: 3 }));
    }
}

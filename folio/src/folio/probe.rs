use std::future::Future;
use std::io::Cursor;
use std::time::Duration;

use image::ImageReader;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::folio::notion::ImageDimensions;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("fetching image {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("image {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("could not read dimensions of {url} from the first {read} bytes")]
    Undecodable { url: String, read: usize },
}

/// Anything that can tell the pixel size of a remote image.
pub trait ImageProbe {
    fn probe(&self, url: &str) -> impl Future<Output = anyhow::Result<ImageDimensions>> + Send;
}

/// Reads only as much of an image as its header needs.
#[derive(Clone)]
pub struct ImageProber {
    http: reqwest::Client,
    max_bytes: usize,
}

impl ImageProber {
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("folio/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { http, max_bytes })
    }

    pub async fn probe_url(&self, url: &str) -> Result<ImageDimensions, ProbeError> {
        let http_err = |source| ProbeError::Http {
            url: url.to_string(),
            source,
        };

        let mut response = self.http.get(url).send().await.map_err(http_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut buf: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(http_err)? {
            let room = self.max_bytes.saturating_sub(buf.len());
            buf.extend_from_slice(&chunk[..chunk.len().min(room)]);

            if let Some(dimensions) = dimensions_from_prefix(&buf) {
                debug!(
                    "probed {url}: {}x{} after {} bytes",
                    dimensions.width,
                    dimensions.height,
                    buf.len()
                );
                return Ok(dimensions);
            }

            if buf.len() >= self.max_bytes {
                break;
            }
        }

        Err(ProbeError::Undecodable {
            url: url.to_string(),
            read: buf.len(),
        })
    }
}

impl ImageProbe for ImageProber {
    async fn probe(&self, url: &str) -> anyhow::Result<ImageDimensions> {
        Ok(self.probe_url(url).await?)
    }
}

static SVG_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<svg\b[^>]*>").expect("svg tag regex"));
static SVG_WIDTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|\s)width\s*=\s*["']\s*([0-9.]+)(?:px)?\s*["']"#).expect("svg width regex")
});
static SVG_HEIGHT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|\s)height\s*=\s*["']\s*([0-9.]+)(?:px)?\s*["']"#).expect("svg height regex")
});
static SVG_VIEWBOX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|\s)viewBox\s*=\s*["']\s*[-0-9.]+[\s,]+[-0-9.]+[\s,]+([0-9.]+)[\s,]+([0-9.]+)\s*["']"#)
        .expect("svg viewBox regex")
});

/// ISOBMFF brands whose still-image size lives in an `ispe` property box.
const HEIF_BRANDS: [&[u8; 4]; 6] = [b"avif", b"avis", b"heic", b"heix", b"mif1", b"msf1"];

/// Width and height from a (possibly truncated) encoded image, if the header is complete.
///
/// Raster formats go through the `image` crate; SVG and AVIF/HEIC headers are
/// read directly since `image` cannot size them.
pub fn dimensions_from_prefix(bytes: &[u8]) -> Option<ImageDimensions> {
    if bytes.is_empty() {
        return None;
    }

    raster_dimensions(bytes)
        .or_else(|| heif_dimensions(bytes))
        .or_else(|| svg_dimensions(bytes))
}

fn raster_dimensions(bytes: &[u8]) -> Option<ImageDimensions> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    reader.format()?;

    let (width, height) = reader.into_dimensions().ok()?;
    Some(ImageDimensions { width, height })
}

fn heif_dimensions(bytes: &[u8]) -> Option<ImageDimensions> {
    let brand = bytes.get(8..12)?;
    if bytes.get(4..8)? != b"ftyp" || !HEIF_BRANDS.iter().any(|b| &b[..] == brand) {
        return None;
    }

    // ispe payload: version/flags (4 bytes), then big-endian width and height.
    let at = bytes.windows(4).position(|w| w == b"ispe")?;
    let read_u32 = |offset: usize| -> Option<u32> {
        let raw: [u8; 4] = bytes.get(at + offset..at + offset + 4)?.try_into().ok()?;
        Some(u32::from_be_bytes(raw))
    };
    let (width, height) = (read_u32(8)?, read_u32(12)?);
    (width > 0 && height > 0).then_some(ImageDimensions { width, height })
}

fn svg_dimensions(bytes: &[u8]) -> Option<ImageDimensions> {
    let text = String::from_utf8_lossy(bytes);
    let tag = SVG_TAG_RE.find(&text)?.as_str();

    let width = svg_length(&SVG_WIDTH_RE, tag);
    let height = svg_length(&SVG_HEIGHT_RE, tag);
    let view_box = SVG_VIEWBOX_RE.captures(tag).and_then(|caps| {
        let w = caps.get(1)?.as_str().parse::<f64>().ok()?;
        let h = caps.get(2)?.as_str().parse::<f64>().ok()?;
        (w > 0.0 && h > 0.0).then_some((w, h))
    });

    let (width, height) = match (width, height, view_box) {
        (Some(w), Some(h), _) => (w, h),
        (Some(w), None, Some((vw, vh))) => (w, w * vh / vw),
        (None, Some(h), Some((vw, vh))) => (h * vw / vh, h),
        (None, None, Some(size)) => size,
        _ => return None,
    };

    Some(ImageDimensions {
        width: width.round() as u32,
        height: height.round() as u32,
    })
}

fn svg_length(re: &Regex, tag: &str) -> Option<f64> {
    re.captures(tag)?
        .get(1)?
        .as_str()
        .parse::<f64>()
        .ok()
        .filter(|n| *n > 0.0)
}

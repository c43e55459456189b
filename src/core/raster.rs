//! GeoTIFF access for the reducer: georeferencing, world-to-pixel windows and
//! band reads restricted to a window.
//!
//! Only the strips or tiles that intersect the requested window are decoded,
//! which is what makes Cloud-Optimized GeoTIFFs cheap to sample.

use crate::domain::model::{PixelWindow, ReprojectedBounds};
use crate::utils::error::{Result, StatsError};
use ndarray::Array2;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const PLANAR_CONFIG_SEPARATE: u16 = 2;

/// Affine pixel → world mapping in GDAL coefficient order:
/// `x = c + a*col + b*row`, `y = f + d*col + e*row`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl GeoTransform {
    /// North-up transform from an upper-left origin and positive pixel sizes.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            a: pixel_width,
            b: 0.0,
            c: origin_x,
            d: 0.0,
            e: -pixel_height,
            f: origin_y,
        }
    }

    fn from_scale_and_tiepoint(scale: &[f64], tiepoint: &[f64]) -> Option<Self> {
        if scale.len() < 2 || tiepoint.len() < 6 {
            return None;
        }
        let (sx, sy) = (scale[0], scale[1]);
        let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
        Some(Self {
            a: sx,
            b: 0.0,
            c: x - i * sx,
            d: 0.0,
            e: -sy,
            f: y + j * sy,
        })
    }

    fn from_model_transformation(m: &[f64]) -> Option<Self> {
        if m.len() < 16 {
            return None;
        }
        Some(Self {
            a: m[0],
            b: m[1],
            c: m[3],
            d: m[4],
            e: m[5],
            f: m[7],
        })
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.e - self.b * self.d
    }

    /// World → fractional (col, row).
    pub fn world_to_pixel(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return Err(StatsError::compute("geotransform is not invertible"));
        }
        let dx = x - self.c;
        let dy = y - self.f;
        let col = (self.e * dx - self.b * dy) / det;
        let row = (self.a * dy - self.d * dx) / det;
        Ok((col, row))
    }

    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.c + self.a * col + self.b * row,
            self.f + self.d * col + self.e * row,
        )
    }
}

/// An opened GeoTIFF file.
pub struct GeoTiffRaster {
    path: PathBuf,
    decoder: Decoder<BufReader<File>>,
    width: u32,
    height: u32,
    samples_per_pixel: u16,
    planar_config: u16,
    transform: GeoTransform,
    epsg: Option<u16>,
}

impl std::fmt::Debug for GeoTiffRaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoTiffRaster")
            .field("path", &self.path)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("samples_per_pixel", &self.samples_per_pixel)
            .field("transform", &self.transform)
            .field("epsg", &self.epsg)
            .finish()
    }
}

impl GeoTiffRaster {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| StatsError::raster_io(&path, e.to_string()))?;
        let mut decoder = Decoder::new(BufReader::new(file))
            .map_err(|e| StatsError::raster_io(&path, e.to_string()))?;

        let (width, height) = decoder.dimensions()?;
        let samples_per_pixel = decoder
            .find_tag_unsigned::<u16>(Tag::SamplesPerPixel)?
            .unwrap_or(1);
        let planar_config = decoder
            .find_tag_unsigned::<u16>(Tag::PlanarConfiguration)?
            .unwrap_or(1);

        let transform = Self::read_transform(&mut decoder)?
            .ok_or_else(|| StatsError::raster_io(&path, "no georeferencing tags found"))?;
        let epsg = Self::read_epsg(&mut decoder)?;

        tracing::debug!(
            "Opened raster {} ({}x{}, {} band(s), EPSG:{:?})",
            path.display(),
            width,
            height,
            samples_per_pixel,
            epsg
        );

        Ok(Self {
            path,
            decoder,
            width,
            height,
            samples_per_pixel,
            planar_config,
            transform,
            epsg,
        })
    }

    fn read_transform(decoder: &mut Decoder<BufReader<File>>) -> Result<Option<GeoTransform>> {
        if let Some(matrix) = decoder.find_tag(Tag::ModelTransformationTag)? {
            return Ok(GeoTransform::from_model_transformation(&matrix.into_f64_vec()?));
        }

        let scale = decoder.find_tag(Tag::ModelPixelScaleTag)?;
        let tiepoint = decoder.find_tag(Tag::ModelTiepointTag)?;
        match (scale, tiepoint) {
            (Some(scale), Some(tiepoint)) => Ok(GeoTransform::from_scale_and_tiepoint(
                &scale.into_f64_vec()?,
                &tiepoint.into_f64_vec()?,
            )),
            _ => Ok(None),
        }
    }

    fn read_epsg(decoder: &mut Decoder<BufReader<File>>) -> Result<Option<u16>> {
        let keys = match decoder.find_tag(Tag::GeoKeyDirectoryTag)? {
            Some(value) => value.into_u16_vec()?,
            None => return Ok(None),
        };

        // header (4) then entries of (key, location, count, value); location 0 = inline
        let mut projected = None;
        let mut geographic = None;
        for entry in keys.get(4..).unwrap_or_default().chunks_exact(4) {
            if entry[1] != 0 {
                continue;
            }
            match entry[0] {
                PROJECTED_CS_TYPE_GEO_KEY => projected = Some(entry[3]),
                GEOGRAPHIC_TYPE_GEO_KEY => geographic = Some(entry[3]),
                _ => {}
            }
        }
        Ok(projected.or(geographic))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn band_count(&self) -> u16 {
        self.samples_per_pixel
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// EPSG code declared in the GeoKey directory, if any.
    pub fn epsg(&self) -> Option<u16> {
        self.epsg
    }

    /// Pixel rectangle covering `bounds`, clipped to the raster extent.
    pub fn window_for_bounds(&self, bounds: &ReprojectedBounds) -> Result<PixelWindow> {
        window_from_bounds(bounds, &self.transform, self.width, self.height)
    }

    /// Reads band `band` (1-based) restricted to `window` as a `height x width` array.
    pub fn read_band_window(&mut self, band: u16, window: &PixelWindow) -> Result<Array2<f64>> {
        if band == 0 || band > self.samples_per_pixel {
            return Err(StatsError::raster_io(
                &self.path,
                format!("band {} out of range 1..={}", band, self.samples_per_pixel),
            ));
        }
        if window.col_end() > self.width as usize || window.row_end() > self.height as usize {
            return Err(StatsError::compute(format!(
                "window {:?} exceeds raster size {}x{}",
                window, self.width, self.height
            )));
        }
        if window.is_empty() {
            return Ok(Array2::zeros((window.height, window.width)));
        }

        let (chunk_w, chunk_h) = self.decoder.chunk_dimensions();
        let (chunk_w, chunk_h) = (chunk_w as usize, chunk_h as usize);
        if chunk_w == 0 || chunk_h == 0 {
            return Err(StatsError::raster_io(&self.path, "zero-sized tiles or strips"));
        }

        let width = self.width as usize;
        let height = self.height as usize;
        let chunks_across = width.div_ceil(chunk_w);
        let chunks_down = height.div_ceil(chunk_h);

        let separate = self.planar_config == PLANAR_CONFIG_SEPARATE;
        let (plane_offset, spp, sample) = if separate {
            ((band as usize - 1) * chunks_across * chunks_down, 1, 0)
        } else {
            (0, self.samples_per_pixel as usize, band as usize - 1)
        };

        let mut out = Array2::<f64>::zeros((window.height, window.width));

        let first_cx = window.col_off / chunk_w;
        let last_cx = (window.col_end() - 1) / chunk_w;
        let first_cy = window.row_off / chunk_h;
        let last_cy = (window.row_end() - 1) / chunk_h;

        for cy in first_cy..=last_cy {
            for cx in first_cx..=last_cx {
                let index = plane_offset + cy * chunks_across + cx;
                let data = to_f64_samples(self.decoder.read_chunk(index as u32)?)
                    .map_err(|msg| StatsError::raster_io(&self.path, msg))?;

                let x0 = cx * chunk_w;
                let y0 = cy * chunk_h;
                let data_w = chunk_w.min(width - x0);
                let data_h = chunk_h.min(height - y0);
                // edge tiles may come back padded to the full tile size
                let stride = if data.len() == chunk_w * chunk_h * spp {
                    chunk_w
                } else {
                    data_w
                };
                if data.len() < (data_h - 1) * stride * spp + data_w * spp {
                    return Err(StatsError::raster_io(
                        &self.path,
                        format!("chunk {} is shorter than expected", index),
                    ));
                }

                let col_from = window.col_off.max(x0);
                let col_to = window.col_end().min(x0 + data_w);
                let row_from = window.row_off.max(y0);
                let row_to = window.row_end().min(y0 + data_h);

                for row in row_from..row_to {
                    let src_row = (row - y0) * stride;
                    for col in col_from..col_to {
                        let src = (src_row + (col - x0)) * spp + sample;
                        out[[row - window.row_off, col - window.col_off]] = data[src];
                    }
                }
            }
        }

        Ok(out)
    }
}

/// Covering pixel window for a world-space box: floor the start, ceil the end,
/// then clip to `width x height`. Degenerate boxes select nothing.
pub fn window_from_bounds(
    bounds: &ReprojectedBounds,
    transform: &GeoTransform,
    width: u32,
    height: u32,
) -> Result<PixelWindow> {
    let corners = [
        (bounds.minx, bounds.maxy),
        (bounds.maxx, bounds.maxy),
        (bounds.maxx, bounds.miny),
        (bounds.minx, bounds.miny),
    ];

    let mut col_min = f64::INFINITY;
    let mut col_max = f64::NEG_INFINITY;
    let mut row_min = f64::INFINITY;
    let mut row_max = f64::NEG_INFINITY;
    for (x, y) in corners {
        let (col, row) = transform.world_to_pixel(x, y)?;
        col_min = col_min.min(col);
        col_max = col_max.max(col);
        row_min = row_min.min(row);
        row_max = row_max.max(row);
    }

    if !(col_min.is_finite() && col_max.is_finite() && row_min.is_finite() && row_max.is_finite())
    {
        return Err(StatsError::compute(format!(
            "bounds {:?} do not map to finite pixel coordinates",
            bounds
        )));
    }
    if col_max - col_min <= 0.0 || row_max - row_min <= 0.0 {
        return Ok(PixelWindow::empty());
    }

    let col_start = col_min.floor().clamp(0.0, width as f64) as usize;
    let col_stop = col_max.ceil().clamp(0.0, width as f64) as usize;
    let row_start = row_min.floor().clamp(0.0, height as f64) as usize;
    let row_stop = row_max.ceil().clamp(0.0, height as f64) as usize;

    if col_stop <= col_start || row_stop <= row_start {
        return Ok(PixelWindow::empty());
    }

    Ok(PixelWindow::new(
        col_start,
        row_start,
        col_stop - col_start,
        row_stop - row_start,
    ))
}

fn to_f64_samples(result: DecodingResult) -> std::result::Result<Vec<f64>, String> {
    Ok(match result {
        DecodingResult::U8(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::U16(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::U32(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::U64(data) => data.into_iter().map(|v| v as f64).collect(),
        DecodingResult::I8(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::I16(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::I32(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::I64(data) => data.into_iter().map(|v| v as f64).collect(),
        DecodingResult::F32(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::F64(data) => data,
        #[allow(unreachable_patterns)]
        _ => return Err("unsupported sample format".to_string()),
    })
}

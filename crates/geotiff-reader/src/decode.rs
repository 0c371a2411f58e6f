//! TIFF decoding into a [`Raster`].

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use ndarray::Array2;
use num_traits::ToPrimitive;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tiff::ColorType;
use tracing::{debug, warn};

use crate::error::{RasterError, Result};
use crate::geokeys::crs_from_directory;
use crate::geotransform::GeoTransform;
use crate::raster::Raster;

/// ExtraSamples values marking an alpha channel.
const ASSOCIATED_ALPHA: u16 = 1;
const UNASSOCIATED_ALPHA: u16 = 2;

/// Read a GeoTIFF file into memory.
pub fn read_raster(path: impl AsRef<Path>) -> Result<Raster> {
    let path = path.as_ref();
    let file = File::open(path)?;
    debug!(path = %path.display(), "Decoding raster");
    decode(BufReader::new(file))
}

/// Read a GeoTIFF held in a byte buffer.
pub fn read_raster_from_buffer(data: &[u8]) -> Result<Raster> {
    decode(Cursor::new(data))
}

fn decode<R: Read + Seek>(reader: R) -> Result<Raster> {
    let mut decoder = Decoder::new(reader)?.with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions()?;
    let (width, height) = (width as usize, height as usize);
    let colortype = decoder.colortype()?;

    // Tags must be read before the image data consumes the decoder state.
    let extra_samples = decoder.get_tag_u16_vec(Tag::ExtraSamples).ok();
    let transform = read_transform(&mut decoder);
    let crs = decoder
        .get_tag_u16_vec(Tag::GeoKeyDirectoryTag)
        .ok()
        .and_then(|dir| crs_from_directory(&dir));

    let values = to_f32(decoder.read_image()?)?;

    let pixels = width * height;
    if pixels == 0 || values.len() % pixels != 0 {
        return Err(RasterError::InvalidDimensions {
            width,
            height,
            samples: values.len(),
        });
    }
    let samples = values.len() / pixels;

    let bands = (0..samples)
        .map(|s| Array2::from_shape_fn((height, width), |(r, c)| values[(r * width + c) * samples + s]))
        .collect();

    let alpha = alpha_index(samples, colortype, extra_samples.as_deref());

    Ok(Raster {
        width,
        height,
        bands,
        alpha,
        transform,
        crs,
    })
}

/// Position of the alpha sample, if the file declares one.
///
/// ExtraSamples is authoritative when present; otherwise colour types that
/// carry alpha by definition (RGBA, GrayA) mark the last sample.
fn alpha_index(samples: usize, colortype: ColorType, extra: Option<&[u16]>) -> Option<usize> {
    match extra {
        Some(extra) if extra.len() <= samples => extra
            .iter()
            .position(|v| *v == ASSOCIATED_ALPHA || *v == UNASSOCIATED_ALPHA)
            .map(|pos| samples - extra.len() + pos),
        Some(_) => None,
        None => matches!(colortype, ColorType::RGBA(_) | ColorType::GrayA(_))
            .then(|| samples - 1),
    }
}

fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> GeoTransform {
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok();
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok();

    match scale
        .zip(tiepoint)
        .and_then(|(s, t)| GeoTransform::from_tags(&s, &t))
    {
        Some(transform) => transform,
        None => {
            warn!("Raster has no georeferencing tags, using pixel coordinates");
            GeoTransform::identity()
        }
    }
}

fn cast_all<T: ToPrimitive>(buf: Vec<T>) -> Vec<f32> {
    buf.into_iter()
        .map(|v| v.to_f32().unwrap_or(f32::NAN))
        .collect()
}

fn to_f32(result: DecodingResult) -> Result<Vec<f32>> {
    #[allow(unreachable_patterns)]
    let values = match result {
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        DecodingResult::U64(buf) => cast_all(buf),
        DecodingResult::I8(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        DecodingResult::I64(buf) => cast_all(buf),
        DecodingResult::F32(buf) => buf,
        DecodingResult::F64(buf) => cast_all(buf),
        _ => {
            return Err(RasterError::UnsupportedFormat(
                "unsupported TIFF sample type".to_string(),
            ))
        }
    };
    Ok(values)
}

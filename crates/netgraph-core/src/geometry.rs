//! Line geometry.
//!
//! The validator only needs three things from a geometry value: its shape,
//! its endpoints and its length. [`GeometryService`] is that seam.
//! [`WkbGeometry`] is the built-in implementation; it reads SpatiaLite
//! internal blobs, ISO and extended WKB, and WKT text.

use std::fmt;

use rusqlite::types::Value;
use serde::Serialize;

use crate::graph::Coord;

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

/// OGC geometry class of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShapeKind {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
}

impl ShapeKind {
    const fn from_class(class: u32) -> Option<Self> {
        Some(match class {
            1 => Self::Point,
            2 => Self::LineString,
            3 => Self::Polygon,
            4 => Self::MultiPoint,
            5 => Self::MultiLineString,
            6 => Self::MultiPolygon,
            7 => Self::GeometryCollection,
            _ => return None,
        })
    }

    fn from_keyword(word: &str) -> Option<Self> {
        const KEYWORDS: [(&str, ShapeKind); 7] = [
            ("POINT", ShapeKind::Point),
            ("LINESTRING", ShapeKind::LineString),
            ("POLYGON", ShapeKind::Polygon),
            ("MULTIPOINT", ShapeKind::MultiPoint),
            ("MULTILINESTRING", ShapeKind::MultiLineString),
            ("MULTIPOLYGON", ShapeKind::MultiPolygon),
            ("GEOMETRYCOLLECTION", ShapeKind::GeometryCollection),
        ];
        KEYWORDS
            .iter()
            .find(|(kw, _)| kw.eq_ignore_ascii_case(word))
            .map(|(_, kind)| *kind)
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Point => "POINT",
            Self::LineString => "LINESTRING",
            Self::Polygon => "POLYGON",
            Self::MultiPoint => "MULTIPOINT",
            Self::MultiLineString => "MULTILINESTRING",
            Self::MultiPolygon => "MULTIPOLYGON",
            Self::GeometryCollection => "GEOMETRYCOLLECTION",
        })
    }
}

/// Coordinate dimensions carried by every point of a geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dims {
    pub z: bool,
    pub m: bool,
}

impl Dims {
    const fn width(self) -> usize {
        2 + self.z as usize + self.m as usize
    }
}

// ---------------------------------------------------------------------------
// Points and lines
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
    pub m: Option<f64>,
}

impl Point {
    #[must_use]
    pub const fn xy(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            z: None,
            m: None,
        }
    }

    #[must_use]
    pub const fn coord(self) -> Coord {
        Coord::new(self.x, self.y)
    }
}

/// An ordered point sequence.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LineString {
    pub points: Vec<Point>,
}

impl LineString {
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    #[must_use]
    pub fn start(&self) -> Option<Coord> {
        self.points.first().copied().map(Point::coord)
    }

    #[must_use]
    pub fn end(&self) -> Option<Coord> {
        self.points.last().copied().map(Point::coord)
    }

    /// Planar length over x/y.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| (w[1].x - w[0].x).hypot(w[1].y - w[0].y))
            .sum()
    }

    /// The same line walked backwards. Each point keeps its z and m.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            points: self.points.iter().rev().copied().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Geometry capabilities the validator relies on.
pub trait GeometryService {
    /// Shape class of `value`, or `None` if it is not a geometry.
    fn shape_kind(&self, value: &Value) -> Option<ShapeKind>;

    /// `value` as a line, or `None` if it is not a LINESTRING.
    fn line(&self, value: &Value) -> Option<LineString>;
}

/// Decoder for SpatiaLite blobs, ISO/extended WKB and WKT.
#[derive(Debug, Clone, Copy, Default)]
pub struct WkbGeometry;

impl GeometryService for WkbGeometry {
    fn shape_kind(&self, value: &Value) -> Option<ShapeKind> {
        match value {
            Value::Blob(bytes) => blob_header(bytes).map(|h| h.kind),
            Value::Text(text) => wkt_header(text).map(|(kind, _, _)| kind),
            _ => None,
        }
    }

    fn line(&self, value: &Value) -> Option<LineString> {
        match value {
            Value::Blob(bytes) => {
                let header = blob_header(bytes)?;
                if header.kind != ShapeKind::LineString {
                    return None;
                }
                let mut cursor = header.body;
                if header.compressed {
                    cursor.compressed_line(header.dims)
                } else {
                    cursor.line(header.dims)
                }
            }
            Value::Text(text) => parse_wkt_line(text),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Binary decoding
// ---------------------------------------------------------------------------

const SPATIALITE_START: u8 = 0x00;
const SPATIALITE_MBR_END: u8 = 0x7C;
const SPATIALITE_END: u8 = 0xFE;
const SPATIALITE_HEADER_LEN: usize = 43;

const EWKB_Z: u32 = 0x8000_0000;
const EWKB_M: u32 = 0x4000_0000;
const EWKB_SRID: u32 = 0x2000_0000;

/// SpatiaLite classes at or above this value store compressed coordinates.
const SPATIALITE_COMPRESSED: u32 = 1_000_000;

struct BlobHeader<'a> {
    kind: ShapeKind,
    dims: Dims,
    compressed: bool,
    body: Cursor<'a>,
}

#[derive(Clone, Copy)]
struct Cursor<'a> {
    bytes: &'a [u8],
    little_endian: bool,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.bytes.len() < n {
            return None;
        }
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        Some(head)
    }

    fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    fn u32(&mut self) -> Option<u32> {
        let raw: [u8; 4] = self.take(4)?.try_into().ok()?;
        Some(if self.little_endian {
            u32::from_le_bytes(raw)
        } else {
            u32::from_be_bytes(raw)
        })
    }

    fn f64(&mut self) -> Option<f64> {
        let raw: [u8; 8] = self.take(8)?.try_into().ok()?;
        Some(if self.little_endian {
            f64::from_le_bytes(raw)
        } else {
            f64::from_be_bytes(raw)
        })
    }

    fn f32(&mut self) -> Option<f64> {
        let raw: [u8; 4] = self.take(4)?.try_into().ok()?;
        Some(f64::from(if self.little_endian {
            f32::from_le_bytes(raw)
        } else {
            f32::from_be_bytes(raw)
        }))
    }

    fn point(&mut self, dims: Dims) -> Option<Point> {
        let x = self.f64()?;
        let y = self.f64()?;
        let z = if dims.z { Some(self.f64()?) } else { None };
        let m = if dims.m { Some(self.f64()?) } else { None };
        Some(Point { x, y, z, m })
    }

    fn line(&mut self, dims: Dims) -> Option<LineString> {
        let count = usize::try_from(self.u32()?).ok()?;
        // Reject counts the remaining bytes cannot possibly hold.
        if count.checked_mul(dims.width() * 8)? > self.bytes.len() {
            return None;
        }
        let points = (0..count)
            .map(|_| self.point(dims))
            .collect::<Option<Vec<_>>>()?;
        Some(LineString::new(points))
    }

    /// SpatiaLite compressed line: the first and last points are full
    /// doubles; every point in between stores f32 offsets from its
    /// predecessor for x, y and z, while m stays a full double.
    fn compressed_line(&mut self, dims: Dims) -> Option<LineString> {
        let count = usize::try_from(self.u32()?).ok()?;
        let full = dims.width() * 8;
        let delta = (2 + usize::from(dims.z)) * 4 + if dims.m { 8 } else { 0 };
        let needed = match count {
            0 => 0,
            1 => full,
            n => (n - 2).checked_mul(delta)?.checked_add(2 * full)?,
        };
        if needed > self.bytes.len() {
            return None;
        }

        let mut points: Vec<Point> = Vec::with_capacity(count);
        for i in 0..count {
            let point = if i == 0 || i + 1 == count {
                self.point(dims)?
            } else {
                let prev = points[i - 1];
                let x = prev.x + self.f32()?;
                let y = prev.y + self.f32()?;
                let z = if dims.z {
                    Some(prev.z.unwrap_or_default() + self.f32()?)
                } else {
                    None
                };
                let m = if dims.m { Some(self.f64()?) } else { None };
                Point { x, y, z, m }
            };
            points.push(point);
        }
        Some(LineString::new(points))
    }
}

fn blob_header(bytes: &[u8]) -> Option<BlobHeader<'_>> {
    if is_spatialite_blob(bytes) {
        spatialite_header(bytes)
    } else {
        wkb_header(bytes)
    }
}

fn is_spatialite_blob(bytes: &[u8]) -> bool {
    bytes.len() > SPATIALITE_HEADER_LEN
        && bytes[0] == SPATIALITE_START
        && matches!(bytes[1], 0x00 | 0x01)
        && bytes[38] == SPATIALITE_MBR_END
        && bytes[bytes.len() - 1] == SPATIALITE_END
}

/// SpatiaLite internal format: start, endian, srid, mbr, 0x7C, class, body, 0xFE.
fn spatialite_header(bytes: &[u8]) -> Option<BlobHeader<'_>> {
    let mut cursor = Cursor {
        bytes: &bytes[39..bytes.len() - 1],
        little_endian: bytes[1] == 0x01,
    };
    let class = cursor.u32()?;
    let compressed = match class / SPATIALITE_COMPRESSED {
        0 => false,
        1 => true,
        _ => return None,
    };
    let (base, dims) = split_iso_class(class % SPATIALITE_COMPRESSED)?;
    let kind = ShapeKind::from_class(base)?;
    // Only LINESTRING and POLYGON have compressed classes.
    if compressed && !matches!(kind, ShapeKind::LineString | ShapeKind::Polygon) {
        return None;
    }
    Some(BlobHeader {
        kind,
        dims,
        compressed,
        body: cursor,
    })
}

fn wkb_header(bytes: &[u8]) -> Option<BlobHeader<'_>> {
    let mut cursor = Cursor {
        bytes,
        little_endian: true,
    };
    cursor.little_endian = match cursor.u8()? {
        0x00 => false,
        0x01 => true,
        _ => return None,
    };
    let raw = cursor.u32()?;
    let ewkb_dims = Dims {
        z: raw & EWKB_Z != 0,
        m: raw & EWKB_M != 0,
    };
    if raw & EWKB_SRID != 0 {
        cursor.u32()?;
    }
    let class = raw & 0x0FFF_FFFF;
    let (base, iso_dims) = split_iso_class(class)?;
    Some(BlobHeader {
        kind: ShapeKind::from_class(base)?,
        dims: Dims {
            z: ewkb_dims.z || iso_dims.z,
            m: ewkb_dims.m || iso_dims.m,
        },
        compressed: false,
        body: cursor,
    })
}

/// Split an ISO class code (`1002` = LINESTRING Z) into base class and dims.
const fn split_iso_class(class: u32) -> Option<(u32, Dims)> {
    let dims = match class / 1000 {
        0 => Dims { z: false, m: false },
        1 => Dims { z: true, m: false },
        2 => Dims { z: false, m: true },
        3 => Dims { z: true, m: true },
        _ => return None,
    };
    Some((class % 1000, dims))
}

// ---------------------------------------------------------------------------
// WKT
// ---------------------------------------------------------------------------

/// Shape keyword, dims and the remaining text after the keyword.
fn wkt_header(text: &str) -> Option<(ShapeKind, Dims, &str)> {
    let mut text = text.trim();
    if text.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("SRID=")) {
        let (_, rest) = text.split_once(';')?;
        text = rest.trim_start();
    }
    let split = text
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(text.len());
    let (word, mut rest) = text.split_at(split);

    let mut dims = Dims::default();
    let kind = if let Some(kind) = ShapeKind::from_keyword(word) {
        kind
    } else {
        let (base, suffix) = strip_dims_suffix(word)?;
        dims = suffix;
        ShapeKind::from_keyword(base)?
    };

    rest = rest.trim_start();
    let modifier_len = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    if modifier_len > 0 {
        dims = match rest[..modifier_len].to_ascii_uppercase().as_str() {
            "Z" => Dims { z: true, m: false },
            "M" => Dims { z: false, m: true },
            "ZM" => Dims { z: true, m: true },
            "EMPTY" => dims,
            _ => return None,
        };
        if !rest[..modifier_len].eq_ignore_ascii_case("EMPTY") {
            rest = &rest[modifier_len..];
        }
    }
    Some((kind, dims, rest.trim_start()))
}

/// `LINESTRINGZ` style keywords with the dimension glued on.
fn strip_dims_suffix(word: &str) -> Option<(&str, Dims)> {
    let upper = word.to_ascii_uppercase();
    for (suffix, dims) in [
        ("ZM", Dims { z: true, m: true }),
        ("Z", Dims { z: true, m: false }),
        ("M", Dims { z: false, m: true }),
    ] {
        if upper.ends_with(suffix) {
            return Some((&word[..word.len() - suffix.len()], dims));
        }
    }
    None
}

fn parse_wkt_line(text: &str) -> Option<LineString> {
    let (kind, dims, body) = wkt_header(text)?;
    if kind != ShapeKind::LineString {
        return None;
    }
    if body.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("EMPTY")) {
        return Some(LineString::default());
    }
    let inner = body.strip_prefix('(')?.trim_end().strip_suffix(')')?;
    let points = inner
        .split(',')
        .map(|chunk| parse_wkt_point(chunk, dims))
        .collect::<Option<Vec<_>>>()?;
    Some(LineString::new(points))
}

fn parse_wkt_point(chunk: &str, dims: Dims) -> Option<Point> {
    let values = chunk
        .split_whitespace()
        .map(|v| v.parse::<f64>().ok())
        .collect::<Option<Vec<_>>>()?;
    let width = if dims == Dims::default() {
        // Untagged WKT may still carry a third ordinate, read as z.
        values.len()
    } else {
        dims.width()
    };
    if values.len() != width || !(2..=4).contains(&width) {
        return None;
    }
    let (z, m) = match (width, dims.z, dims.m) {
        (2, _, _) => (None, None),
        (3, false, true) => (None, Some(values[2])),
        (3, _, _) => (Some(values[2]), None),
        _ => (Some(values[2]), Some(values[3])),
    };
    Some(Point {
        x: values[0],
        y: values[1],
        z,
        m,
    })
}

//! Precomputed lensing table: text-format loading and nearest-neighbor lookup

use std::io::Read;
use std::path::Path;

use cgmath::Vector3;
use log::info;

/// Inputs at or above 1.0 clamp to this value so the scaled index stays
/// inside the grid. Existing tables were precomputed against this exact
/// constant; changing it shifts which cell the top edge lands in.
const CLAMP_BELOW_ONE: f32 = 0.9999;

/// Errors that can occur while loading or sampling a lensing table.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TableError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("invalid token '{token}' at position {index}")]
    Parse { index: usize, token: String },

    #[error("stream ended while reading {0}")]
    UnexpectedEof(&'static str),

    #[error("resolutions must be non-zero (got {vr} x {vphi} x {or})")]
    ZeroResolution { vr: usize, vphi: usize, or: usize },

    #[error("{name} range is degenerate or reversed: [{min}, {max}]")]
    InvalidRange {
        name: &'static str,
        min: f32,
        max: f32,
    },

    #[error("table data truncated: declared {expected} values, stream holds {actual}")]
    TruncatedData { expected: usize, actual: usize },

    #[error("sampled an empty table")]
    EmptyTable,
}

/// Whitespace-delimited token reader with position tracking for diagnostics.
struct Tokens<'a> {
    inner: std::str::SplitAsciiWhitespace<'a>,
    index: usize,
}

impl<'a> Tokens<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            inner: source.split_ascii_whitespace(),
            index: 0,
        }
    }

    fn next_raw(&mut self) -> Option<&'a str> {
        let token = self.inner.next()?;
        self.index += 1;
        Some(token)
    }

    fn parse<T: std::str::FromStr>(&mut self, field: &'static str) -> Result<T, TableError> {
        let token = self.next_raw().ok_or(TableError::UnexpectedEof(field))?;
        token.parse().map_err(|_| TableError::Parse {
            index: self.index,
            token: token.to_string(),
        })
    }
}

/// Immutable 3D grid of precomputed lensing triples.
///
/// Layout is row-major with the observer-radius axis varying fastest, then
/// vertex angle, then vertex radius, the order the table files are written
/// in. Each cell holds (deflection angle, emission angle, distance).
///
/// A default-constructed table is empty; loading failures leave callers
/// with an empty table, and sampling one is an error rather than a zero
/// triple.
#[derive(Debug, Clone, Default)]
pub struct LensingTable {
    vr_res: usize,
    vphi_res: usize,
    or_res: usize,
    vr_min: f32,
    vr_max: f32,
    or_min: f32,
    or_max: f32,
    data: Vec<f32>,
}

impl LensingTable {
    /// Load a table from the structured text format:
    ///
    /// ```text
    /// <vr_res> <vphi_res> <or_res>
    /// <vr_min> <vr_max>
    /// <or_min> <or_max>
    /// <triples...>   (vr_res * vphi_res * or_res triples, or fastest)
    /// ```
    ///
    /// The declared triple count is validated against the stream; a short
    /// stream is an error, not a zero-filled table.
    pub fn load_from_reader<R: Read>(mut reader: R) -> Result<Self, TableError> {
        let mut source = String::new();
        reader
            .read_to_string(&mut source)
            .map_err(|e| TableError::Io(e.to_string()))?;
        Self::parse(&source)
    }

    /// Load a table from a file path.
    pub fn load_from_path(path: &Path) -> Result<Self, TableError> {
        let file = std::fs::File::open(path)
            .map_err(|e| TableError::Io(format!("{}: {e}", path.display())))?;
        let table = Self::load_from_reader(std::io::BufReader::new(file))?;
        info!(
            "loaded lensing table {} ({} x {} x {})",
            path.display(),
            table.vr_res,
            table.vphi_res,
            table.or_res
        );
        Ok(table)
    }

    /// Parse a table from in-memory text.
    pub fn parse(source: &str) -> Result<Self, TableError> {
        let mut tokens = Tokens::new(source);

        let vr_res: usize = tokens.parse("vr resolution")?;
        let vphi_res: usize = tokens.parse("vphi resolution")?;
        let or_res: usize = tokens.parse("or resolution")?;
        if vr_res == 0 || vphi_res == 0 || or_res == 0 {
            return Err(TableError::ZeroResolution {
                vr: vr_res,
                vphi: vphi_res,
                or: or_res,
            });
        }

        let vr_min: f32 = tokens.parse("vr min")?;
        let vr_max: f32 = tokens.parse("vr max")?;
        if vr_min >= vr_max {
            return Err(TableError::InvalidRange {
                name: "vr",
                min: vr_min,
                max: vr_max,
            });
        }

        let or_min: f32 = tokens.parse("or min")?;
        let or_max: f32 = tokens.parse("or max")?;
        if or_min >= or_max {
            return Err(TableError::InvalidRange {
                name: "or",
                min: or_min,
                max: or_max,
            });
        }

        let expected = vr_res * vphi_res * or_res * 3;
        let mut data = Vec::with_capacity(expected);
        for _ in 0..expected {
            match tokens.next_raw() {
                Some(token) => {
                    let value: f32 = token.parse().map_err(|_| TableError::Parse {
                        index: tokens.index,
                        token: token.to_string(),
                    })?;
                    data.push(value);
                }
                None => {
                    return Err(TableError::TruncatedData {
                        expected,
                        actual: data.len(),
                    });
                }
            }
        }

        Ok(Self {
            vr_res,
            vphi_res,
            or_res,
            vr_min,
            vr_max,
            or_min,
            or_max,
            data,
        })
    }

    /// Nearest-neighbor lookup at normalized coordinates.
    ///
    /// All three inputs are expected in `[0, 1)`; anything at or above 1.0
    /// clamps to 0.9999 and anything below 0.0 clamps to 0.0. Indices are
    /// `floor(coord * resolution)` per axis. No interpolation happens here,
    /// and the GPU copy of this table is read with integer loads so shader
    /// lookups and CPU lookups agree.
    pub fn sample(&self, vr: f32, vphi: f32, or: f32) -> Result<Vector3<f32>, TableError> {
        if self.is_empty() {
            return Err(TableError::EmptyTable);
        }

        let vr_index = (clamp_unit(vr) * self.vr_res as f32).floor() as usize;
        let vphi_index = (clamp_unit(vphi) * self.vphi_res as f32).floor() as usize;
        let or_index = (clamp_unit(or) * self.or_res as f32).floor() as usize;

        let base = ((vr_index * self.vphi_res + vphi_index) * self.or_res + or_index) * 3;
        Ok(Vector3::new(
            self.data[base],
            self.data[base + 1],
            self.data[base + 2],
        ))
    }

    /// Grid resolutions as (vr, vphi, or).
    pub fn resolutions(&self) -> (usize, usize, usize) {
        (self.vr_res, self.vphi_res, self.or_res)
    }

    /// Vertex-radius range covered by the grid.
    pub fn vr_range(&self) -> (f32, f32) {
        (self.vr_min, self.vr_max)
    }

    /// Observer-radius range covered by the grid.
    pub fn or_range(&self) -> (f32, f32) {
        (self.or_min, self.or_max)
    }

    /// The raw triple data, or-fastest layout.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// True when no data is loaded (zero resolutions count as empty).
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value >= 1.0 {
        CLAMP_BELOW_ONE
    } else if value < 0.0 {
        0.0
    } else {
        value
    }
}

/// World configuration of the black hole: position, visual size, and the
/// lensing table precomputed for it.
///
/// Shared by the scene (player collision, shader uniforms) and the renderer
/// (3D texture upload).
#[derive(Debug, Clone)]
pub struct BlackHole {
    pub position: Vector3<f32>,
    pub size: f32,
    pub table: LensingTable,
}

impl Default for BlackHole {
    fn default() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            size: 0.0,
            table: LensingTable::default(),
        }
    }
}

impl BlackHole {
    pub fn new(position: Vector3<f32>, size: f32, table: LensingTable) -> Self {
        Self {
            position,
            size,
            table,
        }
    }

    /// Lensing is usable only once a table is loaded.
    pub fn is_active(&self) -> bool {
        !self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2 x 2 x 2 table whose cell values encode their flat index, so any
    /// lookup can be checked by arithmetic.
    fn test_table() -> LensingTable {
        let mut text = String::from("2 2 2\n1.0 5.0\n2.0 10.0\n");
        for i in 0..24 {
            text.push_str(&format!("{}.0 ", i));
        }
        LensingTable::parse(&text).unwrap()
    }

    #[test]
    fn test_parse_header() {
        let table = test_table();
        assert_eq!(table.resolutions(), (2, 2, 2));
        assert_eq!(table.vr_range(), (1.0, 5.0));
        assert_eq!(table.or_range(), (2.0, 10.0));
        assert_eq!(table.data().len(), 24);
    }

    #[test]
    fn test_sample_returns_exact_stored_triple() {
        let table = test_table();
        // (0.6, 0.1, 0.9) -> indices (1, 0, 1) -> base ((1*2+0)*2+1)*3 = 15.
        let v = table.sample(0.6, 0.1, 0.9).unwrap();
        assert_eq!(v, Vector3::new(15.0, 16.0, 17.0));

        // All-zero coordinates hit the first triple.
        assert_eq!(
            table.sample(0.0, 0.0, 0.0).unwrap(),
            Vector3::new(0.0, 1.0, 2.0)
        );
    }

    #[test]
    fn test_sample_clamps_high_inputs_to_just_below_one() {
        let table = test_table();
        let clamped = table.sample(1.0, 2.5, 1e9).unwrap();
        let reference = table.sample(0.9999, 0.9999, 0.9999).unwrap();
        assert_eq!(clamped, reference);
        // The top cell is the last triple.
        assert_eq!(clamped, Vector3::new(21.0, 22.0, 23.0));
    }

    #[test]
    fn test_sample_clamps_negative_inputs_to_zero() {
        let table = test_table();
        assert_eq!(
            table.sample(-0.5, -1e9, -0.0001).unwrap(),
            table.sample(0.0, 0.0, 0.0).unwrap()
        );
    }

    #[test]
    fn test_sample_empty_table_fails() {
        let table = LensingTable::default();
        assert!(table.is_empty());
        assert_eq!(table.sample(0.5, 0.5, 0.5), Err(TableError::EmptyTable));
    }

    #[test]
    fn test_truncated_stream_is_an_error() {
        let text = "2 2 2\n1.0 5.0\n2.0 10.0\n0.0 1.0 2.0";
        let err = LensingTable::parse(text).unwrap_err();
        assert_eq!(
            err,
            TableError::TruncatedData {
                expected: 24,
                actual: 3
            }
        );
    }

    #[test]
    fn test_bad_token_reports_position() {
        let text = "2 2 2\n1.0 banana\n2.0 10.0\n";
        match LensingTable::parse(text).unwrap_err() {
            TableError::Parse { index, token } => {
                assert_eq!(index, 5);
                assert_eq!(token, "banana");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_zero_resolution_rejected() {
        let err = LensingTable::parse("0 2 2\n1.0 5.0\n2.0 10.0\n").unwrap_err();
        assert!(matches!(err, TableError::ZeroResolution { .. }));
    }

    #[test]
    fn test_reversed_range_rejected() {
        let err = LensingTable::parse("2 2 2\n5.0 1.0\n2.0 10.0\n").unwrap_err();
        assert!(matches!(err, TableError::InvalidRange { name: "vr", .. }));
    }

    #[test]
    fn test_black_hole_activity_tracks_table() {
        let inactive = BlackHole::default();
        assert!(!inactive.is_active());
        let active = BlackHole::new(Vector3::new(0.0, 2.5, 0.0), 0.4, test_table());
        assert!(active.is_active());
    }
}

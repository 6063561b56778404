//! Minimal FITS binary-table reader
//!
//! Just enough of the FITS standard to read the GOES response file: skip
//! HDUs until the first `BINTABLE` extension, then decode its fixed-width
//! numeric columns. Variable-length (heap) columns are not supported.

use thiserror::Error;

const BLOCK: usize = 2880;
const CARD: usize = 80;

#[derive(Debug, Error)]
pub enum FitsError {
    #[error("file truncated: needed {needed} bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },
    #[error("header has no END card")]
    MissingEnd,
    #[error("missing keyword {0}")]
    MissingKeyword(String),
    #[error("keyword {key} has invalid value '{value}'")]
    BadValue { key: String, value: String },
    #[error("no BINTABLE extension found")]
    NoBinTable,
    #[error("unsupported column format '{0}'")]
    UnsupportedFormat(String),
    #[error("columns occupy {columns} bytes but NAXIS1 is {row}")]
    RowWidth { columns: usize, row: usize },
    #[error("column {0} has zero width")]
    EmptyColumn(String),
    #[error("table size overflows: {0}")]
    Overflow(&'static str),
}

// ============================================================================
// Header
// ============================================================================

/// Keyword/value pairs of one HDU header, in file order.
#[derive(Debug, Clone, Default)]
struct Header {
    cards: Vec<(String, String)>,
}

impl Header {
    fn get(&self, key: &str) -> Option<&str> {
        self.cards.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    fn int(&self, key: &str) -> Result<i64, FitsError> {
        let raw = self.get(key).ok_or_else(|| FitsError::MissingKeyword(key.to_string()))?;
        raw.parse().map_err(|_| FitsError::BadValue {
            key: key.to_string(),
            value: raw.to_string(),
        })
    }

    fn int_or(&self, key: &str, default: i64) -> Result<i64, FitsError> {
        if self.get(key).is_some() {
            self.int(key)
        } else {
            Ok(default)
        }
    }

    fn usize(&self, key: &str) -> Result<usize, FitsError> {
        let v = self.int(key)?;
        usize::try_from(v).map_err(|_| FitsError::BadValue {
            key: key.to_string(),
            value: v.to_string(),
        })
    }

    /// Bytes of data following this header, before block padding.
    fn data_len(&self) -> Result<usize, FitsError> {
        let naxis = self.usize("NAXIS")?;
        if naxis == 0 {
            return Ok(0);
        }
        let overflow = || FitsError::Overflow("HDU data length");
        let bitpix = usize::try_from(self.int("BITPIX")?.unsigned_abs()).map_err(|_| overflow())?;
        let mut elements = 1usize;
        for i in 1..=naxis {
            elements = elements
                .checked_mul(self.usize(&format!("NAXIS{i}"))?)
                .ok_or_else(overflow)?;
        }
        let pcount = usize::try_from(self.int_or("PCOUNT", 0)?).unwrap_or(0);
        let gcount = usize::try_from(self.int_or("GCOUNT", 1)?).unwrap_or(1);
        pcount
            .checked_add(elements)
            .and_then(|n| n.checked_mul(gcount))
            .and_then(|n| n.checked_mul(bitpix / 8))
            .ok_or_else(overflow)
    }
}

/// Parse one header starting at `offset`; returns it and the offset of its data.
fn read_header(bytes: &[u8], offset: usize) -> Result<(Header, usize), FitsError> {
    let mut header = Header::default();
    let mut pos = offset;
    loop {
        let card = bytes.get(pos..pos + CARD).ok_or(FitsError::Truncated {
            offset: pos,
            needed: CARD,
        })?;
        pos += CARD;

        let text = String::from_utf8_lossy(card);
        let key = text.get(..8).unwrap_or("").trim().to_string();
        if key == "END" {
            break;
        }
        if text.get(8..10) == Some("= ") {
            header.cards.push((key, parse_value(text.get(10..).unwrap_or(""))));
        }
        if pos - offset > BLOCK * 1000 {
            return Err(FitsError::MissingEnd);
        }
    }
    let data_start = padded(pos - offset).and_then(|len| offset.checked_add(len));
    Ok((header, data_start.ok_or(FitsError::Overflow("header length"))?))
}

/// Strip comments and string quoting from a card value field.
fn parse_value(field: &str) -> String {
    let field = field.trim_start();
    if let Some(rest) = field.strip_prefix('\'') {
        let mut out = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    out.push('\'');
                } else {
                    break;
                }
            } else {
                out.push(c);
            }
        }
        return out.trim_end().to_string();
    }
    field.split('/').next().unwrap_or("").trim().to_string()
}

fn padded(len: usize) -> Option<usize> {
    len.div_ceil(BLOCK).checked_mul(BLOCK)
}

// ============================================================================
// Binary Table
// ============================================================================

/// Element type of a binary-table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// `B` unsigned byte
    U8,
    /// `I` 16-bit integer
    I16,
    /// `J` 32-bit integer
    I32,
    /// `K` 64-bit integer
    I64,
    /// `E` 32-bit float
    F32,
    /// `D` 64-bit float
    F64,
}

impl ElementKind {
    fn from_code(code: char) -> Option<Self> {
        match code {
            'B' => Some(Self::U8),
            'I' => Some(Self::I16),
            'J' => Some(Self::I32),
            'K' => Some(Self::I64),
            'E' => Some(Self::F32),
            'D' => Some(Self::F64),
            _ => None,
        }
    }

    pub fn width(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::I16 => 2,
            Self::I32 | Self::F32 => 4,
            Self::I64 | Self::F64 => 8,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn decode(self, b: &[u8]) -> f64 {
        match self {
            Self::U8 => f64::from(b[0]),
            Self::I16 => f64::from(i16::from_be_bytes([b[0], b[1]])),
            Self::I32 => f64::from(i32::from_be_bytes([b[0], b[1], b[2], b[3]])),
            Self::I64 => i64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f64,
            Self::F32 => f64::from(f32::from_be_bytes([b[0], b[1], b[2], b[3]])),
            Self::F64 => f64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
        }
    }
}

/// Parse a TFORM value such as `D`, `1J` or `101E`.
fn parse_tform(tform: &str) -> Result<(usize, ElementKind), FitsError> {
    let tform = tform.trim();
    let split = tform.find(|c: char| !c.is_ascii_digit()).unwrap_or(tform.len());
    let (digits, rest) = tform.split_at(split);
    let repeat = if digits.is_empty() {
        1
    } else {
        digits
            .parse()
            .map_err(|_| FitsError::UnsupportedFormat(tform.to_string()))?
    };
    let kind = rest
        .chars()
        .next()
        .and_then(ElementKind::from_code)
        .ok_or_else(|| FitsError::UnsupportedFormat(tform.to_string()))?;
    Ok((repeat, kind))
}

/// One decoded column; `values` holds `rows * repeat` entries, row-major.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub repeat: usize,
    pub kind: ElementKind,
    values: Vec<f64>,
}

impl Column {
    /// Cell of one row (a vector when `repeat > 1`).
    pub fn cell(&self, row: usize) -> Option<&[f64]> {
        let start = row.checked_mul(self.repeat)?;
        self.values.get(start..start.checked_add(self.repeat)?)
    }
}

/// First binary table of a FITS file, fully decoded to f64.
#[derive(Debug, Clone)]
pub struct BinTable {
    rows: usize,
    columns: Vec<Column>,
}

impl BinTable {
    pub fn parse(bytes: &[u8]) -> Result<Self, FitsError> {
        let mut offset = 0;
        while offset < bytes.len() {
            let (header, data_start) = read_header(bytes, offset)?;
            if header.get("XTENSION") == Some("BINTABLE") {
                return Self::decode(&header, bytes, data_start);
            }
            offset = padded(header.data_len()?)
                .and_then(|len| data_start.checked_add(len))
                .ok_or(FitsError::Overflow("HDU offset"))?;
        }
        Err(FitsError::NoBinTable)
    }

    fn decode(header: &Header, bytes: &[u8], data_start: usize) -> Result<Self, FitsError> {
        let row_width = header.usize("NAXIS1")?;
        let rows = header.usize("NAXIS2")?;
        let fields = header.usize("TFIELDS")?;

        let mut layout = Vec::with_capacity(fields);
        let mut byte_offset: usize = 0;
        for i in 1..=fields {
            let tform = header
                .get(&format!("TFORM{i}"))
                .ok_or_else(|| FitsError::MissingKeyword(format!("TFORM{i}")))?;
            let (repeat, kind) = parse_tform(tform)?;
            let name = header
                .get(&format!("TTYPE{i}"))
                .map_or_else(|| format!("COL{i}"), str::to_string);
            let width = repeat
                .checked_mul(kind.width())
                .ok_or(FitsError::Overflow("column width"))?;
            if width == 0 {
                return Err(FitsError::EmptyColumn(name));
            }
            layout.push((name, repeat, kind, byte_offset));
            byte_offset = byte_offset
                .checked_add(width)
                .ok_or(FitsError::Overflow("row width"))?;
        }
        if fields == 0 || row_width == 0 {
            return Err(FitsError::RowWidth {
                columns: byte_offset,
                row: row_width,
            });
        }
        if byte_offset != row_width {
            return Err(FitsError::RowWidth {
                columns: byte_offset,
                row: row_width,
            });
        }

        let needed = row_width
            .checked_mul(rows)
            .ok_or(FitsError::Overflow("NAXIS1 * NAXIS2"))?;
        let data = data_start
            .checked_add(needed)
            .and_then(|end| bytes.get(data_start..end))
            .ok_or(FitsError::Truncated {
                offset: data_start,
                needed,
            })?;

        let columns = layout
            .into_iter()
            .map(|(name, repeat, kind, col_offset)| {
                let width = kind.width();
                let mut values = Vec::with_capacity(data.len() / row_width * repeat);
                for row in data.chunks_exact(row_width) {
                    for e in 0..repeat {
                        let at = col_offset + e * width;
                        values.push(kind.decode(&row[at..at + width]));
                    }
                }
                Column {
                    name,
                    repeat,
                    kind,
                    values,
                }
            })
            .collect();

        Ok(Self { rows, columns })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Column by TTYPE name, case-insensitive.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

// ============================================================================
// Test Support
// ============================================================================

/// Build a FITS file with an empty primary HDU and one `D`-typed binary table.
///
/// Each column is `(name, repeat, values)` with `values.len() == rows * repeat`.
#[cfg(test)]
pub(crate) fn encode_f64_table(columns: &[(&str, usize, Vec<f64>)], rows: usize) -> Vec<u8> {
    fn card(text: &str) -> Vec<u8> {
        format!("{text:<80}").into_bytes()
    }
    fn pad(buf: &mut Vec<u8>, fill: u8) {
        while buf.len() % BLOCK != 0 {
            buf.push(fill);
        }
    }

    let mut out = Vec::new();
    for c in ["SIMPLE  =                    T", "BITPIX  =                    8", "NAXIS   =                    0", "END"] {
        out.extend(card(c));
    }
    pad(&mut out, b' ');

    let row_width: usize = columns.iter().map(|(_, r, _)| r * 8).sum();
    let mut header = vec![
        "XTENSION= 'BINTABLE'".to_string(),
        "BITPIX  =                    8".to_string(),
        "NAXIS   =                    2".to_string(),
        format!("NAXIS1  = {row_width:>20}"),
        format!("NAXIS2  = {rows:>20}"),
        "PCOUNT  =                    0".to_string(),
        "GCOUNT  =                    1".to_string(),
        format!("TFIELDS = {:>20}", columns.len()),
    ];
    for (i, (name, repeat, _)) in columns.iter().enumerate() {
        header.push(format!("TTYPE{:<3}= '{name}'", i + 1));
        header.push(format!("TFORM{:<3}= '{repeat}D' / real*8", i + 1));
    }
    header.push("END".to_string());
    for c in &header {
        out.extend(card(c));
    }
    pad(&mut out, b' ');

    for row in 0..rows {
        for (_, repeat, values) in columns {
            for v in &values[row * repeat..(row + 1) * repeat] {
                out.extend(v.to_be_bytes());
            }
        }
    }
    pad(&mut out, 0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tform() {
        assert_eq!(parse_tform("D").unwrap(), (1, ElementKind::F64));
        assert_eq!(parse_tform("101E").unwrap(), (101, ElementKind::F32));
        assert_eq!(parse_tform("1J ").unwrap(), (1, ElementKind::I32));
        assert!(parse_tform("PD(12)").is_err());
    }

    #[test]
    fn test_parse_value_strips_quotes_and_comments() {
        assert_eq!(parse_value(" 'BINTABLE'           / binary table"), "BINTABLE");
        assert_eq!(parse_value("                   42 / answer"), "42");
        assert_eq!(parse_value(" 'it''s'"), "it's");
    }

    #[test]
    fn test_reads_vector_and_scalar_columns() {
        let bytes = encode_f64_table(
            &[
                ("TEMP_MK", 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
                ("ALOG10EM", 1, vec![49.0, 55.0]),
            ],
            2,
        );
        assert_eq!(bytes.len() % BLOCK, 0);

        let table = BinTable::parse(&bytes).unwrap();
        assert_eq!(table.rows(), 2);
        let temp = table.column("temp_mk").unwrap();
        assert_eq!(temp.repeat, 3);
        assert_eq!(temp.cell(1).unwrap(), &[4.0, 5.0, 6.0]);
        assert_eq!(table.column("ALOG10EM").unwrap().cell(0).unwrap(), &[49.0]);
        assert!(table.column("missing").is_none());
        assert!(temp.cell(2).is_none());
    }

    #[test]
    fn test_truncated_file_is_error() {
        let bytes = encode_f64_table(&[("A", 1, vec![1.0])], 1);
        let err = BinTable::parse(&bytes[..BLOCK + 100]).unwrap_err();
        assert!(matches!(err, FitsError::Truncated { .. }));
    }

    /// Primary HDU followed by one extension built from raw header cards.
    fn with_extension(cards: &[&str], data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for c in ["SIMPLE  =                    T", "BITPIX  =                    8", "NAXIS   =                    0", "END"] {
            out.extend(format!("{c:<80}").into_bytes());
        }
        out.resize(BLOCK, b' ');
        for c in cards.iter().chain(&["END"]) {
            out.extend(format!("{c:<80}").into_bytes());
        }
        out.resize(2 * BLOCK, b' ');
        out.extend_from_slice(data);
        out
    }

    #[test]
    fn test_zero_width_column_is_error() {
        let bytes = with_extension(
            &[
                "XTENSION= 'BINTABLE'",
                "BITPIX  =                    8",
                "NAXIS   =                    2",
                "NAXIS1  =                    0",
                "NAXIS2  =                    1",
                "TFIELDS =                    1",
                "TFORM1  = '0D'",
            ],
            &[],
        );
        let err = BinTable::parse(&bytes).unwrap_err();
        assert!(matches!(err, FitsError::EmptyColumn(_)), "{err}");
    }

    #[test]
    fn test_table_without_columns_is_error() {
        let bytes = with_extension(
            &[
                "XTENSION= 'BINTABLE'",
                "BITPIX  =                    8",
                "NAXIS   =                    2",
                "NAXIS1  =                    0",
                "NAXIS2  =                    5",
                "TFIELDS =                    0",
            ],
            &[],
        );
        assert!(matches!(BinTable::parse(&bytes).unwrap_err(), FitsError::RowWidth { .. }));
    }

    #[test]
    fn test_oversized_table_dimensions_are_error() {
        let bytes = with_extension(
            &[
                "XTENSION= 'BINTABLE'",
                "BITPIX  =                    8",
                "NAXIS   =                    2",
                "NAXIS1  =                    8",
                "NAXIS2  =  4611686018427387904",
                "TFIELDS =                    1",
                "TFORM1  = 'D'",
            ],
            &[0; 8],
        );
        let err = BinTable::parse(&bytes).unwrap_err();
        assert!(matches!(err, FitsError::Overflow(_) | FitsError::BadValue { .. }), "{err}");
    }

    #[test]
    fn test_oversized_skipped_hdu_is_error() {
        let bytes = with_extension(
            &[
                "XTENSION= 'IMAGE'",
                "BITPIX  =                  -64",
                "NAXIS   =                    2",
                "NAXIS1  =  4611686018427387904",
                "NAXIS2  =  4611686018427387904",
            ],
            &[],
        );
        let err = BinTable::parse(&bytes).unwrap_err();
        assert!(matches!(err, FitsError::Overflow(_) | FitsError::BadValue { .. }), "{err}");
    }

    #[test]
    fn test_garbage_is_error() {
        assert!(BinTable::parse(b"not a fits file").is_err());
        assert!(matches!(
            BinTable::parse(&[]).unwrap_err(),
            FitsError::NoBinTable
        ));
    }
}

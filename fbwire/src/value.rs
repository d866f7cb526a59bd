//! Row values and field descriptors.
use std::fmt;

use bytes::Bytes;

use crate::{
    gds::{ServerError, codes},
    xdr::{self, DecodeResult, XdrReader, XdrWriter},
};

/// One field of a message format, as described by the server.
#[derive(Debug, Clone, Default)]
pub struct Descriptor {
    pub data_type: i16,
    pub sub_type: i16,
    pub scale: i8,
    pub length: i16,
    pub field: Option<String>,
    pub relation: Option<String>,
    pub owner: Option<String>,
    pub alias: Option<String>,
}

impl Descriptor {
    /// Type code with the nullable flag masked off.
    pub fn sql_type(&self) -> i16 {
        self.data_type & !1
    }

    pub fn is_nullable(&self) -> bool {
        self.data_type & 1 != 0
    }
}

/// Character set id marking binary text columns.
const OCTETS: i16 = 1;

/// A single column or parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    /// Fixed point decimal: `value` scaled by ten to the power `scale`.
    Numeric { value: i64, scale: i8 },
    Float(f32),
    Double(f64),
    Text(String),
    Binary(Bytes),
    Date { year: i32, month: u8, day: u8 },
    /// Fraction in units of 100 microseconds.
    Time { hour: u8, minute: u8, second: u8, fraction: u32 },
    Timestamp {
        year: i32,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
        fraction: u32,
    },
    /// Blob or array id, resolved through separate segment requests.
    Quad(i64),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::SmallInt(_) => "smallint",
            Value::Integer(_) => "integer",
            Value::BigInt(_) => "bigint",
            Value::Numeric { .. } => "numeric",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Text(_) => "text",
            Value::Binary(_) => "binary",
            Value::Date { .. } => "date",
            Value::Time { .. } => "time",
            Value::Timestamp { .. } => "timestamp",
            Value::Quad(_) => "quad",
        }
    }

    /// Widen to a raw scaled integer for the fixed point family.
    fn as_scaled(&self, to_scale: i8) -> Result<i64, DecodeError> {
        let (value, scale) = match *self {
            Value::SmallInt(v) => (v as i64, 0),
            Value::Integer(v) => (v as i64, 0),
            Value::BigInt(v) => (v, 0),
            Value::Numeric { value, scale } => (value, scale),
            Value::Boolean(v) => (v as i64, 0),
            ref other => return Err(DecodeError::mismatch("integer", other)),
        };
        Ok(xdr::rescale(value, scale, to_scale))
    }

    fn as_f64(&self) -> Result<f64, DecodeError> {
        match *self {
            Value::Float(v) => Ok(v as f64),
            Value::Double(v) => Ok(v),
            Value::SmallInt(v) => Ok(v as f64),
            Value::Integer(v) => Ok(v as f64),
            Value::BigInt(v) => Ok(v as f64),
            ref other => Err(DecodeError::mismatch("floating point", other)),
        }
    }

    fn as_bytes(&self) -> Result<&[u8], DecodeError> {
        match self {
            Value::Text(s) => Ok(s.as_bytes()),
            Value::Binary(b) => Ok(b),
            other => Err(DecodeError::mismatch("text or binary", other)),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $var:ident,)*) => {$(
        impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::$var(value)
            }
        }
    )*};
}

value_from! {
    bool => Boolean,
    i16 => SmallInt,
    i32 => Integer,
    i64 => BigInt,
    f32 => Float,
    f64 => Double,
    String => Text,
    Bytes => Binary,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// A value does not fit the declared field format.
pub enum DecodeError {
    Mismatch { expected: &'static str, found: &'static str },
    UnsupportedType(i16),
}

impl DecodeError {
    pub(crate) fn mismatch(expected: &'static str, found: &Value) -> Self {
        Self::Mismatch { expected, found: found.name() }
    }
}

impl std::error::Error for DecodeError { }

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mismatch { expected, found } => {
                write!(f, "expected {expected} value, found {found}")
            }
            Self::UnsupportedType(ty) => write!(f, "unsupported data type {ty}"),
        }
    }
}

impl fmt::Debug for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

/// The status vector an overlong text parameter produces.
fn truncation_error(len: usize, max: i16) -> ServerError {
    let mut err = ServerError::new();
    err.push_number(codes::ISC_ARG_GDS, codes::ISC_ARITH_EXCEPT);
    err.push_number(codes::ISC_ARG_GDS, codes::ISC_STRING_TRUNCATION);
    err.push_string(
        codes::ISC_ARG_STRING,
        format!("string of {len} bytes exceeds field capacity of {max}"),
    );
    err
}

/// Encode one parameter into its declared slot.
pub(crate) fn write_value(w: &mut XdrWriter<'_>, value: &Value, desc: &Descriptor) -> crate::Result<()> {
    match desc.sql_type() {
        codes::SQL_VARYING => {
            let bytes = value.as_bytes()?;
            if bytes.len() > desc.length as usize {
                return Err(truncation_error(bytes.len(), desc.length).into());
            }
            w.write_buffer(Some(bytes));
        }
        codes::SQL_TEXT => {
            let bytes = value.as_bytes()?;
            if bytes.len() > desc.length as usize {
                return Err(truncation_error(bytes.len(), desc.length).into());
            }
            w.write_opaque(bytes, desc.length as usize);
        }
        codes::SQL_SHORT => w.write_i32(value.as_scaled(desc.scale)? as i32),
        codes::SQL_LONG => w.write_i32(value.as_scaled(desc.scale)? as i32),
        codes::SQL_INT64 => w.write_i64(value.as_scaled(desc.scale)?),
        codes::SQL_QUAD => w.write_i64(value.as_scaled(desc.scale)?),
        codes::SQL_FLOAT => w.write_f32(value.as_f64()? as f32),
        codes::SQL_DOUBLE | codes::SQL_D_FLOAT => w.write_f64(value.as_f64()?),
        codes::SQL_BOOLEAN => match *value {
            Value::Boolean(v) => w.write_bool(v),
            ref other => return Err(DecodeError::mismatch("boolean", other).into()),
        },
        codes::SQL_TYPE_DATE => match *value {
            Value::Date { year, month, day } => w.write_i32(xdr::encode_date(year, month, day)),
            ref other => return Err(DecodeError::mismatch("date", other).into()),
        },
        codes::SQL_TYPE_TIME => match *value {
            Value::Time { hour, minute, second, fraction } => {
                w.write_i32(xdr::encode_time(hour, minute, second, fraction))
            }
            ref other => return Err(DecodeError::mismatch("time", other).into()),
        },
        codes::SQL_TIMESTAMP => match *value {
            Value::Timestamp { year, month, day, hour, minute, second, fraction } => {
                w.write_i32(xdr::encode_date(year, month, day));
                w.write_i32(xdr::encode_time(hour, minute, second, fraction));
            }
            ref other => return Err(DecodeError::mismatch("timestamp", other).into()),
        },
        codes::SQL_BLOB | codes::SQL_ARRAY => match *value {
            Value::Quad(id) => w.write_i64(id),
            ref other => return Err(DecodeError::mismatch("quad", other).into()),
        },
        codes::SQL_NULL => {}
        other => return Err(DecodeError::UnsupportedType(other).into()),
    }
    Ok(())
}

/// Zero valued stand in for a null slot in indicator style rows.
fn write_placeholder(w: &mut XdrWriter<'_>, desc: &Descriptor) {
    match desc.sql_type() {
        codes::SQL_VARYING => w.write_buffer(None),
        codes::SQL_TEXT => w.write_opaque(&[], desc.length as usize),
        codes::SQL_SHORT | codes::SQL_LONG | codes::SQL_FLOAT | codes::SQL_TYPE_DATE
        | codes::SQL_TYPE_TIME => w.write_i32(0),
        codes::SQL_BOOLEAN => w.write_bool(false),
        codes::SQL_TIMESTAMP => {
            w.write_i32(0);
            w.write_i32(0);
        }
        codes::SQL_NULL => {}
        _ => w.write_i64(0),
    }
}

/// Decode one field of a row.
pub(crate) fn read_value(r: &mut XdrReader<'_>, desc: &Descriptor) -> DecodeResult<Value> {
    Ok(match desc.sql_type() {
        codes::SQL_VARYING => {
            let data = r.read_buffer()?;
            if desc.sub_type == OCTETS {
                Value::Binary(data)
            } else {
                Value::Text(String::from_utf8_lossy(&data).into_owned())
            }
        }
        codes::SQL_TEXT => {
            let data = r.read_opaque(desc.length as usize)?;
            if desc.sub_type == OCTETS {
                Value::Binary(data)
            } else {
                Value::Text(String::from_utf8_lossy(&data).into_owned())
            }
        }
        codes::SQL_SHORT => scaled(r.read_i32()? as i64, desc.scale, |v| Value::SmallInt(v as i16)),
        codes::SQL_LONG => scaled(r.read_i32()? as i64, desc.scale, |v| Value::Integer(v as i32)),
        codes::SQL_INT64 | codes::SQL_QUAD => scaled(r.read_i64()?, desc.scale, Value::BigInt),
        codes::SQL_FLOAT => Value::Float(r.read_f32()?),
        codes::SQL_DOUBLE | codes::SQL_D_FLOAT => Value::Double(r.read_f64()?),
        codes::SQL_BOOLEAN => Value::Boolean(r.read_bool()?),
        codes::SQL_TYPE_DATE => {
            let (year, month, day) = xdr::decode_date(r.read_i32()?);
            Value::Date { year, month, day }
        }
        codes::SQL_TYPE_TIME => {
            let (hour, minute, second, fraction) = xdr::decode_time(r.read_i32()?);
            Value::Time { hour, minute, second, fraction }
        }
        codes::SQL_TIMESTAMP => {
            let (year, month, day) = xdr::decode_date(r.read_i32()?);
            let (hour, minute, second, fraction) = xdr::decode_time(r.read_i32()?);
            Value::Timestamp { year, month, day, hour, minute, second, fraction }
        }
        codes::SQL_BLOB | codes::SQL_ARRAY => Value::Quad(r.read_i64()?),
        _ => Value::Binary(r.read_opaque(desc.length as usize)?),
    })
}

fn scaled(raw: i64, scale: i8, plain: impl Fn(i64) -> Value) -> Value {
    if scale == 0 {
        plain(raw)
    } else {
        Value::Numeric { value: raw, scale }
    }
}

/// Decode a full row. With `null_bitmap` the frame starts with one bit per
/// field, least significant bit first; otherwise every field carries a
/// trailing null indicator.
pub(crate) fn read_row(
    r: &mut XdrReader<'_>,
    descriptors: &[Descriptor],
    null_bitmap: bool,
) -> DecodeResult<Vec<Value>> {
    let mut row = Vec::with_capacity(descriptors.len());
    if null_bitmap {
        let bits = r.read_opaque(descriptors.len().div_ceil(8))?;
        for (i, desc) in descriptors.iter().enumerate() {
            if bits[i / 8] & (1 << (i % 8)) != 0 {
                row.push(Value::Null);
            } else {
                row.push(read_value(r, desc)?);
            }
        }
    } else {
        for desc in descriptors {
            let value = read_value(r, desc)?;
            let indicator = r.read_i32()?;
            row.push(if indicator == -1 { Value::Null } else { value });
        }
    }
    Ok(row)
}

/// Encode a full parameter row, mirroring [`read_row`].
pub(crate) fn write_row(
    w: &mut XdrWriter<'_>,
    values: &[Value],
    descriptors: &[Descriptor],
    null_bitmap: bool,
) -> crate::Result<()> {
    if values.len() != descriptors.len() {
        return Err(crate::gds::ProtocolError::Malformed("parameter count mismatch").into());
    }
    if null_bitmap {
        let mut bits = vec![0u8; descriptors.len().div_ceil(8)];
        for (i, value) in values.iter().enumerate() {
            if value.is_null() {
                bits[i / 8] |= 1 << (i % 8);
            }
        }
        let len = bits.len();
        w.write_opaque(&bits, len);
        for (value, desc) in values.iter().zip(descriptors) {
            if !value.is_null() {
                write_value(w, value, desc)?;
            }
        }
    } else {
        for (value, desc) in values.iter().zip(descriptors) {
            if value.is_null() {
                write_placeholder(w, desc);
                w.write_i32(-1);
            } else {
                write_value(w, value, desc)?;
                w.write_i32(0);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use bytes::BytesMut;

    use super::*;
    use crate::error::ErrorKind;

    fn desc(ty: i16, length: i16, scale: i8) -> Descriptor {
        Descriptor { data_type: ty, length, scale, ..Descriptor::default() }
    }

    #[test]
    fn indicator_row_round_trip() {
        let descs = [
            desc(codes::SQL_LONG, 4, 0),
            desc(codes::SQL_VARYING, 20, 0),
            desc(codes::SQL_DOUBLE, 8, 0),
        ];
        let values = [Value::Integer(5), Value::Null, Value::Double(0.5)];

        let mut buf = BytesMut::new();
        write_row(&mut XdrWriter::new(&mut buf), &values, &descs, false).unwrap();
        let row = read_row(&mut XdrReader::new(&buf), &descs, false).unwrap();
        assert_eq!(row, values);
    }

    #[test]
    fn bitmap_row_round_trip() {
        let descs: Vec<_> = (0..9).map(|_| desc(codes::SQL_LONG, 4, 0)).collect();
        let values: Vec<_> = (0..9)
            .map(|i| if i % 2 == 0 { Value::Integer(i) } else { Value::Null })
            .collect();

        let mut buf = BytesMut::new();
        write_row(&mut XdrWriter::new(&mut buf), &values, &descs, true).unwrap();
        // 9 fields need a 2 byte bitmap, padded to 4
        assert_eq!(buf[0], 0b0101_0101 << 1);
        let row = read_row(&mut XdrReader::new(&buf), &descs, true).unwrap();
        assert_eq!(row, values);
    }

    #[test]
    fn numeric_keeps_declared_scale() {
        let d = desc(codes::SQL_INT64, 8, -2);
        let mut buf = BytesMut::new();
        write_value(
            &mut XdrWriter::new(&mut buf),
            &Value::Numeric { value: 12345, scale: -2 },
            &d,
        )
        .unwrap();
        let value = read_value(&mut XdrReader::new(&buf), &d).unwrap();
        assert_eq!(value, Value::Numeric { value: 12345, scale: -2 });
    }

    #[test]
    fn integer_rescaled_into_numeric_field() {
        let d = desc(codes::SQL_LONG, 4, -2);
        let mut buf = BytesMut::new();
        write_value(&mut XdrWriter::new(&mut buf), &Value::Integer(7), &d).unwrap();
        let mut r = XdrReader::new(&buf);
        assert_eq!(r.read_i32(), Ok(700));
    }

    #[test]
    fn overlong_varchar_rejected_before_send() {
        let d = desc(codes::SQL_VARYING, 4, 0);
        let mut buf = BytesMut::new();
        let err = write_value(&mut XdrWriter::new(&mut buf), &Value::Text("too long".into()), &d)
            .unwrap_err();
        match err.kind() {
            ErrorKind::Server(e) => {
                let chain: Vec<_> = e.codes().collect();
                assert_eq!(chain, vec![codes::ISC_ARITH_EXCEPT, codes::ISC_STRING_TRUNCATION]);
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn char_field_zero_fills() {
        let d = desc(codes::SQL_TEXT, 8, 0);
        let mut buf = BytesMut::new();
        write_value(&mut XdrWriter::new(&mut buf), &Value::Text("ab".into()), &d).unwrap();
        assert_eq!(buf.len(), 8);
    }

    #[test]
    fn date_and_timestamp_round_trip() {
        let d = desc(codes::SQL_TIMESTAMP, 8, 0);
        let value = Value::Timestamp {
            year: 2024,
            month: 2,
            day: 29,
            hour: 23,
            minute: 59,
            second: 58,
            fraction: 9999,
        };
        let mut buf = BytesMut::new();
        write_value(&mut XdrWriter::new(&mut buf), &value, &d).unwrap();
        assert_eq!(read_value(&mut XdrReader::new(&buf), &d).unwrap(), value);
    }

    #[test]
    fn type_mismatch_reported() {
        let d = desc(codes::SQL_BOOLEAN, 1, 0);
        let mut buf = BytesMut::new();
        let err = write_value(&mut XdrWriter::new(&mut buf), &Value::Text("t".into()), &d)
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Decode(_)));
    }
}

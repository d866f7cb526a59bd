//! XDR style binary codec.
//!
//! Every scalar is big endian and occupies a multiple of 4 bytes, opaque
//! buffers are zero padded up to the next 4 byte boundary. Writes only
//! accumulate into a [`BytesMut`], flushing belongs to the stream layer.
//! Reads work over a plain byte slice and report [`Incomplete`] when the
//! buffer does not yet hold enough bytes, so a receive future can retry
//! after more socket bytes arrive.
use bytes::{BufMut, Bytes, BytesMut};

use crate::gds::{ServerError, codes};

/// Marker for a decode attempt against a not yet complete buffer.
#[derive(Debug, PartialEq, Eq)]
pub struct Incomplete;

pub type DecodeResult<T> = Result<T, Incomplete>;

const PAD: [u8; 4] = [0; 4];

pub fn pad_len(len: usize) -> usize {
    (4 - len % 4) % 4
}

/// Write half of the codec, borrowing the connection's send buffer.
#[derive(Debug)]
pub struct XdrWriter<'a> {
    buf: &'a mut BytesMut,
}

impl<'a> XdrWriter<'a> {
    pub fn new(buf: &'a mut BytesMut) -> Self {
        Self { buf }
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.put_i32(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.put_i64(value);
    }

    /// An i16 occupies a full 4 byte slot on the wire.
    pub fn write_i16(&mut self, value: i16) {
        self.buf.put_i32(value as i32);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.put_u32(value.to_bits());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buf.put_u64(value.to_bits());
    }

    /// Booleans are a one byte opaque in a padded slot, value first.
    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(value as u8);
        self.buf.put_slice(&PAD[..3]);
    }

    /// Length prefixed buffer, padded to the 4 byte boundary.
    pub fn write_buffer(&mut self, value: Option<&[u8]>) {
        let value = value.unwrap_or_default();
        self.buf.put_i32(value.len() as i32);
        self.buf.put_slice(value);
        self.buf.put_slice(&PAD[..pad_len(value.len())]);
    }

    /// Fixed length opaque value: truncated or zero filled to `declared`,
    /// then padded.
    pub fn write_opaque(&mut self, value: &[u8], declared: usize) {
        let used = value.len().min(declared);
        self.buf.put_slice(&value[..used]);
        self.buf.put_bytes(0, declared - used);
        self.buf.put_slice(&PAD[..pad_len(declared)]);
    }

    pub fn write_string(&mut self, value: &str) {
        self.write_buffer(Some(value.as_bytes()));
    }

    /// Raw bytes without length prefix or padding, already XDR shaped.
    pub fn write_raw(&mut self, value: &[u8]) {
        self.buf.put_slice(value);
    }
}

/// Read half of the codec over a byte slice.
///
/// The cursor advances as values are consumed; callers commit the consumed
/// length only after a full message decoded, so an [`Incomplete`] outcome
/// leaves the stream buffer untouched.
#[derive(Debug)]
pub struct XdrReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> XdrReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn consumed(&self) -> usize {
        self.pos
    }

    fn take(&mut self, n: usize) -> DecodeResult<&'a [u8]> {
        match self.buf.get(self.pos..self.pos + n) {
            Some(chunk) => {
                self.pos += n;
                Ok(chunk)
            }
            None => Err(Incomplete),
        }
    }

    pub fn read_i32(&mut self) -> DecodeResult<i32> {
        Ok(i32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_u32(&mut self) -> DecodeResult<u32> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_i64(&mut self) -> DecodeResult<i64> {
        Ok(i64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn read_i16(&mut self) -> DecodeResult<i16> {
        Ok(self.read_i32()? as i16)
    }

    pub fn read_f32(&mut self) -> DecodeResult<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> DecodeResult<f64> {
        Ok(f64::from_bits(u64::from_be_bytes(self.take(8)?.try_into().unwrap())))
    }

    pub fn read_bool(&mut self) -> DecodeResult<bool> {
        Ok(self.take(4)?[0] != 0)
    }

    pub fn read_buffer(&mut self) -> DecodeResult<Bytes> {
        let len = self.read_i32()? as usize;
        let data = self.take(len)?;
        self.take(pad_len(len))?;
        Ok(Bytes::copy_from_slice(data))
    }

    pub fn read_opaque(&mut self, len: usize) -> DecodeResult<Bytes> {
        let data = self.take(len)?;
        self.take(pad_len(len))?;
        Ok(Bytes::copy_from_slice(data))
    }

    pub fn read_string(&mut self) -> DecodeResult<String> {
        let buf = self.read_buffer()?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Status vector: a sequence of tagged arguments terminated by
    /// `isc_arg_end`. Returns `None` when the vector carries no error.
    pub fn read_status_vector(&mut self) -> DecodeResult<Option<ServerError>> {
        let mut error: Option<ServerError> = None;

        loop {
            let arg = self.read_i32()?;
            match arg {
                codes::ISC_ARG_END => break,
                codes::ISC_ARG_INTERPRETED
                | codes::ISC_ARG_STRING
                | codes::ISC_ARG_SQL_STATE => {
                    let text = self.read_string()?;
                    if let Some(err) = error.as_mut() {
                        err.push_string(arg, text);
                    }
                }
                codes::ISC_ARG_NUMBER => {
                    let num = self.read_i32()?;
                    if let Some(err) = error.as_mut() {
                        err.push_number(arg, num);
                    }
                }
                _ => {
                    // isc_arg_gds and friends carry a status code
                    let code = self.read_i32()?;
                    if code != 0 {
                        error
                            .get_or_insert_with(ServerError::new)
                            .push_number(arg, code);
                    }
                }
            }
        }

        Ok(error)
    }
}

/// Days between 0000-03-01 based civil reckoning and the wire epoch
/// 1858-11-17 (modified Julian day zero).
const MJD_EPOCH: i64 = 678881;

/// Encode a calendar date to days since 1858-11-17.
pub fn encode_date(year: i32, month: u8, day: u8) -> i32 {
    let y = year as i64 - i64::from(month <= 2);
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let m = month as i64;
    let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    (era * 146097 + doe - MJD_EPOCH) as i32
}

/// Decode days since 1858-11-17 back to a calendar date.
pub fn decode_date(wire: i32) -> (i32, u8, u8) {
    let z = wire as i64 + MJD_EPOCH;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = z - era * 146097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u8;
    ((y + i64::from(m <= 2)) as i32, m, d)
}

/// Time of day in units of 100 microseconds since midnight.
pub fn encode_time(hour: u8, minute: u8, second: u8, fraction: u32) -> i32 {
    ((hour as i64 * 3600 + minute as i64 * 60 + second as i64) * 10_000 + fraction as i64) as i32
}

pub fn decode_time(wire: i32) -> (u8, u8, u8, u32) {
    let units = wire as i64;
    let fraction = (units % 10_000) as u32;
    let seconds = units / 10_000;
    (
        (seconds / 3600) as u8,
        (seconds / 60 % 60) as u8,
        (seconds % 60) as u8,
        fraction,
    )
}

/// Rescale a fixed point integer between two declared scales.
///
/// Scales are negative powers of ten, `-2` meaning two fractional digits.
pub fn rescale(value: i64, from_scale: i8, to_scale: i8) -> i64 {
    use std::cmp::Ordering;
    match from_scale.cmp(&to_scale) {
        Ordering::Equal => value,
        // fewer fractional digits on the wire, divide
        Ordering::Less => value / 10i64.pow((to_scale - from_scale) as u32),
        Ordering::Greater => value * 10i64.pow((from_scale - to_scale) as u32),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn scalar_round_trip() {
        let mut buf = BytesMut::new();
        let mut w = XdrWriter::new(&mut buf);
        w.write_i32(-42);
        w.write_i64(i64::MAX);
        w.write_i16(-7);
        w.write_f32(1.5);
        w.write_f64(-2.25);
        w.write_bool(true);

        let mut r = XdrReader::new(&buf);
        assert_eq!(r.read_i32(), Ok(-42));
        assert_eq!(r.read_i64(), Ok(i64::MAX));
        assert_eq!(r.read_i16(), Ok(-7));
        assert_eq!(r.read_f32(), Ok(1.5));
        assert_eq!(r.read_f64(), Ok(-2.25));
        assert_eq!(r.read_bool(), Ok(true));
        assert_eq!(r.consumed(), buf.len());
    }

    #[test]
    fn buffer_padding() {
        let mut buf = BytesMut::new();
        XdrWriter::new(&mut buf).write_buffer(Some(b"abcde"));
        // 4 length + 5 data + 3 pad
        assert_eq!(buf.len(), 12);
        assert_eq!(&buf[9..], &[0, 0, 0]);

        let mut r = XdrReader::new(&buf);
        assert_eq!(r.read_buffer().unwrap().as_ref(), b"abcde");
        assert_eq!(r.consumed(), 12);
    }

    #[test]
    fn opaque_fills_declared_length() {
        let mut buf = BytesMut::new();
        XdrWriter::new(&mut buf).write_opaque(b"ab", 6);
        assert_eq!(&buf[..], &[b'a', b'b', 0, 0, 0, 0, 0, 0]);

        let mut r = XdrReader::new(&buf);
        assert_eq!(r.read_opaque(6).unwrap().as_ref(), b"ab\0\0\0\0");
    }

    #[test]
    fn incomplete_read_reports() {
        let mut buf = BytesMut::new();
        XdrWriter::new(&mut buf).write_i32(9);
        let mut r = XdrReader::new(&buf[..2]);
        assert_eq!(r.read_i32(), Err(Incomplete));
    }

    #[test]
    fn date_epoch_and_round_trip() {
        assert_eq!(encode_date(1858, 11, 17), 0);
        // modified julian day of the unix epoch
        assert_eq!(encode_date(1970, 1, 1), 40587);
        for (y, m, d) in [(1970, 1, 1), (2000, 2, 29), (2023, 12, 31), (1899, 3, 1)] {
            let wire = encode_date(y, m, d);
            assert_eq!(decode_date(wire), (y, m, d));
        }
    }

    #[test]
    fn time_round_trip() {
        let wire = encode_time(13, 59, 7, 1234);
        assert_eq!(decode_time(wire), (13, 59, 7, 1234));
        assert_eq!(encode_time(0, 0, 0, 0), 0);
    }

    #[test]
    fn rescale_both_directions() {
        assert_eq!(rescale(12345, -2, -2), 12345);
        assert_eq!(rescale(12345, -2, -4), 1234500);
        assert_eq!(rescale(1234500, -4, -2), 12345);
    }

    #[test]
    fn status_vector_ok_and_error() {
        let mut buf = BytesMut::new();
        let mut w = XdrWriter::new(&mut buf);
        // clean vector: gds 0, end
        w.write_i32(codes::ISC_ARG_GDS);
        w.write_i32(0);
        w.write_i32(codes::ISC_ARG_END);
        let mut r = XdrReader::new(&buf);
        assert!(r.read_status_vector().unwrap().is_none());

        let mut buf = BytesMut::new();
        let mut w = XdrWriter::new(&mut buf);
        w.write_i32(codes::ISC_ARG_GDS);
        w.write_i32(codes::ISC_STRING_TRUNCATION);
        w.write_i32(codes::ISC_ARG_STRING);
        w.write_string("truncated");
        w.write_i32(codes::ISC_ARG_END);
        let mut r = XdrReader::new(&buf);
        let err = r.read_status_vector().unwrap().unwrap();
        assert_eq!(err.code(), codes::ISC_STRING_TRUNCATION);
    }
}

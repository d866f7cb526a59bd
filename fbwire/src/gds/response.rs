//! Server response frames.
use bytes::Bytes;

use super::{ServerError, codes};
use crate::{
    value::{Descriptor, Value, read_row},
    xdr::{DecodeResult, XdrReader},
};

/// Everything a response decode needs besides the bytes themselves.
///
/// Row bearing frames are not self delimiting, the declared message format
/// drives how many bytes each field occupies.
#[derive(Debug, Default)]
pub(crate) struct DecodeContext<'a> {
    /// Negotiated protocol version, plain form (10..=16).
    pub version: i32,
    /// Output formats for the statement currently fetching.
    pub rows: Option<&'a [Descriptor]>,
}

/// `op_response`, the answer to most requests.
#[derive(Debug)]
pub struct GenericResponse {
    pub object_handle: i32,
    pub blob_id: i64,
    pub data: Bytes,
    pub error: Option<ServerError>,
}

impl GenericResponse {
    /// Split off a non warning error, keeping warnings attached.
    pub fn into_result(self) -> Result<GenericResponse, ServerError> {
        match self.error {
            Some(err) if !err.is_warning() => Err(err),
            _ => Ok(self),
        }
    }
}

/// A decoded server frame.
#[derive(Debug)]
pub enum Response {
    Generic(GenericResponse),
    /// `op_fetch_response`: one row per frame, status 100 signals end of
    /// cursor.
    Fetch {
        status: i32,
        count: i32,
        row: Option<Vec<Value>>,
    },
    /// `op_sql_response`: the singleton output row of `op_execute2`.
    Sql { row: Option<Vec<Value>> },
    /// `op_trusted_auth` / auth data piggybacking.
    Auth(Bytes),
    /// `op_cont_auth`: the server wants another authentication round.
    ContAuth {
        data: Bytes,
        plugin: String,
        authenticated: bool,
        keys: Bytes,
    },
    /// `op_crypt_key_callback`: database side encryption key request.
    CryptKeyCallback { data: Bytes, size: i32 },
    /// An operation this exchange does not understand.
    Unknown(i32),
}

impl Response {
    /// Decode the frame body following the already consumed operation code.
    pub(crate) fn decode(
        op: i32,
        r: &mut XdrReader<'_>,
        ctx: &DecodeContext<'_>,
    ) -> DecodeResult<Response> {
        match op {
            codes::OP_RESPONSE => Ok(Response::Generic(GenericResponse {
                object_handle: r.read_i32()?,
                blob_id: r.read_i64()?,
                data: r.read_buffer()?,
                error: r.read_status_vector()?,
            })),
            codes::OP_FETCH_RESPONSE => {
                let status = r.read_i32()?;
                let count = r.read_i32()?;
                let row = match (count > 0 && status == 0, ctx.rows) {
                    (true, Some(rows)) => Some(read_row(r, rows, ctx.version >= 13)?),
                    _ => None,
                };
                Ok(Response::Fetch { status, count, row })
            }
            codes::OP_SQL_RESPONSE => {
                let count = r.read_i32()?;
                let row = match (count > 0, ctx.rows) {
                    (true, Some(rows)) => Some(read_row(r, rows, ctx.version >= 13)?),
                    _ => None,
                };
                Ok(Response::Sql { row })
            }
            codes::OP_TRUSTED_AUTH => Ok(Response::Auth(r.read_buffer()?)),
            codes::OP_CONT_AUTH => Ok(Response::ContAuth {
                data: r.read_buffer()?,
                plugin: r.read_string()?,
                authenticated: r.read_bool()?,
                keys: r.read_buffer()?,
            }),
            codes::OP_CRYPT_KEY_CALLBACK => {
                let data = r.read_buffer()?;
                let size = if ctx.version >= 15 { r.read_i32()? } else { 0 };
                Ok(Response::CryptKeyCallback { data, size })
            }
            other => Ok(Response::Unknown(other)),
        }
    }

    /// Unwrap a generic response, rejecting anything else.
    pub(crate) fn into_generic(self) -> crate::Result<GenericResponse> {
        match self {
            Response::Generic(resp) => Ok(resp.into_result()?),
            Response::Unknown(op) => Err(super::ProtocolError::UnexpectedOperation(op).into()),
            _ => Err(super::ProtocolError::Malformed("expected op_response").into()),
        }
    }
}

#[cfg(test)]
mod test {
    use bytes::BytesMut;

    use super::*;
    use crate::xdr::XdrWriter;

    #[test]
    fn generic_response_decodes() {
        let mut buf = BytesMut::new();
        let mut w = XdrWriter::new(&mut buf);
        w.write_i32(7);
        w.write_i64(0);
        w.write_buffer(Some(b"info"));
        w.write_i32(codes::ISC_ARG_GDS);
        w.write_i32(0);
        w.write_i32(codes::ISC_ARG_END);

        let mut r = XdrReader::new(&buf);
        let ctx = DecodeContext { version: 13, rows: None };
        let resp = Response::decode(codes::OP_RESPONSE, &mut r, &ctx).unwrap();
        let generic = resp.into_generic().unwrap();
        assert_eq!(generic.object_handle, 7);
        assert_eq!(generic.data.as_ref(), b"info");
        assert_eq!(r.consumed(), buf.len());
    }

    #[test]
    fn generic_response_surfaces_server_error() {
        let mut buf = BytesMut::new();
        let mut w = XdrWriter::new(&mut buf);
        w.write_i32(0);
        w.write_i64(0);
        w.write_buffer(None);
        w.write_i32(codes::ISC_ARG_GDS);
        w.write_i32(codes::ISC_ARITH_EXCEPT);
        w.write_i32(codes::ISC_ARG_END);

        let mut r = XdrReader::new(&buf);
        let ctx = DecodeContext { version: 13, rows: None };
        let resp = Response::decode(codes::OP_RESPONSE, &mut r, &ctx).unwrap();
        assert!(resp.into_generic().is_err());
    }

    #[test]
    fn fetch_end_of_cursor() {
        let mut buf = BytesMut::new();
        let mut w = XdrWriter::new(&mut buf);
        w.write_i32(100);
        w.write_i32(0);

        let mut r = XdrReader::new(&buf);
        let ctx = DecodeContext { version: 13, rows: Some(&[]) };
        match Response::decode(codes::OP_FETCH_RESPONSE, &mut r, &ctx).unwrap() {
            Response::Fetch { status: 100, count: 0, row: None } => {}
            other => panic!("unexpected response: {other:?}"),
        }
    }
}

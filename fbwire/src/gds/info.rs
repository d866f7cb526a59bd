//! Information call buffers.
//!
//! Info responses are sequences of clusters: a one byte item code, a two
//! byte little endian length, then the value. Integers inside use VAX
//! (little endian) byte order regardless of the XDR framing around them.
use super::{ProtocolError, codes};
use crate::value::Descriptor;

/// Items requested while preparing: output row format then parameter
/// format.
pub(crate) const DESCRIBE_AND_BIND_ITEMS: &[u8] = &[
    codes::ISC_INFO_SQL_SELECT,
    codes::ISC_INFO_SQL_DESCRIBE_VARS,
    codes::ISC_INFO_SQL_SQLDA_SEQ,
    codes::ISC_INFO_SQL_TYPE,
    codes::ISC_INFO_SQL_SUB_TYPE,
    codes::ISC_INFO_SQL_LENGTH,
    codes::ISC_INFO_SQL_SCALE,
    codes::ISC_INFO_SQL_FIELD,
    codes::ISC_INFO_SQL_RELATION,
    codes::ISC_INFO_SQL_ALIAS,
    codes::ISC_INFO_SQL_DESCRIBE_END,
    codes::ISC_INFO_SQL_BIND,
    codes::ISC_INFO_SQL_DESCRIBE_VARS,
    codes::ISC_INFO_SQL_SQLDA_SEQ,
    codes::ISC_INFO_SQL_TYPE,
    codes::ISC_INFO_SQL_SUB_TYPE,
    codes::ISC_INFO_SQL_LENGTH,
    codes::ISC_INFO_SQL_SCALE,
    codes::ISC_INFO_SQL_FIELD,
    codes::ISC_INFO_SQL_RELATION,
    codes::ISC_INFO_SQL_ALIAS,
    codes::ISC_INFO_SQL_DESCRIBE_END,
];

pub(crate) const STATEMENT_TYPE_ITEMS: &[u8] = &[codes::ISC_INFO_SQL_STMT_TYPE];

pub(crate) const ROWS_AFFECTED_ITEMS: &[u8] = &[codes::ISC_INFO_SQL_RECORDS];

/// Little endian integer of `len` bytes.
pub fn vax_integer(buf: &[u8], pos: usize, len: usize) -> i32 {
    let mut value = 0i32;
    let mut shift = 0;
    for &b in buf.iter().skip(pos).take(len) {
        value += (b as i32) << shift;
        shift += 8;
    }
    value
}

/// Split an info reply into `(item, data)` clusters, stopping at the end
/// or truncation marker.
pub fn clusters(buf: &[u8]) -> Vec<(u8, &[u8])> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < buf.len() {
        let item = buf[pos];
        if item == codes::ISC_INFO_END || item == codes::ISC_INFO_TRUNCATED {
            break;
        }
        let len = vax_integer(buf, pos + 1, 2) as usize;
        let Some(data) = buf.get(pos + 3..pos + 3 + len) else { break };
        out.push((item, data));
        pos += 3 + len;
    }
    out
}

/// Extract the statement type from an `isc_info_sql_stmt_type` reply.
pub(crate) fn statement_type(buffer: &[u8]) -> i32 {
    let mut stmt_type = 0;
    let mut pos = 0;
    while pos < buffer.len() && buffer[pos] != codes::ISC_INFO_END {
        let item = buffer[pos];
        pos += 1;
        let len = vax_integer(buffer, pos, 2) as usize;
        pos += 2;
        if item == codes::ISC_INFO_SQL_STMT_TYPE {
            stmt_type = vax_integer(buffer, pos, len);
        }
        pos += len;
    }
    stmt_type
}

/// Sum the insert, update and delete counts from an `isc_info_sql_records`
/// reply.
pub(crate) fn rows_affected(buffer: &[u8]) -> i32 {
    let mut total = 0;
    let mut pos = 0;
    while pos < buffer.len() && buffer[pos] != codes::ISC_INFO_END {
        let item = buffer[pos];
        pos += 1;
        let len = vax_integer(buffer, pos, 2) as usize;
        pos += 2;
        if item == codes::ISC_INFO_SQL_RECORDS {
            while pos < buffer.len() && buffer[pos] != codes::ISC_INFO_END {
                let counter = buffer[pos];
                pos += 1;
                let l = vax_integer(buffer, pos, 2) as usize;
                pos += 2;
                match counter {
                    codes::ISC_INFO_REQ_INSERT_COUNT
                    | codes::ISC_INFO_REQ_UPDATE_COUNT
                    | codes::ISC_INFO_REQ_DELETE_COUNT => {
                        total += vax_integer(buffer, pos, l);
                    }
                    _ => {}
                }
                pos += l;
            }
            break;
        }
        pos += len;
    }
    total
}

/// Incremental parser for the describe and bind info reply.
///
/// Large row formats overflow the info buffer; the server then marks the
/// reply truncated and the request must be repeated with an
/// `isc_info_sql_sqlda_start` restart index per block. [`SqlInfoParser::feed`]
/// returns the rebuilt item buffer when such a round trip is needed.
#[derive(Debug, Default)]
pub(crate) struct SqlInfoParser {
    blocks: [Option<Vec<Descriptor>>; 2],
}

impl SqlInfoParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fields then parameters.
    pub fn finish(self) -> (Vec<Descriptor>, Vec<Descriptor>) {
        let [fields, params] = self.blocks;
        (fields.unwrap_or_default(), params.unwrap_or_default())
    }

    pub fn feed(&mut self, info: &[u8]) -> crate::Result<Option<Vec<u8>>> {
        let mut pos = 0usize;
        let mut block: usize = usize::MAX;
        let mut seq: usize = 0;

        macro_rules! cluster {
            () => {{
                let len = vax_integer(info, pos, 2) as usize;
                pos += 2;
                let start = pos;
                pos += len;
                if pos > info.len() {
                    return Err(ProtocolError::Malformed("info cluster out of bounds").into());
                }
                &info[start..start + len]
            }};
        }

        while pos < info.len() && info[pos] != codes::ISC_INFO_END {
            loop {
                let item = *info
                    .get(pos)
                    .ok_or(ProtocolError::Malformed("info buffer ends without isc_info_end"))?;
                pos += 1;
                if item == codes::ISC_INFO_SQL_DESCRIBE_END {
                    break;
                }
                match item {
                    codes::ISC_INFO_TRUNCATED => {
                        return Ok(Some(self.restart_items(block, seq.saturating_sub(1))));
                    }
                    codes::ISC_INFO_SQL_SELECT | codes::ISC_INFO_SQL_BIND => {
                        block = block.wrapping_add(1);
                        if info.get(pos) == Some(&codes::ISC_INFO_TRUNCATED) {
                            continue;
                        }
                        // skip isc_info_sql_describe_vars
                        pos += 1;
                        let data = cluster!();
                        if self.blocks[block].is_none() {
                            let n = vax_integer(data, 0, data.len()) as usize;
                            self.blocks[block] = Some(vec![Descriptor::default(); n]);
                            if n == 0 {
                                break;
                            }
                        }
                    }
                    codes::ISC_INFO_SQL_SQLDA_SEQ => {
                        let data = cluster!();
                        seq = vax_integer(data, 0, data.len()) as usize;
                    }
                    codes::ISC_INFO_SQL_TYPE => {
                        let data = cluster!();
                        self.current(block, seq)?.data_type = vax_integer(data, 0, data.len()) as i16;
                    }
                    codes::ISC_INFO_SQL_SUB_TYPE => {
                        let data = cluster!();
                        self.current(block, seq)?.sub_type = vax_integer(data, 0, data.len()) as i16;
                    }
                    codes::ISC_INFO_SQL_SCALE => {
                        let data = cluster!();
                        self.current(block, seq)?.scale = vax_integer(data, 0, data.len()) as i8;
                    }
                    codes::ISC_INFO_SQL_LENGTH => {
                        let data = cluster!();
                        self.current(block, seq)?.length = vax_integer(data, 0, data.len()) as i16;
                    }
                    codes::ISC_INFO_SQL_FIELD => {
                        let data = cluster!();
                        self.current(block, seq)?.field = Some(String::from_utf8_lossy(data).into_owned());
                    }
                    codes::ISC_INFO_SQL_RELATION => {
                        let data = cluster!();
                        self.current(block, seq)?.relation = Some(String::from_utf8_lossy(data).into_owned());
                    }
                    codes::ISC_INFO_SQL_OWNER => {
                        let data = cluster!();
                        self.current(block, seq)?.owner = Some(String::from_utf8_lossy(data).into_owned());
                    }
                    codes::ISC_INFO_SQL_ALIAS => {
                        let data = cluster!();
                        self.current(block, seq)?.alias = Some(String::from_utf8_lossy(data).into_owned());
                    }
                    _ => {
                        let _ = cluster!();
                    }
                }
            }
        }

        Ok(None)
    }

    fn current(&mut self, block: usize, seq: usize) -> Result<&mut Descriptor, ProtocolError> {
        self.blocks
            .get_mut(block)
            .and_then(|b| b.as_mut())
            .and_then(|descs| descs.get_mut(seq.wrapping_sub(1)))
            .ok_or(ProtocolError::Malformed("descriptor index out of range"))
    }

    /// Items for the retry round: each block prefixed with the index the
    /// server should resume describing from.
    fn restart_items(&self, block: usize, seq: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(DESCRIBE_AND_BIND_ITEMS.len() + 8);
        let mut part = 0usize;
        let mut at_block_start = true;
        for &b in DESCRIBE_AND_BIND_ITEMS {
            if at_block_start {
                let resume = if part == block {
                    seq
                } else {
                    self.blocks[part].as_ref().map_or(0, Vec::len)
                };
                out.push(codes::ISC_INFO_SQL_SQLDA_START);
                out.push(2);
                out.push((resume & 255) as u8);
                out.push((resume >> 8) as u8);
                at_block_start = false;
            }
            out.push(b);
            if b == codes::ISC_INFO_SQL_DESCRIBE_END {
                part += 1;
                at_block_start = true;
            }
        }
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn cluster(out: &mut Vec<u8>, item: u8, data: &[u8]) {
        out.push(item);
        out.push((data.len() & 255) as u8);
        out.push((data.len() >> 8) as u8);
        out.extend_from_slice(data);
    }

    #[test]
    fn vax_integers() {
        assert_eq!(vax_integer(&[0x2c, 0x01], 0, 2), 300);
        assert_eq!(vax_integer(&[0xff, 0x2c, 0x01, 0xff], 1, 2), 300);
        assert_eq!(vax_integer(&[0x01], 0, 1), 1);
        assert_eq!(vax_integer(&[], 0, 0), 0);
    }

    #[test]
    fn cluster_walk_stops_at_end() {
        let mut buf = Vec::new();
        cluster(&mut buf, codes::ISC_INFO_ODS_VERSION, &[13, 0, 0, 0]);
        cluster(&mut buf, codes::ISC_INFO_ODS_MINOR_VERSION, &[1, 0, 0, 0]);
        buf.push(codes::ISC_INFO_END);
        cluster(&mut buf, codes::ISC_INFO_DB_SQL_DIALECT, &[3]);

        let clusters = clusters(&buf);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].0, codes::ISC_INFO_ODS_VERSION);
        assert_eq!(vax_integer(clusters[0].1, 0, 4), 13);
        assert_eq!(vax_integer(clusters[1].1, 0, 4), 1);
    }

    #[test]
    fn statement_type_buffer() {
        let mut buf = Vec::new();
        cluster(&mut buf, codes::ISC_INFO_SQL_STMT_TYPE, &[codes::ISC_INFO_SQL_STMT_SELECT as u8]);
        buf.push(codes::ISC_INFO_END);
        assert_eq!(statement_type(&buf), codes::ISC_INFO_SQL_STMT_SELECT);
    }

    #[test]
    fn rows_affected_sums_write_counts() {
        let mut inner = Vec::new();
        cluster(&mut inner, codes::ISC_INFO_REQ_INSERT_COUNT, &[3, 0, 0, 0]);
        cluster(&mut inner, codes::ISC_INFO_REQ_UPDATE_COUNT, &[2, 0, 0, 0]);
        cluster(&mut inner, codes::ISC_INFO_REQ_DELETE_COUNT, &[1, 0, 0, 0]);
        cluster(&mut inner, codes::ISC_INFO_REQ_SELECT_COUNT, &[9, 0, 0, 0]);
        inner.push(codes::ISC_INFO_END);

        let mut buf = Vec::new();
        cluster(&mut buf, codes::ISC_INFO_SQL_RECORDS, &inner);
        buf.push(codes::ISC_INFO_END);
        assert_eq!(rows_affected(&buf), 6);
    }

    fn describe_block(out: &mut Vec<u8>, opener: u8, descs: &[(i16, i16, i16, &str)]) {
        out.push(opener);
        out.push(codes::ISC_INFO_SQL_DESCRIBE_VARS);
        out.push(4);
        out.push(0);
        out.extend_from_slice(&(descs.len() as i32).to_le_bytes());
        for (i, (ty, scale, length, alias)) in descs.iter().enumerate() {
            cluster(out, codes::ISC_INFO_SQL_SQLDA_SEQ, &(i as i32 + 1).to_le_bytes());
            cluster(out, codes::ISC_INFO_SQL_TYPE, &ty.to_le_bytes());
            cluster(out, codes::ISC_INFO_SQL_SCALE, &scale.to_le_bytes());
            cluster(out, codes::ISC_INFO_SQL_LENGTH, &length.to_le_bytes());
            cluster(out, codes::ISC_INFO_SQL_ALIAS, alias.as_bytes());
        }
        out.push(codes::ISC_INFO_SQL_DESCRIBE_END);
    }

    #[test]
    fn parses_fields_and_parameters() {
        let mut buf = Vec::new();
        describe_block(
            &mut buf,
            codes::ISC_INFO_SQL_SELECT,
            &[(codes::SQL_VARYING + 1, 0, 20, "NAME"), (codes::SQL_INT64, -2, 8, "PRICE")],
        );
        describe_block(&mut buf, codes::ISC_INFO_SQL_BIND, &[(codes::SQL_LONG, 0, 4, "ID")]);
        buf.push(codes::ISC_INFO_END);

        let mut parser = SqlInfoParser::new();
        assert!(parser.feed(&buf).unwrap().is_none());
        let (fields, params) = parser.finish();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].sql_type(), codes::SQL_VARYING);
        assert_eq!(fields[0].alias.as_deref(), Some("NAME"));
        assert_eq!(fields[1].scale, -2);
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].sql_type(), codes::SQL_LONG);
    }

    #[test]
    fn truncated_reply_requests_restart() {
        let mut buf = Vec::new();
        describe_block(
            &mut buf,
            codes::ISC_INFO_SQL_SELECT,
            &[(codes::SQL_LONG, 0, 4, "A"), (codes::SQL_LONG, 0, 4, "B")],
        );
        // reply cut short in the middle of the bind block
        buf.push(codes::ISC_INFO_TRUNCATED);

        let mut parser = SqlInfoParser::new();
        let items = parser.feed(&buf).unwrap().expect("restart expected");
        assert_eq!(items[0], codes::ISC_INFO_SQL_SQLDA_START);
        assert_eq!(items[1], 2);

        // retry carries only the bind block contents
        let mut retry = Vec::new();
        describe_block(&mut retry, codes::ISC_INFO_SQL_BIND, &[(codes::SQL_SHORT, 0, 2, "P")]);
        retry.push(codes::ISC_INFO_END);
        // select block appears again with its count, already allocated
        let mut full = Vec::new();
        describe_block(&mut full, codes::ISC_INFO_SQL_SELECT, &[(codes::SQL_LONG, 0, 4, "A"), (codes::SQL_LONG, 0, 4, "B")]);
        full.extend_from_slice(&retry);
        assert!(parser.feed(&full).unwrap().is_none());

        let (fields, params) = parser.finish();
        assert_eq!(fields.len(), 2);
        assert_eq!(params.len(), 1);
    }
}

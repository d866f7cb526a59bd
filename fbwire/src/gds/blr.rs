//! BLR message format generation.
//!
//! Execute and fetch requests carry a small BLR program describing the
//! layout of the row that follows. Each field contributes its own type
//! code plus a null indicator short.
use super::codes;
use crate::value::Descriptor;

/// Build the BLR describing one message holding `descriptors` fields.
pub(crate) fn build(descriptors: &[Descriptor]) -> crate::Result<Vec<u8>> {
    let count = descriptors.len() * 2;
    let mut blr = Vec::with_capacity(8 + descriptors.len() * 4);
    blr.push(codes::BLR_VERSION5);
    blr.push(codes::BLR_BEGIN);
    blr.push(codes::BLR_MESSAGE);
    blr.push(0);
    blr.push((count & 255) as u8);
    blr.push((count >> 8) as u8);

    for desc in descriptors {
        let scale = desc.scale as u8;
        match desc.sql_type() {
            codes::SQL_VARYING => {
                blr.push(codes::BLR_VARYING);
                blr.push((desc.length & 255) as u8);
                blr.push((desc.length >> 8) as u8);
            }
            codes::SQL_TEXT => {
                blr.push(codes::BLR_TEXT);
                blr.push((desc.length & 255) as u8);
                blr.push((desc.length >> 8) as u8);
            }
            codes::SQL_DOUBLE => blr.push(codes::BLR_DOUBLE),
            codes::SQL_FLOAT => blr.push(codes::BLR_FLOAT),
            codes::SQL_D_FLOAT => blr.push(codes::BLR_D_FLOAT),
            codes::SQL_TYPE_DATE => blr.push(codes::BLR_SQL_DATE),
            codes::SQL_TYPE_TIME => blr.push(codes::BLR_SQL_TIME),
            codes::SQL_TIMESTAMP => blr.push(codes::BLR_TIMESTAMP),
            codes::SQL_BLOB | codes::SQL_ARRAY => {
                blr.push(codes::BLR_QUAD);
                blr.push(0);
            }
            codes::SQL_SHORT => {
                blr.push(codes::BLR_SHORT);
                blr.push(scale);
            }
            codes::SQL_LONG => {
                blr.push(codes::BLR_LONG);
                blr.push(scale);
            }
            codes::SQL_INT64 => {
                blr.push(codes::BLR_INT64);
                blr.push(scale);
            }
            codes::SQL_QUAD => {
                blr.push(codes::BLR_QUAD);
                blr.push(scale);
            }
            codes::SQL_BOOLEAN => blr.push(codes::BLR_BOOL),
            _ => {
                return Err(super::ProtocolError::Malformed("unknown data type in message format").into())
            }
        }
        // null indicator
        blr.push(codes::BLR_SHORT);
        blr.push(0);
    }

    blr.push(codes::BLR_END);
    blr.push(codes::BLR_EOC);
    Ok(blr)
}

#[cfg(test)]
mod test {
    use super::*;

    fn desc(ty: i16, length: i16, scale: i8) -> Descriptor {
        Descriptor { data_type: ty, sub_type: 0, scale, length, field: None, relation: None, owner: None, alias: None }
    }

    #[test]
    fn empty_message() {
        let blr = build(&[]).unwrap();
        assert_eq!(
            blr,
            vec![
                codes::BLR_VERSION5,
                codes::BLR_BEGIN,
                codes::BLR_MESSAGE,
                0,
                0,
                0,
                codes::BLR_END,
                codes::BLR_EOC,
            ],
        );
    }

    #[test]
    fn varchar_and_scaled_int64() {
        let blr = build(&[desc(codes::SQL_VARYING, 300, 0), desc(codes::SQL_INT64, 8, -2)]).unwrap();
        // count is fields * 2 for the null indicator shorts
        assert_eq!(&blr[4..6], &[4, 0]);
        assert_eq!(&blr[6..9], &[codes::BLR_VARYING, 44, 1]);
        assert_eq!(&blr[9..11], &[codes::BLR_SHORT, 0]);
        assert_eq!(&blr[11..13], &[codes::BLR_INT64, (-2i8) as u8]);
    }

    #[test]
    fn nullable_flag_is_masked() {
        // type 449 is varying with the nullable bit set
        let blr = build(&[desc(449, 10, 0)]).unwrap();
        assert_eq!(blr[6], codes::BLR_VARYING);
    }
}

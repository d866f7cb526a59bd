//! Parameter buffers.
//!
//! Attach, transaction, service and event requests all carry a tagged
//! buffer of options. The framing differs slightly per buffer family:
//! database and service attach buffers use one byte cluster lengths,
//! service start and query buffers use two byte little endian lengths,
//! transaction buffers are mostly bare tags. Integers inside clusters are
//! VAX (little endian) regardless of the XDR framing outside.
use crate::gds::codes;

#[derive(Debug, Clone, Copy, PartialEq)]
enum LengthStyle {
    /// tag, u8 length, data
    Byte,
    /// tag, u16 little endian length, data
    Word,
}

/// An accumulating tagged option buffer.
#[derive(Debug)]
pub struct ParamBuffer {
    buf: Vec<u8>,
    style: LengthStyle,
}

impl ParamBuffer {
    /// Database parameter buffer, version 1.
    pub fn dpb() -> Self {
        Self { buf: vec![codes::ISC_DPB_VERSION1], style: LengthStyle::Byte }
    }

    /// Transaction parameter buffer, version 3.
    pub fn tpb() -> Self {
        Self { buf: vec![codes::ISC_TPB_VERSION3], style: LengthStyle::Byte }
    }

    /// Service attach parameter buffer, version 2.
    pub fn spb_attach() -> Self {
        Self {
            buf: vec![codes::ISC_SPB_VERSION, codes::ISC_SPB_VERSION],
            style: LengthStyle::Byte,
        }
    }

    /// Service start or query buffer: no version prefix, word lengths.
    pub fn spb() -> Self {
        Self { buf: Vec::new(), style: LengthStyle::Word }
    }

    /// Event parameter buffer, version 1.
    pub fn epb() -> Self {
        Self { buf: vec![codes::EPB_VERSION1], style: LengthStyle::Byte }
    }

    /// Connect phase user identification buffer: no version prefix.
    pub fn cnct() -> Self {
        Self { buf: Vec::new(), style: LengthStyle::Byte }
    }

    /// A bare flag without argument.
    pub fn tag(&mut self, tag: u8) -> &mut Self {
        self.buf.push(tag);
        self
    }

    pub fn bytes(&mut self, tag: u8, data: &[u8]) -> &mut Self {
        self.buf.push(tag);
        match self.style {
            LengthStyle::Byte => {
                debug_assert!(data.len() <= u8::MAX as usize);
                self.buf.push(data.len() as u8);
            }
            LengthStyle::Word => {
                self.buf.extend_from_slice(&(data.len() as u16).to_le_bytes());
            }
        }
        self.buf.extend_from_slice(data);
        self
    }

    pub fn str(&mut self, tag: u8, value: &str) -> &mut Self {
        self.bytes(tag, value.as_bytes())
    }

    pub fn byte(&mut self, tag: u8, value: u8) -> &mut Self {
        self.bytes(tag, &[value])
    }

    /// Little endian integer argument.
    pub fn i32(&mut self, tag: u8, value: i32) -> &mut Self {
        self.bytes(tag, &value.to_le_bytes())
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dpb_clusters() {
        let mut dpb = ParamBuffer::dpb();
        dpb.str(codes::ISC_DPB_USER_NAME, "SYSDBA")
            .i32(codes::ISC_DPB_SQL_DIALECT, 3);
        let buf = dpb.as_slice();
        assert_eq!(buf[0], codes::ISC_DPB_VERSION1);
        assert_eq!(buf[1], codes::ISC_DPB_USER_NAME);
        assert_eq!(buf[2], 6);
        assert_eq!(&buf[3..9], b"SYSDBA");
        assert_eq!(buf[9], codes::ISC_DPB_SQL_DIALECT);
        assert_eq!(&buf[10..15], &[4, 3, 0, 0, 0]);
    }

    #[test]
    fn tpb_bare_tags() {
        let mut tpb = ParamBuffer::tpb();
        tpb.tag(codes::ISC_TPB_WRITE)
            .tag(codes::ISC_TPB_CONCURRENCY)
            .tag(codes::ISC_TPB_WAIT);
        assert_eq!(
            tpb.as_slice(),
            &[
                codes::ISC_TPB_VERSION3,
                codes::ISC_TPB_WRITE,
                codes::ISC_TPB_CONCURRENCY,
                codes::ISC_TPB_WAIT,
            ],
        );
    }

    #[test]
    fn spb_word_lengths() {
        let mut spb = ParamBuffer::spb();
        spb.bytes(codes::ISC_SPB_DBNAME, b"employee");
        assert_eq!(spb.as_slice()[..3], [codes::ISC_SPB_DBNAME, 8, 0]);
    }

    #[test]
    fn spb_attach_version_prefix() {
        let spb = ParamBuffer::spb_attach();
        assert_eq!(spb.as_slice(), &[2, 2]);
    }

    #[test]
    fn epb_byte_length_clusters() {
        let mut epb = ParamBuffer::epb();
        epb.bytes(5, b"POST");
        assert_eq!(epb.as_slice(), &[codes::EPB_VERSION1, 5, 4, b'P', b'O', b'S', b'T']);
    }
}

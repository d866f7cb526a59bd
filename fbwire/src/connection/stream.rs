//! Buffered wire stream with the negotiated transforms.
use std::{
    fmt, io,
    num::NonZeroUsize,
    task::{Context, Poll},
};

use bytes::{Buf, BytesMut};
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress};
use lru::LruCache;
use rc4::{KeyInit, Rc4, StreamCipher, consts::U20};

use super::{Caps, Config};
use crate::{
    common::verbose,
    gds::{Response, codes, response::DecodeContext},
    net::Socket,
    transport::FbTransport,
    value::Descriptor,
    xdr::{DecodeResult, Incomplete, XdrReader, XdrWriter},
};

const DEFAULT_BUF_CAPACITY: usize = 1024;

/// Prepared statement handles kept alive for reuse, keyed by a hash of the
/// source text.
const STMT_CACHE_SIZE: NonZeroUsize = NonZeroUsize::new(24).unwrap();

/// Arc4 state for both directions. The cipher is symmetric but each
/// direction keeps its own keystream position.
struct CryptPair {
    encrypt: Rc4<U20>,
    decrypt: Rc4<U20>,
}

/// One zlib stream per direction, alive for the rest of the connection.
struct ZlibPair {
    compress: Compress,
    decompress: Decompress,
}

impl ZlibPair {
    fn new() -> Self {
        Self {
            compress: Compress::new(Compression::default(), true),
            decompress: Decompress::new(true),
        }
    }
}

/// Buffered connection to a Firebird server.
///
/// Requests accumulate as plaintext in `write_buf`; a flush runs them
/// through the compression and encryption transforms into `out_buf` and
/// writes that to the socket. Inbound bytes take the reverse path through
/// `raw_buf` into `read_buf`, which only ever holds plaintext frames.
pub struct FbStream {
    socket: Socket,
    read_buf: BytesMut,
    raw_buf: BytesMut,
    write_buf: BytesMut,
    out_buf: BytesMut,
    caps: Caps,
    db_handle: i32,
    dialect: i32,
    /// Responses deliberately left unread by lazy operations.
    deferred: usize,
    crypt: Option<CryptPair>,
    zlib: Option<ZlibPair>,
    stmts: LruCache<u64, i32>,
}

impl FbStream {
    pub(crate) async fn connect(config: &Config) -> crate::Result<FbStream> {
        let socket = Socket::connect_tcp(config.host.as_str(), config.port).await?;

        Ok(Self {
            socket,
            read_buf: BytesMut::with_capacity(DEFAULT_BUF_CAPACITY),
            raw_buf: BytesMut::with_capacity(DEFAULT_BUF_CAPACITY),
            write_buf: BytesMut::with_capacity(DEFAULT_BUF_CAPACITY),
            out_buf: BytesMut::with_capacity(DEFAULT_BUF_CAPACITY),
            caps: Caps::default(),
            db_handle: 0,
            dialect: config.dialect,
            deferred: 0,
            crypt: None,
            zlib: None,
            stmts: LruCache::new(STMT_CACHE_SIZE),
        })
    }

    pub(crate) fn set_caps(&mut self, caps: Caps) {
        self.caps = caps;
    }

    pub(crate) fn set_db_handle(&mut self, handle: i32) {
        self.db_handle = handle;
    }

    /// Install the zlib transform. Bytes already buffered stay as they
    /// are, so this must run between a fully read reply and the next
    /// write.
    pub(crate) fn enable_compression(&mut self) {
        verbose!("wire compression enabled");
        self.zlib = Some(ZlibPair::new());
        self.caps.compression = true;
    }

    /// Install the Arc4 transform with the session key. Must run after
    /// the crypt request left the socket and before its reply is read.
    pub(crate) fn enable_encryption(&mut self, key: &[u8; 20]) {
        verbose!("wire encryption enabled");
        self.crypt = Some(CryptPair {
            encrypt: Rc4::new(key.into()),
            decrypt: Rc4::new(key.into()),
        });
        self.caps.encrypted = true;
    }

    /// Decode one frame with a caller supplied decoder, used during the
    /// handshake where frames do not follow the response layouts.
    pub(crate) async fn recv_with<T>(
        &mut self,
        mut decode: impl FnMut(&mut XdrReader<'_>) -> DecodeResult<T>,
    ) -> crate::Result<T> {
        std::future::poll_fn(|cx| self.poll_recv_with(cx, &mut decode)).await
    }

    fn poll_recv_with<T>(
        &mut self,
        cx: &mut Context,
        decode: &mut impl FnMut(&mut XdrReader<'_>) -> DecodeResult<T>,
    ) -> Poll<crate::Result<T>> {
        if !self.write_buf.is_empty() || !self.out_buf.is_empty() {
            std::task::ready!(self.poll_flush(cx))?;
        }
        loop {
            self.skip_dummies();
            let mut r = XdrReader::new(&self.read_buf);
            if let Ok(value) = decode(&mut r) {
                let n = r.consumed();
                self.read_buf.advance(n);
                return Poll::Ready(Ok(value));
            }
            std::task::ready!(self.poll_read(cx))?;
        }
    }

    /// Drop `op_dummy` keepalives sitting at the front of the read buffer.
    fn skip_dummies(&mut self) {
        while self.read_buf.len() >= 4 && {
            let mut r = XdrReader::new(&self.read_buf);
            r.read_i32() == Ok(codes::OP_DUMMY)
        } {
            self.read_buf.advance(4);
        }
    }

    /// Try to decode one complete frame from the read buffer. The buffer
    /// only advances once a whole frame decoded, a partial frame leaves it
    /// untouched.
    fn try_decode(&mut self, rows: Option<&[Descriptor]>) -> crate::Result<Option<Response>> {
        self.skip_dummies();

        let mut r = XdrReader::new(&self.read_buf);
        let Ok(op) = r.read_i32() else {
            return Ok(None);
        };

        let ctx = DecodeContext { version: self.caps.version, rows };
        match Response::decode(op, &mut r, &ctx) {
            Ok(resp) => {
                let n = r.consumed();
                self.read_buf.advance(n);
                Ok(Some(resp))
            }
            Err(Incomplete) => Ok(None),
        }
    }

    /// Move pending plaintext through the transforms into the outgoing
    /// buffer.
    fn transform_pending(&mut self) -> io::Result<()> {
        if self.write_buf.is_empty() {
            return Ok(());
        }

        match &mut self.zlib {
            Some(zlib) => {
                let mut packed = Vec::with_capacity(self.write_buf.len() + 64);
                deflate(&mut zlib.compress, &self.write_buf, &mut packed)?;
                self.write_buf.clear();
                if let Some(crypt) = &mut self.crypt {
                    crypt.encrypt.apply_keystream(&mut packed);
                }
                self.out_buf.extend_from_slice(&packed);
            }
            None => {
                let mut chunk = self.write_buf.split();
                if let Some(crypt) = &mut self.crypt {
                    crypt.encrypt.apply_keystream(&mut chunk);
                }
                self.out_buf.unsplit(chunk);
            }
        }
        Ok(())
    }

    fn poll_read(&mut self, cx: &mut Context) -> Poll<io::Result<()>> {
        #[cfg(feature = "tokio")]
        {
            use std::{pin::Pin, task::ready};

            use bytes::BufMut;
            use tokio::io::{AsyncRead, ReadBuf};

            let n = {
                self.raw_buf.reserve(DEFAULT_BUF_CAPACITY);
                let dst = self.raw_buf.chunk_mut();
                let dst = unsafe { dst.as_uninit_slice_mut() };
                let mut buf = ReadBuf::uninit(dst);
                let ptr = buf.filled().as_ptr();
                ready!(Pin::new(&mut self.socket).poll_read(cx, &mut buf)?);

                // Ensure the pointer does not change from under us
                assert_eq!(ptr, buf.filled().as_ptr());
                buf.filled().len()
            };

            if n == 0 {
                return Poll::Ready(Err(io::ErrorKind::UnexpectedEof.into()));
            }

            // Safety: This is guaranteed to be the number of initialized
            // (and read) bytes due to the invariants provided by
            // `ReadBuf::filled`.
            unsafe {
                self.raw_buf.advance_mut(n);
            }

            let mut chunk = self.raw_buf.split();
            if let Some(crypt) = &mut self.crypt {
                crypt.decrypt.apply_keystream(&mut chunk);
            }
            match &mut self.zlib {
                Some(zlib) => {
                    let mut plain = Vec::with_capacity(chunk.len() * 2);
                    inflate(&mut zlib.decompress, &chunk, &mut plain)?;
                    self.read_buf.extend_from_slice(&plain);
                }
                None => self.read_buf.unsplit(chunk),
            }

            Poll::Ready(Ok(()))
        }

        #[cfg(not(feature = "tokio"))]
        {
            let _ = cx;
            panic!("runtime disabled")
        }
    }
}

impl FbTransport for FbStream {
    fn poll_flush(&mut self, cx: &mut Context) -> Poll<io::Result<()>> {
        #[cfg(feature = "tokio")]
        {
            use std::{pin::Pin, task::ready};

            use tokio::io::AsyncWrite;

            self.transform_pending()?;
            while !self.out_buf.is_empty() {
                let n = ready!(Pin::new(&mut self.socket).poll_write(cx, &self.out_buf)?);
                if n == 0 {
                    return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
                }
                self.out_buf.advance(n);
            }
            Pin::new(&mut self.socket).poll_flush(cx)
        }

        #[cfg(not(feature = "tokio"))]
        {
            let _ = cx;
            panic!("runtime disabled")
        }
    }

    fn poll_recv(&mut self, cx: &mut Context, rows: Option<&[Descriptor]>) -> Poll<crate::Result<Response>> {
        if !self.write_buf.is_empty() || !self.out_buf.is_empty() {
            std::task::ready!(self.poll_flush(cx))?;
        }
        loop {
            // every deferred acknowledgement precedes the caller's frame
            while self.deferred != 0 {
                match self.try_decode(None)? {
                    Some(resp) => {
                        self.deferred -= 1;
                        resp.into_generic()?;
                    }
                    None => break,
                }
            }

            if self.deferred == 0
                && let Some(resp) = self.try_decode(rows)?
            {
                return Poll::Ready(Ok(resp));
            }

            std::task::ready!(self.poll_read(cx))?;
        }
    }

    fn send(&mut self, write: impl FnOnce(&mut XdrWriter<'_>)) {
        let mut w = XdrWriter::new(&mut self.write_buf);
        write(&mut w);
    }

    fn defer_ack(&mut self) {
        self.deferred += 1;
    }

    fn caps(&self) -> Caps {
        self.caps
    }

    fn db_handle(&self) -> i32 {
        self.db_handle
    }

    fn dialect(&self) -> i32 {
        self.dialect
    }

    fn get_stmt(&mut self, sql: u64) -> Option<i32> {
        self.stmts.get(&sql).copied()
    }

    fn add_stmt(&mut self, sql: u64, handle: i32) {
        if let Some((_, evicted)) = self.stmts.push(sql, handle)
            && evicted != handle
        {
            // drop the evicted handle without waiting for the response
            self.send(|w| {
                w.write_i32(codes::OP_FREE_STATEMENT);
                w.write_i32(evicted);
                w.write_i32(codes::DSQL_DROP);
            });
            self.deferred += 1;
        }
    }

    fn remove_stmt(&mut self, sql: u64) {
        self.stmts.pop(&sql);
    }
}

impl fmt::Debug for FbStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FbStream")
            .field("socket", &self.socket)
            .field("caps", &self.caps)
            .field("db_handle", &self.db_handle)
            .field("deferred", &self.deferred)
            .finish_non_exhaustive()
    }
}

/// Compress and sync flush, so the peer can decode without waiting for
/// more output.
fn deflate(z: &mut Compress, input: &[u8], out: &mut Vec<u8>) -> io::Result<()> {
    let mut pos = 0;
    loop {
        out.reserve((input.len() - pos).max(64) + 64);
        let before = z.total_in() as usize;
        z.compress_vec(&input[pos..], out, FlushCompress::Sync)
            .map_err(io::Error::other)?;
        pos += z.total_in() as usize - before;

        // spare output capacity after the call means the flush completed
        if pos == input.len() && out.len() < out.capacity() {
            return Ok(());
        }
    }
}

/// Decompress everything decodable from `input`; the zlib stream keeps
/// state across calls so a split deflate block resumes on the next read.
fn inflate(z: &mut Decompress, input: &[u8], out: &mut Vec<u8>) -> io::Result<()> {
    let mut pos = 0;
    while pos < input.len() {
        out.reserve((input.len() - pos) * 2 + 64);
        let before = z.total_in() as usize;
        z.decompress_vec(&input[pos..], out, FlushDecompress::None)
            .map_err(io::Error::other)?;
        let consumed = z.total_in() as usize - before;
        pos += consumed;

        if consumed == 0 && out.len() < out.capacity() {
            // the rest of the block has not arrived yet
            break;
        }
    }
    Ok(())
}

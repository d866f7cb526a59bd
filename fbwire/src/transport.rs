//! The [`FbTransport`] trait.
use std::{
    io,
    task::{Context, Poll},
};

use crate::{
    Result,
    connection::Caps,
    gds::Response,
    value::Descriptor,
    xdr::XdrWriter,
};

/// A buffered stream which can send and receive wire protocol frames.
pub trait FbTransport: Unpin {
    /// Poll to flush the underlying io, applying compression and
    /// encryption transforms.
    fn poll_flush(&mut self, cx: &mut Context) -> Poll<io::Result<()>>;

    /// Poll to receive a frame.
    ///
    /// Calling `poll_recv` will also try to [`poll_flush`][1] if there is
    /// buffered output, and drains the deferred response queue before
    /// decoding the caller's frame.
    ///
    /// `rows` is the message format used to decode row bearing frames,
    /// `op_dummy` keepalives are skipped.
    ///
    /// [1]: FbTransport::poll_flush
    fn poll_recv(&mut self, cx: &mut Context, rows: Option<&[Descriptor]>) -> Poll<Result<Response>>;

    /// Append a request to the send buffer.
    ///
    /// Note that this send is buffered, caller must also call
    /// [`poll_flush`][1] or [`flush`][2] afterwards.
    ///
    /// [1]: FbTransport::poll_flush
    /// [2]: FbTransportExt::flush
    fn send(&mut self, write: impl FnOnce(&mut XdrWriter<'_>));

    /// Register one response that was intentionally left unread.
    ///
    /// Lazy operations do not wait for their acknowledgement; the next
    /// [`poll_recv`][1] consumes it before anything else.
    ///
    /// [1]: FbTransport::poll_recv
    fn defer_ack(&mut self);

    /// Negotiated protocol capabilities.
    fn caps(&self) -> Caps;

    /// Handle of the attached database.
    fn db_handle(&self) -> i32;

    /// SQL dialect statements are prepared with.
    fn dialect(&self) -> i32;

    /// Check for an already allocated statement handle.
    fn get_stmt(&mut self, sql: u64) -> Option<i32>;

    /// Cache a prepared statement handle.
    fn add_stmt(&mut self, sql: u64, handle: i32);

    /// Forget a cached handle, used when the statement is dropped.
    fn remove_stmt(&mut self, sql: u64);
}

impl<P> FbTransport for &mut P where P: FbTransport {
    fn poll_flush(&mut self, cx: &mut Context) -> Poll<io::Result<()>> {
        P::poll_flush(self, cx)
    }

    fn poll_recv(&mut self, cx: &mut Context, rows: Option<&[Descriptor]>) -> Poll<Result<Response>> {
        P::poll_recv(self, cx, rows)
    }

    fn send(&mut self, write: impl FnOnce(&mut XdrWriter<'_>)) {
        P::send(self, write);
    }

    fn defer_ack(&mut self) {
        P::defer_ack(self);
    }

    fn caps(&self) -> Caps {
        P::caps(self)
    }

    fn db_handle(&self) -> i32 {
        P::db_handle(self)
    }

    fn dialect(&self) -> i32 {
        P::dialect(self)
    }

    fn get_stmt(&mut self, sql: u64) -> Option<i32> {
        P::get_stmt(self, sql)
    }

    fn add_stmt(&mut self, sql: u64, handle: i32) {
        P::add_stmt(self, sql, handle);
    }

    fn remove_stmt(&mut self, sql: u64) {
        P::remove_stmt(self, sql);
    }
}

/// An extension trait to provide `Future` API for [`FbTransport`].
pub trait FbTransportExt: FbTransport {
    /// Flush the underlying io.
    fn flush(&mut self) -> impl Future<Output = io::Result<()>> {
        std::future::poll_fn(|cx| self.poll_flush(cx))
    }

    /// Receive a frame without row data.
    fn recv(&mut self) -> impl Future<Output = Result<Response>> {
        std::future::poll_fn(|cx| self.poll_recv(cx, None))
    }

    /// Receive a frame decoding rows with the given format.
    fn recv_rows<'a>(
        &'a mut self,
        rows: &'a [Descriptor],
    ) -> impl Future<Output = Result<Response>> + 'a {
        std::future::poll_fn(move |cx| self.poll_recv(cx, Some(rows)))
    }

    /// Receive a frame and require a generic response.
    fn recv_response(&mut self) -> impl Future<Output = Result<crate::gds::GenericResponse>> {
        async { self.recv().await?.into_generic() }
    }
}

impl<T> FbTransportExt for T where T: FbTransport { }

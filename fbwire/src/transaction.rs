//! The [`Transaction`] type.
use std::{
    io,
    task::{Context, Poll},
};

use crate::{
    Result,
    buffer::ParamBuffer,
    connection::Caps,
    gds::{Response, codes},
    statement::Statement,
    transport::{FbTransport, FbTransportExt},
    value::Descriptor,
    xdr::XdrWriter,
};

/// Transaction parameter buffer for a read write, concurrency, wait
/// transaction.
pub fn default_tpb() -> ParamBuffer {
    let mut tpb = ParamBuffer::tpb();
    tpb.tag(codes::ISC_TPB_WRITE)
        .tag(codes::ISC_TPB_CONCURRENCY)
        .tag(codes::ISC_TPB_WAIT);
    tpb
}

/// An RAII implementation of transaction scope.
///
/// To commit, use [`Transaction::commit`].
///
/// If neither commited nor rolled back, dropping the transaction queues a
/// rollback on the connection; the server acknowledgement is consumed by
/// whatever reads the stream next.
///
/// # Example
///
/// ```no_run
/// # async fn test(mut conn: fbwire::Connection) -> fbwire::Result<()> {
/// let mut tx = fbwire::Transaction::begin(&mut conn).await?;
/// let handle = tx.handle();
///
/// let mut stmt = tx.prepare("insert into post(name) values('foo')").await?;
/// stmt.execute(&mut tx, handle, &[]).await?;
///
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```
pub struct Transaction<IO: FbTransport> {
    io: IO,
    handle: i32,
    commited: bool,
}

impl<IO> Transaction<IO>
where
    IO: FbTransport,
{
    /// Start a transaction with the default parameter buffer.
    pub async fn begin(io: IO) -> Result<Transaction<IO>> {
        Self::begin_with(io, &default_tpb()).await
    }

    /// Start a transaction with an explicit parameter buffer.
    pub async fn begin_with(mut io: IO, tpb: &ParamBuffer) -> Result<Transaction<IO>> {
        let db_handle = io.db_handle();
        io.send(|w| {
            w.write_i32(codes::OP_TRANSACTION);
            w.write_i32(db_handle);
            w.write_buffer(Some(tpb.as_slice()));
        });
        let resp = io.recv_response().await?;
        Ok(Transaction { io, handle: resp.object_handle, commited: false })
    }

    /// Server side transaction handle.
    pub fn handle(&self) -> i32 {
        self.handle
    }

    /// Prepare a statement inside this transaction.
    pub async fn prepare(&mut self, sql: &str) -> Result<Statement> {
        let handle = self.handle;
        Statement::prepare(&mut self.io, handle, sql).await
    }

    /// Commit transaction.
    pub async fn commit(mut self) -> Result<()> {
        self.finish(codes::OP_COMMIT).await
    }

    /// Roll the transaction back explicitly rather than through drop,
    /// surfacing any server error.
    pub async fn rollback(mut self) -> Result<()> {
        self.finish(codes::OP_ROLLBACK).await
    }

    /// Commit while keeping the transaction context alive for further
    /// work under the same handle.
    pub async fn commit_retaining(&mut self) -> Result<()> {
        self.retain(codes::OP_COMMIT_RETAINING).await
    }

    /// Roll back while keeping the transaction context alive.
    pub async fn rollback_retaining(&mut self) -> Result<()> {
        self.retain(codes::OP_ROLLBACK_RETAINING).await
    }

    async fn finish(&mut self, op: i32) -> Result<()> {
        let handle = self.handle;
        self.io.send(|w| {
            w.write_i32(op);
            w.write_i32(handle);
        });
        self.io.recv_response().await?;
        self.commited = true;
        Ok(())
    }

    async fn retain(&mut self, op: i32) -> Result<()> {
        let handle = self.handle;
        self.io.send(|w| {
            w.write_i32(op);
            w.write_i32(handle);
        });
        self.io.recv_response().await?;
        Ok(())
    }
}

impl<IO> Drop for Transaction<IO>
where
    IO: FbTransport,
{
    fn drop(&mut self) {
        if !self.commited {
            let handle = self.handle;
            self.io.send(|w| {
                w.write_i32(codes::OP_ROLLBACK);
                w.write_i32(handle);
            });
            self.io.defer_ack();
        }
    }
}

impl<IO> FbTransport for Transaction<IO>
where
    IO: FbTransport,
{
    fn poll_flush(&mut self, cx: &mut Context) -> Poll<io::Result<()>> {
        IO::poll_flush(&mut self.io, cx)
    }

    fn poll_recv(&mut self, cx: &mut Context, rows: Option<&[Descriptor]>) -> Poll<Result<Response>> {
        IO::poll_recv(&mut self.io, cx, rows)
    }

    fn send(&mut self, write: impl FnOnce(&mut XdrWriter<'_>)) {
        IO::send(&mut self.io, write)
    }

    fn defer_ack(&mut self) {
        IO::defer_ack(&mut self.io)
    }

    fn caps(&self) -> Caps {
        IO::caps(&self.io)
    }

    fn db_handle(&self) -> i32 {
        IO::db_handle(&self.io)
    }

    fn dialect(&self) -> i32 {
        IO::dialect(&self.io)
    }

    fn get_stmt(&mut self, sql: u64) -> Option<i32> {
        IO::get_stmt(&mut self.io, sql)
    }

    fn add_stmt(&mut self, sql: u64, handle: i32) {
        IO::add_stmt(&mut self.io, sql, handle)
    }

    fn remove_stmt(&mut self, sql: u64) {
        IO::remove_stmt(&mut self.io, sql)
    }
}

#[cfg(test)]
mod test {
    use bytes::{Buf, BytesMut};

    use super::*;
    use crate::gds::ProtocolError;

    struct MockIo {
        sent: BytesMut,
        deferred: usize,
        caps: Caps,
    }

    impl FbTransport for MockIo {
        fn poll_flush(&mut self, _: &mut Context) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_recv(&mut self, _: &mut Context, _: Option<&[Descriptor]>) -> Poll<Result<Response>> {
            Poll::Ready(Err(ProtocolError::Malformed("no response scripted").into()))
        }

        fn send(&mut self, write: impl FnOnce(&mut XdrWriter<'_>)) {
            write(&mut XdrWriter::new(&mut self.sent));
        }

        fn defer_ack(&mut self) {
            self.deferred += 1;
        }

        fn caps(&self) -> Caps {
            self.caps
        }

        fn db_handle(&self) -> i32 {
            1
        }

        fn dialect(&self) -> i32 {
            3
        }

        fn get_stmt(&mut self, _: u64) -> Option<i32> {
            None
        }

        fn add_stmt(&mut self, _: u64, _: i32) {}

        fn remove_stmt(&mut self, _: u64) {}
    }

    #[test]
    fn default_parameter_buffer() {
        let tpb = default_tpb();
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
    fn drop_queues_rollback() {
        let mut io = MockIo { sent: BytesMut::new(), deferred: 0, caps: Caps::default() };

        let tx = Transaction { io: &mut io, handle: 7, commited: false };
        drop(tx);

        let mut sent = io.sent;
        assert_eq!(sent.get_i32(), codes::OP_ROLLBACK);
        assert_eq!(sent.get_i32(), 7);
        assert!(sent.is_empty());
        assert_eq!(io.deferred, 1);
    }

    #[test]
    fn finished_transaction_drops_silently() {
        let mut io = MockIo { sent: BytesMut::new(), deferred: 0, caps: Caps::default() };

        let tx = Transaction { io: &mut io, handle: 7, commited: true };
        drop(tx);

        assert!(io.sent.is_empty());
        assert_eq!(io.deferred, 0);
    }
}

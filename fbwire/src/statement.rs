//! Prepared statements.
use std::{
    collections::VecDeque,
    hash::{DefaultHasher, Hash, Hasher},
};

use bytes::BytesMut;

use crate::{
    Error, ErrorKind,
    common::verbose,
    gds::{Response, blr, codes, info, info::SqlInfoParser},
    transport::{FbTransport, FbTransportExt},
    value::{Descriptor, Value, write_row},
    xdr::XdrWriter,
};

/// Lifecycle of a statement handle on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    Deallocated,
    Allocated,
    Prepared,
    Executed,
    /// A wire failure left the handle in an unknown state.
    Error,
}

/// A prepared statement bound to one connection.
///
/// The handle lives on the server; every operation borrows the transport
/// it was prepared on. Handles are cached per connection keyed by the
/// statement text, so preparing the same text twice skips the allocation
/// round trip.
#[derive(Debug)]
pub struct Statement {
    handle: i32,
    key: u64,
    state: StatementState,
    stmt_type: i32,
    fields: Vec<Descriptor>,
    params: Vec<Descriptor>,
    rows: VecDeque<Vec<Value>>,
    eof: bool,
}

impl Statement {
    /// Allocate and prepare in as few round trips as the protocol allows.
    ///
    /// With deferred packets the allocation, the prepare and the statement
    /// type query all leave in one flush, the prepare referring to the not
    /// yet confirmed handle by the invalid-object placeholder. Protocol 10
    /// needs the real handle up front and allocates first.
    pub async fn prepare<IO: FbTransport>(io: &mut IO, tr_handle: i32, sql: &str) -> crate::Result<Statement> {
        let key = {
            let mut hasher = DefaultHasher::new();
            sql.hash(&mut hasher);
            hasher.finish()
        };

        let cached = io.get_stmt(key);
        let lazy = io.caps().lazy;
        let dialect = io.dialect();

        let mut handle = match cached {
            Some(handle) => handle,
            None if lazy => codes::INVALID_OBJECT,
            None => {
                send_allocate(io);
                io.flush().await?;
                let resp = io.recv_response().await?;
                resp.object_handle
            }
        };

        let allocating = cached.is_none() && lazy;
        if allocating {
            send_allocate(io);
        }
        io.send(|w| {
            w.write_i32(codes::OP_PREPARE_STATEMENT);
            w.write_i32(tr_handle);
            w.write_i32(handle);
            w.write_i32(dialect);
            w.write_string(sql);
            w.write_buffer(Some(info::DESCRIBE_AND_BIND_ITEMS));
            w.write_i32(codes::PREPARE_INFO_BUFFER_SIZE);
        });
        io.send(|w| {
            w.write_i32(codes::OP_INFO_SQL);
            w.write_i32(handle);
            w.write_i32(codes::INCARNATION);
            w.write_buffer(Some(info::STATEMENT_TYPE_ITEMS));
            w.write_i32(codes::STATEMENT_TYPE_BUFFER_SIZE);
        });

        // read every queued response even when an early one failed, a
        // skipped read would desync the stream
        let mut failure: Option<Error> = None;
        if allocating {
            match io.recv_response().await {
                Ok(resp) => handle = resp.object_handle,
                Err(err) => {
                    failure.get_or_insert(err);
                }
            }
        }

        let mut parser = SqlInfoParser::new();
        let mut restart = None;
        match io.recv_response().await {
            Ok(resp) => match parser.feed(&resp.data) {
                Ok(items) => restart = items,
                Err(err) => {
                    failure.get_or_insert(err);
                }
            },
            Err(err) => {
                failure.get_or_insert(err);
            }
        }

        let stmt_type = match io.recv_response().await {
            Ok(resp) => info::statement_type(&resp.data),
            Err(err) => {
                failure.get_or_insert(err);
                0
            }
        };

        if let Some(err) = failure {
            return Err(err);
        }

        // oversized formats come back truncated and are re-queried from
        // where the description stopped
        while let Some(items) = restart {
            io.send(|w| {
                w.write_i32(codes::OP_INFO_SQL);
                w.write_i32(handle);
                w.write_i32(codes::INCARNATION);
                w.write_buffer(Some(&items));
                w.write_i32(codes::PREPARE_INFO_BUFFER_SIZE);
            });
            let resp = io.recv_response().await?;
            restart = parser.feed(&resp.data)?;
        }

        let (fields, params) = parser.finish();
        verbose!(handle, stmt_type, fields = fields.len(), params = params.len(), "statement prepared");

        if cached.is_none() {
            io.add_stmt(key, handle);
        }

        Ok(Statement {
            handle,
            key,
            state: StatementState::Prepared,
            stmt_type,
            fields,
            params,
            rows: VecDeque::new(),
            eof: false,
        })
    }

    pub fn state(&self) -> StatementState {
        self.state
    }

    /// Statement type from `isc_info_sql_stmt_type`.
    pub fn statement_type(&self) -> i32 {
        self.stmt_type
    }

    /// Output row format.
    pub fn fields(&self) -> &[Descriptor] {
        &self.fields
    }

    /// Parameter format.
    pub fn parameters(&self) -> &[Descriptor] {
        &self.params
    }

    fn returns_rows(&self) -> bool {
        matches!(
            self.stmt_type,
            codes::ISC_INFO_SQL_STMT_SELECT | codes::ISC_INFO_SQL_STMT_SELECT_FOR_UPD
        )
    }

    fn counts_records(&self) -> bool {
        matches!(
            self.stmt_type,
            codes::ISC_INFO_SQL_STMT_INSERT
                | codes::ISC_INFO_SQL_STMT_UPDATE
                | codes::ISC_INFO_SQL_STMT_DELETE
                | codes::ISC_INFO_SQL_STMT_EXEC_PROCEDURE
        )
    }

    /// Execute with the given parameter row. Returns the number of
    /// affected records for data modification statements, zero otherwise.
    ///
    /// Stored procedures run through `op_execute2` and their singleton
    /// output row becomes available through [`fetch`][Statement::fetch].
    pub async fn execute<IO: FbTransport>(&mut self, io: &mut IO, tr_handle: i32, params: &[Value]) -> crate::Result<i32> {
        match self.run_execute(io, tr_handle, params).await {
            Ok(count) => Ok(count),
            Err(err) => {
                // a statement the server rejected stays prepared, only a
                // wire failure leaves the handle in an unknown state
                self.state = match err.kind() {
                    ErrorKind::Server(_) => StatementState::Prepared,
                    _ => StatementState::Error,
                };
                Err(err)
            }
        }
    }

    async fn run_execute<IO: FbTransport>(&mut self, io: &mut IO, tr_handle: i32, params: &[Value]) -> crate::Result<i32> {
        if !matches!(self.state, StatementState::Prepared | StatementState::Executed) {
            return Err(crate::gds::ProtocolError::Malformed("statement is not prepared").into());
        }

        self.rows.clear();
        self.eof = false;

        // overlong parameters fail here, before any request byte leaves
        let params_blr = match params.is_empty() {
            true => Vec::new(),
            false => blr::build(&self.params)?,
        };
        let mut row = BytesMut::new();
        if !params.is_empty() {
            let null_bitmap = io.caps().version >= 13;
            write_row(&mut XdrWriter::new(&mut row), params, &self.params, null_bitmap)?;
        }

        let procedure = self.stmt_type == codes::ISC_INFO_SQL_STMT_EXEC_PROCEDURE;
        let out_blr = match procedure && !self.fields.is_empty() {
            true => blr::build(&self.fields)?,
            false => Vec::new(),
        };

        io.send(|w| {
            w.write_i32(if procedure { codes::OP_EXECUTE2 } else { codes::OP_EXECUTE });
            w.write_i32(self.handle);
            w.write_i32(tr_handle);
            w.write_buffer(Some(&params_blr));
            w.write_i32(0);
            w.write_i32(if params.is_empty() { 0 } else { 1 });
            w.write_raw(&row);
            if procedure {
                w.write_buffer(Some(&out_blr));
                w.write_i32(0);
            }
        });
        if self.counts_records() {
            io.send(|w| {
                w.write_i32(codes::OP_INFO_SQL);
                w.write_i32(self.handle);
                w.write_i32(codes::INCARNATION);
                w.write_buffer(Some(info::ROWS_AFFECTED_ITEMS));
                w.write_i32(codes::ROWS_AFFECTED_BUFFER_SIZE);
            });
        }

        // read every queued response even when an early one failed, a
        // skipped read would desync the stream
        let mut failure: Option<Error> = None;
        let mut generic_read = false;

        if procedure && !self.fields.is_empty() {
            match io.recv_rows(&self.fields).await {
                Ok(Response::Sql { row: Some(row) }) => self.rows.push_back(row),
                Ok(Response::Sql { row: None }) => {}
                Ok(resp) => {
                    // a failed execute answers with the bare op_response
                    generic_read = matches!(resp, Response::Generic(_));
                    let err = match resp.into_generic() {
                        Ok(_) => crate::gds::ProtocolError::Malformed("expected op_sql_response").into(),
                        Err(err) => err,
                    };
                    failure.get_or_insert(err);
                }
                Err(err) => {
                    failure.get_or_insert(err);
                }
            }
            self.eof = true;
        }

        if !generic_read
            && let Err(err) = io.recv_response().await
        {
            failure.get_or_insert(err);
        }

        let mut affected = 0;
        if self.counts_records() {
            match io.recv_response().await {
                Ok(resp) => affected = info::rows_affected(&resp.data),
                Err(err) => {
                    failure.get_or_insert(err);
                }
            }
        }

        if let Some(err) = failure {
            return Err(err);
        }

        self.state = StatementState::Executed;
        Ok(affected)
    }

    /// Next row of the open cursor, `None` past the end.
    ///
    /// Rows arrive in batches of up to the fetch size; a new batch is
    /// requested only once the local queue runs dry.
    pub async fn fetch<IO: FbTransport>(&mut self, io: &mut IO) -> crate::Result<Option<Vec<Value>>> {
        match self.run_fetch(io).await {
            Ok(row) => Ok(row),
            Err(err) => {
                self.state = StatementState::Error;
                Err(err)
            }
        }
    }

    async fn run_fetch<IO: FbTransport>(&mut self, io: &mut IO) -> crate::Result<Option<Vec<Value>>> {
        if let Some(row) = self.rows.pop_front() {
            return Ok(Some(row));
        }
        if self.eof || self.state != StatementState::Executed || !self.returns_rows() {
            return Ok(None);
        }

        let fields_blr = blr::build(&self.fields)?;
        io.send(|w| {
            w.write_i32(codes::OP_FETCH);
            w.write_i32(self.handle);
            w.write_buffer(Some(&fields_blr));
            w.write_i32(0);
            w.write_i32(codes::DEFAULT_FETCH_SIZE);
        });

        loop {
            match io.recv_rows(&self.fields).await? {
                Response::Fetch { status: 100, .. } => {
                    self.eof = true;
                    break;
                }
                Response::Fetch { count: 0, .. } => break,
                Response::Fetch { row: Some(row), .. } => self.rows.push_back(row),
                Response::Fetch { row: None, .. } => {
                    return Err(crate::gds::ProtocolError::Malformed("fetch frame without row").into());
                }
                resp => {
                    resp.into_generic()?;
                    return Err(crate::gds::ProtocolError::Malformed("expected op_fetch_response").into());
                }
            }
        }

        Ok(self.rows.pop_front())
    }

    /// Close the open cursor, keeping the statement prepared.
    pub async fn close_cursor<IO: FbTransport>(&mut self, io: &mut IO) -> crate::Result<()> {
        // a stored procedure never opens a server side cursor
        if self.state != StatementState::Executed || !self.returns_rows() {
            return Ok(());
        }
        self.free(io, codes::DSQL_CLOSE).await?;
        self.state = StatementState::Prepared;
        Ok(())
    }

    /// Release the server handle. Idempotent.
    pub async fn drop_statement<IO: FbTransport>(&mut self, io: &mut IO) -> crate::Result<()> {
        if self.state == StatementState::Deallocated {
            return Ok(());
        }
        // a dead handle must not be served from the cache again
        io.remove_stmt(self.key);
        self.free(io, codes::DSQL_DROP).await?;
        self.state = StatementState::Deallocated;
        Ok(())
    }

    /// Deferred capable servers take the free without a synchronous
    /// acknowledgement; the response is consumed by the next receive.
    async fn free<IO: FbTransport>(&mut self, io: &mut IO, option: i32) -> crate::Result<()> {
        self.rows.clear();
        io.send(|w| {
            w.write_i32(codes::OP_FREE_STATEMENT);
            w.write_i32(self.handle);
            w.write_i32(option);
        });
        match io.caps().lazy {
            true => io.defer_ack(),
            false => {
                io.recv_response().await?;
            }
        }
        Ok(())
    }
}

fn send_allocate<IO: FbTransport>(io: &mut IO) {
    let db_handle = io.db_handle();
    io.send(|w| {
        w.write_i32(codes::OP_ALLOCATE_STATEMENT);
        w.write_i32(db_handle);
    });
}

#[cfg(test)]
mod test {
    use std::{
        future::Future,
        io,
        pin::pin,
        task::{Context, Poll, Waker},
    };

    use bytes::{Buf, Bytes};

    use super::*;
    use crate::{
        connection::Caps,
        gds::{GenericResponse, ProtocolError, ServerError},
    };

    struct MockIo {
        sent: BytesMut,
        deferred: usize,
        caps: Caps,
        responses: VecDeque<crate::Result<Response>>,
        reads: usize,
        removed: Vec<u64>,
    }

    impl MockIo {
        fn new(caps: Caps) -> MockIo {
            MockIo {
                sent: BytesMut::new(),
                deferred: 0,
                caps,
                responses: VecDeque::new(),
                reads: 0,
                removed: Vec::new(),
            }
        }
    }

    impl FbTransport for MockIo {
        fn poll_flush(&mut self, _: &mut Context) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_recv(&mut self, _: &mut Context, _: Option<&[Descriptor]>) -> Poll<crate::Result<Response>> {
            self.reads += 1;
            Poll::Ready(match self.responses.pop_front() {
                Some(resp) => resp,
                None => Err(ProtocolError::Malformed("no response scripted").into()),
            })
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

        fn remove_stmt(&mut self, sql: u64) {
            self.removed.push(sql);
        }
    }

    fn ok_response() -> crate::Result<Response> {
        Ok(Response::Generic(GenericResponse {
            object_handle: 0,
            blob_id: 0,
            data: Bytes::new(),
            error: None,
        }))
    }

    fn err_response() -> crate::Result<Response> {
        Ok(Response::Generic(GenericResponse {
            object_handle: 0,
            blob_id: 0,
            data: Bytes::new(),
            error: Some(ServerError::brief(codes::ISC_DSQL_ERROR, "Dynamic SQL Error")),
        }))
    }

    fn poll_ready<F: Future>(fut: F) -> F::Output {
        match pin!(fut).poll(&mut Context::from_waker(Waker::noop())) {
            Poll::Ready(out) => out,
            Poll::Pending => panic!("future should complete without I/O"),
        }
    }

    fn stmt(stmt_type: i32, state: StatementState) -> Statement {
        Statement {
            handle: 3,
            key: 99,
            state,
            stmt_type,
            fields: Vec::new(),
            params: Vec::new(),
            rows: VecDeque::new(),
            eof: false,
        }
    }

    #[test]
    fn record_counting_statement_types() {
        assert!(stmt(codes::ISC_INFO_SQL_STMT_INSERT, StatementState::Prepared).counts_records());
        assert!(stmt(codes::ISC_INFO_SQL_STMT_EXEC_PROCEDURE, StatementState::Prepared).counts_records());
        assert!(!stmt(codes::ISC_INFO_SQL_STMT_SELECT, StatementState::Prepared).counts_records());
        assert!(!stmt(codes::ISC_INFO_SQL_STMT_DDL, StatementState::Prepared).counts_records());
    }

    #[test]
    fn only_cursor_statements_return_rows() {
        assert!(stmt(codes::ISC_INFO_SQL_STMT_SELECT, StatementState::Executed).returns_rows());
        assert!(stmt(codes::ISC_INFO_SQL_STMT_SELECT_FOR_UPD, StatementState::Executed).returns_rows());
        assert!(!stmt(codes::ISC_INFO_SQL_STMT_UPDATE, StatementState::Executed).returns_rows());
    }

    #[test]
    fn lazy_free_defers_the_ack() {
        let caps = Caps { version: 11, lazy: true, ..Caps::default() };
        let mut io = MockIo::new(caps);
        let mut statement = stmt(codes::ISC_INFO_SQL_STMT_SELECT, StatementState::Prepared);

        poll_ready(statement.drop_statement(&mut io)).unwrap();
        assert_eq!(statement.state(), StatementState::Deallocated);
        assert_eq!(io.deferred, 1);

        let mut sent = io.sent.clone();
        assert_eq!(sent.get_i32(), codes::OP_FREE_STATEMENT);
        assert_eq!(sent.get_i32(), 3);
        assert_eq!(sent.get_i32(), codes::DSQL_DROP);
        assert!(sent.is_empty());

        // a second drop is a no-op
        poll_ready(statement.drop_statement(&mut io)).unwrap();
        assert_eq!(io.sent.len(), 12);
        assert_eq!(io.deferred, 1);
    }

    #[test]
    fn dropped_statement_leaves_the_cache() {
        let caps = Caps { version: 11, lazy: true, ..Caps::default() };
        let mut io = MockIo::new(caps);
        let mut statement = stmt(codes::ISC_INFO_SQL_STMT_SELECT, StatementState::Prepared);

        poll_ready(statement.drop_statement(&mut io)).unwrap();
        // the dead handle must not be handed to the next prepare
        assert_eq!(io.removed, [99]);

        poll_ready(statement.drop_statement(&mut io)).unwrap();
        assert_eq!(io.removed, [99]);
    }

    #[test]
    fn close_cursor_without_cursor_is_a_no_op() {
        let caps = Caps { version: 11, lazy: true, ..Caps::default() };
        let mut io = MockIo::new(caps);
        let mut statement = stmt(codes::ISC_INFO_SQL_STMT_UPDATE, StatementState::Executed);

        poll_ready(statement.close_cursor(&mut io)).unwrap();
        assert!(io.sent.is_empty());
        assert_eq!(io.deferred, 0);
    }

    #[test]
    fn execute_requires_a_prepared_statement() {
        let caps = Caps { version: 11, lazy: true, ..Caps::default() };
        let mut io = MockIo::new(caps);
        let mut statement = stmt(codes::ISC_INFO_SQL_STMT_SELECT, StatementState::Deallocated);

        let err = poll_ready(statement.execute(&mut io, 7, &[])).unwrap_err();
        assert!(err.to_string().contains("not prepared"));
        assert!(io.sent.is_empty());
        assert_eq!(statement.state(), StatementState::Error);
    }

    #[test]
    fn execute_error_still_drains_pipelined_info() {
        let caps = Caps { version: 11, lazy: true, ..Caps::default() };
        let mut io = MockIo::new(caps);
        // execute fails, the batched rows affected query still answers
        io.responses.push_back(err_response());
        io.responses.push_back(ok_response());
        let mut statement = stmt(codes::ISC_INFO_SQL_STMT_INSERT, StatementState::Prepared);

        let err = poll_ready(statement.execute(&mut io, 7, &[])).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Server(_)));
        assert_eq!(io.reads, 2);
        assert!(io.responses.is_empty());
    }

    #[test]
    fn server_rejection_keeps_the_statement_usable() {
        let caps = Caps { version: 11, lazy: true, ..Caps::default() };
        let mut io = MockIo::new(caps);
        io.responses.push_back(err_response());
        let mut statement = stmt(codes::ISC_INFO_SQL_STMT_SELECT, StatementState::Prepared);

        let err = poll_ready(statement.execute(&mut io, 7, &[])).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Server(_)));
        assert_eq!(statement.state(), StatementState::Prepared);
    }

    #[test]
    fn same_text_same_cache_key() {
        let hash = |sql: &str| {
            let mut hasher = DefaultHasher::new();
            sql.hash(&mut hasher);
            hasher.finish()
        };
        assert_eq!(hash("select 1 from rdb$database"), hash("select 1 from rdb$database"));
        assert_ne!(hash("select 1 from rdb$database"), hash("select 2 from rdb$database"));
    }
}

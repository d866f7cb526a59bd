//! Database connection: configuration, handshake and the attached stream.
mod config;
pub(crate) mod handshake;
pub(crate) mod stream;

use std::{
    io,
    task::{Context, Poll},
};

use bytes::Bytes;

pub use config::{Config, ParseError, WireCrypt};
pub use handshake::Caps;
pub(crate) use handshake::Negotiation;
pub(crate) use stream::FbStream;

use crate::{
    auth::{self, AuthClient},
    buffer::ParamBuffer,
    common::verbose,
    gds::{GenericResponse, Response, codes, info},
    transport::{FbTransport, FbTransportExt},
    value::Descriptor,
    xdr::XdrWriter,
};

/// An attached database connection.
///
/// Statements and transactions borrow the connection mutably for the
/// duration of each operation; the wire carries one exchange at a time.
#[derive(Debug)]
pub struct Connection {
    stream: FbStream,
    config: Config,
    auth: AuthClient,
}

impl Connection {
    /// Connect and attach using a connection url.
    pub async fn connect(url: &str) -> crate::Result<Connection> {
        Self::connect_with(&Config::parse(url)?).await
    }

    /// Connect and attach using [`Config::from_env`].
    pub async fn connect_env() -> crate::Result<Connection> {
        Self::connect_with(&Config::from_env()).await
    }

    /// Connect and attach with an explicit [`Config`].
    pub async fn connect_with(config: &Config) -> crate::Result<Connection> {
        Self::establish(config, codes::OP_ATTACH, |_| {}).await
    }

    /// Create the database named by the config, then stay attached to it.
    pub async fn create_database(config: &Config, overwrite: bool) -> crate::Result<Connection> {
        Self::establish(config, codes::OP_CREATE, |dpb| {
            dpb.i32(codes::ISC_DPB_PAGE_SIZE, 8192)
                .byte(codes::ISC_DPB_FORCE_WRITE, 1)
                .byte(codes::ISC_DPB_OVERWRITE, overwrite as u8);
        })
        .await
    }

    async fn establish(
        config: &Config,
        op: i32,
        extend_dpb: impl FnOnce(&mut ParamBuffer),
    ) -> crate::Result<Connection> {
        let mut stream = FbStream::connect(config).await?;
        let mut auth = AuthClient::new(config.user.as_str(), config.pass.as_str());
        let mut neg = handshake::identify(&mut stream, config, &mut auth).await?;

        let mut dpb = build_dpb(config, &auth, &neg, stream.caps());
        extend_dpb(&mut dpb);

        let attached = attach_object(
            &mut stream,
            config,
            &mut auth,
            &mut neg,
            op,
            config.database.as_str(),
            dpb.as_slice(),
        )
        .await;

        match attached {
            Ok(resp) => {
                verbose!(handle = resp.object_handle, "database attached");
                stream.set_db_handle(resp.object_handle);
                Ok(Connection { stream, config: config.clone(), auth })
            }
            Err(err) => {
                // best effort goodbye, the attach error is what matters
                stream.send(|w| w.write_i32(codes::OP_DISCONNECT));
                if let Err(_err) = stream.flush().await {
                    #[cfg(feature = "log")]
                    log::error!("disconnect after failed attach: {_err}");
                }
                Err(err)
            }
        }
    }

    /// Negotiated protocol capabilities.
    pub fn caps(&self) -> Caps {
        self.stream.caps()
    }

    /// Raw `op_info_database` round trip.
    pub async fn database_info(&mut self, items: &[u8], buffer_len: i32) -> crate::Result<Bytes> {
        let db_handle = self.stream.db_handle();
        self.stream.send(|w| {
            w.write_i32(codes::OP_INFO_DATABASE);
            w.write_i32(db_handle);
            w.write_i32(codes::INCARNATION);
            w.write_buffer(Some(items));
            w.write_i32(buffer_len);
        });
        Ok(self.stream.recv_response().await?.data)
    }

    /// On disk structure version of the attached database.
    pub async fn ods_version(&mut self) -> crate::Result<(i32, i32)> {
        let items = [
            codes::ISC_INFO_ODS_VERSION,
            codes::ISC_INFO_ODS_MINOR_VERSION,
            codes::ISC_INFO_END,
        ];
        let buf = self.database_info(&items, 256).await?;

        let mut major = 0;
        let mut minor = 0;
        for (item, data) in info::clusters(&buf) {
            match item {
                codes::ISC_INFO_ODS_VERSION => major = info::vax_integer(data, 0, data.len()),
                codes::ISC_INFO_ODS_MINOR_VERSION => minor = info::vax_integer(data, 0, data.len()),
                _ => {}
            }
        }
        Ok((major, minor))
    }

    /// SQL dialect of the attached database.
    pub async fn database_dialect(&mut self) -> crate::Result<i32> {
        let items = [codes::ISC_INFO_DB_SQL_DIALECT, codes::ISC_INFO_END];
        let buf = self.database_info(&items, 256).await?;
        for (item, data) in info::clusters(&buf) {
            if item == codes::ISC_INFO_DB_SQL_DIALECT {
                return Ok(info::vax_integer(data, 0, data.len()));
            }
        }
        Ok(self.config.dialect)
    }

    /// Server version banner, `isc_info_firebird_version`.
    pub async fn server_version(&mut self) -> crate::Result<String> {
        let items = [codes::ISC_INFO_FIREBIRD_VERSION, codes::ISC_INFO_END];
        let buf = self.database_info(&items, 1024).await?;
        for (item, data) in info::clusters(&buf) {
            // [line count][length][text]
            if item == codes::ISC_INFO_FIREBIRD_VERSION && data.len() >= 2 {
                let len = data[1] as usize;
                if let Some(text) = data.get(2..2 + len) {
                    return Ok(String::from_utf8_lossy(text).into_owned());
                }
            }
        }
        Ok(String::new())
    }

    /// Request cancellation of whatever the connection is executing,
    /// written out of band without waiting for a response.
    pub async fn cancel(&mut self, kind: i32) -> crate::Result<()> {
        self.stream.send(|w| {
            w.write_i32(codes::OP_CANCEL);
            w.write_i32(kind);
        });
        self.stream.flush().await?;
        Ok(())
    }

    /// Drop the attached database. The connection is gone afterwards.
    pub async fn drop_database(mut self) -> crate::Result<()> {
        let db_handle = self.stream.db_handle();
        self.stream.send(|w| {
            w.write_i32(codes::OP_DROP_DATABASE);
            w.write_i32(db_handle);
        });
        self.stream.recv_response().await?;
        Ok(())
    }

    /// Detach from the database and say goodbye, draining anything the
    /// deferred queue still holds.
    pub async fn detach(mut self) -> crate::Result<()> {
        let db_handle = self.stream.db_handle();
        self.stream.send(|w| {
            w.write_i32(codes::OP_DETACH);
            w.write_i32(db_handle);
            w.write_i32(codes::OP_DISCONNECT);
        });
        self.stream.recv_response().await?;
        Ok(())
    }
}

impl FbTransport for Connection {
    fn poll_flush(&mut self, cx: &mut Context) -> Poll<io::Result<()>> {
        self.stream.poll_flush(cx)
    }

    fn poll_recv(&mut self, cx: &mut Context, rows: Option<&[Descriptor]>) -> Poll<crate::Result<Response>> {
        self.stream.poll_recv(cx, rows)
    }

    fn send(&mut self, write: impl FnOnce(&mut XdrWriter<'_>)) {
        self.stream.send(write);
    }

    fn defer_ack(&mut self) {
        self.stream.defer_ack();
    }

    fn caps(&self) -> Caps {
        self.stream.caps()
    }

    fn db_handle(&self) -> i32 {
        self.stream.db_handle()
    }

    fn dialect(&self) -> i32 {
        self.stream.dialect()
    }

    fn get_stmt(&mut self, sql: u64) -> Option<i32> {
        self.stream.get_stmt(sql)
    }

    fn add_stmt(&mut self, sql: u64, handle: i32) {
        self.stream.add_stmt(sql, handle);
    }

    fn remove_stmt(&mut self, sql: u64) {
        self.stream.remove_stmt(sql);
    }
}

/// Database parameter buffer for attach or create.
fn build_dpb(config: &Config, auth: &AuthClient, neg: &Negotiation, caps: Caps) -> ParamBuffer {
    let mut dpb = ParamBuffer::dpb();
    if caps.utf8_filenames {
        dpb.byte(codes::ISC_DPB_UTF8_FILENAME, 1);
    }
    dpb.i32(codes::ISC_DPB_SQL_DIALECT, config.dialect)
        .str(codes::ISC_DPB_LC_CTYPE, "UTF8")
        .str(codes::ISC_DPB_USER_NAME, config.user.as_str());
    if let Some(role) = &config.role {
        dpb.str(codes::ISC_DPB_SQL_ROLE_NAME, role.as_str());
    }

    if caps.connect_auth() {
        match &neg.client_data {
            Some(proof) => {
                dpb.bytes(codes::ISC_DPB_SPECIFIC_AUTH_DATA, proof);
            }
            None => {
                // keep the conversation going inside the attach exchange
                dpb.str(codes::ISC_DPB_AUTH_PLUGIN_NAME, &neg.plugin)
                    .bytes(codes::ISC_DPB_SPECIFIC_AUTH_DATA, &auth.public_client_data());
            }
        }
    } else {
        dpb.bytes(
            codes::ISC_DPB_PASSWORD_ENC,
            &auth::legacy::wire_proof(Some(config.pass.as_str())),
        );
    }
    dpb
}

/// Attach family request with the in-exchange authentication rounds of
/// protocol 13 and later: continue-auth and crypt-key callbacks may both
/// precede the final response. A response carrying data means the server
/// finished authentication here and wire encryption can start.
pub(crate) async fn attach_object(
    stream: &mut FbStream,
    config: &Config,
    auth: &mut AuthClient,
    neg: &mut Negotiation,
    op: i32,
    object: &str,
    pb: &[u8],
) -> crate::Result<GenericResponse> {
    stream.send(|w| {
        w.write_i32(op);
        w.write_i32(codes::DATABASE_OBJECT_ID);
        w.write_string(object);
        w.write_buffer(Some(pb));
    });

    let resp = loop {
        match stream.recv().await? {
            Response::ContAuth { data, plugin, authenticated, keys } => {
                neg.plugin = plugin;
                neg.authenticated = authenticated;
                let proof = auth.respond(&neg.plugin, &data)?;
                handshake::send_cont_auth(stream, &proof, &neg.plugin, &keys);
                neg.client_data = Some(proof);
            }
            Response::CryptKeyCallback { size, .. } => {
                let echo = (stream.caps().version >= 15).then_some(size);
                handshake::reply_crypt_key(stream, config, echo);
            }
            resp => break resp.into_generic()?,
        }
    };

    if !resp.data.is_empty() {
        handshake::wire_crypt(stream, config, auth).await?;
    }
    handshake::validate_wire_crypt(stream.caps(), config, neg.authenticated)?;
    Ok(resp)
}

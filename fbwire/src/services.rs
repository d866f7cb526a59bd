//! Service manager attachment.
//!
//! Services (backup, statistics, user management) live behind their own
//! attachment to the `service_mgr` object rather than a database. The
//! handshake is the same one a database attach performs.
use bytes::Bytes;

use crate::{
    auth::{self, AuthClient},
    buffer::ParamBuffer,
    common::verbose,
    connection::{self, Caps, Config, FbStream, handshake},
    gds::codes,
    transport::{FbTransport, FbTransportExt},
};

/// An attached service manager.
#[derive(Debug)]
pub struct ServiceManager {
    stream: FbStream,
    handle: i32,
}

impl ServiceManager {
    /// Attach to the service manager of the host named by the config. The
    /// `database` part of the config is ignored.
    pub async fn connect_with(config: &Config) -> crate::Result<ServiceManager> {
        let mut stream = FbStream::connect(config).await?;
        let mut auth = AuthClient::new(config.user.as_str(), config.pass.as_str());
        let mut neg = handshake::identify(&mut stream, config, &mut auth).await?;

        let spb = build_spb(config, &auth, &neg, stream.caps());
        let resp = connection::attach_object(
            &mut stream,
            config,
            &mut auth,
            &mut neg,
            codes::OP_SERVICE_ATTACH,
            codes::SERVICE_MANAGER,
            spb.as_slice(),
        )
        .await?;

        verbose!(handle = resp.object_handle, "service manager attached");
        Ok(ServiceManager { stream, handle: resp.object_handle })
    }

    /// Attach using a connection url.
    pub async fn connect(url: &str) -> crate::Result<ServiceManager> {
        Self::connect_with(&Config::parse(url)?).await
    }

    /// Start a service task described by the given buffer.
    pub async fn start(&mut self, spb: &ParamBuffer) -> crate::Result<()> {
        self.stream.send(|w| {
            w.write_i32(codes::OP_SERVICE_START);
            w.write_i32(self.handle);
            w.write_i32(codes::INCARNATION);
            w.write_buffer(Some(spb.as_slice()));
        });
        self.stream.recv_response().await?;
        Ok(())
    }

    /// Query the running task or static service information. Returns the
    /// raw result buffer, clustered like any info response.
    pub async fn query(
        &mut self,
        send: &ParamBuffer,
        items: &[u8],
        buffer_len: i32,
    ) -> crate::Result<Bytes> {
        self.stream.send(|w| {
            w.write_i32(codes::OP_SERVICE_INFO);
            w.write_i32(self.handle);
            w.write_i32(codes::INCARNATION);
            w.write_buffer(Some(send.as_slice()));
            w.write_buffer(Some(items));
            w.write_i32(buffer_len);
        });
        Ok(self.stream.recv_response().await?.data)
    }

    /// Detach from the service manager and close the connection.
    pub async fn detach(mut self) -> crate::Result<()> {
        self.stream.send(|w| {
            w.write_i32(codes::OP_SERVICE_DETACH);
            w.write_i32(self.handle);
            w.write_i32(codes::OP_DISCONNECT);
        });
        self.stream.recv_response().await?;
        Ok(())
    }
}

/// Service attach parameter buffer, the service counterpart of the DPB.
fn build_spb(config: &Config, auth: &AuthClient, neg: &connection::Negotiation, caps: Caps) -> ParamBuffer {
    let mut spb = ParamBuffer::spb_attach();
    spb.str(codes::ISC_SPB_USER_NAME, config.user.as_str());

    if caps.connect_auth() {
        match &neg.client_data {
            Some(proof) => {
                spb.bytes(codes::ISC_SPB_SPECIFIC_AUTH_DATA, proof);
            }
            None => {
                spb.str(codes::ISC_DPB_AUTH_PLUGIN_NAME, &neg.plugin)
                    .bytes(codes::ISC_SPB_SPECIFIC_AUTH_DATA, &auth.public_client_data());
            }
        }
    } else {
        spb.bytes(
            codes::ISC_SPB_PASSWORD_ENC,
            &auth::legacy::wire_proof(Some(config.pass.as_str())),
        );
    }
    spb
}

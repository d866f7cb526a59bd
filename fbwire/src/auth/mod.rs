//! Authentication plugins.
//!
//! Srp256 is offered first with the public key already attached to the
//! connect request, so a server accepting it can finish the handshake in
//! one round. Srp differs only in the digest of the final proof, and
//! Legacy_Auth falls back to the old crypt password hash.
use std::fmt;

pub(crate) mod legacy;
pub(crate) mod srp;

use srp::{ProofHash, SrpClient};

pub(crate) const SRP_PLUGIN: &str = "Srp";
pub(crate) const SRP256_PLUGIN: &str = "Srp256";
pub(crate) const LEGACY_PLUGIN: &str = "Legacy_Auth";

/// Plugins offered during connect, in order of preference.
pub(crate) const PLUGIN_LIST: &str = "Srp256,Srp";

/// Name the wire encryption key is registered under.
pub(crate) const SESSION_KEY_NAME: &str = "Symmetric";

/// Authentication failed before the server was even asked.
pub enum AuthError {
    UnsupportedPlugin(String),
    MalformedServerData(&'static str),
}

impl std::error::Error for AuthError { }

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedPlugin(name) => write!(f, "unsupported auth plugin {name:?}"),
            Self::MalformedServerData(what) => write!(f, "malformed server auth data: {what}"),
        }
    }
}

impl fmt::Debug for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

/// Account names are matched case insensitively unless quoted; a quoted
/// name keeps its case with `""` escaping a quote. An unescaped quote
/// truncates the name, matching server behavior.
pub(crate) fn normalize_login(login: &str) -> String {
    let chars: Vec<char> = login.chars().collect();
    if chars.len() > 2 && chars[0] == '"' && chars[chars.len() - 1] == '"' {
        let mut out = String::with_capacity(chars.len() - 2);
        let inner = &chars[1..chars.len() - 1];
        let mut i = 0;
        while i < inner.len() {
            if inner[i] == '"' {
                if inner.get(i + 1) == Some(&'"') {
                    out.push('"');
                    i += 2;
                } else {
                    return out;
                }
            } else {
                out.push(inner[i]);
                i += 1;
            }
        }
        out
    } else {
        login.to_uppercase()
    }
}

/// Per connection authentication state.
///
/// Outlives the handshake only until the server confirms the session, the
/// session key then moves on to wire encryption.
pub(crate) struct AuthClient {
    user: String,
    password: String,
    srp: SrpClient,
    session_key: Option<[u8; 20]>,
}

impl fmt::Debug for AuthClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthClient").field("user", &self.user).finish_non_exhaustive()
    }
}

impl AuthClient {
    pub fn new(user: &str, password: &str) -> Self {
        Self {
            user: user.to_owned(),
            password: password.to_owned(),
            srp: SrpClient::new(),
            session_key: None,
        }
    }

    /// The Srp256 public key attached to the connect request, hex bytes.
    pub fn public_client_data(&self) -> Vec<u8> {
        self.srp.public_key_hex().into_bytes()
    }

    /// Answer a continue-auth round. Returns the client data to send back.
    pub fn respond(&mut self, plugin: &str, server_data: &[u8]) -> Result<Vec<u8>, AuthError> {
        match plugin {
            SRP256_PLUGIN | SRP_PLUGIN => {
                if server_data.is_empty() {
                    // server picked SRP but has not sent its key yet
                    return Ok(self.public_client_data());
                }
                let flavor = if plugin == SRP256_PLUGIN { ProofHash::Sha256 } else { ProofHash::Sha1 };
                let (proof, key) = self.srp.client_proof(
                    &normalize_login(&self.user),
                    &self.password,
                    server_data,
                    flavor,
                )?;
                self.session_key = Some(key);
                Ok(proof)
            }
            LEGACY_PLUGIN => Ok(legacy::wire_proof(Some(&self.password))),
            other => Err(AuthError::UnsupportedPlugin(other.to_owned())),
        }
    }

    /// Key for wire encryption once a proof has been computed.
    pub fn session_key(&self) -> Option<&[u8; 20]> {
        self.session_key.as_ref()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn plain_login_uppercased() {
        assert_eq!(normalize_login("sysdba"), "SYSDBA");
        assert_eq!(normalize_login(""), "");
    }

    #[test]
    fn quoted_login_keeps_case() {
        assert_eq!(normalize_login("\"CaseSensitive\""), "CaseSensitive");
        assert_eq!(normalize_login("\"with\"\"quote\""), "with\"quote");
    }

    #[test]
    fn unescaped_quote_truncates() {
        assert_eq!(normalize_login("\"abc\"def\""), "abc");
    }

    #[test]
    fn short_quoted_login_is_not_special() {
        assert_eq!(normalize_login("\"\""), "\"\"");
    }

    #[test]
    fn unknown_plugin_rejected() {
        let mut auth = AuthClient::new("SYSDBA", "masterkey");
        assert!(auth.respond("Win_Sspi", &[]).is_err());
    }

    #[test]
    fn srp_round_produces_session_key() {
        let mut auth = AuthClient::new("sysdba", "masterkey");
        let salt = b"0123456789abcdef0123456789abcdef";
        let mut server_data = vec![salt.len() as u8, 0];
        server_data.extend_from_slice(salt);
        server_data.extend_from_slice(&[0, 0]);
        server_data.extend_from_slice(srp::hex_upper(&[0x12, 0x34, 0x56]).as_bytes());

        let proof = auth.respond(SRP256_PLUGIN, &server_data).unwrap();
        // SHA-256 proof as hex characters
        assert_eq!(proof.len(), 64);
        assert!(auth.session_key().is_some());
    }

    #[test]
    fn legacy_round_needs_no_server_data() {
        let mut auth = AuthClient::new("SYSDBA", "masterkey");
        let proof = auth.respond(LEGACY_PLUGIN, &[]).unwrap();
        assert_eq!(proof.len(), 9);
        assert!(auth.session_key().is_none());
    }
}

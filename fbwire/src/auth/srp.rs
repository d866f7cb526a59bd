//! SRP-6a client, the Srp and Srp256 authentication plugins.
//!
//! The group parameters are fixed by the server implementation. SHA-1 is
//! used for every intermediate hash; only the final proof digest differs
//! between the two plugin flavors. Big integers cross the wire as
//! uppercase hexadecimal strings.
use num_bigint::BigUint;
use num_traits::Num;
use rand::RngCore;
use sha1::{Digest, Sha1};
use sha2::Sha256;

use super::AuthError;

const PRIME_HEX: &str = "E67D2E994B2F900C3F41F08F5BB2627ED0D49EE1FE767A52EFCD565CD6E768812C3E1E9CE8F0A8BEA6CB13CD29DDEBF7A96D4A93B55D488DF099A15C89DCB0640738EB2CBDD9A8F7BAB561AB1B0DC1C6CDABF303264A08D1BCA932D1F1EE428B619D970F342ABA9A65793B8B2F041AE5364350C16F735F56ECBCA87BD57B29E7";
const MULTIPLIER: &str = "1277432915985975349439481660349303019122249719989";

/// Key size in bytes, the width scrambled values are padded to.
const KEY_SIZE: usize = 128;

/// Digest used for the final proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProofHash {
    Sha1,
    Sha256,
}

pub(crate) struct SrpClient {
    private_key: BigUint,
    public_key: BigUint,
}

fn prime() -> BigUint {
    BigUint::from_str_radix(PRIME_HEX, 16).unwrap()
}

fn generator() -> BigUint {
    BigUint::from(2u32)
}

fn multiplier() -> BigUint {
    BigUint::from_str_radix(MULTIPLIER, 10).unwrap()
}

fn sha1(parts: &[&[u8]]) -> Vec<u8> {
    let mut hash = Sha1::new();
    for part in parts {
        hash.update(part);
    }
    hash.finalize().to_vec()
}

fn big(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_be(bytes)
}

/// Big endian with leading zeros stripped, the format every hash input
/// uses.
fn to_bytes(n: &BigUint) -> Vec<u8> {
    let bytes = n.to_bytes_be();
    match bytes.iter().position(|&b| b != 0) {
        Some(i) => bytes[i..].to_vec(),
        None => Vec::new(),
    }
}

/// The last `KEY_SIZE` bytes of the big endian form.
fn pad(n: &BigUint) -> Vec<u8> {
    let bytes = n.to_bytes_be();
    let skip = bytes.len().saturating_sub(KEY_SIZE);
    bytes[skip..].to_vec()
}

pub(crate) fn hex_upper(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02X}"));
    }
    out
}

/// x = H(salt | H(user ":" password))
fn user_hash(user: &str, password: &str, salt: &[u8]) -> BigUint {
    let inner = sha1(&[user.as_bytes(), b":", password.as_bytes()]);
    big(&sha1(&[salt, &inner]))
}

/// u = H(pad(A) | pad(B))
fn scramble(a: &BigUint, b: &BigUint) -> BigUint {
    big(&sha1(&[&pad(a), &pad(b)]))
}

impl SrpClient {
    pub fn new() -> Self {
        let mut secret = [0u8; KEY_SIZE / 8];
        rand::rngs::OsRng.fill_bytes(&mut secret);
        Self::from_private_key(big(&secret))
    }

    pub fn from_private_key(private_key: BigUint) -> Self {
        let public_key = generator().modpow(&private_key, &prime());
        Self { private_key, public_key }
    }

    pub fn public_key(&self) -> &BigUint {
        &self.public_key
    }

    /// A as the uppercase hex the server expects. Leading zero bytes are
    /// dropped, matching the big integer rendering on the other side.
    pub fn public_key_hex(&self) -> String {
        hex_upper(&pad(&self.public_key))
    }

    /// Compute the proof from the raw auth data blob: a little endian
    /// salt length, the salt, then the server public key in hex.
    pub fn client_proof(
        &self,
        user: &str,
        password: &str,
        auth_data: &[u8],
        hash: ProofHash,
    ) -> Result<(Vec<u8>, [u8; 20]), AuthError> {
        if auth_data.len() < 2 {
            return Err(AuthError::MalformedServerData("auth data too short"));
        }
        let salt_len = auth_data[0] as usize + auth_data[1] as usize * 256;
        let salt = auth_data
            .get(2..2 + salt_len)
            .ok_or(AuthError::MalformedServerData("salt out of bounds"))?;
        let key_hex = auth_data
            .get(salt_len + 4..)
            .ok_or(AuthError::MalformedServerData("server key missing"))?;
        let key_hex =
            std::str::from_utf8(key_hex).map_err(|_| AuthError::MalformedServerData("server key is not hex"))?;
        let server_key = BigUint::from_str_radix(key_hex, 16)
            .map_err(|_| AuthError::MalformedServerData("server key is not hex"))?;
        Ok(self.client_proof_parts(user, password, salt, &server_key, hash))
    }

    /// Proof and session key from already split parts. The proof is the
    /// uppercase hex of M as UTF-8 bytes.
    pub fn client_proof_parts(
        &self,
        user: &str,
        password: &str,
        salt: &[u8],
        server_key: &BigUint,
        hash: ProofHash,
    ) -> (Vec<u8>, [u8; 20]) {
        let session_key = self.session_key(user, password, salt, server_key);

        let n = prime();
        let n1 = big(&sha1(&[&to_bytes(&n)]));
        let n2 = big(&sha1(&[&to_bytes(&generator())]));
        let n1 = n1.modpow(&n2, &n);
        let n2 = big(&sha1(&[user.as_bytes()]));

        let n1 = to_bytes(&n1);
        let n2 = to_bytes(&n2);
        let client_key = to_bytes(&self.public_key);
        let server_key = to_bytes(server_key);
        let parts: [&[u8]; 6] = [&n1, &n2, salt, &client_key, &server_key, &session_key];
        let proof = match hash {
            ProofHash::Sha1 => sha1(&parts),
            ProofHash::Sha256 => {
                let mut h = Sha256::new();
                for part in parts {
                    h.update(part);
                }
                h.finalize().to_vec()
            }
        };

        (hex_upper(&proof).into_bytes(), session_key)
    }

    /// K = H(S) with S = (B - k*g^x) ^ (a + u*x) mod N
    fn session_key(&self, user: &str, password: &str, salt: &[u8], server_key: &BigUint) -> [u8; 20] {
        let n = prime();
        let u = scramble(&self.public_key, server_key);
        let x = user_hash(user, password, salt);
        let gx = generator().modpow(&x, &n);
        let kgx = (multiplier() * &gx) % &n;
        let diff = if *server_key >= kgx {
            (server_key - kgx) % &n
        } else {
            (server_key + &n - kgx) % &n
        };
        let aux = (&self.private_key + (u * &x) % &n) % &n;
        let secret = diff.modpow(&aux, &n);
        sha1(&[&to_bytes(&secret)]).try_into().unwrap()
    }
}

/// Server half of the exchange, enough to validate the client math.
#[cfg(test)]
pub(crate) mod server {
    use super::*;

    pub fn seed(user: &str, password: &str, salt: &[u8], private_key: &BigUint) -> BigUint {
        let n = prime();
        let v = generator().modpow(&user_hash(user, password, salt), &n);
        let gb = generator().modpow(private_key, &n);
        let kv = (multiplier() * v) % &n;
        (kv + gb) % n
    }

    pub fn session_key(
        user: &str,
        password: &str,
        salt: &[u8],
        client_key: &BigUint,
        server_key: &BigUint,
        private_key: &BigUint,
    ) -> [u8; 20] {
        let n = prime();
        let u = scramble(client_key, server_key);
        let v = generator().modpow(&user_hash(user, password, salt), &n);
        let vu = v.modpow(&u, &n);
        let avu = (client_key * vu) % &n;
        let secret = avu.modpow(private_key, &n);
        sha1(&[&to_bytes(&secret)]).try_into().unwrap()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn fixed_client() -> SrpClient {
        SrpClient::from_private_key(BigUint::from_str_radix("60975527035CF2AD1989806F0407210BC81EDC04E2762A56AFD529DDDA2D4393", 16).unwrap())
    }

    #[test]
    fn public_key_hex_round_trips() {
        let client = fixed_client();
        let hex = client.public_key_hex();
        assert!(hex.len() <= KEY_SIZE * 2);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(BigUint::from_str_radix(&hex, 16).unwrap(), *client.public_key());
    }

    #[test]
    fn client_and_server_agree_on_session_key() {
        let user = "SYSDBA";
        let password = "masterkey";
        let salt = b"0123456789abcdef0123456789abcdef";

        let client = fixed_client();
        let server_private = BigUint::from_str_radix("E487CB59D31AC550471E81F00F6928E01DDA08E974A004F49E61F5D105284D20", 16).unwrap();
        let server_public = server::seed(user, password, salt, &server_private);

        let (_, client_key) =
            client.client_proof_parts(user, password, salt, &server_public, ProofHash::Sha1);
        let server_key = server::session_key(
            user,
            password,
            salt,
            client.public_key(),
            &server_public,
            &server_private,
        );
        assert_eq!(client_key, server_key);
    }

    #[test]
    fn proof_flavors_differ_only_in_final_digest() {
        let client = fixed_client();
        let salt = b"saltsaltsaltsalt";
        let server_public = BigUint::from(0x0123_4567_89ab_cdefu64);

        let (sha1_proof, key1) =
            client.client_proof_parts("U", "p", salt, &server_public, ProofHash::Sha1);
        let (sha256_proof, key2) =
            client.client_proof_parts("U", "p", salt, &server_public, ProofHash::Sha256);
        assert_eq!(key1, key2);
        assert_eq!(sha1_proof.len(), 40);
        assert_eq!(sha256_proof.len(), 64);
        assert_ne!(sha1_proof, sha256_proof);
    }

    #[test]
    fn auth_data_parsing() {
        let salt = b"saltdata";
        let server_public = BigUint::from(0xdeadbeefu32);
        let mut auth_data = vec![salt.len() as u8, 0];
        auth_data.extend_from_slice(salt);
        auth_data.extend_from_slice(&[0, 0]);
        auth_data.extend_from_slice(hex_upper(&server_public.to_bytes_be()).as_bytes());

        let client = fixed_client();
        let (from_blob, _) = client
            .client_proof("U", "p", &auth_data, ProofHash::Sha256)
            .unwrap();
        let (from_parts, _) =
            client.client_proof_parts("U", "p", salt, &server_public, ProofHash::Sha256);
        assert_eq!(from_blob, from_parts);
    }

    #[test]
    fn malformed_auth_data_rejected() {
        let client = fixed_client();
        assert!(client.client_proof("U", "p", &[8], ProofHash::Sha1).is_err());
        assert!(client.client_proof("U", "p", &[200, 0, 1, 2], ProofHash::Sha1).is_err());
    }
}

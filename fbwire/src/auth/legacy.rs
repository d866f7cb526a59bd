//! Legacy_Auth password hash.
//!
//! A salted, 25 round DES variant of the classic unix crypt, with the
//! salt fixed by the server implementation. Only the first eight password
//! characters participate. The result is eleven characters from the
//! crypt alphabet; the wire carries them without the first two.
use std::sync::OnceLock;

const FB_SALT: u64 = 754712576;
const ITERATIONS: usize = 25;

const ITOA64: &[u8; 64] = b"./0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

const ROTATES: [u8; 16] = [1, 1, 2, 2, 2, 2, 2, 2, 1, 2, 2, 2, 2, 2, 2, 1];

const PC1: [u8; 56] = [
    57, 49, 41, 33, 25, 17, 9,
    1, 58, 50, 42, 34, 26, 18,
    10, 2, 59, 51, 43, 35, 27,
    19, 11, 3, 60, 52, 44, 36,
    63, 55, 47, 39, 31, 23, 15,
    7, 62, 54, 46, 38, 30, 22,
    14, 6, 61, 53, 45, 37, 29,
    21, 13, 5, 28, 20, 12, 4,
];

const PC2: [u8; 64] = [
    9, 18, 14, 17, 11, 24, 1, 5,
    22, 25, 3, 28, 15, 6, 21, 10,
    35, 38, 23, 19, 12, 4, 26, 8,
    43, 54, 16, 7, 27, 20, 13, 2,
    0, 0, 41, 52, 31, 37, 47, 55,
    0, 0, 30, 40, 51, 45, 33, 48,
    0, 0, 44, 49, 39, 56, 34, 53,
    0, 0, 46, 42, 50, 36, 29, 32,
];

const IP: [u8; 64] = [
    58, 50, 42, 34, 26, 18, 10, 2,
    60, 52, 44, 36, 28, 20, 12, 4,
    62, 54, 46, 38, 30, 22, 14, 6,
    64, 56, 48, 40, 32, 24, 16, 8,
    57, 49, 41, 33, 25, 17, 9, 1,
    59, 51, 43, 35, 27, 19, 11, 3,
    61, 53, 45, 37, 29, 21, 13, 5,
    63, 55, 47, 39, 31, 23, 15, 7,
];

const EXPAND_TR: [u8; 48] = [
    32, 1, 2, 3, 4, 5,
    4, 5, 6, 7, 8, 9,
    8, 9, 10, 11, 12, 13,
    12, 13, 14, 15, 16, 17,
    16, 17, 18, 19, 20, 21,
    20, 21, 22, 23, 24, 25,
    24, 25, 26, 27, 28, 29,
    28, 29, 30, 31, 32, 1,
];

const CIFP: [u8; 64] = [
    1, 2, 3, 4, 17, 18, 19, 20,
    5, 6, 7, 8, 21, 22, 23, 24,
    9, 10, 11, 12, 25, 26, 27, 28,
    13, 14, 15, 16, 29, 30, 31, 32,
    33, 34, 35, 36, 49, 50, 51, 52,
    37, 38, 39, 40, 53, 54, 55, 56,
    41, 42, 43, 44, 57, 58, 59, 60,
    45, 46, 47, 48, 61, 62, 63, 64,
];

const SBOX: [[u8; 64]; 8] = [
    [
        14, 4, 13, 1, 2, 15, 11, 8, 3, 10, 6, 12, 5, 9, 0, 7,
        0, 15, 7, 4, 14, 2, 13, 1, 10, 6, 12, 11, 9, 5, 3, 8,
        4, 1, 14, 8, 13, 6, 2, 11, 15, 12, 9, 7, 3, 10, 5, 0,
        15, 12, 8, 2, 4, 9, 1, 7, 5, 11, 3, 14, 10, 0, 6, 13,
    ],
    [
        15, 1, 8, 14, 6, 11, 3, 4, 9, 7, 2, 13, 12, 0, 5, 10,
        3, 13, 4, 7, 15, 2, 8, 14, 12, 0, 1, 10, 6, 9, 11, 5,
        0, 14, 7, 11, 10, 4, 13, 1, 5, 8, 12, 6, 9, 3, 2, 15,
        13, 8, 10, 1, 3, 15, 4, 2, 11, 6, 7, 12, 0, 5, 14, 9,
    ],
    [
        10, 0, 9, 14, 6, 3, 15, 5, 1, 13, 12, 7, 11, 4, 2, 8,
        13, 7, 0, 9, 3, 4, 6, 10, 2, 8, 5, 14, 12, 11, 15, 1,
        13, 6, 4, 9, 8, 15, 3, 0, 11, 1, 2, 12, 5, 10, 14, 7,
        1, 10, 13, 0, 6, 9, 8, 7, 4, 15, 14, 3, 11, 5, 2, 12,
    ],
    [
        7, 13, 14, 3, 0, 6, 9, 10, 1, 2, 8, 5, 11, 12, 4, 15,
        13, 8, 11, 5, 6, 15, 0, 3, 4, 7, 2, 12, 1, 10, 14, 9,
        10, 6, 9, 0, 12, 11, 7, 13, 15, 1, 3, 14, 5, 2, 8, 4,
        3, 15, 0, 6, 10, 1, 13, 8, 9, 4, 5, 11, 12, 7, 2, 14,
    ],
    [
        2, 12, 4, 1, 7, 10, 11, 6, 8, 5, 3, 15, 13, 0, 14, 9,
        14, 11, 2, 12, 4, 7, 13, 1, 5, 0, 15, 10, 3, 9, 8, 6,
        4, 2, 1, 11, 10, 13, 7, 8, 15, 9, 12, 5, 6, 3, 0, 14,
        11, 8, 12, 7, 1, 14, 2, 13, 6, 15, 0, 9, 10, 4, 5, 3,
    ],
    [
        12, 1, 10, 15, 9, 2, 6, 8, 0, 13, 3, 4, 14, 7, 5, 11,
        10, 15, 4, 2, 7, 12, 9, 5, 6, 1, 13, 14, 0, 11, 3, 8,
        9, 14, 15, 5, 2, 8, 12, 3, 7, 0, 4, 10, 1, 13, 11, 6,
        4, 3, 2, 12, 9, 5, 15, 10, 11, 14, 1, 7, 6, 0, 8, 13,
    ],
    [
        4, 11, 2, 14, 15, 0, 8, 13, 3, 12, 9, 7, 5, 10, 6, 1,
        13, 0, 11, 7, 4, 9, 1, 10, 14, 3, 5, 12, 2, 15, 8, 6,
        1, 4, 11, 13, 12, 3, 7, 14, 10, 15, 6, 8, 0, 5, 9, 2,
        6, 11, 13, 8, 1, 4, 10, 7, 9, 5, 0, 15, 14, 2, 3, 12,
    ],
    [
        13, 2, 8, 4, 6, 15, 11, 1, 10, 9, 3, 14, 5, 0, 12, 7,
        1, 15, 13, 8, 10, 3, 7, 4, 12, 5, 6, 11, 0, 14, 9, 2,
        7, 11, 4, 1, 9, 12, 14, 2, 0, 6, 10, 13, 15, 3, 5, 8,
        2, 1, 14, 7, 4, 10, 8, 13, 15, 12, 9, 0, 3, 5, 6, 11,
    ],
];

const P32_TR: [u8; 32] = [
    16, 7, 20, 21, 29, 12, 28, 17,
    1, 15, 23, 26, 5, 18, 31, 10,
    2, 8, 24, 14, 32, 27, 3, 9,
    19, 13, 30, 6, 22, 11, 4, 25,
];

struct Tables {
    pc1rot: [[u64; 16]; 16],
    pc2rot: [[[u64; 16]; 16]; 2],
    spe: [[u64; 64]; 8],
    cf6464: [[u64; 16]; 16],
}

fn tables() -> &'static Tables {
    static TABLES: OnceLock<Tables> = OnceLock::new();
    TABLES.get_or_init(build_tables)
}

fn init_perm(table: &mut [[u64; 16]; 16], p: &[u8; 64]) {
    for k in 0..64 {
        let Some(l) = (p[k] as usize).checked_sub(1) else { continue };
        let i = l >> 2;
        let bit = 1usize << (l & 0x03);
        let s = (k & 0x07) + ((7 - (k >> 3)) << 3);
        for j in 0..16 {
            if j & bit != 0 {
                table[i][j] |= 1u64 << s;
            }
        }
    }
}

fn to_six_bit(num: u64) -> u64 {
    (num << 26 & 0xFC00_0000_FC00_0000)
        | (num << 12 & 0x00FC_0000_00FC_0000)
        | (num >> 2 & 0x0000_FC00_0000_FC00)
        | (num >> 16 & 0x0000_00FC_0000_00FC)
}

fn build_tables() -> Tables {
    let mut t = Tables {
        pc1rot: [[0; 16]; 16],
        pc2rot: [[[0; 16]; 16]; 2],
        spe: [[0; 64]; 8],
        cf6464: [[0; 16]; 16],
    };
    let mut perm = [0u8; 64];

    for i in 0..64 {
        let mut k = PC2[i] as usize;
        if k == 0 {
            continue;
        }
        if k % 28 < 1 {
            k -= 28;
        }
        k = PC1[k] as usize;
        k -= 1;
        k = (k | 0x07) - (k & 0x07);
        k += 1;
        perm[i] = k as u8;
    }
    init_perm(&mut t.pc1rot, &perm);

    for j in 0..2 {
        perm = [0; 64];
        let mut temp = [0u8; 64];
        for i in 0..64 {
            let k = PC2[i] as usize;
            if k == 0 {
                continue;
            }
            temp[k - 1] = (i + 1) as u8;
        }
        for i in 0..64 {
            let mut k = PC2[i] as usize;
            if k == 0 {
                continue;
            }
            k += j;
            if k % 28 <= j {
                k -= 28;
            }
            perm[i] = temp[k];
        }
        init_perm(&mut t.pc2rot[j], &perm);
    }

    perm = [0; 64];
    for i in 0..64 {
        let mut k = IP[CIFP[i] as usize - 1] as usize;
        k -= 1;
        k = (k | 0x07) - (k & 0x07);
        k += 1;
        perm[k - 1] = (i + 1) as u8;
    }
    init_perm(&mut t.cf6464, &perm);

    let mut sel = [0u8; 48];
    for i in 0..48 {
        sel[i] = P32_TR[EXPAND_TR[i] as usize - 1];
    }
    for (bt, sbox) in SBOX.iter().enumerate() {
        for j in 0..64 {
            let k = ((j & 0x01) << 5)
                | ((j >> 1 & 0x01) << 3)
                | ((j >> 2 & 0x01) << 2)
                | ((j >> 3 & 0x01) << 1)
                | (j >> 4 & 0x01)
                | ((j >> 5 & 0x01) << 4);
            let k = sbox[k] as usize;
            let k = (k >> 3 & 0x01) | ((k >> 2 & 0x01) << 1) | ((k >> 1 & 0x01) << 2) | ((k & 0x01) << 3);
            let mut temp = [0u8; 32];
            for i in 0..4 {
                temp[4 * bt + i] = ((k >> i) & 0x01) as u8;
            }
            let mut kk = 0u64;
            for i in (0..24).rev() {
                kk = (kk << 1)
                    | ((temp[sel[i] as usize - 1] as u64) << 32)
                    | temp[sel[i + 24] as usize - 1] as u64;
            }
            t.spe[bt][j] = to_six_bit(kk);
        }
    }

    t
}

fn perm6464(mut c: u64, p: &[[u64; 16]; 16]) -> u64 {
    let mut out = 0u64;
    for i in (0..8).rev() {
        let t = (c & 0xff) as usize;
        c >>= 8;
        out |= p[i << 1][t & 0x0f];
        out |= p[(i << 1) + 1][t >> 4];
    }
    out
}

fn des_set_key(keyword: u64) -> [u64; 16] {
    let t = tables();
    let mut k = perm6464(keyword, &t.pc1rot);
    let mut ks = [0u64; 16];
    ks[0] = k & !0x0303_0303_0000_0000;
    for i in 1..16 {
        k = perm6464(k, &t.pc2rot[ROTATES[i] as usize - 1]);
        ks[i] = k & !0x0303_0303_0000_0000;
    }
    ks
}

fn op_salt(r: u64) -> u64 {
    let k = ((r >> 32) ^ r) & FB_SALT;
    k | (k << 32)
}

fn op_spe(b: u64) -> u64 {
    let spe = &tables().spe;
    spe[0][(b >> 58 & 0x3f) as usize]
        ^ spe[1][(b >> 50 & 0x3f) as usize]
        ^ spe[2][(b >> 42 & 0x3f) as usize]
        ^ spe[3][(b >> 34 & 0x3f) as usize]
        ^ spe[4][(b >> 26 & 0x3f) as usize]
        ^ spe[5][(b >> 18 & 0x3f) as usize]
        ^ spe[6][(b >> 10 & 0x3f) as usize]
        ^ spe[7][(b >> 2 & 0x3f) as usize]
}

fn des_cipher(ks: &[u64; 16]) -> u64 {
    let mut l = 0u64;
    let mut r = 0u64;
    for _ in 0..ITERATIONS {
        for round in 0..8 {
            l ^= op_spe(op_salt(r) ^ r ^ ks[round << 1]);
            r ^= op_spe(op_salt(l) ^ l ^ ks[(round << 1) + 1]);
        }
        std::mem::swap(&mut l, &mut r);
    }
    let folded = (((l >> 35) & 0x0f0f_0f0f) | ((l << 1) & 0xf0f0_f0f0)) << 32
        | ((r >> 35) & 0x0f0f_0f0f)
        | ((r << 1) & 0xf0f0_f0f0);
    perm6464(folded, &tables().cf6464)
}

/// Hash a password into its eleven character crypt form. A missing or
/// empty password hashes to a single `*`, which can never verify.
pub(crate) fn client_proof(key: Option<&str>) -> Vec<u8> {
    let Some(key) = key.filter(|key| !key.is_empty()) else {
        return vec![b'*'];
    };

    let bytes = key.as_bytes();
    let mut keyword = 0u64;
    for i in 0..8 {
        let b = bytes.get(i).map_or(0, |&b| b.wrapping_mul(2));
        keyword = (keyword << 8) | b as u64;
    }

    let mut result = des_cipher(&des_set_key(keyword));

    let mut out = vec![0u8; 11];
    out[10] = ITOA64[((result << 2) & 0x3f) as usize];
    result >>= 4;
    for i in (0..10).rev() {
        out[i] = ITOA64[(result & 0x3f) as usize];
        result >>= 6;
    }
    out
}

/// The part of the hash that actually travels: everything after the two
/// salt characters.
pub(crate) fn wire_proof(key: Option<&str>) -> Vec<u8> {
    let full = client_proof(key);
    if full.len() > 2 { full[2..].to_vec() } else { full }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_password_is_star() {
        assert_eq!(client_proof(None), vec![b'*']);
        assert_eq!(client_proof(Some("")), vec![b'*']);
        assert_eq!(wire_proof(None), vec![b'*']);
        assert_eq!(wire_proof(Some("")), vec![b'*']);
    }

    #[test]
    fn proof_shape() {
        let proof = client_proof(Some("masterkey"));
        assert_eq!(proof.len(), 11);
        assert!(proof.iter().all(|b| ITOA64.contains(b)));
        assert_eq!(wire_proof(Some("masterkey")), proof[2..].to_vec());
    }

    #[test]
    fn deterministic_and_password_sensitive() {
        assert_eq!(client_proof(Some("masterkey")), client_proof(Some("masterkey")));
        // differs inside the eight character crypt window
        assert_ne!(client_proof(Some("masterkey")), client_proof(Some("masterkay")));
        assert_ne!(client_proof(Some("a")), client_proof(Some("b")));
    }

    #[test]
    fn only_first_eight_characters_matter() {
        assert_eq!(client_proof(Some("password123")), client_proof(Some("passwordXYZ")));
        assert_ne!(client_proof(Some("passwor")), client_proof(Some("password")));
    }
}

//! Bob Jenkins' lookup3 hash
//!
//! CASC uses `hashlittle2` to derive the 64-bit name hash stored in root
//! manifests and `hashlittle` to checksum the guarded blocks of local
//! `.idx` journals.

/// Compute `hashlittle` over `data` with the given initial value.
///
/// ```
/// use wowvfs_formats::jenkins::hashlittle;
///
/// assert_eq!(hashlittle(b"", 0), 0xdead_beef);
/// ```
pub fn hashlittle(data: &[u8], initval: u32) -> u32 {
    let (c, _) = lookup3(data, initval, 0);
    c
}

/// Compute `hashlittle2` over `data`.
///
/// `pc` and `pb` seed the state and the two 32-bit results are returned in
/// the same order, matching the in/out parameters of lookup3.c.
pub fn hashlittle2(data: &[u8], pc: u32, pb: u32) -> (u32, u32) {
    lookup3(data, pc, pb)
}

/// 64-bit name hash of an archive path, as stored in root manifests.
///
/// The path is upper-cased and forward slashes become backslashes before
/// hashing, so `world/wmo/a.wmo` and `WORLD\WMO\A.WMO` hash identically.
pub fn hash_path(path: &str) -> u64 {
    let normalized: Vec<u8> = path
        .bytes()
        .map(|b| match b {
            b'/' => b'\\',
            other => other.to_ascii_uppercase(),
        })
        .collect();
    let (pc, pb) = hashlittle2(&normalized, 0, 0);
    (u64::from(pc) << 32) | u64::from(pb)
}

fn lookup3(data: &[u8], pc: u32, pb: u32) -> (u32, u32) {
    let len = u32::try_from(data.len()).unwrap_or(u32::MAX);
    let mut a = 0xdead_beef_u32.wrapping_add(len).wrapping_add(pc);
    let mut b = a;
    let mut c = a.wrapping_add(pb);

    if data.is_empty() {
        return (c, b);
    }

    let mut rest = data;
    while rest.len() > 12 {
        a = a.wrapping_add(word(&rest[0..4]));
        b = b.wrapping_add(word(&rest[4..8]));
        c = c.wrapping_add(word(&rest[8..12]));
        mix(&mut a, &mut b, &mut c);
        rest = &rest[12..];
    }

    // The tail is added byte-wise in lookup3.c; zero padding gives the same sums
    let mut tail = [0u8; 12];
    tail[..rest.len()].copy_from_slice(rest);
    a = a.wrapping_add(word(&tail[0..4]));
    b = b.wrapping_add(word(&tail[4..8]));
    c = c.wrapping_add(word(&tail[8..12]));
    finalize(&mut a, &mut b, &mut c);

    (c, b)
}

fn word(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn mix(a: &mut u32, b: &mut u32, c: &mut u32) {
    *a = a.wrapping_sub(*c);
    *a ^= c.rotate_left(4);
    *c = c.wrapping_add(*b);
    *b = b.wrapping_sub(*a);
    *b ^= a.rotate_left(6);
    *a = a.wrapping_add(*c);
    *c = c.wrapping_sub(*b);
    *c ^= b.rotate_left(8);
    *b = b.wrapping_add(*a);
    *a = a.wrapping_sub(*c);
    *a ^= c.rotate_left(16);
    *c = c.wrapping_add(*b);
    *b = b.wrapping_sub(*a);
    *b ^= a.rotate_left(19);
    *a = a.wrapping_add(*c);
    *c = c.wrapping_sub(*b);
    *c ^= b.rotate_left(4);
    *b = b.wrapping_add(*a);
}

fn finalize(a: &mut u32, b: &mut u32, c: &mut u32) {
    *c ^= *b;
    *c = c.wrapping_sub(b.rotate_left(14));
    *a ^= *c;
    *a = a.wrapping_sub(c.rotate_left(11));
    *b ^= *a;
    *b = b.wrapping_sub(a.rotate_left(25));
    *c ^= *b;
    *c = c.wrapping_sub(b.rotate_left(16));
    *a ^= *c;
    *a = a.wrapping_sub(c.rotate_left(4));
    *b ^= *a;
    *b = b.wrapping_sub(a.rotate_left(14));
    *c ^= *b;
    *c = c.wrapping_sub(b.rotate_left(24));
}

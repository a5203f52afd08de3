#![allow(dead_code)]

use nxextract::formats::sarc::{DEFAULT_HASH_KEY, sarc_hash};

/// Yaz0 stream holding `data` as literals only.
pub fn yaz0(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"Yaz0");
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(&[0; 8]);
    for chunk in data.chunks(8) {
        out.push(0xFF);
        out.extend_from_slice(chunk);
    }
    out
}

/// Big-endian SARC archive holding named `files` in order.
pub fn sarc(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut names = Vec::new();
    let mut nodes = Vec::new();
    let mut data = Vec::new();
    for (name, contents) in files {
        let attrs = 0x0100_0000 | (names.len() as u32 / 4);
        names.extend_from_slice(name.as_bytes());
        names.push(0);
        while names.len() % 4 != 0 {
            names.push(0);
        }
        let start = data.len() as u32;
        data.extend_from_slice(contents);
        nodes.push([
            sarc_hash(name.as_bytes(), DEFAULT_HASH_KEY),
            attrs,
            start,
            data.len() as u32,
        ]);
        while data.len() % 8 != 0 {
            data.push(0);
        }
    }

    let data_offset = 0x14 + 0x0C + nodes.len() * 0x10 + 8 + names.len();
    let mut out = Vec::new();
    out.extend_from_slice(b"SARC");
    out.extend_from_slice(&0x14u16.to_be_bytes());
    out.extend_from_slice(&[0xFE, 0xFF]);
    out.extend_from_slice(&((data_offset + data.len()) as u32).to_be_bytes());
    out.extend_from_slice(&(data_offset as u32).to_be_bytes());
    out.extend_from_slice(&0x0100u16.to_be_bytes());
    out.extend_from_slice(&[0, 0]);
    out.extend_from_slice(b"SFAT");
    out.extend_from_slice(&0x0Cu16.to_be_bytes());
    out.extend_from_slice(&(nodes.len() as u16).to_be_bytes());
    out.extend_from_slice(&DEFAULT_HASH_KEY.to_be_bytes());
    for node in &nodes {
        for v in node {
            out.extend_from_slice(&v.to_be_bytes());
        }
    }
    out.extend_from_slice(b"SFNT");
    out.extend_from_slice(&8u16.to_be_bytes());
    out.extend_from_slice(&[0, 0]);
    out.extend_from_slice(&names);
    out.extend_from_slice(&data);
    out
}

/// Minimal big-endian BYML header.
pub fn byml() -> Vec<u8> {
    let mut out = b"BY".to_vec();
    out.extend_from_slice(&2u16.to_be_bytes());
    for v in [0x10u32, 0, 0x10] {
        out.extend_from_slice(&v.to_be_bytes());
    }
    out
}

/// Little-endian BNTX with one linear 8×8 BC1 texture named "tex": mip 0
/// is solid red, mip 1 (4×4) solid blue.
pub fn bntx() -> Vec<u8> {
    fn put(b: &mut [u8], at: usize, v: &[u8]) {
        b[at..at + v.len()].copy_from_slice(v);
    }

    let mut b = vec![0u8; 0x128];
    put(&mut b, 0x00, b"BNTX");
    put(&mut b, 0x08, &0x0004_0000u32.to_le_bytes());
    put(&mut b, 0x0C, &[0xFF, 0xFE]);
    put(&mut b, 0x1C, &0x128u32.to_le_bytes());

    put(&mut b, 0x20, b"NX  ");
    put(&mut b, 0x24, &1u32.to_le_bytes());
    put(&mut b, 0x28, &0x48u64.to_le_bytes());
    put(&mut b, 0x30, &0x100u64.to_le_bytes());
    put(&mut b, 0x48, &0x50u64.to_le_bytes());

    let t = 0x50;
    put(&mut b, t, b"BRTI");
    b[t + 0x11] = 2;
    put(&mut b, t + 0x12, &1u16.to_le_bytes());
    put(&mut b, t + 0x16, &2u16.to_le_bytes());
    put(&mut b, t + 0x1C, &0x1A01u32.to_le_bytes());
    put(&mut b, t + 0x24, &8u32.to_le_bytes());
    put(&mut b, t + 0x28, &8u32.to_le_bytes());
    put(&mut b, t + 0x2C, &1u32.to_le_bytes());
    put(&mut b, t + 0x30, &1u32.to_le_bytes());
    put(&mut b, t + 0x50, &40u32.to_le_bytes());
    put(&mut b, t + 0x60, &0xE0u32.to_le_bytes());
    put(&mut b, t + 0x70, &0xE8u64.to_le_bytes());

    put(&mut b, 0xE0, &3u16.to_le_bytes());
    put(&mut b, 0xE2, b"tex");
    put(&mut b, 0xE8, &0x100u64.to_le_bytes());
    put(&mut b, 0xF0, &0x120u64.to_le_bytes());

    for i in 0..4 {
        put(&mut b, 0x100 + i * 8, &[0x00, 0xF8, 0x00, 0xF8]);
    }
    put(&mut b, 0x120, &[0x1F, 0x00, 0x1F, 0x00]);
    b
}

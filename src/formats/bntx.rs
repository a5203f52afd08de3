//! BNTX (Binary NX Texture) - Nintendo Switch texture container.
//!
//! Contains one or more GPU textures, each with a chain of mip levels.
//! Name and data pointers are absolute offsets from the start of the BNTX
//! and are followed directly; the relocation table is not processed.
//! Only little-endian files are supported.
//!
//! ## Layout
//! ```text
//! [0x00] BNTX header  (0x20 bytes)
//! [0x20] NX section   (0x24 bytes)
//! [InfoPtrsOffset]
//!        Array of u64 pointers to BRTI blocks (TextureCount entries)
//! [...]  BRTI blocks  (one per texture)
//! [...]  String pool, mip pointer arrays, data block, relocation table
//! ```
//!
//! ## BNTX Header (0x20 bytes)
//! ```text
//! [0x00] Magic "BNTX"                       (4 bytes)
//! [0x04] Reserved                           (4 bytes)
//! [0x08] Version                            (u32)
//! [0x0C] BOM (FF FE = little endian)        (2 bytes)
//! [0x0E] FormatRevision                     (u16)
//! [0x10] NameOffset                         (u32)
//! [0x14] Reserved                           (2 bytes)
//! [0x16] StringPoolOffset                   (u16)
//! [0x18] RelocTableOffset                   (u32)
//! [0x1C] FileSize                           (u32)
//! ```
//!
//! ## NX Section (at 0x20)
//! ```text
//! [0x00] Magic "NX  "                        (4 bytes)
//! [0x04] TextureCount                        (u32)
//! [0x08] InfoPtrsOffset                      (u64)
//! [0x10] DataBlkOffset                       (u64)
//! [0x18] DictOffset                          (u64)
//! [0x20] StrDictLength                       (u32)
//! ```
//!
//! ## BRTI (Texture Info, first 0x78 bytes)
//! ```text
//! [0x00] Magic "BRTI"                       (4 bytes)
//! [0x04] Length                             (u32)
//! [0x08] Length64                           (u64)
//! [0x10] Flags                              (u8)
//! [0x11] Dimensions (1=1D,2=2D,3=3D,6=Cube) (u8)
//! [0x12] TileMode (0=block linear, 1=linear)(u16)
//! [0x14] SwizzleValue                       (u16)
//! [0x16] MipmapCount                        (u16)
//! [0x18] MultiSampleCount                   (u16)
//! [0x1A] Reserved                           (u16)
//! [0x1C] Format                             (u32)
//! [0x20] AccessFlags                        (u32)
//! [0x24] Width                              (u32)
//! [0x28] Height                             (u32)
//! [0x2C] Depth                              (u32)
//! [0x30] ArrayCount                         (u32)
//! [0x34] BlockHeightLog2                    (u32)
//! [0x38] Unknown                            (0x18 bytes)
//! [0x50] DataLength                         (u32)
//! [0x54] Alignment                          (u32)
//! [0x58] ChannelTypes                       (4 bytes)
//! [0x5C] TextureDimension                   (u32)
//! [0x60] NameOffset                         (u32 + 4 reserved)
//! [0x68] ParentOffset                       (u64)
//! [0x70] MipPtrsOffset                      (u64) -> MipmapCount × u64
//! ```
//!
//! ## Name encoding
//! Names are length-prefixed: a `u16 LE` byte count followed by that many
//! UTF-8 bytes (no null terminator).

use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::decoder::{Container, Decode, DecodedObject, Leaf};
use crate::record::{ByteOrderMark, Endian, Field, RecordSpec, Value, pow2};
use crate::registry::Codec;
use crate::texture::swizzle::{BlockLinear, LinearBlocks, mip_block_height_log2};
use crate::texture::{PixelFormat, PixelSurface, bcn, blocks_for, tga};
use crate::utils::{bytesv, check_magic};
use crate::{Error, Result};

const HEADER: &[Field] = &[
    Field::bytes("magic", 4),
    Field::padding(4),
    Field::u32("version"),
    Field::custom("byte_order", &ByteOrderMark),
    Field::u16("revision"),
    Field::str_offset("name"),
    Field::padding(2),
    Field::u16("strings_offset"),
    Field::u32("reloc_table"),
    Field::u32("file_size"),
];

const NX_HEADER: &[Field] = &[
    Field::bytes("magic", 4),
    Field::u32("texture_count"),
    Field::u64("info_ptrs"),
    Field::u64("data_block"),
    Field::u64("dict"),
    Field::u32("str_dict_len"),
];

const BRTI: &[Field] = &[
    Field::bytes("magic", 4),
    Field::u32("length"),
    Field::u64("length64"),
    Field::u8("flags"),
    Field::u8("dimension").map(dimension),
    Field::u16("tile_mode"),
    Field::u16("swizzle"),
    Field::u16("mip_count"),
    Field::u16("sample_count"),
    Field::padding(2),
    Field::u32("format"),
    Field::u32("access_flags"),
    Field::u32("width"),
    Field::u32("height"),
    Field::u32("depth"),
    Field::u32("array_count"),
    Field::u32("block_height").map(pow2),
    Field::u16("unk38"),
    Field::u16("unk3a"),
    Field::i32("unk3c"),
    Field::i32("unk40"),
    Field::i32("unk44"),
    Field::i32("unk48"),
    Field::i32("unk4c"),
    Field::u32("data_len"),
    Field::u32("alignment"),
    Field::bytes("channel_types", 4),
    Field::u32("texture_dim"),
    Field::str_offset("name"),
    Field::padding(4),
    Field::u64("parent"),
    Field::u64("mip_ptrs"),
];

const TILE_MODE_LINEAR: u16 = 1;

/// Largest width or height the Tegra X1 samples.
const MAX_DIMENSION: u32 = 16384;

fn dimension(v: Value) -> Value {
    match v {
        Value::Unsigned(1) => Value::Symbol("1D"),
        Value::Unsigned(2) => Value::Symbol("2D"),
        Value::Unsigned(3) => Value::Symbol("3D"),
        Value::Unsigned(6) => Value::Symbol("cube"),
        other => other,
    }
}

/// Metadata for a single texture stored in a BNTX file.
#[derive(Debug, Clone)]
pub struct TextureInfo {
    /// Texture name (resolved from the string pool).
    pub name: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Depth (for 3D textures) or face count (for cube maps).
    pub depth: u32,
    /// Number of array slices.
    pub array_count: u32,
    /// `1D`, `2D`, `3D`, `cube`, or [`None`] for unknown values.
    pub dimension: Option<&'static str>,
    /// Raw format identifier (see [`crate::texture`]).
    pub format: u32,
    pub tile_mode: u16,
    /// Block height of the base level, in GOBs.
    pub block_height: u32,
    /// Total size of GPU data in bytes.
    pub data_length: u32,
    /// Absolute offset of each mip level.
    pub mip_offsets: Vec<u64>,
}

impl TextureInfo {
    /// Number of mip levels.
    pub fn mip_count(&self) -> usize {
        self.mip_offsets.len()
    }

    /// Pixel size of mip level `mip`.
    pub fn mip_size(&self, mip: usize) -> (u32, u32) {
        let shift = mip.min(31) as u32;
        ((self.width >> shift).max(1), (self.height >> shift).max(1))
    }

    /// Absolute offset and length of the data for mip level `mip`.
    ///
    /// Each level runs up to the next one; the last one ends at the end of
    /// the texture's data.
    pub fn mip_range(&self, mip: usize) -> Option<(u64, u64)> {
        let start = *self.mip_offsets.get(mip)?;
        let end = match self.mip_offsets.get(mip + 1) {
            Some(&next) => next,
            None => self.mip_offsets[0].saturating_add(self.data_length as u64),
        };
        Some((start, end.saturating_sub(start)))
    }

    /// The BCn format of this texture, if it has one.
    pub fn pixel_format(&self) -> Result<PixelFormat> {
        PixelFormat::from_id(self.format)
    }
}

/// Parsed BNTX texture container.
#[derive(Debug)]
pub struct Bntx {
    pub version: u32,
    /// Total size declared by the header.
    pub file_size: u32,
    /// Metadata for each texture. GPU data is not loaded into memory.
    pub textures: Vec<TextureInfo>,
    /// Absolute offset of the GPU data block.
    pub data_block_offset: u64,
}

impl Bntx {
    /// Parse a BNTX file from `r`.
    ///
    /// `r` must be positioned at the start of the BNTX; internal pointers
    /// are taken relative to that position.
    pub fn parse<R: Read + Seek>(r: &mut R) -> Result<Self> {
        let start = r.stream_position()?;

        let header = RecordSpec::new(Endian::Little, HEADER, Some(0x20))?.read_at(r, start)?;
        check_magic(header.bytes("magic")?, b"BNTX")?;
        if header.symbol("byte_order")? == "big" {
            return Err(Error::UnsupportedVariant("big-endian BNTX"));
        }
        header.dump("BNTX header");

        let nx = RecordSpec::new(Endian::Little, NX_HEADER, Some(0x24))?.read_at(r, start + 0x20)?;
        check_magic(nx.bytes("magic")?, b"NX  ")?;
        let texture_count = nx.u32("texture_count")? as usize;
        let info_ptrs = nx.u64("info_ptrs")?;
        debug!("BNTX holds {texture_count} textures");

        r.seek(SeekFrom::Start(at(start, info_ptrs)?))?;
        let ptrs = read_u64_array(r, texture_count)?;

        let brti = RecordSpec::new(Endian::Little, BRTI, Some(0x78))?;
        let mut textures = Vec::with_capacity(texture_count);
        for ptr in ptrs {
            textures.push(parse_brti(r, &brti, start, ptr)?);
        }

        Ok(Self {
            version: header.u32("version")?,
            file_size: header.u32("file_size")?,
            textures,
            data_block_offset: at(start, nx.u64("data_block")?)?,
        })
    }
}

fn parse_brti<R: Read + Seek>(
    r: &mut R,
    spec: &RecordSpec,
    start: u64,
    ptr: u64,
) -> Result<TextureInfo> {
    let rec = spec.read_at(r, at(start, ptr)?)?;
    check_magic(rec.bytes("magic")?, b"BRTI")?;
    rec.dump("BRTI");

    let name = read_bntx_name(r, at(start, rec.offset("name")?)?)?;
    let mip_count = rec.u16("mip_count")? as usize;
    r.seek(SeekFrom::Start(at(start, rec.u64("mip_ptrs")?)?))?;
    let mip_offsets = read_u64_array(r, mip_count)?
        .into_iter()
        .map(|o| at(start, o))
        .collect::<Result<Vec<_>>>()?;

    let dimension = match rec.get("dimension")? {
        Value::Symbol(s) => Some(*s),
        _ => None,
    };
    let (width, height) = (rec.u32("width")?, rec.u32("height")?);
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(Error::malformed(format!(
            "texture {name} is {width}x{height}, above the {MAX_DIMENSION} pixel limit"
        )));
    }
    let array_count = rec.u32("array_count")?;
    if array_count > 1 {
        debug!("texture {name} has {array_count} layers; only the first is decoded");
    }

    Ok(TextureInfo {
        name,
        width,
        height,
        depth: rec.u32("depth")?,
        array_count,
        dimension,
        format: rec.u32("format")?,
        tile_mode: rec.u16("tile_mode")?,
        block_height: rec.u32("block_height")?,
        data_length: rec.u32("data_len")?,
        mip_offsets,
    })
}

/// Absolute position of a pointer stored relative to the BNTX start.
fn at(start: u64, offset: u64) -> Result<u64> {
    start.checked_add(offset).ok_or(Error::InvalidRange)
}

fn read_u64_array<R: Read>(r: &mut R, count: usize) -> Result<Vec<u64>> {
    let len = count.checked_mul(8).ok_or(Error::InvalidRange)?;
    let buf = bytesv(r, len)?;
    Ok(buf
        .chunks_exact(8)
        .map(|c| u64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
        .collect())
}

/// Read a length-prefixed string from the string pool.
///
/// The pointer `ptr` is the absolute byte offset of the `u16` length field.
/// Names have no null terminator.
fn read_bntx_name<R: Read + Seek>(r: &mut R, ptr: u64) -> Result<String> {
    r.seek(SeekFrom::Start(ptr))?;
    let len = bytesv(r, 2)?;
    let len = u16::from_le_bytes([len[0], len[1]]) as usize;
    let buf = bytesv(r, len)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Decoder for BNTX files.
///
/// Each texture becomes a [`Container`] named after it, holding one leaf
/// per mip level: `mip<i>.tga` for BCn textures, `mip<i>.bin` with the
/// raw GPU data otherwise.
pub struct BntxDecoder<R> {
    inner: R,
    dest: Option<PathBuf>,
    pub bntx: Bntx,
    objects: Vec<DecodedObject>,
    /// (texture, mip) for each leaf id.
    leaves: Vec<(usize, usize)>,
}

impl<R: Read + Seek> BntxDecoder<R> {
    pub fn new(mut reader: R, dest: Option<PathBuf>) -> Result<Self> {
        let bntx = Bntx::parse(&mut reader)?;

        let mut objects = Vec::with_capacity(bntx.textures.len());
        let mut leaves = Vec::new();
        for (t, tex) in bntx.textures.iter().enumerate() {
            let decodable = tex.pixel_format().is_ok();
            if !decodable {
                debug!(
                    "texture {} format {:#06x} is kept raw",
                    tex.name,
                    tex.format
                );
            }
            let mut children = Vec::with_capacity(tex.mip_count());
            for mip in 0..tex.mip_count() {
                let (name, size) = if decodable {
                    let (w, h) = tex.mip_size(mip);
                    (format!("mip{mip}.tga"), tga::encoded_len(w, h))
                } else {
                    let len = tex.mip_range(mip).map(|(_, len)| len);
                    (format!("mip{mip}.bin"), len)
                };
                children.push(DecodedObject::Leaf(Leaf {
                    name: Some(name),
                    size,
                    id: leaves.len(),
                }));
                leaves.push((t, mip));
            }
            objects.push(DecodedObject::Container(Container {
                name: Some(tex.name.clone()),
                children,
            }));
        }

        Ok(Self {
            inner: reader,
            dest,
            bntx,
            objects,
            leaves,
        })
    }

    /// Raw GPU data of one mip level.
    ///
    /// Reads whatever is present when the file ends early.
    pub fn read_mip(&mut self, texture: usize, mip: usize) -> Result<Vec<u8>> {
        let (offset, len) = self
            .bntx
            .textures
            .get(texture)
            .and_then(|t| t.mip_range(mip))
            .ok_or(Error::InvalidRange)?;
        self.inner.seek(SeekFrom::Start(offset))?;
        let mut data = Vec::with_capacity(len.min(1 << 26) as usize);
        self.inner.by_ref().take(len).read_to_end(&mut data)?;
        if (data.len() as u64) < len {
            warn!(
                "mip {mip} of texture {texture} is truncated: {} of {len} bytes present",
                data.len()
            );
        }
        Ok(data)
    }

    /// Decode one mip level of a BCn texture.
    ///
    /// A truncated level decodes partially; see [`PixelSurface::is_complete`].
    pub fn decode_mip(&mut self, texture: usize, mip: usize) -> Result<PixelSurface> {
        let data = self.read_mip(texture, mip)?;
        let tex = &self.bntx.textures[texture];
        let format = tex.pixel_format()?;
        let (width, height) = tex.mip_size(mip);
        let blocks_x = blocks_for(width);
        let block_bytes = format.bc.block_bytes();

        if tex.tile_mode == TILE_MODE_LINEAR {
            let layout = LinearBlocks::new(blocks_x, block_bytes);
            bcn::decode_surface(&data, width, height, format, &layout)
        } else {
            let base_log2 = tex.block_height.max(1).trailing_zeros();
            let log2 = mip_block_height_log2(base_log2, tex.height, 4, mip as u32);
            let layout = BlockLinear::new(blocks_x, block_bytes, 1 << log2);
            bcn::decode_surface(&data, width, height, format, &layout)
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> Decode for BntxDecoder<R> {
    fn codec(&self) -> Codec {
        Codec::Bntx
    }

    fn objects(&self) -> &[DecodedObject] {
        &self.objects
    }

    fn num_objects(&self) -> Option<usize> {
        Some(self.bntx.textures.len())
    }

    fn read_leaf(&mut self, leaf: &Leaf) -> Result<Vec<u8>> {
        let &(texture, mip) = self.leaves.get(leaf.id).ok_or(Error::InvalidRange)?;
        if self.bntx.textures[texture].pixel_format().is_ok() {
            let surface = self.decode_mip(texture, mip)?;
            tga::encode(&surface)
        } else {
            self.read_mip(texture, mip)
        }
    }

    fn destination(&self) -> Option<&Path> {
        self.dest.as_deref()
    }
}

//! Merge the Unicode-range subsets of one font back into a single TrueType font.
//!
//! Glyphs are appended subset after subset, so the first subset keeps its glyph
//! ids and its layout tables stay valid. Later subsets only contribute outlines,
//! metrics and cmap entries.

use std::collections::BTreeMap;

use fontcull_skrifa::{FontRef, MetadataProvider};
use fontcull_write_fonts::FontBuilder;
use fontcull_write_fonts::tables::cmap::Cmap;
use fontcull_write_fonts::types::{GlyphId, Tag};

use crate::sfnt::{TableReader, decompress_font, put_i16, put_u16, put_u32};
use crate::{Error, Result};

/// Tables written from scratch or patched from the merged glyph set
const REBUILT_TABLES: [&[u8; 4]; 9] = [
    b"head", b"hhea", b"maxp", b"hmtx", b"loca", b"glyf", b"cmap", b"post", b"OS/2",
];

/// Per-glyph tables we cannot rebuild; keeping the first subset's copy would be wrong.
const DROPPED_TABLES: [&[u8; 4]; 7] = [
    b"hdmx", b"LTSH", b"VDMX", b"DSIG", b"vhea", b"vmtx", b"VORG",
];

// composite glyph flags
const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
const WE_HAVE_A_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;

/// One parsed input subset
struct Subset<'a> {
    index: usize,
    font: FontRef<'a>,
    head: TableReader<'a>,
    hhea: TableReader<'a>,
    maxp: TableReader<'a>,
    hmtx: TableReader<'a>,
    loca: TableReader<'a>,
    glyf: TableReader<'a>,
    os2: Option<TableReader<'a>>,
    post: Option<TableReader<'a>>,
    num_glyphs: u16,
    num_h_metrics: u16,
    long_loca: bool,
}

impl<'a> Subset<'a> {
    fn parse(index: usize, data: &'a [u8]) -> Result<Self> {
        let font = FontRef::new(data).map_err(|e| {
            Error::Merge(format!("subset {index}: failed to parse font: {e:?}"))
        })?;

        let table = |tag: &[u8; 4]| {
            font.table_data(fontcull_skrifa::Tag::new(tag))
                .map(|data| data.as_bytes())
        };

        if table(b"CFF ").is_some() || table(b"CFF2").is_some() {
            return Err(Error::Merge(format!(
                "subset {index} has CFF outlines, only TrueType outlines can be merged"
            )));
        }
        if table(b"gvar").is_some() {
            return Err(Error::Merge(format!(
                "subset {index} is a variable font, which cannot be merged"
            )));
        }

        let required = |name: &'static str, tag: &[u8; 4]| {
            table(tag)
                .map(|data| TableReader::new(name, data))
                .ok_or_else(|| Error::Merge(format!("subset {index} has no {name} table")))
        };

        let head = required("head", b"head")?;
        let hhea = required("hhea", b"hhea")?;
        let maxp = required("maxp", b"maxp")?;
        let hmtx = required("hmtx", b"hmtx")?;
        let loca = required("loca", b"loca")?;
        let glyf = required("glyf", b"glyf")?;
        let os2 = table(b"OS/2").map(|data| TableReader::new("OS/2", data));
        let post = table(b"post").map(|data| TableReader::new("post", data));

        // make sure the fixed-size headers are all there before patching them
        head.bytes(0, 54)?;
        hhea.bytes(0, 36)?;

        let num_glyphs = maxp.u16(4)?;
        let num_h_metrics = hhea.u16(34)?;
        if num_h_metrics == 0 {
            return Err(Error::Merge(format!(
                "subset {index} declares no horizontal metrics"
            )));
        }

        Ok(Self {
            index,
            long_loca: head.i16(50)? != 0,
            font,
            head,
            hhea,
            maxp,
            hmtx,
            loca,
            glyf,
            os2,
            post,
            num_glyphs,
            num_h_metrics,
        })
    }

    fn units_per_em(&self) -> Result<u16> {
        self.head.u16(18)
    }

    /// Raw outline bytes of `gid`, empty for glyphs without outlines
    fn glyph(&self, gid: u16) -> Result<&'a [u8]> {
        let gid = gid as usize;
        let (start, end) = if self.long_loca {
            (
                self.loca.u32(gid * 4)? as usize,
                self.loca.u32(gid * 4 + 4)? as usize,
            )
        } else {
            (
                self.loca.u16(gid * 2)? as usize * 2,
                self.loca.u16(gid * 2 + 2)? as usize * 2,
            )
        };
        if end < start {
            return Err(Error::Merge(format!(
                "subset {}: loca offsets decrease at glyph {gid}",
                self.index
            )));
        }
        self.glyf.bytes(start, end - start)
    }

    /// Advance width and left side bearing of `gid`
    fn metric(&self, gid: u16) -> Result<(u16, i16)> {
        let gid = gid as usize;
        let long = self.num_h_metrics as usize;
        if gid < long {
            Ok((self.hmtx.u16(gid * 4)?, self.hmtx.i16(gid * 4 + 2)?))
        } else {
            let advance = self.hmtx.u16((long - 1) * 4)?;
            let lsb = self.hmtx.i16(long * 4 + (gid - long) * 2)?;
            Ok((advance, lsb))
        }
    }
}

/// Combine subsets of one font into a single TrueType binary.
///
/// Inputs may be TrueType or WOFF2. Earlier subsets win wherever tables
/// conflict, so pass them in a stable order. A single subset is returned as is.
pub fn merge_subsets<B: AsRef<[u8]>>(subsets: &[B]) -> Result<Vec<u8>> {
    if subsets.is_empty() {
        return Err(Error::Value("no subsets to merge".to_string()));
    }

    let mut decoded = subsets
        .iter()
        .map(|subset| decompress_font(subset.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    if decoded.len() == 1 {
        Subset::parse(0, &decoded[0])?;
        return Ok(decoded.swap_remove(0));
    }

    let parsed = decoded
        .iter()
        .enumerate()
        .map(|(index, data)| Subset::parse(index, data))
        .collect::<Result<Vec<_>>>()?;

    let first = &parsed[0];
    let units_per_em = first.units_per_em()?;
    for subset in &parsed[1..] {
        if subset.units_per_em()? != units_per_em {
            return Err(Error::Merge(format!(
                "subset {} uses {} units per em, subset 0 uses {units_per_em}",
                subset.index,
                subset.units_per_em()?
            )));
        }
    }

    let total: u32 = parsed.iter().map(|s| s.num_glyphs as u32).sum();
    let total = u16::try_from(total).map_err(|_| {
        Error::Merge(format!("merged font would have {total} glyphs, more than 65535"))
    })?;

    let mut glyf = Vec::new();
    let mut loca = Vec::with_capacity((total as usize + 1) * 4);
    let mut hmtx = Vec::with_capacity(total as usize * 4);
    let mut mappings: BTreeMap<char, GlyphId> = BTreeMap::new();
    let mut base: u16 = 0;

    for subset in &parsed {
        for gid in 0..subset.num_glyphs {
            loca.extend_from_slice(&(glyf.len() as u32).to_be_bytes());
            let start = glyf.len();
            glyf.extend_from_slice(subset.glyph(gid)?);
            rebase_components(&mut glyf[start..], base, subset.index)?;
            while glyf.len() % 4 != 0 {
                glyf.push(0);
            }

            let (advance, lsb) = subset.metric(gid)?;
            hmtx.extend_from_slice(&advance.to_be_bytes());
            hmtx.extend_from_slice(&lsb.to_be_bytes());
        }

        for (codepoint, gid) in subset.font.charmap().mappings() {
            let Some(c) = char::from_u32(codepoint) else {
                continue;
            };
            if gid.to_u32() >= subset.num_glyphs as u32 {
                continue;
            }
            mappings
                .entry(c)
                .or_insert_with(|| GlyphId::new(gid.to_u32() + base as u32));
        }

        base += subset.num_glyphs;
    }
    loca.extend_from_slice(&(glyf.len() as u32).to_be_bytes());

    let cmap = Cmap::from_mappings(mappings.iter().map(|(c, gid)| (*c, *gid)))
        .map_err(|e| Error::Merge(format!("failed to build cmap: {e:?}")))?;

    let head = merged_head(&parsed)?;
    let hhea = merged_hhea(&parsed, total)?;
    let maxp = merged_maxp(&parsed, total)?;

    let mut builder = FontBuilder::new();
    builder
        .add_table(&cmap)
        .map_err(|e| Error::Merge(format!("failed to write cmap: {e:?}")))?;
    builder
        .add_raw(Tag::new(b"head"), head)
        .add_raw(Tag::new(b"hhea"), hhea)
        .add_raw(Tag::new(b"maxp"), maxp)
        .add_raw(Tag::new(b"hmtx"), hmtx)
        .add_raw(Tag::new(b"loca"), loca)
        .add_raw(Tag::new(b"glyf"), glyf);

    if let Some(os2) = merged_os2(&parsed, &mappings)? {
        builder.add_raw(Tag::new(b"OS/2"), os2);
    }
    if let Some(post) = first.post.filter(|post| post.len() >= 32) {
        // version 3: no glyph names, since names would need rebuilding too
        let mut post = post.bytes(0, 32)?.to_vec();
        put_u32(&mut post, 0, 0x0003_0000);
        builder.add_raw(Tag::new(b"post"), post);
    }

    for record in first.font.table_directory.table_records() {
        let tag = record.tag().to_be_bytes();
        if REBUILT_TABLES.contains(&&tag) || DROPPED_TABLES.contains(&&tag) {
            continue;
        }
        if let Some(data) = first.font.table_data(record.tag()) {
            builder.add_raw(Tag::new(&tag), data.as_bytes().to_vec());
        }
    }

    let merged = builder.build();
    tracing::debug!(
        subsets = parsed.len(),
        glyphs = total,
        codepoints = mappings.len(),
        bytes = merged.len(),
        "Merged subsets"
    );
    Ok(merged)
}

/// Shift the component glyph ids of a composite glyph by `base`.
fn rebase_components(glyph: &mut [u8], base: u16, subset: usize) -> Result<()> {
    if base == 0 || glyph.len() < 10 || i16::from_be_bytes([glyph[0], glyph[1]]) >= 0 {
        return Ok(());
    }

    let mut offset = 10;
    loop {
        let reader = TableReader::new("glyf", glyph);
        let flags = reader.u16(offset)?;
        let component = reader.u16(offset + 2)?;
        let rebased = component.checked_add(base).ok_or_else(|| {
            Error::Merge(format!(
                "subset {subset}: component glyph {component} overflows after rebasing"
            ))
        })?;
        put_u16(glyph, offset + 2, rebased);

        offset += if flags & ARG_1_AND_2_ARE_WORDS != 0 { 8 } else { 6 };
        if flags & WE_HAVE_A_SCALE != 0 {
            offset += 2;
        } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            offset += 4;
        } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            offset += 8;
        }

        if flags & MORE_COMPONENTS == 0 {
            return Ok(());
        }
    }
}

fn merged_head(parsed: &[Subset<'_>]) -> Result<Vec<u8>> {
    let mut head = parsed[0].head.bytes(0, 54)?.to_vec();
    let (mut x_min, mut y_min, mut x_max, mut y_max) = (i16::MAX, i16::MAX, i16::MIN, i16::MIN);
    for subset in parsed {
        x_min = x_min.min(subset.head.i16(36)?);
        y_min = y_min.min(subset.head.i16(38)?);
        x_max = x_max.max(subset.head.i16(40)?);
        y_max = y_max.max(subset.head.i16(42)?);
    }
    put_u32(&mut head, 8, 0); // checkSumAdjustment
    put_i16(&mut head, 36, x_min);
    put_i16(&mut head, 38, y_min);
    put_i16(&mut head, 40, x_max);
    put_i16(&mut head, 42, y_max);
    put_i16(&mut head, 50, 1); // indexToLocFormat: long offsets
    Ok(head)
}

fn merged_hhea(parsed: &[Subset<'_>], total: u16) -> Result<Vec<u8>> {
    let mut hhea = parsed[0].hhea.bytes(0, 36)?.to_vec();
    let (mut advance_max, mut min_lsb, mut min_rsb, mut max_extent) =
        (0u16, i16::MAX, i16::MAX, i16::MIN);
    for subset in parsed {
        advance_max = advance_max.max(subset.hhea.u16(10)?);
        min_lsb = min_lsb.min(subset.hhea.i16(12)?);
        min_rsb = min_rsb.min(subset.hhea.i16(14)?);
        max_extent = max_extent.max(subset.hhea.i16(16)?);
    }
    put_u16(&mut hhea, 10, advance_max);
    put_i16(&mut hhea, 12, min_lsb);
    put_i16(&mut hhea, 14, min_rsb);
    put_i16(&mut hhea, 16, max_extent);
    put_u16(&mut hhea, 34, total);
    Ok(hhea)
}

fn merged_maxp(parsed: &[Subset<'_>], total: u16) -> Result<Vec<u8>> {
    let first = &parsed[0].maxp;
    // version 1.0 carries the TrueType maxima after numGlyphs
    let len = if first.len() >= 32 { 32 } else { 6 };
    let mut maxp = first.bytes(0, len)?.to_vec();
    put_u16(&mut maxp, 4, total);
    for offset in (6..len).step_by(2) {
        let mut value = 0u16;
        for subset in parsed.iter().filter(|s| s.maxp.len() >= len) {
            value = value.max(subset.maxp.u16(offset)?);
        }
        put_u16(&mut maxp, offset, value);
    }
    Ok(maxp)
}

fn merged_os2(
    parsed: &[Subset<'_>],
    mappings: &BTreeMap<char, GlyphId>,
) -> Result<Option<Vec<u8>>> {
    let Some(first) = parsed[0].os2 else {
        return Ok(None);
    };
    let mut os2 = first.data.to_vec();

    // ulUnicodeRange1..4
    if os2.len() >= 58 {
        for offset in [42, 46, 50, 54] {
            let mut bits = 0u32;
            for table in parsed.iter().filter_map(|s| s.os2).filter(|t| t.len() >= 58) {
                bits |= table.u32(offset)?;
            }
            put_u32(&mut os2, offset, bits);
        }
    }

    // usFirstCharIndex / usLastCharIndex
    if os2.len() >= 68 {
        let clamp = |c: &char| (*c as u32).min(0xFFFF) as u16;
        if let (Some(first_char), Some(last_char)) =
            (mappings.keys().next(), mappings.keys().next_back())
        {
            put_u16(&mut os2, 64, clamp(first_char));
            put_u16(&mut os2, 66, clamp(last_char));
        }
    }

    Ok(Some(os2))
}

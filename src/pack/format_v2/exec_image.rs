//! Native executable image utilities.
//!
//! Carrier templates are validated here before assembly, and the optional
//! section-table patching capability lives here. Patching is modeled as a
//! pure transform from (old image, appended length) to (new image, offset
//! translation table) - the header insertion shifts every later byte, so no
//! offset read before the insertion survives unchanged.

use anyhow::{Context, Result, bail};
use log::{debug, trace};

/// Size of one PE section header record
const SECTION_HEADER_SIZE: usize = 40;

/// Documented defaults used when the optional header declares zero
const DEFAULT_FILE_ALIGNMENT: u32 = 0x200;
const DEFAULT_SECTION_ALIGNMENT: u32 = 0x1000;

/// IMAGE_SCN_CNT_INITIALIZED_DATA | IMAGE_SCN_MEM_READ
const APPENDED_SECTION_CHARACTERISTICS: u32 = 0x4000_0040;

/// Check if data starts with a recognized native executable image.
///
/// Accepts PE ("MZ"), ELF, and Mach-O (both endiannesses, plus fat) magics.
/// Trailing bytes past the formal image end are inert to every one of
/// these loaders, which is what makes the appended container possible.
pub fn is_executable_image(data: &[u8]) -> bool {
    if data.len() < 4 {
        return false;
    }
    if data[0] == b'M' && data[1] == b'Z' {
        return true;
    }
    if &data[..4] == b"\x7fELF" {
        return true;
    }
    matches!(
        &data[..4],
        [0xFE, 0xED, 0xFA, 0xCE]
            | [0xFE, 0xED, 0xFA, 0xCF]
            | [0xCE, 0xFA, 0xED, 0xFE]
            | [0xCF, 0xFA, 0xED, 0xFE]
            | [0xCA, 0xFE, 0xBA, 0xBE]
    )
}

/// Check if data starts with a valid Windows PE executable header
pub fn is_pe_executable(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == b'M' && data[1] == b'Z'
}

/// Round `value` up to the next multiple of `alignment`
pub fn align_up(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}

/// One PE section header, as parsed from the section table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SectionHeader {
    pub name: [u8; 8],
    pub virtual_size: u32,
    pub virtual_address: u32,
    pub size_of_raw_data: u32,
    pub pointer_to_raw_data: u32,
    pub characteristics: u32,
}

impl SectionHeader {
    fn unpack(data: &[u8]) -> Result<Self> {
        if data.len() < SECTION_HEADER_SIZE {
            bail!("Section header truncated: {} bytes", data.len());
        }
        let mut name = [0u8; 8];
        name.copy_from_slice(&data[0..8]);
        Ok(SectionHeader {
            name,
            virtual_size: read_u32(data, 8)?,
            virtual_address: read_u32(data, 12)?,
            size_of_raw_data: read_u32(data, 16)?,
            pointer_to_raw_data: read_u32(data, 20)?,
            characteristics: read_u32(data, 36)?,
        })
    }

    fn pack(&self) -> [u8; SECTION_HEADER_SIZE] {
        let mut bytes = [0u8; SECTION_HEADER_SIZE];
        bytes[0..8].copy_from_slice(&self.name);
        bytes[8..12].copy_from_slice(&self.virtual_size.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.virtual_address.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.size_of_raw_data.to_le_bytes());
        bytes[20..24].copy_from_slice(&self.pointer_to_raw_data.to_le_bytes());
        // Relocation and line-number fields stay zero for an appended data section
        bytes[36..40].copy_from_slice(&self.characteristics.to_le_bytes());
        bytes
    }
}

/// Parsed PE layout - absolute offsets of the fields the transform rewrites
#[derive(Clone, Debug)]
pub struct PeLayout {
    pub pe_offset: usize,
    pub number_of_sections: u16,
    pub section_alignment: u32,
    pub file_alignment: u32,
    /// Absolute offset of the SizeOfImage field in the optional header
    pub size_of_image_offset: usize,
    /// Absolute offset of the first section header
    pub section_table_offset: usize,
    pub sections: Vec<SectionHeader>,
}

impl PeLayout {
    /// Parse the DOS/COFF/optional headers and the section table
    pub fn parse(data: &[u8]) -> Result<Self> {
        if !is_pe_executable(data) {
            bail!("Not a PE image: missing MZ signature");
        }
        if data.len() < 0x40 {
            bail!("Image too small for a DOS header");
        }

        // e_lfanew at 0x3C points at the PE signature
        let pe_offset = read_u32(data, 0x3C)? as usize;
        let sig = data
            .get(pe_offset..pe_offset + 4)
            .context("PE signature out of bounds")?;
        if sig != b"PE\x00\x00" {
            bail!("Invalid PE signature at offset {pe_offset:#x}");
        }

        let coff_offset = pe_offset + 4;
        let number_of_sections = read_u16(data, coff_offset + 2)?;
        let optional_header_size = read_u16(data, coff_offset + 16)? as usize;
        let optional_offset = coff_offset + 20;

        // SectionAlignment/FileAlignment/SizeOfImage sit at the same offsets
        // for PE32 and PE32+
        let magic = read_u16(data, optional_offset)?;
        if magic != 0x10B && magic != 0x20B {
            bail!("Unknown optional header magic {magic:#x}");
        }
        let section_alignment = read_u32(data, optional_offset + 32)?;
        let file_alignment = read_u32(data, optional_offset + 36)?;
        let size_of_image_offset = optional_offset + 56;

        let section_table_offset = optional_offset + optional_header_size;
        let mut sections = Vec::with_capacity(number_of_sections as usize);
        for i in 0..number_of_sections as usize {
            let start = section_table_offset + i * SECTION_HEADER_SIZE;
            let record = data
                .get(start..start + SECTION_HEADER_SIZE)
                .with_context(|| format!("Section header {i} out of bounds"))?;
            sections.push(SectionHeader::unpack(record)?);
        }

        trace!(
            "Parsed PE layout: {} sections, align file={:#x} section={:#x}",
            number_of_sections, file_alignment, section_alignment
        );

        Ok(PeLayout {
            pe_offset,
            number_of_sections,
            section_alignment,
            file_alignment,
            size_of_image_offset,
            section_table_offset,
            sections,
        })
    }
}

/// Maps pre-insertion file offsets to their post-insertion positions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OffsetTranslation {
    /// File offset where the new section header was inserted
    pub insertion_point: usize,
    /// Number of bytes every later offset moved by
    pub shift: usize,
}

impl OffsetTranslation {
    /// Translate an absolute offset valid in the old image to the new image
    pub fn translate(&self, old_offset: usize) -> usize {
        if old_offset >= self.insertion_point {
            old_offset + self.shift
        } else {
            old_offset
        }
    }
}

/// Result of the section-append transform
#[derive(Clone, Debug)]
pub struct PatchedImage {
    /// The rewritten image bytes; the input is never modified
    pub bytes: Vec<u8>,
    pub translation: OffsetTranslation,
    /// The section header record that was appended
    pub section: SectionHeader,
}

/// Append a section header describing `appended_len` trailing bytes.
///
/// Optional capability, unused by the default assembly path: the default
/// path appends raw bytes past the image end and relies on the loader
/// ignoring them. Callers that need the appended region addressable as a
/// real loaded section use this transform, then append their data at the
/// end of the returned image.
pub fn append_section(image: &[u8], appended_len: u32, name: &str) -> Result<PatchedImage> {
    let layout = PeLayout::parse(image)?;
    if layout.sections.is_empty() {
        bail!("Image has no sections to append after");
    }

    let file_alignment = if layout.file_alignment == 0 {
        DEFAULT_FILE_ALIGNMENT
    } else {
        layout.file_alignment
    };
    let section_alignment = if layout.section_alignment == 0 {
        DEFAULT_SECTION_ALIGNMENT
    } else {
        layout.section_alignment
    };

    let last = layout.sections[layout.sections.len() - 1];
    let new_virtual_address =
        last.virtual_address + align_up(last.virtual_size, section_alignment);

    let mut section_name = [0u8; 8];
    let name_len = name.len().min(8);
    section_name[..name_len].copy_from_slice(&name.as_bytes()[..name_len]);

    // Insertion goes immediately after the last existing header, shifting
    // everything behind it; all absolute offsets recorded before this point
    // must be re-derived through the translation table.
    let insertion_point =
        layout.section_table_offset + layout.number_of_sections as usize * SECTION_HEADER_SIZE;
    if insertion_point > image.len() {
        bail!("Section table extends past end of image");
    }
    let translation = OffsetTranslation {
        insertion_point,
        shift: SECTION_HEADER_SIZE,
    };

    let new_section = SectionHeader {
        name: section_name,
        virtual_size: appended_len,
        virtual_address: new_virtual_address,
        size_of_raw_data: align_up(appended_len, file_alignment),
        // The appended data lands at the old end of file, shifted by the insertion
        pointer_to_raw_data: translation.translate(image.len()) as u32,
        characteristics: APPENDED_SECTION_CHARACTERISTICS,
    };

    let mut bytes = Vec::with_capacity(image.len() + SECTION_HEADER_SIZE);
    bytes.extend_from_slice(&image[..insertion_point]);
    bytes.extend_from_slice(&new_section.pack());
    bytes.extend_from_slice(&image[insertion_point..]);

    // Re-derive every section's raw-data pointer in the shifted image
    for (i, section) in layout.sections.iter().enumerate() {
        if section.pointer_to_raw_data == 0 {
            continue;
        }
        let new_pointer = translation.translate(section.pointer_to_raw_data as usize) as u32;
        let field_offset = layout.section_table_offset + i * SECTION_HEADER_SIZE + 20;
        bytes[field_offset..field_offset + 4].copy_from_slice(&new_pointer.to_le_bytes());
    }

    // Section count and total image size live before the insertion point
    let coff_offset = layout.pe_offset + 4;
    let new_count = layout.number_of_sections + 1;
    bytes[coff_offset + 2..coff_offset + 4].copy_from_slice(&new_count.to_le_bytes());

    let new_size_of_image = new_virtual_address + align_up(appended_len, section_alignment);
    bytes[layout.size_of_image_offset..layout.size_of_image_offset + 4]
        .copy_from_slice(&new_size_of_image.to_le_bytes());

    debug!(
        "Appended section {:?}: va={:#x} raw={:#x} image_size={:#x}",
        String::from_utf8_lossy(&section_name),
        new_virtual_address,
        new_section.size_of_raw_data,
        new_size_of_image
    );

    Ok(PatchedImage {
        bytes,
        translation,
        section: new_section,
    })
}

fn read_u16(data: &[u8], offset: usize) -> Result<u16> {
    let bytes = data
        .get(offset..offset + 2)
        .with_context(|| format!("Read of u16 at {offset:#x} out of bounds"))?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    let bytes = data
        .get(offset..offset + 4)
        .with_context(|| format!("Read of u32 at {offset:#x} out of bounds"))?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

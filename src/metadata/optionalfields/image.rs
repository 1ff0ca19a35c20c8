//! In-memory output image holding the placed regions.
//!
//! [`ImageBuilder`] is the append-only writer the layout planner places its regions with: it pads
//! to explicit alignments, tracks where each [`Region`] starts and ends, and converts offsets into
//! addresses relative to a fixed base address. [`Image`] is the frozen result that run-time lookups
//! read from.
//!
//! Addresses are `base_address + offset`. The base address is aligned to the anchor alignment, so
//! masking an address inside the image gives the same result as masking its offset.

use crate::{
    file::io::read_le,
    metadata::optionalfields::{
        codec::OptionalFields,
        planner::FieldsHandle,
        region::{FileRegion, Region},
    },
    Error, Result,
};
use strum::EnumCount;

/// Append-only writer for image regions.
#[derive(Debug)]
pub struct ImageBuilder {
    base_address: u64,
    data: Vec<u8>,
    regions: [Option<FileRegion>; Region::COUNT],
    current: Option<Region>,
}

impl ImageBuilder {
    /// Creates an empty image that will be loaded at `base_address`.
    #[must_use]
    pub fn new(base_address: u64) -> Self {
        ImageBuilder {
            base_address,
            data: Vec::new(),
            regions: [None; Region::COUNT],
            current: None,
        }
    }

    /// Current end of the image as an offset.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.data.len() as u64
    }

    /// Address of the byte at `offset`.
    #[must_use]
    pub fn address_of(&self, offset: u64) -> u64 {
        self.base_address + offset
    }

    /// Closes the current region (if any) and starts `region` at the next `alignment` boundary.
    ///
    /// Returns the offset the region starts at.
    pub fn begin_region(&mut self, region: Region, alignment: u64) -> u64 {
        debug_assert!(
            self.regions[region.index()].is_none(),
            "region {} placed twice",
            region.as_ref()
        );

        self.end_region();
        self.align(alignment);

        let start = self.offset();
        self.regions[region.index()] = Some(FileRegion::new(start, 0));
        self.current = Some(region);
        start
    }

    fn end_region(&mut self) {
        let end = self.offset();
        if let Some(region) = self.current.take() {
            if let Some(placed) = self.regions[region.index()].as_mut() {
                placed.size = end - placed.offset;
            }
        }
    }

    /// Zero-pads the image up to the next multiple of `alignment`, returning the padding size.
    pub fn align(&mut self, alignment: u64) -> u64 {
        debug_assert!(alignment.is_power_of_two());

        let padding = self.offset().next_multiple_of(alignment) - self.offset();
        self.data
            .resize(self.data.len() + usize::try_from(padding).unwrap_or_default(), 0);
        padding
    }

    /// Appends `bytes`, returning the offset they were written at.
    pub fn append(&mut self, bytes: &[u8]) -> u64 {
        let offset = self.offset();
        self.data.extend_from_slice(bytes);
        offset
    }

    /// Closes the last region and freezes the image.
    ///
    /// # Arguments
    /// * `header_alignment` - Alignment of the anchors placed in [`Region::FieldStreams`]
    /// * `streams` - Offset of each field stream, indexed by [`FieldsHandle`]
    #[must_use]
    pub fn finish(mut self, header_alignment: u64, streams: Vec<u64>) -> Image {
        self.end_region();

        Image {
            base_address: self.base_address,
            header_alignment,
            data: self.data,
            regions: self.regions,
            streams,
        }
    }
}

/// A placed, immutable image.
///
/// Holds the out-of-line data and field stream regions and answers bounds-checked reads by
/// address. Field streams are located through the [`FieldsHandle`]s the planner handed out.
#[derive(Debug, Clone)]
pub struct Image {
    base_address: u64,
    header_alignment: u64,
    data: Vec<u8>,
    regions: [Option<FileRegion>; Region::COUNT],
    streams: Vec<u64>,
}

impl Image {
    /// Address the image is loaded at.
    #[must_use]
    pub fn base_address(&self) -> u64 {
        self.base_address
    }

    /// Alignment of the anchors in the field stream region.
    #[must_use]
    pub fn header_alignment(&self) -> u64 {
        self.header_alignment
    }

    /// The raw image bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Size of the image in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if nothing was placed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Where `region` was placed, `None` if it never was.
    #[must_use]
    pub fn region(&self, region: Region) -> Option<FileRegion> {
        self.regions[region.index()]
    }

    /// Address of the byte at `offset`.
    #[must_use]
    pub fn address_of(&self, offset: u64) -> u64 {
        self.base_address + offset
    }

    /// Converts an address back into an offset into the image.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidAddress`] if the address lies outside the image.
    pub fn offset_of(&self, address: u64) -> Result<usize> {
        address
            .checked_sub(self.base_address)
            .and_then(|offset| usize::try_from(offset).ok())
            .filter(|offset| *offset < self.data.len())
            .ok_or(Error::InvalidAddress(address))
    }

    /// All bytes from `address` to the end of the image.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidAddress`] if the address lies outside the image.
    pub fn slice_from(&self, address: u64) -> Result<&[u8]> {
        let offset = self.offset_of(address)?;
        Ok(&self.data[offset..])
    }

    /// `len` bytes starting at `address`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidAddress`] if the address lies outside the image or
    /// [`crate::Error::OutOfBounds`] if the range runs past its end.
    pub fn read(&self, address: u64, len: usize) -> Result<&[u8]> {
        let data = self.slice_from(address)?;
        data.get(..len).ok_or(out_of_bounds_error!())
    }

    /// Address of the anchor governing the field stream at `address`.
    #[must_use]
    pub fn anchor_address(&self, address: u64) -> u64 {
        address & !(self.header_alignment - 1)
    }

    /// Reads the full-width address stored in the anchor at `address`.
    ///
    /// # Errors
    /// Returns an error if the anchor lies outside the image.
    pub fn read_anchor(&self, address: u64) -> Result<u64> {
        read_le::<u64>(self.slice_from(address)?)
    }

    /// Number of field streams placed.
    #[must_use]
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Address of the field stream behind `handle`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the handle was issued by a different planner.
    pub fn stream_address(&self, handle: FieldsHandle) -> Result<u64> {
        self.streams
            .get(handle.index())
            .map(|offset| self.address_of(*offset))
            .ok_or_else(|| malformed_error!("Unknown field stream handle {}", handle.index()))
    }

    /// Resolves a descriptor's nullable field stream handle to the stream address.
    ///
    /// `None` stays `None`. Handles issued by a different planner also resolve to `None`.
    #[must_use]
    pub fn resolve(&self, handle: Option<FieldsHandle>) -> Option<u64> {
        handle.and_then(|handle| self.stream_address(handle).ok())
    }

    /// View of the optional fields of a descriptor whose field stream reference is `address`.
    #[must_use]
    pub fn optional_fields(&self, address: Option<u64>) -> OptionalFields<'_> {
        OptionalFields::new(self, address)
    }
}

//! Layout planning for field streams and their out-of-line data.
//!
//! The [`LayoutPlanner`] takes [`FieldSetBuilder`]s one at a time, encodes each into a field
//! stream and hands back a [`FieldsHandle`] that resolves to the stream address once the layout is
//! placed. Out-of-line blobs are copied into a dedicated region in encoding order, and streams that
//! reference them are grouped behind *anchors*: 8-byte slots at the anchor alignment holding the
//! full address of a location in the out-of-line region. A stream stores each out-of-line value as
//! a small delta from its anchor, so only anchors need relocations.
//!
//! # Layout
//!
//! ```text
//! +----------------------+  Region::OutOfLineData
//! | blob | pad | blob ...|
//! +----------------------+  Region::FieldStreams (anchor aligned)
//! | inline-only streams  |
//! | pad | anchor | s s s |  one anchor group, at most `alignment - 8` bytes of streams
//! | pad | anchor | s s   |
//! +----------------------+
//! ```
//!
//! Streams without out-of-line fields never need an anchor and are packed together ahead of the
//! first one. A stream never straddles an anchor boundary: when the next stream does not fit into
//! the current group, the rest of the group is left as padding and a new anchor is emitted.
//!
//! # Encoding Protocol
//!
//! Encoding a stream is a two-step affair. The size of a stream depends on its deltas, and its
//! deltas depend on which anchor governs it, which in turn depends on whether it still fits into
//! the current group. [`LayoutPlanner::encode_fields`] therefore computes an [`EncodingPlan`]
//! first, emits a new anchor if the plan does not fit, re-plans, and only then writes the stream.
//! A plan is tied to the planner state it was computed against; writing with a stale plan is a
//! programming error caught by a debug assertion.
//!
//! # Examples
//!
//! ```rust
//! use optfields::prelude::*;
//!
//! let mut planner = LayoutPlanner::new(LayoutConfig::default())?;
//!
//! let statics = OutlineBlob::new(vec![0xAB; 24], 16);
//! let mut builder = FieldSetBuilder::new();
//! builder
//!     .add_rare_flags(RareFlags::HAS_DYNAMIC_THREAD_STATICS)
//!     .add_thread_static_info(statics);
//!
//! let handle = planner.encode_fields(builder)?;
//! let image = planner.place()?;
//!
//! let fields = image.optional_fields(image.resolve(handle));
//! let address = fields.thread_static_info()?.unwrap();
//! assert_eq!(image.read(address, 24)?, &[0xAB; 24]);
//! # Ok::<(), optfields::Error>(())
//! ```

use crate::{
    file::io::write_le,
    metadata::optionalfields::{
        builder::{FieldSetBuilder, FieldValue, OptionalField, OutlineBlobRc},
        codec::{encode_field, field_size},
        config::{LayoutConfig, ANCHOR_SIZE},
        image::{Image, ImageBuilder},
        region::Region,
        stats::LayoutStats,
        tag::{OptionalFieldTag, MAX_OUTLINE_ALIGNMENT},
    },
    Error, Result,
};

/// Reference to an encoded field stream.
///
/// Descriptors store an `Option<FieldsHandle>`: `None` when they have no optional fields. The
/// handle resolves to an address through [`Image::resolve`] once the layout has been placed.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord)]
pub struct FieldsHandle(usize);

impl FieldsHandle {
    pub(crate) fn new(index: usize) -> Self {
        FieldsHandle(index)
    }

    /// Position of the stream in encoding order.
    #[must_use]
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Size of a stream under the planner state it was computed against.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EncodingPlan {
    size: usize,
    generation: u64,
}

impl EncodingPlan {
    /// Encoded size of the stream in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }
}

#[derive(Debug)]
struct OutOfLineRecord {
    blob: OutlineBlobRc,
    offset: u32,
}

#[derive(Debug)]
enum StreamEntry {
    Anchor { target: u32 },
    Stream(FieldsHandle),
}

/// Builds the optional field streams of an image.
///
/// All encoding happens on a single thread; the [`Image`] produced by [`LayoutPlanner::place`] is
/// immutable and may be read concurrently.
#[derive(Debug)]
pub struct LayoutPlanner {
    config: LayoutConfig,
    streams: Vec<Vec<u8>>,
    simple: Vec<FieldsHandle>,
    complex: Vec<StreamEntry>,
    records: Vec<OutOfLineRecord>,
    outline_data: Vec<u8>,
    anchor_target: u32,
    free_space: u64,
    header_emitted: bool,
    generation: u64,
    stats: LayoutStats,
}

impl LayoutPlanner {
    /// Creates an empty planner.
    ///
    /// # Errors
    /// Returns [`crate::Error::Configuration`] if `config` does not validate.
    pub fn new(config: LayoutConfig) -> Result<Self> {
        config.validate()?;

        Ok(LayoutPlanner {
            config,
            streams: Vec::new(),
            simple: Vec::new(),
            complex: Vec::new(),
            records: Vec::new(),
            outline_data: Vec::new(),
            anchor_target: 0,
            free_space: 0,
            header_emitted: false,
            generation: 0,
            stats: LayoutStats::default(),
        })
    }

    /// The configuration this planner lays out with.
    #[must_use]
    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Statistics over everything encoded so far.
    #[must_use]
    pub fn stats(&self) -> &LayoutStats {
        &self.stats
    }

    /// The encoded bytes behind `handle`, before placement.
    #[must_use]
    pub fn stream(&self, handle: FieldsHandle) -> Option<&[u8]> {
        self.streams.get(handle.index()).map(Vec::as_slice)
    }

    /// Number of streams encoded so far.
    #[must_use]
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Encodes the fields of one descriptor.
    ///
    /// Consumes the builder: its blobs are placed and its stream is final. Returns `None` if the
    /// builder holds no fields, in which case no stream is produced at all.
    ///
    /// # Errors
    /// Returns [`crate::Error::LayoutOverflow`] if the out-of-line data grows beyond 4 GiB.
    pub fn encode_fields(&mut self, mut builder: FieldSetBuilder) -> Result<Option<FieldsHandle>> {
        if builder.is_empty() {
            log::trace!("skipping descriptor without optional fields");
            return Ok(None);
        }

        let Some(first_record) = self.add_out_of_line_records(&mut builder)? else {
            let plan = self.plan_encoding(&builder);
            let handle = self.perform_encoding(&builder, plan);
            self.simple.push(handle);
            return Ok(Some(handle));
        };

        if !self.header_emitted {
            self.add_new_anchor(first_record);
        }

        let mut plan = self.plan_encoding(&builder);
        if plan.size as u64 > self.free_space {
            self.stats.padding_bytes += self.free_space;
            self.add_new_anchor(first_record);
            plan = self.plan_encoding(&builder);
        }
        debug_assert!(
            plan.size as u64 <= self.free_space,
            "stream of {} bytes does not fit an empty anchor group",
            plan.size
        );

        let handle = self.perform_encoding(&builder, plan);
        self.free_space -= plan.size as u64;
        self.complex.push(StreamEntry::Stream(handle));
        Ok(Some(handle))
    }

    /// Copies the out-of-line blobs of `builder` into the out-of-line region, in tag order.
    ///
    /// Returns the index of the first record appended, `None` if the builder has no out-of-line
    /// fields. On error nothing has been placed or appended.
    fn add_out_of_line_records(
        &mut self,
        builder: &mut FieldSetBuilder,
    ) -> Result<Option<usize>> {
        let offsets = outline_offsets(builder, self.outline_data.len() as u64)?;
        if offsets.is_empty() {
            return Ok(None);
        }

        let first = self.records.len();
        let blobs = builder
            .iter_mut()
            .filter(|(_, field)| matches!(field.value, FieldValue::OutOfLine(_)));

        for ((tag, field), offset) in blobs.zip(offsets) {
            let FieldValue::OutOfLine(blob) = &field.value else {
                continue;
            };

            let placed = blob.mark_placed(offset);
            debug_assert!(placed, "{} blob was placed twice", tag.as_ref());

            self.outline_data.resize(offset as usize, 0);
            self.outline_data.extend_from_slice(blob.data());
            self.records.push(OutOfLineRecord {
                blob: blob.clone(),
                offset,
            });
            field.offset = Some(offset);

            log::trace!(
                "placed {} blob ({} bytes) at out-of-line offset {:#x}",
                tag.as_ref(),
                blob.len(),
                offset
            );
        }

        self.generation += 1;
        self.stats.outline_bytes = self.outline_data.len() as u64;
        Ok(Some(first))
    }

    /// Starts a new anchor group pointing at (or just before) the blob of `record`.
    ///
    /// The anchor target is rounded down to the largest out-of-line alignment so that every blob
    /// placed after it is an exact multiple of its own alignment away.
    fn add_new_anchor(&mut self, record: usize) {
        let offset = self.records[record].offset;
        let target = offset & !(MAX_OUTLINE_ALIGNMENT - 1);

        self.complex.push(StreamEntry::Anchor { target });
        self.anchor_target = target;
        self.free_space = self.config.header_alignment_bytes() - ANCHOR_SIZE;
        self.header_emitted = true;
        self.generation += 1;
        self.stats.anchors += 1;

        log::debug!(
            "anchor #{} targets out-of-line offset {:#x} (first blob at {:#x})",
            self.stats.anchors,
            target,
            offset
        );
    }

    /// Raw value stored for `field`: inline values as is, out-of-line values as the delta from
    /// the current anchor scaled down by the tag alignment.
    fn field_value(&self, tag: OptionalFieldTag, field: &OptionalField) -> u32 {
        match &field.value {
            FieldValue::Inline(value) => *value,
            FieldValue::OutOfLine(_) => {
                let alignment = tag.outline_alignment().unwrap_or(1);
                let offset = field.offset.unwrap_or(self.anchor_target);
                debug_assert!(
                    field.offset.is_some() && offset >= self.anchor_target,
                    "{} blob at {:#x} precedes its anchor {:#x}",
                    tag.as_ref(),
                    offset,
                    self.anchor_target
                );
                debug_assert_eq!((offset - self.anchor_target) % alignment, 0);

                offset.saturating_sub(self.anchor_target) / alignment
            }
        }
    }

    /// Computes the encoded size of `builder` against the current anchor.
    #[must_use]
    pub fn plan_encoding(&self, builder: &FieldSetBuilder) -> EncodingPlan {
        let size = builder
            .iter()
            .map(|(tag, field)| field_size(self.field_value(tag, field)))
            .sum();

        EncodingPlan {
            size,
            generation: self.generation,
        }
    }

    /// Writes the stream of `builder` as sized by `plan`.
    fn perform_encoding(&mut self, builder: &FieldSetBuilder, plan: EncodingPlan) -> FieldsHandle {
        debug_assert_eq!(
            plan.generation, self.generation,
            "encoding plan is stale, the planner changed after it was computed"
        );

        let count = builder.len();
        let mut stream = Vec::with_capacity(plan.size);
        for (position, (tag, field)) in builder.iter().enumerate() {
            let value = self.field_value(tag, field);
            encode_field(&mut stream, tag, position + 1 == count, value);
        }
        debug_assert_eq!(stream.len(), plan.size);

        let handle = FieldsHandle::new(self.streams.len());
        self.stats.record_stream(builder, stream.len());
        log::trace!(
            "encoded field stream {} ({} fields, {} bytes)",
            handle.index(),
            count,
            stream.len()
        );

        self.streams.push(stream);
        handle
    }

    /// Places the out-of-line region and the field stream region into an [`Image`].
    ///
    /// Anchors are written with the final address of their target, which is where relocations
    /// would be applied in an image that is not loaded at a fixed base.
    ///
    /// # Errors
    /// Returns an error if an anchor cannot be written.
    pub fn place(self) -> Result<Image> {
        let alignment = self.config.header_alignment_bytes();
        let mut image = ImageBuilder::new(self.config.image_base);

        let outline_start =
            image.begin_region(Region::OutOfLineData, u64::from(MAX_OUTLINE_ALIGNMENT));
        image.append(&self.outline_data);

        let mut offsets = vec![0_u64; self.streams.len()];
        image.begin_region(Region::FieldStreams, alignment);
        for handle in &self.simple {
            offsets[handle.index()] = image.append(&self.streams[handle.index()]);
        }

        let mut padding = 0;
        for entry in &self.complex {
            match entry {
                StreamEntry::Anchor { target } => {
                    padding += image.align(alignment);

                    let mut anchor = [0_u8; ANCHOR_SIZE as usize];
                    write_le(&mut anchor, image.address_of(outline_start + u64::from(*target)))?;
                    image.append(&anchor);
                }
                StreamEntry::Stream(handle) => {
                    offsets[handle.index()] = image.append(&self.streams[handle.index()]);
                }
            }
        }

        debug_assert!(padding >= self.stats.padding_bytes);
        debug_assert!(self
            .records
            .iter()
            .all(|record| record.blob.placed_offset() == Some(record.offset)));

        log::debug!(
            "placed {} field streams ({} anchored) and {} out-of-line blobs: {} anchors, {} padding bytes, {} out-of-line bytes",
            self.streams.len(),
            self.streams.len() - self.simple.len(),
            self.records.len(),
            self.stats.anchors,
            padding,
            self.stats.outline_bytes
        );

        Ok(image.finish(alignment, offsets))
    }
}

/// Out-of-line offsets for the blobs of `builder`, in tag order, when appended after `start`
/// bytes of out-of-line data.
///
/// # Errors
/// Returns [`crate::Error::LayoutOverflow`] if any blob would end beyond `u32::MAX`.
fn outline_offsets(builder: &FieldSetBuilder, start: u64) -> Result<Vec<u32>> {
    let mut end = start;
    let mut offsets = Vec::new();

    for (tag, field) in builder.iter() {
        let FieldValue::OutOfLine(blob) = &field.value else {
            continue;
        };

        let alignment = tag.outline_alignment().unwrap_or(blob.alignment());
        let offset = end.next_multiple_of(u64::from(alignment));
        end = offset + blob.len() as u64;
        if end > u64::from(u32::MAX) {
            return Err(Error::LayoutOverflow(u64::from(u32::MAX)));
        }

        offsets.push(offset as u32);
    }

    Ok(offsets)
}

//! Integration tests for the optional field layout.
//!
//! These tests build realistic descriptor populations, place them, and read every field back
//! through the public API, including concurrent readers over a shared image.

use optfields::{metadata::optionalfields::MAX_STREAM_SIZE, prelude::*};
use rayon::prelude::*;

const BASE: u64 = 0x4000_0000;

struct Descriptor {
    flags: RareFlags,
    dispatch_map: Option<u32>,
    nullable_offset: Option<u8>,
    slots: Option<Vec<u8>>,
    composition: Option<Vec<u8>>,
    statics: Option<Vec<u8>>,
}

impl Descriptor {
    fn generate(index: u32) -> Self {
        let byte = index as u8;
        Descriptor {
            flags: RareFlags::from_bits_truncate(index % 0x100),
            dispatch_map: (index % 3 == 0).then_some(index * 7919),
            nullable_offset: (index % 11 == 5).then_some(byte % 16),
            slots: (index % 5 == 0).then(|| vec![byte; (index % 4 + 1) as usize * 4]),
            composition: (index % 6 == 1).then(|| vec![byte ^ 0xFF; 24]),
            statics: (index % 13 == 0).then(|| vec![byte.wrapping_add(1); 48]),
        }
    }

    fn builder(&self) -> FieldSetBuilder {
        let mut builder = FieldSetBuilder::new();
        if !self.flags.is_empty() {
            builder.add_rare_flags(self.flags);
        }
        if let Some(value) = self.dispatch_map {
            builder.add_dispatch_map(value);
        }
        if let Some(value) = self.nullable_offset {
            builder.add_nullable_value_offset(value);
        }
        if let Some(data) = &self.slots {
            builder.add_sealed_virtual_slots(OutlineBlob::new(data.clone(), 4));
        }
        if let Some(data) = &self.composition {
            builder.add_generic_composition(OutlineBlob::new(data.clone(), 8));
        }
        if let Some(data) = &self.statics {
            builder.add_thread_static_info(OutlineBlob::new(data.clone(), 16));
        }
        builder
    }

    fn verify(&self, image: &Image, fields: OptionalFields<'_>) -> Result<()> {
        assert_eq!(fields.rare_flags(RareFlags::empty())?, self.flags);
        assert_eq!(fields.dispatch_map(u32::MAX)?, self.dispatch_map.unwrap_or(u32::MAX));
        assert_eq!(
            fields.nullable_value_offset(0xEE)?,
            self.nullable_offset.unwrap_or(0xEE)
        );
        assert_eq!(fields.icastable_get_impl_type_slot(9)?, 9);

        let blobs = [
            (fields.sealed_virtual_slots()?, &self.slots),
            (fields.generic_composition()?, &self.composition),
            (fields.thread_static_info()?, &self.statics),
        ];
        for (address, expected) in blobs {
            match (address, expected) {
                (Some(address), Some(data)) => assert_eq!(image.read(address, data.len())?, data),
                (None, None) => {}
                (address, expected) => panic!("mismatch: {address:?} vs {expected:?}"),
            }
        }
        Ok(())
    }
}

fn build(
    count: u32,
    config: LayoutConfig,
) -> Result<(Image, LayoutStats, Vec<(Descriptor, Option<FieldsHandle>)>)> {
    let mut planner = LayoutPlanner::new(config)?;
    let mut descriptors = Vec::new();

    for index in 0..count {
        let descriptor = Descriptor::generate(index);
        let handle = planner.encode_fields(descriptor.builder())?;
        descriptors.push((descriptor, handle));
    }

    let stats = planner.stats().clone();
    Ok((planner.place()?, stats, descriptors))
}

#[test]
fn test_every_descriptor_reads_back() -> Result<()> {
    let (image, stats, descriptors) = build(2000, LayoutConfig::default().with_image_base(BASE))?;

    let with_fields = descriptors.iter().filter(|(_, handle)| handle.is_some()).count();
    assert_eq!(stats.streams as usize, with_fields);
    assert_eq!(image.stream_count(), with_fields);
    assert!(stats.anchors > 0);

    for (descriptor, handle) in &descriptors {
        let fields = image.optional_fields(image.resolve(*handle));
        assert_eq!(fields.is_null(), handle.is_none());
        descriptor.verify(&image, fields)?;
    }
    Ok(())
}

#[test]
fn test_small_anchor_groups() -> Result<()> {
    // 64-byte groups leave just enough room for the largest possible stream
    let config = LayoutConfig::default()
        .with_header_alignment_shift(6)
        .with_image_base(BASE);
    let (image, stats, descriptors) = build(1000, config)?;
    assert!(MAX_STREAM_SIZE as u64 <= 64 - 8);
    assert!(stats.anchors > 10);

    for (descriptor, handle) in &descriptors {
        descriptor.verify(&image, image.optional_fields(image.resolve(*handle)))?;
    }
    Ok(())
}

#[test]
fn test_large_anchor_groups() -> Result<()> {
    let config = LayoutConfig::default()
        .with_header_alignment_shift(12)
        .with_image_base(BASE);
    let (image, _, descriptors) = build(1000, config)?;

    for (descriptor, handle) in &descriptors {
        descriptor.verify(&image, image.optional_fields(image.resolve(*handle)))?;
    }
    Ok(())
}

#[test]
fn test_concurrent_readers() -> Result<()> {
    let (image, _, descriptors) = build(5000, LayoutConfig::default().with_image_base(BASE))?;

    descriptors
        .par_iter()
        .try_for_each(|(descriptor, handle)| {
            descriptor.verify(&image, image.optional_fields(image.resolve(*handle)))
        })
}

#[test]
fn test_statistics() -> Result<()> {
    let (image, stats, descriptors) = build(600, LayoutConfig::default().with_image_base(BASE))?;

    let slots = descriptors.iter().filter(|(d, _)| d.slots.is_some()).count();
    assert_eq!(
        stats.field_count(OptionalFieldTag::SealedVirtualSlots) as usize,
        slots
    );
    assert_eq!(stats.size_distribution.iter().sum::<u32>(), stats.streams);

    let outline = image.region(Region::OutOfLineData).unwrap();
    assert_eq!(outline.size, stats.outline_bytes);
    assert!(!stats.to_string().is_empty());
    Ok(())
}

#[test]
fn test_runtime_streams_alongside_placed_ones() -> Result<()> {
    let (image, _, descriptors) = build(10, LayoutConfig::default().with_image_base(BASE))?;
    let (descriptor, handle) = descriptors
        .iter()
        .find(|(d, handle)| handle.is_some() && d.composition.is_some())
        .unwrap();

    // rebuild the descriptor at run time with raw pointers to the placed blobs
    let fields = image.optional_fields(image.resolve(*handle));
    let mut runtime = RuntimeFieldBuilder::new();
    for (tag, value) in fields.raw_fields()? {
        let value = match tag.kind() {
            FieldKind::Inline => RuntimeValue::Inline(value),
            FieldKind::OutOfLine { .. } => RuntimeValue::Pointer(match tag {
                OptionalFieldTag::SealedVirtualSlots => fields.sealed_virtual_slots()?,
                OptionalFieldTag::GenericComposition => fields.generic_composition()?,
                _ => fields.thread_static_info()?,
            }
            .unwrap()),
        };
        runtime.set(tag, value);
    }
    runtime.set(
        OptionalFieldTag::ICastableIsInstSlot,
        RuntimeValue::Inline(12),
    );

    let stream = runtime.to_stream().unwrap();
    let decoded = RuntimeFieldBuilder::from_stream(Some(&stream))?;
    assert_eq!(decoded, runtime);
    assert_eq!(
        decoded.inline(OptionalFieldTag::RareFlags, 0),
        descriptor.flags.bits()
    );

    let composition = decoded
        .pointer(OptionalFieldTag::GenericComposition)
        .unwrap();
    assert_eq!(
        image.read(composition, 24)?,
        descriptor.composition.as_deref().unwrap()
    );
    Ok(())
}

#[test]
fn test_invalid_configurations() {
    for config in [
        LayoutConfig::default().with_header_alignment_shift(3),
        LayoutConfig::default().with_header_alignment_shift(5),
        LayoutConfig::default().with_image_base(BASE + 0x40),
    ] {
        assert!(matches!(
            LayoutPlanner::new(config),
            Err(Error::Configuration(_))
        ));
    }
}

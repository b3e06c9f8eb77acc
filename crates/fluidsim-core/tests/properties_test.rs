//! Property tests for dispatch sizing and atlas packing.

use fluidsim_core::*;
use proptest::prelude::*;

proptest! {
    #[test]
    fn group_count_is_ceiling_division(dimension in 1u32..100_000, tile in 1u32..64) {
        let groups = group_count(dimension, tile);
        prop_assert_eq!(groups, (dimension + tile - 1) / tile);
        prop_assert!(groups * tile >= dimension);
        prop_assert!((groups - 1) * tile < dimension);
    }

    #[test]
    fn dispatch_covers_extent_with_default_tile(
        w in 1u32..1024,
        h in 1u32..1024,
        d in 1u32..1024,
    ) {
        let extent = VolumeExtent::new(w, h, d).unwrap();
        let size = DispatchSize::for_extent(extent, TILE_SIZE);
        prop_assert_eq!(size.x, w.div_ceil(4));
        prop_assert_eq!(size.y, h.div_ceil(4));
        prop_assert_eq!(size.z, d.div_ceil(4));
    }

    #[test]
    fn atlas_regions_never_overlap(
        sizes in prop::collection::vec((1u32..48, 1u32..48, 1u32..48), 1..40),
    ) {
        let bounds = UVec3::splat(128);
        let mut layout = AtlasLayout::new(bounds);
        let mut regions: Vec<AtlasRegion> = Vec::new();

        for (w, h, d) in sizes {
            let extent = VolumeExtent::new(w, h, d).unwrap();
            match layout.allocate(extent) {
                Ok(region) => {
                    prop_assert!(region.fits_within(bounds));
                    prop_assert!(region.matches(extent));
                    for other in &regions {
                        prop_assert!(!region.overlaps(other), "{:?} overlaps {:?}", region, other);
                    }
                    regions.push(region);
                }
                Err(FluidSimError::AtlasFull { .. }) => {}
                Err(err) => prop_assert!(false, "unexpected error: {}", err),
            }
        }
        prop_assert_eq!(layout.allocations(), regions.len());
    }
}

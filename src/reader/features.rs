//! Feature bit sets synthesized by the reader.
//!
//! Derived purely by inspection of box contents: brand lists, iref
//! edges, infe flags, sample table boxes, and so on.

// Define a feature bit set: a newtype over u32 with named bits.
macro_rules! def_features {
    ($(#[$outer:meta])* $name:ident { $( $feature:ident = $bit:expr, )* }) => {
        $(#[$outer])*
        #[derive(Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name(pub u32);

        impl $name {
            $(
                pub const $feature: u32 = 1 << $bit;
            )*

            pub fn has(&self, feature: u32) -> bool {
                self.0 & feature != 0
            }

            pub fn set(&mut self, feature: u32) {
                self.0 |= feature;
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                let mut v: Vec<&str> = Vec::new();
                $(
                    if self.has($name::$feature) {
                        v.push(stringify!($feature));
                    }
                )*
                write!(f, "{}[{}]", stringify!($name), v.join(" "))
            }
        }
    };
}

def_features!(
    /// Per-file features.
    FileFeature {
        HAS_SINGLE_IMAGE = 0,
        HAS_IMAGE_COLLECTION = 1,
        HAS_IMAGE_SEQUENCE = 2,
        HAS_ROOT_LEVEL_META_BOX = 3,
        HAS_ALTERNATE_TRACKS = 4,
        HAS_COVER_IMAGE = 5,
    }
);

def_features!(
    /// Per-MetaBox features.
    MetaBoxFeature {
        IS_SINGLE_IMAGE = 0,
        IS_IMAGE_COLLECTION = 1,
        HAS_MASTER_IMAGES = 2,
        HAS_THUMBNAILS = 3,
        HAS_AUXILIARY_IMAGES = 4,
        HAS_DERIVED_IMAGES = 5,
        HAS_PRE_COMPUTED_DERIVED_IMAGES = 6,
        HAS_HIDDEN_IMAGES = 7,
        HAS_COVER_IMAGE = 8,
        HAS_GROUP_LISTS = 9,
    }
);

def_features!(
    /// Per-image-item features.
    ImageFeature {
        IS_MASTER_IMAGE = 0,
        IS_THUMBNAIL_IMAGE = 1,
        IS_AUXILIARY_IMAGE = 2,
        IS_PRIMARY_IMAGE = 3,
        IS_DERIVED_IMAGE = 4,
        IS_PRE_COMPUTED_DERIVED_IMAGE = 5,
        IS_HIDDEN_IMAGE = 6,
        IS_COVER_IMAGE = 7,
        IS_PROTECTED = 8,
        HAS_LINKED_THUMBNAILS = 9,
        HAS_LINKED_AUXILIARY_IMAGE = 10,
        HAS_LINKED_DERIVED_IMAGE = 11,
        HAS_LINKED_PRE_COMPUTED_DERIVED_IMAGE = 12,
        HAS_LINKED_TILES = 13,
        HAS_LINKED_METADATA = 14,
    }
);

def_features!(
    /// Per-item (non-image) features.
    ItemFeature {
        IS_METADATA_ITEM = 0,
        IS_EXIF_ITEM = 1,
        IS_MIME_ITEM = 2,
        IS_TILE_IMAGE_ITEM = 3,
        IS_PROTECTED = 4,
    }
);

def_features!(
    /// Per-track features.
    TrackFeature {
        IS_ENABLED = 0,
        IS_IN_MOVIE = 1,
        IS_IN_PREVIEW = 2,
        IS_MASTER_IMAGE_SEQUENCE = 3,
        IS_THUMBNAIL_IMAGE_SEQUENCE = 4,
        IS_AUXILIARY_IMAGE_SEQUENCE = 5,
        HAS_ALTERNATIVES = 6,
        HAS_CODING_CONSTRAINTS = 7,
        HAS_SAMPLE_GROUPS = 8,
        HAS_LINKED_THUMBNAIL_IMAGE_SEQUENCE = 9,
        HAS_LINKED_AUXILIARY_IMAGE_SEQUENCE = 10,
        HAS_EDIT_LIST = 11,
        HAS_INFINITE_LOOP_PLAYBACK = 12,
        HAS_SYNC_SAMPLES = 13,
    }
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_query() {
        let mut f = MetaBoxFeature::default();
        assert!(!f.has(MetaBoxFeature::HAS_THUMBNAILS));
        f.set(MetaBoxFeature::HAS_THUMBNAILS);
        f.set(MetaBoxFeature::IS_IMAGE_COLLECTION);
        assert!(f.has(MetaBoxFeature::HAS_THUMBNAILS));
        assert!(f.has(MetaBoxFeature::IS_IMAGE_COLLECTION));
        assert!(!f.has(MetaBoxFeature::IS_SINGLE_IMAGE));
    }
}

//! All the boxes we know.
//!
//! This module does not only contain boxes, but also the types
//! that are used in the boxes, and helper types like iterators.
//!
use std::fmt::Debug;
use std::io;

pub(crate) mod misc;
pub(crate) mod prelude;

pub use self::misc::*;
use self::prelude::*;

use crate::mp4box::{BoxHeader, GenericBox};

def_boxes! {
    // Boxes defined in misc.rs.
    FileTypeBox, b"ftyp";
    HandlerBox, b"hdlr";
    MovieHeaderBox, b"mvhd";
    MediaHeaderBox, b"mdhd";
    VideoMediaHeaderBox, b"vmhd";
    NullMediaHeaderBox, b"nmhd";

    Free, b"free" => free;
    Skip, b"skip";

    // The MetaBox graph.
    MetaBox, b"meta" => meta;
    PrimaryItemBox, b"pitm" => pitm;
    ItemLocationBox, b"iloc" => iloc;
    ItemProtectionBox, b"ipro" => ipro;
    ProtectionSchemeInfoBox, b"sinf";
    ItemInfoBox, b"iinf" => iinf;
    ItemInfoEntry, b"infe";
    ItemReferenceBox, b"iref" => iref;
    ItemDataBox, b"idat" => idat;
    ItemPropertiesBox, b"iprp" => iprp;
    ItemPropertyContainer, b"ipco";
    ItemPropertyAssociation, b"ipma";
    GroupsListBox, b"grpl" => grpl;
    EntityToGroupBox, b"altr";

    // Item properties.
    ImageSpatialExtentsProperty, b"ispe" => props;
    ImageRotation, b"irot";
    ImageMirror, b"imir";
    CleanApertureBox, b"clap";
    ImageRelativeLocationProperty, b"rloc";
    AuxiliaryTypeProperty, b"auxC";
    LayerSelectorProperty, b"lsel";
    TargetOlsProperty, b"tols";
    OperatingPointsInformation, b"oinf" => oinf;

    // Decoder configurations and sample entries.
    AvcConfigurationBox, b"avcC" => avcc;
    HevcConfigurationBox, b"hvcC" => hvcc;
    LHevcConfigurationBox, b"lhvC";
    HevcSampleEntry, b"hvc1" => visual;
    AvcSampleEntry, b"avc1";
    CodingConstraintsBox, b"ccst";

    // The TrackBox graph.
    MovieBox, b"moov" => moov;
    TrackBox, b"trak" => trak;
    TrackHeaderBox, b"tkhd";
    TrackReferenceBox, b"tref" => tref;
    EditBox, b"edts" => edts;
    EditListBox, b"elst";
    MediaBox, b"mdia" => mdia;
    MediaInformationBox, b"minf";
    DataInformationBox, b"dinf" => dinf;
    DataReferenceBox, b"dref";
    DataEntryUrlBox, b"url ";
    DataEntryUrnBox, b"urn ";
    SampleTableBox, b"stbl" => stbl;
    SampleDescriptionBox, b"stsd" => stsd;
    TimeToSampleBox, b"stts" => stts;
    CompositionOffsetBox, b"ctts" => ctts;
    CompositionToDecodeBox, b"cslg";
    SampleToChunkBox, b"stsc" => stsc;
    SampleSizeBox, b"stsz" => stsz;
    ChunkOffsetBox, b"stco" => stco;
    ChunkLargeOffsetBox, b"co64";
    SyncSampleBox, b"stss" => stss;
    SampleToGroupBox, b"sbgp" => sbgp;
    SampleGroupDescriptionBox, b"sgpd" => sgpd;

    MediaDataBox, b"mdat" => mdat;
}

//! Writer to reader round trips over in-memory files.

mod common;

use heif::reader::features::*;
use heif::reader::HeifReader;
use heif::writer::config::*;
use heif::HeifWriter;

use common::hevc_test_bitstream;

fn master_config(uniq_bsid: u32, stream: Vec<u8>) -> MasterConfig {
    let json = format!(
        r#"{{ "uniq_bsid": {}, "file_path": "unused", "code_type": "hvc1" }}"#,
        uniq_bsid
    );
    let mut master: MasterConfig = serde_json::from_str(&json).unwrap();
    master.input = Input::from_bytes(stream);
    master
}

fn content(master: MasterConfig) -> ContentConfig {
    ContentConfig {
        master,
        thumbs: Vec::new(),
        auxiliary: Vec::new(),
        metadata: Vec::new(),
        derived: DerivedConfig::default(),
    }
}

fn write_and_read(config: WriterConfig) -> (Vec<u8>, HeifReader) {
    let file = HeifWriter::new(config).write_to_vec().expect("write");
    let mut reader = HeifReader::new();
    let mut stream = heif::io::MemReader::from_slice(&file[..]);
    reader.initialize(&mut stream).expect("initialize");
    (file, reader)
}

fn basic_config(contents: Vec<ContentConfig>) -> WriterConfig {
    WriterConfig {
        general: GeneralConfig::default(),
        content: contents,
        egroups: Vec::new(),
    }
}

#[test]
fn single_still_image() {
    let stream = hevc_test_bitstream(1024, 768, 1);
    let config = basic_config(vec![content(master_config(1, stream))]);
    let (file, reader) = write_and_read(config);

    // ftyp: major heic, compatible contains mif1 + heic.
    assert_eq!(&file[4..8], b"ftyp");
    assert_eq!(&file[8..12], b"heic");

    let ctx = reader.root_meta_context_id().unwrap();
    let masters = reader.get_item_list_by_type(ctx, "master").unwrap();
    assert_eq!(masters, vec![1]);

    // The primary item is the first master.
    assert_eq!(reader.get_cover_image_item_id(ctx).unwrap(), 1);

    assert_eq!(reader.get_width(ctx, 1).unwrap(), 1024);
    assert_eq!(reader.get_height(ctx, 1).unwrap(), 768);

    // Properties: ispe and hvcC, both essential.
    let props = reader.get_item_properties(ctx, 1).unwrap();
    let fourccs: Vec<String> = props.iter().map(|(f, _, _)| f.to_string()).collect();
    assert!(fourccs.contains(&"ispe".to_string()));
    assert!(fourccs.contains(&"hvcC".to_string()));
    assert!(props.iter().all(|&(_, _, essential)| essential));

    // File features.
    let feature = reader.file_feature().unwrap();
    assert!(feature.has(FileFeature::HAS_ROOT_LEVEL_META_BOX));
    assert!(feature.has(FileFeature::HAS_SINGLE_IMAGE));
    assert!(feature.has(FileFeature::HAS_COVER_IMAGE));
}

#[test]
fn item_data_is_returned_in_start_code_form() {
    let stream = hevc_test_bitstream(640, 480, 1);
    let config = basic_config(vec![content(master_config(1, stream))]);
    let (_, reader) = write_and_read(config);

    let ctx = reader.root_meta_context_id().unwrap();
    let data = reader.get_item_data(ctx, 1).unwrap();
    // The image slice comes back with a 4-byte start code in front.
    assert_eq!(&data[0..4], &[0, 0, 0, 1]);
    assert_eq!(data[4], 0x26);

    // With decoder parameters: VPS/SPS/PPS precede the slice.
    let with_params = reader.get_item_data_with_decoder_parameters(ctx, 1).unwrap();
    assert!(with_params.len() > data.len());
    assert_eq!(&with_params[0..4], &[0, 0, 0, 1]);
    assert_eq!(with_params[4], 0x40); // VPS first

    let sets = reader.get_decoder_parameter_sets(ctx, 1).unwrap();
    assert!(!sets.vps.is_empty());
    assert!(!sets.sps.is_empty());
    assert!(!sets.pps.is_empty());
}

#[test]
fn thumbnails_with_sync_rate_1() {
    let masters = hevc_test_bitstream(1024, 768, 5);
    let thumbs = hevc_test_bitstream(256, 192, 5);

    let mut content = content(master_config(1, masters));
    content.thumbs.push(ThumbsConfig {
        uniq_bsid: 2,
        input: Input::from_bytes(thumbs),
        code_type: "hvc1".to_string(),
        sync_rate: Some(1),
        sync_idxs: Vec::new(),
    });
    let (_, reader) = write_and_read(basic_config(vec![content]));

    let ctx = reader.root_meta_context_id().unwrap();
    let masters = reader.get_item_list_by_type(ctx, "master").unwrap();
    let thumbs = reader.get_item_list_by_type(ctx, "thmb").unwrap();
    assert_eq!(masters.len(), 5);
    assert_eq!(thumbs.len(), 5);

    // 10 items in total, thumbs reference masters 1:1 in order.
    for (i, &thumb_id) in thumbs.iter().enumerate() {
        let targets = reader
            .get_referenced_from_item_list_by_type(ctx, thumb_id, "thmb")
            .unwrap();
        assert_eq!(targets, vec![masters[i]]);
    }

    // Thumbnail dimensions come from the thumb bitstream.
    assert_eq!(reader.get_width(ctx, thumbs[0]).unwrap(), 256);
    assert_eq!(reader.get_height(ctx, thumbs[0]).unwrap(), 192);

    let feature = reader.meta_box_feature(ctx).unwrap();
    assert!(feature.has(MetaBoxFeature::HAS_THUMBNAILS));
    assert!(feature.has(MetaBoxFeature::IS_IMAGE_COLLECTION));
}

#[test]
fn grid_derived_image() {
    let tiles = hevc_test_bitstream(512, 512, 4);
    let mut content = content(master_config(1, tiles));
    content.derived.grids.push(GridConfig {
        uniq_bsid: 10,
        rows: 2,
        columns: 2,
        output_width: 1024,
        output_height: 1024,
        refs: vec![RefsList {
            uniq_bsid: 1,
            idxs: Vec::new(),
        }],
    });
    let (_, reader) = write_and_read(basic_config(vec![content]));

    let ctx = reader.root_meta_context_id().unwrap();
    let grids = reader.get_item_list_by_type(ctx, "grid").unwrap();
    assert_eq!(grids.len(), 1);

    let grid = reader.get_item_grid(ctx, grids[0]).unwrap();
    assert_eq!(grid.grid.rows_minus_one, 1);
    assert_eq!(grid.grid.columns_minus_one, 1);
    assert_eq!(grid.grid.output_width, 1024);
    assert_eq!(grid.grid.output_height, 1024);
    assert_eq!(grid.item_ids.len(), 4);

    // The dimg edges point at the four tiles, in order.
    let masters = reader.get_item_list_by_type(ctx, "master").unwrap();
    assert_eq!(grid.item_ids, masters);

    // The grid descriptor itself: 8 bytes with 16-bit fields.
    let payload = reader.get_item_data(ctx, grids[0]).unwrap();
    assert_eq!(payload.len(), 8);
    assert_eq!(payload[0], 0); // version
    assert_eq!(payload[1], 0); // flags: 16-bit fields

    let feature = reader.meta_box_feature(ctx).unwrap();
    assert!(feature.has(MetaBoxFeature::HAS_DERIVED_IMAGES));
}

#[test]
fn auxiliary_alpha_image() {
    let master_stream = hevc_test_bitstream(1024, 768, 1);
    let alpha = hevc_test_bitstream(1024, 768, 1);

    let mut content = content(master_config(1, master_stream));
    content.auxiliary.push(AuxConfig {
        uniq_bsid: 3,
        input: Input::from_bytes(alpha),
        code_type: "hvc1".to_string(),
        urn: "urn:mpeg:mpegB:cicp:systems:auxiliary:alpha".to_string(),
        idxs_list: Vec::new(),
        hidden: false,
    });
    let (_, reader) = write_and_read(basic_config(vec![content]));

    let ctx = reader.root_meta_context_id().unwrap();
    let auxes = reader.get_item_list_by_type(ctx, "auxl").unwrap();
    assert_eq!(auxes.len(), 1);
    let aux_id = auxes[0];

    // auxl edge from the aux item to the master item.
    let masters = reader.get_item_list_by_type(ctx, "master").unwrap();
    let targets = reader
        .get_referenced_from_item_list_by_type(ctx, aux_id, "auxl")
        .unwrap();
    assert_eq!(targets, masters);

    // The auxC property is associated and essential.
    let props = reader.get_item_properties(ctx, aux_id).unwrap();
    let auxc = props
        .iter()
        .find(|(f, _, _)| f.to_string() == "auxC")
        .expect("auxC property");
    assert!(auxc.2);
    let urn = reader.get_property_auxc(ctx, auxc.1).unwrap();
    assert_eq!(urn.aux_type.as_str(), "urn:mpeg:mpegB:cicp:systems:auxiliary:alpha");

    let feature = reader.meta_box_feature(ctx).unwrap();
    assert!(feature.has(MetaBoxFeature::HAS_AUXILIARY_IMAGES));
}

#[test]
fn identity_derivation_rotation() {
    let master_stream = hevc_test_bitstream(640, 480, 1);
    let mut content = content(master_config(1, master_stream));
    content.derived.iden.push(IdenConfig {
        transform: IdenTransform::Irot { angle: 90 },
        refs: vec![RefsList {
            uniq_bsid: 1,
            idxs: vec![1],
        }],
    });
    let (_, reader) = write_and_read(basic_config(vec![content]));

    let ctx = reader.root_meta_context_id().unwrap();
    let idens = reader.get_item_list_by_type(ctx, "iden").unwrap();
    assert_eq!(idens.len(), 1);

    let props = reader.get_item_properties(ctx, idens[0]).unwrap();
    let irot = props
        .iter()
        .find(|(f, _, _)| f.to_string() == "irot")
        .expect("irot property");
    assert!(irot.2);
    assert_eq!(reader.get_property_irot(ctx, irot.1).unwrap().angle, 90);

    // The iden item inherits its master's spatial extents.
    assert!(props.iter().any(|(f, _, _)| f.to_string() == "ispe"));

    // dimg edge to the master.
    let targets = reader
        .get_referenced_from_item_list_by_type(ctx, idens[0], "dimg")
        .unwrap();
    assert_eq!(targets, vec![1]);
    assert_eq!(
        reader.get_item_decode_dependencies(ctx, idens[0]).unwrap(),
        vec![1]
    );
}

#[test]
fn exif_metadata_item() {
    let master_stream = hevc_test_bitstream(640, 480, 1);
    let mut content = content(master_config(1, master_stream));
    content.metadata.push(MetadataConfig {
        input: Input::from_bytes(b"Exif\0\0II*\0test-payload".to_vec()),
        item_type: "Exif".to_string(),
        content_type: None,
    });
    let (_, reader) = write_and_read(basic_config(vec![content]));

    let ctx = reader.root_meta_context_id().unwrap();
    let exifs = reader.get_item_list_by_type(ctx, "Exif").unwrap();
    assert_eq!(exifs.len(), 1);

    // cdsc edge to the master, payload comes back verbatim.
    let targets = reader
        .get_referenced_from_item_list_by_type(ctx, exifs[0], "cdsc")
        .unwrap();
    assert_eq!(targets, vec![1]);
    let payload = reader.get_item_data(ctx, exifs[0]).unwrap();
    assert_eq!(payload, b"Exif\0\0II*\0test-payload".to_vec());

    let features = reader.item_features(ctx, exifs[0]).unwrap();
    assert!(features.has(ItemFeature::IS_EXIF_ITEM));
    assert!(features.has(ItemFeature::IS_METADATA_ITEM));
}

#[test]
fn image_sequence_track() {
    let stream = hevc_test_bitstream(320, 240, 4);
    let mut master = master_config(1, stream);
    master.encapsulation = "trak".to_string();
    master.fps = 25.0;
    master.timescale = 1000;
    let (file, reader) = write_and_read(basic_config(vec![content(master)]));

    // msf1 + hevc brands are ensured for track files.
    let ftyp_str = String::from_utf8_lossy(&file[..64]).to_string();
    assert!(ftyp_str.contains("msf1"));
    assert!(ftyp_str.contains("hevc"));

    let feature = reader.file_feature().unwrap();
    assert!(feature.has(FileFeature::HAS_IMAGE_SEQUENCE));

    let contexts = reader.context_ids().unwrap();
    assert_eq!(contexts.len(), 1);
    let ctx = contexts[0];

    let track_feature = reader.track_feature(ctx).unwrap();
    assert!(track_feature.has(TrackFeature::IS_MASTER_IMAGE_SEQUENCE));
    assert!(track_feature.has(TrackFeature::HAS_CODING_CONSTRAINTS));

    let samples = reader.get_item_list_by_type(ctx, "samples").unwrap();
    assert_eq!(samples.len(), 4);

    // 25 fps at timescale 1000: 40 ms per sample.
    let timestamps = reader.get_item_timestamps(ctx).unwrap();
    assert_eq!(timestamps.len(), 4);
    assert_eq!(timestamps[0], (0, 0));
    assert_eq!(timestamps[1], (40, 1));
    assert_eq!(timestamps[3], (120, 3));
    assert_eq!(reader.get_playback_duration_ms(ctx).unwrap(), 160);

    // Sample data comes back in start-code form.
    let data = reader.get_item_data(ctx, 0).unwrap();
    assert_eq!(&data[0..4], &[0, 0, 0, 1]);
    assert_eq!(data[4], 0x26);

    // Parameter sets from the sample entry.
    let sets = reader.get_decoder_parameter_sets(ctx, 0).unwrap();
    assert!(!sets.sps.is_empty());
}

#[test]
fn looping_sequence_repeats_timestamps() {
    let stream = hevc_test_bitstream(320, 240, 2);
    let mut master = master_config(1, stream);
    master.encapsulation = "trak".to_string();
    master.fps = 10.0;
    master.looping = true;
    let (_, reader) = write_and_read(basic_config(vec![content(master)]));

    let ctx = reader.context_ids().unwrap()[0];
    let feature = reader.track_feature(ctx).unwrap();
    assert!(feature.has(TrackFeature::HAS_EDIT_LIST));
    assert!(feature.has(TrackFeature::HAS_INFINITE_LOOP_PLAYBACK));

    // The presentation map is reproduced past a single span.
    let timestamps = reader.get_item_timestamps(ctx).unwrap();
    assert!(timestamps.len() > 2);
}

#[test]
fn entity_group_of_alternatives() {
    let a = hevc_test_bitstream(640, 480, 1);
    let b = hevc_test_bitstream(320, 240, 1);
    let config = WriterConfig {
        general: GeneralConfig::default(),
        content: vec![content(master_config(1, a)), content(master_config(2, b))],
        egroups: vec![EntityGroupConfig {
            refs: vec![
                RefId { uniq_bsid: 1, index: 1 },
                RefId { uniq_bsid: 2, index: 1 },
            ],
        }],
    };
    let (_, reader) = write_and_read(config);

    let ctx = reader.root_meta_context_id().unwrap();
    let masters = reader.get_item_list_by_type(ctx, "master").unwrap();
    assert_eq!(masters.len(), 2);
    let feature = reader.meta_box_feature(ctx).unwrap();
    assert!(feature.has(MetaBoxFeature::HAS_GROUP_LISTS));
}

#[test]
fn unresolvable_primary_item_is_refused() {
    let stream = hevc_test_bitstream(640, 480, 1);
    let mut config = basic_config(vec![content(master_config(1, stream))]);
    config.general.primary_item = Some(RefId {
        uniq_bsid: 42,
        index: 1,
    });
    assert!(HeifWriter::new(config).write_to_vec().is_err());
}

#[test]
fn hidden_master_is_not_listed_as_master() {
    let stream = hevc_test_bitstream(640, 480, 2);
    let mut master = master_config(1, stream);
    master.hidden = true;
    // A hidden-only file has no primary item candidate.
    let config = basic_config(vec![content(master)]);
    assert!(HeifWriter::new(config).write_to_vec().is_err());
}

#[test]
fn wrong_brand_set_is_rejected_on_read() {
    let stream = hevc_test_bitstream(64, 64, 1);
    let config = basic_config(vec![content(master_config(1, stream))]);
    let mut file = HeifWriter::new(config).write_to_vec().unwrap();
    // Corrupt the major brand and the compatible brands.
    file[8..12].copy_from_slice(b"qt  ");
    let mut reader = HeifReader::new();
    let mut stream = heif::io::MemReader::from_slice(&file[..]);
    assert!(reader.initialize(&mut stream).is_err());
}

#[test]
fn queries_fail_when_uninitialized() {
    let reader = HeifReader::new();
    assert!(matches!(
        reader.root_meta_context_id(),
        Err(heif::Error::Uninitialized)
    ));
    assert!(reader.get_item_list_by_type(0, "master").is_err());
}

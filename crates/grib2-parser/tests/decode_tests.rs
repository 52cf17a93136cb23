//! End-to-end decoding of synthetic MRMS-style GRIB2 files.

use bytes::Bytes;
use grib2_parser::{GridDecoder, Grib2Reader, DecodeStrategy};
use radar_common::RadarError;
use test_utils::{assert_approx_eq, build_grib2_file, create_storm_cell_grid, Grib2Builder};

#[test]
fn test_reader_parses_mrms_message() {
    let data = Grib2Builder::new_mrms()
        .with_reference_time(2025, 6, 1, 12, 4)
        .build();
    let mut reader = Grib2Reader::new(Bytes::from(data));

    let msg = reader.next_message().unwrap().expect("one message");
    assert_eq!(msg.indicator.discipline, 209);
    assert_eq!(msg.parameter(), "RALA");
    assert_eq!(msg.level(), "500 m above MSL");
    assert_eq!(msg.grid_dims(), (15, 20));
    assert!(!msg.scans_south_to_north());
    assert_approx_eq!(msg.grid_definition.first_latitude, 54.995, 1e-6);
    assert_eq!(
        msg.identification.reference_time.to_rfc3339(),
        "2025-06-01T12:04:00+00:00"
    );

    assert!(reader.next_message().unwrap().is_none());
}

#[test]
fn test_decoded_values_round_trip_with_decimal_scale() {
    let values = vec![10.5, 20.0, 35.5, 47.0, 52.5, 61.0];
    let data = Grib2Builder::new_mrms()
        .with_grid(3, 2)
        .with_data(values.clone())
        .build();

    let decoded = GridDecoder::default()
        .decode_bytes(Bytes::from(data))
        .unwrap();

    assert_eq!(decoded.field.shape(), (2, 3));
    for (got, want) in decoded.field.values().iter().zip(&values) {
        assert_approx_eq!(*got, *want, 1e-3);
    }
}

#[test]
fn test_sentinels_become_nan() {
    let data = Grib2Builder::new_mrms()
        .with_grid(2, 2)
        .with_data(vec![-999.0, -99.0, 0.0, 42.0])
        .build();

    let field = GridDecoder::default()
        .decode_bytes(Bytes::from(data))
        .unwrap()
        .field;

    assert!(field.values()[0].is_nan());
    assert!(field.values()[1].is_nan());
    assert_approx_eq!(field.values()[2], 0.0, 1e-3);
    assert_approx_eq!(field.values()[3], 42.0, 1e-3);
}

#[test]
fn test_bitmap_masked_points_are_nan() {
    let data = Grib2Builder::new_mrms()
        .with_grid(2, 2)
        .with_data(vec![5.0, 15.0, 25.0, 35.0])
        .with_missing_mask(vec![false, true, false, false])
        .build();

    let field = GridDecoder::default()
        .decode_bytes(Bytes::from(data))
        .unwrap()
        .field;

    assert_approx_eq!(field.values()[0], 5.0, 1e-3);
    assert!(field.values()[1].is_nan());
    assert_approx_eq!(field.values()[2], 25.0, 1e-3);
    assert_approx_eq!(field.values()[3], 35.0, 1e-3);
}

#[test]
fn test_south_to_north_rows_are_flipped_north_up() {
    let data = Grib2Builder::new_mrms()
        .with_grid(2, 2)
        .with_data(vec![1.0, 2.0, 3.0, 4.0])
        .south_to_north()
        .build();

    let field = GridDecoder::default()
        .decode_bytes(Bytes::from(data))
        .unwrap()
        .field;

    assert_approx_eq!(field.get(0, 0).unwrap(), 3.0, 1e-3);
    assert_approx_eq!(field.get(1, 1).unwrap(), 2.0, 1e-3);
}

#[test]
fn test_specific_short_name_wins_over_first_message() {
    // File order: an unrelated field, then REFL.
    let other = Grib2Builder::new_mrms()
        .with_grid(2, 2)
        .with_parameter(209, 99, 1)
        .with_constant_value(1.0);
    let refl = Grib2Builder::new_mrms()
        .with_grid(2, 2)
        .with_parameter(209, 9, 0)
        .with_constant_value(30.0);
    let data = build_grib2_file(&[other, refl]);

    let decoded = GridDecoder::default()
        .decode_bytes(Bytes::from(data))
        .unwrap();

    assert_eq!(decoded.strategy, "shortName=REFL");
    assert_eq!(decoded.parameter, "REFL");
    assert_approx_eq!(decoded.field.values()[0], 30.0, 1e-3);
}

#[test]
fn test_surface_level_strategy() {
    let data = Grib2Builder::new_mrms()
        .with_grid(2, 2)
        .with_parameter(209, 99, 1)
        .with_level(1, 0)
        .with_constant_value(12.0)
        .build();

    let decoded = GridDecoder::default()
        .decode_bytes(Bytes::from(data))
        .unwrap();

    assert_eq!(decoded.strategy, "typeOfLevel=surface");
    assert_eq!(decoded.level, "surface");
}

#[test]
fn test_first_message_is_the_catch_all() {
    let data = Grib2Builder::new_mrms()
        .with_grid(2, 2)
        .with_parameter(209, 99, 1)
        .with_constant_value(12.0)
        .build();

    let decoded = GridDecoder::default()
        .decode_bytes(Bytes::from(data))
        .unwrap();

    assert_eq!(decoded.strategy, "first message");
}

#[test]
fn test_no_matching_strategy_reports_attempts() {
    let data = Grib2Builder::new_mrms()
        .with_grid(2, 2)
        .with_parameter(209, 99, 1)
        .build();
    let decoder = GridDecoder::new(vec![
        DecodeStrategy::ShortName("REFL"),
        DecodeStrategy::ShortName("DZ"),
    ]);

    match decoder.decode_bytes(Bytes::from(data)).unwrap_err() {
        RadarError::Decode { attempted, .. } => {
            assert_eq!(attempted, vec!["shortName=REFL", "shortName=DZ"]);
        }
        other => panic!("expected decode error, got {other:?}"),
    }
}

#[test]
fn test_value_count_mismatch_is_a_decode_error() {
    // Grid declares 3x3 but only four values are packed.
    let data = Grib2Builder::new_mrms()
        .with_grid(3, 3)
        .with_data(vec![1.0, 2.0, 3.0, 4.0])
        .build();

    let err = GridDecoder::default()
        .decode_bytes(Bytes::from(data))
        .unwrap_err();
    assert_eq!(err.kind(), "decode_error");
}

#[test]
fn test_decode_file_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("MRMS_ReflectivityAtLowestAltitude.grib2");
    let data = Grib2Builder::new_mrms()
        .with_grid(16, 16)
        .with_data(create_storm_cell_grid(16, 16, 60.0))
        .build();
    std::fs::write(&path, data).unwrap();

    let decoded = GridDecoder::default().decode_file(&path).unwrap();

    assert_eq!(decoded.field.shape(), (16, 16));
    assert!(decoded.field.finite_count() > 0);
    assert!(decoded.field.finite_count() < 256);
}

#[test]
fn test_real_mrms_sample_when_available() {
    let path = test_utils::require_test_file!("mrms_reflectivity.grib2");

    let decoded = GridDecoder::default().decode_file(&path).unwrap();
    assert!(decoded.field.rows() > 0 && decoded.field.cols() > 0);
}

#[test]
fn test_later_matching_message_is_tried_when_first_fails() {
    // Two RALA messages: the first packs too few values, the second is intact.
    let broken = Grib2Builder::new_mrms()
        .with_grid(3, 3)
        .with_data(vec![1.0, 2.0, 3.0, 4.0]);
    let intact = Grib2Builder::new_mrms()
        .with_grid(3, 3)
        .with_constant_value(42.0);
    let data = build_grib2_file(&[broken, intact]);

    let decoded = GridDecoder::default()
        .decode_bytes(Bytes::from(data))
        .unwrap();
    assert_eq!(decoded.strategy, "shortName=RALA");
    assert_eq!(decoded.field.shape(), (3, 3));
    assert_approx_eq!(decoded.field.get(1, 1).unwrap(), 42.0, 1e-3);
}

#[test]
fn test_png_packed_message_matches_simple_packing() {
    let values = vec![-12.5, 0.0, 18.5, 33.0, 47.5, 61.0];
    let simple = Grib2Builder::new_mrms()
        .with_grid(3, 2)
        .with_data(values.clone());
    let png = simple.clone().with_png_packing().build();

    let unpacked = grib2_parser::unpacking::unpack_with_grib_crate(&png).unwrap();
    assert_eq!(unpacked.len(), values.len());
    for (got, want) in unpacked.iter().zip(&values) {
        assert_approx_eq!(*got, *want, 1e-3);
    }

    let from_png = GridDecoder::default()
        .decode_bytes(Bytes::from(png))
        .unwrap();
    let from_simple = GridDecoder::default()
        .decode_bytes(Bytes::from(simple.build()))
        .unwrap();
    assert_eq!(from_png.strategy, "shortName=RALA");
    assert_eq!(from_png.field.shape(), from_simple.field.shape());
    for (got, want) in from_png.field.values().iter().zip(from_simple.field.values()) {
        assert_approx_eq!(*got, *want, 1e-3);
    }
}

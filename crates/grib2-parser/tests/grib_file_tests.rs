//! Reading synthetic GRIB2 files end to end.

use chrono::{TimeZone, Utc};
use grib2_parser::{Grib2Error, Grib2Reader, GribFile, GribSource};
use std::io::Cursor;
use test_utils::{
    assert_approx_eq, assert_values_approx_eq, build_message, create_temperature_grid,
    write_temp_file, Grib2Builder,
};
use wx_common::{GribSelector, ProjectionParams, StepType, TimeUnit};

fn tmp_2m(forecast_hour: u32) -> Grib2Builder {
    Grib2Builder::new_gfs()
        .with_forecast_hour(forecast_hour)
        .with_values(create_temperature_grid(4, 3))
}

fn ugrd_10m() -> Grib2Builder {
    Grib2Builder::new_gfs()
        .with_parameter(2, 2)
        .with_level(103, 10)
        .with_values(vec![3.0; 12])
}

#[test]
fn test_reader_decodes_metadata_and_values() {
    let bytes = tmp_2m(6).build();
    let mut reader = Grib2Reader::new(Cursor::new(bytes));

    let messages = reader.next_message().unwrap().unwrap();
    assert_eq!(messages.len(), 1);
    let msg = &messages[0];

    assert_eq!(msg.short_name(), "TMP");
    assert_eq!(msg.level(), "2 m above ground");
    assert_eq!(msg.step_type(), StepType::Instant);
    assert_eq!(
        msg.anal_date(),
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    );
    assert_eq!(
        msg.valid_date().unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 15, 18, 0, 0).unwrap()
    );
    assert_eq!(msg.length_of_time_range(), None);

    let values = msg.values().unwrap();
    assert_values_approx_eq!(values, create_temperature_grid(4, 3), 0.01);

    assert!(reader.next_message().unwrap().is_none());
}

#[test]
fn test_latlon_projection_params() {
    let msg = &Grib2Reader::new(Cursor::new(tmp_2m(0).build()))
        .read_all()
        .unwrap()[0];

    match msg.projection_params().unwrap() {
        ProjectionParams::LatLon {
            ni,
            nj,
            lat1,
            lon1,
            lat2,
            di,
            scanning_mode,
            ..
        } => {
            assert_eq!((ni, nj), (4, 3));
            assert_approx_eq!(lat1, 42.0, 1e-9);
            assert_approx_eq!(lon1, 270.0, 1e-9);
            assert_approx_eq!(lat2, 40.0, 1e-9);
            assert_approx_eq!(di, 1.0, 1e-9);
            assert_eq!(scanning_mode, 0b0100_0000);
        }
        other => panic!("unexpected projection {:?}", other),
    }
}

#[test]
fn test_lambert_projection_params() {
    let bytes = Grib2Builder::new_hrrr().build();
    let msg = &Grib2Reader::new(Cursor::new(bytes)).read_all().unwrap()[0];

    match msg.projection_params().unwrap() {
        ProjectionParams::LambertConformal {
            nx,
            ny,
            lat1,
            lov,
            latin1,
            dx,
            ..
        } => {
            assert_eq!((nx, ny), (4, 3));
            assert_approx_eq!(lat1, 21.138123, 1e-9);
            assert_approx_eq!(lov, 262.5, 1e-9);
            assert_approx_eq!(latin1, 38.5, 1e-9);
            assert_approx_eq!(dx, 3000.0, 1e-6);
        }
        other => panic!("unexpected projection {:?}", other),
    }
}

#[test]
fn test_bitmap_points_are_nan() {
    let mut values = vec![5.0f32; 12];
    values[3] = f32::NAN;
    values[7] = f32::NAN;
    let bytes = Grib2Builder::new_gfs().with_values(values.clone()).build();

    let msg = &Grib2Reader::new(Cursor::new(bytes)).read_all().unwrap()[0];
    assert_values_approx_eq!(msg.values().unwrap(), values, 1e-4);
}

#[test]
fn test_unscaled_values() {
    let values = vec![0.5, 1.25, 2.0, 3.75, 0.0, 0.1, 0.2, 0.3, 10.0, 11.0, 12.0, 13.0];
    let bytes = Grib2Builder::new_gfs()
        .with_decimal_scale(0)
        .with_values(values.clone())
        .build();

    let msg = &Grib2Reader::new(Cursor::new(bytes)).read_all().unwrap()[0];
    assert_values_approx_eq!(msg.values().unwrap(), values, 1e-3);
}

#[test]
fn test_statistical_message() {
    let bytes = Grib2Builder::new_gfs()
        .with_parameter(1, 8)
        .with_level(1, 0)
        .with_forecast_time(45, 0)
        .with_statistical(1, 0, 15)
        .build();
    let msg = &Grib2Reader::new(Cursor::new(bytes)).read_all().unwrap()[0];

    assert_eq!(msg.short_name(), "APCP");
    assert_eq!(msg.level(), "surface");
    assert_eq!(msg.step_type(), StepType::Accum);
    assert_eq!(msg.length_of_time_range(), Some(15));
    assert_eq!(msg.time_range_unit(), Some(TimeUnit::Minutes));
    assert_eq!(
        msg.valid_date().unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 45, 0).unwrap()
    );
}

#[test]
fn test_forecast_time_out_of_range() {
    let bytes = Grib2Builder::new_gfs()
        .with_forecast_time(u32::MAX, 2)
        .with_values(vec![280.0; 12])
        .build();
    let msg = &Grib2Reader::new(Cursor::new(bytes)).read_all().unwrap()[0];

    assert!(matches!(
        msg.valid_date(),
        Err(Grib2Error::InvalidSection { section: 4, .. })
    ));
}

#[test]
fn test_multi_field_message() {
    let vgrd = Grib2Builder::new_gfs()
        .with_parameter(2, 3)
        .with_level(103, 10)
        .with_values(vec![-4.0; 12]);
    let bytes = build_message(&[ugrd_10m(), vgrd]);

    let messages = Grib2Reader::new(Cursor::new(bytes)).read_all().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].short_name(), "UGRD");
    assert_eq!(messages[1].short_name(), "VGRD");
    assert_eq!(messages[1].submessage, 1);
    assert_values_approx_eq!(messages[1].values().unwrap(), vec![-4.0f32; 12], 1e-4);
}

#[test]
fn test_file_select_filters_in_order() {
    let mut bytes = tmp_2m(1).build();
    bytes.extend(ugrd_10m().build());
    bytes.extend(tmp_2m(2).build());
    let tmp = write_temp_file(&bytes, ".grib2");

    let mut file = GribFile::open(tmp.path()).unwrap();
    let selected = file
        .select(&GribSelector::new("TMP", "2 m above ground"))
        .unwrap();
    assert_eq!(selected.len(), 2);
    assert!(selected[0].valid_date().unwrap() < selected[1].valid_date().unwrap());

    // Selecting again rescans from the start
    let again = file
        .select(&GribSelector::new("UGRD", "10 m above ground"))
        .unwrap();
    assert_eq!(again.len(), 1);
}

#[test]
fn test_file_select_step_type() {
    let accum = Grib2Builder::new_gfs()
        .with_parameter(1, 8)
        .with_level(1, 0)
        .with_statistical(1, 1, 1)
        .build();
    let tmp = write_temp_file(&accum, ".grib2");
    let mut file = GribFile::open(tmp.path()).unwrap();

    let sel = GribSelector::new("APCP", "surface").with_step_type(StepType::Avg);
    assert!(matches!(file.select(&sel), Err(Grib2Error::NoMatch(_))));

    let sel = GribSelector::new("APCP", "surface").with_step_type(StepType::Accum);
    assert_eq!(file.select(&sel).unwrap().len(), 1);
}

#[test]
fn test_no_match_and_close() {
    let tmp = write_temp_file(&tmp_2m(0).build(), ".grib2");
    let mut file = GribFile::open(tmp.path()).unwrap();

    let err = file
        .select(&GribSelector::new("WIND", "10 m above ground"))
        .unwrap_err();
    assert!(matches!(err, Grib2Error::NoMatch(_)));

    file.close();
    file.close();
    assert!(file.is_closed());
    assert!(matches!(
        file.select(&GribSelector::new("TMP", "2 m above ground")),
        Err(Grib2Error::Closed)
    ));
}

#[test]
fn test_truncated_file_is_an_error() {
    let bytes = tmp_2m(0).build();
    let truncated = &bytes[..bytes.len() - 10];
    let mut reader = Grib2Reader::new(Cursor::new(truncated.to_vec()));
    assert!(matches!(
        reader.next_message(),
        Err(Grib2Error::InvalidFormat(_))
    ));
}

#[test]
fn test_garbage_is_an_error() {
    let mut reader = Grib2Reader::new(Cursor::new(b"NOT A GRIB FILE AT ALL".to_vec()));
    assert!(reader.next_message().is_err());
}

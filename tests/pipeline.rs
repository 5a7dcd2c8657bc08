use approx::assert_abs_diff_eq;
use drone_geolocate::camera::{CameraModel, RadTanModel, Resolution};
use drone_geolocate::pipeline::{DetectionReport, DroneState, GeoLocator, ReportSink};
use drone_geolocate::{
    calculate_new_coordinates, degrees_to_dms, distance_and_bearing, dms_to_degrees,
    pixels_to_meters, translate, util, GeoPosition, MetricOffset,
};
use nalgebra::Matrix3;
use std::path::Path;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn yuneec_camera() -> RadTanModel {
    let camera_matrix = Matrix3::new(
        4955.0, 0.0, 2736.0, //
        0.0, 4955.0, 1824.0, //
        0.0, 0.0, 1.0,
    );
    let resolution = Resolution {
        width: 5472,
        height: 3648,
    };
    RadTanModel::from_camera_matrix(&camera_matrix, &[0.0; 5], resolution).unwrap()
}

#[test]
fn test_pixel_to_gps_chain() {
    init_logger();
    let camera = yuneec_camera();
    let (lat, lng, altitude) = (50.0, 19.0, 100.0);

    // Image center stays under the drone.
    let center = translate(2736.0, 1824.0, altitude, &camera, 0.0).unwrap();
    let (center_lat, center_lng) = calculate_new_coordinates(lat, lng, center.east, center.north);
    assert_abs_diff_eq!(center_lat, lat, epsilon = 1e-6);
    assert_abs_diff_eq!(center_lng, lng, epsilon = 1e-6);

    // Right of and below center: east and south of the drone.
    let offset = translate(2736.0 + 100.0, 1824.0 + 50.0, altitude, &camera, 0.0).unwrap();
    let (off_lat, off_lng) = calculate_new_coordinates(lat, lng, offset.east, offset.north);
    assert!(off_lat < lat);
    assert!(off_lng > lng);

    // Without distortion the ground offset is the plain pixel scaling.
    assert_abs_diff_eq!(
        offset.east,
        pixels_to_meters(100.0, altitude, 4955.0),
        epsilon = 1e-9
    );
    assert_abs_diff_eq!(
        offset.north,
        -pixels_to_meters(50.0, altitude, 4955.0),
        epsilon = 1e-9
    );

    let (distance, _) =
        distance_and_bearing(&GeoPosition::new(lat, lng), &GeoPosition::new(off_lat, off_lng));
    assert_abs_diff_eq!(distance, offset.distance(), epsilon = 1e-6);
}

#[test]
fn test_dms_metadata_to_gps() {
    init_logger();
    let lat_dms = degrees_to_dms(50.0617);
    let lng_dms = degrees_to_dms(19.9373);
    let lat = dms_to_degrees(lat_dms.sign, lat_dms.degrees, lat_dms.minutes, lat_dms.seconds);
    let lng = dms_to_degrees(lng_dms.sign, lng_dms.degrees, lng_dms.minutes, lng_dms.seconds);

    let target = GeoPosition::new(lat, lng).offset_by(&MetricOffset::new(0.0, 250.0));
    let (distance, bearing) = distance_and_bearing(&GeoPosition::new(lat, lng), &target);

    assert_abs_diff_eq!(distance, 250.0, epsilon = 1e-6);
    assert!(bearing < 1e-6 || bearing > 360.0 - 1e-6);
}

#[test]
fn test_sample_detections_end_to_end() {
    init_logger();
    let camera = RadTanModel::load_from_yaml("samples/rad_tan.yaml").unwrap();
    let resolution = camera.get_resolution();
    let locator = GeoLocator::new(camera);
    let drone = DroneState {
        position: GeoPosition::new(50.0, 19.0),
        altitude: 60.0,
        heading: 0.4,
    };

    let detections = util::load_detections(Path::new("samples/detections.json")).unwrap();
    let mut reports: Vec<DetectionReport> = Vec::new();
    for result in locator.locate_all(&detections, &drone, resolution) {
        let located = result.unwrap();
        let report = DetectionReport::from_located(&located, None);
        ReportSink::push(&mut reports, &report).unwrap();
    }

    assert_eq!(reports.len(), detections.len());
    assert_eq!(reports[0].kind, "barrel");
    assert_eq!(reports[1].kind, "pipe");
    assert_eq!(reports[2].kind, "worker");

    // A 60 m nadir shot with a 4955 px focal length covers roughly 66 x 44 m.
    let origin = drone.position;
    for report in &reports {
        let (distance, _) =
            distance_and_bearing(&origin, &GeoPosition::new(report.gps[0], report.gps[1]));
        assert!(distance > 0.0 && distance < 45.0, "{report:?}: {distance}");
    }
}

#[test]
fn test_heading_rotates_result_around_drone() {
    init_logger();
    let locator = GeoLocator::new(yuneec_camera());
    let detection = drone_geolocate::Detection {
        label: "car".to_string(),
        x: 0.7,
        y: 0.45,
        width: 0.1,
        height: 0.1,
    };
    let resolution = locator.camera().get_resolution();
    let mut drone = DroneState {
        position: GeoPosition::new(-12.05, -77.04),
        altitude: 80.0,
        heading: 0.0,
    };

    let straight = locator.locate(&detection, &drone, resolution).unwrap();
    drone.heading = std::f64::consts::FRAC_PI_2;
    let turned = locator.locate(&detection, &drone, resolution).unwrap();

    // A quarter turn sends an east offset to the south.
    assert_abs_diff_eq!(turned.offset.north, -straight.offset.east, epsilon = 1e-9);
    assert_abs_diff_eq!(turned.offset.east, straight.offset.north, epsilon = 1e-9);
    assert!(turned.position.lat < drone.position.lat);
    assert_abs_diff_eq!(
        straight.offset.distance(),
        turned.offset.distance(),
        epsilon = 1e-9
    );
}

// Unit tests for domain models

use super::*;
use crate::domain::errors::FailureKind;

fn gradient(width: u32, height: u32) -> Frame {
    let mut frame = Frame::black(width, height, 0.0);
    for y in 0..height {
        for x in 0..width {
            frame.set_pixel(x, y, [x as u8, y as u8, 7]);
        }
    }
    frame
}

#[test]
fn test_default_limits_are_valid() {
    let limits = Limits::default();
    assert!(limits.validate().is_ok());
    assert_eq!(limits.max_bytes, 50 * MIB);
    assert_eq!(limits.clamp_duration_seconds, 20.0);
    assert_eq!(limits.target_square_size, 320);
    assert_eq!(limits.target_fps, 30);
}

#[test]
fn test_limits_reject_odd_and_zero_values() {
    let odd = Limits {
        target_square_size: 321,
        ..Limits::default()
    };
    assert!(odd.validate().is_err());

    let no_fps = Limits {
        target_fps: 0,
        ..Limits::default()
    };
    assert!(no_fps.validate().is_err());

    let nan_clamp = Limits {
        clamp_duration_seconds: f64::NAN,
        ..Limits::default()
    };
    assert!(nan_clamp.validate().is_err());
}

#[test]
fn test_limits_toml_partial_override() {
    let limits: Limits = toml::from_str("target_fps = 25\nmax_bytes = 1024").unwrap();
    assert_eq!(limits.target_fps, 25);
    assert_eq!(limits.max_bytes, 1024);
    assert_eq!(limits.target_square_size, 320);
}

#[test]
fn test_frame_from_rgb_checks_length() {
    assert!(Frame::from_rgb(2, 2, 0.0, vec![0; 12]).is_some());
    assert!(Frame::from_rgb(2, 2, 0.0, vec![0; 11]).is_none());
}

#[test]
fn test_frame_crop_copies_region() {
    let frame = gradient(6, 4);
    let plan = CropPlan { x0: 1, y0: 0, side: 4 };
    let cropped = frame.crop(&plan);

    assert_eq!(cropped.width, 4);
    assert!(cropped.is_square());
    assert_eq!(cropped.pixel(0, 0), [1, 0, 7]);
    assert_eq!(cropped.pixel(3, 3), [4, 3, 7]);
}

#[test]
fn test_crop_plan_fits_within() {
    let plan = CropPlan { x0: 0, y0: 150, side: 500 };
    assert!(plan.fits_within(500, 800));
    assert!(!plan.fits_within(499, 800));
    assert!(!plan.fits_within(500, 649));
}

#[test]
fn test_job_status_forward_path() {
    let mut job = Job::new(Arc::new(Limits::default()), SourceMetadata::default());
    assert_eq!(job.status(), &JobStatus::Pending);

    for next in [
        JobStatus::Validating,
        JobStatus::Decoding,
        JobStatus::Transforming,
        JobStatus::Encoding,
        JobStatus::Succeeded,
    ] {
        job.advance(next).unwrap();
    }
    assert!(job.status().is_terminal());
    assert!(job.failure().is_none());
}

#[test]
fn test_job_status_rejects_backward_and_skips() {
    let mut job = Job::new(Arc::new(Limits::default()), SourceMetadata::default());
    job.advance(JobStatus::Validating).unwrap();
    job.advance(JobStatus::Decoding).unwrap();

    assert!(job.advance(JobStatus::Validating).is_err());
    assert!(job.advance(JobStatus::Encoding).is_err());
    assert!(job.advance(JobStatus::Pending).is_err());
    assert_eq!(job.status(), &JobStatus::Decoding);
}

#[test]
fn test_job_failed_is_terminal() {
    let mut job = Job::new(Arc::new(Limits::default()), SourceMetadata::default());
    job.advance(JobStatus::Validating).unwrap();
    job.advance(JobStatus::Failed(FailureKind::TooLarge)).unwrap();

    assert_eq!(job.failure(), Some(&FailureKind::TooLarge));
    assert!(job.advance(JobStatus::Decoding).is_err());
    assert!(job.advance(JobStatus::Failed(FailureKind::Cancelled)).is_err());
    assert!(job.advance(JobStatus::Succeeded).is_err());
}

#[test]
fn test_job_ids_are_unique() {
    let a = JobId::next();
    let b = JobId::next();
    assert_ne!(a, b);
    assert!(a.to_string().starts_with("job-"));
}

#[test]
fn test_status_display() {
    assert_eq!(JobStatus::Encoding.to_string(), "encoding");
    assert_eq!(
        JobStatus::Failed(FailureKind::EmptyFile).to_string(),
        "failed (empty_file)"
    );
}

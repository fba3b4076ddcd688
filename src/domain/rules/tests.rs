// Unit tests for admission policy and crop geometry

use super::*;

fn limits_mib(max_mib: u64) -> Limits {
    Limits {
        max_bytes: max_mib * MIB,
        ..Limits::default()
    }
}

#[test]
fn test_preflight_rejects_declared_oversize() {
    let metadata = SourceMetadata::new(Some(80 * MIB), Some(10.0));
    let verdict = InputValidator::preflight(&metadata, &limits_mib(50));
    assert_eq!(verdict, Err(FailureKind::TooLarge));
}

#[test]
fn test_preflight_accepts_at_limit() {
    let metadata = SourceMetadata::new(Some(50 * MIB), Some(5.0));
    let advisories = InputValidator::preflight(&metadata, &limits_mib(50)).unwrap();
    assert!(advisories.is_empty());
}

#[test]
fn test_preflight_long_duration_is_advisory() {
    let metadata = SourceMetadata::new(Some(MIB), Some(30.0));
    let advisories = InputValidator::preflight(&metadata, &Limits::default()).unwrap();
    assert_eq!(
        advisories,
        vec![Advisory::DurationClamped {
            declared_seconds: 30.0,
            clamp_seconds: 20.0,
        }]
    );
}

#[test]
fn test_preflight_without_declared_size() {
    let metadata = SourceMetadata::new(None, None);
    let advisories = InputValidator::preflight(&metadata, &Limits::default()).unwrap();
    assert_eq!(advisories, vec![Advisory::SizeNotDeclared]);
}

#[test]
fn test_verify_materialized_empty_wins() {
    // Zero bytes is EmptyFile even with a tiny limit
    let limits = Limits {
        max_bytes: 1,
        ..Limits::default()
    };
    assert_eq!(
        InputValidator::verify_materialized(0, &limits),
        Err(FailureKind::EmptyFile)
    );
    assert_eq!(InputValidator::verify_materialized(1, &limits), Ok(()));
    assert_eq!(
        InputValidator::verify_materialized(2, &limits),
        Err(FailureKind::TooLarge)
    );
}

#[test]
fn test_plan_portrait_source() {
    let plan = GeometryPlanner::plan(500, 800).unwrap();
    assert_eq!(plan, CropPlan { x0: 0, y0: 150, side: 500 });
}

#[test]
fn test_plan_landscape_full_hd() {
    let plan = GeometryPlanner::plan(1920, 1080).unwrap();
    assert_eq!(plan, CropPlan { x0: 420, y0: 0, side: 1080 });
}

#[test]
fn test_plan_odd_dimensions_floor() {
    // 7/2 - 4/2 = 3 - 2 = 1
    let plan = GeometryPlanner::plan(7, 4).unwrap();
    assert_eq!(plan, CropPlan { x0: 1, y0: 0, side: 4 });

    // 5/2 - 3/2 = 2 - 1 = 1
    let plan = GeometryPlanner::plan(3, 5).unwrap();
    assert_eq!(plan, CropPlan { x0: 0, y0: 1, side: 3 });
}

#[test]
fn test_plan_rejects_zero_dimension() {
    assert_eq!(GeometryPlanner::plan(0, 720), Err(FailureKind::InvalidDimensions));
    assert_eq!(GeometryPlanner::plan(1280, 0), Err(FailureKind::InvalidDimensions));
}

#[test]
fn test_plan_always_contained() {
    for width in 1..=40u32 {
        for height in 1..=40u32 {
            let plan = GeometryPlanner::plan(width, height).unwrap();
            assert_eq!(plan.side, width.min(height));
            assert!(
                plan.fits_within(width, height),
                "{}x{} -> {:?}",
                width,
                height,
                plan
            );
        }
    }
}

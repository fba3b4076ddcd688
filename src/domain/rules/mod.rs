// Domain rules - Admission policy and crop geometry

use crate::domain::errors::*;
use crate::domain::model::*;

/// Size and duration policy, applied before any decode work.
///
/// Size is a hard limit. Duration never rejects: an over-long source is
/// accepted with an advisory and truncated later by the Clip Assembler.
pub struct InputValidator;

impl InputValidator {
    /// Pre-flight check against collaborator-declared metadata.
    ///
    /// Advisory only: the declared size may be missing or wrong, so
    /// `verify_materialized` re-checks the real file afterwards.
    pub fn preflight(
        metadata: &SourceMetadata,
        limits: &Limits,
    ) -> Result<Vec<Advisory>, FailureKind> {
        let mut advisories = Vec::new();

        match metadata.declared_byte_size {
            Some(size) if size > limits.max_bytes => return Err(FailureKind::TooLarge),
            Some(_) => {}
            None => advisories.push(Advisory::SizeNotDeclared),
        }

        if let Some(duration) = metadata.declared_duration_seconds {
            if duration > limits.max_duration_seconds {
                advisories.push(Advisory::DurationClamped {
                    declared_seconds: duration,
                    clamp_seconds: limits.clamp_duration_seconds,
                });
            }
        }

        Ok(advisories)
    }

    /// Authoritative check of the materialized source size.
    ///
    /// A zero-byte file is rejected regardless of what was declared.
    pub fn verify_materialized(on_disk_bytes: u64, limits: &Limits) -> Result<(), FailureKind> {
        if on_disk_bytes == 0 {
            return Err(FailureKind::EmptyFile);
        }
        if on_disk_bytes > limits.max_bytes {
            return Err(FailureKind::TooLarge);
        }
        Ok(())
    }
}

/// Centered square crop computation
pub struct GeometryPlanner;

impl GeometryPlanner {
    /// Largest centered square inside a `width` x `height` frame.
    ///
    /// Integer floor division throughout, so odd leftovers favour the
    /// top-left: `x0 = width/2 - side/2`, `y0 = height/2 - side/2`.
    pub fn plan(width: u32, height: u32) -> Result<CropPlan, FailureKind> {
        if width == 0 || height == 0 {
            return Err(FailureKind::InvalidDimensions);
        }
        let side = width.min(height);
        Ok(CropPlan {
            x0: width / 2 - side / 2,
            y0: height / 2 - side / 2,
            side,
        })
    }
}

#[cfg(test)]
mod tests;

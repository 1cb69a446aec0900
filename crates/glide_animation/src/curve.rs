//! Shaping curves

/// Maps normalized time in `[0, 1]` to a shaping coefficient.
///
/// The engine only ever queries a curve inside `[0, 1]`; outputs are not
/// required to be monotonic or to stay inside `[0, 1]`.
pub trait Curve: Send + Sync {
    fn evaluate(&self, t: f32) -> f32;
}

impl<F> Curve for F
where
    F: Fn(f32) -> f32 + Send + Sync,
{
    fn evaluate(&self, t: f32) -> f32 {
        self(t)
    }
}

//! Animated properties
//!
//! A [`PropertySet`] is the ordered list of values an engine drives. Each
//! entry pairs a [`Curve`] with a start/end range and a sink that receives
//! the computed value every tick.

use crate::curve::Curve;
use crate::playhead::Sample;

/// Receives the interpolated value of one property each tick.
pub type Sink = Box<dyn FnMut(f32) + Send>;

/// Position of a property in its set (registration order).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(pub(crate) usize);

impl PropertyId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One animated value
pub struct Property {
    curve: Box<dyn Curve>,
    start: f32,
    end: f32,
    sink: Sink,
}

impl Property {
    pub fn new<C, S>(curve: C, start: f32, end: f32, sink: S) -> Self
    where
        C: Curve + 'static,
        S: FnMut(f32) + Send + 'static,
    {
        Self {
            curve: Box::new(curve),
            start,
            end,
            sink: Box::new(sink),
        }
    }

    pub fn start(&self) -> f32 {
        self.start
    }

    pub fn end(&self) -> f32 {
        self.end
    }

    /// A range with equal endpoints: the curve output is used as the value.
    pub fn is_degenerate(&self) -> bool {
        self.start == self.end
    }

    /// Value of this property for a playhead sample.
    ///
    /// Terminal samples return the configured endpoint exactly instead of
    /// evaluating the curve at an overshot time.
    pub fn value_at(&self, sample: Sample) -> f32 {
        match sample {
            Sample::Terminal { forward } => match (self.is_degenerate(), forward) {
                (true, true) => self.curve.evaluate(1.0),
                (true, false) => self.curve.evaluate(0.0),
                (false, true) => self.end,
                (false, false) => self.start,
            },
            Sample::At(t) => {
                let shaped = self.curve.evaluate(t);
                if self.is_degenerate() {
                    shaped
                } else {
                    self.start + (self.end - self.start) * shaped
                }
            }
        }
    }

    /// Compute the value for `sample` and hand it to the sink.
    pub fn apply(&mut self, sample: Sample) -> f32 {
        let value = self.value_at(sample);
        (self.sink)(value);
        value
    }
}

impl std::fmt::Debug for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Property")
            .field("start", &self.start)
            .field("end", &self.end)
            .finish_non_exhaustive()
    }
}

/// Ordered set of properties driven by one engine
#[derive(Debug, Default)]
pub struct PropertySet {
    properties: Vec<Property>,
}

impl PropertySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a property. No validation is performed.
    pub fn add<C, S>(&mut self, curve: C, start: f32, end: f32, sink: S) -> PropertyId
    where
        C: Curve + 'static,
        S: FnMut(f32) + Send + 'static,
    {
        self.push(Property::new(curve, start, end, sink))
    }

    pub fn push(&mut self, property: Property) -> PropertyId {
        let id = PropertyId(self.properties.len());
        self.properties.push(property);
        id
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Property> {
        self.properties.iter_mut()
    }
}

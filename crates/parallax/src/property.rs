//! Entity position/orientation properties.

use std::collections::VecDeque;

use crate::geometry::{Interpolate, Time};

/// Either a single value or a bounded time series.
#[derive(Debug, Clone, PartialEq)]
pub enum Property<T> {
    /// `None` means unknown.
    Constant(Option<T>),
    Sampled(SampledProperty<T>),
}

impl<T: Interpolate> Property<T> {
    pub fn constant() -> Self {
        Property::Constant(None)
    }

    pub fn sampled(max_samples: usize) -> Self {
        Property::Sampled(SampledProperty::new(max_samples))
    }

    pub fn is_sampled(&self) -> bool {
        matches!(self, Property::Sampled(_))
    }

    /// Record `value` as of `time`. `None` clears the property.
    pub fn set(&mut self, time: Time, value: Option<T>) {
        match self {
            Property::Constant(current) => *current = value,
            Property::Sampled(samples) => match value {
                Some(v) => samples.add_sample(time, v),
                None => samples.clear(),
            },
        }
    }

    pub fn clear(&mut self) {
        match self {
            Property::Constant(current) => *current = None,
            Property::Sampled(samples) => samples.clear(),
        }
    }

    pub fn value_at(&self, time: Time) -> Option<T> {
        match self {
            Property::Constant(value) => value.clone(),
            Property::Sampled(samples) => samples.value_at(time),
        }
    }
}

/// Ring buffer of `(time, value)` samples ordered by time.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledProperty<T> {
    samples: VecDeque<(Time, T)>,
    max_samples: usize,
}

impl<T: Interpolate> SampledProperty<T> {
    pub fn new(max_samples: usize) -> Self {
        let max_samples = max_samples.max(1);
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Insert keeping time order; a sample at an existing time replaces it.
    /// The oldest sample is evicted once the buffer is full.
    pub fn add_sample(&mut self, time: Time, value: T) {
        match self
            .samples
            .iter()
            .position(|(t, _)| t.seconds() >= time.seconds())
        {
            Some(i) if self.samples[i].0 == time => self.samples[i].1 = value,
            Some(i) => self.samples.insert(i, (time, value)),
            None => self.samples.push_back((time, value)),
        }
        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Interpolated value. Holds the newest sample forward in time; nothing
    /// is known before the oldest sample.
    pub fn value_at(&self, time: Time) -> Option<T> {
        let (first_time, first) = self.samples.front()?;
        if time < *first_time {
            return None;
        }
        if time == *first_time {
            return Some(first.clone());
        }

        for window in self.samples.iter().zip(self.samples.iter().skip(1)) {
            let ((t0, v0), (t1, v1)) = window;
            if time <= *t1 {
                let span = t1.since(*t0);
                if span <= 0.0 {
                    return Some(v1.clone());
                }
                return Some(v0.interpolate(v1, time.since(*t0) / span));
            }
        }

        self.samples.back().map(|(_, v)| v.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vector3;

    #[test]
    fn test_constant_set_and_clear() {
        let mut p = Property::<Vector3>::constant();
        assert_eq!(p.value_at(Time(0.0)), None);
        p.set(Time(1.0), Some(Vector3::new(1.0, 2.0, 3.0)));
        assert_eq!(p.value_at(Time(99.0)), Some(Vector3::new(1.0, 2.0, 3.0)));
        p.clear();
        assert_eq!(p.value_at(Time(1.0)), None);
    }

    #[test]
    fn test_sampled_interpolates_and_holds() {
        let mut p = SampledProperty::new(4);
        p.add_sample(Time(0.0), Vector3::new(0.0, 0.0, 0.0));
        p.add_sample(Time(2.0), Vector3::new(2.0, 0.0, 0.0));

        assert_eq!(p.value_at(Time(-1.0)), None);
        assert_eq!(p.value_at(Time(1.0)), Some(Vector3::new(1.0, 0.0, 0.0)));
        assert_eq!(p.value_at(Time(5.0)), Some(Vector3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn test_sampled_evicts_oldest() {
        let mut p = SampledProperty::new(3);
        for i in 0..5 {
            p.add_sample(Time(i as f64), Vector3::new(i as f64, 0.0, 0.0));
        }
        assert_eq!(p.len(), 3);
        assert_eq!(p.value_at(Time(1.0)), None);
        assert_eq!(p.value_at(Time(2.0)), Some(Vector3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn test_sampled_out_of_order_insert() {
        let mut p = SampledProperty::new(10);
        p.add_sample(Time(2.0), Vector3::new(2.0, 0.0, 0.0));
        p.add_sample(Time(0.0), Vector3::new(0.0, 0.0, 0.0));
        p.add_sample(Time(2.0), Vector3::new(4.0, 0.0, 0.0));
        assert_eq!(p.len(), 2);
        assert_eq!(p.value_at(Time(1.0)), Some(Vector3::new(2.0, 0.0, 0.0)));
    }
}

//! Typed sample buffers.
//!
//! A [`Series`] is a resizable, scalar-indexable buffer of one [`DataType`],
//! tagged with the [`Alignment`] of its first sample. Series are owned by the
//! runtime's state store and mutated in place on the tick thread; `Clone` is
//! a deep copy.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::{Alignment, TimeStamp};

/// Errors raised by typed series operations.
#[derive(Error, Debug)]
pub enum TelemError {
    /// A sample of one family (string vs. numeric) was written into a series
    /// of the other.
    #[error("type mismatch: series of {series} cannot accept {sample} value")]
    TypeMismatch {
        /// Data type of the series being written.
        series: DataType,
        /// Data type of the offending sample.
        sample: DataType,
    },

    /// A JSON config value could not be decoded as the requested type.
    #[error("cannot decode {value} as {data_type}")]
    Decode {
        /// The requested data type.
        data_type: DataType,
        /// The offending JSON value.
        value: serde_json::Value,
    },
}

/// The element type of a [`Series`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Timestamp,
    String,
}

impl DataType {
    /// True for integer and floating-point types.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, DataType::String | DataType::Timestamp)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::U8 => "u8",
            DataType::U16 => "u16",
            DataType::U32 => "u32",
            DataType::U64 => "u64",
            DataType::I8 => "i8",
            DataType::I16 => "i16",
            DataType::I32 => "i32",
            DataType::I64 => "i64",
            DataType::F32 => "f32",
            DataType::F64 => "f64",
            DataType::Timestamp => "timestamp",
            DataType::String => "string",
        };
        write!(f, "{}", name)
    }
}

/// One scalar value of any [`DataType`].
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Timestamp(TimeStamp),
    Str(String),
}

impl Sample {
    /// The data type this sample belongs to.
    pub fn data_type(&self) -> DataType {
        match self {
            Sample::U8(_) => DataType::U8,
            Sample::U16(_) => DataType::U16,
            Sample::U32(_) => DataType::U32,
            Sample::U64(_) => DataType::U64,
            Sample::I8(_) => DataType::I8,
            Sample::I16(_) => DataType::I16,
            Sample::I32(_) => DataType::I32,
            Sample::I64(_) => DataType::I64,
            Sample::F32(_) => DataType::F32,
            Sample::F64(_) => DataType::F64,
            Sample::Timestamp(_) => DataType::Timestamp,
            Sample::Str(_) => DataType::String,
        }
    }

    /// Truthiness: nonzero numerics, non-empty strings, nonzero-ns
    /// timestamps.
    pub fn is_truthy(&self) -> bool {
        match self {
            Sample::U8(v) => *v != 0,
            Sample::U16(v) => *v != 0,
            Sample::U32(v) => *v != 0,
            Sample::U64(v) => *v != 0,
            Sample::I8(v) => *v != 0,
            Sample::I16(v) => *v != 0,
            Sample::I32(v) => *v != 0,
            Sample::I64(v) => *v != 0,
            Sample::F32(v) => *v != 0.0,
            Sample::F64(v) => *v != 0.0,
            Sample::Timestamp(t) => t.nanoseconds() != 0,
            Sample::Str(s) => !s.is_empty(),
        }
    }

    /// Borrow the string payload, if this is a string sample.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Sample::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Widen any numeric or timestamp sample to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Sample::U8(v) => Some(*v as f64),
            Sample::U16(v) => Some(*v as f64),
            Sample::U32(v) => Some(*v as f64),
            Sample::U64(v) => Some(*v as f64),
            Sample::I8(v) => Some(*v as f64),
            Sample::I16(v) => Some(*v as f64),
            Sample::I32(v) => Some(*v as f64),
            Sample::I64(v) => Some(*v as f64),
            Sample::F32(v) => Some(*v as f64),
            Sample::F64(v) => Some(*v),
            Sample::Timestamp(t) => Some(t.nanoseconds() as f64),
            Sample::Str(_) => None,
        }
    }

    /// Narrow any numeric or timestamp sample to `i64` (floats truncate).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Sample::U8(v) => Some(*v as i64),
            Sample::U16(v) => Some(*v as i64),
            Sample::U32(v) => Some(*v as i64),
            Sample::U64(v) => Some(*v as i64),
            Sample::I8(v) => Some(*v as i64),
            Sample::I16(v) => Some(*v as i64),
            Sample::I32(v) => Some(*v as i64),
            Sample::I64(v) => Some(*v),
            Sample::F32(v) => Some(*v as i64),
            Sample::F64(v) => Some(*v as i64),
            Sample::Timestamp(t) => Some(t.nanoseconds()),
            Sample::Str(_) => None,
        }
    }

    /// Decode a JSON config value into a sample of the given type.
    ///
    /// Node factories use this to resolve `config` payloads at creation
    /// time, so a bad value fails fast instead of surfacing mid-run.
    pub fn from_json(data_type: DataType, value: &serde_json::Value) -> Result<Self, TelemError> {
        let decode_err = || TelemError::Decode {
            data_type,
            value: value.clone(),
        };
        match data_type {
            DataType::U8 => value.as_u64().map(|v| Sample::U8(v as u8)),
            DataType::U16 => value.as_u64().map(|v| Sample::U16(v as u16)),
            DataType::U32 => value.as_u64().map(|v| Sample::U32(v as u32)),
            DataType::U64 => value.as_u64().map(Sample::U64),
            DataType::I8 => value.as_i64().map(|v| Sample::I8(v as i8)),
            DataType::I16 => value.as_i64().map(|v| Sample::I16(v as i16)),
            DataType::I32 => value.as_i64().map(|v| Sample::I32(v as i32)),
            DataType::I64 => value.as_i64().map(Sample::I64),
            DataType::F32 => value.as_f64().map(|v| Sample::F32(v as f32)),
            DataType::F64 => value.as_f64().map(Sample::F64),
            DataType::Timestamp => value.as_i64().map(|n| Sample::Timestamp(TimeStamp(n))),
            DataType::String => value.as_str().map(|s| Sample::Str(s.to_string())),
        }
        .ok_or_else(decode_err)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Buf {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Timestamp(Vec<i64>),
    Str(Vec<String>),
}

impl Buf {
    fn empty(data_type: DataType) -> Self {
        match data_type {
            DataType::U8 => Buf::U8(Vec::new()),
            DataType::U16 => Buf::U16(Vec::new()),
            DataType::U32 => Buf::U32(Vec::new()),
            DataType::U64 => Buf::U64(Vec::new()),
            DataType::I8 => Buf::I8(Vec::new()),
            DataType::I16 => Buf::I16(Vec::new()),
            DataType::I32 => Buf::I32(Vec::new()),
            DataType::I64 => Buf::I64(Vec::new()),
            DataType::F32 => Buf::F32(Vec::new()),
            DataType::F64 => Buf::F64(Vec::new()),
            DataType::Timestamp => Buf::Timestamp(Vec::new()),
            DataType::String => Buf::Str(Vec::new()),
        }
    }
}

/// A typed, resizable buffer of samples plus the alignment of its first
/// sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    buf: Buf,
    /// Stream position of the first sample.
    pub alignment: Alignment,
}

impl Series {
    /// An empty series of the given type.
    pub fn new(data_type: DataType) -> Self {
        Self {
            buf: Buf::empty(data_type),
            alignment: Alignment::default(),
        }
    }

    /// A timestamp series from explicit instants.
    pub fn timestamps(values: Vec<TimeStamp>) -> Self {
        Self {
            buf: Buf::Timestamp(values.into_iter().map(|t| t.nanoseconds()).collect()),
            alignment: Alignment::default(),
        }
    }

    /// `len` timestamps linearly spaced from `start` to `end` inclusive.
    pub fn linspace(start: TimeStamp, end: TimeStamp, len: usize) -> Self {
        let mut values = Vec::with_capacity(len);
        if len == 1 {
            values.push(start.nanoseconds());
        } else if len > 1 {
            let span = end.nanoseconds() - start.nanoseconds();
            let step = span / (len as i64 - 1);
            for i in 0..len {
                values.push(start.nanoseconds() + step * i as i64);
            }
        }
        Self {
            buf: Buf::Timestamp(values),
            alignment: Alignment::default(),
        }
    }

    /// Rebind the alignment of the first sample.
    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// The element type of this series.
    pub fn data_type(&self) -> DataType {
        match &self.buf {
            Buf::U8(_) => DataType::U8,
            Buf::U16(_) => DataType::U16,
            Buf::U32(_) => DataType::U32,
            Buf::U64(_) => DataType::U64,
            Buf::I8(_) => DataType::I8,
            Buf::I16(_) => DataType::I16,
            Buf::I32(_) => DataType::I32,
            Buf::I64(_) => DataType::I64,
            Buf::F32(_) => DataType::F32,
            Buf::F64(_) => DataType::F64,
            Buf::Timestamp(_) => DataType::Timestamp,
            Buf::Str(_) => DataType::String,
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        match &self.buf {
            Buf::U8(v) => v.len(),
            Buf::U16(v) => v.len(),
            Buf::U32(v) => v.len(),
            Buf::U64(v) => v.len(),
            Buf::I8(v) => v.len(),
            Buf::I16(v) => v.len(),
            Buf::I32(v) => v.len(),
            Buf::I64(v) => v.len(),
            Buf::F32(v) => v.len(),
            Buf::F64(v) => v.len(),
            Buf::Timestamp(v) => v.len(),
            Buf::Str(v) => v.len(),
        }
    }

    /// True when the series holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all samples, keeping the type.
    pub fn clear(&mut self) {
        match &mut self.buf {
            Buf::U8(v) => v.clear(),
            Buf::U16(v) => v.clear(),
            Buf::U32(v) => v.clear(),
            Buf::U64(v) => v.clear(),
            Buf::I8(v) => v.clear(),
            Buf::I16(v) => v.clear(),
            Buf::I32(v) => v.clear(),
            Buf::I64(v) => v.clear(),
            Buf::F32(v) => v.clear(),
            Buf::F64(v) => v.clear(),
            Buf::Timestamp(v) => v.clear(),
            Buf::Str(v) => v.clear(),
        }
    }

    /// Resize to `len` samples, zero/default-filling new slots.
    pub fn resize(&mut self, len: usize) {
        match &mut self.buf {
            Buf::U8(v) => v.resize(len, 0),
            Buf::U16(v) => v.resize(len, 0),
            Buf::U32(v) => v.resize(len, 0),
            Buf::U64(v) => v.resize(len, 0),
            Buf::I8(v) => v.resize(len, 0),
            Buf::I16(v) => v.resize(len, 0),
            Buf::I32(v) => v.resize(len, 0),
            Buf::I64(v) => v.resize(len, 0),
            Buf::F32(v) => v.resize(len, 0.0),
            Buf::F64(v) => v.resize(len, 0.0),
            Buf::Timestamp(v) => v.resize(len, 0),
            Buf::Str(v) => v.resize(len, String::new()),
        }
    }

    /// Write `sample` at `index`, coercing numerics into the series' type.
    ///
    /// Writing past the end is silently ignored for out-of-range indices;
    /// callers resize first. String/numeric cross-writes are a typed error.
    pub fn set(&mut self, index: usize, sample: Sample) -> Result<(), TelemError> {
        if index >= self.len() {
            return Ok(());
        }
        self.store(index, sample)
    }

    /// Append `sample`, coercing numerics into the series' type.
    pub fn push(&mut self, sample: Sample) -> Result<(), TelemError> {
        self.resize(self.len() + 1);
        let last = self.len() - 1;
        self.store(last, sample)
    }

    fn store(&mut self, index: usize, sample: Sample) -> Result<(), TelemError> {
        let mismatch = TelemError::TypeMismatch {
            series: self.data_type(),
            sample: sample.data_type(),
        };
        match &mut self.buf {
            Buf::U8(v) => v[index] = sample.as_i64().ok_or(mismatch)? as u8,
            Buf::U16(v) => v[index] = sample.as_i64().ok_or(mismatch)? as u16,
            Buf::U32(v) => v[index] = sample.as_i64().ok_or(mismatch)? as u32,
            Buf::U64(v) => v[index] = sample.as_i64().ok_or(mismatch)? as u64,
            Buf::I8(v) => v[index] = sample.as_i64().ok_or(mismatch)? as i8,
            Buf::I16(v) => v[index] = sample.as_i64().ok_or(mismatch)? as i16,
            Buf::I32(v) => v[index] = sample.as_i64().ok_or(mismatch)? as i32,
            Buf::I64(v) => v[index] = sample.as_i64().ok_or(mismatch)?,
            Buf::F32(v) => v[index] = sample.as_f64().ok_or(mismatch)? as f32,
            Buf::F64(v) => v[index] = sample.as_f64().ok_or(mismatch)?,
            Buf::Timestamp(v) => v[index] = sample.as_i64().ok_or(mismatch)?,
            Buf::Str(v) => match sample {
                Sample::Str(s) => v[index] = s,
                _ => return Err(mismatch),
            },
        }
        Ok(())
    }

    /// Read the sample at `index`; negative indices count from the end.
    pub fn at(&self, index: isize) -> Option<Sample> {
        let len = self.len() as isize;
        let idx = if index < 0 { len + index } else { index };
        if idx < 0 || idx >= len {
            return None;
        }
        let idx = idx as usize;
        Some(match &self.buf {
            Buf::U8(v) => Sample::U8(v[idx]),
            Buf::U16(v) => Sample::U16(v[idx]),
            Buf::U32(v) => Sample::U32(v[idx]),
            Buf::U64(v) => Sample::U64(v[idx]),
            Buf::I8(v) => Sample::I8(v[idx]),
            Buf::I16(v) => Sample::I16(v[idx]),
            Buf::I32(v) => Sample::I32(v[idx]),
            Buf::I64(v) => Sample::I64(v[idx]),
            Buf::F32(v) => Sample::F32(v[idx]),
            Buf::F64(v) => Sample::F64(v[idx]),
            Buf::Timestamp(v) => Sample::Timestamp(TimeStamp(v[idx])),
            Buf::Str(v) => Sample::Str(v[idx].clone()),
        })
    }

    /// The final sample, if any.
    pub fn last(&self) -> Option<Sample> {
        self.at(-1)
    }

    /// Truthiness of the series: the last element's truthiness, with empty
    /// series falsy.
    pub fn is_truthy(&self) -> bool {
        self.last().map_or(false, |s| s.is_truthy())
    }

    /// Append all of `other`'s samples. Both series must share a type.
    pub fn extend_from(&mut self, other: &Series) -> Result<(), TelemError> {
        let mismatch = TelemError::TypeMismatch {
            series: self.data_type(),
            sample: other.data_type(),
        };
        match (&mut self.buf, &other.buf) {
            (Buf::U8(a), Buf::U8(b)) => a.extend_from_slice(b),
            (Buf::U16(a), Buf::U16(b)) => a.extend_from_slice(b),
            (Buf::U32(a), Buf::U32(b)) => a.extend_from_slice(b),
            (Buf::U64(a), Buf::U64(b)) => a.extend_from_slice(b),
            (Buf::I8(a), Buf::I8(b)) => a.extend_from_slice(b),
            (Buf::I16(a), Buf::I16(b)) => a.extend_from_slice(b),
            (Buf::I32(a), Buf::I32(b)) => a.extend_from_slice(b),
            (Buf::I64(a), Buf::I64(b)) => a.extend_from_slice(b),
            (Buf::F32(a), Buf::F32(b)) => a.extend_from_slice(b),
            (Buf::F64(a), Buf::F64(b)) => a.extend_from_slice(b),
            (Buf::Timestamp(a), Buf::Timestamp(b)) => a.extend_from_slice(b),
            (Buf::Str(a), Buf::Str(b)) => a.extend_from_slice(b),
            _ => return Err(mismatch),
        }
        Ok(())
    }
}

macro_rules! series_from_vec {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Vec<$ty>> for Series {
                fn from(values: Vec<$ty>) -> Self {
                    Self { buf: Buf::$variant(values), alignment: Alignment::default() }
                }
            }
        )*
    };
}

series_from_vec! {
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
    String => Str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_series_is_falsy() {
        assert!(!Series::new(DataType::F32).is_truthy());
        assert!(!Series::new(DataType::String).is_truthy());
    }

    #[test]
    fn test_truthiness_by_last_element() {
        let s = Series::from(vec![0.0f64, 2.5]);
        assert!(s.is_truthy());
        let s = Series::from(vec![5i32, 0]);
        assert!(!s.is_truthy());
        let s = Series::from(vec!["".to_string()]);
        assert!(!s.is_truthy());
        let s = Series::timestamps(vec![TimeStamp(0)]);
        assert!(!s.is_truthy());
        let s = Series::timestamps(vec![TimeStamp(42)]);
        assert!(s.is_truthy());
    }

    #[test]
    fn test_negative_indexing() {
        let s = Series::from(vec![1u8, 2, 3]);
        assert_eq!(s.at(-1), Some(Sample::U8(3)));
        assert_eq!(s.at(0), Some(Sample::U8(1)));
        assert_eq!(s.at(3), None);
        assert_eq!(s.at(-4), None);
    }

    #[test]
    fn test_resize_and_set_coerces_numerics() {
        let mut s = Series::new(DataType::F32);
        s.resize(1);
        s.set(0, Sample::U8(1)).unwrap();
        assert_eq!(s.at(0), Some(Sample::F32(1.0)));
    }

    #[test]
    fn test_set_string_into_numeric_fails() {
        let mut s = Series::new(DataType::I64);
        s.resize(1);
        let err = s.set(0, Sample::Str("x".into())).unwrap_err();
        assert!(matches!(err, TelemError::TypeMismatch { .. }));
    }

    #[test]
    fn test_linspace_endpoints() {
        let s = Series::linspace(TimeStamp(0), TimeStamp(100), 5);
        assert_eq!(s.len(), 5);
        assert_eq!(s.at(0), Some(Sample::Timestamp(TimeStamp(0))));
        assert_eq!(s.at(-1), Some(Sample::Timestamp(TimeStamp(100))));
    }

    #[test]
    fn test_linspace_degenerate_lengths() {
        assert!(Series::linspace(TimeStamp(0), TimeStamp(10), 0).is_empty());
        let one = Series::linspace(TimeStamp(7), TimeStamp(10), 1);
        assert_eq!(one.at(0), Some(Sample::Timestamp(TimeStamp(7))));
    }

    #[test]
    fn test_extend_from_same_type() {
        let mut a = Series::from(vec![1.0f64]);
        let b = Series::from(vec![2.0f64, 3.0]);
        a.extend_from(&b).unwrap();
        assert_eq!(a.len(), 3);
        assert_eq!(a.at(-1), Some(Sample::F64(3.0)));
    }

    #[test]
    fn test_extend_from_mismatched_type() {
        let mut a = Series::from(vec![1.0f64]);
        let b = Series::from(vec![1i32]);
        assert!(a.extend_from(&b).is_err());
    }

    #[test]
    fn test_from_json_decoding() {
        let v = serde_json::json!(42.5);
        assert_eq!(
            Sample::from_json(DataType::F32, &v).unwrap(),
            Sample::F32(42.5)
        );
        let v = serde_json::json!("hello");
        assert_eq!(
            Sample::from_json(DataType::String, &v).unwrap(),
            Sample::Str("hello".into())
        );
        let v = serde_json::json!([1, 2]);
        assert!(Sample::from_json(DataType::U8, &v).is_err());
    }

    proptest! {
        #[test]
        fn prop_truthy_iff_last_nonzero(values in proptest::collection::vec(any::<f64>(), 1..32)) {
            let expected = *values.last().unwrap() != 0.0;
            let s = Series::from(values);
            prop_assert_eq!(s.is_truthy(), expected);
        }
    }
}

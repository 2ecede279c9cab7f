use std::fmt;

use anyhow::{Result, bail, ensure};

use crate::val::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
}

impl ArrayKind {
    pub const ALL: [ArrayKind; 10] = [
        ArrayKind::Int8,
        ArrayKind::UInt8,
        ArrayKind::Int16,
        ArrayKind::UInt16,
        ArrayKind::Int32,
        ArrayKind::UInt32,
        ArrayKind::Int64,
        ArrayKind::UInt64,
        ArrayKind::Float32,
        ArrayKind::Float64,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ArrayKind::Int8 => "int8",
            ArrayKind::UInt8 => "uint8",
            ArrayKind::Int16 => "int16",
            ArrayKind::UInt16 => "uint16",
            ArrayKind::Int32 => "int32",
            ArrayKind::UInt32 => "uint32",
            ArrayKind::Int64 => "int64",
            ArrayKind::UInt64 => "uint64",
            ArrayKind::Float32 => "float32",
            ArrayKind::Float64 => "float64",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Element width in bytes.
    pub fn size(self) -> usize {
        match self {
            ArrayKind::Int8 | ArrayKind::UInt8 => 1,
            ArrayKind::Int16 | ArrayKind::UInt16 => 2,
            ArrayKind::Int32 | ArrayKind::UInt32 | ArrayKind::Float32 => 4,
            ArrayKind::Int64 | ArrayKind::UInt64 | ArrayKind::Float64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, ArrayKind::Float32 | ArrayKind::Float64)
    }
}

#[derive(Debug, Clone)]
enum ArrayData {
    Int8(Vec<i8>),
    UInt8(Vec<u8>),
    Int16(Vec<i16>),
    UInt16(Vec<u16>),
    Int32(Vec<i32>),
    UInt32(Vec<u32>),
    Int64(Vec<i64>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

/// Dense n-dimensional numeric array with row-major byte strides.
#[derive(Debug, Clone)]
pub struct ArrayValue {
    kind: ArrayKind,
    shape: Vec<usize>,
    strides: Vec<usize>,
    data: ArrayData,
}

fn integral(value: &Value) -> Result<i64> {
    match value {
        Value::Integer(n) => Ok(*n),
        Value::Real(r) if r.fract() == 0.0 => Ok(*r as i64),
        other => bail!("expected integer array element, found {}", other.kind_name()),
    }
}

fn real(value: &Value) -> Result<f64> {
    value
        .as_real()
        .ok_or_else(|| anyhow::anyhow!("expected numeric array element, found {}", value.kind_name()))
}

macro_rules! collect_int {
    ($values:expr, $ty:ty) => {
        $values
            .iter()
            .map(|value| {
                let n = integral(value)?;
                <$ty>::try_from(n).map_err(|_| anyhow::anyhow!("{n} does not fit in {}", stringify!($ty)))
            })
            .collect::<Result<Vec<$ty>>>()?
    };
}

impl ArrayValue {
    /// Build from a shape and row-major element values.
    pub fn from_values(kind: ArrayKind, shape: Vec<usize>, values: &[Value]) -> Result<Self> {
        let count: usize = shape.iter().product();
        ensure!(
            count == values.len(),
            "array shape {:?} needs {} values, found {}",
            shape,
            count,
            values.len()
        );
        let data = match kind {
            ArrayKind::Int8 => ArrayData::Int8(collect_int!(values, i8)),
            ArrayKind::UInt8 => ArrayData::UInt8(collect_int!(values, u8)),
            ArrayKind::Int16 => ArrayData::Int16(collect_int!(values, i16)),
            ArrayKind::UInt16 => ArrayData::UInt16(collect_int!(values, u16)),
            ArrayKind::Int32 => ArrayData::Int32(collect_int!(values, i32)),
            ArrayKind::UInt32 => ArrayData::UInt32(collect_int!(values, u32)),
            ArrayKind::Int64 => ArrayData::Int64(collect_int!(values, i64)),
            ArrayKind::UInt64 => ArrayData::UInt64(collect_int!(values, u64)),
            ArrayKind::Float32 => {
                ArrayData::Float32(values.iter().map(|v| real(v).map(|r| r as f32)).collect::<Result<_>>()?)
            }
            ArrayKind::Float64 => ArrayData::Float64(values.iter().map(real).collect::<Result<_>>()?),
        };
        let mut strides = vec![0; shape.len()];
        let mut stride = kind.size();
        for (dim, size) in shape.iter().enumerate().rev() {
            strides[dim] = stride;
            stride *= size;
        }
        Ok(Self {
            kind,
            shape,
            strides,
            data,
        })
    }

    #[inline]
    pub fn kind(&self) -> ArrayKind {
        self.kind
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Byte strides per dimension.
    #[inline]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        let value = match &self.data {
            ArrayData::Int8(v) => Value::Integer(*v.get(index)? as i64),
            ArrayData::UInt8(v) => Value::Integer(*v.get(index)? as i64),
            ArrayData::Int16(v) => Value::Integer(*v.get(index)? as i64),
            ArrayData::UInt16(v) => Value::Integer(*v.get(index)? as i64),
            ArrayData::Int32(v) => Value::Integer(*v.get(index)? as i64),
            ArrayData::UInt32(v) => Value::Integer(*v.get(index)? as i64),
            ArrayData::Int64(v) => Value::Integer(*v.get(index)?),
            ArrayData::UInt64(v) => Value::Integer(*v.get(index)? as i64),
            ArrayData::Float32(v) => Value::Real(*v.get(index)? as f64),
            ArrayData::Float64(v) => Value::Real(*v.get(index)?),
        };
        Some(value)
    }

    /// Row-major element values.
    pub fn values(&self) -> Vec<Value> {
        (0..self.len()).filter_map(|index| self.get(index)).collect()
    }
}

impl fmt::Display for ArrayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<array::{} {:?}>[", self.kind.name(), self.shape)?;
        for (i, value) in self.values().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str("]")
    }
}

//! Typed 2D mask buffers.
//!
//! A mask is indexed `[x, y]`: axis 0 runs along the panel width and axis 1
//! along its height, so a valid mask has shape `resolution_px`.

use half::f16;
use ndarray::{Array2, Axis};
use std::fmt;

/// Element type of a mask buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Signed 8-bit integer.
    I8,
    /// Signed 16-bit integer.
    I16,
    /// Signed 32-bit integer.
    I32,
    /// Signed 64-bit integer.
    I64,
    /// Unsigned 8-bit integer.
    U8,
    /// Unsigned 16-bit integer.
    U16,
    /// Unsigned 32-bit integer.
    U32,
    /// Unsigned 64-bit integer.
    U64,
    /// IEEE half precision float.
    F16,
    /// Single precision float.
    F32,
    /// Double precision float.
    F64,
    /// Boolean.
    Bool,
}

impl ElementKind {
    /// Element kinds the modulator SDKs accept for a displayed mask.
    pub const WHITELIST: [ElementKind; 7] = [
        ElementKind::I8,
        ElementKind::I16,
        ElementKind::I32,
        ElementKind::I64,
        ElementKind::F16,
        ElementKind::F32,
        ElementKind::F64,
    ];

    /// True if the kind may be uploaded.
    pub fn is_whitelisted(self) -> bool {
        Self::WHITELIST.contains(&self)
    }

    /// numpy-style dtype name, e.g. `"float64"`.
    pub fn as_str(self) -> &'static str {
        match self {
            ElementKind::I8 => "int8",
            ElementKind::I16 => "int16",
            ElementKind::I32 => "int32",
            ElementKind::I64 => "int64",
            ElementKind::U8 => "uint8",
            ElementKind::U16 => "uint16",
            ElementKind::U32 => "uint32",
            ElementKind::U64 => "uint64",
            ElementKind::F16 => "float16",
            ElementKind::F32 => "float32",
            ElementKind::F64 => "float64",
            ElementKind::Bool => "bool",
        }
    }

    pub(crate) fn whitelist_display() -> String {
        let names: Vec<&str> = Self::WHITELIST.iter().map(|k| k.as_str()).collect();
        format!("[{}]", names.join(", "))
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 2D pixel buffer tagged with its element kind.
#[derive(Debug, Clone, PartialEq)]
pub enum MaskBuffer {
    /// `i8` elements.
    I8(Array2<i8>),
    /// `i16` elements.
    I16(Array2<i16>),
    /// `i32` elements.
    I32(Array2<i32>),
    /// `i64` elements.
    I64(Array2<i64>),
    /// `u8` elements.
    U8(Array2<u8>),
    /// `u16` elements.
    U16(Array2<u16>),
    /// `u32` elements.
    U32(Array2<u32>),
    /// `u64` elements.
    U64(Array2<u64>),
    /// `f16` elements.
    F16(Array2<f16>),
    /// `f32` elements.
    F32(Array2<f32>),
    /// `f64` elements.
    F64(Array2<f64>),
    /// `bool` elements.
    Bool(Array2<bool>),
}

/// Runs `$body` with `$arr` bound to the inner array of any variant.
macro_rules! with_array {
    ($buf:expr, $arr:ident => $body:expr) => {
        match $buf {
            MaskBuffer::I8($arr) => $body,
            MaskBuffer::I16($arr) => $body,
            MaskBuffer::I32($arr) => $body,
            MaskBuffer::I64($arr) => $body,
            MaskBuffer::U8($arr) => $body,
            MaskBuffer::U16($arr) => $body,
            MaskBuffer::U32($arr) => $body,
            MaskBuffer::U64($arr) => $body,
            MaskBuffer::F16($arr) => $body,
            MaskBuffer::F32($arr) => $body,
            MaskBuffer::F64($arr) => $body,
            MaskBuffer::Bool($arr) => $body,
        }
    };
}

/// Same as `with_array!` but rebuilds the same variant from `$body`.
macro_rules! map_array {
    ($buf:expr, $arr:ident => $body:expr) => {
        match $buf {
            MaskBuffer::I8($arr) => MaskBuffer::I8($body),
            MaskBuffer::I16($arr) => MaskBuffer::I16($body),
            MaskBuffer::I32($arr) => MaskBuffer::I32($body),
            MaskBuffer::I64($arr) => MaskBuffer::I64($body),
            MaskBuffer::U8($arr) => MaskBuffer::U8($body),
            MaskBuffer::U16($arr) => MaskBuffer::U16($body),
            MaskBuffer::U32($arr) => MaskBuffer::U32($body),
            MaskBuffer::U64($arr) => MaskBuffer::U64($body),
            MaskBuffer::F16($arr) => MaskBuffer::F16($body),
            MaskBuffer::F32($arr) => MaskBuffer::F32($body),
            MaskBuffer::F64($arr) => MaskBuffer::F64($body),
            MaskBuffer::Bool($arr) => MaskBuffer::Bool($body),
        }
    };
}

impl MaskBuffer {
    /// All-zero `float64` buffer of the given `(width, height)` shape.
    pub fn zeros(shape: (usize, usize)) -> Self {
        MaskBuffer::F64(Array2::zeros(shape))
    }

    /// Element kind of the buffer.
    pub fn kind(&self) -> ElementKind {
        match self {
            MaskBuffer::I8(_) => ElementKind::I8,
            MaskBuffer::I16(_) => ElementKind::I16,
            MaskBuffer::I32(_) => ElementKind::I32,
            MaskBuffer::I64(_) => ElementKind::I64,
            MaskBuffer::U8(_) => ElementKind::U8,
            MaskBuffer::U16(_) => ElementKind::U16,
            MaskBuffer::U32(_) => ElementKind::U32,
            MaskBuffer::U64(_) => ElementKind::U64,
            MaskBuffer::F16(_) => ElementKind::F16,
            MaskBuffer::F32(_) => ElementKind::F32,
            MaskBuffer::F64(_) => ElementKind::F64,
            MaskBuffer::Bool(_) => ElementKind::Bool,
        }
    }

    /// Shape as `(width, height)`.
    pub fn shape(&self) -> (usize, usize) {
        with_array!(self, a => a.dim())
    }

    /// Copy with axis 0 and/or axis 1 reversed.
    pub fn flipped(&self, flip_x: bool, flip_y: bool) -> Self {
        map_array!(self, a => {
            let mut out = a.clone();
            if flip_x {
                out.invert_axis(Axis(0));
            }
            if flip_y {
                out.invert_axis(Axis(1));
            }
            out
        })
    }

    /// Widen every element to `f64`, the field type the display SDKs take.
    pub fn to_f64(&self) -> Array2<f64> {
        match self {
            MaskBuffer::I8(a) => a.mapv(f64::from),
            MaskBuffer::I16(a) => a.mapv(f64::from),
            MaskBuffer::I32(a) => a.mapv(f64::from),
            MaskBuffer::I64(a) => a.mapv(|v| v as f64),
            MaskBuffer::U8(a) => a.mapv(f64::from),
            MaskBuffer::U16(a) => a.mapv(f64::from),
            MaskBuffer::U32(a) => a.mapv(f64::from),
            MaskBuffer::U64(a) => a.mapv(|v| v as f64),
            MaskBuffer::F16(a) => a.mapv(f16::to_f64),
            MaskBuffer::F32(a) => a.mapv(f64::from),
            MaskBuffer::F64(a) => a.clone(),
            MaskBuffer::Bool(a) => a.mapv(|v| if v { 1.0 } else { 0.0 }),
        }
    }
}

macro_rules! impl_from_array {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Array2<$ty>> for MaskBuffer {
                fn from(array: Array2<$ty>) -> Self {
                    MaskBuffer::$variant(array)
                }
            }
        )*
    };
}

impl_from_array! {
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f16 => F16,
    f32 => F32,
    f64 => F64,
    bool => Bool,
}

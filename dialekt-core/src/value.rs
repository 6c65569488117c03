//! The value interface this core needs from the (external) value system.
//!
//! A `Value` is a typed datum plus an optional lvalue location. Locations
//! are either target memory or a swizzle view into another vector value;
//! swizzle views re-read their parent on every access and scatter on
//! write, so no staleness guarantees are ever offered.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::expr::error::EvalError;
use crate::provider::Provider;
use crate::types::{CharEncoding, Type};

/// One scalar datum, independent of its exact target width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Int(i128),
    Float(f64),
    Bool(bool),
    Complex { re: f64, im: f64 },
}

impl Scalar {
    pub fn as_int(self) -> Option<i128> {
        match self {
            Scalar::Int(v) => Some(v),
            Scalar::Bool(b) => Some(i128::from(b)),
            _ => None,
        }
    }

    pub fn as_float(self) -> Option<f64> {
        match self {
            Scalar::Float(v) => Some(v),
            Scalar::Int(v) => Some(v as f64),
            Scalar::Bool(b) => Some(if b { 1.0 } else { 0.0 }),
            Scalar::Complex { .. } => None,
        }
    }

    pub fn is_nonzero(self) -> bool {
        match self {
            Scalar::Int(v) => v != 0,
            Scalar::Float(v) => v != 0.0,
            Scalar::Bool(b) => b,
            Scalar::Complex { re, im } => re != 0.0 || im != 0.0,
        }
    }
}

/// The payload of a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Contents {
    Scalar(Scalar),
    Pointer(u64),
    /// Per-lane scalars of a vector value, `lanes` entries long even for
    /// 3-lane vectors (padding stays in storage, not here).
    Vector(Vec<Scalar>),
    /// Raw object image for structs, arrays and string literals.
    Bytes(Vec<u8>),
    /// A type used as a value (`sizeof` operands, cast sources).
    NoData,
}

/// Where an addressable value lives.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    /// A byte address in target memory.
    Memory(u64),
    /// A view of selected lanes of a parent vector. Only constructed
    /// when the parent is itself addressable and the lane list has no
    /// duplicates.
    Swizzle { parent: Box<Value>, lanes: Vec<u32> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    ty: Type,
    contents: Contents,
    location: Option<Location>,
}

impl Value {
    pub fn new(ty: Type, contents: Contents) -> Value {
        Value {
            ty,
            contents,
            location: None,
        }
    }

    pub fn from_int(ty: Type, v: i128) -> Value {
        Value::new(ty, Contents::Scalar(Scalar::Int(v)))
    }

    pub fn from_float(ty: Type, v: f64) -> Value {
        Value::new(ty, Contents::Scalar(Scalar::Float(v)))
    }

    pub fn from_bool(v: bool) -> Value {
        Value::new(Type::Bool, Contents::Scalar(Scalar::Bool(v)))
    }

    pub fn from_complex(ty: Type, re: f64, im: f64) -> Value {
        Value::new(ty, Contents::Scalar(Scalar::Complex { re, im }))
    }

    pub fn from_pointer(ty: Type, addr: u64) -> Value {
        Value::new(ty, Contents::Pointer(addr))
    }

    pub fn from_vector(ty: Type, lanes: Vec<Scalar>) -> Value {
        Value::new(ty, Contents::Vector(lanes))
    }

    pub fn from_bytes(ty: Type, bytes: Vec<u8>) -> Value {
        Value::new(ty, Contents::Bytes(bytes))
    }

    /// A value denoting a type itself (no data).
    pub fn of_type(ty: Type) -> Value {
        Value::new(ty, Contents::NoData)
    }

    /// Read an object of type `ty` from target memory and remember its
    /// address so the result is an lvalue.
    pub fn read(provider: &dyn Provider, ty: Type, addr: u64) -> Result<Value, EvalError> {
        let len = ty.size_of() as usize;
        let bytes = provider.read_memory(addr, len)?;
        let contents = decode(&ty, &bytes)?;
        Ok(Value {
            ty,
            contents,
            location: Some(Location::Memory(addr)),
        })
    }

    pub fn with_location(mut self, location: Location) -> Value {
        self.location = Some(location);
        self
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn contents(&self) -> &Contents {
        &self.contents
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn is_lvalue(&self) -> bool {
        self.location.is_some()
    }

    /// The address of a memory-resident value.
    pub fn address(&self) -> Option<u64> {
        match self.location {
            Some(Location::Memory(addr)) => Some(addr),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i128> {
        match &self.contents {
            Contents::Scalar(s) => s.as_int(),
            Contents::Pointer(p) => Some(*p as i128),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match &self.contents {
            Contents::Scalar(s) => s.as_float(),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<Scalar> {
        match &self.contents {
            Contents::Scalar(s) => Some(*s),
            Contents::Pointer(p) => Some(Scalar::Int(*p as i128)),
            _ => None,
        }
    }

    pub fn lanes(&self) -> Option<&[Scalar]> {
        match &self.contents {
            Contents::Vector(v) => Some(v),
            _ => None,
        }
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.contents {
            Contents::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Re-fetch this value through its location. Memory values re-read
    /// target memory; swizzle views re-fetch the parent and gather the
    /// selected lanes fresh. Pure rvalues are returned as-is.
    pub fn refetch(&self, provider: &dyn Provider) -> Result<Value, EvalError> {
        match &self.location {
            Some(Location::Memory(addr)) => {
                let len = self.ty.size_of() as usize;
                let bytes = provider.read_memory(*addr, len)?;
                Ok(Value {
                    ty: self.ty.clone(),
                    contents: decode(&self.ty, &bytes)?,
                    location: self.location.clone(),
                })
            }
            Some(Location::Swizzle { parent, lanes }) => {
                let fresh = parent.refetch(provider)?;
                let src = fresh.lanes().ok_or_else(|| {
                    EvalError::VectorBounds {
                        type_name: fresh.ty().display_name(),
                    }
                })?;
                let mut gathered = Vec::with_capacity(lanes.len());
                for &i in lanes {
                    let s = src.get(i as usize).ok_or_else(|| EvalError::VectorBounds {
                        type_name: fresh.ty().display_name(),
                    })?;
                    gathered.push(*s);
                }
                let contents = if gathered.len() == 1 {
                    Contents::Scalar(gathered[0])
                } else {
                    Contents::Vector(gathered)
                };
                Ok(Value {
                    ty: self.ty.clone(),
                    contents,
                    location: self.location.clone(),
                })
            }
            None => Ok(self.clone()),
        }
    }

    /// Store `new` into this value's location, converting to this
    /// value's type width. Swizzle targets scatter lane-by-lane into a
    /// freshly read parent and write the parent back.
    pub fn assign(&self, provider: &dyn Provider, new: &Value) -> Result<(), EvalError> {
        match &self.location {
            None => Err(EvalError::NotAnLvalue),
            Some(Location::Memory(addr)) => {
                let converted = convert_for_store(&self.ty, new)?;
                let bytes = encode(&self.ty, &converted)?;
                provider.write_memory(*addr, &bytes)
            }
            Some(Location::Swizzle { parent, lanes }) => {
                let fresh = parent.refetch(provider)?;
                let mut dst = fresh
                    .lanes()
                    .ok_or_else(|| EvalError::VectorBounds {
                        type_name: fresh.ty().display_name(),
                    })?
                    .to_vec();
                let src: Vec<Scalar> = if lanes.len() == 1 {
                    let s = new.as_scalar().ok_or(EvalError::NotArithmetic)?;
                    vec![s]
                } else {
                    new.lanes()
                        .ok_or(EvalError::NotArithmetic)?
                        .to_vec()
                };
                if src.len() != lanes.len() {
                    return Err(EvalError::VectorBounds {
                        type_name: self.ty.display_name(),
                    });
                }
                for (slot, s) in lanes.iter().zip(src) {
                    let slot = *slot as usize;
                    if slot >= dst.len() {
                        return Err(EvalError::VectorBounds {
                            type_name: fresh.ty().display_name(),
                        });
                    }
                    dst[slot] = s;
                }
                let updated = Value::from_vector(fresh.ty().clone(), dst);
                parent.assign(provider, &updated)
            }
        }
    }
}

/// Convert `new` so it can be stored into an object of type `ty`.
fn convert_for_store(ty: &Type, new: &Value) -> Result<Contents, EvalError> {
    let target = ty.unqualified();
    match target {
        Type::Vector { lanes, .. } => {
            let src = new.lanes().ok_or(EvalError::NotArithmetic)?;
            if src.len() != *lanes as usize {
                return Err(EvalError::VectorBounds {
                    type_name: ty.display_name(),
                });
            }
            Ok(Contents::Vector(src.to_vec()))
        }
        Type::Pointer { .. } => {
            let v = new.as_int().ok_or(EvalError::NotArithmetic)?;
            Ok(Contents::Pointer(v as u64))
        }
        _ if target.is_float() => {
            let v = new.as_float().ok_or(EvalError::NotArithmetic)?;
            Ok(Contents::Scalar(Scalar::Float(v)))
        }
        _ if target.is_integer() => {
            let v = new.as_int().ok_or(EvalError::NotArithmetic)?;
            Ok(Contents::Scalar(Scalar::Int(v)))
        }
        _ => match new.contents() {
            Contents::Bytes(b) => Ok(Contents::Bytes(b.clone())),
            other => Ok(other.clone()),
        },
    }
}

/// Decode a little-endian object image into contents for `ty`.
pub fn decode(ty: &Type, bytes: &[u8]) -> Result<Contents, EvalError> {
    let t = ty.unqualified();
    let need = t.size_of() as usize;
    if bytes.len() < need {
        return Err(EvalError::Internal(format!(
            "short read: {} bytes for {}",
            bytes.len(),
            ty.display_name()
        )));
    }
    match t {
        Type::Bool => Ok(Contents::Scalar(Scalar::Bool(bytes[0] != 0))),
        Type::Int { bits, signed, .. } => {
            Ok(Contents::Scalar(Scalar::Int(decode_int(
                &bytes[..(*bits / 8) as usize],
                *signed,
            ))))
        }
        Type::Char { encoding } => Ok(Contents::Scalar(Scalar::Int(decode_int(
            &bytes[..encoding.unit_size() as usize],
            true,
        )))),
        Type::Enum { bits, .. } => Ok(Contents::Scalar(Scalar::Int(decode_int(
            &bytes[..(*bits / 8) as usize],
            true,
        )))),
        Type::Float { bits, .. } | Type::DecimalFloat { bits, .. } => {
            let v = match bits {
                32 => f64::from(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
                _ => f64::from_le_bytes([
                    bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
                ]),
            };
            Ok(Contents::Scalar(Scalar::Float(v)))
        }
        Type::Complex { component } => {
            let half = component.size_of() as usize;
            let re = scalar_float(component, &bytes[..half])?;
            let im = scalar_float(component, &bytes[half..half * 2])?;
            Ok(Contents::Scalar(Scalar::Complex { re, im }))
        }
        Type::Pointer { .. } | Type::Function { .. } | Type::Reference { .. } => {
            Ok(Contents::Pointer(u64::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ])))
        }
        Type::Vector { element, lanes } => {
            let stride = element.size_of() as usize;
            let mut out = Vec::with_capacity(*lanes as usize);
            for i in 0..*lanes as usize {
                let chunk = &bytes[i * stride..(i + 1) * stride];
                match decode(element, chunk)? {
                    Contents::Scalar(s) => out.push(s),
                    _ => {
                        return Err(EvalError::VectorBounds {
                            type_name: ty.display_name(),
                        })
                    }
                }
            }
            Ok(Contents::Vector(out))
        }
        _ => Ok(Contents::Bytes(bytes[..need].to_vec())),
    }
}

fn decode_int(bytes: &[u8], signed: bool) -> i128 {
    let mut v: u128 = 0;
    for (i, b) in bytes.iter().enumerate() {
        v |= u128::from(*b) << (8 * i);
    }
    if signed && !bytes.is_empty() {
        let sign_bit = 1u128 << (bytes.len() * 8 - 1);
        if v & sign_bit != 0 {
            let mask = (!0u128) << (bytes.len() * 8);
            return (v | mask) as i128;
        }
    }
    v as i128
}

fn scalar_float(ty: &Type, bytes: &[u8]) -> Result<f64, EvalError> {
    match decode(ty, bytes)? {
        Contents::Scalar(s) => s.as_float().ok_or(EvalError::NotArithmetic),
        _ => Err(EvalError::NotArithmetic),
    }
}

/// Encode contents into the little-endian object image of `ty`.
pub fn encode(ty: &Type, contents: &Contents) -> Result<Vec<u8>, EvalError> {
    let t = ty.unqualified();
    match (t, contents) {
        (Type::Bool, Contents::Scalar(s)) => Ok(vec![u8::from(s.is_nonzero())]),
        (Type::Int { bits, .. }, Contents::Scalar(s)) => {
            let v = s.as_int().ok_or(EvalError::NotArithmetic)?;
            Ok(encode_int(v, (*bits / 8) as usize))
        }
        (Type::Char { encoding }, Contents::Scalar(s)) => {
            let v = s.as_int().ok_or(EvalError::NotArithmetic)?;
            Ok(encode_int(v, encoding.unit_size() as usize))
        }
        (Type::Enum { bits, .. }, Contents::Scalar(s)) => {
            let v = s.as_int().ok_or(EvalError::NotArithmetic)?;
            Ok(encode_int(v, (*bits / 8) as usize))
        }
        (Type::Float { bits, .. }, Contents::Scalar(s))
        | (Type::DecimalFloat { bits, .. }, Contents::Scalar(s)) => {
            let v = s.as_float().ok_or(EvalError::NotArithmetic)?;
            Ok(match bits {
                32 => (v as f32).to_le_bytes().to_vec(),
                _ => v.to_le_bytes().to_vec(),
            })
        }
        (Type::Complex { component }, Contents::Scalar(Scalar::Complex { re, im })) => {
            let mut out = encode(component, &Contents::Scalar(Scalar::Float(*re)))?;
            out.extend(encode(component, &Contents::Scalar(Scalar::Float(*im)))?);
            Ok(out)
        }
        (Type::Pointer { .. }, Contents::Pointer(p))
        | (Type::Reference { .. }, Contents::Pointer(p)) => Ok(p.to_le_bytes().to_vec()),
        (Type::Vector { element, lanes }, Contents::Vector(vals)) => {
            if vals.len() != *lanes as usize {
                return Err(EvalError::VectorBounds {
                    type_name: ty.display_name(),
                });
            }
            let stride = element.size_of() as usize;
            let stored = if *lanes == 3 { 4usize } else { *lanes as usize };
            let mut out = vec![0u8; stride * stored];
            for (i, s) in vals.iter().enumerate() {
                let chunk = encode(element, &Contents::Scalar(*s))?;
                out[i * stride..i * stride + stride].copy_from_slice(&chunk);
            }
            Ok(out)
        }
        (_, Contents::Bytes(b)) => Ok(b.clone()),
        _ => Err(EvalError::Internal(format!(
            "cannot encode {} contents",
            ty.display_name()
        ))),
    }
}

fn encode_int(v: i128, len: usize) -> Vec<u8> {
    let raw = (v as u128).to_le_bytes();
    raw[..len].to_vec()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.contents {
            Contents::Scalar(Scalar::Int(v)) => {
                if matches!(self.ty.unqualified(), Type::Char { .. }) {
                    if let Some(c) = u32::try_from(*v).ok().and_then(char::from_u32) {
                        return write!(f, "'{}'", c);
                    }
                }
                write!(f, "{}", v)
            }
            Contents::Scalar(Scalar::Float(v)) => write!(f, "{}", v),
            Contents::Scalar(Scalar::Bool(b)) => write!(f, "{}", b),
            Contents::Scalar(Scalar::Complex { re, im }) => write!(f, "{} + {}i", re, im),
            Contents::Pointer(p) => write!(f, "0x{:x}", p),
            Contents::Vector(lanes) => {
                write!(f, "{{")?;
                for (i, s) in lanes.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match s {
                        Scalar::Int(v) => write!(f, "{}", v)?,
                        Scalar::Float(v) => write!(f, "{}", v)?,
                        Scalar::Bool(b) => write!(f, "{}", b)?,
                        Scalar::Complex { re, im } => write!(f, "{} + {}i", re, im)?,
                    }
                }
                write!(f, "}}")
            }
            Contents::Bytes(b) => {
                if let Type::Array { element, .. } = self.ty.unqualified() {
                    if matches!(element.unqualified(), Type::Char { .. }) {
                        let text: String = b
                            .iter()
                            .take_while(|&&c| c != 0)
                            .map(|&c| c as char)
                            .collect();
                        return write!(f, "\"{}\"", text);
                    }
                }
                write!(f, "<{} bytes>", b.len())
            }
            Contents::NoData => write!(f, "{}", self.ty.display_name()),
        }
    }
}

/// Interpret the scratch-buffer form of a scanned string literal: simple
/// escapes were already resolved to single bytes by the lexer; hex,
/// octal and universal-character-name escapes were passed through
/// verbatim and are decoded here.
pub fn decode_escapes(bytes: &[u8], encoding: CharEncoding) -> Vec<u8> {
    let _ = encoding;
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() {
            match bytes[i + 1] {
                b'x' => {
                    let mut j = i + 2;
                    let mut v: u32 = 0;
                    while j < bytes.len() && (bytes[j] as char).is_ascii_hexdigit() {
                        v = v.wrapping_mul(16) + (bytes[j] as char).to_digit(16).unwrap();
                        j += 1;
                    }
                    out.push(v as u8);
                    i = j;
                    continue;
                }
                b'0'..=b'7' => {
                    let mut j = i + 1;
                    let mut v: u32 = 0;
                    while j < bytes.len() && j < i + 4 && (b'0'..=b'7').contains(&bytes[j]) {
                        v = v * 8 + u32::from(bytes[j] - b'0');
                        j += 1;
                    }
                    out.push(v as u8);
                    i = j;
                    continue;
                }
                b'u' | b'U' => {
                    let digits = if bytes[i + 1] == b'u' { 4 } else { 8 };
                    let mut v: u32 = 0;
                    let mut j = i + 2;
                    for _ in 0..digits {
                        if j < bytes.len() {
                            v = v.wrapping_mul(16)
                                + (bytes[j] as char).to_digit(16).unwrap_or(0);
                            j += 1;
                        }
                    }
                    if let Some(c) = char::from_u32(v) {
                        let mut buf = [0u8; 4];
                        out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                    }
                    i = j;
                    continue;
                }
                other => {
                    out.push(other);
                    i += 2;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_round_trip() {
        let ty = Type::int();
        let bytes = encode(&ty, &Contents::Scalar(Scalar::Int(-7))).unwrap();
        assert_eq!(bytes, vec![0xf9, 0xff, 0xff, 0xff]);
        assert_eq!(decode(&ty, &bytes).unwrap(), Contents::Scalar(Scalar::Int(-7)));
    }

    #[test]
    fn vec3_encodes_with_padding_lane() {
        let ty = Type::vector(Type::int(), 3);
        let bytes = encode(
            &ty,
            &Contents::Vector(vec![Scalar::Int(1), Scalar::Int(2), Scalar::Int(3)]),
        )
        .unwrap();
        assert_eq!(bytes.len(), 16);
        let back = decode(&ty, &bytes).unwrap();
        assert_eq!(
            back,
            Contents::Vector(vec![Scalar::Int(1), Scalar::Int(2), Scalar::Int(3)])
        );
    }

    #[test]
    fn unsigned_decode_does_not_sign_extend() {
        let ty = Type::unsigned_char();
        assert_eq!(decode(&ty, &[0xff]).unwrap(), Contents::Scalar(Scalar::Int(255)));
        let st = Type::signed_char();
        assert_eq!(decode(&st, &[0xff]).unwrap(), Contents::Scalar(Scalar::Int(-1)));
    }

    #[test]
    fn escape_decoding() {
        assert_eq!(decode_escapes(b"a\\x41b", CharEncoding::Narrow), b"aAb");
        assert_eq!(decode_escapes(b"\\101", CharEncoding::Narrow), b"A");
    }

    #[test]
    fn display_char_and_int() {
        assert_eq!(format!("{}", Value::from_int(Type::int(), 42)), "42");
        assert_eq!(format!("{}", Value::from_int(Type::char(), 65)), "'A'");
    }
}

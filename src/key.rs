//! Cache Key Module
//!
//! Canonicalizes call arguments into deterministic, collision-free cache
//! keys. Positional components are encoded in call order; named components
//! are encoded after a delimiter, sorted by name, so that the order in which
//! they were supplied never changes the key.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{Result, UnhashableArgumentError};

// Type tags framing every encoded component. Each component is a tag byte
// followed by a fixed-size or length-prefixed payload, which makes the
// concatenated encoding injective.
const TAG_UNIT: u8 = 0x01;
const TAG_BOOL: u8 = 0x02;
const TAG_INT: u8 = 0x03;
const TAG_WIDE_UINT: u8 = 0x04;
const TAG_FLOAT: u8 = 0x05;
const TAG_CHAR: u8 = 0x06;
const TAG_STR: u8 = 0x07;
const TAG_NONE: u8 = 0x08;
const TAG_SOME: u8 = 0x09;
const TAG_SEQ: u8 = 0x0A;
const TAG_TUPLE: u8 = 0x0B;
const TAG_MAP: u8 = 0x0C;
const TAG_SET: u8 = 0x0D;
const TAG_DELIMITER: u8 = 0x0E;
const TAG_NAME: u8 = 0x0F;

// == Cache Key ==
/// A canonical, owned encoding of one call's arguments.
///
/// Two calls produce equal keys exactly when their canonicalized arguments
/// are identical. The key hashes and compares by its full encoding, so
/// distinct argument lists can never collide. The encoding is an in-memory
/// representation, not a wire format.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(Vec<u8>);

impl CacheKey {
    /// The canonical encoding backing this key.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({} bytes)", self.0.len())
    }
}

// == Key Encoder ==
/// Low-level writer for canonical key bytes.
///
/// Scalar writers emit a tag and payload. Composite writers (`begin_*`)
/// emit a tag and element count; the elements follow, each self-framed, so
/// no terminator is needed.
#[derive(Debug, Default)]
pub struct KeyEncoder {
    buf: Vec<u8>,
}

impl KeyEncoder {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    fn tag(&mut self, tag: u8) {
        self.buf.push(tag);
    }

    fn len_prefix(&mut self, len: usize) {
        self.buf.extend_from_slice(&(len as u64).to_be_bytes());
    }

    /// Writes the unit value.
    pub fn write_unit(&mut self) {
        self.tag(TAG_UNIT);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.tag(TAG_BOOL);
        self.buf.push(value as u8);
    }

    /// Writes a signed integer. All integer widths are widened to this
    /// common encoding, so `1u8` and `1i64` canonicalize identically.
    pub fn write_int(&mut self, value: i128) {
        self.tag(TAG_INT);
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Writes an unsigned integer, sharing the signed encoding for every
    /// value that fits in it.
    pub fn write_uint(&mut self, value: u128) {
        if let Ok(v) = i128::try_from(value) {
            self.write_int(v);
        } else {
            self.tag(TAG_WIDE_UINT);
            self.buf.extend_from_slice(&value.to_be_bytes());
        }
    }

    /// Writes a float. NaN has no canonical form (it compares unequal to
    /// itself, so a cached entry could never be looked up again) and is
    /// rejected. Negative zero normalizes to zero.
    pub fn write_float(&mut self, value: f64) -> Result<()> {
        if value.is_nan() {
            return Err(UnhashableArgumentError::new(
                &value,
                "NaN compares unequal to itself",
            ));
        }
        let normalized = if value == 0.0 { 0.0 } else { value };
        self.tag(TAG_FLOAT);
        self.buf.extend_from_slice(&normalized.to_bits().to_be_bytes());
        Ok(())
    }

    pub fn write_char(&mut self, value: char) {
        self.tag(TAG_CHAR);
        self.buf.extend_from_slice(&(value as u32).to_be_bytes());
    }

    pub fn write_str(&mut self, value: &str) {
        self.tag(TAG_STR);
        self.len_prefix(value.len());
        self.buf.extend_from_slice(value.as_bytes());
    }

    /// Writes the absent variant of an optional value.
    pub fn write_none(&mut self) {
        self.tag(TAG_NONE);
    }

    /// Writes the present-variant marker; the inner value follows.
    pub fn write_some(&mut self) {
        self.tag(TAG_SOME);
    }

    /// Starts an ordered sequence of `len` elements.
    pub fn begin_seq(&mut self, len: usize) {
        self.tag(TAG_SEQ);
        self.len_prefix(len);
    }

    /// Starts a tuple of `arity` elements. Tuples and sequences encode
    /// distinctly so `(1, 2)` and `vec![1, 2]` derive different keys.
    pub fn begin_tuple(&mut self, arity: usize) {
        self.tag(TAG_TUPLE);
        self.len_prefix(arity);
    }

    /// Starts a map of `len` key/value pairs, which must already be in
    /// canonical (sorted) order.
    pub fn begin_map(&mut self, len: usize) {
        self.tag(TAG_MAP);
        self.len_prefix(len);
    }

    /// Starts a set of `len` elements, which must already be in canonical
    /// (sorted) order.
    pub fn begin_set(&mut self, len: usize) {
        self.tag(TAG_SET);
        self.len_prefix(len);
    }

    fn delimiter(&mut self) {
        self.tag(TAG_DELIMITER);
    }

    fn name(&mut self, name: &str) {
        self.tag(TAG_NAME);
        self.len_prefix(name.len());
        self.buf.extend_from_slice(name.as_bytes());
    }

    fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

// == Key Part ==
/// Types that can contribute to cache key derivation.
///
/// Encoding is fallible: values without a canonical form must return an
/// [`UnhashableArgumentError`] rather than encode something ambiguous.
/// Unordered collections (`HashMap`, `HashSet`) have no implementation
/// because their iteration order is nondeterministic; callers must convert
/// to an ordered form (`BTreeMap`, `BTreeSet`, or a sorted `Vec`) first.
///
/// # Example
///
/// ```
/// use memocache::key::{KeyEncoder, KeyPart};
/// use memocache::Result;
///
/// struct Point {
///     x: i64,
///     y: i64,
/// }
///
/// impl KeyPart for Point {
///     fn encode(&self, enc: &mut KeyEncoder) -> Result<()> {
///         enc.begin_tuple(2);
///         self.x.encode(enc)?;
///         self.y.encode(enc)
///     }
/// }
/// ```
pub trait KeyPart {
    /// Appends this value's canonical encoding to `enc`.
    fn encode(&self, enc: &mut KeyEncoder) -> Result<()>;
}

impl KeyPart for () {
    fn encode(&self, enc: &mut KeyEncoder) -> Result<()> {
        enc.write_unit();
        Ok(())
    }
}

impl KeyPart for bool {
    fn encode(&self, enc: &mut KeyEncoder) -> Result<()> {
        enc.write_bool(*self);
        Ok(())
    }
}

impl KeyPart for char {
    fn encode(&self, enc: &mut KeyEncoder) -> Result<()> {
        enc.write_char(*self);
        Ok(())
    }
}

macro_rules! impl_key_part_for_int {
    ($($ty:ty),*) => {
        $(
            impl KeyPart for $ty {
                fn encode(&self, enc: &mut KeyEncoder) -> Result<()> {
                    enc.write_int(*self as i128);
                    Ok(())
                }
            }
        )*
    };
}

impl_key_part_for_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, usize);

impl KeyPart for u128 {
    fn encode(&self, enc: &mut KeyEncoder) -> Result<()> {
        enc.write_uint(*self);
        Ok(())
    }
}

impl KeyPart for f32 {
    fn encode(&self, enc: &mut KeyEncoder) -> Result<()> {
        if self.is_nan() {
            return Err(UnhashableArgumentError::new(
                self,
                "NaN compares unequal to itself",
            ));
        }
        enc.write_float(f64::from(*self))
    }
}

impl KeyPart for f64 {
    fn encode(&self, enc: &mut KeyEncoder) -> Result<()> {
        enc.write_float(*self)
    }
}

impl KeyPart for str {
    fn encode(&self, enc: &mut KeyEncoder) -> Result<()> {
        enc.write_str(self);
        Ok(())
    }
}

impl KeyPart for String {
    fn encode(&self, enc: &mut KeyEncoder) -> Result<()> {
        enc.write_str(self);
        Ok(())
    }
}

impl<T: KeyPart + ?Sized> KeyPart for &T {
    fn encode(&self, enc: &mut KeyEncoder) -> Result<()> {
        (**self).encode(enc)
    }
}

impl<T: KeyPart + ?Sized> KeyPart for Box<T> {
    fn encode(&self, enc: &mut KeyEncoder) -> Result<()> {
        (**self).encode(enc)
    }
}

impl<T: KeyPart> KeyPart for Option<T> {
    fn encode(&self, enc: &mut KeyEncoder) -> Result<()> {
        match self {
            Some(value) => {
                enc.write_some();
                value.encode(enc)
            }
            None => {
                enc.write_none();
                Ok(())
            }
        }
    }
}

impl<T: KeyPart> KeyPart for [T] {
    fn encode(&self, enc: &mut KeyEncoder) -> Result<()> {
        enc.begin_seq(self.len());
        for item in self {
            item.encode(enc)?;
        }
        Ok(())
    }
}

impl<T: KeyPart, const N: usize> KeyPart for [T; N] {
    fn encode(&self, enc: &mut KeyEncoder) -> Result<()> {
        self.as_slice().encode(enc)
    }
}

impl<T: KeyPart> KeyPart for Vec<T> {
    fn encode(&self, enc: &mut KeyEncoder) -> Result<()> {
        self.as_slice().encode(enc)
    }
}

impl<K: KeyPart, V: KeyPart> KeyPart for BTreeMap<K, V> {
    fn encode(&self, enc: &mut KeyEncoder) -> Result<()> {
        enc.begin_map(self.len());
        for (key, value) in self {
            key.encode(enc)?;
            value.encode(enc)?;
        }
        Ok(())
    }
}

impl<T: KeyPart> KeyPart for BTreeSet<T> {
    fn encode(&self, enc: &mut KeyEncoder) -> Result<()> {
        enc.begin_set(self.len());
        for item in self {
            item.encode(enc)?;
        }
        Ok(())
    }
}

macro_rules! impl_key_part_for_tuple {
    ($arity:expr; $($ty:ident => $idx:tt),+) => {
        impl<$($ty: KeyPart),+> KeyPart for ($($ty,)+) {
            fn encode(&self, enc: &mut KeyEncoder) -> Result<()> {
                enc.begin_tuple($arity);
                $(self.$idx.encode(enc)?;)+
                Ok(())
            }
        }
    };
}

impl_key_part_for_tuple!(1; T1 => 0);
impl_key_part_for_tuple!(2; T1 => 0, T2 => 1);
impl_key_part_for_tuple!(3; T1 => 0, T2 => 1, T3 => 2);
impl_key_part_for_tuple!(4; T1 => 0, T2 => 1, T3 => 2, T4 => 3);
impl_key_part_for_tuple!(5; T1 => 0, T2 => 1, T3 => 2, T4 => 3, T5 => 4);
impl_key_part_for_tuple!(6; T1 => 0, T2 => 1, T3 => 2, T4 => 3, T5 => 4, T6 => 5);
impl_key_part_for_tuple!(7; T1 => 0, T2 => 1, T3 => 2, T4 => 3, T5 => 4, T6 => 5, T7 => 6);
impl_key_part_for_tuple!(8; T1 => 0, T2 => 1, T3 => 2, T4 => 3, T5 => 4, T6 => 5, T7 => 6, T8 => 7);

// == Key Builder ==
/// Assembles a [`CacheKey`] from positional and named components.
///
/// Positional components are order-sensitive. Named components are
/// order-insensitive: the finished key lists them sorted by name, and a
/// later write to an existing name replaces the earlier value. The two
/// sections are separated by a delimiter so a positional component can
/// never be mistaken for a named one.
///
/// # Example
///
/// ```
/// use memocache::key::KeyBuilder;
///
/// let mut a = KeyBuilder::new();
/// a.named("region", &"us-east")?.named("limit", &25u32)?;
///
/// let mut b = KeyBuilder::new();
/// b.named("limit", &25u32)?.named("region", &"us-east")?;
///
/// assert_eq!(a.finish(), b.finish());
/// # memocache::Result::Ok(())
/// ```
#[derive(Debug, Default)]
pub struct KeyBuilder {
    positional: KeyEncoder,
    named: BTreeMap<String, Vec<u8>>,
}

impl KeyBuilder {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Positional ==
    /// Appends a positional component. Order matters.
    pub fn positional<T: KeyPart + ?Sized>(&mut self, value: &T) -> Result<&mut Self> {
        value.encode(&mut self.positional)?;
        Ok(self)
    }

    // == Named ==
    /// Adds a named component. Insertion order does not matter; writing the
    /// same name twice keeps the later value.
    pub fn named<T: KeyPart + ?Sized>(&mut self, name: &str, value: &T) -> Result<&mut Self> {
        let mut enc = KeyEncoder::new();
        value.encode(&mut enc)?;
        self.named.insert(name.to_string(), enc.into_bytes());
        Ok(self)
    }

    // == Finish ==
    /// Produces the canonical key: positional components in order, the
    /// delimiter, then named components sorted by name.
    pub fn finish(self) -> CacheKey {
        let mut enc = self.positional;
        enc.delimiter();
        for (name, encoded) in self.named {
            enc.name(&name);
            enc.buf.extend_from_slice(&encoded);
        }
        CacheKey(enc.into_bytes())
    }
}

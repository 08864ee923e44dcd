//! Named sub-ranges of packed option words.
//!
//! Many BIFF records pack several small fields into one `u16`/`u32`. A [`BitField`] names one of
//! those ranges by its mask; reads shift the masked bits down, writes shift the new value up and
//! leave every bit outside the mask untouched.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BitField {
    mask: u32,
    shift: u32,
}

impl BitField {
    pub const fn new(mask: u32) -> Self {
        let shift = if mask == 0 { 0 } else { mask.trailing_zeros() };
        Self { mask, shift }
    }

    pub const fn mask(self) -> u32 {
        self.mask
    }

    /// Largest value the field can hold.
    pub const fn max_value(self) -> u32 {
        self.mask >> self.shift
    }

    pub const fn value(self, holder: u32) -> u32 {
        (holder & self.mask) >> self.shift
    }

    /// True if any bit of the field is set.
    pub const fn is_set(self, holder: u32) -> bool {
        holder & self.mask != 0
    }

    pub const fn is_all_set(self, holder: u32) -> bool {
        holder & self.mask == self.mask
    }

    /// Replace the field with `value`. Bits of `value` that do not fit the field are dropped.
    pub const fn set_value(self, holder: u32, value: u32) -> u32 {
        (holder & !self.mask) | ((value << self.shift) & self.mask)
    }

    pub const fn set(self, holder: u32) -> u32 {
        holder | self.mask
    }

    pub const fn clear(self, holder: u32) -> u32 {
        holder & !self.mask
    }

    pub const fn set_bool(self, holder: u32, flag: bool) -> u32 {
        if flag {
            self.set(holder)
        } else {
            self.clear(holder)
        }
    }

    pub const fn overlaps(self, other: BitField) -> bool {
        self.mask & other.mask != 0
    }
}

/// Boolean getter/setter pairs over a packed integer field of `self`.
macro_rules! flag_accessors {
    ($field:ident: $holder:ty; $( $(#[$meta:meta])* $get:ident, $set:ident => $bf:expr; )*) => {
        $(
            $(#[$meta])*
            pub fn $get(&self) -> bool {
                $bf.is_set(u32::from(self.$field))
            }

            pub fn $set(&mut self, value: bool) {
                self.$field = $bf.set_bool(u32::from(self.$field), value) as $holder;
            }
        )*
    };
}

/// Multi-bit getter/setter pairs over a packed integer field of `self`.
macro_rules! value_accessors {
    ($field:ident: $holder:ty; $( $(#[$meta:meta])* $get:ident, $set:ident => $bf:expr, $ty:ty; )*) => {
        $(
            $(#[$meta])*
            pub fn $get(&self) -> $ty {
                $bf.value(u32::from(self.$field)) as $ty
            }

            pub fn $set(&mut self, value: $ty) {
                self.$field = $bf.set_value(u32::from(self.$field), u32::from(value)) as $holder;
            }
        )*
    };
}

pub(crate) use {flag_accessors, value_accessors};

/// Panics unless every pair of `fields` is disjoint and writing each one at its maximum value
/// leaves every other field reading zero.
#[cfg(test)]
pub(crate) fn assert_fields_isolated(fields: &[BitField]) {
    for (i, a) in fields.iter().enumerate() {
        let written = a.set_value(0, a.max_value());
        assert_eq!(a.value(written), a.max_value(), "mask {:#x}", a.mask());
        for (j, b) in fields.iter().enumerate() {
            if i == j {
                continue;
            }
            assert!(!a.overlaps(*b), "masks {:#x} and {:#x} overlap", a.mask(), b.mask());
            assert_eq!(b.value(written), 0, "writing {:#x} leaked into {:#x}", a.mask(), b.mask());
            // Clearing `a` on a word with every bit set must not disturb `b`.
            let cleared = a.set_value(u32::MAX, 0);
            assert_eq!(b.value(cleared), b.max_value());
        }
    }
}

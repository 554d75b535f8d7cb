//! Purpose: Define the opaque 64-bit token handed to the host for each live object.
//! Exports: `Handle`, `TypeTag`, `ID_BITS`, `MAX_ID`.
//! Role: Packing/unpacking of `(type tag, identifier)`; no ownership or lookup here.
//! Invariants: Bits 63..48 hold the type tag, bits 47..0 the identifier.
//! Invariants: Tag 0 and identifier 0 are never issued, so token 0 is never valid.
use std::fmt;

use serde::{Deserialize, Serialize};

pub const ID_BITS: u32 = 48;
pub const MAX_ID: u64 = (1 << ID_BITS) - 1;

/// Registry-wide discriminator for a managed value type.
pub type TypeTag = u16;

/// Opaque token naming one registered object.
///
/// The raw value is stable for the lifetime of the object and is what the
/// host stores (as a uint64 scalar). Decoding a token never touches memory;
/// only the registry can say whether it names something live.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(u64);

impl Handle {
    pub(crate) fn pack(tag: TypeTag, id: u64) -> Self {
        debug_assert!(id <= MAX_ID);
        Self(((tag as u64) << ID_BITS) | (id & MAX_ID))
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn into_raw(self) -> u64 {
        self.0
    }

    pub fn tag(self) -> TypeTag {
        (self.0 >> ID_BITS) as TypeTag
    }

    pub fn id(self) -> u64 {
        self.0 & MAX_ID
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}:{}", self.tag(), self.id())
    }
}

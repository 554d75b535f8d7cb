//! Purpose: Own every native object reachable from the host and control its lifetime.
//! Exports: `Registry`, `Managed`, `TeardownPolicy`, `TeardownReport`.
//! Role: Sole authority for minting, resolving, and releasing handles.
//! Invariants: Identifiers increase monotonically and are never reused by a registry.
//! Invariants: A token is verified (tag, identifier, stored tag, type) before any use.
//! Invariants: Each entry is dropped exactly once, by `release` or teardown.
//! Notes: Not synchronized; callers hosting several threads must wrap it in a lock.
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use super::error::{Error, ErrorKind};
use super::handle::{Handle, MAX_ID, TypeTag};

/// A value type the registry can own and hand out handles for.
pub trait Managed: Any + Send {
    /// Non-zero tag embedded in every handle for this type.
    const TYPE_TAG: TypeTag;
    const TYPE_NAME: &'static str;
}

/// What to do with entries still alive when the registry is torn down.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TeardownPolicy {
    /// Drop everything and report how many were left.
    #[default]
    ReleaseAll,
    /// Drop everything, then fail with `Leaked` if anything was left.
    RequireEmpty,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TeardownReport {
    pub released: usize,
    pub by_type: BTreeMap<&'static str, usize>,
}

struct Entry {
    tag: TypeTag,
    type_name: &'static str,
    value: Box<dyn Any + Send>,
}

#[derive(Default)]
pub struct Registry {
    entries: HashMap<u64, Entry>,
    types: HashMap<TypeTag, TypeId>,
    last_id: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total identifiers minted so far, live or released.
    pub fn issued(&self) -> u64 {
        self.last_id
    }

    pub fn register<T: Managed>(&mut self, value: T) -> Result<Handle, Error> {
        if T::TYPE_TAG == 0 {
            return Err(Error::new(ErrorKind::Internal)
                .with_message(format!("type {} uses reserved tag 0", T::TYPE_NAME)));
        }
        match self.types.get(&T::TYPE_TAG) {
            Some(type_id) if *type_id != TypeId::of::<T>() => {
                return Err(Error::new(ErrorKind::Internal).with_message(format!(
                    "type tag {:#06x} already claimed by another type",
                    T::TYPE_TAG
                )));
            }
            Some(_) => {}
            None => {
                self.types.insert(T::TYPE_TAG, TypeId::of::<T>());
            }
        }
        if self.last_id >= MAX_ID {
            return Err(Error::new(ErrorKind::Internal).with_message("handle space exhausted"));
        }
        self.last_id += 1;
        let id = self.last_id;
        self.entries.insert(
            id,
            Entry {
                tag: T::TYPE_TAG,
                type_name: T::TYPE_NAME,
                value: Box::new(value),
            },
        );
        let handle = Handle::pack(T::TYPE_TAG, id);
        debug!(handle = %handle, type_name = T::TYPE_NAME, live = self.entries.len(), "registered");
        Ok(handle)
    }

    pub fn resolve<T: Managed>(&self, handle: Handle) -> Result<&T, Error> {
        let entry = self.entry(handle)?;
        check_type::<T>(entry, handle)?;
        entry.value.downcast_ref::<T>().ok_or_else(|| tag_collision::<T>(handle))
    }

    pub fn resolve_mut<T: Managed>(&mut self, handle: Handle) -> Result<&mut T, Error> {
        self.entry(handle)?;
        let entry = self
            .entries
            .get_mut(&handle.id())
            .ok_or_else(|| invalid(handle, "handle not registered"))?;
        check_type::<T>(entry, handle)?;
        entry.value.downcast_mut::<T>().ok_or_else(|| tag_collision::<T>(handle))
    }

    /// Removes the entry and drops its value. Fails for unknown or released handles.
    pub fn release(&mut self, handle: Handle) -> Result<(), Error> {
        self.entry(handle)?;
        let entry = self
            .entries
            .remove(&handle.id())
            .ok_or_else(|| invalid(handle, "handle not registered"))?;
        debug!(handle = %handle, type_name = entry.type_name, live = self.entries.len(), "released");
        drop(entry);
        Ok(())
    }

    /// Liveness probe; never fails.
    pub fn is_valid(&self, handle: Handle) -> bool {
        self.entry(handle).is_ok()
    }

    pub fn is_valid_as<T: Managed>(&self, handle: Handle) -> bool {
        self.entry(handle)
            .map(|entry| entry.tag == T::TYPE_TAG)
            .unwrap_or(false)
    }

    /// Drops every remaining entry. The registry stays usable afterwards and
    /// keeps its identifier counter, so handles issued before teardown stay dead.
    pub fn teardown(&mut self, policy: TeardownPolicy) -> Result<TeardownReport, Error> {
        let report = self.drain();
        if report.released > 0 {
            warn!(released = report.released, "registry torn down with live handles");
            if policy == TeardownPolicy::RequireEmpty {
                return Err(Error::new(ErrorKind::Leaked).with_message(format!(
                    "{} handle(s) were never deleted",
                    report.released
                )));
            }
        }
        Ok(report)
    }

    fn drain(&mut self) -> TeardownReport {
        let mut report = TeardownReport::default();
        for (_, entry) in self.entries.drain() {
            report.released += 1;
            *report.by_type.entry(entry.type_name).or_insert(0) += 1;
        }
        report
    }

    fn entry(&self, handle: Handle) -> Result<&Entry, Error> {
        if handle.tag() == 0 || handle.id() == 0 {
            return Err(invalid(handle, "malformed handle"));
        }
        let Some(entry) = self.entries.get(&handle.id()) else {
            let message = if handle.id() <= self.last_id {
                "handle already released"
            } else {
                "handle was never issued"
            };
            return Err(invalid(handle, message));
        };
        if entry.tag != handle.tag() {
            return Err(invalid(handle, "handle tag does not match registered object"));
        }
        Ok(entry)
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            let report = self.drain();
            warn!(released = report.released, "registry dropped with live handles");
        }
    }
}

fn check_type<T: Managed>(entry: &Entry, handle: Handle) -> Result<(), Error> {
    if entry.tag != T::TYPE_TAG {
        return Err(Error::new(ErrorKind::TypeMismatch)
            .with_message(format!(
                "handle refers to {}, expected {}",
                entry.type_name,
                T::TYPE_NAME
            ))
            .with_handle(handle.into_raw()));
    }
    Ok(())
}

fn invalid(handle: Handle, message: &str) -> Error {
    Error::new(ErrorKind::InvalidHandle)
        .with_message(message)
        .with_handle(handle.into_raw())
}

fn tag_collision<T: Managed>(handle: Handle) -> Error {
    Error::new(ErrorKind::Internal)
        .with_message(format!("stored value is not a {}", T::TYPE_NAME))
        .with_handle(handle.into_raw())
}

//! Following pointers while reading
//!
//! `Option` and smart pointers are borrowed through directly. Lock-like
//! pointers (`RwLock`, `Mutex`) are read through a guard that stays held for
//! as long as the returned [`LockedPeek`] lives.

use facet_core::{Def, PointerDef, PtrConst, ReadLockResult, Shape, WriteLockResult};
use facet_reflect::Peek;
use std::marker::PhantomData;

/// Target of one pointer hop
pub enum Pointee<'mem> {
    /// Nil `Option`
    Nil,
    /// Reached without locking
    Borrowed(Peek<'mem, 'static>),
    /// Reached through a lock guard
    Locked(LockedPeek<'mem>),
    /// Non-nil, but this pointer kind offers no way to reach the pointee
    Unreachable,
}

enum Guard {
    Read(ReadLockResult),
    Write(WriteLockResult),
}

/// A pointee read through a held lock; dropping it releases the lock
pub struct LockedPeek<'mem> {
    data: PtrConst,
    shape: &'static Shape,
    _guard: Guard,
    _mem: PhantomData<&'mem ()>,
}

impl LockedPeek<'_> {
    pub fn peek(&self) -> Peek<'_, 'static> {
        // SAFETY: the guard keeps `data` alive and unaliased by writers,
        // and the lock's pointee shape describes it
        unsafe { Peek::unchecked_new(self.data, self.shape) }
    }
}

/// Follow one pointer level of `peek`
///
/// Non-pointer values are returned as [`Pointee::Borrowed`] unchanged.
pub fn follow<'a>(peek: Peek<'a, 'static>) -> Pointee<'a> {
    match peek.shape().def {
        Def::Option(_) => match peek.into_option() {
            Ok(option) => option.value().map_or(Pointee::Nil, Pointee::Borrowed),
            Err(_) => Pointee::Unreachable,
        },
        Def::Pointer(def) => {
            if def.vtable.borrow_fn.is_some() {
                return match peek.into_pointer().ok().and_then(|p| p.borrow_inner()) {
                    Some(inner) => Pointee::Borrowed(inner),
                    None => Pointee::Unreachable,
                };
            }
            match lock(peek, def) {
                Some(locked) => Pointee::Locked(locked),
                None => Pointee::Unreachable,
            }
        }
        _ => Pointee::Borrowed(peek),
    }
}

fn lock<'a>(peek: Peek<'a, 'static>, def: PointerDef) -> Option<LockedPeek<'a>> {
    let shape = def.pointee()?;
    if let Some(read) = def.vtable.read_fn {
        // SAFETY: `peek` points at a live value of the lock's shape
        let guard = unsafe { read(peek.data()) }.ok()?;
        return Some(LockedPeek {
            data: *guard.data(),
            shape,
            _guard: Guard::Read(guard),
            _mem: PhantomData,
        });
    }
    if let Some(lock) = def.vtable.lock_fn {
        // SAFETY: as above
        let guard = unsafe { lock(peek.data()) }.ok()?;
        return Some(LockedPeek {
            data: guard.data_const(),
            shape,
            _guard: Guard::Write(guard),
            _mem: PhantomData,
        });
    }
    None
}

/// Identity of the allocation a smart pointer refers to
///
/// Only pointers that share or own a heap allocation have one; `Option`,
/// locks and zero-sized pointees do not.
pub fn identity(peek: Peek<'_, 'static>) -> Option<usize> {
    let Def::Pointer(def) = peek.shape().def else {
        return None;
    };
    def.vtable.borrow_fn?;
    let pointee = def.pointee()?;
    let size = pointee.layout.sized_layout().ok()?.size();
    if size == 0 {
        return None;
    }
    let inner = peek.into_pointer().ok()?.borrow_inner()?;
    Some(inner.data().as_byte_ptr() as usize)
}

/// Whether `peek` is a nil `Option`
pub fn is_nil(peek: Peek<'_, 'static>) -> bool {
    match peek.shape().def {
        Def::Option(_) => peek.into_option().map_or(false, |option| option.is_none()),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex, RwLock};

    #[test]
    fn test_follow_option_and_box() {
        let none: Option<i32> = None;
        assert!(matches!(follow(Peek::new(&none)), Pointee::Nil));
        assert!(is_nil(Peek::new(&none)));

        let boxed = Some(Box::new(5i32));
        let Pointee::Borrowed(inner) = follow(Peek::new(&boxed)) else {
            panic!("expected the box");
        };
        let Pointee::Borrowed(value) = follow(inner) else {
            panic!("expected the pointee");
        };
        assert_eq!(value.get::<i32>().unwrap(), &5);
    }

    #[test]
    fn test_follow_through_locks() {
        let shared = Arc::new(RwLock::new(String::from("inside")));
        let Pointee::Borrowed(lock) = follow(Peek::new(&shared)) else {
            panic!("expected the lock");
        };
        let Pointee::Locked(locked) = follow(lock) else {
            panic!("expected a guard");
        };
        assert_eq!(locked.peek().get::<String>().unwrap(), "inside");
        drop(locked);
        assert!(shared.try_write().is_ok());

        let mutex = Mutex::new(3u8);
        let Pointee::Locked(locked) = follow(Peek::new(&mutex)) else {
            panic!("expected a guard");
        };
        assert_eq!(locked.peek().get::<u8>().unwrap(), &3);
    }

    #[test]
    fn test_identity_is_the_shared_allocation() {
        let shared = Arc::new(7u64);
        let alias = Arc::clone(&shared);
        assert_eq!(
            identity(Peek::new(&shared)),
            identity(Peek::new(&alias))
        );
        assert_eq!(identity(Peek::new(&Some(1u64))), None);
    }

    #[test]
    fn test_weak_is_unreachable() {
        let strong = Arc::new(1i32);
        let weak = Arc::downgrade(&strong);
        assert!(matches!(follow(Peek::new(&weak)), Pointee::Unreachable));
    }
}

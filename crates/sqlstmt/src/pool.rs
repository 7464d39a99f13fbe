//! Object pools backing the allocation-free build path.
//!
//! Every reusable container in the crate (writers, argument lists, insert
//! rows, statements) is handed out as a [`Pooled`] handle. The handle recycles
//! its value and returns it to the owning [`Pool`] on drop. Reference-counted
//! nodes (condition leaves and lists, sub-statements) are [`Shared`] handles
//! whose `Arc` allocation goes back to its pool when the last handle drops.
//! A warm process builds statements without touching the allocator.

use std::fmt;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::cond::{CondList, Expr};
use crate::stmt::{Operand, Stmt};
use crate::value::Value;
use crate::writer::Writer;

/// Reset a value in place, keeping its allocated capacity.
pub trait Recycle {
    fn recycle(&mut self);
}

impl<T> Recycle for Vec<T> {
    fn recycle(&mut self) {
        self.clear();
    }
}

impl<T: Recycle> Recycle for Arc<T> {
    fn recycle(&mut self) {
        if let Some(value) = Arc::get_mut(self) {
            value.recycle();
        }
    }
}

/// A bounded free list of reusable values.
///
/// `Pool::new` is `const`, so pools live in `static`s.
pub struct Pool<T: Recycle> {
    idle: Mutex<Vec<T>>,
    max_idle: AtomicUsize,
    init: fn() -> T,
}

impl<T: Recycle> Pool<T> {
    pub const fn new(init: fn() -> T, max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_idle: AtomicUsize::new(max_idle),
            init,
        }
    }

    /// Take an idle value, or create a fresh one when the pool is empty.
    pub fn acquire(&'static self) -> Pooled<T> {
        let value = self.lock().pop().unwrap_or_else(self.init);
        Pooled {
            value: ManuallyDrop::new(value),
            pool: self,
        }
    }

    /// Cap the number of idle values kept. Surplus values are dropped on release.
    pub fn set_max_idle(&self, max_idle: usize) {
        self.max_idle.store(max_idle, Ordering::Relaxed);
        let surplus = {
            let mut idle = self.lock();
            if idle.len() > max_idle {
                idle.split_off(max_idle)
            } else {
                Vec::new()
            }
        };
        drop(surplus);
    }

    pub fn max_idle(&self) -> usize {
        self.max_idle.load(Ordering::Relaxed)
    }

    /// Number of values currently parked in the pool.
    pub fn idle_count(&self) -> usize {
        self.lock().len()
    }

    fn release(&self, mut value: T) {
        // Recycling can drop nested pooled handles, which release into this
        // same pool, so it must happen before the lock is taken.
        value.recycle();
        let surplus = {
            let mut idle = self.lock();
            if idle.len() < self.max_idle() {
                idle.push(value);
                None
            } else {
                Some(value)
            }
        };
        drop(surplus);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Recycle> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("idle", &self.idle_count())
            .field("max_idle", &self.max_idle())
            .finish()
    }
}

/// An owned value on loan from a [`Pool`].
pub struct Pooled<T: Recycle + 'static> {
    value: ManuallyDrop<T>,
    pool: &'static Pool<T>,
}

impl<T: Recycle + 'static> Pooled<T> {
    /// Take the value out of pool management. It is dropped normally afterwards.
    pub fn detach(self) -> T {
        let mut this = ManuallyDrop::new(self);
        // SAFETY: `this` is never dropped, so `value` is taken exactly once.
        unsafe { ManuallyDrop::take(&mut this.value) }
    }
}

impl<T: Recycle + 'static> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: Recycle + 'static> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: Recycle + 'static> Drop for Pooled<T> {
    fn drop(&mut self) {
        // SAFETY: `value` is not accessed again after this point.
        let value = unsafe { ManuallyDrop::take(&mut self.value) };
        self.pool.release(value);
    }
}

impl<T: Recycle + fmt::Debug + 'static> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.value, f)
    }
}

impl<T: Recycle + PartialEq + 'static> PartialEq for Pooled<T> {
    fn eq(&self, other: &Self) -> bool {
        *self.value == *other.value
    }
}

impl<T: Recycle + 'static> Pool<Arc<T>> {
    /// Take a uniquely owned node, fill it in place and start sharing it.
    pub fn share(&'static self, fill: impl FnOnce(&mut T)) -> Shared<T> {
        let mut node = self.lock().pop().unwrap_or_else(self.init);
        // Only unique nodes are parked, but never fill a node someone else sees.
        if Arc::get_mut(&mut node).is_none() {
            node = (self.init)();
        }
        if let Some(value) = Arc::get_mut(&mut node) {
            fill(value);
        }
        Shared {
            node: ManuallyDrop::new(node),
            pool: self,
        }
    }
}

/// A shared, immutable value whose `Arc` allocation is recycled through a
/// [`Pool`] once the last handle drops.
pub struct Shared<T: Recycle + 'static> {
    node: ManuallyDrop<Arc<T>>,
    pool: &'static Pool<Arc<T>>,
}

impl<T: Recycle + 'static> Shared<T> {
    /// Whether both handles point at the same node.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.node, &other.node)
    }

    /// Number of live handles to this node.
    pub fn share_count(this: &Self) -> usize {
        Arc::strong_count(&this.node)
    }
}

impl<T: Recycle + 'static> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            node: ManuallyDrop::new(Arc::clone(&self.node)),
            pool: self.pool,
        }
    }
}

impl<T: Recycle + 'static> Deref for Shared<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.node
    }
}

impl<T: Recycle + 'static> Drop for Shared<T> {
    fn drop(&mut self) {
        // SAFETY: `node` is not accessed again after this point.
        let mut node = unsafe { ManuallyDrop::take(&mut self.node) };
        // The last handle parks the node. Two handles racing here may both
        // see a share, in which case the node is simply freed.
        if Arc::get_mut(&mut node).is_some() {
            self.pool.release(node);
        }
    }
}

impl<T: Recycle + fmt::Debug + 'static> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self.node, f)
    }
}

/// A pooled list of bound argument values.
pub type ArgList = Pooled<Vec<Value>>;

pub(crate) static WRITERS: Pool<Writer> = Pool::new(Writer::new, 256);
pub(crate) static ARG_LISTS: Pool<Vec<Value>> = Pool::new(Vec::new, 1024);
pub(crate) static EXPR_NODES: Pool<Arc<Expr>> = Pool::new(new_node, 1024);
pub(crate) static COND_LISTS: Pool<Arc<CondList>> = Pool::new(new_node, 1024);
pub(crate) static ROWS: Pool<Vec<Operand>> = Pool::new(Vec::new, 1024);
pub(crate) static STMTS: Pool<Stmt> = Pool::new(Stmt::new, 256);
pub(crate) static SUB_STMTS: Pool<Arc<Stmt>> = Pool::new(new_node, 256);

fn new_node<T: Default>() -> Arc<T> {
    Arc::new(T::default())
}

/// Acquire an empty argument list.
pub fn arg_list() -> ArgList {
    ARG_LISTS.acquire()
}

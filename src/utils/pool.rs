/// Objects that can be recycled through a [`Pool`].
pub trait Poolable: Default {
    /// Clears per-use state, including any body references, before reuse.
    fn reset(&mut self);
}

/// Free-list recycler for per-step objects such as contact equations.
///
/// The pool only stores objects that have been released; objects handed out by
/// [`Pool::get`] are owned by the caller until they come back through
/// [`Pool::release`]. Its size is bounded by the high-water mark of objects
/// outstanding at once.
#[derive(Debug)]
pub struct Pool<T: Poolable> {
    objects: Vec<T>,
}

impl<T: Poolable> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Poolable> Pool<T> {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
        }
    }

    /// Creates a pool pre-filled with `size` fresh objects.
    pub fn with_capacity(size: usize) -> Self {
        let mut pool = Self::new();
        pool.resize(size);
        pool
    }

    /// Grows or shrinks the stock of idle objects to exactly `size`.
    pub fn resize(&mut self, size: usize) -> &mut Self {
        if self.objects.len() > size {
            self.objects.truncate(size);
        } else {
            self.objects.resize_with(size, T::default);
        }
        self
    }

    /// Hands out an idle object, allocating only when the pool is empty.
    pub fn get(&mut self) -> T {
        self.objects.pop().unwrap_or_default()
    }

    /// Returns an object to the pool after resetting it.
    pub fn release(&mut self, mut object: T) -> &mut Self {
        object.reset();
        self.objects.push(object);
        self
    }

    /// Releases every object drained from `objects`.
    pub fn release_all(&mut self, objects: impl IntoIterator<Item = T>) {
        for object in objects {
            self.release(object);
        }
    }

    /// Number of idle objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Debug)]
    struct Scratch {
        owner: Option<u32>,
        value: f32,
    }

    impl Poolable for Scratch {
        fn reset(&mut self) {
            self.owner = None;
            self.value = 0.0;
        }
    }

    #[test]
    fn round_trips_never_exceed_high_water_mark() {
        let mut pool: Pool<Scratch> = Pool::with_capacity(2);
        for _ in 0..100 {
            let object = pool.get();
            pool.release(object);
            assert!(pool.len() <= 2);
        }
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn release_clears_body_references() {
        let mut pool: Pool<Scratch> = Pool::new();
        let mut object = pool.get();
        object.owner = Some(7);
        object.value = 3.5;
        pool.release(object);

        let reused = pool.get();
        assert!(reused.owner.is_none());
        assert_eq!(reused.value, 0.0);
        assert!(pool.is_empty());
    }

    #[test]
    fn resize_shrinks_and_grows() {
        let mut pool: Pool<Scratch> = Pool::with_capacity(5);
        pool.resize(2);
        assert_eq!(pool.len(), 2);
        pool.resize(4);
        assert_eq!(pool.len(), 4);
    }
}

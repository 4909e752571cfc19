use crate::ErrorKind;

#[cfg(all(test, not(feature = "std")))]
use std::vec::Vec;

/// Append-only output buffer
///
/// Store batch reads, request generators and response builders write through this trait, so the
/// same code serves heap vectors on hosts and fixed-capacity buffers on bare metal. Every write
/// reports [`ErrorKind::OOB`] instead of growing past the capacity.
pub trait VectorTrait<T: Copy> {
    fn push(&mut self, value: T) -> Result<(), ErrorKind>;
    fn extend(&mut self, other: &[T]) -> Result<(), ErrorKind>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool;
    fn clear(&mut self);
    fn cut_end(&mut self, len_to_cut: usize);
    fn as_slice(&self) -> &[T];
    fn replace(&mut self, index: usize, value: T) -> Result<(), ErrorKind>;
}

#[cfg(any(feature = "std", test))]
impl<T: Copy> VectorTrait<T> for Vec<T> {
    #[inline]
    fn push(&mut self, value: T) -> Result<(), ErrorKind> {
        Vec::push(self, value);
        Ok(())
    }
    #[inline]
    fn extend(&mut self, values: &[T]) -> Result<(), ErrorKind> {
        Vec::extend_from_slice(self, values);
        Ok(())
    }
    #[inline]
    fn len(&self) -> usize {
        Vec::len(self)
    }
    #[inline]
    fn is_empty(&self) -> bool {
        Vec::is_empty(self)
    }
    #[inline]
    fn clear(&mut self) {
        Vec::clear(self);
    }
    fn cut_end(&mut self, len_to_cut: usize) {
        let len = self.len();
        self.truncate(len.saturating_sub(len_to_cut));
    }
    #[inline]
    fn as_slice(&self) -> &[T] {
        Vec::as_slice(self)
    }
    #[inline]
    fn replace(&mut self, index: usize, value: T) -> Result<(), ErrorKind> {
        let slot = self.get_mut(index).ok_or(ErrorKind::OOB)?;
        *slot = value;
        Ok(())
    }
}

#[cfg(feature = "fixedvec")]
use fixedvec::FixedVec;

#[cfg(feature = "fixedvec")]
impl<T: Copy> VectorTrait<T> for FixedVec<'_, T> {
    #[inline]
    fn push(&mut self, value: T) -> Result<(), ErrorKind> {
        FixedVec::push(self, value).map_err(|_| ErrorKind::OOB)
    }
    #[inline]
    fn extend(&mut self, values: &[T]) -> Result<(), ErrorKind> {
        FixedVec::push_all(self, values).map_err(|_| ErrorKind::OOB)
    }
    #[inline]
    fn len(&self) -> usize {
        FixedVec::len(self)
    }
    #[inline]
    fn is_empty(&self) -> bool {
        FixedVec::is_empty(self)
    }
    #[inline]
    fn clear(&mut self) {
        FixedVec::clear(self);
    }
    fn cut_end(&mut self, len_to_cut: usize) {
        let len = self.len();
        FixedVec::truncate(self, len.saturating_sub(len_to_cut));
    }
    #[inline]
    fn as_slice(&self) -> &[T] {
        FixedVec::as_slice(self)
    }
    #[inline]
    fn replace(&mut self, index: usize, value: T) -> Result<(), ErrorKind> {
        let slot = self.as_mut_slice().get_mut(index).ok_or(ErrorKind::OOB)?;
        *slot = value;
        Ok(())
    }
}

#[cfg(feature = "heapless")]
use heapless::Vec as HeaplessVec;

#[cfg(feature = "heapless")]
impl<T: Copy, const N: usize> VectorTrait<T> for HeaplessVec<T, N> {
    #[inline]
    fn push(&mut self, value: T) -> Result<(), ErrorKind> {
        HeaplessVec::push(self, value).map_err(|_| ErrorKind::OOB)
    }
    #[inline]
    fn extend(&mut self, values: &[T]) -> Result<(), ErrorKind> {
        self.extend_from_slice(values).map_err(|_| ErrorKind::OOB)
    }
    #[inline]
    fn len(&self) -> usize {
        <[T]>::len(self)
    }
    #[inline]
    fn is_empty(&self) -> bool {
        HeaplessVec::is_empty(self)
    }
    #[inline]
    fn clear(&mut self) {
        HeaplessVec::clear(self);
    }
    fn cut_end(&mut self, len_to_cut: usize) {
        let len = <[T]>::len(self);
        HeaplessVec::truncate(self, len.saturating_sub(len_to_cut));
    }
    #[inline]
    fn as_slice(&self) -> &[T] {
        HeaplessVec::as_slice(self)
    }
    #[inline]
    fn replace(&mut self, index: usize, value: T) -> Result<(), ErrorKind> {
        let slot = self.get_mut(index).ok_or(ErrorKind::OOB)?;
        *slot = value;
        Ok(())
    }
}

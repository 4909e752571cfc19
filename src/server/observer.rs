use super::context::{DataStore, RegisterStore};
use crate::{ErrorKind, VectorTrait};

/// Registers written by a master request
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WriteEvent {
    pub reg: u16,
    pub count: u16,
}

/// Register store wrapper which reports master writes to a callback
///
/// The callback runs after the holding register controller has written the registers, so it
/// observes the new values through the store. Writes made by the application itself are not
/// reported.
///
/// ```
/// use rtuslave::server::controller::HoldingRegisterController;
/// use rtuslave::server::observer::ObservedRegisters;
/// use rtuslave::server::storage::RegisterStorage;
///
/// let mut writes = 0;
/// let holdings = HoldingRegisterController::new(ObservedRegisters::new(
///     RegisterStorage::<16>::new(),
///     |_event| writes += 1,
/// ));
/// # drop(holdings);
/// ```
pub struct ObservedRegisters<S, F>
where
    S: RegisterStore,
    F: FnMut(WriteEvent),
{
    store: S,
    post_write: F,
}

impl<S, F> ObservedRegisters<S, F>
where
    S: RegisterStore,
    F: FnMut(WriteEvent),
{
    pub fn new(store: S, post_write: F) -> Self {
        Self { store, post_write }
    }

    #[inline]
    pub fn inner(&self) -> &S {
        &self.store
    }

    #[inline]
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S, F> core::fmt::Debug for ObservedRegisters<S, F>
where
    S: RegisterStore + core::fmt::Debug,
    F: FnMut(WriteEvent),
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ObservedRegisters")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl<S, F> DataStore for ObservedRegisters<S, F>
where
    S: RegisterStore,
    F: FnMut(WriteEvent),
{
    fn size(&self) -> usize {
        self.store.size()
    }

    fn address_start(&self) -> usize {
        self.store.address_start()
    }

    fn is_address_valid(&self, address: usize) -> bool {
        self.store.is_address_valid(address)
    }

    fn is_span_valid(&self, address: u16, count: u16) -> bool {
        self.store.is_span_valid(address, count)
    }
}

impl<S, F> RegisterStore for ObservedRegisters<S, F>
where
    S: RegisterStore,
    F: FnMut(WriteEvent),
{
    fn get_register(&self, address: u16) -> Result<u16, ErrorKind> {
        self.store.get_register(address)
    }

    fn set_register(&mut self, address: u16, value: u16) -> Result<(), ErrorKind> {
        self.store.set_register(address, value)
    }

    fn is_read_valid(&self, address: u16, count: u16) -> bool {
        self.store.is_read_valid(address, count)
    }

    fn is_write_valid(&self, address: u16, count: u16) -> bool {
        self.store.is_write_valid(address, count)
    }

    fn get_registers_as_bytes<V: VectorTrait<u8>>(
        &self,
        address: u16,
        count: u16,
        result: &mut V,
    ) -> Result<(), ErrorKind> {
        self.store.get_registers_as_bytes(address, count, result)
    }

    fn set_registers_from_bytes(
        &mut self,
        address: u16,
        count: u16,
        values: &[u8],
    ) -> Result<(), ErrorKind> {
        self.store.set_registers_from_bytes(address, count, values)
    }

    fn registers_written(&mut self, address: u16, count: u16) {
        self.store.registers_written(address, count);
        (self.post_write)(WriteEvent {
            reg: address,
            count,
        });
    }

    fn new_data_available(&self) -> bool {
        self.store.new_data_available()
    }

    fn clear_new_data(&mut self) {
        self.store.clear_new_data();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::controller::HoldingRegisterController;
    use crate::server::storage::UpdatingRegisterStorage;
    use crate::{Frame, Function, Response};
    use std::vec::Vec;

    #[test]
    fn test_observed_writes() {
        let mut events = Vec::new();
        {
            let mut ctrl = HoldingRegisterController::new(ObservedRegisters::new(
                UpdatingRegisterStorage::<8>::new(),
                |event| events.push(event),
            ));
            let mut response = Response::new();
            let write = Frame::with_data(
                1,
                Function::WriteMultipleRegisters,
                &[0, 2, 0, 2, 4, 0xDE, 0xAD, 0xBE, 0xEF],
            )
            .unwrap();
            ctrl.read_frame(&write, &mut response).unwrap();
            let write = Frame::with_data(1, Function::WriteSingleRegister, &[0, 7, 0, 1]).unwrap();
            ctrl.read_frame(&write, &mut response).unwrap();
            let read = Frame::with_data(1, Function::ReadHoldingRegisters, &[0, 2, 0, 2]).unwrap();
            ctrl.read_frame(&read, &mut response).unwrap();
            assert_eq!(response.as_slice(), &[1, 3, 4, 0xDE, 0xAD, 0xBE, 0xEF]);
            // the wrapped store still tracks new data
            assert!(ctrl.store().new_data_available());
            assert!(ctrl.store().inner().is_new_data(3));
            ctrl.store_mut().set_register(0, 5).unwrap();
            assert_eq!(ctrl.store().get_register(0), Ok(5));
        }
        assert_eq!(
            events,
            [
                WriteEvent { reg: 2, count: 2 },
                WriteEvent { reg: 7, count: 1 }
            ]
        );
    }
}

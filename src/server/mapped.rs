//! Register view over a structured memory layout
//!
//! A [`RegisterMap`] describes a record of heterogeneous fields (strings, counters, floats...)
//! as an ordered table of byte ranges. [`MappedRegisterStore`] exposes the record as holding or
//! input registers: register `n` starts at byte `2 * n`, and every access must cover exactly
//! one field. Partial or cross-field reads and writes are rejected, so a master can never
//! observe or produce a torn value.

use super::context::{DataStore, RegisterStore};
use crate::{ErrorKind, VectorTrait};

/// Largest field a single request can carry (125 registers)
pub const MAX_FIELD_LEN: usize = 250;

/// One field of a register map
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MapEntry<I> {
    pub identifier: I,
    /// Byte offset inside the mapped memory, must be even
    pub offset: usize,
    /// Byte size, must be even
    pub size: usize,
}

impl<I> MapEntry<I> {
    pub const fn new(identifier: I, offset: usize, size: usize) -> Self {
        Self {
            identifier,
            offset,
            size,
        }
    }
}

/// Structured memory which can be published as registers
///
/// Field bytes are exchanged in wire order, so the map decides the byte order of multi-byte
/// values (Modbus masters usually expect big-endian).
pub trait RegisterMap {
    type Identifier: Copy;

    /// Total byte size of the mapped memory
    fn size(&self) -> usize;

    /// Fields sorted by offset, without overlaps
    fn entries(&self) -> &[MapEntry<Self::Identifier>];

    /// Fills `out` (exactly the field size) with the field bytes
    fn get_field(&self, identifier: Self::Identifier, out: &mut [u8]) -> Result<(), ErrorKind>;

    /// Replaces the field with `data` (exactly the field size)
    fn set_field(&mut self, identifier: Self::Identifier, data: &[u8]) -> Result<(), ErrorKind>;
}

#[derive(Debug, Clone)]
pub struct MappedRegisterStore<M: RegisterMap> {
    map: M,
    new_data: bool,
}

impl<M: RegisterMap> MappedRegisterStore<M> {
    /// Validates the map table
    ///
    /// Errors:
    ///
    /// * **MapUnsorted** entries are not sorted by offset or overlap
    /// * **MapOutOfRange** an entry is empty, not register-aligned, larger than
    ///   [`MAX_FIELD_LEN`] or exceeds the map size
    pub fn new(map: M) -> Result<Self, ErrorKind> {
        let mut next_free = 0;
        for entry in map.entries() {
            if entry.size == 0
                || entry.offset % 2 != 0
                || entry.size % 2 != 0
                || entry.size > MAX_FIELD_LEN
                || entry.offset + entry.size > map.size()
            {
                return Err(ErrorKind::MapOutOfRange);
            }
            if entry.offset < next_free {
                return Err(ErrorKind::MapUnsorted);
            }
            next_free = entry.offset + entry.size;
        }
        Ok(Self {
            map,
            new_data: false,
        })
    }

    #[inline]
    pub fn map(&self) -> &M {
        &self.map
    }

    #[inline]
    pub fn map_mut(&mut self) -> &mut M {
        &mut self.map
    }

    pub fn into_inner(self) -> M {
        self.map
    }

    /// The field covering exactly `count` registers at `address`
    fn entry(&self, address: u16, count: u16) -> Option<&MapEntry<M::Identifier>> {
        let offset = usize::from(address) * 2;
        let entries = self.map.entries();
        let index = entries.binary_search_by_key(&offset, |e| e.offset).ok()?;
        let entry = &entries[index];
        (entry.size == usize::from(count) * 2).then_some(entry)
    }
}

impl<M: RegisterMap> DataStore for MappedRegisterStore<M> {
    fn size(&self) -> usize {
        self.map.size() / 2
    }
}

impl<M: RegisterMap> RegisterStore for MappedRegisterStore<M> {
    fn get_register(&self, address: u16) -> Result<u16, ErrorKind> {
        let entry = self.entry(address, 1).ok_or(ErrorKind::OOBContext)?;
        let mut buf = [0u8; 2];
        self.map.get_field(entry.identifier, &mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    fn set_register(&mut self, address: u16, value: u16) -> Result<(), ErrorKind> {
        let identifier = self.entry(address, 1).ok_or(ErrorKind::OOBContext)?.identifier;
        self.map.set_field(identifier, &value.to_be_bytes())
    }

    fn is_read_valid(&self, address: u16, count: u16) -> bool {
        self.entry(address, count).is_some()
    }

    fn get_registers_as_bytes<V: VectorTrait<u8>>(
        &self,
        address: u16,
        count: u16,
        result: &mut V,
    ) -> Result<(), ErrorKind> {
        let entry = self.entry(address, count).ok_or(ErrorKind::OOBContext)?;
        let mut buf = [0u8; MAX_FIELD_LEN];
        let field = &mut buf[..entry.size];
        self.map.get_field(entry.identifier, field)?;
        result.extend(field)
    }

    fn set_registers_from_bytes(
        &mut self,
        address: u16,
        count: u16,
        values: &[u8],
    ) -> Result<(), ErrorKind> {
        let entry = *self.entry(address, count).ok_or(ErrorKind::OOBContext)?;
        let data = values.get(..entry.size).ok_or(ErrorKind::OOB)?;
        self.map.set_field(entry.identifier, data)
    }

    fn registers_written(&mut self, _address: u16, _count: u16) {
        self.new_data = true;
    }

    fn new_data_available(&self) -> bool {
        self.new_data
    }

    fn clear_new_data(&mut self) {
        self.new_data = false;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::vec::Vec;

    #[derive(Debug, Clone, Copy, Eq, PartialEq)]
    pub(crate) enum Field {
        Name,
        Counter,
        Setpoint,
        Serial,
    }

    /// Name, 32-bit counter, f64 setpoint and 64-bit serial number, 24 bytes
    #[derive(Debug, Default)]
    pub(crate) struct DeviceMap {
        pub name: [u8; 4],
        pub counter: u32,
        pub setpoint: f64,
        pub serial: u64,
    }

    const ENTRIES: [MapEntry<Field>; 4] = [
        MapEntry::new(Field::Name, 0, 4),
        MapEntry::new(Field::Counter, 4, 4),
        MapEntry::new(Field::Setpoint, 8, 8),
        MapEntry::new(Field::Serial, 16, 8),
    ];

    impl RegisterMap for DeviceMap {
        type Identifier = Field;

        fn size(&self) -> usize {
            24
        }

        fn entries(&self) -> &[MapEntry<Field>] {
            &ENTRIES
        }

        fn get_field(&self, identifier: Field, out: &mut [u8]) -> Result<(), ErrorKind> {
            match identifier {
                Field::Name => out.copy_from_slice(&self.name),
                Field::Counter => out.copy_from_slice(&self.counter.to_be_bytes()),
                Field::Setpoint => out.copy_from_slice(&self.setpoint.to_be_bytes()),
                Field::Serial => out.copy_from_slice(&self.serial.to_be_bytes()),
            }
            Ok(())
        }

        fn set_field(&mut self, identifier: Field, data: &[u8]) -> Result<(), ErrorKind> {
            match identifier {
                Field::Name => self.name.copy_from_slice(data),
                Field::Counter => {
                    self.counter = u32::from_be_bytes(data.try_into().map_err(|_| ErrorKind::OOB)?);
                }
                Field::Setpoint => {
                    self.setpoint =
                        f64::from_be_bytes(data.try_into().map_err(|_| ErrorKind::OOB)?);
                }
                Field::Serial => {
                    self.serial = u64::from_be_bytes(data.try_into().map_err(|_| ErrorKind::OOB)?);
                }
            }
            Ok(())
        }
    }

    struct TableMap(Vec<MapEntry<u8>>);

    impl RegisterMap for TableMap {
        type Identifier = u8;

        fn size(&self) -> usize {
            16
        }

        fn entries(&self) -> &[MapEntry<u8>] {
            &self.0
        }

        fn get_field(&self, _identifier: u8, _out: &mut [u8]) -> Result<(), ErrorKind> {
            Ok(())
        }

        fn set_field(&mut self, _identifier: u8, _data: &[u8]) -> Result<(), ErrorKind> {
            Ok(())
        }
    }

    pub(crate) fn device_store() -> MappedRegisterStore<DeviceMap> {
        MappedRegisterStore::new(DeviceMap {
            name: *b"PUMP",
            counter: 0x0102_0304,
            setpoint: 21.5,
            serial: 0xDEAD_BEEF_FEED_DAED,
        })
        .unwrap()
    }

    #[test]
    fn test_map_validation() {
        assert!(MappedRegisterStore::new(TableMap(Vec::from([
            MapEntry::new(0, 0, 2),
            MapEntry::new(1, 2, 4),
            MapEntry::new(2, 10, 6),
        ])))
        .is_ok());
        assert_eq!(
            MappedRegisterStore::new(TableMap(Vec::from([
                MapEntry::new(0, 4, 2),
                MapEntry::new(1, 0, 2),
            ])))
            .err(),
            Some(ErrorKind::MapUnsorted)
        );
        assert_eq!(
            MappedRegisterStore::new(TableMap(Vec::from([
                MapEntry::new(0, 0, 4),
                MapEntry::new(1, 2, 2),
            ])))
            .err(),
            Some(ErrorKind::MapUnsorted)
        );
        assert_eq!(
            MappedRegisterStore::new(TableMap(Vec::from([MapEntry::new(0, 1, 2)]))).err(),
            Some(ErrorKind::MapOutOfRange)
        );
        assert_eq!(
            MappedRegisterStore::new(TableMap(Vec::from([MapEntry::new(0, 12, 6)]))).err(),
            Some(ErrorKind::MapOutOfRange)
        );
        assert_eq!(
            MappedRegisterStore::new(TableMap(Vec::from([MapEntry::new(0, 0, 0)]))).err(),
            Some(ErrorKind::MapOutOfRange)
        );
    }

    #[test]
    fn test_exact_span_rule() {
        let store = device_store();
        assert_eq!(store.size(), 12);
        assert!(store.is_read_valid(0, 2));
        assert!(store.is_read_valid(2, 2));
        assert!(store.is_read_valid(4, 4));
        assert!(store.is_read_valid(8, 4));
        // one register short / long
        assert!(!store.is_read_valid(4, 3));
        assert!(!store.is_read_valid(4, 5));
        // inside a field
        assert!(!store.is_read_valid(1, 1));
        assert!(!store.is_read_valid(5, 2));
        // spanning two fields
        assert!(!store.is_read_valid(0, 4));
        assert!(!store.is_write_valid(2, 1));
        assert!(!store.is_read_valid(12, 1));
    }

    #[test]
    fn test_mapped_read_write() {
        let mut store = device_store();
        let mut bytes = Vec::new();
        store.get_registers_as_bytes(0, 2, &mut bytes).unwrap();
        assert_eq!(bytes, b"PUMP");
        bytes.clear();
        store.get_registers_as_bytes(8, 4, &mut bytes).unwrap();
        assert_eq!(bytes, [0xDE, 0xAD, 0xBE, 0xEF, 0xFE, 0xED, 0xDA, 0xED]);
        assert_eq!(
            store.get_registers_as_bytes(8, 3, &mut bytes),
            Err(ErrorKind::OOBContext)
        );
        store
            .set_registers_from_bytes(2, 2, &[0x00, 0x00, 0x01, 0x00])
            .unwrap();
        assert_eq!(store.map().counter, 256);
        store
            .set_registers_from_bytes(4, 4, &42.25f64.to_be_bytes())
            .unwrap();
        assert_eq!(store.map().setpoint, 42.25);
        assert_eq!(
            store.set_registers_from_bytes(4, 4, &[0; 6]),
            Err(ErrorKind::OOB)
        );
        assert!(store.get_register(0).is_err());
        store.map_mut().name = *b"FANS";
        assert_eq!(&store.into_inner().name, b"FANS");
    }

    #[test]
    fn test_mapped_single_register_fields() {
        let mut store =
            MappedRegisterStore::new(TableMap(Vec::from([MapEntry::new(7, 4, 2)]))).unwrap();
        assert!(store.get_register(2).is_ok());
        assert!(store.set_register(2, 5).is_ok());
        assert!(store.get_register(3).is_err());
        assert!(store.get_register(0).is_err());
    }

    #[test]
    fn test_mapped_new_data_flag() {
        let mut store = device_store();
        assert!(!store.new_data_available());
        store
            .set_registers_from_bytes(0, 2, b"FANS")
            .unwrap();
        assert!(!store.new_data_available());
        store.registers_written(0, 2);
        assert!(store.new_data_available());
        store.clear_new_data();
        assert!(!store.new_data_available());
    }
}

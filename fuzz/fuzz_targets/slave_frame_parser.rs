#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rtuslave::server::controller::{
    CoilController, DiscreteInputController, HoldingRegisterController, InputRegisterController,
};
use rtuslave::server::device_id::{DeviceIdentifier, DeviceIdentifierController};
use rtuslave::server::storage::{BitStorage, RegisterStorage, UpdatingRegisterStorage};
use rtuslave::server::RtuSlave;
use rtuslave::VectorTrait;

#[derive(Debug, Arbitrary)]
struct FuzzInput<'a> {
    unit_id: u8,
    filter_by_address: bool,
    line: &'a [u8],
}

const IDENTIFIER: DeviceIdentifier<'static> = DeviceIdentifier {
    vendor_name: "fuzz",
    product_code: "0",
    major_minor_revision: "0.0",
    vendor_url: "",
    product_name: "",
    model_name: "",
    user_application_name: "",
};

fuzz_target!(|data: FuzzInput| {
    // we only care about panics, the line is fed as is
    let mut slave = RtuSlave::new(
        data.unit_id,
        CoilController::new(BitStorage::<1000>::new()),
        DiscreteInputController::new(BitStorage::<1000>::new()),
        HoldingRegisterController::new(UpdatingRegisterStorage::<1000>::new()),
        InputRegisterController::new(RegisterStorage::<1000>::new()),
    )
    .with_identifier(DeviceIdentifierController::new(IDENTIFIER));
    for b in data.line {
        slave.process_character(*b);
        if slave.packet_received() {
            slave.process_message(data.filter_by_address);
            if slave.response_valid() {
                assert!(slave.response().len() <= 256);
            }
            slave.reset();
        }
    }
});

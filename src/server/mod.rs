//! Modbus RTU slave
//!
//! [`RtuSlave`] owns the frame reader, the response buffer and one controller per data area.
//! The I/O side feeds received bytes with [`RtuSlave::process_character`], calls
//! [`RtuSlave::process_message`] once [`RtuSlave::packet_received`] reports a complete frame,
//! transmits the response if [`RtuSlave::response_valid`] and finally calls
//! [`RtuSlave::reset`]. [`device::SlaveDevice`] implements this loop over the
//! [`device::Transport`] and [`device::Clock`] traits.
//!
//! Frame handling:
//!
//! * frames with invalid CRC are dropped silently
//! * frames addressed to other slaves are dropped when address filtering is on
//! * broadcast frames (address 0) execute write functions and are never answered
//! * a request which fails validation is answered with the matching exception

pub mod context;
pub mod controller;
pub mod device;
pub mod device_id;
pub mod mapped;
pub mod observer;
pub mod storage;

use crate::codec::fill_exception_response;
use crate::consts::MODBUS_BROADCAST_ADDRESS;
use crate::rtu::{finalize_response, frame_crc_is_valid, ReadContext};
use crate::{
    AddressSpace, ErrorKind, Exception, Frame, Function, FunctionCode, Response, VectorTrait,
};
use context::{BitStore, RegisterStore};
use controller::{
    CoilController, DiscreteInputController, HoldingRegisterController, InputRegisterController,
};
use device_id::DeviceIdentifierController;
use log::{debug, trace, warn};

/// Functions served by [`RtuSlave`], everything else is answered with IllegalFunction
pub const IMPLEMENTED_FUNCTIONS: [Function; 9] = [
    Function::ReadCoils,
    Function::ReadDiscreteInputs,
    Function::ReadHoldingRegisters,
    Function::ReadInputRegisters,
    Function::WriteSingleCoil,
    Function::WriteSingleRegister,
    Function::WriteMultipleCoils,
    Function::WriteMultipleRegisters,
    Function::ReadDeviceIdentification,
];

#[inline]
pub fn function_is_supported(function: Function) -> bool {
    IMPLEMENTED_FUNCTIONS.contains(&function)
}

pub struct RtuSlave<'a, C, D, H, I>
where
    C: BitStore,
    D: BitStore,
    H: RegisterStore,
    I: RegisterStore,
{
    address: u8,
    context: ReadContext,
    frame: Frame,
    response: Response,
    coils: CoilController<C>,
    discretes: DiscreteInputController<D>,
    holdings: HoldingRegisterController<H>,
    inputs: InputRegisterController<I>,
    identifier: Option<DeviceIdentifierController<'a>>,
}

impl<'a, C, D, H, I> RtuSlave<'a, C, D, H, I>
where
    C: BitStore,
    D: BitStore,
    H: RegisterStore,
    I: RegisterStore,
{
    pub fn new(
        address: u8,
        coils: CoilController<C>,
        discretes: DiscreteInputController<D>,
        holdings: HoldingRegisterController<H>,
        inputs: InputRegisterController<I>,
    ) -> Self {
        Self {
            address,
            context: ReadContext::new(),
            frame: Frame::new(),
            response: Response::new(),
            coils,
            discretes,
            holdings,
            inputs,
            identifier: None,
        }
    }

    /// Enables Read Device Identification
    pub fn with_identifier(mut self, identifier: DeviceIdentifierController<'a>) -> Self {
        self.identifier = Some(identifier);
        self
    }

    #[inline]
    pub fn address(&self) -> u8 {
        self.address
    }

    #[inline]
    pub fn set_address(&mut self, address: u8) {
        self.address = address;
    }

    #[inline]
    pub fn process_character(&mut self, byte: u8) {
        self.context.process_character(&mut self.frame, byte);
    }

    #[inline]
    pub fn packet_received(&self) -> bool {
        self.context.packet_received()
    }

    #[inline]
    pub fn context(&self) -> &ReadContext {
        &self.context
    }

    /// The frame being received or the last one received
    #[inline]
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    #[inline]
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// A complete response, CRC included, is waiting for transmission
    #[inline]
    pub fn response_valid(&self) -> bool {
        self.response.is_ready()
    }

    /// Handles a complete frame
    ///
    /// Does nothing until [`RtuSlave::packet_received`] is true. With `filter_by_address` off the
    /// slave answers frames for any unit except broadcasts.
    pub fn process_message(&mut self, filter_by_address: bool) {
        if !self.packet_received() {
            return;
        }
        self.response.reset();
        let frame = core::mem::take(&mut self.frame);
        self.handle_frame(&frame, filter_by_address);
        self.frame = frame;
    }

    fn handle_frame(&mut self, frame: &Frame, filter_by_address: bool) {
        if !frame_crc_is_valid(frame) {
            warn!(
                "CRC mismatch, frame for slave {} dropped",
                frame.address
            );
            return;
        }
        let broadcast = frame.address == MODBUS_BROADCAST_ADDRESS;
        if filter_by_address && !broadcast && frame.address != self.address {
            trace!("frame for slave {} ignored", frame.address);
            return;
        }
        if broadcast && !frame.function.function().is_some_and(Function::is_write) {
            trace!("broadcast read ignored");
            return;
        }
        match self.validate_message(frame) {
            Ok(()) => {
                if let Err(e) = self.run_command(frame) {
                    warn!("{:?} failed: {}", frame.function, e);
                    self.response.reset();
                }
            }
            Err(exception) if !broadcast => {
                debug!("{:?} rejected with {:?}", frame.function, exception);
                if let Err(e) = self.send_error_response(frame, exception) {
                    warn!("unable to build the exception response: {}", e);
                    self.response.reset();
                }
            }
            Err(exception) => {
                debug!("broadcast {:?} rejected with {:?}", frame.function, exception);
            }
        }
        if broadcast {
            self.response.reset();
        }
    }

    /// Checks the frame against the implemented functions and the addressed controller
    pub fn validate_message(&self, frame: &Frame) -> Result<(), Exception> {
        let FunctionCode::Request(function) = frame.function else {
            return Err(Exception::IllegalFunction);
        };
        if !function_is_supported(function) {
            return Err(Exception::IllegalFunction);
        }
        match function.address_space() {
            AddressSpace::Coil => self.coils.validate_frame(frame),
            AddressSpace::DiscreteInput => self.discretes.validate_frame(frame),
            AddressSpace::HoldingRegister => self.holdings.validate_frame(frame),
            AddressSpace::InputRegister => self.inputs.validate_frame(frame),
            AddressSpace::DeviceIdentifier => self
                .identifier
                .as_ref()
                .map_or(Err(Exception::IllegalFunction), |c| c.validate_frame(frame)),
            AddressSpace::SystemStatus | AddressSpace::Unmapped => Err(Exception::IllegalFunction),
        }
    }

    /// Executes a validated frame and finalizes the response
    ///
    /// Returns the response length, CRC included.
    pub fn run_command(&mut self, frame: &Frame) -> Result<usize, ErrorKind> {
        match frame.function.address_space() {
            AddressSpace::Coil => self.coils.read_frame(frame, &mut self.response)?,
            AddressSpace::DiscreteInput => self.discretes.read_frame(frame, &mut self.response)?,
            AddressSpace::HoldingRegister => self.holdings.read_frame(frame, &mut self.response)?,
            AddressSpace::InputRegister => self.inputs.read_frame(frame, &mut self.response)?,
            AddressSpace::DeviceIdentifier => self
                .identifier
                .as_ref()
                .ok_or(ErrorKind::UnsupportedFunction)?
                .read_frame(frame, &mut self.response)?,
            AddressSpace::SystemStatus | AddressSpace::Unmapped => {
                return Err(ErrorKind::UnsupportedFunction)
            }
        }
        finalize_response(&mut self.response)?;
        trace!("response ready, {} bytes", self.response.len());
        Ok(self.response.len())
    }

    /// Builds a finalized exception response to the frame
    pub fn send_error_response(
        &mut self,
        frame: &Frame,
        exception: Exception,
    ) -> Result<(), ErrorKind> {
        fill_exception_response(
            &mut self.response,
            frame.address,
            frame.function,
            exception.value(),
        )?;
        finalize_response(&mut self.response)
    }

    /// Abandons the frame being received and the pending response
    pub fn reset(&mut self) {
        self.context.reset();
        self.frame.reset();
        self.response.reset();
    }

    #[inline]
    pub fn coils(&self) -> &C {
        self.coils.store()
    }

    #[inline]
    pub fn coils_mut(&mut self) -> &mut C {
        self.coils.store_mut()
    }

    #[inline]
    pub fn discretes(&self) -> &D {
        self.discretes.store()
    }

    #[inline]
    pub fn discretes_mut(&mut self) -> &mut D {
        self.discretes.store_mut()
    }

    #[inline]
    pub fn holdings(&self) -> &H {
        self.holdings.store()
    }

    #[inline]
    pub fn holdings_mut(&mut self) -> &mut H {
        self.holdings.store_mut()
    }

    #[inline]
    pub fn inputs(&self) -> &I {
        self.inputs.store()
    }

    #[inline]
    pub fn inputs_mut(&mut self) -> &mut I {
        self.inputs.store_mut()
    }
}
